//! Gatherbot Server
//!
//! Community-operations bot: keeps scheduled gatherings synchronized
//! across the community and streaming platforms and tracks live-session
//! attendance.

mod config;
mod server;
mod shutdown;
mod state;
mod webhooks;

use clap::Parser;
use config::ConfigLoader;
use gatherbot_core::cache::Cache;
use gatherbot_core::events::EventBus;
use gatherbot_core::platforms::{
    CommunityClient, ContentClient, EngagementClient, StreamingClient,
};
use gatherbot_core::processors::{
    AttendanceTracker, GatheringSynchronizer, NotificationDispatcher, RealtimeClient,
};
use server::{build_router, run_server};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Gatherbot - cross-platform gathering sync and attendance tracking
#[derive(Parser, Debug)]
#[command(name = "gatherbot-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./gatherbot-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting gatherbot-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let loader = ConfigLoader::new(&args.config, args.listen);
    let config = loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    let listen_addr = config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Platform clients
    let community = Arc::new(CommunityClient::new(
        &config.community.api_base,
        &config.community.bot_token,
        &config.community.guild_id,
    ));
    let streaming = Arc::new(StreamingClient::new(
        &config.streaming.api_base,
        &config.streaming.client_id,
        &config.streaming.token,
        &config.streaming.channel_id,
        &config.streaming.moderator_id,
    ));
    let engagement = Arc::new(EngagementClient::new(
        &config.engagement.api_base,
        &config.engagement.api_key,
        &config.engagement.workspace,
    ));
    let content = Arc::new(ContentClient::new(&config.content.callback_url));

    // Shared infrastructure
    let bus = EventBus::new();
    let cache = Cache::new();
    let dispatcher = Arc::new(NotificationDispatcher::new(
        streaming.clone(),
        cache,
        bus.clone(),
    ));

    // Processors, all watching the same shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    let synchronizer = GatheringSynchronizer::new(
        community.clone(),
        streaming.clone(),
        content,
        bus.clone(),
        shutdown_rx.clone(),
        config.streaming.stream_url.clone(),
        config.community.meetup_channel_id.clone(),
        config.sync.cover_images,
    );
    tasks.push(tokio::spawn(synchronizer.run()));

    let tracker = AttendanceTracker::new(
        community,
        engagement,
        &bus,
        shutdown_rx.clone(),
        config.community.meetup_channel_id.clone(),
        config.community.attendee_role_id.clone(),
    );
    tasks.push(tokio::spawn(tracker.run()));

    if config.streaming.realtime_enabled {
        let realtime = RealtimeClient::new(
            streaming,
            dispatcher.clone(),
            config.streaming.ws_url.clone(),
            shutdown_rx,
        );
        tasks.push(tokio::spawn(realtime.run()));
    } else {
        tracing::info!("Realtime client disabled by configuration");
    }

    // Webhook gateway
    let app_state = AppState::new(bus, dispatcher, &config.webhooks);
    let router = build_router(app_state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop the processors and wait for them to drain
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tokio_tungstenite=warn,tungstenite=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
