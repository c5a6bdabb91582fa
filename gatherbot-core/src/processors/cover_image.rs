//! Cover-image generation for scheduled events.
//!
//! The image URL is a pure function of the gathering kind and name:
//! voice meetups use a fixed asset, streams get a templated
//! image-service URL with the title baked in. The fetched bytes are
//! delivered to the platforms as a `data:` URI. A failed fetch is not
//! fatal; the event is simply created without an image.

use thiserror::Error;

use crate::entities::gathering::GatheringKind;

/// Fixed cover asset for voice meetups.
const VOICE_MEETUP_COVER_URL: &str =
    "https://images.gatherbot.dev/assets/voice-meetup-cover-800x320.png";

/// Image-service template for stream covers; the escaped title is
/// rendered onto the base asset.
const STREAM_COVER_TEMPLATE: &str =
    "https://images.gatherbot.dev/render/g_south_west,x_40,y_40,w_700,c_fit,co_white,l_text:48_bold:";

#[derive(Debug, Error)]
pub enum CoverImageError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),
}

/// Build the cover-image URL for a gathering.
pub fn cover_image_url(kind: GatheringKind, name: &str) -> String {
    match kind {
        GatheringKind::VoiceMeetup => VOICE_MEETUP_COVER_URL.to_owned(),
        GatheringKind::Stream => {
            let title = urlencoding::encode(name);
            format!("{STREAM_COVER_TEMPLATE}{title}/base-800x320.png")
        }
    }
}

/// Fetch a cover image and encode it as a `data:` URI.
pub async fn fetch_cover_image(
    http: &reqwest::Client,
    url: &str,
) -> Result<String, CoverImageError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CoverImageError::UnexpectedStatus(status.as_u16()));
    }
    let mimetype = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("image/png")
        .to_owned();
    let bytes = response.bytes().await?;
    let encoded = fast32::base64::RFC4648.encode(&bytes);
    Ok(format!("data:{mimetype};base64,{encoded}"))
}
