//! Signature verification for the inbound webhook trust boundary.
//!
//! Three independent schemes guard the gateway, one per upstream source:
//!
//! * **Code host** (`/webhooks/github`):
//!   `X-Hub-Signature: sha1={hex}` where the digest is
//!   `HMAC-SHA1(raw_body, secret)`.
//!
//! * **Transport relay** (`/webhooks/platform-relay`, first check):
//!   `HMAC-SHA256(raw_body, relay_secret)` base64-encoded, carried in
//!   either `X-Relay-Signature` or `X-Relay-Signature-2`. Two headers so
//!   the relay secret can rotate without dropping deliveries.
//!
//! * **Streaming platform origin** (`/webhooks/platform-relay`, second
//!   check): `sha256={hex}` over `message_id + timestamp + raw_body`
//!   with the platform secret, compared in constant time because this
//!   signature is replayable if it leaks.
//!
//! Every scheme signs the raw, unparsed request bytes. Re-serializing a
//! decoded JSON body does not reproduce them byte-for-byte, so callers
//! must verify before parsing.

/// Header carrying the code-host HMAC-SHA1 signature.
pub const CODE_HOST_SIGNATURE_HEADER: &str = "x-hub-signature";

/// Primary header for the transport-relay signature.
pub const RELAY_SIGNATURE_HEADER: &str = "x-relay-signature";

/// Secondary relay header, populated while the relay secret rotates.
pub const RELAY_SIGNATURE_ALT_HEADER: &str = "x-relay-signature-2";

/// Header carrying the streaming platform's own signature.
pub const ORIGIN_SIGNATURE_HEADER: &str = "x-eventsub-message-signature";

/// Header carrying the origin message id (part of the signed material).
pub const ORIGIN_MESSAGE_ID_HEADER: &str = "x-eventsub-message-id";

/// Header carrying the origin message timestamp (part of the signed material).
pub const ORIGIN_TIMESTAMP_HEADER: &str = "x-eventsub-message-timestamp";

/// Errors produced by signature verification.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("invalid signature")]
    SignatureMismatch,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// Verify a code-host webhook signature.
///
/// Expects `header` in the form `sha1={hex_digest}` where the digest is
/// `HMAC-SHA1(raw_body, secret)`. An ordinary compare is acceptable here;
/// the digest is delivery-scoped and not replayable against other routes.
pub fn verify_code_host_signature(
    secret: &[u8],
    raw_body: &[u8],
    header: Option<&str>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader(CODE_HOST_SIGNATURE_HEADER))?;
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
    let digest = ring::hmac::sign(&key, raw_body);
    let expected = format!("sha1={}", hex::encode(digest.as_ref()));
    if header == expected {
        Ok(())
    } else {
        Err(SignatureError::SignatureMismatch)
    }
}

/// Verify the transport-relay signature.
///
/// Computes `HMAC-SHA256(raw_body, secret)` base64-encoded and accepts a
/// match against either rotating header value.
pub fn verify_relay_signature(
    secret: &[u8],
    raw_body: &[u8],
    primary: Option<&str>,
    secondary: Option<&str>,
) -> Result<(), SignatureError> {
    if primary.is_none() && secondary.is_none() {
        return Err(SignatureError::MissingHeader(RELAY_SIGNATURE_HEADER));
    }
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
    let digest = ring::hmac::sign(&key, raw_body);
    let expected = fast32::base64::RFC4648.encode(digest.as_ref());
    if primary == Some(expected.as_str()) || secondary == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(SignatureError::SignatureMismatch)
    }
}

/// Verify the streaming platform's origin signature.
///
/// The signed material is `{message_id}{timestamp}{raw_body}` and the
/// header carries `sha256={hex_digest}`. Compared in constant time.
pub fn verify_origin_signature(
    secret: &[u8],
    message_id: &str,
    timestamp: &str,
    raw_body: &[u8],
    header: Option<&str>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader(ORIGIN_SIGNATURE_HEADER))?;
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
    let mut ctx = ring::hmac::Context::with_key(&key);
    ctx.update(message_id.as_bytes());
    ctx.update(timestamp.as_bytes());
    ctx.update(raw_body);
    let digest = ctx.sign();
    let expected = format!("sha256={}", hex::encode(digest.as_ref()));
    ring::constant_time::verify_slices_are_equal(expected.as_bytes(), header.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256_hex(secret: &[u8], material: &[u8]) -> String {
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
        hex::encode(ring::hmac::sign(&key, material).as_ref())
    }

    #[test]
    fn code_host_signature_accepts_valid_digest() {
        let secret = b"gh-secret";
        let body = br#"{"action":"closed","pull_request":{"merged":true}}"#;
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
        let header = format!("sha1={}", hex::encode(ring::hmac::sign(&key, body).as_ref()));
        assert!(verify_code_host_signature(secret, body, Some(&header)).is_ok());
    }

    #[test]
    fn code_host_signature_rejects_tampered_body() {
        let secret = b"gh-secret";
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
        let header = format!(
            "sha1={}",
            hex::encode(ring::hmac::sign(&key, b"original").as_ref())
        );
        assert!(verify_code_host_signature(secret, b"tampered", Some(&header)).is_err());
        assert!(verify_code_host_signature(secret, b"original", None).is_err());
    }

    #[test]
    fn relay_signature_accepts_either_header() {
        let secret = b"relay-secret";
        let body = b"payload";
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
        let sig = fast32::base64::RFC4648.encode(ring::hmac::sign(&key, body).as_ref());
        assert!(verify_relay_signature(secret, body, Some(&sig), None).is_ok());
        assert!(verify_relay_signature(secret, body, Some("stale"), Some(&sig)).is_ok());
        assert!(verify_relay_signature(secret, body, Some("stale"), Some("worse")).is_err());
        assert!(verify_relay_signature(secret, body, None, None).is_err());
    }

    #[test]
    fn origin_signature_signs_id_timestamp_and_body() {
        let secret = b"platform-secret";
        let body = b"{\"event\":{}}";
        let material = [b"msg-1".as_slice(), b"2024-01-01T00:00:00Z".as_slice(), body].concat();
        let header = format!("sha256={}", sha256_hex(secret, &material));
        assert!(
            verify_origin_signature(
                secret,
                "msg-1",
                "2024-01-01T00:00:00Z",
                body,
                Some(&header)
            )
            .is_ok()
        );
        // Same body under a different message id must not verify.
        assert!(
            verify_origin_signature(
                secret,
                "msg-2",
                "2024-01-01T00:00:00Z",
                body,
                Some(&header)
            )
            .is_err()
        );
    }
}
