//! Pending image attachment handling for picture-assisted questions.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::debug;

/// One encoded image, ready to travel inline as a data URI.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub data_uri: String,
    pub mime: &'static str,
}

impl EncodedImage {
    fn new(bytes: &[u8], mime: &'static str) -> Self {
        Self {
            data_uri: format!("data:{mime};base64,{}", BASE64.encode(bytes)),
            mime,
        }
    }
}

/// Owns at most one pending image. Selecting a new one replaces the previous;
/// the pending slot is cleared on submission or explicit removal.
#[derive(Debug, Default)]
pub struct AttachmentManager {
    pending: Option<EncodedImage>,
}

impl AttachmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept image-typed input only. Non-image bytes are ignored without a
    /// user-facing error; returns whether the attachment was accepted.
    pub fn select(&mut self, bytes: &[u8]) -> bool {
        let Some(mime) = sniff_image_mime(bytes) else {
            debug!("ignoring non-image attachment ({} bytes)", bytes.len());
            return false;
        };
        self.pending = Some(EncodedImage::new(bytes, mime));
        true
    }

    /// Idempotent removal of any pending attachment.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&EncodedImage> {
        self.pending.as_ref()
    }

    /// Hand the pending image to the composer, leaving the slot empty.
    pub fn take(&mut self) -> Option<EncodedImage> {
        self.pending.take()
    }
}

/// Identify an image format from its magic bytes.
fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}
