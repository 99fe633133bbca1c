// ledgerline-core/src/core/media.rs
// ============================================================================
// Module: Ledgerline Media Sniffing
// Description: Best-effort media type detection for stored payloads.
// Purpose: Label payload reads with a content type without trusting callers.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Reads return raw content-store bytes; the media type is guessed from magic
//! bytes. When no signature matches, a leading `{` is taken as JSON, and
//! anything else is reported as unknown.

// ============================================================================
// SECTION: Signatures
// ============================================================================

/// Media type reported for payloads that look like JSON objects.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Magic-byte signatures checked in order.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"BZh", "application/x-bzip2"),
    (b"\xfd7zXZ\x00", "application/x-xz"),
    (b"\x28\xb5\x2f\xfd", "application/zstd"),
    (b"\x00asm", "application/wasm"),
    (b"OggS", "audio/ogg"),
    (b"fLaC", "audio/flac"),
    (b"ID3", "audio/mpeg"),
    (b"\x1aE\xdf\xa3", "video/webm"),
    (b"BM", "image/bmp"),
];

// ============================================================================
// SECTION: Detection
// ============================================================================

/// Guesses the media type of a payload.
#[must_use]
pub fn guess_media_type(bytes: &[u8]) -> Option<&'static str> {
    if let Some((_, media_type)) =
        SIGNATURES.iter().find(|(signature, _)| bytes.starts_with(signature))
    {
        return Some(media_type);
    }
    if is_riff(bytes, b"WEBP") {
        return Some("image/webp");
    }
    if is_riff(bytes, b"WAVE") {
        return Some("audio/wav");
    }
    if bytes.first() == Some(&b'{') {
        return Some(JSON_MEDIA_TYPE);
    }
    None
}

/// Returns true for a RIFF container carrying the given form type.
fn is_riff(bytes: &[u8], form: &[u8; 4]) -> bool {
    bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == form
}
