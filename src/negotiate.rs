use thiserror::Error;

/// Source formats the encoder knows how to read. Conversion only ever targets
/// ogg/vorbis; anything outside this set is served as-is or not at all.
pub const TRANSCODABLE_FORMATS: [&str; 5] = ["mp3", "ogg", "flac", "m4a", "wav"];

/// The single conversion target.
pub const TRANSCODE_TARGET: &str = "ogg";

/// Outcome of negotiating a track's stored format against the formats a
/// client is willing to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The stored file is already acceptable; redirect to it unmodified.
    Passthrough,
    /// Convert to ogg/vorbis on the fly.
    TranscodeToOgg,
    /// Neither passthrough nor conversion can satisfy the request.
    Unsupported,
}

#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("filename has no recognizable format extension: {0}")]
    UnrecognizedFilename(String),
}

/// Derive a track's stored format from its catalog filename.
///
/// The format is the text after the last `.`, lowercased. Catalog rows are
/// expected to always carry an extension; a name without one is a
/// data-integrity problem, not a client error.
pub fn stored_format(filename: &str) -> Result<String, NegotiationError> {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Ok(ext.to_ascii_lowercase()),
        _ => Err(NegotiationError::UnrecognizedFilename(filename.to_string())),
    }
}

/// Split a client's comma-separated format list into tokens.
///
/// Tokens are kept verbatim; empty segments match nothing and are harmless.
pub fn parse_wanted_formats(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}

/// Decide how to satisfy a playback request.
///
/// Passthrough is checked first, so a track already stored in a wanted format
/// is never transcoded even when ogg is also in the list.
pub fn negotiate(actual_format: &str, wanted_formats: &[String]) -> Verdict {
    if wanted_formats.iter().any(|w| w == actual_format) {
        return Verdict::Passthrough;
    }
    if TRANSCODABLE_FORMATS.contains(&actual_format)
        && wanted_formats.iter().any(|w| w == TRANSCODE_TARGET)
    {
        return Verdict::TranscodeToOgg;
    }
    Verdict::Unsupported
}
