//! Error types for the chainmirror pipeline.

use thiserror::Error;

/// Errors that can occur while mirroring or reading blocks.
///
/// An absent block is not an error: lookups return `Ok(None)` so callers can
/// tell "doesn't exist" apart from "couldn't tell".
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Transport failure or an error payload reported by the remote source.
    #[error("Remote source error: {0}")]
    Remote(String),

    /// I/O or constraint failure in the block store.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller asked for something outside the accepted bounds.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl MirrorError {
    /// Returns `true` if the remote source failed.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Returns `true` if the block store failed.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        assert!(MirrorError::Remote("timeout".into()).is_remote());
        assert!(MirrorError::Storage("disk full".into()).is_storage());
        assert!(!MirrorError::InvalidArgument("n".into()).is_remote());
    }

    #[test]
    fn error_display() {
        let e = MirrorError::Remote("HTTP 502".into());
        assert_eq!(e.to_string(), "Remote source error: HTTP 502");
    }
}
