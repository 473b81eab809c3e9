//! Errors reported by the engine.
//!
//! Collaborators fail with `anyhow::Error`; the engine flattens those into
//! messages so reports stay `Clone` and can travel through channels.

use std::fmt;

/// Which favorites backend an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Catalog lookup could not complete.  Recovered as "no match".
    #[error("catalog lookup for {track_id} failed: {message}")]
    Lookup { track_id: String, message: String },

    #[error("reading favorites from {backend} backend failed: {message}")]
    BackendRead { backend: BackendKind, message: String },

    #[error("writing favorites to {backend} backend failed: {message}")]
    BackendWrite { backend: BackendKind, message: String },

    /// User or playlist resolution failed for the supplied credential.
    #[error("identity resolution failed: {0}")]
    Identity(String),

    #[error("channel {channel} source failed: {message}")]
    ChannelSource { channel: String, message: String },
}

impl EngineError {
    pub fn lookup(track_id: &str, err: &anyhow::Error) -> Self {
        Self::Lookup {
            track_id: track_id.to_string(),
            message: format!("{:#}", err),
        }
    }

    pub fn backend_read(backend: BackendKind, err: &anyhow::Error) -> Self {
        Self::BackendRead {
            backend,
            message: format!("{:#}", err),
        }
    }

    pub fn backend_write(backend: BackendKind, err: &anyhow::Error) -> Self {
        Self::BackendWrite {
            backend,
            message: format!("{:#}", err),
        }
    }

    pub fn identity(err: &anyhow::Error) -> Self {
        Self::Identity(format!("{:#}", err))
    }

    pub fn channel_source(channel: &str, err: &anyhow::Error) -> Self {
        Self::ChannelSource {
            channel: channel.to_string(),
            message: format!("{:#}", err),
        }
    }
}
