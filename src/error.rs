use std::io;
use thiserror::Error;

/// Errors surfaced by the compression middleware and its response decorator.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured gzip compression level is outside the accepted 0-9
    /// range. Reported on the first request that would compress, before the
    /// downstream handler runs.
    #[error("invalid gzip compression level {0}, expected 0-9")]
    InvalidLevel(i32),

    /// The response sink cannot surrender its raw connection.
    ///
    /// This is a capability signal, not a fatal condition: callers that
    /// wanted to upgrade the protocol decide their own fallback.
    #[error("response sink does not support connection hijacking")]
    HijackUnsupported,

    /// An I/O failure while writing to the response sink.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A failure returned by a downstream handler, propagated unchanged
    /// through the middleware chain.
    #[error("{0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary handler failure for propagation through the chain.
    pub fn handler<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Handler(err.into())
    }
}
