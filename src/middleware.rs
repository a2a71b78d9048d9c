use crate::codec::GZIP_SCHEME;
use crate::context::Context;
use crate::error::Error;
use crate::sink::ResponseSink;
use crate::writer::GzipResponseWriter;
use http::{HeaderValue, header};
use log::{debug, trace};
use std::fmt;
use std::sync::Arc;

/// Decides per request whether the middleware should be bypassed entirely.
///
/// A predicate returning `true` leaves the request and response completely
/// untouched, including the `Vary` header.
pub type SkipPredicate = Arc<dyn Fn(&Context<'_>) -> bool + Send + Sync>;

/// Gzip response compression middleware.
///
/// Wraps the next handler in the chain and, when the client's
/// `Accept-Encoding` header carries the literal `gzip` token, swaps the
/// active response sink for a [`GzipResponseWriter`] for the duration of
/// the request. Configuration is immutable once built and may be shared
/// across concurrently handled requests.
#[derive(Clone)]
pub struct Compression {
    skip: SkipPredicate,
    level: Option<i32>,
}

impl Compression {
    /// Creates the middleware with default settings: never skip, codec
    /// default compression level.
    pub fn new() -> Self {
        Self {
            skip: Arc::new(|_| false),
            level: None,
        }
    }

    /// Sets the gzip compression level (0-9).
    ///
    /// An out-of-range level is reported as [`Error::InvalidLevel`] on the
    /// first request that would compress, never silently clamped.
    pub fn level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    /// Installs a predicate that bypasses the middleware for matching
    /// requests.
    pub fn skip_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Context<'_>) -> bool + Send + Sync + 'static,
    {
        self.skip = Arc::new(predicate);
        self
    }

    /// Runs the middleware around `next` for a single request.
    ///
    /// When compression engages, `next` observes a context whose active
    /// sink compresses everything it writes. After `next` returns — with
    /// or without an error — the response is reverted to its untouched
    /// state if no body bytes were written, and the gzip stream is closed
    /// in all cases. `next`'s result is propagated unchanged.
    pub fn handle<F>(&self, ctx: &mut Context<'_>, next: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context<'_>) -> Result<(), Error>,
    {
        if (self.skip)(ctx) {
            return next(ctx);
        }

        // Caches must key on Accept-Encoding whether or not this particular
        // response ends up compressed.
        ctx.response().headers_mut().append(
            header::VARY,
            HeaderValue::from_static("Accept-Encoding"),
        );

        let accepts_gzip = ctx
            .request()
            .headers
            .get(header::ACCEPT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains(GZIP_SCHEME));
        if !accepts_gzip {
            return next(ctx);
        }

        // Optimistic: reverted below if the body stays empty.
        ctx.response().headers_mut().insert(
            header::CONTENT_ENCODING,
            HeaderValue::from_static(GZIP_SCHEME),
        );

        let request = ctx.request();
        let mut writer = GzipResponseWriter::new(ctx.response(), self.level)?;
        trace!("gzip compression engaged");

        let result = {
            let mut compressed = Context::new(request, &mut writer);
            next(&mut compressed)
        };

        if writer.bytes_written() == 0 {
            // Nothing reached the body, possibly because the handler
            // errored out: the client must not see an encoding header with
            // no gzip payload behind it.
            let headers = writer.headers_mut();
            if headers
                .get(header::CONTENT_ENCODING)
                .is_some_and(|value| value.as_bytes() == GZIP_SCHEME.as_bytes())
            {
                headers.remove(header::CONTENT_ENCODING);
            }
            writer.discard();
            trace!("reverted gzip compression, response body is empty");
        }

        if let Err(err) = writer.close() {
            debug!("closing gzip stream failed: {err}");
        }

        result
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compression")
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}
