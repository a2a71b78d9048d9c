//! Gzip response compression middleware for blocking HTTP handler chains.
//!
//! The middleware wraps the next handler in a chain and, when the client's
//! `Accept-Encoding` header carries the `gzip` token, swaps the active
//! response sink for a decorator that compresses everything the handler
//! writes before it reaches the network.
//!
//! # Example
//!
//! ```ignore
//! use gzip_middleware::{Compression, Context};
//!
//! let compression = Compression::new().level(6);
//!
//! // Per request, with `parts` the request head and `sink` the server's
//! // response writer:
//! let mut ctx = Context::new(&parts, &mut sink);
//! compression.handle(&mut ctx, |ctx| handler(ctx))?;
//! ```
//!
//! # Behavior
//!
//! When compression engages:
//! - `Content-Encoding: gzip` is set, and removed again if the handler
//!   never writes a body byte
//! - `Content-Length` is removed once the status is written (the
//!   compressed size is unknown ahead of time)
//! - `Content-Type` is sniffed from the first written bytes if the handler
//!   did not set one
//! - `Vary: Accept-Encoding` is appended, preserving prior values
//! - flushing the response forces a deflate block boundary so streamed
//!   responses stay incrementally decodable
//!
//! The middleware is bypassed entirely — no headers touched — when the
//! configured skip predicate matches the request.

#![deny(missing_docs)]

mod codec;
mod context;
mod error;
mod middleware;
mod sink;
mod sniff;
mod writer;

pub use context::Context;
pub use error::Error;
pub use middleware::{Compression, SkipPredicate};
pub use sink::{Connection, ResponseSink};
pub use sniff::detect_content_type;
pub use writer::GzipResponseWriter;
