use crate::error::Error;
use http::{HeaderMap, StatusCode};
use std::io::{self, Read, Write};

/// A raw bidirectional stream surrendered by [`ResponseSink::hijack`].
///
/// Once a connection is hijacked the response abstraction is out of the
/// picture and the caller speaks the wire protocol directly (e.g. for a
/// websocket upgrade).
pub trait Connection: Read + Write {}

impl<T: Read + Write> Connection for T {}

/// The response side of a single in-flight request, as provided by the host
/// server.
///
/// This is the narrow contract the middleware consumes: header access, a
/// status-line write, raw body writes, and a running count of body bytes.
/// Incremental flushing and connection hijacking are optional capabilities
/// modeled as default methods — a sink that lacks them keeps the safe
/// defaults (no-op flush, [`Error::HijackUnsupported`]).
pub trait ResponseSink {
    /// The response headers.
    fn headers(&self) -> &HeaderMap;

    /// Mutable access to the response headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Writes the status line and commits the header block.
    fn write_status(&mut self, status: StatusCode) -> io::Result<()>;

    /// Writes body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Total body bytes written through this sink so far.
    fn bytes_written(&self) -> u64;

    /// Pushes buffered bytes out to the client.
    ///
    /// Sinks without incremental flushing keep this as a no-op.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Surrenders the raw connection, bypassing the response abstraction.
    ///
    /// Sinks that cannot hand over their transport report
    /// [`Error::HijackUnsupported`].
    fn hijack(&mut self) -> Result<Box<dyn Connection + Send>, Error> {
        Err(Error::HijackUnsupported)
    }
}

impl<'a, T: ResponseSink + ?Sized> ResponseSink for &'a mut T {
    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) -> io::Result<()> {
        (**self).write_status(status)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn bytes_written(&self) -> u64 {
        (**self).bytes_written()
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn hijack(&mut self) -> Result<Box<dyn Connection + Send>, Error> {
        (**self).hijack()
    }
}
