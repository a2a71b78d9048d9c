use crate::codec::{GzipStream, encoder_level};
use crate::error::Error;
use crate::sink::{Connection, ResponseSink};
use crate::sniff::detect_content_type;
use http::{HeaderValue, StatusCode, header};
use log::debug;
use std::io;

/// Response sink decorator that pipes body writes through a gzip encoder
/// into the wrapped sink.
///
/// The decorator exposes the full [`ResponseSink`] interface and is
/// substitutable anywhere the wrapped sink was used. Header access and
/// status writes delegate to the wrapped sink; body writes are compressed
/// first. Dropping the decorator finalizes the stream and makes the
/// wrapped sink the active one again.
pub struct GzipResponseWriter<S: ResponseSink> {
    inner: S,
    stream: GzipStream,
    scratch: Vec<u8>,
    bytes_in: u64,
    discarded: bool,
    closed: bool,
}

impl<S: ResponseSink> GzipResponseWriter<S> {
    /// Wraps `inner` with a gzip encoder at the given level.
    ///
    /// `None` selects the codec's default level. Levels outside 0-9 are
    /// rejected with [`Error::InvalidLevel`].
    pub fn new(inner: S, level: Option<i32>) -> Result<Self, Error> {
        let level = encoder_level(level)?;
        Ok(Self {
            inner,
            stream: GzipStream::new(level),
            scratch: Vec::new(),
            bytes_in: 0,
            discarded: false,
            closed: false,
        })
    }

    /// Abandons buffered compressed state so the eventual close emits
    /// nothing into the wrapped sink.
    ///
    /// Used when no body bytes were ever written and the response is being
    /// restored to its untouched state.
    pub fn discard(&mut self) {
        self.discarded = true;
    }

    /// Finalizes the gzip stream, writing the trailer to the wrapped sink
    /// unless the stream was discarded. Safe to call more than once; only
    /// the first call does work.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.scratch.clear();
        self.stream.finish(&mut self.scratch)?;
        if !self.discarded {
            self.forward_scratch()?;
        }
        Ok(())
    }

    /// Writes everything accumulated in the scratch buffer to the wrapped
    /// sink.
    fn forward_scratch(&mut self) -> io::Result<()> {
        let mut offset = 0;
        while offset < self.scratch.len() {
            let n = self.inner.write(&self.scratch[offset..])?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            offset += n;
        }
        Ok(())
    }
}

impl<S: ResponseSink> ResponseSink for GzipResponseWriter<S> {
    fn headers(&self) -> &http::HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut http::HeaderMap {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) -> io::Result<()> {
        if status == StatusCode::NO_CONTENT {
            // A no-content response must not claim an encoding it carries
            // no payload for.
            self.inner.headers_mut().remove(header::CONTENT_ENCODING);
        }
        // Compressed length is unknown ahead of time and changes with
        // flushes.
        self.inner.headers_mut().remove(header::CONTENT_LENGTH);
        self.inner.write_status(status)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.inner.headers().contains_key(header::CONTENT_TYPE) {
            let content_type = detect_content_type(buf);
            self.inner
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }

        self.scratch.clear();
        self.stream.write(buf, &mut self.scratch)?;
        self.forward_scratch()?;
        self.bytes_in += buf.len() as u64;
        Ok(buf.len())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_in
    }

    fn flush(&mut self) -> io::Result<()> {
        self.scratch.clear();
        self.stream.flush(&mut self.scratch)?;
        self.forward_scratch()?;
        self.inner.flush()
    }

    fn hijack(&mut self) -> Result<Box<dyn Connection + Send>, Error> {
        self.inner.hijack()
    }
}

impl<S: ResponseSink> Drop for GzipResponseWriter<S> {
    fn drop(&mut self) {
        if !self.closed
            && let Err(err) = self.close()
        {
            debug!("closing gzip stream during drop failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::recorder::Recorder;
    use std::io::Read;

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(data)
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_write_sniffs_content_type() {
        let mut rec = Recorder::new();
        let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
        writer.write(b"<html><body>hi</body></html>").unwrap();
        writer.close().unwrap();
        drop(writer);
        assert_eq!(
            rec.headers.get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn test_write_keeps_preset_content_type() {
        let mut rec = Recorder::new();
        rec.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
        writer.write(b"{}").unwrap();
        writer.close().unwrap();
        drop(writer);
        assert_eq!(
            rec.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_body_round_trips() {
        let mut rec = Recorder::new();
        let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
        writer.write(b"hello ").unwrap();
        writer.write(b"world").unwrap();
        writer.close().unwrap();
        drop(writer);
        assert_eq!(gunzip(&rec.body_bytes()), b"hello world");
    }

    #[test]
    fn test_bytes_written_counts_input_not_output() {
        let mut rec = Recorder::new();
        let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
        let payload = vec![b'a'; 4096];
        writer.write(&payload).unwrap();
        assert_eq!(writer.bytes_written(), 4096);
        writer.close().unwrap();
        drop(writer);
        // Highly repetitive input compresses well below its raw size
        assert!(rec.body_bytes().len() < 4096);
    }

    #[test]
    fn test_no_content_status_strips_encoding() {
        let mut rec = Recorder::new();
        rec.headers
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        rec.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from_static("123"));
        let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
        writer.write_status(StatusCode::NO_CONTENT).unwrap();
        writer.discard();
        writer.close().unwrap();
        drop(writer);
        assert!(rec.headers.get(header::CONTENT_ENCODING).is_none());
        assert!(rec.headers.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(rec.status, Some(StatusCode::NO_CONTENT));
    }

    #[test]
    fn test_status_write_removes_content_length() {
        let mut rec = Recorder::new();
        rec.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
        writer.write_status(StatusCode::OK).unwrap();
        writer.close().unwrap();
        drop(writer);
        assert!(rec.headers.get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_discarded_close_emits_nothing() {
        let mut rec = Recorder::new();
        let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
        writer.discard();
        writer.close().unwrap();
        drop(writer);
        assert!(rec.body_bytes().is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut rec = Recorder::new();
        let body = rec.body.clone();
        let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
        writer.write(b"once").unwrap();
        writer.close().unwrap();
        let len = body.borrow().len();
        writer.close().unwrap();
        assert_eq!(body.borrow().len(), len);
    }

    #[test]
    fn test_drop_finalizes_stream() {
        let mut rec = Recorder::new();
        {
            let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
            writer.write(b"dropped").unwrap();
        }
        assert_eq!(gunzip(&rec.body_bytes()), b"dropped");
    }

    #[test]
    fn test_flush_reaches_inner_sink() {
        let mut rec = Recorder::new();
        let flushed = rec.flushed.clone();
        let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
        writer.write(b"stream me").unwrap();
        writer.flush().unwrap();
        assert!(flushed.get());
        writer.close().unwrap();
    }

    #[test]
    fn test_hijack_delegates() {
        let mut rec = Recorder::new();
        rec.hijackable = true;
        let mut writer = GzipResponseWriter::new(&mut rec, None).unwrap();
        assert!(writer.hijack().is_ok());
        writer.discard();
        writer.close().unwrap();
    }

    #[test]
    fn test_invalid_level_rejected() {
        let mut rec = Recorder::new();
        let result = GzipResponseWriter::new(&mut rec, Some(99));
        assert!(matches!(result, Err(Error::InvalidLevel(99))));
    }
}
