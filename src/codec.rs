use crate::error::Error;
use compression_codecs::{EncodeV2, gzip::GzipEncoder};
use compression_core::Level;
use compression_core::util::{PartialBuffer, WriteBuffer};
use std::io;

/// The `Content-Encoding` / `Accept-Encoding` token this middleware
/// negotiates.
pub(crate) const GZIP_SCHEME: &str = "gzip";

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

/// Maps a user-facing compression level to the codec's level type.
///
/// Levels 0-9 follow the deflate scale; anything else is rejected up front
/// rather than silently clamped.
pub(crate) fn encoder_level(level: Option<i32>) -> Result<Level, Error> {
    match level {
        None => Ok(Level::Default),
        Some(n) if (0..=9).contains(&n) => Ok(Level::Precise(n)),
        Some(n) => Err(Error::InvalidLevel(n)),
    }
}

/// Incremental gzip encoder driven buffer-to-buffer.
///
/// Compressed output is appended to a caller-provided buffer so the caller
/// stays in charge of where (and whether) it is forwarded.
pub(crate) struct GzipStream {
    encoder: GzipEncoder,
    output_buffer: Vec<u8>,
}

impl GzipStream {
    pub(crate) fn new(level: Level) -> Self {
        Self {
            encoder: GzipEncoder::new(level.into()),
            output_buffer: vec![0u8; OUTPUT_BUFFER_SIZE],
        }
    }

    /// Encodes all of `input`, appending compressed bytes to `out`.
    pub(crate) fn write(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        let mut input_buf = PartialBuffer::new(input);

        // Keep encoding until all input is consumed
        loop {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());

            self.encoder
                .encode(&mut input_buf, &mut output)
                .map_err(io::Error::other)?;

            let written = output.written_len();
            if written > 0 {
                out.extend_from_slice(&self.output_buffer[..written]);
            }

            if input_buf.written_len() >= input.len() {
                break;
            }

            // Safety check to prevent infinite loop
            if written == 0 && input_buf.written_len() == 0 {
                break;
            }
        }

        Ok(())
    }

    /// Drives the encoder to a deflate block boundary so everything written
    /// so far can be decoded by the receiver, appending the output to `out`.
    pub(crate) fn flush(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        loop {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());

            let done = self.encoder.flush(&mut output).map_err(io::Error::other)?;

            let written = output.written_len();
            if written > 0 {
                out.extend_from_slice(&self.output_buffer[..written]);
            }

            if done {
                break;
            }
        }

        Ok(())
    }

    /// Finalizes the stream, appending the remaining compressed bytes and
    /// the gzip trailer (checksum and length) to `out`.
    pub(crate) fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        loop {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());

            let done = self.encoder.finish(&mut output).map_err(io::Error::other)?;

            let written = output.written_len();
            if written > 0 {
                out.extend_from_slice(&self.output_buffer[..written]);
            }

            if done {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(data)
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_level_default() {
        assert!(matches!(encoder_level(None), Ok(Level::Default)));
    }

    #[test]
    fn test_level_in_range() {
        assert!(matches!(encoder_level(Some(0)), Ok(Level::Precise(0))));
        assert!(matches!(encoder_level(Some(9)), Ok(Level::Precise(9))));
    }

    #[test]
    fn test_level_out_of_range() {
        assert!(matches!(
            encoder_level(Some(-3)),
            Err(Error::InvalidLevel(-3))
        ));
        assert!(matches!(
            encoder_level(Some(10)),
            Err(Error::InvalidLevel(10))
        ));
    }

    #[test]
    fn test_output_is_gzip_framed() {
        let mut stream = GzipStream::new(Level::Default);
        let mut out = Vec::new();
        stream.write(b"hello world", &mut out).unwrap();
        stream.finish(&mut out).unwrap();

        // Gzip magic plus the deflate method byte
        assert_eq!(&out[..3], &[0x1f, 0x8b, 0x08]);
        assert_eq!(gunzip(&out), b"hello world");
    }

    #[test]
    fn test_flush_then_finish_decodes() {
        let mut stream = GzipStream::new(Level::Precise(6));
        let mut out = Vec::new();
        stream.write(b"first ", &mut out).unwrap();
        stream.flush(&mut out).unwrap();
        let after_flush = out.len();
        stream.write(b"second", &mut out).unwrap();
        stream.finish(&mut out).unwrap();

        assert!(after_flush > 0);
        assert!(out.len() > after_flush);
        assert_eq!(gunzip(&out), b"first second");
    }
}
