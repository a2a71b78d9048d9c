//! Content-type detection from a body prefix.
//!
//! The decorator sets `Content-Type` lazily from the first bytes a handler
//! writes, using an ordered signature table: the first rule that matches
//! wins, data that matches nothing but contains no control bytes is plain
//! text, and everything else is an opaque octet stream.

/// How many leading bytes are considered when sniffing.
const SNIFF_LEN: usize = 512;

/// Fallback for data that matches no signature and looks binary.
const OCTET_STREAM: &str = "application/octet-stream";

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Whitespace that may precede textual signatures such as HTML tags.
const WHITESPACE: &[u8] = b"\t\n\x0c\r ";

/// Infers a MIME type from the leading bytes of `data`.
///
/// At most the first 512 bytes are consulted. Always returns a valid MIME
/// type, falling back to `application/octet-stream` when nothing matches.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let first_non_ws = data
        .iter()
        .position(|b| !WHITESPACE.contains(b))
        .unwrap_or(data.len());

    for rule in RULES {
        if let Some(content_type) = rule.matches(data, first_non_ws) {
            return content_type;
        }
    }

    OCTET_STREAM
}

enum Rule {
    /// Exact byte prefix.
    Exact {
        prefix: &'static [u8],
        content_type: &'static str,
    },
    /// Byte prefix compared under a mask, optionally after leading
    /// whitespace.
    Masked {
        mask: &'static [u8],
        pattern: &'static [u8],
        skip_ws: bool,
        content_type: &'static str,
    },
    /// Case-insensitive HTML tag opener terminated by a space or `>`.
    Html { tag: &'static [u8] },
    /// ISO BMFF `ftyp` box carrying an mp4 brand.
    Mp4,
    /// Data free of control bytes is plain text.
    Text,
}

impl Rule {
    fn matches(&self, data: &[u8], first_non_ws: usize) -> Option<&'static str> {
        match self {
            Rule::Exact {
                prefix,
                content_type,
            } => data.starts_with(prefix).then_some(*content_type),

            Rule::Masked {
                mask,
                pattern,
                skip_ws,
                content_type,
            } => {
                let data = if *skip_ws { &data[first_non_ws..] } else { data };
                if data.len() < pattern.len() {
                    return None;
                }
                mask.iter()
                    .zip(pattern.iter())
                    .zip(data.iter())
                    .all(|((m, p), b)| b & m == *p)
                    .then_some(*content_type)
            }

            Rule::Html { tag } => {
                let data = &data[first_non_ws..];
                if data.len() <= tag.len() {
                    return None;
                }
                for (expected, b) in tag.iter().zip(data.iter()) {
                    let b = if expected.is_ascii_uppercase() {
                        b & 0xDF
                    } else {
                        *b
                    };
                    if b != *expected {
                        return None;
                    }
                }
                // Tag must be terminated, e.g. "<html " or "<html>"
                matches!(data[tag.len()], b' ' | b'>').then_some("text/html; charset=utf-8")
            }

            Rule::Mp4 => {
                if data.len() < 12 {
                    return None;
                }
                let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
                if data.len() < box_size || box_size % 4 != 0 || &data[4..8] != b"ftyp" {
                    return None;
                }
                let mut offset = 8;
                while offset + 3 <= box_size {
                    // Bytes 12..16 hold the minor version, not a brand
                    if offset != 12 && &data[offset..offset + 3] == b"mp4" {
                        return Some("video/mp4");
                    }
                    offset += 4;
                }
                None
            }

            Rule::Text => data[first_non_ws..]
                .iter()
                .all(|b| !is_binary_byte(*b))
                .then_some(PLAIN_TEXT),
        }
    }
}

/// Control bytes that never appear in plain text.
fn is_binary_byte(b: u8) -> bool {
    b <= 0x08 || b == 0x0B || (0x0E..=0x1A).contains(&b) || (0x1C..=0x1F).contains(&b)
}

const MS_FONT_MASK: [u8; 36] = {
    let mut mask = [0u8; 36];
    mask[34] = 0xFF;
    mask[35] = 0xFF;
    mask
};

const MS_FONT_PATTERN: [u8; 36] = {
    let mut pattern = [0u8; 36];
    pattern[34] = b'L';
    pattern[35] = b'P';
    pattern
};

/// Signature table, ordered by priority.
static RULES: &[Rule] = &[
    Rule::Html { tag: b"<!DOCTYPE HTML" },
    Rule::Html { tag: b"<HTML" },
    Rule::Html { tag: b"<HEAD" },
    Rule::Html { tag: b"<SCRIPT" },
    Rule::Html { tag: b"<IFRAME" },
    Rule::Html { tag: b"<H1" },
    Rule::Html { tag: b"<DIV" },
    Rule::Html { tag: b"<FONT" },
    Rule::Html { tag: b"<TABLE" },
    Rule::Html { tag: b"<A" },
    Rule::Html { tag: b"<STYLE" },
    Rule::Html { tag: b"<TITLE" },
    Rule::Html { tag: b"<B" },
    Rule::Html { tag: b"<BODY" },
    Rule::Html { tag: b"<BR" },
    Rule::Html { tag: b"<P" },
    Rule::Html { tag: b"<!--" },
    Rule::Masked {
        mask: b"\xFF\xFF\xFF\xFF\xFF",
        pattern: b"<?xml",
        skip_ws: true,
        content_type: "text/xml; charset=utf-8",
    },
    Rule::Exact {
        prefix: b"%PDF-",
        content_type: "application/pdf",
    },
    Rule::Exact {
        prefix: b"%!PS-Adobe-",
        content_type: "application/postscript",
    },
    // UTF byte-order marks
    Rule::Masked {
        mask: b"\xFF\xFF\x00\x00",
        pattern: b"\xFE\xFF\x00\x00",
        skip_ws: false,
        content_type: "text/plain; charset=utf-16be",
    },
    Rule::Masked {
        mask: b"\xFF\xFF\x00\x00",
        pattern: b"\xFF\xFE\x00\x00",
        skip_ws: false,
        content_type: "text/plain; charset=utf-16le",
    },
    Rule::Masked {
        mask: b"\xFF\xFF\xFF\x00",
        pattern: b"\xEF\xBB\xBF\x00",
        skip_ws: false,
        content_type: "text/plain; charset=utf-8",
    },
    // Images
    Rule::Exact {
        prefix: b"\x00\x00\x01\x00",
        content_type: "image/x-icon",
    },
    Rule::Exact {
        prefix: b"\x00\x00\x02\x00",
        content_type: "image/x-icon",
    },
    Rule::Exact {
        prefix: b"BM",
        content_type: "image/bmp",
    },
    Rule::Exact {
        prefix: b"GIF87a",
        content_type: "image/gif",
    },
    Rule::Exact {
        prefix: b"GIF89a",
        content_type: "image/gif",
    },
    Rule::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WEBPVP",
        skip_ws: false,
        content_type: "image/webp",
    },
    Rule::Exact {
        prefix: b"\x89PNG\x0D\x0A\x1A\x0A",
        content_type: "image/png",
    },
    Rule::Exact {
        prefix: b"\xFF\xD8\xFF",
        content_type: "image/jpeg",
    },
    // Audio and video
    Rule::Exact {
        prefix: b".snd",
        content_type: "audio/basic",
    },
    Rule::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"FORM\x00\x00\x00\x00AIFF",
        skip_ws: false,
        content_type: "audio/aiff",
    },
    Rule::Exact {
        prefix: b"ID3",
        content_type: "audio/mpeg",
    },
    Rule::Exact {
        prefix: b"OggS\x00",
        content_type: "application/ogg",
    },
    Rule::Exact {
        prefix: b"MThd\x00\x00\x00\x06",
        content_type: "audio/midi",
    },
    Rule::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00AVI ",
        skip_ws: false,
        content_type: "video/avi",
    },
    Rule::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WAVE",
        skip_ws: false,
        content_type: "audio/wave",
    },
    Rule::Mp4,
    Rule::Exact {
        prefix: b"\x1A\x45\xDF\xA3",
        content_type: "video/webm",
    },
    // Fonts
    Rule::Masked {
        mask: &MS_FONT_MASK,
        pattern: &MS_FONT_PATTERN,
        skip_ws: false,
        content_type: "application/vnd.ms-fontobject",
    },
    Rule::Exact {
        prefix: b"\x00\x01\x00\x00",
        content_type: "font/ttf",
    },
    Rule::Exact {
        prefix: b"OTTO",
        content_type: "font/otf",
    },
    Rule::Exact {
        prefix: b"ttcf",
        content_type: "font/collection",
    },
    Rule::Exact {
        prefix: b"wOFF",
        content_type: "font/woff",
    },
    Rule::Exact {
        prefix: b"wOF2",
        content_type: "font/woff2",
    },
    // Archives
    Rule::Exact {
        prefix: b"\x1F\x8B\x08",
        content_type: "application/x-gzip",
    },
    Rule::Exact {
        prefix: b"PK\x03\x04",
        content_type: "application/zip",
    },
    Rule::Exact {
        prefix: b"Rar!\x1A\x07\x00",
        content_type: "application/x-rar-compressed",
    },
    Rule::Exact {
        prefix: b"Rar!\x1A\x07\x01\x00",
        content_type: "application/x-rar-compressed",
    },
    Rule::Exact {
        prefix: b"\x00\x61\x73\x6D",
        content_type: "application/wasm",
    },
    Rule::Text,
];
