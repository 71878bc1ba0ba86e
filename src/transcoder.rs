//! Conversion between byte strings in a named charset and Rust strings.
//!
//! Decoding replaces malformed input with U+FFFD. Encoding replaces
//! characters the target charset cannot represent with `?`, so neither
//! direction ever fails once a charset has been resolved.

use encoding_rs::{Encoding, EncoderResult};
use thiserror::Error;

/// Byte written in place of a character the target charset cannot represent.
pub const SUBSTITUTION_BYTE: u8 = b'?';

/// Character produced in place of a malformed input sequence.
pub const SUBSTITUTION_CHAR: char = char::REPLACEMENT_CHARACTER;

/// Upper bound on the scratch buffer `encode_into` fills per encoder call.
const ENCODE_CHUNK: usize = 4096;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    #[error("unsupported charset: {0}")]
    UnsupportedCharset(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoder {
    encoding: &'static Encoding,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::utf8()
    }
}

impl Transcoder {
    pub fn utf8() -> Self {
        Self {
            encoding: encoding_rs::UTF_8,
        }
    }

    /// Resolve a WHATWG charset label such as `utf-8`, `iso-8859-1` or `shift_jis`.
    ///
    /// Labels whose encoder would silently emit another charset (UTF-16 and
    /// the replacement encoding) are rejected.
    pub fn for_label(label: &str) -> Result<Self, TranscodeError> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| TranscodeError::UnsupportedCharset(label.to_string()))?;
        if encoding.output_encoding() != encoding {
            return Err(TranscodeError::UnsupportedCharset(label.to_string()));
        }
        Ok(Self { encoding })
    }

    /// Canonical name, suitable for a `charset=` parameter.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    pub fn decode(&self, src: &[u8]) -> String {
        let mut dst = String::with_capacity(src.len());
        self.decode_into(src, &mut dst);
        dst
    }

    pub fn decode_into(&self, src: &[u8], dst: &mut String) {
        let (text, _malformed) = self.encoding.decode_without_bom_handling(src);
        dst.push_str(&text);
    }

    pub fn encode(&self, src: &str) -> Vec<u8> {
        let mut dst = Vec::with_capacity(src.len());
        self.encode_into(src, &mut dst);
        dst
    }

    pub fn encode_into(&self, src: &str, dst: &mut Vec<u8>) {
        let mut encoder = self.encoding.new_encoder();
        let mut remaining = src;
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(src.len())
            .unwrap_or(ENCODE_CHUNK);
        let mut chunk = vec![0u8; needed.clamp(16, ENCODE_CHUNK)];
        loop {
            let (result, read, written) =
                encoder.encode_from_utf8_without_replacement(remaining, &mut chunk, true);
            dst.extend_from_slice(&chunk[..written]);
            remaining = &remaining[read..];
            match result {
                EncoderResult::InputEmpty => break,
                EncoderResult::OutputFull => continue,
                EncoderResult::Unmappable(_) => dst.push(SUBSTITUTION_BYTE),
            }
        }
    }

    /// Round-trip through the charset so unrepresentable characters become `?`.
    pub fn normalize(&self, src: &str) -> String {
        if self.encoding == encoding_rs::UTF_8 {
            return src.to_string();
        }
        self.decode(&self.encode(src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_labels_case_insensitively() {
        assert_eq!(Transcoder::for_label("UTF-8").unwrap().name(), "UTF-8");
        assert_eq!(
            Transcoder::for_label(" latin1 ").unwrap().name(),
            "windows-1252"
        );
        assert!(matches!(
            Transcoder::for_label("klingon"),
            Err(TranscodeError::UnsupportedCharset(_))
        ));
        assert!(Transcoder::for_label("utf-16le").is_err());
    }

    #[test]
    fn decode_substitutes_malformed_bytes() {
        let t = Transcoder::utf8();
        assert_eq!(t.decode(b"ok\xffok"), format!("ok{}ok", SUBSTITUTION_CHAR));
    }

    #[test]
    fn encode_substitutes_unmappable_chars() {
        let t = Transcoder::for_label("us-ascii").unwrap();
        // us-ascii resolves to windows-1252, which has é but no snowman
        assert_eq!(t.encode("café ☃!"), b"caf\xe9 ?!".to_vec());
        assert_eq!(t.normalize("café ☃!"), "café ?!");
    }

    #[test]
    fn multibyte_round_trip() {
        let t = Transcoder::for_label("shift_jis").unwrap();
        let bytes = t.encode("日本語");
        assert_ne!(bytes, "日本語".as_bytes());
        assert_eq!(t.decode(&bytes), "日本語");
    }

    #[test]
    fn long_unmappable_input_is_fully_substituted() {
        let t = Transcoder::for_label("iso-8859-1").unwrap();
        let src = "日".repeat(10_000);
        let bytes = t.encode(&src);
        assert_eq!(bytes.len(), 10_000);
        assert!(bytes.iter().all(|&b| b == SUBSTITUTION_BYTE));

        // chunk boundaries land mid-text without dropping or duplicating output
        let mixed = "ab日".repeat(5_000);
        assert_eq!(t.normalize(&mixed), "ab?".repeat(5_000));
    }

    #[test]
    fn appends_to_existing_output() {
        let t = Transcoder::utf8();
        let mut out = String::from("head:");
        t.decode_into("tail".as_bytes(), &mut out);
        assert_eq!(out, "head:tail");
        let mut bytes = b"x".to_vec();
        t.encode_into("y", &mut bytes);
        assert_eq!(bytes, b"xy");
    }
}
