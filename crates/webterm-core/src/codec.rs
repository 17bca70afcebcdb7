//! JSON text framing for the viewer channel, plus a streaming UTF-8 decoder
//! for raw pty output.
//!
//! Wire format: one JSON object per WebSocket message, text frames preferred.
//! Binary frames carry the same JSON encoded as UTF-8.

use crate::error::TermResult;

/// Encode a serializable value into a JSON text frame.
pub fn encode<T: serde::Serialize>(value: &T) -> TermResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a JSON text frame into a typed value.
pub fn decode<T: serde::de::DeserializeOwned>(text: &str) -> TermResult<T> {
    Ok(serde_json::from_str(text)?)
}

/// Decode a binary frame holding UTF-8 JSON.
pub fn decode_bytes<T: serde::de::DeserializeOwned>(data: &[u8]) -> TermResult<T> {
    Ok(serde_json::from_slice(data)?)
}

/// Streaming UTF-8 decoder: accumulates bytes and yields complete text.
///
/// A multi-byte character split across two reads is held back until the rest
/// of it arrives. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    buffer: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed bytes into the decoder and return all text that is now complete.
    pub fn feed(&mut self, data: &[u8]) -> String {
        self.buffer.extend_from_slice(data);
        let mut out = String::with_capacity(self.buffer.len());
        let mut pos = 0;

        loop {
            match std::str::from_utf8(&self.buffer[pos..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    pos = self.buffer.len();
                    break;
                }
                Err(e) => {
                    let valid_up_to = pos + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.buffer[pos..valid_up_to]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            pos = valid_up_to + len;
                        }
                        // Incomplete sequence at the tail: wait for more bytes.
                        None => {
                            pos = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }

        self.buffer.drain(..pos);
        out
    }

    /// Flush whatever is left at end of stream. A dangling partial character
    /// becomes a single U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.buffer.is_empty() {
            return String::new();
        }
        self.buffer.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }

    /// Number of bytes held back waiting for the rest of a character.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ClientMessage, ServerMessage};

    #[test]
    fn decode_client_input() {
        let msg: ClientMessage = decode(r#"{"type":"input","data":"echo hi\r"}"#).unwrap();
        assert_eq!(msg, ClientMessage::input("echo hi\r"));
    }

    #[test]
    fn decode_binary_frame() {
        let msg: ClientMessage = decode_bytes(br#"{"type":"resize","cols":100,"rows":30}"#).unwrap();
        assert_eq!(msg, ClientMessage::resize(100, 30));
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(decode::<ClientMessage>("not json").is_err());
        assert!(decode::<ClientMessage>(r#"{"type":"bogus"}"#).is_err());
        assert!(decode::<ClientMessage>(r#"{"data":"x"}"#).is_err());
        assert!(decode::<ClientMessage>(r#"{"type":"input"}"#).is_err());
    }

    #[test]
    fn encode_output() {
        let text = encode(&ServerMessage::output("hi\r\n")).unwrap();
        assert_eq!(text, r#"{"type":"output","data":"hi\r\n"}"#);
    }

    #[test]
    fn ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.feed(b"hello"), "hello");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn split_multibyte_character() {
        // "é" is 0xC3 0xA9, "€" is 0xE2 0x82 0xAC
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.feed(&[b'a', 0xC3]), "a");
        assert_eq!(decoder.pending(), 1);
        assert_eq!(decoder.feed(&[0xA9, 0xE2]), "é");
        assert_eq!(decoder.feed(&[0x82]), "");
        assert_eq!(decoder.feed(&[0xAC, b'!']), "€!");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn one_byte_at_a_time() {
        let text = "ünïcödé ✓";
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        for b in text.as_bytes() {
            out.push_str(&decoder.feed(std::slice::from_ref(b)));
        }
        assert_eq!(out, text);
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.feed(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn finish_flushes_partial_character() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.feed(&[0xE2, 0x82]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }
}
