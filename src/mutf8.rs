//! Modified UTF-8, the string encoding of Java's `DataOutput::writeUTF`.
//!
//! It differs from standard UTF-8 in two ways: NUL is written as the two
//! bytes `C0 80`, and characters outside the Basic Multilingual Plane are
//! written as two three-byte surrogate halves instead of one four-byte
//! sequence.

use std::borrow::Cow;

use bstr::ByteSlice;

use crate::error::{Error, Result};

/// Encode a string as modified UTF-8
pub(crate) fn encode(s: &str) -> Cow<'_, [u8]> {
    // Without NUL and four-byte sequences both encodings agree
    if s.bytes().all(|b| b != 0 && b < 0xF0) {
        return Cow::Borrowed(s.as_bytes());
    }
    let mut out = Vec::with_capacity(s.len() + 4);
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    Cow::Owned(out)
}

/// Decode modified UTF-8 bytes
pub(crate) fn decode(bytes: &[u8]) -> Result<String> {
    // Four-byte sequences are valid UTF-8 but never valid modified UTF-8
    if bytes.iter().all(|&b| b < 0xF0) {
        if let Ok(s) = bytes.to_str() {
            return Ok(s.to_owned());
        }
    }
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b >> 4 {
            0x0..=0x7 => {
                units.push(u16::from(b));
                i += 1;
            }
            0xC | 0xD => {
                let b2 = continuation(bytes, i + 1)?;
                units.push((u16::from(b & 0x1F) << 6) | b2);
                i += 2;
            }
            0xE => {
                let b2 = continuation(bytes, i + 1)?;
                let b3 = continuation(bytes, i + 2)?;
                units.push((u16::from(b & 0x0F) << 12) | (b2 << 6) | b3);
                i += 3;
            }
            _ => {
                return Err(Error::format(format!(
                    "malformed modified UTF-8 at byte {}",
                    i
                )))
            }
        }
    }
    String::from_utf16(&units).map_err(|_| Error::format("string contains an unpaired surrogate"))
}

fn continuation(bytes: &[u8], i: usize) -> Result<u16> {
    match bytes.get(i) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
        _ => Err(Error::format(format!(
            "malformed modified UTF-8 at byte {}",
            i
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_unchanged() {
        let encoded = encode("prev=the");
        assert!(matches!(encoded, Cow::Borrowed(_)));
        assert_eq!(&*encoded, b"prev=the");
        assert_eq!(encode("héllo").as_ref(), "héllo".as_bytes());
    }

    #[test]
    fn test_nul_and_supplementary() {
        assert_eq!(encode("a\0b").as_ref(), &[b'a', 0xC0, 0x80, b'b']);
        assert_eq!(
            encode("\u{1D11E}").as_ref(),
            &[0xED, 0xA0, 0xB4, 0xED, 0xB4, 0x9E]
        );
        assert_eq!(decode(&[b'a', 0xC0, 0x80, b'b']).unwrap(), "a\0b");
        assert_eq!(
            decode(&[0xED, 0xA0, 0xB4, 0xED, 0xB4, 0x9E]).unwrap(),
            "\u{1D11E}"
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode(&[0xC0]).is_err());
        assert!(decode(&[0xFF, 0x80]).is_err());
        // standard four-byte form of U+1F600
        assert!(decode("\u{1F600}".as_bytes()).is_err());
        // lone high surrogate
        assert!(decode(&[0xED, 0xA0, 0xB4]).is_err());
    }

    #[test]
    fn test_round_trip() {
        for s in ["", "word=Straße", "x\0y", "emoji=\u{1F600}", "日本語"] {
            assert_eq!(decode(&encode(s)).unwrap(), s);
        }
    }
}
