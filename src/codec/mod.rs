//! Attachment transfer decoding.
//!
//! [`decode`] is a pure function of its input: base64 and quoted-printable
//! are undone, 7bit payloads go through the IMAP modified UTF-7 decoder,
//! and every other encoding passes through unchanged.

pub mod utf7;

use base64::Engine;

use crate::error::{StockError, Result};
use crate::model::attachment::TransferEncoding;

/// Decode an attachment payload according to its transfer encoding.
///
/// Empty input yields empty output. Malformed base64, quoted-printable or
/// UTF-7 data is reported as [`StockError::Decode`].
pub fn decode(data: &[u8], encoding: &TransferEncoding) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    match encoding {
        TransferEncoding::Base64 => decode_base64(data),
        TransferEncoding::QuotedPrintable => {
            quoted_printable::decode(data, quoted_printable::ParseMode::Strict)
                .map_err(|e| StockError::decode(encoding, e))
        }
        TransferEncoding::SevenBit => {
            let text = std::str::from_utf8(data)
                .map_err(|e| StockError::decode(encoding, e))?;
            utf7::decode(text).map(String::into_bytes)
        }
        TransferEncoding::EightBit | TransferEncoding::Binary | TransferEncoding::Other(_) => {
            Ok(data.to_vec())
        }
    }
}

/// MIME base64 bodies are wrapped at 76 columns; line breaks are not
/// part of the alphabet.
fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    tracing::debug!(encoded_len = compact.len(), "Decoding BASE64 attachment");
    base64::engine::general_purpose::STANDARD
        .decode(&compact)
        .map_err(|e| StockError::decode(TransferEncoding::Base64, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&[u8]] = &[
        b"SKU,AVAIL QTY\r\nABC123,5\r\n",
        b"",
        b"=== equals and trailing space \r\n",
        &[0, 1, 2, 0xfe, 0xff, b'\r', b'\n', 0x80],
    ];

    #[test]
    fn test_base64_round_trip() {
        for s in SAMPLES {
            let enc = base64::engine::general_purpose::STANDARD.encode(s);
            assert_eq!(decode(enc.as_bytes(), &TransferEncoding::Base64).unwrap(), *s);
        }
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let enc = "U0tVLEFWQUlM\r\nIFFUWQ==\r\n";
        assert_eq!(
            decode(enc.as_bytes(), &TransferEncoding::Base64).unwrap(),
            b"SKU,AVAIL QTY"
        );
    }

    #[test]
    fn test_quoted_printable_round_trip() {
        for s in SAMPLES {
            let enc = quoted_printable::encode(s);
            assert_eq!(
                decode(&enc, &TransferEncoding::QuotedPrintable).unwrap(),
                *s
            );
        }
    }

    #[test]
    fn test_seven_bit_round_trip_for_text() {
        for s in ["SKU,AVAIL QTY", "Tom & Jerry", "Größe,Menge", "日本語 & more"] {
            let enc = utf7::encode(s);
            assert!(enc.is_ascii());
            assert_eq!(
                decode(enc.as_bytes(), &TransferEncoding::SevenBit).unwrap(),
                s.as_bytes()
            );
        }
    }

    #[test]
    fn test_passthrough_encodings() {
        let data = b"\x00raw\xffbytes";
        for enc in [
            TransferEncoding::EightBit,
            TransferEncoding::Binary,
            TransferEncoding::Other("x-custom".into()),
        ] {
            assert_eq!(decode(data, &enc).unwrap(), data);
        }
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        assert!(decode(b"", &TransferEncoding::Base64).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_base64_is_a_decode_error() {
        let err = decode(b"not*base64!", &TransferEncoding::Base64).unwrap_err();
        assert!(matches!(err, StockError::Decode { .. }));
    }

    #[test]
    fn test_corrupt_quoted_printable_is_a_decode_error() {
        let err = decode(b"bad =ZZ escape", &TransferEncoding::QuotedPrintable).unwrap_err();
        assert!(matches!(err, StockError::Decode { .. }));
    }
}
