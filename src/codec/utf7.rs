//! IMAP modified UTF-7 (RFC 3501 §5.1.3).
//!
//! Printable ASCII stands for itself except `&`, which is written `&-`.
//! Everything else is UTF-16BE in base64 (`,` instead of `/`, no padding)
//! between `&` and `-`.

use base64::alphabet;
use base64::engine::{general_purpose, GeneralPurpose};
use base64::Engine;

use crate::error::{StockError, Result};

const MUTF7: GeneralPurpose = GeneralPurpose::new(&alphabet::IMAP_MUTF7, general_purpose::NO_PAD);

const NAME: &str = "7BIT";

/// Decode modified UTF-7 text.
pub fn decode(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let end = after
            .find('-')
            .ok_or_else(|| StockError::decode(NAME, "unterminated shift sequence"))?;
        let chunk = &after[..end];
        if chunk.is_empty() {
            out.push('&');
        } else {
            out.push_str(&decode_shifted(chunk)?);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn decode_shifted(chunk: &str) -> Result<String> {
    let bytes = MUTF7
        .decode(chunk)
        .map_err(|e| StockError::decode(NAME, e))?;
    if bytes.len() % 2 != 0 {
        return Err(StockError::decode(NAME, "odd UTF-16 byte count"));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| StockError::decode(NAME, e))
}

/// Encode text as modified UTF-7.
pub fn encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending: Vec<u16> = Vec::new();

    for ch in input.chars() {
        if (' '..='~').contains(&ch) {
            flush(&mut out, &mut pending);
            if ch == '&' {
                out.push_str("&-");
            } else {
                out.push(ch);
            }
        } else {
            let mut buf = [0u16; 2];
            pending.extend_from_slice(ch.encode_utf16(&mut buf));
        }
    }
    flush(&mut out, &mut pending);
    out
}

fn flush(out: &mut String, pending: &mut Vec<u16>) {
    if pending.is_empty() {
        return;
    }
    let bytes: Vec<u8> = pending.iter().flat_map(|u| u.to_be_bytes()).collect();
    out.push('&');
    out.push_str(&MUTF7.encode(bytes));
    out.push('-');
    pending.clear();
}
