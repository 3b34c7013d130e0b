//! Structure extraction from raw RFC 822 messages.

use mail_parser::{MessageParser, MimeHeaders, PartType};

use crate::error::{StockError, Result};
use crate::model::attachment::{MimePart, TransferEncoding};

/// Top-level parts of a multipart message, bodies left transfer-encoded.
///
/// A message whose root is not multipart has no parts.
pub fn structure_from_rfc822(raw: &[u8]) -> Result<Vec<MimePart>> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| StockError::Mailbox("cannot parse message structure".into()))?;

    let Some(root) = message.parts.first() else {
        return Ok(Vec::new());
    };
    let children = match &root.body {
        PartType::Multipart(ids) => ids.clone(),
        _ => return Ok(Vec::new()),
    };

    let mut parts = Vec::with_capacity(children.len());
    for id in children {
        let Some(part) = message.parts.get(id as usize) else {
            continue;
        };
        let start = part.raw_body_offset() as usize;
        let end = (part.raw_end_offset() as usize).min(raw.len());
        parts.push(MimePart {
            subtype: part
                .content_type()
                .and_then(|ct| ct.subtype())
                .map(|s| s.to_ascii_uppercase()),
            disposition: part.content_disposition().map(|d| d.ctype().to_string()),
            encoding: TransferEncoding::from_header(part.content_transfer_encoding()),
            body: raw.get(start..end).unwrap_or_default().to_vec(),
        });
    }
    Ok(parts)
}

/// Subject and Message-ID of a raw message (or bare header block).
pub fn header_fields(raw: &[u8]) -> (Option<String>, Option<String>) {
    match MessageParser::default().parse(raw) {
        Some(message) => (
            message.subject().map(String::from),
            message.message_id().map(String::from),
        ),
        None => (None, None),
    }
}
