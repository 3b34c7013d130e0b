//! Attachment and MIME part types.
//!
//! A [`RawAttachment`] holds the payload exactly as transferred; decoding
//! happens later in [`crate::codec`].

use std::fmt;

/// `Content-Transfer-Encoding` of a MIME part.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    /// Anything else the sender put in the header.
    Other(String),
}

impl TransferEncoding {
    /// Parse a header value. Missing or blank values mean 7bit (RFC 2045).
    pub fn from_header(value: Option<&str>) -> Self {
        let value = value.unwrap_or("").trim().trim_end_matches(';');
        match value.to_ascii_lowercase().as_str() {
            "" | "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::Other(value.to_string()),
        }
    }

    /// The canonical upper-case name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::SevenBit => "7BIT",
            Self::EightBit => "8BIT",
            Self::Binary => "BINARY",
            Self::Base64 => "BASE64",
            Self::QuotedPrintable => "QUOTED-PRINTABLE",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One top-level part of a message's structure tree.
#[derive(Debug, Clone)]
pub struct MimePart {
    /// Upper-cased content subtype (`VND.MS-EXCEL`, `PLAIN`, ...).
    pub subtype: Option<String>,
    /// Disposition type as sent (`attachment`, `inline`), if any.
    pub disposition: Option<String>,
    pub encoding: TransferEncoding,
    /// Body bytes still in their transfer encoding.
    pub body: Vec<u8>,
}

impl MimePart {
    /// A part is an attachment when it has a subtype and an
    /// `ATTACHMENT` disposition (case-insensitive).
    pub fn is_attachment(&self) -> bool {
        self.subtype.is_some()
            && self
                .disposition
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case("attachment"))
    }
}

/// An attachment payload as found in the mailbox, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttachment {
    pub data: Vec<u8>,
    pub encoding: TransferEncoding,
    /// Upper-cased content subtype, used to pick a spreadsheet reader.
    pub subtype: String,
}

impl RawAttachment {
    /// Take the first attachment part of a structure tree.
    pub fn from_parts(parts: &[MimePart]) -> Option<Self> {
        let part = parts.iter().find(|p| p.is_attachment())?;
        Some(Self {
            data: part.body.clone(),
            encoding: part.encoding.clone(),
            subtype: part.subtype.clone().unwrap_or_default(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|b| b.is_ascii_whitespace())
    }
}
