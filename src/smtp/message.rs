//! Command lines and DATA payload for the notification mail.

use serde::Serialize;

pub const CRLF: &str = "\r\n";

/// Multipart boundary token.
pub const BOUNDARY: &str = "_frontier";

/// A file attached to the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub content: String,
    /// `Content-Transfer-Encoding` value; empty omits the header.
    pub encoding: String,
}

/// One outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

pub fn helo_command(domain: &str) -> String {
    format!("HELO {}{CRLF}", single_line(domain))
}

pub fn auth_login_command() -> String {
    format!("AUTH LOGIN{CRLF}")
}

pub fn mail_from_command(from: &str) -> String {
    format!("MAIL FROM: <{}>{CRLF}", single_line(from))
}

pub fn rcpt_to_command(to: &str) -> String {
    format!("RCPT TO: <{}>{CRLF}", single_line(to))
}

pub fn data_command() -> String {
    format!("DATA{CRLF}")
}

pub fn quit_command() -> String {
    format!("QUIT{CRLF}")
}

/// The message as sent after `DATA`, up to and including the lone `.`
/// line that ends it.
pub fn data_payload(from: &str, mail: &Notification) -> String {
    let mut out = String::new();
    out.push_str(&format!("From: <{}>{CRLF}", single_line(from)));
    out.push_str(&format!("To: <{}>{CRLF}", single_line(&mail.to)));
    out.push_str(&format!("Subject: {}{CRLF}", single_line(&mail.subject)));

    match &mail.attachment {
        Some(att) => {
            out.push_str(&format!(
                "MIME-Version: 1.0{CRLF}Content-Type: multipart/mixed; boundary={BOUNDARY}{CRLF}{CRLF}"
            ));
            out.push_str(&format!("This is a multi-part message in MIME format.{CRLF}"));
            out.push_str(&format!("--{BOUNDARY}{CRLF}{CRLF}"));
            out.push_str(&stuff(&mail.body));
            out.push_str(&format!("{CRLF}--{BOUNDARY}{CRLF}"));
            out.push_str(&format!("Content-Type: application;{CRLF}"));
            out.push_str(&format!(
                "Content-Disposition: attachment; filename={};{CRLF}",
                single_line(&att.name)
            ));
            if !att.encoding.is_empty() {
                out.push_str(&format!(
                    "Content-Transfer-Encoding: {};{CRLF}",
                    single_line(&att.encoding)
                ));
            }
            out.push_str(CRLF);
            out.push_str(&stuff(&att.content));
            out.push_str(&format!("{CRLF}--{BOUNDARY}--{CRLF}"));
        }
        None => {
            out.push_str(CRLF);
            out.push_str(&stuff(&mail.body));
            out.push_str(CRLF);
        }
    }
    out.push_str(&format!(".{CRLF}"));
    out
}

/// Drop CR and LF so a configured value cannot start a new header or
/// command line.
pub fn single_line(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

/// Normalise line endings to CRLF and double a leading `.` on any line
/// (RFC 5321 §4.5.2). A trailing newline is dropped.
pub fn stuff(text: &str) -> String {
    let text = text.strip_suffix('\n').unwrap_or(text);
    let text = text.strip_suffix('\r').unwrap_or(text);
    text.split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.starts_with('.') {
                format!(".{line}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(CRLF)
}
