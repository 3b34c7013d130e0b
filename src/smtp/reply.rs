//! Server reply lines and their verification.
//!
//! A reply line is `<code><sep><text>` where `<sep>` is a space or, on
//! continuation lines, a hyphen. Lines without a leading number get code 0.

use std::io::{self, BufRead};

use tracing::{debug, error, warn};

/// One reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let digits = line.bytes().take_while(u8::is_ascii_digit).count();
        let code = line[..digits].parse().unwrap_or(0);
        let text = line[digits..]
            .strip_prefix([' ', '-'])
            .unwrap_or(&line[digits..])
            .to_string();
        Self { code, text }
    }
}

/// Read reply lines until the peer goes quiet or closes the stream.
///
/// There is no end-of-reply marker: the loop ends on EOF or when the read
/// timeout set on the underlying socket expires.
pub fn read_replies<R: BufRead>(reader: &mut R) -> Vec<Reply> {
    let mut replies = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => replies.push(Reply::parse(&line)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                // Keep a line cut off by the timeout.
                if !line.is_empty() {
                    replies.push(Reply::parse(&line));
                }
                break;
            }
            Err(e) => {
                warn!(error = %e, "Reading SMTP reply failed");
                break;
            }
        }
    }
    replies
}

/// `true` when at least one line arrived and every line carries an
/// expected code. Each unexpected line is logged as an error.
pub fn verify(step: &str, replies: &[Reply], expected: &[u16]) -> bool {
    if replies.is_empty() {
        error!(step, "No reply to SMTP command");
        return false;
    }
    let mut ok = true;
    for reply in replies {
        if !expected.contains(&reply.code) {
            error!(step, code = reply.code, text = %reply.text, "Error on SMTP command");
            ok = false;
        }
        debug!(step, code = reply.code, text = %reply.text, "SMTP reply");
    }
    ok
}
