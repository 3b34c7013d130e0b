//! Minimal SMTP client used to mail the run log.
//!
//! A session moves `Disconnected -> Connected -> Authenticated` and then
//! runs one `MAIL FROM / RCPT TO / DATA` transaction per [`SmtpSession::send`].
//! Replies are read until the socket's read timeout fires, so every step
//! costs at least one timeout interval against a server that keeps the
//! connection open.
//!
//! The transaction is fail-soft: an unexpected reply code is logged and
//! recorded in the [`SendOutcome`], and the next command is sent anyway.
//! Authentication is not: any unexpected code there leaves the session
//! unauthenticated and nothing is sent.

pub mod message;
pub mod reply;

use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::{debug, error, info, trace};

use crate::config::SmtpConfig;
pub use message::{Attachment, Notification};

/// Connection state of a [`SmtpSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated,
}

/// What happened to one notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    /// The transaction was attempted (session authenticated).
    pub attempted: bool,
    /// Steps whose reply was missing or unexpected.
    pub failed_steps: Vec<String>,
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        self.attempted && self.failed_steps.is_empty()
    }

    fn fail(step: &str) -> Self {
        Self {
            attempted: false,
            failed_steps: vec![step.to_string()],
        }
    }
}

/// Delivers notifications. Implemented over SMTP and by test doubles.
pub trait Notifier {
    fn notify(&mut self, mail: &Notification) -> SendOutcome;
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// One SMTP conversation. `QUIT` is sent when the session is dropped.
pub struct SmtpSession {
    host: String,
    port: u16,
    helo_domain: String,
    user: String,
    password: String,
    timeout: Duration,
    conn: Option<Connection>,
    authenticated: bool,
}

impl std::fmt::Debug for SmtpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSession")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("state", &self.state())
            .finish()
    }
}

impl SmtpSession {
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            helo_domain: config.helo_domain.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            conn: None,
            authenticated: false,
        }
    }

    /// Override the reply read timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        match (&self.conn, self.authenticated) {
            (None, _) => SessionState::Disconnected,
            (Some(_), false) => SessionState::Connected,
            (Some(_), true) => SessionState::Authenticated,
        }
    }

    /// Open the stream and greet the server. Does nothing when already
    /// connected. Failures are logged and leave the session disconnected.
    pub fn connect(&mut self) -> bool {
        if self.conn.is_some() {
            return true;
        }
        let stream = match TcpStream::connect((self.host.as_str(), self.port)) {
            Ok(s) => s,
            Err(e) => {
                error!(host = %self.host, port = self.port, error = %e, "SMTP connect failed");
                return false;
            }
        };
        let writer = match stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|()| stream.try_clone())
        {
            Ok(w) => w,
            Err(e) => {
                error!(error = %e, "SMTP socket setup failed");
                return false;
            }
        };
        self.conn = Some(Connection {
            reader: BufReader::new(stream),
            writer,
        });
        debug!(host = %self.host, port = self.port, "SMTP connected");

        if !self.command("HELO", &message::helo_command(&self.helo_domain), &[220, 250]) {
            error!("SMTP greeting not accepted. Quitting...");
            self.close();
            return false;
        }
        true
    }

    /// Log in with `AUTH LOGIN`. Connects first if needed.
    pub fn authorize(&mut self) -> bool {
        if !self.connect() {
            return false;
        }
        if self.authenticated {
            return true;
        }
        if !self.command("AUTH LOGIN", &message::auth_login_command(), &[334]) {
            return false;
        }
        let user = STANDARD.encode(&self.user);
        trace!(encoded = %user, "Encoded user");
        if !self.command("USER", &format!("{user}{}", message::CRLF), &[334]) {
            return false;
        }
        let pass = STANDARD.encode(&self.password);
        trace!(encoded = %pass, "Encoded pass");
        if !self.command("PASSWORD", &format!("{pass}{}", message::CRLF), &[235]) {
            return false;
        }
        self.authenticated = true;
        info!(user = %self.user, "SMTP authenticated");
        true
    }

    /// Deliver one mail. Requires (and if needed performs) authentication.
    pub fn send(&mut self, mail: &Notification) -> SendOutcome {
        if !self.authorize() {
            return SendOutcome::fail("AUTH");
        }
        let mut outcome = SendOutcome {
            attempted: true,
            failed_steps: Vec::new(),
        };
        let from = self.user.clone();
        let steps = [
            ("MAIL FROM", message::mail_from_command(&from), 250),
            ("RCPT TO", message::rcpt_to_command(&mail.to), 250),
            ("DATA", message::data_command(), 354),
            ("Mail sent", message::data_payload(&from, mail), 250),
        ];
        for (step, line, code) in steps {
            if !self.command(step, &line, &[code]) {
                outcome.failed_steps.push(step.to_string());
            }
            if self.conn.is_none() {
                break;
            }
        }
        if outcome.failed_steps.is_empty() {
            info!(to = %mail.to, subject = %mail.subject, "Notification sent");
        } else {
            error!(to = %mail.to, failed = ?outcome.failed_steps, "Notification not accepted");
        }
        outcome
    }

    /// Write `line`, read the replies and check them against `expected`.
    /// A write error drops the connection.
    fn command(&mut self, step: &str, line: &str, expected: &[u16]) -> bool {
        let Some(conn) = self.conn.as_mut() else {
            error!(step, "SMTP not connected");
            return false;
        };
        let written = conn
            .writer
            .write_all(line.as_bytes())
            .and_then(|()| conn.writer.flush());
        if let Err(e) = written {
            error!(step, error = %e, "SMTP write failed");
            self.conn = None;
            self.authenticated = false;
            return false;
        }
        let replies = reply::read_replies(&mut conn.reader);
        reply::verify(step, &replies, expected)
    }

    fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.writer.write_all(message::quit_command().as_bytes()) {
                debug!(error = %e, "SMTP QUIT not written");
            }
            // Best effort; the peer may already be gone.
            let _ = conn.writer.shutdown(Shutdown::Both);
        }
        self.authenticated = false;
    }
}

impl Drop for SmtpSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens a fresh [`SmtpSession`] per notification.
#[derive(Debug, Clone)]
pub struct SmtpSender {
    config: SmtpConfig,
    timeout: Option<Duration>,
}

impl SmtpSender {
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Notifier for SmtpSender {
    fn notify(&mut self, mail: &Notification) -> SendOutcome {
        let mut session = SmtpSession::new(&self.config);
        if let Some(timeout) = self.timeout {
            session = session.with_timeout(timeout);
        }
        session.send(mail)
    }
}
