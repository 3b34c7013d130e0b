//! IMAP mailbox over the synchronous `imap` crate.

use std::io::{Read, Write};
use std::net::TcpStream;

use tracing::{debug, error, info};

use super::{mime, MailboxSession};
use crate::config::{MailboxConfig, Security};
use crate::error::{StockError, Result};
use crate::model::attachment::MimePart;

/// Plain TCP or TLS, erased so one session type serves both.
pub trait ImapStream: Read + Write + Send {}

impl<T: Read + Write + Send> ImapStream for T {}

type Session = ::imap::Session<Box<dyn ImapStream>>;

/// A logged-in IMAP session with one folder selected.
pub struct ImapMailbox {
    session: Session,
    current: String,
    folders: bool,
}

impl std::fmt::Debug for ImapMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapMailbox")
            .field("current", &self.current)
            .field("folders", &self.folders)
            .finish()
    }
}

impl ImapMailbox {
    /// Connect, log in and select the configured inbox.
    pub fn connect(config: &MailboxConfig) -> Result<Self> {
        info!(
            user = %config.user,
            server = %config.connection_string(),
            "Connecting to mailbox"
        );
        let tcp = TcpStream::connect((config.host.as_str(), config.port))
            .map_err(|e| StockError::Mailbox(format!("connect {}: {e}", config.host)))?;

        let stream: Box<dyn ImapStream> = match config.security {
            Security::Plain => Box::new(tcp),
            Security::Tls => {
                let mut builder = native_tls::TlsConnector::builder();
                if config.novalidate_cert() {
                    builder.danger_accept_invalid_certs(true);
                }
                let connector = builder
                    .build()
                    .map_err(|e| StockError::Mailbox(format!("TLS connector: {e}")))?;
                let tls = connector
                    .connect(&config.host, tcp)
                    .map_err(|e| StockError::Mailbox(format!("TLS handshake: {e}")))?;
                Box::new(tls)
            }
        };

        let mut client = ::imap::Client::new(stream);
        client.read_greeting()?;
        let mut session = client
            .login(&config.user, &config.password)
            .map_err(|(e, _)| StockError::Mailbox(format!("login failed: {e}")))?;
        let selected = session.select(&config.inbox)?;
        info!(
            service = %config.service,
            folder = %config.inbox,
            exists = selected.exists,
            "Mailbox connect success"
        );

        Ok(Self {
            session,
            current: config.inbox.clone(),
            folders: config.folders,
        })
    }

    fn fetch_one(&mut self, index: u32, query: &str) -> Result<Option<Vec<u8>>> {
        let fetches = self.session.fetch(index.to_string(), query)?;
        Ok(fetches
            .iter()
            .next()
            .and_then(|f| f.body().or_else(|| f.header()))
            .map(<[u8]>::to_vec))
    }
}

impl MailboxSession for ImapMailbox {
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let mut found: Vec<u32> = self.session.search(criteria)?.into_iter().collect();
        found.sort_unstable();
        debug!(criteria, hits = found.len(), "Search");
        Ok(found)
    }

    fn message_count(&mut self) -> Result<u32> {
        Ok(self.session.select(&self.current)?.exists)
    }

    fn subject(&mut self, index: u32) -> Result<Option<String>> {
        let header = self.fetch_one(index, "RFC822.HEADER")?;
        Ok(header.and_then(|h| mime::header_fields(&h).0))
    }

    fn message_id(&mut self, index: u32) -> Result<Option<String>> {
        let header = self.fetch_one(index, "RFC822.HEADER")?;
        Ok(header.and_then(|h| mime::header_fields(&h).1))
    }

    fn fetch_structure(&mut self, index: u32) -> Result<Vec<MimePart>> {
        match self.fetch_one(index, "RFC822")? {
            Some(raw) => mime::structure_from_rfc822(&raw),
            None => Ok(Vec::new()),
        }
    }

    fn relocate(&mut self, index: u32, folder: &str) -> Result<()> {
        if !self.folders {
            info!(index, folder, "Attempting to move message on a server without folders");
            return Ok(());
        }
        let seq = index.to_string();
        if let Err(e) = self.session.copy(&seq, folder) {
            error!(index, folder, error = %e, "Move failed");
            return Err(e.into());
        }
        self.session.store(&seq, "+FLAGS (\\Deleted)")?;
        self.expunge()
    }

    fn delete(&mut self, index: u32) -> Result<()> {
        debug!(folder = %self.current, index, "Deleting message");
        self.session.store(index.to_string(), "+FLAGS (\\Deleted)")?;
        Ok(())
    }

    fn undelete(&mut self, index: u32) -> Result<()> {
        self.session.store(index.to_string(), "-FLAGS (\\Deleted)")?;
        Ok(())
    }

    fn expunge(&mut self) -> Result<()> {
        debug!(folder = %self.current, "Expunging messages");
        self.session.expunge()?;
        Ok(())
    }

    fn list_folders(&mut self) -> Result<Vec<String>> {
        if !self.folders {
            return Ok(vec![self.current.clone()]);
        }
        let names = self.session.list(Some(""), Some("*"))?;
        Ok(names.iter().map(|n| n.name().to_string()).collect())
    }

    fn change_folder(&mut self, name: &str) -> Result<()> {
        if !self.folders {
            info!(folder = name, "Attempting to change folder on a server without folders");
            return Ok(());
        }
        self.session.select(name)?;
        self.current = name.to_string();
        Ok(())
    }

    fn current_folder(&self) -> String {
        self.current.clone()
    }

    fn supports_folders(&self) -> bool {
        self.folders
    }
}

impl Drop for ImapMailbox {
    fn drop(&mut self) {
        if let Err(e) = self.session.logout() {
            debug!(error = %e, "IMAP logout failed");
        }
    }
}
