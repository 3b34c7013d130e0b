//! Mailbox access: the session trait used by the reconciliation run and
//! its IMAP and in-memory implementations.
//!
//! Message indexes are 1-based sequence numbers scoped to the current
//! folder; they shift after an expunge.

pub mod imap;
pub mod memory;
pub mod mime;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::attachment::{MimePart, RawAttachment};

/// One connection to a mailbox, exclusively owned for a run.
///
/// All calls block for the duration of the server round trip.
pub trait MailboxSession {
    /// Server-side search; returns matching indexes in ascending order.
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>>;

    /// Number of messages in the current folder.
    fn message_count(&mut self) -> Result<u32>;

    /// Decoded `Subject:` of a message.
    fn subject(&mut self, index: u32) -> Result<Option<String>>;

    /// `Message-ID:` of a message.
    fn message_id(&mut self, index: u32) -> Result<Option<String>>;

    /// Top-level MIME parts of a message. Non-multipart messages have none.
    fn fetch_structure(&mut self, index: u32) -> Result<Vec<MimePart>>;

    /// Move a message to `folder` and expunge it from the current one.
    ///
    /// On a transport without folders this only logs the intent.
    fn relocate(&mut self, index: u32, folder: &str) -> Result<()>;

    /// Flag a message for deletion.
    fn delete(&mut self, index: u32) -> Result<()>;

    /// Clear the deletion flag.
    fn undelete(&mut self, index: u32) -> Result<()>;

    /// Remove flagged messages from the current folder.
    fn expunge(&mut self) -> Result<()>;

    /// Every folder name on the server.
    fn list_folders(&mut self) -> Result<Vec<String>>;

    fn change_folder(&mut self, name: &str) -> Result<()>;

    fn current_folder(&self) -> String;

    /// `false` for POP-style transports: relocation and folder changes are
    /// logged no-ops there.
    fn supports_folders(&self) -> bool {
        true
    }

    /// First attachment of a message, still transfer-encoded.
    fn fetch_attachment(&mut self, index: u32) -> Result<Option<RawAttachment>> {
        let parts = self.fetch_structure(index)?;
        debug!(index, parts = parts.len(), "Fetched message structure");
        Ok(RawAttachment::from_parts(&parts))
    }

    /// Exact subject match by walking every message header.
    ///
    /// Slower than [`search`](Self::search) but independent of server-side
    /// SEARCH support.
    fn search_subject(&mut self, subject: &str) -> Result<Vec<u32>> {
        let count = self.message_count()?;
        let mut found = Vec::new();
        for index in 1..=count {
            if self.subject(index)?.as_deref() == Some(subject) {
                found.push(index);
            }
        }
        Ok(found)
    }

    /// Delete every message dated before `date`, in every folder, then
    /// return to the folder that was current on entry.
    ///
    /// Per-folder failures are logged and skipped. Returns the number of
    /// messages deleted.
    fn delete_older_than(&mut self, date: NaiveDate) -> Result<usize> {
        let original = self.current_folder();
        let folders = if self.supports_folders() {
            self.list_folders()?
        } else {
            vec![original.clone()]
        };

        let criteria = before_criteria(date);
        let mut deleted = 0;
        for folder in &folders {
            if let Err(e) = self.change_folder(folder) {
                warn!(folder = %folder, error = %e, "Cannot open folder for purge");
                continue;
            }
            let old = match self.search(&criteria) {
                Ok(old) => old,
                Err(e) => {
                    warn!(folder = %folder, error = %e, "Purge search failed");
                    continue;
                }
            };
            if old.is_empty() {
                continue;
            }
            for &index in &old {
                debug!(folder = %folder, index, "Deleting message");
                self.delete(index)?;
            }
            debug!(folder = %folder, "Expunging messages");
            self.expunge()?;
            deleted += old.len();
        }
        self.change_folder(&original)?;
        info!(deleted, before = %date, "Purged aged messages");
        Ok(deleted)
    }
}

/// `SUBJECT "<text>"` search criteria.
pub fn subject_criteria(subject: &str) -> String {
    format!(
        "SUBJECT \"{}\"",
        subject.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

/// `BEFORE <d-Mon-yyyy>` search criteria.
pub fn before_criteria(date: NaiveDate) -> String {
    format!("BEFORE {}", date.format("%-d-%b-%Y"))
}
