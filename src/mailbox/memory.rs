//! In-memory mailbox for tests and dry runs.
//!
//! Understands the search criteria the job issues: `ALL`,
//! `SUBJECT "<text>"` (case-insensitive substring) and
//! `BEFORE <d-Mon-yyyy>`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use super::{mime, MailboxSession};
use crate::error::{StockError, Result};
use crate::model::attachment::MimePart;

/// A message held by [`MemoryMailbox`].
#[derive(Debug, Clone)]
pub struct MemoryMessage {
    pub subject: String,
    pub message_id: String,
    pub date: NaiveDate,
    pub parts: Vec<MimePart>,
    pub deleted: bool,
}

impl MemoryMessage {
    pub fn new(subject: impl Into<String>, date: NaiveDate) -> Self {
        let subject = subject.into();
        Self {
            message_id: format!("<{}@memory>", subject.replace(' ', ".")),
            subject,
            date,
            parts: Vec::new(),
            deleted: false,
        }
    }

    pub fn with_part(mut self, part: MimePart) -> Self {
        self.parts.push(part);
        self
    }

    /// Build a message from raw RFC 822 bytes.
    pub fn from_rfc822(raw: &[u8], date: NaiveDate) -> Result<Self> {
        let (subject, message_id) = mime::header_fields(raw);
        Ok(Self {
            subject: subject.unwrap_or_default(),
            message_id: message_id.unwrap_or_default(),
            date,
            parts: mime::structure_from_rfc822(raw)?,
            deleted: false,
        })
    }
}

/// Folders of messages kept in memory.
#[derive(Debug, Clone)]
pub struct MemoryMailbox {
    folders: BTreeMap<String, Vec<MemoryMessage>>,
    current: String,
    folder_support: bool,
}

impl MemoryMailbox {
    /// A mailbox with a single, empty `inbox` folder selected.
    pub fn new(inbox: &str) -> Self {
        let mut folders = BTreeMap::new();
        folders.insert(inbox.to_string(), Vec::new());
        Self {
            folders,
            current: inbox.to_string(),
            folder_support: true,
        }
    }

    /// Behave like a POP-style transport without folders.
    pub fn without_folders(mut self) -> Self {
        self.folder_support = false;
        self
    }

    pub fn with_folder(mut self, name: &str) -> Self {
        self.folders.entry(name.to_string()).or_default();
        self
    }

    /// Append a message to `folder`, creating the folder if needed.
    pub fn push(&mut self, folder: &str, message: MemoryMessage) {
        self.folders.entry(folder.to_string()).or_default().push(message);
    }

    /// Messages currently in `folder`.
    pub fn messages(&self, folder: &str) -> &[MemoryMessage] {
        self.folders.get(folder).map(Vec::as_slice).unwrap_or(&[])
    }

    fn current_messages(&self) -> &[MemoryMessage] {
        self.messages(&self.current)
    }

    fn message_mut(&mut self, index: u32) -> Result<&mut MemoryMessage> {
        let folder = self.current.clone();
        self.folders
            .get_mut(&folder)
            .and_then(|m| m.get_mut((index as usize).wrapping_sub(1)))
            .ok_or_else(|| StockError::Mailbox(format!("no message {index} in {folder}")))
    }

    fn message(&self, index: u32) -> Result<&MemoryMessage> {
        self.current_messages()
            .get((index as usize).wrapping_sub(1))
            .ok_or_else(|| StockError::Mailbox(format!("no message {index} in {}", self.current)))
    }
}

enum Criteria {
    All,
    Subject(String),
    Before(NaiveDate),
}

fn parse_criteria(criteria: &str) -> Result<Criteria> {
    let criteria = criteria.trim();
    let bad = || StockError::Mailbox(format!("unsupported search criteria: {criteria}"));
    let (key, arg) = criteria.split_once(' ').unwrap_or((criteria, ""));
    match key.to_ascii_uppercase().as_str() {
        "ALL" => Ok(Criteria::All),
        "SUBJECT" => {
            let arg = arg.trim();
            let text = arg
                .strip_prefix('"')
                .and_then(|a| a.strip_suffix('"'))
                .unwrap_or(arg);
            Ok(Criteria::Subject(text.replace("\\\"", "\"").replace("\\\\", "\\")))
        }
        "BEFORE" => NaiveDate::parse_from_str(arg.trim(), "%d-%b-%Y")
            .map(Criteria::Before)
            .map_err(|_| bad()),
        _ => Err(bad()),
    }
}

impl MailboxSession for MemoryMailbox {
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let criteria = parse_criteria(criteria)?;
        Ok(self
            .current_messages()
            .iter()
            .enumerate()
            .filter(|(_, m)| match &criteria {
                Criteria::All => true,
                Criteria::Subject(s) => m.subject.to_lowercase().contains(&s.to_lowercase()),
                Criteria::Before(d) => m.date < *d,
            })
            .map(|(i, _)| i as u32 + 1)
            .collect())
    }

    fn message_count(&mut self) -> Result<u32> {
        Ok(self.current_messages().len() as u32)
    }

    fn subject(&mut self, index: u32) -> Result<Option<String>> {
        Ok(Some(self.message(index)?.subject.clone()))
    }

    fn message_id(&mut self, index: u32) -> Result<Option<String>> {
        Ok(Some(self.message(index)?.message_id.clone()))
    }

    fn fetch_structure(&mut self, index: u32) -> Result<Vec<MimePart>> {
        Ok(self.message(index)?.parts.clone())
    }

    fn relocate(&mut self, index: u32, folder: &str) -> Result<()> {
        if !self.folder_support {
            info!(index, folder, "Attempting to move message on a mailbox without folders");
            return Ok(());
        }
        if !self.folders.contains_key(folder) {
            return Err(StockError::Mailbox(format!("[TRYCREATE] no folder {folder}")));
        }
        self.message(index)?;
        let current = self.current.clone();
        let moved = self
            .folders
            .get_mut(&current)
            .map(|m| m.remove(index as usize - 1))
            .ok_or_else(|| StockError::Mailbox(format!("no folder {current}")))?;
        self.push(folder, moved);
        self.expunge()
    }

    fn delete(&mut self, index: u32) -> Result<()> {
        self.message_mut(index)?.deleted = true;
        Ok(())
    }

    fn undelete(&mut self, index: u32) -> Result<()> {
        self.message_mut(index)?.deleted = false;
        Ok(())
    }

    fn expunge(&mut self) -> Result<()> {
        if let Some(messages) = self.folders.get_mut(&self.current) {
            messages.retain(|m| !m.deleted);
        }
        Ok(())
    }

    fn list_folders(&mut self) -> Result<Vec<String>> {
        if !self.folder_support {
            return Ok(vec![self.current.clone()]);
        }
        Ok(self.folders.keys().cloned().collect())
    }

    fn change_folder(&mut self, name: &str) -> Result<()> {
        if !self.folder_support {
            info!(folder = name, "Attempting to change folder on a mailbox without folders");
            return Ok(());
        }
        if !self.folders.contains_key(name) {
            return Err(StockError::Mailbox(format!("no folder {name}")));
        }
        self.current = name.to_string();
        Ok(())
    }

    fn current_folder(&self) -> String {
        self.current.clone()
    }

    fn supports_folders(&self) -> bool {
        self.folder_support
    }
}
