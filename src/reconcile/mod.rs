//! The reconciliation run.
//!
//! ```text
//! Searching -> Extracting -> HeaderValidating -> Applying -> Relocating -> NotifyingDone
//! ```
//!
//! Any stage before `NotifyingDone` may fail; the run then skips ahead to
//! relocation (error folder, if a message was selected) and always ends by
//! purging aged mail and mailing the run log.

pub mod apply;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::codec;
use crate::config::{JobConfig, MailboxConfig, SearchMode};
use crate::error::{StockError, Result};
use crate::logging::RunLog;
use crate::mailbox::{subject_criteria, MailboxSession};
use crate::model::attachment::RawAttachment;
use crate::sheet::TabularReader;
use crate::smtp::{Attachment, Notification, Notifier, SendOutcome};
use crate::store::StoreGateway;
use apply::{ApplyPolicy, RowTally};

/// Steps of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Searching,
    Extracting,
    HeaderValidating,
    Applying,
    Relocating,
    NotifyingDone,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Searching => "searching",
            Self::Extracting => "extracting",
            Self::HeaderValidating => "header validation",
            Self::Applying => "applying",
            Self::Relocating => "relocating",
            Self::NotifyingDone => "notifying",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

/// Everything a caller may want to know after a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// First stage that failed.
    pub failed_stage: Option<RunStage>,
    pub error: Option<String>,
    /// Index of the selected message in the inbox.
    pub message_index: Option<u32>,
    pub message_id: Option<String>,
    pub attachment_type: Option<String>,
    pub rows: RowTally,
    /// Folder the message was moved to.
    pub relocated_to: Option<String>,
    /// Messages deleted by the purge, if it ran.
    pub purged: Option<usize>,
    pub recipient: String,
    pub notification: SendOutcome,
}

impl RunReport {
    fn new(recipient: &str) -> Self {
        Self {
            outcome: RunOutcome::Succeeded,
            failed_stage: None,
            error: None,
            message_index: None,
            message_id: None,
            attachment_type: None,
            rows: RowTally::default(),
            relocated_to: None,
            purged: None,
            recipient: recipient.to_string(),
            notification: SendOutcome::default(),
        }
    }

    fn fail(&mut self, stage: RunStage, err: &StockError) {
        error!(stage = %stage, error = %err, "Run failed");
        if self.failed_stage.is_none() {
            self.failed_stage = Some(stage);
            self.error = Some(err.to_string());
        }
        self.outcome = RunOutcome::Failed;
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }
}

/// Where a message goes after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFolders {
    pub processed: String,
    pub error: String,
}

impl From<&MailboxConfig> for RunFolders {
    fn from(config: &MailboxConfig) -> Self {
        Self {
            processed: config.processed_folder(),
            error: config.error_folder(),
        }
    }
}

struct Selected {
    index: u32,
    attachment: RawAttachment,
}

/// One reconciliation run over borrowed collaborators.
///
/// A missing mailbox or store (connection failed during bootstrap) fails
/// the stage that needs it; the log is still mailed.
pub struct Reconciler<'a> {
    job: &'a JobConfig,
    folders: RunFolders,
    recipient: String,
    mailbox: Option<&'a mut dyn MailboxSession>,
    store: Option<&'a mut dyn StoreGateway>,
    notifier: &'a mut dyn Notifier,
    run_log: RunLog,
    today: NaiveDate,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        job: &'a JobConfig,
        folders: RunFolders,
        notifier: &'a mut dyn Notifier,
        run_log: RunLog,
    ) -> Self {
        Self {
            job,
            folders,
            recipient: String::new(),
            mailbox: None,
            store: None,
            notifier,
            run_log,
            today: chrono::Local::now().date_naive(),
        }
    }

    pub fn mailbox(mut self, mailbox: &'a mut dyn MailboxSession) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    pub fn store(mut self, store: &'a mut dyn StoreGateway) -> Self {
        self.store = Some(store);
        self
    }

    pub fn recipient(mut self, to: impl Into<String>) -> Self {
        self.recipient = to.into();
        self
    }

    /// Reference date for the purge cutoff.
    pub fn today(mut self, date: NaiveDate) -> Self {
        self.today = date;
        self
    }

    /// Execute every stage and return the report. Never fails: problems are
    /// logged and recorded in the report.
    pub fn run(mut self) -> RunReport {
        let mut report = RunReport::new(&self.recipient);

        let selected = match self.search() {
            Ok(s) => Some(s),
            Err(e) => {
                report.fail(RunStage::Searching, &e);
                None
            }
        };

        if let Some(selected) = selected {
            report.message_index = Some(selected.index);
            report.attachment_type = Some(selected.attachment.subtype.clone());
            report.message_id = self.message_id(selected.index);

            match self.process(&selected.attachment) {
                Ok(rows) => {
                    report.rows = rows;
                    info!(applied = rows.applied, skipped = rows.skipped, "Store updated");
                }
                Err((stage, rows, e)) => {
                    report.rows = rows;
                    report.fail(stage, &e);
                }
            }

            let target = if report.succeeded() {
                info!(folder = %self.folders.processed, "Moving message to processed folder");
                self.folders.processed.clone()
            } else {
                error!(folder = %self.folders.error, "Moving message to error folder");
                self.folders.error.clone()
            };
            match self.relocate(selected.index, &target) {
                Ok(()) => report.relocated_to = Some(target),
                Err(e) => report.fail(RunStage::Relocating, &e),
            }
        } else {
            info!("Message with matching subject and attachment NOT found");
        }

        report.purged = self.purge();
        report.notification = self.notify();
        report
    }

    fn search(&mut self) -> Result<Selected> {
        let job = self.job;
        let mailbox = self
            .mailbox
            .as_deref_mut()
            .ok_or_else(|| StockError::Mailbox("mailbox not connected".into()))?;

        if mailbox.message_count()? == 0 {
            return Err(StockError::Mailbox("mailbox is empty".into()));
        }
        let hits = match job.search {
            SearchMode::Server => mailbox.search(&subject_criteria(&job.subject))?,
            SearchMode::Scan => mailbox.search_subject(&job.subject)?,
        };
        info!(subject = %job.subject, hits = hits.len(), "Searched mailbox");

        for index in hits {
            match mailbox.fetch_attachment(index)? {
                Some(attachment) if !attachment.is_empty() => {
                    info!(
                        index,
                        subtype = %attachment.subtype,
                        encoding = %attachment.encoding,
                        "Found attachment"
                    );
                    return Ok(Selected { index, attachment });
                }
                _ => info!(index, "Matching message has no usable attachment"),
            }
        }
        Err(StockError::Mailbox(format!(
            "no message with subject '{}' and an attachment",
            job.subject
        )))
    }

    fn message_id(&mut self, index: u32) -> Option<String> {
        let mailbox = self.mailbox.as_deref_mut()?;
        match mailbox.message_id(index) {
            Ok(id) => {
                info!(index, message_id = ?id, "Selected message");
                id
            }
            Err(e) => {
                warn!(index, error = %e, "Cannot read Message-ID");
                None
            }
        }
    }

    /// Extracting, header validation and applying.
    fn process(
        &mut self,
        attachment: &RawAttachment,
    ) -> std::result::Result<RowTally, (RunStage, RowTally, StockError)> {
        let none = RowTally::default();

        let data = codec::decode(&attachment.data, &attachment.encoding)
            .map_err(|e| (RunStage::Extracting, none, e))?;
        let mut reader = TabularReader::open(&data, &attachment.subtype)
            .map_err(|e| (RunStage::Extracting, none, e))?;
        info!(rows = reader.row_count(), cols = reader.col_count(), "Got reader");

        if !reader.discover_header(&self.job.columns) {
            let missing = reader.columns().missing(&self.job.columns).join(", ");
            return Err((RunStage::HeaderValidating, none, StockError::Header(missing)));
        }
        info!("Got header");

        let store = self.store.as_deref_mut().ok_or_else(|| {
            (
                RunStage::Applying,
                none,
                StockError::Store("not connected to the product store".into()),
            )
        })?;
        let policy = ApplyPolicy {
            low_stock_threshold: self.job.low_stock_threshold,
            quantity_sentinel: self.job.quantity_sentinel,
        };
        let rows = apply::apply_rows(&reader, store, &policy)
            .map_err(|e| (RunStage::Applying, none, e))?;
        if !rows.all_ok() {
            return Err((
                RunStage::Applying,
                rows,
                StockError::Store(format!("{} row update(s) failed", rows.failed)),
            ));
        }
        Ok(rows)
    }

    fn relocate(&mut self, index: u32, folder: &str) -> Result<()> {
        let mailbox = self
            .mailbox
            .as_deref_mut()
            .ok_or_else(|| StockError::Mailbox("mailbox not connected".into()))?;
        mailbox.relocate(index, folder)
    }

    fn purge(&mut self) -> Option<usize> {
        if !self.job.purge {
            return None;
        }
        let mailbox = self.mailbox.as_deref_mut()?;
        let cutoff = self.today - Duration::days(self.job.purge_age_days);
        match mailbox.delete_older_than(cutoff) {
            Ok(n) => Some(n),
            Err(e) => {
                error!(before = %cutoff, error = %e, "Purge failed");
                None
            }
        }
    }

    fn notify(&mut self) -> SendOutcome {
        if self.recipient.trim().is_empty() {
            error!("No recipient for the run log: set smtp.default_recipient or pass --to");
            return SendOutcome {
                attempted: false,
                failed_steps: vec!["RCPT TO".to_string()],
            };
        }
        info!(to = %self.recipient, "Sending run log");
        // Snapshot first: lines logged while sending stay out of the attachment.
        let log = self.run_log.contents();
        let mail = Notification {
            to: self.recipient.clone(),
            subject: self.job.notify_subject.clone(),
            body: self.job.notify_body.clone(),
            attachment: Some(Attachment {
                name: format!("{}.txt", self.job.subject.replace(' ', "")),
                content: log,
                encoding: "8bit".to_string(),
            }),
        };
        self.notifier.notify(&mail)
    }
}
