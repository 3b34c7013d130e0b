//! End-to-end runs against an in-memory mailbox, an in-memory SQLite
//! catalogue and a recording notifier.

use chrono::NaiveDate;

use stocksync::config::{JobConfig, MailboxConfig, SearchMode};
use stocksync::error::{Result, StockError};
use stocksync::logging::RunLog;
use stocksync::mailbox::memory::{MemoryMailbox, MemoryMessage};
use stocksync::reconcile::{Reconciler, RunFolders, RunOutcome, RunReport, RunStage};
use stocksync::smtp::{Notification, Notifier, SendOutcome};
use stocksync::store::sqlite::SqliteStore;
use stocksync::store::{StockUpdate, StoreGateway};

const INBOX: &str = "INBOX";
const PROCESSED: &str = "INBOX.Processed";
const ERROR: &str = "INBOX.Error";

/// "SKU,AVAIL QTY\r\nABC123,5\r\n"
const QTY_5: &str = "U0tVLEFWQUlMIFFUWQ0KQUJDMTIzLDUNCg==";
/// "SKU,AVAIL QTY\r\nABC123,25\r\n"
const QTY_25: &str = "U0tVLEFWQUlMIFFUWQ0KQUJDMTIzLDI1DQo=";
/// "SKU,QTY\r\nABC123,5\r\n"
const NO_QTY_COLUMN: &str = "U0tVLFFUWQ0KQUJDMTIzLDUNCg==";
/// "SKU,AVAIL QTY\r\nABC123,5\r\nDEF456,25\r\nGHI789,3\r\n"
const THREE_ROWS: &str = "U0tVLEFWQUlMIFFUWQ0KQUJDMTIzLDUNCkRFRjQ1NiwyNQ0KR0hJNzg5LDMNCg==";
/// Banner row, header in row 3 starting at column 2, mixed data rows.
const BANNER: &str = "U3RvY2sgcG9zaXRpb24gMjAyNi0xMC0wMQ0KLCwNCixTS1UsQVZBSUwgUVRZDQosQUJDMTIzLDUNCixERUY0NTYsMTANCiwsbi9hDQosR0hJNzg5LG9vcHMNCg==";

#[derive(Default)]
struct Outbox(Vec<Notification>);

impl Notifier for Outbox {
    fn notify(&mut self, mail: &Notification) -> SendOutcome {
        self.0.push(mail.clone());
        SendOutcome {
            attempted: true,
            failed_steps: Vec::new(),
        }
    }
}

/// Catalogue that refuses updates for one model.
struct Refusing {
    inner: SqliteStore,
    model: &'static str,
}

impl StoreGateway for Refusing {
    fn update_stock(&mut self, update: &StockUpdate) -> Result<usize> {
        if update.sku == self.model {
            return Err(StockError::Store(format!("lock wait timeout on {}", update.sku)));
        }
        self.inner.update_stock(update)
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn days_ago(n: i64) -> NaiveDate {
    today() - chrono::Duration::days(n)
}

fn stock_mail(subject: &str, encoding: &str, body: &str) -> Vec<u8> {
    format!(
        "From: feed@supplier.example\r\n\
         To: stock@shop.example\r\n\
         Subject: {subject}\r\n\
         Message-ID: <feed-1@supplier.example>\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"BOUNDARY\"\r\n\
         \r\n\
         --BOUNDARY\r\n\
         Content-Type: text/plain\r\n\
         \r\n\
         Stock position attached.\r\n\
         --BOUNDARY\r\n\
         Content-Type: text/csv; name=\"stock.csv\"\r\n\
         Content-Disposition: attachment; filename=\"stock.csv\"\r\n\
         Content-Transfer-Encoding: {encoding}\r\n\
         \r\n\
         {body}\r\n\
         --BOUNDARY--\r\n"
    )
    .into_bytes()
}

fn message(subject: &str, b64: &str) -> MemoryMessage {
    MemoryMessage::from_rfc822(&stock_mail(subject, "base64", b64), today()).unwrap()
}

fn plain_message(subject: &str, date: NaiveDate) -> MemoryMessage {
    let raw = format!("Subject: {subject}\r\nContent-Type: text/plain\r\n\r\nhello\r\n");
    MemoryMessage::from_rfc822(raw.as_bytes(), date).unwrap()
}

fn mailbox_with(messages: Vec<MemoryMessage>) -> MemoryMailbox {
    let mut mailbox = MemoryMailbox::new(INBOX)
        .with_folder(PROCESSED)
        .with_folder(ERROR);
    for m in messages {
        mailbox.push(INBOX, m);
    }
    mailbox
}

fn catalogue() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    for model in ["ABC123", "DEF456", "GHI789"] {
        store
            .connection()
            .execute("INSERT INTO products (products_model) VALUES (?1)", [model])
            .unwrap();
    }
    store
}

fn flag(store: &SqliteStore, model: &str) -> (i64, i64, String) {
    store
        .connection()
        .query_row(
            "SELECT products_quantity, products_status, manufacturer_out_of_stock \
             FROM products WHERE products_model = ?1",
            [model],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap()
}

fn run(
    job: &JobConfig,
    mailbox: &mut MemoryMailbox,
    store: &mut SqliteStore,
    outbox: &mut Outbox,
) -> RunReport {
    Reconciler::new(
        job,
        RunFolders::from(&MailboxConfig::default()),
        outbox,
        RunLog::new(),
    )
    .mailbox(mailbox)
    .store(store)
    .recipient("ops@shop.example")
    .today(today())
    .run()
}

// ─── Scenario A: low quantity → out of stock, message processed ──────

#[test]
fn test_low_quantity_marks_out_of_stock() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![message("Stock Position", QTY_5)]);
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(report.rows.applied, 1);
    assert_eq!(flag(&store, "ABC123"), (9999, 1, "1".to_string()));
    assert_eq!(flag(&store, "DEF456"), (0, 0, "0".to_string()));
    assert!(mailbox.messages(INBOX).is_empty());
    assert_eq!(mailbox.messages(PROCESSED).len(), 1);
    assert_eq!(report.relocated_to.as_deref(), Some(PROCESSED));
    assert_eq!(report.message_id.as_deref(), Some("feed-1@supplier.example"));
    assert_eq!(outbox.0.len(), 1);
    assert_eq!(outbox.0[0].subject, "Stock Position File Processed");
}

// ─── Scenario B: plentiful quantity → in stock ──────────────────────

#[test]
fn test_high_quantity_marks_in_stock() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![message("Stock Position", QTY_25)]);
    let mut store = catalogue();
    store
        .connection()
        .execute(
            "UPDATE products SET manufacturer_out_of_stock = '1' WHERE products_model = 'ABC123'",
            [],
        )
        .unwrap();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert!(report.succeeded());
    assert_eq!(flag(&store, "ABC123"), (9999, 1, "0".to_string()));
    assert_eq!(mailbox.messages(PROCESSED).len(), 1);
}

// ─── Scenario C: nothing matches ────────────────────────────────────

#[test]
fn test_no_matching_message() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![message("Invoice 4711", QTY_5)]);
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.failed_stage, Some(RunStage::Searching));
    assert_eq!(flag(&store, "ABC123"), (0, 0, "0".to_string()));
    assert_eq!(mailbox.messages(INBOX).len(), 1);
    assert!(mailbox.messages(PROCESSED).is_empty());
    assert!(mailbox.messages(ERROR).is_empty());
    assert!(report.relocated_to.is_none());
    assert_eq!(outbox.0.len(), 1);
}

#[test]
fn test_empty_mailbox_fails_searching() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(Vec::new());
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert_eq!(report.failed_stage, Some(RunStage::Searching));
    assert_eq!(outbox.0.len(), 1);
}

// ─── Scenario D: header lacks AVAIL QTY ─────────────────────────────

#[test]
fn test_missing_header_column_routes_to_error_folder() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![message("Stock Position", NO_QTY_COLUMN)]);
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert_eq!(report.failed_stage, Some(RunStage::HeaderValidating));
    assert!(report.error.as_deref().unwrap_or("").contains("quantity"));
    assert_eq!(flag(&store, "ABC123"), (0, 0, "0".to_string()));
    assert_eq!(mailbox.messages(ERROR).len(), 1);
    assert!(mailbox.messages(PROCESSED).is_empty());
    assert_eq!(report.relocated_to.as_deref(), Some(ERROR));
    assert_eq!(outbox.0.len(), 1);
}

// ─── Selection and row rules ────────────────────────────────────────

#[test]
fn test_message_without_attachment_is_never_selected() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![
        plain_message("Stock Position", today()),
        message("Stock Position", QTY_25),
    ]);
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert!(report.succeeded());
    assert_eq!(report.message_index, Some(2));
    // The text-only message stays where it was.
    assert_eq!(mailbox.messages(INBOX).len(), 1);
    assert_eq!(mailbox.messages(INBOX)[0].parts.len(), 0);
}

#[test]
fn test_banner_rows_and_non_actionable_rows() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![message("Stock Position", BANNER)]);
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert!(report.succeeded());
    assert_eq!(report.rows.applied, 2);
    assert_eq!(report.rows.skipped, 4);
    assert_eq!(flag(&store, "ABC123").2, "1");
    // Exactly at the threshold counts as in stock.
    assert_eq!(flag(&store, "DEF456"), (9999, 1, "0".to_string()));
    // Non-numeric quantity: never sent to the store.
    assert_eq!(flag(&store, "GHI789"), (0, 0, "0".to_string()));
}

#[test]
fn test_rejected_row_fails_the_run_but_later_rows_apply() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![message("Stock Position", THREE_ROWS)]);
    let mut store = Refusing {
        inner: catalogue(),
        model: "DEF456",
    };
    let mut outbox = Outbox::default();

    let report = Reconciler::new(
        &job,
        RunFolders::from(&MailboxConfig::default()),
        &mut outbox,
        RunLog::new(),
    )
    .mailbox(&mut mailbox)
    .store(&mut store)
    .recipient("ops@shop.example")
    .today(today())
    .run();

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.failed_stage, Some(RunStage::Applying));
    assert_eq!(report.rows.applied, 2);
    assert_eq!(report.rows.failed, 1);
    assert_eq!(flag(&store.inner, "ABC123"), (9999, 1, "1".to_string()));
    assert_eq!(flag(&store.inner, "DEF456"), (0, 0, "0".to_string()));
    // The row after the rejected one still reached the store.
    assert_eq!(flag(&store.inner, "GHI789"), (9999, 1, "1".to_string()));
    assert_eq!(mailbox.messages(ERROR).len(), 1);
    assert!(mailbox.messages(PROCESSED).is_empty());
    assert_eq!(report.relocated_to.as_deref(), Some(ERROR));
    assert_eq!(outbox.0.len(), 1);
}

#[test]
fn test_quoted_printable_attachment() {
    let job = JobConfig::default();
    let raw = stock_mail(
        "Stock Position",
        "quoted-printable",
        "SKU=2CAVAIL QTY\r\nABC123=2C3",
    );
    let mut mailbox = mailbox_with(vec![MemoryMessage::from_rfc822(&raw, today()).unwrap()]);
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(flag(&store, "ABC123").2, "1");
}

#[test]
fn test_corrupt_base64_fails_extracting() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![message("Stock Position", "@@not*base64@@")]);
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert_eq!(report.failed_stage, Some(RunStage::Extracting));
    assert_eq!(mailbox.messages(ERROR).len(), 1);
}

#[test]
fn test_scan_search_mode() {
    let job = JobConfig {
        search: SearchMode::Scan,
        ..JobConfig::default()
    };
    let mut mailbox = mailbox_with(vec![
        message("Stock Position update", QTY_25),
        message("Stock Position", QTY_5),
    ]);
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    // Scan compares whole subjects, so only the second message matches.
    assert_eq!(report.message_index, Some(2));
    assert_eq!(flag(&store, "ABC123").2, "1");
}

// ─── Notify step ────────────────────────────────────────────────────

#[test]
fn test_purge_removes_aged_mail_everywhere() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![
        plain_message("Old newsletter", days_ago(45)),
        message("Stock Position", QTY_25),
    ]);
    mailbox.push(PROCESSED, plain_message("Stock Position", days_ago(31)));
    mailbox.push(PROCESSED, plain_message("Stock Position", days_ago(29)));
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert!(report.succeeded());
    assert_eq!(report.purged, Some(2));
    assert!(mailbox.messages(INBOX).is_empty());
    // Today's processed message plus the 29-day-old one remain.
    assert_eq!(mailbox.messages(PROCESSED).len(), 2);
}

#[test]
fn test_purge_can_be_disabled() {
    let job = JobConfig {
        purge: false,
        ..JobConfig::default()
    };
    let mut mailbox = mailbox_with(vec![plain_message("Old newsletter", days_ago(400))]);
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert!(report.purged.is_none());
    assert_eq!(mailbox.messages(INBOX).len(), 1);
}

#[test]
fn test_run_log_is_attached() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![message("Stock Position", QTY_5)]);
    let mut store = catalogue();
    let mut outbox = Outbox::default();
    let run_log = RunLog::new();

    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(run_log.clone())
        .finish();
    let report = tracing::subscriber::with_default(subscriber, || {
        Reconciler::new(
            &job,
            RunFolders::from(&MailboxConfig::default()),
            &mut outbox,
            run_log.clone(),
        )
        .mailbox(&mut mailbox)
        .store(&mut store)
        .recipient("ops@shop.example")
        .today(today())
        .run()
    });

    assert!(report.succeeded());
    let mail = &outbox.0[0];
    assert_eq!(mail.to, "ops@shop.example");
    let attachment = mail.attachment.as_ref().unwrap();
    assert_eq!(attachment.name, "StockPosition.txt");
    assert!(attachment.content.contains("Found attachment"));
    assert!(attachment.content.contains("Got header"));
    assert!(attachment.content.contains("Sending run log"));
    assert!(!attachment.content.contains("Run failed"));
}

#[test]
fn test_mailbox_without_folders_leaves_message_in_place() {
    let job = JobConfig::default();
    let mut mailbox = mailbox_with(vec![message("Stock Position", QTY_5)]).without_folders();
    let mut store = catalogue();
    let mut outbox = Outbox::default();

    let report = run(&job, &mut mailbox, &mut store, &mut outbox);

    assert!(report.succeeded());
    assert_eq!(mailbox.messages(INBOX).len(), 1);
    assert_eq!(outbox.0.len(), 1);
}
