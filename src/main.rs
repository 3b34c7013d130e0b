//! CLI entry point for `stocksync`.

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};

use stocksync::config::{self, Config};
use stocksync::logging::{self, RunLog, Sink};
use stocksync::mailbox::imap::ImapMailbox;
use stocksync::mailbox::MailboxSession;
use stocksync::reconcile::{Reconciler, RunFolders};
use stocksync::smtp::SmtpSender;
use stocksync::store::sqlite::SqliteStore;
use stocksync::store::StoreGateway;

#[derive(Parser)]
#[command(
    name = "stocksync",
    version,
    about = "Apply an emailed supplier stock position file to the product catalogue"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Update the operational database instead of the test one
    #[arg(long, global = true)]
    ops: bool,

    /// Log to a dated file instead of the console
    #[arg(long, global = true)]
    silent: bool,

    /// Include debug messages in the log
    #[arg(long, global = true)]
    debug: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Recipient of the run log (defaults to smtp.default_recipient)
    #[arg(long, value_name = "ADDR", global = true, env = "STOCKSYNC_TO")]
    to: Option<String>,

    /// Print the run report as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the stock position mail (default)
    Run,
    /// Print the effective configuration
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        None | Some(Commands::Run) => cmd_run(&cli),
        Some(Commands::Config) => cmd_config(),
        Some(Commands::Completions { shell }) => cmd_completions(*shell),
        Some(Commands::Manpage) => cmd_manpage(),
    }
}

fn log_level<'a>(cli: &Cli, config: &'a Config) -> &'a str {
    match (cli.debug, cli.verbose) {
        (true, 0..=2) | (false, 2) => "debug",
        (_, 0) => config.general.log_level.as_str(),
        (_, 1) => "info",
        _ => "trace",
    }
}

/// Run the reconciliation job once.
fn cmd_run(cli: &Cli) -> anyhow::Result<()> {
    let config = config::load_config()?;

    let run_log = RunLog::new();
    let sink = if cli.silent { Sink::File } else { Sink::Stderr };
    logging::init(log_level(cli, &config), sink, &config::log_dir(&config), &run_log)?;

    if cli.ops {
        info!("Using operational database");
    } else {
        info!("Using TEST database");
    }
    let mut store = match SqliteStore::open(config.store.path(cli.ops)) {
        Ok(s) => Some(s),
        Err(e) => {
            error!(error = %e, "Cannot open product store");
            None
        }
    };

    let mut mailbox = match ImapMailbox::connect(&config.mailbox) {
        Ok(m) => Some(m),
        Err(e) => {
            error!(server = %config.mailbox.connection_string(), error = %e, "Mailbox connect failed");
            None
        }
    };

    let recipient = cli
        .to
        .clone()
        .unwrap_or_else(|| config.smtp.default_recipient.clone());
    let mut notifier = SmtpSender::new(config.smtp.clone());

    let mut reconciler = Reconciler::new(
        &config.job,
        RunFolders::from(&config.mailbox),
        &mut notifier,
        run_log,
    )
    .recipient(recipient);
    if let Some(m) = mailbox.as_mut() {
        reconciler = reconciler.mailbox(m as &mut dyn MailboxSession);
    }
    if let Some(s) = store.as_mut() {
        reconciler = reconciler.store(s as &mut dyn StoreGateway);
    }
    let report = reconciler.run();

    info!(
        outcome = ?report.outcome,
        failed_stage = ?report.failed_stage,
        notified = report.notification.is_success(),
        "Run complete"
    );
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Print the effective configuration with passwords masked.
fn cmd_config() -> anyhow::Result<()> {
    let config = config::load_config()?;
    if let Some(path) = config::config_file_path() {
        println!("# {}", path.display());
    }
    print!("{}", toml::to_string_pretty(&config.masked())?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "stocksync", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
