//! # pubsync CLI
//!
//! The `pubsync` binary keeps a wiki publications table in sync with
//! PubMed. All commands read a TOML configuration (`--config`) naming the
//! wiki instance, the page, the backup directory, and the discovery and
//! scoring settings.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pubsync status` | Fetch the page and show the table's shape |
//! | `pubsync analyze` | Detailed per-column analysis (snapshots first) |
//! | `pubsync clean [--apply]` | Remove placeholder and blank rows |
//! | `pubsync discover` | Search PubMed, print scored candidates |
//! | `pubsync integrate [--apply]` | Append accepted publications |
//! | `pubsync row ...` | Low-level row insert/remove operations |
//! | `pubsync backups` | List snapshots, newest first |
//! | `pubsync restore <name> --confirm` | Overwrite the page with a snapshot |
//!
//! Mutating commands are dry-run by default; nothing is written without
//! `--apply` (or `--confirm` for restore). Credentials come from
//! `PUBSYNC_COOKIES` / `PUBSYNC_USERNAME` + `PUBSYNC_PASSWORD` or a JSON
//! file passed via `--credentials`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use pubsync::backup::BackupStore;
use pubsync::config::{self, Config};
use pubsync::credentials::load_credentials;
use pubsync::discovery::{build_query_plan, filter_by_score, DiscoveryPipeline, Rubric};
use pubsync::editor;
use pubsync::page::PageRepository;
use pubsync::pubmed::PubMedClient;
use pubsync::session::Session;
use pubsync::sync::{self, IntegrationOptions, RunContext};

/// pubsync — keep a wiki publications table in sync with PubMed.
#[derive(Parser)]
#[command(
    name = "pubsync",
    about = "Keep a wiki publications table in sync with PubMed",
    version,
    long_about = "pubsync fetches a wiki page's publications table, snapshots it before \
    every change, edits rows structurally, and discovers new publications via the \
    PubMed E-utilities with rubric-based relevance scoring."
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pubsync.toml")]
    config: PathBuf,

    /// Path to a JSON credentials file (cookies or username/password).
    /// Environment variables win when both are present.
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch the page and show the table's shape.
    ///
    /// Read-only: no snapshot, no write.
    Status,

    /// Detailed table analysis with per-column field inspection.
    ///
    /// Snapshots the content first so the analysis can be repeated
    /// offline.
    Analyze {
        /// How many data rows to sample per column.
        #[arg(long, default_value_t = 10)]
        sample: usize,
    },

    /// Remove placeholder rows and rows whose every cell is blank.
    ///
    /// Dry-run by default; `--apply` writes the cleaned table back,
    /// bracketed by before/after snapshots.
    Clean {
        /// Write the cleaned content back to the wiki.
        #[arg(long)]
        apply: bool,
    },

    /// Search PubMed and print scored candidates without touching the wiki.
    Discover {
        /// Result cap per search query (default from config).
        #[arg(long)]
        max_per_query: Option<usize>,

        /// Only run the first N queries of the plan.
        #[arg(long)]
        queries: Option<usize>,

        /// Minimum relevance score to show (default from config).
        #[arg(long)]
        min_score: Option<u8>,
    },

    /// Discover new publications and append them to the table.
    ///
    /// Dry-run by default: prints the candidate rows that would be
    /// appended. `--apply` inserts them and writes a single page update.
    Integrate {
        /// Write the new rows to the wiki.
        #[arg(long)]
        apply: bool,

        /// Minimum relevance score for acceptance (default from config).
        #[arg(long)]
        min_score: Option<u8>,

        /// Result cap per search query (default from config).
        #[arg(long)]
        max_per_query: Option<usize>,

        /// Only run the first N queries of the plan.
        #[arg(long)]
        queries: Option<usize>,
    },

    /// Low-level row operations.
    Row {
        #[command(subcommand)]
        action: RowAction,
    },

    /// List backup snapshots, newest first.
    Backups,

    /// Overwrite the page with a stored snapshot.
    ///
    /// The current content is snapshotted first. Refuses to run without
    /// `--confirm`.
    Restore {
        /// Snapshot file name, as printed by `pubsync backups`.
        name: String,

        /// Actually overwrite the page.
        #[arg(long)]
        confirm: bool,
    },
}

/// Row-level operations.
#[derive(Subcommand)]
enum RowAction {
    /// Insert a recognizable placeholder row (verifies write access).
    AddTest,

    /// Insert one row of raw markup before the table end.
    Insert {
        /// Full `<tr>...</tr>` markup.
        #[arg(long)]
        markup: String,
    },

    /// Remove the first exact occurrence of the given markup.
    Remove {
        /// Full `<tr>...</tr>` markup.
        #[arg(long)]
        markup: String,
    },

    /// Remove the last data row (the header is protected).
    RemoveLast,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let credentials_path = cli.credentials.clone();

    match cli.command {
        Commands::Backups => {
            let store = BackupStore::new(&cfg.backup.dir);
            let backups = store.list()?;
            if backups.is_empty() {
                println!("No backups in {}", store.dir().display());
                return Ok(());
            }
            println!("Backups in {} (newest first):", store.dir().display());
            for backup in backups {
                println!(
                    "  {}  {:>9} bytes  {}",
                    backup.created.format("%Y-%m-%d %H:%M:%S"),
                    backup.size,
                    backup.file_name()
                );
            }
        }

        Commands::Discover {
            max_per_query,
            queries,
            min_score,
        } => {
            run_discover(&cfg, max_per_query, queries, min_score)?;
        }

        Commands::Status => {
            let session = open_session(credentials_path.as_deref(), &cfg)?;
            let repo = PageRepository::new(&session);
            let backups = BackupStore::new(&cfg.backup.dir);
            let ctx = RunContext::new(&repo, &backups, cfg.wiki.page_id.clone());

            let (page, overview) = sync::status(&ctx)?;
            println!("page {} — {}", page.id, page.title);
            println!("  version: {}", page.version);
            println!("  content: {} chars", page.content.len());
            println!(
                "  rows: {} total, {} data",
                overview.total_rows, overview.data_rows
            );
            println!("  highest number: {}", overview.highest_number);
            println!("  next number: {}", overview.next_number);
        }

        Commands::Analyze { sample } => {
            let session = open_session(credentials_path.as_deref(), &cfg)?;
            let repo = PageRepository::new(&session);
            let backups = BackupStore::new(&cfg.backup.dir);
            let ctx = RunContext::new(&repo, &backups, cfg.wiki.page_id.clone());

            let (page, overview, columns, backup) = sync::analyze(&ctx, sample)?;
            println!("page {} — {} (version {})", page.id, page.title, page.version);
            println!("  snapshot: {}", backup.file_name());
            println!(
                "  rows: {} total, {} data, next number {}",
                overview.total_rows, overview.data_rows, overview.next_number
            );
            if !overview.headers.is_empty() {
                println!("  columns: {}", overview.headers.join(" | "));
            }
            for column in &columns {
                println!();
                println!(
                    "  {} — {}/{} filled, {} numeric",
                    column.name, column.filled, column.sampled, column.numeric
                );
                for example in &column.examples {
                    println!("    e.g. {}", example);
                }
            }
        }

        Commands::Clean { apply } => {
            let session = open_session(credentials_path.as_deref(), &cfg)?;
            let repo = PageRepository::new(&session);
            let backups = BackupStore::new(&cfg.backup.dir);
            let ctx = RunContext::new(&repo, &backups, cfg.wiki.page_id.clone());

            let report = sync::clean(&ctx, &cfg.cleanup.placeholder_rows, apply)?;
            if report.removed == 0 {
                println!("Table is already clean — nothing to remove.");
            } else if report.applied {
                println!(
                    "Removed {} noise row(s); new version {}.",
                    report.removed,
                    report.new_version.unwrap_or_default()
                );
            } else {
                println!(
                    "Would remove {} noise row(s). Re-run with --apply to write.",
                    report.removed
                );
            }
        }

        Commands::Integrate {
            apply,
            min_score,
            max_per_query,
            queries,
        } => {
            let session = open_session(credentials_path.as_deref(), &cfg)?;
            let repo = PageRepository::new(&session);
            let backups = BackupStore::new(&cfg.backup.dir);
            let ctx = RunContext::new(&repo, &backups, cfg.wiki.page_id.clone());
            let client = PubMedClient::new(&cfg.pubmed)?;

            let options = IntegrationOptions {
                max_per_query: max_per_query.unwrap_or(cfg.pubmed.max_per_query),
                min_score: min_score.unwrap_or(cfg.scoring.min_score),
                query_cap: queries,
                apply,
            };
            let report = sync::integrate(&ctx, &cfg, &client, &options)?;

            println!(
                "discovery: {} record(s), {} duplicate id(s), {} already published",
                report.discovered, report.duplicates, report.already_published
            );
            println!(
                "accepted: {} (min score {}), skipped: {}",
                report.accepted.len(),
                options.min_score,
                report.skipped
            );
            for candidate in &report.accepted {
                println!();
                println!(
                    "  #{} [{}%] {}",
                    candidate.row.number, candidate.score, candidate.row.citation
                );
                println!(
                    "     {} | {} | {}",
                    candidate.row.period, candidate.row.location, candidate.row.funding
                );
                if !candidate.row.people.is_empty() {
                    println!("     {}", candidate.row.people);
                }
                for warning in &candidate.warnings {
                    println!("     warning: {}", warning);
                }
            }
            println!();
            if report.applied {
                println!(
                    "Appended {} row(s); new version {}.",
                    report.accepted.len(),
                    report.new_version.unwrap_or_default()
                );
            } else if report.accepted.is_empty() {
                println!("Nothing to append.");
            } else {
                println!("Dry run — re-run with --apply to append.");
            }
        }

        Commands::Row { action } => {
            let session = open_session(credentials_path.as_deref(), &cfg)?;
            let repo = PageRepository::new(&session);
            let backups = BackupStore::new(&cfg.backup.dir);
            let ctx = RunContext::new(&repo, &backups, cfg.wiki.page_id.clone());

            match action {
                RowAction::AddTest => {
                    let page = sync::insert_row(&ctx, editor::PLACEHOLDER_ROW)?;
                    println!("Placeholder row inserted; new version {}.", page.version);
                    println!("Remove it again with: pubsync clean --apply");
                }
                RowAction::Insert { markup } => {
                    let page = sync::insert_row(&ctx, &markup)?;
                    println!("Row inserted; new version {}.", page.version);
                }
                RowAction::Remove { markup } => {
                    let page = sync::remove_row(&ctx, &markup)?;
                    println!("Row removed; new version {}.", page.version);
                }
                RowAction::RemoveLast => {
                    let (page, removed) = sync::remove_last_row(&ctx)?;
                    let preview: String = removed.chars().take(100).collect();
                    println!("Removed last data row: {}...", preview);
                    println!("New version {}.", page.version);
                }
            }
        }

        Commands::Restore { name, confirm } => {
            if !confirm {
                anyhow::bail!(
                    "restore overwrites the live page — re-run with --confirm to proceed"
                );
            }
            let session = open_session(credentials_path.as_deref(), &cfg)?;
            let repo = PageRepository::new(&session);
            let backups = BackupStore::new(&cfg.backup.dir);
            let ctx = RunContext::new(&repo, &backups, cfg.wiki.page_id.clone());

            let page = sync::restore(&ctx, &name)?;
            println!("Snapshot {} restored; new version {}.", name, page.version);
        }
    }

    Ok(())
}

fn open_session(credentials_path: Option<&std::path::Path>, cfg: &Config) -> Result<Session> {
    let credentials = load_credentials(credentials_path)?;
    let session = Session::authenticate(
        &cfg.wiki.base_url,
        &credentials,
        Duration::from_secs(cfg.wiki.timeout_secs),
    )?;
    Ok(session)
}

fn run_discover(
    cfg: &Config,
    max_per_query: Option<usize>,
    queries: Option<usize>,
    min_score: Option<u8>,
) -> Result<()> {
    let client = PubMedClient::new(&cfg.pubmed)?;
    let plan = build_query_plan(&cfg.discovery, &cfg.scoring);
    let plan = match queries {
        Some(cap) => &plan[..plan.len().min(cap)],
        None => &plan[..],
    };

    println!("query plan: {} entries", plan.len());
    for (i, entry) in plan.iter().enumerate() {
        let preview: String = entry.query.chars().take(70).collect();
        println!(
            "  {}. [{}/{}] {}",
            i + 1,
            entry.category.as_str(),
            entry.priority.as_str(),
            preview
        );
    }
    println!();

    let pipeline = DiscoveryPipeline::new(
        &client,
        Rubric::from_config(&cfg.scoring),
        Duration::from_millis(cfg.pubmed.rate_limit_ms),
    );
    let report = pipeline.run(plan, max_per_query.unwrap_or(cfg.pubmed.max_per_query));
    println!(
        "ran {} query(ies), {} failure(s), {} duplicate id(s)",
        report.queries_run, report.query_failures, report.duplicates
    );

    let threshold = min_score.unwrap_or(cfg.scoring.min_score);
    let kept = filter_by_score(report.records, threshold);
    println!("{} record(s) at score >= {}:", kept.len(), threshold);
    for record in &kept {
        let title: String = record.title.chars().take(70).collect();
        println!();
        println!("  [{}%] {} ({})", record.score, title, record.id);
        if !record.authors.is_empty() {
            let authors: Vec<&str> = record.authors.iter().take(3).map(|s| s.as_str()).collect();
            println!("     {}", authors.join(", "));
        }
        println!(
            "     {} {} — {}",
            record.year.as_deref().unwrap_or("????"),
            record.month.as_deref().unwrap_or(""),
            record.venue
        );
    }
    Ok(())
}
