//! End-to-end synchronization operations.
//!
//! Composes the page store, backup store, editor, and discovery pipeline.
//! Every mutating operation follows the same bracket: fetch → backup the
//! pre-mutation content → transform → write `base_version + 1`. A failed
//! backup aborts before any remote write; a version conflict is surfaced,
//! never auto-merged.

use std::time::Duration;

use crate::backup::BackupStore;
use crate::config::Config;
use crate::discovery::{build_query_plan, filter_by_score, DiscoveryPipeline, Rubric};
use crate::editor;
use crate::error::Result;
use crate::mapper;
use crate::models::{BackupRef, BibRecord, Page, PublicationRow};
use crate::page::PageStore;
use crate::pubmed::PubMedClient;
use crate::table::{self, ColumnProfile, TableOverview};

/// Nested attributes expanded on every page fetch.
const PAGE_EXPAND: &str = "body.storage,version";

/// Everything one run needs: page access, the backup store, and the
/// target page. Built once per run and never reused across runs.
pub struct RunContext<'a> {
    pub pages: &'a dyn PageStore,
    pub backups: &'a BackupStore,
    pub page_id: String,
}

impl<'a> RunContext<'a> {
    pub fn new(pages: &'a dyn PageStore, backups: &'a BackupStore, page_id: impl Into<String>) -> Self {
        Self {
            pages,
            backups,
            page_id: page_id.into(),
        }
    }

    fn fetch(&self) -> Result<Page> {
        self.pages.fetch(&self.page_id, PAGE_EXPAND)
    }
}

/// Read-only look at the page and its table.
pub fn status(ctx: &RunContext) -> Result<(Page, TableOverview)> {
    let page = ctx.fetch()?;
    let overview = table::overview(&page.content);
    Ok((page, overview))
}

/// Detailed analysis: overview plus per-column inspection. Snapshots the
/// content for offline inspection.
pub fn analyze(
    ctx: &RunContext,
    sample: usize,
) -> Result<(Page, TableOverview, Vec<ColumnProfile>, BackupRef)> {
    let page = ctx.fetch()?;
    let backup = ctx.backups.save(&page.content, "analysis")?;
    let overview = table::overview(&page.content);
    let columns = table::inspect_columns(&page.content, sample);
    Ok((page, overview, columns, backup))
}

/// Report from a cleanup pass.
#[derive(Debug)]
pub struct CleanReport {
    pub removed: usize,
    pub applied: bool,
    pub new_version: Option<u32>,
}

/// Strip placeholder and blank rows. Dry-run unless `apply`; applying
/// brackets the write with before/after snapshots.
pub fn clean(ctx: &RunContext, patterns: &[String], apply: bool) -> Result<CleanReport> {
    let page = ctx.fetch()?;
    let (cleaned, removed) = editor::strip_noise_rows(&page.content, patterns);

    if removed == 0 || !apply {
        return Ok(CleanReport {
            removed,
            applied: false,
            new_version: None,
        });
    }

    ctx.backups.save(&page.content, "before_cleanup")?;
    let written = ctx
        .pages
        .write(&ctx.page_id, &page.title, &cleaned, page.version)?;
    ctx.backups.save(&cleaned, "after_cleanup")?;

    Ok(CleanReport {
        removed,
        applied: true,
        new_version: Some(written.version),
    })
}

/// Insert one row of raw markup before the table's closing body marker.
pub fn insert_row(ctx: &RunContext, row_markup: &str) -> Result<Page> {
    let page = ctx.fetch()?;
    let updated = editor::insert_row(&page.content, row_markup)?;
    ctx.backups.save(&page.content, "before_row_insert")?;
    ctx.pages
        .write(&ctx.page_id, &page.title, &updated, page.version)
}

/// Remove the first exact occurrence of `row_markup`.
pub fn remove_row(ctx: &RunContext, row_markup: &str) -> Result<Page> {
    let page = ctx.fetch()?;
    let updated = editor::remove_row(&page.content, row_markup)?;
    ctx.backups.save(&page.content, "before_row_remove")?;
    ctx.pages
        .write(&ctx.page_id, &page.title, &updated, page.version)
}

/// Remove the last data row. Returns the written page and the removed
/// row's markup.
pub fn remove_last_row(ctx: &RunContext) -> Result<(Page, String)> {
    let page = ctx.fetch()?;
    let (updated, removed) = editor::remove_last_data_row(&page.content)?;
    ctx.backups.save(&page.content, "before_row_remove")?;
    let written = ctx
        .pages
        .write(&ctx.page_id, &page.title, &updated, page.version)?;
    Ok((written, removed))
}

/// Overwrite the page with a stored snapshot. The current (presumably
/// damaged) content is itself snapshotted first.
pub fn restore(ctx: &RunContext, backup_name: &str) -> Result<Page> {
    let backup = ctx.backups.find(backup_name)?;
    let snapshot = ctx.backups.restore(&backup)?;
    let page = ctx.fetch()?;
    ctx.backups.save(&page.content, "before_restore")?;
    ctx.pages
        .write(&ctx.page_id, &page.title, &snapshot, page.version)
}

/// One mapped candidate with its quality warnings.
#[derive(Debug)]
pub struct Candidate {
    pub record_id: String,
    pub score: u8,
    pub row: PublicationRow,
    pub warnings: Vec<String>,
}

/// Report from an integration run.
#[derive(Debug)]
pub struct IntegrationReport {
    pub overview: TableOverview,
    /// Records surviving in-run dedup, before any filtering.
    pub discovered: usize,
    /// Identifiers returned by more than one query.
    pub duplicates: usize,
    /// Discovered records already linked in the page.
    pub already_published: usize,
    /// Records accepted, mapped, and (on apply) inserted.
    pub accepted: Vec<Candidate>,
    /// Accepted records skipped for missing required data.
    pub skipped: usize,
    pub applied: bool,
    pub new_version: Option<u32>,
}

/// Knobs for one integration run.
#[derive(Debug, Clone)]
pub struct IntegrationOptions {
    pub max_per_query: usize,
    pub min_score: u8,
    /// Cap the query plan to its first N entries.
    pub query_cap: Option<usize>,
    pub apply: bool,
}

/// Discover new publications and append them to the table.
///
/// Dry-run unless `options.apply`: the report then carries the preview
/// and nothing is written. On apply, all accepted rows are inserted and
/// written in a single page update.
pub fn integrate(
    ctx: &RunContext,
    config: &Config,
    client: &PubMedClient,
    options: &IntegrationOptions,
) -> Result<IntegrationReport> {
    let page = ctx.fetch()?;
    let overview = table::overview(&page.content);
    ctx.backups.save(&page.content, "before_integration")?;

    let plan = build_query_plan(&config.discovery, &config.scoring);
    let plan = match options.query_cap {
        Some(cap) => &plan[..plan.len().min(cap)],
        None => &plan[..],
    };

    let pipeline = DiscoveryPipeline::new(
        client,
        Rubric::from_config(&config.scoring),
        Duration::from_millis(config.pubmed.rate_limit_ms),
    );
    let discovery = pipeline.run(plan, options.max_per_query);
    let discovered = discovery.records.len();

    // cross-run dedup: records already linked in the page are done
    let published = table::linked_record_ids(&page.content);
    let mut already_published = 0;
    let fresh: Vec<BibRecord> = discovery
        .records
        .into_iter()
        .filter(|r| {
            if published.contains(&r.id) {
                already_published += 1;
                false
            } else {
                true
            }
        })
        .collect();

    let accepted_records = filter_by_score(fresh, options.min_score);

    let mut accepted = Vec::new();
    let mut skipped = 0;
    let mut next = overview.next_number;
    for record in &accepted_records {
        match mapper::map_record(
            record,
            next,
            &config.table.default_location,
            None,
            config.table.funding_code_base,
        ) {
            Ok((row, validation)) => {
                accepted.push(Candidate {
                    record_id: record.id.clone(),
                    score: record.score,
                    row,
                    warnings: validation.warnings,
                });
                next += 1;
            }
            Err(e) => {
                eprintln!("Warning: skipping record {}: {}", record.id, e);
                skipped += 1;
            }
        }
    }

    let mut report = IntegrationReport {
        overview,
        discovered,
        duplicates: discovery.duplicates,
        already_published,
        accepted,
        skipped,
        applied: false,
        new_version: None,
    };

    if !options.apply || report.accepted.is_empty() {
        return Ok(report);
    }

    let mut content = page.content.clone();
    for candidate in &report.accepted {
        content = editor::insert_row(&content, &mapper::row_markup(&candidate.row))?;
    }
    let written = ctx
        .pages
        .write(&ctx.page_id, &page.title, &content, page.version)?;
    ctx.backups.save(&content, "after_integration")?;

    report.applied = true;
    report.new_version = Some(written.version);
    Ok(report)
}
