//! Core data models used throughout pubsync.
//!
//! These types represent the wiki page, backup snapshots, bibliographic
//! records, and table rows that flow through the synchronization engine.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A wiki page as fetched from the content API.
///
/// `version` increases monotonically on the remote; a write must carry the
/// version read at fetch time or be rejected by the remote system.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub version: u32,
    pub content: String,
}

/// Reference to one immutable backup snapshot on disk.
#[derive(Debug, Clone)]
pub struct BackupRef {
    pub path: PathBuf,
    pub label: String,
    pub created: DateTime<Utc>,
    pub size: u64,
}

impl BackupRef {
    /// The snapshot's file name, for display and lookup.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// One bibliographic record, created per search hit and enriched with a
/// relevance score before it is promoted to a row or discarded.
#[derive(Debug, Clone, Default)]
pub struct BibRecord {
    /// External identifier (PMID). Unique within a run after dedup.
    pub id: String,
    pub title: String,
    /// Ordered author list, `Lastname F` form.
    pub authors: Vec<String>,
    /// Journal title.
    pub venue: String,
    pub year: Option<String>,
    pub month: Option<String>,
    pub doi: Option<String>,
    /// Abstract excerpt, capped at 200 characters.
    pub abstract_excerpt: String,
    /// Relevance score in [0, 100], assigned by the discovery pipeline.
    pub score: u8,
}

/// One entry of the publications table in the target schema.
#[derive(Debug, Clone)]
pub struct PublicationRow {
    /// Sequence number; strictly increasing across rows in table order.
    pub number: u32,
    /// `YYYY/MM`, with `??` placeholders for unknown parts.
    pub period: String,
    pub location: String,
    /// Comma-joined author list in source order.
    pub people: String,
    /// Funding acknowledgment, `JA <code>`.
    pub funding: String,
    /// Title plus optional DOI and escaped record link.
    pub citation: String,
}

/// Category of a planned search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCategory {
    Keyword,
    Author,
    Institution,
    Temporal,
}

impl QueryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::Keyword => "keyword",
            QueryCategory::Author => "author",
            QueryCategory::Institution => "institution",
            QueryCategory::Temporal => "temporal",
        }
    }
}

/// Execution priority of a planned search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryPriority {
    High,
    Medium,
}

impl QueryPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryPriority::High => "high",
            QueryPriority::Medium => "medium",
        }
    }
}

/// One entry of the prioritized query plan.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub category: QueryCategory,
    pub priority: QueryPriority,
}

/// Non-fatal quality findings for a mapped row.
#[derive(Debug, Clone, Default)]
pub struct RowValidation {
    pub warnings: Vec<String>,
}
