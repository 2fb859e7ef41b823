//! Read-only analysis of the publications table.
//!
//! Everything here works on the fetched markup without touching the
//! network: row and cell counts, header labels, sequence numbering, and
//! per-column field inspection for the analyze command.

use std::collections::HashSet;

use crate::editor;

/// Summary of the table's current shape.
#[derive(Debug, Clone)]
pub struct TableOverview {
    /// Header labels in column order.
    pub headers: Vec<String>,
    /// All rows, header included.
    pub total_rows: usize,
    /// Rows carrying data cells.
    pub data_rows: usize,
    /// Highest sequence number found in the first column.
    pub highest_number: u32,
    /// The sequence number the next inserted row gets.
    pub next_number: u32,
}

/// Per-column profile over a sample of data rows.
#[derive(Debug, Clone)]
pub struct ColumnProfile {
    pub name: String,
    /// Up to three example cell texts.
    pub examples: Vec<String>,
    /// Cells with any text at all.
    pub filled: usize,
    /// Cells whose text parses as a number.
    pub numeric: usize,
    pub sampled: usize,
}

/// Compute the table overview from page content.
pub fn overview(content: &str) -> TableOverview {
    let rows = editor::rows(content);
    let mut headers = Vec::new();
    let mut data_rows = 0;
    let mut highest = 0u32;

    for row in &rows {
        let header_cells = editor::header_cells(row);
        if !header_cells.is_empty() {
            if headers.is_empty() {
                headers = header_cells.iter().map(|c| editor::cell_text(c)).collect();
            }
            continue;
        }
        let cells = editor::data_cells(row);
        if cells.is_empty() {
            continue;
        }
        data_rows += 1;
        if let Ok(n) = editor::cell_text(cells[0]).parse::<u32>() {
            highest = highest.max(n);
        }
    }

    TableOverview {
        headers,
        total_rows: rows.len(),
        data_rows,
        highest_number: highest,
        next_number: highest + 1,
    }
}

/// Inspect up to `sample` data rows column by column.
pub fn inspect_columns(content: &str, sample: usize) -> Vec<ColumnProfile> {
    let rows = editor::rows(content);
    let headers: Vec<String> = rows
        .iter()
        .find(|r| !editor::header_cells(r).is_empty())
        .map(|r| {
            editor::header_cells(r)
                .iter()
                .map(|c| editor::cell_text(c))
                .collect()
        })
        .unwrap_or_default();

    let data: Vec<Vec<String>> = rows
        .iter()
        .filter(|r| editor::header_cells(r).is_empty())
        .map(|r| {
            editor::data_cells(r)
                .iter()
                .map(|c| editor::cell_text(c))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .take(sample)
        .collect();

    let column_count = data
        .iter()
        .map(|cells| cells.len())
        .max()
        .unwrap_or(headers.len())
        .max(headers.len());

    let mut profiles = Vec::with_capacity(column_count);
    for i in 0..column_count {
        let name = headers
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("column {}", i + 1));
        let mut profile = ColumnProfile {
            name,
            examples: Vec::new(),
            filled: 0,
            numeric: 0,
            sampled: data.len(),
        };
        for cells in &data {
            let Some(text) = cells.get(i) else { continue };
            if text.is_empty() {
                continue;
            }
            profile.filled += 1;
            if text.parse::<f64>().is_ok() {
                profile.numeric += 1;
            }
            if profile.examples.len() < 3 {
                profile.examples.push(truncate(text, 80));
            }
        }
        profiles.push(profile);
    }
    profiles
}

/// Record identifiers already linked in the page content. Used by the
/// orchestrator for cross-run dedup against published rows.
pub fn linked_record_ids(content: &str) -> HashSet<String> {
    const LINK_PREFIX: &str = "pubmed.ncbi.nlm.nih.gov/";
    let mut ids = HashSet::new();
    let mut rest = content;
    while let Some(pos) = rest.find(LINK_PREFIX) {
        rest = &rest[pos + LINK_PREFIX.len()..];
        let id: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !id.is_empty() {
            ids.insert(id);
        }
    }
    ids
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
