//! Structural table-row editing.
//!
//! Pure transformations over the page's storage-format markup; no network,
//! no external state. Row boundaries are located by anchor-scanning from
//! known markers (`</tbody>`, the last `</tr>`) rather than by parsing the
//! full markup tree: cells nest structured macros that a naive tree walk
//! would mis-bracket, while rows themselves are never nested.

use crate::error::{Error, Result};

pub(crate) const BODY_CLOSE: &str = "</tbody>";
pub(crate) const ROW_OPEN: &str = "<tr";
pub(crate) const ROW_CLOSE: &str = "</tr>";
pub(crate) const HEADER_CELL: &str = "<th";
pub(crate) const DATA_CELL: &str = "<td";

/// A recognizable throwaway row, used to verify write access and matched
/// exactly by the default cleanup patterns.
pub const PLACEHOLDER_ROW: &str = concat!(
    "<tr>",
    "<td><p>TEST</p></td>",
    "<td><p>TEST</p></td>",
    "<td>TEST</td>",
    "<td><p>TEST</p></td>",
    "<td><div class=\"content-wrapper\"><p>",
    "<ac:structured-macro ac:name=\"status-handy\" ac:schema-version=\"1\">",
    "<ac:parameter ac:name=\"Status\">TEST</ac:parameter>",
    "</ac:structured-macro></p></div></td>",
    "<td><div class=\"content-wrapper\"><p>TEST</p></div></td>",
    "</tr>"
);

/// Splice `row_markup` immediately before the table's closing body marker.
pub fn insert_row(content: &str, row_markup: &str) -> Result<String> {
    let at = content
        .rfind(BODY_CLOSE)
        .ok_or_else(|| Error::Structure("no closing </tbody> in content".to_string()))?;

    let mut out = String::with_capacity(content.len() + row_markup.len());
    out.push_str(&content[..at]);
    out.push_str(row_markup);
    out.push_str(&content[at..]);
    Ok(out)
}

/// Remove the first exact textual occurrence of `row_markup`.
///
/// Removing markup that is not present fails with `NotFound`; calling
/// again after a successful removal is therefore a no-op failure.
pub fn remove_row(content: &str, row_markup: &str) -> Result<String> {
    let at = content
        .find(row_markup)
        .ok_or_else(|| Error::NotFound("row markup not present in table".to_string()))?;

    let mut out = String::with_capacity(content.len() - row_markup.len());
    out.push_str(&content[..at]);
    out.push_str(&content[at + row_markup.len()..]);
    Ok(out)
}

/// Remove the last data row of the table.
///
/// Scans backward from the last `</tr>` to its opening `<tr`. If the
/// extracted row carries header cells it is left untouched and the call
/// fails with `HeaderProtected`. Returns the updated content and the
/// removed row.
pub fn remove_last_data_row(content: &str) -> Result<(String, String)> {
    let close = content
        .rfind(ROW_CLOSE)
        .ok_or_else(|| Error::Structure("no table rows in content".to_string()))?;
    let open = content[..close]
        .rfind(ROW_OPEN)
        .ok_or_else(|| Error::Structure("unmatched </tr> in content".to_string()))?;

    let end = close + ROW_CLOSE.len();
    let row = &content[open..end];
    if row.contains(HEADER_CELL) {
        return Err(Error::HeaderProtected);
    }

    let mut out = String::with_capacity(content.len() - row.len());
    out.push_str(&content[..open]);
    out.push_str(&content[end..]);
    Ok((out, row.to_string()))
}

/// Remove every noise row: exact matches of the supplied placeholder
/// patterns, plus rows whose every data cell is blank. Returns the new
/// content and the number of rows removed. A second pass over already
/// clean content removes zero rows and leaves it byte-identical.
pub fn strip_noise_rows(content: &str, patterns: &[String]) -> (String, usize) {
    let mut out = content.to_string();
    let mut removed = 0;

    for pattern in patterns {
        if pattern.is_empty() {
            continue;
        }
        while let Some(at) = out.find(pattern.as_str()) {
            out.replace_range(at..at + pattern.len(), "");
            removed += 1;
        }
    }

    while let Some((start, end)) = find_blank_row(&out) {
        out.replace_range(start..end, "");
        removed += 1;
    }

    if removed > 0 {
        out = collapse_intertag_whitespace(&out);
    }
    (out, removed)
}

/// All `<tr>...</tr>` slices of `content`, in document order.
pub fn rows(content: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut offset = 0;
    while let Some((start, end)) = next_row(content, offset) {
        found.push(&content[start..end]);
        offset = end;
    }
    found
}

/// The data cells of one row (inner markup, tags excluded).
pub fn data_cells(row: &str) -> Vec<&str> {
    cells_between(row, DATA_CELL, "</td>")
}

/// The header cells of one row (inner markup, tags excluded).
pub fn header_cells(row: &str) -> Vec<&str> {
    cells_between(row, HEADER_CELL, "</th>")
}

/// Plain text of a cell: tags stripped, entities for blank space ignored,
/// whitespace collapsed.
pub fn cell_text(cell: &str) -> String {
    let mut text = String::with_capacity(cell.len());
    let mut in_tag = false;
    for c in cell.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    let text = text.replace("&nbsp;", " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn next_row(content: &str, mut offset: usize) -> Option<(usize, usize)> {
    while let Some(rel) = content[offset..].find(ROW_OPEN) {
        let start = offset + rel;
        let after = start + ROW_OPEN.len();
        // require `<tr>` or `<tr ...>`, not a longer tag name
        match content[after..].chars().next() {
            Some('>') => {}
            Some(c) if c.is_whitespace() => {}
            _ => {
                offset = after;
                continue;
            }
        }
        let rel_close = content[start..].find(ROW_CLOSE)?;
        let end = start + rel_close + ROW_CLOSE.len();
        return Some((start, end));
    }
    None
}

fn cells_between<'a>(fragment: &'a str, open_tag: &str, close_tag: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut offset = 0;
    while let Some(rel) = fragment[offset..].find(open_tag) {
        let start = offset + rel;
        let after = start + open_tag.len();
        match fragment[after..].chars().next() {
            Some('>') => {}
            Some(c) if c.is_whitespace() => {}
            _ => {
                offset = after;
                continue;
            }
        }
        let Some(gt) = fragment[start..].find('>') else {
            break;
        };
        let body_start = start + gt + 1;
        let Some(rel_close) = fragment[body_start..].find(close_tag) else {
            break;
        };
        out.push(&fragment[body_start..body_start + rel_close]);
        offset = body_start + rel_close + close_tag.len();
    }
    out
}

fn find_blank_row(content: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    while let Some((start, end)) = next_row(content, offset) {
        let row = &content[start..end];
        if row_is_blank(row) {
            return Some((start, end));
        }
        offset = end;
    }
    None
}

fn row_is_blank(row: &str) -> bool {
    if row.contains(HEADER_CELL) {
        return false;
    }
    let cells = data_cells(row);
    if cells.is_empty() {
        return false;
    }
    cells.iter().all(|cell| cell_text(cell).is_empty())
}

fn collapse_intertag_whitespace(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(pos) = rest.find('>') {
        out.push_str(&rest[..=pos]);
        rest = &rest[pos + 1..];
        let trimmed = rest.trim_start();
        if trimmed.starts_with('<') {
            rest = trimmed;
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> String {
        concat!(
            "<table><tbody>",
            "<tr><th>Nr.</th><th>Jahr/Monat</th><th>Standort</th></tr>",
            "<tr><td>1</td><td>2021/03</td><td>UK Magdeburg</td></tr>",
            "<tr><td>2</td><td>2022/11</td><td>UK Jena</td></tr>",
            "</tbody></table>"
        )
        .to_string()
    }

    #[test]
    fn insert_places_row_before_body_close() {
        let row = "<tr><td>3</td><td>2023/01</td><td>UK Dresden</td></tr>";
        let updated = insert_row(&sample_table(), row).unwrap();
        assert!(updated.ends_with(&format!("{}</tbody></table>", row)));
        assert_eq!(rows(&updated).len(), 4);
    }

    #[test]
    fn insert_fails_without_body_close() {
        let err = insert_row("<table><tr><td>1</td></tr></table>", "<tr></tr>").unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn insert_then_remove_restores_original() {
        let original = sample_table();
        let row = "<tr><td>3</td><td>2023/01</td><td>UK Dresden</td></tr>";
        let inserted = insert_row(&original, row).unwrap();
        let restored = remove_row(&inserted, row).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn remove_twice_fails_with_not_found() {
        let row = "<tr><td>2</td><td>2022/11</td><td>UK Jena</td></tr>";
        let once = remove_row(&sample_table(), row).unwrap();
        let err = remove_row(&once, row).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn remove_last_data_row_takes_the_last() {
        let (updated, removed) = remove_last_data_row(&sample_table()).unwrap();
        assert!(removed.contains("<td>2</td>"));
        assert_eq!(rows(&updated).len(), 2);
        assert!(updated.contains("<td>1</td>"));
    }

    #[test]
    fn remove_last_data_row_protects_header() {
        let content = "<table><tbody><tr><th>Nr.</th><th>Standort</th></tr></tbody></table>";
        let err = remove_last_data_row(content).unwrap_err();
        assert!(matches!(err, Error::HeaderProtected));
    }

    #[test]
    fn strip_removes_placeholder_and_blank_rows() {
        let content = format!(
            "<table><tbody><tr><th>Nr.</th></tr>{}<tr><td>1</td></tr><tr><td> </td><td><p>&nbsp;</p></td></tr></tbody></table>",
            PLACEHOLDER_ROW
        );
        let patterns = vec![PLACEHOLDER_ROW.to_string()];
        let (cleaned, removed) = strip_noise_rows(&content, &patterns);
        assert_eq!(removed, 2);
        assert!(!cleaned.contains("TEST"));
        assert!(cleaned.contains("<td>1</td>"));
    }

    #[test]
    fn strip_is_idempotent() {
        let content = format!(
            "<table><tbody><tr><th>Nr.</th></tr>{}<tr><td>1</td></tr></tbody></table>",
            PLACEHOLDER_ROW
        );
        let patterns = vec![PLACEHOLDER_ROW.to_string()];
        let (first, removed_first) = strip_noise_rows(&content, &patterns);
        assert_eq!(removed_first, 1);
        let (second, removed_second) = strip_noise_rows(&first, &patterns);
        assert_eq!(removed_second, 0);
        assert_eq!(second, first);
    }

    #[test]
    fn strip_keeps_header_with_blank_cells_form() {
        // a header row never counts as blank, even without text
        let content = "<table><tbody><tr><th></th><th></th></tr><tr><td>1</td></tr></tbody></table>";
        let (cleaned, removed) = strip_noise_rows(content, &[]);
        assert_eq!(removed, 0);
        assert_eq!(cleaned, content);
    }

    #[test]
    fn cell_text_strips_tags_and_entities() {
        assert_eq!(cell_text("<p>UK Jena</p>"), "UK Jena");
        assert_eq!(cell_text("<p>&nbsp;</p>"), "");
        assert_eq!(
            cell_text("<div class=\"content-wrapper\"><p>JA 70063</p></div>"),
            "JA 70063"
        );
    }

    #[test]
    fn rows_ignores_nested_macro_markup() {
        let content = sample_table();
        let all = rows(&content);
        assert_eq!(all.len(), 3);
        assert!(all[0].contains("<th>"));
    }
}
