//! Mapping bibliographic records into the publications row schema.
//!
//! Pure functions: a record plus an assigned sequence number becomes a
//! [`PublicationRow`], with validation. Nothing here touches the network.

use crate::error::{Error, Result};
use crate::models::{BibRecord, PublicationRow, RowValidation};

/// Map a record into the row schema.
///
/// `funding_code` overrides the auto-derived code (`funding_code_base +
/// sequence number`). Fails with `Validation` when the record is missing
/// required data; quality warnings are returned alongside the row.
pub fn map_record(
    record: &BibRecord,
    number: u32,
    location: &str,
    funding_code: Option<u32>,
    funding_code_base: u32,
) -> Result<(PublicationRow, RowValidation)> {
    if record.id.trim().is_empty() {
        return Err(Error::Validation("record has no identifier".to_string()));
    }
    if record.title.trim().is_empty() {
        return Err(Error::Validation(format!(
            "record {} has no title",
            record.id
        )));
    }

    let code = funding_code.unwrap_or(funding_code_base + number);
    let row = PublicationRow {
        number,
        period: format_period(record.year.as_deref(), record.month.as_deref()),
        location: location.to_string(),
        people: record.authors.join(", "),
        funding: format!("JA {}", code),
        citation: format_citation(record),
    };
    let validation = validate_row(&row);
    Ok((row, validation))
}

/// Format the period cell as `YYYY/MM`.
///
/// Month names (three-letter or full, English) map to two-digit numeric
/// form; an unknown month yields `??`, a missing year `????/??`.
pub fn format_period(year: Option<&str>, month: Option<&str>) -> String {
    let Some(year) = year.filter(|y| !y.trim().is_empty()) else {
        return "????/??".to_string();
    };
    let Some(month) = month.filter(|m| !m.trim().is_empty()) else {
        return format!("{}/??", year);
    };

    let number = match month_number(month) {
        Some(n) => n.to_string(),
        None if month.len() <= 2 && month.chars().all(|c| c.is_ascii_digit()) => {
            format!("{:0>2}", month)
        }
        None => "??".to_string(),
    };
    format!("{}/{}", year, number)
}

fn month_number(month: &str) -> Option<&'static str> {
    match month {
        "Jan" | "January" => Some("01"),
        "Feb" | "February" => Some("02"),
        "Mar" | "March" => Some("03"),
        "Apr" | "April" => Some("04"),
        "May" => Some("05"),
        "Jun" | "June" => Some("06"),
        "Jul" | "July" => Some("07"),
        "Aug" | "August" => Some("08"),
        "Sep" | "September" => Some("09"),
        "Oct" | "October" => Some("10"),
        "Nov" | "November" => Some("11"),
        "Dec" | "December" => Some("12"),
        _ => None,
    }
}

/// Citation cell: title, then `. DOI: <doi>`, then the escaped record
/// link.
fn format_citation(record: &BibRecord) -> String {
    let mut citation = record.title.trim().to_string();
    if let Some(doi) = record.doi.as_deref().filter(|d| !d.is_empty()) {
        citation.push_str(". DOI: ");
        citation.push_str(doi);
    }
    if !record.id.is_empty() {
        citation.push_str(&format!(
            " &lt;https://pubmed.ncbi.nlm.nih.gov/{}/&gt;",
            record.id
        ));
    }
    citation
}

/// Non-fatal quality findings for a mapped row.
pub fn validate_row(row: &PublicationRow) -> RowValidation {
    let mut warnings = Vec::new();
    if row.location.is_empty() || row.location == "TBD" {
        warnings.push("location not resolved".to_string());
    }
    if row.period.contains("??") {
        warnings.push("incomplete publication date".to_string());
    }
    if row.people.is_empty() {
        warnings.push("no authors".to_string());
    }
    RowValidation { warnings }
}

/// Render a row as table markup. All cells except the citation are
/// escaped; the citation carries pre-escaped link entities.
pub fn row_markup(row: &PublicationRow) -> String {
    format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        row.number,
        escape_html(&row.period),
        escape_html(&row.location),
        escape_html(&row.people),
        escape_html(&row.funding),
        row.citation,
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BibRecord {
        BibRecord {
            id: "12345678".to_string(),
            title: "COVID-19 chest CT findings in pediatric patients".to_string(),
            authors: vec![
                "Schmidt M".to_string(),
                "Müller K".to_string(),
                "Wagner S".to_string(),
            ],
            venue: "European Radiology".to_string(),
            year: Some("2023".to_string()),
            month: Some("Mar".to_string()),
            doi: Some("10.1007/s00330-023-09234-x".to_string()),
            ..BibRecord::default()
        }
    }

    #[test]
    fn month_names_map_to_two_digits() {
        assert_eq!(format_period(Some("2023"), Some("Mar")), "2023/03");
        assert_eq!(format_period(Some("2023"), Some("March")), "2023/03");
        assert_eq!(format_period(Some("2023"), Some("Dec")), "2023/12");
        assert_eq!(format_period(Some("2023"), Some("Frimaire")), "2023/??");
    }

    #[test]
    fn numeric_months_are_zero_padded() {
        assert_eq!(format_period(Some("2023"), Some("3")), "2023/03");
        assert_eq!(format_period(Some("2023"), Some("11")), "2023/11");
    }

    #[test]
    fn missing_parts_become_placeholders() {
        assert_eq!(format_period(None, Some("Mar")), "????/??");
        assert_eq!(format_period(Some("2023"), None), "2023/??");
        assert_eq!(format_period(None, None), "????/??");
    }

    #[test]
    fn mapped_row_carries_all_fields() {
        let (row, validation) =
            map_record(&record(), 63, "UK Magdeburg", None, 70_000).unwrap();
        assert_eq!(row.number, 63);
        assert_eq!(row.period, "2023/03");
        assert_eq!(row.location, "UK Magdeburg");
        assert_eq!(row.people, "Schmidt M, Müller K, Wagner S");
        assert_eq!(row.funding, "JA 70063");
        assert_eq!(
            row.citation,
            "COVID-19 chest CT findings in pediatric patients. \
             DOI: 10.1007/s00330-023-09234-x \
             &lt;https://pubmed.ncbi.nlm.nih.gov/12345678/&gt;"
        );
        assert!(validation.warnings.is_empty());
    }

    #[test]
    fn explicit_funding_code_overrides_auto() {
        let (row, _) = map_record(&record(), 63, "UK Jena", Some(71_200), 70_000).unwrap();
        assert_eq!(row.funding, "JA 71200");
    }

    #[test]
    fn citation_without_doi_keeps_link() {
        let mut r = record();
        r.doi = None;
        let (row, _) = map_record(&r, 1, "UK Jena", None, 70_000).unwrap();
        assert!(!row.citation.contains("DOI:"));
        assert!(row
            .citation
            .ends_with("&lt;https://pubmed.ncbi.nlm.nih.gov/12345678/&gt;"));
    }

    #[test]
    fn unresolved_fields_only_warn() {
        let mut r = record();
        r.authors.clear();
        r.year = None;
        let (_, validation) = map_record(&r, 1, "TBD", None, 70_000).unwrap();
        assert!(validation
            .warnings
            .iter()
            .any(|w| w.contains("location")));
        assert!(validation.warnings.iter().any(|w| w.contains("date")));
        assert!(validation.warnings.iter().any(|w| w.contains("authors")));
    }

    #[test]
    fn missing_title_is_rejected() {
        let mut r = record();
        r.title = "  ".to_string();
        let err = map_record(&r, 1, "UK Jena", None, 70_000).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn row_markup_escapes_data_cells() {
        let row = PublicationRow {
            number: 3,
            period: "2023/03".to_string(),
            location: "UK <Jena>".to_string(),
            people: "Schmidt M & Wagner S".to_string(),
            funding: "JA 70003".to_string(),
            citation: "Title &lt;https://pubmed.ncbi.nlm.nih.gov/1/&gt;".to_string(),
        };
        let markup = row_markup(&row);
        assert!(markup.contains("<td>UK &lt;Jena&gt;</td>"));
        assert!(markup.contains("<td>Schmidt M &amp; Wagner S</td>"));
        // the citation keeps its pre-escaped entities untouched
        assert!(markup.contains("<td>Title &lt;https://pubmed.ncbi.nlm.nih.gov/1/&gt;</td>"));
        assert!(markup.starts_with("<tr><td>3</td>"));
    }
}
