//! End-to-end scenarios over the library: mapping, editing, analysis, and
//! the backup store working together the way the CLI drives them.

use tempfile::TempDir;

use pubsync::backup::BackupStore;
use pubsync::editor;
use pubsync::error::Error;
use pubsync::mapper;
use pubsync::models::BibRecord;
use pubsync::table;

fn two_row_table() -> String {
    concat!(
        "<table><tbody>",
        "<tr><th>Nr.</th><th>Jahr/Monat</th><th>Standort</th>",
        "<th>Personen</th><th>F&ouml;rderhinweis</th><th>PubMed DOI</th></tr>",
        "<tr><td>1</td><td>2021/03</td><td>UK Magdeburg</td><td>Surov A</td>",
        "<td>JA 70001</td><td>First paper &lt;https://pubmed.ncbi.nlm.nih.gov/1001/&gt;</td></tr>",
        "<tr><td>2</td><td>2022/11</td><td>UK Jena</td><td>Pech M</td>",
        "<td>JA 70002</td><td>Second paper &lt;https://pubmed.ncbi.nlm.nih.gov/1002/&gt;</td></tr>",
        "</tbody></table>"
    )
    .to_string()
}

#[test]
fn mapped_row_lands_last_with_sequence_three() {
    let content = two_row_table();
    let overview = table::overview(&content);
    assert_eq!(overview.data_rows, 2);
    assert_eq!(overview.next_number, 3);

    let record = BibRecord {
        id: "1003".to_string(),
        title: "COVID-19 chest CT in a multicenter cohort".to_string(),
        authors: vec!["Schmidt M".to_string(), "Wagner S".to_string()],
        venue: "European Radiology".to_string(),
        year: Some("2023".to_string()),
        month: Some("Mar".to_string()),
        doi: Some("10.1000/xyz".to_string()),
        ..BibRecord::default()
    };

    let (row, validation) =
        mapper::map_record(&record, overview.next_number, "UK Dresden", None, 70_000).unwrap();
    assert!(validation.warnings.is_empty());

    let updated = editor::insert_row(&content, &mapper::row_markup(&row)).unwrap();
    let after = table::overview(&updated);
    assert_eq!(after.data_rows, 3);
    assert_eq!(after.total_rows, 4); // header + 3 data rows
    assert_eq!(after.highest_number, 3);

    // the new row is the last one
    let rows = editor::rows(&updated);
    let last = rows.last().unwrap();
    assert!(last.contains("<td>3</td>"));
    assert!(last.contains("2023/03"));
    assert!(last.contains("JA 70003"));

    // and its identifier is now part of the published set
    assert!(table::linked_record_ids(&updated).contains("1003"));
}

#[test]
fn insert_and_remove_roundtrip_is_byte_identical() {
    let content = two_row_table();
    let row = "<tr><td>3</td><td>2023/01</td><td>UK Dresden</td><td>Schmidt M</td>\
               <td>JA 70003</td><td>Third paper</td></tr>";

    let inserted = editor::insert_row(&content, row).unwrap();
    let restored = editor::remove_row(&inserted, row).unwrap();
    assert_eq!(restored, content);

    // removing again from the clean result is a no-op failure
    assert!(matches!(
        editor::remove_row(&restored, row),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn backup_store_lists_new_snapshot_first() {
    let tmp = TempDir::new().unwrap();
    let store = BackupStore::new(tmp.path());

    let backup = store.save("<table>...</table>", "before_cleanup").unwrap();
    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].file_name(), backup.file_name());
    assert_eq!(listed[0].label, "before_cleanup");
    assert_eq!(store.restore(&listed[0]).unwrap(), "<table>...</table>");
}

#[test]
fn header_final_row_is_protected_and_content_unchanged() {
    let content = "<table><tbody><tr><th>Nr.</th><th>Standort</th></tr></tbody></table>";
    let err = editor::remove_last_data_row(content).unwrap_err();
    assert!(matches!(err, Error::HeaderProtected));
    // the failed call handed back nothing — the caller's content is untouched
    assert_eq!(
        content,
        "<table><tbody><tr><th>Nr.</th><th>Standort</th></tr></tbody></table>"
    );
}

#[test]
fn cleanup_after_test_row_restores_prior_state() {
    let content = two_row_table();
    let with_placeholder = editor::insert_row(&content, editor::PLACEHOLDER_ROW).unwrap();
    assert_ne!(with_placeholder, content);

    let patterns = vec![editor::PLACEHOLDER_ROW.to_string()];
    let (cleaned, removed) = editor::strip_noise_rows(&with_placeholder, &patterns);
    assert_eq!(removed, 1);
    assert_eq!(table::overview(&cleaned).data_rows, 2);

    let (again, removed_again) = editor::strip_noise_rows(&cleaned, &patterns);
    assert_eq!(removed_again, 0);
    assert_eq!(again, cleaned);
}
