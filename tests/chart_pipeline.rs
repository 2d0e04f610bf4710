// Form input → chart → storage → export, without the web layer

use birth_chart::{
    export_submissions, get_all_submissions, get_submission_stats, setup_database,
    upsert_submission, validate, BirthChart, CellStatus, RawSubmission, UpsertOutcome,
};
use rusqlite::Connection;

fn raw(first: &str, dob: &str, gender: &str, phone: &str) -> RawSubmission {
    RawSubmission {
        first_name: first.to_string(),
        last_name: "Kumar".to_string(),
        dob: dob.to_string(),
        gender: gender.to_string(),
        phone_number: phone.to_string(),
        ..RawSubmission::default()
    }
}

#[test]
fn test_submission_pipeline() {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();

    let inputs = [
        raw("Mohan", "25-11-1987", "Male", "+91-9000000001"),
        raw("Priya", "5-3-1992", "Female", "+91-9000000002"),
        raw("Sam", "01-01-2000", "NA", "+1-2025550143"),
    ];

    for input in &inputs {
        let record = validate(input).unwrap();
        let chart = BirthChart::compute(&record).unwrap();
        assert_eq!(upsert_submission(&conn, &record, &chart).unwrap(), UpsertOutcome::Inserted);
    }

    let stored = get_all_submissions(&conn).unwrap();
    assert_eq!(stored.len(), 3);

    let priya = stored.iter().find(|s| s.first_name == "Priya").unwrap();
    // Single-digit day and month are stored zero-padded
    assert_eq!(priya.dob, "05-03-1992");
    assert_eq!(priya.driver, 5);

    let stats = get_submission_stats(&conn).unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_kuaa.iter().find(|(k, _)| k.is_none()).map(|(_, c)| *c), Some(1));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("submissions.csv");
    let written = export_submissions(&path, &stored).unwrap();
    assert_eq!(written, 3);

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "First_Name");
    assert_eq!(reader.records().count(), 3);
}

#[test]
fn test_chart_grid_for_known_date() {
    let record = validate(&raw("Mohan", "25-11-1987", "Male", "")).unwrap();
    let chart = BirthChart::compute(&record).unwrap();

    // 2,5,1,1,1,9,8,7 plus driver 7, conductor 7, kuaa 4
    assert_eq!(chart.driver, 7);
    assert_eq!(chart.conductor, 7);
    assert_eq!(chart.kuaa, Some(4));
    assert_eq!(chart.grid.status(1), CellStatus::Repeated(3));
    assert_eq!(chart.grid.status(7), CellStatus::Repeated(3));
    assert_eq!(chart.grid.status(3), CellStatus::Missing);
    assert_eq!(chart.grid.missing(), vec![3, 6]);
}

#[test]
fn test_invalid_input_collects_every_error() {
    let errors = validate(&raw("123", "32-13-1990", "Other", "9876543210")).unwrap_err();
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();

    assert!(fields.contains(&"first_name"));
    assert!(fields.contains(&"dob"));
    assert!(fields.contains(&"gender"));
    assert!(fields.contains(&"phone_number"));
}
