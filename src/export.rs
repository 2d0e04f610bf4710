// 📤 Export
// Birth chart -> CSV / PDF, stored submissions -> CSV

use crate::db::Submission;
use crate::numerology::BirthChart;
use crate::pdf::{fit_text, Font, PdfPage, BEIGE, BLACK, GREY, LETTER_HEIGHT, LETTER_WIDTH, WHITESMOKE};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub const PDF_FILE_NAME: &str = "lo_shu_grid_birth_chart.pdf";
pub const CSV_FILE_NAME: &str = "lo_shu_grid_birth_chart.csv";

/// The "Final Birth Chart" table: (Attribute, Value)
pub fn chart_rows(chart: &BirthChart) -> Vec<(String, String)> {
    let mut rows = vec![
        ("Full Name".to_string(), chart.full_name.clone()),
        ("Date of Birth".to_string(), chart.date_of_birth.clone()),
        ("Gender".to_string(), chart.gender.to_string()),
        ("Driver Value".to_string(), chart.driver.to_string()),
        ("Conductor Value".to_string(), chart.conductor.to_string()),
        ("Kunvar Value".to_string(), chart.kuaa_display()),
        ("Chaldean Name Number".to_string(), chart.chaldean.to_string()),
    ];

    for (digit, count) in chart.grid.iter() {
        rows.push((format!("Number {}", digit), count.to_string()));
    }

    rows
}

// ============================================================================
// CSV
// ============================================================================

pub fn write_chart_csv<W: Write>(writer: W, chart: &BirthChart) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["Attribute", "Value"])?;
    for (attribute, value) in chart_rows(chart) {
        wtr.write_record([attribute, value])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn chart_csv_bytes(chart: &BirthChart) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_chart_csv(&mut buffer, chart)?;
    Ok(buffer)
}

#[derive(Debug, Serialize)]
struct SubmissionRow<'a> {
    #[serde(rename = "First_Name")]
    first_name: &'a str,
    #[serde(rename = "Last_Name")]
    last_name: &'a str,
    #[serde(rename = "Date_Of_Birth")]
    dob: &'a str,
    #[serde(rename = "Birth_Time")]
    birth_time: &'a str,
    #[serde(rename = "Place_Of_Birth")]
    place_of_birth: &'a str,
    #[serde(rename = "Phone_Number")]
    phone_number: &'a str,
    #[serde(rename = "Gender")]
    gender: &'a str,
    #[serde(rename = "Driver")]
    driver: u8,
    #[serde(rename = "Conductor")]
    conductor: u8,
    #[serde(rename = "Kunvar")]
    kuaa: String,
    #[serde(rename = "Chaldean")]
    chaldean: u32,
    #[serde(rename = "Submitted_At")]
    submitted_at: String,
    #[serde(rename = "Updated_At")]
    updated_at: String,
}

impl<'a> From<&'a Submission> for SubmissionRow<'a> {
    fn from(s: &'a Submission) -> Self {
        SubmissionRow {
            first_name: &s.first_name,
            last_name: &s.last_name,
            dob: &s.dob,
            birth_time: s.birth_time.as_deref().unwrap_or(""),
            place_of_birth: s.place_of_birth.as_deref().unwrap_or(""),
            phone_number: &s.phone_number,
            gender: &s.gender,
            driver: s.driver,
            conductor: s.conductor,
            kuaa: s.kuaa_display(),
            chaldean: s.chaldean,
            submitted_at: s.submitted_at.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

/// Returns the number of data rows written
pub fn write_submissions_csv<W: Write>(writer: W, submissions: &[Submission]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    for submission in submissions {
        wtr.serialize(SubmissionRow::from(submission))
            .context("Failed to write submission row")?;
    }
    wtr.flush()?;
    Ok(submissions.len())
}

pub fn submissions_csv_bytes(submissions: &[Submission]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_submissions_csv(&mut buffer, submissions)?;
    Ok(buffer)
}

pub fn export_submissions(path: &Path, submissions: &[Submission]) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    write_submissions_csv(file, submissions)
}

// ============================================================================
// PDF
// ============================================================================

const COL_WIDTH: f32 = 200.0;
const ROW_HEIGHT: f32 = 20.0;
const CELL_PADDING: f32 = 8.0;
const PAGE_MARGIN: f32 = 72.0;

/// Greeting, two-column chart table with a grey header row, closing note
pub fn render_chart_pdf(chart: &BirthChart) -> Vec<u8> {
    let mut page = PdfPage::new();
    let center = LETTER_WIDTH / 2.0;
    let left = center - COL_WIDTH;

    page.text_centered(
        center,
        LETTER_HEIGHT - 72.0,
        Font::HelveticaBold,
        18.0,
        BLACK,
        &fit_text(&format!("Namaste, {}", chart.full_name), 18.0, LETTER_WIDTH - 2.0 * PAGE_MARGIN),
    );
    page.text(left, LETTER_HEIGHT - 108.0, Font::Helvetica, 11.0, BLACK, "Here is your final Birth Chart:");

    let mut rows = vec![("Attribute".to_string(), "Value".to_string())];
    rows.extend(chart_rows(chart));

    let mut top = LETTER_HEIGHT - 126.0;
    for (i, (attribute, value)) in rows.iter().enumerate() {
        let y = top - ROW_HEIGHT;
        let (fill, font, color) = if i == 0 {
            (GREY, Font::HelveticaBold, WHITESMOKE)
        } else {
            (BEIGE, Font::Helvetica, BLACK)
        };

        for (col, text) in [attribute, value].into_iter().enumerate() {
            let x = left + col as f32 * COL_WIDTH;
            page.fill_rect(x, y, COL_WIDTH, ROW_HEIGHT, fill);
            page.stroke_rect(x, y, COL_WIDTH, ROW_HEIGHT, 1.0, BLACK);
            let text = fit_text(text, 10.0, COL_WIDTH - 2.0 * CELL_PADDING);
            page.text_centered(x + COL_WIDTH / 2.0, y + 6.0, font, 10.0, color, &text);
        }

        top = y;
    }

    page.text(left, top - 30.0, Font::Helvetica, 11.0, BLACK, "Thank you for choosing us for this service.");
    page.text(left, top - 46.0, Font::HelveticaBold, 11.0, BLACK, "Predict Me");

    page.finish()
}

pub fn write_chart_pdf(path: &Path, chart: &BirthChart) -> Result<()> {
    std::fs::write(path, render_chart_pdf(chart))
        .map_err(|e| anyhow!("Failed to write PDF {:?}: {}", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerology::{BirthRecord, Gender};
    use chrono::{NaiveDate, Utc};

    fn create_test_chart(gender: Gender) -> BirthChart {
        let record = BirthRecord {
            first_name: "Mohan".to_string(),
            last_name: "Kumar".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1987, 11, 25).unwrap(),
            gender,
            birth_time: None,
            place_of_birth: None,
            phone_number: None,
        };
        BirthChart::compute(&record).unwrap()
    }

    #[test]
    fn test_chart_rows() {
        let rows = chart_rows(&create_test_chart(Gender::Male));

        assert_eq!(rows.len(), 16);
        assert_eq!(rows[0], ("Full Name".to_string(), "Mohan Kumar".to_string()));
        assert_eq!(rows[5], ("Kunvar Value".to_string(), "4".to_string()));
        assert_eq!(rows[7], ("Number 1".to_string(), "3".to_string()));
    }

    #[test]
    fn test_chart_csv_not_available() {
        let bytes = chart_csv_bytes(&create_test_chart(Gender::Unspecified)).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("Attribute,Value\n"));
        assert!(text.contains("Kunvar Value,Not Available\n"));
        assert!(text.contains("Gender,NA\n"));
    }

    #[test]
    fn test_submissions_csv() {
        let now = Utc::now();
        let submission = Submission {
            id: 1,
            first_name: "Mohan".to_string(),
            last_name: "Kumar".to_string(),
            dob: "25-11-1987".to_string(),
            birth_time: None,
            place_of_birth: Some("New Delhi, India".to_string()),
            phone_number: "+91-9876543210".to_string(),
            gender: "Male".to_string(),
            driver: 7,
            conductor: 7,
            kuaa: Some(4),
            chaldean: 1,
            submitted_at: now,
            updated_at: now,
        };

        let bytes = submissions_csv_bytes(&[submission]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert!(lines.next().unwrap().starts_with("First_Name,Last_Name,Date_Of_Birth"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"New Delhi, India\""));
        assert!(row.contains("+91-9876543210"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_render_chart_pdf() {
        let bytes = render_chart_pdf(&create_test_chart(Gender::Unspecified));
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("(Namaste, Mohan Kumar)"));
        assert!(text.contains("(Not Available)"));
        assert!(text.contains("(Predict Me)"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_render_chart_pdf_shortens_long_names() {
        let mut chart = create_test_chart(Gender::Male);
        chart.full_name = "Maximilian Alexander Fitzgerald Montgomery-Wellington".to_string();

        let bytes = render_chart_pdf(&chart);
        let text = String::from_utf8_lossy(&bytes);

        // the table cell holds a shortened name, never the full one
        assert!(!text.contains("(Maximilian Alexander Fitzgerald Montgomery-Wellington)"));
        assert!(text.contains("(Maximilian"));
        assert!(text.contains("...)"));
    }
}
