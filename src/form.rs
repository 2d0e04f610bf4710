// 📝 Form Validation
// Raw form fields -> validated BirthRecord, reporting every problem at once

use crate::numerology::{has_chaldean_letters, BirthRecord, Gender};
use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref DOB_PATTERN: Regex = Regex::new(r"^\d{1,2}-\d{1,2}-\d{4}$").unwrap();
    static ref TIME_PATTERN: Regex = Regex::new(r"^\d{2}:\d{2}:\d{2}$").unwrap();
    static ref PHONE_PATTERN: Regex = Regex::new(r"^\+\d{1,3}-\d{10}$").unwrap();
}

// ============================================================================
// RAW SUBMISSION
// ============================================================================

/// Form fields exactly as typed. Also the query string of the PDF/CSV links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSubmission {
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub gender: String,
    pub birth_time: String,
    pub place_of_birth: String,
    pub phone_number: String,
}

impl RawSubmission {
    /// Required fields that are still blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.first_name.trim().is_empty() {
            missing.push("first_name");
        }
        if self.last_name.trim().is_empty() {
            missing.push("last_name");
        }
        if self.dob.trim().is_empty() {
            missing.push("dob");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

// ============================================================================
// VALIDATION ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<BirthRecord, Vec<ValidationError>>;

// ============================================================================
// FIELD PARSERS
// ============================================================================

/// DD-MM-YYYY, must be a real calendar date
pub fn parse_dob(text: &str) -> Result<NaiveDate, ValidationError> {
    let text = text.trim();
    if !DOB_PATTERN.is_match(text) {
        return Err(ValidationError::new(
            "dob",
            "Invalid date format. Please enter in DD-MM-YYYY format.",
        ));
    }
    NaiveDate::parse_from_str(text, "%d-%m-%Y")
        .map_err(|_| ValidationError::new("dob", format!("{} is not a valid calendar date", text)))
}

/// HH:MM:SS
pub fn parse_birth_time(text: &str) -> Result<NaiveTime, ValidationError> {
    let text = text.trim();
    if !TIME_PATTERN.is_match(text) {
        return Err(ValidationError::new(
            "birth_time",
            "Invalid time format. Please enter in HH:MM:SS format.",
        ));
    }
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .map_err(|_| ValidationError::new("birth_time", format!("{} is not a valid time of day", text)))
}

/// +<country code>-<10 digits>
pub fn is_valid_phone(text: &str) -> bool {
    PHONE_PATTERN.is_match(text.trim())
}

fn optional(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// VALIDATE
// ============================================================================

/// Run every check; date and time are validated independently of each other
pub fn validate(raw: &RawSubmission) -> ValidationResult {
    let mut errors = Vec::new();

    for field in raw.missing_fields() {
        errors.push(ValidationError::new(field, "Required field is empty"));
    }

    for (field, value) in [("first_name", &raw.first_name), ("last_name", &raw.last_name)] {
        if !value.trim().is_empty() && !has_chaldean_letters(value) {
            errors.push(ValidationError::new(
                field,
                "Name must contain at least one Latin letter (accents are fine)",
            ));
        }
    }

    let dob = if raw.dob.trim().is_empty() {
        None
    } else {
        match parse_dob(&raw.dob) {
            Ok(date) => Some(date),
            Err(e) => {
                errors.push(e);
                None
            }
        }
    };

    let birth_time = match optional(&raw.birth_time) {
        Some(text) => match parse_birth_time(&text) {
            Ok(time) => Some(time),
            Err(e) => {
                errors.push(e);
                None
            }
        },
        None => None,
    };

    let phone_number = optional(&raw.phone_number);
    if let Some(phone) = &phone_number {
        if !is_valid_phone(phone) {
            errors.push(ValidationError::new(
                "phone_number",
                "Invalid phone number. Expected +<country code>-<10 digits>, e.g. +91-9876543210",
            ));
        }
    }

    let gender = Gender::parse(&raw.gender);
    if gender.is_none() {
        errors.push(ValidationError::new(
            "gender",
            format!("Unknown gender option: {}", raw.gender),
        ));
    }

    match (dob, gender) {
        (Some(date_of_birth), Some(gender)) if errors.is_empty() => Ok(BirthRecord {
            first_name: raw.first_name.trim().to_string(),
            last_name: raw.last_name.trim().to_string(),
            date_of_birth,
            gender,
            birth_time,
            place_of_birth: optional(&raw.place_of_birth),
            phone_number,
        }),
        _ => Err(errors),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_submission() -> RawSubmission {
        RawSubmission {
            first_name: "Mohan".to_string(),
            last_name: "Kumar".to_string(),
            dob: "25-11-1987".to_string(),
            gender: "Male".to_string(),
            birth_time: "10:45:00".to_string(),
            place_of_birth: "New Delhi, India".to_string(),
            phone_number: "+91-9876543210".to_string(),
        }
    }

    #[test]
    fn test_valid_submission() {
        let record = validate(&create_test_submission()).unwrap();

        assert_eq!(record.full_name(), "Mohan Kumar");
        assert_eq!(record.dob_text(), "25-11-1987");
        assert_eq!(record.gender, Gender::Male);
        assert_eq!(record.birth_time, NaiveTime::from_hms_opt(10, 45, 0));
        assert_eq!(record.phone_number.as_deref(), Some("+91-9876543210"));
    }

    #[test]
    fn test_missing_required_fields() {
        let mut raw = create_test_submission();
        raw.first_name = "  ".to_string();
        raw.dob = String::new();

        assert!(!raw.is_complete());
        let errors = validate(&raw).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "first_name"));
        assert!(errors.iter().any(|e| e.field == "dob"));
    }

    #[test]
    fn test_invalid_date_format() {
        let mut raw = create_test_submission();
        raw.dob = "1987-11-25".to_string();

        let errors = validate(&raw).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "dob");
    }

    #[test]
    fn test_invalid_calendar_date() {
        assert!(parse_dob("31-02-1990").is_err());
        assert!(parse_dob("29-02-2000").is_ok());
        assert!(parse_dob("29-02-1900").is_err());
        assert_eq!(parse_dob("5-3-1990").unwrap(), NaiveDate::from_ymd_opt(1990, 3, 5).unwrap());
    }

    #[test]
    fn test_date_and_time_checked_independently() {
        let mut raw = create_test_submission();
        raw.dob = "99-99-1999".to_string();
        raw.birth_time = "25:61".to_string();

        let errors = validate(&raw).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "dob"));
        assert!(errors.iter().any(|e| e.field == "birth_time"));
    }

    #[test]
    fn test_birth_time_optional_but_checked() {
        let mut raw = create_test_submission();
        raw.birth_time = String::new();
        assert_eq!(validate(&raw).unwrap().birth_time, None);

        assert!(parse_birth_time("10:45").is_err());
        assert!(parse_birth_time("24:00:00").is_err());
        assert!(parse_birth_time("23:59:59").is_ok());
    }

    #[test]
    fn test_phone_pattern() {
        assert!(is_valid_phone("+91-9876543210"));
        assert!(is_valid_phone("+1-2025550143"));
        assert!(!is_valid_phone("9876543210"));
        assert!(!is_valid_phone("+91-98765"));
        assert!(!is_valid_phone("+9123-9876543210"));

        let mut raw = create_test_submission();
        raw.phone_number = "12345".to_string();
        let errors = validate(&raw).unwrap_err();
        assert_eq!(errors[0].field, "phone_number");
    }

    #[test]
    fn test_phone_optional() {
        let mut raw = create_test_submission();
        raw.phone_number = " ".to_string();
        assert_eq!(validate(&raw).unwrap().phone_number, None);
    }

    #[test]
    fn test_gender_options() {
        let mut raw = create_test_submission();
        raw.gender = "NA".to_string();
        assert_eq!(validate(&raw).unwrap().gender, Gender::Unspecified);

        raw.gender = "other".to_string();
        let errors = validate(&raw).unwrap_err();
        assert_eq!(errors[0].field, "gender");
    }

    #[test]
    fn test_name_needs_letters() {
        let mut raw = create_test_submission();
        raw.last_name = "123".to_string();
        let errors = validate(&raw).unwrap_err();
        assert_eq!(errors[0].field, "last_name");
    }

    #[test]
    fn test_name_needs_scoreable_letters() {
        let mut raw = create_test_submission();
        raw.first_name = "Иван".to_string();
        raw.last_name = "Петров".to_string();
        let errors = validate(&raw).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["first_name", "last_name"]);

        raw.first_name = "Émile".to_string();
        raw.last_name = "Zola".to_string();
        let record = validate(&raw).unwrap();
        assert_eq!(record.first_name, "Émile");
    }
}
