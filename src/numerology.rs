// 🔢 Numerology Engine
// Pure functions: birth date + name + gender -> derived numbers and Lo Shu grid

use crate::error::{BirthChartError, Result};
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Master numbers survive reduction in the Chaldean name number only
pub const MASTER_NUMBERS: [u32; 2] = [11, 22];

/// Kuaa offsets: male = 11 - Y, female = 4 + Y
const MALE_KUAA_BASE: u32 = 11;
const FEMALE_KUAA_OFFSET: u32 = 4;

/// Classic 3x3 Lo Shu layout
pub const LO_SHU_LAYOUT: [[u8; 3]; 3] = [[4, 9, 2], [3, 5, 7], [8, 1, 6]];

pub const INTERPRETATIONS: [(u8, &str); 9] = [
    (1, "Leadership, independence, ambition, and self-confidence."),
    (2, "Cooperation, sensitivity, and diplomacy."),
    (3, "Creativity, joy, and social interaction."),
    (4, "Practicality, stability, and responsibility."),
    (5, "Freedom, adventure, and adaptability."),
    (6, "Love, family, and nurturing."),
    (7, "Spirituality, introspection, and analysis."),
    (8, "Material success, authority, and power."),
    (9, "Compassion, humanitarianism, and selflessness."),
];

/// Trait phrase for a digit 1-9
pub fn interpretation(digit: u8) -> Option<&'static str> {
    INTERPRETATIONS
        .iter()
        .find(|(d, _)| *d == digit)
        .map(|(_, text)| *text)
}

// ============================================================================
// INPUT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Unspecified,
}

impl Gender {
    /// Accepts the form's radio values; "NA" is the legacy spelling of Unspecified
    pub fn parse(value: &str) -> Option<Gender> {
        match value.trim().to_lowercase().as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            "na" | "unspecified" | "" => Some(Gender::Unspecified),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Unspecified => "NA",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated submission, ready for the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthRecord {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub birth_time: Option<NaiveTime>,
    pub place_of_birth: Option<String>,
    pub phone_number: Option<String>,
}

impl BirthRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Date of birth as DD-MM-YYYY
    pub fn dob_text(&self) -> String {
        self.date_of_birth.format("%d-%m-%Y").to_string()
    }
}

// ============================================================================
// DIGIT REDUCTION
// ============================================================================

pub fn digit_sum(mut value: u32) -> u32 {
    let mut sum = 0;
    while value > 0 {
        sum += value % 10;
        value /= 10;
    }
    sum
}

/// ASCII digits of a text, in order
pub fn digits_of(text: &str) -> Vec<u8> {
    text.bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect()
}

fn reduce(mut value: u32) -> u8 {
    while value >= 10 {
        value = digit_sum(value);
    }
    value as u8
}

/// Sum the digits, then keep summing until one digit remains.
/// Empty input is rejected rather than treated as 0.
pub fn digital_root(digits: &[u8]) -> Result<u8> {
    if digits.is_empty() {
        return Err(BirthChartError::EmptyDigits);
    }
    let total: u32 = digits.iter().map(|&d| d as u32).sum();
    Ok(reduce(total))
}

/// Like `digital_root`, but stops as soon as the running value is 11 or 22
pub fn digital_root_preserve_master(mut value: u32) -> u32 {
    loop {
        if value < 10 || MASTER_NUMBERS.contains(&value) {
            return value;
        }
        value = digit_sum(value);
    }
}

// ============================================================================
// DERIVED NUMBERS
// ============================================================================

/// Driver: digital root of the day of month
pub fn driver(day: u32) -> u8 {
    reduce(day)
}

/// Conductor: digital root of every digit in the date of birth text
pub fn conductor(dob: &str) -> Result<u8> {
    digital_root(&digits_of(dob))
}

/// Kuaa (Kunvar): reduce the year, apply the gender offset, reduce again.
/// Absent when gender is unspecified.
pub fn kuaa(year: i32, gender: Gender) -> Option<u8> {
    let year_root = reduce(year.unsigned_abs()) as u32;
    let raw = match gender {
        Gender::Male => MALE_KUAA_BASE - year_root,
        Gender::Female => FEMALE_KUAA_OFFSET + year_root,
        Gender::Unspecified => return None,
    };
    Some(reduce(raw))
}

/// Base letter of an accented Latin capital; anything else is returned as is
fn fold_latin(letter: char) -> char {
    match letter {
        'À'..='Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => 'C',
        'Ð' | 'Ď' | 'Đ' => 'D',
        'È'..='Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => 'G',
        'Ĥ' | 'Ħ' => 'H',
        'Ì'..='Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => 'I',
        'Ĵ' => 'J',
        'Ķ' => 'K',
        'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => 'L',
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' => 'N',
        'Ò'..='Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => 'O',
        'Ŕ' | 'Ŗ' | 'Ř' => 'R',
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => 'S',
        'Ţ' | 'Ť' | 'Ŧ' => 'T',
        'Ù'..='Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => 'U',
        'Ŵ' => 'W',
        'Ý' | 'Ŷ' | 'Ÿ' => 'Y',
        'Ź' | 'Ż' | 'Ž' => 'Z',
        other => other,
    }
}

/// Chaldean letter value. Accented Latin letters score as their base letter;
/// letters with no Latin base count 0.
pub fn chaldean_value(letter: char) -> u32 {
    let upper = letter.to_uppercase().next().unwrap_or(letter);
    match fold_latin(upper) {
        'A' | 'I' | 'J' | 'Q' | 'Y' => 1,
        'B' | 'K' | 'R' => 2,
        'C' | 'G' | 'L' | 'S' => 3,
        'D' | 'M' | 'T' => 4,
        'E' | 'H' | 'N' | 'X' => 5,
        'U' | 'V' | 'W' => 6,
        'O' | 'Z' => 7,
        'F' | 'P' => 8,
        _ => 0,
    }
}

/// True when at least one character scores in the Chaldean table
pub fn has_chaldean_letters(text: &str) -> bool {
    text.chars().any(|c| chaldean_value(c) > 0)
}

/// Chaldean name number: one of 1-9, 11 or 22
pub fn chaldean_number(name: &str) -> Result<u32> {
    // every scoring letter is at least 1, so a non-empty sum never reduces to 0
    let total: u32 = name.to_uppercase().chars().map(chaldean_value).sum();

    if total == 0 {
        return Err(BirthChartError::NoLetters(name.to_string()));
    }

    Ok(digital_root_preserve_master(total))
}

// ============================================================================
// LO SHU GRID
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    Missing,
    Present,
    Repeated(u32),
}

impl CellStatus {
    pub fn from_count(count: u32) -> Self {
        match count {
            0 => CellStatus::Missing,
            1 => CellStatus::Present,
            n => CellStatus::Repeated(n),
        }
    }

    pub fn label(&self) -> String {
        match self {
            CellStatus::Missing => "Missing".to_string(),
            CellStatus::Present => "Present".to_string(),
            CellStatus::Repeated(n) => format!("Repeated {} times", n),
        }
    }

    /// CSS class used by the HTML grid
    pub fn css_class(&self) -> &'static str {
        match self {
            CellStatus::Missing => "missing",
            CellStatus::Present => "normal",
            CellStatus::Repeated(_) => "repeated",
        }
    }
}

/// Occurrence counts for digits 1-9. Zeros from the date have no cell and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoShuGrid {
    counts: [u32; 9],
}

impl LoShuGrid {
    pub fn new(dob_digits: &[u8], driver: u8, conductor: u8, kuaa: Option<u8>) -> Self {
        let mut grid = LoShuGrid::default();
        let derived = [Some(driver), Some(conductor), kuaa];

        for digit in dob_digits.iter().copied().chain(derived.into_iter().flatten()) {
            if (1..=9).contains(&digit) {
                grid.counts[(digit - 1) as usize] += 1;
            }
        }

        grid
    }

    pub fn count(&self, digit: u8) -> u32 {
        match digit {
            1..=9 => self.counts[(digit - 1) as usize],
            _ => 0,
        }
    }

    pub fn status(&self, digit: u8) -> CellStatus {
        CellStatus::from_count(self.count(digit))
    }

    /// (digit, count) for 1..=9 in numeric order
    pub fn iter(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        (1..=9u8).map(move |d| (d, self.count(d)))
    }

    /// Rows of the classic layout with counts
    pub fn rows(&self) -> Vec<Vec<(u8, u32)>> {
        LO_SHU_LAYOUT
            .iter()
            .map(|row| row.iter().map(|&d| (d, self.count(d))).collect())
            .collect()
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn missing(&self) -> Vec<u8> {
        self.iter().filter(|(_, c)| *c == 0).map(|(d, _)| d).collect()
    }
}

impl Serialize for LoShuGrid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(9))?;
        for (digit, count) in self.iter() {
            map.serialize_entry(&digit.to_string(), &count)?;
        }
        map.end()
    }
}

// ============================================================================
// BIRTH CHART
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BirthChart {
    pub full_name: String,
    pub date_of_birth: String,
    pub gender: Gender,
    pub driver: u8,
    pub conductor: u8,
    pub kuaa: Option<u8>,
    pub chaldean: u32,
    pub grid: LoShuGrid,
}

impl BirthChart {
    pub fn compute(record: &BirthRecord) -> Result<Self> {
        let full_name = record.full_name();
        let dob = record.dob_text();

        let driver = driver(record.date_of_birth.day());
        let conductor = conductor(&dob)?;
        let kuaa = kuaa(record.date_of_birth.year(), record.gender);
        let chaldean = chaldean_number(&full_name)?;
        let grid = LoShuGrid::new(&digits_of(&dob), driver, conductor, kuaa);

        Ok(BirthChart {
            full_name,
            date_of_birth: dob,
            gender: record.gender,
            driver,
            conductor,
            kuaa,
            chaldean,
            grid,
        })
    }

    /// Kuaa for display; never renders a missing value as 0
    pub fn kuaa_display(&self) -> String {
        match self.kuaa {
            Some(k) => k.to_string(),
            None => "Not Available".to_string(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(first: &str, last: &str, dob: &str, gender: Gender) -> BirthRecord {
        BirthRecord {
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: NaiveDate::parse_from_str(dob, "%d-%m-%Y").unwrap(),
            gender,
            birth_time: None,
            place_of_birth: None,
            phone_number: None,
        }
    }

    #[test]
    fn test_digital_root_single_digit_is_identity() {
        for d in 0..=9u8 {
            assert_eq!(digital_root(&[d]).unwrap(), d);
        }
    }

    #[test]
    fn test_digital_root_range() {
        assert_eq!(digital_root(&[0, 0, 0]).unwrap(), 0);
        assert_eq!(digital_root(&[9, 9, 9, 9]).unwrap(), 9);
        assert_eq!(digital_root(&[1, 0]).unwrap(), 1);
        for n in 1..500u32 {
            let digits = digits_of(&n.to_string());
            let root = digital_root(&digits).unwrap();
            assert!((1..=9).contains(&root), "root of {} was {}", n, root);
        }
    }

    #[test]
    fn test_digital_root_empty_rejected() {
        assert_eq!(digital_root(&[]), Err(BirthChartError::EmptyDigits));
    }

    #[test]
    fn test_preserve_master() {
        assert_eq!(digital_root_preserve_master(29), 11);
        assert_eq!(digital_root_preserve_master(22), 22);
        assert_eq!(digital_root_preserve_master(38), 11);
        assert_eq!(digital_root_preserve_master(18), 9);
        // 33 is not a master number here
        assert_eq!(digital_root_preserve_master(33), 6);
    }

    #[test]
    fn test_driver() {
        assert_eq!(driver(25), 7);
        assert_eq!(driver(9), 9);
        assert_eq!(driver(31), 4);
        assert_eq!(driver(29), 2);
    }

    #[test]
    fn test_conductor() {
        assert_eq!(conductor("25-11-1987").unwrap(), 7);
        assert_eq!(conductor("--"), Err(BirthChartError::EmptyDigits));
    }

    #[test]
    fn test_kuaa_male_and_female() {
        assert_eq!(kuaa(1987, Gender::Male), Some(4));
        assert_eq!(kuaa(1987, Gender::Female), Some(2));
        // Y = 1 -> 11 - 1 = 10 -> 1
        assert_eq!(kuaa(1900, Gender::Male), Some(1));
        // Y = 9 -> 4 + 9 = 13 -> 4
        assert_eq!(kuaa(1998, Gender::Female), Some(4));
    }

    #[test]
    fn test_kuaa_unspecified_always_absent() {
        for year in 1900..2100 {
            assert_eq!(kuaa(year, Gender::Unspecified), None);
        }
    }

    #[test]
    fn test_chaldean_john() {
        assert_eq!(chaldean_number("JOHN").unwrap(), 9);
        assert_eq!(chaldean_number("john").unwrap(), 9);
        assert_eq!(chaldean_number("Jo-hn!").unwrap(), 9);
    }

    #[test]
    fn test_chaldean_master_numbers() {
        // J1 O7 S3 E5 P8 H5 = 29 -> 11, not 2
        assert_eq!(chaldean_number("Joseph").unwrap(), 11);
        // R2 O7 B2 E5 R2 T4 = 22
        assert_eq!(chaldean_number("Robert").unwrap(), 22);
    }

    #[test]
    fn test_chaldean_without_letters() {
        assert!(matches!(chaldean_number("1234 !"), Err(BirthChartError::NoLetters(_))));
        // alphabetic, but nothing the table can score
        assert!(matches!(chaldean_number("Иван Петров"), Err(BirthChartError::NoLetters(_))));
        assert!(!has_chaldean_letters("Иван"));
    }

    #[test]
    fn test_chaldean_folds_accents() {
        // É scores as E: 5 + 4 + 1 + 3 + 5 = 18 -> 9
        assert_eq!(chaldean_value('É'), chaldean_value('E'));
        assert_eq!(chaldean_value('ñ'), 5);
        assert_eq!(chaldean_number("Émile").unwrap(), 9);
        assert_eq!(chaldean_number("Émile").unwrap(), chaldean_number("Emile").unwrap());
        // Cyrillic letters add nothing next to a Latin name
        assert_eq!(chaldean_number("John Иван").unwrap(), 9);
    }

    #[test]
    fn test_lo_shu_counts() {
        let digits = digits_of("25-11-1987");
        let grid = LoShuGrid::new(&digits, 7, 7, Some(4));

        assert_eq!(grid.count(1), 3);
        assert_eq!(grid.count(7), 3);
        assert_eq!(grid.count(4), 1);
        assert_eq!(grid.count(3), 0);
        assert_eq!(grid.status(1), CellStatus::Repeated(3));
        assert_eq!(grid.status(4), CellStatus::Present);
        assert_eq!(grid.status(3), CellStatus::Missing);
    }

    #[test]
    fn test_lo_shu_total_matches_nonzero_contributions() {
        let digits = digits_of("10-10-2000");
        let grid = LoShuGrid::new(&digits, 1, 4, None);
        let nonzero = digits.iter().filter(|d| **d != 0).count() + 2;

        assert_eq!(grid.total() as usize, nonzero);
    }

    #[test]
    fn test_lo_shu_missing_five() {
        let chart = BirthChart::compute(&record("Anna", "Lee", "12-03-2001", Gender::Unspecified)).unwrap();

        assert_eq!(chart.kuaa, None);
        assert_ne!(chart.driver, 5);
        assert_ne!(chart.conductor, 5);
        assert_eq!(chart.grid.count(5), 0);
        assert!(chart.grid.missing().contains(&5));
    }

    #[test]
    fn test_lo_shu_layout_rows() {
        let grid = LoShuGrid::new(&[4, 9, 2], 1, 1, None);
        let rows = grid.rows();

        assert_eq!(rows[0], vec![(4, 1), (9, 1), (2, 1)]);
        assert_eq!(rows[2][1], (1, 2));
    }

    #[test]
    fn test_compute_chart() {
        let chart = BirthChart::compute(&record("Mohan", "Kumar", "25-11-1987", Gender::Male)).unwrap();

        assert_eq!(chart.full_name, "Mohan Kumar");
        assert_eq!(chart.date_of_birth, "25-11-1987");
        assert_eq!(chart.driver, 7);
        assert_eq!(chart.conductor, 7);
        assert_eq!(chart.kuaa, Some(4));
        // M4 O7 H5 A1 N5 K2 U6 M4 A1 R2 = 37 -> 10 -> 1
        assert_eq!(chart.chaldean, 1);
        assert_eq!(chart.grid.total(), 11);
        assert_eq!(chart.kuaa_display(), "4");
    }

    #[test]
    fn test_compute_is_deterministic() {
        let r = record("Priya", "Sharma", "07-06-1994", Gender::Female);
        let a = BirthChart::compute(&r).unwrap();
        let b = BirthChart::compute(&r).unwrap();

        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_compute_rejects_unscoreable_name() {
        let r = record("Иван", "Петров", "25-11-1987", Gender::Male);
        assert!(matches!(BirthChart::compute(&r), Err(BirthChartError::NoLetters(_))));

        // whenever a chart exists, its name number is in range
        for (first, last) in [("Émile", "Zola"), ("Søren", "Kierkegaard"), ("Li", "Иван")] {
            let chart = BirthChart::compute(&record(first, last, "01-01-2000", Gender::Male)).unwrap();
            assert!(matches!(chart.chaldean, 1..=9 | 11 | 22), "{} {} -> {}", first, last, chart.chaldean);
        }
    }

    #[test]
    fn test_unspecified_displays_not_available() {
        let chart = BirthChart::compute(&record("Sam", "Roe", "01-01-2000", Gender::Unspecified)).unwrap();
        assert_eq!(chart.kuaa_display(), "Not Available");
    }

    #[test]
    fn test_grid_serializes_as_map() {
        let grid = LoShuGrid::new(&[1, 1, 5], 2, 9, None);
        let json = serde_json::to_value(grid).unwrap();

        assert_eq!(json["1"], 2);
        assert_eq!(json["5"], 1);
        assert_eq!(json["3"], 0);
    }

    #[test]
    fn test_interpretations() {
        assert_eq!(interpretation(1), Some("Leadership, independence, ambition, and self-confidence."));
        assert!(interpretation(9).unwrap().starts_with("Compassion"));
        assert_eq!(interpretation(0), None);
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse("Male"), Some(Gender::Male));
        assert_eq!(Gender::parse("female"), Some(Gender::Female));
        assert_eq!(Gender::parse("NA"), Some(Gender::Unspecified));
        assert_eq!(Gender::parse("Unspecified"), Some(Gender::Unspecified));
        assert_eq!(Gender::parse("robot"), None);
    }
}
