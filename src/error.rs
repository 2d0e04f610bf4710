use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BirthChartError {
    #[error("No digits to reduce")]
    EmptyDigits,
    #[error("Name contains no letters: {0:?}")]
    NoLetters(String),
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BirthChartError>;

impl From<config::ConfigError> for BirthChartError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
