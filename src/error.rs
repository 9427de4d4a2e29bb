
use thiserror::Error;

use crate::ingest::Rule;

#[derive(Error, Debug)]
pub enum BarscanError {
    #[error("Config error: {0}")] 
    Config(String),
    #[error("I/O error: {0}")] 
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")] 
    Json(#[from] serde_json::Error),
    #[error("Ingest error: {message}")] 
    Ingest { message: String, line: Option<usize> },
    #[error("Encoding error: {0}")] 
    Encoding(String),
    #[error("Malformed request: {reason}")] 
    MalformedRequest { reason: String },
    #[error("Transport error: {0}")] 
    Transport(String),
    #[error("Handler fault: {0}")] 
    Handler(String),
}

pub type Result<T> = std::result::Result<T, BarscanError>;

// Helper conversions
impl From<config::ConfigError> for BarscanError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<pest::error::Error<Rule>> for BarscanError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        let line = match e.line_col {
            pest::error::LineColLocation::Pos((line, _)) => Some(line),
            pest::error::LineColLocation::Span((line, _), _) => Some(line),
        };
        Self::Ingest { message: e.to_string(), line }
    }
}
