use thiserror::Error;

/// Failures from parsing the `HH:MM` / `YYYY-MM-DD` strings stored on records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("invalid time '{0}': expected HH:MM in 24-hour form")]
    InvalidTime(String),

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("no record at index {index} for {date}")]
    IndexOutOfRange { date: String, index: usize },

    #[error("unsupported stored shape under key '{0}'")]
    UnsupportedShape(String),

    #[error("{value} is not a selectable {field}")]
    InvalidSelection { field: &'static str, value: i64 },
}

/// Validation failures raised by the editor forms before a save.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("Please enter a task title")]
    EmptyTitle,
}
