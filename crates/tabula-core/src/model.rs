//! Record-set data model

use chrono::DateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing a column key
#[derive(Debug, Clone)]
pub struct ParseColumnError(String);

impl fmt::Display for ParseColumnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid column: {}", self.0)
    }
}

impl std::error::Error for ParseColumnError {}

/// The five known columns, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    FirstName,
    LastName,
    Email,
    Date,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Id,
        Column::FirstName,
        Column::LastName,
        Column::Email,
        Column::Date,
    ];

    /// Header label shown to users
    pub fn label(&self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::FirstName => "First Name",
            Column::LastName => "Last Name",
            Column::Email => "Email",
            Column::Date => "Date",
        }
    }

    /// Short key used by column visibility settings
    pub fn key(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::FirstName => "fname",
            Column::LastName => "lname",
            Column::Email => "email",
            Column::Date => "date",
        }
    }

    /// Look a column up by its header label
    pub fn from_label(label: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl FromStr for Column {
    type Err = ParseColumnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.key() == s.to_lowercase())
            .ok_or_else(|| ParseColumnError(s.to_string()))
    }
}

/// One data record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Unix seconds
    pub timestamp: u64,
}

impl Row {
    /// Display text for one column
    pub fn cell(&self, column: Column) -> String {
        match column {
            Column::Id => self.id.to_string(),
            Column::FirstName => self.first_name.clone(),
            Column::LastName => self.last_name.clone(),
            Column::Email => self.email.clone(),
            Column::Date => format_timestamp(self.timestamp),
        }
    }
}

/// Format Unix seconds as `YYYY-MM-DD HH:MM:SS` in UTC
pub fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Rows keyed by an opaque identifier, in source order
///
/// Serializes as a JSON object so the wire shape stays a keyed map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rows(IndexMap<String, Row>);

impl Rows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row, replacing an existing row with the same key in place
    pub fn insert(&mut self, key: String, row: Row) {
        self.0.insert(key, row);
    }

    pub fn get(&self, key: &str) -> Option<&Row> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.0.iter().map(|(k, row)| (k.as_str(), row))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Row)> for Rows {
    fn from_iter<I: IntoIterator<Item = (String, Row)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The unit of cached data
///
/// Produced whole by sanitization and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRecordSet {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Rows,
}

impl CachedRecordSet {
    /// The "no data" value returned when the source cannot be reached
    pub fn empty() -> Self {
        Self::default()
    }

    /// True only for the "no data" value
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.headers.is_empty() && self.rows.is_empty()
    }

    /// Columns named by `headers`, skipping labels that are not known columns
    pub fn columns(&self) -> Vec<Column> {
        self.headers
            .iter()
            .filter_map(|label| Column::from_label(label))
            .collect()
    }
}
