// ticket-forge: bulk attendee import from an uploaded CSV

use std::fmt;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::directory::{Attendee, AttendeeDirectory};
use crate::error::ImportError;

// ============================================================================
// Constants
// ============================================================================

pub const COL_FULL_NAME: &str = "Full Name";
pub const COL_EMAIL: &str = "Email";
pub const COL_PHONE: &str = "Phone Number";
pub const COL_TICKET_COUNT: &str = "Ticket Count";
pub const COL_TICKET_TYPE: &str = "Ticket Type";

/// Required header cells, in the order they are reported when missing
pub const REQUIRED_COLUMNS: [&str; 5] = [
    COL_FULL_NAME,
    COL_EMAIL,
    COL_PHONE,
    COL_TICKET_COUNT,
    COL_TICKET_TYPE,
];

/// Ticket type used by the sample file when the event has none
const FALLBACK_SAMPLE_TYPE: &str = "VIP";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

// ============================================================================
// Data Structures
// ============================================================================

/// One attendee line that passed every check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub ticket_count: u32,
    /// Ticket type as written in the file
    pub ticket_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowErrorKind {
    MissingValue,
    InvalidEmail,
    InvalidTicketCount,
    InvalidTicketType,
}

impl RowErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            RowErrorKind::MissingValue => "MISSING_VALUE",
            RowErrorKind::InvalidEmail => "INVALID_EMAIL",
            RowErrorKind::InvalidTicketCount => "INVALID_TICKET_COUNT",
            RowErrorKind::InvalidTicketType => "INVALID_TICKET_TYPE",
        }
    }
}

/// Why a single data row was left out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based position among data rows (the header is not counted)
    pub row: usize,
    pub message: String,
    pub kind: RowErrorKind,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {} [{}]", self.row, self.message, self.kind.code())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub valid_rows: Vec<ImportRow>,
    pub total_rows: usize,
    pub errors: Vec<RowError>,
}

impl ImportResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// The required columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    FullName,
    Email,
    Phone,
    TicketCount,
    TicketType,
}

impl Column {
    /// Same order as [`REQUIRED_COLUMNS`]
    const ALL: [Column; 5] = [
        Column::FullName,
        Column::Email,
        Column::Phone,
        Column::TicketCount,
        Column::TicketType,
    ];

    fn header(self) -> &'static str {
        match self {
            Column::FullName => COL_FULL_NAME,
            Column::Email => COL_EMAIL,
            Column::Phone => COL_PHONE,
            Column::TicketCount => COL_TICKET_COUNT,
            Column::TicketType => COL_TICKET_TYPE,
        }
    }
}

/// Column positions resolved from the header row, indexed by [`Column`]
struct ColumnIndex {
    positions: [usize; 5],
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, ImportError> {
        let position = |col: Column| headers.iter().position(|h| h == col.header());

        let missing: Vec<String> = Column::ALL
            .into_iter()
            .filter(|&col| position(col).is_none())
            .map(|col| col.header().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing));
        }

        Ok(Self {
            positions: Column::ALL.map(|col| position(col).unwrap_or_default()),
        })
    }

    fn field<'r>(&self, record: &'r StringRecord, column: Column) -> &'r str {
        record
            .get(self.positions[column as usize])
            .unwrap_or("")
            .trim()
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Parse and validate an attendee spreadsheet.
///
/// Structural parse failures and missing header columns abort the whole
/// pass. Every other problem is recorded against its row and the row is
/// skipped; other rows are unaffected.
pub fn validate_import<S: AsRef<str>>(
    content: &[u8],
    known_ticket_types: &[S],
) -> Result<ImportResult, ImportError> {
    if content.iter().all(u8::is_ascii_whitespace) {
        debug!("empty import file");
        return Ok(ImportResult::default());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(Trim::Headers)
        .from_reader(content);

    let headers = reader
        .headers()
        .map_err(|e| ImportError::Parse(e.to_string()))?
        .clone();
    let columns = ColumnIndex::from_headers(&headers)?;

    // Parse everything before validating anything: no partial results
    let records = reader
        .records()
        .collect::<Result<Vec<StringRecord>, csv::Error>>()
        .map_err(|e| ImportError::Parse(e.to_string()))?;

    let known: Vec<String> = known_ticket_types
        .iter()
        .map(|t| fold_ticket_type(t.as_ref()))
        .collect();

    let mut result = ImportResult {
        total_rows: records.len(),
        ..Default::default()
    };

    for (index, record) in records.iter().enumerate() {
        let row_num = index + 1;
        match validate_row(record, &columns, &known) {
            Ok(row) => result.valid_rows.push(row),
            Err((kind, message)) => {
                debug!(row = row_num, code = kind.code(), "rejected import row");
                result.errors.push(RowError {
                    row: row_num,
                    message,
                    kind,
                });
            }
        }
    }

    if result.has_errors() {
        warn!(
            errors = result.errors.len(),
            "Found {} errors in the CSV data",
            result.errors.len()
        );
    }
    info!(
        valid = result.valid_rows.len(),
        total = result.total_rows,
        "validated import file"
    );

    Ok(result)
}

/// Checks run in a fixed order; the first failure decides the row's error.
fn validate_row(
    record: &StringRecord,
    columns: &ColumnIndex,
    known_types: &[String],
) -> Result<ImportRow, (RowErrorKind, String)> {
    for col in Column::ALL {
        if columns.field(record, col).is_empty() {
            return Err((
                RowErrorKind::MissingValue,
                format!("Missing value for {}", col.header()),
            ));
        }
    }

    let email = columns.field(record, Column::Email);
    if !is_valid_email(email) {
        return Err((
            RowErrorKind::InvalidEmail,
            format!("Invalid email format: {}", email),
        ));
    }

    let count_raw = columns.field(record, Column::TicketCount);
    let ticket_count = match count_raw.parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => {
            return Err((
                RowErrorKind::InvalidTicketCount,
                format!("Invalid ticket count: {}", count_raw),
            ))
        }
    };

    let ticket_type = columns.field(record, Column::TicketType);
    let folded = fold_ticket_type(ticket_type);
    if !known_types.iter().any(|t| *t == folded) {
        return Err((
            RowErrorKind::InvalidTicketType,
            format!("Invalid ticket type: {}", ticket_type),
        ));
    }

    Ok(ImportRow {
        full_name: columns.field(record, Column::FullName).to_string(),
        email: email.to_string(),
        phone_number: columns.field(record, Column::Phone).to_string(),
        ticket_count,
        ticket_type: ticket_type.to_string(),
    })
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Case-folded ticket type name. Two names denote the same type when their
/// folded forms are equal.
pub fn fold_ticket_type(name: &str) -> String {
    name.to_lowercase()
}

// ============================================================================
// Sample File & Commit
// ============================================================================

/// Build the downloadable import template: the header plus two example rows.
pub fn sample_csv<S: AsRef<str>>(ticket_types: &[S]) -> Result<String, ImportError> {
    let sample_type = ticket_types
        .first()
        .map(|t| t.as_ref())
        .unwrap_or(FALLBACK_SAMPLE_TYPE);

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    let rows: [[&str; 5]; 3] = [
        REQUIRED_COLUMNS,
        ["John Doe", "john.doe@example.com", "+1234567890", "2", sample_type],
        ["Jane Smith", "jane.smith@example.com", "+0987654321", "1", sample_type],
    ];
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| ImportError::Parse(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::Parse(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ImportError::Parse(e.to_string()))
}

/// Hand validated rows to the directory, which creates the attendees.
pub fn commit_import(
    directory: &dyn AttendeeDirectory,
    event_id: &str,
    rows: &[ImportRow],
) -> Result<Vec<Attendee>, ImportError> {
    if rows.is_empty() {
        return Err(ImportError::NothingToImport);
    }
    let created = directory.create_attendees(event_id, rows)?;
    info!(event_id, count = created.len(), "imported attendees");
    Ok(created)
}
