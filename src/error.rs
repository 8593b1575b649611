// ticket-forge: error types shared by the library and the CLI

use thiserror::Error;

/// Fatal failures of an import pass. Row-level problems are not errors here,
/// they are collected in [`crate::import::ImportResult`].
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Error parsing CSV: {0}")]
    Parse(String),
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("No valid data to import")]
    NothingToImport,
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl ImportError {
    /// Stable diagnostic code, matching the codes used for row errors.
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Parse(_) => "PARSE_ERROR",
            ImportError::MissingColumns(_) => "MISSING_COLUMNS",
            ImportError::NothingToImport => "NOTHING_TO_IMPORT",
            ImportError::Directory(_) => "DIRECTORY_ERROR",
        }
    }
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Cannot delete required element: {0}")]
    ProtectedElement(String),
    #[error("No element with id: {0}")]
    UnknownElement(String),
    #[error("Property {property} does not apply to element {id}")]
    PropertyMismatch { id: String, property: &'static str },
    #[error("Element {0} is dynamic; its content is filled in per attendee")]
    DynamicContent(String),
    #[error("Invalid template JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Please select at least one ticket to generate")]
    EmptySelection,
    #[error("Failed to render ticket for attendee {attendee_id}: {reason}")]
    RenderFailure { attendee_id: String, reason: String },
    #[error("Failed to generate QR code: {0}")]
    QrError(String),
    #[error("Failed to create PDF: {0}")]
    PdfError(String),
    #[error("Failed to load background image: {0}")]
    BackgroundError(String),
    #[error("Failed to build archive: {0}")]
    ArchiveError(String),
}

/// Failures of the attendee/ticket-type directory collaborator. These are
/// never folded into "no data".
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Failed to read directory file: {0}")]
    Io(String),
    #[error("Invalid directory data: {0}")]
    Format(String),
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
}
