// ticket-forge: attendee and ticket-type directory

use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;
use crate::import::{fold_ticket_type, ImportRow};

// ============================================================================
// Data Structures
// ============================================================================

/// Event the tickets belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<String>,
}

impl EventInfo {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub max_capacity: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub perks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub ticket_type: String,
}

/// Source of events, ticket types and attendees.
///
/// Implementations report failures as [`DirectoryError`]; an empty list
/// always means "no data", never "lookup failed".
pub trait AttendeeDirectory {
    fn event(&self, event_id: &str) -> Result<EventInfo, DirectoryError>;

    fn ticket_types(&self, event_id: &str) -> Result<Vec<TicketType>, DirectoryError>;

    fn attendees(&self, event_id: &str) -> Result<Vec<Attendee>, DirectoryError>;

    /// Creates one attendee per imported row and returns them.
    fn create_attendees(
        &self,
        event_id: &str,
        rows: &[ImportRow],
    ) -> Result<Vec<Attendee>, DirectoryError>;

    /// Known ticket type names, as used by import validation.
    fn ticket_type_names(&self, event_id: &str) -> Result<Vec<String>, DirectoryError> {
        Ok(self
            .ticket_types(event_id)?
            .into_iter()
            .map(|t| t.name)
            .collect())
    }
}

// ============================================================================
// Static Directory
// ============================================================================

/// One event entry in a directory fixture file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(flatten)]
    pub event: EventInfo,
    #[serde(default)]
    pub ticket_types: Vec<TicketType>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

/// In-memory directory backed by fixture data.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    events: Mutex<Vec<EventRecord>>,
}

impl StaticDirectory {
    pub fn new(events: Vec<EventRecord>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    /// Load a JSON array of [`EventRecord`]s.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DirectoryError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, DirectoryError> {
        let events: Vec<EventRecord> = serde_json::from_str(content)
            .map_err(|e| DirectoryError::Format(format!("Invalid JSON: {}", e)))?;
        Ok(Self::new(events))
    }

    /// Write the current state back out, including created attendees.
    pub fn save(&self, path: &Path) -> Result<(), DirectoryError> {
        let events = self
            .events
            .lock()
            .map_err(|_| DirectoryError::Format("directory lock poisoned".to_string()))?;
        let json = serde_json::to_string_pretty(&*events)
            .map_err(|e| DirectoryError::Format(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| DirectoryError::Io(format!("{}: {}", path.display(), e)))
    }

    fn with_event<T>(
        &self,
        event_id: &str,
        f: impl FnOnce(&mut EventRecord) -> T,
    ) -> Result<T, DirectoryError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| DirectoryError::Format("directory lock poisoned".to_string()))?;
        let record = events
            .iter_mut()
            .find(|r| r.event.id == event_id)
            .ok_or_else(|| DirectoryError::UnknownEvent(event_id.to_string()))?;
        Ok(f(record))
    }
}

impl AttendeeDirectory for StaticDirectory {
    fn event(&self, event_id: &str) -> Result<EventInfo, DirectoryError> {
        self.with_event(event_id, |r| r.event.clone())
    }

    fn ticket_types(&self, event_id: &str) -> Result<Vec<TicketType>, DirectoryError> {
        self.with_event(event_id, |r| r.ticket_types.clone())
    }

    fn attendees(&self, event_id: &str) -> Result<Vec<Attendee>, DirectoryError> {
        self.with_event(event_id, |r| r.attendees.clone())
    }

    fn create_attendees(
        &self,
        event_id: &str,
        rows: &[ImportRow],
    ) -> Result<Vec<Attendee>, DirectoryError> {
        self.with_event(event_id, |record| {
            let mut next_id = record.attendees.len() + 1;
            let mut created = Vec::with_capacity(rows.len());
            for row in rows {
                // Keep generated ids clear of ids already in the fixture
                while record.attendees.iter().any(|a| a.id == next_id.to_string()) {
                    next_id += 1;
                }
                // Canonical spelling of the type, not the spreadsheet's
                let wanted = fold_ticket_type(&row.ticket_type);
                let ticket_type = record
                    .ticket_types
                    .iter()
                    .find(|t| fold_ticket_type(&t.name) == wanted)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| row.ticket_type.clone());
                let attendee = Attendee {
                    id: next_id.to_string(),
                    name: row.full_name.clone(),
                    email: row.email.clone(),
                    phone: row.phone_number.clone(),
                    ticket_type,
                };
                record.attendees.push(attendee.clone());
                created.push(attendee);
                next_id += 1;
            }
            created
        })
    }
}
