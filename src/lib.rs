// ticket-forge: attendee import validation and per-attendee ticket rendering

pub mod directory;
pub mod error;
pub mod import;
pub mod render;
pub mod template;

pub use directory::{Attendee, AttendeeDirectory, EventInfo, StaticDirectory, TicketType};
pub use error::{DirectoryError, ImportError, RenderError, TemplateError};
pub use import::{commit_import, sample_csv, validate_import, ImportResult, ImportRow};
pub use render::{generate_tickets, package_for_download, GeneratedTicket, TicketArchive};
pub use template::editor::TemplateEditorSession;
pub use template::TicketTemplate;
