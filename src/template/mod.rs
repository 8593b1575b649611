// ticket-forge: ticket template document, a canvas plus positioned elements

pub mod editor;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::directory::EventInfo;
use crate::error::TemplateError;

// ============================================================================
// Constants
// ============================================================================

pub const DEFAULT_CANVAS_WIDTH: f32 = 1000.0;
pub const DEFAULT_CANVAS_HEIGHT: f32 = 500.0;
pub const DEFAULT_BACKGROUND: &str = "#ffffff";
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Placeholder tokens filled in per attendee
pub const TOKEN_ATTENDEE_NAME: &str = "{attendee_name}";
pub const TOKEN_TICKET_ID: &str = "{ticket_id}";
pub const TOKEN_TICKET_TYPE: &str = "{ticket_type}";

pub const ID_EVENT_NAME: &str = "event-name";
pub const ID_ATTENDEE_NAME: &str = "attendee-name";
pub const ID_EVENT_DATE: &str = "event-date";
pub const ID_VENUE: &str = "venue";
pub const ID_QR_CODE: &str = "qr-code";
pub const ID_TICKET_TYPE: &str = "ticket-type";

/// Elements every ticket needs; they can be edited but never deleted
pub const PROTECTED_ELEMENT_IDS: [&str; 3] = [ID_QR_CODE, ID_ATTENDEE_NAME, ID_TICKET_TYPE];

/// Fonts offered by the designer
pub const AVAILABLE_FONTS: [&str; 8] = [
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Courier New",
    "Georgia",
    "Verdana",
    "Tahoma",
    "Impact",
];

pub fn is_protected(id: &str) -> bool {
    PROTECTED_ELEMENT_IDS.contains(&id)
}

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    pub width: f32,
    pub height: f32,
    /// CSS-style hex color
    pub background: String,
    /// Data URL, http(s) URL or file path
    #[serde(default)]
    pub background_image: Option<String>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
            background: DEFAULT_BACKGROUND.to_string(),
            background_image: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub id: String,
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub font_family: String,
    pub color: String,
    pub font_weight: FontWeight,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
    #[serde(default)]
    pub dynamic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrElement {
    pub id: String,
    /// Placeholder for the QR payload
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Element {
    #[serde(rename = "text")]
    Text(TextElement),
    #[serde(rename = "qrcode")]
    QrCode(QrElement),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::Text(t) => &t.id,
            Element::QrCode(q) => &q.id,
        }
    }

    pub fn position(&self) -> (f32, f32) {
        match self {
            Element::Text(t) => (t.x, t.y),
            Element::QrCode(q) => (q.x, q.y),
        }
    }

    pub(crate) fn set_position(&mut self, x: f32, y: f32) {
        match self {
            Element::Text(t) => {
                t.x = x;
                t.y = y;
            }
            Element::QrCode(q) => {
                q.x = x;
                q.y = y;
            }
        }
    }

    /// QR elements are always resolved per attendee.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Element::Text(t) => t.dynamic,
            Element::QrCode(_) => true,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Element::Text(t) => &t.content,
            Element::QrCode(q) => &q.content,
        }
    }
}

/// Canvas backgrounds offered as one-click starting points
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TemplatePreset {
    Default,
    Vip,
    Concert,
}

impl TemplatePreset {
    pub fn background(self) -> &'static str {
        match self {
            TemplatePreset::Default => DEFAULT_BACKGROUND,
            TemplatePreset::Vip => "#fef3c7",
            TemplatePreset::Concert => "#dbeafe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketTemplate {
    pub canvas: Canvas,
    pub elements: Vec<Element>,
}

// ============================================================================
// Construction & Serialization
// ============================================================================

impl TicketTemplate {
    /// Default layout seeded from the event's title, date and location.
    pub fn for_event(event: &EventInfo) -> Self {
        let date = event
            .date
            .map(|d| format_date_display(&d))
            .unwrap_or_else(|| "Event Date".to_string());
        let venue = event
            .location
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "Venue Location".to_string());

        let elements = vec![
            Element::Text(
                text_element(ID_EVENT_NAME, event.display_title(), (50.0, 50.0), 24.0, "#000000")
                    .bold(),
            ),
            Element::Text(
                text_element(ID_ATTENDEE_NAME, TOKEN_ATTENDEE_NAME, (50.0, 100.0), 18.0, "#333333")
                    .dynamic(),
            ),
            Element::Text(text_element(ID_EVENT_DATE, &date, (50.0, 150.0), 16.0, "#555555")),
            Element::Text(text_element(ID_VENUE, &venue, (50.0, 180.0), 16.0, "#555555")),
            Element::QrCode(QrElement {
                id: ID_QR_CODE.to_string(),
                content: TOKEN_TICKET_ID.to_string(),
                x: 800.0,
                y: 50.0,
                width: 150.0,
                height: 150.0,
            }),
            Element::Text(
                text_element(ID_TICKET_TYPE, TOKEN_TICKET_TYPE, (800.0, 220.0), 16.0, "#333333")
                    .bold()
                    .dynamic(),
            ),
        ];

        Self {
            canvas: Canvas::default(),
            elements,
        }
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id() == id)
    }

    pub(crate) fn element_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id() == id)
    }

    pub fn to_json(&self) -> Result<String, TemplateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), TemplateError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

impl TextElement {
    fn bold(mut self) -> Self {
        self.font_weight = FontWeight::Bold;
        self
    }

    fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }
}

fn text_element(
    id: &str,
    content: &str,
    (x, y): (f32, f32),
    font_size: f32,
    color: &str,
) -> TextElement {
    TextElement {
        id: id.to_string(),
        content: content.to_string(),
        x,
        y,
        font_size,
        font_family: DEFAULT_FONT_FAMILY.to_string(),
        color: color.to_string(),
        font_weight: FontWeight::Normal,
        text_align: None,
        dynamic: false,
    }
}

pub fn format_date_display(date: &NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> EventInfo {
        EventInfo {
            id: "42".to_string(),
            name: "Summer Fest".to_string(),
            title: Some("Summer Music Festival".to_string()),
            date: NaiveDate::from_ymd_opt(2025, 7, 4),
            location: Some("Riverside Park".to_string()),
        }
    }

    #[test]
    fn default_layout_is_seeded_from_event() {
        let template = TicketTemplate::for_event(&event());
        let ids: Vec<&str> = template.elements.iter().map(Element::id).collect();
        assert_eq!(
            ids,
            vec!["event-name", "attendee-name", "event-date", "venue", "qr-code", "ticket-type"]
        );
        assert_eq!(template.element(ID_EVENT_NAME).unwrap().content(), "Summer Music Festival");
        assert_eq!(template.element(ID_EVENT_DATE).unwrap().content(), "Friday, July 4, 2025");
        assert_eq!(template.element(ID_VENUE).unwrap().content(), "Riverside Park");
        assert_eq!(template.canvas, Canvas::default());
    }

    #[test]
    fn missing_event_details_fall_back_to_labels() {
        let bare = EventInfo {
            id: "1".to_string(),
            name: "Meetup".to_string(),
            title: None,
            date: None,
            location: None,
        };
        let template = TicketTemplate::for_event(&bare);
        assert_eq!(template.element(ID_EVENT_NAME).unwrap().content(), "Meetup");
        assert_eq!(template.element(ID_EVENT_DATE).unwrap().content(), "Event Date");
        assert_eq!(template.element(ID_VENUE).unwrap().content(), "Venue Location");
    }

    #[test]
    fn dynamic_elements_hold_tokens() {
        let template = TicketTemplate::for_event(&event());
        for el in &template.elements {
            if el.is_dynamic() {
                assert!(el.content().starts_with('{') && el.content().ends_with('}'));
            }
        }
        assert!(template.element(ID_QR_CODE).unwrap().is_dynamic());
        assert!(!template.element(ID_VENUE).unwrap().is_dynamic());
    }

    #[test]
    fn json_round_trip_preserves_everything() {
        let mut template = TicketTemplate::for_event(&event());
        template.canvas.background_image = Some("bg.png".to_string());
        if let Some(Element::Text(t)) = template.element_mut(ID_VENUE) {
            t.text_align = Some(TextAlign::Center);
        }
        let json = template.to_json().unwrap();
        assert!(json.contains("\"type\": \"qrcode\""));
        assert!(json.contains("\"fontSize\""));
        let back = TicketTemplate::from_json(&json).unwrap();
        assert_eq!(back, template);
    }

    #[test]
    fn save_and_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        let template = TicketTemplate::for_event(&event());
        template.save(&path).unwrap();
        assert_eq!(TicketTemplate::load(&path).unwrap(), template);
    }

    #[test]
    fn garbage_json_is_a_serialization_error() {
        assert!(matches!(
            TicketTemplate::from_json("{\"canvas\": 3}"),
            Err(TemplateError::Serialization(_))
        ));
    }
}
