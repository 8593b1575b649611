// ticket-forge: editing session for a ticket template
//
// Pointer input drives the selection:
//
//   Unselected --pointer_down_on_element--> Dragging
//   Dragging   --pointer_move-------------> Dragging (element moves, clamped)
//   Dragging   --pointer_up---------------> Selected
//   Selected   --pointer_down_on_element--> Dragging
//   any        --pointer_down_on_canvas---> Unselected

use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    is_protected, Element, FontWeight, TemplatePreset, TextAlign, TextElement, TicketTemplate,
    DEFAULT_FONT_FAMILY,
};
use crate::error::TemplateError;

/// Smallest visible part of an element; it can't be dragged closer to the
/// right/bottom edge than this.
pub const ELEMENT_MIN_SIZE: f32 = 20.0;

const NEW_TEXT_POSITION: (f32, f32) = (100.0, 100.0);
const NEW_TEXT_FONT_SIZE: f32 = 16.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Unselected,
    Selected(String),
    Dragging {
        id: String,
        /// Pointer position relative to the element origin at grab time
        offset: (f32, f32),
    },
}

/// A single property change
#[derive(Debug, Clone, PartialEq)]
pub enum ElementUpdate {
    Content(String),
    FontSize(f32),
    FontFamily(String),
    Color(String),
    FontWeight(FontWeight),
    TextAlign(TextAlign),
    Width(f32),
    Height(f32),
}

impl ElementUpdate {
    fn property(&self) -> &'static str {
        match self {
            ElementUpdate::Content(_) => "content",
            ElementUpdate::FontSize(_) => "fontSize",
            ElementUpdate::FontFamily(_) => "fontFamily",
            ElementUpdate::Color(_) => "color",
            ElementUpdate::FontWeight(_) => "fontWeight",
            ElementUpdate::TextAlign(_) => "textAlign",
            ElementUpdate::Width(_) => "width",
            ElementUpdate::Height(_) => "height",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Color(String),
    Image(String),
}

#[derive(Debug)]
pub struct TemplateEditorSession {
    template: TicketTemplate,
    selection: Selection,
}

impl TemplateEditorSession {
    pub fn new(template: TicketTemplate) -> Self {
        Self {
            template,
            selection: Selection::Unselected,
        }
    }

    pub fn template(&self) -> &TicketTemplate {
        &self.template
    }

    pub fn into_template(self) -> TicketTemplate {
        self.template
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_id(&self) -> Option<&str> {
        match &self.selection {
            Selection::Unselected => None,
            Selection::Selected(id) | Selection::Dragging { id, .. } => Some(id),
        }
    }

    // ========================================================================
    // Element operations
    // ========================================================================

    /// Append a static text element with default styling and select it.
    pub fn add_text_element(&mut self) -> &Element {
        let id = format!("text-{}", short_id());
        let (x, y) = NEW_TEXT_POSITION;
        self.template.elements.push(Element::Text(TextElement {
            id: id.clone(),
            content: "New Text".to_string(),
            x,
            y,
            font_size: NEW_TEXT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            color: "#000000".to_string(),
            font_weight: FontWeight::Normal,
            text_align: None,
            dynamic: false,
        }));
        debug!(%id, "added text element");
        self.selection = Selection::Selected(id);
        &self.template.elements[self.template.elements.len() - 1]
    }

    /// Change one property of one element.
    pub fn update_element(&mut self, id: &str, update: ElementUpdate) -> Result<(), TemplateError> {
        let element = self
            .template
            .element_mut(id)
            .ok_or_else(|| TemplateError::UnknownElement(id.to_string()))?;
        let property = update.property();
        let mismatch = || TemplateError::PropertyMismatch {
            id: id.to_string(),
            property,
        };

        match (element, update) {
            (Element::Text(t), ElementUpdate::Content(content)) => {
                if t.dynamic {
                    return Err(TemplateError::DynamicContent(id.to_string()));
                }
                t.content = content;
            }
            (Element::Text(t), ElementUpdate::FontSize(size)) => t.font_size = size,
            (Element::Text(t), ElementUpdate::FontFamily(family)) => t.font_family = family,
            (Element::Text(t), ElementUpdate::Color(color)) => t.color = color,
            (Element::Text(t), ElementUpdate::FontWeight(weight)) => t.font_weight = weight,
            (Element::Text(t), ElementUpdate::TextAlign(align)) => t.text_align = Some(align),
            (Element::QrCode(_), ElementUpdate::Content(_)) => {
                return Err(TemplateError::DynamicContent(id.to_string()))
            }
            (Element::QrCode(q), ElementUpdate::Width(w)) => q.width = w,
            (Element::QrCode(q), ElementUpdate::Height(h)) => q.height = h,
            _ => return Err(mismatch()),
        }
        debug!(id, property, "updated element");
        Ok(())
    }

    /// Apply an update to the selected element. Returns `Ok(false)` without
    /// touching anything when nothing is selected.
    pub fn update_selected(&mut self, update: ElementUpdate) -> Result<bool, TemplateError> {
        let Some(id) = self.selected_id().map(str::to_string) else {
            return Ok(false);
        };
        self.update_element(&id, update)?;
        Ok(true)
    }

    pub fn delete_element(&mut self, id: &str) -> Result<Element, TemplateError> {
        if is_protected(id) {
            warn!(id, "Cannot delete required elements");
            return Err(TemplateError::ProtectedElement(id.to_string()));
        }
        let index = self
            .template
            .elements
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| TemplateError::UnknownElement(id.to_string()))?;
        let removed = self.template.elements.remove(index);
        if self.selected_id() == Some(id) {
            self.selection = Selection::Unselected;
        }
        debug!(id, "deleted element");
        Ok(removed)
    }

    /// Move an element, keeping at least [`ELEMENT_MIN_SIZE`] of it on the
    /// canvas. Returns the clamped position.
    pub fn move_element(&mut self, id: &str, x: f32, y: f32) -> Result<(f32, f32), TemplateError> {
        let canvas = &self.template.canvas;
        let max_x = (canvas.width - ELEMENT_MIN_SIZE).max(0.0);
        let max_y = (canvas.height - ELEMENT_MIN_SIZE).max(0.0);
        let clamped = (x.clamp(0.0, max_x), y.clamp(0.0, max_y));

        let element = self
            .template
            .element_mut(id)
            .ok_or_else(|| TemplateError::UnknownElement(id.to_string()))?;
        element.set_position(clamped.0, clamped.1);
        Ok(clamped)
    }

    /// Replace the canvas background. Elements are left as they are.
    pub fn set_canvas_background(&mut self, background: Background) {
        let canvas = &mut self.template.canvas;
        match background {
            Background::Color(color) => {
                canvas.background = color;
                canvas.background_image = None;
            }
            Background::Image(source) => canvas.background_image = Some(source),
        }
    }

    /// Switch to one of the preset background colors.
    pub fn apply_preset(&mut self, preset: TemplatePreset) {
        self.template.canvas.background = preset.background().to_string();
    }

    // ========================================================================
    // Pointer input
    // ========================================================================

    /// Grab an element: it becomes selected and starts dragging at once.
    pub fn pointer_down_on_element(
        &mut self,
        id: &str,
        pointer_x: f32,
        pointer_y: f32,
    ) -> Result<(), TemplateError> {
        let (x, y) = self
            .template
            .element(id)
            .ok_or_else(|| TemplateError::UnknownElement(id.to_string()))?
            .position();
        self.selection = Selection::Dragging {
            id: id.to_string(),
            offset: (pointer_x - x, pointer_y - y),
        };
        Ok(())
    }

    /// Returns the element's new position while dragging, `None` otherwise.
    pub fn pointer_move(
        &mut self,
        pointer_x: f32,
        pointer_y: f32,
    ) -> Result<Option<(f32, f32)>, TemplateError> {
        let Selection::Dragging { id, offset } = &self.selection else {
            return Ok(None);
        };
        let (id, (ox, oy)) = (id.clone(), *offset);
        self.move_element(&id, pointer_x - ox, pointer_y - oy).map(Some)
    }

    pub fn pointer_up(&mut self) {
        if let Selection::Dragging { id, .. } = &self.selection {
            self.selection = Selection::Selected(id.clone());
        }
    }

    pub fn pointer_down_on_canvas(&mut self) {
        self.selection = Selection::Unselected;
    }
}

fn short_id() -> String {
    let uuid = Uuid::new_v4();
    let hex = format!("{:x}", uuid);
    hex[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::EventInfo;
    use crate::template::{ID_ATTENDEE_NAME, ID_EVENT_NAME, ID_QR_CODE, ID_TICKET_TYPE, ID_VENUE};

    fn session() -> TemplateEditorSession {
        let event = EventInfo {
            id: "1".to_string(),
            name: "Tech Conference".to_string(),
            title: None,
            date: None,
            location: None,
        };
        TemplateEditorSession::new(TicketTemplate::for_event(&event))
    }

    fn text<'a>(s: &'a TemplateEditorSession, id: &str) -> &'a TextElement {
        match s.template().element(id) {
            Some(Element::Text(t)) => t,
            other => panic!("expected text element {id}, got {other:?}"),
        }
    }

    #[test]
    fn add_text_element_appends_and_selects() {
        let mut s = session();
        let before = s.template().elements.len();
        let id = s.add_text_element().id().to_string();
        assert!(id.starts_with("text-"));
        assert_eq!(s.template().elements.len(), before + 1);
        assert_eq!(s.selection(), &Selection::Selected(id.clone()));
        let t = text(&s, &id);
        assert_eq!((t.x, t.y), (100.0, 100.0));
        assert_eq!(t.content, "New Text");
        assert!(!t.dynamic);
    }

    #[test]
    fn protected_elements_cannot_be_deleted() {
        let mut s = session();
        let before = s.template().elements.clone();
        for id in [ID_QR_CODE, ID_ATTENDEE_NAME, ID_TICKET_TYPE] {
            assert!(matches!(
                s.delete_element(id),
                Err(TemplateError::ProtectedElement(_))
            ));
        }
        assert_eq!(s.template().elements, before);
    }

    #[test]
    fn deleting_removes_exactly_one_element() {
        let mut s = session();
        let before = s.template().elements.len();
        s.pointer_down_on_element(ID_VENUE, 60.0, 190.0).unwrap();
        s.delete_element(ID_VENUE).unwrap();
        assert_eq!(s.template().elements.len(), before - 1);
        assert!(s.template().element(ID_VENUE).is_none());
        assert!(s.template().element(ID_EVENT_NAME).is_some());
        assert_eq!(s.selection(), &Selection::Unselected);
        assert!(matches!(
            s.delete_element(ID_VENUE),
            Err(TemplateError::UnknownElement(_))
        ));
    }

    #[test]
    fn move_clamps_to_canvas() {
        let mut s = session();
        assert_eq!(s.move_element(ID_VENUE, -50.0, 10.0).unwrap(), (0.0, 10.0));
        assert_eq!(s.move_element(ID_VENUE, 5000.0, 9000.0).unwrap(), (980.0, 480.0));
        assert_eq!(s.template().element(ID_VENUE).unwrap().position(), (980.0, 480.0));
    }

    #[test]
    fn update_changes_one_property() {
        let mut s = session();
        s.update_element(ID_VENUE, ElementUpdate::FontSize(30.0)).unwrap();
        s.update_element(ID_VENUE, ElementUpdate::TextAlign(TextAlign::Right)).unwrap();
        let venue = text(&s, ID_VENUE);
        assert_eq!(venue.font_size, 30.0);
        assert_eq!(venue.text_align, Some(TextAlign::Right));
        assert_eq!(venue.color, "#555555");
    }

    #[test]
    fn dynamic_content_is_not_editable() {
        let mut s = session();
        assert!(matches!(
            s.update_element(ID_ATTENDEE_NAME, ElementUpdate::Content("Bob".into())),
            Err(TemplateError::DynamicContent(_))
        ));
        // Styling a dynamic element is fine
        s.update_element(ID_ATTENDEE_NAME, ElementUpdate::Color("#ff0000".into()))
            .unwrap();
    }

    #[test]
    fn property_must_fit_element_kind() {
        let mut s = session();
        assert!(matches!(
            s.update_element(ID_QR_CODE, ElementUpdate::FontSize(12.0)),
            Err(TemplateError::PropertyMismatch { property: "fontSize", .. })
        ));
        assert!(matches!(
            s.update_element(ID_VENUE, ElementUpdate::Width(12.0)),
            Err(TemplateError::PropertyMismatch { .. })
        ));
        s.update_element(ID_QR_CODE, ElementUpdate::Width(120.0)).unwrap();
    }

    #[test]
    fn update_selected_is_noop_without_selection() {
        let mut s = session();
        let before = s.template().clone();
        assert!(!s.update_selected(ElementUpdate::FontSize(40.0)).unwrap());
        assert_eq!(s.template(), &before);

        s.pointer_down_on_element(ID_EVENT_NAME, 50.0, 50.0).unwrap();
        s.pointer_up();
        assert!(s.update_selected(ElementUpdate::FontSize(40.0)).unwrap());
        assert_eq!(text(&s, ID_EVENT_NAME).font_size, 40.0);
    }

    #[test]
    fn drag_state_machine() {
        let mut s = session();
        assert_eq!(s.pointer_move(10.0, 10.0).unwrap(), None);

        // Grab the venue 5px right and 5px below its origin (50, 180)
        s.pointer_down_on_element(ID_VENUE, 55.0, 185.0).unwrap();
        assert_eq!(
            s.selection(),
            &Selection::Dragging {
                id: ID_VENUE.to_string(),
                offset: (5.0, 5.0)
            }
        );
        assert_eq!(s.pointer_move(305.0, 205.0).unwrap(), Some((300.0, 200.0)));
        assert_eq!(s.pointer_move(-100.0, 205.0).unwrap(), Some((0.0, 200.0)));

        s.pointer_up();
        assert_eq!(s.selection(), &Selection::Selected(ID_VENUE.to_string()));
        assert_eq!(s.pointer_move(500.0, 300.0).unwrap(), None);
        assert_eq!(s.template().element(ID_VENUE).unwrap().position(), (0.0, 200.0));

        s.pointer_down_on_canvas();
        assert_eq!(s.selection(), &Selection::Unselected);
    }

    #[test]
    fn background_changes_leave_elements_alone() {
        let mut s = session();
        let elements = s.template().elements.clone();

        s.set_canvas_background(Background::Image("bg.png".into()));
        assert_eq!(s.template().canvas.background_image.as_deref(), Some("bg.png"));

        s.apply_preset(TemplatePreset::Vip);
        assert_eq!(s.template().canvas.background, "#fef3c7");
        assert_eq!(s.template().canvas.background_image.as_deref(), Some("bg.png"));

        s.set_canvas_background(Background::Color("#123456".into()));
        assert_eq!(s.template().canvas.background, "#123456");
        assert_eq!(s.template().canvas.background_image, None);

        assert_eq!(s.template().elements, elements);
    }
}
