// ticket-forge: per-attendee ticket generation

pub mod archive;
pub mod background;
pub mod pdf;

use serde::Serialize;
use tracing::{debug, info};

use crate::directory::{Attendee, EventInfo};
use crate::error::RenderError;
use crate::template::{
    Element, TicketTemplate, TOKEN_ATTENDEE_NAME, TOKEN_TICKET_ID, TOKEN_TICKET_TYPE,
};

pub use archive::{package_for_download, TicketArchive};
pub use pdf::{render_ticket, TicketRenderer};

// ============================================================================
// Data Structures
// ============================================================================

/// A template resolved for one attendee, ready to render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTicket {
    pub ticket_id: String,
    pub attendee_name: String,
    pub ticket_type: String,
    pub qr_payload: String,
    #[serde(skip)]
    pub template: TicketTemplate,
}

/// Values substituted for placeholder tokens
struct TokenValues<'a> {
    attendee_name: &'a str,
    ticket_id: &'a str,
    ticket_type: &'a str,
}

// ============================================================================
// Generation
// ============================================================================

/// Deterministic QR payload, unique per (attendee, event).
pub fn qr_payload(attendee_id: &str, event_id: &str) -> String {
    format!("TICKET-{}-EVENT-{}", attendee_id, event_id)
}

/// Resolve the template once per selected attendee.
///
/// The whole batch fails if the selection is empty or names an attendee that
/// is not in `attendees`. Repeated ids in the selection are generated once.
pub fn generate_tickets<S: AsRef<str>>(
    template: &TicketTemplate,
    event: &EventInfo,
    attendees: &[Attendee],
    selected_ids: &[S],
) -> Result<Vec<GeneratedTicket>, RenderError> {
    if selected_ids.is_empty() {
        return Err(RenderError::EmptySelection);
    }

    let mut seen: Vec<&str> = Vec::with_capacity(selected_ids.len());
    let mut tickets = Vec::with_capacity(selected_ids.len());

    for id in selected_ids.iter().map(|s| s.as_ref()) {
        if seen.contains(&id) {
            debug!(attendee_id = id, "skipping repeated selection");
            continue;
        }
        seen.push(id);

        let attendee = attendees
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| RenderError::RenderFailure {
                attendee_id: id.to_string(),
                reason: "attendee not found".to_string(),
            })?;

        let payload = qr_payload(&attendee.id, &event.id);
        let values = TokenValues {
            attendee_name: &attendee.name,
            ticket_id: &payload,
            ticket_type: &attendee.ticket_type,
        };

        tickets.push(GeneratedTicket {
            ticket_id: attendee.id.clone(),
            attendee_name: attendee.name.clone(),
            ticket_type: attendee.ticket_type.clone(),
            template: resolve_template(template, &values),
            qr_payload: payload,
        });
    }

    info!(event_id = %event.id, count = tickets.len(), "generated tickets");
    Ok(tickets)
}

fn resolve_template(template: &TicketTemplate, values: &TokenValues<'_>) -> TicketTemplate {
    let mut resolved = template.clone();
    for element in resolved.elements.iter_mut() {
        if !element.is_dynamic() {
            continue;
        }
        match element {
            Element::Text(t) => t.content = resolve_tokens(&t.content, values),
            Element::QrCode(q) => q.content = resolve_tokens(&q.content, values),
        }
    }
    resolved
}

fn resolve_tokens(content: &str, values: &TokenValues<'_>) -> String {
    content
        .replace(TOKEN_ATTENDEE_NAME, values.attendee_name)
        .replace(TOKEN_TICKET_ID, values.ticket_id)
        .replace(TOKEN_TICKET_TYPE, values.ticket_type)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::template::{ID_ATTENDEE_NAME, ID_EVENT_NAME, ID_QR_CODE, ID_TICKET_TYPE};

    pub(crate) fn event() -> EventInfo {
        EventInfo {
            id: "1".to_string(),
            name: "Tech Conference 2024".to_string(),
            title: None,
            date: None,
            location: Some("Convention Center".to_string()),
        }
    }

    pub(crate) fn attendees() -> Vec<Attendee> {
        vec![
            Attendee {
                id: "1".to_string(),
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
                phone: "1234567890".to_string(),
                ticket_type: "VIP".to_string(),
            },
            Attendee {
                id: "2".to_string(),
                name: "Jane Smith".to_string(),
                email: "jane@example.com".to_string(),
                phone: "0987654321".to_string(),
                ticket_type: "VIP".to_string(),
            },
        ]
    }

    #[test]
    fn empty_selection_fails() {
        let template = TicketTemplate::for_event(&event());
        let result = generate_tickets::<&str>(&template, &event(), &attendees(), &[]);
        assert!(matches!(result, Err(RenderError::EmptySelection)));
    }

    #[test]
    fn one_ticket_per_attendee_with_distinct_payloads() {
        let template = TicketTemplate::for_event(&event());
        let tickets = generate_tickets(&template, &event(), &attendees(), &["1", "2"]).unwrap();
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].ticket_type, tickets[1].ticket_type);
        assert_ne!(tickets[0].qr_payload, tickets[1].qr_payload);
        assert_eq!(tickets[0].qr_payload, "TICKET-1-EVENT-1");
    }

    #[test]
    fn payload_is_stable_across_runs() {
        let template = TicketTemplate::for_event(&event());
        let a = generate_tickets(&template, &event(), &attendees(), &["2"]).unwrap();
        let b = generate_tickets(&template, &event(), &attendees(), &["2"]).unwrap();
        assert_eq!(a[0].qr_payload, b[0].qr_payload);
    }

    #[test]
    fn dynamic_tokens_are_resolved() {
        let template = TicketTemplate::for_event(&event());
        let tickets = generate_tickets(&template, &event(), &attendees(), &["2"]).unwrap();
        let resolved = &tickets[0].template;
        assert_eq!(resolved.element(ID_ATTENDEE_NAME).unwrap().content(), "Jane Smith");
        assert_eq!(resolved.element(ID_TICKET_TYPE).unwrap().content(), "VIP");
        assert_eq!(resolved.element(ID_QR_CODE).unwrap().content(), "TICKET-2-EVENT-1");
        assert_eq!(
            resolved.element(ID_EVENT_NAME).unwrap().content(),
            "Tech Conference 2024"
        );
        // The source template is untouched
        assert_eq!(template.element(ID_ATTENDEE_NAME).unwrap().content(), "{attendee_name}");
    }

    #[test]
    fn static_text_keeps_token_like_content() {
        let mut template = TicketTemplate::for_event(&event());
        if let Some(Element::Text(t)) = template.elements.first_mut() {
            t.content = "Hello {attendee_name}".to_string();
        }
        let tickets = generate_tickets(&template, &event(), &attendees(), &["1"]).unwrap();
        assert_eq!(
            tickets[0].template.element(ID_EVENT_NAME).unwrap().content(),
            "Hello {attendee_name}"
        );
    }

    #[test]
    fn unknown_attendee_fails_the_batch() {
        let template = TicketTemplate::for_event(&event());
        let result = generate_tickets(&template, &event(), &attendees(), &["1", "99"]);
        assert!(matches!(
            result,
            Err(RenderError::RenderFailure { attendee_id, .. }) if attendee_id == "99"
        ));
    }

    #[test]
    fn repeated_selection_is_generated_once() {
        let template = TicketTemplate::for_event(&event());
        let tickets = generate_tickets(&template, &event(), &attendees(), &["1", "1", "2"]).unwrap();
        assert_eq!(tickets.len(), 2);
    }
}
