// ticket-forge: bundle rendered tickets into one downloadable ZIP

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::num::NonZeroUsize;
use std::thread;

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::pdf::TicketRenderer;
use super::GeneratedTicket;
use crate::directory::EventInfo;
use crate::error::RenderError;

/// Pool size when the core count is unknown
const DEFAULT_WORKERS: usize = 4;

/// The finished download: archive name, entry names and ZIP bytes
#[derive(Debug, Clone)]
pub struct TicketArchive {
    pub file_name: String,
    pub entries: Vec<String>,
    pub bytes: Vec<u8>,
}

/// Render every ticket, then zip them all.
///
/// Tickets are split across a fixed pool of scoped worker threads; the
/// archive is only written after every render has finished. Any failed
/// render fails the whole call.
pub fn package_for_download(
    event: &EventInfo,
    tickets: &[GeneratedTicket],
) -> Result<TicketArchive, RenderError> {
    let first = tickets.first().ok_or(RenderError::EmptySelection)?;
    let renderer = TicketRenderer::new(&first.template.canvas)?;

    let documents = render_all(&renderer, tickets)?;

    let event_slug = sanitize_file_name(&event.name);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries: Vec<String> = Vec::with_capacity(documents.len());
    let mut used = HashSet::with_capacity(documents.len());

    for (ticket, pdf) in tickets.iter().zip(documents) {
        let stem = format!(
            "{}_{}_{}",
            sanitize_file_name(&ticket.attendee_name),
            event_slug,
            sanitize_file_name(&ticket.ticket_id)
        );
        let name = unique_entry_name(&stem, &mut used);
        zip.start_file(name.as_str(), options)
            .map_err(|e| RenderError::ArchiveError(e.to_string()))?;
        zip.write_all(&pdf)
            .map_err(|e| RenderError::ArchiveError(e.to_string()))?;
        debug!(entry = %name, "added ticket to archive");
        entries.push(name);
    }

    let bytes = zip
        .finish()
        .map_err(|e| RenderError::ArchiveError(e.to_string()))?
        .into_inner();

    let file_name = format!("{}_tickets.zip", event_slug);
    info!(archive = %file_name, tickets = entries.len(), "packaged tickets");

    Ok(TicketArchive {
        file_name,
        entries,
        bytes,
    })
}

/// Worker threads used for `tickets` renders: one per core, never more
/// than there are tickets.
pub fn worker_count(tickets: usize) -> usize {
    let cores = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(DEFAULT_WORKERS);
    cores.min(tickets).max(1)
}

/// Fan out contiguous chunks to the pool, fan in by chunk so the output
/// keeps the input order.
fn render_all(
    renderer: &TicketRenderer,
    tickets: &[GeneratedTicket],
) -> Result<Vec<Vec<u8>>, RenderError> {
    let workers = worker_count(tickets.len());
    let chunk_size = tickets.len().div_ceil(workers);
    debug!(workers, tickets = tickets.len(), "rendering tickets");

    let rendered: Vec<Result<Vec<u8>, RenderError>> = thread::scope(|scope| {
        let handles: Vec<_> = tickets
            .chunks(chunk_size)
            .map(|chunk| {
                let handle = scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|ticket| renderer.render(ticket))
                        .collect::<Vec<_>>()
                });
                (handle, chunk)
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|(handle, chunk)| {
                let results = handle.join().unwrap_or_else(|_| {
                    chunk
                        .iter()
                        .map(|ticket| Err(failure(ticket, "render thread panicked")))
                        .collect()
                });
                results
                    .into_iter()
                    .zip(chunk)
                    .map(|(result, ticket)| {
                        result.map_err(|e| match e {
                            RenderError::RenderFailure { .. } => e,
                            other => failure(ticket, &other.to_string()),
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    });

    rendered.into_iter().collect()
}

/// `{stem}.pdf`, or `{stem}-2.pdf`, `{stem}-3.pdf`, ... once taken.
fn unique_entry_name(stem: &str, used: &mut HashSet<String>) -> String {
    let mut name = format!("{}.pdf", stem);
    let mut n = 2;
    while used.contains(&name) {
        name = format!("{}-{}.pdf", stem, n);
        n += 1;
    }
    used.insert(name.clone());
    name
}

fn failure(ticket: &GeneratedTicket, reason: &str) -> RenderError {
    RenderError::RenderFailure {
        attendee_id: ticket.ticket_id.clone(),
        reason: reason.to_string(),
    }
}

/// Spaces become dashes; anything outside `[A-Za-z0-9_-]` is dropped.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "ticket".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use zip::ZipArchive;

    use super::*;
    use crate::render::generate_tickets;
    use crate::directory::Attendee;
    use crate::render::tests::{attendees, event};
    use crate::template::{Element, TicketTemplate};

    #[test]
    fn archive_holds_one_pdf_per_ticket() {
        let template = TicketTemplate::for_event(&event());
        let tickets = generate_tickets(&template, &event(), &attendees(), &["1", "2"]).unwrap();
        let archive = package_for_download(&event(), &tickets).unwrap();

        assert_eq!(archive.file_name, "Tech-Conference-2024_tickets.zip");
        assert_eq!(
            archive.entries,
            vec![
                "John-Doe_Tech-Conference-2024_1.pdf",
                "Jane-Smith_Tech-Conference-2024_2.pdf"
            ]
        );

        let mut zip = ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        assert_eq!(zip.len(), 2);
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            assert!(content.starts_with(b"%PDF"));
        }
    }

    #[test]
    fn nothing_to_package_is_an_empty_selection() {
        assert!(matches!(
            package_for_download(&event(), &[]),
            Err(RenderError::EmptySelection)
        ));
    }

    #[test]
    fn one_bad_ticket_fails_the_batch() {
        let template = TicketTemplate::for_event(&event());
        let mut tickets = generate_tickets(&template, &event(), &attendees(), &["1", "2"]).unwrap();
        if let Some(Element::Text(t)) = tickets[1].template.elements.first_mut() {
            t.color = "bogus".to_string();
        }
        assert!(matches!(
            package_for_download(&event(), &tickets),
            Err(RenderError::RenderFailure { attendee_id, .. }) if attendee_id == "2"
        ));
    }

    #[test]
    fn many_tickets_keep_selection_order() {
        let people: Vec<Attendee> = (1..=64)
            .map(|i| Attendee {
                id: i.to_string(),
                name: format!("Guest {}", i),
                email: format!("guest{}@example.com", i),
                phone: "555".to_string(),
                ticket_type: "VIP".to_string(),
            })
            .collect();
        let ids: Vec<String> = people.iter().map(|a| a.id.clone()).collect();

        let mut template = TicketTemplate::for_event(&event());
        template.canvas.width = 200.0;
        template.canvas.height = 100.0;
        for element in template.elements.iter_mut() {
            if let Element::QrCode(qr) = element {
                qr.x = 10.0;
                qr.y = 10.0;
                qr.width = 60.0;
                qr.height = 60.0;
            }
        }

        let tickets = generate_tickets(&template, &event(), &people, ids.as_slice()).unwrap();
        let archive = package_for_download(&event(), &tickets).unwrap();

        let expected: Vec<String> = (1..=64)
            .map(|i| format!("Guest-{}_Tech-Conference-2024_{}.pdf", i, i))
            .collect();
        assert_eq!(archive.entries, expected);

        let zip = ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert_eq!(names.len(), 64);
    }

    #[test]
    fn pool_is_bounded() {
        assert_eq!(worker_count(1), 1);
        assert_eq!(worker_count(0), 1);
        let cores = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(DEFAULT_WORKERS);
        assert_eq!(worker_count(100_000), cores);
    }

    #[test]
    fn colliding_entry_names_get_a_suffix() {
        let mut people = attendees();
        people[0].id = "1/2".to_string();
        people[1].id = "12".to_string();
        people[1].name = people[0].name.clone();

        let template = TicketTemplate::for_event(&event());
        let tickets = generate_tickets(&template, &event(), &people, &["1/2", "12"]).unwrap();
        let archive = package_for_download(&event(), &tickets).unwrap();
        assert_eq!(
            archive.entries,
            vec![
                "John-Doe_Tech-Conference-2024_12.pdf",
                "John-Doe_Tech-Conference-2024_12-2.pdf"
            ]
        );
        assert_eq!(ZipArchive::new(Cursor::new(archive.bytes)).unwrap().len(), 2);
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("John O'Brien"), "John-OBrien");
        assert_eq!(sanitize_file_name("  Gala / 2025 "), "Gala--2025");
        assert_eq!(sanitize_file_name("???"), "ticket");
    }
}
