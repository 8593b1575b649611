// ticket-forge: validate attendee imports and generate event tickets

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ticket_forge::import::{commit_import, sample_csv, validate_import};
use ticket_forge::render::{generate_tickets, package_for_download};
use ticket_forge::template::{TemplatePreset, TicketTemplate};
use ticket_forge::{
    AttendeeDirectory, DirectoryError, ImportError, RenderError, StaticDirectory, TemplateError,
    TemplateEditorSession,
};

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("Please select attendees with --attendee or --all")]
    NoSelection,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(author, version, about = "Validate attendee imports and generate event tickets")]
struct Args {
    /// Directory fixture (JSON array of events with ticket types and attendees)
    #[arg(short, long, global = true, default_value = "directory.json")]
    directory: PathBuf,

    /// Event id
    #[arg(short, long, global = true, default_value = "1")]
    event: String,

    /// Log filter when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate an attendee CSV and optionally import the valid rows
    Import {
        /// CSV file with a header row
        file: PathBuf,

        /// Create attendees from the valid rows and save the directory
        #[arg(long)]
        commit: bool,
    },

    /// Write the CSV import template
    SampleCsv {
        /// Output filename (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export the default ticket template for the event as JSON
    Template {
        /// Canvas preset
        #[arg(long, value_enum, default_value = "default")]
        preset: TemplatePreset,

        /// Output filename
        #[arg(short, long, default_value = "ticket_template.json")]
        output: PathBuf,
    },

    /// Render tickets for selected attendees into a ZIP of PDFs
    Generate {
        /// Template JSON (defaults to the event's default template)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Attendee id to generate a ticket for (repeatable)
        #[arg(short, long = "attendee")]
        attendees: Vec<String>,

        /// Generate tickets for every attendee of the event
        #[arg(long, conflicts_with = "attendees")]
        all: bool,

        /// Output filename (defaults to {event}_tickets.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ticket_forge={}", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: Args) -> Result<(), AppError> {
    let directory = StaticDirectory::load(&args.directory)?;

    match args.command {
        Command::Import { file, commit } => {
            run_import(&directory, &args.directory, &args.event, &file, commit)
        }
        Command::SampleCsv { output } => run_sample_csv(&directory, &args.event, output),
        Command::Template { preset, output } => {
            let event = directory.event(&args.event)?;
            let mut session = TemplateEditorSession::new(TicketTemplate::for_event(&event));
            session.apply_preset(preset);
            let template = session.into_template();
            template.save(&output)?;

            println!("✓ Exported template: {}", output.display());
            println!("  Event: {}", event.name);
            println!("  Elements: {}", template.elements.len());
            Ok(())
        }
        Command::Generate {
            template,
            attendees,
            all,
            output,
        } => run_generate(&directory, &args.event, template, attendees, all, output),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_import(
    directory: &StaticDirectory,
    directory_path: &Path,
    event_id: &str,
    file: &Path,
    commit: bool,
) -> Result<(), AppError> {
    let known_types = directory.ticket_type_names(event_id)?;
    let content = std::fs::read(file)?;
    let result = validate_import(&content, known_types.as_slice())?;

    println!(
        "Valid rows: {} of {}",
        result.valid_rows.len(),
        result.total_rows
    );
    if result.has_errors() {
        println!("Errors: {}", result.errors.len());
        for error in &result.errors {
            println!("  {}", error);
        }
    }

    if commit {
        let created = commit_import(directory, event_id, &result.valid_rows)?;
        directory.save(directory_path)?;
        println!("✓ Imported {} attendees", created.len());
    }
    Ok(())
}

fn run_sample_csv(
    directory: &StaticDirectory,
    event_id: &str,
    output: Option<PathBuf>,
) -> Result<(), AppError> {
    let known_types = directory.ticket_type_names(event_id)?;
    let csv = sample_csv(known_types.as_slice())?;
    match output {
        Some(path) => {
            std::fs::write(&path, csv)?;
            println!("✓ Generated: {}", path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}

fn run_generate(
    directory: &StaticDirectory,
    event_id: &str,
    template_path: Option<PathBuf>,
    selected: Vec<String>,
    all: bool,
    output: Option<PathBuf>,
) -> Result<(), AppError> {
    let event = directory.event(event_id)?;
    let attendees = directory.attendees(event_id)?;

    let template = match template_path {
        Some(path) => TicketTemplate::load(&path)?,
        None => TicketTemplate::for_event(&event),
    };

    let selected = if all {
        attendees.iter().map(|a| a.id.clone()).collect()
    } else {
        selected
    };
    if selected.is_empty() && !all {
        return Err(AppError::NoSelection);
    }

    let tickets = generate_tickets(&template, &event, &attendees, selected.as_slice())?;
    let archive = package_for_download(&event, &tickets)?;

    let output_file = output.unwrap_or_else(|| PathBuf::from(&archive.file_name));
    std::fs::write(&output_file, &archive.bytes)?;

    println!("✓ Generated: {}", output_file.display());
    println!("  Event: {}", event.name);
    println!("  Tickets: {}", archive.entries.len());

    Ok(())
}
