use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage_core::constants::DATA_DIR_ENV_VAR;
use triage_core::{resolve_data_dir, CoreConfig, Level, TriageResult, TriageService};
use triage_cpf::Cpf;

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Emergency-room triage CLI")]
struct Cli {
    /// Directory holding registry.bin and queue.bin
    #[arg(long, global = true, env = DATA_DIR_ENV_VAR)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new patient
    Register {
        /// Patient CPF (punctuation optional)
        #[arg(value_parser = Cpf::parse)]
        cpf: Cpf,
        /// Patient name
        name: String,
    },
    /// Remove a patient (discharge or death)
    Remove {
        #[arg(value_parser = Cpf::parse)]
        cpf: Cpf,
    },
    /// List all registered patients
    List,
    /// Show one patient
    Show {
        #[arg(value_parser = Cpf::parse)]
        cpf: Cpf,
    },
    /// Place a patient in the waiting queue
    Triage {
        #[arg(value_parser = Cpf::parse)]
        cpf: Cpf,
        /// Urgency level, 0 (immediate) to 4 (non-urgent), or its code (IM, VU, UR, ST, NU)
        #[arg(value_parser = Level::parse)]
        level: Level,
    },
    /// Take a patient out of the waiting queue
    Leave {
        #[arg(value_parser = Cpf::parse)]
        cpf: Cpf,
    },
    /// Show the waiting queue in call order
    Queue,
    /// Call the next patient
    Call,
    /// Procedure history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// Record a procedure
    Add {
        #[arg(value_parser = Cpf::parse)]
        cpf: Cpf,
        /// Procedure description
        text: String,
    },
    /// Undo the most recent procedure
    Undo {
        #[arg(value_parser = Cpf::parse)]
        cpf: Cpf,
    },
    /// Show procedures, most recent first
    Show {
        #[arg(value_parser = Cpf::parse)]
        cpf: Cpf,
    },
}

impl Commands {
    fn mutates(&self) -> bool {
        match self {
            Commands::List | Commands::Show { .. } | Commands::Queue => false,
            Commands::History {
                command: HistoryCommands::Show { .. },
            } => false,
            _ => true,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("triage=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = Arc::new(CoreConfig::with_data_dir(resolve_data_dir(cli.data_dir))?);

    let (mut service, report) = TriageService::open(cfg)?;
    for problem in &report.problems {
        eprintln!("Warning: {}", problem);
    }

    let mutates = cli.command.mutates();
    if let Err(e) = run(&mut service, cli.command) {
        eprintln!("Error: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    if mutates {
        service.shutdown()?;
    }
    Ok(ExitCode::SUCCESS)
}

fn run(service: &mut TriageService, command: Commands) -> TriageResult<()> {
    match command {
        Commands::Register { cpf, name } => {
            let patient = service.register(cpf, &name)?;
            println!("Registered {} ({})", patient.name(), patient.id());
        }
        Commands::Remove { cpf } => {
            let patient = service.remove(&cpf)?;
            println!("Removed {} ({})", patient.name(), patient.id());
        }
        Commands::List => {
            if service.patient_count() == 0 {
                println!("No patients found.");
            }
            for patient in service.patients() {
                println!("{}  {}", patient.id(), patient.name());
            }
        }
        Commands::Show { cpf } => {
            let patient = service.patient(&cpf)?;
            println!("CPF: {}", patient.id());
            println!("Name: {}", patient.name());
            match patient.ticket() {
                Some(ticket) if patient.is_queued() => {
                    println!("Status: waiting, ticket {} ({})", ticket, ticket.level())
                }
                Some(ticket) => println!("Status: called, last ticket {}", ticket),
                None => println!("Status: not triaged"),
            }
            println!("Procedures: {}", patient.history().len());
        }
        Commands::Triage { cpf, level } => {
            let ticket = service.triage(&cpf, level)?;
            println!("Ticket {} issued at {}", ticket, level);
        }
        Commands::Leave { cpf } => {
            service.leave_queue(&cpf)?;
            println!("{} left the queue", cpf);
        }
        Commands::Queue => {
            let waiting = service.waiting();
            if waiting.is_empty() {
                println!("Nobody is waiting.");
            }
            for (position, (level, patient)) in waiting.into_iter().enumerate() {
                let ticket = patient
                    .ticket()
                    .map(|t| t.to_string())
                    .unwrap_or_default();
                println!(
                    "{:>3}. {:<7} {:<18} {}  {}",
                    position + 1,
                    ticket,
                    level.to_string(),
                    patient.id(),
                    patient.name()
                );
            }
        }
        Commands::Call => match service.call_next() {
            Some(patient) => println!("Calling {} ({})", patient.name(), patient.id()),
            None => println!("Nobody is waiting."),
        },
        Commands::History { command } => match command {
            HistoryCommands::Add { cpf, text } => {
                service.add_procedure(&cpf, &text)?;
                println!("Recorded procedure for {}", cpf);
            }
            HistoryCommands::Undo { cpf } => {
                let undone = service.undo_procedure(&cpf)?;
                println!("Undid '{}'", undone);
            }
            HistoryCommands::Show { cpf } => {
                let history = service.history(&cpf)?;
                if history.is_empty() {
                    println!("No procedures recorded.");
                }
                for (i, text) in history.recent_first().enumerate() {
                    println!("{:>3}. {}", i + 1, text);
                }
            }
        },
    }

    Ok(())
}
