use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triage_core::constants::DATA_DIR_ENV_VAR;
use triage_core::{CoreConfig, Level, TriageResult, TriageService, resolve_data_dir};
use triage_cpf::Cpf;

const MENU: &str = "\
1. Register patient
2. Register death
3. Add procedure
4. Undo procedure
5. Call next patient
6. Show waiting list
7. Show history
8. Triage patient
9. List patients
0. Exit";

/// Main entry point for the interactive triage console
///
/// Loads saved state, runs the numbered menu on stdin/stdout until the user exits (or stdin
/// closes), then saves everything back.
///
/// # Environment Variables
/// - `TRIAGE_DATA_DIR`: Directory for registry.bin and queue.bin (default: "data")
/// - `RUST_LOG`: Log filter (default directive: "triage=info")
///
/// # Returns
/// * `Ok(())` - On graceful exit with state saved
/// * `Err(anyhow::Error)` - If state cannot be loaded or saved
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("triage=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let data_dir = std::env::var(DATA_DIR_ENV_VAR).ok().map(PathBuf::from);
    let cfg = Arc::new(CoreConfig::with_data_dir(resolve_data_dir(data_dir))?);
    tracing::info!("++ Using data directory {}", cfg.data_dir().display());

    let (service, report) = TriageService::open(cfg)?;
    for problem in &report.problems {
        eprintln!("Warning: {}", problem);
    }

    let stdin = io::stdin();
    let mut console = Console::new(service, stdin.lock(), io::stdout());
    console.run()?;

    let saved = console.into_service().shutdown()?;
    println!(
        "Saved {} patient(s), {} waiting. Goodbye.",
        saved.patients, saved.queued
    );
    Ok(())
}

/// Numbered-menu front end over a [`TriageService`].
///
/// Domain errors are printed and the menu carries on; only I/O errors on the console itself end
/// the loop early.
struct Console<R, W> {
    service: TriageService,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    fn new(service: TriageService, input: R, output: W) -> Self {
        Self {
            service,
            input,
            output,
        }
    }

    fn into_service(self) -> TriageService {
        self.service
    }

    /// Runs the menu until option 0 or end of input.
    fn run(&mut self) -> io::Result<()> {
        loop {
            writeln!(self.output, "\n{MENU}")?;
            let Some(choice) = self.prompt("Option: ")? else {
                return Ok(());
            };

            let outcome = match choice.as_str() {
                "1" => self.register(),
                "2" => self.register_death(),
                "3" => self.add_procedure(),
                "4" => self.undo_procedure(),
                "5" => self.call_next(),
                "6" => self.show_waiting(),
                "7" => self.show_history(),
                "8" => self.triage(),
                "9" => self.list_patients(),
                "0" => return Ok(()),
                other => {
                    writeln!(self.output, "Unknown option '{other}'")?;
                    continue;
                }
            };

            match outcome {
                Ok(Step::Done) => {}
                Ok(Step::Failed(e)) => writeln!(self.output, "Error: {e}")?,
                Ok(Step::EndOfInput) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    fn register(&mut self) -> io::Result<Step> {
        let Some(cpf) = self.read_cpf()? else {
            return Ok(Step::EndOfInput);
        };
        let Some(name) = self.prompt("Name: ")? else {
            return Ok(Step::EndOfInput);
        };
        match self.service.register(cpf, &name) {
            Ok(patient) => {
                let line = format!("Registered {} ({})", patient.name(), patient.id());
                writeln!(self.output, "{line}")?;
                Ok(Step::Done)
            }
            Err(e) => Ok(Step::Failed(e.to_string())),
        }
    }

    fn register_death(&mut self) -> io::Result<Step> {
        let Some(cpf) = self.read_cpf()? else {
            return Ok(Step::EndOfInput);
        };
        let removed = self.service.remove(&cpf);
        self.report(removed.map(|p| format!("Removed {} ({})", p.name(), p.id())))
    }

    fn add_procedure(&mut self) -> io::Result<Step> {
        let Some(cpf) = self.read_cpf()? else {
            return Ok(Step::EndOfInput);
        };
        let Some(text) = self.prompt("Procedure: ")? else {
            return Ok(Step::EndOfInput);
        };
        let added = self.service.add_procedure(&cpf, &text);
        self.report(added.map(|()| "Procedure recorded".to_string()))
    }

    fn undo_procedure(&mut self) -> io::Result<Step> {
        let Some(cpf) = self.read_cpf()? else {
            return Ok(Step::EndOfInput);
        };
        let undone = self.service.undo_procedure(&cpf);
        self.report(undone.map(|text| format!("Undid '{text}'")))
    }

    fn call_next(&mut self) -> io::Result<Step> {
        let line = match self.service.call_next() {
            Some(patient) => format!("Calling {} ({})", patient.name(), patient.id()),
            None => "Nobody is waiting.".to_string(),
        };
        writeln!(self.output, "{line}")?;
        Ok(Step::Done)
    }

    fn show_waiting(&mut self) -> io::Result<Step> {
        let lines: Vec<String> = self
            .service
            .waiting()
            .into_iter()
            .map(|(level, patient)| {
                let ticket = patient.ticket().map(|t| t.to_string()).unwrap_or_default();
                format!(
                    "{ticket:<7} {:<18} {}  {}",
                    level.to_string(),
                    patient.id(),
                    patient.name()
                )
            })
            .collect();

        if lines.is_empty() {
            writeln!(self.output, "Nobody is waiting.")?;
        }
        for line in lines {
            writeln!(self.output, "{line}")?;
        }
        Ok(Step::Done)
    }

    fn show_history(&mut self) -> io::Result<Step> {
        let Some(cpf) = self.read_cpf()? else {
            return Ok(Step::EndOfInput);
        };
        let lines: TriageResult<Vec<String>> = self
            .service
            .history(&cpf)
            .map(|history| history.recent_first().map(str::to_owned).collect());

        match lines {
            Ok(lines) if lines.is_empty() => {
                writeln!(self.output, "No procedures recorded.")?;
                Ok(Step::Done)
            }
            Ok(lines) => {
                for (i, line) in lines.iter().enumerate() {
                    writeln!(self.output, "{:>3}. {}", i + 1, line)?;
                }
                Ok(Step::Done)
            }
            Err(e) => Ok(Step::Failed(e.to_string())),
        }
    }

    fn triage(&mut self) -> io::Result<Step> {
        let Some(cpf) = self.read_cpf()? else {
            return Ok(Step::EndOfInput);
        };
        for level in Level::ALL {
            writeln!(self.output, "  {}", level)?;
        }
        let Some(raw) = self.prompt("Level: ")? else {
            return Ok(Step::EndOfInput);
        };
        let ticket = Level::parse(&raw).and_then(|level| self.service.triage(&cpf, level));
        self.report(ticket.map(|t| format!("Ticket {} issued at {}", t, t.level())))
    }

    fn list_patients(&mut self) -> io::Result<Step> {
        let lines: Vec<String> = self
            .service
            .patients()
            .map(|p| format!("{}  {}", p.id(), p.name()))
            .collect();

        if lines.is_empty() {
            writeln!(self.output, "No patients found.")?;
        }
        for line in lines {
            writeln!(self.output, "{line}")?;
        }
        Ok(Step::Done)
    }

    /// Prompts for a CPF. A malformed CPF is reported and asked for again.
    fn read_cpf(&mut self) -> io::Result<Option<Cpf>> {
        loop {
            let Some(raw) = self.prompt("CPF: ")? else {
                return Ok(None);
            };
            match Cpf::parse(&raw) {
                Ok(cpf) => return Ok(Some(cpf)),
                Err(e) => writeln!(self.output, "Invalid CPF: {e}")?,
            }
        }
    }

    /// Writes `label` and reads one trimmed line. `None` at end of input.
    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn report(&mut self, result: TriageResult<String>) -> io::Result<Step> {
        match result {
            Ok(line) => {
                writeln!(self.output, "{line}")?;
                Ok(Step::Done)
            }
            Err(e) => Ok(Step::Failed(e.to_string())),
        }
    }
}

enum Step {
    Done,
    Failed(String),
    EndOfInput,
}
