mod commands;
mod helpers;

use advantg_core::domain::{AdvantgError, ErrorCategory};
use clap::Parser;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let reported = error.as_advantg_error();
            eprintln!("{}", reported.diagnostic_line());
            if let Some(summary_line) = reported.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            reported.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("advantg-inp".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_tracing(cli.log_level.as_deref())?;
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "advantg-inp",
    version,
    about = "Validate and resolve ADVANTG input decks"
)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error); overrides ADVANTG_LOG
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Validate an input deck and print a one-line summary
    Check(commands::InputArgs),
    /// Print the deck with every placeholder resolved
    Render(commands::OutputArgs),
    /// Print the per-axis mesh table
    Mesh(commands::InputArgs),
    /// Print a JSON summary of parameters, directives and meshes
    Json(commands::OutputArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Check(args) => commands::run_check_command(args),
        CliCommand::Render(args) => commands::run_render_command(args),
        CliCommand::Mesh(args) => commands::run_mesh_command(args),
        CliCommand::Json(args) => commands::run_json_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(AdvantgError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AdvantgError> for CliError {
    fn from(error: AdvantgError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_advantg_error(&self) -> AdvantgError {
        match self {
            Self::Usage(message) => AdvantgError::new(
                ErrorCategory::InputValidationError,
                "INPUT.CLI_USAGE",
                message.trim_end(),
            ),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => AdvantgError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
