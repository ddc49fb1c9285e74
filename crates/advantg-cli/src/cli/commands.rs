use super::CliError;
use super::helpers::*;
use advantg_core::domain::Axis;
use advantg_core::serialization::{format_number, render_deck, summary_json};
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct InputArgs {
    /// Input deck path
    #[arg(value_name = "INPUT")]
    pub(super) input: PathBuf,

    #[command(flatten)]
    pub(super) bindings: BindingArgs,
}

#[derive(clap::Args, Default)]
pub(super) struct BindingArgs {
    /// Bind a placeholder the deck leaves free, e.g. --set model=eta.inp
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub(super) assignments: Vec<String>,

    /// JSON object of placeholder bindings; --set entries take precedence
    #[arg(long, value_name = "PATH")]
    pub(super) bindings: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct OutputArgs {
    #[command(flatten)]
    pub(super) input: InputArgs,

    /// Write to this path instead of stdout
    #[arg(long, short, value_name = "PATH")]
    pub(super) output: Option<PathBuf>,
}

pub(super) fn run_check_command(args: InputArgs) -> Result<i32, CliError> {
    let resolved = load_resolved(&args)?;
    println!(
        "{}: OK ({} parameters, {} directives, {} mesh cells)",
        args.input.display(),
        resolved.parameters.len(),
        resolved.directives.len(),
        resolved.mesh.cell_count()
    );
    Ok(0)
}

pub(super) fn run_render_command(args: OutputArgs) -> Result<i32, CliError> {
    let resolved = load_resolved(&args.input)?;
    let source_name = source_name(&args.input.input);
    let deck = render_deck(&resolved, Some(&source_name));
    write_output(args.output.as_deref(), &deck)?;
    info!(directives = resolved.directives.len(), "rendered deck");
    Ok(0)
}

pub(super) fn run_mesh_command(args: InputArgs) -> Result<i32, CliError> {
    let resolved = load_resolved(&args)?;

    let mut lines = vec![format!(
        "{:<4} {:>12} {:>12} {:>12} {:>7} {:>8} {:>12} {:>12}",
        "axis", "lower", "upper", "extent", "coarse", "fine", "min_width", "max_width"
    )];
    for axis in Axis::ALL {
        let mesh = resolved.mesh.axis(axis);
        let (min_width, max_width) = mesh.cell_width_range();
        lines.push(format!(
            "{:<4} {:>12} {:>12} {:>12} {:>7} {:>8} {:>12.6} {:>12.6}",
            axis.as_str(),
            format_number(mesh.lower()),
            format_number(mesh.upper()),
            format_number(mesh.extent()),
            mesh.intervals.len(),
            mesh.cell_count(),
            min_width,
            max_width
        ));
    }
    lines.push(format!("total cells: {}", resolved.mesh.cell_count()));

    write_output(None, &lines.join("\n"))?;
    Ok(0)
}

pub(super) fn run_json_command(args: OutputArgs) -> Result<i32, CliError> {
    let resolved = load_resolved(&args.input)?;
    let source_name = source_name(&args.input.input);
    let json = summary_json(&resolved, Some(&source_name))?;
    write_output(args.output.as_deref(), &json)?;
    Ok(0)
}
