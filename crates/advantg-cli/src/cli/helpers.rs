use super::CliError;
use super::commands::{BindingArgs, InputArgs};
use advantg_core::domain::AdvantgError;
use advantg_core::serialization::{normalize_text_artifact, write_text_artifact};
use advantg_core::{ResolvedInput, TemplateBindings, load_input_file};
use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ADVANTG_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

pub(super) fn init_tracing(level: Option<&str>) -> Result<(), CliError> {
    let filter = match level {
        Some(level) => {
            let level = level.parse::<LevelFilter>().map_err(|_| {
                CliError::Usage(format!(
                    "invalid log level '{level}'; \
                     expected one of off, error, warn, info, debug, trace"
                ))
            })?;
            EnvFilter::default().add_directive(level.into())
        }
        None => EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize logging: {error}"))?;
    Ok(())
}

pub(super) fn load_bindings(args: &BindingArgs) -> Result<TemplateBindings, CliError> {
    let mut bindings = match &args.bindings {
        Some(path) => {
            let source = fs::read_to_string(path).map_err(|source| {
                AdvantgError::io_system(
                    "IO.BINDINGS_READ",
                    format!("failed to read bindings '{}': {}", path.display(), source),
                )
            })?;
            TemplateBindings::from_json(&source)?
        }
        None => TemplateBindings::new(),
    };

    for assignment in &args.assignments {
        bindings.insert_assignment(assignment)?;
    }
    debug!(
        from_file = args.bindings.is_some(),
        assignments = args.assignments.len(),
        "loaded template bindings"
    );
    Ok(bindings)
}

pub(super) fn load_resolved(args: &InputArgs) -> Result<ResolvedInput, CliError> {
    let bindings = load_bindings(&args.bindings)?;
    Ok(load_input_file(&args.input, &bindings)?)
}

pub(super) fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(super) fn write_output(path: Option<&Path>, content: &str) -> Result<(), CliError> {
    match path {
        Some(path) => write_text_artifact(path, content)
            .with_context(|| format!("failed to write output '{}'", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(normalize_text_artifact(content).as_bytes())
                .context("failed to write to stdout")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_bindings, source_name};
    use crate::cli::commands::BindingArgs;
    use advantg_core::domain::{InputErrorKind, ParameterValue};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn set_assignments_override_bindings_file() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("bindings.json");
        fs::write(&path, r#"{ "model": "base.inp", "scale": 2 }"#)
            .expect("bindings should be written");

        let args = BindingArgs {
            assignments: vec!["model=override.inp".to_string()],
            bindings: Some(path),
        };
        let bindings = load_bindings(&args).expect("bindings should load");

        assert_eq!(
            bindings.get("model"),
            Some(&ParameterValue::Text("override.inp".to_string()))
        );
        assert_eq!(bindings.get("scale"), Some(&ParameterValue::Number(2.0)));
    }

    #[test]
    fn malformed_assignment_is_an_invalid_binding() {
        let args = BindingArgs {
            assignments: vec!["model".to_string()],
            bindings: None,
        };
        let Err(crate::cli::CliError::Compute(error)) = load_bindings(&args) else {
            panic!("assignment without '=' should fail");
        };
        assert_eq!(error.kind(), Some(InputErrorKind::InvalidBinding));
    }

    #[test]
    fn source_name_uses_file_name() {
        assert_eq!(source_name(Path::new("/tmp/decks/eta.inp")), "eta.inp");
    }
}
