use crate::domain::{AdvantgError, AdvantgResult, Directive, ParameterTable};
use crate::mesh::{MeshGrid, build_mesh_grid};
use crate::options::validate_directives;
use crate::parser::parse_input;
use crate::resolver::{TemplateBindings, resolve_parameters};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// A fully validated input: every placeholder substituted, every directive
/// typed, all three mesh axes consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput {
    pub parameters: ParameterTable,
    pub directives: Vec<Directive>,
    pub mesh: MeshGrid,
}

impl ResolvedInput {
    pub fn directive(&self, key: &str) -> Option<&Directive> {
        self.directives.iter().find(|directive| directive.key == key)
    }
}

pub fn load_input(source: &str, bindings: &TemplateBindings) -> AdvantgResult<ResolvedInput> {
    let document = parse_input(source)?;
    debug!(
        definitions = document.definitions.len(),
        directives = document.directives.len(),
        comments = document.comment_lines,
        "parsed input"
    );

    let parameters = resolve_parameters(&document.definitions, bindings)?;
    let directives = validate_directives(&document.directives, &parameters)?;
    let mesh = build_mesh_grid(&directives)?;

    info!(
        parameters = parameters.len(),
        directives = directives.len(),
        cells = mesh.cell_count(),
        "input validated"
    );

    Ok(ResolvedInput {
        parameters,
        directives,
        mesh,
    })
}

pub fn load_input_file(path: &Path, bindings: &TemplateBindings) -> AdvantgResult<ResolvedInput> {
    let source = fs::read_to_string(path).map_err(|source| {
        AdvantgError::io_system(
            "IO.INPUT_READ",
            format!("failed to read input '{}': {}", path.display(), source),
        )
    })?;
    debug!(path = %path.display(), bytes = source.len(), "read input file");
    load_input(&source, bindings)
}
