use crate::domain::{AdvantgError, AdvantgResult, Directive, DirectiveValue, ParameterTable};
use crate::loader::ResolvedInput;
use crate::mesh::{AxisMesh, MeshGrid};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Shortest round-trip form; integral values print without a fraction.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

pub fn render_directive_value(value: &DirectiveValue) -> String {
    match value {
        DirectiveValue::Boolean(true) => "True".to_string(),
        DirectiveValue::Boolean(false) => "False".to_string(),
        DirectiveValue::Integer(value) => value.to_string(),
        DirectiveValue::Real(value) => format_number(*value),
        DirectiveValue::Text(value) => value.clone(),
        DirectiveValue::Words(words) => words.join(" "),
        DirectiveValue::IntegerList(values) => values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" "),
        DirectiveValue::RealList(values) => values
            .iter()
            .map(|value| format_number(*value))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Resolved deck in the input line format with every placeholder expanded.
pub fn render_deck(resolved: &ResolvedInput, source_name: Option<&str>) -> String {
    let mut lines = Vec::with_capacity(resolved.directives.len() + 4);
    match source_name {
        Some(name) => lines.push(format!("C resolved from {name}")),
        None => lines.push("C resolved input".to_string()),
    }
    if !resolved.parameters.is_empty() {
        let names = resolved
            .parameters
            .iter()
            .map(|parameter| parameter.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("C parameters: {names}"));
    }
    lines.push(format!("C {} total mesh cells", resolved.mesh.cell_count()));

    let width = resolved
        .directives
        .iter()
        .map(|directive| directive.key.len())
        .max()
        .unwrap_or(0);
    for directive in &resolved.directives {
        lines.push(format!(
            "{:<width$} {}",
            directive.key,
            render_directive_value(&directive.value),
            width = width
        ));
    }

    normalize_text_artifact(&lines.join("\n"))
}

#[derive(Debug, Serialize)]
pub struct InputSummary<'a> {
    pub source: Option<&'a str>,
    pub parameters: &'a ParameterTable,
    pub directives: &'a [Directive],
    pub mesh: MeshSummary<'a>,
}

#[derive(Debug, Serialize)]
pub struct MeshSummary<'a> {
    pub x: AxisSummary<'a>,
    pub y: AxisSummary<'a>,
    pub z: AxisSummary<'a>,
    pub total_cells: u64,
}

#[derive(Debug, Serialize)]
pub struct AxisSummary<'a> {
    pub boundaries: &'a [f64],
    pub intervals: &'a [u32],
    pub cells: u64,
    pub extent: f64,
    pub min_width: f64,
    pub max_width: f64,
}

impl<'a> From<&'a AxisMesh> for AxisSummary<'a> {
    fn from(mesh: &'a AxisMesh) -> Self {
        let (min_width, max_width) = mesh.cell_width_range();
        Self {
            boundaries: &mesh.boundaries,
            intervals: &mesh.intervals,
            cells: mesh.cell_count(),
            extent: mesh.extent(),
            min_width,
            max_width,
        }
    }
}

impl<'a> From<&'a MeshGrid> for MeshSummary<'a> {
    fn from(grid: &'a MeshGrid) -> Self {
        Self {
            x: AxisSummary::from(&grid.x),
            y: AxisSummary::from(&grid.y),
            z: AxisSummary::from(&grid.z),
            total_cells: grid.cell_count(),
        }
    }
}

impl<'a> InputSummary<'a> {
    pub fn new(resolved: &'a ResolvedInput, source: Option<&'a str>) -> Self {
        Self {
            source,
            parameters: &resolved.parameters,
            directives: &resolved.directives,
            mesh: MeshSummary::from(&resolved.mesh),
        }
    }
}

pub fn summary_json(resolved: &ResolvedInput, source: Option<&str>) -> AdvantgResult<String> {
    serde_json::to_string_pretty(&InputSummary::new(resolved, source))
        .map(|json| normalize_text_artifact(&json))
        .map_err(|error| {
            AdvantgError::internal(
                "SYS.SUMMARY_SERIALIZE",
                format!("failed to serialize input summary: {error}"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::{
        format_number, normalize_text_artifact, render_deck, render_directive_value,
        summary_json, write_text_artifact,
    };
    use crate::domain::DirectiveValue;
    use crate::loader::load_input;
    use crate::resolver::TemplateBindings;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const DECK: &str = "\
# <x_1 = -20> <x_2 = x_1 + 7> <tol = 0.01>
C small deck
model mcnp
method CADIS
outputs mcnp silo
mcnp_input eta.inp
mcnp_force_point_source true
mcnp_mix_tolerance <tol>
mesh_x <x_1> <x_2> 20
mesh_x_ints 5 10
mesh_y 0 1.5
mesh_y_ints 3
mesh_z -1 1
mesh_z_ints 2
";

    #[test]
    fn numbers_use_shortest_round_trip_form() {
        assert_eq!(format_number(20.0), "20");
        assert_eq!(format_number(-13.0), "-13");
        assert_eq!(format_number(0.01), "0.01");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.0 / 3.0).parse::<f64>(), Ok(1.0 / 3.0));
    }

    #[test]
    fn booleans_render_capitalized() {
        assert_eq!(render_directive_value(&DirectiveValue::Boolean(true)), "True");
        assert_eq!(render_directive_value(&DirectiveValue::Boolean(false)), "False");
        assert_eq!(
            render_directive_value(&DirectiveValue::RealList(vec![-20.0, 1.5])),
            "-20 1.5"
        );
    }

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        let normalized = normalize_text_artifact("alpha\r\nbeta\rgamma");
        assert_eq!(normalized, "alpha\nbeta\ngamma\n");
    }

    #[test]
    fn rendered_deck_expands_placeholders() {
        let resolved = load_input(DECK, &TemplateBindings::new()).expect("deck should load");
        let rendered = render_deck(&resolved, Some("small.inp"));

        let lines: Vec<String> = rendered
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect();
        assert_eq!(lines[0], "C resolved from small.inp");
        assert_eq!(lines[1], "C parameters: x_1, x_2, tol");
        assert_eq!(lines[2], "C 90 total mesh cells");
        assert_eq!(
            &lines[3..8],
            [
                "model mcnp",
                "method cadis",
                "outputs mcnp silo",
                "mcnp_input eta.inp",
                "mcnp_force_point_source True",
            ]
        );
        assert_eq!(lines[8], "mcnp_mix_tolerance 0.01");
        assert_eq!(lines[9], "mesh_x -20 -13 20");
        assert!(!rendered.contains('<'));
    }

    #[test]
    fn rendered_deck_loads_back_to_the_same_directives() {
        let resolved = load_input(DECK, &TemplateBindings::new()).expect("deck should load");
        let rendered = render_deck(&resolved, None);
        let reloaded =
            load_input(&rendered, &TemplateBindings::new()).expect("rendered deck should load");

        let strip = |input: &crate::loader::ResolvedInput| {
            input
                .directives
                .iter()
                .map(|directive| (directive.key.clone(), directive.value.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&reloaded), strip(&resolved));
        assert_eq!(reloaded.mesh, resolved.mesh);
    }

    #[test]
    fn text_values_survive_render_and_reload() {
        let source = DECK
            .replace("<tol = 0.01>", "<tol = 0.01> <deck = \"../models/eta-2_v1.inp\">")
            .replace("mcnp_input eta.inp", "mcnp_input <deck>");
        let resolved = load_input(&source, &TemplateBindings::new()).expect("deck should load");
        let reloaded = load_input(&render_deck(&resolved, None), &TemplateBindings::new())
            .expect("rendered deck should load");

        assert_eq!(
            reloaded.directive("mcnp_input").map(|directive| &directive.value),
            Some(&DirectiveValue::Text("../models/eta-2_v1.inp".to_string()))
        );
        let values = |input: &crate::loader::ResolvedInput| {
            input
                .directives
                .iter()
                .map(|directive| directive.value.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(values(&reloaded), values(&resolved));
    }

    #[test]
    fn text_that_cannot_be_rendered_is_rejected_on_load() {
        let source = DECK
            .replace("<tol = 0.01>", "<tol = 0.01> <deck = \"eta#2.inp\">")
            .replace("mcnp_input eta.inp", "mcnp_input <deck>");
        let error = load_input(&source, &TemplateBindings::new())
            .expect_err("comment marker in a text value should fail");

        assert_eq!(error.kind(), Some(crate::domain::InputErrorKind::TypeMismatch));
        assert_eq!(
            error.message(),
            "line 6: directive 'mcnp_input' value 'eta#2.inp' contains reserved character '#'"
        );
    }

    #[test]
    fn summary_json_reports_parameters_and_mesh() {
        let resolved = load_input(DECK, &TemplateBindings::new()).expect("deck should load");
        let json = summary_json(&resolved, Some("small.inp")).expect("summary should serialize");
        let value: serde_json::Value = serde_json::from_str(&json).expect("summary is json");

        assert_eq!(value["source"], "small.inp");
        assert_eq!(value["parameters"][1]["name"], "x_2");
        assert_eq!(value["parameters"][1]["value"], -13.0);
        assert_eq!(value["parameters"][1]["origin"]["file"]["line"], 1);
        assert_eq!(value["directives"][1]["value"], "cadis");
        assert_eq!(value["mesh"]["x"]["cells"], 15);
        assert_eq!(value["mesh"]["y"]["max_width"], 0.5);
        assert_eq!(value["mesh"]["total_cells"], 90);
    }

    #[test]
    fn repeated_text_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("deck.inp");
        let input = "model mcnp\r\nmethod cadis";

        write_text_artifact(&path, input).expect("first write should succeed");
        let first = fs::read(&path).expect("artifact should be readable");
        write_text_artifact(&path, input).expect("second write should succeed");
        let second = fs::read(&path).expect("artifact should be readable");

        assert_eq!(first, second);
        assert_eq!(second, b"model mcnp\nmethod cadis\n");
    }
}
