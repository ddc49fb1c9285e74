use crate::domain::{
    AdvantgError, InputErrorKind, Parameter, ParameterDefinition, ParameterOrigin,
    ParameterTable, ParameterValue, ResolveResult,
};
use crate::expression::{
    Expr, ExpressionError, is_identifier, parse_expression, parse_expression_list,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Caller-provided values for placeholders the input file leaves undefined.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateBindings {
    values: BTreeMap<String, ParameterValue>,
}

impl TemplateBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) -> ResolveResult<()> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(AdvantgError::input(
                InputErrorKind::InvalidBinding,
                format!("binding name '{name}' is not a valid identifier"),
            ));
        }
        self.values.insert(name, value);
        Ok(())
    }

    /// Parses `name=value`; the value is numeric when it parses as a number
    /// and text otherwise.
    pub fn insert_assignment(&mut self, assignment: &str) -> ResolveResult<()> {
        let Some((name, value)) = assignment.split_once('=') else {
            return Err(AdvantgError::input(
                InputErrorKind::InvalidBinding,
                format!("binding '{assignment}' must have the form name=value"),
            ));
        };
        let value = value.trim();
        let value = match value.parse::<f64>() {
            Ok(number) if number.is_finite() => ParameterValue::Number(number),
            _ => ParameterValue::Text(value.to_string()),
        };
        self.insert(name.trim(), value)
    }

    /// Reads a JSON object of numbers, strings and numeric arrays.
    pub fn from_json(source: &str) -> ResolveResult<Self> {
        let parsed: serde_json::Value = serde_json::from_str(source).map_err(|error| {
            AdvantgError::input(
                InputErrorKind::InvalidBinding,
                format!("bindings are not valid JSON: {error}"),
            )
        })?;
        let serde_json::Value::Object(entries) = parsed else {
            return Err(AdvantgError::input(
                InputErrorKind::InvalidBinding,
                "bindings must be a JSON object",
            ));
        };

        let mut bindings = Self::new();
        for (name, value) in entries {
            let value = json_binding_value(&name, &value)?;
            bindings.insert(name, value)?;
        }
        Ok(bindings)
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }
}

fn json_binding_value(name: &str, value: &serde_json::Value) -> ResolveResult<ParameterValue> {
    let invalid = || {
        AdvantgError::input(
            InputErrorKind::InvalidBinding,
            format!("binding '{name}' must be a number, a string or an array of numbers"),
        )
    };

    match value {
        serde_json::Value::Number(number) => {
            number.as_f64().map(ParameterValue::Number).ok_or_else(invalid)
        }
        serde_json::Value::String(text) => Ok(ParameterValue::Text(text.clone())),
        serde_json::Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| item.as_f64().ok_or_else(invalid))
            .collect::<ResolveResult<Vec<_>>>()
            .map(ParameterValue::List),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Clone)]
enum DefinitionBody {
    Scalar(Expr),
    List(Vec<Expr>),
    Text(String),
}

impl DefinitionBody {
    fn parse(expression: &str) -> Result<Self, ExpressionError> {
        if let Some(text) = quoted_text(expression) {
            return Ok(Self::Text(text.to_string()));
        }
        if expression.starts_with('[') {
            return parse_expression_list(expression).map(Self::List);
        }
        parse_expression(expression).map(Self::Scalar)
    }

    fn references(&self) -> BTreeSet<&str> {
        match self {
            Self::Scalar(expr) => expr.references(),
            Self::List(items) => items.iter().flat_map(Expr::references).collect(),
            Self::Text(_) => BTreeSet::new(),
        }
    }
}

fn quoted_text(expression: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|quote| {
        expression
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    })
}

/// Evaluates definitions in file order into a flat table.
///
/// References may only point at names defined on an earlier line, or at
/// bindings. A file definition shadows a binding of the same name.
pub fn resolve_parameters(
    definitions: &[ParameterDefinition],
    bindings: &TemplateBindings,
) -> ResolveResult<ParameterTable> {
    let positions = index_definitions(definitions)?;

    let mut bodies = Vec::with_capacity(definitions.len());
    for definition in definitions {
        let body = DefinitionBody::parse(&definition.expression)
            .map_err(|error| expression_error(definition, error))?;
        bodies.push(body);
    }

    for (definition, body) in definitions.iter().zip(&bodies) {
        for name in body.references() {
            if !positions.contains_key(name) && bindings.get(name).is_none() {
                return Err(AdvantgError::at_line(
                    InputErrorKind::UndefinedReference,
                    definition.source_line,
                    format!(
                        "parameter '{}' references undefined name '{}'",
                        definition.name, name
                    ),
                ));
            }
        }
    }

    detect_cycles(definitions, &bodies, &positions)?;

    for (index, (definition, body)) in definitions.iter().zip(&bodies).enumerate() {
        for name in body.references() {
            if let Some(&target) = positions.get(name)
                && target >= index
            {
                return Err(AdvantgError::at_line(
                    InputErrorKind::UndefinedReference,
                    definition.source_line,
                    format!(
                        "parameter '{}' references '{}' which is defined later at line {}",
                        definition.name, name, definitions[target].source_line
                    ),
                ));
            }
        }
    }

    let mut table = ParameterTable::default();
    for (name, value) in &bindings.values {
        if positions.contains_key(name.as_str()) {
            continue;
        }
        table.push(Parameter {
            name: name.clone(),
            expression: render_binding(value),
            value: value.clone(),
            origin: ParameterOrigin::Binding,
        });
    }

    for (definition, body) in definitions.iter().zip(bodies) {
        let value = evaluate_body(&table, body)
            .map_err(|error| expression_error(definition, error))?;
        debug!(
            parameter = %definition.name,
            kind = value.kind_name(),
            line = definition.source_line,
            "resolved parameter"
        );
        table.push(Parameter {
            name: definition.name.clone(),
            expression: definition.expression.clone(),
            value,
            origin: ParameterOrigin::File {
                line: definition.source_line,
            },
        });
    }

    Ok(table)
}

fn index_definitions(definitions: &[ParameterDefinition]) -> ResolveResult<BTreeMap<&str, usize>> {
    let mut positions = BTreeMap::new();
    for (index, definition) in definitions.iter().enumerate() {
        if let Some(previous) = positions.insert(definition.name.as_str(), index) {
            return Err(AdvantgError::at_line(
                InputErrorKind::DuplicateParameter,
                definition.source_line,
                format!(
                    "parameter '{}' was already defined at line {}",
                    definition.name, definitions[previous].source_line
                ),
            ));
        }
    }
    Ok(positions)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done,
}

fn detect_cycles(
    definitions: &[ParameterDefinition],
    bodies: &[DefinitionBody],
    positions: &BTreeMap<&str, usize>,
) -> ResolveResult<()> {
    let edges: Vec<Vec<usize>> = bodies
        .iter()
        .map(|body| {
            body.references()
                .into_iter()
                .filter_map(|name| positions.get(name).copied())
                .collect()
        })
        .collect();

    let mut state = vec![Visit::Unvisited; definitions.len()];
    let mut path = Vec::new();
    for start in 0..definitions.len() {
        if let Some(cycle) = visit(start, &edges, &mut state, &mut path) {
            let names: Vec<&str> = cycle
                .iter()
                .map(|&index| definitions[index].name.as_str())
                .collect();
            let first = cycle[0];
            return Err(AdvantgError::at_line(
                InputErrorKind::CyclicDefinition,
                definitions[first].source_line,
                format!("cyclic parameter definition: {}", names.join(" -> ")),
            ));
        }
    }
    Ok(())
}

fn visit(
    node: usize,
    edges: &[Vec<usize>],
    state: &mut [Visit],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    match state[node] {
        Visit::Done => return None,
        Visit::InProgress => {
            let start = path.iter().position(|&entry| entry == node).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(node);
            return Some(cycle);
        }
        Visit::Unvisited => {}
    }

    state[node] = Visit::InProgress;
    path.push(node);
    for &next in &edges[node] {
        if let Some(cycle) = visit(next, edges, state, path) {
            return Some(cycle);
        }
    }
    path.pop();
    state[node] = Visit::Done;
    None
}

fn evaluate_body(
    table: &ParameterTable,
    body: DefinitionBody,
) -> Result<ParameterValue, ExpressionError> {
    let scope = |name: &str| numeric_value(table, name);
    match body {
        DefinitionBody::Text(text) => Ok(ParameterValue::Text(text)),
        DefinitionBody::Scalar(expr) => expr.evaluate(&scope).map(ParameterValue::Number),
        DefinitionBody::List(items) => items
            .iter()
            .map(|item| item.evaluate(&scope))
            .collect::<Result<Vec<_>, _>>()
            .map(ParameterValue::List),
    }
}

/// Scalar lookup shared by definitions and numeric directive values.
pub(crate) fn numeric_value(table: &ParameterTable, name: &str) -> Result<f64, ExpressionError> {
    match table.value(name) {
        Some(ParameterValue::Number(value)) => Ok(*value),
        Some(_) => Err(ExpressionError::NotNumeric {
            name: name.to_string(),
        }),
        None => Err(ExpressionError::UndefinedName {
            name: name.to_string(),
        }),
    }
}

/// Maps an expression failure onto the input error taxonomy.
pub(crate) fn expression_error_kind(error: &ExpressionError) -> InputErrorKind {
    match error {
        ExpressionError::UndefinedName { .. } => InputErrorKind::UndefinedReference,
        ExpressionError::NotNumeric { .. } => InputErrorKind::TypeMismatch,
        _ => InputErrorKind::Syntax,
    }
}

fn expression_error(definition: &ParameterDefinition, error: ExpressionError) -> AdvantgError {
    AdvantgError::at_line(
        expression_error_kind(&error),
        definition.source_line,
        format!(
            "parameter '{}' = '{}': {}",
            definition.name, definition.expression, error
        ),
    )
}

fn render_binding(value: &ParameterValue) -> String {
    match value {
        ParameterValue::Number(number) => number.to_string(),
        ParameterValue::Text(text) => format!("\"{text}\""),
        ParameterValue::List(items) => {
            let items: Vec<String> = items.iter().map(f64::to_string).collect();
            format!("[{}]", items.join(", "))
        }
    }
}
