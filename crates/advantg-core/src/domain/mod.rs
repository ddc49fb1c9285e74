pub mod errors;

pub use errors::{
    AdvantgError, AdvantgResult, ErrorCategory, InputErrorKind, ParserResult, ResolveResult,
};

use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }

    /// Directive holding the coarse boundaries for this axis.
    pub const fn boundaries_key(self) -> &'static str {
        match self {
            Self::X => "mesh_x",
            Self::Y => "mesh_y",
            Self::Z => "mesh_z",
        }
    }

    /// Directive holding the interval counts for this axis.
    pub const fn intervals_key(self) -> &'static str {
        match self {
            Self::X => "mesh_x_ints",
            Self::Y => "mesh_y_ints",
            Self::Z => "mesh_z_ints",
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// `<name = expression>` as written in the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDefinition {
    pub name: String,
    pub expression: String,
    pub source_line: usize,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, expression: impl Into<String>, source_line: usize) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            source_line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(f64),
    Text(String),
    List(Vec<f64>),
}

impl ParameterValue {
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterOrigin {
    /// Defined on a `#` line of the input.
    File { line: usize },
    /// Supplied by the caller for a placeholder the file leaves free.
    Binding,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub expression: String,
    pub value: ParameterValue,
    pub origin: ParameterOrigin,
}

/// Resolved parameters in evaluation order. Bindings come first.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ParameterTable {
    entries: Vec<Parameter>,
}

impl ParameterTable {
    pub fn push(&mut self, parameter: Parameter) {
        self.entries.push(parameter);
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&ParameterValue> {
        self.get(name).map(|entry| &entry.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A `key value...` line before placeholder substitution and type checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDirective {
    pub key: String,
    pub values: Vec<String>,
    pub source_line: usize,
}

impl RawDirective {
    pub fn new(key: impl Into<String>, values: Vec<String>, source_line: usize) -> Self {
        Self {
            key: key.into(),
            values,
            source_line,
        }
    }
}

/// Parser output: definitions and directives in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputDocument {
    pub definitions: Vec<ParameterDefinition>,
    pub directives: Vec<RawDirective>,
    pub comment_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DirectiveValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Words(Vec<String>),
    IntegerList(Vec<i64>),
    RealList(Vec<f64>),
}

impl DirectiveValue {
    pub fn as_real_list(&self) -> Option<&[f64]> {
        match self {
            Self::RealList(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_integer_list(&self) -> Option<&[i64]> {
        match self {
            Self::IntegerList(values) => Some(values),
            _ => None,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Directive {
    pub key: String,
    pub value: DirectiveValue,
    pub source_line: usize,
}
