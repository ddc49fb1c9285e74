//! Loader and validator for ADVANTG input decks.
//!
//! The pipeline parses the line format, resolves `<name = expression>`
//! parameters, substitutes and type-checks directives against the option
//! vocabulary, then builds the per-axis meshes.

pub mod domain;
pub mod expression;
pub mod loader;
pub mod mesh;
pub mod options;
pub mod parser;
pub mod resolver;
pub mod serialization;

pub use domain::{AdvantgError, AdvantgResult, ErrorCategory, InputErrorKind};
pub use loader::{ResolvedInput, load_input, load_input_file};
pub use resolver::TemplateBindings;
