//! Directive vocabulary and value validation.

use crate::domain::{
    AdvantgError, Directive, DirectiveValue, InputErrorKind, ParameterTable, ParameterValue,
    RawDirective, ResolveResult,
};
use crate::expression::{ExpressionError, is_identifier, parse_expression};
use crate::resolver::{expression_error_kind, numeric_value};
use crate::serialization::format_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// One word from a closed set, compared case-insensitively.
    Choice(&'static [&'static str]),
    /// One opaque token (file names, library identifiers).
    Text,
    /// `true`/`false`, case-insensitive.
    Boolean,
    Integer { min: i64 },
    Real { positive: bool },
    Words {
        min_len: usize,
        allowed: Option<&'static [&'static str]>,
    },
    IntegerList { min_len: usize },
    RealList { min_len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub key: &'static str,
    pub kind: OptionKind,
}

const MODELS: &[&str] = &["mcnp"];
const METHODS: &[&str] = &["cadis", "fwcadis"];
const OUTPUT_FORMATS: &[&str] = &["mcnp", "silo", "omcds", "dffields"];
const QUADRATURES: &[&str] = &["levelsym", "qr"];
const SPATIAL_TREATMENTS: &[&str] = &["pathlength", "cellvolume"];

const POSITIVE_INTEGER: OptionKind = OptionKind::Integer { min: 1 };
const POSITIVE_REAL: OptionKind = OptionKind::Real { positive: true };

/// Mesh axes are required too; `build_mesh_grid` checks them with their pairing.
pub const REQUIRED_OPTIONS: [&str; 2] = ["model", "method"];

pub const OPTIONS: [OptionSpec; 28] = [
    OptionSpec {
        key: "model",
        kind: OptionKind::Choice(MODELS),
    },
    OptionSpec {
        key: "method",
        kind: OptionKind::Choice(METHODS),
    },
    OptionSpec {
        key: "outputs",
        kind: OptionKind::Words {
            min_len: 1,
            allowed: Some(OUTPUT_FORMATS),
        },
    },
    OptionSpec {
        key: "mcnp_input",
        kind: OptionKind::Text,
    },
    OptionSpec {
        key: "mcnp_input_template",
        kind: OptionKind::Text,
    },
    OptionSpec {
        key: "mcnp_tallies",
        kind: OptionKind::IntegerList { min_len: 1 },
    },
    OptionSpec {
        key: "mcnp_tally_multipliers",
        kind: OptionKind::RealList { min_len: 1 },
    },
    OptionSpec {
        key: "mcnp_force_point_source",
        kind: OptionKind::Boolean,
    },
    OptionSpec {
        key: "mcnp_mix_tolerance",
        kind: POSITIVE_REAL,
    },
    OptionSpec {
        key: "mcnp_material_names",
        kind: OptionKind::Words {
            min_len: 1,
            allowed: None,
        },
    },
    OptionSpec {
        key: "anisn_library",
        kind: OptionKind::Text,
    },
    OptionSpec {
        key: "denovo_pn_order",
        kind: OptionKind::Integer { min: 0 },
    },
    OptionSpec {
        key: "denovo_quadrature",
        kind: OptionKind::Choice(QUADRATURES),
    },
    OptionSpec {
        key: "denovo_quad_order",
        kind: POSITIVE_INTEGER,
    },
    OptionSpec {
        key: "denovo_quad_num_polar",
        kind: POSITIVE_INTEGER,
    },
    OptionSpec {
        key: "denovo_quad_num_azi",
        kind: POSITIVE_INTEGER,
    },
    OptionSpec {
        key: "denovo_x_blocks",
        kind: POSITIVE_INTEGER,
    },
    OptionSpec {
        key: "denovo_y_blocks",
        kind: POSITIVE_INTEGER,
    },
    OptionSpec {
        key: "denovo_z_blocks",
        kind: POSITIVE_INTEGER,
    },
    OptionSpec {
        key: "denovo_tolerance",
        kind: POSITIVE_REAL,
    },
    OptionSpec {
        key: "denovo_max_iterations",
        kind: POSITIVE_INTEGER,
    },
    OptionSpec {
        key: "fwcadis_spatial_treatment",
        kind: OptionKind::Choice(SPATIAL_TREATMENTS),
    },
    OptionSpec {
        key: "mesh_x",
        kind: OptionKind::RealList { min_len: 2 },
    },
    OptionSpec {
        key: "mesh_x_ints",
        kind: OptionKind::IntegerList { min_len: 1 },
    },
    OptionSpec {
        key: "mesh_y",
        kind: OptionKind::RealList { min_len: 2 },
    },
    OptionSpec {
        key: "mesh_y_ints",
        kind: OptionKind::IntegerList { min_len: 1 },
    },
    OptionSpec {
        key: "mesh_z",
        kind: OptionKind::RealList { min_len: 2 },
    },
    OptionSpec {
        key: "mesh_z_ints",
        kind: OptionKind::IntegerList { min_len: 1 },
    },
];

pub fn option_spec(key: &str) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|spec| spec.key == key)
}

/// Substitutes placeholders and type-checks every directive, then checks that
/// the required directives are present.
pub fn validate_directives(
    directives: &[RawDirective],
    table: &ParameterTable,
) -> ResolveResult<Vec<Directive>> {
    let validated = directives
        .iter()
        .map(|directive| validate_directive(directive, table))
        .collect::<ResolveResult<Vec<_>>>()?;

    for key in REQUIRED_OPTIONS {
        if !validated.iter().any(|directive| directive.key == key) {
            return Err(AdvantgError::input(
                InputErrorKind::MissingRequired,
                format!("missing required directive '{key}'"),
            ));
        }
    }

    Ok(validated)
}

pub fn validate_directive(
    directive: &RawDirective,
    table: &ParameterTable,
) -> ResolveResult<Directive> {
    let spec = option_spec(&directive.key).ok_or_else(|| {
        AdvantgError::at_line(
            InputErrorKind::UnknownOption,
            directive.source_line,
            format!("unknown directive '{}'", directive.key),
        )
    })?;

    let value = match spec.kind {
        OptionKind::Choice(choices) => {
            let word = single_word(directive, table)?;
            let normalized = word.to_ascii_lowercase();
            if !choices.contains(&normalized.as_str()) {
                return Err(mismatch(
                    directive,
                    format!("expects one of {}, got '{}'", choices.join(", "), word),
                ));
            }
            DirectiveValue::Text(normalized)
        }
        OptionKind::Text => DirectiveValue::Text(single_word(directive, table)?),
        OptionKind::Boolean => {
            let word = single_word(directive, table)?;
            DirectiveValue::Boolean(parse_boolean(&word).ok_or_else(|| {
                mismatch(directive, format!("expects true or false, got '{word}'"))
            })?)
        }
        OptionKind::Integer { min } => {
            let values = numeric_values(directive, table)?;
            require_len(directive, &values, 1, true)?;
            let value = to_integer(directive, values[0])?;
            if value < min {
                return Err(mismatch(
                    directive,
                    format!("expects an integer >= {min}, got {value}"),
                ));
            }
            DirectiveValue::Integer(value)
        }
        OptionKind::Real { positive } => {
            let values = numeric_values(directive, table)?;
            require_len(directive, &values, 1, true)?;
            if positive && values[0] <= 0.0 {
                return Err(mismatch(
                    directive,
                    format!("expects a positive number, got {}", format_number(values[0])),
                ));
            }
            DirectiveValue::Real(values[0])
        }
        OptionKind::Words { min_len, allowed } => {
            let words = substituted_words(directive, table)?;
            require_len(directive, &words, min_len, false)?;
            if let Some(allowed) = allowed {
                let mut normalized = Vec::with_capacity(words.len());
                for word in words {
                    let lower = word.to_ascii_lowercase();
                    if !allowed.contains(&lower.as_str()) {
                        return Err(mismatch(
                            directive,
                            format!("expects values from {}, got '{}'", allowed.join(", "), word),
                        ));
                    }
                    normalized.push(lower);
                }
                DirectiveValue::Words(normalized)
            } else {
                DirectiveValue::Words(words)
            }
        }
        OptionKind::IntegerList { min_len } => {
            let values = numeric_values(directive, table)?;
            require_len(directive, &values, min_len, false)?;
            DirectiveValue::IntegerList(
                values
                    .into_iter()
                    .map(|value| to_integer(directive, value))
                    .collect::<ResolveResult<Vec<_>>>()?,
            )
        }
        OptionKind::RealList { min_len } => {
            let values = numeric_values(directive, table)?;
            require_len(directive, &values, min_len, false)?;
            DirectiveValue::RealList(values)
        }
    };

    Ok(Directive {
        key: directive.key.clone(),
        value,
        source_line: directive.source_line,
    })
}

/// Evaluates each value token as an arithmetic expression over `<name>`
/// placeholders. A token that is exactly a list placeholder is spliced in
/// place.
fn numeric_values(directive: &RawDirective, table: &ParameterTable) -> ResolveResult<Vec<f64>> {
    let mut values = Vec::with_capacity(directive.values.len());
    for token in &directive.values {
        if let Some(name) = bare_placeholder(token)
            && let Some(ParameterValue::List(items)) = table.value(name)
        {
            values.extend_from_slice(items);
            continue;
        }

        let expression_failure = |error: ExpressionError| {
            AdvantgError::at_line(
                expression_error_kind(&error),
                directive.source_line,
                format!("directive '{}' value '{}': {}", directive.key, token, error),
            )
        };
        let expr = parse_expression(token).map_err(expression_failure)?;
        if !expr.bare_references().is_empty() {
            return Err(mismatch(
                directive,
                format!("expects numeric values, got '{token}'"),
            ));
        }
        let scope = |name: &str| numeric_value(table, name);
        values.push(expr.evaluate(&scope).map_err(expression_failure)?);
    }
    Ok(values)
}

/// Characters the line format gives meaning to; a word value containing one
/// would not survive being written back out.
const RESERVED_CHARACTERS: [char; 5] = ['#', '<', '>', '(', ')'];

/// Replaces every `<name>` in the value tokens with the parameter's text form.
/// List parameters expand to several words.
pub fn substituted_words(
    directive: &RawDirective,
    table: &ParameterTable,
) -> ResolveResult<Vec<String>> {
    let mut words = Vec::with_capacity(directive.values.len());
    for token in &directive.values {
        let substituted = substitute_placeholders(directive, token, table)?;
        for word in substituted.split_whitespace() {
            if let Some(reserved) = word.chars().find(|ch| RESERVED_CHARACTERS.contains(ch)) {
                return Err(mismatch(
                    directive,
                    format!("value '{word}' contains reserved character '{reserved}'"),
                ));
            }
            words.push(word.to_owned());
        }
    }
    Ok(words)
}

fn substitute_placeholders(
    directive: &RawDirective,
    token: &str,
    table: &ParameterTable,
) -> ResolveResult<String> {
    let mut output = String::with_capacity(token.len());
    let mut rest = token;
    while let Some(open) = rest.find('<') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            return Err(AdvantgError::at_line(
                InputErrorKind::Syntax,
                directive.source_line,
                format!("unterminated placeholder in '{token}'"),
            ));
        };
        let name = after[..close].trim();
        if !is_identifier(name) {
            return Err(AdvantgError::at_line(
                InputErrorKind::Syntax,
                directive.source_line,
                format!("invalid placeholder '<{}>' in '{}'", &after[..close], token),
            ));
        }
        let value = table.value(name).ok_or_else(|| {
            AdvantgError::at_line(
                InputErrorKind::UndefinedReference,
                directive.source_line,
                format!(
                    "directive '{}' references undefined name '{}'",
                    directive.key, name
                ),
            )
        })?;
        output.push_str(&parameter_text(value));
        rest = &after[close + 1..];
    }
    output.push_str(rest);
    Ok(output)
}

fn parameter_text(value: &ParameterValue) -> String {
    match value {
        ParameterValue::Number(number) => format_number(*number),
        ParameterValue::Text(text) => text.clone(),
        ParameterValue::List(items) => items
            .iter()
            .map(|item| format_number(*item))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn bare_placeholder(token: &str) -> Option<&str> {
    let name = token.strip_prefix('<')?.strip_suffix('>')?.trim();
    is_identifier(name).then_some(name)
}

fn single_word(directive: &RawDirective, table: &ParameterTable) -> ResolveResult<String> {
    let mut words = substituted_words(directive, table)?;
    require_len(directive, &words, 1, true)?;
    Ok(words.remove(0))
}

fn require_len<T>(
    directive: &RawDirective,
    values: &[T],
    expected: usize,
    exact: bool,
) -> ResolveResult<()> {
    let ok = if exact {
        values.len() == expected
    } else {
        values.len() >= expected
    };
    if ok {
        return Ok(());
    }

    let qualifier = if exact { "exactly" } else { "at least" };
    Err(mismatch(
        directive,
        format!(
            "expects {} {} value(s), got {}",
            qualifier,
            expected,
            values.len()
        ),
    ))
}

fn to_integer(directive: &RawDirective, value: f64) -> ResolveResult<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    if value.fract() != 0.0 || value.abs() >= i64::MAX as f64 {
        return Err(mismatch(
            directive,
            format!("expects integers, got {}", format_number(value)),
        ));
    }
    Ok(value as i64)
}

fn parse_boolean(word: &str) -> Option<bool> {
    if word.eq_ignore_ascii_case("true") {
        Some(true)
    } else if word.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn mismatch(directive: &RawDirective, detail: String) -> AdvantgError {
    AdvantgError::at_line(
        InputErrorKind::TypeMismatch,
        directive.source_line,
        format!("directive '{}' {}", directive.key, detail),
    )
}

#[cfg(test)]
mod tests {
    use super::{OPTIONS, option_spec, validate_directive, validate_directives};
    use crate::domain::{
        DirectiveValue, InputErrorKind, Parameter, ParameterOrigin, ParameterTable,
        ParameterValue, RawDirective,
    };
    use std::collections::BTreeSet;

    fn raw(key: &str, values: &[&str]) -> RawDirective {
        RawDirective::new(
            key,
            values.iter().map(|value| value.to_string()).collect(),
            7,
        )
    }

    fn table(entries: &[(&str, ParameterValue)]) -> ParameterTable {
        let mut table = ParameterTable::default();
        for (name, value) in entries {
            table.push(Parameter {
                name: name.to_string(),
                expression: String::new(),
                value: value.clone(),
                origin: ParameterOrigin::Binding,
            });
        }
        table
    }

    fn validate(key: &str, values: &[&str]) -> DirectiveValue {
        validate_directive(&raw(key, values), &ParameterTable::default())
            .expect("directive should validate")
            .value
    }

    #[test]
    fn vocabulary_has_unique_keys() {
        let keys: BTreeSet<&str> = OPTIONS.iter().map(|spec| spec.key).collect();
        assert_eq!(keys.len(), OPTIONS.len());
        assert!(option_spec("mesh_w").is_none());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let error = validate_directive(&raw("mesh_w", &["0", "1"]), &ParameterTable::default())
            .expect_err("unknown key should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::UnknownOption));
        assert_eq!(error.message(), "line 7: unknown directive 'mesh_w'");
    }

    #[test]
    fn validates_scalar_kinds() {
        assert_eq!(
            validate("method", &["CADIS"]),
            DirectiveValue::Text("cadis".to_string())
        );
        assert_eq!(
            validate("mcnp_force_point_source", &["True"]),
            DirectiveValue::Boolean(true)
        );
        assert_eq!(
            validate("mcnp_mix_tolerance", &["0.01"]),
            DirectiveValue::Real(0.01)
        );
        assert_eq!(validate("denovo_pn_order", &["0"]), DirectiveValue::Integer(0));
        assert_eq!(
            validate("anisn_library", &["27n19g"]),
            DirectiveValue::Text("27n19g".to_string())
        );
        assert_eq!(
            validate("outputs", &["mcnp", "Silo"]),
            DirectiveValue::Words(vec!["mcnp".to_string(), "silo".to_string()])
        );
    }

    #[test]
    fn validates_numeric_lists_with_expressions() {
        let table = table(&[
            ("t", ParameterValue::Number(1.5)),
            ("xs", ParameterValue::List(vec![-1.0, 1.0])),
        ]);
        let directive = validate_directive(
            &raw("mesh_x", &["-20", "<xs>", "2*<t>", "(<t> + 10)"]),
            &table,
        )
        .expect("mesh boundaries should validate");
        assert_eq!(
            directive.value,
            DirectiveValue::RealList(vec![-20.0, -1.0, 1.0, 3.0, 11.5])
        );

        assert_eq!(
            validate("mcnp_tallies", &["4", "14"]),
            DirectiveValue::IntegerList(vec![4, 14])
        );
    }

    #[test]
    fn boolean_keys_accept_only_true_or_false() {
        let error = validate_directive(
            &raw("mcnp_force_point_source", &["yes"]),
            &ParameterTable::default(),
        )
        .expect_err("non-boolean should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));
    }

    #[test]
    fn numeric_keys_reject_words_and_fractions() {
        let error = validate_directive(
            &raw("denovo_x_blocks", &["two"]),
            &ParameterTable::default(),
        )
        .expect_err("word for integer should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));
        assert_eq!(
            error.message(),
            "line 7: directive 'denovo_x_blocks' expects numeric values, got 'two'"
        );

        let error = validate_directive(
            &raw("mcnp_mix_tolerance", &["True"]),
            &ParameterTable::default(),
        )
        .expect_err("boolean word for real should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));

        let table = table(&[("n", ParameterValue::Number(4.0))]);
        let error = validate_directive(&raw("mesh_x_ints", &["2*n"]), &table)
            .expect_err("bare name in a directive should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));
        assert_eq!(
            validate_directive(&raw("mesh_x_ints", &["2*<n>"]), &table)
                .expect("placeholder should evaluate")
                .value,
            DirectiveValue::IntegerList(vec![8])
        );

        let error = validate_directive(
            &raw("denovo_x_blocks", &["<blocks>"]),
            &ParameterTable::default(),
        )
        .expect_err("unbound placeholder should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::UndefinedReference));

        let error = validate_directive(
            &raw("denovo_x_blocks", &["9223372036854775808"]),
            &ParameterTable::default(),
        )
        .expect_err("2^63 does not fit an integer");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));

        let error = validate_directive(
            &raw("denovo_x_blocks", &["2.5"]),
            &ParameterTable::default(),
        )
        .expect_err("fraction for integer should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));
        assert_eq!(
            error.message(),
            "line 7: directive 'denovo_x_blocks' expects integers, got 2.5"
        );

        let error = validate_directive(
            &raw("denovo_x_blocks", &["0"]),
            &ParameterTable::default(),
        )
        .expect_err("zero blocks should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));

        let error = validate_directive(
            &raw("mcnp_mix_tolerance", &["#"]),
            &ParameterTable::default(),
        )
        .expect_err("garbage should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::Syntax));
    }

    #[test]
    fn arity_is_enforced() {
        let error = validate_directive(&raw("mesh_y", &["1"]), &ParameterTable::default())
            .expect_err("single boundary should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));
        assert_eq!(
            error.message(),
            "line 7: directive 'mesh_y' expects at least 2 value(s), got 1"
        );

        let error = validate_directive(&raw("model", &[]), &ParameterTable::default())
            .expect_err("missing value should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));

        let error = validate_directive(
            &raw("denovo_pn_order", &["1", "2"]),
            &ParameterTable::default(),
        )
        .expect_err("two scalars should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));
    }

    #[test]
    fn text_placeholders_are_substituted() {
        let table = table(&[("model", ParameterValue::Text("eta_model".to_string()))]);
        let directive = validate_directive(&raw("mcnp_input", &["<model>.inp"]), &table)
            .expect("placeholder should substitute");
        assert_eq!(directive.value, DirectiveValue::Text("eta_model.inp".to_string()));

        let error = validate_directive(&raw("mcnp_input", &["<deck>"]), &table)
            .expect_err("undefined placeholder should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::UndefinedReference));
    }

    #[test]
    fn reserved_characters_in_words_are_rejected() {
        let table = table(&[("deck", ParameterValue::Text("eta#2.inp".to_string()))]);
        let error = validate_directive(&raw("mcnp_input", &["<deck>"]), &table)
            .expect_err("comment marker in a file name should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));
        assert_eq!(
            error.message(),
            "line 7: directive 'mcnp_input' value 'eta#2.inp' contains reserved character '#'"
        );

        let error = validate_directive(
            &raw("mcnp_material_names", &["fuel", "(water"]),
            &ParameterTable::default(),
        )
        .expect_err("grouping character in a word should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));

        assert_eq!(
            validate("mcnp_input", &["../models/eta-2_v1.inp"]),
            DirectiveValue::Text("../models/eta-2_v1.inp".to_string())
        );
    }

    #[test]
    fn text_parameter_in_numeric_directive_is_a_type_mismatch() {
        let table = table(&[("model", ParameterValue::Text("eta".to_string()))]);
        let error = validate_directive(&raw("mesh_x", &["0", "<model>"]), &table)
            .expect_err("text in numeric list should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::TypeMismatch));
    }

    #[test]
    fn required_directives_are_checked() {
        let error = validate_directives(&[raw("model", &["mcnp"])], &ParameterTable::default())
            .expect_err("missing method should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::MissingRequired));
        assert_eq!(error.message(), "missing required directive 'method'");

        let validated = validate_directives(
            &[raw("model", &["mcnp"]), raw("method", &["cadis"])],
            &ParameterTable::default(),
        )
        .expect("mesh presence is checked by the mesh builder");
        assert_eq!(validated.len(), 2);
    }
}
