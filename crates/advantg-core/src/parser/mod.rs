use crate::domain::{
    AdvantgError, InputDocument, InputErrorKind, ParameterDefinition, ParserResult, RawDirective,
};
use crate::expression::is_identifier;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLineKind {
    /// `#` line; carries any `<name = expression>` groups found on it.
    Definitions(Vec<ParameterDefinition>),
    /// `C` comment line.
    Comment,
    Directive(RawDirective),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLine {
    pub source_line: usize,
    pub kind: InputLineKind,
}

pub fn tokenize_input(source: &str) -> ParserResult<Vec<InputLine>> {
    let mut lines = Vec::new();
    for (index, line) in source.lines().enumerate() {
        if let Some(input_line) = classify_line(index + 1, line)? {
            lines.push(input_line);
        }
    }
    Ok(lines)
}

pub fn parse_input(source: &str) -> ParserResult<InputDocument> {
    let mut document = InputDocument::default();
    let mut seen_keys: BTreeMap<String, usize> = BTreeMap::new();

    for line in tokenize_input(source)? {
        match line.kind {
            InputLineKind::Definitions(definitions) => document.definitions.extend(definitions),
            InputLineKind::Comment => document.comment_lines += 1,
            InputLineKind::Directive(directive) => {
                if let Some(first_line) = seen_keys.get(&directive.key) {
                    return Err(AdvantgError::at_line(
                        InputErrorKind::DuplicateOption,
                        directive.source_line,
                        format!(
                            "directive '{}' was already given at line {}",
                            directive.key, first_line
                        ),
                    ));
                }
                seen_keys.insert(directive.key.clone(), directive.source_line);
                document.directives.push(directive);
            }
        }
    }

    if document.directives.is_empty() {
        return Err(AdvantgError::input(
            InputErrorKind::MissingRequired,
            "input contains no directives after removing comments and blank lines",
        ));
    }

    Ok(document)
}

fn classify_line(source_line: usize, line: &str) -> ParserResult<Option<InputLine>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let kind = if let Some(body) = trimmed.strip_prefix('#') {
        InputLineKind::Definitions(extract_definitions(source_line, body)?)
    } else if is_comment_line(trimmed) {
        InputLineKind::Comment
    } else {
        let Some(directive) = parse_directive(source_line, trimmed)? else {
            return Ok(None);
        };
        InputLineKind::Directive(directive)
    };

    Ok(Some(InputLine { source_line, kind }))
}

fn is_comment_line(trimmed: &str) -> bool {
    let mut chars = trimmed.chars();
    matches!(chars.next(), Some('C' | 'c')) && chars.next().is_none_or(char::is_whitespace)
}

/// Pulls every top-level `<...>` group out of a `#` line. Groups without `=`
/// are placeholder mentions in commentary and are skipped.
fn extract_definitions(source_line: usize, body: &str) -> ParserResult<Vec<ParameterDefinition>> {
    let mut definitions = Vec::new();
    let mut rest = body;

    while let Some(open) = rest.find('<') {
        let group = &rest[open..];
        let close = matching_bracket(group).ok_or_else(|| {
            AdvantgError::at_line(
                InputErrorKind::Syntax,
                source_line,
                format!("unterminated parameter group '{}'", group.trim_end()),
            )
        })?;
        let inner = &group[1..close];
        rest = &group[close + 1..];

        let Some((name, expression)) = inner.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let expression = expression.trim();
        if !is_identifier(name) {
            return Err(AdvantgError::at_line(
                InputErrorKind::Syntax,
                source_line,
                format!("invalid parameter name '{name}' in '<{inner}>'"),
            ));
        }
        if expression.is_empty() {
            return Err(AdvantgError::at_line(
                InputErrorKind::Syntax,
                source_line,
                format!("parameter '{name}' has an empty definition"),
            ));
        }

        definitions.push(ParameterDefinition::new(name, expression, source_line));
    }

    Ok(definitions)
}

/// Index of the `>` closing the `<` at the start of `text`, honoring nesting
/// and skipping quoted text.
fn matching_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (index, ch) in text.char_indices() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_directive(source_line: usize, trimmed: &str) -> ParserResult<Option<RawDirective>> {
    let content = strip_inline_comment(trimmed).trim();
    if content.is_empty() {
        return Ok(None);
    }

    let mut tokens = split_value_tokens(source_line, content)?.into_iter();
    let Some(first_token) = tokens.next() else {
        return Ok(None);
    };
    let Some(key) = normalize_key_token(&first_token) else {
        return Err(AdvantgError::at_line(
            InputErrorKind::Syntax,
            source_line,
            format!("invalid directive key '{first_token}'"),
        ));
    };

    Ok(Some(RawDirective::new(key, tokens.collect(), source_line)))
}

fn strip_inline_comment(line: &str) -> &str {
    if let Some((prefix, _)) = line.split_once('#') {
        prefix
    } else {
        line
    }
}

/// Whitespace split that keeps `(...)` and `<...>` groups together, so
/// `(<x_2> + 1)` stays a single value token.
fn split_value_tokens(source_line: usize, content: &str) -> ParserResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut parens = 0usize;
    let mut angles = 0usize;

    for ch in content.chars() {
        match ch {
            '(' => parens += 1,
            ')' => parens = parens.saturating_sub(1),
            '<' => angles += 1,
            '>' => angles = angles.saturating_sub(1),
            _ => {}
        }

        if ch.is_whitespace() && parens == 0 && angles == 0 {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(ch);
    }

    if angles > 0 {
        return Err(AdvantgError::at_line(
            InputErrorKind::Syntax,
            source_line,
            format!("unterminated placeholder in '{content}'"),
        ));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn normalize_key_token(token: &str) -> Option<String> {
    is_identifier(token).then(|| token.to_ascii_lowercase())
}
