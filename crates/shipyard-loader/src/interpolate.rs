//! Variable interpolation for compose documents
//!
//! Supports `$VAR`, `${VAR}`, `${VAR:-default}`, `${VAR-default}`,
//! `${VAR:?message}`, `${VAR?message}` and the `$$` escape. Values come from
//! an explicit [`Environment`] so loading never depends on hidden state.

use std::collections::BTreeMap;

use serde_yaml::Value;

/// Variables available to interpolation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// An environment with no variables
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot of the process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// Why interpolation of a string failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    /// `${` without a closing `}`
    Unterminated(String),
    /// Invalid variable name
    InvalidName(String),
    /// `${VAR?message}` with VAR unset
    Required { name: String, message: String },
}

impl std::fmt::Display for InterpolationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unterminated(s) => write!(f, "unterminated variable reference in '{}'", s),
            Self::InvalidName(s) => write!(f, "invalid variable name '{}'", s),
            Self::Required { name, message } => {
                write!(f, "required variable '{}' is not set: {}", name, message)
            }
        }
    }
}

/// Result of interpolating a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolated {
    pub value: String,
    /// Variables referenced without a default that were unset
    pub missing: Vec<String>,
}

/// Interpolate a single string
pub fn interpolate_str(
    input: &str,
    env: &Environment,
) -> std::result::Result<Interpolated, InterpolationError> {
    let mut value = String::with_capacity(input.len());
    let mut missing = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            value.push(c);
            continue;
        }

        match chars.peek().map(|&(_, next)| next) {
            Some('$') => {
                chars.next();
                value.push('$');
            }
            Some('{') => {
                chars.next();
                let mut body = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    body.push(c);
                }
                if !closed {
                    return Err(InterpolationError::Unterminated(input.to_string()));
                }
                value.push_str(&expand_braced(&body, env, &mut missing)?);
            }
            Some(next) if next == '_' || next.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c == '_' || c.is_ascii_alphanumeric() {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match env.get(&name) {
                    Some(v) => value.push_str(v),
                    None => missing.push(name),
                }
            }
            _ => value.push('$'),
        }
    }

    Ok(Interpolated { value, missing })
}

fn expand_braced(
    body: &str,
    env: &Environment,
    missing: &mut Vec<String>,
) -> std::result::Result<String, InterpolationError> {
    let split = body
        .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
        .unwrap_or(body.len());
    let (name, rest) = body.split_at(split);

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(InterpolationError::InvalidName(body.to_string()));
    }

    let value = env.get(name);
    let (op, arg) = if let Some(arg) = rest.strip_prefix(":-") {
        (":-", arg)
    } else if let Some(arg) = rest.strip_prefix(":?") {
        (":?", arg)
    } else if let Some(arg) = rest.strip_prefix('-') {
        ("-", arg)
    } else if let Some(arg) = rest.strip_prefix('?') {
        ("?", arg)
    } else if rest.is_empty() {
        ("", "")
    } else {
        return Err(InterpolationError::InvalidName(body.to_string()));
    };

    let expanded = match (op, value) {
        (":-", Some(v)) if !v.is_empty() => v.to_string(),
        (":-", _) => arg.to_string(),
        ("-", Some(v)) => v.to_string(),
        ("-", None) => arg.to_string(),
        (":?", Some(v)) if !v.is_empty() => v.to_string(),
        ("?", Some(v)) => v.to_string(),
        (":?", _) | ("?", None) => {
            return Err(InterpolationError::Required {
                name: name.to_string(),
                message: arg.to_string(),
            });
        }
        (_, Some(v)) => v.to_string(),
        (_, None) => {
            missing.push(name.to_string());
            String::new()
        }
    };
    Ok(expanded)
}

/// Interpolate every string scalar of a document in place
///
/// Returns the names of unset variables, in order of appearance.
pub fn interpolate_value(
    value: &mut Value,
    env: &Environment,
) -> std::result::Result<Vec<String>, InterpolationError> {
    let mut missing = Vec::new();
    walk(value, env, &mut missing)?;
    Ok(missing)
}

fn walk(
    value: &mut Value,
    env: &Environment,
    missing: &mut Vec<String>,
) -> std::result::Result<(), InterpolationError> {
    match value {
        Value::String(s) => {
            let result = interpolate_str(s, env)?;
            *s = result.value;
            missing.extend(result.missing);
        }
        Value::Sequence(items) => {
            for item in items {
                walk(item, env, missing)?;
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                walk(item, env, missing)?;
            }
        }
        Value::Tagged(tagged) => walk(&mut tagged.value, env, missing)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}
