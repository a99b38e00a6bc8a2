//! Directive tokenizer.
//!
//! Splits the raw text between `<!--#` and `-->` into a command name and
//! ordered `name="value"` parameters. Names and values are scanned in separate
//! passes and matched by position, the way Apache's `mod_include` does it.

use crate::error::DirectiveError;

/// One `name="value"` pair of a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Attribute name, trimmed.
    pub name: String,
    /// Unquoted value; `\$` escapes are kept for variable substitution.
    pub value: String,
}

/// Parsed directive: command name plus parameters in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Command name as written (case preserved).
    pub name: String,
    /// Parameters in the order they appear.
    pub params: Vec<Param>,
}

impl Directive {
    /// Parse the text between the directive delimiters.
    ///
    /// # Example
    ///
    /// ```
    /// use rw_ssi::Directive;
    ///
    /// let directive = Directive::parse(r#"echo var="USER" encoding="none" "#).unwrap();
    /// assert_eq!(directive.name, "echo");
    /// assert_eq!(directive.params[0].name, "var");
    /// assert_eq!(directive.params[1].value, "none");
    /// ```
    pub fn parse(text: &str) -> Result<Self, DirectiveError> {
        let chars: Vec<char> = text.chars().collect();
        let name = parse_command_name(&chars);
        Self::with_params(name, &chars)
    }

    /// Parse parameters for an already extracted command name.
    ///
    /// Parameter scanning starts right after the command name's length, so
    /// leading whitespace before the name shifts the scan window exactly like
    /// Apache does.
    pub(crate) fn with_params(name: String, chars: &[char]) -> Result<Self, DirectiveError> {
        let start = name.chars().count();
        let names = parse_param_names(chars, start);
        let values = parse_param_values(chars, start).ok_or(DirectiveError::MalformedParams)?;

        if names.len() != values.len() {
            return Err(DirectiveError::ParamCountMismatch {
                command: name,
                names: names.len(),
                values: values.len(),
            });
        }

        let params = names
            .into_iter()
            .zip(values)
            .map(|(name, value)| Param { name, value })
            .collect();

        Ok(Self { name, params })
    }
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\t' | '\r')
}

fn is_quote(c: char) -> bool {
    matches!(c, '\'' | '"' | '`')
}

/// Extract the command name: the first run of letters, optionally preceded by
/// whitespace. Returns an empty string when no letter comes first.
pub(crate) fn parse_command_name(chars: &[char]) -> String {
    let mut first = None;
    let mut last = 0;

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphabetic() {
            if first.is_none() {
                first = Some(i);
            }
            last = i;
        } else if is_space(c) {
            if first.is_some() {
                break;
            }
        } else {
            break;
        }
    }

    match first {
        Some(first) => chars[first..=last].iter().collect(),
        None => String::new(),
    }
}

/// Collect parameter names, skipping over each quoted value.
pub(crate) fn parse_param_names(chars: &[char], start: usize) -> Vec<String> {
    let mut buf = String::new();
    let mut idx = start;
    let mut inside = false;

    while idx < chars.len() {
        if inside {
            while idx < chars.len() && chars[idx] != '=' {
                buf.push(chars[idx]);
                idx += 1;
            }
            buf.push('=');
            inside = false;

            let mut quote = None;
            let mut quotes = 0;
            let mut escaped = false;
            while idx < chars.len() && quotes != 2 {
                let c = chars[idx];
                idx += 1;
                if c == '\\' && !escaped {
                    escaped = true;
                    continue;
                }
                if !escaped && quote.map_or(is_quote(c), |q| q == c) {
                    quote = Some(c);
                    quotes += 1;
                }
                escaped = false;
            }
        } else {
            while idx < chars.len() && is_space(chars[idx]) {
                idx += 1;
            }
            if idx >= chars.len() {
                break;
            }
            inside = true;
        }
    }

    buf.split('=')
        .filter(|token| !token.is_empty())
        .map(|token| token.trim().to_owned())
        .collect()
}

/// Collect quoted parameter values.
///
/// A value opens with `'`, `"` or `` ` `` and closes with the same character.
/// A backslash escapes the next character and is dropped, except before `$`.
/// Returns `None` when a value is never closed.
pub(crate) fn parse_param_values(chars: &[char], start: usize) -> Option<Vec<String>> {
    let mut values = Vec::new();
    let mut idx = start;

    while idx < chars.len() {
        while idx < chars.len() && !is_quote(chars[idx]) {
            idx += 1;
        }
        if idx >= chars.len() {
            break;
        }
        let end_quote = chars[idx];
        idx += 1;

        let mut value = String::new();
        let mut escaped = false;
        while idx < chars.len() {
            let c = chars[idx];
            if c == '\\' && !escaped {
                escaped = true;
                idx += 1;
                continue;
            }
            if c == end_quote && !escaped {
                break;
            }
            // Keep the escape so substitution can still tell `\$` from `$`.
            if c == '$' && escaped {
                value.push('\\');
            }
            escaped = false;
            value.push(c);
            idx += 1;
        }

        if idx == chars.len() {
            return None;
        }
        values.push(value);
        idx += 1;
    }

    Some(values)
}
