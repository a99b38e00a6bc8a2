//! `#echo var="NAME" [encoding="url|entity|none"]`
//!
//! `encoding` applies to every `var` that follows it in the same directive.

use std::io::{self, Write};

use super::{Outcome, is_attr, write_error};
use crate::date::now_millis;
use crate::directive::Directive;
use crate::escape::Encoding;
use crate::state::ProcessingState;

/// Written when a variable has no value.
const MISSING_VALUE: &str = "(none)";

pub(super) fn process(
    state: &mut ProcessingState<'_>,
    directive: &Directive,
    out: &mut dyn Write,
) -> io::Result<Outcome> {
    let mut encoding = Encoding::default();
    let mut last_modified = 0;

    for param in &directive.params {
        if is_attr(param, "encoding") {
            match param.value.parse() {
                Ok(parsed) => encoding = parsed,
                Err(e) => {
                    tracing::warn!(error = %e, "#echo: invalid encoding");
                    write_error(state, out)?;
                }
            }
        } else if is_attr(param, "var") {
            let value = state
                .variable_value(&param.value, encoding)
                .unwrap_or_else(|| MISSING_VALUE.to_owned());
            out.write_all(value.as_bytes())?;
            last_modified = now_millis();
        } else {
            tracing::warn!(attribute = %param.name, "#echo: invalid attribute");
            write_error(state, out)?;
        }
    }

    Ok(Outcome::Done { last_modified })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::command::test_support::{MemoryFiles, run};
    use crate::command::{Command, Outcome};
    use crate::resolver::MapVariables;

    #[test]
    fn test_unset_variable() {
        let (out, outcome) = run(
            Command::Echo,
            r#"echo var="NOPE""#,
            &mut MapVariables::new(),
            &MemoryFiles::default(),
        );
        assert_eq!(out, "(none)");
        assert!(matches!(outcome, Outcome::Done { last_modified } if last_modified > 0));
    }

    #[test]
    fn test_entity_encoding_by_default() {
        let mut vars = MapVariables::new().with_variable("HTML", "<b>&</b>");
        let (out, _) = run(
            Command::Echo,
            r#"echo var="HTML""#,
            &mut vars,
            &MemoryFiles::default(),
        );
        assert_eq!(out, "&lt;b&gt;&amp;&lt;/b&gt;");
    }

    #[test]
    fn test_encoding_applies_to_following_vars() {
        let mut vars = MapVariables::new().with_variable("Q", "a b");
        let (out, _) = run(
            Command::Echo,
            r#"echo var="Q" encoding="url" var="Q" encoding="none" var="Q""#,
            &mut vars,
            &MemoryFiles::default(),
        );
        assert_eq!(out, "a ba%20ba b");
    }

    #[test]
    fn test_invalid_encoding_keeps_previous() {
        let mut vars = MapVariables::new().with_variable("Q", "<");
        let (out, _) = run(
            Command::Echo,
            r#"echo encoding="rot13" var="Q""#,
            &mut vars,
            &MemoryFiles::default(),
        );
        assert_eq!(
            out,
            "[an error occurred while processing this directive]&lt;"
        );
    }

    #[test]
    fn test_var_name_not_substituted() {
        let mut vars = MapVariables::new()
            .with_variable("NAME", "OTHER")
            .with_variable("OTHER", "x");
        let (out, _) = run(
            Command::Echo,
            r#"echo var="$NAME""#,
            &mut vars,
            &MemoryFiles::default(),
        );
        assert_eq!(out, "(none)");
    }
}
