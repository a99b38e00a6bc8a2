//! `#set var="NAME" value="..."`
//!
//! Several pairs may appear in one directive. A `value` only takes effect
//! after a `var`; misuse writes the error message and stops the document.

use std::io::{self, Write};

use super::{Outcome, is_attr, write_error};
use crate::date::now_millis;
use crate::directive::Directive;
use crate::state::ProcessingState;

pub(super) fn process(
    state: &mut ProcessingState<'_>,
    directive: &Directive,
    out: &mut dyn Write,
) -> io::Result<Outcome> {
    let mut name: Option<&str> = None;
    let mut last_modified = 0;

    for param in &directive.params {
        if is_attr(param, "var") {
            name = Some(&param.value);
        } else if is_attr(param, "value") {
            let Some(name) = name else {
                tracing::warn!("#set: value without var");
                write_error(state, out)?;
                return Ok(Outcome::Stop);
            };
            let value = state.substitute_variables(&param.value).into_owned();
            state.set_variable_value(name, Some(&value));
            last_modified = now_millis();
        } else {
            tracing::warn!(attribute = %param.name, "#set: invalid attribute");
            write_error(state, out)?;
            return Ok(Outcome::Stop);
        }
    }

    Ok(Outcome::Done { last_modified })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::command::test_support::{MemoryFiles, run};
    use crate::command::{Command, Outcome};
    use crate::resolver::{MapVariables, VariableResolver};

    const ERR: &str = "[an error occurred while processing this directive]";

    #[test]
    fn test_sets_substituted_value() {
        let mut vars = MapVariables::new().with_variable("WHO", "world");
        let (out, outcome) = run(
            Command::Set,
            r#"set var="GREETING" value="hello ${WHO}""#,
            &mut vars,
            &MemoryFiles::default(),
        );
        assert_eq!(out, "");
        assert!(matches!(outcome, Outcome::Done { last_modified } if last_modified > 0));
        assert_eq!(vars.variable("GREETING").as_deref(), Some("hello world"));
    }

    #[test]
    fn test_multiple_pairs() {
        let mut vars = MapVariables::new();
        run(
            Command::Set,
            r#"set var="A" value="1" var="B" value="2""#,
            &mut vars,
            &MemoryFiles::default(),
        );
        assert_eq!(vars.variable("A").as_deref(), Some("1"));
        assert_eq!(vars.variable("B").as_deref(), Some("2"));
    }

    #[test]
    fn test_value_without_var_stops() {
        let mut vars = MapVariables::new();
        let (out, outcome) = run(
            Command::Set,
            r#"set value="1""#,
            &mut vars,
            &MemoryFiles::default(),
        );
        assert_eq!(out, ERR);
        assert_eq!(outcome, Outcome::Stop);
    }

    #[test]
    fn test_unknown_attribute_stops() {
        let mut vars = MapVariables::new();
        let (out, outcome) = run(
            Command::Set,
            r#"set var="A" colour="red""#,
            &mut vars,
            &MemoryFiles::default(),
        );
        assert_eq!(out, ERR);
        assert_eq!(outcome, Outcome::Stop);
    }

    #[test]
    fn test_reserved_name_ignored() {
        let mut vars = MapVariables::new();
        run(
            Command::Set,
            r#"set var="ssi.X" value="1""#,
            &mut vars,
            &MemoryFiles::default(),
        );
        assert_eq!(vars.variable("ssi.X"), None);
    }
}
