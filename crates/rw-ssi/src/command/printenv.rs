//! `#printenv`: dump every known variable as `NAME=value` lines.

use std::io::{self, Write};

use super::{Outcome, write_error};
use crate::date::now_millis;
use crate::directive::Directive;
use crate::escape::Encoding;
use crate::state::ProcessingState;

pub(super) fn process(
    state: &mut ProcessingState<'_>,
    directive: &Directive,
    out: &mut dyn Write,
) -> io::Result<Outcome> {
    if !directive.params.is_empty() {
        tracing::warn!(params = directive.params.len(), "#printenv takes no attributes");
        write_error(state, out)?;
        return Ok(Outcome::UNCHANGED);
    }

    for name in state.variable_names() {
        let value = state
            .variable_value(&name, Encoding::Entity)
            .unwrap_or_else(|| "(none)".to_owned());
        writeln!(out, "{name}={value}")?;
    }

    Ok(Outcome::Done {
        last_modified: now_millis(),
    })
}
