//! `#config errmsg="..." sizefmt="..." timefmt="..."`

use std::io::{self, Write};

use super::{Outcome, is_attr, write_error};
use crate::directive::Directive;
use crate::state::ProcessingState;

pub(super) fn process(
    state: &mut ProcessingState<'_>,
    directive: &Directive,
    out: &mut dyn Write,
) -> io::Result<Outcome> {
    for param in &directive.params {
        let value = state.substitute_variables(&param.value).into_owned();
        if is_attr(param, "errmsg") {
            state.set_error_message(value);
        } else if is_attr(param, "sizefmt") {
            state.set_size_format(value);
        } else if is_attr(param, "timefmt") {
            state.set_time_format(value, false);
        } else {
            tracing::warn!(attribute = %param.name, "#config: invalid attribute");
            write_error(state, out)?;
        }
    }

    // Configuration alone never changes the page.
    Ok(Outcome::UNCHANGED)
}
