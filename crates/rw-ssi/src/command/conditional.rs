//! `#if`, `#elif`, `#else` and `#endif`.
//!
//! These run even while output is suppressed so that nested blocks inside a
//! skipped branch are still counted.

use super::Outcome;
use crate::date::now_millis;
use crate::directive::Directive;
use crate::expr::evaluate;
use crate::state::ProcessingState;

pub(super) fn process(state: &mut ProcessingState<'_>, directive: &Directive) -> Outcome {
    let keyword = directive.name.to_ascii_lowercase();
    let stepped = match keyword.as_str() {
        "if" => process_if(state, directive),
        "elif" => process_elif(state, directive),
        "else" => {
            let conditional = state.conditional_mut();
            if conditional.nesting_count == 0 {
                conditional.suppress_output = conditional.branch_taken;
                conditional.branch_taken = true;
            }
            Some(())
        }
        "endif" => {
            let conditional = state.conditional_mut();
            if conditional.nesting_count > 0 {
                conditional.nesting_count -= 1;
            } else {
                conditional.suppress_output = false;
                conditional.branch_taken = true;
            }
            Some(())
        }
        _ => {
            tracing::warn!(command = %directive.name, "Not a conditional command");
            None
        }
    };

    match stepped {
        Some(()) => Outcome::Done {
            last_modified: now_millis(),
        },
        None => Outcome::Stop,
    }
}

fn process_if(state: &mut ProcessingState<'_>, directive: &Directive) -> Option<()> {
    if state.conditional().suppress_output {
        state.conditional_mut().nesting_count += 1;
        return Some(());
    }

    state.conditional_mut().nesting_count = 0;
    let taken = evaluate_expr(state, directive)?;
    take_branch(state, taken);
    Some(())
}

fn process_elif(state: &mut ProcessingState<'_>, directive: &Directive) -> Option<()> {
    if state.conditional().nesting_count > 0 {
        return Some(());
    }
    if state.conditional().branch_taken {
        state.conditional_mut().suppress_output = true;
        return Some(());
    }

    let taken = evaluate_expr(state, directive)?;
    take_branch(state, taken);
    Some(())
}

fn take_branch(state: &mut ProcessingState<'_>, taken: bool) {
    let conditional = state.conditional_mut();
    conditional.branch_taken = taken;
    conditional.suppress_output = !taken;
}

/// Evaluate the first `expr` attribute. `None` on a missing or malformed
/// expression, which stops the document.
fn evaluate_expr(state: &ProcessingState<'_>, directive: &Directive) -> Option<bool> {
    let Some(param) = directive
        .params
        .iter()
        .find(|param| param.name.eq_ignore_ascii_case("expr"))
    else {
        tracing::warn!(command = %directive.name, "Missing expr attribute");
        return None;
    };

    evaluate(&param.value, |text| state.substitute_variables(text).into_owned())
        .map_err(|e| {
            tracing::warn!(expr = %param.value, error = %e, "Invalid expression");
        })
        .ok()
}
