//! Built-in SSI commands and the registry that dispatches to them.

mod conditional;
mod config;
mod echo;
mod file;
mod printenv;
mod set;

use std::collections::HashMap;
use std::io::{self, Write};

use crate::directive::{Directive, Param};
use crate::state::ProcessingState;

/// Result of running one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command finished; `last_modified` is its content timestamp in
    /// epoch milliseconds (0 when it does not affect freshness).
    Done {
        /// Timestamp contributed by the command.
        last_modified: i64,
    },
    /// Abort the rest of the document silently.
    Stop,
}

impl Outcome {
    pub(crate) const UNCHANGED: Self = Self::Done { last_modified: 0 };
}

/// A built-in command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `#config errmsg|sizefmt|timefmt`
    Config,
    /// `#echo var [encoding]`
    Echo,
    /// `#include file|virtual`
    Include,
    /// `#flastmod file|virtual`
    Flastmod,
    /// `#fsize file|virtual`
    Fsize,
    /// `#printenv`
    Printenv,
    /// `#set var value`
    Set,
    /// `#if`, `#elif`, `#else`, `#endif`
    Conditional,
}

impl Command {
    /// Run the command for a parsed directive.
    ///
    /// Only failures of `out` are returned as errors; everything else is
    /// reported in-band through the configured error message or
    /// [`Outcome::Stop`].
    pub fn process(
        self,
        state: &mut ProcessingState<'_>,
        directive: &Directive,
        out: &mut dyn Write,
    ) -> io::Result<Outcome> {
        match self {
            Self::Config => config::process(state, directive, out),
            Self::Echo => echo::process(state, directive, out),
            Self::Include => file::include(state, directive, out),
            Self::Flastmod => file::flastmod(state, directive, out),
            Self::Fsize => file::fsize(state, directive, out),
            Self::Printenv => printenv::process(state, directive, out),
            Self::Set => set::process(state, directive, out),
            Self::Conditional => Ok(conditional::process(state, directive)),
        }
    }

    /// Whether the command runs even while output is suppressed.
    #[must_use]
    pub fn is_conditional(self) -> bool {
        self == Self::Conditional
    }
}

/// Immutable lookup table from lower-case command name to [`Command`].
///
/// # Example
///
/// ```
/// use rw_ssi::{Command, CommandRegistry};
///
/// let registry = CommandRegistry::builtin();
/// assert_eq!(registry.get("ECHO"), Some(Command::Echo));
/// assert_eq!(registry.get("exec"), None);
/// ```
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, Command>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CommandRegistry {
    /// Registry with every built-in command.
    #[must_use]
    pub fn builtin() -> Self {
        let commands = HashMap::from([
            ("config", Command::Config),
            ("echo", Command::Echo),
            ("include", Command::Include),
            ("flastmod", Command::Flastmod),
            ("fsize", Command::Fsize),
            ("printenv", Command::Printenv),
            ("set", Command::Set),
            ("if", Command::Conditional),
            ("elif", Command::Conditional),
            ("else", Command::Conditional),
            ("endif", Command::Conditional),
        ]);
        Self { commands }
    }

    /// Look up a command name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Command> {
        self.commands.get(name.to_lowercase().as_str()).copied()
    }

    /// Registered command names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Case-insensitive attribute name check.
fn is_attr(param: &Param, name: &str) -> bool {
    param.name.eq_ignore_ascii_case(name)
}

fn write_error(state: &ProcessingState<'_>, out: &mut dyn Write) -> io::Result<()> {
    out.write_all(state.error_message().as_bytes())
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_lookup_case_insensitive() {
        let registry = CommandRegistry::builtin();
        assert_eq!(registry.get("Include"), Some(Command::Include));
        assert_eq!(registry.get("ENDIF"), Some(Command::Conditional));
    }

    #[test]
    fn test_exec_not_registered() {
        let registry = CommandRegistry::builtin();
        assert_eq!(registry.get("exec"), None);
        assert_eq!(registry.get(""), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(
            CommandRegistry::default().names(),
            vec![
                "config", "echo", "elif", "else", "endif", "flastmod", "fsize", "if", "include",
                "printenv", "set"
            ]
        );
    }

    #[test]
    fn test_only_conditionals_bypass_suppression() {
        assert!(Command::Conditional.is_conditional());
        assert!(!Command::Echo.is_conditional());
    }
}
