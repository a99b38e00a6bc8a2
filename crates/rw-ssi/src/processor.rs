//! Document scanner and command dispatch.

use std::io::{self, Write};

use crate::command::{CommandRegistry, Outcome};
use crate::date::{ChronoDateFormatter, DateFormatter};
use crate::directive::{Directive, parse_command_name};
use crate::error::DirectiveError;
use crate::resolver::{FileResolver, VariableResolver};
use crate::state::{
    DEFAULT_ERROR_MESSAGE, DEFAULT_SIZE_FORMAT, DEFAULT_TIME_FORMAT, ProcessingState,
};

const DIRECTIVE_START: &str = "<!--#";
const DIRECTIVE_END: &str = "-->";

/// Initial settings for each processed document.
///
/// `#config` directives override these for the rest of a single document only.
pub struct ProcessorConfig {
    error_message: String,
    time_format: String,
    size_format: String,
    date_formatter: Box<dyn DateFormatter>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorConfig {
    /// Create a configuration with Apache's defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            error_message: DEFAULT_ERROR_MESSAGE.to_owned(),
            time_format: DEFAULT_TIME_FORMAT.to_owned(),
            size_format: DEFAULT_SIZE_FORMAT.to_owned(),
            date_formatter: Box::new(ChronoDateFormatter),
        }
    }

    /// Set the message written in place of failed directives.
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// Set the strftime format for dates.
    #[must_use]
    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = format.into();
        self
    }

    /// Set the `#fsize` format (`abbrev` or `bytes`).
    #[must_use]
    pub fn with_size_format(mut self, format: impl Into<String>) -> Self {
        self.size_format = format.into();
        self
    }

    /// Replace the date formatter.
    #[must_use]
    pub fn with_date_formatter<D: DateFormatter + 'static>(mut self, formatter: D) -> Self {
        self.date_formatter = Box::new(formatter);
        self
    }

    /// Initial error message.
    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Initial time format.
    #[must_use]
    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    /// Initial size format.
    #[must_use]
    pub fn size_format(&self) -> &str {
        &self.size_format
    }

    /// Date formatter shared by every document.
    #[must_use]
    pub fn date_formatter(&self) -> &dyn DateFormatter {
        self.date_formatter.as_ref()
    }
}

/// Server-side include processor.
///
/// Holds the immutable command table and configuration; every call to
/// [`process`](Self::process) gets fresh per-document state, so one processor
/// can serve many documents.
///
/// # Example
///
/// ```
/// use rw_ssi::{FsFileResolver, MapVariables, SsiProcessor};
///
/// let processor = SsiProcessor::new();
/// let mut variables = MapVariables::new().with_variable("USER", "ada");
/// let files = FsFileResolver::new(".");
/// let mut out = Vec::new();
///
/// let document = r#"<!--#if expr="$USER = ada"-->hello<!--#else-->who?<!--#endif-->"#;
/// processor.process(&mut variables, &files, document, 0, &mut out).unwrap();
/// assert_eq!(String::from_utf8(out).unwrap(), "hello");
/// ```
#[derive(Default)]
pub struct SsiProcessor {
    config: ProcessorConfig,
    registry: CommandRegistry,
}

impl SsiProcessor {
    /// Create a processor with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ProcessorConfig::default())
    }

    /// Create a processor with custom configuration.
    #[must_use]
    pub fn with_config(config: ProcessorConfig) -> Self {
        Self {
            config,
            registry: CommandRegistry::builtin(),
        }
    }

    /// Configuration used for new documents.
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Expand every directive in `document`, writing the result to `out`.
    ///
    /// Returns the newest last-modified timestamp seen, never less than
    /// `last_modified`. Directive failures appear in the output as the
    /// configured error message; a stop signal ends output early without
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error only when writing to `out` fails.
    pub fn process(
        &self,
        variables: &mut dyn VariableResolver,
        files: &dyn FileResolver,
        document: &str,
        last_modified: i64,
        out: &mut dyn Write,
    ) -> io::Result<i64> {
        let mut state = ProcessingState::new(variables, files, &self.config, last_modified);
        let mut rest = document;

        while !rest.is_empty() {
            let Some(start) = rest.find(DIRECTIVE_START) else {
                write_literal(&state, rest, out)?;
                break;
            };
            write_literal(&state, &rest[..start], out)?;

            let body = &rest[start + DIRECTIVE_START.len()..];
            let Some(end) = body.find(DIRECTIVE_END) else {
                tracing::debug!("Dropping unterminated directive at end of document");
                break;
            };
            rest = &body[end + DIRECTIVE_END.len()..];

            if self.run_directive(&mut state, &body[..end], out)? == Outcome::Stop {
                tracing::debug!("Stopped processing document");
                break;
            }
        }

        Ok(state.last_modified())
    }

    /// Parse and execute one directive body.
    fn run_directive(
        &self,
        state: &mut ProcessingState<'_>,
        text: &str,
        out: &mut dyn Write,
    ) -> io::Result<Outcome> {
        let chars: Vec<char> = text.chars().collect();
        let name = parse_command_name(&chars);

        let parsed = match self.registry.get(&name) {
            Some(command) => Directive::with_params(name, &chars).map(|d| (command, d)),
            None => Err(DirectiveError::UnknownCommand(name)),
        };
        let (command, directive) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, directive = text.trim(), "Invalid directive");
                out.write_all(state.error_message().as_bytes())?;
                return Ok(Outcome::UNCHANGED);
            }
        };

        if state.conditional().suppress_output && !command.is_conditional() {
            return Ok(Outcome::UNCHANGED);
        }

        let outcome = command.process(state, &directive, out)?;
        if let Outcome::Done { last_modified } = outcome {
            state.record_last_modified(last_modified);
        }
        Ok(outcome)
    }
}

fn write_literal(state: &ProcessingState<'_>, text: &str, out: &mut dyn Write) -> io::Result<()> {
    if state.conditional().suppress_output {
        return Ok(());
    }
    out.write_all(text.as_bytes())
}
