//! Per-document processing state.
//!
//! Holds the `#config` strings, the conditional state machine, and the
//! variable substitution routine. One instance lives for exactly one
//! [`SsiProcessor::process`](crate::SsiProcessor::process) call.

use std::borrow::Cow;

use indexmap::IndexSet;

use crate::date::{DateFormatter, Zone, now_millis};
use crate::escape::Encoding;
use crate::processor::ProcessorConfig;
use crate::resolver::{FileResolver, VariableResolver};

/// Error message written in place of a failed directive.
pub const DEFAULT_ERROR_MESSAGE: &str = "[an error occurred while processing this directive]";

/// strftime format for dates.
pub const DEFAULT_TIME_FORMAT: &str = "%A, %d-%b-%Y %T %Z";

/// `#fsize` format: `abbrev` or `bytes`.
pub const DEFAULT_SIZE_FORMAT: &str = "abbrev";

/// Prefix under which built-in variables live in the [`VariableResolver`].
const RESERVED_PREFIX: &str = "ssi.";

/// Built-in date variables, in `#printenv` order.
const DATE_VARIABLES: [&str; 3] = ["DATE_GMT", "DATE_LOCAL", "LAST_MODIFIED"];

/// Conditional (`#if`/`#elif`/`#else`/`#endif`) tracking.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConditionalState {
    /// Whether a branch of the current `if` block has already been taken.
    pub branch_taken: bool,
    /// Depth of `if` blocks opened inside a skipped branch.
    pub nesting_count: usize,
    /// Whether literal text and non-conditional commands are dropped.
    pub suppress_output: bool,
}

/// Mutable context for one document.
pub struct ProcessingState<'a> {
    variables: &'a mut dyn VariableResolver,
    files: &'a dyn FileResolver,
    dates: &'a dyn DateFormatter,
    error_message: String,
    time_format: String,
    size_format: String,
    last_modified: i64,
    dates_initialized: bool,
    conditional: ConditionalState,
}

impl<'a> ProcessingState<'a> {
    /// Create the state for one document and publish the built-in date
    /// variables.
    pub fn new(
        variables: &'a mut dyn VariableResolver,
        files: &'a dyn FileResolver,
        config: &'a ProcessorConfig,
        last_modified: i64,
    ) -> Self {
        let mut state = Self {
            variables,
            files,
            dates: config.date_formatter(),
            error_message: config.error_message().to_owned(),
            time_format: String::new(),
            size_format: config.size_format().to_owned(),
            last_modified,
            dates_initialized: false,
            conditional: ConditionalState::default(),
        };
        state.set_time_format(config.time_format(), true);
        state
    }

    /// Message written in place of failed directives.
    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Replace the error message (`#config errmsg`).
    pub fn set_error_message(&mut self, message: impl Into<String>) {
        self.error_message = message.into();
    }

    /// Current strftime format.
    #[must_use]
    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    /// Install a time format and refresh `DATE_GMT`, `DATE_LOCAL` and
    /// `LAST_MODIFIED`.
    ///
    /// The refresh triggered while constructing the state runs once per
    /// instance; explicit `#config timefmt` calls always refresh.
    pub fn set_time_format(&mut self, format: impl Into<String>, from_constructor: bool) {
        self.time_format = format.into();

        if from_constructor && self.dates_initialized {
            return;
        }
        self.dates_initialized = true;
        self.refresh_date_variables();
    }

    /// Current size format.
    #[must_use]
    pub fn size_format(&self) -> &str {
        &self.size_format
    }

    /// Replace the size format (`#config sizefmt`).
    pub fn set_size_format(&mut self, format: impl Into<String>) {
        self.size_format = format.into();
    }

    /// Highest last-modified timestamp seen so far.
    #[must_use]
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// Raise the last-modified timestamp; lower values are ignored.
    pub fn record_last_modified(&mut self, millis: i64) {
        self.last_modified = self.last_modified.max(millis);
    }

    /// Conditional state.
    #[must_use]
    pub fn conditional(&self) -> &ConditionalState {
        &self.conditional
    }

    /// Mutable conditional state.
    pub fn conditional_mut(&mut self) -> &mut ConditionalState {
        &mut self.conditional
    }

    /// Host file resolver.
    #[must_use]
    pub fn files(&self) -> &dyn FileResolver {
        self.files
    }

    /// Format a timestamp in local time with the current time format.
    #[must_use]
    pub fn format_date(&self, millis: i64) -> String {
        self.dates.format(millis, &self.time_format, Zone::Local)
    }

    /// Look up a variable and encode its value.
    ///
    /// Host-supplied variables shadow built-ins. Reserved names never resolve.
    #[must_use]
    pub fn variable_value(&self, name: &str, encoding: Encoding) -> Option<String> {
        if is_reserved(name) {
            return None;
        }
        let value = self.variables.variable(name).or_else(|| {
            self.variables
                .variable(&format!("{RESERVED_PREFIX}{}", name.to_ascii_uppercase()))
        })?;
        Some(encoding.apply(&value))
    }

    /// Set or remove a variable. Reserved names are ignored.
    pub fn set_variable_value(&mut self, name: &str, value: Option<&str>) {
        if is_reserved(name) {
            tracing::debug!(name, "Ignoring write to reserved variable");
            return;
        }
        self.variables.set_variable(name, value);
    }

    /// Variable names for `#printenv`: built-in dates first, then
    /// resolver-supplied names, without duplicates or reserved names.
    #[must_use]
    pub fn variable_names(&self) -> IndexSet<String> {
        let mut names: IndexSet<String> = DATE_VARIABLES.iter().map(|&n| n.to_owned()).collect();
        self.variables.add_variable_names(&mut names);
        names.retain(|name| !is_reserved(name));
        names
    }

    /// Decode HTML entities and expand `$name` / `${name}` references.
    ///
    /// Unknown variables expand to nothing. `\$` yields a literal `$`.
    /// Substituted text is not scanned again.
    #[must_use]
    pub fn substitute_variables<'s>(&self, text: &'s str) -> Cow<'s, str> {
        if !text.contains('$') && !text.contains('&') {
            return Cow::Borrowed(text);
        }

        let decoded = decode_entities(text);
        let chars: Vec<char> = decoded.chars().collect();
        let mut out = String::with_capacity(decoded.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            i += 1;
            if c != '$' || i == chars.len() {
                out.push(c);
                continue;
            }
            if out.ends_with('\\') {
                out.pop();
                out.push('$');
                continue;
            }

            let braced = chars[i] == '{';
            let name_start = if braced { i + 1 } else { i };
            let mut end = i;
            while end < chars.len() {
                let at_end = if braced {
                    chars[end] == '}'
                } else {
                    chars[end].is_whitespace()
                };
                if at_end {
                    break;
                }
                end += 1;
            }

            let name: String = chars[name_start.min(end)..end].iter().collect();
            if let Some(value) = self.variable_value(&name, Encoding::None) {
                out.push_str(&value);
            }
            i = if braced { (end + 1).min(chars.len()) } else { end };
        }

        Cow::Owned(out)
    }

    fn refresh_date_variables(&mut self) {
        let now = now_millis();
        let values = [
            self.dates.format(now, &self.time_format, Zone::Gmt),
            self.dates.format(now, &self.time_format, Zone::Local),
            self.dates
                .format(self.last_modified, &self.time_format, Zone::Local),
        ];

        for (name, value) in DATE_VARIABLES.iter().zip(values) {
            // A user-defined copy would shadow the fresh built-in value.
            self.set_variable_value(name, None);
            self.variables
                .set_variable(&format!("{RESERVED_PREFIX}{name}"), Some(&value));
        }
    }
}

fn is_reserved(name: &str) -> bool {
    name.get(..RESERVED_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(RESERVED_PREFIX))
}

/// Decode `&lt;`, `&gt;`, `&quot;`, `&amp;` and `&#NNN;` references.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }

    let replaced = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");

    let mut out = String::with_capacity(replaced.len());
    let mut rest = replaced.as_str();
    while let Some(start) = rest.find("&#") {
        let after = &rest[start + 2..];
        let Some(end) = after.find(';') else {
            break;
        };
        match after[..end].parse::<u32>().ok().and_then(char::from_u32) {
            Some(c) => {
                out.push_str(&rest[..start]);
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[..start + 2]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
