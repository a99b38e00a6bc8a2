//! Server-Side Includes (SSI) directive processor.
//!
//! Scans an HTML-like document for `<!--#command attr="value" ...-->`
//! directives, evaluates them against host-provided capabilities, and streams
//! the transformed document to a writer.
//!
//! # Architecture
//!
//! - [`SsiProcessor`]: top-level scan loop, dispatches directives through the
//!   immutable [`CommandRegistry`]
//! - [`ProcessingState`]: per-document config strings, conditional state and
//!   variable substitution
//! - [`VariableResolver`], [`FileResolver`], [`DateFormatter`]: narrow host
//!   capabilities the processor consumes
//!
//! Supported commands: `config`, `echo`, `include`, `flastmod`, `fsize`,
//! `printenv`, `set`, `if`, `elif`, `else`, `endif`. `#exec` is not supported
//! and reports the configured error message like any other unknown command.
//!
//! # Example
//!
//! ```
//! use rw_ssi::{FsFileResolver, MapVariables, SsiProcessor};
//!
//! let processor = SsiProcessor::new();
//! let mut variables = MapVariables::new().with_variable("USER", "ada");
//! let files = FsFileResolver::new(".");
//!
//! let mut out = Vec::new();
//! processor
//!     .process(&mut variables, &files, r#"Hi <!--#echo var="USER"-->!"#, 0, &mut out)
//!     .unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "Hi ada!");
//! ```

mod command;
mod date;
mod directive;
mod error;
mod escape;
mod expr;
mod fs;
mod processor;
mod resolver;
mod state;

pub use command::{Command, CommandRegistry, Outcome};
pub use date::{ChronoDateFormatter, DateFormatter, Zone};
pub use directive::{Directive, Param};
pub use error::{DirectiveError, ExpressionError, UnknownEncoding};
pub use escape::{Encoding, escape_entities, escape_url};
pub use expr::evaluate;
pub use fs::FsFileResolver;
pub use processor::{ProcessorConfig, SsiProcessor};
pub use resolver::{FileResolver, MapVariables, VariableResolver};
pub use state::{
    ConditionalState, DEFAULT_ERROR_MESSAGE, DEFAULT_SIZE_FORMAT, DEFAULT_TIME_FORMAT,
    ProcessingState,
};
