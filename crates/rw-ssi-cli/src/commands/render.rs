//! `rw-ssi render` command implementation.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use clap::Args;
use rw_ssi::{FsFileResolver, MapVariables, ProcessorConfig, SsiProcessor, VariableResolver};
use rw_ssi_config::{CliSettings, Config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Document to process.
    file: PathBuf,

    /// Path to configuration file (default: auto-discover ssi.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Document root for `virtual` paths (overrides config).
    #[arg(short, long)]
    root_dir: Option<PathBuf>,

    /// Set a variable; may be repeated.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
    variables: Vec<(String, String)>,

    /// Write the result to a file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output (directive warnings and the final timestamp).
    #[arg(short, long)]
    pub verbose: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the document cannot be read,
    /// or the output cannot be written.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let cli_settings = CliSettings {
            root_dir: self.root_dir,
            variables: self.variables,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let root = &config.files_resolved.root_dir;

        let document = fs::read_to_string(&self.file).map_err(|source| CliError::Read {
            path: self.file.clone(),
            source,
        })?;
        let uri = document_uri(root, &self.file)?;

        let mut variables = MapVariables::new();
        if let Some(name) = self.file.file_name() {
            variables.set_variable("DOCUMENT_NAME", Some(name.to_string_lossy().as_ref()));
        }
        variables.set_variable("DOCUMENT_URI", Some(uri.as_str()));
        for (name, value) in &config.variables {
            variables.set_variable(name, Some(value.as_str()));
        }

        let processor = SsiProcessor::with_config(
            ProcessorConfig::new()
                .with_error_message(&config.ssi.errmsg)
                .with_time_format(&config.ssi.timefmt)
                .with_size_format(&config.ssi.sizefmt),
        );
        let files = FsFileResolver::new(root).with_document(uri.trim_start_matches('/'));

        let mut sink: Box<dyn Write> = match &self.output {
            Some(path) => Box::new(BufWriter::new(File::create(path)?)),
            None => Box::new(io::stdout().lock()),
        };
        let last_modified = processor.process(
            &mut variables,
            &files,
            &document,
            modified_millis(&self.file),
            sink.as_mut(),
        )?;
        sink.flush()?;

        tracing::info!(
            document = %self.file.display(),
            uri = %uri,
            last_modified,
            "Rendered document"
        );
        if let Some(path) = &self.output {
            Output::new().success(&format!("Wrote {}", path.display()));
        }

        Ok(())
    }
}

/// Parse a `NAME=VALUE` argument.
fn parse_variable(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected NAME=VALUE, got {arg:?}")),
    }
}

/// URI of `document` under `root`, with a leading `/`.
fn document_uri(root: &Path, document: &Path) -> Result<String, CliError> {
    let canonical = |path: &Path| {
        path.canonicalize().map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })
    };
    let root = canonical(root)?;
    let document = canonical(document)?;

    let relative = document.strip_prefix(&root).map_err(|_| {
        CliError::Validation(format!(
            "{} is outside the document root {}",
            document.display(),
            root.display()
        ))
    })?;

    let segments: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Ok(format!("/{}", segments.join("/")))
}

/// File modification time in epoch milliseconds, 0 when unavailable.
fn modified_millis(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_millis()).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_variable() {
        assert_eq!(
            parse_variable("SITE=Example").unwrap(),
            ("SITE".to_owned(), "Example".to_owned())
        );
        assert_eq!(
            parse_variable("EXPR=a=b").unwrap(),
            ("EXPR".to_owned(), "a=b".to_owned())
        );
        assert_eq!(
            parse_variable("EMPTY=").unwrap(),
            ("EMPTY".to_owned(), String::new())
        );
    }

    #[test]
    fn test_parse_variable_invalid() {
        assert!(parse_variable("NOVALUE").is_err());
        assert!(parse_variable("=value").is_err());
    }

    #[test]
    fn test_document_uri() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        let file = dir.path().join("docs/index.shtml");
        fs::write(&file, "").unwrap();

        assert_eq!(document_uri(dir.path(), &file).unwrap(), "/docs/index.shtml");
    }

    #[test]
    fn test_document_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("www");
        fs::create_dir(&root).unwrap();
        let file = dir.path().join("page.shtml");
        fs::write(&file, "").unwrap();

        let err = document_uri(&root, &file).unwrap_err();
        assert!(matches!(err, CliError::Validation(_)));
    }

    #[test]
    fn test_modified_millis_missing_file() {
        assert_eq!(modified_millis(Path::new("/nonexistent/page.shtml")), 0);
    }
}
