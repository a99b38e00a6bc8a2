//! Commands that reference another file: `#include`, `#flastmod`, `#fsize`.
//!
//! Each accepts any number of `file="..."` or `virtual="..."` attributes.
//! Values are substituted before the file is resolved.

use std::io::{self, Read, Write};

use super::{Outcome, is_attr, write_error};
use crate::directive::{Directive, Param};
use crate::state::ProcessingState;

const ONE_KILOBYTE: u64 = 1024;
const ONE_MEGABYTE: u64 = 1024 * 1024;

/// Resolved `file`/`virtual` attribute.
struct Target {
    path: String,
    is_virtual: bool,
}

impl Target {
    fn from_param(state: &ProcessingState<'_>, param: &Param) -> Option<Self> {
        let is_virtual = if is_attr(param, "virtual") {
            true
        } else if is_attr(param, "file") {
            false
        } else {
            return None;
        };
        Some(Self {
            path: state.substitute_variables(&param.value).into_owned(),
            is_virtual,
        })
    }
}

/// Shared attribute loop: `action` returns the bytes to write and the
/// timestamp contributed. On failure it returns `Err` with whatever timestamp
/// it had already retrieved, and the error message is written instead.
fn for_each_target(
    state: &ProcessingState<'_>,
    directive: &Directive,
    out: &mut dyn Write,
    command: &str,
    action: impl Fn(&ProcessingState<'_>, &Target) -> Result<(Vec<u8>, i64), i64>,
) -> io::Result<Outcome> {
    let mut last_modified = 0;

    for param in &directive.params {
        let Some(target) = Target::from_param(state, param) else {
            tracing::warn!(command, attribute = %param.name, "Invalid attribute");
            write_error(state, out)?;
            continue;
        };

        match action(state, &target) {
            Ok((bytes, modified)) => {
                out.write_all(&bytes)?;
                last_modified = last_modified.max(modified);
            }
            Err(modified) => {
                last_modified = last_modified.max(modified);
                tracing::warn!(
                    command,
                    path = %target.path,
                    is_virtual = target.is_virtual,
                    "File not usable"
                );
                write_error(state, out)?;
            }
        }
    }

    Ok(Outcome::Done { last_modified })
}

pub(super) fn include(
    state: &mut ProcessingState<'_>,
    directive: &Directive,
    out: &mut dyn Write,
) -> io::Result<Outcome> {
    for_each_target(state, directive, out, "include", |state, target| {
        let modified = state
            .files()
            .last_modified(&target.path, target.is_virtual)
            .unwrap_or(0);
        match read_file(state, target) {
            Ok(Some(bytes)) => Ok((bytes, modified)),
            Ok(None) => Err(modified),
            Err(e) => {
                tracing::debug!(path = %target.path, error = %e, "Read failed");
                Err(modified)
            }
        }
    })
}

pub(super) fn flastmod(
    state: &mut ProcessingState<'_>,
    directive: &Directive,
    out: &mut dyn Write,
) -> io::Result<Outcome> {
    for_each_target(state, directive, out, "flastmod", |state, target| {
        let modified = state
            .files()
            .last_modified(&target.path, target.is_virtual)
            .ok_or(0)?;
        Ok((state.format_date(modified).into_bytes(), modified))
    })
}

pub(super) fn fsize(
    state: &mut ProcessingState<'_>,
    directive: &Directive,
    out: &mut dyn Write,
) -> io::Result<Outcome> {
    for_each_target(state, directive, out, "fsize", |state, target| {
        let files = state.files();
        let modified = files
            .last_modified(&target.path, target.is_virtual)
            .unwrap_or(0);
        let size = files.size(&target.path, target.is_virtual).ok_or(modified)?;
        Ok((format_size(size, state.size_format()).into_bytes(), modified))
    })
}

/// Read a whole file. `Ok(None)` when the resolver cannot locate it.
fn read_file(state: &ProcessingState<'_>, target: &Target) -> io::Result<Option<Vec<u8>>> {
    let files = state.files();
    let Some(found) = files.find_file(&target.path, target.is_virtual) else {
        return Ok(None);
    };

    let mut reader = files.open(&found)?;
    let mut bytes = Vec::new();
    match files.size(&target.path, target.is_virtual) {
        Some(limit) => reader.take(limit).read_to_end(&mut bytes)?,
        None => reader.read_to_end(&mut bytes)?,
    };
    Ok(Some(bytes))
}

/// Format a file size for `#fsize`.
///
/// `bytes` groups digits with commas. Anything else uses the abbreviated
/// form, right-aligned to five characters.
///
/// # Example
///
/// ```text
/// format_size(1_234_567, "bytes")  -> "1,234,567"
/// format_size(2048, "abbrev")      -> "   2k"
/// ```
#[allow(clippy::cast_precision_loss)]
pub(crate) fn format_size(size: u64, format: &str) -> String {
    if format.eq_ignore_ascii_case("bytes") {
        return group_digits(size);
    }

    let abbreviated = if size == 0 {
        "0k".to_owned()
    } else if size < ONE_KILOBYTE {
        "1k".to_owned()
    } else if size < ONE_MEGABYTE {
        format!("{}k", (size + 512) / ONE_KILOBYTE)
    } else if size < 99 * ONE_MEGABYTE {
        format!("{:.1}M", size as f64 / ONE_MEGABYTE as f64)
    } else {
        format!("{}M", (size + 529 * ONE_KILOBYTE) / ONE_MEGABYTE)
    };
    format!("{abbreviated:>5}")
}

fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::command::test_support::{MemoryFiles, run};
    use crate::command::Command;
    use crate::resolver::MapVariables;

    const ERR: &str = "[an error occurred while processing this directive]";

    #[test]
    fn test_format_size_abbrev() {
        assert_eq!(format_size(0, "abbrev"), "   0k");
        assert_eq!(format_size(1, "abbrev"), "   1k");
        assert_eq!(format_size(1023, "abbrev"), "   1k");
        assert_eq!(format_size(1536, "abbrev"), "   2k");
        assert_eq!(format_size(ONE_MEGABYTE, "abbrev"), " 1.0M");
        assert_eq!(format_size(ONE_MEGABYTE * 3 / 2, "ABBREV"), " 1.5M");
        assert_eq!(format_size(100 * ONE_MEGABYTE, "abbrev"), " 100M");
    }

    #[test]
    fn test_format_size_bytes() {
        assert_eq!(format_size(0, "bytes"), "0");
        assert_eq!(format_size(999, "bytes"), "999");
        assert_eq!(format_size(1000, "bytes"), "1,000");
        assert_eq!(format_size(1_234_567, "Bytes"), "1,234,567");
    }

    #[test]
    fn test_include_contents_and_timestamp() {
        let files = MemoryFiles::default()
            .with_file("a.html", "<p>A</p>", 500)
            .with_file("b.html", "<p>B</p>", 900);
        let (out, outcome) = run(
            Command::Include,
            r#"include file="a.html" virtual="b.html""#,
            &mut MapVariables::new(),
            &files,
        );
        assert_eq!(out, "<p>A</p><p>B</p>");
        assert_eq!(outcome, Outcome::Done { last_modified: 900 });
    }

    #[test]
    fn test_include_path_substituted() {
        let files = MemoryFiles::default().with_file("menu.html", "menu", 1);
        let mut vars = MapVariables::new().with_variable("PART", "menu");
        let (out, _) = run(
            Command::Include,
            r#"include file="${PART}.html""#,
            &mut vars,
            &files,
        );
        assert_eq!(out, "menu");
    }

    #[test]
    fn test_include_missing_file() {
        let (out, outcome) = run(
            Command::Include,
            r#"include file="gone.html""#,
            &mut MapVariables::new(),
            &MemoryFiles::default(),
        );
        assert_eq!(out, ERR);
        assert_eq!(outcome, Outcome::Done { last_modified: 0 });
    }

    #[test]
    fn test_include_unreadable_keeps_timestamp() {
        let files = MemoryFiles::default().with_unreadable_file("locked", 5000);
        let (out, outcome) = run(
            Command::Include,
            r#"include file="locked""#,
            &mut MapVariables::new(),
            &files,
        );
        assert_eq!(out, ERR);
        assert_eq!(outcome, Outcome::Done { last_modified: 5000 });
    }

    #[test]
    fn test_invalid_attribute() {
        let files = MemoryFiles::default().with_file("a", "A", 1);
        let (out, _) = run(
            Command::Include,
            r#"include path="a" file="a""#,
            &mut MapVariables::new(),
            &files,
        );
        assert_eq!(out, format!("{ERR}A"));
    }

    #[test]
    fn test_fsize() {
        let files = MemoryFiles::default().with_file("big", &"x".repeat(2048), 7);
        let (out, outcome) = run(
            Command::Fsize,
            r#"fsize file="big" file="none""#,
            &mut MapVariables::new(),
            &files,
        );
        assert_eq!(out, format!("   2k{ERR}"));
        assert_eq!(outcome, Outcome::Done { last_modified: 7 });
    }

    #[test]
    fn test_flastmod_missing() {
        let (out, _) = run(
            Command::Flastmod,
            r#"flastmod virtual="/nope""#,
            &mut MapVariables::new(),
            &MemoryFiles::default(),
        );
        assert_eq!(out, ERR);
    }

    #[test]
    fn test_flastmod_reports_timestamp() {
        let files = MemoryFiles::default().with_file("a", "A", 86_400_000);
        let (out, outcome) = run(
            Command::Flastmod,
            r#"flastmod file="a""#,
            &mut MapVariables::new(),
            &files,
        );
        assert!(out.contains("1970"), "{out}");
        assert_eq!(outcome, Outcome::Done { last_modified: 86_400_000 });
    }
}
