//! Host capabilities consumed by the processor.
//!
//! The processor never touches request headers, environment, or the file
//! system directly. Hosts supply a [`VariableResolver`] and a [`FileResolver`];
//! [`MapVariables`] and [`FsFileResolver`](crate::FsFileResolver) cover the
//! common cases.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};

/// Variable lookup and storage.
///
/// Built-in variables are stored through the same interface under a reserved
/// prefix, so a resolver only needs to behave like a string map.
pub trait VariableResolver {
    /// Look up a variable value.
    fn variable(&self, name: &str) -> Option<String>;

    /// Set a variable, or remove it when `value` is `None`.
    fn set_variable(&mut self, name: &str, value: Option<&str>);

    /// Add the names of all variables that currently have a value.
    fn add_variable_names(&self, names: &mut IndexSet<String>);
}

/// File system access for `#include`, `#fsize`, and `#flastmod`.
///
/// `is_virtual` selects between `virtual=` (web path) and `file=` (path
/// relative to the current document) resolution.
pub trait FileResolver {
    /// Resolve a directive path to a readable location.
    fn find_file(&self, path: &str, is_virtual: bool) -> Option<PathBuf>;

    /// Last modification time in epoch milliseconds.
    fn last_modified(&self, path: &str, is_virtual: bool) -> Option<i64>;

    /// File size in bytes.
    fn size(&self, path: &str, is_virtual: bool) -> Option<u64>;

    /// Open a location previously returned by [`find_file`](Self::find_file).
    fn open(&self, file: &Path) -> io::Result<Box<dyn Read + '_>>;
}

/// In-memory [`VariableResolver`] preserving insertion order.
///
/// # Example
///
/// ```
/// use rw_ssi::{MapVariables, VariableResolver};
///
/// let mut vars = MapVariables::new().with_variable("HOST", "example.com");
/// vars.set_variable("PAGE", Some("index"));
/// assert_eq!(vars.variable("HOST").as_deref(), Some("example.com"));
/// vars.set_variable("HOST", None);
/// assert_eq!(vars.variable("HOST"), None);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MapVariables {
    values: IndexMap<String, String>,
}

impl MapVariables {
    /// Create an empty variable map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Number of stored variables, including built-ins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no variables are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapVariables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl VariableResolver for MapVariables {
    fn variable(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn set_variable(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.values.insert(name.to_owned(), value.to_owned());
            }
            None => {
                self.values.shift_remove(name);
            }
        }
    }

    fn add_variable_names(&self, names: &mut IndexSet<String>) {
        names.extend(self.values.keys().cloned());
    }
}
