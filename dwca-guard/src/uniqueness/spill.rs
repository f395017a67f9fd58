//! Spill files of the uniqueness evaluator and the line encoding used in them.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// The pair `<uuid>.txt` / `<uuid>_sorted.txt` owned by one evaluator.
///
/// Both files are removed when the guard is dropped, whatever state the
/// evaluator was left in. [`SpillFiles::remove`] does the same eagerly and
/// reports failures.
#[derive(Debug)]
pub struct SpillFiles {
    unsorted: PathBuf,
    sorted: PathBuf,
    removed: bool,
}

impl SpillFiles {
    /// Creates the unsorted spill file in `dir`, failing if it already exists.
    pub fn create(dir: &Path) -> io::Result<(Self, File)> {
        let id = Uuid::new_v4();
        let unsorted = dir.join(format!("{id}.txt"));
        let sorted = dir.join(format!("{id}_sorted.txt"));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&unsorted)?;
        debug!(path = %unsorted.display(), "Created spill file");
        Ok((
            Self {
                unsorted,
                sorted,
                removed: false,
            },
            file,
        ))
    }

    pub fn unsorted(&self) -> &Path {
        &self.unsorted
    }

    pub fn sorted(&self) -> &Path {
        &self.sorted
    }

    /// Deletes both files. Files that were never created are not an error.
    pub fn remove(&mut self) -> io::Result<()> {
        self.removed = true;
        let first = remove_if_exists(&self.unsorted);
        let second = remove_if_exists(&self.sorted);
        first.and(second)
    }
}

impl Drop for SpillFiles {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = self.remove() {
            warn!(
                path = %self.unsorted.display(),
                error = %e,
                "Failed to remove spill files"
            );
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Escapes backslashes and line terminators so a value occupies one line.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape`]. Unknown escape sequences are kept verbatim.
pub fn unescape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
