//! Text-file tree backend
//!
//! Each tree is `<work_dir>/<name>.txt`, one entry per line. Appends go
//! through a buffered writer under a per-tree lock so concurrent writers
//! never interleave partial lines.
//!
//! Comparison loads only the *other* tree into memory and streams this one,
//! so memory use is bounded by the size of the other tree.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{normalize_entry, validate_name, LineIter, PathIter, TreeError};

/// Directory tree stored as a newline-delimited text file
#[derive(Debug)]
pub struct TextFileTree {
    name: String,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TextFileTree {
    /// Creates a handle for tree `name` inside `dir`, creating `dir` if needed
    ///
    /// Existing content is kept; callers that want a fresh tree call
    /// [`clear`](Self::clear) or write with `append = false`.
    pub fn new(name: &str, dir: &Path) -> Result<Self, TreeError> {
        validate_name(name)?;
        std::fs::create_dir_all(dir).map_err(|source| TreeError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            name: name.to_string(),
            path: dir.join(format!("{name}.txt")),
            write_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> TreeError {
        TreeError::Io {
            path: self.path.clone(),
            source,
        }
    }

    pub fn add_paths<I, S>(&self, paths: I, append: bool) -> Result<u64, TreeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut options = OpenOptions::new();
        if append {
            options.create(true).append(true);
        } else {
            options.create(true).write(true).truncate(true);
        }
        let file = options.open(&self.path).map_err(|e| self.io_error(e))?;
        let mut writer = BufWriter::new(file);

        let mut written = 0u64;
        for raw in paths {
            if let Some(entry) = normalize_entry(raw.as_ref()) {
                writeln!(writer, "{entry}").map_err(|e| self.io_error(e))?;
                written += 1;
            }
        }
        writer.flush().map_err(|e| self.io_error(e))?;

        tracing::trace!(tree = %self.name, written, append, "Appended tree entries");
        Ok(written)
    }

    /// Streams stored entries in insertion order
    ///
    /// A tree that was never written reads as empty.
    pub fn entries(&self) -> Result<PathIter<'static>, TreeError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Box::new(std::iter::empty())),
            Err(e) => return Err(self.io_error(e)),
        };

        let path = self.path.clone();
        let lines = BufReader::new(file).lines().filter_map(move |line| match line {
            Ok(line) => {
                let entry = line.trim();
                (!entry.is_empty()).then(|| Ok(entry.to_string()))
            }
            Err(source) => Some(Err(TreeError::Io {
                path: path.clone(),
                source,
            })),
        });
        Ok(Box::new(lines))
    }

    fn load_set(&self) -> Result<HashSet<String>, TreeError> {
        self.entries()?.collect()
    }

    pub fn compare<'a>(&'a self, other: &'a TextFileTree) -> Result<PathIter<'a>, TreeError> {
        let other_set = other.load_set()?;
        let mut reported = HashSet::new();
        let diff = self.entries()?.filter(move |entry| match entry {
            Ok(entry) => !other_set.contains(entry) && reported.insert(entry.clone()),
            Err(_) => true,
        });
        Ok(Box::new(diff))
    }

    pub fn compare_lines<'a>(&'a self, other: &'a TextFileTree) -> Result<LineIter<'a>, TreeError> {
        let other_set = other.load_set()?;
        let lines = self
            .entries()?
            .zip(1u64..)
            .filter_map(move |(entry, line)| match entry {
                Ok(entry) => (!other_set.contains(&entry)).then_some(Ok(line)),
                Err(e) => Some(Err(e)),
            });
        Ok(Box::new(lines))
    }

    pub fn get_by_line(&self, n: u64) -> Result<Option<String>, TreeError> {
        if n == 0 {
            return Ok(None);
        }
        let skip = usize::try_from(n - 1).unwrap_or(usize::MAX);
        self.entries()?.nth(skip).transpose()
    }

    pub fn count(&self) -> Result<u64, TreeError> {
        let mut count = 0u64;
        for entry in self.entries()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    pub fn clear(&self) -> Result<(), TreeError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
