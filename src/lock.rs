use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::GconError;
use crate::store::write_bytes_atomic;

const LOCK_CONTENT: &str = "1";

/// Marks a pipeline step as finished for one output directory.
#[derive(Debug, Clone)]
pub struct StepLock {
    base_dir: Utf8PathBuf,
    step: String,
}

impl StepLock {
    pub fn new(base_dir: impl Into<Utf8PathBuf>, step: &str) -> Self {
        Self {
            base_dir: base_dir.into(),
            step: slugify(step),
        }
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    /// `<base_dir>/finished-<step>.lock`
    pub fn path(&self) -> Utf8PathBuf {
        self.base_dir.join(format!("finished-{}.lock", self.step))
    }

    pub fn has_lock(&self) -> bool {
        if !self.base_dir.is_dir() {
            return false;
        }
        fs::read_to_string(self.path().as_std_path())
            .map(|content| content.trim() == LOCK_CONTENT)
            .unwrap_or(false)
    }

    pub fn lock(&self) -> Result<(), GconError> {
        if !self.base_dir.is_dir() {
            return Err(GconError::InvalidDirectory(
                self.base_dir.clone().into_std_path_buf(),
            ));
        }
        write_bytes_atomic(&self.path(), LOCK_CONTENT.as_bytes())
    }

    pub fn base_dir(&self) -> &Utf8Path {
        &self.base_dir
    }
}

/// Lower-cases `text` and collapses every run of non-alphanumeric
/// characters into a single `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_separator {
                slug.push('-');
                pending_separator = false;
            }
            slug.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    if pending_separator {
        slug.push('-');
    }
    slug
}
