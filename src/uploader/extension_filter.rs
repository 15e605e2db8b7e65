//! File admission by extension.
//!
//! The allow-list is fetched from the backend once per admission batch and
//! wrapped in an [`ExtensionFilter`] for the duration of that batch.

use std::collections::HashSet;

/// Last segment of a path, treating both '/' and '\' as separators.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Substring after the final '.' of the file name, or "" when there is none.
pub fn extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => "",
    }
}

/// Normalise an allow-list entry: strip a leading dot and lowercase.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Decides admission of paths against a set of allowed extensions.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    allowed: HashSet<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = allowed
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { allowed }
    }

    /// Returns true if the extension of `path` is on the allow-list.
    pub fn is_admissible(&self, path: &str) -> bool {
        let ext = extension(path);
        !ext.is_empty() && self.allowed.contains(&ext.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}
