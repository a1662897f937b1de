//! Name index over the loaders of a classpath.
//!
//! Each loader contributes a [`LoaderData`] built once at registration. The
//! merged [`ClasspathCache`] answers which loaders may hold a name. Answers
//! over-approximate: a loader is never omitted if it can serve a name, and
//! loaders without index data are candidates for everything.

use std::collections::{BTreeSet, HashMap, HashSet};

/// Names and packages seen in one root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderData {
    names: HashSet<String>,
    packages: HashSet<String>,
}

impl LoaderData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the package the entry lives in. Directory entries also
    /// record themselves as a package.
    pub fn add_resource_entry(&mut self, name: &str) {
        let name = normalize_name(name);
        if name.is_empty() {
            return;
        }
        self.packages.insert(package_of(name).to_string());
        if let Some(dir) = name.strip_suffix('/') {
            self.packages.insert(dir.to_string());
        }
    }

    pub fn add_name_entry(&mut self, name: &str) {
        let name = normalize_name(name);
        if name.is_empty() {
            return;
        }
        self.names.insert(name.trim_end_matches('/').to_string());
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names
            .contains(normalize_name(name).trim_end_matches('/'))
    }

    pub fn contains_package(&self, package: &str) -> bool {
        self.packages.contains(package.trim_matches('/'))
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }
}

#[derive(Debug, Default)]
pub struct ClasspathCache {
    names: HashMap<String, Vec<usize>>,
    packages: HashMap<String, Vec<usize>>,
    unindexed: BTreeSet<usize>,
}

impl ClasspathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one loader's data into the shared index.
    pub fn merge(&mut self, loader_index: usize, data: LoaderData) {
        self.unindexed.remove(&loader_index);
        for name in data.names {
            insert_sorted(self.names.entry(name).or_default(), loader_index);
        }
        for package in data.packages {
            insert_sorted(self.packages.entry(package).or_default(), loader_index);
        }
    }

    /// Marks a loader whose data could not be built. It stays a candidate for every lookup.
    pub fn mark_unindexed(&mut self, loader_index: usize) {
        self.unindexed.insert(loader_index);
    }

    pub fn is_unindexed(&self, loader_index: usize) -> bool {
        self.unindexed.contains(&loader_index)
    }

    /// Ascending indices of loaders that may contain `name`.
    pub fn candidate_loaders(&self, name: &str) -> Vec<usize> {
        let key = normalize_name(name).trim_end_matches('/');
        let known = self.names.get(key).map(Vec::as_slice).unwrap_or(&[]);
        self.with_unindexed(known)
    }

    /// Ascending indices of loaders that hold at least one entry in `package`.
    pub fn candidate_loaders_for_package(&self, package: &str) -> Vec<usize> {
        let known = self
            .packages
            .get(package.trim_matches('/'))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        self.with_unindexed(known)
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    fn with_unindexed(&self, known: &[usize]) -> Vec<usize> {
        if self.unindexed.is_empty() {
            return known.to_vec();
        }
        let mut merged: BTreeSet<usize> = known.iter().copied().collect();
        merged.extend(self.unindexed.iter().copied());
        merged.into_iter().collect()
    }
}

fn insert_sorted(indices: &mut Vec<usize>, value: usize) {
    if let Err(pos) = indices.binary_search(&value) {
        indices.insert(pos, value);
    }
}

pub fn normalize_name(name: &str) -> &str {
    name.trim_start_matches('/')
}

/// `pkg/sub/A.class` -> `pkg/sub`, `A.class` -> `` (the root package).
pub fn package_of(name: &str) -> &str {
    let trimmed = name.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}
