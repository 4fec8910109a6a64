//! Candidate configuration ordering for a target file
//!
//! The sequence for one file is:
//! 1. explicit overrides, in the order given
//! 2. every other indexed configuration, best match first
//! 3. one synthetic configuration covering only the file
//!
//! Best match compares, in order: canonical `tsconfig.json` name, directory
//! distance (ancestors beat descendants and siblings), shorter directory,
//! then canonical path.

use super::{ConfigFile, ConfigStore};
use crate::paths::CanonicalPath;
use crate::tsconfig::TSCONFIG_JSON;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Finite, single-pass sequence of candidates. Ask the selector again to restart.
#[derive(Debug)]
pub struct Candidates {
    ranked: std::vec::IntoIter<Arc<ConfigFile>>,
    fallback_for: Option<CanonicalPath>,
}

impl Iterator for Candidates {
    type Item = Arc<ConfigFile>;

    fn next(&mut self) -> Option<Self::Item> {
        self.ranked.next().or_else(|| {
            self.fallback_for
                .take()
                .map(|file| Arc::new(ConfigFile::synthetic_for(&file)))
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ranked.len() + usize::from(self.fallback_for.is_some());
        (remaining, Some(remaining))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigSelector;

impl ConfigSelector {
    pub fn new() -> Self {
        Self
    }

    pub fn candidates_for(
        &self,
        store: &mut ConfigStore,
        file: &CanonicalPath,
        overrides: &[CanonicalPath],
    ) -> Candidates {
        let mut yielded = HashSet::new();
        let mut ranked = Vec::new();

        for path in overrides {
            if !yielded.insert(path.clone()) {
                continue;
            }
            match store.load(path) {
                Ok(config) => ranked.push(config),
                Err(e) => warn!("Skipping explicit configuration {path}: {e}"),
            }
        }

        let mut rest: Vec<Arc<ConfigFile>> = store
            .iter()
            .filter(|config| !yielded.contains(&config.path))
            .collect();
        let file_dir = file.parent().unwrap_or_else(|| file.root());
        rest.sort_by(|a, b| compare_candidates(&file_dir, a, b));
        ranked.extend(rest);

        Candidates {
            ranked: ranked.into_iter(),
            fallback_for: Some(file.clone()),
        }
    }
}

/// Ordering of two configurations for a file living in `file_dir`; `Less` means `a` is better.
pub fn compare_candidates(file_dir: &CanonicalPath, a: &ConfigFile, b: &ConfigFile) -> Ordering {
    let canonical = |config: &ConfigFile| config.file_name() != TSCONFIG_JSON;
    let a_dir = a.directory();
    let b_dir = b.directory();

    canonical(a)
        .cmp(&canonical(b))
        .then_with(|| distance(file_dir, &a_dir).cmp(&distance(file_dir, &b_dir)))
        .then_with(|| a_dir.segments().count().cmp(&b_dir.segments().count()))
        .then_with(|| a.path.cmp(&b.path))
}

/// Unshared file-directory segments, doubled, plus one when the config is not an ancestor.
pub fn distance(file_dir: &CanonicalPath, config_dir: &CanonicalPath) -> usize {
    let file_segments: Vec<&str> = file_dir.segments().collect();
    let config_segments: Vec<&str> = config_dir.segments().collect();
    let shared = file_segments
        .iter()
        .zip(&config_segments)
        .take_while(|(a, b)| a == b)
        .count();
    let below_or_aside = usize::from(config_segments.len() > shared);
    2 * (file_segments.len() - shared) + below_or_aside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn store_with(files: &[&str]) -> ConfigStore {
        let fs: MemoryFileSystem = files.iter().map(|path| (*path, "{}")).collect();
        let mut store = ConfigStore::new(Arc::new(fs), vec!["node_modules".to_string()]);
        store.scan(&"/".into()).unwrap();
        store
    }

    fn order(store: &mut ConfigStore, file: &str, overrides: &[&str]) -> Vec<String> {
        let overrides: Vec<CanonicalPath> = overrides.iter().map(|p| CanonicalPath::from(*p)).collect();
        ConfigSelector::new()
            .candidates_for(store, &file.into(), &overrides)
            .map(|config| {
                if config.is_synthetic {
                    "<synthetic>".to_string()
                } else {
                    config.path.to_string()
                }
            })
            .collect()
    }

    #[test]
    fn nearest_ancestor_comes_first() {
        let mut store = store_with(&["/tsconfig.json", "/dir/tsconfig.json"]);
        assert_eq!(
            order(&mut store, "/dir/file.ts", &[]),
            vec!["/dir/tsconfig.json", "/tsconfig.json", "<synthetic>"]
        );
    }

    #[test]
    fn ancestors_beat_descendants_and_siblings() {
        let mut store = store_with(&[
            "/a/b/c/tsconfig.json",
            "/x/tsconfig.json",
            "/a/tsconfig.json",
            "/a/b/tsconfig.json",
            "/tsconfig.json",
        ]);
        assert_eq!(
            order(&mut store, "/a/b/file.ts", &[]),
            vec![
                "/a/b/tsconfig.json",
                "/a/b/c/tsconfig.json",
                "/a/tsconfig.json",
                "/tsconfig.json",
                "/x/tsconfig.json",
                "<synthetic>",
            ]
        );
    }

    #[test]
    fn canonical_name_wins_at_equal_depth() {
        let mut store = store_with(&["/p/tsconfig.app.json", "/p/tsconfig.json"]);
        assert_eq!(
            order(&mut store, "/p/src/main.ts", &[]),
            vec!["/p/tsconfig.json", "/p/tsconfig.app.json", "<synthetic>"]
        );
    }

    #[test]
    fn overrides_come_first_and_bad_ones_are_skipped() {
        let mut store = store_with(&["/p/tsconfig.json", "/p/cfg/tsconfig.custom.json"]);
        assert_eq!(
            order(
                &mut store,
                "/p/main.ts",
                &["/p/cfg/tsconfig.custom.json", "/p/missing.json"]
            ),
            vec!["/p/cfg/tsconfig.custom.json", "/p/tsconfig.json", "<synthetic>"]
        );
    }

    #[test]
    fn empty_store_yields_only_the_synthetic_config() {
        let mut store = ConfigStore::new(Arc::new(MemoryFileSystem::new()), vec![]);
        let candidates: Vec<_> = ConfigSelector::new()
            .candidates_for(&mut store, &"/loose/file.js".into(), &[])
            .collect();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].is_synthetic);
        assert!(candidates[0].contents.contains("/loose/file.js"));
        assert!(store.is_empty());
    }

    #[test]
    fn distance_prefers_ancestors() {
        let file_dir = CanonicalPath::from("/a/b");
        assert_eq!(distance(&file_dir, &"/a/b".into()), 0);
        assert_eq!(distance(&file_dir, &"/a/b/c".into()), 1);
        assert_eq!(distance(&file_dir, &"/a".into()), 2);
        assert_eq!(distance(&file_dir, &"/a/x".into()), 3);
    }
}
