//! Discovery of the source files a run analyzes

use crate::config::AnalysisConfig;
use crate::fs::FileSystem;
use crate::paths::CanonicalPath;
use std::io;

/// Every analyzable file under `base_dir`, sorted.
///
/// Dependency directories are pruned and hidden files skipped. Fails only
/// when `base_dir` itself cannot be walked.
pub fn discover_source_files(
    fs: &dyn FileSystem,
    base_dir: &CanonicalPath,
    config: &AnalysisConfig,
) -> io::Result<Vec<CanonicalPath>> {
    let mut files: Vec<CanonicalPath> = fs
        .walk_files(base_dir, &config.dependency_dirs)?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| !name.starts_with('.') && config.is_analyzed_file_name(name))
        })
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

/// Narrow an explicit file list to analyzable files, in stable order
pub fn select_source_files(
    paths: impl IntoIterator<Item = CanonicalPath>,
    config: &AnalysisConfig,
) -> Vec<CanonicalPath> {
    let mut files: Vec<CanonicalPath> = paths
        .into_iter()
        .filter(|path| path.file_name().is_some_and(|name| config.is_analyzed_file_name(name)))
        .collect();
    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{DiskFileSystem, MemoryFileSystem};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn discovers_sources_and_skips_dependencies() {
        let memory = MemoryFileSystem::new()
            .with_file("/p/src/b.ts", "")
            .with_file("/p/src/a.js", "")
            .with_file("/p/src/.hidden.ts", "")
            .with_file("/p/README.md", "")
            .with_file("/p/tsconfig.json", "{}")
            .with_file("/p/node_modules/dep/index.js", "");

        let files = discover_source_files(&memory, &"/p".into(), &AnalysisConfig::default()).unwrap();
        assert_eq!(
            files,
            vec![CanonicalPath::from("/p/src/a.js"), CanonicalPath::from("/p/src/b.ts")]
        );
    }

    #[test]
    fn missing_base_dir_is_an_error() {
        let memory = MemoryFileSystem::new().with_file("/p/a.ts", "");
        assert!(discover_source_files(&memory, &"/q".into(), &AnalysisConfig::default()).is_err());
    }

    #[test]
    fn explicit_lists_are_filtered_and_sorted() {
        let files = select_source_files(
            ["/p/z.tsx", "/p/tsconfig.json", "/p/a.vue", "/p/z.tsx"]
                .into_iter()
                .map(CanonicalPath::from),
            &AnalysisConfig::default(),
        );
        assert_eq!(
            files,
            vec![CanonicalPath::from("/p/a.vue"), CanonicalPath::from("/p/z.tsx")]
        );
    }

    #[test]
    fn discovers_files_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        fs::write(root.join("src/main.ts"), "export {}").unwrap();
        fs::write(root.join("node_modules/dep/index.js"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let files = discover_source_files(
            &DiskFileSystem::new(),
            &CanonicalPath::new(root),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].as_str().ends_with("src/main.ts"));
    }
}
