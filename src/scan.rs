use anyhow::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

const ARCHIVE_EXTENSIONS: [&str; 2] = ["jar", "zip"];

/// Finds every archive under `base_path`, sorted so root order is stable.
pub fn scan_archives(base_path: &Path) -> Result<Vec<PathBuf>> {
    if !base_path.is_dir() {
        anyhow::bail!("Not a directory: {}", base_path.display());
    }

    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            if let Ok(entry) = entry {
                let path = entry.path();
                if entry.file_type().is_some_and(|t| t.is_file()) && is_archive(path) {
                    let _ = tx.send(path.to_path_buf());
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    let mut archives: Vec<PathBuf> = rx.iter().collect();
    archives.sort();
    Ok(archives)
}

pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ARCHIVE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_path;
    use std::fs;

    #[test]
    fn scan_archives_finds_jars_and_zips_in_sorted_order() -> Result<()> {
        let base = temp_path("scan");
        fs::create_dir_all(base.join("nested/deeper"))?;
        fs::write(base.join("b.jar"), b"x")?;
        fs::write(base.join("a.ZIP"), b"x")?;
        fs::write(base.join("nested/deeper/c.jar"), b"x")?;
        fs::write(base.join("notes.txt"), b"x")?;

        let found = scan_archives(&base)?;
        assert_eq!(
            found,
            vec![
                base.join("a.ZIP"),
                base.join("b.jar"),
                base.join("nested/deeper/c.jar"),
            ]
        );
        fs::remove_dir_all(base)?;
        Ok(())
    }

    #[test]
    fn scan_archives_rejects_missing_directory() {
        assert!(scan_archives(&temp_path("nope")).is_err());
    }
}
