use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookFile {
    pub path: PathBuf,
    pub size: u64,
    pub extension: String,
}

pub struct WorkbookDiscovery {
    extensions: Vec<String>,
    max_file_size: u64,
}

impl WorkbookDiscovery {
    pub fn new(extensions: Vec<String>, max_file_size: u64) -> Self {
        Self {
            extensions: extensions.into_iter().map(|e| e.to_lowercase()).collect(),
            max_file_size,
        }
    }

    /// A single file is returned as-is when it has a workbook extension; a
    /// directory is walked recursively.
    pub fn discover(&self, target: &Path) -> crate::Result<Vec<WorkbookFile>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(target).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();

            if !entry.file_type().is_file() || self.should_ignore_file(path) {
                continue;
            }

            if let Some(file) = self.process_file(path)? {
                files.push(file);
            }
        }

        Ok(files)
    }

    fn should_ignore_file(&self, path: &Path) -> bool {
        // Lock files Excel leaves next to open workbooks.
        path.file_name()
            .map(|name| name.to_string_lossy().starts_with("~$"))
            .unwrap_or(true)
    }

    fn process_file(&self, path: &Path) -> crate::Result<Option<WorkbookFile>> {
        let extension = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => return Ok(None),
        };

        if !self.extensions.contains(&extension) {
            return Ok(None);
        }

        let size = std::fs::metadata(path)?.len();
        if size > self.max_file_size {
            tracing::warn!(path = %path.display(), size, "skipping oversized workbook");
            return Ok(None);
        }

        Ok(Some(WorkbookFile {
            path: path.to_path_buf(),
            size,
            extension,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn discovery() -> WorkbookDiscovery {
        WorkbookDiscovery::new(vec!["xlsx".into(), "XLSM".into()], 1024)
    }

    #[test]
    fn finds_workbooks_recursively_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("model.xlsx"), b"x").unwrap();
        fs::write(dir.path().join("nested/macro.XLSM"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("~$model.xlsx"), b"x").unwrap();

        let found = discovery().discover(dir.path()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["model.xlsx", "macro.XLSM"]);
        assert_eq!(found[1].extension, "xlsm");
    }

    #[test]
    fn oversized_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.xlsx"), vec![0u8; 2048]).unwrap();
        assert!(discovery().discover(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn single_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.xlsx");
        fs::write(&path, b"x").unwrap();
        let found = discovery().discover(&path).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, path);
    }
}
