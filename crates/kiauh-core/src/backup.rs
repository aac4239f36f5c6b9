use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use ignore::WalkBuilder;
use log::info;

use crate::error::{Error, Result};

/// Timestamped copies of files and directory trees below a backup root.
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
    ignore_folders: Vec<String>,
}

impl BackupManager {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ignore_folders: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries with one of these file names are left out of directory backups.
    pub fn with_ignore_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_folders = folders.into_iter().map(Into::into).collect();
        self
    }

    /// Copy `file` to `<target>/<stem>-<date>-<time><ext>`. Returns `None` when there is
    /// nothing to back up.
    pub fn backup_file(
        &self,
        file: &Path,
        target: Option<&Path>,
        custom_filename: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        info!("Creating backup of {} ...", file.display());
        if !file.is_file() {
            info!("File '{}' not found. Skipping ...", file.display());
            return Ok(None);
        }
        let target = target.unwrap_or(&self.root);
        let filename = match custom_filename {
            Some(name) => name.to_string(),
            None => {
                let stem = file.file_stem().unwrap_or_default().to_string_lossy();
                let ext = file
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default();
                format!("{stem}-{}{ext}", timestamp())
            }
        };
        fs::create_dir_all(target)
            .map_err(|e| Error::io(format!("unable to create {}", target.display()), e))?;
        let dest = target.join(filename);
        fs::copy(file, &dest)
            .map_err(|e| Error::io(format!("unable to backup '{}'", file.display()), e))?;
        info!("Backup successful!");
        Ok(Some(dest))
    }

    /// Copy the tree at `source` to `<target>/<name>-<date>-<time>`.
    pub fn backup_directory(
        &self,
        name: &str,
        source: &Path,
        target: Option<&Path>,
    ) -> Result<Option<PathBuf>> {
        let target = target.unwrap_or(&self.root);
        info!("Creating backup of {name} in {} ...", target.display());
        if !source.is_dir() {
            info!("Source directory does not exist! Skipping ...");
            return Ok(None);
        }
        let dest = target.join(format!("{}-{}", name.to_lowercase(), timestamp()));
        self.copy_tree(source, &dest)
            .map_err(|e| match e {
                Error::Io { context, source: err } => Error::io(
                    format!("unable to backup directory '{}': {context}", source.display()),
                    err,
                ),
                other => other,
            })?;
        info!("Backup successful!");
        Ok(Some(dest))
    }

    fn copy_tree(&self, source: &Path, dest: &Path) -> Result<()> {
        let ignored = self.ignore_folders.clone();
        let walker = WalkBuilder::new(source)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || !ignored
                        .iter()
                        .any(|name| entry.file_name().to_string_lossy() == name.as_str())
            })
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| {
                Error::io("walk failed", std::io::Error::new(std::io::ErrorKind::Other, e))
            })?;
            let rel = entry.path().strip_prefix(source).unwrap_or(entry.path());
            let out = dest.join(rel);
            let file_type = entry.file_type();
            if file_type.is_some_and(|t| t.is_dir()) {
                fs::create_dir_all(&out)
                    .map_err(|e| Error::io(format!("unable to create {}", out.display()), e))?;
            } else if file_type.is_some_and(|t| t.is_symlink()) {
                copy_symlink(entry.path(), &out)?;
            } else {
                fs::copy(entry.path(), &out).map_err(|e| {
                    Error::io(format!("unable to copy {}", entry.path().display()), e)
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn copy_symlink(link: &Path, out: &Path) -> Result<()> {
    let target = fs::read_link(link)
        .map_err(|e| Error::io(format!("unable to read link {}", link.display()), e))?;
    std::os::unix::fs::symlink(&target, out)
        .map_err(|e| Error::io(format!("unable to create link {}", out.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, out: &Path) -> Result<()> {
    fs::copy(link, out)
        .map(|_| ())
        .map_err(|e| Error::io(format!("unable to copy {}", link.display()), e))
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sources_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let bm = BackupManager::new(&tmp.path().join("backups"));
        assert!(bm
            .backup_file(&tmp.path().join("nope.cfg"), None, None)
            .unwrap()
            .is_none());
        assert!(bm
            .backup_directory("nope", &tmp.path().join("nope"), None)
            .unwrap()
            .is_none());
        assert!(!bm.root().exists());
    }

    #[test]
    fn file_backup_uses_timestamped_name() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("printer.cfg");
        fs::write(&file, "[mcu]\n").unwrap();
        let bm = BackupManager::new(&tmp.path().join("backups"));

        let dest = bm.backup_file(&file, None, None).unwrap().unwrap();
        let name = dest.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("printer-"), "{name}");
        assert!(name.ends_with(".cfg"), "{name}");
        assert_eq!(fs::read_to_string(dest).unwrap(), "[mcu]\n");

        let custom = bm.backup_file(&file, None, Some("printer.bak")).unwrap().unwrap();
        assert_eq!(custom, tmp.path().join("backups").join("printer.bak"));
    }
}
