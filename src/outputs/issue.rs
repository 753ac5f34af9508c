//! Assembly of the dated issue folder.
//!
//! A run writes `sources.txt` to the output root and post artifacts plus
//! images to the work directory. Once the batch is done everything is moved
//! into `{YYYY-MM-DD}_AI_News_Issue/`; if the run fails instead, the files
//! it wrote are removed. [`RunFiles`] keeps track of both.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;

pub const SOURCES_FILE: &str = "sources.txt";

pub fn issue_folder_name(date: NaiveDate) -> String {
    format!("{}_AI_News_Issue", date.format("%Y-%m-%d"))
}

/// Create `{root}/{date}_AI_News_Issue`. Succeeds if it already exists.
#[instrument(level = "info", skip(root, run), fields(root = %root.display()))]
pub async fn create_issue_folder(root: &Path, date: NaiveDate, run: &mut RunFiles) -> Result<PathBuf> {
    let dir = root.join(issue_folder_name(date));
    run.create_dir(&dir).await?;
    info!(path = %dir.display(), "Issue folder ready");
    Ok(dir)
}

/// Write `urls` to `path`, one per line.
#[instrument(level = "info", skip(urls), fields(path = %path.display(), count = urls.len()))]
pub async fn write_sources(path: &Path, urls: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut body = urls.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    fs::write(path, body).await?;
    info!("Saved web sources");
    Ok(())
}

/// Files and directories created by one run.
///
/// Assembly moves the tracked files into the issue folder; a failed run
/// removes them instead. A directory is only ever removed when this run
/// created it and it is empty, so user files sharing a directory with the
/// run's output are never touched.
#[derive(Debug, Default)]
pub struct RunFiles {
    files: Vec<PathBuf>,
    /// Shallowest first, in creation order.
    dirs: Vec<PathBuf>,
}

impl RunFiles {
    pub fn add_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    pub fn add_files<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.add_file(path);
        }
    }

    #[cfg(test)]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Create `dir` and its missing parents, remembering the ones that did
    /// not exist before.
    pub async fn create_dir(&mut self, dir: &Path) -> Result<()> {
        let mut missing = Vec::new();
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() || fs::try_exists(ancestor).await? {
                break;
            }
            missing.push(ancestor.to_path_buf());
        }

        fs::create_dir_all(dir).await?;
        for created in missing.into_iter().rev() {
            debug!(path = %created.display(), "Created directory");
            if !self.dirs.contains(&created) {
                self.dirs.push(created);
            }
        }
        Ok(())
    }

    /// Move every tracked file into `issue_dir` and track it there.
    ///
    /// Returns the number of files moved. Files already gone are logged and
    /// skipped.
    #[instrument(level = "info", skip_all, fields(issue_dir = %issue_dir.display()))]
    pub async fn move_into(&mut self, issue_dir: &Path) -> Result<usize> {
        fs::create_dir_all(issue_dir).await?;
        let mut moved = 0;

        for path in &mut self.files {
            if path.parent() == Some(issue_dir) {
                continue;
            }
            let Some(name) = path.file_name() else {
                continue;
            };
            if !fs::try_exists(&*path).await? {
                warn!(path = %path.display(), "File not found; nothing to move");
                continue;
            }
            let target = issue_dir.join(name);
            move_file(path, &target).await?;
            *path = target;
            moved += 1;
        }

        info!(moved, "Moved files into issue folder");
        Ok(moved)
    }

    /// Remove the directories this run created that are now empty,
    /// deepest first.
    pub async fn prune_empty_dirs(&mut self) {
        let mut kept = Vec::new();
        for dir in self.dirs.drain(..).rev() {
            match fs::remove_dir(&dir).await {
                Ok(()) => debug!(path = %dir.display(), "Removed empty directory"),
                Err(_) => kept.push(dir),
            }
        }
        kept.reverse();
        self.dirs = kept;
    }

    /// Remove every tracked file, then the created directories left empty.
    /// Errors are logged, never returned.
    pub async fn cleanup(mut self) {
        for path in &self.files {
            match fs::remove_file(path).await {
                Ok(()) => info!(path = %path.display(), "Cleaned up intermediate output"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Cleanup failed"),
            }
        }

        self.prune_empty_dirs().await;
        for dir in &self.dirs {
            info!(path = %dir.display(), "Directory left in place; it holds files this run did not write");
        }
    }
}

/// Rename, falling back to copy and delete across filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).await.is_err() {
        fs::copy(from, to).await?;
        fs::remove_file(from).await?;
    }
    Ok(())
}
