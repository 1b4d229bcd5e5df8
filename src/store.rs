use std::fs::{self, File};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::SyncError;

/// The `cycle-{N}` output directory of a fetch run.
#[derive(Debug, Clone)]
pub struct CycleDir {
    path: Utf8PathBuf,
}

impl CycleDir {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn file_path(&self, file_name: &str) -> Utf8PathBuf {
        self.path.join(file_name)
    }

    /// Fails when the directory already holds files and reuse was not
    /// allowed. A missing or empty directory is always accepted.
    pub fn check_reusable(&self, allow_existing: bool) -> Result<(), SyncError> {
        if !self.path.as_std_path().is_dir() || allow_existing {
            return Ok(());
        }
        let mut entries = fs::read_dir(self.path.as_std_path())
            .map_err(|err| SyncError::Filesystem(format!("read {}: {err}", self.path)))?;
        if entries.next().is_some() {
            return Err(SyncError::DirectoryNotEmpty(self.path.clone()));
        }
        Ok(())
    }

    pub fn ensure(&self) -> Result<(), SyncError> {
        fs::create_dir_all(self.path.as_std_path())
            .map_err(|err| SyncError::Filesystem(format!("create {}: {err}", self.path)))
    }
}

/// Writes `dest` through a sibling `.tmp` file that is renamed into place only
/// once `fill` succeeded and produced at least one byte.
pub fn write_file_atomic<F>(dest: &Utf8Path, fill: F) -> Result<u64, SyncError>
where
    F: FnOnce(&mut dyn Write) -> Result<u64, SyncError>,
{
    let tmp_path = tmp_path_for(dest);
    let result = fill_tmp(&tmp_path, fill).and_then(|written| {
        if written == 0 {
            return Err(SyncError::EmptyDownload(dest.to_path_buf()));
        }
        fs::rename(tmp_path.as_std_path(), dest.as_std_path())
            .map_err(|err| SyncError::Filesystem(format!("rename {tmp_path}: {err}")))?;
        Ok(written)
    });
    if result.is_err() {
        let _ = fs::remove_file(tmp_path.as_std_path());
    }
    result
}

/// Replaces the contents of an existing file, keeping its permissions. A
/// symlinked path is resolved first so the link target is the file updated.
pub fn replace_file_contents(path: &Utf8Path, content: &str) -> Result<(), SyncError> {
    let resolved = fs::canonicalize(path.as_std_path())
        .map_err(|err| SyncError::Filesystem(format!("resolve {path}: {err}")))?;
    let path = Utf8PathBuf::from_path_buf(resolved)
        .map_err(|resolved| SyncError::Filesystem(format!("non-utf8 path {}", resolved.display())))?;
    let path = path.as_path();
    let permissions = fs::metadata(path.as_std_path())
        .map_err(|err| SyncError::Filesystem(format!("stat {path}: {err}")))?
        .permissions();
    let tmp_path = tmp_path_for(path);
    let result = fs::write(tmp_path.as_std_path(), content)
        .and_then(|_| fs::set_permissions(tmp_path.as_std_path(), permissions))
        .and_then(|_| fs::rename(tmp_path.as_std_path(), path.as_std_path()))
        .map_err(|err| SyncError::Filesystem(format!("write {path}: {err}")));
    if result.is_err() {
        let _ = fs::remove_file(tmp_path.as_std_path());
    }
    result
}

fn fill_tmp<F>(tmp_path: &Utf8Path, fill: F) -> Result<u64, SyncError>
where
    F: FnOnce(&mut dyn Write) -> Result<u64, SyncError>,
{
    let file = File::create(tmp_path.as_std_path())
        .map_err(|err| SyncError::Filesystem(format!("create {tmp_path}: {err}")))?;
    let mut writer = BufWriter::new(file);
    let written = fill(&mut writer)?;
    let file = writer
        .into_inner()
        .map_err(|err| SyncError::Filesystem(format!("write {tmp_path}: {}", err.error())))?;
    file.sync_all()
        .map_err(|err| SyncError::Filesystem(format!("sync {tmp_path}: {err}")))?;
    Ok(written)
}

fn tmp_path_for(path: &Utf8Path) -> Utf8PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_string();
    name.push_str(".tmp");
    path.with_file_name(name)
}
