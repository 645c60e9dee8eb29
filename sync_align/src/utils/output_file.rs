use std::{
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

///
/// Write a file through a temporary file in the same directory
///
/// The target only appears (or is replaced) once `write` succeeded, so a failure never leaves a truncated file behind.
///
pub fn write_file_atomically<P, F>(path: P, write: F) -> crate::Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> crate::Result<()>,
{
    stage_file(path, write)?.persist()
}

/// Fully written temporary file waiting to be moved to its target path
#[derive(Debug)]
pub struct StagedFile {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    /// Move the temporary file to its target path
    pub fn persist(self) -> crate::Result<()> {
        self.tmp.persist(&self.path)?;
        Ok(())
    }
}

///
/// Write a file to a temporary file next to `path` without creating `path` yet
///
/// Dropping the returned [`StagedFile`] discards the temporary file.
///
pub fn stage_file<P, F>(path: P, write: F) -> crate::Result<StagedFile>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> crate::Result<()>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    Ok(StagedFile {
        tmp,
        path: path.to_path_buf(),
    })
}

///
/// Persist a group of staged files
///
/// If one of them cannot be persisted, the ones already moved into place are removed again.
///
pub fn persist_all(files: Vec<StagedFile>) -> crate::Result<()> {
    let mut persisted: Vec<PathBuf> = Vec::with_capacity(files.len());
    for file in files {
        let path = file.path.clone();
        if let Err(e) = file.persist() {
            for done in &persisted {
                if let Err(remove_err) = std::fs::remove_file(done) {
                    tracing::warn!("Could not remove {}: {remove_err}", done.display());
                }
            }
            return Err(e);
        }
        persisted.push(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlignError;

    #[test]
    fn failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let res = write_file_atomically(&target, |w| {
            w.write_all(b"partial")?;
            Err(AlignError::Usage("abort".into()))
        });
        assert!(res.is_err());
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_group_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let blocked = dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("inner"), "x").unwrap();

        let files = vec![
            stage_file(&first, |w| Ok(w.write_all(b"one")?)).unwrap(),
            stage_file(&blocked, |w| Ok(w.write_all(b"two")?)).unwrap(),
        ];
        assert!(!first.exists());
        assert!(persist_all(files).is_err());
        assert!(!first.exists());
        assert!(blocked.is_dir());
        // only the blocking directory is left
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn successful_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        write_file_atomically(&target, |w| Ok(w.write_all(b"done")?)).unwrap();
        assert_eq!(std::fs::read_to_string(target).unwrap(), "done");
    }
}
