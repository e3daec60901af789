//! JSONL journal of iteration records.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;

use super::IterationRecord;
use crate::error::{Error, Result};

/// Appends every [`IterationRecord`] as one JSON line to a file.
///
/// Writes hold an in-process mutex and an exclusive file lock, so several
/// optimizers (or processes) can share one journal.
///
/// # Examples
///
/// ```no_run
/// use acq_ensemble::driver::IterationJournal;
///
/// let journal = IterationJournal::new("run.jsonl");
/// for record in IterationJournal::load("run.jsonl").unwrap() {
///     println!("{} {:?}", record.iteration, record.best_y);
/// }
/// # drop(journal);
/// ```
#[derive(Debug)]
pub struct IterationJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl IterationJournal {
    /// A journal writing to `path`. The file is created on the first write.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// The journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Journal`] if the file cannot be opened, locked or
    /// written.
    pub fn append(&self, record: &IterationRecord) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::Journal(e.to_string()))?;
        file.lock_exclusive()
            .map_err(|e| Error::Journal(e.to_string()))?;

        let line = serde_json::to_string(record).map_err(|e| Error::Journal(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| Error::Journal(e.to_string()))?;
        file.flush().map_err(|e| Error::Journal(e.to_string()))?;

        file.unlock().map_err(|e| Error::Journal(e.to_string()))?;
        Ok(())
    }

    /// Read every record of a journal file. A missing file holds no records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Journal`] if the file exists but cannot be read or a
    /// line does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<IterationRecord>> {
        let file = match File::open(path.as_ref()) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Journal(e.to_string())),
        };
        file.lock_shared().map_err(|e| Error::Journal(e.to_string()))?;

        let mut records = Vec::new();
        for line in BufReader::new(&file).lines() {
            let line = line.map_err(|e| Error::Journal(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line).map_err(|e| Error::Journal(e.to_string()))?);
        }

        file.unlock().map_err(|e| Error::Journal(e.to_string()))?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Branch;

    fn record(iteration: usize) -> IterationRecord {
        IterationRecord {
            iteration,
            branch: Branch::Exploitation,
            points: Vec::new(),
            kappa: 1.5,
            best_y: vec![0.25],
            no_improve_counter: 0,
            eval_counter: 10 + iteration,
        }
    }

    #[test]
    fn appended_records_load_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let journal = IterationJournal::new(&path);
        journal.append(&record(0)).unwrap();
        journal.append(&record(1)).unwrap();

        let loaded = IterationJournal::load(&path).unwrap();
        assert_eq!(loaded, vec![record(0), record(1)]);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(IterationJournal::load(dir.path().join("none.jsonl")).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "not json\n").unwrap();
        assert!(matches!(IterationJournal::load(&path), Err(Error::Journal(_))));
    }
}
