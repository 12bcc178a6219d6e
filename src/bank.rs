use crate::question::{QuestionSet, Violation};
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything that can go wrong while reading or writing a bank file.
#[derive(Debug)]
pub enum BankError {
    /// The file is not valid JSON, or its shape does not match the schema.
    MalformedData(serde_json::Error),
    /// The data parsed but failed a strict check.
    SchemaViolation(Vec<Violation>),
    Io(io::Error),
    /// Another maintenance run holds the advisory lock for this path.
    Locked(PathBuf),
}

impl fmt::Display for BankError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankError::MalformedData(e) => write!(f, "malformed question data: {e}"),
            BankError::SchemaViolation(violations) => {
                write!(f, "schema violations: ")?;
                for (i, violation) in violations.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{violation}")?;
                }
                Ok(())
            }
            BankError::Io(e) => write!(f, "{e}"),
            BankError::Locked(path) => {
                write!(f, "another maintenance run holds the lock at {}", path.display())
            }
        }
    }
}

impl std::error::Error for BankError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BankError::MalformedData(e) => Some(e),
            BankError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BankError {
    fn from(e: io::Error) -> Self {
        BankError::Io(e)
    }
}

impl From<serde_json::Error> for BankError {
    fn from(e: serde_json::Error) -> Self {
        BankError::MalformedData(e)
    }
}

/// Read and parse a bank file.
pub fn load(path: &Path) -> Result<QuestionSet, BankError> {
    let mut file = File::open(path)?;
    let mut json_string = String::new();
    file.read_to_string(&mut json_string)?;
    let set = serde_json::from_str(&json_string)?;
    Ok(set)
}

/// Write the set back atomically: serialize into a sibling temp file, sync
/// it, then rename over the destination. A failed save leaves the
/// destination unchanged.
pub fn save(set: &QuestionSet, path: &Path) -> Result<(), BankError> {
    let mut serialized = serde_json::to_string_pretty(set)?;
    serialized.push('\n');
    let tmp = sibling(path, ".tmp");
    write_and_sync(&tmp, serialized.as_bytes())?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<(), BankError> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("bank"));
    name.push(suffix);
    path.with_file_name(name)
}

/// Advisory lock for one bank path, held for the duration of a
/// read-modify-write cycle. Dropping the guard releases the lock.
#[derive(Debug)]
pub struct BankLock {
    lock_path: PathBuf,
}

impl BankLock {
    pub fn acquire(path: &Path) -> Result<BankLock, BankError> {
        let lock_path = sibling(path, ".lock");
        match OpenOptions::new().create_new(true).write(true).open(&lock_path) {
            Ok(_) => {
                debug!("Acquired lock at {}", lock_path.display());
                Ok(BankLock { lock_path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(BankError::Locked(lock_path))
            }
            Err(e) => Err(BankError::Io(e)),
        }
    }
}

impl Drop for BankLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// Run one locked read-modify-write cycle against a bank file. The closure
/// sees the freshly loaded set; if it returns an error nothing is written
/// and the file keeps its previous contents.
pub fn update<T>(
    path: &Path,
    op: impl FnOnce(&mut QuestionSet) -> Result<T, BankError>,
) -> Result<T, BankError> {
    let _lock = BankLock::acquire(path)?;
    let mut set = load(path)?;
    let value = op(&mut set)?;
    save(&set, path)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::{Difficulty, Question};
    use std::fs;
    use tempfile::tempdir;

    fn sample_set() -> QuestionSet {
        let mut set = QuestionSet::default();
        set.hard.push(Question {
            id: 1,
            text: "Which council condemned Monothelitism?".to_string(),
            options: vec![
                "Third Constantinople".to_string(),
                "Second Nicaea".to_string(),
            ],
            answer: "Third Constantinople".to_string(),
            council: "Constantinople III".to_string(),
            heresy_points: 2.5,
            time_limit: Some(20),
        });
        set.extra
            .insert("councils".to_string(), serde_json::json!(["Nicaea"]));
        set
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("questions.json");
        let set = sample_set();

        save(&set, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, set);
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("questions.json");

        save(&sample_set(), &path).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("questions.json.tmp").exists());
    }

    #[test]
    fn load_missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, BankError::Io(_)));
    }

    #[test]
    fn load_rejects_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, BankError::MalformedData(_)));
    }

    #[test]
    fn load_rejects_the_wrong_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, BankError::MalformedData(_)));
    }

    #[test]
    fn load_rejects_a_question_missing_required_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(
            &path,
            r#"{"easy": [{"id": 1, "text": "incomplete"}], "medium": [], "hard": []}"#,
        )
        .unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, BankError::MalformedData(_)));
    }

    #[test]
    fn second_lock_on_the_same_path_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("questions.json");

        let held = BankLock::acquire(&path).unwrap();
        let err = BankLock::acquire(&path).unwrap_err();
        assert!(matches!(err, BankError::Locked(_)));

        drop(held);
        BankLock::acquire(&path).unwrap();
    }

    #[test]
    fn dropping_the_lock_removes_the_lock_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("questions.json");

        let lock = BankLock::acquire(&path).unwrap();
        assert!(dir.path().join("questions.json.lock").exists());
        drop(lock);
        assert!(!dir.path().join("questions.json.lock").exists());
    }

    #[test]
    fn update_applies_the_change_under_a_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("questions.json");
        save(&sample_set(), &path).unwrap();

        let filled = update(&path, |set| {
            set.hard[0].time_limit = None;
            Ok(set.hard.len())
        })
        .unwrap();

        assert_eq!(filled, 1);
        assert_eq!(load(&path).unwrap().hard[0].time_limit, None);
        assert!(!dir.path().join("questions.json.lock").exists());
    }

    #[test]
    fn update_keeps_the_file_untouched_when_the_op_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("questions.json");
        save(&sample_set(), &path).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let result: Result<(), BankError> = update(&path, |set| {
            set.hard.clear();
            Err(BankError::SchemaViolation(vec![Violation::DuplicateId {
                difficulty: Difficulty::Hard,
                id: 1,
            }]))
        });

        assert!(matches!(result, Err(BankError::SchemaViolation(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert!(!dir.path().join("questions.json.lock").exists());
    }

    #[test]
    fn update_is_refused_while_another_lock_is_held() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("questions.json");
        save(&sample_set(), &path).unwrap();

        let _held = BankLock::acquire(&path).unwrap();
        let result = update(&path, |_| Ok(()));
        assert!(matches!(result, Err(BankError::Locked(_))));
    }
}
