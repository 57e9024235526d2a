//! Append only record of what the pipeline has broadcast and confirmed.
//!
//! One JSON line per event, written at broadcast time and again at
//! confirmation. A rerun replays the file and skips every step that already
//! confirmed, so a crash mid-sequence resumes from the first unfinished step
//! instead of blindly restarting.

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    io::Write as _,
    path::{Path, PathBuf},
};

/// Errors for this module.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// journal file io error
    #[error("journal io error: {0}")]
    Io(#[from] std::io::Error),
    /// a journal line could not be parsed
    #[error("corrupt journal line {line}: {source}")]
    Corrupt {
        /// 1 based line number
        line: usize,
        /// underlying parse error
        source: serde_json::Error,
    },
    /// a journal entry could not be serialized
    #[error("error serializing journal entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A pipeline step tracked by the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "step", content = "index", rename_all = "snake_case")]
pub enum Step {
    /// Submission of the data chunk at this position, 0 based.
    Chunk(usize),
    /// The auxiliary message send.
    Message,
    /// The finalization call.
    Finalize,
}

/// Lifecycle of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The transaction was handed to the network.
    Broadcast,
    /// The transaction was mined with the required confirmations.
    Confirmed,
}

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// The step this entry belongs to.
    #[serde(flatten)]
    pub step: Step,
    /// Nonce the step's transaction was built with.
    pub nonce: u64,
    /// Hash of the step's transaction.
    pub tx_hash: B256,
    /// Where the step got to.
    pub status: Status,
}

/// Append only journal, replayed on startup.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    confirmed: HashSet<Step>,
}

impl Journal {
    /// Open the journal at `path`, replaying any existing entries.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut confirmed = HashSet::new();
        if path.exists() {
            let raw = fs::read_to_string(path)?;
            for (number, line) in raw.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: Entry = serde_json::from_str(line)
                    .map_err(|source| Error::Corrupt { line: number + 1, source })?;
                if entry.status == Status::Confirmed {
                    confirmed.insert(entry.step);
                }
            }
        }
        Ok(Self { path: path.to_path_buf(), confirmed })
    }

    /// Whether `step` confirmed in this or a previous run.
    pub fn is_confirmed(&self, step: Step) -> bool {
        self.confirmed.contains(&step)
    }

    /// Append `entry` and flush it to disk.
    pub fn record(&mut self, entry: &Entry) -> Result<(), Error> {
        let line = serde_json::to_string(entry)?;
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;

        if entry.status == Status::Confirmed {
            self.confirmed.insert(entry.step);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Entry, Journal, Status, Step};
    use alloy::primitives::B256;

    fn entry(step: Step, nonce: u64, status: Status) -> Entry {
        Entry { step, nonce, tx_hash: B256::repeat_byte(nonce as u8), status }
    }

    #[test]
    fn replay_skips_confirmed_steps_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        {
            let mut journal = Journal::open(&path).unwrap();
            journal.record(&entry(Step::Chunk(0), 5, Status::Broadcast)).unwrap();
            journal.record(&entry(Step::Chunk(0), 5, Status::Confirmed)).unwrap();
            journal.record(&entry(Step::Chunk(1), 6, Status::Broadcast)).unwrap();
        }

        let journal = Journal::open(&path).unwrap();
        assert!(journal.is_confirmed(Step::Chunk(0)));
        assert!(!journal.is_confirmed(Step::Chunk(1)));
        assert!(!journal.is_confirmed(Step::Finalize));
    }

    #[test]
    fn message_and_finalize_steps_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        let mut journal = Journal::open(&path).unwrap();
        journal.record(&entry(Step::Message, 7, Status::Confirmed)).unwrap();
        journal.record(&entry(Step::Finalize, 8, Status::Confirmed)).unwrap();

        let journal = Journal::open(&path).unwrap();
        assert!(journal.is_confirmed(Step::Message));
        assert!(journal.is_confirmed(Step::Finalize));
    }

    #[test]
    fn corrupt_lines_are_reported_with_their_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        let mut journal = Journal::open(&path).unwrap();
        journal.record(&entry(Step::Chunk(0), 5, Status::Confirmed)).unwrap();
        std::fs::write(
            &path,
            format!("{}\nnot json\n", std::fs::read_to_string(&path).unwrap().trim()),
        )
        .unwrap();

        let err = Journal::open(&path).unwrap_err();
        assert!(matches!(err, super::Error::Corrupt { line: 2, .. }));
    }

    #[test]
    fn missing_file_is_an_empty_journal() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(&dir.path().join("missing.jsonl")).unwrap();
        assert!(!journal.is_confirmed(Step::Chunk(0)));
    }
}
