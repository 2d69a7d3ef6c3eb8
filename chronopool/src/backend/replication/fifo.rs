//! Durable on-disk queue of pending replication packets (spec §4.5, §6).
//!
//! Every local mutation that affects series data is pushed here before
//! the Replicator ships it downstream; a record is only removed once the
//! peer has durably accepted it (`commit`) or has been given up on
//! (`commit_err`) — never on a bare send attempt, which is what makes
//! §8 invariant 4 ("a committed offset never regresses") hold across a
//! crash between send and response.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use parking_lot::Mutex;

use super::error::Error;

struct Record {
    seq: u64,
    body: Vec<u8>,
}

struct State {
    queue: VecDeque<Record>,
    next_seq: u64,
    committed: usize,
    committed_err: usize,
    pushed: usize,
}

/// A FIFO-ordered, crash-durable queue backed by a single log file.
///
/// Records are framed as `{seq: u64, len: u32, body}` (spec §6). Commit
/// is implemented by rewriting the remaining tail to disk — simpler than
/// true log segmentation and sufficient at the volumes a per-pool
/// replication stream sees; see `DESIGN.md` for the tradeoff.
pub struct Fifo {
    path: PathBuf,
    state: Mutex<State>,
}

impl Fifo {
    /// Open (or create) the FIFO log at `path`, replaying any records left
    /// over from a previous run.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_owned();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Io(path.clone(), e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::Io(path.clone(), e))?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| Error::Io(path.clone(), e))?;

        let queue = decode_records(&bytes, &path)?;
        let next_seq = queue.back().map(|r| r.seq + 1).unwrap_or(0);
        let pushed = queue.len();

        Ok(Self {
            path,
            state: Mutex::new(State {
                queue,
                next_seq,
                committed: 0,
                committed_err: 0,
                pushed,
            }),
        })
    }

    /// Append a new packet, durably, at the tail of the queue.
    pub fn push(&self, body: Vec<u8>) -> Result<u64, Error> {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push_back(Record { seq, body });
        state.pushed += 1;
        self.flush_locked(&state)?;
        Ok(seq)
    }

    /// The oldest not-yet-committed record, if any.
    pub fn peek(&self) -> Option<(u64, Vec<u8>)> {
        let state = self.state.lock();
        state.queue.front().map(|r| (r.seq, r.body.clone()))
    }

    pub fn has_data(&self) -> bool {
        !self.state.lock().queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Durably drop the head record: the peer accepted it (spec §4.5:
    /// `Success` with a non-error response type).
    pub fn commit(&self) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.queue.pop_front();
        state.committed += 1;
        self.flush_locked(&state)
    }

    /// Durably drop the head record without counting it a success: the
    /// outcome is unknown or the peer rejected it, but retrying risks
    /// double-applying a write that may already have landed (spec §4.5:
    /// `TimeoutError` / `CancelledError` / `TypeError` / an error-typed
    /// `Success`).
    pub fn commit_err(&self) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.queue.pop_front();
        state.committed_err += 1;
        self.flush_locked(&state)
    }

    pub fn stats(&self) -> chronopool_stats::FifoStats {
        let state = self.state.lock();
        chronopool_stats::FifoStats {
            pushed: state.pushed,
            committed: state.committed,
            committed_err: state.committed_err,
            pending: state.queue.len(),
        }
    }

    fn flush_locked(&self, state: &State) -> Result<(), Error> {
        let mut file = File::create(&self.path).map_err(|e| Error::Io(self.path.clone(), e))?;
        for record in &state.queue {
            write_record(&mut file, record).map_err(|e| Error::Io(self.path.clone(), e))?;
        }
        file.sync_all().map_err(|e| Error::Io(self.path.clone(), e))
    }
}

fn write_record(file: &mut File, record: &Record) -> std::io::Result<()> {
    file.write_all(&record.seq.to_le_bytes())?;
    file.write_all(&(record.body.len() as u32).to_le_bytes())?;
    file.write_all(&record.body)
}

fn decode_records(bytes: &[u8], path: &Path) -> Result<VecDeque<Record>, Error> {
    let mut queue = VecDeque::new();
    let mut cursor = std::io::Cursor::new(bytes);
    loop {
        let mut seq_buf = [0u8; 8];
        match cursor.read_exact(&mut seq_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(Error::Io(path.to_owned(), e)),
        }
        let seq = u64::from_le_bytes(seq_buf);

        let mut len_buf = [0u8; 4];
        let offset = cursor.position();
        cursor
            .read_exact(&mut len_buf)
            .map_err(|_| Error::CorruptRecord(path.to_owned(), offset))?;
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut body = vec![0u8; len];
        cursor
            .read_exact(&mut body)
            .map_err(|_| Error::CorruptRecord(path.to_owned(), offset))?;

        queue.push_back(Record { seq, body });
    }
    Ok(queue)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn push_then_peek_returns_fifo_order() {
        let dir = tempdir().unwrap();
        let fifo = Fifo::open(dir.path().join("fifo.log")).unwrap();
        fifo.push(b"a".to_vec()).unwrap();
        fifo.push(b"b".to_vec()).unwrap();

        let (seq, body) = fifo.peek().unwrap();
        assert_eq!(seq, 0);
        assert_eq!(body, b"a");
        assert_eq!(fifo.len(), 2);
    }

    #[test]
    fn commit_removes_only_the_head() {
        let dir = tempdir().unwrap();
        let fifo = Fifo::open(dir.path().join("fifo.log")).unwrap();
        fifo.push(b"a".to_vec()).unwrap();
        fifo.push(b"b".to_vec()).unwrap();

        fifo.commit().unwrap();
        let (_, body) = fifo.peek().unwrap();
        assert_eq!(body, b"b");
        assert_eq!(fifo.len(), 1);
    }

    #[test]
    fn write_error_leaves_the_record_in_place() {
        // S5 (spec §6): a WriteError means no commit call at all, so the
        // record simply stays at the head for the next tick to retry.
        let dir = tempdir().unwrap();
        let fifo = Fifo::open(dir.path().join("fifo.log")).unwrap();
        fifo.push(b"retry-me".to_vec()).unwrap();

        let (_, body) = fifo.peek().unwrap();
        assert_eq!(body, b"retry-me");
        assert_eq!(fifo.len(), 1);
    }

    #[test]
    fn commit_is_durable_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fifo.log");
        {
            let fifo = Fifo::open(&path).unwrap();
            fifo.push(b"a".to_vec()).unwrap();
            fifo.push(b"b".to_vec()).unwrap();
            fifo.commit().unwrap();
        }

        let reopened = Fifo::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        let (_, body) = reopened.peek().unwrap();
        assert_eq!(body, b"b");
    }

    #[test]
    fn replaying_after_commit_never_yields_a_committed_record() {
        let dir = tempdir().unwrap();
        let fifo = Fifo::open(dir.path().join("fifo.log")).unwrap();
        for i in 0..5u8 {
            fifo.push(vec![i]).unwrap();
        }
        for _ in 0..3 {
            fifo.commit().unwrap();
        }

        let mut remaining = Vec::new();
        while let Some((_, body)) = fifo.peek() {
            remaining.push(body);
            fifo.commit().unwrap();
        }
        assert_eq!(remaining, vec![vec![3], vec![4]]);
    }

    #[test]
    fn commit_err_also_drops_the_head_but_counts_separately() {
        let dir = tempdir().unwrap();
        let fifo = Fifo::open(dir.path().join("fifo.log")).unwrap();
        fifo.push(b"a".to_vec()).unwrap();
        fifo.commit_err().unwrap();
        assert!(!fifo.has_data());
        let stats = fifo.stats();
        assert_eq!(stats.committed_err, 1);
        assert_eq!(stats.committed, 0);
    }
}
