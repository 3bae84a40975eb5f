//! Supervisor for processing many input streams from worker threads.
//!
//! Each stream stays single-threaded: a worker borrows one stream at a
//! time with [`InputSet::next_stream`], iterates it to completion, and
//! hands it back with [`InputSet::report_finished`]. The supervisor keeps
//! the ready/processing/finished/error bookkeeping behind a single mutex.
//!
//! A stream returned without reaching either a clean end or an error is
//! rescheduled once; a second such return is reported as an error.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, error, warn};

use a4stream_core::{Error, Result};

use crate::reader::InputStream;

#[derive(Default)]
struct Sets {
    files: VecDeque<PathBuf>,
    seen: HashSet<PathBuf>,
    ready: VecDeque<InputStream<File>>,
    processing: usize,
    finished: usize,
    failed: Vec<String>,
    resched: HashMap<String, u32>,
}

/// Maps a set of files to streams and tracks their progress.
#[derive(Default)]
pub struct InputSet {
    sets: Mutex<Sets>,
}

impl InputSet {
    pub fn new() -> Self {
        InputSet::default()
    }

    /// Queue a file for processing. Adding the same path twice is an
    /// error.
    pub fn add_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let mut sets = self.sets.lock().unwrap();
        if !sets.seen.insert(path.clone()) {
            return Err(Error::DuplicateInput(path.display().to_string()));
        }
        sets.files.push_back(path);
        Ok(())
    }

    /// Queue an already-open stream.
    pub fn add_stream(&self, stream: InputStream<File>) {
        self.sets.lock().unwrap().ready.push_back(stream);
    }

    /// Hand out the next stream, opening queued files as needed. Returns
    /// `None` once nothing is left. Files that fail to open are recorded
    /// as errors and skipped.
    pub fn next_stream(&self) -> Option<InputStream<File>> {
        let mut sets = self.sets.lock().unwrap();
        loop {
            if let Some(stream) = sets.ready.pop_front() {
                sets.processing += 1;
                debug!(stream = stream.name(), "processing stream");
                return Some(stream);
            }
            let path = sets.files.pop_front()?;
            match InputStream::open(&path) {
                Ok(stream) => {
                    sets.processing += 1;
                    debug!(stream = stream.name(), "processing stream");
                    return Some(stream);
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to open input");
                    sets.failed.push(path.display().to_string());
                }
            }
        }
    }

    /// Return a stream after its worker stopped iterating it.
    pub fn report_finished(&self, stream: InputStream<File>) {
        let mut sets = self.sets.lock().unwrap();
        sets.processing -= 1;
        let name = stream.name().to_string();
        if stream.end() {
            debug!(stream = %name, items = stream.items_read(), "finished stream");
            sets.finished += 1;
        } else if stream.error() || sets.resched.get(&name).copied().unwrap_or(0) > 0 {
            error!(stream = %name, "stream failed");
            sets.failed.push(name);
        } else {
            warn!(stream = %name, "stream returned unfinished, rescheduling");
            *sets.resched.entry(name).or_insert(0) += 1;
            sets.ready.push_back(stream);
        }
    }

    pub fn finished_count(&self) -> usize {
        self.sets.lock().unwrap().finished
    }

    pub fn error_count(&self) -> usize {
        self.sets.lock().unwrap().failed.len()
    }

    /// True when no work is queued, ready or in flight.
    pub fn idle(&self) -> bool {
        let sets = self.sets.lock().unwrap();
        sets.files.is_empty() && sets.ready.is_empty() && sets.processing == 0
    }
}
