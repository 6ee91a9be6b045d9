// Recent readings feed with filtering
use super::channel::{ChannelId, SensorKind};
use super::classifier::Status;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

pub const DEFAULT_LOG_CAPACITY: usize = 500;
const CHUNK_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub id: u64,
    pub observed_at: DateTime<Utc>,
    pub channel: ChannelId,
    pub kind: SensorKind,
    pub value: f64,
    pub status: Status,
}

/// Empty `kinds`/`statuses` sets match everything.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub search: Option<String>,
    pub kinds: HashSet<SensorKind>,
    pub statuses: HashSet<Status>,
}

impl LogFilter {
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn kind(mut self, kind: SensorKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.statuses.insert(status);
        self
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&entry.kind) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&entry.status) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                entry.channel.topic().contains(&term) || entry.value.to_string().contains(&term)
            }
        }
    }
}

/// Entries are stored in sealed, shared chunks plus an open tail, so cloning
/// the log for a snapshot copies at most one chunk of entries.
#[derive(Debug, Clone)]
pub struct ReadingLog {
    capacity: usize,
    next_id: u64,
    len: usize,
    // Entries at the front of the oldest sealed chunk that were already evicted
    skip: usize,
    sealed: VecDeque<Arc<[LogEntry]>>,
    tail: Vec<LogEntry>,
}

impl ReadingLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: 0,
            len: 0,
            skip: 0,
            sealed: VecDeque::new(),
            tail: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        channel: ChannelId,
        value: f64,
        status: Status,
        observed_at: DateTime<Utc>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tail.push(LogEntry {
            id,
            observed_at,
            channel,
            kind: channel.kind(),
            value,
            status,
        });
        self.len += 1;
        if self.tail.len() == CHUNK_LEN {
            self.sealed.push_back(Arc::from(std::mem::take(&mut self.tail)));
        }
        while self.len > self.capacity {
            self.evict_oldest();
        }
        id
    }

    fn evict_oldest(&mut self) {
        match self.sealed.front() {
            Some(chunk) => {
                self.skip += 1;
                if self.skip == chunk.len() {
                    self.sealed.pop_front();
                    self.skip = 0;
                }
            }
            None => {
                self.tail.remove(0);
            }
        }
        self.len -= 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every retained entry, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        let skip = self.skip;
        let sealed = self
            .sealed
            .iter()
            .enumerate()
            .rev()
            .flat_map(move |(i, chunk)| {
                let start = if i == 0 { skip } else { 0 };
                chunk[start..].iter().rev()
            });
        self.tail.iter().rev().chain(sealed)
    }

    /// Matching entries, newest first.
    pub fn filter<'a, 'f>(
        &'a self,
        filter: &'f LogFilter,
    ) -> impl Iterator<Item = &'a LogEntry> + use<'a, 'f> {
        self.entries().filter(move |e| filter.matches(e))
    }
}

impl PartialEq for ReadingLog {
    fn eq(&self, other: &Self) -> bool {
        self.capacity == other.capacity
            && self.next_id == other.next_id
            && self.entries().eq(other.entries())
    }
}

impl Serialize for ReadingLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries())
    }
}

impl Default for ReadingLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
