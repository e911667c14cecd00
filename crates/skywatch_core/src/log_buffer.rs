use std::collections::VecDeque;

/// Maximum number of lines kept for the attached job.
pub const LOG_BUFFER_CAPACITY: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Arrival order within the current attachment, starting at 0.
    pub seq: u64,
    pub text: String,
}

/// Sliding window over the most recent log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
    next_seq: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(LOG_BUFFER_CAPACITY)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity.min(LOG_BUFFER_CAPACITY)),
            capacity,
            next_seq: 0,
        }
    }

    pub fn push(&mut self, text: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(LogLine {
            seq: self.next_seq,
            text: text.into(),
        });
        self.next_seq += 1;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.next_seq = 0;
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total lines received since the last clear, including evicted ones.
    pub fn received(&self) -> u64 {
        self.next_seq
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines.iter().map(|line| line.text.clone()).collect()
    }
}

/// Lifecycle of the log stream attached to the active job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    Disconnected,
    Connecting,
    Streaming,
    Closed,
}

impl StreamPhase {
    pub fn is_live(self) -> bool {
        matches!(self, StreamPhase::Connecting | StreamPhase::Streaming)
    }
}
