use crate::Location;

/// Oldest entries are dropped past this many.
pub const MAX_HISTORY: usize = 100;

/// Back/forward stack of visited locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<Location>,
    cursor: usize,
}

impl History {
    pub fn new(initial: Location) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
        }
    }

    pub fn current(&self) -> &Location {
        &self.entries[self.cursor]
    }

    /// Pushes `location` and discards forward entries.
    ///
    /// Returns false when `location` equals the current entry; nothing is pushed then.
    pub fn push(&mut self, location: Location) -> bool {
        if &location == self.current() {
            return false;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push(location);
        if self.entries.len() > MAX_HISTORY {
            let excess = self.entries.len() - MAX_HISTORY;
            self.entries.drain(..excess);
        }
        self.cursor = self.entries.len() - 1;
        true
    }

    pub fn back(&mut self) -> Option<&Location> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<&Location> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }
}
