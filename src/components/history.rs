use crate::canvas::PixelBuffer;
use crate::log_info;

// ============================================================================
// HISTORY SNAPSHOT
// ============================================================================

/// Full copy of the pixel buffer at one committed point.
#[derive(Clone, Debug)]
pub struct HistorySnapshot {
    description: String,
    pixels: PixelBuffer,
}

impl HistorySnapshot {
    pub fn new(description: impl Into<String>, pixels: PixelBuffer) -> Self {
        Self {
            description: description.into(),
            pixels,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn memory_size(&self) -> usize {
        self.pixels.memory_bytes() + self.description.len()
    }
}

// ============================================================================
// HISTORY MANAGER - linear snapshot sequence with a cursor
// ============================================================================

/// Undo/redo history over full-buffer snapshots.
///
/// Holds an ordered sequence and a cursor `index`. Once the first snapshot is
/// seeded, `index` always points at a valid entry. Committing after an undo
/// drops everything past the cursor, so history stays linear.
pub struct HistoryManager {
    snapshots: Vec<HistorySnapshot>,
    index: usize,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across all snapshots.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            index: 0,
            max_history_size: max_history_size.max(1),
            max_memory_bytes: Some(256 * 1024 * 1024),
            total_memory: 0,
        }
    }

    /// Set the memory cap. `None` disables memory-based eviction.
    pub fn with_memory_limit(mut self, max_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_bytes;
        self
    }

    /// Drop everything and start over from a single snapshot at index 0.
    /// Used on image load and on reset-to-original.
    pub fn seed(&mut self, snapshot: HistorySnapshot) {
        self.total_memory = snapshot.memory_size();
        self.snapshots.clear();
        self.snapshots.push(snapshot);
        self.index = 0;
    }

    /// Record a new committed state.
    ///
    /// Truncates the sequence to `[0..=index]`, appends, and moves the cursor to
    /// the new last entry. On an empty history this behaves like [`seed`].
    ///
    /// [`seed`]: HistoryManager::seed
    pub fn commit(&mut self, snapshot: HistorySnapshot) {
        if self.snapshots.is_empty() {
            self.seed(snapshot);
            return;
        }

        for dropped in self.snapshots.drain(self.index + 1..) {
            self.total_memory = self.total_memory.saturating_sub(dropped.memory_size());
        }

        self.total_memory += snapshot.memory_size();
        self.snapshots.push(snapshot);
        self.index = self.snapshots.len() - 1;

        self.prune();
    }

    /// Step back one entry. Returns the snapshot to restore, or `None` at the
    /// oldest entry.
    pub fn undo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.snapshots.get(self.index)
    }

    /// Step forward one entry. Returns the snapshot to restore, or `None` at
    /// the newest entry.
    pub fn redo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.snapshots.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        !self.snapshots.is_empty() && self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.snapshots.is_empty() && self.index + 1 < self.snapshots.len()
    }

    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.snapshots.get(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Descriptions oldest-first, paired with whether the entry is current.
    pub fn entries(&self) -> Vec<(String, bool)> {
        self.snapshots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.description.clone(), i == self.index))
            .collect()
    }

    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() {
            self.snapshots.get(self.index).map(|s| s.description())
        } else {
            None
        }
    }

    pub fn redo_description(&self) -> Option<&str> {
        if self.can_redo() {
            self.snapshots.get(self.index + 1).map(|s| s.description())
        } else {
            None
        }
    }

    /// Current memory usage of the history (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.index = 0;
        self.total_memory = 0;
    }

    /// Evict oldest entries until both limits hold. The current entry is never
    /// evicted.
    fn prune(&mut self) {
        let mut evicted = 0usize;

        while self.snapshots.len() > self.max_history_size && self.index > 0 {
            self.evict_oldest();
            evicted += 1;
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.index > 0 {
                self.evict_oldest();
                evicted += 1;
            }
        }

        if evicted > 0 {
            log_info!(
                "history: evicted {} oldest snapshot(s), {} kept ({:.1} MB)",
                evicted,
                self.snapshots.len(),
                self.total_memory as f64 / (1024.0 * 1024.0)
            );
        }
    }

    fn evict_oldest(&mut self) {
        let removed = self.snapshots.remove(0);
        self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
        self.index -= 1;
    }
}
