use thiserror::Error;

use crate::task::TaskId;

/// A pending wake-up: the deadline is microseconds since the kernel's
/// epoch, the payload names the sleeping task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEntry {
    pub deadline: u64,
    pub task: TaskId,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("timer queue is full")]
pub struct TimerFull;

/// Fixed-capacity binary min-heap keyed by deadline.
///
/// Capacity is set at construction and never grows; insertion beyond it
/// fails. Entries with equal deadlines dequeue in arbitrary order — the
/// heap gives no FIFO guarantee among ties.
pub struct TimerQueue {
    heap: Vec<TimerEntry>,
    capacity: usize,
}

impl TimerQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The heap array, root first; exposed for inspection and invariant
    /// checks, not mutation.
    pub fn entries(&self) -> &[TimerEntry] {
        &self.heap
    }

    /// Earliest pending entry.
    pub fn peek(&self) -> Option<&TimerEntry> {
        self.heap.first()
    }

    pub fn insert(&mut self, deadline: u64, task: TaskId) -> Result<(), TimerFull> {
        if self.heap.len() == self.capacity {
            return Err(TimerFull);
        }
        self.heap.push(TimerEntry { deadline, task });
        self.sift_up(self.heap.len() - 1);
        Ok(())
    }

    /// Removes and returns the earliest entry.
    pub fn pop(&mut self) -> Option<TimerEntry> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// Index of the entry carrying `task`, if any.
    pub fn find(&self, task: TaskId) -> Option<usize> {
        self.heap.iter().position(|e| e.task == task)
    }

    /// Drops the pending entry for `task`. Required before a task with an
    /// outstanding timer is reaped, so no heap entry ever names a task
    /// that no longer exists.
    pub fn cancel(&mut self, task: TaskId) -> bool {
        match self.find(task) {
            Some(at) => {
                self.remove_at(at);
                true
            }
            None => false,
        }
    }

    /// Removes the entry at `at`, promoting the last element into the hole
    /// and restoring the heap invariant in whichever direction it is
    /// violated.
    fn remove_at(&mut self, at: usize) -> TimerEntry {
        let last = self.heap.len() - 1;
        self.heap.swap(at, last);
        let removed = self.heap.pop().unwrap();
        if at < self.heap.len() {
            if at > 0 && self.heap[at].deadline < self.heap[(at - 1) / 2].deadline {
                self.sift_up(at);
            } else {
                self.sift_down(at);
            }
        }
        removed
    }

    fn sift_up(&mut self, mut at: usize) {
        while at > 0 {
            let parent = (at - 1) / 2;
            if self.heap[at].deadline >= self.heap[parent].deadline {
                break;
            }
            self.heap.swap(at, parent);
            at = parent;
        }
    }

    fn sift_down(&mut self, mut at: usize) {
        loop {
            let left = 2 * at + 1;
            if left >= self.heap.len() {
                break;
            }
            // Smaller child wins when both violate.
            let right = left + 1;
            let child = if right < self.heap.len()
                && self.heap[right].deadline < self.heap[left].deadline
            {
                right
            } else {
                left
            };
            if self.heap[child].deadline >= self.heap[at].deadline {
                break;
            }
            self.heap.swap(at, child);
            at = child;
        }
    }
}
