use std::collections::VecDeque;
use std::fmt;

use log::trace;
use stackvm::Vm;

/// Small display id assigned at spawn; stable external handle for a task
/// (timer payloads carry these, never pointers into the channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// One schedulable unit: exactly one VM plus its scheduling record. The
/// VM and the task are created together at image load and reaped together
/// when the program finishes or faults.
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub vm: Vm,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, vm: Vm) -> Self {
        Self {
            id,
            name: name.into(),
            vm,
        }
    }
}

/// A FIFO queue of tasks representing one scheduling state.
///
/// Channels own their members, so a task on two channels at once is
/// unrepresentable; moving a task means taking it out of one channel and
/// scheduling it on another.
pub struct Channel {
    name: &'static str,
    queue: VecDeque<Task>,
}

impl Channel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            queue: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Appends to the tail.
    pub fn schedule(&mut self, task: Task) {
        trace!("{} -> {}", task.id, self.name);
        self.queue.push_back(task);
    }

    /// Pops the head; the task is on no channel afterwards.
    pub fn next(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    /// Removes a specific member, preserving the order of the rest.
    pub fn take(&mut self, id: TaskId) -> Option<Task> {
        let at = self.queue.iter().position(|t| t.id == id)?;
        self.queue.remove(at)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
