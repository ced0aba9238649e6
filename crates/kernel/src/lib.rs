//! Cooperative task kernel for [`stackvm`] programs.
//!
//! One thread, no preemption: the kernel multiplexes many VM instances by
//! running each in bounded slices, parking sleepers on a timer min-heap,
//! and moving tasks between FIFO channels ("ready", "sleeping"). The only
//! blocking point is the wait for the earliest timer deadline when nothing
//! is ready.

pub mod kernel;
pub mod syscall;
pub mod task;
pub mod timer;

pub use kernel::{Kernel, TaskExit};
pub use task::{Channel, Task, TaskId};
pub use timer::{TimerEntry, TimerFull, TimerQueue};
