use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use stackvm::{Fault, LoadError, SliceResult, SyscallEnv, Vm};

use crate::syscall;
use crate::task::{Channel, Task, TaskId};
use crate::timer::TimerQueue;

/// How a task left the kernel: the program result on clean completion,
/// the accumulated fault set otherwise.
#[derive(Debug)]
pub struct TaskExit {
    pub id: TaskId,
    pub name: String,
    pub outcome: Result<i32, Fault>,
}

/// The cooperative scheduler.
///
/// Owns the shared syscall environment, the "ready" and "sleeping"
/// channels, and the timer heap. Per-task state machine:
/// `Ready -> Running (one slice) -> {Ready | Sleeping | reaped}`, with
/// `Sleeping -> Ready` only through timer expiry. Everything runs on the
/// caller's thread; waiting for the earliest deadline blocks the process,
/// which is fine for this workload.
pub struct Kernel {
    env: Rc<SyscallEnv>,
    ready: Channel,
    sleeping: Channel,
    timers: TimerQueue,
    epoch: Instant,
    next_id: u32,
    exits: Vec<TaskExit>,
}

impl Kernel {
    pub const DEFAULT_TIMER_CAPACITY: usize = 64;

    pub fn new(timer_capacity: usize) -> Self {
        let epoch = Instant::now();
        Self {
            env: Rc::new(syscall::default_env(epoch)),
            ready: Channel::new("ready"),
            sleeping: Channel::new("sleeping"),
            timers: TimerQueue::new(timer_capacity),
            epoch,
            next_id: 1,
            exits: Vec::new(),
        }
    }

    /// Microseconds since kernel construction; timer deadlines live on
    /// this clock.
    pub fn now_micros(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Loads an image and schedules it; see [`spawn_vm`](Self::spawn_vm).
    pub fn spawn(&mut self, image: &[u8], name: &str) -> Result<TaskId, LoadError> {
        Ok(self.spawn_vm(Vm::load(image)?, name))
    }

    /// Wraps an already-loaded VM in a task with a synthetic
    /// `main(argc, argv)` entry and schedules it on "ready". Lets a caller
    /// that inspected the VM first (the CLI's disassembly pass) hand it
    /// over without reparsing the image.
    pub fn spawn_vm(&mut self, mut vm: Vm, name: &str) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        vm.set_env(Rc::clone(&self.env));
        vm.set_extra(id.0 as u64);
        vm.set_entry(&[0, 0]);
        info!("{} loaded from {}", id, name);
        self.ready.schedule(Task::new(id, name, vm));
        id
    }

    /// Runs until no task remains, returning exits in completion order.
    pub fn run(&mut self) -> Vec<TaskExit> {
        while self.step() {}
        std::mem::take(&mut self.exits)
    }

    /// One scheduling action: a slice for the next ready task, or a wait
    /// on the earliest timer. Returns false once the kernel is idle.
    pub fn step(&mut self) -> bool {
        if let Some(mut task) = self.ready.next() {
            trace!("slice for {}", task.id);
            match task.vm.run_slice() {
                SliceResult::Finished(value) => {
                    info!("{} ({}) finished with {}", task.id, task.name, value);
                    self.exits.push(TaskExit {
                        id: task.id,
                        name: task.name.clone(),
                        outcome: Ok(value),
                    });
                    self.reap(task);
                }
                SliceResult::Faulted(faults) => {
                    warn!("{} ({}) faulted: {}", task.id, task.name, faults);
                    trace!(
                        "{} frame area:\n{}",
                        task.id,
                        task.vm.dump_heap(
                            task.vm.program_stack() as usize,
                            task.vm.program_stack() as usize + 64
                        )
                    );
                    self.exits.push(TaskExit {
                        id: task.id,
                        name: task.name.clone(),
                        outcome: Err(faults),
                    });
                    self.reap(task);
                }
                SliceResult::NotFinished => match task.vm.take_sleep_request() {
                    Some(micros) => {
                        let deadline = self.now_micros() + micros;
                        match self.timers.insert(deadline, task.id) {
                            Ok(()) => {
                                debug!("{} sleeping until t+{}us", task.id, deadline);
                                self.sleeping.schedule(task);
                            }
                            Err(err) => {
                                warn!("{}, keeping {} on ready", err, task.id);
                                self.ready.schedule(task);
                            }
                        }
                    }
                    None => self.ready.schedule(task),
                },
            }
            return true;
        }

        if let Some(entry) = self.timers.pop() {
            let now = self.now_micros();
            if entry.deadline > now {
                std::thread::sleep(Duration::from_micros(entry.deadline - now));
            }
            match self.sleeping.take(entry.task) {
                Some(task) => {
                    debug!("waking {}", entry.task);
                    self.ready.schedule(task);
                }
                // reap() cancels timers, so a fired entry should always
                // name a sleeper.
                None => warn!("timer fired for unknown {}", entry.task),
            }
            return true;
        }

        if !self.sleeping.is_empty() {
            warn!(
                "{} sleeper(s) have no pending timer and can never wake; dropping",
                self.sleeping.len()
            );
            while let Some(task) = self.sleeping.next() {
                self.reap(task);
            }
        }
        false
    }

    /// Tears a task down from whichever channel holds it, cancelling any
    /// pending timer entry. Returns false for an unknown id.
    pub fn kill(&mut self, id: TaskId) -> bool {
        let task = self.ready.take(id).or_else(|| self.sleeping.take(id));
        match task {
            Some(task) => {
                info!("killing {} ({})", task.id, task.name);
                self.reap(task);
                true
            }
            None => false,
        }
    }

    /// Frees VM and task together. The timer cancellation keeps the heap
    /// free of payloads naming dead tasks.
    fn reap(&mut self, task: Task) {
        if self.timers.cancel(task.id) {
            debug!("cancelled pending timer for {}", task.id);
        }
        drop(task);
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn sleeping_len(&self) -> usize {
        self.sleeping.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}
