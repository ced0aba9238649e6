use crate::vm::Vm;

/// A host-provided function invoked by a syscall trap.
///
/// The callback sees the trapping VM with the caller's operand stack and
/// frame intact: it reads its arguments with [`Vm::arg`] and must push
/// exactly one result before returning (the interpreter corrects and logs
/// violations, see [`Vm::run_slice`]).
pub type HostFn = Box<dyn Fn(&mut Vm)>;

/// The table of host functions a kernel shares with every VM it runs.
///
/// Registration order fixes the wire contract: index `k` (0-based) is
/// reached by the negative call target `-1 - k`. The table is built once
/// at kernel start and is read-only afterwards, so VMs borrow it through a
/// shared `Rc` without further ceremony.
#[derive(Default)]
pub struct SyscallEnv {
    table: Vec<HostFn>,
}

impl std::fmt::Debug for SyscallEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyscallEnv")
            .field("table", &format_args!("[{} host fns]", self.table.len()))
            .finish()
    }
}

impl SyscallEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host function, returning the call target guests use to
    /// reach it.
    pub fn register(&mut self, func: impl Fn(&mut Vm) + 'static) -> i32 {
        self.table.push(Box::new(func));
        -(self.table.len() as i32)
    }

    pub fn get(&self, index: usize) -> Option<&HostFn> {
        self.table.get(index)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Table index encoded by a negative call target.
    pub fn index_for(target: i32) -> usize {
        debug_assert!(target < 0);
        (-1 - target) as usize
    }
}
