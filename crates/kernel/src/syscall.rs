//! The default host-call set every kernel-owned VM sees.
//!
//! Registration order fixes the guest-visible call targets, so new calls
//! only ever append. Each callback reads its arguments with [`Vm::arg`]
//! and pushes exactly one result word.

use std::io::Write as _;
use std::time::Instant;

use log::warn;
use stackvm::{SyscallEnv, Vm};

/// Write the null-terminated heap string at `Arg(0)` to stdout; returns
/// the byte length written.
pub const SYS_PRINT: i32 = -1;
/// Microseconds since kernel start, truncated to 32 bits.
pub const SYS_TIME: i32 = -2;
/// Park the calling task for `Arg(0)` microseconds; ends the slice.
pub const SYS_DELAY: i32 = -3;
/// Terminate the calling task with the abort fault.
pub const SYS_ABORT: i32 = -4;

/// Builds the shared environment table. `epoch` is the kernel's time base.
pub fn default_env(epoch: Instant) -> SyscallEnv {
    let mut env = SyscallEnv::new();
    let print = env.register(sys_print);
    let time = env.register(move |vm: &mut Vm| sys_time(vm, epoch));
    let delay = env.register(sys_delay);
    let abort = env.register(sys_abort);
    debug_assert_eq!(
        (print, time, delay, abort),
        (SYS_PRINT, SYS_TIME, SYS_DELAY, SYS_ABORT)
    );
    env
}

fn sys_print(vm: &mut Vm) {
    let addr = vm.arg(0) as u32;
    let text = match vm.heap_str(addr) {
        Ok(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Err(fault) => {
            warn!("print with bad string pointer 0x{:08x}: {}", addr, fault);
            None
        }
    };
    match text {
        Some(text) => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
            vm.push(text.len() as i32);
        }
        None => {
            vm.abort();
            vm.push(0);
        }
    }
}

fn sys_time(vm: &mut Vm, epoch: Instant) {
    vm.push(epoch.elapsed().as_micros() as u32 as i32);
}

fn sys_delay(vm: &mut Vm) {
    let micros = vm.arg(0).max(0) as u64;
    vm.request_sleep(micros);
    vm.push(0);
}

fn sys_abort(vm: &mut Vm) {
    vm.abort();
    vm.push(0);
}
