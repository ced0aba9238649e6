mod common;

use std::time::Instant;

use common::Asm;
use kernel::syscall::{SYS_ABORT, SYS_DELAY, SYS_PRINT, SYS_TIME};
use kernel::{Channel, Kernel, Task, TaskId};
use stackvm::{Fault, Opcode, Vm};

use Opcode::*;

/// `main` that returns `result` immediately.
fn immediate(result: i32) -> Vec<u8> {
    Asm::new()
        .op_imm(Const, result)
        .op_imm(Leave, 0)
        .build()
}

/// `main` that sleeps `micros`, then returns `result`.
fn delay_then(micros: i32, result: i32) -> Vec<u8> {
    Asm::new()
        .op_imm(Enter, 16)
        .op_imm(Const, micros)
        .op_imm(Arg, 8)
        .op_imm(Const, SYS_DELAY)
        .op(Call)
        .op(Pop)
        .op_imm(Const, result)
        .op_imm(Leave, 16)
        .build()
}

fn syscall_only(target: i32) -> Vec<u8> {
    Asm::new()
        .op_imm(Enter, 16)
        .op_imm(Const, target)
        .op(Call)
        .op_imm(Leave, 16)
        .build()
}

#[test]
fn channels_are_fifo() {
    let vm = || Vm::load(&immediate(0)).expect("load");
    let mut channel = Channel::new("test");
    channel.schedule(Task::new(TaskId(1), "a", vm()));
    channel.schedule(Task::new(TaskId(2), "b", vm()));
    channel.schedule(Task::new(TaskId(3), "c", vm()));

    assert_eq!(channel.take(TaskId(2)).map(|t| t.id), Some(TaskId(2)));
    assert!(channel.take(TaskId(2)).is_none());
    assert_eq!(channel.next().map(|t| t.id), Some(TaskId(1)));
    assert_eq!(channel.next().map(|t| t.id), Some(TaskId(3)));
    assert!(channel.next().is_none());
    assert!(channel.is_empty());
}

#[test]
fn preloaded_vm_spawns_and_runs() {
    // The CLI loads once, disassembles, then hands the same VM over.
    let vm = Vm::load(&immediate(5)).expect("load");
    assert!(!vm.disassemble().is_empty());

    let mut kernel = Kernel::new(4);
    let id = kernel.spawn_vm(vm, "preloaded");

    let exits = kernel.run();
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].id, id);
    assert_eq!(exits[0].outcome, Ok(5));
}

#[test]
fn spawning_a_bad_image_fails() {
    let mut kernel = Kernel::new(4);
    assert!(kernel.spawn(&[1, 2, 3], "bad").is_err());
    assert_eq!(kernel.ready_len(), 0);
}

#[test]
fn tasks_finish_in_wakeup_order() {
    let mut kernel = Kernel::new(4);
    let slow = kernel.spawn(&delay_then(40_000, 1), "slow").unwrap();
    let fast = kernel.spawn(&delay_then(10_000, 2), "fast").unwrap();

    let exits = kernel.run();
    assert_eq!(exits.len(), 2);
    assert_eq!(exits[0].id, fast);
    assert_eq!(exits[0].outcome, Ok(2));
    assert_eq!(exits[1].id, slow);
    assert_eq!(exits[1].outcome, Ok(1));
}

#[test]
fn sleeper_does_not_starve_ready_tasks() {
    let mut kernel = Kernel::new(4);
    let sleeper = kernel.spawn(&delay_then(30_000, 1), "sleeper").unwrap();
    let runner = kernel.spawn(&immediate(2), "runner").unwrap();

    // The runner must complete while the sleeper is parked, not after it.
    let exits = kernel.run();
    assert_eq!(exits[0].id, runner);
    assert_eq!(exits[0].outcome, Ok(2));
    assert_eq!(exits[1].id, sleeper);
    assert_eq!(exits[1].outcome, Ok(1));
}

#[test]
fn kill_cancels_the_pending_timer() {
    let mut kernel = Kernel::new(4);
    let id = kernel.spawn(&delay_then(200_000, 1), "parked").unwrap();

    // One slice parks the task on the timer.
    assert!(kernel.step());
    assert_eq!(kernel.ready_len(), 0);
    assert_eq!(kernel.sleeping_len(), 1);
    assert_eq!(kernel.pending_timers(), 1);

    assert!(kernel.kill(id));
    assert!(!kernel.kill(id));
    assert_eq!(kernel.sleeping_len(), 0);
    assert_eq!(kernel.pending_timers(), 0);

    // Nothing left to wait on: run() returns without sleeping 200ms.
    let start = Instant::now();
    assert!(kernel.run().is_empty());
    assert!(start.elapsed().as_millis() < 100);
}

#[test]
fn faulting_task_exits_with_its_faults() {
    let mut kernel = Kernel::new(4);
    let id = kernel.spawn(&Asm::new().op(Undef).build(), "broken").unwrap();

    let exits = kernel.run();
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].id, id);
    assert_eq!(exits[0].outcome, Err(Fault::INVALID_OPCODE));
}

#[test]
fn abort_syscall_reaps_the_task() {
    let mut kernel = Kernel::new(4);
    kernel.spawn(&syscall_only(SYS_ABORT), "quitter").unwrap();

    let exits = kernel.run();
    assert_eq!(exits[0].outcome, Err(Fault::ABORTED));
}

#[test]
fn print_syscall_returns_byte_count() {
    let image = Asm::new()
        .data(b"hi\0")
        .op_imm(Enter, 16)
        .op_imm(Const, 0)
        .op_imm(Arg, 8)
        .op_imm(Const, SYS_PRINT)
        .op(Call)
        .op_imm(Leave, 16)
        .build();

    let mut kernel = Kernel::new(4);
    kernel.spawn(&image, "greeter").unwrap();

    let exits = kernel.run();
    assert_eq!(exits[0].outcome, Ok(2));
}

#[test]
fn time_syscall_reports_the_kernel_clock() {
    let mut kernel = Kernel::new(4);
    kernel.spawn(&syscall_only(SYS_TIME), "clock").unwrap();

    let exits = kernel.run();
    let micros = exits[0].outcome.expect("clock read should succeed");
    assert!(micros >= 0);
}
