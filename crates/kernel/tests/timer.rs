use kernel::{TaskId, TimerFull, TimerQueue};

fn assert_heap_invariant(timers: &TimerQueue) {
    let entries = timers.entries();
    for at in 1..entries.len() {
        let parent = (at - 1) / 2;
        assert!(
            entries[parent].deadline <= entries[at].deadline,
            "entry {} under parent {} breaks ordering: {:?}",
            at,
            parent,
            entries
        );
    }
}

#[test]
fn pops_in_deadline_order() {
    let mut timers = TimerQueue::new(8);
    timers.insert(50, TaskId(1)).unwrap();
    timers.insert(10, TaskId(2)).unwrap();
    timers.insert(30, TaskId(3)).unwrap();

    assert_eq!(timers.peek().map(|e| e.deadline), Some(10));
    assert_eq!(timers.pop().map(|e| (e.deadline, e.task)), Some((10, TaskId(2))));
    assert_eq!(timers.pop().map(|e| (e.deadline, e.task)), Some((30, TaskId(3))));
    assert_eq!(timers.pop().map(|e| (e.deadline, e.task)), Some((50, TaskId(1))));
    assert!(timers.pop().is_none());
}

#[test]
fn insert_past_capacity_fails() {
    let mut timers = TimerQueue::new(2);
    timers.insert(1, TaskId(1)).unwrap();
    timers.insert(2, TaskId(2)).unwrap();
    assert_eq!(timers.insert(3, TaskId(3)), Err(TimerFull));
    assert_eq!(timers.len(), 2);
}

#[test]
fn cancel_middle_entry_keeps_ordering() {
    let mut timers = TimerQueue::new(8);
    for (deadline, id) in [(40, 1), (10, 2), (30, 3), (20, 4), (50, 5)] {
        timers.insert(deadline, TaskId(id)).unwrap();
    }

    assert!(timers.cancel(TaskId(3)));
    assert!(!timers.cancel(TaskId(3)));
    assert_heap_invariant(&timers);
    assert!(timers.find(TaskId(3)).is_none());

    let mut order = Vec::new();
    while let Some(entry) = timers.pop() {
        order.push(entry.deadline);
    }
    assert_eq!(order, vec![10, 20, 40, 50]);
}

#[test]
fn find_reports_pending_tasks() {
    let mut timers = TimerQueue::new(4);
    timers.insert(5, TaskId(7)).unwrap();
    assert!(timers.find(TaskId(7)).is_some());
    assert!(timers.find(TaskId(8)).is_none());
}

#[test]
fn equal_deadlines_all_surface() {
    let mut timers = TimerQueue::new(4);
    timers.insert(10, TaskId(1)).unwrap();
    timers.insert(10, TaskId(2)).unwrap();
    timers.insert(10, TaskId(3)).unwrap();

    let mut tasks: Vec<u32> = Vec::new();
    while let Some(entry) = timers.pop() {
        assert_eq!(entry.deadline, 10);
        tasks.push(entry.task.0);
    }
    tasks.sort_unstable();
    // No ordering promise among ties, only that every entry comes out.
    assert_eq!(tasks, vec![1, 2, 3]);
}

#[test]
fn invariant_holds_under_mixed_operations() {
    // Deterministic pseudo-random insert/cancel/pop mix.
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut rand = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    let mut timers = TimerQueue::new(32);
    let mut next_id = 0u32;
    let mut live: Vec<TaskId> = Vec::new();

    for _ in 0..500 {
        match rand() % 3 {
            0 => {
                let id = TaskId(next_id);
                next_id += 1;
                if timers.insert(rand() % 1000, id).is_ok() {
                    live.push(id);
                }
            }
            1 => {
                if !live.is_empty() {
                    let id = live.swap_remove((rand() % live.len() as u64) as usize);
                    assert!(timers.cancel(id));
                }
            }
            _ => {
                if let Some(entry) = timers.pop() {
                    live.retain(|&id| id != entry.task);
                }
            }
        }
        assert_heap_invariant(&timers);
        assert_eq!(timers.len(), live.len());
    }
}
