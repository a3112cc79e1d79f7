// Copyright (c) 2024 Mike Tsao

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

/// A one-shot timer waiting in a [TimerQueue].
#[derive(Debug)]
struct Armed<T> {
    due_ns: u64,
    sequence: u64,
    payload: T,
}
impl<T> PartialEq for Armed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ns == other.due_ns && self.sequence == other.sequence
    }
}
impl<T> Eq for Armed<T> {}
impl<T> PartialOrd for Armed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Armed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_ns
            .cmp(&other.due_ns)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Pending one-shot timers, earliest first. Timers due at the same instant
/// fire in the order they were armed.
///
/// There's no way to cancel a single timer. Payloads that are no longer
/// wanted should recognize themselves as stale when they fire.
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<Armed<T>>>,
    next_sequence: u64,
}
impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            heap: Default::default(),
            next_sequence: Default::default(),
        }
    }
}
impl<T> TimerQueue<T> {
    /// Schedules `payload` to come due at `due_ns`.
    pub fn arm(&mut self, due_ns: u64, payload: T) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(Armed {
            due_ns,
            sequence,
            payload,
        }));
    }

    /// When the earliest timer comes due, if any timer is armed.
    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|armed| armed.0.due_ns)
    }

    /// Removes and returns the earliest timer if it's due by `now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<T> {
        if self.next_due()? <= now_ns {
            self.heap.pop().map(|armed| armed.0.payload)
        } else {
            None
        }
    }

    /// Removes and returns the earliest timer regardless of its due time,
    /// along with that due time.
    pub fn pop_next(&mut self) -> Option<(u64, T)> {
        self.heap
            .pop()
            .map(|armed| (armed.0.due_ns, armed.0.payload))
    }

    /// Disarms every timer.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order() {
        let mut timers = TimerQueue::default();
        timers.arm(300, "c");
        timers.arm(100, "a");
        timers.arm(200, "b");
        assert_eq!(timers.next_due(), Some(100));

        assert_eq!(timers.pop_due(50), None);
        assert_eq!(timers.pop_due(250), Some("a"));
        assert_eq!(timers.pop_due(250), Some("b"));
        assert_eq!(timers.pop_due(250), None);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.pop_next(), Some((300, "c")));
        assert!(timers.is_empty());
    }

    #[test]
    fn ties_fire_in_arming_order() {
        let mut timers = TimerQueue::default();
        for i in 0..5 {
            timers.arm(1_000, i);
        }
        let order: Vec<i32> = core::iter::from_fn(|| timers.pop_due(1_000)).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn clear_disarms_everything() {
        let mut timers = TimerQueue::default();
        timers.arm(1, ());
        timers.arm(2, ());
        timers.clear();
        assert_eq!(timers.next_due(), None);
        assert_eq!(timers.pop_due(u64::MAX), None);
    }
}
