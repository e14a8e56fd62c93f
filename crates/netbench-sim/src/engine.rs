//! # Discrete-Event Engine
//!
//! A single-threaded event queue that owns simulated time. Handlers run one
//! at a time in non-decreasing time order; events scheduled for the same
//! instant run in the order they were pushed.
//!
//! The queue implements [`Scheduler`], so it can be handed to core
//! components as an `Rc<dyn Scheduler>`. Their wakeups come back out of
//! [`EventQueue::pop`] as [`Event::Wakeup`].
//!
//! Event bodies live in a slab; the heap only orders `(time, seq, key)`
//! triples.

use slab::Slab;
use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use netbench_stack::bits::BitSequence;
use netbench_stack::time::{Clock, InterfaceId, Scheduler, SimTime, Wakeup};

// ─── Event ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A timer requested by a core component.
    Wakeup(Wakeup),
    /// The interface finished clocking its last frame onto the line.
    TransmitComplete { interface: InterfaceId },
    /// A frame reached the receiving end of a channel.
    Arrival {
        interface: InterfaceId,
        wire: BitSequence,
    },
}

// ─── EventQueue ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct EventQueue {
    now: Cell<SimTime>,
    next_seq: Cell<u64>,
    heap: RefCell<BinaryHeap<Reverse<(SimTime, u64, usize)>>>,
    events: RefCell<Slab<Event>>,
    dispatched: Cell<u64>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event` at `at`. Times in the past are clamped to now.
    pub fn push(&self, at: SimTime, event: Event) {
        let at = at.max(self.now.get());
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        let key = self.events.borrow_mut().insert(event);
        self.heap.borrow_mut().push(Reverse((at, seq, key)));
    }

    /// Schedule `event` `delay` ticks from now.
    pub fn push_after(&self, delay: u64, event: Event) {
        self.push(self.now.get() + delay, event);
    }

    /// Remove the earliest event and advance time to it.
    pub fn pop(&self) -> Option<(SimTime, Event)> {
        let Reverse((at, _, key)) = self.heap.borrow_mut().pop()?;
        let event = self.events.borrow_mut().try_remove(key)?;
        self.now.set(at);
        self.dispatched.set(self.dispatched.get() + 1);
        Some((at, event))
    }

    /// Time of the earliest pending event.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.borrow().peek().map(|Reverse((at, _, _))| *at)
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Events popped so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.get()
    }
}

impl Clock for EventQueue {
    fn now(&self) -> SimTime {
        self.now.get()
    }
}

impl Scheduler for EventQueue {
    fn schedule_at(&self, at: SimTime, wakeup: Wakeup) {
        self.push(at, Event::Wakeup(wakeup));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn tick(connection: u32) -> Event {
        Event::Wakeup(Wakeup::TransportTick { connection })
    }

    #[test]
    fn pops_in_time_order_and_advances_clock() {
        let q = EventQueue::new();
        q.push(SimTime::from_ticks(30), tick(3));
        q.push(SimTime::from_ticks(10), tick(1));
        q.push(SimTime::from_ticks(20), tick(2));
        assert_eq!(q.len(), 3);
        assert_eq!(q.peek_time(), Some(SimTime::from_ticks(10)));

        let order: Vec<_> = std::iter::from_fn(|| q.pop()).map(|(at, _)| at.ticks()).collect();
        assert_eq!(order, vec![10, 20, 30]);
        assert_eq!(q.now(), SimTime::from_ticks(30));
        assert!(q.is_empty());
        assert_eq!(q.dispatched(), 3);
    }

    #[test]
    fn same_instant_is_fifo() {
        let q = EventQueue::new();
        for c in 0..5 {
            q.push(SimTime::from_ticks(7), tick(c));
        }
        for c in 0..5 {
            assert_eq!(q.pop().map(|(_, e)| e), Some(tick(c)));
        }
    }

    #[test]
    fn past_events_are_clamped_to_now() {
        let q = EventQueue::new();
        q.push(SimTime::from_ticks(100), tick(0));
        q.pop();
        q.push(SimTime::from_ticks(5), tick(1));
        assert_eq!(q.pop().map(|(at, _)| at), Some(SimTime::from_ticks(100)));
    }

    #[test]
    fn works_as_injected_scheduler() {
        let q = Rc::new(EventQueue::new());
        let scheduler: Rc<dyn Scheduler> = q.clone();
        scheduler.schedule_at(SimTime::from_ticks(42), Wakeup::LinkTimeout { interface: 9 });
        let (at, event) = q.pop().unwrap();
        assert_eq!(at, SimTime::from_ticks(42));
        assert_eq!(event, Event::Wakeup(Wakeup::LinkTimeout { interface: 9 }));
        assert_eq!(scheduler.now(), SimTime::from_ticks(42));
    }
}
