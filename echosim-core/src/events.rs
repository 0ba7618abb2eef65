//! Time-ordered event queue driving the simulation loop

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Discrete events dispatched by the simulation loop. Payloads are arena
/// indices into the world's transmitter or receiver collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TxPulsedStart(usize),
    RxPulsedWindowStart(usize),
    RxPulsedWindowEnd(usize),
    TxCwStart(usize),
    TxCwEnd(usize),
    RxCwStart(usize),
    RxCwEnd(usize),
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::TxPulsedStart(_) => "TxPulsedStart",
            EventKind::RxPulsedWindowStart(_) => "RxPulsedWindowStart",
            EventKind::RxPulsedWindowEnd(_) => "RxPulsedWindowEnd",
            EventKind::TxCwStart(_) => "TxCwStart",
            EventKind::TxCwEnd(_) => "TxCwEnd",
            EventKind::RxCwStart(_) => "RxCwStart",
            EventKind::RxCwEnd(_) => "RxCwEnd",
        }
    }
}

/// One scheduled event
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
    /// Insertion sequence number: the deterministic tie-break for events
    /// sharing a timestamp
    seq: u64,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Event {}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap max-heap acts as a min-heap on
        // (timestamp, insertion order).
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of events ordered by timestamp. Events scheduled past the end
/// time are discarded at insertion.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Event>,
    next_seq: u64,
    end_time: f64,
}

impl EventQueue {
    pub fn new(end_time: f64) -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            end_time,
        }
    }

    pub fn push(&mut self, time: f64, kind: EventKind) {
        if time > self.end_time {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Event { time, kind, seq });
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn clear(&mut self, end_time: f64) {
        self.heap.clear();
        self.next_seq = 0;
        self.end_time = end_time;
    }
}
