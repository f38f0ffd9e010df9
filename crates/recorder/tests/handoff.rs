//! Simulated dual-core ping-pong handshake.
//!
//! Two cooperative tasks play the two cores of the dual-core capture
//! strategy: the driver owns slot A and the storage writes, the peer owns
//! slot B, and every ownership transfer crosses the depth-1 handoff queues.
//! The recorded trace must show the armed slot and the drained slot disjoint
//! at every step — a property of the blocking handshake, not of timing.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::arithmetic_side_effects)]

use std::cell::RefCell;
use std::rc::Rc;

use platform::capture::BufferSlot;
use recorder::coordinator::HandoffQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Armed(BufferSlot),
    Completed(BufferSlot),
    Read(BufferSlot),
}

type Trace = Rc<RefCell<Vec<Event>>>;

async fn yield_a_little() {
    embassy_futures::yield_now().await;
}

/// Driver core: fills and drains slot A, pacing the peer's slot B.
async fn driver(queue: &'static HandoffQueue, trace: Trace, cycles: u32) {
    trace.borrow_mut().push(Event::Armed(BufferSlot::A));
    for _ in 0..cycles {
        yield_a_little().await;
        trace.borrow_mut().push(Event::Completed(BufferSlot::A));
        // A is full: hand B to the peer before touching A.
        queue.request_fill(BufferSlot::B).await;
        trace.borrow_mut().push(Event::Read(BufferSlot::A));
        // Take B back before re-arming A for the next cycle.
        let slot = queue.wait_filled().await;
        assert_eq!(slot, BufferSlot::B);
        trace.borrow_mut().push(Event::Read(BufferSlot::B));
        trace.borrow_mut().push(Event::Armed(BufferSlot::A));
    }
}

/// Peer core: arms and completes slot B only when told to.
async fn peer(queue: &'static HandoffQueue, trace: Trace) {
    loop {
        let slot = queue.next_request().await;
        trace.borrow_mut().push(Event::Armed(slot));
        yield_a_little().await;
        trace.borrow_mut().push(Event::Completed(slot));
        queue.complete(slot).await;
    }
}

fn exclusivity_violations(trace: &[Event]) -> usize {
    let mut armed: Option<BufferSlot> = None;
    let mut violations = 0;
    for event in trace {
        match *event {
            Event::Armed(slot) => armed = Some(slot),
            Event::Completed(slot) => {
                if armed == Some(slot) {
                    armed = None;
                }
            }
            Event::Read(slot) => {
                if armed == Some(slot) {
                    violations += 1;
                }
            }
        }
    }
    violations
}

#[tokio::test]
async fn handshake_trace_keeps_armed_and_drained_slots_disjoint() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let queue: &'static HandoffQueue = Box::leak(Box::new(HandoffQueue::new()));
            let trace: Trace = Rc::new(RefCell::new(Vec::new()));

            let peer_trace = trace.clone();
            tokio::task::spawn_local(async move {
                peer(queue, peer_trace).await;
            });

            driver(queue, trace.clone(), 16).await;

            let events = trace.borrow();
            assert_eq!(exclusivity_violations(&events), 0);
            // Every cycle drained both slots once.
            let reads_a = events
                .iter()
                .filter(|e| **e == Event::Read(BufferSlot::A))
                .count();
            let reads_b = events
                .iter()
                .filter(|e| **e == Event::Read(BufferSlot::B))
                .count();
            assert_eq!(reads_a, 16);
            assert_eq!(reads_b, 16);
        })
        .await;
}
