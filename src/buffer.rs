//! Single-slot rendezvous channel between exactly two workers.
//!
//! Grounded on `examples/original_source/src/message_buffer.cpp`: one mutex
//! (`buffer_mtx`) guards the slot itself with two condvars (assignable /
//! takable), and a second mutex (`rendezvous_mtx`) guards a `message_is_taken`
//! flag used only by `assign_and_wait`. The two mutexes are kept separate so a
//! concurrent plain `assign` can never deadlock behind a pending rendezvous
//! wait: `assign_and_wait` releases the rendezvous lock before calling
//! `assign`, exactly as the original does.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::message::Message;

struct Slot {
    message: Option<Message>,
}

pub struct MessageBuffer {
    slot: Mutex<Slot>,
    takable: Condvar,
    assignable: Condvar,

    /// Serializes `assign_and_wait` callers FIFO (the "rendezvous lock").
    rendezvous_lock: Mutex<()>,
    /// Set by `take()`, observed by the `assign_and_wait` caller currently
    /// holding `rendezvous_lock`.
    taken: Mutex<bool>,
    taken_cond: Condvar,
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBuffer {
    pub fn new() -> Self {
        MessageBuffer {
            slot: Mutex::new(Slot { message: None }),
            takable: Condvar::new(),
            assignable: Condvar::new(),
            rendezvous_lock: Mutex::new(()),
            taken: Mutex::new(false),
            taken_cond: Condvar::new(),
        }
    }

    /// Blocks until the slot is empty, stores `message`, wakes one taker.
    /// Does not wait for consumption.
    pub fn assign(&self, message: Message) {
        let mut slot = self.slot.lock().unwrap();
        slot = self
            .assignable
            .wait_while(slot, |slot| slot.message.is_some())
            .unwrap();
        slot.message = Some(message);
        self.takable.notify_one();
    }

    /// Serializes with other rendezvous senders, assigns `message`, then waits
    /// up to `timeout` for it to be taken. Returns true iff taken in time.
    pub fn assign_and_wait(&self, message: Message, timeout: Duration) -> bool {
        let _rendezvous_guard = self.rendezvous_lock.lock().unwrap();

        {
            let mut taken = self.taken.lock().unwrap();
            *taken = false;
        }

        // Must assign before waiting on `taken`: holding the rendezvous lock
        // while blocked in `assign` would deadlock against a concurrent plain
        // `assign` call that's waiting on the same slot.
        self.assign(message);

        let taken = self.taken.lock().unwrap();
        let (taken, result) = self
            .taken_cond
            .wait_timeout_while(taken, timeout, |taken| !*taken)
            .unwrap();
        drop(taken);
        !result.timed_out()
    }

    /// Blocks until the slot is occupied, clears it, returns the message.
    pub fn take(&self) -> Message {
        let mut slot = self.slot.lock().unwrap();
        slot = self
            .takable
            .wait_while(slot, |slot| slot.message.is_none())
            .unwrap();
        let message = slot.message.take().unwrap();
        self.assignable.notify_one();

        let mut taken = self.taken.lock().unwrap();
        *taken = true;
        self.taken_cond.notify_one();

        message
    }

    /// Lock-free-ish query: true iff no message is outstanding. (Takes the
    /// slot mutex briefly, same as the original's `is_empty`.)
    pub fn is_empty(&self) -> bool {
        self.slot.lock().unwrap().message.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn assign_then_take_round_trips_the_exact_message() {
        let buf = MessageBuffer::new();
        buf.assign(Message::LogMessage { content: "buffer test message".into() });
        match buf.take() {
            Message::LogMessage { content } => assert_eq!(content, "buffer test message"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn is_empty_tracks_outstanding_message() {
        let buf = MessageBuffer::new();
        assert!(buf.is_empty());
        buf.assign(Message::NoMessage);
        assert!(!buf.is_empty());
        buf.take();
        assert!(buf.is_empty());
    }

    #[test]
    fn second_assign_blocks_until_first_is_taken() {
        let buf = Arc::new(MessageBuffer::new());
        buf.assign(Message::NoMessage);

        let buf2 = buf.clone();
        let handle = thread::spawn(move || {
            buf2.assign(Message::Stop);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        buf.take();
        handle.join().unwrap();
        assert!(matches!(buf.take(), Message::Stop));
    }

    #[test]
    fn take_on_empty_buffer_blocks_until_assigned() {
        let buf = Arc::new(MessageBuffer::new());
        let buf2 = buf.clone();
        let handle = thread::spawn(move || buf2.take());

        thread::sleep(Duration::from_millis(100));
        buf.assign(Message::LogMessage { content: "hi".into() });

        let got = handle.join().unwrap();
        assert!(matches!(got, Message::LogMessage { .. }));
    }

    #[test]
    fn assign_and_wait_returns_false_without_a_consumer() {
        let buf = MessageBuffer::new();
        let took = buf.assign_and_wait(Message::NoMessage, Duration::from_millis(25));
        assert!(!took);
    }

    #[test]
    fn assign_and_wait_returns_true_when_consumed_in_time() {
        let buf = Arc::new(MessageBuffer::new());
        let buf2 = buf.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            buf2.take()
        });

        let took = buf.assign_and_wait(Message::NoMessage, Duration::from_millis(200));
        assert!(took);
        handle.join().unwrap();
    }

    #[test]
    fn concurrent_rendezvous_callers_are_serialized_fifo() {
        let buf = Arc::new(MessageBuffer::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let buf_a = buf.clone();
        let order_a = order.clone();
        let a = thread::spawn(move || {
            let ok = buf_a.assign_and_wait(Message::LogMessage { content: "a".into() }, Duration::from_millis(500));
            order_a.lock().unwrap().push(("a", ok));
        });

        thread::sleep(Duration::from_millis(20));

        let buf_b = buf.clone();
        let order_b = order.clone();
        let b = thread::spawn(move || {
            let ok = buf_b.assign_and_wait(Message::LogMessage { content: "b".into() }, Duration::from_millis(500));
            order_b.lock().unwrap().push(("b", ok));
        });

        // A single consumer takes both messages in order; each assign_and_wait
        // call must observe its own completion.
        let start = Instant::now();
        while Instant::now().duration_since(start) < Duration::from_millis(600) {
            if !buf.is_empty() {
                buf.take();
            }
            thread::sleep(Duration::from_millis(5));
        }

        a.join().unwrap();
        b.join().unwrap();
        let order = order.lock().unwrap();
        assert_eq!(order.len(), 2);
        assert!(order.iter().all(|&(_, ok)| ok));
    }
}
