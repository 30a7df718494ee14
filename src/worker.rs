//! The worker state machine: election participation, leadership, forwarding,
//! dead-neighbour detection, new-worker insertion, position tracking
//! (spec.md §4.2).
//!
//! Grounded on the teacher's `Peer`/`PeerHandle`
//! (`examples/jteplitz602-Rusty-Raft/src/server/peer.rs`): one background
//! thread per remote actor, communicating only through message enums, with a
//! `JoinHandle` tracked for liveness. Per spec.md §9's "Reference-graph of
//! workers" and "Asynchronous delivery" notes, the teacher's pointer-rich,
//! future-based original is replaced here by an arena: `Ring` owns a flat
//! `Arc<Vec<MessageBuffer>>` (stable for the process lifetime; dead slots are
//! simply no longer referenced by anyone's `colleagues`), each worker knows
//! only its own arena index and the arena indices of its colleagues, and the
//! "previous_send pending-future" is a `JoinHandle<bool>` joined on the next
//! send — the strict-ownership equivalent of a goroutine-plus-channel
//! liveness signal.

use std::cmp;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::buffer::MessageBuffer;
use crate::event::Event;
use crate::message::Message;
use crate::presenter::SharedPresenter;

/// A peer in send-distance order, resolved against the shared arena.
#[derive(Debug, Clone, Copy)]
pub struct Colleague {
    pub id: u64,
    pub arena_index: usize,
}

/// The subset of a worker's state that outlives the worker's own thread, for
/// `Ring::get_worker_list` and similar external reads. The worker's own
/// `position`/`running` fields are canonical; these are mirrors updated
/// whenever the canonical value changes.
#[derive(Debug)]
pub struct WorkerRuntimeStatus {
    pub id: u64,
    pub running: AtomicBool,
    pub position: AtomicUsize,
}

impl WorkerRuntimeStatus {
    pub fn new(id: u64, position: usize) -> Self {
        WorkerRuntimeStatus {
            id,
            running: AtomicBool::new(false),
            position: AtomicUsize::new(position),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn position(&self) -> usize {
        self.position.load(Ordering::SeqCst)
    }
}

struct PendingSend {
    target_id: u64,
    target_position: usize,
    handle: JoinHandle<bool>,
}

pub struct Worker {
    id: u64,
    arena_index: usize,
    position: usize,
    ring_size: usize,
    is_leader: bool,
    participates_in_election: bool,
    sleeptime: Duration,
    colleagues: Vec<Colleague>,
    buffers: Arc<Vec<MessageBuffer>>,
    ids: Arc<Vec<u64>>,
    presenter: SharedPresenter,
    status: Arc<WorkerRuntimeStatus>,
    previous_send: Option<PendingSend>,
}

impl Worker {
    /// # Panics
    /// Panics if `colleagues` is empty: a worker with no peers cannot
    /// participate in the ring protocol (spec.md §7's "Programmer
    /// precondition" row — this can only happen from a ring of size < 2).
    pub fn new(
        id: u64,
        arena_index: usize,
        position: usize,
        ring_size: usize,
        sleeptime: Duration,
        colleagues: Vec<Colleague>,
        buffers: Arc<Vec<MessageBuffer>>,
        ids: Arc<Vec<u64>>,
        presenter: SharedPresenter,
        status: Arc<WorkerRuntimeStatus>,
    ) -> Self {
        assert!(!colleagues.is_empty(), "a worker must have at least one colleague");
        Worker {
            id,
            arena_index,
            position,
            ring_size,
            is_leader: false,
            participates_in_election: false,
            sleeptime,
            colleagues,
            buffers,
            ids,
            presenter,
            status,
            previous_send: None,
        }
    }

    /// The execution loop: sleeps, takes a message, dispatches, repeats until
    /// `Stop` (spec.md §4.2's "Main loop").
    pub fn run(mut self) {
        self.status.running.store(true, Ordering::SeqCst);
        loop {
            thread::sleep(self.sleeptime);
            let message = self.buffers[self.arena_index].take();
            let kind = message.kind();
            self.presenter.show(Event::GotMessage {
                id: self.id,
                position: self.position,
                message_kind: kind,
            });

            match message {
                Message::NoMessage => {}
                Message::LogMessage { content } => {
                    self.presenter.show(Event::Log { id: self.id, content });
                }
                Message::Stop => break,
                Message::StartElection => self.start_election(),
                Message::ElectionProposal { id } => self.participate_in_election(id),
                Message::Elected { id } => self.end_election(id),
                Message::DeadWorker { position } => self.handle_dead_worker(position),
                Message::NewWorker { position, worker_ref } => {
                    self.add_new_worker(position, worker_ref)
                }
            }
        }
        self.status.running.store(false, Ordering::SeqCst);
    }

    fn start_election(&mut self) {
        self.participates_in_election = true;
        self.presenter.show(Event::ElectionStarted { id: self.id });
        self.presenter.show(Event::ProposedThemselves { id: self.id });
        self.send_to_neighbour(Message::ElectionProposal { id: self.id });
    }

    fn participate_in_election(&mut self, proposal_id: u64) {
        if self.is_leader {
            self.presenter.show(Event::Resigned { id: self.id });
            self.is_leader = false;
        }

        let already_participated = self.participates_in_election;
        if !already_participated {
            self.participates_in_election = true;
            self.presenter.show(Event::Participates { id: self.id });
        }

        match proposal_id.cmp(&self.id) {
            cmp::Ordering::Greater => {
                self.presenter.show(Event::ProposalForwarded {
                    id: self.id,
                    proposal_id,
                });
                self.send_to_neighbour(Message::ElectionProposal { id: proposal_id });
            }
            cmp::Ordering::Equal => {
                self.is_leader = true;
                self.participates_in_election = false;
                self.presenter.show(Event::ParticipationStopped { id: self.id });
                self.send_to_neighbour(Message::Elected { id: self.id });
                self.presenter.show(Event::IsElected { id: self.id });
            }
            cmp::Ordering::Less => {
                if already_participated {
                    self.presenter.show(Event::ProposalDiscarded {
                        id: self.id,
                        proposal_id,
                    });
                } else {
                    self.presenter.show(Event::ProposedThemselves { id: self.id });
                    self.send_to_neighbour(Message::ElectionProposal { id: self.id });
                }
            }
        }
    }

    fn end_election(&mut self, elected_id: u64) {
        if elected_id == self.id {
            self.presenter.show(Event::ElectionFinished { id: self.id });
        } else {
            self.participates_in_election = false;
            self.presenter.show(Event::ParticipationStopped { id: self.id });
            self.send_to_neighbour(Message::Elected { id: elected_id });
        }
    }

    /// `max(1000ms, 2.5 * sleeptime)` — spec.md §4.2's rendezvous timeout.
    fn rendezvous_timeout(&self) -> Duration {
        let scaled = self.sleeptime.mul_f64(2.5);
        cmp::max(Duration::from_millis(1000), scaled)
    }

    fn send_to_neighbour(&mut self, message: Message) {
        if let Some(pending) = self.previous_send.take() {
            let delivered = pending.handle.join().unwrap_or(false);
            if !delivered {
                self.presenter.show(Event::DeadNeighbourRecognized {
                    id: self.id,
                    dead_id: pending.target_id,
                    dead_position: pending.target_position,
                });
                self.remove_dead_worker(pending.target_position);
            }
        }

        let target = self.colleagues[0];
        let target_position = self.position_of_index(0);
        let buffers = self.buffers.clone();
        let timeout = self.rendezvous_timeout();
        let handle = thread::spawn(move || buffers[target.arena_index].assign_and_wait(message, timeout));

        self.previous_send = Some(PendingSend {
            target_id: target.id,
            target_position,
            handle,
        });
    }

    /// The ring position of `self.colleagues[index]`, the inverse of
    /// `neighbours_index_for_position`.
    fn position_of_index(&self, index: usize) -> usize {
        (self.position + index + 1) % self.ring_size
    }

    /// spec.md §4.2: `(p - self.position - 1) mod ring_size`.
    fn neighbours_index_for_position(&self, position: usize) -> usize {
        let p = position as i64;
        let self_position = self.position as i64;
        let ring_size = self.ring_size as i64;
        (p - self_position - 1).rem_euclid(ring_size) as usize
    }

    fn handle_dead_worker(&mut self, position: usize) {
        let direct_successor_position = (self.position + 1) % self.ring_size;
        if position != direct_successor_position {
            self.remove_dead_worker(position);
        }
        // else: already processed by this worker when it originated the wave.
    }

    fn remove_dead_worker(&mut self, position: usize) {
        let index = self.neighbours_index_for_position(position);
        self.presenter.show(Event::ColleagueRemoved {
            id: self.id,
            dead_position: position,
        });
        self.colleagues.remove(index);
        self.ring_size -= 1;
        if position < self.position {
            self.position -= 1;
            self.status.position.store(self.position, Ordering::SeqCst);
        }
        self.send_to_neighbour(Message::DeadWorker { position });
    }

    fn add_new_worker(&mut self, position: usize, worker_ref: usize) {
        let index = self.neighbours_index_for_position(position);
        let already_absorbed =
            index < self.colleagues.len() && self.colleagues[index].arena_index == worker_ref;
        if already_absorbed {
            return;
        }

        self.presenter.show(Event::ColleagueAdded {
            id: self.id,
            new_position: position,
        });
        self.colleagues.insert(
            index,
            Colleague {
                id: self.ids[worker_ref],
                arena_index: worker_ref,
            },
        );
        self.ring_size += 1;
        if position <= self.position {
            self.position += 1;
            self.status.position.store(self.position, Ordering::SeqCst);
        }
        self.send_to_neighbour(Message::NewWorker { position, worker_ref });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::Presenter;
    use std::sync::Mutex;

    struct RecordingPresenter {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingPresenter {
        fn new() -> Self {
            RecordingPresenter { events: Mutex::new(Vec::new()) }
        }
    }

    impl Presenter for RecordingPresenter {
        fn show(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn ring_size(n: usize, sleeptime_ms: u64) -> (Arc<Vec<MessageBuffer>>, Arc<Vec<u64>>, Vec<u64>, Duration) {
        let buffers = Arc::new((0..n).map(|_| MessageBuffer::new()).collect());
        let ids: Vec<u64> = (0..n).map(|i| (i as u64 + 1) * 10).collect();
        (buffers, Arc::new(ids.clone()), ids, Duration::from_millis(sleeptime_ms))
    }

    fn colleagues_for(i: usize, n: usize, ids: &[u64]) -> Vec<Colleague> {
        ((i + 1)..n)
            .chain(0..i)
            .map(|j| Colleague { id: ids[j], arena_index: j })
            .collect()
    }

    #[test]
    fn neighbours_index_for_position_matches_send_distance_order() {
        let (buffers, ids_arc, ids, sleeptime) = ring_size(5, 10);
        let status = Arc::new(WorkerRuntimeStatus::new(ids[2], 2));
        let presenter: SharedPresenter = Arc::new(RecordingPresenter::new());
        let worker = Worker::new(
            ids[2],
            2,
            2,
            5,
            sleeptime,
            colleagues_for(2, 5, &ids),
            buffers,
            ids_arc,
            presenter,
            status,
        );
        assert_eq!(worker.neighbours_index_for_position(3), 0);
        assert_eq!(worker.neighbours_index_for_position(4), 1);
        assert_eq!(worker.neighbours_index_for_position(0), 2);
        assert_eq!(worker.neighbours_index_for_position(1), 3);
    }

    #[test]
    fn proposal_greater_than_self_is_forwarded_unchanged() {
        let (buffers, ids_arc, ids, sleeptime) = ring_size(2, 5);
        let status = Arc::new(WorkerRuntimeStatus::new(ids[1], 0));
        let presenter: SharedPresenter = Arc::new(RecordingPresenter::new());
        let mut worker = Worker::new(
            ids[1],
            1,
            0,
            2,
            sleeptime,
            colleagues_for(1, 2, &ids),
            buffers.clone(),
            ids_arc,
            presenter,
            status,
        );
        worker.participate_in_election(ids[0] + 1000);
        let forwarded = buffers[0].take();
        match forwarded {
            Message::ElectionProposal { id } => assert_eq!(id, ids[0] + 1000),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn equal_proposal_elects_self_and_announces() {
        let (buffers, ids_arc, ids, sleeptime) = ring_size(2, 5);
        let status = Arc::new(WorkerRuntimeStatus::new(ids[0], 0));
        let presenter: SharedPresenter = Arc::new(RecordingPresenter::new());
        let mut worker = Worker::new(
            ids[0],
            0,
            0,
            2,
            sleeptime,
            colleagues_for(0, 2, &ids),
            buffers.clone(),
            ids_arc,
            presenter,
            status,
        );
        worker.participate_in_election(ids[0]);
        assert!(worker.is_leader);
        assert!(!worker.participates_in_election);
        let announced = buffers[1].take();
        assert!(matches!(announced, Message::Elected { id } if id == ids[0]));
    }

    #[test]
    fn smaller_proposal_is_discarded_when_already_participating() {
        let (buffers, ids_arc, ids, sleeptime) = ring_size(2, 5);
        let status = Arc::new(WorkerRuntimeStatus::new(ids[1], 0));
        let presenter: SharedPresenter = Arc::new(RecordingPresenter::new());
        let mut worker = Worker::new(
            ids[1],
            1,
            0,
            2,
            sleeptime,
            colleagues_for(1, 2, &ids),
            buffers.clone(),
            ids_arc,
            presenter,
            status,
        );
        worker.participates_in_election = true;
        worker.participate_in_election(ids[0]);
        assert!(buffers[0].is_empty());
    }

    #[test]
    fn remove_dead_worker_shrinks_colleagues_and_shifts_position() {
        let (buffers, ids_arc, ids, sleeptime) = ring_size(4, 5);
        // Worker at position 1 loses its successor at position 2.
        let status = Arc::new(WorkerRuntimeStatus::new(ids[1], 1));
        let presenter: SharedPresenter = Arc::new(RecordingPresenter::new());
        let mut worker = Worker::new(
            ids[1],
            1,
            1,
            4,
            sleeptime,
            colleagues_for(1, 4, &ids),
            buffers.clone(),
            ids_arc,
            presenter,
            status,
        );
        worker.remove_dead_worker(2);
        assert_eq!(worker.colleagues.len(), 2);
        assert_eq!(worker.ring_size, 3);
        assert_eq!(worker.position, 1); // 2 is not < 1, no shift
        let forwarded = buffers[3].take();
        assert!(matches!(forwarded, Message::DeadWorker { position: 2 }));
    }

    #[test]
    fn remove_dead_worker_before_self_decrements_position() {
        let (buffers, ids_arc, ids, sleeptime) = ring_size(4, 5);
        let status = Arc::new(WorkerRuntimeStatus::new(ids[3], 3));
        let presenter: SharedPresenter = Arc::new(RecordingPresenter::new());
        let mut worker = Worker::new(
            ids[3],
            3,
            3,
            4,
            sleeptime,
            colleagues_for(3, 4, &ids),
            buffers,
            ids_arc,
            presenter,
            status,
        );
        worker.remove_dead_worker(1);
        assert_eq!(worker.position, 2);
        assert_eq!(worker.status.position(), 2);
    }

    #[test]
    fn add_new_worker_grows_colleagues_and_swallows_second_pass() {
        // Arena has 4 slots; only 0..3 form the ring so far. Slot 3 is the
        // not-yet-wired-in new worker.
        let (buffers, ids_arc, ids, sleeptime) = ring_size(4, 5);
        let status = Arc::new(WorkerRuntimeStatus::new(ids[0], 0));
        let presenter: SharedPresenter = Arc::new(RecordingPresenter::new());
        let mut worker = Worker::new(
            ids[0],
            0,
            0,
            3,
            sleeptime,
            colleagues_for(0, 3, &ids),
            buffers.clone(),
            ids_arc,
            presenter,
            status,
        );
        worker.add_new_worker(0, 3);
        assert_eq!(worker.colleagues.len(), 3);
        assert_eq!(worker.ring_size, 4);
        assert_eq!(worker.position, 1);
        buffers[1].take(); // drain the forwarded NewWorker

        // Simulate the message completing a full lap and coming back.
        worker.add_new_worker(0, 3);
        assert_eq!(worker.colleagues.len(), 3); // unchanged: swallowed
        assert!(buffers[1].is_empty());
    }
}
