//! The ring coordinator: worker lifecycle, identity allocation, neighbour
//! topology, and broadcast-style operator requests (spec.md §4.3).
//!
//! Grounded on the teacher's `Server::new`/`start_server`
//! (`examples/jteplitz602-Rusty-Raft/src/server/mod.rs`): a `Vec<PeerHandle>`
//! built from a construction loop, with the main context driving
//! start/election/stop. `get_unique_ids`'s rejection-sampling loop and max-id
//! formula are grounded on `examples/original_source/src/ring.cpp`.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::Rng;

use crate::buffer::MessageBuffer;
use crate::event::Event;
use crate::message::Message;
use crate::presenter::SharedPresenter;
use crate::worker::{Colleague, Worker, WorkerRuntimeStatus};

/// A status snapshot row for `get_worker_list`.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    pub id: u64,
    pub position: usize,
    pub running: bool,
}

struct WorkerHandle {
    status: Arc<WorkerRuntimeStatus>,
    join_handle: Option<JoinHandle<()>>,
}

pub struct Ring {
    buffers: Arc<Vec<MessageBuffer>>,
    ids: Arc<Vec<u64>>,
    handles: Vec<WorkerHandle>,
    sleeptime: Duration,
    presenter: SharedPresenter,
    running: bool,
    size: usize,
}

/// Generates `n` distinct ids drawn from `[0, max(999, 10*n)]` via rejection
/// sampling (spec.md §4.3).
pub fn get_unique_ids(n: usize) -> Vec<u64> {
    let max_id = std::cmp::max(999, 10 * n as u64);
    let mut ids = HashSet::with_capacity(n);
    let mut rng = rand::thread_rng();
    while ids.len() < n {
        ids.insert(rng.gen_range(0..=max_id));
    }
    ids.into_iter().collect()
}

impl Ring {
    /// # Panics
    /// Panics if `size` is zero: a ring with no workers has no colleague sets
    /// to assign, which is the same programmer-precondition violation as an
    /// empty colleague list (spec.md §7).
    pub fn new(size: usize, sleeptime: Duration, presenter: SharedPresenter) -> Self {
        assert!(size > 0, "a ring must have at least one worker");

        let ids = get_unique_ids(size);
        let buffers: Arc<Vec<MessageBuffer>> =
            Arc::new((0..size).map(|_| MessageBuffer::new()).collect());
        let ids = Arc::new(ids);

        let handles = (0..size)
            .map(|i| WorkerHandle {
                status: Arc::new(WorkerRuntimeStatus::new(ids[i], i)),
                join_handle: None,
            })
            .collect();

        Ring {
            buffers,
            ids,
            handles,
            sleeptime,
            presenter,
            running: false,
            size,
        }
    }

    fn colleagues_for(&self, i: usize) -> Vec<Colleague> {
        ((i + 1)..self.size)
            .chain(0..i)
            .map(|j| Colleague {
                id: self.ids[j],
                arena_index: j,
            })
            .collect()
    }

    /// Spawns one execution context per worker (spec.md §4.3's `start`).
    pub fn start(&mut self) {
        self.presenter.show(Event::RingStarts);

        for i in 0..self.size {
            let worker = Worker::new(
                self.ids[i],
                i,
                i,
                self.size,
                self.sleeptime,
                self.colleagues_for(i),
                self.buffers.clone(),
                self.ids.clone(),
                self.presenter.clone(),
                self.handles[i].status.clone(),
            );

            let id = self.ids[i];
            let join_handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker.run())
                .expect("failed to spawn worker thread");
            self.handles[i].join_handle = Some(join_handle);

            self.presenter.show(Event::WorkerStarted { id, position: i });
        }

        self.running = true;
        self.presenter.show(Event::RingStarted);
    }

    /// Enqueues `StartElection` at position 0 (spec.md §4.3).
    pub fn start_election(&self) {
        self.start_election_at_position(0).ok();
    }

    /// Enqueues `StartElection` at `position`. Returns `Err(())` if no worker
    /// currently sits at that position.
    pub fn start_election_at_position(&self, position: usize) -> Result<(), ()> {
        let arena_index = self.arena_index_at_position(position).ok_or(())?;
        self.buffers[arena_index].assign(Message::StartElection);
        Ok(())
    }

    /// Finds the arena slot currently reporting `position`, among running
    /// workers. `position` is a live, mutable quantity (workers shift their
    /// own position on membership changes), so this is a scan rather than a
    /// direct index.
    fn arena_index_at_position(&self, position: usize) -> Option<usize> {
        self.handles
            .iter()
            .enumerate()
            .find(|(_, handle)| handle.status.is_running() && handle.status.position() == position)
            .map(|(i, _)| i)
    }

    /// Snapshot of every worker for the `ls`/`list`/`show` command.
    pub fn get_worker_list(&self) -> Vec<WorkerInfo> {
        let mut rows: Vec<WorkerInfo> = self
            .handles
            .iter()
            .map(|handle| WorkerInfo {
                id: handle.status.id,
                position: handle.status.position(),
                running: handle.status.is_running(),
            })
            .collect();
        rows.sort_by_key(|row| row.position);
        rows
    }

    /// Formats the rows the way `examples/original_source/src/ring.cpp`'s
    /// `get_worker_list` does: `Position i: Worker <id>, Status: running`.
    pub fn worker_list_report(&self) -> String {
        let mut report = String::from("Workers:\n");
        for row in self.get_worker_list() {
            let status = if row.running { "running" } else { "stopped" };
            report.push_str(&format!(
                "Position {}: Worker {}, Status: {}\n",
                row.position, row.id, status
            ));
        }
        report
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stops every running worker and joins its execution context
    /// (spec.md §4.3's `stop`).
    pub fn stop(&mut self) {
        self.presenter.show(Event::RingStops);

        for (arena_index, handle) in self.handles.iter_mut().enumerate() {
            if !handle.status.is_running() {
                continue;
            }
            let id = handle.status.id;
            let position = handle.status.position();
            self.buffers[arena_index].assign(Message::Stop);
            if let Some(join_handle) = handle.join_handle.take() {
                join_handle.join().ok();
            }
            self.presenter.show(Event::WorkerStopped { id, position });
        }

        self.running = false;
    }
}

impl Drop for Ring {
    fn drop(&mut self) {
        if self.running {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::Presenter;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingPresenter {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl RecordingPresenter {
        /// Returns a presenter to inject plus a handle to the events it
        /// records, since `Ring`/`Worker` only ever see it as `dyn Presenter`.
        fn new() -> (SharedPresenter, Arc<Mutex<Vec<Event>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            let presenter: SharedPresenter = Arc::new(RecordingPresenter { events: events.clone() });
            (presenter, events)
        }
    }

    impl Presenter for RecordingPresenter {
        fn show(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn get_unique_ids_returns_n_distinct_values_in_range() {
        for n in [5usize, 12, 21, 100] {
            let ids = get_unique_ids(n);
            assert_eq!(ids.len(), n);
            let unique: HashSet<_> = ids.iter().collect();
            assert_eq!(unique.len(), n);
            let max_id = std::cmp::max(999, 10 * n as u64);
            assert!(ids.iter().all(|&id| id <= max_id));
        }
    }

    #[test]
    fn get_unique_ids_varies_across_calls() {
        let a: HashSet<_> = get_unique_ids(20).into_iter().collect();
        let b: HashSet<_> = get_unique_ids(20).into_iter().collect();
        assert_ne!(a, b);
    }

    #[test]
    fn election_in_ring_of_five_elects_the_max_id() {
        let (presenter, events) = RecordingPresenter::new();
        let mut ring = Ring::new(5, Duration::from_millis(20), presenter);
        let max_id = *ring.ids.iter().max().unwrap();

        ring.start();
        ring.start_election();
        thread::sleep(Duration::from_millis(800));
        ring.stop();

        let elected: Vec<u64> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                Event::IsElected { id } => Some(*id),
                _ => None,
            })
            .collect();
        let finished: Vec<u64> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                Event::ElectionFinished { id } => Some(*id),
                _ => None,
            })
            .collect();

        assert_eq!(elected, vec![max_id]);
        assert_eq!(finished, vec![max_id]);
    }

    #[test]
    fn start_election_at_out_of_range_position_fails() {
        let (presenter, _events) = RecordingPresenter::new();
        let mut ring = Ring::new(3, Duration::from_millis(20), presenter);
        ring.start();
        assert!(ring.start_election_at_position(99).is_err());
        ring.stop();
    }

    #[test]
    fn worker_list_report_lists_every_position() {
        let (presenter, _events) = RecordingPresenter::new();
        let mut ring = Ring::new(5, Duration::from_millis(20), presenter);
        ring.start();
        let report = ring.worker_list_report();
        for i in 0..5 {
            assert!(report.contains(&format!("Position {i}:")));
        }
        ring.stop();
    }
}
