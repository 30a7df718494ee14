//! Event taxonomy published by [`crate::ring::Ring`] and [`crate::worker::Worker`]
//! and consumed by a [`crate::presenter::Presenter`].
//!
//! Levels per variant are grounded on the per-event `spdlog::level::level_enum`
//! tags in `examples/original_source/include/event.h`.

/// Mirrors `log::Level` plus the original's `critical` tier, which `log`
/// itself has no sixth variant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Level {
    /// The nearest `log::Level`; `Critical` collapses onto `Error`.
    pub fn as_log_level(self) -> log::Level {
        match self {
            Level::Trace => log::Level::Trace,
            Level::Debug => log::Level::Debug,
            Level::Info => log::Level::Info,
            Level::Warn => log::Level::Warn,
            Level::Error | Level::Critical => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    RingStarts,
    WorkerStarted { id: u64, position: usize },
    RingStarted,
    RingStops,
    WorkerStopped { id: u64, position: usize },

    GotMessage { id: u64, position: usize, message_kind: &'static str },

    ElectionStarted { id: u64 },
    ProposedThemselves { id: u64 },
    Participates { id: u64 },
    Resigned { id: u64 },
    ProposalForwarded { id: u64, proposal_id: u64 },
    ProposalDiscarded { id: u64, proposal_id: u64 },
    ParticipationStopped { id: u64 },
    IsElected { id: u64 },
    ElectionFinished { id: u64 },

    DeadNeighbourRecognized { id: u64, dead_id: u64, dead_position: usize },
    ColleagueRemoved { id: u64, dead_position: usize },
    ColleagueAdded { id: u64, new_position: usize },

    Log { id: u64, content: String },
    CommandError { column: usize, message: String },
    CommandNotice { message: String },
}

impl Event {
    pub fn level(&self) -> Level {
        use Event::*;
        match self {
            RingStarts | RingStops => Level::Debug,
            WorkerStarted { .. } | WorkerStopped { .. } | RingStarted => Level::Info,
            GotMessage { .. } => Level::Debug,
            ElectionStarted { .. } | IsElected { .. } | ElectionFinished { .. } => Level::Info,
            ProposedThemselves { .. }
            | Participates { .. }
            | Resigned { .. }
            | ProposalForwarded { .. }
            | ParticipationStopped { .. } => Level::Debug,
            ProposalDiscarded { .. } => Level::Debug,
            DeadNeighbourRecognized { .. } => Level::Warn,
            ColleagueRemoved { .. } | ColleagueAdded { .. } => Level::Info,
            Log { .. } => Level::Info,
            CommandError { .. } => Level::Warn,
            CommandNotice { .. } => Level::Info,
        }
    }

    /// Human-readable rendering, matching the spirit of the original's
    /// per-event `operator std::string()` overrides.
    pub fn render(&self) -> String {
        use Event::*;
        match self {
            RingStarts => "ring starting".to_string(),
            WorkerStarted { id, position } => format!("worker {id} started at position {position}"),
            RingStarted => "ring started".to_string(),
            RingStops => "ring stopping".to_string(),
            WorkerStopped { id, position } => format!("worker {id} stopped at position {position}"),
            GotMessage { id, position, message_kind } => {
                format!("worker {id} (position {position}) got message {message_kind}")
            }
            ElectionStarted { id } => format!("worker {id} starts an election"),
            ProposedThemselves { id } => format!("worker {id} proposes itself"),
            Participates { id } => format!("worker {id} participates in the election"),
            Resigned { id } => format!("worker {id} resigns as leader"),
            ProposalForwarded { id, proposal_id } => {
                format!("worker {id} forwards proposal {proposal_id}")
            }
            ProposalDiscarded { id, proposal_id } => {
                format!("worker {id} discards proposal {proposal_id}")
            }
            ParticipationStopped { id } => format!("worker {id} stops participating in the election"),
            IsElected { id } => format!("worker {id} is elected"),
            ElectionFinished { id } => format!("election finished, leader is {id}"),
            DeadNeighbourRecognized { id, dead_id, dead_position } => {
                format!("worker {id} recognized worker {dead_id} (position {dead_position}) as dead")
            }
            ColleagueRemoved { id, dead_position } => {
                format!("worker {id} removed colleague at position {dead_position}")
            }
            ColleagueAdded { id, new_position } => {
                format!("worker {id} added colleague at position {new_position}")
            }
            Log { id, content } => format!("worker {id} says: {content}"),
            CommandError { message, .. } => message.clone(),
            CommandNotice { message } => message.clone(),
        }
    }
}
