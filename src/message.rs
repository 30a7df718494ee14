//! The messages exchanged between workers over a [`crate::buffer::MessageBuffer`].
//!
//! The original implementation used a base class plus downcasts
//! (`examples/original_source/include/messages.h`); here it's a plain tagged
//! sum, matched on directly.

/// A worker reference used by membership messages, carried by value since the
/// arena is a flat `Vec` of buffers shared behind an `Arc` (see `crate::ring`).
pub type WorkerRef = usize;

#[derive(Debug, Clone)]
pub enum Message {
    NoMessage,
    LogMessage { content: String },
    Stop,
    StartElection,
    ElectionProposal { id: u64 },
    Elected { id: u64 },
    DeadWorker { position: usize },
    NewWorker { position: usize, worker_ref: WorkerRef },
}

impl Message {
    /// A short tag for event payloads and log lines, so a `GotMessage` event
    /// doesn't have to carry the whole (possibly large) message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::NoMessage => "NoMessage",
            Message::LogMessage { .. } => "LogMessage",
            Message::Stop => "Stop",
            Message::StartElection => "StartElection",
            Message::ElectionProposal { .. } => "ElectionProposal",
            Message::Elected { .. } => "Elected",
            Message::DeadWorker { .. } => "DeadWorker",
            Message::NewWorker { .. } => "NewWorker",
        }
    }
}
