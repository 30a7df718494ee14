//! The capability consumed by [`crate::ring::Ring`] and [`crate::worker::Worker`]
//! to render events; never called back into by the core (SPEC_FULL.md §6.5).
//!
//! Grounded on `examples/original_source/include/presenters/presenter.h` (a
//! thin base interface) and `concrete_presenter/` (the console writer that
//! logs through the process-global logger). Here the logger is injected
//! rather than global, per spec.md §9's "Global logger" note.

use std::sync::{Arc, Mutex};

use crate::event::Event;

/// Hooks invoked immediately before/after an event is rendered, so a
/// `CommandLine` can clear and redraw its prompt line around the event
/// without visual corruption (spec.md §4.4's rendering invariant).
pub type OutputHook = Box<dyn Fn() + Send + Sync>;

pub trait Presenter: Send + Sync {
    fn show(&self, event: Event);
}

/// Logs every event through the `log` facade at the event's own level.
pub struct LogPresenter {
    pre_output: Mutex<Option<OutputHook>>,
    post_output: Mutex<Option<OutputHook>>,
}

impl Default for LogPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogPresenter {
    pub fn new() -> Self {
        LogPresenter {
            pre_output: Mutex::new(None),
            post_output: Mutex::new(None),
        }
    }

    /// Installed by `CommandLine::start_command_line` and removed by `exit`.
    pub fn set_hooks(&self, pre: Option<OutputHook>, post: Option<OutputHook>) {
        *self.pre_output.lock().unwrap() = pre;
        *self.post_output.lock().unwrap() = post;
    }
}

impl Presenter for LogPresenter {
    fn show(&self, event: Event) {
        if let Some(hook) = self.pre_output.lock().unwrap().as_ref() {
            hook();
        }

        log::log!(event.level().as_log_level(), "{}", event.render());

        if let Some(hook) = self.post_output.lock().unwrap().as_ref() {
            hook();
        }
    }
}

/// Convenience alias for the shared-ownership form every worker and the ring
/// hold a clone of.
pub type SharedPresenter = Arc<dyn Presenter>;
