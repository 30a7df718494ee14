//! The interactive operator console (spec.md §4.4): raw-mode reader context,
//! edit buffer/history, a PEG command grammar, and dispatch into [`Ring`].
//!
//! Grounded on `examples/r3bl-org-r3bl-open-core/tui/src/readline_async/choose_impl/keypress_reader_sync.rs`
//! for the synchronous `crossterm::event::read()` shape, and on
//! `examples/original_source/include/presenters/command_line.h` for the
//! edit-buffer/history/output-mutex semantics.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;

use crate::event::Event;
use crate::presenter::{LogPresenter, Presenter};
use crate::ring::Ring;

const PROMPT: &str = "> ";
const MAX_HISTORY: usize = 100;
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A parsed operator command (spec.md §4.4's grammar).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    List,
    Exit,
    StartElection(Option<usize>),
    Stop(Vec<usize>),
    Start(Vec<usize>),
}

peg::parser! {
    grammar command_grammar() for str {
        rule ws() = [' ' | '\t']*

        rule pos() -> usize
            = n:$(['0'..='9']+) { n.parse().unwrap_or(usize::MAX) }

        rule positions() -> Vec<usize>
            = ws() first:pos() rest:(ws() p:pos() { p })* { let mut v = vec![first]; v.extend(rest); v }

        rule help() -> Command
            = ("help" / "h") { Command::Help }

        rule list() -> Command
            = ("show" / "list" / "ls") { Command::List }

        rule exit() -> Command
            = ("quit" / "q" / "exit") { Command::Exit }

        rule start_election() -> Command
            = "start-election" p:(ws() p:pos() { p })? { Command::StartElection(p) }

        rule stop() -> Command
            = "stop" positions:positions() { Command::Stop(positions) }

        rule start() -> Command
            = "start" positions:positions() { Command::Start(positions) }

        pub rule procedure() -> Command
            = ws() c:(start_election() / stop() / start() / help() / list() / exit()) ws() { c }
    }
}

/// An error from parsing a command line, carrying the column to draw the
/// caret marker under (spec.md §4.4's "parse errors draw a caret column").
#[derive(Debug)]
pub struct ParseError {
    pub column: usize,
    pub message: String,
}

fn parse_command(line: &str) -> Result<Command, ParseError> {
    let normalized = line.trim().to_ascii_lowercase();
    command_grammar::procedure(&normalized).map_err(|err| ParseError {
        column: err.location.column.saturating_sub(1),
        message: format!("unrecognized command near column {}", err.location.column),
    })
}

struct EditState {
    current_input: String,
    cursor_position: usize,
    input_history: Vec<String>,
    next_input_history_index: Option<usize>,
    original_input: String,
}

impl EditState {
    fn new() -> Self {
        EditState {
            current_input: String::new(),
            cursor_position: 0,
            input_history: Vec::new(),
            next_input_history_index: None,
            original_input: String::new(),
        }
    }

    fn push_history(&mut self, entry: String) {
        if self.input_history.first() != Some(&entry) {
            self.input_history.insert(0, entry);
            self.input_history.truncate(MAX_HISTORY);
        }
        self.next_input_history_index = None;
    }

    fn history_up(&mut self) {
        let next = match self.next_input_history_index {
            None => 0,
            Some(i) if i + 1 < self.input_history.len() => i + 1,
            Some(i) => i,
        };
        if self.next_input_history_index.is_none() {
            self.original_input = self.current_input.clone();
        }
        if let Some(entry) = self.input_history.get(next) {
            self.current_input = entry.clone();
            self.cursor_position = self.current_input.len();
            self.next_input_history_index = Some(next);
        }
    }

    fn history_down(&mut self) {
        match self.next_input_history_index {
            None => {}
            Some(0) => {
                self.current_input = self.original_input.clone();
                self.cursor_position = self.current_input.len();
                self.next_input_history_index = None;
            }
            Some(i) => {
                let next = i - 1;
                self.current_input = self.input_history[next].clone();
                self.cursor_position = self.current_input.len();
                self.next_input_history_index = Some(next);
            }
        }
    }
}

/// The interactive console: owns a reader thread once started, wraps writes
/// to stdout in `output_mtx`, and drives a shared [`Ring`].
pub struct CommandLine {
    ring: Arc<Mutex<Ring>>,
    presenter: Arc<LogPresenter>,
    output_mtx: Arc<Mutex<()>>,
    state: Arc<Mutex<EditState>>,
    running: Arc<AtomicBool>,
    exit_signal: Arc<(Mutex<bool>, Condvar)>,
    reader: Option<JoinHandle<()>>,
}

impl CommandLine {
    pub fn new(ring: Arc<Mutex<Ring>>, presenter: Arc<LogPresenter>) -> Self {
        CommandLine {
            ring,
            presenter,
            output_mtx: Arc::new(Mutex::new(())),
            state: Arc::new(Mutex::new(EditState::new())),
            running: Arc::new(AtomicBool::new(false)),
            exit_signal: Arc::new((Mutex::new(false), Condvar::new())),
            reader: None,
        }
    }

    fn redraw(output_mtx: &Mutex<()>, state: &Mutex<EditState>) {
        let _guard = output_mtx.lock().unwrap();
        let state = state.lock().unwrap();
        print!("\r\x1b[2K{PROMPT}{}", state.current_input);
        let column = PROMPT.len() + state.cursor_position;
        print!("\r\x1b[{}C", column);
        std::io::stdout().flush().ok();
    }

    /// Installs the pre/post output hooks so the Presenter clears and
    /// redraws this prompt around every event it shows (spec.md §4.4's
    /// rendering invariant), then spawns the raw-mode reader context.
    ///
    /// # Errors
    /// Returns an error string if `Ring` was not already injected — the
    /// programmer-precondition violation spec.md §7 calls out.
    pub fn start_command_line(&mut self) -> Result<(), String> {
        if self.running.load(Ordering::SeqCst) {
            return Err("command line already running".to_string());
        }

        terminal::enable_raw_mode().map_err(|e| e.to_string())?;
        self.running.store(true, Ordering::SeqCst);

        let output_mtx = self.output_mtx.clone();
        let state = self.state.clone();
        let pre_mtx = output_mtx.clone();
        let pre_state = state.clone();
        let post_mtx = output_mtx.clone();
        let post_state = state.clone();

        self.presenter.set_hooks(
            Some(Box::new(move || {
                let _guard = pre_mtx.lock().unwrap();
                print!("\r\x1b[2K");
                std::io::stdout().flush().ok();
                let _ = &pre_state;
            })),
            Some(Box::new(move || {
                Self::redraw(&post_mtx, &post_state);
            })),
        );

        Self::redraw(&self.output_mtx, &self.state);

        let ring = self.ring.clone();
        let presenter = self.presenter.clone();
        let output_mtx = self.output_mtx.clone();
        let state = self.state.clone();
        let running = self.running.clone();
        let exit_signal = self.exit_signal.clone();

        self.reader = Some(thread::spawn(move || {
            Self::read_loop(ring, presenter, output_mtx, state, running, exit_signal);
        }));

        Ok(())
    }

    fn read_loop(
        ring: Arc<Mutex<Ring>>,
        presenter: Arc<LogPresenter>,
        output_mtx: Arc<Mutex<()>>,
        state: Arc<Mutex<EditState>>,
        running: Arc<AtomicBool>,
        exit_signal: Arc<(Mutex<bool>, Condvar)>,
    ) {
        let mut escape_buf: Vec<char> = Vec::new();
        let mut in_escape = false;

        while running.load(Ordering::SeqCst) {
            let has_event = match event::poll(POLL_INTERVAL) {
                Ok(ready) => ready,
                Err(_) => break,
            };
            if !has_event {
                continue;
            }
            let term_event = match event::read() {
                Ok(e) => e,
                Err(_) => continue,
            };
            let TermEvent::Key(KeyEvent { code, modifiers, .. }) = term_event else {
                continue;
            };

            if in_escape {
                if let KeyCode::Char(c) = code {
                    escape_buf.push(c);
                    if Self::handle_escape_sequence(&escape_buf, &state) {
                        in_escape = false;
                        escape_buf.clear();
                        Self::redraw(&output_mtx, &state);
                    } else if escape_buf.len() >= 3 {
                        in_escape = false;
                        escape_buf.clear();
                    }
                }
                continue;
            }

            match code {
                KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                KeyCode::Esc => {
                    in_escape = true;
                    escape_buf.clear();
                }
                KeyCode::Enter => {
                    let line = {
                        let mut s = state.lock().unwrap();
                        let line = s.current_input.clone();
                        s.push_history(line.clone());
                        s.current_input.clear();
                        s.cursor_position = 0;
                        line
                    };
                    {
                        let _guard = output_mtx.lock().unwrap();
                        println!();
                    }
                    Self::dispatch(&line, &ring, presenter.as_ref(), &output_mtx);
                    Self::redraw(&output_mtx, &state);
                }
                KeyCode::Backspace => {
                    {
                        let mut s = state.lock().unwrap();
                        if s.cursor_position > 0 {
                            let idx = s.cursor_position - 1;
                            s.current_input.remove(idx);
                            s.cursor_position -= 1;
                        }
                    }
                    Self::redraw(&output_mtx, &state);
                }
                KeyCode::Char(c) => {
                    {
                        let mut s = state.lock().unwrap();
                        let idx = s.cursor_position;
                        s.current_input.insert(idx, c);
                        s.cursor_position += 1;
                    }
                    Self::redraw(&output_mtx, &state);
                }
                _ => {}
            }
        }

        terminal::disable_raw_mode().ok();
        running.store(false, Ordering::SeqCst);
        let (lock, cvar) = &*exit_signal;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    /// Returns true once the accumulated escape buffer matched a complete
    /// sequence (spec.md §4.4: `[A`/`[B`/`[C`/`[D`/`[3~`).
    fn handle_escape_sequence(buf: &[char], state: &Mutex<EditState>) -> bool {
        if buf.len() < 2 || buf[0] != '[' {
            return buf.len() >= 1 && buf[0] != '[';
        }
        match buf[1] {
            'A' => {
                state.lock().unwrap().history_up();
                true
            }
            'B' => {
                state.lock().unwrap().history_down();
                true
            }
            'C' => {
                let mut s = state.lock().unwrap();
                if s.cursor_position < s.current_input.len() {
                    s.cursor_position += 1;
                }
                true
            }
            'D' => {
                let mut s = state.lock().unwrap();
                if s.cursor_position > 0 {
                    s.cursor_position -= 1;
                }
                true
            }
            '3' => {
                if buf.len() < 3 {
                    return false;
                }
                if buf[2] == '~' {
                    let mut s = state.lock().unwrap();
                    if s.cursor_position < s.current_input.len() {
                        let idx = s.cursor_position;
                        s.current_input.remove(idx);
                    }
                }
                true
            }
            _ => true,
        }
    }

    fn dispatch(line: &str, ring: &Mutex<Ring>, presenter: &dyn Presenter, output_mtx: &Mutex<()>) {
        if line.trim().is_empty() {
            return;
        }
        match parse_command(line) {
            Ok(Command::Help) => {
                let _guard = output_mtx.lock().unwrap();
                println!("commands: help, list, start-election [pos], stop <pos>+, start <pos>+, quit");
            }
            Ok(Command::List) => {
                let report = ring.lock().unwrap().worker_list_report();
                let _guard = output_mtx.lock().unwrap();
                print!("{report}");
            }
            Ok(Command::Exit) => {
                presenter.show(Event::CommandNotice {
                    message: "exiting".to_string(),
                });
            }
            Ok(Command::StartElection(None)) => {
                ring.lock().unwrap().start_election();
            }
            Ok(Command::StartElection(Some(pos))) => {
                let result = ring.lock().unwrap().start_election_at_position(pos);
                if result.is_err() {
                    presenter.show(Event::CommandNotice {
                        message: format!("no Worker on position {pos}"),
                    });
                }
            }
            Ok(Command::Stop(_)) | Ok(Command::Start(_)) => {
                presenter.show(Event::CommandNotice {
                    message: "stop/start of individual positions is not yet supported".to_string(),
                });
            }
            Err(err) => {
                let _guard = output_mtx.lock().unwrap();
                println!("{}^", " ".repeat(err.column));
                println!("{}", err.message);
            }
        }
    }

    /// Clears `running`, detaches the output hooks, restores cooked mode,
    /// and signals any `wait_for_exit` caller (spec.md §4.4).
    pub fn exit(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            reader.join().ok();
        }
        self.presenter.set_hooks(None, None);
        {
            let _guard = self.output_mtx.lock().unwrap();
            println!();
        }
        terminal::disable_raw_mode().ok();
        let (lock, cvar) = &*self.exit_signal;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    /// Blocks until `running` is false.
    pub fn wait_for_exit(&self) {
        let (lock, cvar) = &*self.exit_signal;
        let guard = lock.lock().unwrap();
        let _unused = cvar.wait_while(guard, |done| !*done).unwrap();
    }
}
