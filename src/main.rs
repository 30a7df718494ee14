//! Entrypoint: configuration, log sink construction, ring startup, and
//! either a fixed/infinite election cycle or the interactive console
//! (SPEC_FULL.md §6, grounded on `examples/original_source/src/main.cpp`'s
//! `cycle` loop).

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};

use ringmoot::commandline::CommandLine;
use ringmoot::config::{Cli, RingConfig};
use ringmoot::error::AppError;
use ringmoot::presenter::LogPresenter;
use ringmoot::ring::Ring;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = RingConfig::resolve(cli)?;
    init_logging(&config)?;

    if !config.no_config_log {
        log::info!(
            "starting ring of {} workers (sleep={}ms, worker_sleep={}ms)",
            config.size,
            config.sleep_ms,
            config.worker_sleep_ms
        );
    }

    let presenter = Arc::new(LogPresenter::new());
    let mut ring = Ring::new(config.size, Duration::from_millis(config.worker_sleep_ms), presenter.clone());
    ring.start();

    if config.command_line {
        run_interactive(ring, presenter);
    } else {
        run_headless(&mut ring, &config);
        ring.stop();
    }

    Ok(())
}

fn init_logging(config: &RingConfig) -> Result<(), AppError> {
    let level = level_filter(config.log_level);
    let mut log_config_builder = simplelog::ConfigBuilder::new();
    if !config.log_date {
        log_config_builder.set_time_level(LevelFilter::Off);
    }
    let log_config = log_config_builder.build();

    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = Vec::new();

    if config.log_console {
        loggers.push(TermLogger::new(
            level,
            log_config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }

    if let Some(path) = &config.log_file {
        let file = std::fs::File::create(path).map_err(AppError::LogSinkInit)?;
        loggers.push(WriteLogger::new(level, log_config.clone(), file));
    }

    if loggers.is_empty() {
        loggers.push(TermLogger::new(level, Config::default(), TerminalMode::Stdout, ColorChoice::Auto));
    }

    CombinedLogger::init(loggers).map_err(|e| AppError::LogSinkInit(std::io::Error::other(e)))
}

fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::Trace,
        1 => LevelFilter::Debug,
        2 => LevelFilter::Info,
        3 => LevelFilter::Warn,
        4 | 5 => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

/// One `start_election` + sleep cycle, repeated `number_of_elections` times
/// or forever when it's 0, with a Ctrl-C flag checked between cycles.
fn run_headless(ring: &mut Ring, config: &RingConfig) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
        .expect("failed to install Ctrl-C handler");

    let sleep = Duration::from_millis(config.sleep_ms);
    let mut remaining = config.number_of_elections;
    let infinite = remaining == 0;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if !infinite {
            if remaining == 0 {
                break;
            }
            remaining -= 1;
        }
        ring.start_election();
        thread::sleep(sleep);
    }
}

fn run_interactive(ring: Ring, presenter: Arc<LogPresenter>) {
    let ring = Arc::new(Mutex::new(ring));
    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
        .expect("failed to install Ctrl-C handler");

    let mut command_line = CommandLine::new(ring.clone(), presenter);
    command_line
        .start_command_line()
        .expect("ring was injected into the command line before start");

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    command_line.exit();
    command_line.wait_for_exit();
    ring.lock().unwrap().stop();
}
