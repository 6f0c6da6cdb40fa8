use std::io::{self, BufRead};
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::Context;
use scan_core::{Msg, TrackerState, TrackerViewModel};
use scan_engine::{
    ensure_cache_dir, EngineHandle, FileSnapshotStore, HttpScanClient, MsgSender, ScanSession,
};
use scan_logging::{scan_info, scan_warn};

use crate::config::AppConfig;
use crate::input::{parse_command, Command, HELP};
use crate::render;

enum Control {
    ShowAll,
    Quit,
}

pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    scan_logging::initialize(config.log_destination(), config.log_level(), &config.log_file);
    scan_info!("Starting scan tracker against {}", config.base_url);

    let client = HttpScanClient::new(&config.client_settings()).context("configuring scan client")?;
    let client = Arc::new(client);
    let engine = EngineHandle::new(client.clone(), client).context("starting engine runtime")?;

    if let Err(err) = ensure_cache_dir(&config.cache_dir) {
        scan_warn!("Cache directory {:?} unusable: {}", config.cache_dir, err);
    }
    let store = FileSnapshotStore::new(&config.cache_dir).with_session(config.session_label());
    let state = TrackerState::new(config.tracker.clone()).with_mirror(Box::new(store));

    let mut session = ScanSession::new(state, engine);
    let (control_tx, control_rx) = mpsc::channel::<Control>();
    spawn_input_thread(session.sender(), control_tx);

    println!("{HELP}");
    let mut last_signature = String::new();
    let mut last_log_line: Option<String> = None;
    session.start();
    show(&session.view(), &mut last_signature, &mut last_log_line, false);

    while let Some(changed) = session.blocking_process_next() {
        let mut force = false;
        let mut quit = false;
        while let Ok(control) = control_rx.try_recv() {
            match control {
                Control::ShowAll => force = true,
                Control::Quit => quit = true,
            }
        }
        if quit {
            break;
        }
        if changed.is_some() || force {
            show(&session.view(), &mut last_signature, &mut last_log_line, force);
        }
    }

    session.shutdown();
    scan_info!("Scan tracker stopped");
    Ok(())
}

fn show(
    view: &TrackerViewModel,
    last_signature: &mut String,
    last_log_line: &mut Option<String>,
    force: bool,
) {
    if let Some(line) = view.log_lines.last() {
        if last_log_line.as_ref() != Some(line) {
            println!("> {line}");
            *last_log_line = Some(line.clone());
        }
    }
    let signature = render::signature(view);
    if force || signature != *last_signature {
        for line in render::render(view) {
            println!("{line}");
        }
        *last_signature = signature;
    }
}

fn spawn_input_thread(msg_tx: MsgSender, control_tx: mpsc::Sender<Control>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let control = match parse_command(&line) {
                Ok(None) => continue,
                Ok(Some(Command::Dispatch(msg))) => {
                    if msg_tx.send(msg).is_err() {
                        return;
                    }
                    continue;
                }
                Ok(Some(Command::List)) => Control::ShowAll,
                Ok(Some(Command::Help)) => {
                    println!("{HELP}");
                    continue;
                }
                Ok(Some(Command::Quit)) => Control::Quit,
                Err(err) => {
                    println!("{err}");
                    continue;
                }
            };
            let quitting = matches!(control, Control::Quit);
            // Wake the main loop so it sees the control message.
            if control_tx.send(control).is_err() || msg_tx.send(Msg::NoOp).is_err() {
                return;
            }
            if quitting {
                return;
            }
        }
        // stdin closed
        let _ = control_tx.send(Control::Quit);
        let _ = msg_tx.send(Msg::NoOp);
    });
}
