//! Interactive rolling-buffer capture.
//!
//! Keeps the last five minutes of a microphone in memory and saves any
//! trailing window on request.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run
//! ```

use std::io::Write;
use std::path::PathBuf;

use rolling_capture::settings::{default_capture_file_name, default_settings_path};
use rolling_capture::{
    list_input_devices, AudioSession, CaptureRequest, DeviceDescriptor, SessionConfig,
    SessionEvent, Settings, StopOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
Commands:
  devices               list input devices
  start [index|name]    start listening (default: first device)
  stop                  stop listening
  capture               save the last N seconds
  level                 show the current input level
  dir [path]            show or set the save directory
  help                  show this help
  quit                  exit";

fn print_prompt(text: &str) {
    print!("{text}");
    std::io::stdout().flush().ok();
}

/// Reads one trimmed line; `None` on end of input.
async fn read_line(input: &mut Input) -> Option<String> {
    match input.next_line().await {
        Ok(Some(line)) => Some(line.trim().to_string()),
        Ok(None) => None,
        Err(e) => {
            tracing::error!("failed to read stdin: {}", e);
            None
        }
    }
}

fn list_devices() -> Vec<DeviceDescriptor> {
    match list_input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            eprintln!("Could not list devices: {e}");
            Vec::new()
        }
    }
}

fn print_devices(devices: &[DeviceDescriptor]) {
    if devices.is_empty() {
        println!("No input devices found.");
        return;
    }
    println!("\nAvailable input devices:");
    println!("------------------------");
    for (i, device) in devices.iter().enumerate() {
        println!("  {}. {} ({} ch)", i + 1, device.name, device.max_input_channels);
    }
}

/// Maps `start` arguments to a device id: a 1-based index or a name.
fn select_device(devices: &[DeviceDescriptor], arg: &str) -> Option<String> {
    if arg.is_empty() {
        return devices.first().map(|d| d.id.clone());
    }
    if let Ok(n) = arg.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| devices.get(i))
            .map(|d| d.id.clone());
    }
    Some(arg.to_string())
}

fn level_bar(rms: f32) -> String {
    const WIDTH: usize = 40;
    let filled = ((rms.clamp(0.0, 1.0) * WIDTH as f32).round() as usize).min(WIDTH);
    format!("[{}{}]", "#".repeat(filled), " ".repeat(WIDTH - filled))
}

fn on_event(event: SessionEvent) {
    match event {
        SessionEvent::ListeningStarted { device_id } => {
            println!("[Event] Listening on {device_id}");
        }
        SessionEvent::ListeningStopped { device_id } => {
            println!("[Event] Stopped listening on {device_id}");
        }
        SessionEvent::ProducerStatus {
            status, position, ..
        } => {
            eprintln!("[Warning] {status} at sample {position}");
        }
        SessionEvent::ResumeFailed { device_id, reason } => {
            eprintln!("[Error] Could not resume {device_id}: {reason}");
        }
        _ => {}
    }
}

async fn run_capture(session: &mut AudioSession, settings: &Settings, input: &mut Input) {
    let pause = match session.pause_for_capture() {
        Ok(pause) => pause,
        Err(e) => {
            eprintln!("Cannot capture: {e}");
            return;
        }
    };

    let max = pause.max_seconds();
    println!(
        "Paused. {:.1}s buffered.",
        pause.available().as_secs_f64()
    );

    let default_name = default_capture_file_name(chrono::Local::now());
    print_prompt(&format!("File name [{default_name}] (\"-\" to cancel): "));
    let name = match read_line(input).await {
        Some(name) if name == "-" => {
            pause.cancel();
            println!("Capture cancelled.");
            return;
        }
        Some(name) if !name.is_empty() => name,
        Some(_) => default_name,
        None => {
            pause.cancel();
            return;
        }
    };

    print_prompt(&format!("Seconds to save (1-{max}): "));
    let Some(answer) = read_line(input).await.filter(|a| !a.is_empty()) else {
        pause.cancel();
        println!("Capture cancelled.");
        return;
    };
    let Ok(duration_secs) = answer.parse::<u32>() else {
        pause.cancel();
        eprintln!("Not a number: {answer}");
        return;
    };

    let request = CaptureRequest::new(settings.resolve_capture_path(&name), duration_secs);
    match pause.export(request).await {
        Ok(info) if info.is_partial() => println!(
            "Saved {} ({:.1}s, less than requested)",
            info.path.display(),
            info.duration().as_secs_f64()
        ),
        Ok(info) => println!(
            "Saved {} ({:.1}s)",
            info.path.display(),
            info.duration().as_secs_f64()
        ),
        Err(e) => eprintln!("Capture failed: {e}"),
    }
}

fn set_directory(settings: &mut Settings, settings_path: Option<&PathBuf>, arg: &str) {
    if arg.is_empty() {
        println!("Save directory: {}", settings.save_directory.display());
        return;
    }

    let dir = PathBuf::from(arg);
    if !dir.is_dir() {
        eprintln!("Not a directory: {}", dir.display());
        return;
    }
    settings.save_directory = dir;

    if let Some(path) = settings_path {
        if let Err(e) = settings.save(path) {
            eprintln!("Could not save settings: {e}");
            return;
        }
    }
    println!("Save directory: {}", settings.save_directory.display());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings_path = default_settings_path();
    let mut settings = match settings_path.as_deref() {
        Some(path) => Settings::load(path).unwrap_or_else(|e| {
            tracing::warn!("{}; using defaults", e);
            Settings::default()
        }),
        None => Settings::default(),
    };

    println!("=== Rolling Capture ===");
    println!("Keeps the last {}s of input in memory.", rolling_capture::MAX_SECONDS);
    println!("{HELP}");

    let mut session = AudioSession::cpal(SessionConfig::default()).on_event(on_event);
    let mut devices = list_devices();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_prompt("> ");
        let Some(line) = read_line(&mut input).await else {
            break;
        };
        let (command, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line.as_str(), ""), |(c, a)| (c, a.trim()));

        match command {
            "" => {}
            "devices" => {
                devices = list_devices();
                print_devices(&devices);
            }
            "start" => match select_device(&devices, arg) {
                Some(device_id) => {
                    if let Err(e) = session.start(&device_id) {
                        eprintln!("Error starting listening: {e}");
                    }
                }
                None => eprintln!("Please select an input device (see `devices`)."),
            },
            "stop" => {
                if session.stop() == StopOutcome::NotActive {
                    println!("No listening session is currently active.");
                }
            }
            "capture" => run_capture(&mut session, &settings, &mut input).await,
            "level" => {
                let level = session.level();
                println!("{} {:6.1} dBFS", level_bar(level.rms), level.dbfs());
            }
            "dir" => set_directory(&mut settings, settings_path.as_ref(), arg),
            "help" => println!("{HELP}"),
            "quit" | "exit" => break,
            other => eprintln!("Unknown command: {other} (try `help`)"),
        }
    }

    session.stop();
    Ok(())
}
