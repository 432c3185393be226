//! spool-play - play one file through the engine
//!
//! Usage: `spool-play <file> [--config <path>]` or `spool-play --list-devices`
//!
//! Engine events are printed to stdout as JSON lines. Control messages in
//! the same JSON format can be typed on stdin, one per line.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use spool_core::audio::{output_device_names, start_output};
use spool_core::config::{default_config_path, load_config, EngineConfig};
use spool_core::engine::EngineEvent;
use spool_core::loader::SymphoniaDecoder;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct Args {
    file: Option<String>,
    config: Option<PathBuf>,
    list_devices: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut file = None;
    let mut config = None;
    let mut list_devices = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--list-devices" => list_devices = true,
            _ if file.is_none() => file = Some(arg),
            _ => bail!("unexpected argument: {}", arg),
        }
    }

    if file.is_none() && !list_devices {
        bail!("usage: spool-play <file> [--config <path>] | --list-devices");
    }
    Ok(Args {
        file,
        config,
        list_devices,
    })
}

/// Forward stdin lines to the control thread
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("Control input unavailable: {}", e);
    }
    rx
}

fn main() -> Result<()> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    if args.list_devices {
        for name in output_device_names()? {
            println!("{}", name);
        }
        return Ok(());
    }
    let Some(file) = args.file else {
        return Ok(());
    };

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config: EngineConfig = load_config(&config_path);

    let (mut controller, output) =
        start_output(&config, SymphoniaDecoder::new()).context("Failed to start audio output")?;
    log::info!(
        "Output running at {}Hz, ~{:.1}ms latency",
        output.sample_rate(),
        output.latency_ms()
    );

    controller
        .load_track(&file)
        .with_context(|| format!("Failed to request {}", file))?;

    let input = spawn_stdin_reader();

    loop {
        while let Ok(line) = input.try_recv() {
            let line = line.trim();
            if !line.is_empty() {
                // Errors are already logged by the controller
                let _ = controller.handle_message(line);
            }
        }

        for event in controller.poll_events() {
            println!("{}", serde_json::to_string(&event)?);
            if event == EngineEvent::Ended {
                return Ok(());
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}
