//! # Mostrador Register CLI
//!
//! Operator commands that do not need the register UI.
//!
//! ## Usage
//! ```bash
//! # Hash a supervisor PIN for terminal.toml ([supervisor] pin_hash)
//! mostrador hash-pin 4321
//!
//! # Show register, shift and cart state
//! mostrador status
//!
//! # Print an X report of the open shift
//! mostrador x-report --config ./terminal.toml
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;

use mostrador_terminal::{hash_pin, init_tracing, Notice, Terminal, TerminalConfig, TerminalResult};

const HELP: &str = "\
Mostrador register

Usage: mostrador [--config <path>] <command>

Commands:
  hash-pin <pin>   Print the argon2 hash of a supervisor PIN
  status           Show register, shift and cart state
  x-report         Print an X report of the open shift

Options:
  -c, --config <path>  Config file (default: platform config dir)
  -h, --help           Show this help";

enum Command {
    HashPin(String),
    Status,
    XReport,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut command = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("{HELP}");
                return ExitCode::SUCCESS;
            }
            "hash-pin" => {
                let Some(pin) = args.get(i + 1) else {
                    eprintln!("hash-pin needs a PIN\n\n{HELP}");
                    return ExitCode::FAILURE;
                };
                command = Some(Command::HashPin(pin.clone()));
                i += 1;
            }
            "status" => command = Some(Command::Status),
            "x-report" => command = Some(Command::XReport),
            other => {
                eprintln!("Unknown argument: {other}\n\n{HELP}");
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let Some(command) = command else {
        println!("{HELP}");
        return ExitCode::FAILURE;
    };

    match run(command, config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            let notice = Notice::from(e);
            eprintln!("{notice}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config_path: Option<PathBuf>) -> TerminalResult<()> {
    if let Command::HashPin(pin) = &command {
        println!("{}", hash_pin(pin)?);
        return Ok(());
    }

    let config = TerminalConfig::load(config_path)?;
    let terminal = Terminal::from_config(config).await?;
    let result = execute(&terminal, command).await;
    terminal.shutdown().await;
    result
}

async fn execute(terminal: &Terminal, command: Command) -> TerminalResult<()> {
    terminal.resume_shift().await?;
    match command {
        Command::Status => print_json(&terminal.status().await?),
        Command::XReport => print_json(&terminal.x_report().await?),
        Command::HashPin(_) => {}
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(body) => println!("{body}"),
        Err(e) => error!(error = %e, "Could not render output"),
    }
}
