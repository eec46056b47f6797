//! Console intents read from stdin.
//!
//! One command per line:
//!
//! ```text
//! pause | resume | speed <x> | density <x> | mode <name> | reset | reconnect | quit
//! ```

use crossview_core::{ClientHandle, ClientRequest};
use crossview_types::ControlIntent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Usage line shown after an unrecognized command.
pub const USAGE: &str =
    "pause | resume | speed <x> | density <x> | mode <name> | reset | reconnect | quit";

/// Errors that can occur when parsing a console line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    /// The first word is not a known command.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// The command needs an argument.
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),

    /// The argument is not a finite number.
    #[error("{command}: {value:?} is not a number")]
    InvalidNumber {
        /// Command name.
        command: &'static str,
        /// The argument given.
        value: String,
    },
}

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_console_line(line: &str) -> Result<Option<ClientRequest>, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();

    let request = match command.to_ascii_lowercase().as_str() {
        "pause" => ClientRequest::Control(ControlIntent::pause()),
        "resume" => ClientRequest::Control(ControlIntent::resume()),
        "speed" => ClientRequest::Control(ControlIntent::speed(number("speed", argument)?)),
        "density" => {
            ClientRequest::Control(ControlIntent::density(number("density", argument)?))
        }
        "mode" => {
            let mode = argument.ok_or(ConsoleError::MissingArgument("mode"))?;
            ClientRequest::Control(ControlIntent::traffic_mode(mode))
        }
        "reset" => ClientRequest::Control(ControlIntent::reset()),
        "reconnect" => ClientRequest::Reconnect,
        "quit" | "exit" => ClientRequest::Shutdown,
        _ => return Err(ConsoleError::UnknownCommand(command.to_owned())),
    };
    Ok(Some(request))
}

fn number(command: &'static str, argument: Option<&str>) -> Result<f64, ConsoleError> {
    let text = argument.ok_or(ConsoleError::MissingArgument(command))?;
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConsoleError::InvalidNumber {
            command,
            value: text.to_owned(),
        })
}

/// Forward stdin commands to the sync loop until stdin closes, the loop
/// exits, or `quit` is entered.
pub async fn read_stdin(handle: ClientHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("stdin closed, console reader stopping");
                return;
            }
            Err(e) => {
                warn!(error = %e, "stdin read failed, console reader stopping");
                return;
            }
        };
        match parse_console_line(&line) {
            Ok(Some(request)) => {
                let quit = request == ClientRequest::Shutdown;
                if !handle.request(request) || quit {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, usage = USAGE, "console command ignored"),
        }
    }
}
