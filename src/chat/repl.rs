//! Interactive console loop

use super::prompts::EXAMPLE_PROMPTS;
use super::session::{ChatSession, TurnObserver};
use crate::tools::{ToolCallRequest, ToolResult};
use serde_json::Value;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

const CYAN_MARKER: &str = "\x1b[36m⏺\x1b[0m";

/// Render a call as `name(key: value, ...)`, bolding the name when `ansi`
pub fn format_tool_call(call: &ToolCallRequest, ansi: bool) -> String {
    let args = match &call.arguments {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    };

    if ansi {
        format!("{CYAN_MARKER} \x1b[1m{}\x1b[0m({args})", call.name)
    } else {
        format!("⏺ {}({args})", call.name)
    }
}

/// Prints tool activity to a writer; tool output only in debug mode
pub struct ConsoleObserver<W> {
    out: W,
    debug: bool,
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub fn new(out: W, debug: bool) -> Self {
        Self { out, debug }
    }
}

impl<W: Write + Send> TurnObserver for ConsoleObserver<W> {
    fn on_tool_call(&mut self, call: &ToolCallRequest) {
        if let Err(e) = writeln!(self.out, "{}", format_tool_call(call, true)) {
            warn!("Failed to print tool call: {}", e);
        }
    }

    fn on_tool_result(&mut self, _call: &ToolCallRequest, result: &ToolResult) {
        if self.debug {
            if let Err(e) = writeln!(self.out, "Tool output: {}", result.to_json()) {
                warn!("Failed to print tool output: {}", e);
            }
        }
    }
}

fn print_banner<W: Write>(output: &mut W, session: &ChatSession, debug: bool) -> io::Result<()> {
    writeln!(
        output,
        "Chat with {} and {} tools (type 'exit' to quit):",
        session.settings().model,
        session.registry().len()
    )?;
    writeln!(
        output,
        "Ask about the weather, search the web, read a page, find YouTube videos, academic papers or flights."
    )?;
    for (i, example) in EXAMPLE_PROMPTS.iter().enumerate() {
        writeln!(output, "Example {}: '{}'", i + 1, example)?;
    }
    if debug {
        writeln!(output, "Debug mode enabled - tool output will be displayed")?;
    }
    Ok(())
}

/// Whether a line ends the session
pub fn is_exit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("exit")
}

/// Read lines from `input` until `exit` or end of input
///
/// Model and tool failures are printed and the loop keeps going; only I/O
/// errors on the console end it early.
pub async fn run<R, W>(
    session: &mut ChatSession,
    input: R,
    output: &mut W,
    debug: bool,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    print_banner(output, session, debug)?;
    let mut lines = input.lines();

    loop {
        write!(output, "> ")?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(output)?;
            break;
        };
        if is_exit_command(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        if debug {
            writeln!(output, "\n=== Run starting ===")?;
        }

        match session.handle_user_turn(line.trim()).await {
            Ok(reply) => writeln!(output, "\n⏺ {reply}\n")?,
            Err(e) => {
                warn!("Turn failed: {}", e);
                writeln!(output, "\nError: {e}\n")?;
            }
        }

        if debug {
            writeln!(output, "=== Run complete ===\n")?;
        }
    }

    Ok(())
}
