// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Operator command loop.
//!
//! Reads the local control channel one line at a time. The exact line `stop`
//! ends the loop. Any other line is split on single spaces and each token is
//! dispatched in order; unknown tokens of a line are reported together in one
//! notice.

use std::io::{self, BufRead, Write};

use tracing::{debug, info, warn};

/// Line that ends the loop.
pub const STOP_COMMAND: &str = "stop";

/// ANSI sequence that clears the screen and homes the cursor.
const CLEAR_SEQUENCE: &str = "\x1b[2J\x1b[H";

// =============================================================================
// Results
// =============================================================================

/// Result of dispatching one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// `clear` ran.
    Cleared,
    /// A recognized command failed.
    Failed {
        /// The command name.
        command: String,
        /// Failure description.
        message: String,
    },
    /// The token names no command.
    Unknown(String),
}

/// Result of processing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The line was `stop`.
    Stop,
    /// Every token of the line was dispatched.
    Dispatched(Vec<Dispatch>),
}

impl LineOutcome {
    /// Unknown tokens of this line, in order.
    pub fn unknown(&self) -> Vec<&str> {
        match self {
            LineOutcome::Stop => Vec::new(),
            LineOutcome::Dispatched(results) => results
                .iter()
                .filter_map(|r| match r {
                    Dispatch::Unknown(token) => Some(token.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The operator entered `stop`.
    Stopped,
    /// The control channel reached end of input or failed to read.
    InputClosed,
}

// =============================================================================
// CommandLoop
// =============================================================================

/// Line-oriented operator console over any reader and display.
pub struct CommandLoop<R, W> {
    input: R,
    display: W,
    notices: usize,
}

impl<R: BufRead, W: Write> CommandLoop<R, W> {
    /// Creates a loop reading from `input` and writing to `display`.
    pub fn new(input: R, display: W) -> Self {
        Self {
            input,
            display,
            notices: 0,
        }
    }

    /// Number of "Unknown command" notices written so far.
    pub fn notices(&self) -> usize {
        self.notices
    }

    /// Returns the display.
    pub fn into_display(self) -> W {
        self.display
    }

    /// Runs until `stop`, end of input, or a read error.
    ///
    /// A line that is not valid UTF-8 is reported on the display and skipped.
    pub fn run(&mut self) -> LoopExit {
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match self.input.read_until(b'\n', &mut raw) {
                Ok(0) => {
                    info!("Control channel closed");
                    return LoopExit::InputClosed;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to read from control channel");
                    return LoopExit::InputClosed;
                }
            }

            let line = match std::str::from_utf8(&raw) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable console line");
                    self.report(&format!("Unreadable command: {}", e));
                    continue;
                }
            };
            let trimmed = line
                .strip_suffix('\n')
                .map(|l| l.strip_suffix('\r').unwrap_or(l))
                .unwrap_or(line);

            if let LineOutcome::Stop = self.process_line(trimmed) {
                info!("Stop requested from console");
                return LoopExit::Stopped;
            }
        }
    }

    /// Processes a single line without reading.
    pub fn process_line(&mut self, line: &str) -> LineOutcome {
        if line == STOP_COMMAND {
            return LineOutcome::Stop;
        }

        let results: Vec<Dispatch> = line.split(' ').map(|token| self.dispatch(token)).collect();
        for result in &results {
            if let Dispatch::Failed { command, message } = result {
                self.report(&format!("Command '{}' failed: {}", command, message));
            }
        }

        let outcome = LineOutcome::Dispatched(results);
        let unknown = outcome.unknown();
        if !unknown.is_empty() {
            let listed: Vec<String> = unknown.iter().map(|t| format!("{:?}", t)).collect();
            let notice = format!("Unknown command: {}", listed.join(", "));
            self.notices += 1;
            self.report(&notice);
        }
        outcome
    }

    fn dispatch(&mut self, token: &str) -> Dispatch {
        match token {
            "clear" => match self.clear() {
                Ok(()) => Dispatch::Cleared,
                Err(e) => Dispatch::Failed {
                    command: token.to_string(),
                    message: e.to_string(),
                },
            },
            other => {
                debug!(token = other, "Unknown console command");
                Dispatch::Unknown(other.to_string())
            }
        }
    }

    fn clear(&mut self) -> io::Result<()> {
        self.display.write_all(CLEAR_SEQUENCE.as_bytes())?;
        self.display.flush()
    }

    fn report(&mut self, message: &str) {
        let written = writeln!(self.display, "{}", message).and_then(|()| self.display.flush());
        if let Err(e) = written {
            warn!(error = %e, %message, "Failed to write to operator display");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
