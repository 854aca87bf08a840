// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::io::{self, BufRead, BufReader, Write};

use crate::Engine;

const PROMPT: &str = "(harness) ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Continue,
    Quit,
    Step,
    Dump,
    DumpMpu,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "c" => Command::Continue,
            "q" => Command::Quit,
            "s" => Command::Step,
            "dump" | "d" => Command::Dump,
            "dumpmpu" | "dm" => Command::DumpMpu,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// What the control loop should do after the console returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Quit,
    Step,
}

/// Line-based, read-only console over engine state.
pub struct InspectionConsole {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
}

impl std::fmt::Debug for InspectionConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectionConsole").finish_non_exhaustive()
    }
}

impl InspectionConsole {
    pub fn new(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        Self { input, output }
    }

    pub fn stdio() -> Self {
        Self::new(
            Box::new(BufReader::new(io::stdin())),
            Box::new(io::stdout()),
        )
    }

    /// Reads commands until one hands control back to the loop.
    /// End of input counts as quit.
    pub fn interact<E: Engine>(&mut self, engine: &E) -> Verdict {
        match self.session(engine) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::error!("Console I/O failed: {}", e);
                Verdict::Quit
            }
        }
    }

    fn session<E: Engine>(&mut self, engine: &E) -> io::Result<Verdict> {
        let mut line = String::new();
        loop {
            write!(self.output, "{}", PROMPT)?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(Verdict::Quit);
            }

            match Command::parse(&line) {
                Command::Continue => return Ok(Verdict::Continue),
                Command::Quit => return Ok(Verdict::Quit),
                Command::Step => return Ok(Verdict::Step),
                Command::Dump => write!(self.output, "{}", engine.cpu_snapshot())?,
                Command::DumpMpu => write!(self.output, "{}", engine.protection_snapshot())?,
                Command::Unknown(cmd) => writeln!(self.output, "unknown command: {}", cmd)?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("c\n"), Command::Continue);
        assert_eq!(Command::parse("q"), Command::Quit);
        assert_eq!(Command::parse(" s "), Command::Step);
        assert_eq!(Command::parse("d"), Command::Dump);
        assert_eq!(Command::parse("dump"), Command::Dump);
        assert_eq!(Command::parse("dm"), Command::DumpMpu);
        assert_eq!(Command::parse("dumpmpu\r\n"), Command::DumpMpu);
        assert_eq!(
            Command::parse("continue"),
            Command::Unknown("continue".to_string())
        );
        assert_eq!(Command::parse(""), Command::Unknown(String::new()));
    }
}
