// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crate::{Device, SimResult, Width};

/// Write-only text console.
///
/// Every store carries up to four packed bytes, whatever the access width.
/// They are unpacked starting from the least significant one and collected
/// into a pending line, which is written out when a newline arrives. A zero
/// byte ends the unpacking for that store, so a single store can never carry
/// an embedded NUL.
///
/// Loads always return 0: the device accepts no input and reading it has no
/// side effects.
pub struct ConsoleOutputDevice {
    pending: Vec<u8>,
    out: Box<dyn Write + Send>,
}

impl fmt::Debug for ConsoleOutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleOutputDevice")
            .field("pending", &String::from_utf8_lossy(&self.pending))
            .finish_non_exhaustive()
    }
}

impl ConsoleOutputDevice {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            pending: Vec::new(),
            out,
        }
    }

    /// Bytes received since the last flush.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    fn flush_line(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        tracing::debug!("Console: {}", line);
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            tracing::error!("Console: failed to write output: {}", e);
        }
        self.pending.clear();
    }
}

impl Device for ConsoleOutputDevice {
    fn load(&mut self, _addr: u64, _width: Width) -> SimResult<u32> {
        Ok(0)
    }

    fn store(&mut self, _addr: u64, _width: Width, value: u32) -> SimResult<()> {
        for byte in value.to_le_bytes().into_iter().take_while(|&b| b != 0) {
            if byte == b'\n' {
                self.flush_line();
            } else {
                self.pending.push(byte);
            }
        }
        Ok(())
    }
}

/// An in-memory output sink that can be shared with a console device and
/// inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console() -> (ConsoleOutputDevice, SharedSink) {
        let sink = SharedSink::new();
        (ConsoleOutputDevice::new(Box::new(sink.clone())), sink)
    }

    #[test]
    fn test_flush_on_newline() {
        let (mut dev, sink) = console();
        dev.store(0, Width::Half, u16::from_le_bytes(*b"hi") as u32)
            .unwrap();
        assert!(sink.lines().is_empty());
        dev.store(0, Width::Word, b'\n' as u32).unwrap();
        assert_eq!(sink.lines(), vec!["hi".to_string()]);
        assert!(dev.pending().is_empty());
    }

    #[test]
    fn test_zero_word_is_ignored() {
        let (mut dev, sink) = console();
        dev.store(0, Width::Byte, b'x' as u32).unwrap();
        dev.store(0, Width::Word, 0).unwrap();
        assert_eq!(dev.pending(), b"x");
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn test_stops_at_first_zero_byte() {
        let (mut dev, sink) = console();
        // 'A', NUL, 'B', '\n'
        let value = u32::from_le_bytes([b'A', 0, b'B', b'\n']);
        dev.store(0, Width::Word, value).unwrap();
        assert_eq!(dev.pending(), b"A");
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn test_narrow_store_unpacks_upper_bytes() {
        let (mut dev, _sink) = console();
        dev.store(0, Width::Byte, u32::from_le_bytes([b'A', b'B', 0, 0]))
            .unwrap();
        assert_eq!(dev.pending(), b"AB");
        let value = u32::from_le_bytes([b'c', b'd', b'e', b'f']);
        dev.store(0, Width::Half, value).unwrap();
        assert_eq!(dev.pending(), b"ABcdef");
    }

    #[test]
    fn test_newline_mid_word() {
        let (mut dev, sink) = console();
        let value = u32::from_le_bytes([b'o', b'k', b'\n', b'z']);
        dev.store(0, Width::Word, value).unwrap();
        assert_eq!(sink.lines(), vec!["ok".to_string()]);
        assert_eq!(dev.pending(), b"z");
    }

    #[test]
    fn test_empty_flush_emits_nothing() {
        let (mut dev, sink) = console();
        dev.store(0, Width::Byte, b'\n' as u32).unwrap();
        dev.store(0, Width::Byte, b'\n' as u32).unwrap();
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn test_load_returns_zero_without_side_effects() {
        let (mut dev, _sink) = console();
        dev.store(0, Width::Byte, b'q' as u32).unwrap();
        assert_eq!(dev.load(0, Width::Word).unwrap(), 0);
        assert_eq!(dev.pending(), b"q");
    }
}
