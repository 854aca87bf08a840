// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::{Condvar, Mutex, PoisonError};

/// A level-style interrupt request line a sleeping core can block on.
///
/// Raising the line wakes one `wait`; the request is consumed by the waiter.
#[derive(Debug, Default)]
pub struct InterruptLine {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl InterruptLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        *raised = true;
        self.cond.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        *self.raised.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the line is raised, then lowers it. No timeout.
    pub fn wait(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        while !*raised {
            raised = self
                .cond
                .wait(raised)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *raised = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_immediately_when_raised() {
        let line = InterruptLine::new();
        line.raise();
        line.wait();
        assert!(!line.is_raised());
    }

    #[test]
    fn test_wait_wakes_on_raise_from_other_thread() {
        let line = Arc::new(InterruptLine::new());
        let remote = line.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.raise();
        });
        line.wait();
        handle.join().unwrap();
        assert!(!line.is_raised());
    }
}
