//! Scripted serial link.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::ports::{SerialLink, SerialError};

#[derive(Default)]
struct ScriptState {
    lines: VecDeque<String>,
    reconnects: u32,
    fail_next_read: bool,
}

/// [`SerialLink`] fed from a queue of scripted lines. Clones share the same
/// queue, so a test (or the dry-run binary) can keep a handle and push
/// lines after the device has taken ownership of its copy.
#[derive(Clone, Default)]
pub struct ScriptedSerial {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&self, line: &str) {
        self.state.borrow_mut().lines.push_back(line.to_owned());
    }

    /// Make the next `read_line` fail even though bytes are waiting.
    pub fn fail_next_read(&self) {
        self.state.borrow_mut().fail_next_read = true;
    }

    pub fn reconnect_count(&self) -> u32 {
        self.state.borrow().reconnects
    }
}

impl SerialLink for ScriptedSerial {
    fn bytes_waiting(&mut self) -> Result<usize, SerialError> {
        let state = self.state.borrow();
        Ok(state.lines.front().map_or(0, |l| l.len() + 1))
    }

    fn read_line(&mut self) -> Result<String, SerialError> {
        let mut state = self.state.borrow_mut();
        if state.fail_next_read {
            state.fail_next_read = false;
            return Err(SerialError::Decode);
        }
        state.lines.pop_front().ok_or(SerialError::Disconnected)
    }

    fn reconnect(&mut self) -> Result<(), SerialError> {
        let mut state = self.state.borrow_mut();
        state.reconnects += 1;
        state.fail_next_read = false;
        Ok(())
    }
}
