//! Scripted transport for tests and offline runs.
//!
//! `MockTransport` answers outgoing frames from a reply table keyed by the
//! frame text (without the trailing carriage return). Frames with no entry
//! get no reply. An unresponsive mock additionally waits out its read timeout
//! before returning nothing, the way a silent serial port behaves.
//!
//! The transport is moved into a connection, so tests keep a [`MockHandle`]
//! to inspect written frames and adjust replies afterwards.
//!
//! ```
//! use oxxius_laser::transport::MockTransport;
//!
//! let mock = MockTransport::new().with_reply("?C", "10.0");
//! let handle = mock.handle();
//! // ... hand `mock` to a connection, then:
//! assert!(handle.written().is_empty());
//! ```

use super::Transport;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MOCK_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Default)]
struct MockState {
    replies: HashMap<String, String>,
    written: Vec<String>,
    input: VecDeque<u8>,
    unresponsive: bool,
    resets: usize,
}

/// Transport that replays a scripted device.
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    timeout: Duration,
    port_name: String,
}

/// Test-side view of a [`MockTransport`] after it has been moved.
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Responsive mock with an empty reply table and a 50 ms read timeout.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            timeout: DEFAULT_MOCK_TIMEOUT,
            port_name: "mock".to_string(),
        }
    }

    /// Reply with `reply` whenever `frame` is written.
    pub fn with_reply(self, frame: &str, reply: &str) -> Self {
        self.state
            .lock()
            .replies
            .insert(frame.to_string(), reply.to_string());
        self
    }

    /// Set the read timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the port name reported for diagnostics.
    pub fn with_port_name(mut self, name: &str) -> Self {
        self.port_name = name.to_string();
        self
    }

    /// Never reply; every read waits out the timeout.
    pub fn unresponsive(self) -> Self {
        self.state.lock().unresponsive = true;
        self
    }

    /// Bytes already sitting in the input buffer before the first write.
    pub fn with_stale_input(self, bytes: &[u8]) -> Self {
        self.state.lock().input.extend(bytes.iter().copied());
        self
    }

    /// Handle for inspecting this mock after it has been moved.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: self.state.clone(),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    /// Frames written so far, without their carriage returns.
    pub fn written(&self) -> Vec<String> {
        self.state.lock().written.clone()
    }

    /// Forget recorded frames.
    pub fn clear_written(&self) {
        self.state.lock().written.clear();
    }

    /// Add or replace a reply.
    pub fn set_reply(&self, frame: &str, reply: &str) {
        self.state
            .lock()
            .replies
            .insert(frame.to_string(), reply.to_string());
    }

    /// Toggle unresponsive behaviour.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.state.lock().unresponsive = unresponsive;
    }

    /// Number of input-buffer resets performed.
    pub fn resets(&self) -> usize {
        self.state.lock().resets
    }
}

impl Transport for MockTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let frame = text.strip_suffix('\r').unwrap_or(text).to_string();

        let mut state = self.state.lock();
        if !state.unresponsive {
            if let Some(reply) = state.replies.get(&frame).cloned() {
                state.input.extend(reply.bytes());
                state.input.extend(b"\r\n".iter().copied());
            }
        }
        state.written.push(frame);
        Ok(())
    }

    fn read_until(&mut self, terminator: &[u8]) -> io::Result<Vec<u8>> {
        let mut state = self.state.lock();
        if state.input.is_empty() {
            let unresponsive = state.unresponsive;
            drop(state);
            if unresponsive {
                std::thread::sleep(self.timeout + Duration::from_millis(5));
            }
            return Ok(Vec::new());
        }

        let mut reply = Vec::new();
        while let Some(byte) = state.input.pop_front() {
            reply.push(byte);
            if reply.ends_with(terminator) {
                break;
            }
        }
        Ok(reply)
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        state.input.clear();
        state.resets += 1;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_reply_is_terminated() {
        let mut mock = MockTransport::new().with_reply("?C", "10.0");
        mock.write(b"?C\r").unwrap();
        assert_eq!(mock.read_until(b"\r\n").unwrap(), b"10.0\r\n");
    }

    #[test]
    fn unknown_frame_reads_nothing_immediately() {
        let mut mock = MockTransport::new().with_timeout(Duration::from_secs(5));
        mock.write(b"?X\r").unwrap();
        let start = std::time::Instant::now();
        assert!(mock.read_until(b"\r\n").unwrap().is_empty());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn unresponsive_mock_waits_out_timeout() {
        let timeout = Duration::from_millis(20);
        let mut mock = MockTransport::new()
            .with_reply("?C", "10.0")
            .with_timeout(timeout)
            .unresponsive();
        mock.write(b"?C\r").unwrap();
        let start = std::time::Instant::now();
        assert!(mock.read_until(b"\r\n").unwrap().is_empty());
        assert!(start.elapsed() > timeout);
    }

    #[test]
    fn reset_discards_stale_input() {
        let mut mock = MockTransport::new().with_stale_input(b"junk\r\n");
        let handle = mock.handle();
        mock.reset_input_buffer().unwrap();
        assert!(mock.read_until(b"\r\n").unwrap().is_empty());
        assert_eq!(handle.resets(), 1);
    }

    #[test]
    fn handle_sees_written_frames() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();
        mock.write(b"L1 PM 10\r").unwrap();
        assert_eq!(handle.written(), vec!["L1 PM 10".to_string()]);
        handle.clear_written();
        assert!(handle.written().is_empty());
    }
}
