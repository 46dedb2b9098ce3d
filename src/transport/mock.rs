//! Scripted transport for testing protocol and sequencing logic
//!
//! `MockTransport` replays a queue of canned replies and records every write, so
//! tests can assert on the exact bytes sent to a device without hardware. It also
//! supports responders: closures that generate a reply from the last written line,
//! which is how whole sweeps are simulated.
//!
//! ```
//! use lcr_daq::transport::{MockTransport, Transport};
//!
//! let mut port = MockTransport::new().with_replies(["exec success\n"]);
//! port.write_line(b"FREQ 1000\n").unwrap();
//! assert_eq!(port.read_line().unwrap().as_deref(), Some("exec success\n"));
//! assert_eq!(port.read_line().unwrap(), None); // script exhausted: read timeout
//! assert_eq!(port.written_lines(), vec!["FREQ 1000\n".to_string()]);
//! ```

use super::Transport;
use crate::error::{AppResult, DaqError};
use std::collections::VecDeque;

type Responder = Box<dyn FnMut(&str) -> Vec<Option<String>> + Send>;

/// In-memory transport with a scripted reply queue and a write log.
pub struct MockTransport {
    replies: VecDeque<Option<String>>,
    written: Vec<Vec<u8>>,
    responder: Option<Responder>,
    closed: bool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a transport with no queued replies.
    pub fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            written: Vec::new(),
            responder: None,
            closed: false,
        }
    }

    /// Queue lines to be returned by subsequent reads, in order.
    pub fn with_replies<I, S>(mut self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies
            .extend(replies.into_iter().map(|line| Some(line.into())));
        self
    }

    /// Generate replies from each written line. Queued replies are still served first.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: FnMut(&str) -> Vec<Option<String>> + Send + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Queue one reply line.
    pub fn push_reply(&mut self, line: impl Into<String>) {
        self.replies.push_back(Some(line.into()));
    }

    /// Queue one read timeout.
    pub fn push_timeout(&mut self) {
        self.replies.push_back(None);
    }

    /// Every write so far, decoded lossily as UTF-8.
    pub fn written_lines(&self) -> Vec<String> {
        self.written
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    /// Number of replies still queued.
    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.closed {
            return Err(DaqError::Instrument("mock transport is closed".to_string()));
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn write_line(&mut self, data: &[u8]) -> AppResult<()> {
        self.ensure_open()?;
        self.written.push(data.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            let line = String::from_utf8_lossy(data);
            self.replies.extend(responder(&line));
        }
        Ok(())
    }

    fn read_line(&mut self) -> AppResult<Option<String>> {
        self.ensure_open()?;
        Ok(self.replies.pop_front().flatten())
    }

    fn close(&mut self) -> AppResult<()> {
        self.closed = true;
        Ok(())
    }
}
