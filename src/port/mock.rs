//! Scripted modem for tests.
//!
//! `MockSerialPort` stands in for the UART. Every complete line written to it
//! (terminated by `\n`) consumes the next scripted reply and queues it for
//! reading, which is how the AT firmware behaves from the host's side.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct ScriptedReply {
    bytes: Vec<u8>,
    /// Read calls that time out before the reply lands.
    after_reads: usize,
}

#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes waiting to be returned by reads.
    read_queue: VecDeque<u8>,
    /// Replies released one per completed line.
    replies: VecDeque<ScriptedReply>,
    /// Released replies still in flight, with the reads left before they land.
    in_flight: Vec<(Vec<u8>, usize)>,
    /// Raw write calls, in order.
    write_log: Vec<Vec<u8>>,
    /// Bytes of the line currently being written.
    partial_line: Vec<u8>,
    /// Completed lines, including their terminator.
    lines: Vec<String>,
    /// Cap on bytes accepted per write call.
    max_write: Option<usize>,
    /// Cap on bytes returned per read call.
    max_read: Option<usize>,
    /// Number of read calls that found nothing.
    empty_reads: usize,
    /// Fail the next write with this I/O error kind.
    write_error: Option<std::io::ErrorKind>,
    /// Fail the write that starts this (1-based) line.
    line_error: Option<(usize, std::io::ErrorKind)>,
}

impl MockPortState {
    /// Count one timed-out read against every in-flight reply.
    fn land_in_flight(&mut self) {
        let mut landed = Vec::new();
        self.in_flight.retain_mut(|(bytes, reads_left)| {
            *reads_left -= 1;
            if *reads_left == 0 {
                landed.push(std::mem::take(bytes));
                false
            } else {
                true
            }
        });
        for bytes in landed {
            self.read_queue.extend(bytes);
        }
    }
}

/// In-memory serial port with a scripted modem on the other end.
///
/// Clones share the same state, so a test can keep one handle for inspection
/// after moving another into a session.
///
/// # Example
/// ```
/// use at_test_driver::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.script_reply(b"\r\nOK\r\n");
///
/// port.write_bytes(b"AT+TTIMER\r\n").unwrap();
///
/// let mut buffer = [0u8; 16];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"\r\nOK\r\n");
/// assert_eq!(port.lines_written(), vec!["AT+TTIMER\r\n".to_string()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockPortState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue bytes for reading immediately, independent of any write.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state().read_queue.extend(data);
    }

    /// Queue the reply released by the next completed line.
    pub fn script_reply(&mut self, reply: &[u8]) {
        self.script_late_reply(reply, 0);
    }

    /// Queue a reply that only lands after `after_reads` read calls have
    /// timed out, like a modem answering past the host's deadline.
    pub fn script_late_reply(&mut self, reply: &[u8], after_reads: usize) {
        self.state().replies.push_back(ScriptedReply {
            bytes: reply.to_vec(),
            after_reads,
        });
    }

    /// Queue several replies, one per future line.
    pub fn script_replies<I, B>(&mut self, replies: I)
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut state = self.state();
        for reply in replies {
            state.replies.push_back(ScriptedReply {
                bytes: reply.as_ref().to_vec(),
                after_reads: 0,
            });
        }
    }

    /// Accept at most `n` bytes per write call.
    pub fn set_max_write(&mut self, n: usize) {
        self.state().max_write = Some(n.max(1));
    }

    /// Return at most `n` bytes per read call.
    pub fn set_max_read(&mut self, n: usize) {
        self.state().max_read = Some(n.max(1));
    }

    /// Make the next write fail with the given error kind.
    pub fn fail_next_write(&mut self, kind: std::io::ErrorKind) {
        self.state().write_error = Some(kind);
    }

    /// Make the write that starts line `line` (1-based) fail.
    pub fn fail_write_on_line(&mut self, line: usize, kind: std::io::ErrorKind) {
        self.state().line_error = Some((line, kind));
    }

    /// Raw write calls, in order.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state().write_log.clone()
    }

    /// Complete lines written so far, terminator included.
    pub fn lines_written(&self) -> Vec<String> {
        self.state().lines.clone()
    }

    /// Scripted replies not yet released.
    pub fn pending_replies(&self) -> usize {
        self.state().replies.len()
    }

    /// Reads that returned nothing.
    pub fn empty_reads(&self) -> usize {
        self.state().empty_reads
    }

    pub fn available_bytes(&self) -> usize {
        self.state().read_queue.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state();

        if let Some(kind) = state.write_error.take() {
            return Err(PortError::Io(kind.into()));
        }
        if let Some((line, kind)) = state.line_error {
            if state.partial_line.is_empty() && state.lines.len() + 1 == line {
                state.line_error = None;
                return Err(PortError::Io(kind.into()));
            }
        }

        let accepted = state.max_write.map_or(data.len(), |max| max.min(data.len()));
        let data = &data[..accepted];
        state.write_log.push(data.to_vec());

        for &byte in data {
            state.partial_line.push(byte);
            if byte == b'\n' {
                let line = std::mem::take(&mut state.partial_line);
                state.lines.push(String::from_utf8_lossy(&line).into_owned());
                if let Some(reply) = state.replies.pop_front() {
                    if reply.after_reads == 0 {
                        state.read_queue.extend(reply.bytes);
                    } else {
                        state.in_flight.push((reply.bytes, reply.after_reads));
                    }
                }
            }
        }

        Ok(accepted)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state();

        let limit = state
            .max_read
            .map_or(buffer.len(), |max| max.min(buffer.len()));

        let mut bytes_read = 0;
        for slot in buffer.iter_mut().take(limit) {
            match state.read_queue.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            state.empty_reads += 1;
            state.land_in_flight();
            // serialport reports an elapsed read timeout this way
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Operation timed out",
            )));
        }

        Ok(bytes_read)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.state();
        state.read_queue.clear();
        state.partial_line.clear();
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .field("pending_replies", &self.pending_replies())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_released_per_line() {
        let mut port = MockSerialPort::new("MOCK0");
        port.script_replies([b"OK\r\n".as_slice(), b"ERROR\r\n".as_slice()]);

        port.write_bytes(b"AT+TI2C=10,").unwrap();
        assert_eq!(port.available_bytes(), 0);

        port.write_bytes(b"500\r\n").unwrap();
        assert_eq!(port.available_bytes(), 4);
        assert_eq!(port.pending_replies(), 1);
        assert_eq!(port.lines_written(), vec!["AT+TI2C=10,500\r\n".to_string()]);
    }

    #[test]
    fn test_empty_read_reports_timeout() {
        let mut port = MockSerialPort::new("MOCK0");
        let mut buffer = [0u8; 8];

        let err = port.read_bytes(&mut buffer).unwrap_err();
        assert!(err.is_read_timeout());
        assert_eq!(port.empty_reads(), 1);
    }

    #[test]
    fn test_partial_write_and_read_limits() {
        let mut port = MockSerialPort::new("MOCK0");
        port.set_max_write(3);
        port.set_max_read(2);
        port.enqueue_read(b"hello");

        assert_eq!(port.write_bytes(b"AT+TXML\r\n").unwrap(), 3);

        let mut buffer = [0u8; 8];
        assert_eq!(port.read_bytes(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], b"he");
        assert_eq!(port.available_bytes(), 3);
    }

    #[test]
    fn test_injected_write_failure() {
        let mut port = MockSerialPort::new("MOCK0");
        port.fail_next_write(std::io::ErrorKind::BrokenPipe);

        assert!(matches!(port.write_bytes(b"AT\r\n"), Err(PortError::Io(_))));
        assert_eq!(port.write_bytes(b"AT\r\n").unwrap(), 4);
    }

    #[test]
    fn test_clones_share_state() {
        let observer = MockSerialPort::new("MOCK0");
        let mut driver = observer.clone();

        driver.write_bytes(b"AT+TJSON\r\n").unwrap();
        assert_eq!(observer.lines_written().len(), 1);
    }

    #[test]
    fn test_late_reply_lands_after_timed_out_reads() {
        let mut port = MockSerialPort::new("MOCK0");
        port.script_late_reply(b"OK\r\n", 2);
        port.write_bytes(b"AT+TJSON\r\n").unwrap();

        let mut buffer = [0u8; 8];
        assert!(port.read_bytes(&mut buffer).is_err());
        assert_eq!(port.available_bytes(), 0);
        assert!(port.read_bytes(&mut buffer).is_err());
        assert_eq!(port.available_bytes(), 4);
        assert_eq!(port.read_bytes(&mut buffer).unwrap(), 4);
    }

    #[test]
    fn test_clear_buffers() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"stale");
        port.clear_buffers().unwrap();
        assert_eq!(port.available_bytes(), 0);
    }
}
