//! Sequencer: runs a command list against the modem.
//!
//! Each command moves through `Sending -> AwaitingResponse` and ends in
//! `Success`, `Failure` or `TimedOut`. Replies are accumulated until the
//! buffer contains `OK\r\n` or `ERROR\r\n`; `OK` is checked first. The first
//! command that does not succeed ends the run, and nothing after it is sent.

use crate::config::SequencerConfig;
use crate::matrix::{Command, CommandList};
use crate::port::SerialPortAdapter;
use crate::session::{TransportError, TransportSession};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Terminal token for a successful command.
pub const SUCCESS_TOKEN: &[u8] = b"OK\r\n";

/// Terminal token for a rejected command.
pub const FAILURE_TOKEN: &[u8] = b"ERROR\r\n";

/// What to do when no terminal token arrives before the deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Treat the timeout like a failure and stop.
    #[default]
    Abort,
    /// Send the same command once more; a second timeout stops the run.
    RetryOnce,
}

impl FromStr for TimeoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "retry_once" | "retry-once" => Ok(Self::RetryOnce),
            other => Err(format!(
                "unknown timeout policy {other:?} (expected abort or retry_once)"
            )),
        }
    }
}

/// Result of a completed response wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// Where a command is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    Sending,
    AwaitingResponse,
    Success,
    Failure,
    TimedOut,
}

impl From<Outcome> for CommandState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::Success,
            Outcome::Failure => Self::Failure,
        }
    }
}

/// Classify raw response bytes. `None` until a terminal token is present.
pub fn classify(bytes: &[u8]) -> Option<Outcome> {
    if contains(bytes, SUCCESS_TOKEN) {
        Some(Outcome::Success)
    } else if contains(bytes, FAILURE_TOKEN) {
        Some(Outcome::Failure)
    } else {
        None
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Bytes received for a single command. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBuffer {
    bytes: Vec<u8>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    pub fn outcome(&self) -> Option<Outcome> {
        classify(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Sequencer policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerOptions {
    /// `None` waits for a terminal token forever.
    pub response_timeout: Option<Duration>,
    pub inter_command_delay: Duration,
    pub on_timeout: TimeoutPolicy,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        (&SequencerConfig::default()).into()
    }
}

impl From<&SequencerConfig> for SequencerOptions {
    fn from(config: &SequencerConfig) -> Self {
        Self {
            response_timeout: config.response_timeout(),
            inter_command_delay: config.inter_command_delay(),
            on_timeout: config.on_timeout,
        }
    }
}

/// What happened to one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub command: Command,
    /// Always terminal.
    pub state: CommandState,
    /// Times the command was written; 2 only after a retried timeout.
    pub attempts: u32,
    pub elapsed_ms: u64,
    /// Response text of the last attempt.
    pub response: String,
}

/// Overall result of a run. Positions are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed { total: usize },
    Failed { at: usize, total: usize },
    TimedOut { at: usize, total: usize },
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { total } => write!(f, "all {total} command(s) succeeded"),
            Self::Failed { at, total } => write!(f, "sequence failed at command {at} of {total}"),
            Self::TimedOut { at, total } => write!(
                f,
                "no terminal token within deadline at command {at} of {total}"
            ),
        }
    }
}

/// Per-command records plus the overall status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub succeeded: usize,
    pub records: Vec<CommandRecord>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed { .. })
    }

    /// Commands actually put on the wire (retries not counted twice).
    pub fn transmitted(&self) -> usize {
        self.records.len()
    }
}

/// The link failed partway through a run.
///
/// Carries the records of the commands that finished before the failure.
#[derive(Debug, Error)]
#[error("transport failed at command {at} of {total}: {source}")]
pub struct SequenceError {
    pub at: usize,
    pub total: usize,
    pub records: Vec<CommandRecord>,
    #[source]
    pub source: TransportError,
}

/// Drives a transport session through a command list.
#[derive(Debug)]
pub struct Sequencer<P: SerialPortAdapter> {
    session: TransportSession<P>,
    options: SequencerOptions,
}

impl<P: SerialPortAdapter> Sequencer<P> {
    pub fn new(session: TransportSession<P>, options: SequencerOptions) -> Self {
        Self { session, options }
    }

    /// Run every command in order, stopping at the first one that does not succeed.
    ///
    /// Transport errors abort the run and are returned as `Err` with the
    /// position reached; a rejected or timed-out command is a normal outcome
    /// recorded in the report.
    pub fn run(&mut self, commands: CommandList) -> Result<RunReport, SequenceError> {
        let total = commands.len();
        let mut records = Vec::with_capacity(total);
        let mut status = RunStatus::Completed { total };

        info!(total, port = self.session.port_name(), "starting sequence");

        for (index, command) in commands.into_iter().enumerate() {
            let position = index + 1;
            let record = self.execute(command).map_err(|source| SequenceError {
                at: position,
                total,
                records: std::mem::take(&mut records),
                source,
            })?;
            let state = record.state;
            records.push(record);

            match state {
                CommandState::Success => {
                    if position < total && !self.options.inter_command_delay.is_zero() {
                        std::thread::sleep(self.options.inter_command_delay);
                    }
                }
                CommandState::TimedOut => {
                    status = RunStatus::TimedOut { at: position, total };
                    break;
                }
                _ => {
                    status = RunStatus::Failed { at: position, total };
                    break;
                }
            }
        }

        let succeeded = records
            .iter()
            .filter(|r| r.state == CommandState::Success)
            .count();

        match status {
            RunStatus::Completed { .. } => info!(succeeded, total, "{status}"),
            _ => warn!(succeeded, total, "{status}"),
        }

        Ok(RunReport {
            status,
            succeeded,
            records,
        })
    }

    /// Send one command and wait for its outcome, applying the timeout policy.
    pub fn execute(&mut self, command: Command) -> Result<CommandRecord, TransportError> {
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(command = %command, attempt = attempts, state = ?CommandState::Sending);
            self.session.write_line(&command)?;

            debug!(command = %command, state = ?CommandState::AwaitingResponse);
            let (state, buffer) = self.await_response()?;

            if state == CommandState::TimedOut
                && self.options.on_timeout == TimeoutPolicy::RetryOnce
                && attempts == 1
            {
                warn!(command = %command, "no terminal token before deadline, retrying once");
                // A late reply to the first attempt must not settle the second.
                self.session.discard_pending()?;
                continue;
            }

            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!(
                command = %command,
                ok = state == CommandState::Success,
                state = ?state,
                elapsed_ms,
                "response"
            );

            return Ok(CommandRecord {
                command,
                state,
                attempts,
                elapsed_ms,
                response: buffer.to_text(),
            });
        }
    }

    /// Accumulate chunks until a terminal token shows up or the deadline passes.
    ///
    /// The deadline is checked between reads, so it can overshoot by up to one
    /// read timeout.
    fn await_response(&mut self) -> Result<(CommandState, ResponseBuffer), TransportError> {
        let deadline = self.options.response_timeout.map(|t| Instant::now() + t);
        let mut buffer = ResponseBuffer::new();

        loop {
            let chunk = self.session.read_chunk()?;
            buffer.extend(&chunk);

            if let Some(outcome) = buffer.outcome() {
                return Ok((outcome.into(), buffer));
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok((CommandState::TimedOut, buffer));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialPort;

    fn fast_options() -> SequencerOptions {
        SequencerOptions {
            response_timeout: Some(Duration::from_millis(20)),
            inter_command_delay: Duration::ZERO,
            on_timeout: TimeoutPolicy::Abort,
        }
    }

    fn sequencer(mock: &MockSerialPort, options: SequencerOptions) -> Sequencer<MockSerialPort> {
        Sequencer::new(TransportSession::with_port(mock.clone(), false), options)
    }

    fn list(lines: &[&str]) -> CommandList {
        lines.iter().map(|l| Command::from(*l)).collect()
    }

    #[test]
    fn test_classify_tokens() {
        assert_eq!(classify(b"garbage OK\r\n"), Some(Outcome::Success));
        assert_eq!(classify(b"garbage ERROR\r\n"), Some(Outcome::Failure));
        assert_eq!(classify(b"garbage OK"), None);
        assert_eq!(classify(b""), None);
    }

    #[test]
    fn test_success_token_wins_when_both_present() {
        assert_eq!(classify(b"OK\r\nERROR\r\n"), Some(Outcome::Success));
        assert_eq!(classify(b"ERROR\r\nOK\r\n"), Some(Outcome::Success));
    }

    #[test]
    fn test_response_buffer_only_grows() {
        let mut buffer = ResponseBuffer::new();
        buffer.extend(b"+TI2C:");
        buffer.extend(b"");
        buffer.extend(b" done\r\nO");
        assert_eq!(buffer.outcome(), None);
        buffer.extend(b"K\r\n");
        assert_eq!(buffer.len(), 17);
        assert_eq!(buffer.outcome(), Some(Outcome::Success));
    }

    #[test]
    fn test_timeout_policy_parse() {
        assert_eq!("abort".parse::<TimeoutPolicy>(), Ok(TimeoutPolicy::Abort));
        assert_eq!(
            "RETRY_ONCE".parse::<TimeoutPolicy>(),
            Ok(TimeoutPolicy::RetryOnce)
        );
        assert!("forever".parse::<TimeoutPolicy>().is_err());
    }

    #[test]
    fn test_token_split_across_reads() {
        let mut mock = MockSerialPort::new("MOCK0");
        mock.set_max_read(1);
        mock.script_reply(b"\r\nOK\r\n");

        let record = sequencer(&mock, fast_options())
            .execute(Command::from("AT+TTIMER"))
            .unwrap();

        assert_eq!(record.state, CommandState::Success);
        assert_eq!(record.response, "\r\nOK\r\n");
    }

    #[test]
    fn test_silence_times_out() {
        let mock = MockSerialPort::new("MOCK0");

        let record = sequencer(&mock, fast_options())
            .execute(Command::from("AT+TTIMER"))
            .unwrap();

        assert_eq!(record.state, CommandState::TimedOut);
        assert_eq!(record.attempts, 1);
        assert!(mock.empty_reads() > 0);
    }

    #[test]
    fn test_retry_once_resends_after_timeout() {
        let mut mock = MockSerialPort::new("MOCK0");
        // First line gets no reply, the resend gets OK.
        mock.script_replies([b"".as_slice(), b"OK\r\n".as_slice()]);

        let options = SequencerOptions {
            on_timeout: TimeoutPolicy::RetryOnce,
            ..fast_options()
        };
        let record = sequencer(&mock, options)
            .execute(Command::from("AT+TXML"))
            .unwrap();

        assert_eq!(record.state, CommandState::Success);
        assert_eq!(record.attempts, 2);
        assert_eq!(mock.lines_written().len(), 2);
    }

    #[test]
    fn test_late_reply_is_not_credited_to_the_resend() {
        let mut mock = MockSerialPort::new("MOCK0");
        // The reply to the first attempt lands just after the deadline.
        mock.script_late_reply(b"OK\r\n", 1);
        mock.script_reply(b"ERROR\r\n");
        mock.script_reply(b"OK\r\n");

        let options = SequencerOptions {
            response_timeout: Some(Duration::ZERO),
            on_timeout: TimeoutPolicy::RetryOnce,
            ..fast_options()
        };
        let report = sequencer(&mock, options)
            .run(list(&["AT+A", "AT+B"]))
            .unwrap();

        assert_eq!(report.status, RunStatus::Failed { at: 1, total: 2 });
        assert_eq!(report.records[0].attempts, 2);
        assert_eq!(report.records[0].state, CommandState::Failure);
        assert_eq!(report.records[0].response, "ERROR\r\n");
        assert_eq!(mock.lines_written().len(), 2);
        assert_eq!(mock.available_bytes(), 0);
    }

    #[test]
    fn test_error_is_not_retried() {
        let mut mock = MockSerialPort::new("MOCK0");
        mock.script_reply(b"ERROR\r\n");

        let options = SequencerOptions {
            on_timeout: TimeoutPolicy::RetryOnce,
            ..fast_options()
        };
        let record = sequencer(&mock, options)
            .execute(Command::from("AT+TXML"))
            .unwrap();

        assert_eq!(record.state, CommandState::Failure);
        assert_eq!(record.attempts, 1);
    }

    #[test]
    fn test_run_aborts_on_first_failure() {
        let mut mock = MockSerialPort::new("MOCK0");
        mock.script_replies(["OK\r\n", "ERROR\r\n", "OK\r\n", "OK\r\n"]);

        let report = sequencer(&mock, fast_options())
            .run(list(&["AT+A", "AT+B", "AT+C", "AT+D"]))
            .unwrap();

        assert_eq!(report.status, RunStatus::Failed { at: 2, total: 4 });
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.transmitted(), 2);
        assert_eq!(
            mock.lines_written(),
            vec!["AT+A\r\n".to_string(), "AT+B\r\n".to_string()]
        );
    }

    #[test]
    fn test_run_reports_timeout_position() {
        let mut mock = MockSerialPort::new("MOCK0");
        mock.script_replies(["OK\r\n"]);

        let report = sequencer(&mock, fast_options())
            .run(list(&["AT+A", "AT+B", "AT+C"]))
            .unwrap();

        assert_eq!(report.status, RunStatus::TimedOut { at: 2, total: 3 });
        assert!(!report.is_success());
        assert_eq!(mock.lines_written().len(), 2);
    }

    #[test]
    fn test_transport_failure_keeps_position_and_records() {
        let mut mock = MockSerialPort::new("MOCK0");
        mock.script_replies(["OK\r\n", "OK\r\n", "OK\r\n"]);
        mock.fail_write_on_line(2, std::io::ErrorKind::BrokenPipe);

        let err = sequencer(&mock, fast_options())
            .run(list(&["AT+A", "AT+B", "AT+C"]))
            .unwrap_err();

        assert_eq!((err.at, err.total), (2, 3));
        assert_eq!(err.records.len(), 1);
        assert_eq!(err.records[0].state, CommandState::Success);
        assert!(matches!(err.source, TransportError::Write { .. }));
        assert!(err.to_string().contains("at command 2 of 3"));
    }

    #[test]
    fn test_empty_list_completes() {
        let mock = MockSerialPort::new("MOCK0");
        let report = sequencer(&mock, fast_options())
            .run(CommandList::from(Vec::new()))
            .unwrap();
        assert_eq!(report.status, RunStatus::Completed { total: 0 });
        assert!(report.is_success());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            RunStatus::Failed { at: 4, total: 4 }.to_string(),
            "sequence failed at command 4 of 4"
        );
        assert!(RunStatus::TimedOut { at: 1, total: 2 }
            .to_string()
            .contains("no terminal token within deadline"));
    }
}
