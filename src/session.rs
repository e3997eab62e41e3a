use std::io::{BufRead, Result as IoResult, Write};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::SessionConfig;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::frame::{FrameReport, FramedTransmitter};
use crate::payload::PayloadSource;

/// Decides, after a successful round, whether to run another one.
pub trait RepeatDecision {
    /// Returns `true` to send again.
    fn send_again(&mut self, report: &RoundReport) -> IoResult<bool>;
}

impl<D: RepeatDecision + ?Sized> RepeatDecision for Box<D> {
    fn send_again(&mut self, report: &RoundReport) -> IoResult<bool> {
        (**self).send_again(report)
    }
}

/// Asks the operator on `output` and reads a single-character answer from `input`.
///
/// Only `y` repeats. Any other character, or end of input, stops the session.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    /// Prompts on `output`, answers come from `input`.
    pub fn new(input: R, output: W) -> Self {
        Prompt { input, output }
    }
}

impl<R: BufRead, W: Write> RepeatDecision for Prompt<R, W> {
    fn send_again(&mut self, _report: &RoundReport) -> IoResult<bool> {
        write!(self.output, "Do you want to send the file again? (y/n): ")?;
        self.output.flush()?;
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(false);
            }
            if let Some(c) = line.trim_start().chars().next() {
                return Ok(c == 'y');
            }
        }
    }
}

/// Runs a fixed number of rounds without asking.
#[derive(Debug, Clone, Copy)]
pub struct FixedRounds {
    left: usize,
}

impl FixedRounds {
    /// Stops after `rounds` rounds. Zero behaves like one: the first round always runs.
    pub fn new(rounds: usize) -> Self {
        FixedRounds { left: rounds.saturating_sub(1) }
    }
}

impl RepeatDecision for FixedRounds {
    fn send_again(&mut self, _report: &RoundReport) -> IoResult<bool> {
        if self.left == 0 {
            return Ok(false);
        }
        self.left -= 1;
        Ok(true)
    }
}

/// Where a session currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No connection, next round not started.
    Idle,
    /// Connection open with congestion control applied.
    Connected,
    /// A frame is being written.
    Transmitting,
    /// The round finished and was reported.
    Reported,
    /// Another round was requested.
    Repeating,
    /// The session is over.
    Terminated,
}

/// Summary of one successful round.
#[derive(Clone, Debug)]
pub struct RoundReport {
    /// Identifier used in log lines for this round.
    pub id: Uuid,
    /// 1-based round number within the session.
    pub round: usize,
    /// What was sent, from the payload source.
    pub payload_name: String,
    /// Frame transmission details.
    pub frame: FrameReport,
    /// Congestion control read back from the socket, when available.
    pub congestion_control: Option<String>,
    /// Time from the first header byte to the last payload byte.
    pub elapsed: Duration,
}

impl RoundReport {
    /// Header plus payload bytes written in this round.
    pub fn total_bytes(&self) -> u64 {
        self.frame.total_bytes()
    }

    /// Payload throughput in megabits per second.
    pub fn throughput_mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.total_bytes() * 8) as f64 / secs / 1e6
    }
}

/// Counters accumulated over every round of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionTotals {
    /// Rounds that delivered a whole frame.
    pub rounds: usize,
    /// Bytes written across all rounds, including a round that was aborted.
    pub bytes_sent: u64,
}

/// Drives rounds of connect, tune, send and report against one peer.
pub struct Session<S, D> {
    config: SessionConfig,
    transmitter: FramedTransmitter,
    source: S,
    decision: D,
    state: SessionState,
    totals: SessionTotals,
}

impl<S: PayloadSource, D: RepeatDecision> Session<S, D> {
    /// A session that takes payloads from `source` and asks `decision` whether to repeat.
    pub fn new(config: SessionConfig, source: S, decision: D) -> Self {
        let transmitter = FramedTransmitter::new(config.chunk_size, config.byte_order);
        Session {
            config,
            transmitter,
            source,
            decision,
            state: SessionState::Idle,
            totals: SessionTotals::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Totals so far. After an aborted round they include the bytes it wrote.
    pub fn totals(&self) -> SessionTotals {
        self.totals
    }

    /// Runs rounds until the repeat decision says stop or a round fails.
    ///
    /// `report` is called once for each completed round. Any error ends the
    /// session in [`SessionState::Terminated`] with no reconnect attempt.
    pub fn run(&mut self, mut report: impl FnMut(&RoundReport)) -> Result<SessionTotals> {
        let outcome = self.run_rounds(&mut report);
        self.transition(SessionState::Terminated);
        outcome.map(|_| self.totals)
    }

    fn run_rounds(&mut self, report: &mut impl FnMut(&RoundReport)) -> Result<()> {
        loop {
            let round = self.run_round()?;
            self.transition(SessionState::Reported);
            report(&round);

            if !self.decision.send_again(&round).map_err(Error::Prompt)? {
                return Ok(());
            }
            self.transition(SessionState::Repeating);
            self.transition(SessionState::Idle);
        }
    }

    fn run_round(&mut self) -> Result<RoundReport> {
        let id = Uuid::new_v4();
        let round = self.totals.rounds + 1;
        log::debug!("[{id}] Starting round {round}");

        let payload = self.source.next_payload().map_err(Error::Payload)?;
        let payload_name = self.source.describe();

        log::info!("[{id}] Connecting to {}", self.config.peer);
        let mut conn = Connection::establish(
            self.config.peer,
            &self.config.algorithm,
            self.config.connect_timeout,
            self.config.write_timeout,
        )?;
        self.transition(SessionState::Connected);
        let congestion_control = conn.congestion_control().ok();

        self.transition(SessionState::Transmitting);
        log::info!("[{id}] Sending {payload_name} ({} bytes)", payload.len());
        let start = Instant::now();
        let frame = match self.transmitter.send_frame(&mut conn, &payload) {
            Ok(frame) => frame,
            Err(e) => {
                self.totals.bytes_sent += e.bytes_sent();
                return Err(e);
            }
        };
        let elapsed = start.elapsed();

        if let Err(e) = conn.close() {
            log::warn!("[{id}] Error closing connection: {e}");
        }
        self.totals.rounds += 1;
        self.totals.bytes_sent += frame.total_bytes();
        log::info!("[{id}] Round {round} sent {} bytes in {elapsed:?}", frame.total_bytes());

        Ok(RoundReport { id, round, payload_name, frame, congestion_control, elapsed })
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("Session {:?} -> {next:?}", self.state);
        self.state = next;
    }
}
