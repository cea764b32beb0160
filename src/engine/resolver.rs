//! Real-time challenge resolution.
//!
//! The state machine (`ChallengeRun`) is synchronous and fully deterministic
//! given the injected clock instants and RNG, so every rule is testable
//! without a terminal. `resolve_challenge` drives it from an async loop fed
//! by a background key listener; `resolve_blocking` is the line-based
//! fallback for environments where raw input capture is unavailable.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::Rng;
use tokio::sync::{mpsc, watch};

use crate::config::{EngineConfig, WrongKeyPolicy};
use crate::engine::challenge::ChallengeSpec;
use crate::engine::EncounterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeResult {
    Success,
    Failure,
    TimedOut,
}

/// How one resolved challenge ended.
#[derive(Debug, Clone)]
pub struct ChallengeOutcome {
    pub result: ChallengeResult,
    pub elapsed_s: f64,
    pub keys_remaining: usize,
}

// --- State machine ---

/// One in-flight challenge. All transitions happen through `handle_key` and
/// `check_timeout`; both take the current instant so the clock stays in the
/// caller's hands.
#[derive(Debug)]
pub struct ChallengeRun {
    spec: ChallengeSpec,
    wrong_key_policy: WrongKeyPolicy,
    sequence: Vec<char>,
    cursor: usize,
    started_at: Instant,
    deadline: Instant,
    slam_bonus_used_s: f64,
}

impl ChallengeRun {
    pub fn new(spec: ChallengeSpec, wrong_key_policy: WrongKeyPolicy, now: Instant) -> Self {
        let deadline = now + Duration::from_secs_f64(spec.time_budget_s);
        let sequence = spec.sequence.clone();
        Self {
            spec,
            wrong_key_policy,
            sequence,
            cursor: 0,
            started_at: now,
            deadline,
            slam_bonus_used_s: 0.0,
        }
    }

    pub fn spec(&self) -> &ChallengeSpec {
        &self.spec
    }

    /// Symbols still owed, current one included.
    pub fn keys_remaining(&self) -> usize {
        self.sequence.len() - self.cursor
    }

    pub fn next_key(&self) -> Option<char> {
        self.sequence.get(self.cursor).copied()
    }

    /// Symbols still to type, in order.
    pub fn pending(&self) -> &[char] {
        &self.sequence[self.cursor..]
    }

    pub fn remaining_s(&self, now: Instant) -> f64 {
        self.deadline
            .checked_duration_since(now)
            .map_or(0.0, |d| d.as_secs_f64())
    }

    pub fn elapsed_s(&self, now: Instant) -> f64 {
        now.duration_since(self.started_at).as_secs_f64()
    }

    /// Feed one key press. Returns the outcome once the run is decided.
    pub fn handle_key(
        &mut self,
        key: char,
        now: Instant,
        rng: &mut StdRng,
    ) -> Option<ChallengeOutcome> {
        if now >= self.deadline {
            return Some(self.finish(ChallengeResult::TimedOut, now));
        }

        if self.next_key() != Some(key) {
            return match self.wrong_key_policy {
                WrongKeyPolicy::Ignore => None,
                WrongKeyPolicy::Fail => Some(self.finish(ChallengeResult::Failure, now)),
            };
        }

        self.cursor += 1;

        // Slash: a finishing strike ends the run outright, a normal strike
        // cuts one symbol from beyond the immediate next key.
        if self.spec.can_slash {
            if roll(rng, self.spec.slash_finish_chance) {
                self.cursor = self.sequence.len();
                debug!("finishing slash on {}", self.spec.fish_name);
            } else if self.keys_remaining() >= 2 && roll(rng, self.spec.slash_chance) {
                let cut = rng.gen_range(self.cursor + 1..self.sequence.len());
                self.sequence.remove(cut);
                debug!("slash cut the line work down to {}", self.keys_remaining());
            }
        }

        // Slam: extra time, hard-capped per run.
        if self.spec.can_slam && roll(rng, self.spec.slam_chance) {
            let headroom = self.spec.slam_bonus_cap_s - self.slam_bonus_used_s;
            let bonus = self.spec.slam_time_bonus_s.min(headroom).max(0.0);
            if bonus > 0.0 {
                self.deadline += Duration::from_secs_f64(bonus);
                self.slam_bonus_used_s += bonus;
                debug!("slam bought {:.2}s", bonus);
            }
        }

        if self.cursor >= self.sequence.len() {
            return Some(self.finish(ChallengeResult::Success, now));
        }
        None
    }

    /// Poll the deadline. Returns the timeout outcome once it has passed.
    pub fn check_timeout(&self, now: Instant) -> Option<ChallengeOutcome> {
        if now >= self.deadline {
            Some(self.finish(ChallengeResult::TimedOut, now))
        } else {
            None
        }
    }

    fn finish(&self, result: ChallengeResult, now: Instant) -> ChallengeOutcome {
        ChallengeOutcome {
            result,
            elapsed_s: self.elapsed_s(now),
            keys_remaining: self.keys_remaining(),
        }
    }
}

fn roll(rng: &mut StdRng, chance: f64) -> bool {
    let chance = chance.clamp(0.0, 1.0);
    chance > 0.0 && rng.gen_bool(chance)
}

// --- Key listener ---

/// Key presses forwarded from the listener thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    /// Esc or Ctrl-C.
    Cancel,
}

/// Background thread reading raw terminal events into a channel. Stops when
/// dropped, when told to, or when the receiving side goes away.
pub struct KeyStream {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyStream {
    /// Start the listener. Probes the event source first so a missing
    /// terminal surfaces as `InputCaptureUnavailable` instead of a dead
    /// channel.
    pub fn spawn(tx: mpsc::UnboundedSender<KeyInput>) -> Result<Self, EncounterError> {
        if let Err(err) = event::poll(Duration::ZERO) {
            return Err(EncounterError::InputCaptureUnavailable(err.to_string()));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("key-listener".to_string())
            .spawn(move || listener_loop(tx, stop_flag))
            .map_err(|err| EncounterError::InputCaptureUnavailable(err.to_string()))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("key listener thread panicked");
            }
        }
    }
}

impl Drop for KeyStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listener_loop(tx: mpsc::UnboundedSender<KeyInput>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match event::poll(Duration::from_millis(50)) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(err) => {
                warn!("key listener poll failed: {err}");
                break;
            }
        }
        let key = match event::read() {
            Ok(Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                modifiers,
                ..
            })) => match code {
                KeyCode::Esc => KeyInput::Cancel,
                KeyCode::Char('c')
                    if modifiers.contains(event::KeyModifiers::CONTROL) =>
                {
                    KeyInput::Cancel
                }
                KeyCode::Char(c) => KeyInput::Char(c.to_ascii_lowercase()),
                _ => continue,
            },
            Ok(_) => continue,
            Err(err) => {
                warn!("key listener read failed: {err}");
                break;
            }
        };
        if tx.send(key).is_err() {
            break;
        }
    }
}

// --- Async resolution loop ---

/// Run the countdown against a live key feed.
///
/// Resolution ends when the sequence completes, the budget runs out, a wrong
/// key fails the run under the `Fail` policy, or the player cancels (Esc on
/// the key feed or the `cancel` signal flipping to true). `on_tick` fires on
/// every countdown tick so the caller can redraw its progress display.
pub async fn resolve_challenge<F>(
    spec: ChallengeSpec,
    config: &EngineConfig,
    rng: &mut StdRng,
    keys: &mut mpsc::UnboundedReceiver<KeyInput>,
    cancel: &mut watch::Receiver<bool>,
    mut on_tick: F,
) -> Result<ChallengeOutcome, EncounterError>
where
    F: FnMut(&ChallengeRun),
{
    let mut run = ChallengeRun::new(spec, config.input.wrong_key_policy, Instant::now());
    let tick = Duration::from_millis(config.timing.tick_ms.clamp(1, 50));
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut input_open = true;
    let mut cancel_open = true;

    loop {
        tokio::select! {
            key = keys.recv(), if input_open => {
                match key {
                    Some(KeyInput::Cancel) => return Err(EncounterError::CancelledByPlayer),
                    Some(KeyInput::Char(c)) => {
                        if let Some(outcome) = run.handle_key(c, Instant::now(), rng) {
                            return Ok(outcome);
                        }
                    }
                    // Listener gone; the countdown alone decides the run.
                    None => input_open = false,
                }
            }
            changed = cancel.changed(), if cancel_open => {
                match changed {
                    Ok(()) if *cancel.borrow() => {
                        return Err(EncounterError::CancelledByPlayer);
                    }
                    Ok(()) => {}
                    // Sender dropped without cancelling; nobody can cancel
                    // any more, the run itself decides.
                    Err(_) => cancel_open = false,
                }
            }
            _ = ticker.tick() => {
                if let Some(outcome) = run.check_timeout(Instant::now()) {
                    return Ok(outcome);
                }
                on_tick(&run);
            }
        }
    }
}

/// Turn-based fallback: one full line of input, judged against the sequence
/// and the budget after the fact. Slash and slam never trigger here.
pub fn resolve_blocking<R: BufRead>(
    spec: &ChallengeSpec,
    input: &mut R,
) -> Result<ChallengeOutcome, EncounterError> {
    let started = Instant::now();
    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|err| EncounterError::InputCaptureUnavailable(err.to_string()))?;
    let elapsed_s = started.elapsed().as_secs_f64();

    let typed: Vec<char> = line.trim().chars().map(|c| c.to_ascii_lowercase()).collect();
    let matched = typed
        .iter()
        .zip(spec.sequence.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let keys_remaining = spec.sequence.len() - matched;

    let result = if elapsed_s > spec.time_budget_s {
        ChallengeResult::TimedOut
    } else if matched == spec.sequence.len() && typed.len() == spec.sequence.len() {
        ChallengeResult::Success
    } else {
        ChallengeResult::Failure
    };

    Ok(ChallengeOutcome {
        result,
        elapsed_s,
        keys_remaining,
    })
}
