//! Per-pool disturbance tracking and the Calm/Hunting state machine.
//!
//! Every completed catch attempt stirs the pool. Enough disturbance flips the
//! pool into a hunt, which restricts the selector to the hunt's exclusive fish
//! until it is caught or the hunt times out. Decay and expiry are recomputed
//! lazily at the next read; there is no background timer thread.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info};
use parking_lot::Mutex;

use crate::content::HuntSpec;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HuntMode {
    Calm,
    Hunting { expires_at: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuntEndReason {
    Caught,
    Expired,
}

/// Transition events drained by the caller for UI notification and saves.
#[derive(Debug, Clone, PartialEq)]
pub enum HuntNotice {
    Started {
        pool: String,
        hunt: String,
        expires_at: Instant,
    },
    Ended {
        pool: String,
        hunt: String,
        reason: HuntEndReason,
    },
}

#[derive(Debug)]
struct PoolState {
    disturbance: f64,
    last_attempt: Instant,
    /// High-water mark for lazy decay so repeated reads never double-drain.
    decayed_to: Instant,
    /// No new hunt can start before this instant.
    calm_until: Instant,
    mode: HuntMode,
}

impl PoolState {
    fn new(now: Instant) -> Self {
        Self {
            disturbance: 0.0,
            last_attempt: now,
            decayed_to: now,
            calm_until: now,
            mode: HuntMode::Calm,
        }
    }
}

pub struct HuntMachine {
    specs: HashMap<String, HuntSpec>,
    states: HashMap<String, PoolState>,
    expiry_credit: f64,
    notices: Mutex<Vec<HuntNotice>>,
}

impl HuntMachine {
    /// `specs` maps pool name to that pool's hunt definition. Pools without an
    /// entry never hunt; their attempts are ignored.
    pub fn new(specs: HashMap<String, HuntSpec>, expiry_credit: f64, now: Instant) -> Self {
        let states = specs
            .keys()
            .map(|pool| (pool.clone(), PoolState::new(now)))
            .collect();
        Self {
            specs,
            states,
            expiry_credit: expiry_credit.clamp(0.0, 1.0),
            notices: Mutex::new(Vec::new()),
        }
    }

    /// Count one completed catch attempt (success or failure both disturb the
    /// water). May transition the pool into `Hunting`.
    pub fn record_attempt(&mut self, pool: &str, now: Instant) {
        self.refresh(pool, now);
        let Some(spec) = self.specs.get(pool) else {
            return;
        };
        let Some(state) = self.states.get_mut(pool) else {
            return;
        };

        state.disturbance =
            (state.disturbance + spec.disturbance_per_attempt).clamp(0.0, spec.threshold);
        state.last_attempt = now;
        state.decayed_to = now;
        debug!(
            "pool '{}' disturbance {:.1}/{:.1}",
            pool, state.disturbance, spec.threshold
        );

        if matches!(state.mode, HuntMode::Calm)
            && now >= state.calm_until
            && state.disturbance >= spec.threshold
        {
            let expires_at = now + Duration::from_secs_f64(spec.duration_s);
            state.mode = HuntMode::Hunting { expires_at };
            info!("hunt started in '{}': {}", pool, spec.name);
            self.notices.lock().push(HuntNotice::Started {
                pool: pool.to_string(),
                hunt: spec.name.clone(),
                expires_at,
            });
        }
    }

    /// The hunt's exclusive fish was landed: the hunt closes immediately and
    /// the counter resets to zero.
    pub fn record_exclusive_catch(&mut self, pool: &str, now: Instant) {
        self.refresh(pool, now);
        let Some(spec) = self.specs.get(pool) else {
            return;
        };
        let Some(state) = self.states.get_mut(pool) else {
            return;
        };
        if matches!(state.mode, HuntMode::Hunting { .. }) {
            state.mode = HuntMode::Calm;
            state.disturbance = 0.0;
            state.last_attempt = now;
            state.decayed_to = now;
            state.calm_until = now + Duration::from_secs_f64(spec.cooldown_s.max(0.0));
            info!("hunt in '{}' resolved: exclusive catch", pool);
            self.notices.lock().push(HuntNotice::Ended {
                pool: pool.to_string(),
                hunt: spec.name.clone(),
                reason: HuntEndReason::Caught,
            });
        }
    }

    /// The hunt spec restricting the pool right now, if any.
    pub fn active_hunt(&mut self, pool: &str, now: Instant) -> Option<&HuntSpec> {
        self.refresh(pool, now);
        match self.states.get(pool)?.mode {
            HuntMode::Hunting { .. } => self.specs.get(pool),
            HuntMode::Calm => None,
        }
    }

    pub fn mode(&mut self, pool: &str, now: Instant) -> HuntMode {
        self.refresh(pool, now);
        self.states
            .get(pool)
            .map_or(HuntMode::Calm, |state| state.mode)
    }

    pub fn disturbance(&mut self, pool: &str, now: Instant) -> f64 {
        self.refresh(pool, now);
        self.states.get(pool).map_or(0.0, |state| state.disturbance)
    }

    pub fn pop_notices(&self) -> Vec<HuntNotice> {
        std::mem::take(&mut *self.notices.lock())
    }

    /// Apply any expiry or idle decay that accrued since the last read.
    fn refresh(&mut self, pool: &str, now: Instant) {
        let Some(spec) = self.specs.get(pool) else {
            return;
        };
        let Some(state) = self.states.get_mut(pool) else {
            return;
        };

        if let HuntMode::Hunting { expires_at } = state.mode {
            if now >= expires_at {
                state.mode = HuntMode::Calm;
                state.disturbance = self.expiry_credit * spec.threshold;
                state.last_attempt = expires_at;
                state.decayed_to = expires_at;
                state.calm_until = expires_at + Duration::from_secs_f64(spec.cooldown_s.max(0.0));
                info!("hunt in '{}' expired uncaught", pool);
                self.notices.lock().push(HuntNotice::Ended {
                    pool: pool.to_string(),
                    hunt: spec.name.clone(),
                    reason: HuntEndReason::Expired,
                });
            }
        }

        if matches!(state.mode, HuntMode::Calm) && spec.decay_per_s > 0.0 {
            let decay_start = state
                .decayed_to
                .max(state.last_attempt + Duration::from_secs_f64(spec.idle_decay_after_s));
            if now > decay_start {
                let idle = now.duration_since(decay_start).as_secs_f64();
                state.disturbance = (state.disturbance - idle * spec.decay_per_s).max(0.0);
                state.decayed_to = now;
            }
        }
    }
}
