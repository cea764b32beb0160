use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    pub timing: TimingConfig,
    pub input: InputConfig,
    pub hunts: HuntPolicyConfig,
    pub pace: PaceConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TimingConfig {
    /// Countdown tick resolution for the foreground loop, in milliseconds.
    pub tick_ms: u64,
    /// Effective time budgets never drop below this, in seconds.
    pub min_budget_s: f64,
    /// Slam bonus time can never push the total budget past
    /// `slam_cap_multiplier * base budget`.
    pub slam_cap_multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WrongKeyPolicy {
    /// Off-sequence keys are dropped with no time penalty.
    Ignore,
    /// Any off-sequence key ends the attempt as a failure.
    Fail,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InputConfig {
    pub wrong_key_policy: WrongKeyPolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HuntPolicyConfig {
    /// Fraction of the threshold the disturbance counter keeps when a hunt
    /// expires uncaught. A successful exclusive catch always resets to zero.
    pub expiry_credit: f64,
}

/// Rapid consecutive catches shrink the next reaction window.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PaceConfig {
    pub window_s: f64,
    pub trigger_catches: u32,
    pub step_multiplier: f64,
    pub min_multiplier: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig {
                tick_ms: 50,
                min_budget_s: 0.5,
                slam_cap_multiplier: 2.0,
            },
            input: InputConfig {
                wrong_key_policy: WrongKeyPolicy::Ignore,
            },
            hunts: HuntPolicyConfig { expiry_credit: 0.5 },
            pace: PaceConfig {
                window_s: 1.5,
                trigger_catches: 2,
                step_multiplier: 0.85,
                min_multiplier: 0.55,
            },
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: EngineConfig = toml::from_str(&content)?;
        config.hunts.expiry_credit = config.hunts.expiry_credit.clamp(0.0, 1.0);
        config.timing.slam_cap_multiplier = config.timing.slam_cap_multiplier.max(1.0);
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
