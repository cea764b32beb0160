//! Turns a hooked fish into a concrete key-sequence challenge.
//!
//! The builder samples the catch weight, applies the rod's hard capacity
//! gate, generates the key sequence and computes the time budget from the
//! fish's reaction window, gear control and event bonuses. A pace tracker
//! shrinks the window after rapid consecutive catches.

use std::collections::VecDeque;
use std::time::Instant;

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;

use crate::config::{PaceConfig, TimingConfig};
use crate::content::{FishProfile, Rarity, DEFAULT_KEYS};
use crate::engine::modifiers::ModifierSet;

/// Everything the resolver needs to run one challenge.
#[derive(Debug, Clone)]
pub struct ChallengeSpec {
    pub fish_name: String,
    pub rarity: Rarity,
    pub kg: f64,
    pub sequence: Vec<char>,
    /// Final countdown budget after control, events and pace, in seconds.
    pub time_budget_s: f64,
    pub can_slash: bool,
    pub slash_chance: f64,
    pub slash_finish_chance: f64,
    pub can_slam: bool,
    pub slam_chance: f64,
    pub slam_time_bonus_s: f64,
    /// Total slam bonus time can never exceed this, in seconds.
    pub slam_bonus_cap_s: f64,
}

/// A hooked fish either yields a runnable challenge or snaps the line.
#[derive(Debug, Clone)]
pub enum ChallengeSetup {
    Ready(ChallengeSpec),
    /// The sampled weight exceeds gear capacity. The encounter still counts
    /// as a failed attempt, it is not an error.
    Overweight { kg: f64, capacity_kg: f64 },
}

/// Build the challenge for a selected fish, or report an overweight catch.
pub fn build_challenge(
    fish: &FishProfile,
    mods: &ModifierSet,
    timing: &TimingConfig,
    pace_multiplier: f64,
    rng: &mut StdRng,
) -> ChallengeSetup {
    let kg = sample_weight(fish, rng);
    if kg > mods.gear.kg_capacity {
        debug!(
            "{} at {:.2}kg over the {:.2}kg capacity",
            fish.name, kg, mods.gear.kg_capacity
        );
        return ChallengeSetup::Overweight {
            kg,
            capacity_kg: mods.gear.kg_capacity,
        };
    }

    let sequence = generate_sequence(fish, rng);
    let raw_budget = fish.reaction_time_s + mods.gear.control + mods.time_bonus_s;
    let time_budget_s = (raw_budget * pace_multiplier).max(timing.min_budget_s);
    let slam_bonus_cap_s = (timing.slam_cap_multiplier - 1.0).max(0.0) * time_budget_s;

    ChallengeSetup::Ready(ChallengeSpec {
        fish_name: fish.name.clone(),
        rarity: fish.rarity,
        kg,
        sequence,
        time_budget_s,
        can_slash: mods.gear.can_slash,
        slash_chance: mods.gear.slash_chance,
        slash_finish_chance: mods.gear.slash_finish_chance,
        can_slam: mods.gear.can_slam,
        slam_chance: mods.gear.slam_chance,
        slam_time_bonus_s: mods.gear.slam_time_bonus_s,
        slam_bonus_cap_s,
    })
}

fn sample_weight(fish: &FishProfile, rng: &mut StdRng) -> f64 {
    let lo = fish.kg_min.min(fish.kg_max).max(0.0);
    let hi = fish.kg_max.max(lo);
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

fn generate_sequence(fish: &FishProfile, rng: &mut StdRng) -> Vec<char> {
    let len = match fish.sequence_len {
        Some(len) => len.max(1),
        None => {
            let (lo, hi) = fish.sequence_len_range;
            let lo = lo.max(1);
            let hi = hi.max(lo);
            rng.gen_range(lo..=hi)
        }
    };

    let keys: &[char] = if fish.allowed_keys.is_empty() {
        &DEFAULT_KEYS
    } else {
        &fish.allowed_keys
    };
    (0..len).map(|_| keys[rng.gen_range(0..keys.len())]).collect()
}

/// Sliding-window catch counter. Two or more catches inside the window start
/// compounding the penalty step; the multiplier never drops below the floor.
#[derive(Debug)]
pub struct PaceTracker {
    config: PaceConfig,
    recent: VecDeque<Instant>,
}

impl PaceTracker {
    pub fn new(config: PaceConfig) -> Self {
        Self {
            config,
            recent: VecDeque::new(),
        }
    }

    /// Register a successful catch at `now`.
    pub fn record(&mut self, now: Instant) {
        self.prune(now);
        self.recent.push_back(now);
    }

    /// Budget multiplier for the next challenge built at `now`.
    pub fn multiplier(&mut self, now: Instant) -> f64 {
        self.prune(now);
        let count = self.recent.len() as u32;
        if count < self.config.trigger_catches {
            return 1.0;
        }
        let steps = count - self.config.trigger_catches + 1;
        let factor = self.config.step_multiplier.powi(steps as i32);
        factor.max(self.config.min_multiplier)
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.recent.front() {
            if now.duration_since(front).as_secs_f64() > self.config.window_s {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::content::{GearStats, DEMO_RODS};
    use rand::SeedableRng;
    use std::time::Duration;

    fn base_mods() -> ModifierSet {
        ModifierSet {
            gear: GearStats::from_loadout(&DEMO_RODS[0], None),
            luck_mult: 1.0,
            xp_mult: 1.0,
            money_mult: 1.0,
            mutation_chance_mult: 1.0,
            time_bonus_s: 0.0,
            extra_fish: Vec::new(),
            extra_mutations: Vec::new(),
            hunt: None,
        }
    }

    fn test_fish() -> FishProfile {
        let mut fish = FishProfile::new("Perch", Rarity::Common, 0.5, 1.5, 5.0);
        fish.sequence_len = Some(5);
        fish
    }

    #[test]
    fn heavy_fish_trips_the_capacity_gate() {
        let fish = FishProfile::new("Anchor Eel", Rarity::Rare, 500.0, 600.0, 80.0);
        let mods = base_mods();
        let timing = EngineConfig::default().timing;
        let mut rng = StdRng::seed_from_u64(1);
        match build_challenge(&fish, &mods, &timing, 1.0, &mut rng) {
            ChallengeSetup::Overweight { kg, capacity_kg } => {
                assert!(kg >= 500.0);
                assert_eq!(capacity_kg, mods.gear.kg_capacity);
            }
            ChallengeSetup::Ready(_) => panic!("capacity gate did not fire"),
        }
    }

    #[test]
    fn control_and_event_bonus_extend_the_budget() {
        let fish = test_fish();
        let timing = EngineConfig::default().timing;
        let mut rng = StdRng::seed_from_u64(2);

        let mut mods = base_mods();
        mods.gear.control = 1.0;
        mods.time_bonus_s = 0.5;

        match build_challenge(&fish, &mods, &timing, 1.0, &mut rng) {
            ChallengeSetup::Ready(spec) => {
                let expected = fish.reaction_time_s + 1.0 + 0.5;
                assert!((spec.time_budget_s - expected).abs() < 1e-9);
                assert_eq!(spec.sequence.len(), 5);
                assert!(spec.sequence.iter().all(|c| DEFAULT_KEYS.contains(c)));
            }
            ChallengeSetup::Overweight { .. } => panic!("unexpected overweight"),
        }
    }

    #[test]
    fn budget_never_drops_below_the_floor() {
        let mut fish = test_fish();
        fish.reaction_time_s = 0.1;
        let mods = base_mods();
        let timing = EngineConfig::default().timing;
        let mut rng = StdRng::seed_from_u64(3);
        match build_challenge(&fish, &mods, &timing, 0.55, &mut rng) {
            ChallengeSetup::Ready(spec) => {
                assert!(spec.time_budget_s >= timing.min_budget_s)
            }
            ChallengeSetup::Overweight { .. } => panic!("unexpected overweight"),
        }
    }

    #[test]
    fn slam_cap_tracks_the_final_budget() {
        let fish = test_fish();
        let mods = base_mods();
        let timing = EngineConfig::default().timing;
        let mut rng = StdRng::seed_from_u64(4);
        match build_challenge(&fish, &mods, &timing, 1.0, &mut rng) {
            ChallengeSetup::Ready(spec) => {
                let expected = (timing.slam_cap_multiplier - 1.0) * spec.time_budget_s;
                assert!((spec.slam_bonus_cap_s - expected).abs() < 1e-9);
            }
            ChallengeSetup::Overweight { .. } => panic!("unexpected overweight"),
        }
    }

    #[test]
    fn pace_penalty_kicks_in_after_rapid_catches() {
        let config = EngineConfig::default().pace;
        let mut pace = PaceTracker::new(config.clone());
        let start = Instant::now();

        assert_eq!(pace.multiplier(start), 1.0);
        pace.record(start);
        assert_eq!(pace.multiplier(start), 1.0);
        pace.record(start + Duration::from_millis(300));
        let penalized = pace.multiplier(start + Duration::from_millis(400));
        assert!((penalized - config.step_multiplier).abs() < 1e-9);
    }

    #[test]
    fn pace_penalty_floors_and_recovers() {
        let config = EngineConfig::default().pace;
        let mut pace = PaceTracker::new(config.clone());
        let start = Instant::now();

        for i in 0..10 {
            pace.record(start + Duration::from_millis(i * 100));
        }
        let floored = pace.multiplier(start + Duration::from_secs(1));
        assert_eq!(floored, config.min_multiplier);

        // Everything slides out of the window after a long idle stretch.
        let recovered = pace.multiplier(start + Duration::from_secs(30));
        assert_eq!(recovered, 1.0);
    }
}
