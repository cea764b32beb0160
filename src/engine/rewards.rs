//! XP and gold payout for a resolved encounter.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::content::{MutationProfile, Rarity};
use crate::engine::resolver::ChallengeResult;

lazy_static! {
    /// Base XP per rarity tier.
    pub static ref RARITY_XP: HashMap<Rarity, u32> = {
        let mut m = HashMap::new();
        m.insert(Rarity::Common, 10);
        m.insert(Rarity::Uncommon, 20);
        m.insert(Rarity::Rare, 35);
        m.insert(Rarity::Epic, 60);
        m.insert(Rarity::Legendary, 100);
        m
    };

    /// Base gold per rarity tier.
    pub static ref RARITY_GOLD: HashMap<Rarity, u32> = {
        let mut m = HashMap::new();
        m.insert(Rarity::Common, 5);
        m.insert(Rarity::Uncommon, 12);
        m.insert(Rarity::Rare, 25);
        m.insert(Rarity::Epic, 50);
        m.insert(Rarity::Legendary, 120);
        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewardDelta {
    pub xp: u64,
    pub gold: u64,
}

/// Final payout: base table value scaled by the mutation and event
/// multipliers, rounded half-up. Anything but a clean success pays nothing.
pub fn calculate_rewards(
    rarity: Rarity,
    mutation: Option<&MutationProfile>,
    xp_mult: f64,
    money_mult: f64,
    result: ChallengeResult,
) -> RewardDelta {
    if result != ChallengeResult::Success {
        return RewardDelta::default();
    }

    let (mutation_xp, mutation_gold) = mutation
        .map(|m| (m.xp_multiplier, m.gold_multiplier))
        .unwrap_or((1.0, 1.0));

    let base_xp = RARITY_XP.get(&rarity).copied().unwrap_or(0) as f64;
    let base_gold = RARITY_GOLD.get(&rarity).copied().unwrap_or(0) as f64;

    RewardDelta {
        xp: round_half_up(base_xp * mutation_xp * xp_mult),
        gold: round_half_up(base_gold * mutation_gold * money_mult),
    }
}

/// Ties round away from zero: 2.5 pays 3.
fn round_half_up(value: f64) -> u64 {
    (value + 0.5).floor().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation(xp: f64, gold: f64) -> MutationProfile {
        MutationProfile {
            name: "Test".to_string(),
            xp_multiplier: xp,
            gold_multiplier: gold,
            chance: 0.1,
            required_rod: None,
        }
    }

    #[test]
    fn failure_and_timeout_pay_nothing() {
        for result in [ChallengeResult::Failure, ChallengeResult::TimedOut] {
            let reward = calculate_rewards(Rarity::Legendary, None, 2.0, 2.0, result);
            assert_eq!(reward, RewardDelta::default());
        }
    }

    #[test]
    fn base_tables_pay_unmodified_on_success() {
        let reward = calculate_rewards(Rarity::Rare, None, 1.0, 1.0, ChallengeResult::Success);
        assert_eq!(reward.xp, 35);
        assert_eq!(reward.gold, 25);
    }

    #[test]
    fn mutation_and_event_multipliers_stack() {
        let m = mutation(2.0, 3.0);
        let reward =
            calculate_rewards(Rarity::Common, Some(&m), 1.5, 2.0, ChallengeResult::Success);
        // 10 * 2.0 * 1.5 = 30 xp; 5 * 3.0 * 2.0 = 30 gold.
        assert_eq!(reward.xp, 30);
        assert_eq!(reward.gold, 30);
    }

    #[test]
    fn halves_round_up() {
        let m = mutation(1.25, 1.1);
        let reward =
            calculate_rewards(Rarity::Common, Some(&m), 1.0, 1.0, ChallengeResult::Success);
        // 10 * 1.25 = 12.5 rounds to 13; 5 * 1.1 = 5.5 rounds to 6.
        assert_eq!(reward.xp, 13);
        assert_eq!(reward.gold, 6);
    }
}
