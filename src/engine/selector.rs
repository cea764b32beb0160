//! Weighted fish and mutation selection for one encounter.
//!
//! Tier weights are shaped by effective luck, the draw is tier-first then
//! uniform within the tier, and mutations roll independently afterwards. All
//! randomness comes from the injected RNG so tests can pin outcomes.

use std::collections::BTreeMap;

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;

use crate::content::{FishProfile, MutationProfile, PoolDefinition, Rarity};
use crate::engine::modifiers::ModifierSet;
use crate::engine::EncounterError;

#[derive(Debug, Clone)]
pub struct Selection {
    pub fish: FishProfile,
    pub mutation: Option<MutationProfile>,
    /// True when the fish came from the hunt's exclusive set.
    pub from_hunt: bool,
}

/// Pick one fish (and independently, at most one mutation) from the pool.
///
/// While a hunt is active the draw is restricted to the hunt's exclusive fish
/// under the hunt's override weight table. If the primary population produces
/// no positive weight mass, the selector falls back to the pool's unfiltered
/// population under uniform tier weights before giving up.
pub fn select_candidate(
    pool: &PoolDefinition,
    mutations: &[MutationProfile],
    mods: &ModifierSet,
    rng: &mut StdRng,
) -> Result<Selection, EncounterError> {
    let luck = mods.effective_luck();

    let (fish, from_hunt) = match &mods.hunt {
        Some(hunt) if !hunt.fish.is_empty() => {
            let population: Vec<&FishProfile> = hunt.fish.iter().collect();
            match draw_fish(&population, &hunt.rarity_weights, luck, rng) {
                Some(fish) => (fish, true),
                None => (fallback_draw(pool, rng)?, false),
            }
        }
        _ => {
            let mut population: Vec<&FishProfile> = pool.fish.iter().collect();
            population.extend(mods.extra_fish.iter());
            match draw_fish(&population, &pool.rarity_weights, luck, rng) {
                Some(fish) => (fish, false),
                None => (fallback_draw(pool, rng)?, false),
            }
        }
    };

    let mutation = roll_mutation(mutations, mods, rng);
    debug!(
        "selected {} [{}]{}",
        fish.name,
        fish.rarity.label(),
        mutation
            .as_ref()
            .map(|m| format!(" + {}", m.name))
            .unwrap_or_default()
    );

    Ok(Selection {
        fish,
        mutation,
        from_hunt,
    })
}

/// Tier-weighted draw, then a uniform pick within the winning tier. Returns
/// `None` when the population is empty or no tier carries positive weight.
fn draw_fish(
    population: &[&FishProfile],
    base_weights: &BTreeMap<Rarity, f64>,
    luck: f64,
    rng: &mut StdRng,
) -> Option<FishProfile> {
    let mut by_tier: BTreeMap<Rarity, Vec<&FishProfile>> = BTreeMap::new();
    for fish in population {
        by_tier.entry(fish.rarity).or_default().push(fish);
    }
    if by_tier.is_empty() {
        return None;
    }

    let present: BTreeMap<Rarity, f64> = by_tier
        .keys()
        .map(|&tier| (tier, base_weights.get(&tier).copied().unwrap_or(0.0).max(0.0)))
        .collect();
    let shaped = apply_luck_to_weights(&present, luck);

    let entries: Vec<(Rarity, f64)> = shaped.into_iter().collect();
    let tier = weighted_pick(&entries, rng)?;

    let candidates = &by_tier[&tier];
    let index = rng.gen_range(0..candidates.len());
    Some(candidates[index].clone())
}

/// Last-resort draw over the pool's unfiltered population with uniform tier
/// weights. Only an empty pool fails.
fn fallback_draw(pool: &PoolDefinition, rng: &mut StdRng) -> Result<FishProfile, EncounterError> {
    let population: Vec<&FishProfile> = pool.fish.iter().collect();
    let uniform: BTreeMap<Rarity, f64> = population.iter().map(|f| (f.rarity, 1.0)).collect();
    draw_fish(&population, &uniform, 0.0, rng).ok_or(EncounterError::NoEligibleCandidate)
}

/// Shift probability mass toward the high tiers as luck rises.
///
/// Each present tier gets `1 + luck * (1 + luck) * rank_ratio` where
/// `rank_ratio` runs 0..=1 from the lowest to the highest present tier, so the
/// lowest tier is untouched and every tier above it grows strictly with luck.
/// Negative luck applies the mirrored penalty, floored at zero.
fn apply_luck_to_weights(weights: &BTreeMap<Rarity, f64>, luck: f64) -> BTreeMap<Rarity, f64> {
    let max_rank = weights.len().saturating_sub(1);
    if luck == 0.0 || max_rank == 0 {
        return weights.clone();
    }

    weights
        .iter()
        .enumerate()
        .map(|(rank, (&tier, &weight))| {
            let ratio = rank as f64 / max_rank as f64;
            let multiplier = if luck > 0.0 {
                1.0 + luck * (1.0 + luck) * ratio
            } else {
                let penalty = luck.abs() * (1.0 + luck.abs());
                (1.0 - penalty * ratio).max(0.0)
            };
            (tier, weight * multiplier)
        })
        .collect()
}

fn weighted_pick(entries: &[(Rarity, f64)], rng: &mut StdRng) -> Option<Rarity> {
    let total: f64 = entries.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }

    let mut roll = rng.gen_range(0.0..total);
    for (tier, weight) in entries {
        if roll < *weight {
            return Some(*tier);
        }
        roll -= weight;
    }
    entries.last().map(|(tier, _)| *tier)
}

/// Roll each eligible mutation in catalog order and keep the first success.
/// Mutations restricted to another rod never roll.
fn roll_mutation(
    mutations: &[MutationProfile],
    mods: &ModifierSet,
    rng: &mut StdRng,
) -> Option<MutationProfile> {
    let candidates = mutations.iter().chain(mods.extra_mutations.iter());
    for mutation in candidates {
        if let Some(required) = &mutation.required_rod {
            if *required != mods.gear.rod_name {
                continue;
            }
        }
        let chance = (mutation.chance * mods.mutation_chance_mult).clamp(0.0, 1.0);
        if chance > 0.0 && rng.gen_bool(chance) {
            return Some(mutation.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{GearStats, DEMO_RODS};
    use rand::SeedableRng;

    fn gear_with_luck(luck: f64) -> GearStats {
        let mut gear = GearStats::from_loadout(&DEMO_RODS[0], None);
        gear.luck = luck;
        gear
    }

    fn mods_with_luck(luck: f64) -> ModifierSet {
        ModifierSet {
            gear: gear_with_luck(luck),
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

    fn three_tier_pool() -> PoolDefinition {
        let mut rarity_weights = BTreeMap::new();
        rarity_weights.insert(Rarity::Common, 70.0);
        rarity_weights.insert(Rarity::Rare, 25.0);
        rarity_weights.insert(Rarity::Legendary, 5.0);
        PoolDefinition {
            name: "Test Pond".to_string(),
            fish: vec![
                FishProfile::new("Minnow", Rarity::Common, 0.1, 0.5, 1.0),
                FishProfile::new("Pike", Rarity::Rare, 2.0, 8.0, 20.0),
                FishProfile::new("Leviathan", Rarity::Legendary, 40.0, 90.0, 500.0),
            ],
            rarity_weights,
        }
    }

    fn count_draws(pool: &PoolDefinition, luck: f64, trials: u32, seed: u64) -> BTreeMap<Rarity, u32> {
        let mods = mods_with_luck(luck);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut counts: BTreeMap<Rarity, u32> = BTreeMap::new();
        for _ in 0..trials {
            let selection = select_candidate(pool, &[], &mods, &mut rng).unwrap();
            *counts.entry(selection.fish.rarity).or_default() += 1;
        }
        counts
    }

    #[test]
    fn zero_luck_draws_match_base_weights() {
        let pool = three_tier_pool();
        let trials = 100_000;
        let counts = count_draws(&pool, 0.0, trials, 7);

        let expectations = [
            (Rarity::Common, 0.70),
            (Rarity::Rare, 0.25),
            (Rarity::Legendary, 0.05),
        ];
        for (tier, expected) in expectations {
            let observed = counts.get(&tier).copied().unwrap_or(0) as f64 / trials as f64;
            assert!(
                (observed - expected).abs() < 0.01,
                "{:?}: observed {:.4}, expected {:.2}",
                tier,
                observed,
                expected
            );
        }
    }

    #[test]
    fn higher_luck_never_hurts_the_top_tier() {
        let pool = three_tier_pool();
        let trials = 50_000;
        let mut previous = 0u32;
        for (i, luck) in [0.0, 0.5, 1.0, 2.0].into_iter().enumerate() {
            let counts = count_draws(&pool, luck, trials, 11);
            let legendary = counts.get(&Rarity::Legendary).copied().unwrap_or(0);
            if i > 0 {
                assert!(
                    legendary >= previous,
                    "legendary draws fell from {} to {} at luck {}",
                    previous,
                    legendary,
                    luck
                );
            }
            previous = legendary;
        }
    }

    #[test]
    fn luck_multiplier_is_monotone_per_tier() {
        let mut weights = BTreeMap::new();
        weights.insert(Rarity::Common, 70.0);
        weights.insert(Rarity::Rare, 25.0);
        weights.insert(Rarity::Legendary, 5.0);

        let low = apply_luck_to_weights(&weights, 0.5);
        let high = apply_luck_to_weights(&weights, 2.0);
        assert_eq!(low[&Rarity::Common], high[&Rarity::Common]);
        assert!(high[&Rarity::Rare] > low[&Rarity::Rare]);
        assert!(high[&Rarity::Legendary] > low[&Rarity::Legendary]);
    }

    #[test]
    fn empty_pool_is_no_eligible_candidate() {
        let pool = PoolDefinition {
            name: "Dry Dock".to_string(),
            fish: Vec::new(),
            rarity_weights: BTreeMap::new(),
        };
        let mods = mods_with_luck(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            select_candidate(&pool, &[], &mods, &mut rng).unwrap_err(),
            EncounterError::NoEligibleCandidate
        );
    }

    #[test]
    fn zero_weight_table_falls_back_to_uniform_pool() {
        let mut pool = three_tier_pool();
        pool.rarity_weights = BTreeMap::new();
        let mods = mods_with_luck(0.0);
        let mut rng = StdRng::seed_from_u64(3);
        // All configured weights are gone; the fallback must still land a fish.
        let selection = select_candidate(&pool, &[], &mods, &mut rng).unwrap();
        assert!(!selection.from_hunt);
        assert!(pool.fish.iter().any(|f| f.name == selection.fish.name));
    }

    #[test]
    fn active_hunt_restricts_to_exclusive_fish() {
        let pool = three_tier_pool();
        let hunt = crate::content::demo_hunt();
        let mut mods = mods_with_luck(0.0);
        mods.hunt = Some(crate::engine::modifiers::HuntOverride {
            name: hunt.name.clone(),
            fish: hunt.fish.clone(),
            rarity_weights: hunt.rarity_weights.clone(),
        });

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let selection = select_candidate(&pool, &[], &mods, &mut rng).unwrap();
            assert!(selection.from_hunt);
            assert_eq!(selection.fish.name, "Ghost Catfish");
        }
    }

    #[test]
    fn event_fish_join_the_population() {
        let pool = three_tier_pool();
        let mut mods = mods_with_luck(0.0);
        mods.extra_fish = vec![FishProfile::new(
            "Festival Koi",
            Rarity::Common,
            0.5,
            2.0,
            15.0,
        )];

        let mut rng = StdRng::seed_from_u64(9);
        let mut seen = false;
        for _ in 0..2_000 {
            let selection = select_candidate(&pool, &[], &mods, &mut rng).unwrap();
            if selection.fish.name == "Festival Koi" {
                seen = true;
                break;
            }
        }
        assert!(seen, "event fish never drawn");
    }

    #[test]
    fn mutation_rolls_in_stable_order() {
        let pool = three_tier_pool();
        let mutations = vec![
            MutationProfile {
                name: "First".to_string(),
                xp_multiplier: 1.2,
                gold_multiplier: 1.2,
                chance: 1.0,
                required_rod: None,
            },
            MutationProfile {
                name: "Second".to_string(),
                xp_multiplier: 2.0,
                gold_multiplier: 2.0,
                chance: 1.0,
                required_rod: None,
            },
        ];
        let mods = mods_with_luck(0.0);
        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..20 {
            let selection = select_candidate(&pool, &mutations, &mods, &mut rng).unwrap();
            assert_eq!(selection.mutation.as_ref().unwrap().name, "First");
        }
    }

    #[test]
    fn rod_restricted_mutations_need_the_rod() {
        let pool = three_tier_pool();
        let mutations = vec![MutationProfile {
            name: "Stormtouched".to_string(),
            xp_multiplier: 3.0,
            gold_multiplier: 4.0,
            chance: 1.0,
            required_rod: Some("Stormcaller".to_string()),
        }];

        let mods = mods_with_luck(0.0);
        let mut rng = StdRng::seed_from_u64(17);
        let selection = select_candidate(&pool, &mutations, &mods, &mut rng).unwrap();
        assert!(selection.mutation.is_none());

        let mut stormy = mods_with_luck(0.0);
        stormy.gear.rod_name = "Stormcaller".to_string();
        let selection = select_candidate(&pool, &mutations, &stormy, &mut rng).unwrap();
        assert_eq!(selection.mutation.unwrap().name, "Stormtouched");
    }

    #[test]
    fn zero_chance_mutations_never_roll() {
        let pool = three_tier_pool();
        let mutations = vec![MutationProfile {
            name: "Never".to_string(),
            xp_multiplier: 9.0,
            gold_multiplier: 9.0,
            chance: 0.0,
            required_rod: None,
        }];
        let mods = mods_with_luck(0.0);
        let mut rng = StdRng::seed_from_u64(19);
        for _ in 0..200 {
            let selection = select_candidate(&pool, &mutations, &mods, &mut rng).unwrap();
            assert!(selection.mutation.is_none());
        }
    }
}
