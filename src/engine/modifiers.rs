//! Effective-modifier aggregation for one encounter attempt.
//!
//! Pure function of the scheduled events, the pool's hunt state, the equipped
//! gear, and the clock. The result lives for exactly one attempt.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::content::{FishProfile, GearStats, HuntSpec, MutationProfile, Rarity};
use crate::engine::events::ScheduledEvent;

/// Weight-table replacement applied while a hunt is running.
#[derive(Debug, Clone)]
pub struct HuntOverride {
    pub name: String,
    pub fish: Vec<FishProfile>,
    pub rarity_weights: BTreeMap<Rarity, f64>,
}

#[derive(Debug, Clone)]
pub struct ModifierSet {
    pub gear: GearStats,
    pub luck_mult: f64,
    pub xp_mult: f64,
    pub money_mult: f64,
    pub mutation_chance_mult: f64,
    pub time_bonus_s: f64,
    pub extra_fish: Vec<FishProfile>,
    pub extra_mutations: Vec<MutationProfile>,
    pub hunt: Option<HuntOverride>,
}

impl ModifierSet {
    /// Rod-plus-bait luck scaled by every active event.
    pub fn effective_luck(&self) -> f64 {
        self.gear.luck * self.luck_mult
    }
}

/// Merge active event modifiers, the hunt override, and gear stats.
///
/// Multipliers from simultaneous events stack multiplicatively; time bonuses
/// stack additively. An event whose window does not contain `now` contributes
/// nothing. The hunt override replaces the pool weight table outright rather
/// than multiplying into it.
pub fn aggregate(
    events: &[ScheduledEvent],
    hunt: Option<&HuntSpec>,
    gear: GearStats,
    now: Instant,
) -> ModifierSet {
    let mut set = ModifierSet {
        gear,
        luck_mult: 1.0,
        xp_mult: 1.0,
        money_mult: 1.0,
        mutation_chance_mult: 1.0,
        time_bonus_s: 0.0,
        extra_fish: Vec::new(),
        extra_mutations: Vec::new(),
        hunt: hunt.map(|h| HuntOverride {
            name: h.name.clone(),
            fish: h.fish.clone(),
            rarity_weights: h.rarity_weights.clone(),
        }),
    };

    for event in events.iter().filter(|e| e.is_active(now)) {
        let spec = &event.spec;
        set.luck_mult *= spec.luck_mult.max(0.0);
        set.xp_mult *= spec.xp_mult.max(0.0);
        set.money_mult *= spec.money_mult.max(0.0);
        set.mutation_chance_mult *= spec.mutation_chance_mult.max(0.0);
        set.time_bonus_s += spec.time_bonus_s.max(0.0);
        set.extra_fish.extend(spec.extra_fish.iter().cloned());
        set.extra_mutations.extend(spec.extra_mutations.iter().cloned());
    }

    set
}
