//! Content data model: fish, mutations, gear, pools, events, hunts.
//!
//! Everything here is plain data handed to the engine by whichever layer owns
//! content loading. The engine never reads content files itself; the built-in
//! demo set at the bottom exists so the binaries run without one.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Keys a fish sequence draws from when the profile does not override them.
pub const DEFAULT_KEYS: [char; 4] = ['w', 'a', 's', 'd'];

// --- Rarity ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
    ];

    /// Position in the value ordering, 0 = lowest.
    pub fn rank(self) -> usize {
        match self {
            Rarity::Common => 0,
            Rarity::Uncommon => 1,
            Rarity::Rare => 2,
            Rarity::Epic => 3,
            Rarity::Legendary => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
        }
    }
}

// --- Fish ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FishProfile {
    pub name: String,
    pub rarity: Rarity,
    pub kg_min: f64,
    pub kg_max: f64,
    /// Market value basis; informational for the caller, unused by rewards.
    pub base_value: f64,
    /// Fixed sequence length; when absent the range below is sampled.
    #[serde(default)]
    pub sequence_len: Option<usize>,
    #[serde(default = "default_sequence_len_range")]
    pub sequence_len_range: (usize, usize),
    #[serde(default = "default_allowed_keys")]
    pub allowed_keys: Vec<char>,
    /// Base reaction budget before control bonuses, in seconds.
    #[serde(default = "default_reaction_time")]
    pub reaction_time_s: f64,
}

fn default_sequence_len_range() -> (usize, usize) {
    (4, 8)
}

fn default_allowed_keys() -> Vec<char> {
    DEFAULT_KEYS.to_vec()
}

fn default_reaction_time() -> f64 {
    2.5
}

impl FishProfile {
    pub fn new(name: &str, rarity: Rarity, kg_min: f64, kg_max: f64, base_value: f64) -> Self {
        Self {
            name: name.to_string(),
            rarity,
            kg_min,
            kg_max,
            base_value,
            sequence_len: None,
            sequence_len_range: default_sequence_len_range(),
            allowed_keys: default_allowed_keys(),
            reaction_time_s: default_reaction_time(),
        }
    }
}

// --- Mutations ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationProfile {
    pub name: String,
    pub xp_multiplier: f64,
    pub gold_multiplier: f64,
    /// Independent roll probability in [0, 1].
    pub chance: f64,
    /// Only rollable while this rod is equipped.
    #[serde(default)]
    pub required_rod: Option<String>,
}

// --- Gear ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RodStats {
    pub name: String,
    pub luck: f64,
    /// Seconds added to every challenge time budget.
    pub control: f64,
    /// Heaviest catch the rod can land, in kg.
    pub kg_max: f64,
    #[serde(default)]
    pub can_slash: bool,
    #[serde(default)]
    pub slash_chance: f64,
    #[serde(default)]
    pub slash_finish_chance: f64,
    #[serde(default)]
    pub can_slam: bool,
    #[serde(default)]
    pub slam_chance: f64,
    #[serde(default)]
    pub slam_time_bonus_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaitStats {
    pub name: String,
    pub luck: f64,
    pub control: f64,
    /// Extra weight capacity granted on top of the rod's kg_max.
    pub kg_plus: f64,
}

/// Effective gear stats for one encounter, rod and bait already combined.
#[derive(Debug, Clone)]
pub struct GearStats {
    pub rod_name: String,
    pub luck: f64,
    pub control: f64,
    pub kg_capacity: f64,
    pub can_slash: bool,
    pub slash_chance: f64,
    pub slash_finish_chance: f64,
    pub can_slam: bool,
    pub slam_chance: f64,
    pub slam_time_bonus_s: f64,
}

impl GearStats {
    /// Rod and bait stats stack additively; capacity is floored above zero so
    /// a badly configured loadout cannot produce a negative gate.
    pub fn from_loadout(rod: &RodStats, bait: Option<&BaitStats>) -> Self {
        let bait_luck = bait.map_or(0.0, |b| b.luck);
        let bait_control = bait.map_or(0.0, |b| b.control);
        let bait_kg = bait.map_or(0.0, |b| b.kg_plus);
        Self {
            rod_name: rod.name.clone(),
            luck: rod.luck + bait_luck,
            control: rod.control + bait_control,
            kg_capacity: (rod.kg_max + bait_kg).max(0.01),
            can_slash: rod.can_slash,
            slash_chance: rod.slash_chance.clamp(0.0, 1.0),
            slash_finish_chance: rod.slash_finish_chance.clamp(0.0, 1.0),
            can_slam: rod.can_slam,
            slam_chance: rod.slam_chance.clamp(0.0, 1.0),
            slam_time_bonus_s: rod.slam_time_bonus_s.max(0.0),
        }
    }
}

// --- Pools ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolDefinition {
    pub name: String,
    pub fish: Vec<FishProfile>,
    /// Base probability mass per rarity tier before luck shaping.
    pub rarity_weights: BTreeMap<Rarity, f64>,
}

// --- World events ---

/// Modifier payload of one world event. The activity window lives on the
/// scheduled entry (see `engine::events`), not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSpec {
    pub name: String,
    #[serde(default = "one")]
    pub luck_mult: f64,
    #[serde(default = "one")]
    pub xp_mult: f64,
    #[serde(default = "one")]
    pub money_mult: f64,
    #[serde(default)]
    pub time_bonus_s: f64,
    #[serde(default = "one")]
    pub mutation_chance_mult: f64,
    /// Fish temporarily added to the pool population while active.
    #[serde(default)]
    pub extra_fish: Vec<FishProfile>,
    /// Mutations temporarily added to the catalog while active.
    #[serde(default)]
    pub extra_mutations: Vec<MutationProfile>,
}

fn one() -> f64 {
    1.0
}

// --- Hunts ---

/// Per-pool hunt definition: the disturbance threshold that triggers it and
/// the exclusive population used while it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntSpec {
    pub name: String,
    pub threshold: f64,
    pub disturbance_per_attempt: f64,
    /// Seconds without an attempt before the counter starts draining.
    pub idle_decay_after_s: f64,
    pub decay_per_s: f64,
    /// How long the hunt stays open once triggered.
    pub duration_s: f64,
    /// Seconds after a hunt ends before the pool can trigger another one.
    #[serde(default)]
    pub cooldown_s: f64,
    pub fish: Vec<FishProfile>,
    /// Replaces the pool's base weight table while the hunt is active.
    pub rarity_weights: BTreeMap<Rarity, f64>,
}

// --- Built-in demo content ---

lazy_static! {
    pub static ref DEMO_RODS: Vec<RodStats> = vec![
        RodStats {
            name: "Willow Rod".to_string(),
            luck: 0.0,
            control: 0.5,
            kg_max: 12.0,
            can_slash: false,
            slash_chance: 0.0,
            slash_finish_chance: 0.0,
            can_slam: false,
            slam_chance: 0.0,
            slam_time_bonus_s: 0.0,
        },
        RodStats {
            name: "Riverkeeper".to_string(),
            luck: 0.6,
            control: 1.2,
            kg_max: 35.0,
            can_slash: true,
            slash_chance: 0.12,
            slash_finish_chance: 0.02,
            can_slam: false,
            slam_chance: 0.0,
            slam_time_bonus_s: 0.0,
        },
        RodStats {
            name: "Stormcaller".to_string(),
            luck: 1.1,
            control: 1.8,
            kg_max: 80.0,
            can_slash: false,
            slash_chance: 0.0,
            slash_finish_chance: 0.0,
            can_slam: true,
            slam_chance: 0.18,
            slam_time_bonus_s: 0.8,
        },
    ];
    pub static ref DEMO_BAITS: Vec<BaitStats> = vec![
        BaitStats {
            name: "Worm".to_string(),
            luck: 0.1,
            control: 0.0,
            kg_plus: 0.0,
        },
        BaitStats {
            name: "Glowshrimp".to_string(),
            luck: 0.4,
            control: 0.5,
            kg_plus: 10.0,
        },
    ];
    pub static ref DEMO_MUTATIONS: Vec<MutationProfile> = vec![
        MutationProfile {
            name: "Albino".to_string(),
            xp_multiplier: 1.5,
            gold_multiplier: 2.0,
            chance: 0.04,
            required_rod: None,
        },
        MutationProfile {
            name: "Giant".to_string(),
            xp_multiplier: 2.0,
            gold_multiplier: 3.0,
            chance: 0.015,
            required_rod: None,
        },
        MutationProfile {
            name: "Stormtouched".to_string(),
            xp_multiplier: 3.0,
            gold_multiplier: 4.0,
            chance: 0.01,
            required_rod: Some("Stormcaller".to_string()),
        },
    ];
}

/// A small river pool used by the binaries and a few tests.
pub fn demo_pool() -> PoolDefinition {
    let mut rarity_weights = BTreeMap::new();
    rarity_weights.insert(Rarity::Common, 55.0);
    rarity_weights.insert(Rarity::Uncommon, 25.0);
    rarity_weights.insert(Rarity::Rare, 13.0);
    rarity_weights.insert(Rarity::Epic, 5.0);
    rarity_weights.insert(Rarity::Legendary, 2.0);

    let mut pike = FishProfile::new("Pike", Rarity::Rare, 4.0, 14.0, 45.0);
    pike.sequence_len_range = (6, 9);
    pike.reaction_time_s = 2.2;

    let mut sturgeon = FishProfile::new("Sturgeon", Rarity::Epic, 12.0, 45.0, 130.0);
    sturgeon.sequence_len_range = (8, 11);
    sturgeon.reaction_time_s = 2.0;

    let mut river_king = FishProfile::new("River King", Rarity::Legendary, 30.0, 95.0, 600.0);
    river_king.sequence_len = Some(12);
    river_king.reaction_time_s = 1.8;

    PoolDefinition {
        name: "Riverbend".to_string(),
        fish: vec![
            FishProfile::new("Bleak", Rarity::Common, 0.1, 0.6, 2.0),
            FishProfile::new("Roach", Rarity::Common, 0.2, 1.2, 3.0),
            FishProfile::new("Perch", Rarity::Uncommon, 0.5, 2.5, 8.0),
            FishProfile::new("Tench", Rarity::Uncommon, 1.0, 4.5, 12.0),
            pike,
            sturgeon,
            river_king,
        ],
        rarity_weights,
    }
}

/// Hunt attached to the demo pool.
pub fn demo_hunt() -> HuntSpec {
    let mut rarity_weights = BTreeMap::new();
    rarity_weights.insert(Rarity::Legendary, 100.0);

    let mut ghost = FishProfile::new("Ghost Catfish", Rarity::Legendary, 20.0, 70.0, 900.0);
    ghost.sequence_len = Some(10);
    ghost.reaction_time_s = 2.0;

    HuntSpec {
        name: "The Ghost of Riverbend".to_string(),
        threshold: 10.0,
        disturbance_per_attempt: 1.0,
        idle_decay_after_s: 60.0,
        decay_per_s: 0.2,
        duration_s: 180.0,
        cooldown_s: 120.0,
        fish: vec![ghost],
        rarity_weights,
    }
}

/// Event used by the demo binaries.
pub fn demo_event() -> EventSpec {
    EventSpec {
        name: "Spring Thaw".to_string(),
        luck_mult: 1.4,
        xp_mult: 1.5,
        money_mult: 1.25,
        time_bonus_s: 0.5,
        mutation_chance_mult: 2.0,
        extra_fish: vec![FishProfile::new(
            "Meltwater Trout",
            Rarity::Rare,
            1.5,
            6.0,
            60.0,
        )],
        extra_mutations: Vec::new(),
    }
}

// --- Content files ---

/// Full content catalog for the binaries, loadable from a JSON file. The
/// built-in demo set backs it when no file is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSet {
    pub rods: Vec<RodStats>,
    pub baits: Vec<BaitStats>,
    pub mutations: Vec<MutationProfile>,
    pub pool: PoolDefinition,
    #[serde(default)]
    pub hunt: Option<HuntSpec>,
    #[serde(default)]
    pub event: Option<EventSpec>,
}

impl ContentSet {
    pub fn demo() -> Self {
        Self {
            rods: DEMO_RODS.clone(),
            baits: DEMO_BAITS.clone(),
            mutations: DEMO_MUTATIONS.clone(),
            pool: demo_pool(),
            hunt: Some(demo_hunt()),
            event: Some(demo_event()),
        }
    }

    pub fn load<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let content: ContentSet = serde_json::from_str(&text)?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarity_ordering_matches_rank() {
        for pair in Rarity::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn gear_stats_stack_additively() {
        let rod = &DEMO_RODS[1];
        let bait = &DEMO_BAITS[1];
        let gear = GearStats::from_loadout(rod, Some(bait));
        assert_eq!(gear.luck, rod.luck + bait.luck);
        assert_eq!(gear.control, rod.control + bait.control);
        assert_eq!(gear.kg_capacity, rod.kg_max + bait.kg_plus);

        let bare = GearStats::from_loadout(rod, None);
        assert_eq!(bare.luck, rod.luck);
        assert_eq!(bare.kg_capacity, rod.kg_max);
    }

    #[test]
    fn capacity_never_drops_to_zero() {
        let rod = RodStats {
            name: "Broken".to_string(),
            luck: 0.0,
            control: 0.0,
            kg_max: 0.0,
            can_slash: false,
            slash_chance: 0.0,
            slash_finish_chance: 0.0,
            can_slam: false,
            slam_chance: 0.0,
            slam_time_bonus_s: 0.0,
        };
        let gear = GearStats::from_loadout(&rod, None);
        assert!(gear.kg_capacity > 0.0);
    }

    #[test]
    fn content_set_survives_json() {
        let demo = ContentSet::demo();
        let text = serde_json::to_string(&demo).unwrap();
        let parsed: ContentSet = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.pool.name, demo.pool.name);
        assert_eq!(parsed.pool.fish.len(), demo.pool.fish.len());
        assert_eq!(parsed.hunt.unwrap().name, demo.hunt.unwrap().name);
    }
}
