//! Scripted, terminal-free simulation of a fishing session.
//!
//! Drives the encounter split (`prepare_attempt` / `finish_attempt`) with a
//! feeder task typing into the resolver's key channel. Runs under the strict
//! wrong-key policy, and every fifth cast mistypes halfway through, so
//! failures, disturbance growth and hunt triggers all show up in the log.
//! Usage: `headless [casts] [seed]`.

use std::time::{Duration, Instant};

use anyhow::Result;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use fisching::config::{EngineConfig, WrongKeyPolicy};
use fisching::content::{ContentSet, GearStats};
use fisching::engine::challenge::ChallengeSetup;
use fisching::engine::encounter::EncounterEngine;
use fisching::engine::resolver::{resolve_challenge, ChallengeResult, KeyInput};

#[derive(Debug, Default, Serialize)]
struct SessionSummary {
    casts: u32,
    catches: u32,
    failures: u32,
    timeouts: u32,
    overweight: u32,
    mutations: u32,
    hunt_catches: u32,
    xp: u64,
    gold: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let casts: u32 = std::env::args()
        .nth(1)
        .and_then(|v| v.parse().ok())
        .unwrap_or(25);
    let seed: u64 = std::env::args()
        .nth(2)
        .and_then(|v| v.parse().ok())
        .unwrap_or(42);

    let mut config = EngineConfig::default();
    config.input.wrong_key_policy = WrongKeyPolicy::Fail;
    let content = ContentSet::demo();
    let gear = GearStats::from_loadout(&content.rods[2], Some(&content.baits[1]));

    let mut engine = EncounterEngine::new(
        config.clone(),
        content.pool,
        content.mutations,
        content.hunt,
        Some(seed),
    );
    if let Some(event) = content.event {
        engine
            .events_mut()
            .schedule(event, Instant::now(), Duration::from_secs(3600));
    }

    // Resolution rolls (slash, slam) use their own stream so the engine's
    // selection stream stays stable for a given seed.
    let mut roll_rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let mut summary = SessionSummary::default();

    for cast in 1..=casts {
        summary.casts += 1;
        let attempt = engine.prepare_attempt(gear.clone(), Instant::now())?;
        let spec = match &attempt.setup {
            ChallengeSetup::Ready(spec) => spec.clone(),
            ChallengeSetup::Overweight { kg, capacity_kg } => {
                info!("cast {cast}: line snapped, {kg:.1}kg against {capacity_kg:.1}kg");
                engine.finish_overweight(&attempt, Instant::now());
                summary.overweight += 1;
                summary.failures += 1;
                continue;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let sequence = spec.sequence.clone();
        let fumble = cast % 5 == 0;
        let feeder = tokio::spawn(async move {
            let clean = if fumble {
                sequence.len() / 2
            } else {
                sequence.len()
            };
            for key in sequence.into_iter().take(clean) {
                tokio::time::sleep(Duration::from_millis(15)).await;
                if tx.send(KeyInput::Char(key)).is_err() {
                    return;
                }
            }
            if fumble {
                // Wrong key under the strict policy fails the run outright.
                let _ = tx.send(KeyInput::Char('x'));
            }
        });

        let resolution = resolve_challenge(
            spec,
            &config,
            &mut roll_rng,
            &mut rx,
            &mut cancel_rx,
            |_| {},
        )
        .await?;
        feeder.await?;

        let report = engine.finish_attempt(&attempt, &resolution, Instant::now());
        match report.outcome.result {
            ChallengeResult::Success => {
                summary.catches += 1;
                if report.outcome.mutation.is_some() {
                    summary.mutations += 1;
                }
                if report.outcome.from_hunt {
                    summary.hunt_catches += 1;
                }
            }
            ChallengeResult::Failure => summary.failures += 1,
            ChallengeResult::TimedOut => summary.timeouts += 1,
        }
        summary.xp += report.reward.xp;
        summary.gold += report.reward.gold;

        for notice in engine.hunt_notices() {
            info!("cast {cast}: {notice:?}");
        }
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
