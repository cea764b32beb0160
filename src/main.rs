use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::warn;
use tokio::sync::{mpsc, watch};

use fisching::config::EngineConfig;
use fisching::content::{ContentSet, GearStats};
use fisching::engine::challenge::ChallengeSetup;
use fisching::engine::encounter::{EncounterEngine, EncounterReport};
use fisching::engine::hunts::{HuntEndReason, HuntNotice};
use fisching::engine::resolver::{resolve_blocking, ChallengeResult, KeyStream};
use fisching::engine::EncounterError;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // Load config
    let config_path = "fisching.toml";
    let config = if std::path::Path::new(config_path).exists() {
        EngineConfig::load(config_path)?
    } else {
        let cfg = EngineConfig::default();
        cfg.save(config_path)?;
        cfg
    };

    // Content: JSON catalog from the first argument, or the built-in demo.
    let content = match std::env::args().nth(1) {
        Some(path) => ContentSet::load(path)?,
        None => ContentSet::demo(),
    };

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    println!("=== {} ===", content.pool.name);
    let rod = {
        println!("Pick a rod:");
        for (i, rod) in content.rods.iter().enumerate() {
            println!(
                "  {}. {} (luck {:.1}, control {:.1}s, up to {:.0}kg)",
                i + 1,
                rod.name,
                rod.luck,
                rod.control,
                rod.kg_max
            );
        }
        pick(&mut lines, content.rods.len())?
    };
    let bait = {
        println!("Pick a bait (0 for none):");
        for (i, bait) in content.baits.iter().enumerate() {
            println!("  {}. {}", i + 1, bait.name);
        }
        pick_optional(&mut lines, content.baits.len())?
    };
    let gear = GearStats::from_loadout(
        &content.rods[rod],
        bait.map(|i| &content.baits[i]),
    );

    let mut engine = EncounterEngine::new(
        config,
        content.pool,
        content.mutations,
        content.hunt,
        None,
    );
    if let Some(event) = content.event {
        println!("Event active: {}", event.name);
        engine
            .events_mut()
            .schedule(event, Instant::now(), Duration::from_secs(600));
    }

    let (mut total_xp, mut total_gold) = (0u64, 0u64);
    loop {
        println!("\nPress Enter to cast, q to quit.");
        match lines.next() {
            Some(line) => {
                if line?.trim() == "q" {
                    break;
                }
            }
            None => break,
        }

        match cast(&mut engine, gear.clone(), &mut lines).await {
            Ok(Some(report)) => {
                total_xp += report.reward.xp;
                total_gold += report.reward.gold;
                print_report(&report);
            }
            Ok(None) => println!("Reeled in. Nothing counted."),
            Err(err) => println!("{err}"),
        }
        for notice in engine.hunt_notices() {
            print_notice(&notice);
        }
    }

    println!("Session total: {total_xp} xp, {total_gold} gold.");
    Ok(())
}

/// One cast: live resolution when key capture works, line-based otherwise.
/// `Ok(None)` means the player cancelled mid-fight.
async fn cast<B: BufRead>(
    engine: &mut EncounterEngine,
    gear: GearStats,
    lines: &mut io::Lines<B>,
) -> Result<Option<EncounterReport>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_cancel_tx, mut cancel_rx) = watch::channel(false);

    enable_raw_mode()?;
    let stream = KeyStream::spawn(tx);
    let result = match stream {
        Ok(_stream) => {
            let outcome = engine
                .run_encounter(gear.clone(), &mut rx, &mut cancel_rx, |run| {
                    let pending: String = run.pending().iter().collect();
                    print!(
                        "\r\x1b[2K{} on the line! type [{}]  {:.1}s ",
                        run.spec().fish_name,
                        pending,
                        run.remaining_s(Instant::now())
                    );
                    let _ = io::stdout().flush();
                })
                .await;
            println!();
            Some(outcome)
        }
        Err(EncounterError::InputCaptureUnavailable(reason)) => {
            warn!("raw key capture unavailable ({reason}), using line input");
            None
        }
        Err(err) => Some(Err(err)),
    };
    disable_raw_mode()?;

    let outcome = match result {
        Some(outcome) => outcome,
        // Fallback: type the whole sequence as one line.
        None => return cast_blocking(engine, gear, lines),
    };

    match outcome {
        Ok(report) => Ok(Some(report)),
        Err(EncounterError::CancelledByPlayer) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn cast_blocking<B: BufRead>(
    engine: &mut EncounterEngine,
    gear: GearStats,
    lines: &mut io::Lines<B>,
) -> Result<Option<EncounterReport>> {
    let attempt = engine.prepare_attempt(gear, Instant::now())?;
    let spec = match &attempt.setup {
        ChallengeSetup::Ready(spec) => spec.clone(),
        ChallengeSetup::Overweight { .. } => {
            return Ok(Some(engine.finish_overweight(&attempt, Instant::now())));
        }
    };

    let sequence: String = spec.sequence.iter().collect();
    println!(
        "{} on the line! Type [{}] and press Enter within {:.1}s.",
        spec.fish_name, sequence, spec.time_budget_s
    );
    let line = match lines.next() {
        Some(line) => line?,
        None => return Ok(None),
    };
    let mut cursor = io::Cursor::new(format!("{line}\n"));
    let resolution = resolve_blocking(&spec, &mut cursor)?;
    Ok(Some(engine.finish_attempt(&attempt, &resolution, Instant::now())))
}

fn print_report(report: &EncounterReport) {
    let outcome = &report.outcome;
    match outcome.result {
        ChallengeResult::Success => {
            let mutation = outcome
                .mutation
                .as_ref()
                .map(|m| format!("{} ", m.name))
                .unwrap_or_default();
            println!(
                "Caught a {}{} [{}] at {:.2}kg in {:.2}s! +{} xp, +{} gold.",
                mutation,
                outcome.fish_name,
                outcome.rarity.label(),
                outcome.kg,
                outcome.elapsed_s,
                report.reward.xp,
                report.reward.gold
            );
        }
        ChallengeResult::Failure if outcome.overweight => println!(
            "The {} snapped the line at {:.2}kg. Too heavy for this gear.",
            outcome.fish_name, outcome.kg
        ),
        ChallengeResult::Failure => {
            println!("The {} slipped the hook.", outcome.fish_name)
        }
        ChallengeResult::TimedOut => println!(
            "The {} got away with {} keys to go.",
            outcome.fish_name, outcome.keys_remaining
        ),
    }
}

fn print_notice(notice: &HuntNotice) {
    match notice {
        HuntNotice::Started { hunt, .. } => {
            println!("!! The water stirs... {} has begun!", hunt)
        }
        HuntNotice::Ended { hunt, reason, .. } => match reason {
            HuntEndReason::Caught => println!("!! {} is over. The legend is yours.", hunt),
            HuntEndReason::Expired => println!("!! {} slipped away into the deep.", hunt),
        },
    }
}

fn pick<B: BufRead>(lines: &mut io::Lines<B>, max: usize) -> Result<usize> {
    loop {
        match lines.next() {
            Some(line) => {
                if let Ok(n) = line?.trim().parse::<usize>() {
                    if (1..=max).contains(&n) {
                        return Ok(n - 1);
                    }
                }
                println!("Enter a number between 1 and {max}.");
            }
            None => anyhow::bail!("input closed"),
        }
    }
}

fn pick_optional<B: BufRead>(lines: &mut io::Lines<B>, max: usize) -> Result<Option<usize>> {
    loop {
        match lines.next() {
            Some(line) => match line?.trim().parse::<usize>() {
                Ok(0) => return Ok(None),
                Ok(n) if (1..=max).contains(&n) => return Ok(Some(n - 1)),
                _ => println!("Enter a number between 0 and {max}."),
            },
            None => return Ok(None),
        }
    }
}
