//! Ladder Simulator CLI Tool
//!
//! Runs seeded rounds of synthetic players through the ranked core (queue,
//! balance, items, result, settlement) against an in-memory ledger and prints
//! the resulting rankings. The same seed always produces the same ladder.
//!
//! Usage:
//!   cargo run --bin ladder-sim -- --help
//!   cargo run --bin ladder-sim -- --players 24 --rounds 200 --size 3 --seed 7
//!   cargo run --bin ladder-sim -- --rank-by max_streak --json

use anyhow::{anyhow, Result};
use chrono::Duration;
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use ranked_room::config::AppConfig;
use ranked_room::events::BroadcastEventPublisher;
use ranked_room::ledger::InMemoryLedgerStore;
use ranked_room::service::{LadderService, QueueUpdate};
use ranked_room::types::{ItemKind, RankingKey, Team, TeamSize};
use ranked_room::utils::current_timestamp;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "ladder-sim")]
#[command(about = "Seeded simulator that plays synthetic ranked matches against the core")]
struct Cli {
    /// RNG seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Number of synthetic players
    #[arg(short, long, default_value = "16")]
    players: usize,

    /// Matches to play
    #[arg(short, long, default_value = "100")]
    rounds: usize,

    /// Players per team (2, 3 or 4)
    #[arg(short, long, default_value = "4")]
    size: u8,

    /// Chance that a player activates an item in a match
    #[arg(long, default_value = "0.3")]
    item_rate: f64,

    /// Chance that a formed match is cancelled instead of played
    #[arg(long, default_value = "0.05")]
    cancel_rate: f64,

    /// Ranking key to print (points, wins, losses, max_streak, currency)
    #[arg(long, default_value = "points")]
    rank_by: String,

    /// Rows to print
    #[arg(long, default_value = "10")]
    top: usize,

    /// Print the final rankings as JSON
    #[arg(long)]
    json: bool,

    /// Let points go below zero
    #[arg(long)]
    allow_negative_points: bool,
}

#[derive(Debug, Default)]
struct SimSummary {
    settled: usize,
    cancelled: usize,
    items_used: usize,
    daily_claims: usize,
    purchases: usize,
}

/// Hidden strength of each synthetic player, used to pick winners
fn skills(players: &[String], rng: &mut StdRng) -> HashMap<String, f64> {
    players
        .iter()
        .map(|id| (id.clone(), rng.gen_range(0.5..1.5)))
        .collect()
}

struct Simulation<'a> {
    service: &'a LadderService,
    cli: &'a Cli,
    size: TeamSize,
    skill: HashMap<String, f64>,
    rng: StdRng,
    summary: SimSummary,
}

impl Simulation<'_> {
    async fn play_round(&mut self, round: usize, roster: &[String]) -> Result<()> {
        let service = self.service;
        let context = format!("sim-{}", round % 3);
        let mut formed = None;
        for player in roster {
            if let QueueUpdate::MatchFormed(record) =
                service.join_queue(&context, player, Some(self.size)).await?
            {
                formed = Some(record);
            }
        }
        let record = formed.ok_or_else(|| anyhow!("round {} did not fill its queue", round))?;

        if self.rng.gen_bool(self.cli.cancel_rate) {
            service.cancel_match(record.id, &record.captain_a).await?;
            self.summary.cancelled += 1;
            return Ok(());
        }

        for player in record.participants() {
            if !self.rng.gen_bool(self.cli.item_rate) {
                continue;
            }
            let item = *ItemKind::ALL
                .choose(&mut self.rng)
                .ok_or_else(|| anyhow!("no items defined"))?;
            match service.activate_item(record.id, player, item).await {
                Ok(_) => self.summary.items_used += 1,
                Err(e) => debug!("{} could not use {}: {}", player, item, e),
            }
        }

        service.start_match(record.id, &record.captain_a).await?;

        let a = self.strength(&record.team_a, round);
        let b = self.strength(&record.team_b, round);
        let a_wins = self.rng.gen_bool((a / (a + b)).clamp(0.05, 0.95));
        let winner = if a_wins { Team::A } else { Team::B };
        let mvp = record.roster(winner).choose(&mut self.rng).cloned();

        let declarer = if a_wins {
            &record.captain_a
        } else {
            &record.captain_b
        };
        service
            .declare_result(record.id, declarer, winner, mvp)
            .await?;
        self.summary.settled += 1;
        Ok(())
    }

    fn strength(&self, team: &[String], round: usize) -> f64 {
        team.iter()
            .map(|p| self.skill.get(p).copied().unwrap_or(1.0) * form(p, round))
            .sum()
    }

    /// Claim the daily reward and buy one random item for everybody
    fn new_day(&mut self, players: &[String], now: chrono::DateTime<chrono::Utc>) {
        for player in players {
            if self
                .service
                .claim_daily_with(player, now, &mut self.rng)
                .is_ok()
            {
                self.summary.daily_claims += 1;
            }
            let item = if self.rng.gen_bool(0.5) {
                ItemKind::DoubleToken
            } else {
                ItemKind::ShieldToken
            };
            if self.service.buy_item(player, item, 1).is_ok() {
                self.summary.purchases += 1;
            }
        }
    }
}

/// Per-round form swing that does not consume the shared RNG
fn form(player: &str, round: usize) -> f64 {
    let hash = player
        .bytes()
        .fold(round as u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    0.9 + (hash % 21) as f64 / 100.0
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let size = TeamSize::try_from(cli.size).map_err(|e| anyhow!(e))?;
    let rank_by: RankingKey = cli.rank_by.parse().map_err(|e: String| anyhow!(e))?;
    if cli.players < size.players_needed() {
        return Err(anyhow!(
            "{} needs at least {} players, got {}",
            size,
            size.players_needed(),
            cli.players
        ));
    }

    let mut config = AppConfig::default();
    config.economy.allow_negative_points = cli.allow_negative_points;
    let service = LadderService::new(
        &config,
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(BroadcastEventPublisher::default()),
    );

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let players: Vec<String> = (1..=cli.players).map(|i| format!("player-{:02}", i)).collect();
    let skill = skills(&players, &mut rng);
    let start = current_timestamp();
    let mut sim = Simulation {
        service: &service,
        cli: &cli,
        size,
        skill,
        rng,
        summary: SimSummary::default(),
    };

    info!(
        "Simulating {} rounds of {} with {} players (seed {})",
        cli.rounds, size, cli.players, cli.seed
    );

    for round in 0..cli.rounds {
        let roster: Vec<String> = players
            .choose_multiple(&mut sim.rng, size.players_needed())
            .cloned()
            .collect();
        if let Err(e) = sim.play_round(round, &roster).await {
            warn!("Round {} failed: {}", round, e);
        }

        // One simulated day per ten rounds
        if round % 10 == 9 {
            sim.new_day(&players, start + Duration::days((round / 10 + 1) as i64));
        }
    }
    let summary = sim.summary;

    let rankings = service.get_rankings(rank_by, cli.top)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&rankings)?);
        return Ok(());
    }

    println!(
        "Played {} matches ({} cancelled), {} items used, {} daily claims, {} purchases",
        summary.settled, summary.cancelled, summary.items_used, summary.daily_claims, summary.purchases
    );
    println!();
    println!("{:>4}  {:<12} {:>8} {:>8} {:<9}", "#", "player", "value", "points", "tier");
    for entry in &rankings {
        println!(
            "{:>4}  {:<12} {:>8} {:>8} {:<9}",
            entry.rank,
            entry.player_id,
            entry.value,
            entry.points,
            format!("{:?}", entry.tier)
        );
    }

    Ok(())
}
