//! Simulation driver.
//!
//! Loads settings, submits synthetic tickets, runs the scheduler until the
//! requested number of passes have completed, then shuts it down and
//! reports what matched.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use matchmaker_core::{MatchDispatcher, Matchmaker, ProposedGroup};
use matchmaker_scheduler::{MatchmakerScheduler, SchedulerConfig};
use matchmaker_types::{MatchedGroup, Presence, Settings, TicketRequest};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

const REGIONS: &[&str] = &["eu", "us", "asia"];
const MODES: &[&str] = &["ranked", "casual"];
const PARTY_RATE: f64 = 0.2;

/// Options from the `run` subcommand.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub tickets: usize,
    pub passes: u64,
    pub custom: bool,
    pub interval_ms: Option<u64>,
    pub seed: Option<u64>,
}

/// What a simulation run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub submitted: usize,
    pub rejected: usize,
    pub passes: u64,
    pub skipped: u64,
    pub groups: usize,
    pub matched_tickets: u64,
    /// Tickets still queued when the scheduler stopped
    pub remaining: usize,
    pub active: usize,
}

/// Build one synthetic request. One in five is a two-member party.
///
/// Every ticket requires its own mode and prefers its own region.
pub fn synthetic_request<R: Rng + ?Sized>(rng: &mut R, n: usize) -> TicketRequest {
    let region = REGIONS[rng.random_range(0..REGIONS.len())];
    let mode = MODES[rng.random_range(0..MODES.len())];
    let skill: f64 = rng.random_range(0.0..100.0);
    let query = format!("+properties.mode:{} properties.region:{}", mode, region);

    let request = if rng.random_bool(PARTY_RATE) {
        let presences = (0..2)
            .map(|m| Presence::new(format!("sim-{}-{}", n, m), format!("user-{}-{}", n, m)))
            .collect();
        TicketRequest::party(format!("party-{}", n), presences, query, 2, 4, 2)
    } else {
        TicketRequest::solo(format!("sim-{}", n), format!("user-{}", n), query, 2, 4, 2)
    };

    request
        .with_string_property("region", region)
        .with_string_property("mode", mode)
        .with_numeric_property("skill", skill)
}

/// Selector for `--custom`: biggest proposals first, skipping any that
/// reuse a ticket already taken.
pub fn largest_first(mut proposals: Vec<ProposedGroup>) -> Result<Vec<ProposedGroup>, String> {
    proposals.sort_by(|a, b| b.size().cmp(&a.size()));

    let mut taken: HashSet<String> = HashSet::new();
    let mut selected = Vec::new();
    for proposal in proposals {
        let key = proposal.ticket_key();
        if key.iter().any(|id| taken.contains(id)) {
            continue;
        }
        taken.extend(key);
        selected.push(proposal);
    }
    Ok(selected)
}

/// Log groups as they arrive; on stop, drain what is left and return the
/// total.
fn spawn_listener(
    mut rx: mpsc::UnboundedReceiver<MatchedGroup>,
    mut stop: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<usize> {
    tokio::spawn(async move {
        let mut count = 0;
        loop {
            tokio::select! {
                group = rx.recv() => match group {
                    Some(group) => {
                        log_group(&group);
                        count += 1;
                    }
                    None => return count,
                },
                _ = &mut stop => break,
            }
        }
        while let Ok(group) = rx.try_recv() {
            log_group(&group);
            count += 1;
        }
        count
    })
}

fn log_group(group: &MatchedGroup) {
    let tickets = group.ticket_ids().len();
    let users: Vec<&str> = group.entries.iter().map(|e| e.presence.user_id.as_str()).collect();
    info!(token = %group.token, size = group.size(), tickets, ?users, "Matched group");
}

/// Run a simulation against already-loaded settings.
pub async fn run_simulation(
    settings: Settings,
    options: SimulationOptions,
) -> Result<SimulationSummary> {
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher: Arc<dyn MatchDispatcher> = Arc::new(tx);

    let config = settings.matchmaker;
    let matchmaker = if options.custom {
        Matchmaker::with_override(config.clone(), dispatcher, Arc::new(largest_first))
    } else {
        Matchmaker::new(config.clone(), dispatcher)
    }
    .context("Failed to create matchmaker")?;
    let matchmaker = Arc::new(matchmaker);

    let mut scheduler_config = SchedulerConfig::from(&config);
    if let Some(interval_ms) = options.interval_ms {
        scheduler_config = scheduler_config.with_interval_ms(interval_ms);
    }
    let interval_ms = scheduler_config.interval_ms;
    let scheduler = MatchmakerScheduler::new(matchmaker.clone(), scheduler_config)
        .await
        .context("Failed to create scheduler")?;

    let (stop_tx, stop_rx) = oneshot::channel();
    let listener = spawn_listener(rx, stop_rx);

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut submitted = 0;
    let mut rejected = 0;
    for n in 0..options.tickets {
        match matchmaker.submit(synthetic_request(&mut rng, n)) {
            Ok(_) => submitted += 1,
            Err(e) => {
                warn!(ticket = n, error = %e, "Ticket rejected");
                rejected += 1;
            }
        }
    }
    let strategy = if options.custom { "custom" } else { "default" };
    info!(submitted, rejected, strategy, "Tickets submitted");

    scheduler.start().await.context("Failed to start scheduler")?;

    let registry = scheduler.registry();
    let deadline = Duration::from_millis(interval_ms.saturating_mul(options.passes + 2))
        + Duration::from_secs(2);
    let waited = tokio::time::timeout(deadline, async {
        while registry.status().run_count < options.passes {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if waited.is_err() {
        warn!(passes = options.passes, "Requested passes did not complete before the deadline");
    }

    scheduler.shutdown().await.context("Failed to stop scheduler")?;

    // The receiver only closes once every sender is gone; stop it instead.
    let _ = stop_tx.send(());
    let groups = listener.await.context("Group listener failed")?;

    let status = registry.status();
    let stats = matchmaker.stats()?;
    Ok(SimulationSummary {
        submitted,
        rejected,
        passes: status.run_count,
        skipped: status.skip_count,
        groups,
        matched_tickets: status.matched_tickets,
        remaining: stats.tickets,
        active: stats.active,
    })
}

/// Entry point for `matchmaker-sim run`.
pub async fn start_simulation(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    options: SimulationOptions,
) -> Result<()> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level_override {
        settings.log_level = level.to_string();
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Matchmaker simulation starting...");
    info!("Configuration:");
    info!("  Pass interval: {}s", settings.matchmaker.interval_secs);
    info!("  Max intervals: {}", settings.matchmaker.max_intervals);
    info!("  Mutual match: {}", settings.matchmaker.mutual_match);
    info!("  Log level: {}", settings.log_level);

    let summary = run_simulation(settings, options).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
