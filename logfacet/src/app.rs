use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::cli::{self, Commands, FilterArgs};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::data::facets::{FacetSource, NdjsonFacetSource};
use crate::data::types::{EntityId, FacetSnapshot, FilterCriteria, LogLevel};
use crate::domain::filters::{
    FacetAggregator, FacetDiscoverySession, FilterEngine, SessionState, SnapshotHandler,
};
use crate::utils::time::parse_wall_clock;

pub struct CoreApp {
    config: AppConfig,
    shutdown: CancellationToken,
}

impl CoreApp {
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        if let Commands::Levels = command {
            return Self::print_levels();
        }

        let config = AppConfig::load(&cli_config)?;
        let app = Self {
            config,
            shutdown: CancellationToken::new(),
        };
        app.install_signal_handler();

        match command {
            Commands::Facets { entity, no_follow } => app.run_facets(entity, no_follow).await,
            Commands::Filter(args) => app.run_filter(args).await,
            Commands::Levels => Ok(()),
        }
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }

    /// Cancel the app token on Ctrl+C
    fn install_signal_handler(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::debug!("Received Ctrl+C, shutting down"),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
            }
            shutdown.cancel();
        });
    }

    fn source(&self) -> Arc<dyn FacetSource> {
        Arc::new(
            NdjsonFacetSource::new(&self.config.discovery.data_dir)
                .with_interval(self.config.discovery.replay_interval()),
        )
    }

    fn print_levels() -> Result<()> {
        let levels = LogLevel::selectable();
        println!("{}", serde_json::to_string_pretty(&levels)?);
        Ok(())
    }

    // ========================================================================
    // facets
    // ========================================================================

    async fn run_facets(&self, entity: String, no_follow: bool) -> Result<()> {
        let entity_id = EntityId::new(entity);
        let follow_updates = self.config.discovery.follow_updates && !no_follow;

        let aggregator = Arc::new(Mutex::new(FacetAggregator::new()));
        let handler: SnapshotHandler = {
            let aggregator = aggregator.clone();
            Arc::new(move |snapshot: FacetSnapshot| {
                let mut aggregator = aggregator.lock();
                aggregator.apply(snapshot);
                let line = serde_json::json!({
                    "facets": aggregator.snapshot(),
                    "surface": aggregator.surface(),
                });
                println!("{}", line);
            })
        };

        let mut session = FacetDiscoverySession::new(self.source(), entity_id, follow_updates);
        session.start(handler);

        let interrupted = tokio::select! {
            _ = session.finished() => false,
            _ = self.shutdown.cancelled() => true,
        };
        if interrupted {
            session.cancel();
        }

        let state = session.state();
        tracing::info!(
            entity_id = %session.entity_id(),
            state = %state,
            snapshots = session.delivered(),
            "Facet discovery finished"
        );
        if state == SessionState::Failed && aggregator.lock().snapshot().is_none() {
            anyhow::bail!("Facet discovery failed for entity {}", session.entity_id());
        }
        Ok(())
    }

    // ========================================================================
    // filter
    // ========================================================================

    async fn run_filter(&self, args: FilterArgs) -> Result<()> {
        let mut current = match &args.from {
            Some(path) => load_criteria(path)?,
            None => FilterCriteria::default(),
        };

        let mut engine = FilterEngine::new(self.source(), self.config.discovery.engine_config())
            .with_on_change(|criteria| match serde_json::to_string(criteria) {
                Ok(json) => tracing::info!(criteria = %json, "Filter criteria proposed"),
                Err(e) => tracing::warn!(error = %e, "Failed to encode filter criteria"),
            });
        engine.mount(args.entity.as_str());

        let timeout = self.config.discovery.wait_timeout();
        let ready = tokio::select! {
            ready = engine.wait_for_snapshot(timeout) => Some(ready),
            _ = self.shutdown.cancelled() => None,
        };
        let Some(ready) = ready else {
            engine.unmount();
            anyhow::bail!("Interrupted while waiting for facets");
        };
        if !ready {
            tracing::warn!(
                entity_id = %args.entity,
                state = %engine.session_state(),
                timeout_ms = self.config.discovery.wait_timeout_ms,
                "No facet snapshot available, accepting values unchecked"
            );
        }
        let facets = engine.facets();

        if args.clear {
            current = engine.clear();
        }
        if !args.agents.is_empty() {
            if let Some(facets) = &facets {
                warn_unknown("agent", &args.agents, facets.agent_ids());
            }
            current = engine.set_agents(&current, args.agents.iter().cloned());
        }
        if !args.containers.is_empty() {
            if let Some(facets) = &facets {
                warn_unknown("container", &args.containers, facets.container_ids());
            }
            current = engine.set_containers(&current, args.containers.iter().cloned());
        }
        if !args.ranks.is_empty() {
            if let Some(facets) = &facets {
                warn_unknown("rank", &args.ranks, facets.rank_ids());
            }
            current = engine.set_ranks(&current, args.ranks.iter().copied());
        }
        if !args.levels.is_empty() {
            current = engine.set_levels(&current, args.levels.iter().copied());
        }
        if !args.sources.is_empty() {
            current = engine.set_sources(&current, args.sources.iter().cloned());
        }
        if !args.stdtypes.is_empty() {
            current = engine.set_stdtypes(&current, args.stdtypes.iter().cloned());
        }
        if let Some(after) = &args.after {
            let local = self.localize(after)?;
            current = engine.set_timestamp_after(&current, Some(local));
        }
        if let Some(before) = &args.before {
            let local = self.localize(before)?;
            current = engine.set_timestamp_before(&current, Some(local));
        }

        let output = serde_json::json!({
            "entityId": args.entity,
            "surface": engine.surface(),
            "facets": facets,
            "criteria": current,
        });
        engine.unmount();

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    /// Attach the configured zone to an operator wall clock
    fn localize(&self, input: &str) -> Result<DateTime<FixedOffset>> {
        let naive = parse_wall_clock(input)?;
        match self.config.timezone {
            Some(tz) => in_zone(&tz, naive, input),
            None => in_zone(&Local, naive, input),
        }
    }
}

fn in_zone<Z: TimeZone>(
    zone: &Z,
    naive: NaiveDateTime,
    input: &str,
) -> Result<DateTime<FixedOffset>> {
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .with_context(|| {
            format!(
                "Wall clock '{}' does not exist in the selected time zone",
                input
            )
        })
}

fn load_criteria(path: &Path) -> Result<FilterCriteria> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read criteria file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse criteria file: {}", path.display()))
}

/// Warn about selected values the discovered facets do not contain
fn warn_unknown<T: Ord + ToString>(dimension: &str, selected: &[T], known: &[T]) {
    let known: BTreeSet<&T> = known.iter().collect();
    let unknown: Vec<String> = selected
        .iter()
        .filter(|value| !known.contains(value))
        .map(ToString::to_string)
        .collect();
    if !unknown.is_empty() {
        tracing::warn!(
            dimension,
            values = %unknown.join(", "),
            "Selected values not present in discovered facets"
        );
    }
}
