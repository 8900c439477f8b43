use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use trenchmark_engine::config::Config;
use trenchmark_engine::market::{MarketDataSource, OfflineSource, TrackerClient};
use trenchmark_engine::roster::build_roster;
use trenchmark_engine::session::LiveSession;
use trenchmark_engine::team::TeamStore;

/// Trenchmark engine - runs the agent competition and market feeds headless
#[derive(Parser, Debug)]
#[command(name = "trenchmark-engine", version, about)]
struct Args {
    /// TOML config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for reproducible runs
    #[arg(short, long)]
    seed: Option<u64>,

    /// Skip the upstream API and serve fallback data only
    #[arg(long)]
    offline: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    duration_secs: Option<u64>,

    /// Seconds between status reports
    #[arg(short, long, default_value_t = 10)]
    report_every_secs: u64,

    /// Join an agent's team before starting
    #[arg(long, conflicts_with = "leave_team")]
    join_team: Option<String>,

    /// Leave the currently joined team
    #[arg(long)]
    leave_team: bool,
}

fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if args.seed.is_some() {
        config.simulation.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

fn update_team(args: &Args, config: &Config) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let mut store = TeamStore::open(&config.team.path)?;
    if let Some(agent_id) = &args.join_team {
        store.join(agent_id, &build_roster(&config.agents))?;
    } else if args.leave_team {
        store.leave()?;
    }
    Ok(store.joined().map(str::to_string))
}

async fn report(session: &LiveSession, team: Option<&str>) {
    let live = session.live_snapshot().await;
    let market = session.market_snapshot().await;

    for agent in live.leaderboard() {
        let marker = if team == Some(agent.id.as_str()) { "*" } else { " " };
        info!(
            "{} #{} {:<10} {:>10.2} {:>+7.2}% trades={}",
            marker,
            agent.rank,
            agent.display_name,
            agent.current_value,
            agent.percent_change,
            agent.trades
        );
    }

    match &market.error {
        Some(e) => warn!(error = %e, tokens = market.tokens.len(), "market data degraded"),
        None => info!(
            tokens = market.tokens.len(),
            trades = market.trades.len(),
            loading = market.loading,
            "market data"
        ),
    }
    if let Some(top) = market.trending_tokens.first() {
        info!(
            symbol = %top.symbol,
            change = %format!("{:+.2}%", top.price_change_24h),
            "top trending"
        );
    }
    info!(
        tick = live.tick_count,
        points = live.series_window.len(),
        live = live.is_live,
        "series"
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let team = update_team(&args, &config)?;

    let source: Arc<dyn MarketDataSource> = if args.offline {
        Arc::new(OfflineSource)
    } else {
        Arc::new(TrackerClient::new(&config.aggregator)?)
    };

    info!(
        agents = config.agents.len(),
        tokens = config.aggregator.catalog.len(),
        offline = args.offline,
        seed = ?config.simulation.seed,
        team = ?team,
        "trenchmark engine starting"
    );

    let session = LiveSession::start(&config, source);

    let deadline = async {
        match args.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let report_every = Duration::from_secs(args.report_every_secs.max(1));
    let mut report_interval = tokio::time::interval(report_every);
    report_interval.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = &mut deadline => break,
            _ = report_interval.tick() => report(&session, team.as_deref()).await,
        }
    }

    report(&session, team.as_deref()).await;
    let metrics = session.metrics().await;
    info!(
        ticks = metrics.ticks_total,
        refreshes = metrics.refreshes_total,
        success_rate = %format!("{:.1}%", metrics.refresh_success_rate()),
        "summary"
    );
    session.shutdown().await;
    Ok(())
}
