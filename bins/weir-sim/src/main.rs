//! weir-sim: Drive a persisted Weir farm from JSON scenarios.
//!
//! The farm state lives in RocksDB under the data directory; the reward
//! asset, stake-unit balances and clock it talks to are simulated and saved
//! next to it, so consecutive runs continue where the last one stopped.

mod scenario;
mod world;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use weir_core::constants::{MAX_LOCK_TIME, WAD};
use weir_core::traits::{Clock, DecayCurve, RewardAsset};
use weir_core::types::PoolId;
use weir_decay::ExpDecayCurve;
use weir_node::{init_logging, FarmNode, NodeConfig};

use crate::scenario::{fmt_coins, fmt_time, fmt_wad, parse_decimal, Scenario};
use crate::world::World;

/// File the simulated world is saved to, inside the data directory.
const WORLD_FILE: &str = "world.json";

/// Weir farm simulator.
#[derive(Parser)]
#[command(name = "weir-sim")]
#[command(version, about = "Run reward farming scenarios against a persisted farm.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file.
    Run(RunArgs),
    /// Print the persisted farm state.
    Inspect(NodeArgs),
    /// Tabulate the decay curve.
    Curve(CurveArgs),
}

#[derive(Args)]
struct NodeArgs {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level filter.
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: "text" or "json".
    #[arg(long)]
    log_format: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    /// Scenario JSON file.
    scenario: PathBuf,

    #[command(flatten)]
    node: NodeArgs,

    /// Write the step outcomes as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Exit with an error if any step failed.
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct CurveArgs {
    /// Steepness as a decimal, e.g. 3 or 2.5.
    #[arg(short, long, default_value = "3")]
    k: String,

    /// Locked principal in whole units.
    #[arg(long, default_value_t = 1000)]
    locked: u64,

    /// Number of rows from full lock to expiry.
    #[arg(long, default_value_t = 12)]
    points: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Inspect(args) => cmd_inspect(args),
        Commands::Curve(args) => cmd_curve(args),
    }
}

/// Load the configuration and apply command-line overrides.
fn load_config(args: &NodeArgs) -> Result<NodeConfig> {
    let mut config = NodeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.log_format = format.clone();
    }
    Ok(config)
}

fn open_node(config: NodeConfig, world: &World) -> Result<FarmNode> {
    let data_dir = config.data_dir.clone();
    FarmNode::open(
        config,
        Arc::new(world.asset.clone()),
        Arc::new(world.units.clone()),
        Arc::new(world.clock.clone()),
    )
    .with_context(|| format!("Failed to open farm in {}", data_dir.display()))
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let config = load_config(&args.node)?;
    init_logging(&config.log_level, &config.log_format);

    let bytes = std::fs::read(&args.scenario)
        .with_context(|| format!("Failed to read scenario: {}", args.scenario.display()))?;
    let scenario = Scenario::from_json(&bytes)
        .with_context(|| format!("Invalid scenario: {}", args.scenario.display()))?;

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
    let world_path = config.data_dir.join(WORLD_FILE);
    let start = scenario
        .start_time
        .unwrap_or(config.genesis.reward_start_time);
    let mut world = World::load_or_new(&world_path, config.genesis.reward_cap, start)?;

    let node = open_node(config, &world)?;
    info!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");

    let outcomes = scenario::run(&scenario, node.farm(), &mut world);

    world.save(&world_path)?;
    node.flush().context("Failed to flush farm data")?;

    let mut failed = 0usize;
    for o in &outcomes {
        let mark = if o.ok { "ok" } else { "FAILED" };
        if !o.ok {
            failed += 1;
        }
        println!("{:>4}  {}  {:<27} {:<6} {}", o.index, o.at, o.op, mark, o.detail);
    }
    println!();
    println!("{} steps, {} failed", outcomes.len(), failed);

    if let Some(path) = &args.report {
        let json = serde_json::to_vec_pretty(&outcomes)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
    }

    if args.strict && failed > 0 {
        bail!("{failed} step(s) failed");
    }
    Ok(())
}

fn cmd_inspect(args: NodeArgs) -> Result<()> {
    let config = load_config(&args)?;
    init_logging(&config.log_level, &config.log_format);

    if !config.db_path().exists() {
        bail!("No farm data at {}", config.db_path().display());
    }
    let world = World::load_or_new(&config.data_dir.join(WORLD_FILE), config.genesis.reward_cap, 0)?;
    let node = open_node(config, &world)?;
    let farm = node.farm();
    print_state(farm, &world)
}

fn print_state(farm: &weir_farm::Farm, world: &World) -> Result<()> {
    let params = farm.params();
    let now = world.clock.now();

    println!("Time:            {} ({now})", fmt_time(now));
    println!("Emission rate:   {}/s", fmt_coins(params.emission_rate));
    println!("Lock pool share: {}%", params.staking_weight_percent);
    println!("Steepness:       {}", fmt_wad(params.steepness));
    println!("Reward start:    {}", fmt_time(params.reward_start_time));
    println!(
        "Reward supply:   {} of {}",
        fmt_coins(world.asset.total_supply()),
        fmt_coins(world.asset.max_supply())
    );
    println!("Total locked:    {} by {} user(s)", fmt_coins(farm.total_locked()), farm.locked_users());
    println!();

    println!("{:<5} {:<12} {:>10} {:>14}", "Pool", "Unit", "Weight", "Last reward");
    for id in 0..farm.pool_count() as PoolId {
        let pool = farm.pool_info(id)?;
        println!(
            "{:<5} {:<12} {:>10} {:>14}",
            id,
            world.symbol_of(&pool.stake_unit),
            pool.weight,
            pool.last_reward_time
        );
    }
    println!();

    for (name, who) in world.accounts() {
        println!("{name} ({who})");
        println!("  balance {}", fmt_coins(world.asset.balance_of(who)));
        for id in 1..farm.pool_count() as PoolId {
            let stake = farm.user_info(id, who);
            if stake.amount == 0 {
                continue;
            }
            println!(
                "  pool {id}: {} staked, {} pending",
                stake.amount,
                fmt_coins(farm.pending_reward(id, who)?)
            );
        }
        let lock = farm.lock_info(who);
        if lock.locked_amount > 0 {
            println!(
                "  lock: {} until {} ({:?}), vePower {}, {} claimable",
                fmt_coins(lock.locked_amount),
                fmt_time(lock.unlock_time),
                farm.lock_state(who, now),
                fmt_wad(farm.ve_power(who, now)?),
                fmt_coins(farm.decayed_pending_reward(who)?)
            );
        }
    }
    Ok(())
}

fn cmd_curve(args: CurveArgs) -> Result<()> {
    let k = parse_decimal(&args.k, 18).map_err(anyhow::Error::msg)?;
    if !ExpDecayCurve::valid_steepness(k) {
        bail!("Steepness {} out of range", args.k);
    }
    if args.points == 0 {
        bail!("--points must be positive");
    }
    let curve = ExpDecayCurve::new();
    let locked = args.locked as u128 * WAD;

    println!("{:>12} {:>10} {:>16}", "Remaining", "vePower", "veBalance");
    for i in 0..=args.points {
        let remaining = MAX_LOCK_TIME - MAX_LOCK_TIME * i / args.points;
        let power = curve.ve_power(remaining, MAX_LOCK_TIME, k)?;
        let balance = curve.ve_balance(locked, remaining, MAX_LOCK_TIME, k)?;
        println!(
            "{:>11}d {:>10} {:>16}",
            remaining / 86_400,
            fmt_wad(power),
            fmt_wad(balance)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn node_args(data_dir: &Path) -> NodeArgs {
        NodeArgs {
            config: None,
            data_dir: Some(data_dir.to_path_buf()),
            log_level: None,
            log_format: None,
        }
    }

    #[test]
    fn cli_parses_run() {
        let cli = Cli::try_parse_from([
            "weir-sim", "run", "s.json", "--data-dir", "/tmp/x", "--strict",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.scenario, PathBuf::from("s.json"));
                assert_eq!(args.node.data_dir, Some(PathBuf::from("/tmp/x")));
                assert!(args.strict);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn consecutive_runs_continue() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let first = write(
            dir.path(),
            "first.json",
            r#"{ "name": "first", "start_time": 1000, "steps": [
                { "op": "set_staking_weight_percent", "percent": 0 },
                { "op": "add_pool", "symbol": "LP", "weight": 10 },
                { "op": "issue", "symbol": "LP", "account": "bob", "amount": 40 },
                { "op": "deposit", "pool": 1, "account": "bob", "amount": 40 },
                { "op": "advance", "secs": 10 }
            ] }"#,
        );
        let second = write(
            dir.path(),
            "second.json",
            r#"{ "steps": [
                { "op": "advance", "secs": 10 },
                { "op": "withdraw", "pool": 1, "account": "bob", "amount": 40 }
            ] }"#,
        );

        for scenario in [first, second] {
            cmd_run(RunArgs {
                scenario,
                node: node_args(&data),
                report: None,
                strict: true,
            })
            .unwrap();
        }

        let config = load_config(&node_args(&data)).unwrap();
        let rate = config.genesis.emission_rate;
        let mut world = World::load_or_new(&data.join(WORLD_FILE), 0, 0).unwrap();
        assert_eq!(world.clock.now(), 1020);
        let bob = world.account("bob");
        assert_eq!(world.asset.balance_of(&bob), 20 * rate);

        let node = open_node(config, &world).unwrap();
        assert_eq!(node.farm().pool_count(), 2);
        assert_eq!(node.farm().user_info(1, &bob).amount, 0);
    }

    #[test]
    fn strict_run_fails_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = write(
            dir.path(),
            "bad.json",
            r#"{ "steps": [ { "op": "leave_staking", "account": "nobody" } ] }"#,
        );
        let report = dir.path().join("report.json");
        let err = cmd_run(RunArgs {
            scenario,
            node: node_args(&dir.path().join("data")),
            report: Some(report.clone()),
            strict: true,
        })
        .unwrap_err();
        assert!(err.to_string().contains("1 step(s) failed"));

        let written: serde_json::Value = serde_json::from_slice(&std::fs::read(report).unwrap()).unwrap();
        assert_eq!(written[0]["ok"], false);
    }

    #[test]
    fn curve_rejects_bad_steepness() {
        let args = CurveArgs {
            k: "9".into(),
            locked: 1,
            points: 4,
        };
        assert!(cmd_curve(args).is_err());
    }
}
