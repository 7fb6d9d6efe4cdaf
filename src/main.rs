use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use sqlstorm::action::default_registry;
use sqlstorm::config::ScenarioConfig;
use sqlstorm::workload::{Node, SqlFactory};

/// Exit codes, one per failure class.
const EXIT_SCENARIO: u8 = 3;
const EXIT_SETUP: u8 = 4;
const EXIT_RUN: u8 = 5;

#[derive(Parser)]
#[command(author, version, about = "sqlstorm - random DDL/DML stress runner")]
struct Cli {
    /// Scenario file (TOML) describing the server and the workload
    scenario: PathBuf,

    /// Directory for worker and connection logs
    #[arg(short, long, default_value = "logs")]
    log_dir: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!("Starting sqlstorm");

    let scenario = match ScenarioConfig::load(&cli.scenario) {
        Ok(scenario) => scenario,
        Err(err) => {
            log::error!("Scenario loading failed: {}", err);
            return ExitCode::from(EXIT_SCENARIO);
        }
    };

    if let Err(err) = setup_and_run(&cli, &scenario) {
        return err;
    }

    log::info!("sqlstorm exiting normally");
    ExitCode::SUCCESS
}

fn setup_and_run(cli: &Cli, scenario: &ScenarioConfig) -> Result<(), ExitCode> {
    let node = match setup_node(cli, scenario) {
        Ok(node) => node,
        Err(err) => {
            log::error!("Node setup failed: {:#}", err);
            return Err(ExitCode::from(EXIT_SETUP));
        }
    };

    if let Err(err) = run_workload(&node, scenario) {
        log::error!("Workload failed: {:#}", err);
        return Err(ExitCode::from(EXIT_RUN));
    }

    Ok(())
}

fn setup_node(cli: &Cli, scenario: &ScenarioConfig) -> anyhow::Result<Node> {
    log::info!(
        "Setting up node on host: '{}', port: {}",
        scenario.server.address,
        scenario.server.port
    );

    let actions = Arc::new(default_registry());
    for custom in &scenario.custom_actions {
        let registered = if custom.inject_table {
            actions.make_custom_table_sql_action(&custom.name, &custom.sql, custom.weight)
        } else {
            actions.make_custom_sql_action(&custom.name, &custom.sql, custom.weight)
        };
        registered.with_context(|| format!("registering custom action {}", custom.name))?;
    }
    for (name, weight) in &scenario.weights {
        actions
            .set_weight(name, *weight)
            .with_context(|| format!("overriding weight of {}", name))?;
    }

    let factory = SqlFactory::new(scenario.server.clone(), cli.log_dir.clone());
    let node = Node::with_config(factory, scenario.all_config(), actions);

    let mut init = node
        .make_worker("init")
        .context("connecting the init worker")?;
    let init_tables = scenario
        .init_tables
        .unwrap_or(scenario.ddl.min_table_count);
    init.create_random_tables(init_tables)
        .context("creating initial tables")?;
    if scenario.initial_data {
        init.generate_initial_data()
            .context("generating initial data")?;
    }

    Ok(node)
}

fn run_workload(node: &Node, scenario: &ScenarioConfig) -> anyhow::Result<()> {
    let mut workload = node
        .init_random_workload(scenario.workload)
        .context("connecting workload workers")?;

    for round in 0..workload.repeat_times() {
        log::info!("Starting workload round {}", round + 1);
        workload.run();
        workload.wait_completion();

        let mut successful = 0;
        let mut failed = 0;
        for idx in 1..=workload.worker_count() {
            let stats = workload.worker(idx)?.stats();
            successful += stats.successful;
            failed += stats.failed;
        }
        log::info!(
            "Round {} finished. Success: {}, failure: {}",
            round + 1,
            successful,
            failed
        );
    }

    Ok(())
}
