// Workload Module
//
// The worker pool: each worker owns one SQL connection and one RNG, shares
// the metadata registry and the action registry, and drives random actions on
// its own OS thread for a bounded duration.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::action::{Action, ActionError, ActionRegistry, CreateTable, InsertData};
use crate::config::{AllConfig, WorkloadParams};
use crate::logging::{self, LineLog};
use crate::metadata::{Metadata, TableType};
use crate::random::StressRng;
use crate::sql::{LoggedSql, PostgresClient, ServerParams, SqlClient, SqlError};

/// Failures in workload plumbing, as opposed to action failures.
#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error("No such worker {idx}, maximum is {max}")]
    NoSuchWorker { idx: usize, max: usize },
}

/// Per-run action tallies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionStats {
    pub successful: usize,
    pub failed: usize,
}

type Connector = Box<dyn Fn(&ServerParams) -> Result<Box<dyn SqlClient>, SqlError> + Send + Sync>;
type OnConnect = Box<dyn Fn(&mut LoggedSql) + Send + Sync>;

/// Builds logged connections for workers. The default connector speaks
/// PostgreSQL; tests swap in their own client.
pub struct SqlFactory {
    params: ServerParams,
    log_dir: PathBuf,
    connector: Connector,
    on_connect: Option<OnConnect>,
}

impl SqlFactory {
    pub fn new(params: ServerParams, log_dir: impl Into<PathBuf>) -> Self {
        SqlFactory {
            params,
            log_dir: log_dir.into(),
            connector: Box::new(|params| {
                Ok(Box::new(PostgresClient::connect(params.clone())?) as Box<dyn SqlClient>)
            }),
            on_connect: None,
        }
    }

    /// Use a different client implementation, keeping the logging wrapper.
    pub fn with_connector(
        params: ServerParams,
        log_dir: impl Into<PathBuf>,
        connector: Connector,
    ) -> Self {
        SqlFactory {
            params,
            log_dir: log_dir.into(),
            connector,
            on_connect: None,
        }
    }

    /// Run a callback on every fresh connection, e.g. to set session GUCs.
    pub fn on_connect(mut self, callback: OnConnect) -> Self {
        self.on_connect = Some(callback);
        self
    }

    pub fn params(&self) -> &ServerParams {
        &self.params
    }

    pub fn connect(&self, connection_name: &str) -> Result<LoggedSql, SqlError> {
        let client = (self.connector)(&self.params)?;
        let logger = logging::connection_log(&self.log_dir, connection_name)
            .map_err(|err| SqlError::Setup(err.to_string()))?;
        let mut connection = LoggedSql::new(client, logger);
        if let Some(callback) = &self.on_connect {
            callback(&mut connection);
        }
        Ok(connection)
    }

    pub fn log_dir(&self) -> &PathBuf {
        &self.log_dir
    }
}

/// One connection-owning participant. Also usable outside the random loop,
/// e.g. as the bootstrap worker that seeds the catalog.
pub struct Worker {
    name: String,
    sql_conn: LoggedSql,
    rng: StressRng,
    config: AllConfig,
    metadata: Arc<Metadata>,
    logger: Arc<LineLog>,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        sql_conn: LoggedSql,
        config: AllConfig,
        metadata: Arc<Metadata>,
        logger: Arc<LineLog>,
    ) -> Self {
        Worker {
            name: name.into(),
            sql_conn,
            rng: StressRng::new(),
            config,
            metadata,
            logger,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the random source, e.g. with a fixed-seed generator for
    /// reproducible runs.
    pub fn set_rng(&mut self, rng: StressRng) {
        self.rng = rng;
    }

    /// Synchronous bootstrap: create `count` random tables on this
    /// connection.
    pub fn create_random_tables(&mut self, count: usize) -> Result<(), ActionError> {
        for _ in 0..count {
            let creator = CreateTable::new(self.config.ddl.clone(), TableType::Normal);
            creator.execute(&self.metadata, &mut self.rng, &mut self.sql_conn)?;
        }
        Ok(())
    }

    /// Seed every currently published table with ten batches of a hundred
    /// rows.
    pub fn generate_initial_data(&mut self) -> Result<(), ActionError> {
        for table in self.metadata.tables() {
            for _ in 0..10 {
                let inserter = InsertData::for_table(self.config.dml.clone(), table.clone(), 100);
                inserter.execute(&self.metadata, &mut self.rng, &mut self.sql_conn)?;
            }
        }
        Ok(())
    }

    pub fn sql_connection(&mut self) -> &mut LoggedSql {
        &mut self.sql_conn
    }

    pub fn reconnect(&mut self) -> Result<(), SqlError> {
        self.sql_conn.reconnect()
    }
}

/// A Worker plus the random-action loop and its thread.
pub struct RandomWorker {
    name: String,
    worker: Option<Worker>,
    actions: Arc<ActionRegistry>,
    handle: Option<JoinHandle<(Worker, ActionStats)>>,
    stats: ActionStats,
}

impl RandomWorker {
    pub fn new(worker: Worker, actions: Arc<ActionRegistry>) -> Self {
        RandomWorker {
            name: worker.name.clone(),
            worker: Some(worker),
            actions,
            handle: None,
            stats: ActionStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the action loop on a dedicated thread for `duration_in_seconds`.
    /// Statistics reset at every start; failures are tallied and logged,
    /// never propagated.
    pub fn run_thread(&mut self, duration_in_seconds: u64) {
        log::info!("Worker {} starting, resetting statistics", self.name);
        self.stats = ActionStats::default();

        if self.handle.is_some() {
            log::error!("Error: thread is already running");
            return;
        }
        let Some(mut worker) = self.worker.take() else {
            log::error!("Worker {} has no connection to run with", self.name);
            return;
        };

        let actions = self.actions.clone();
        let name = self.name.clone();
        let builder = thread::Builder::new().name(format!("worker-{}", name));
        let handle = builder.spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(duration_in_seconds);
            let mut stats = ActionStats::default();

            while Instant::now() < deadline {
                let total_weight = actions.total_weight();
                if total_weight == 0 {
                    log::warn!("Worker {} has no weighted actions, exiting", name);
                    break;
                }
                let offset = worker.rng.number(0, total_weight - 1);

                let outcome = actions
                    .lookup_by_weight_offset(offset)
                    .map(|factory| factory.build(&worker.config))
                    .and_then(|action| {
                        action.execute(&worker.metadata, &mut worker.rng, &mut worker.sql_conn)
                    });

                match outcome {
                    Ok(()) => stats.successful += 1,
                    Err(err) => {
                        stats.failed += 1;
                        worker
                            .logger
                            .line(&format!("Worker {} Action failed: {}", name, err));
                    }
                }
            }

            log::info!(
                "Worker {} exiting. Success: {}, failure: {}",
                name,
                stats.successful,
                stats.failed
            );
            worker.logger.line(&format!(
                "Worker {} exiting. Success: {}, failure: {}",
                name, stats.successful, stats.failed
            ));
            (worker, stats)
        });

        match handle {
            Ok(handle) => self.handle = Some(handle),
            Err(err) => log::error!("Failed to spawn worker {}: {}", self.name, err),
        }
    }

    /// Wait for the action loop and take the connection back.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok((worker, stats)) => {
                    self.worker = Some(worker);
                    self.stats = stats;
                }
                Err(_) => log::error!("Worker {} thread panicked", self.name),
            }
        }
    }

    /// Tallies of the most recently finished run.
    pub fn stats(&self) -> ActionStats {
        self.stats
    }

    pub fn possible_actions(&self) -> Arc<ActionRegistry> {
        self.actions.clone()
    }

    pub fn create_random_tables(&mut self, count: usize) -> Result<(), ActionError> {
        match self.worker.as_mut() {
            Some(worker) => worker.create_random_tables(count),
            None => {
                log::error!("Worker {} is running, cannot bootstrap", self.name);
                Ok(())
            }
        }
    }

    pub fn generate_initial_data(&mut self) -> Result<(), ActionError> {
        match self.worker.as_mut() {
            Some(worker) => worker.generate_initial_data(),
            None => {
                log::error!("Worker {} is running, cannot bootstrap", self.name);
                Ok(())
            }
        }
    }

    pub fn reconnect(&mut self) -> Result<(), SqlError> {
        match self.worker.as_mut() {
            Some(worker) => worker.reconnect(),
            None => Err(SqlError::Setup(format!(
                "worker {} is currently running",
                self.name
            ))),
        }
    }
}

impl Drop for RandomWorker {
    fn drop(&mut self) {
        self.join();
    }
}

/// A fixed set of random workers run for a shared duration.
pub struct Workload {
    duration_in_seconds: u64,
    repeat_times: usize,
    workers: Vec<RandomWorker>,
}

impl Workload {
    pub fn new(
        params: WorkloadParams,
        sql_factory: &SqlFactory,
        default_config: &AllConfig,
        metadata: Arc<Metadata>,
        actions: Arc<ActionRegistry>,
    ) -> Result<Self, SqlError> {
        let mut workers = Vec::new();

        if params.repeat_times > 0 {
            for idx in 0..params.number_of_workers {
                let name = format!("{}", idx + 1);
                let sql_conn = sql_factory.connect(&name)?;
                let logger = Arc::new(
                    logging::worker_log(sql_factory.log_dir(), &name)
                        .map_err(|err| SqlError::Setup(err.to_string()))?,
                );
                let worker = Worker::new(
                    name,
                    sql_conn,
                    default_config.clone(),
                    metadata.clone(),
                    logger,
                );
                workers.push(RandomWorker::new(worker, actions.clone()));
            }
        }

        Ok(Workload {
            duration_in_seconds: params.duration_in_seconds,
            repeat_times: params.repeat_times,
            workers,
        })
    }

    /// Start every worker thread.
    pub fn run(&mut self) {
        for worker in &mut self.workers {
            worker.run_thread(self.duration_in_seconds);
        }
    }

    /// Join every worker thread.
    pub fn wait_completion(&mut self) {
        for worker in &mut self.workers {
            worker.join();
        }
    }

    /// Rounds this workload is meant to run.
    pub fn repeat_times(&self) -> usize {
        self.repeat_times
    }

    /// Access one worker. Indexes start at 1, as embedders expect.
    pub fn worker(&mut self, idx: usize) -> Result<&mut RandomWorker, WorkloadError> {
        let max = self.workers.len();
        if idx == 0 || idx > max {
            return Err(WorkloadError::NoSuchWorker { idx, max });
        }
        Ok(&mut self.workers[idx - 1])
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Ask every idle worker to re-establish its connection, for
    /// crash-and-restart scenarios.
    pub fn reconnect_workers(&mut self) -> Result<(), SqlError> {
        for worker in &mut self.workers {
            worker.reconnect()?;
        }
        Ok(())
    }
}

/// Engine facade: one server, one catalog, one action set.
pub struct Node {
    sql_factory: SqlFactory,
    default_config: AllConfig,
    metadata: Arc<Metadata>,
    actions: Arc<ActionRegistry>,
}

impl Node {
    pub fn new(sql_factory: SqlFactory) -> Self {
        Self::with_config(
            sql_factory,
            AllConfig::default(),
            Arc::new(crate::action::default_registry()),
        )
    }

    pub fn with_config(
        sql_factory: SqlFactory,
        default_config: AllConfig,
        actions: Arc<ActionRegistry>,
    ) -> Self {
        Node {
            sql_factory,
            default_config,
            metadata: Arc::new(Metadata::new()),
            actions,
        }
    }

    /// A standalone worker, e.g. for initialization work.
    pub fn make_worker(&self, name: &str) -> Result<Worker, SqlError> {
        let sql_conn = self.sql_factory.connect(name)?;
        let logger = Arc::new(
            logging::worker_log(self.sql_factory.log_dir(), name)
                .map_err(|err| SqlError::Setup(err.to_string()))?,
        );
        Ok(Worker::new(
            name,
            sql_conn,
            self.default_config.clone(),
            self.metadata.clone(),
            logger,
        ))
    }

    pub fn init_random_workload(&self, params: WorkloadParams) -> Result<Workload, SqlError> {
        Workload::new(
            params,
            &self.sql_factory,
            &self.default_config,
            self.metadata.clone(),
            self.actions.clone(),
        )
    }

    pub fn possible_actions(&self) -> Arc<ActionRegistry> {
        self.actions.clone()
    }

    pub fn metadata(&self) -> Arc<Metadata> {
        self.metadata.clone()
    }

    pub fn sql_params(&self) -> &ServerParams {
        self.sql_factory.params()
    }
}
