use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::Operator;
use crate::{alog_debug, Error, Result};

const DEFAULT_OPERATION_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub timings: OperationTimings,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Expected duration per operator, stamped onto tasks for workers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationTimings {
    #[serde(default = "default_operation_ms")]
    pub addition_ms: u64,
    #[serde(default = "default_operation_ms")]
    pub subtraction_ms: u64,
    #[serde(default = "default_operation_ms")]
    pub multiplication_ms: u64,
    #[serde(default = "default_operation_ms")]
    pub division_ms: u64,
}

impl OperationTimings {
    /// All four operators take `ms` milliseconds.
    pub fn uniform(ms: u64) -> Self {
        Self {
            addition_ms: ms,
            subtraction_ms: ms,
            multiplication_ms: ms,
            division_ms: ms,
        }
    }

    pub fn for_operator(&self, operator: Operator) -> u64 {
        match operator {
            Operator::Add => self.addition_ms,
            Operator::Sub => self.subtraction_ms,
            Operator::Mul => self.multiplication_ms,
            Operator::Div => self.division_ms,
        }
    }
}

impl Default for OperationTimings {
    fn default() -> Self {
        Self::uniform(DEFAULT_OPERATION_MS)
    }
}

fn default_operation_ms() -> u64 {
    DEFAULT_OPERATION_MS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Number of concurrent workers in one agent process.
    #[serde(default = "default_computing_power")]
    pub computing_power: usize,
    /// Backoff between polls when the queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_orchestrator_url")]
    pub orchestrator_url: String,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            computing_power: default_computing_power(),
            poll_interval_ms: default_poll_interval_ms(),
            orchestrator_url: default_orchestrator_url(),
        }
    }
}

fn default_computing_power() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_orchestrator_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SchedulerConfig {
    /// Lease on popped tasks. `None` means a popped task is never re-delivered.
    pub task_lease_ms: Option<u64>,
}

impl SchedulerConfig {
    pub fn task_lease(&self) -> Option<Duration> {
        self.task_lease_ms.map(Duration::from_millis)
    }
}

impl Config {
    pub fn abacus_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".abacus"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::abacus_dir()?.join("abacus.toml"))
    }

    /// Load `~/.abacus/abacus.toml` and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file without environment overrides. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        alog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            alog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        alog_debug!(
            "Config loaded: addr={}, timings={:?}, computing_power={}",
            config.server.addr,
            config.timings,
            config.worker.computing_power
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                alog_debug!("Creating config directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        alog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    /// Apply overrides using the variable names the deployment scripts export.
    ///
    /// Zero or unparsable numbers leave the current value in place.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|p| !p.trim().is_empty()) {
            self.server.addr = format!("0.0.0.0:{}", port.trim());
        }
        override_ms(&lookup, "TIME_ADDITION_MS", &mut self.timings.addition_ms);
        override_ms(&lookup, "TIME_SUBTRACTION_MS", &mut self.timings.subtraction_ms);
        override_ms(
            &lookup,
            "TIME_MULTIPLICATIONS_MS",
            &mut self.timings.multiplication_ms,
        );
        override_ms(&lookup, "TIME_DIVISIONS_MS", &mut self.timings.division_ms);
        if let Some(power) = parse_positive(&lookup, "COMPUTING_POWER") {
            self.worker.computing_power = power as usize;
        }
        if let Some(url) = lookup("ORCHESTRATOR_URL").filter(|u| !u.trim().is_empty()) {
            self.worker.orchestrator_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(lease) = parse_positive(&lookup, "TASK_LEASE_MS") {
            self.scheduler.task_lease_ms = Some(lease);
        }
    }
}

fn parse_positive<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
}

fn override_ms<F>(lookup: &F, key: &str, slot: &mut u64)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ms) = parse_positive(lookup, key) {
        *slot = ms;
    }
}
