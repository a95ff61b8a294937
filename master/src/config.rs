use std::{env, time::Duration};

use crate::pool::DEFAULT_POOL_CAPACITY;

pub const DEFAULT_MASTER_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_WORK_DIR: &str = "/data/tmp";

/// Configuración del master, leída de variables de entorno.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// MASTER_BIND
    pub bind: String,
    /// WORK_DIR: donde viven los intermedios y el resultado (compartido con los workers)
    pub work_dir: String,
    /// POOL_CAPACITY
    pub pool_capacity: usize,
    /// PHASE_DEADLINE_SECS
    pub phase_deadline: Option<Duration>,
    /// RPC_TIMEOUT_SECS
    pub rpc_timeout: Option<Duration>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_MASTER_BIND.to_string(),
            work_dir: DEFAULT_WORK_DIR.to_string(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            phase_deadline: None,
            rpc_timeout: None,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_secs(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&s| s > 0)
        .map(Duration::from_secs)
}

impl MasterConfig {
    pub fn from_env() -> Self {
        Self {
            bind: env_or("MASTER_BIND", DEFAULT_MASTER_BIND),
            work_dir: env_or("WORK_DIR", DEFAULT_WORK_DIR),
            pool_capacity: env::var("POOL_CAPACITY")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_POOL_CAPACITY),
            phase_deadline: env_secs("PHASE_DEADLINE_SECS"),
            rpc_timeout: env_secs("RPC_TIMEOUT_SECS"),
        }
    }
}
