//! Process configuration from `MED_*` environment variables

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use medication_store::StoreConfig;

/// Runtime configuration of the medication API
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the HTTP server binds to (`MED_LISTEN`)
    pub listen: SocketAddr,
    /// Log filter directives (`MED_LOG_LEVEL`)
    pub log_level: String,
    /// DynamoDB endpoint override, empty on AWS (`MED_DYNAMO_ENDPOINT`)
    pub dynamo_endpoint: Option<String>,
    /// `MED_MEDICATION_TABLE`
    pub medication_table: String,
    /// `MED_AUDIT_TABLE`
    pub audit_table: String,
    /// Deadline for every storage call (`MED_OPERATION_TIMEOUT_MS`)
    pub operation_timeout: Duration,
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let listen = var("MED_LISTEN", "0.0.0.0:8080");
        let listen = listen
            .parse()
            .with_context(|| format!("MED_LISTEN: invalid address '{}'", listen))?;

        let timeout_ms = var("MED_OPERATION_TIMEOUT_MS", "5000");
        let timeout_ms: u64 = timeout_ms.parse().with_context(|| {
            format!("MED_OPERATION_TIMEOUT_MS: invalid number '{}'", timeout_ms)
        })?;
        if timeout_ms == 0 {
            bail!("MED_OPERATION_TIMEOUT_MS must be greater than zero");
        }

        let medication_table = var("MED_MEDICATION_TABLE", "medication");
        let audit_table = var("MED_AUDIT_TABLE", "medication_audit");
        if medication_table == audit_table {
            bail!("MED_MEDICATION_TABLE and MED_AUDIT_TABLE must name different tables");
        }

        Ok(Self {
            listen,
            log_level: var("MED_LOG_LEVEL", "debug"),
            dynamo_endpoint: lookup("MED_DYNAMO_ENDPOINT").filter(|value| !value.is_empty()),
            medication_table,
            audit_table,
            operation_timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            medication_table: self.medication_table.clone(),
            audit_table: self.audit_table.clone(),
            operation_timeout: self.operation_timeout,
        }
    }
}
