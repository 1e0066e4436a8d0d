// crates/noesis-engine/src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use tracing::{debug, info};

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ConfigValidation {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ConfigValidation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Format as a human-readable report
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        if !self.errors.is_empty() {
            lines.push("Errors:".to_string());
            for err in &self.errors {
                lines.push(format!("  - {}", err));
            }
        }

        if !self.warnings.is_empty() {
            lines.push("Warnings:".to_string());
            for warn in &self.warnings {
                lines.push(format!("  - {}", warn));
            }
        }

        if lines.is_empty() {
            "Configuration OK".to_string()
        } else {
            lines.join("\n")
        }
    }
}

/// Environment configuration — all env vars the engine reads, in one place.
///
/// Only `WORKFLOW_WORKERS` is part of the external contract (§6 "a single
/// optional variable `WORKFLOW_WORKERS` overrides the default worker-pool
/// size. All other configuration is programmatic."). `log_level`,
/// `db_path` and `bearer_token` are the natural siblings any deployable
/// server in this shape carries; they have no effect on the documented
/// engine semantics.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// `WORKFLOW_WORKERS` — overrides the default worker-pool size `W`
    /// (§4.E.2 default 4).
    pub workflow_workers: usize,
    /// `NOESIS_LOG` — tracing filter directive, e.g. `info` or
    /// `noesis=debug`.
    pub log_level: Option<String>,
    /// `NOESIS_DB_PATH` — sqlite database path for the session store.
    pub db_path: Option<String>,
    /// `NOESIS_BEARER_TOKEN` — opaque bearer check at the MCP boundary
    /// (§1 Non-goals: "no authentication scheme beyond an opaque
    /// bearer-token check"). `None` disables the check entirely.
    pub bearer_token: Option<String>,
}

pub const DEFAULT_WORKFLOW_WORKERS: usize = 4;

impl EnvConfig {
    /// Load all environment configuration (call once at startup).
    pub fn load() -> Self {
        info!("loading environment configuration");

        let workflow_workers = std::env::var("WORKFLOW_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_WORKFLOW_WORKERS);

        if workflow_workers != DEFAULT_WORKFLOW_WORKERS {
            debug!(workflow_workers, "WORKFLOW_WORKERS override in effect");
        }

        Self {
            workflow_workers,
            log_level: read_var("NOESIS_LOG"),
            db_path: read_var("NOESIS_DB_PATH"),
            bearer_token: read_var("NOESIS_BEARER_TOKEN"),
        }
    }

    /// Validate the configuration, producing warnings for unusual-but-legal
    /// settings. Never fails outright — `WORKFLOW_WORKERS=0` and similar
    /// are simply ignored in favor of the default.
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::new();

        if self.bearer_token.is_none() {
            validation.add_warning(
                "NOESIS_BEARER_TOKEN is not set — the MCP surface accepts unauthenticated requests",
            );
        }

        if self.workflow_workers > 64 {
            validation.add_warning(format!(
                "WORKFLOW_WORKERS={} is unusually high for a single-process engine",
                self.workflow_workers
            ));
        }

        validation
    }
}

fn read_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
