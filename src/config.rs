use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for approval-flow
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ApprovalFlowConfig {
    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Workflow engine behaviour
    #[serde(default)]
    pub engine: EngineConfig,
    /// Observability settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://approval-flow.db".to_string(),
            max_connections: 5,
            auto_migrate: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Acting users at exactly this hierarchy level auto-approve the stage
    /// after submission. `None` disables the skip; files and environment
    /// variables spell that as `0`.
    #[serde(with = "level_or_off")]
    pub self_approval_hierarchy_level: Option<i64>,
}

/// `Option<i64>` for formats without a null: `0` stands for `None`.
mod level_or_off {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(level: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(level.unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        match i64::deserialize(deserializer)? {
            0 => Ok(None),
            level if level > 0 => Ok(Some(level)),
            level => Err(D::Error::custom(format!(
                "hierarchy level must be positive or 0 to disable, got {level}"
            ))),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            self_approval_hierarchy_level: Some(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines instead of compact text
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl ApprovalFlowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (approval-flow.toml)
    /// 3. Environment variables (APPROVAL_FLOW_DATABASE__URL and so on)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("approval-flow.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("APPROVAL_FLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ApprovalFlowConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
