use clap::Parser;
use rain_oracle_core::{
    find_config_file, load_config, ConfigSource, DEFAULT_DB_FILE, DEFAULT_ORACLE_PORT,
};
use std::path::PathBuf;

use crate::FeaturePolicy;

#[derive(Parser, Clone, Debug, serde::Deserialize, Default)]
#[command(
    author,
    version,
    about = "Rain Oracle - Predicts rain from stored station observations"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $RAIN_ORACLE_CONFIG, ./oracle.toml,
    /// $XDG_CONFIG_HOME/rain-oracle/oracle.toml, /etc/rain-oracle/oracle.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "RAIN_ORACLE_LEVEL")]
    pub level: Option<String>,

    /// Host to listen on (use 0.0.0.0 for all interfaces)
    #[arg(short, long, env = "RAIN_ORACLE_HOST")]
    #[serde(alias = "host")]
    pub domain: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "RAIN_ORACLE_PORT")]
    pub port: Option<String>,

    /// Path to the SQLite weather store written by the daemon
    #[arg(short = 'b', long, env = "RAIN_ORACLE_DB_PATH")]
    pub db_path: Option<String>,

    /// Fitted imputer artifact (JSON)
    #[arg(short, long, env = "RAIN_ORACLE_IMPUTER_PATH")]
    pub imputer_path: Option<String>,

    /// Fitted random-forest artifact (JSON)
    #[arg(short, long, env = "RAIN_ORACLE_MODEL_PATH")]
    pub model_path: Option<String>,

    /// How the feature vector is built from stored observations
    #[arg(short, long, value_enum, env = "RAIN_ORACLE_FEATURE_POLICY")]
    pub feature_policy: Option<FeaturePolicy>,
}

impl Cli {
    pub fn host(&self) -> String {
        self.domain
            .clone()
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    pub fn port(&self) -> String {
        self.port
            .clone()
            .unwrap_or_else(|| DEFAULT_ORACLE_PORT.to_string())
    }

    pub fn db_path(&self) -> String {
        self.db_path
            .clone()
            .unwrap_or_else(|| format!("./data/{}", DEFAULT_DB_FILE))
    }

    pub fn imputer_path(&self) -> PathBuf {
        self.imputer_path
            .clone()
            .unwrap_or_else(|| "./models/imputer.json".to_string())
            .into()
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_path
            .clone()
            .unwrap_or_else(|| "./models/rain_model.json".to_string())
            .into()
    }

    pub fn feature_policy(&self) -> FeaturePolicy {
        self.feature_policy.unwrap_or_default()
    }
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> Cli {
    let cli_args = Cli::parse();

    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file("RAIN_ORACLE_CONFIG", "oracle.toml")
    };

    let file_config: Cli = load_config(&source).unwrap_or_default();

    // CLI args override file config (env vars are handled by clap)
    Cli {
        config: cli_args.config,
        level: cli_args.level.or(file_config.level),
        domain: cli_args.domain.or(file_config.domain),
        port: cli_args.port.or(file_config.port),
        db_path: cli_args.db_path.or(file_config.db_path),
        imputer_path: cli_args.imputer_path.or(file_config.imputer_path),
        model_path: cli_args.model_path.or(file_config.model_path),
        feature_policy: cli_args.feature_policy.or(file_config.feature_policy),
    }
}
