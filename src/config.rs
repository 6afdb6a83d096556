//! Configuration module

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default artifact file names, relative to `ARTIFACT_DIR`.
pub const DEFAULT_PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const DEFAULT_PRICE_MODEL_FILE: &str = "Xgboost_price_predictor.json";
pub const DEFAULT_RECOMMENDER_FILE: &str = "Recommender_knn_model.json";
pub const DEFAULT_REFERENCE_DATA_FILE: &str = "Large_Mobile_Datset_with_Name.csv";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: IpAddr,

    /// Server port
    pub port: u16,

    /// Where the four model artifacts live
    pub artifacts: ArtifactPaths,

    /// Environment (development, production)
    pub environment: String,

    /// `json` for structured logs, anything else for human-readable output
    pub log_format: String,
}

/// Resolved location of every artifact the service loads at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub preprocessor: PathBuf,
    pub price_model: PathBuf,
    pub recommender: PathBuf,
    pub reference_data: PathBuf,
}

impl ArtifactPaths {
    /// Default file names under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            preprocessor: dir.join(DEFAULT_PREPROCESSOR_FILE),
            price_model: dir.join(DEFAULT_PRICE_MODEL_FILE),
            recommender: dir.join(DEFAULT_RECOMMENDER_FILE),
            reference_data: dir.join(DEFAULT_REFERENCE_DATA_FILE),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Missing or unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let artifact_dir = lookup("ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let defaults = ArtifactPaths::in_dir(&artifact_dir);
        let path_or = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);

        Self {
            host: lookup("HOST")
                .and_then(|h| h.parse().ok())
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),

            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),

            artifacts: ArtifactPaths {
                preprocessor: path_or("PREPROCESSOR_PATH", defaults.preprocessor),
                price_model: path_or("PRICE_MODEL_PATH", defaults.price_model),
                recommender: path_or("RECOMMENDER_PATH", defaults.recommender),
                reference_data: path_or("REFERENCE_DATA_PATH", defaults.reference_data),
            },

            environment: lookup("ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),

            log_format: lookup("LOG_FORMAT")
                .unwrap_or_else(|| "text".to_string()),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
