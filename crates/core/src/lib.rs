pub mod aggregate;
pub mod bundle;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod model;
pub mod predict;
pub mod summary;
pub mod train;

pub use error::{Error, Result};

pub mod config {
    use crate::train::ZeroRevenuePolicy;
    use anyhow::Context;
    use std::path::PathBuf;

    pub const DEFAULT_DATA_DIR: &str = "database";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub data_dir: PathBuf,
        pub model_bundle_path: Option<PathBuf>,
        pub train_dataset_path: Option<PathBuf>,
        pub train_seed: u64,
        pub train_zero_revenue: ZeroRevenuePolicy,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Builds settings from any key lookup; blank values count as unset.
        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

            let train_seed = match get("TRAIN_SEED") {
                Some(v) => v.trim().parse().with_context(|| format!("TRAIN_SEED is not an integer: {v:?}"))?,
                None => crate::train::DEFAULT_SEED,
            };
            let train_zero_revenue = match get("TRAIN_ZERO_REVENUE") {
                Some(v) => v.parse().map_err(anyhow::Error::msg).context("invalid TRAIN_ZERO_REVENUE")?,
                None => ZeroRevenuePolicy::default(),
            };

            Ok(Self {
                data_dir: get("FACTSHEET_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()).into(),
                model_bundle_path: get("MODEL_BUNDLE_PATH").map(PathBuf::from),
                train_dataset_path: get("TRAIN_DATASET_PATH").map(PathBuf::from),
                train_seed,
                train_zero_revenue,
                sentry_dsn: get("SENTRY_DSN"),
            })
        }

        pub fn require_model_bundle_path(&self) -> anyhow::Result<&std::path::Path> {
            self.model_bundle_path
                .as_deref()
                .context("MODEL_BUNDLE_PATH is required")
        }

        pub fn require_train_dataset_path(&self) -> anyhow::Result<&std::path::Path> {
            self.train_dataset_path
                .as_deref()
                .context("TRAIN_DATASET_PATH is required")
        }
    }

}
