use anyhow::Context;
use clap::{Parser, Subcommand};
use factsheet_core::aggregate::ViewMode;
use factsheet_core::bundle::ModelBundle;
use factsheet_core::predict::FeatureRow;
use factsheet_core::train::{TrainingConfig, ZeroRevenuePolicy};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod report;

#[derive(Debug, Parser)]
#[command(name = "factsheet_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train the recommendation classifiers and save the best one as a bundle.
    Train {
        /// Labelled CSV dataset. Defaults to TRAIN_DATASET_PATH.
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Bundle output path. Defaults to MODEL_BUNDLE_PATH.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Split/model seed. Defaults to TRAIN_SEED (42).
        #[arg(long)]
        seed: Option<u64>,

        /// Handling of zero-revenue rows: drop | reject.
        #[arg(long)]
        zero_revenue: Option<ZeroRevenuePolicy>,

        /// Train and report, but do not write the bundle.
        #[arg(long)]
        dry_run: bool,
    },

    /// Recommend Invest / Hold / Divest for one row of figures.
    Predict {
        /// Defaults to MODEL_BUNDLE_PATH.
        #[arg(long)]
        bundle: Option<PathBuf>,

        #[arg(long, allow_negative_numbers = true)]
        revenue: f64,

        #[arg(long, allow_negative_numbers = true)]
        net_income: f64,

        #[arg(long, allow_negative_numbers = true)]
        ebitda: f64,
    },

    /// Print the chart aggregation for one dataset.
    Aggregate {
        #[arg(long)]
        dataset: PathBuf,

        /// ytd | yoy | monthly
        #[arg(long)]
        mode: ViewMode,

        /// Month name (ytd/yoy) or year (monthly).
        #[arg(long)]
        period: String,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = factsheet_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(args.command, &settings) {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "worker run failed");
        return Err(err);
    }
    Ok(())
}

fn run(command: Command, settings: &factsheet_core::config::Settings) -> anyhow::Result<()> {
    match command {
        Command::Train {
            dataset,
            out,
            seed,
            zero_revenue,
            dry_run,
        } => {
            let dataset_path = match dataset {
                Some(p) => p,
                None => settings.require_train_dataset_path()?.to_path_buf(),
            };
            let config = TrainingConfig {
                seed: seed.unwrap_or(settings.train_seed),
                zero_revenue: zero_revenue.unwrap_or(settings.train_zero_revenue),
                ..Default::default()
            };

            // Resolve the output before spending time on training.
            let out_path = if dry_run {
                None
            } else {
                Some(match out {
                    Some(p) => p,
                    None => settings.require_model_bundle_path()?.to_path_buf(),
                })
            };

            let started = chrono::Utc::now();
            let data = factsheet_core::ingest::load_csv(&dataset_path)
                .with_context(|| format!("load dataset {} failed", dataset_path.display()))?;
            let bundle = factsheet_core::train::train(&data, &config).context("training failed")?;
            let elapsed_ms = (chrono::Utc::now() - started).num_milliseconds();

            print!("{}", report::training_summary(&bundle));

            match out_path {
                Some(path) => {
                    bundle
                        .save(&path)
                        .with_context(|| format!("save bundle {} failed", path.display()))?;
                    tracing::info!(
                        path = %path.display(),
                        bundle_id = %bundle.metadata.id,
                        classifier = %bundle.metadata.selected,
                        elapsed_ms,
                        "training run complete"
                    );
                }
                None => {
                    tracing::info!(
                        dry_run = true,
                        classifier = %bundle.metadata.selected,
                        elapsed_ms,
                        "training run complete (bundle not written)"
                    );
                }
            }
        }

        Command::Predict {
            bundle,
            revenue,
            net_income,
            ebitda,
        } => {
            let path = match bundle {
                Some(p) => p,
                None => settings.require_model_bundle_path()?.to_path_buf(),
            };
            let bundle = ModelBundle::load(&path)?;
            let label = factsheet_core::predict::predict(&bundle, &FeatureRow::new(revenue, net_income, ebitda))?;
            println!("{label}");
        }

        Command::Aggregate {
            dataset,
            mode,
            period,
            json,
        } => {
            let data = factsheet_core::ingest::load_csv(&dataset)
                .with_context(|| format!("load dataset {} failed", dataset.display()))?;
            let rows = factsheet_core::aggregate::aggregate_dataset(&data, mode, &period);
            if rows.is_empty() {
                tracing::warn!(%mode, %period, dataset = %data.name, "aggregation is empty");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print!("{}", report::aggregation_table(mode, &rows));
            }
        }
    }
    Ok(())
}

fn init_sentry(settings: &factsheet_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_train_flags() {
        let args = Args::try_parse_from([
            "factsheet_worker",
            "train",
            "--dataset",
            "data.csv",
            "--seed",
            "7",
            "--zero-revenue",
            "reject",
            "--dry-run",
        ])
        .unwrap();

        match args.command {
            Command::Train {
                dataset,
                out,
                seed,
                zero_revenue,
                dry_run,
            } => {
                assert_eq!(dataset, Some(PathBuf::from("data.csv")));
                assert_eq!(out, None);
                assert_eq!(seed, Some(7));
                assert_eq!(zero_revenue, Some(ZeroRevenuePolicy::Reject));
                assert!(dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn predict_accepts_negative_figures() {
        let args = Args::try_parse_from([
            "factsheet_worker",
            "predict",
            "--revenue",
            "1000",
            "--net-income",
            "-50",
            "--ebitda",
            "-20.5",
        ])
        .unwrap();

        match args.command {
            Command::Predict { net_income, ebitda, bundle, .. } => {
                assert_eq!(net_income, -50.0);
                assert_eq!(ebitda, -20.5);
                assert!(bundle.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn aggregate_mode_is_validated() {
        assert!(Args::try_parse_from([
            "factsheet_worker",
            "aggregate",
            "--dataset",
            "a.csv",
            "--mode",
            "weekly",
            "--period",
            "March",
        ])
        .is_err());
    }
}
