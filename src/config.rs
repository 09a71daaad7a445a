use std::path::PathBuf;

use crate::algorithm_config::{CalibrationConfig, Strictness};
use crate::db::default_db_path;
use crate::scoring::SchedulerParams;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: PathBuf,
    pub calibration: CalibrationConfig,
    pub scheduler: SchedulerParams,
}

impl Config {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let db_path = std::env::var("DANCI_DB_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let mut calibration = CalibrationConfig::default();
        if let Some(load) = env_f64("COMPOSITION_MAX_LOAD").filter(|v| *v > 0.0) {
            calibration.composition.max_cognitive_load = load;
        }
        if let Some(rate) = env_f64("SCORING_LEARNING_RATE").filter(|v| *v > 0.0 && *v <= 1.0) {
            calibration.scoring.learning_rate = rate;
        }
        if let Some(strictness) = std::env::var("SCORING_STRICTNESS")
            .ok()
            .and_then(|value| Strictness::parse(&value))
        {
            calibration.scoring.strictness = strictness;
        }

        let mut scheduler = SchedulerParams::default();
        if let Some(retention) = env_f64("DESIRED_RETENTION").filter(|v| *v > 0.0 && *v < 1.0) {
            scheduler.desired_retention = retention;
        }

        Self {
            log_level,
            db_path,
            calibration,
            scheduler,
        }
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
