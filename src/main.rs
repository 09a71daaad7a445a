use std::path::PathBuf;
use std::process::ExitCode;

use serde::{Deserialize, Serialize};

use danci_calibration::composition::{CompositionOutcome, TaskTemplate};
use danci_calibration::config::Config;
use danci_calibration::constraints::Collocation;
use danci_calibration::db::CalibrationStore;
use danci_calibration::engine::{CalibrationEngine, SubmissionOutcome};
use danci_calibration::logging;
use danci_calibration::scoring::TaskResponse;
use danci_calibration::types::{LanguageObject, UsageContext, UserThetaProfile};

/// One composition (and optionally one scored response) read from a JSON file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    learner_id: String,
    #[serde(default = "default_goal")]
    goal_id: String,
    #[serde(default)]
    objects: Vec<LanguageObject>,
    #[serde(default)]
    collocations: Vec<Collocation>,
    template: TaskTemplate,
    #[serde(default)]
    budget: Option<f64>,
    #[serde(default)]
    theta: Option<UserThetaProfile>,
    #[serde(default)]
    response: Option<TaskResponse>,
    #[serde(default)]
    context: Option<UsageContext>,
}

fn default_goal() -> String {
    "session".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionReport {
    composition: CompositionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission: Option<SubmissionOutcome>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.log_level);

    let Some(session_path) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: danci-calibration <session.json>");
        return ExitCode::from(2);
    };

    match run(config, session_path).await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize report");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "session failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    config: Config,
    session_path: PathBuf,
) -> Result<SessionReport, Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(&session_path).await?;
    let session: Session = serde_json::from_str(&raw)?;

    let store = CalibrationStore::open(&config.db_path).await?;
    tracing::info!(path = %config.db_path.display(), "store opened");

    for object in &session.objects {
        store.insert_object(object).await?;
        store.attach_object_to_goal(&session.goal_id, &object.id).await?;
    }
    for collocation in &session.collocations {
        store.insert_collocation(&session.goal_id, collocation).await?;
    }
    if let Some(theta) = &session.theta {
        store.upsert_theta_profile(&session.learner_id, theta).await?;
    }

    let budget = session
        .budget
        .unwrap_or(config.calibration.composition.max_cognitive_load);
    let engine = CalibrationEngine::new(store, config.calibration).with_scheduler(config.scheduler);
    let composition = engine
        .compose_for_goal(&session.learner_id, &session.goal_id, &session.template, budget)
        .await?;

    let submission = match (composition.composed(), &session.response) {
        (Some(result), Some(response)) => Some(
            engine
                .submit_response(
                    &session.learner_id,
                    &result.task,
                    response,
                    session.context.as_ref(),
                )
                .await?,
        ),
        _ => None,
    };

    Ok(SessionReport {
        composition,
        submission,
    })
}
