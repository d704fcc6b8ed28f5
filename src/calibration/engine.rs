//! Bounded-concurrency calibration over a fixed set of definitions.
//!
//! Spawned tasks only perform the remote call and hand their rows back; the
//! dispatcher is the single owner of the accumulators and folds results as
//! tasks complete.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{
    BatchResult, CalibrationDefinition, CalibrationErrorAccumulator, CalibrationOutput,
    DatasetSpec,
};
use crate::client::ScorableClient;
use crate::error::{ScorableError, ScorableResult};
use crate::resources::evaluators::CalibrationRequest;

type TaskOutcome = (
    Arc<CalibrationDefinition>,
    ScorableResult<Vec<CalibrationOutput>>,
);

/// Calibrate every definition against `dataset` with at most `concurrency`
/// calls in flight (0 is treated as 1).
///
/// The first failing definition stops further dispatch; calls already in
/// flight are allowed to finish and the batch fails with that definition's
/// prompt and model attached.
pub async fn run(
    client: &ScorableClient,
    definitions: Vec<CalibrationDefinition>,
    dataset: DatasetSpec,
    concurrency: usize,
) -> ScorableResult<BatchResult> {
    let concurrency = concurrency.max(1);
    let total = definitions.len();
    let dataset = Arc::new(dataset);
    let mut pending = definitions.into_iter().map(Arc::new);

    let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
    let mut errors = CalibrationErrorAccumulator::default();
    let mut results = Vec::new();
    let mut failure: Option<ScorableError> = None;
    let mut finished = 0usize;

    info!(total, concurrency, "Starting calibration batch");

    loop {
        while failure.is_none() && join_set.len() < concurrency {
            let Some(definition) = pending.next() else {
                break;
            };
            let client = client.clone();
            let dataset = Arc::clone(&dataset);
            debug!(name = %definition.name, model = %definition.model, "Dispatching calibration");
            join_set.spawn(async move {
                let request = CalibrationRequest::for_definition(&definition, &dataset);
                let outcome = client.evaluators().calibrate(&request).await;
                (definition, outcome)
            });
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        finished += 1;

        match joined {
            Ok((definition, Ok(outputs))) => {
                if failure.is_some() {
                    continue;
                }
                debug!(
                    name = %definition.name,
                    rows = outputs.len(),
                    finished,
                    total,
                    "Calibration finished"
                );
                for output in &outputs {
                    errors.record(&definition, output);
                }
                results.extend(outputs);
            }
            Ok((definition, Err(e))) => {
                warn!(
                    prompt = %definition.prompt,
                    model = %definition.model,
                    "Calibration failed: {}",
                    e
                );
                if failure.is_none() {
                    failure = Some(ScorableError::CalibrationFailed {
                        prompt: definition.prompt.clone(),
                        model: definition.model.clone(),
                        source: Box::new(e),
                    });
                }
            }
            Err(e) => {
                warn!("Calibration task aborted: {}", e);
                if failure.is_none() {
                    failure = Some(ScorableError::CalibrationFailed {
                        prompt: "unknown".to_string(),
                        model: "unknown".to_string(),
                        source: Box::new(ScorableError::InvalidResponse {
                            message: format!("join error: {}", e),
                        }),
                    });
                }
            }
        }
    }

    if let Some(e) = failure {
        return Err(e);
    }

    info!(rows = results.len(), "Calibration batch complete");
    Ok(BatchResult::new(results, &errors))
}
