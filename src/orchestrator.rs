//! Multi-camera fan-out.
//!
//! Runs the camera analyzer concurrently for every configured camera and
//! collects named outcomes. A camera's failure is downgraded to a
//! placeholder here and never aborts its siblings.

use crate::camera::CameraAnalyzer;
use crate::models::{CameraConfig, CameraOutcome};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Analyze all configured cameras concurrently.
///
/// The returned map contains every configured camera name exactly once,
/// either with its summary or with an error placeholder naming it.
pub async fn analyze_cameras(
    analyzer: Arc<CameraAnalyzer>,
    cameras: &[CameraConfig],
) -> BTreeMap<String, CameraOutcome> {
    let mut results: BTreeMap<String, CameraOutcome> = cameras
        .iter()
        .map(|camera| {
            (
                camera.name.clone(),
                CameraOutcome::Failed(format!(
                    "Analysis failed for camera {}: task aborted",
                    camera.name
                )),
            )
        })
        .collect();

    let mut tasks: JoinSet<(String, CameraOutcome)> = JoinSet::new();
    for camera in cameras.iter().cloned() {
        let analyzer = Arc::clone(&analyzer);
        tasks.spawn(async move {
            let outcome = match analyzer.analyze(&camera).await {
                Ok(summary) => CameraOutcome::Summary(summary),
                Err(e) => {
                    warn!("Camera {} failed: {:#}", camera.name, e);
                    CameraOutcome::Failed(format!(
                        "Analysis failed for camera {}: {:#}",
                        camera.name, e
                    ))
                }
            };
            (camera.name, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, outcome)) => {
                results.insert(name, outcome);
            }
            Err(e) => warn!("Camera task panicked: {}", e),
        }
    }

    info!(
        "Analyzed {} cameras ({} failed)",
        results.len(),
        results.values().filter(|o| o.is_error()).count()
    );

    results
}
