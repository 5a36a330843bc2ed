use super::app::App;
use super::cluster::Cluster;
use super::unidle_error::UnidleError;
use serde_json::json;

// Written by the idler when it scales an app down.
pub const IDLED_LABEL: &str = "mojanalytics.xyz/idled";
pub const IDLED_AT_ANNOTATION: &str = "mojanalytics.xyz/idled-at";

/// Drops the idled label and idled-at annotation from the deployment.
/// Merge patching a missing key to null is a no-op, so this is safe to repeat.
pub async fn remove_idled_metadata(cluster: &dyn Cluster, app: &App) -> Result<(), UnidleError> {
    let patch = json!({
        "metadata": {
            "labels": {IDLED_LABEL: null},
            "annotations": {IDLED_AT_ANNOTATION: null},
        }
    });
    cluster
        .patch_workload(&app.namespace, &app.name, &patch)
        .await
        .map_err(UnidleError::mutation("remove idled metadata"))?;
    log::info!("Removed idled metadata from deployment {}", app.key());
    Ok(())
}
