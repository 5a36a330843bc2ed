use super::app::App;
use super::cluster::Cluster;
use super::unidle_error::UnidleError;
use serde_json::json;

pub const DEFAULT_REPLICAS: i32 = 1;

/// Sets the deployment's desired replicas to `replicas`, whatever it is now.
pub async fn set_replicas(
    cluster: &dyn Cluster,
    app: &App,
    replicas: i32,
) -> Result<(), UnidleError> {
    let current = app
        .deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or_default();

    let patch = json!({"spec": {"replicas": replicas}});
    let start = std::time::Instant::now();
    cluster
        .patch_workload(&app.namespace, &app.name, &patch)
        .await
        .map_err(UnidleError::mutation("scale deployment"))?;

    log::info!(
        "[Scale] deployment={} {} => {} took: {:.4}s",
        app.key(),
        current,
        replicas,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
