use super::app::App;
use super::cluster::Cluster;
use super::unidle_error::UnidleError;
use serde_json::json;

pub const DEFAULT_SERVICE_PORT: i32 = 80;
pub const DEFAULT_TARGET_PORT: i32 = 3000;

/// Points the service back at the app's pods.
///
/// Turns the `ExternalName` service into a `ClusterIP` one selecting
/// `app=<name>`. The exposed port is kept from the located service, and the
/// target port is the deployment's first declared container port.
pub async fn redirect_service(cluster: &dyn Cluster, app: &App) -> Result<(), UnidleError> {
    let port = service_port(app);
    let target_port = target_port(app);
    let patch = json!({
        "spec": {
            "type": "ClusterIP",
            "externalName": null,
            "selector": {"app": app.name},
            "ports": [{
                "name": "http",
                "protocol": "TCP",
                "port": port,
                "targetPort": target_port,
            }],
        }
    });

    // The API server may still echo the old externalName back for a while.
    // That does not affect routing, so the response is not checked.
    cluster
        .patch_service(&app.namespace, &app.name, &patch)
        .await
        .map_err(UnidleError::mutation("redirect service"))?;

    log::info!(
        "Redirected service {} to pods app={} ({} -> {})",
        app.key(),
        app.name,
        port,
        target_port
    );
    Ok(())
}

fn service_port(app: &App) -> i32 {
    app.service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .map(|p| p.port)
        .unwrap_or(DEFAULT_SERVICE_PORT)
}

fn target_port(app: &App) -> i32 {
    app.deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .and_then(|pod| pod.containers.iter().find_map(|c| c.ports.as_ref()?.first()))
        .map(|p| p.container_port)
        .unwrap_or(DEFAULT_TARGET_PORT)
}
