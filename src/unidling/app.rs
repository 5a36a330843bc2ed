use super::cluster::Cluster;
use super::unidle_error::UnidleError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;

/// An idled app: the ingress, deployment and service that share the
/// namespace and name of the ingress routing `host`.
#[derive(Debug, Clone)]
pub struct App {
    pub host: String,
    pub namespace: String,
    pub name: String,
    pub ingress: Ingress,
    pub deployment: Deployment,
    pub service: Service,
}

impl App {
    /// Finds the app serving `host`.
    ///
    /// Exactly one ingress in the cluster may carry `label_key=host`; none is
    /// `NotFound` and several is `Ambiguous`. The deployment and service must
    /// exist under the ingress' namespace and name.
    pub async fn locate(
        cluster: &dyn Cluster,
        label_key: &str,
        host: &str,
    ) -> Result<App, UnidleError> {
        let mut ingresses: Vec<Ingress> = cluster
            .list_routing_rules(label_key, host)
            .await
            .map_err(UnidleError::mutation("list ingresses"))?
            .into_iter()
            .filter(|ing| routes_host(ing, label_key, host))
            .collect();

        let ingress = match ingresses.len() {
            0 => {
                return Err(UnidleError::NotFound(format!(
                    "No ingress found for host '{}'",
                    host
                )))
            }
            1 => ingresses.remove(0),
            count => {
                return Err(UnidleError::Ambiguous {
                    host: host.to_string(),
                    count,
                })
            }
        };

        let (namespace, name) = match (&ingress.metadata.namespace, &ingress.metadata.name) {
            (Some(ns), Some(name)) => (ns.clone(), name.clone()),
            _ => {
                return Err(UnidleError::NotFound(format!(
                    "Ingress for host '{}' has no namespace or name",
                    host
                )))
            }
        };

        let deployment = cluster
            .get_workload(&namespace, &name)
            .await
            .map_err(UnidleError::mutation("get deployment"))?
            .ok_or_else(|| {
                UnidleError::NotFound(format!("Deployment {}/{} not found", namespace, name))
            })?;

        let service = cluster
            .get_service(&namespace, &name)
            .await
            .map_err(UnidleError::mutation("get service"))?
            .ok_or_else(|| {
                UnidleError::NotFound(format!("Service {}/{} not found", namespace, name))
            })?;

        log::debug!("Located app {}/{} for host {}", namespace, name, host);
        Ok(App {
            host: host.to_string(),
            namespace,
            name,
            ingress,
            deployment,
            service,
        })
    }

    /// `namespace/name`, unique per app across the cluster.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

fn routes_host(ingress: &Ingress, label_key: &str, host: &str) -> bool {
    ingress
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(label_key))
        .map(|value| value == host)
        .unwrap_or(false)
}
