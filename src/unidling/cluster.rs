//! Access to the cluster resources an unidle touches.
use super::unidle_error::ClusterError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;

/// The subset of the orchestration API the unidler needs.
///
/// Mutations are JSON merge patches, so applying one twice has the same
/// effect as applying it once. Implementations must be usable from many
/// requests at once.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Routing rules in every namespace carrying `label_key=label_value`.
    async fn list_routing_rules(
        &self,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<Ingress>, ClusterError>;

    async fn get_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, ClusterError>;

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterError>;

    async fn patch_workload(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<Deployment, ClusterError>;

    async fn patch_service(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<Service, ClusterError>;
}

/// `Cluster` backed by a real Kubernetes API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Builds a client from the kubeconfig at `kubeconfig`, or from the
/// in-cluster environment when there is no such file.
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client, ClusterError> {
    let config = match kubeconfig {
        Some(path) if path.exists() => {
            log::info!("Loading kubeconfig from {}", path.display());
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        _ => {
            log::info!("No kubeconfig file found. Inferring cluster config");
            Config::infer().await?
        }
    };
    Ok(Client::try_from(config)?)
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn list_routing_rules(
        &self,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<Ingress>, ClusterError> {
        let api: Api<Ingress> = Api::all(self.client.clone());
        let lp = ListParams::default().labels(&format!("{}={}", label_key, label_value));
        let list = api.list(&lp).await?;
        Ok(list.items)
    }

    async fn get_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_workload(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<Deployment, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }

    async fn patch_service(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<Service, ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }
}
