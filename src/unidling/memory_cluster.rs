//! In-memory `Cluster` used by the tests.
use super::cluster::Cluster;
use super::unidle_error::ClusterError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStatus};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::metadata::{IDLED_AT_ANNOTATION, IDLED_LABEL};

/// Where the idler points a service while its app is asleep.
pub const EXTERNAL_REDIRECT_HOST: &str = "unidler.default.svc.cluster.local";

type Key = (String, String);

#[derive(Default)]
pub struct MemoryCluster {
    ingresses: Mutex<HashMap<Key, Value>>,
    deployments: Mutex<HashMap<Key, Value>>,
    services: Mutex<HashMap<Key, Value>>,
    // Reads of a deployment before its status catches up with its spec.
    ready_after_reads: Mutex<Option<usize>>,
    workload_reads: AtomicUsize,
    mutations: AtomicUsize,
    reject_workload_patches: Mutex<bool>,
    // Deployment reads past this count fail.
    reject_workload_reads_after: Mutex<Option<usize>>,
    reject_service_patches: Mutex<bool>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// RFC 7386 JSON merge patch.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(fields) => {
            if !target.is_object() {
                *target = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(target_fields) = target {
                for (k, v) in fields {
                    if v.is_null() {
                        target_fields.remove(k);
                    } else {
                        merge_patch(target_fields.entry(k.clone()).or_insert(Value::Null), v);
                    }
                }
            }
        }
        _ => *target = patch.clone(),
    }
}

impl MemoryCluster {
    pub fn new() -> Self {
        let cluster = Self::default();
        *cluster.ready_after_reads.lock().unwrap() = Some(0);
        cluster
    }

    /// Seeds an idled app: ingress labelled with `host`, deployment scaled to
    /// zero with both idle markers, and a service redirecting to the unidler.
    pub fn with_idled_app(self, namespace: &str, name: &str, host: &str) -> Self {
        self.add_ingress(idled_ingress(namespace, name, "host", host));
        self.add_deployment(idled_deployment(namespace, name));
        self.add_service(idled_service(namespace, name));
        self
    }

    pub fn add_ingress(&self, ingress: Ingress) {
        let k = key(
            ingress.metadata.namespace.as_deref().unwrap_or_default(),
            ingress.metadata.name.as_deref().unwrap_or_default(),
        );
        self.ingresses
            .lock()
            .unwrap()
            .insert(k, serde_json::to_value(ingress).unwrap());
    }

    pub fn add_deployment(&self, deployment: Deployment) {
        let k = key(
            deployment.metadata.namespace.as_deref().unwrap_or_default(),
            deployment.metadata.name.as_deref().unwrap_or_default(),
        );
        self.deployments
            .lock()
            .unwrap()
            .insert(k, serde_json::to_value(deployment).unwrap());
    }

    pub fn add_service(&self, service: Service) {
        let k = key(
            service.metadata.namespace.as_deref().unwrap_or_default(),
            service.metadata.name.as_deref().unwrap_or_default(),
        );
        self.services
            .lock()
            .unwrap()
            .insert(k, serde_json::to_value(service).unwrap());
    }

    pub fn remove_service(&self, namespace: &str, name: &str) {
        self.services.lock().unwrap().remove(&key(namespace, name));
    }

    pub fn remove_deployment(&self, namespace: &str, name: &str) {
        self.deployments.lock().unwrap().remove(&key(namespace, name));
    }

    /// Deployment reports as available after `reads` status reads; `None`
    /// means it never becomes available.
    pub fn ready_after_reads(&self, reads: Option<usize>) {
        *self.ready_after_reads.lock().unwrap() = reads;
    }

    pub fn reject_workload_patches(&self) {
        *self.reject_workload_patches.lock().unwrap() = true;
    }

    /// Every deployment read after the first `reads` fails.
    pub fn reject_workload_reads_after(&self, reads: usize) {
        *self.reject_workload_reads_after.lock().unwrap() = Some(reads);
    }

    pub fn reject_service_patches(&self) {
        *self.reject_service_patches.lock().unwrap() = true;
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn workload_reads(&self) -> usize {
        self.workload_reads.load(Ordering::SeqCst)
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Deployment {
        let value = self.deployments.lock().unwrap()[&key(namespace, name)].clone();
        serde_json::from_value(value).unwrap()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Service {
        let value = self.services.lock().unwrap()[&key(namespace, name)].clone();
        serde_json::from_value(value).unwrap()
    }
}

#[async_trait]
impl Cluster for MemoryCluster {
    async fn list_routing_rules(
        &self,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<Ingress>, ClusterError> {
        let ingresses = self.ingresses.lock().unwrap();
        let mut matched = Vec::new();
        for value in ingresses.values() {
            let ingress: Ingress = serde_json::from_value(value.clone())?;
            let labelled = ingress
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(label_key))
                .map(|v| v == label_value)
                .unwrap_or(false);
            if labelled {
                matched.push(ingress);
            }
        }
        Ok(matched)
    }

    async fn get_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, ClusterError> {
        let reads = self.workload_reads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = *self.reject_workload_reads_after.lock().unwrap() {
            if reads > limit {
                return Err(ClusterError::Rejected("deployment read denied".to_string()));
            }
        }
        let mut deployments = self.deployments.lock().unwrap();
        let Some(value) = deployments.get_mut(&key(namespace, name)) else {
            return Ok(None);
        };
        let ready_after = *self.ready_after_reads.lock().unwrap();
        if ready_after.map(|n| reads > n).unwrap_or(false) {
            let desired = value["spec"]["replicas"].clone();
            merge_patch(value, &serde_json::json!({"status": {"availableReplicas": desired}}));
        }
        Ok(Some(serde_json::from_value(value.clone())?))
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterError> {
        let services = self.services.lock().unwrap();
        match services.get(&key(namespace, name)) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn patch_workload(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Deployment, ClusterError> {
        if *self.reject_workload_patches.lock().unwrap() {
            return Err(ClusterError::Rejected("deployment patch denied".to_string()));
        }
        let mut deployments = self.deployments.lock().unwrap();
        let value = deployments
            .get_mut(&key(namespace, name))
            .ok_or_else(|| ClusterError::Rejected(format!("deployment {} not found", name)))?;
        merge_patch(value, patch);
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(value.clone())?)
    }

    async fn patch_service(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Service, ClusterError> {
        if *self.reject_service_patches.lock().unwrap() {
            return Err(ClusterError::Rejected("service patch denied".to_string()));
        }
        let mut services = self.services.lock().unwrap();
        let value = services
            .get_mut(&key(namespace, name))
            .ok_or_else(|| ClusterError::Rejected(format!("service {} not found", name)))?;
        merge_patch(value, patch);
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(value.clone())?)
    }
}

pub fn idled_ingress(namespace: &str, name: &str, label_key: &str, host: &str) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(label_key.to_string(), host.to_string())])),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn idled_deployment(namespace: &str, name: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([
                ("app".to_string(), name.to_string()),
                (IDLED_LABEL.to_string(), "true".to_string()),
            ])),
            annotations: Some(BTreeMap::from([(
                IDLED_AT_ANNOTATION.to_string(),
                "2018-05-01T10:00:00Z,1".to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(0),
            template: PodTemplateSpec {
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: name.to_string(),
                        ports: Some(vec![ContainerPort {
                            container_port: 3000,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        status: Some(DeploymentStatus {
            available_replicas: Some(0),
            ..Default::default()
        }),
    }
}

pub fn idled_service(namespace: &str, name: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ExternalName".to_string()),
            external_name: Some(EXTERNAL_REDIRECT_HOST.to_string()),
            ports: Some(vec![ServicePort {
                port: 80,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_null_removes_key() {
        let mut target = json!({"metadata": {"labels": {"a": "1", "b": "2"}}});
        merge_patch(&mut target, &json!({"metadata": {"labels": {"a": null}}}));
        assert_eq!(target, json!({"metadata": {"labels": {"b": "2"}}}));
    }

    #[test]
    fn test_merge_patch_replaces_arrays() {
        let mut target = json!({"ports": [{"port": 1}, {"port": 2}]});
        merge_patch(&mut target, &json!({"ports": [{"port": 80}]}));
        assert_eq!(target, json!({"ports": [{"port": 80}]}));
    }
}
