use crate::unidling::orchestrator::UnidleSettings;
use envconfig::Envconfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Envconfig, Clone, Debug)]
pub struct UnidlerConfig {
    /// `:8080`, `8080` or `host:port`.
    #[envconfig(from = "PORT", default = ":8080")]
    pub port: String,

    #[envconfig(from = "HOME")]
    pub home: Option<String>,

    #[envconfig(from = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Label on the ingress whose value is the app's host.
    // TODO: switch the default to `unidle-key` once no cluster still labels ingresses with `host`
    #[envconfig(from = "UNIDLE_KEY_LABEL", default = "host")]
    pub unidle_key_label: String,

    #[envconfig(from = "UNIDLE_REPLICAS", default = "1")]
    pub replicas: i32,

    #[envconfig(from = "UNIDLE_POLL_INTERVAL_SECS", default = "1")]
    pub poll_interval_secs: u64,

    #[envconfig(from = "UNIDLE_READY_TIMEOUT_SECS", default = "120")]
    pub ready_timeout_secs: u64,
}

impl UnidlerConfig {
    pub fn bind_addr(&self) -> String {
        let port = self.port.trim();
        match port.strip_prefix(':') {
            Some(p) => format!("0.0.0.0:{}", p),
            None if port.contains(':') => port.to_string(),
            None => format!("0.0.0.0:{}", port),
        }
    }

    /// `$KUBECONFIG`, else `$HOME/.kube/config`.
    pub fn kubeconfig_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.kubeconfig {
            return Some(PathBuf::from(path));
        }
        self.home
            .as_ref()
            .map(|home| PathBuf::from(home).join(".kube").join("config"))
    }

    pub fn unidle_settings(&self) -> UnidleSettings {
        UnidleSettings {
            unidle_key_label: self.unidle_key_label.clone(),
            replicas: self.replicas.max(1),
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            ready_timeout: Duration::from_secs(self.ready_timeout_secs),
        }
    }
}
