use std::time::Duration;

/// Failure talking to the cluster API.
#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[cfg(test)]
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("invalid resource: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unable to load kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("unable to infer cluster config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),
}

#[derive(thiserror::Error, Debug)]
pub enum UnidleError {
    #[error("No Host header in request")]
    MissingHost,

    #[error("{0}")]
    NotFound(String),

    #[error("Found {count} ingresses for host '{host}', expected exactly one")]
    Ambiguous { host: String, count: usize },

    #[error("Failed to {action}: {source}")]
    MutationFailed {
        action: &'static str,
        #[source]
        source: ClusterError,
    },

    #[error("App did not become ready within {}s", waited.as_secs())]
    Timeout { waited: Duration },

    #[error("Unidling cancelled")]
    Cancelled,
}

impl UnidleError {
    pub fn mutation(action: &'static str) -> impl FnOnce(ClusterError) -> UnidleError {
        move |source| UnidleError::MutationFailed { action, source }
    }

    /// Stable label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UnidleError::MissingHost => "missing_host",
            UnidleError::NotFound(_) => "not_found",
            UnidleError::Ambiguous { .. } => "ambiguous",
            UnidleError::MutationFailed { .. } => "mutation_failed",
            UnidleError::Timeout { .. } => "timeout",
            UnidleError::Cancelled => "cancelled",
        }
    }
}
