use crate::k8s::{Api, Client, Cluster, Extension, Infrastructure};
use anyhow::{Context, Result};

/// Reads the objects the mutator needs to compile a shoot's filters.
#[async_trait::async_trait]
pub trait Lookup: Send + Sync {
    /// Returns `None` if the extension does not exist.
    async fn extension(&self, ns: &str, name: &str) -> Result<Option<Extension>>;

    async fn cluster(&self, name: &str) -> Result<Cluster>;

    async fn infrastructure(&self, ns: &str, name: &str) -> Result<Infrastructure>;
}

/// Looks objects up against the Kubernetes API.
#[derive(Clone)]
pub struct KubeLookup(Client);

// === impl KubeLookup ===

impl KubeLookup {
    pub fn new(client: Client) -> Self {
        Self(client)
    }
}

#[async_trait::async_trait]
impl Lookup for KubeLookup {
    async fn extension(&self, ns: &str, name: &str) -> Result<Option<Extension>> {
        Api::<Extension>::namespaced(self.0.clone(), ns)
            .get_opt(name)
            .await
            .with_context(|| format!("failed to get extension {ns}/{name}"))
    }

    async fn cluster(&self, name: &str) -> Result<Cluster> {
        Api::<Cluster>::all(self.0.clone())
            .get(name)
            .await
            .with_context(|| format!("failed to get cluster {name}"))
    }

    async fn infrastructure(&self, ns: &str, name: &str) -> Result<Infrastructure> {
        Api::<Infrastructure>::namespaced(self.0.clone(), ns)
            .get(name)
            .await
            .with_context(|| format!("failed to get infrastructure {ns}/{name}"))
    }
}
