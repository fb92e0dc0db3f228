//! A partial view of the cluster resource: only the seed and shoot fields the
//! ACL compiler reads are decoded, everything else is ignored.

use kube::api::ObjectMeta;

#[derive(Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Cluster",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub seed: Seed,

    #[serde(default)]
    pub shoot: Shoot,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Seed {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: SeedSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct SeedSpec {
    #[serde(default)]
    pub networks: Networks,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Shoot {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: ShootSpec,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ShootSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networking: Option<Networks>,

    #[serde(default)]
    pub provider: ShootProvider,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ShootProvider {
    #[serde(rename = "type", default)]
    pub provider_type: String,

    /// Worker pools are opaque here; only their presence matters.
    #[serde(default)]
    pub workers: Vec<serde_json::Value>,
}

/// Node and pod networks in CIDR notation.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Networks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<String>,
}

// === impl Shoot ===

impl Shoot {
    /// A shoot without worker pools has no node, pod, or infrastructure
    /// networks of its own.
    pub fn is_workerless(&self) -> bool {
        self.spec.provider.workers.is_empty()
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }
}
