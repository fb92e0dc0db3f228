#[derive(Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Infrastructure",
    namespaced,
    status = "InfrastructureStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    /// The infrastructure provider, e.g. `openstack`.
    #[serde(rename = "type")]
    pub provider_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// Provider-specific status. Its schema depends on the provider type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<serde_json::Value>,
}

// === impl Infrastructure ===

impl Infrastructure {
    pub fn provider_status(&self) -> Option<&serde_json::Value> {
        self.status.as_ref()?.provider_status.as_ref()
    }
}
