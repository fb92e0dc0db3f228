/// The ACL extension type, as set in an `Extension`'s `spec.type`.
pub const EXTENSION_TYPE: &str = "acl";

/// The name of the ACL `Extension` in each shoot namespace.
pub const EXTENSION_NAME: &str = "acl";

#[derive(Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Extension",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSpec {
    #[serde(rename = "type")]
    pub extension_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<serde_json::Value>,
}

// === impl Extension ===

impl Extension {
    pub fn is_acl(&self) -> bool {
        self.spec.extension_type == EXTENSION_TYPE
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
