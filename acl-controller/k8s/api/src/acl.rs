//! The ACL extension's provider configuration, as submitted by users in an
//! `Extension`'s `spec.providerConfig`.

/// Field path of the rule's CIDR list, relative to the `Extension` object.
pub const CIDRS_FIELD_PATH: &str = "spec.providerConfig.rule.cidrs";

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProviderConfig {
    /// Not all ACL extensions carry a rule; one without a rule enforces nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<Rule>,
}

/// An unvalidated ACL rule.
///
/// Fields default to empty so that a partially filled rule decodes and is
/// reported by validation with a precise error rather than a decode failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    #[serde(default)]
    pub action: String,

    #[serde(default, rename = "type")]
    pub matcher_type: String,

    #[serde(default)]
    pub cidrs: Vec<String>,
}

// === impl ProviderConfig ===

impl ProviderConfig {
    /// Decodes a raw `providerConfig` payload. Unknown fields are errors.
    pub fn from_raw(raw: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw.clone())
    }
}
