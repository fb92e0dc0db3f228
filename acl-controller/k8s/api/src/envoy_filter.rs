//! A partial, tolerant view of Istio's `EnvoyFilter`.
//!
//! `EnvoyFilter`s are owned by the platform. Only the parts needed to locate
//! a listener's network filters are typed; everything else is kept as raw
//! JSON so that a round trip through this type loses nothing we patch.

use serde_json::Value;

#[derive(Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize)]
#[kube(
    group = "networking.istio.io",
    version = "v1alpha3",
    kind = "EnvoyFilter",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct EnvoyFilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_selector: Option<Value>,

    #[serde(default)]
    pub config_patches: Vec<ConfigPatch>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_to: Option<String>,

    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Locates a named network filter inside an `EnvoyFilter`'s listener patches.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterLocation {
    /// Index into `spec.configPatches`.
    pub config_patch: usize,

    /// Index into the patch value's `filter_chains`.
    pub filter_chain: usize,

    /// The filter itself, verbatim.
    pub filter: Value,
}

// === impl EnvoyFilterSpec ===

impl EnvoyFilterSpec {
    /// Finds the first filter named `name` in any filter chain of any patch.
    pub fn find_filter(&self, name: &str) -> Option<FilterLocation> {
        for (config_patch, cp) in self.config_patches.iter().enumerate() {
            let chains = cp
                .patch
                .as_ref()
                .and_then(|p| p.value.as_ref())
                .and_then(|v| v.get("filter_chains"))
                .and_then(Value::as_array);
            for (filter_chain, chain) in chains.into_iter().flatten().enumerate() {
                let filters = chain.get("filters").and_then(Value::as_array);
                if let Some(filter) = filters
                    .into_iter()
                    .flatten()
                    .find(|f| f.get("name").and_then(Value::as_str) == Some(name))
                {
                    return Some(FilterLocation {
                        config_patch,
                        filter_chain,
                        filter: filter.clone(),
                    });
                }
            }
        }

        None
    }
}

// === impl FilterLocation ===

impl FilterLocation {
    /// The JSON pointer of the filter list containing this filter.
    pub fn filters_pointer(&self) -> String {
        format!(
            "/spec/configPatches/{}/patch/value/filter_chains/{}/filters",
            self.config_patch, self.filter_chain
        )
    }
}
