//! Typed Envoy RBAC filter configuration.
//!
//! These types serialize to the JSON form Envoy (and Istio's `EnvoyFilter`
//! patches) accept, using the proto field names verbatim.

use crate::rule::{Action, MatcherType};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NETWORK_RBAC_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.network.rbac.v3.RBAC";

pub const HTTP_RBAC_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.http.rbac.v3.RBAC";

pub const STAT_PREFIX: &str = "envoyrbac";

/// A named filter with an RBAC `typed_config`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub typed_config: Rbac,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rbac {
    #[serde(rename = "@type")]
    pub type_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat_prefix: Option<String>,

    pub rules: Rules,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    pub action: Action,
    pub policies: BTreeMap<String, Policy>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub permissions: Vec<Permission>,
    pub principals: Vec<Principal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Any(bool),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    SourceIp(CidrRange),
    RemoteIp(CidrRange),
    DirectRemoteIp(CidrRange),
    AndIds(PrincipalSet),
    OrIds(PrincipalSet),
    NotId(Box<Principal>),
    Header(HeaderMatcher),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSet {
    pub ids: Vec<Principal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidrRange {
    pub address_prefix: String,
    pub prefix_len: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMatcher {
    pub name: String,
    pub string_match: StringMatcher,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringMatcher {
    Exact(String),
    Prefix(String),
    Contains(String),
}

// === impl Filter ===

impl Filter {
    /// A filter holding a single policy that applies to any permission.
    pub(crate) fn single_policy(
        name: impl Into<String>,
        type_url: &str,
        stat_prefix: Option<&str>,
        action: Action,
        policy_name: impl Into<String>,
        principals: Vec<Principal>,
    ) -> Self {
        let policy = Policy {
            permissions: vec![Permission::Any(true)],
            principals,
        };
        Self {
            name: name.into(),
            typed_config: Rbac {
                type_url: type_url.to_string(),
                stat_prefix: stat_prefix.map(ToString::to_string),
                rules: Rules {
                    action,
                    policies: BTreeMap::from([(policy_name.into(), policy)]),
                },
            },
        }
    }
}

// === impl Principal ===

impl Principal {
    pub fn cidr(matcher: MatcherType, net: &IpNet) -> Self {
        let range = CidrRange {
            address_prefix: net.addr().to_string(),
            prefix_len: net.prefix_len().into(),
        };
        match matcher {
            MatcherType::SourceIp => Self::SourceIp(range),
            MatcherType::RemoteIp => Self::RemoteIp(range),
            MatcherType::DirectRemoteIp => Self::DirectRemoteIp(range),
        }
    }

    pub fn and(ids: Vec<Principal>) -> Self {
        Self::AndIds(PrincipalSet { ids })
    }

    pub fn or(ids: Vec<Principal>) -> Self {
        Self::OrIds(PrincipalSet { ids })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(id: Principal) -> Self {
        Self::NotId(Box::new(id))
    }

    pub fn header_contains(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Header(HeaderMatcher {
            name: name.into(),
            string_match: StringMatcher::Contains(value.into()),
        })
    }
}
