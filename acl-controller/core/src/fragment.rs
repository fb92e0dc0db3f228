//! Builds RBAC filter fragments for each filter-chain context a shoot's
//! traffic passes through.
//!
//! Every builder is pure: identical inputs produce byte-identical output.

use crate::{
    rbac::{self, Filter, Principal},
    rule::{Action, Rule},
};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The gateway port reversed VPN tunnels connect to.
pub const VPN_PORT: u32 = 8132;

/// The header carrying a reversed VPN tunnel's destination.
pub const VPN_HEADER: &str = "reversed-vpn";

pub const TCP_PROXY_FILTER: &str = "envoy.filters.network.tcp_proxy";
pub const HTTP_CONNECTION_MANAGER_FILTER: &str = "envoy.filters.network.http_connection_manager";
pub const HTTP_ROUTER_FILTER: &str = "envoy.filters.http.router";

const API_FILTER: &str = "acl-api";
const VPN_FILTER: &str = "acl-vpn";

/// A compiled RBAC fragment, tagged by the filter chain it targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// A network filter spliced directly into a shoot's internal filter chain.
    Internal(Filter),

    /// A gateway patch scoped to the shoot's API server SNI.
    PublicApi(ConfigPatch),

    /// A gateway patch on the VPN listener, scoped to one shoot's tunnel.
    Vpn(ConfigPatch),

    /// A gateway patch on the VPN listener shared by several shoots.
    LegacyVpn(ConfigPatch),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Internal,
    PublicApi,
    Vpn,
    LegacyVpn,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("no hosts given: at least one host is required to match the API server filter chain")]
pub struct NoHostsGiven;

/// An Istio `EnvoyFilter` config patch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub apply_to: ApplyTo,

    #[serde(rename = "match")]
    pub match_: PatchMatch,

    pub patch: PatchValue,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyTo {
    NetworkFilter,
    HttpFilter,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchMatch {
    pub context: PatchContext,
    pub listener: ListenerMatch,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatchContext {
    Gateway,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_number: Option<u32>,

    pub filter_chain: FilterChainMatch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterChainMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,

    pub filter: FilterMatch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterMatch {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_filter: Option<SubFilterMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubFilterMatch {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchValue {
    pub operation: Operation,
    pub value: Filter,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    InsertBefore,
}

/// One tenant of a shared, legacy VPN filter.
#[derive(Copy, Clone, Debug)]
pub struct LegacyVpnEntry<'a> {
    pub shoot_id: &'a str,
    pub rule: &'a Rule,
    pub extra: &'a [IpNet],
}

// === impl Fragment ===

impl Fragment {
    pub fn kind(&self) -> FragmentKind {
        match self {
            Self::Internal(_) => FragmentKind::Internal,
            Self::PublicApi(_) => FragmentKind::PublicApi,
            Self::Vpn(_) => FragmentKind::Vpn,
            Self::LegacyVpn(_) => FragmentKind::LegacyVpn,
        }
    }

    /// The RBAC filter this fragment installs.
    pub fn filter(&self) -> &Filter {
        match self {
            Self::Internal(filter) => filter,
            Self::PublicApi(patch) | Self::Vpn(patch) | Self::LegacyVpn(patch) => {
                &patch.patch.value
            }
        }
    }

    /// Encodes the fragment in its wire form: a bare filter for internal
    /// fragments and an `EnvoyFilter` config patch for the others.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Internal(filter) => serde_json::to_value(filter),
            Self::PublicApi(patch) | Self::Vpn(patch) | Self::LegacyVpn(patch) => {
                serde_json::to_value(patch)
            }
        }
    }

    /// Decodes a fragment of the given kind from its wire form.
    pub fn from_value(kind: FragmentKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            FragmentKind::Internal => Self::Internal(serde_json::from_value(value)?),
            FragmentKind::PublicApi => Self::PublicApi(serde_json::from_value(value)?),
            FragmentKind::Vpn => Self::Vpn(serde_json::from_value(value)?),
            FragmentKind::LegacyVpn => Self::LegacyVpn(serde_json::from_value(value)?),
        })
    }
}

/// Builds the principals a rule's policy matches.
///
/// `extra` holds the CIDRs that must always be allowed. For `ALLOW` rules
/// they are appended to the rule's CIDRs. For `DENY` rules they are carved
/// out of the denied set.
///
/// A `DENY` rule with extra CIDRs is therefore not a flat list: its single
/// principal is `and_ids[or_ids(rule), not_id(or_ids(extra))]`, for the
/// internal and public API fragments alike. Without extra CIDRs the list
/// stays flat.
pub fn principals(rule: &Rule, extra: &[IpNet]) -> Vec<Principal> {
    let rule_ids = cidr_principals(rule, &rule.cidrs);
    match rule.action {
        Action::Allow => rule_ids
            .into_iter()
            .chain(cidr_principals(rule, extra))
            .collect(),
        Action::Deny if extra.is_empty() => rule_ids,
        Action::Deny => vec![Principal::and(vec![
            Principal::or(rule_ids),
            Principal::not(Principal::or(cidr_principals(rule, extra))),
        ])],
    }
}

fn cidr_principals(rule: &Rule, cidrs: &[IpNet]) -> Vec<Principal> {
    cidrs
        .iter()
        .map(|net| Principal::cidr(rule.matcher, net))
        .collect()
}

/// Builds the filter spliced into a shoot's internal filter chain.
pub fn internal(rule: &Rule, extra: &[IpNet]) -> Fragment {
    let name = format!("acl-internal-{}", rule.matcher);
    Fragment::Internal(Filter::single_policy(
        name.clone(),
        rbac::NETWORK_RBAC_TYPE_URL,
        Some(rbac::STAT_PREFIX),
        rule.action,
        name,
        principals(rule, extra),
    ))
}

/// Builds the gateway patch guarding a shoot's public API server endpoint.
///
/// Only the first host selects the filter chain by SNI; further hosts are
/// not matched.
pub fn public_api(rule: &Rule, extra: &[IpNet], hosts: &[String]) -> Result<Fragment, NoHostsGiven> {
    let sni = hosts.first().ok_or(NoHostsGiven)?;
    let filter = Filter::single_policy(
        API_FILTER,
        rbac::NETWORK_RBAC_TYPE_URL,
        Some(rbac::STAT_PREFIX),
        rule.action,
        API_FILTER,
        principals(rule, extra),
    );
    Ok(Fragment::PublicApi(ConfigPatch {
        apply_to: ApplyTo::NetworkFilter,
        match_: PatchMatch {
            context: PatchContext::Gateway,
            listener: ListenerMatch {
                port_number: None,
                filter_chain: FilterChainMatch {
                    sni: Some(sni.clone()),
                    filter: FilterMatch {
                        name: TCP_PROXY_FILTER.to_string(),
                        sub_filter: None,
                    },
                },
            },
        },
        patch: PatchValue {
            operation: Operation::InsertBefore,
            value: filter,
        },
    }))
}

/// Builds the gateway patch guarding a shoot's VPN tunnel.
///
/// The VPN listener is shared by all shoots on the gateway, so the policy
/// only ever denies, and only traffic whose tunnel header names this shoot.
pub fn vpn(rule: &Rule, extra: &[IpNet], shoot_id: &str) -> Fragment {
    let name = format!("{VPN_FILTER}-{shoot_id}");
    let filter = Filter::single_policy(
        name.clone(),
        rbac::HTTP_RBAC_TYPE_URL,
        None,
        Action::Deny,
        name,
        vec![vpn_principal(shoot_id, rule, extra)],
    );
    Fragment::Vpn(vpn_patch(filter))
}

/// Builds one shared VPN gateway patch for several shoots at once.
pub fn legacy_vpn(entries: &[LegacyVpnEntry<'_>]) -> Fragment {
    let principals = entries
        .iter()
        .map(|e| vpn_principal(e.shoot_id, e.rule, e.extra))
        .collect();
    let filter = Filter::single_policy(
        VPN_FILTER,
        rbac::HTTP_RBAC_TYPE_URL,
        None,
        Action::Deny,
        VPN_FILTER,
        principals,
    );
    Fragment::LegacyVpn(vpn_patch(filter))
}

/// Matches the traffic of a single shoot's tunnel that must be denied.
///
/// The header term must be AND-ed in: without it, one shoot's rule would
/// apply to every other shoot's tunnel.
fn vpn_principal(shoot_id: &str, rule: &Rule, extra: &[IpNet]) -> Principal {
    let denied = match rule.action {
        Action::Allow => Principal::not(Principal::or(principals(rule, extra))),
        Action::Deny => Principal::or(principals(rule, extra)),
    };
    Principal::and(vec![
        denied,
        Principal::header_contains(VPN_HEADER, format!(".{shoot_id}.")),
    ])
}

fn vpn_patch(filter: Filter) -> ConfigPatch {
    ConfigPatch {
        apply_to: ApplyTo::HttpFilter,
        match_: PatchMatch {
            context: PatchContext::Gateway,
            listener: ListenerMatch {
                port_number: Some(VPN_PORT),
                filter_chain: FilterChainMatch {
                    sni: None,
                    filter: FilterMatch {
                        name: HTTP_CONNECTION_MANAGER_FILTER.to_string(),
                        sub_filter: Some(SubFilterMatch {
                            name: HTTP_ROUTER_FILTER.to_string(),
                        }),
                    },
                },
            },
        },
        patch: PatchValue {
            operation: Operation::InsertBefore,
            value: filter,
        },
    }
}

#[cfg(test)]
mod tests;
