use acl_controller_k8s_api::cluster;
use ipnet::IpNet;
use thiserror::Error;

/// A cluster's node and pod networks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Networks {
    pub nodes: Option<IpNet>,
    pub pods: Option<IpNet>,
}

/// The shoot's contribution to the always-allowed CIDRs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShootCidrs {
    /// Workerless shoots have no nodes, pods, or infrastructure of their own.
    Workerless,

    Workers {
        networks: Networks,

        /// Provider-specific CIDRs, e.g. router egress addresses.
        provider: Vec<IpNet>,
    },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("invalid {field} network {cidr:?}: {source}")]
pub struct CidrError {
    pub field: &'static str,
    pub cidr: String,
    #[source]
    pub source: ipnet::AddrParseError,
}

/// Collects the CIDRs that must always be allowed for a shoot, in a fixed
/// order: seed nodes, seed pods, operator-configured CIDRs, then (unless the
/// shoot is workerless) shoot nodes, shoot pods, and provider-specific CIDRs.
///
/// Duplicates are kept.
pub fn aggregate(seed: &Networks, shoot: &ShootCidrs, always_allowed: &[IpNet]) -> Vec<IpNet> {
    let mut cidrs = Vec::new();
    cidrs.extend(seed.nodes);
    cidrs.extend(seed.pods);
    cidrs.extend_from_slice(always_allowed);

    if let ShootCidrs::Workers { networks, provider } = shoot {
        cidrs.extend(networks.nodes);
        cidrs.extend(networks.pods);
        cidrs.extend_from_slice(provider);
    }

    cidrs
}

// === impl Networks ===

impl Networks {
    pub fn parse(networks: &cluster::Networks) -> Result<Self, CidrError> {
        Ok(Self {
            nodes: parse_opt("nodes", networks.nodes.as_deref())?,
            pods: parse_opt("pods", networks.pods.as_deref())?,
        })
    }
}

fn parse_opt(field: &'static str, cidr: Option<&str>) -> Result<Option<IpNet>, CidrError> {
    cidr.map(|cidr| {
        cidr.parse().map_err(|source| CidrError {
            field,
            cidr: cidr.to_string(),
            source,
        })
    })
    .transpose()
}
