//! Infrastructure-provider-specific CIDR contributions.
//!
//! Some providers route traffic from a shoot's own nodes through addresses
//! that are not part of its node network (e.g. an OpenStack router's
//! external address). Each provider registers a pure function from its
//! infrastructure status to the extra CIDRs that must always be allowed.

use ahash::AHashMap as HashMap;
use ipnet::IpNet;
use serde_json::Value;
use std::net::IpAddr;
use thiserror::Error;

/// Extracts always-allowed CIDRs from a provider's infrastructure status.
pub type ExtractCidrs = fn(&Value) -> Result<Vec<IpNet>, ProviderError>;

#[derive(Clone, Debug)]
pub struct Providers(HashMap<&'static str, ExtractCidrs>);

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The infrastructure has not reported a status yet. Callers should retry
    /// once it has.
    #[error("{0} infrastructure has not reported a provider status yet, retry later")]
    MissingStatus(String),

    #[error("failed to decode {provider} infrastructure status: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {provider} address {addr:?}: {source}")]
    InvalidAddr {
        provider: &'static str,
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

// === impl Providers ===

impl Default for Providers {
    fn default() -> Self {
        Self::empty().register("openstack", openstack::allowed_cidrs)
    }
}

impl Providers {
    /// A registry without any providers.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    pub fn register(mut self, provider_type: &'static str, extract: ExtractCidrs) -> Self {
        self.0.insert(provider_type, extract);
        self
    }

    pub fn is_registered(&self, provider_type: &str) -> bool {
        self.0.contains_key(provider_type)
    }

    /// Returns the provider-specific CIDRs for an infrastructure.
    ///
    /// Unknown provider types contribute nothing. A known provider whose
    /// infrastructure has no status yet is an error.
    pub fn allowed_cidrs(
        &self,
        provider_type: &str,
        status: Option<&Value>,
    ) -> Result<Vec<IpNet>, ProviderError> {
        let Some(extract) = self.0.get(provider_type) else {
            return Ok(vec![]);
        };
        let status = status.ok_or_else(|| ProviderError::MissingStatus(provider_type.to_string()))?;
        extract(status)
    }
}

fn host_net(provider: &'static str, addr: &str) -> Result<IpNet, ProviderError> {
    let ip = addr
        .parse::<IpAddr>()
        .map_err(|source| ProviderError::InvalidAddr {
            provider,
            addr: addr.to_string(),
            source,
        })?;
    Ok(IpNet::from(ip))
}

mod openstack {
    use super::{host_net, ProviderError};
    use ipnet::IpNet;
    use serde::Deserialize;
    use serde_json::Value;

    const PROVIDER: &str = "openstack";

    #[derive(Deserialize)]
    struct Status {
        networks: Networks,
    }

    #[derive(Deserialize)]
    struct Networks {
        router: Router,
    }

    #[derive(Deserialize)]
    struct Router {
        ip: String,
    }

    /// Traffic from OpenStack nodes egresses through the router's address.
    pub(super) fn allowed_cidrs(status: &Value) -> Result<Vec<IpNet>, ProviderError> {
        let status = Status::deserialize(status).map_err(|source| ProviderError::Decode {
            provider: PROVIDER,
            source,
        })?;
        Ok(vec![host_net(PROVIDER, &status.networks.router.ip)?])
    }
}
