//! Splices a shoot's ACL filter into its `EnvoyFilter` at admission time.
//!
//! The ingress gateway routes each shoot's traffic through a filter chain
//! whose last entry is a TCP proxy. The mutator replaces that chain's filter
//! list with `[acl, tcp_proxy]`, so re-running it on an already patched
//! object yields the same list.

use crate::{
    admission::{parse_spec, AdmissionRequest, Rejection},
    core::{
        aggregate,
        fragment::{self, TCP_PROXY_FILTER},
        IpNet, Networks, Providers, ShootCidrs,
    },
    k8s::{
        acl::ProviderConfig, envoy_filter::FilterLocation, extension::EXTENSION_NAME, Cluster,
        EnvoyFilterSpec, ResourceExt,
    },
    lookup::Lookup,
    Config,
};
use anyhow::{anyhow, Result};
use json_patch::{Patch, PatchOperation, ReplaceOperation};
use kube::core::admission::Operation;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, instrument};

/// Names of `EnvoyFilter`s managed per shoot start with this prefix; the rest
/// of the name is the shoot's namespace.
pub const SHOOT_PREFIX: &str = "shoot--";

#[derive(Clone)]
pub struct Mutator {
    lookup: Arc<dyn Lookup>,
    providers: Arc<Providers>,
    allowed_cidrs: Arc<[IpNet]>,
    timeout: Duration,
}

// === impl Mutator ===

impl Mutator {
    pub fn new(lookup: Arc<dyn Lookup>, config: &Config) -> Self {
        Self::with_providers(lookup, Providers::default(), config)
    }

    pub fn with_providers(lookup: Arc<dyn Lookup>, providers: Providers, config: &Config) -> Self {
        Self {
            lookup,
            providers: Arc::new(providers),
            allowed_cidrs: config.allowed_cidrs.clone().into(),
            timeout: config.lookup_timeout,
        }
    }

    /// Computes the patch for an `EnvoyFilter` admission request.
    ///
    /// Returns `None` when the object must be admitted unchanged: it is being
    /// deleted, it is not a shoot's filter, or the shoot has no active ACL.
    #[instrument(skip_all, fields(name = %req.name))]
    pub async fn mutate(&self, req: &AdmissionRequest) -> Result<Option<Patch>, Rejection> {
        if matches!(req.operation, Operation::Delete) {
            return Ok(None);
        }

        let (obj, spec) = parse_spec::<EnvoyFilterSpec>(req).map_err(Rejection::internal)?;

        let namespace = obj.name_any();
        if !namespace.starts_with(SHOOT_PREFIX) {
            debug!("Not a shoot filter");
            return Ok(None);
        }

        let extension = self
            .bounded(self.lookup.extension(&namespace, EXTENSION_NAME))
            .await
            .map_err(Rejection::internal)?;
        let Some(extension) = extension else {
            debug!(%namespace, "No ACL extension");
            return Ok(None);
        };
        if !extension.is_acl() {
            debug!(%namespace, extension_type = %extension.spec.extension_type, "Not an ACL extension");
            return Ok(None);
        }
        if extension.is_deleting() {
            debug!(%namespace, "ACL extension is being deleted");
            return Ok(None);
        }

        let Some(raw) = extension.spec.provider_config.as_ref() else {
            debug!(%namespace, "ACL extension has no provider config");
            return Ok(None);
        };
        let config = ProviderConfig::from_raw(raw).map_err(Rejection::invalid)?;
        let Some(rule) = config.rule.as_ref() else {
            debug!(%namespace, "ACL extension has no rule");
            return Ok(None);
        };
        let rule = crate::core::validate(Some(rule)).map_err(Rejection::invalid)?;

        let extra = self.always_allowed(&namespace).await?;
        let acl = fragment::internal(&rule, &extra)
            .to_value()
            .map_err(Rejection::internal)?;

        let location = spec.find_filter(TCP_PROXY_FILTER).ok_or_else(|| {
            Rejection::internal(format_args!(
                "no {TCP_PROXY_FILTER} filter found in EnvoyFilter {namespace}"
            ))
        })?;

        replace_filters(location, acl).map(Some)
    }

    /// Aggregates the CIDRs a shoot always allows, regardless of its rule.
    async fn always_allowed(&self, namespace: &str) -> Result<Vec<IpNet>, Rejection> {
        let cluster = self
            .bounded(self.lookup.cluster(namespace))
            .await
            .map_err(Rejection::internal)?;

        let seed = Networks::parse(&cluster.spec.seed.spec.networks).map_err(Rejection::internal)?;
        let shoot = self
            .shoot_cidrs(namespace, &cluster)
            .await
            .map_err(Rejection::internal)?;

        Ok(aggregate(&seed, &shoot, &self.allowed_cidrs))
    }

    async fn shoot_cidrs(&self, namespace: &str, cluster: &Cluster) -> Result<ShootCidrs> {
        let shoot = &cluster.spec.shoot;
        if shoot.is_workerless() {
            return Ok(ShootCidrs::Workerless);
        }

        let networks = match shoot.spec.networking.as_ref() {
            Some(networks) => Networks::parse(networks)?,
            None => Networks::default(),
        };

        let name = shoot
            .name()
            .ok_or_else(|| anyhow!("cluster {namespace} has no shoot name"))?;
        let infra = self
            .bounded(self.lookup.infrastructure(namespace, name))
            .await?;
        let provider = self
            .providers
            .allowed_cidrs(&infra.spec.provider_type, infra.provider_status())?;

        Ok(ShootCidrs::Workers { networks, provider })
    }

    async fn bounded<T>(&self, lookup: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| anyhow!("lookup timed out after {:?}", self.timeout))?
    }
}

/// Replaces the filter list holding the pass-through filter with
/// `[acl, pass-through]`.
fn replace_filters(location: FilterLocation, acl: serde_json::Value) -> Result<Patch, Rejection> {
    let path = location
        .filters_pointer()
        .parse()
        .map_err(Rejection::internal)?;
    let value = serde_json::Value::Array(vec![acl, location.filter]);
    Ok(Patch(vec![PatchOperation::Replace(ReplaceOperation {
        path,
        value,
    })]))
}
