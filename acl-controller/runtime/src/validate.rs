use crate::{
    admission::{parse_spec, AdmissionRequest, Rejection},
    core::{validate, validate_cidr_count},
    k8s::{acl::ProviderConfig, extension::EXTENSION_TYPE, ExtensionSpec},
    Config,
};
use kube::core::admission::Operation;

/// Checks ACL extensions as they are submitted, so that a bad rule is
/// reported to its author rather than when the gateway is next patched.
#[derive(Clone, Debug)]
pub struct Validator {
    max_allowed_cidrs: usize,
}

// === impl Validator ===

impl Validator {
    pub fn new(config: &Config) -> Self {
        Self {
            max_allowed_cidrs: config.max_allowed_cidrs,
        }
    }

    pub fn validate(&self, req: &AdmissionRequest) -> Result<(), Rejection> {
        if matches!(req.operation, Operation::Delete) {
            return Ok(());
        }

        let (_, spec) = parse_spec::<ExtensionSpec>(req).map_err(Rejection::internal)?;
        if spec.extension_type != EXTENSION_TYPE {
            return Ok(());
        }

        let Some(raw) = spec.provider_config.as_ref() else {
            return Ok(());
        };
        let config = ProviderConfig::from_raw(raw).map_err(Rejection::invalid)?;
        let Some(rule) = config.rule.as_ref() else {
            return Ok(());
        };

        validate_cidr_count(rule, self.max_allowed_cidrs).map_err(Rejection::invalid)?;
        validate(Some(rule)).map_err(Rejection::invalid)?;
        Ok(())
    }
}
