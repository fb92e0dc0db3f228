use crate::core::{IpNet, DEFAULT_MAX_ALLOWED_CIDRS};
use std::time::Duration;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings shared by the mutator and the submission validator.
///
/// Built once from the command line and passed to each constructor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// CIDRs that every shoot must always allow, e.g. the operator's own
    /// monitoring networks.
    pub allowed_cidrs: Vec<IpNet>,

    /// The most CIDRs a single rule may list.
    pub max_allowed_cidrs: usize,

    /// Bounds each lookup the mutator performs.
    pub lookup_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_cidrs: vec![],
            max_allowed_cidrs: DEFAULT_MAX_ALLOWED_CIDRS,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}
