pub use acl_controller_core as core;
pub use acl_controller_k8s_api as k8s;

mod admission;
mod args;
mod config;
mod lookup;
mod metrics;
mod mutate;
mod validate;

#[cfg(test)]
mod test_util;

pub use self::{
    admission::{Admission, Rejection},
    args::Args,
    config::Config,
    lookup::{KubeLookup, Lookup},
    metrics::AdmissionMetrics,
    mutate::Mutator,
    validate::Validator,
};
