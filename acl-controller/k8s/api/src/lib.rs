#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod acl;
pub mod cluster;
pub mod envoy_filter;
pub mod extension;
pub mod infrastructure;

pub use self::{
    cluster::{Cluster, ClusterSpec},
    envoy_filter::{EnvoyFilter, EnvoyFilterSpec},
    extension::{Extension, ExtensionSpec},
    infrastructure::{Infrastructure, InfrastructureSpec, InfrastructureStatus},
};
pub use k8s_openapi::api;
pub use kube::api::{ObjectMeta, ResourceExt};
pub use kube::{Api, Client, Error, Resource};
