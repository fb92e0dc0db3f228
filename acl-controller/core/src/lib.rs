#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cidrs;
pub mod fragment;
pub mod provider;
pub mod rbac;
pub mod rule;

pub use self::{
    cidrs::{aggregate, CidrError, Networks, ShootCidrs},
    fragment::{Fragment, FragmentKind, LegacyVpnEntry, NoHostsGiven},
    provider::{ProviderError, Providers},
    rule::{
        validate, validate_cidr_count, Action, MatcherType, Rule, RuleError, TooManyCidrs,
        DEFAULT_MAX_ALLOWED_CIDRS,
    },
};
pub use ipnet::{IpNet, Ipv4Net, Ipv6Net};
