use acl_controller_k8s_api::acl;
use ipnet::IpNet;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// The default upper bound on the number of CIDRs a single rule may list.
pub const DEFAULT_MAX_ALLOWED_CIDRS: usize = 50;

/// A validated ACL rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    pub action: Action,
    pub matcher: MatcherType,
    pub cidrs: Vec<IpNet>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Allow,
    Deny,
}

/// Selects which of a connection's addresses is matched against a rule's
/// CIDRs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatcherType {
    /// The downstream connection's source address. Superseded by the two
    /// others in Envoy but still accepted.
    SourceIp,

    /// The client address as derived from trusted proxy headers.
    RemoteIp,

    /// The address of the directly connected peer.
    DirectRemoteIp,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RuleError {
    #[error("no ACL rule given")]
    Missing,

    #[error("invalid action {0:?}: must be ALLOW or DENY")]
    InvalidAction(String),

    #[error("invalid type {0:?}: must be one of source_ip, remote_ip, direct_remote_ip")]
    InvalidMatcherType(String),

    #[error("no CIDRs given")]
    MissingCidrs,

    #[error("invalid CIDR {cidr:?}: {source}")]
    InvalidCidr {
        cidr: String,
        #[source]
        source: ipnet::AddrParseError,
    },
}

/// A rule lists more CIDRs than the operator allows.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("{field}: Too many: {actual}: must have at most {max} items")]
pub struct TooManyCidrs {
    pub field: &'static str,
    pub actual: usize,
    pub max: usize,
}

/// Validates a raw rule into its typed form.
///
/// Checks run in a fixed order: presence, action, matcher type, CIDR
/// presence, then CIDR syntax, so a rule with several problems always
/// reports the same one.
pub fn validate(rule: Option<&acl::Rule>) -> Result<Rule, RuleError> {
    let rule = rule.ok_or(RuleError::Missing)?;

    let action = rule.action.parse()?;
    let matcher = rule.matcher_type.parse()?;

    if rule.cidrs.is_empty() {
        return Err(RuleError::MissingCidrs);
    }

    let cidrs = rule
        .cidrs
        .iter()
        .map(|cidr| {
            cidr.parse::<IpNet>().map_err(|source| RuleError::InvalidCidr {
                cidr: cidr.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Rule {
        action,
        matcher,
        cidrs,
    })
}

/// Checks a submitted rule against the operator's CIDR limit.
pub fn validate_cidr_count(rule: &acl::Rule, max: usize) -> Result<(), TooManyCidrs> {
    if rule.cidrs.len() > max {
        return Err(TooManyCidrs {
            field: acl::CIDRS_FIELD_PATH,
            actual: rule.cidrs.len(),
            max,
        });
    }
    Ok(())
}

// === impl Action ===

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
        }
    }
}

impl FromStr for Action {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALLOW" => Ok(Self::Allow),
            "DENY" => Ok(Self::Deny),
            s => Err(RuleError::InvalidAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl MatcherType ===

impl MatcherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceIp => "source_ip",
            Self::RemoteIp => "remote_ip",
            Self::DirectRemoteIp => "direct_remote_ip",
        }
    }
}

impl FromStr for MatcherType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source_ip" => Ok(Self::SourceIp),
            "remote_ip" => Ok(Self::RemoteIp),
            "direct_remote_ip" => Ok(Self::DirectRemoteIp),
            s => Err(RuleError::InvalidMatcherType(s.to_string())),
        }
    }
}

impl fmt::Display for MatcherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}
