use super::*;
use crate::{
    cidrs::{self, Networks, ShootCidrs},
    rule::MatcherType,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn net(s: &str) -> IpNet {
    s.parse().unwrap()
}

fn rule(action: Action, matcher: MatcherType, cidrs: &[&str]) -> Rule {
    Rule {
        action,
        matcher,
        cidrs: cidrs.iter().map(|c| net(c)).collect(),
    }
}

fn policy_principals(fragment: &Fragment) -> &[Principal] {
    let policies = &fragment.filter().typed_config.rules.policies;
    assert_eq!(policies.len(), 1, "fragments hold a single policy");
    &policies.values().next().unwrap().principals
}

#[test]
fn internal_deny_all() {
    let rule = rule(Action::Deny, MatcherType::SourceIp, &["0.0.0.0/0"]);
    let fragment = internal(&rule, &[]);

    assert_eq!(fragment.kind(), FragmentKind::Internal);
    assert_eq!(
        fragment.to_value().unwrap(),
        json!({
            "name": "acl-internal-source_ip",
            "typed_config": {
                "@type": "type.googleapis.com/envoy.extensions.filters.network.rbac.v3.RBAC",
                "stat_prefix": "envoyrbac",
                "rules": {
                    "action": "DENY",
                    "policies": {
                        "acl-internal-source_ip": {
                            "permissions": [{"any": true}],
                            "principals": [
                                {"source_ip": {"address_prefix": "0.0.0.0", "prefix_len": 0}},
                            ],
                        },
                    },
                },
            },
        })
    );
}

#[test]
fn internal_allow_with_cluster_networks() {
    let rule = rule(Action::Allow, MatcherType::SourceIp, &["0.0.0.0/0"]);
    let extra = cidrs::aggregate(
        &Networks {
            nodes: Some(net("100.250.0.0/16")),
            pods: Some(net("10.96.0.0/11")),
        },
        &ShootCidrs::Workers {
            networks: Networks {
                nodes: Some(net("10.250.0.0/16")),
                pods: Some(net("100.96.0.0/11")),
            },
            provider: vec![],
        },
        &[],
    );
    let fragment = internal(&rule, &extra);

    assert_eq!(fragment.filter().typed_config.rules.action, Action::Allow);
    let prefixes = policy_principals(&fragment)
        .iter()
        .map(|p| match p {
            Principal::SourceIp(r) => format!("{}/{}", r.address_prefix, r.prefix_len),
            p => panic!("unexpected principal: {p:?}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(
        prefixes,
        [
            "0.0.0.0/0",
            "100.250.0.0/16",
            "10.96.0.0/11",
            "10.250.0.0/16",
            "100.96.0.0/11",
        ]
    );
}

#[test]
fn internal_name_follows_matcher() {
    for (matcher, name) in [
        (MatcherType::SourceIp, "acl-internal-source_ip"),
        (MatcherType::RemoteIp, "acl-internal-remote_ip"),
        (MatcherType::DirectRemoteIp, "acl-internal-direct_remote_ip"),
    ] {
        let fragment = internal(&rule(Action::Allow, matcher, &["10.0.0.0/8"]), &[]);
        assert_eq!(fragment.filter().name, name);
        assert!(fragment.filter().typed_config.rules.policies.contains_key(name));
    }
}

#[test]
fn deny_carves_out_always_allowed() {
    let rule = rule(Action::Deny, MatcherType::RemoteIp, &["0.0.0.0/0"]);
    let fragment = internal(&rule, &[net("10.250.0.0/16")]);

    assert_eq!(
        serde_json::to_value(policy_principals(&fragment)).unwrap(),
        json!([{
            "and_ids": {"ids": [
                {"or_ids": {"ids": [
                    {"remote_ip": {"address_prefix": "0.0.0.0", "prefix_len": 0}},
                ]}},
                {"not_id": {"or_ids": {"ids": [
                    {"remote_ip": {"address_prefix": "10.250.0.0", "prefix_len": 16}},
                ]}}},
            ]},
        }])
    );
}

#[test]
fn builds_are_deterministic() {
    let rule = rule(
        Action::Allow,
        MatcherType::RemoteIp,
        &["10.0.0.0/8", "192.168.0.0/16", "2001:db8::/32"],
    );
    let extra = [net("100.250.0.0/16"), net("10.96.0.0/11")];

    let a = serde_json::to_vec(&internal(&rule, &extra).to_value().unwrap()).unwrap();
    let b = serde_json::to_vec(&internal(&rule, &extra).to_value().unwrap()).unwrap();
    assert_eq!(a, b);

    let hosts = ["api.example.com".to_string()];
    let a = public_api(&rule, &extra, &hosts).unwrap();
    let b = public_api(&rule, &extra, &hosts).unwrap();
    assert_eq!(
        serde_json::to_vec(&a.to_value().unwrap()).unwrap(),
        serde_json::to_vec(&b.to_value().unwrap()).unwrap()
    );
}

#[test]
fn public_api_matches_first_host() {
    let rule = rule(Action::Allow, MatcherType::RemoteIp, &["10.0.0.0/8"]);
    let hosts = [
        "api.foo.example.com".to_string(),
        "api.foo.internal.example.com".to_string(),
    ];
    let fragment = public_api(&rule, &[], &hosts).unwrap();

    assert_eq!(fragment.kind(), FragmentKind::PublicApi);
    assert_eq!(
        fragment.to_value().unwrap(),
        json!({
            "applyTo": "NETWORK_FILTER",
            "match": {
                "context": "GATEWAY",
                "listener": {
                    "filterChain": {
                        "sni": "api.foo.example.com",
                        "filter": {"name": "envoy.filters.network.tcp_proxy"},
                    },
                },
            },
            "patch": {
                "operation": "INSERT_BEFORE",
                "value": {
                    "name": "acl-api",
                    "typed_config": {
                        "@type": "type.googleapis.com/envoy.extensions.filters.network.rbac.v3.RBAC",
                        "stat_prefix": "envoyrbac",
                        "rules": {
                            "action": "ALLOW",
                            "policies": {
                                "acl-api": {
                                    "permissions": [{"any": true}],
                                    "principals": [
                                        {"remote_ip": {"address_prefix": "10.0.0.0", "prefix_len": 8}},
                                    ],
                                },
                            },
                        },
                    },
                },
            },
        })
    );
}

#[test]
fn public_api_requires_hosts() {
    let rule = rule(Action::Allow, MatcherType::RemoteIp, &["10.0.0.0/8"]);
    assert_eq!(public_api(&rule, &[], &[]), Err(NoHostsGiven));
}

#[test]
fn vpn_groups_principals_with_shoot_header() {
    let rule = rule(Action::Allow, MatcherType::RemoteIp, &["10.0.0.0/8"]);
    let fragment = vpn(&rule, &[net("100.250.0.0/16")], "shoot--foo--bar");

    assert_eq!(fragment.kind(), FragmentKind::Vpn);
    assert_eq!(
        fragment.to_value().unwrap(),
        json!({
            "applyTo": "HTTP_FILTER",
            "match": {
                "context": "GATEWAY",
                "listener": {
                    "portNumber": 8132,
                    "filterChain": {
                        "filter": {
                            "name": "envoy.filters.network.http_connection_manager",
                            "subFilter": {"name": "envoy.filters.http.router"},
                        },
                    },
                },
            },
            "patch": {
                "operation": "INSERT_BEFORE",
                "value": {
                    "name": "acl-vpn-shoot--foo--bar",
                    "typed_config": {
                        "@type": "type.googleapis.com/envoy.extensions.filters.http.rbac.v3.RBAC",
                        "rules": {
                            "action": "DENY",
                            "policies": {
                                "acl-vpn-shoot--foo--bar": {
                                    "permissions": [{"any": true}],
                                    "principals": [{
                                        "and_ids": {"ids": [
                                            {"not_id": {"or_ids": {"ids": [
                                                {"remote_ip": {"address_prefix": "10.0.0.0", "prefix_len": 8}},
                                                {"remote_ip": {"address_prefix": "100.250.0.0", "prefix_len": 16}},
                                            ]}}},
                                            {"header": {
                                                "name": "reversed-vpn",
                                                "string_match": {"contains": ".shoot--foo--bar."},
                                            }},
                                        ]},
                                    }],
                                },
                            },
                        },
                    },
                },
            },
        })
    );
}

#[test]
fn vpn_deny_rule() {
    let rule = rule(Action::Deny, MatcherType::DirectRemoteIp, &["192.0.2.0/24"]);
    let fragment = vpn(&rule, &[], "shoot--foo--bar");

    let principals = policy_principals(&fragment);
    assert_eq!(
        principals,
        [Principal::and(vec![
            Principal::or(vec![Principal::cidr(
                MatcherType::DirectRemoteIp,
                &net("192.0.2.0/24"),
            )]),
            Principal::header_contains(VPN_HEADER, ".shoot--foo--bar."),
        ])]
    );
}

#[test]
fn legacy_vpn_shares_one_policy() {
    let allow = rule(Action::Allow, MatcherType::RemoteIp, &["10.0.0.0/8"]);
    let deny = rule(Action::Deny, MatcherType::RemoteIp, &["192.0.2.0/24"]);
    let extra = [net("100.250.0.0/16")];
    let fragment = legacy_vpn(&[
        LegacyVpnEntry {
            shoot_id: "shoot--a--one",
            rule: &allow,
            extra: &extra,
        },
        LegacyVpnEntry {
            shoot_id: "shoot--b--two",
            rule: &deny,
            extra: &[],
        },
    ]);

    assert_eq!(fragment.kind(), FragmentKind::LegacyVpn);
    let filter = fragment.filter();
    assert_eq!(filter.name, "acl-vpn");
    assert_eq!(filter.typed_config.rules.action, Action::Deny);

    let principals = policy_principals(&fragment);
    assert_eq!(principals.len(), 2);
    assert_eq!(
        principals[0],
        match vpn(&allow, &extra, "shoot--a--one") {
            Fragment::Vpn(patch) => patch.patch.value.typed_config.rules.policies
                ["acl-vpn-shoot--a--one"]
                .principals[0]
                .clone(),
            f => panic!("unexpected fragment: {f:?}"),
        }
    );
    match &principals[1] {
        Principal::AndIds(set) => assert_eq!(
            set.ids[1],
            Principal::header_contains(VPN_HEADER, ".shoot--b--two.")
        ),
        p => panic!("unexpected principal: {p:?}"),
    }
}

#[test]
fn fragments_round_trip() {
    let allow = rule(Action::Allow, MatcherType::RemoteIp, &["10.0.0.0/8"]);
    let deny = rule(Action::Deny, MatcherType::SourceIp, &["2001:db8::/32"]);
    let extra = [net("100.250.0.0/16")];

    let fragments = [
        internal(&deny, &extra),
        public_api(&allow, &extra, &["api.example.com".to_string()]).unwrap(),
        vpn(&allow, &extra, "shoot--foo--bar"),
        legacy_vpn(&[LegacyVpnEntry {
            shoot_id: "shoot--foo--bar",
            rule: &deny,
            extra: &extra,
        }]),
    ];

    for fragment in fragments {
        let value = fragment.to_value().unwrap();
        let decoded = Fragment::from_value(fragment.kind(), value).unwrap();
        assert_eq!(decoded, fragment);
    }
}
