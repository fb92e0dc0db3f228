use crate::{
    admission::AdmissionRequest,
    k8s::{Cluster, Extension, Infrastructure},
    lookup::Lookup,
};
use anyhow::{anyhow, Result};
use kube::core::{
    admission::{AdmissionReview, Operation},
    DynamicObject,
};
use serde_json::{json, Value};
use std::{collections::HashMap, time::Duration};

/// Builds an admission request for `object`, taking its group, version and
/// kind from the object itself.
pub fn request(operation: Operation, object: Value) -> AdmissionRequest {
    let (group, version) = match object["apiVersion"].as_str().unwrap().split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), object["apiVersion"].as_str().unwrap().to_string()),
    };
    let kind = object["kind"].as_str().unwrap().to_string();
    let operation = match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    };
    let name = object["metadata"]["name"].clone();
    let namespace = object["metadata"]["namespace"].clone();

    let review: AdmissionReview<DynamicObject> = serde_json::from_value(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "e911857d-c318-11e8-bbad-025000000001",
            "kind": {"group": group, "version": version, "kind": kind},
            "resource": {"group": group, "version": version, "resource": kind.to_lowercase()},
            "name": name,
            "namespace": namespace,
            "operation": operation,
            "userInfo": {"username": "system:serviceaccount:garden:gardenlet"},
            "dryRun": false,
            "object": object,
        }
    }))
    .expect("review must decode");
    review.try_into().expect("review must carry a request")
}

pub fn extension(ns: &str, spec: Value) -> Value {
    json!({
        "apiVersion": "extensions.gardener.cloud/v1alpha1",
        "kind": "Extension",
        "metadata": {"name": "acl", "namespace": ns},
        "spec": spec,
    })
}

pub fn envoy_filter(name: &str, spec: Value) -> Value {
    json!({
        "apiVersion": "networking.istio.io/v1alpha3",
        "kind": "EnvoyFilter",
        "metadata": {"name": name, "namespace": "istio-ingress"},
        "spec": spec,
    })
}

/// The namespace, and gateway filter name, of the shoot the fixtures describe.
pub const NS: &str = "shoot--foo--bar";

pub fn acl_extension(rule: Value) -> Value {
    extension(NS, json!({"type": "acl", "providerConfig": {"rule": rule}}))
}

pub fn cluster(workers: Value) -> Value {
    json!({
        "apiVersion": "extensions.gardener.cloud/v1alpha1",
        "kind": "Cluster",
        "metadata": {"name": NS},
        "spec": {
            "seed": {
                "metadata": {"name": "aws-eu1"},
                "spec": {"networks": {"nodes": "100.250.0.0/16", "pods": "10.96.0.0/11"}},
            },
            "shoot": {
                "metadata": {"name": "bar", "namespace": "garden-foo"},
                "spec": {
                    "networking": {"nodes": "10.250.0.0/16", "pods": "100.96.0.0/11"},
                    "provider": {"type": "openstack", "workers": workers},
                },
            },
        },
    })
}

pub fn openstack_infrastructure(status: Option<Value>) -> Value {
    let mut infra = json!({
        "apiVersion": "extensions.gardener.cloud/v1alpha1",
        "kind": "Infrastructure",
        "metadata": {"name": "bar", "namespace": NS},
        "spec": {"type": "openstack"},
    });
    if let Some(status) = status {
        infra["status"] = json!({"providerStatus": status});
    }
    infra
}

pub fn router_status(ip: &str) -> Value {
    json!({
        "apiVersion": "openstack.provider.extensions.gardener.cloud/v1alpha1",
        "kind": "InfrastructureStatus",
        "networks": {"router": {"id": "router-id", "ip": ip}},
    })
}

/// A shoot with one worker pool on OpenStack and an ACL owner holding `rule`.
pub fn shoot(rule: Value) -> Objects {
    Objects::default()
        .with_extension(acl_extension(rule))
        .with_cluster(cluster(json!([{"name": "pool-a"}])))
        .with_infrastructure(openstack_infrastructure(Some(router_status("10.9.8.7"))))
}

pub fn tcp_proxy() -> Value {
    json!({
        "name": "envoy.filters.network.tcp_proxy",
        "typed_config": {
            "@type": "type.googleapis.com/envoy.extensions.filters.network.tcp_proxy.v3.TcpProxy",
            "stat_prefix": NS,
            "cluster": "outbound|443||kube-apiserver.shoot--foo--bar.svc.cluster.local",
        },
    })
}

pub fn gateway_filter(filters: Value) -> Value {
    envoy_filter(
        NS,
        json!({
            "workloadSelector": {"labels": {"app": "istio-ingressgateway"}},
            "configPatches": [{
                "applyTo": "LISTENER",
                "match": {"context": "GATEWAY"},
                "patch": {
                    "operation": "ADD",
                    "value": {
                        "name": NS,
                        "address": {"socket_address": {"address": "0.0.0.0", "port_value": 8443}},
                        "filter_chains": [{
                            "filter_chain_match": {"server_names": ["api.bar.foo.example.com"]},
                            "filters": filters,
                        }],
                    },
                },
            }],
        }),
    )
}

/// An in-memory set of objects. Lookups of anything else fail as if the API
/// server returned not found.
#[derive(Default)]
pub struct Objects {
    pub extensions: HashMap<(String, String), Extension>,
    pub clusters: HashMap<String, Cluster>,
    pub infrastructures: HashMap<(String, String), Infrastructure>,

    /// Lookups never complete when set.
    pub hang: bool,

    /// Every lookup fails when set.
    pub fail: bool,
}

impl Objects {
    pub fn with_extension(mut self, ext: Value) -> Self {
        let ext: Extension = serde_json::from_value(ext).expect("extension must decode");
        let key = (
            ext.metadata.namespace.clone().unwrap(),
            ext.metadata.name.clone().unwrap(),
        );
        self.extensions.insert(key, ext);
        self
    }

    pub fn with_cluster(mut self, cluster: Value) -> Self {
        let cluster: Cluster = serde_json::from_value(cluster).expect("cluster must decode");
        self.clusters
            .insert(cluster.metadata.name.clone().unwrap(), cluster);
        self
    }

    pub fn with_infrastructure(mut self, infra: Value) -> Self {
        let infra: Infrastructure =
            serde_json::from_value(infra).expect("infrastructure must decode");
        let key = (
            infra.metadata.namespace.clone().unwrap(),
            infra.metadata.name.clone().unwrap(),
        );
        self.infrastructures.insert(key, infra);
        self
    }

    async fn check(&self) -> Result<()> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail {
            return Err(anyhow!("connection refused"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Lookup for Objects {
    async fn extension(&self, ns: &str, name: &str) -> Result<Option<Extension>> {
        self.check().await?;
        Ok(self
            .extensions
            .get(&(ns.to_string(), name.to_string()))
            .cloned())
    }

    async fn cluster(&self, name: &str) -> Result<Cluster> {
        self.check().await?;
        self.clusters
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("clusters {name:?} not found"))
    }

    async fn infrastructure(&self, ns: &str, name: &str) -> Result<Infrastructure> {
        self.check().await?;
        self.infrastructures
            .get(&(ns.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("infrastructures {ns}/{name} not found"))
    }
}
