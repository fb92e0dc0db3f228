use crate::{
    admission::Admission,
    core::IpNet,
    lookup::KubeLookup,
    metrics::AdmissionMetrics,
    mutate::Mutator,
    validate::Validator,
    Config,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug, Parser)]
#[clap(name = "acl", about = "Compiles ACL rules into Envoy RBAC filters")]
pub struct Args {
    #[clap(long, default_value = "acl=info,warn", env = "ACL_CONTROLLER_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// CIDRs every shoot always allows, in addition to its own networks.
    #[clap(long, default_value = "", env = "ACL_ALLOWED_CIDRS")]
    allowed_cidrs: IpNets,

    /// The most CIDRs a single rule may list.
    #[clap(long, default_value = "50")]
    max_allowed_cidrs: usize,

    #[clap(long, default_value = "5000")]
    lookup_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            allowed_cidrs: IpNets(allowed_cidrs),
            max_allowed_cidrs,
            lookup_timeout_ms,
        } = self;

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        let config = Config {
            allowed_cidrs,
            max_allowed_cidrs,
            lookup_timeout: Duration::from_millis(lookup_timeout_ms),
        };

        let mut prom = <Registry>::default();
        let admission_metrics =
            AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        info!(
            allowed_cidrs = config.allowed_cidrs.len(),
            max_allowed_cidrs = config.max_allowed_cidrs,
            lookup_timeout = ?config.lookup_timeout,
            "Starting ACL admission controller"
        );

        let lookup = Arc::new(KubeLookup::new(runtime.client()));
        let admission = Admission::new(
            Mutator::new(lookup, &config),
            Validator::new(&config),
            admission_metrics,
        );
        let runtime = runtime.spawn_server(move || admission.clone());

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

/// A comma-separated list of CIDRs. The empty string is the empty list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct IpNets(Vec<IpNet>);

impl std::str::FromStr for IpNets {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| n.parse().map_err(Into::into))
            .collect::<Result<Vec<IpNet>>>()
            .map(Self)
    }
}
