use crate::{
    k8s::{EnvoyFilter, Extension, Resource},
    metrics::{AdmissionMetrics, Outcome},
    mutate::Mutator,
    validate::Validator,
};
use anyhow::{anyhow, Result};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[derive(Clone)]
pub struct Admission {
    mutator: Mutator,
    validator: Validator,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

/// A denied admission request, carrying the HTTP-style status code reported
/// back to the API server.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Rejection {
    pub code: u16,
    pub message: String,
}

type Review = kube::core::admission::AdmissionReview<DynamicObject>;
pub(crate) type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

// === impl AdmissionService ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            use bytes::Buf;
            let bytes = req.into_body().collect().await?.to_bytes();
            let review: Review = match serde_json::from_reader(bytes.reader()) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, "Failed to parse request body");
                    return json_response(AdmissionResponse::invalid(error).into_review());
                }
            };
            trace!(?review);

            let rsp = match review.try_into() {
                Ok(req) => {
                    debug!(?req);
                    admission.admit(req).await
                }
                Err(error) => {
                    warn!(%error, "Invalid admission request");
                    AdmissionResponse::invalid(error)
                }
            };
            debug!(?rsp);
            json_response(rsp.into_review())
        })
    }
}

impl Admission {
    pub fn new(mutator: Mutator, validator: Validator, metrics: AdmissionMetrics) -> Self {
        Self {
            mutator,
            validator,
            metrics,
        }
    }

    async fn admit(self, req: AdmissionRequest) -> AdmissionResponse {
        if is_kind::<EnvoyFilter>(&req) {
            return self.admit_envoy_filter(req).await;
        }

        if is_kind::<Extension>(&req) {
            return self.admit_extension(req);
        }

        AdmissionResponse::invalid(format_args!(
            "unsupported resource type: {}.{}.{}",
            req.kind.group, req.kind.version, req.kind.kind
        ))
    }

    async fn admit_envoy_filter(self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);
        let kind = req.kind.kind.as_str();
        let ns = req.namespace.as_deref().unwrap_or_default();
        let name = req.name.as_str();

        let patch = match self.mutator.mutate(&req).await {
            Ok(Some(patch)) => patch,
            Ok(None) => {
                debug!(%ns, %name, %kind, "Allowed without changes");
                self.metrics.observe(kind, Outcome::Allowed);
                return rsp;
            }
            Err(rejection) => {
                info!(error = %rejection, code = rejection.code, %ns, %name, %kind, "Denied");
                self.metrics.observe(kind, Outcome::Denied);
                return rejection.deny(rsp);
            }
        };

        match rsp.with_patch(patch) {
            Ok(rsp) => {
                info!(%ns, %name, %kind, "Patched");
                self.metrics.observe(kind, Outcome::Patched);
                rsp
            }
            Err(error) => {
                warn!(%error, %ns, %name, %kind, "Failed to serialize patch");
                self.metrics.observe(kind, Outcome::Denied);
                Rejection::internal(error).deny(AdmissionResponse::from(&req))
            }
        }
    }

    fn admit_extension(self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);
        let kind = req.kind.kind.as_str();
        let ns = req.namespace.as_deref().unwrap_or_default();
        let name = req.name.as_str();

        if let Err(rejection) = self.validator.validate(&req) {
            info!(error = %rejection, %ns, %name, %kind, "Denied");
            self.metrics.observe(kind, Outcome::Denied);
            return rejection.deny(rsp);
        }

        self.metrics.observe(kind, Outcome::Allowed);
        rsp
    }
}

fn is_kind<T>(req: &AdmissionRequest) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    req.kind.group.eq_ignore_ascii_case(&T::group(&dt))
        && req.kind.kind.eq_ignore_ascii_case(&T::kind(&dt))
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}

pub(crate) fn parse_spec<T: DeserializeOwned>(req: &AdmissionRequest) -> Result<(&DynamicObject, T)> {
    let obj = req
        .object
        .as_ref()
        .ok_or_else(|| anyhow!("admission request missing 'object'"))?;

    let spec = {
        let data = obj
            .data
            .get("spec")
            .cloned()
            .ok_or_else(|| anyhow!("admission request missing 'spec'"))?;
        serde_json::from_value(data)?
    };

    Ok((obj, spec))
}

// === impl Rejection ===

impl Rejection {
    /// The object is malformed or violates a rule; resubmitting it unchanged
    /// will fail again.
    pub fn invalid(error: impl fmt::Display) -> Self {
        Self {
            code: 400,
            message: format!("{error:#}"),
        }
    }

    /// Something the object depends on could not be read or interpreted.
    pub fn internal(error: impl fmt::Display) -> Self {
        Self {
            code: 500,
            message: format!("{error:#}"),
        }
    }

    fn deny(self, rsp: AdmissionResponse) -> AdmissionResponse {
        let mut rsp = rsp.deny(self.message);
        rsp.result.code = self.code;
        rsp
    }
}
