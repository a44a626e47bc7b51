use std::net::SocketAddr;

use axum::{Json, Router, routing::post};
use axum_server::tls_rustls::RustlsConfig;
use kube::ResourceExt;
use kube::api::DynamicObject;
use kube::core::admission::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, Operation,
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use serde_json::json;
use tracing::{debug, error, info};

use super::validate_app;
use crate::crd::AppSpec;

/// Path the `ValidatingWebhookConfiguration` points at.
pub const VALIDATE_PATH: &str = "/validate-aloys-tech-v1-app";

/// Path the `MutatingWebhookConfiguration` points at.
pub const MUTATE_PATH: &str = "/mutate-aloys-tech-v1-app";

/// Annotation stamped on every admitted App.
pub const DEFAULTED_ANNOTATION: (&str, &str) = ("aloys", "aloys");

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("failed to load webhook certificate: {0}")]
    Tls(String),

    #[error("webhook server error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn router() -> Router {
    Router::new()
        .route(VALIDATE_PATH, post(validate_handler))
        .route(MUTATE_PATH, post(mutate_handler))
        .layer(TraceLayer::new_for_http())
}

/// Handle a validating admission review for Apps.
pub async fn validate_handler(
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };
    Json(review(&req).into_review())
}

fn review(req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let response = AdmissionResponse::from(req);
    if matches!(req.operation, Operation::Delete) {
        return response;
    }
    let Some(obj) = &req.object else {
        debug!(uid = %req.uid, "no object in request; allowing");
        return response;
    };
    let spec = match obj
        .data
        .get("spec")
        .cloned()
        .map(serde_json::from_value::<AppSpec>)
    {
        Some(Ok(spec)) => spec,
        Some(Err(e)) => return response.deny(format!("malformed App spec: {e}")),
        None => return response.deny("App has no spec"),
    };
    match validate_app(&spec) {
        Ok(()) => response,
        Err(e) => {
            info!(
                uid = %req.uid,
                name = %req.name,
                operation = ?req.operation,
                reason = %e,
                "denying App"
            );
            response.deny(e.to_string())
        }
    }
}

/// Handle a mutating admission review for Apps.
pub async fn mutate_handler(
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };
    Json(defaulting(&req).into_review())
}

fn defaulting(req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let response = AdmissionResponse::from(req);
    if matches!(req.operation, Operation::Delete) {
        return response;
    }
    let Some(patch) = req.object.as_ref().and_then(defaulting_patch) else {
        return response;
    };
    match response.with_patch(patch) {
        Ok(patched) => {
            debug!(uid = %req.uid, name = %req.name, "defaulting App");
            patched
        }
        Err(e) => {
            error!(uid = %req.uid, error = %e, "failed to serialize patch");
            AdmissionResponse::from(req)
                .deny(format!("patch serialization error: {e}"))
        }
    }
}

/// JSON patch that stamps [`DEFAULTED_ANNOTATION`]; `None` when already set.
fn defaulting_patch(obj: &DynamicObject) -> Option<json_patch::Patch> {
    let (key, value) = DEFAULTED_ANNOTATION;
    if obj.annotations().get(key).map(String::as_str) == Some(value) {
        return None;
    }
    let op = if obj.metadata.annotations.is_some() {
        json!({"op": "add", "path": format!("/metadata/annotations/{key}"), "value": value})
    } else {
        json!({"op": "add", "path": "/metadata/annotations", "value": {key: value}})
    };
    serde_json::from_value(json!([op])).ok()
}

/// Serves the webhook over TLS until `shutdown` fires.
pub async fn serve(
    addr: SocketAddr,
    tls: RustlsConfig,
    shutdown: CancellationToken,
) -> Result<(), WebhookError> {
    info!(
        %addr,
        validate = VALIDATE_PATH,
        mutate = MUTATE_PATH,
        "admission webhook listening"
    );
    crate::web::serve_tls(addr, router(), tls, shutdown).await?;
    Ok(())
}
