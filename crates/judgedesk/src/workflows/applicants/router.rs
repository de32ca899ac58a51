use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::admin::{AdminError, AdminGateway, RoleProvider};
use super::domain::ApplicationId;
use super::repository::{ApplicationRepository, AuditTrail, NotificationGateway};
use super::service::{ApplicationLifecycle, LifecycleError};

/// Router builder exposing the self-service lifecycle endpoints.
pub fn application_router<R, T, N>(lifecycle: Arc<ApplicationLifecycle<R, T, N>>) -> Router
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
{
    Router::new()
        .route("/api/v1/applications", post(submit_handler::<R, T, N>))
        .route(
            "/api/v1/applications/verify",
            post(verify_handler::<R, T, N>),
        )
        .route(
            "/api/v1/applications/:email/verification",
            get(check_verification_handler::<R, T, N>),
        )
        .route(
            "/api/v1/applications/signup-link",
            post(signup_link_handler::<R, T, N>),
        )
        .route(
            "/api/v1/applications/:email/history",
            get(history_handler::<R, T, N>),
        )
        .with_state(lifecycle)
}

/// Router builder for the operator-facing decision endpoints.
pub fn admin_router<R, T, N, P>(gateway: Arc<AdminGateway<R, T, N, P>>) -> Router
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
    P: RoleProvider + 'static,
{
    Router::new()
        .route(
            "/api/v1/admin/applications/:application_id/approve",
            post(approve_handler::<R, T, N, P>),
        )
        .route(
            "/api/v1/admin/applications/:application_id/decline",
            post(decline_handler::<R, T, N, P>),
        )
        .with_state(gateway)
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyRequest {
    pub(crate) email: String,
    pub(crate) token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignupLinkRequest {
    pub(crate) email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    pub(crate) actor: String,
    #[serde(default)]
    pub(crate) notes: Option<String>,
}

pub(crate) async fn submit_handler<R, T, N>(
    State(lifecycle): State<Arc<ApplicationLifecycle<R, T, N>>>,
    axum::Json(submission): axum::Json<super::domain::ApplicationSubmission>,
) -> Response
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
{
    match lifecycle.submit(submission) {
        Ok(record) => {
            let payload = json!({
                "id": record.id,
                "email": record.email,
                "status": record.status,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn verify_handler<R, T, N>(
    State(lifecycle): State<Arc<ApplicationLifecycle<R, T, N>>>,
    axum::Json(request): axum::Json<VerifyRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
{
    match lifecycle.verify_email(&request.email, &request.token) {
        Ok(record) => {
            let payload = json!({
                "status": record.status,
                "verified": record.verified,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn check_verification_handler<R, T, N>(
    State(lifecycle): State<Arc<ApplicationLifecycle<R, T, N>>>,
    Path(email): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
{
    match lifecycle.check_verification(&email) {
        Ok(status) => (StatusCode::OK, axum::Json(status)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn signup_link_handler<R, T, N>(
    State(lifecycle): State<Arc<ApplicationLifecycle<R, T, N>>>,
    axum::Json(request): axum::Json<SignupLinkRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
{
    match lifecycle.issue_signup_link(&request.email) {
        Ok(link) => (StatusCode::OK, axum::Json(link)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn history_handler<R, T, N>(
    State(lifecycle): State<Arc<ApplicationLifecycle<R, T, N>>>,
    Path(email): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
{
    match lifecycle.audit_history(&email) {
        Ok(history) => (StatusCode::OK, axum::Json(history)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn approve_handler<R, T, N, P>(
    State(gateway): State<Arc<AdminGateway<R, T, N, P>>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
    P: RoleProvider + 'static,
{
    let id = ApplicationId(application_id);
    match gateway.approve(&id, &request.actor, request.notes) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => admin_error_response(error),
    }
}

pub(crate) async fn decline_handler<R, T, N, P>(
    State(gateway): State<Arc<AdminGateway<R, T, N, P>>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
    P: RoleProvider + 'static,
{
    let id = ApplicationId(application_id);
    match gateway.decline(&id, &request.actor, request.notes) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => admin_error_response(error),
    }
}

fn lifecycle_error_response(error: LifecycleError) -> Response {
    let status = match &error {
        LifecycleError::MissingField(_) | LifecycleError::InvalidEmail => StatusCode::BAD_REQUEST,
        LifecycleError::DuplicateApplicant
        | LifecycleError::AlreadyVerified
        | LifecycleError::InvalidTransition { .. }
        | LifecycleError::Conflict => StatusCode::CONFLICT,
        LifecycleError::NotFound => StatusCode::NOT_FOUND,
        LifecycleError::TokenExpired => StatusCode::GONE,
        LifecycleError::Repository(_) | LifecycleError::Audit(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    // Storage outages stay opaque to callers.
    let payload = if status == StatusCode::INTERNAL_SERVER_ERROR {
        json!({ "error": "service unavailable" })
    } else {
        json!({ "error": error.to_string() })
    };
    (status, axum::Json(payload)).into_response()
}

fn admin_error_response(error: AdminError) -> Response {
    match error {
        AdminError::Unauthorized => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
        }
        AdminError::Lifecycle(inner) => lifecycle_error_response(inner),
    }
}
