use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    AllocationError, ApplicationFilter, ApplicationId, ApplicationRequest, ApplicationStatus,
    PaymentStatus, Principal, RentalFilter, RentalId, RentalStatus, ReviewDecision, Role,
    StallId, UserId,
};
use super::service::AllocationService;
use super::store::MarketStore;

pub(crate) const USER_ID_HEADER: &str = "x-user-id";
pub(crate) const USER_ROLE_HEADER: &str = "x-user-role";

/// Router exposing the allocation workflows over HTTP.
///
/// The caller's identity arrives in `x-user-id` / `x-user-role`, set by the authentication
/// proxy in front of the service.
pub fn allocation_router<S>(service: Arc<AllocationService<S>>) -> Router
where
    S: MarketStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            get(list_applications_handler::<S>).post(submit_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<S>).delete(cancel_handler::<S>),
        )
        .route(
            "/api/v1/admin/applications/:application_id/review",
            put(review_handler::<S>),
        )
        .route("/api/v1/rentals", get(list_rentals_handler::<S>))
        .route("/api/v1/rentals/:rental_id", get(rental_handler::<S>))
        .route(
            "/api/v1/admin/rentals/:rental_id/payment",
            put(payment_handler::<S>),
        )
        .route(
            "/api/v1/admin/rentals/:rental_id/terminate",
            put(terminate_handler::<S>),
        )
        .route("/api/v1/stalls/available", get(available_stalls_handler::<S>))
        .route("/api/v1/stalls/:stall_id", get(stall_handler::<S>))
        .with_state(service)
}

impl IntoResponse for AllocationError {
    fn into_response(self) -> Response {
        let status = match self {
            AllocationError::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AllocationError::InvalidState { .. } | AllocationError::Conflict { .. } => {
                StatusCode::CONFLICT
            }
            AllocationError::NotFound { .. } => StatusCode::NOT_FOUND,
            AllocationError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let payload = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (status, Json(payload)).into_response()
    }
}

/// Rejections raised before a request reaches the service.
#[derive(Debug)]
pub(crate) enum AccessError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AccessError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", message)
            }
            AccessError::Forbidden(message) => (StatusCode::FORBIDDEN, "forbidden", message),
        };
        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

pub(crate) fn principal(headers: &HeaderMap) -> Result<Principal, AccessError> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .ok_or(AccessError::Unauthorized("missing or malformed x-user-id header"))?;
    let role = match headers.get(USER_ROLE_HEADER) {
        None => Role::User,
        Some(value) => value
            .to_str()
            .ok()
            .and_then(Role::parse)
            .ok_or(AccessError::Unauthorized("unrecognized x-user-role header"))?,
    };
    Ok(Principal {
        user_id: UserId(user_id),
        role,
    })
}

fn admin(headers: &HeaderMap) -> Result<Principal, AccessError> {
    let principal = principal(headers)?;
    if !principal.is_admin() {
        return Err(AccessError::Forbidden("administrator role required"));
    }
    Ok(principal)
}

macro_rules! try_access {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(rejection) => return rejection.into_response(),
        }
    };
}

pub(crate) async fn submit_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    headers: HeaderMap,
    Json(request): Json<ApplicationRequest>,
) -> Response
where
    S: MarketStore + 'static,
{
    let caller = try_access!(principal(&headers));
    match service.submit(caller.user_id, request) {
        Ok(application) => (StatusCode::CREATED, Json(application)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApplicationQuery {
    #[serde(default)]
    requester_id: Option<UserId>,
    #[serde(default)]
    stall_id: Option<StallId>,
    #[serde(default)]
    status: Option<ApplicationStatus>,
}

pub(crate) async fn list_applications_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    headers: HeaderMap,
    Query(query): Query<ApplicationQuery>,
) -> Response
where
    S: MarketStore + 'static,
{
    let caller = try_access!(principal(&headers));
    // Non-administrators only ever see their own applications.
    let requester_id = if caller.is_admin() {
        query.requester_id
    } else {
        Some(caller.user_id)
    };
    let filter = ApplicationFilter {
        requester_id,
        stall_id: query.stall_id,
        status: query.status,
    };
    match service.applications(&filter) {
        Ok(applications) => (StatusCode::OK, Json(applications)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn application_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
) -> Response
where
    S: MarketStore + 'static,
{
    let caller = try_access!(principal(&headers));
    match service.application(ApplicationId(application_id)) {
        Ok(application) if caller.is_admin() || application.requester == caller.user_id => {
            (StatusCode::OK, Json(application)).into_response()
        }
        Ok(_) => AccessError::Forbidden("application belongs to another requester").into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn cancel_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
) -> Response
where
    S: MarketStore + 'static,
{
    let caller = try_access!(principal(&headers));
    let application_id = ApplicationId(application_id);
    match service.cancel(application_id, caller.user_id) {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({ "application_id": application_id, "status": "cancelled" })),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "application is not pending or belongs to another requester",
                "kind": "not_cancellable",
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewRequest {
    decision: ReviewDecision,
    #[serde(default)]
    opinion: Option<String>,
}

pub(crate) async fn review_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
    Json(request): Json<ReviewRequest>,
) -> Response
where
    S: MarketStore + 'static,
{
    let reviewer = try_access!(admin(&headers));
    match service.review(
        ApplicationId(application_id),
        request.decision,
        request.opinion,
        reviewer.user_id,
    ) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RentalQuery {
    #[serde(default)]
    requester_id: Option<UserId>,
    #[serde(default)]
    stall_id: Option<StallId>,
    #[serde(default)]
    status: Option<RentalStatus>,
}

pub(crate) async fn list_rentals_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    headers: HeaderMap,
    Query(query): Query<RentalQuery>,
) -> Response
where
    S: MarketStore + 'static,
{
    let caller = try_access!(principal(&headers));
    let requester_id = if caller.is_admin() {
        query.requester_id
    } else {
        Some(caller.user_id)
    };
    let filter = RentalFilter {
        requester_id,
        stall_id: query.stall_id,
        status: query.status,
    };
    match service.rentals(&filter) {
        Ok(rentals) => (StatusCode::OK, Json(rentals)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn rental_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    headers: HeaderMap,
    Path(rental_id): Path<u64>,
) -> Response
where
    S: MarketStore + 'static,
{
    let caller = try_access!(principal(&headers));
    match service.rental(RentalId(rental_id)) {
        Ok(rental) if caller.is_admin() || rental.requester == caller.user_id => {
            (StatusCode::OK, Json(rental)).into_response()
        }
        Ok(_) => AccessError::Forbidden("rental belongs to another requester").into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentRequest {
    payment_status: PaymentStatus,
}

pub(crate) async fn payment_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    headers: HeaderMap,
    Path(rental_id): Path<u64>,
    Json(request): Json<PaymentRequest>,
) -> Response
where
    S: MarketStore + 'static,
{
    try_access!(admin(&headers));
    match service.set_payment_status(RentalId(rental_id), request.payment_status) {
        Ok(rental) => (StatusCode::OK, Json(rental)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn terminate_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    headers: HeaderMap,
    Path(rental_id): Path<u64>,
) -> Response
where
    S: MarketStore + 'static,
{
    try_access!(admin(&headers));
    match service.terminate(RentalId(rental_id)) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn available_stalls_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
) -> Response
where
    S: MarketStore + 'static,
{
    match service.available_stalls() {
        Ok(stalls) => (StatusCode::OK, Json(stalls)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn stall_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    Path(stall_id): Path<u64>,
) -> Response
where
    S: MarketStore + 'static,
{
    match service.stall(StallId(stall_id)) {
        Ok(stall) => (StatusCode::OK, Json(stall)).into_response(),
        Err(err) => err.into_response(),
    }
}
