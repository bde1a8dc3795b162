use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    Category, ComplaintId, ComplaintStatus, ComplaintSubmission, Principal, PrincipalId,
};
use super::report::{PageRequest, SortOrder};
use super::repository::{
    ComplaintFilters, ComplaintRepository, Directory, NotificationGateway, RepositoryError,
};
use super::service::{ComplaintService, ComplaintServiceError};

/// Header carrying the authenticated principal id. Session issuance lives
/// outside this service; the id is resolved against the directory.
pub const PRINCIPAL_HEADER: &str = "x-principal";

/// Router builder exposing the complaint lifecycle over HTTP.
pub fn complaint_router<R, N, D>(service: Arc<ComplaintService<R, N, D>>) -> Router
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    Router::new()
        .route(
            "/api/v1/complaints",
            post(submit_handler::<R, N, D>).get(list_handler::<R, N, D>),
        )
        .route("/api/v1/complaints/stats", get(stats_handler::<R, N, D>))
        .route(
            "/api/v1/complaints/category-distribution",
            get(distribution_handler::<R, N, D>),
        )
        .route("/api/v1/complaints/:id", get(get_handler::<R, N, D>))
        .route(
            "/api/v1/complaints/:id/assign",
            post(assign_handler::<R, N, D>),
        )
        .route(
            "/api/v1/complaints/:id/assign-staff",
            post(assign_staff_handler::<R, N, D>),
        )
        .route(
            "/api/v1/complaints/:id/resolve",
            post(resolve_handler::<R, N, D>),
        )
        .route(
            "/api/v1/complaints/:id/feedback",
            post(feedback_handler::<R, N, D>),
        )
        .route(
            "/api/v1/complaints/:id/finalize",
            post(finalize_handler::<R, N, D>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignRequest {
    pub(crate) agency_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignStaffRequest {
    pub(crate) staff_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResolveRequest {
    pub(crate) notes: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedbackRequest {
    pub(crate) rating: u8,
    #[serde(default)]
    pub(crate) comment: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FinalizeRequest {
    pub(crate) resolution: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    pub(crate) status: Option<ComplaintStatus>,
    pub(crate) category: Option<Category>,
    pub(crate) reporter: Option<String>,
    pub(crate) page: Option<usize>,
    pub(crate) limit: Option<usize>,
    pub(crate) sort: Option<SortOrder>,
}

impl ListQuery {
    fn filters(&self) -> ComplaintFilters {
        ComplaintFilters {
            reporter: self.reporter.clone().map(PrincipalId),
            assigned_staff: None,
            category: self.category,
            status: self.status,
        }
    }

    fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, self.sort)
    }
}

fn error_response(error: ComplaintServiceError) -> Response {
    let status = match &error {
        ComplaintServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ComplaintServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ComplaintServiceError::InvalidState(_) => StatusCode::CONFLICT,
        ComplaintServiceError::Forbidden => StatusCode::FORBIDDEN,
        ComplaintServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ComplaintServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

fn caller<R, N, D>(
    service: &ComplaintService<R, N, D>,
    headers: &HeaderMap,
) -> Result<Principal, Response>
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let raw = headers
        .get(PRINCIPAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let Some(id) = raw else {
        let payload = json!({ "error": "missing x-principal header" });
        return Err((StatusCode::FORBIDDEN, Json(payload)).into_response());
    };

    service
        .authenticate(&PrincipalId(id.to_string()))
        .map_err(error_response)
}

pub(crate) async fn submit_handler<R, N, D>(
    State(service): State<Arc<ComplaintService<R, N, D>>>,
    headers: HeaderMap,
    Json(submission): Json<ComplaintSubmission>,
) -> Response
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let principal = match caller(&service, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    match service.submit(&principal, submission) {
        Ok(complaint) => (StatusCode::CREATED, Json(complaint)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R, N, D>(
    State(service): State<Arc<ComplaintService<R, N, D>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let principal = match caller(&service, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    match service.list(&principal, query.filters(), query.page()) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn stats_handler<R, N, D>(
    State(service): State<Arc<ComplaintService<R, N, D>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let principal = match caller(&service, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    match service.stats(&principal, query.filters()) {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn distribution_handler<R, N, D>(
    State(service): State<Arc<ComplaintService<R, N, D>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let principal = match caller(&service, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    match service.category_distribution(&principal, query.filters()) {
        Ok(distribution) => (StatusCode::OK, Json(distribution)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_handler<R, N, D>(
    State(service): State<Arc<ComplaintService<R, N, D>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let principal = match caller(&service, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    match service.get(&ComplaintId(id), &principal) {
        Ok(complaint) => (StatusCode::OK, Json(complaint)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn assign_handler<R, N, D>(
    State(service): State<Arc<ComplaintService<R, N, D>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> Response
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let principal = match caller(&service, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    match service.assign_to_agency(
        &ComplaintId(id),
        &PrincipalId(request.agency_id),
        &principal,
    ) {
        Ok(complaint) => (StatusCode::OK, Json(complaint)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn assign_staff_handler<R, N, D>(
    State(service): State<Arc<ComplaintService<R, N, D>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<AssignStaffRequest>,
) -> Response
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let principal = match caller(&service, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    match service.assign_to_staff(&ComplaintId(id), &PrincipalId(request.staff_id), &principal) {
        Ok(complaint) => (StatusCode::OK, Json(complaint)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn resolve_handler<R, N, D>(
    State(service): State<Arc<ComplaintService<R, N, D>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Response
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let principal = match caller(&service, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    match service.resolve(&ComplaintId(id), &request.notes, &principal) {
        Ok(complaint) => (StatusCode::OK, Json(complaint)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn feedback_handler<R, N, D>(
    State(service): State<Arc<ComplaintService<R, N, D>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<FeedbackRequest>,
) -> Response
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let principal = match caller(&service, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    match service.submit_feedback(&ComplaintId(id), request.rating, &request.comment, &principal)
    {
        Ok(complaint) => (StatusCode::OK, Json(complaint)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn finalize_handler<R, N, D>(
    State(service): State<Arc<ComplaintService<R, N, D>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<FinalizeRequest>,
) -> Response
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    let principal = match caller(&service, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    match service.finalize(&ComplaintId(id), &request.resolution, &principal) {
        Ok(complaint) => (StatusCode::OK, Json(complaint)).into_response(),
        Err(error) => error_response(error),
    }
}
