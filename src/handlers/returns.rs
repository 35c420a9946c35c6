use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::{
    auth::Actor,
    errors::ServiceError,
    services::returns::{CreateReturnRequest, ReturnResponse},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

#[utoipa::path(
    post,
    path = "/api/v1/returns",
    summary = "Open return",
    description = "Opens a return against a COD record, restores stock, and closes the record",
    request_body = CreateReturnRequest,
    responses(
        (status = 201, description = "Return opened", body = ApiResponse<ReturnResponse>),
        (status = 400, description = "Empty or invalid item list", body = crate::errors::ErrorResponse),
        (status = 404, description = "Record not found or not visible", body = crate::errors::ErrorResponse),
        (status = 409, description = "Record not eligible for return", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_return(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateReturnRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReturnResponse>>), ServiceError> {
    let ret = state.services.returns.create_return(actor, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(ret))))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/{id}/approve",
    summary = "Approve return",
    params(("id" = Uuid, Path, description = "Return ID")),
    responses(
        (status = 200, description = "Return approved", body = ApiResponse<ReturnResponse>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Return is not pending", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn approve_return(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    let ret = state.services.returns.approve_return(actor, id).await?;
    Ok(Json(ApiResponse::success(ret)))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/{id}/complete",
    summary = "Complete return",
    description = "Completes a return; completed returns accept no further mutation",
    params(("id" = Uuid, Path, description = "Return ID")),
    responses(
        (status = 200, description = "Return completed", body = ApiResponse<ReturnResponse>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Return already completed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn complete_return(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    let ret = state.services.returns.complete_return(actor, id).await?;
    Ok(Json(ApiResponse::success(ret)))
}

#[utoipa::path(
    get,
    path = "/api/v1/returns/{id}",
    summary = "Get return",
    params(("id" = Uuid, Path, description = "Return ID")),
    responses(
        (status = 200, description = "Return retrieved", body = ApiResponse<ReturnResponse>),
        (status = 404, description = "Return not found or not visible", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_return(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    let ret = state.services.returns.get_return(actor, id).await?;
    Ok(Json(ApiResponse::success(ret)))
}

#[utoipa::path(
    get,
    path = "/api/v1/returns",
    summary = "List returns",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
    ),
    responses(
        (status = 200, description = "Returns retrieved", body = ApiResponse<PaginatedResponse<ReturnResponse>>),
        (status = 403, description = "Staff role required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_returns(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<ReturnResponse>> {
    let (returns, total) = state
        .services
        .returns
        .list_returns(actor, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        returns,
        total,
        query.page,
        query.limit,
    ))))
}
