use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Actor,
    entities::delivery_attempt::AttemptStatus,
    errors::ServiceError,
    services::cod::{CodRecordResponse, CodStatistics, CodStatisticsFilter},
    services::delivery::DeliveryAttemptResponse,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CollectPaymentRequest {
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignStaffRequest {
    pub cod_record_ids: Vec<Uuid>,
    pub staff_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDeliveryStatusRequest {
    pub status: String,
    pub notes: Option<String>,
}

fn parse_attempt_status(raw: &str) -> Result<AttemptStatus, ServiceError> {
    AttemptStatus::from_str(&raw.to_ascii_lowercase())
        .map_err(|_| ServiceError::InvalidStatus(format!("Unknown delivery status: {raw}")))
}

#[utoipa::path(
    post,
    path = "/api/v1/cod/{id}/collect",
    summary = "Collect COD payment",
    description = "Records a cash collection; the amount must equal the order total exactly",
    params(("id" = Uuid, Path, description = "COD record ID")),
    request_body = CollectPaymentRequest,
    responses(
        (status = 200, description = "Payment collected", body = ApiResponse<CodRecordResponse>),
        (status = 403, description = "Not the assigned staff member", body = crate::errors::ErrorResponse),
        (status = 409, description = "Record is closed", body = crate::errors::ErrorResponse),
        (status = 422, description = "Amount does not reconcile", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn collect_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<CollectPaymentRequest>,
) -> ApiResult<CodRecordResponse> {
    let record = state
        .services
        .cod
        .record_payment(actor, id, request.amount, request.notes)
        .await?;
    Ok(Json(ApiResponse::success(record)))
}

#[utoipa::path(
    get,
    path = "/api/v1/cod/{id}",
    summary = "Get COD record",
    params(("id" = Uuid, Path, description = "COD record ID")),
    responses(
        (status = 200, description = "Record retrieved", body = ApiResponse<CodRecordResponse>),
        (status = 404, description = "Record not found or not visible", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_record(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<CodRecordResponse> {
    let record = state.services.cod.get_record(actor, id).await?;
    Ok(Json(ApiResponse::success(record)))
}

#[utoipa::path(
    get,
    path = "/api/v1/cod/statistics",
    summary = "COD statistics",
    description = "Aggregate workflow counts, optionally filtered by assigned staff",
    params(("staff_id" = Option<Uuid>, Query, description = "Filter by assigned staff member")),
    responses(
        (status = 200, description = "Statistics computed", body = ApiResponse<CodStatistics>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_statistics(
    State(state): State<AppState>,
    actor: Actor,
    Query(filter): Query<CodStatisticsFilter>,
) -> ApiResult<CodStatistics> {
    let stats = state.services.cod.get_statistics(actor, filter).await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[utoipa::path(
    post,
    path = "/api/v1/cod/assign",
    summary = "Assign delivery staff",
    description = "Assigns one delivery staff member to a batch of COD records, all-or-nothing",
    request_body = AssignStaffRequest,
    responses(
        (status = 200, description = "Staff assigned", body = ApiResponse<Vec<DeliveryAttemptResponse>>),
        (status = 400, description = "Staff member unknown or not a delivery role", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "A record in the batch is closed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn assign_staff(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<AssignStaffRequest>,
) -> ApiResult<Vec<DeliveryAttemptResponse>> {
    let attempts = state
        .services
        .delivery
        .assign_staff(actor, request.cod_record_ids, request.staff_id)
        .await?;
    Ok(Json(ApiResponse::success(attempts)))
}

#[utoipa::path(
    put,
    path = "/api/v1/cod/{id}/status",
    summary = "Update delivery status",
    description = "Appends a delivery attempt; a delivered attempt also marks the order delivered",
    params(("id" = Uuid, Path, description = "COD record ID")),
    request_body = UpdateDeliveryStatusRequest,
    responses(
        (status = 200, description = "Attempt recorded", body = ApiResponse<DeliveryAttemptResponse>),
        (status = 403, description = "Not the assigned staff member", body = crate::errors::ErrorResponse),
        (status = 409, description = "Unknown status or record closed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_delivery_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDeliveryStatusRequest>,
) -> ApiResult<DeliveryAttemptResponse> {
    let status = parse_attempt_status(&request.status)?;
    let attempt = state
        .services
        .delivery
        .update_delivery_status(actor, id, status, request.notes)
        .await?;
    Ok(Json(ApiResponse::success(attempt)))
}

#[utoipa::path(
    get,
    path = "/api/v1/cod/{id}/attempts",
    summary = "List delivery attempts",
    description = "The append-only attempt audit trail, ordered by attempt number",
    params(("id" = Uuid, Path, description = "COD record ID")),
    responses(
        (status = 200, description = "Attempts retrieved", body = ApiResponse<Vec<DeliveryAttemptResponse>>),
        (status = 404, description = "Record not found or not visible", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_attempts(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<DeliveryAttemptResponse>> {
    let attempts = state.services.delivery.list_attempts(actor, id).await?;
    Ok(Json(ApiResponse::success(attempts)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_status_parses_snake_case() {
        assert_eq!(
            parse_attempt_status("out_for_delivery").unwrap(),
            AttemptStatus::OutForDelivery
        );
        assert_eq!(
            parse_attempt_status("Failed").unwrap(),
            AttemptStatus::Failed
        );
    }

    #[test]
    fn arbitrary_status_is_rejected() {
        assert!(matches!(
            parse_attempt_status("lost_in_transit"),
            Err(ServiceError::InvalidStatus(_))
        ));
    }
}
