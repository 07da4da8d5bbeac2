use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::patient;
use crate::services::patients::{
    CreatePatientRequest, PatientListResponse, UpdatePatientRequest,
};
use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState, ListQuery};

#[derive(Debug, Deserialize)]
pub struct PatientQuery {
    pub ward: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/patients",
    summary = "List patients",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("search" = Option<String>, Query, description = "Match against patient name"),
        ("ward" = Option<String>, Query, description = "Filter by ward"),
    ),
    responses(
        (status = 200, description = "Patients retrieved", body = ApiResponse<PatientListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(patient_query): Query<PatientQuery>,
) -> Result<Json<ApiResponse<PatientListResponse>>, ServiceError> {
    let result = state
        .services
        .patients
        .list_patients(query.search.clone(), patient_query.ward, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/patients",
    summary = "Register a patient",
    request_body = CreatePatientRequest,
    responses(
        (status = 201, description = "Patient registered", body = ApiResponse<patient::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_patient(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<ApiResponse<patient::Model>>), ServiceError> {
    let patient = state.services.patients.create_patient(request).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "patient.create",
            "patient",
            Some(patient.id.to_string()),
            None,
        )
        .await;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(patient))))
}

#[utoipa::path(
    get,
    path = "/api/v1/patients/{id}",
    summary = "Get a patient",
    params(("id" = Uuid, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient found", body = ApiResponse<patient::Model>),
        (status = 404, description = "Patient not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<patient::Model>>, ServiceError> {
    let patient = state.services.patients.get_patient(id).await?;
    Ok(Json(ApiResponse::success(patient)))
}

#[utoipa::path(
    put,
    path = "/api/v1/patients/{id}",
    summary = "Update a patient",
    params(("id" = Uuid, Path, description = "Patient ID")),
    request_body = UpdatePatientRequest,
    responses(
        (status = 200, description = "Patient updated", body = ApiResponse<patient::Model>),
        (status = 404, description = "Patient not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_patient(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<ApiResponse<patient::Model>>, ServiceError> {
    let patient = state.services.patients.update_patient(id, request).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "patient.update",
            "patient",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(patient)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/patients/{id}",
    summary = "Delete a patient",
    params(("id" = Uuid, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient deleted"),
        (status = 409, description = "Patient has order history", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_patient(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.patients.delete_patient(id).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "patient.delete",
            "patient",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(())))
}
