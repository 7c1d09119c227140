use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::employees::{
    CreateEmployeeRequest, EmployeeResponse, UpdateEmployeeRequest,
};
use crate::services::workload::WorkloadSummary;
use crate::{errors::ServiceError, ApiResponse, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub include_inactive: bool,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

/// List engineers in roster order
#[utoipa::path(
    get,
    path = "/api/v1/employees",
    summary = "List employees",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("include_inactive" = Option<bool>, Query, description = "Include deactivated engineers"),
    ),
    responses(
        (status = 200, description = "Employees retrieved successfully", body = ApiResponse<PaginatedResponse<EmployeeResponse>>),
    ),
    tag = "Employees"
)]
pub async fn list_employees(
    State(state): State<AppState>,
    Query(query): Query<EmployeeListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<EmployeeResponse>>>, ServiceError> {
    let result = state
        .services
        .employees
        .list_employees(query.page, query.limit, query.include_inactive)
        .await?;

    let total_pages = result.total.div_ceil(result.per_page);
    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: result.employees,
        total: result.total,
        page: result.page,
        limit: result.per_page,
        total_pages,
    })))
}

/// Register a new engineer
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    summary = "Create employee",
    request_body = CreateEmployeeRequest,
    responses(
        (status = 201, description = "Employee created", body = ApiResponse<EmployeeResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Employee code already in use", body = crate::errors::ErrorResponse),
    ),
    tag = "Employees"
)]
pub async fn create_employee(
    State(state): State<AppState>,
    Json(request): Json<CreateEmployeeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EmployeeResponse>>), ServiceError> {
    let created = state.services.employees.create_employee(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Get an engineer by id
#[utoipa::path(
    get,
    path = "/api/v1/employees/{id}",
    summary = "Get employee",
    params(("id" = Uuid, Path, description = "Employee UUID")),
    responses(
        (status = 200, description = "Employee retrieved", body = ApiResponse<EmployeeResponse>),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Employees"
)]
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EmployeeResponse>>, ServiceError> {
    let employee = state
        .services
        .employees
        .get_employee(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Employee {} not found", id)))?;
    Ok(Json(ApiResponse::success(employee)))
}

/// Update an engineer's directory details
#[utoipa::path(
    put,
    path = "/api/v1/employees/{id}",
    summary = "Update employee",
    params(("id" = Uuid, Path, description = "Employee UUID")),
    request_body = UpdateEmployeeRequest,
    responses(
        (status = 200, description = "Employee updated", body = ApiResponse<EmployeeResponse>),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Employees"
)]
pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEmployeeRequest>,
) -> Result<Json<ApiResponse<EmployeeResponse>>, ServiceError> {
    let updated = state.services.employees.update_employee(id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Soft-deactivate an engineer (history stays resolvable)
#[utoipa::path(
    post,
    path = "/api/v1/employees/{id}/deactivate",
    summary = "Deactivate employee",
    params(("id" = Uuid, Path, description = "Employee UUID")),
    responses(
        (status = 200, description = "Employee deactivated", body = ApiResponse<EmployeeResponse>),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Employees"
)]
pub async fn deactivate_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EmployeeResponse>>, ServiceError> {
    let updated = state.services.employees.deactivate_employee(id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Reactivate a previously deactivated engineer
#[utoipa::path(
    post,
    path = "/api/v1/employees/{id}/activate",
    summary = "Activate employee",
    params(("id" = Uuid, Path, description = "Employee UUID")),
    responses(
        (status = 200, description = "Employee reactivated", body = ApiResponse<EmployeeResponse>),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Employees"
)]
pub async fn activate_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EmployeeResponse>>, ServiceError> {
    let updated = state.services.employees.activate_employee(id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Workload statistics for the active roster
#[utoipa::path(
    get,
    path = "/api/v1/employees/workload",
    summary = "Engineer workload statistics",
    responses(
        (status = 200, description = "Workload summary", body = ApiResponse<WorkloadSummary>),
    ),
    tag = "Employees"
)]
pub async fn workload_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<WorkloadSummary>>, ServiceError> {
    let summary = state.services.workload.engineer_workload_stats().await?;
    Ok(Json(ApiResponse::success(summary)))
}
