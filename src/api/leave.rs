//! Leave Routes
//!
//! Leave policy, requests and balances for the tenant the host resolved to.
//! Every handler works against the tenant database from [`TenantContext`].
//!
//! Routes:
//! - GET/POST /api/leave/types - Leave types
//! - GET/PUT /api/leave/working-days - Weekly working-day table
//! - GET/POST /api/leave/holidays - Holiday calendar
//! - DELETE /api/leave/holidays/:id - Remove a holiday
//! - POST/DELETE /api/leave/holidays/:id/opt-in - Optional holiday opt-in
//! - POST /api/leave/preview - Day count for a prospective request
//! - GET/POST /api/leave/requests - List or file requests
//! - GET /api/leave/requests/:id - Request with its partial cancellations
//! - POST /api/leave/requests/:id/{approve,reject,cancel,partial-cancel}
//! - GET /api/leave/balances - Balances
//! - POST /api/leave/balances/adjust - Manual adjustment (admin/hr)
//! - POST /api/leave/balances/carry-forward - Year-end carry forward (admin/hr)

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Datelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::extract::ApiJson;
use crate::db::{Holiday, LeaveRequest, LeaveType};
use crate::middleware::{TenantContext, TenantUser};
use crate::models::LeaveStatus;
use crate::services::leave::{
    AdjustmentOutcome, BalanceAdjustment, BalanceView, CarryForwardSummary, LeaveApplication, LeavePreview,
    LeaveRequestDetail, NewHoliday, NewLeaveType, PartialCancellation,
};
use crate::services::{LeaveService, WorkWeek};
use crate::{AppState, Error, Result};

/// Build leave routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/types", get(list_types).post(create_type))
        .route("/working-days", get(get_working_days).put(set_working_days))
        .route("/holidays", get(list_holidays).post(create_holiday))
        .route("/holidays/:id", axum::routing::delete(delete_holiday))
        .route("/holidays/:id/opt-in", post(opt_in).delete(opt_out))
        .route("/preview", post(preview))
        .route("/requests", get(list_requests).post(apply))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/approve", post(approve))
        .route("/requests/:id/reject", post(reject))
        .route("/requests/:id/cancel", post(cancel))
        .route("/requests/:id/partial-cancel", post(partial_cancel))
        .route("/balances", get(list_balances))
        .route("/balances/adjust", post(adjust_balance))
        .route("/balances/carry-forward", post(carry_forward))
}

fn service(ctx: &TenantContext) -> LeaveService {
    LeaveService::new(ctx.pool.clone())
}

// ============================================================================
// Request/Response Types
// ============================================================================

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// One row of the weekly table; weekday 0 is Monday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingDay {
    pub weekday: u8,
    #[serde(default, skip_deserializing)]
    pub name: String,
    pub is_working: bool,
}

#[derive(Debug, Serialize)]
pub struct WorkingDaysResponse {
    /// False while the tenant uses the Saturday/Sunday fallback.
    pub configured: bool,
    pub days: Vec<WorkingDay>,
}

#[derive(Debug, Deserialize)]
pub struct WorkingDaysRequest {
    pub days: Vec<WorkingDay>,
}

#[derive(Debug, Deserialize)]
pub struct HolidayQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RequestQuery {
    pub status: Option<String>,
    pub employee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub employee_id: Option<String>,
    pub year: Option<i64>,
}

/// Optional note attached to a review or cancellation.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewNote {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CarryForwardRequest {
    pub from_year: i64,
}

fn working_days(week: &WorkWeek, configured: bool) -> WorkingDaysResponse {
    let days = WEEKDAYS
        .iter()
        .map(|day| WorkingDay {
            weekday: day.num_days_from_monday() as u8,
            name: day.to_string(),
            is_working: week.is_working(*day),
        })
        .collect();
    WorkingDaysResponse { configured, days }
}

// ============================================================================
// Policy handlers
// ============================================================================

/// GET /api/leave/types
#[axum::debug_handler]
async fn list_types(Extension(ctx): Extension<TenantContext>) -> Result<Json<Vec<LeaveType>>> {
    Ok(Json(service(&ctx).list_leave_types().await?))
}

/// POST /api/leave/types
#[axum::debug_handler]
async fn create_type(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    ApiJson(input): ApiJson<NewLeaveType>,
) -> Result<(StatusCode, Json<LeaveType>)> {
    let leave_type = service(&ctx).create_leave_type(&user.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(leave_type)))
}

/// Weekly working-day table.
///
/// GET /api/leave/working-days
#[axum::debug_handler]
async fn get_working_days(Extension(ctx): Extension<TenantContext>) -> Result<Json<WorkingDaysResponse>> {
    let (week, configured) = service(&ctx).working_week().await?;
    Ok(Json(working_days(&week, configured)))
}

/// Replace the weekly table. Weekdays left out keep their fallback value.
///
/// PUT /api/leave/working-days
#[axum::debug_handler]
async fn set_working_days(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    ApiJson(req): ApiJson<WorkingDaysRequest>,
) -> Result<Json<WorkingDaysResponse>> {
    let mut rows = Vec::with_capacity(req.days.len());
    for day in &req.days {
        if day.weekday > 6 {
            return Err(Error::Validation(format!(
                "Weekday {} is out of range (0 = Monday .. 6 = Sunday)",
                day.weekday
            )));
        }
        rows.push((i64::from(day.weekday), day.is_working));
    }

    let week = service(&ctx)
        .set_working_week(&user.actor(), WorkWeek::from_rows(&rows))
        .await?;
    Ok(Json(working_days(&week, true)))
}

/// Holidays of one year, the current one by default.
///
/// GET /api/leave/holidays?year=
#[axum::debug_handler]
async fn list_holidays(
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<HolidayQuery>,
) -> Result<Json<Vec<Holiday>>> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    Ok(Json(service(&ctx).list_holidays(year).await?))
}

/// POST /api/leave/holidays
#[axum::debug_handler]
async fn create_holiday(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    ApiJson(input): ApiJson<NewHoliday>,
) -> Result<(StatusCode, Json<Holiday>)> {
    let holiday = service(&ctx).create_holiday(&user.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(holiday)))
}

/// DELETE /api/leave/holidays/:id
#[axum::debug_handler]
async fn delete_holiday(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    service(&ctx).delete_holiday(&user.actor(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/leave/holidays/:id/opt-in
#[axum::debug_handler]
async fn opt_in(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<Json<Holiday>> {
    Ok(Json(service(&ctx).opt_in(&user.actor(), &id).await?))
}

/// DELETE /api/leave/holidays/:id/opt-in
#[axum::debug_handler]
async fn opt_out(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    service(&ctx).opt_out(&user.actor(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Request handlers
// ============================================================================

/// POST /api/leave/preview
#[axum::debug_handler]
async fn preview(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    ApiJson(input): ApiJson<LeaveApplication>,
) -> Result<Json<LeavePreview>> {
    Ok(Json(service(&ctx).preview(&user.actor(), input).await?))
}

/// GET /api/leave/requests?status=&employee_id=
#[axum::debug_handler]
async fn list_requests(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<RequestQuery>,
) -> Result<Json<Vec<LeaveRequest>>> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            LeaveStatus::from_str(s).ok_or_else(|| Error::Validation(format!("Unknown status '{}'", s)))?,
        ),
        None => None,
    };
    let requests = service(&ctx)
        .list_requests(&user.actor(), query.employee_id, status)
        .await?;
    Ok(Json(requests))
}

/// File a leave request.
///
/// POST /api/leave/requests
#[axum::debug_handler]
async fn apply(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    ApiJson(input): ApiJson<LeaveApplication>,
) -> Result<(StatusCode, Json<LeaveRequest>)> {
    let request = service(&ctx).apply(&user.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/leave/requests/:id
#[axum::debug_handler]
async fn get_request(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<Json<LeaveRequestDetail>> {
    Ok(Json(service(&ctx).get_request(&user.actor(), &id).await?))
}

/// POST /api/leave/requests/:id/approve
#[axum::debug_handler]
async fn approve(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
    body: Option<ApiJson<ReviewNote>>,
) -> Result<Json<LeaveRequest>> {
    let note = body.map(|ApiJson(b)| b).unwrap_or_default().note;
    let request = service(&ctx)
        .approve(&user.actor(), &id, note.as_deref())
        .await?;
    Ok(Json(request))
}

/// POST /api/leave/requests/:id/reject
#[axum::debug_handler]
async fn reject(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
    body: Option<ApiJson<ReviewNote>>,
) -> Result<Json<LeaveRequest>> {
    let note = body.map(|ApiJson(b)| b).unwrap_or_default().note;
    let request = service(&ctx)
        .reject(&user.actor(), &id, note.as_deref())
        .await?;
    Ok(Json(request))
}

/// POST /api/leave/requests/:id/cancel
#[axum::debug_handler]
async fn cancel(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
    body: Option<ApiJson<ReviewNote>>,
) -> Result<Json<LeaveRequest>> {
    let note = body.map(|ApiJson(b)| b).unwrap_or_default().note;
    let request = service(&ctx)
        .cancel(&user.actor(), &id, note.as_deref())
        .await?;
    Ok(Json(request))
}

/// Give back a date range of an approved request.
///
/// POST /api/leave/requests/:id/partial-cancel
#[axum::debug_handler]
async fn partial_cancel(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
    ApiJson(range): ApiJson<PartialCancellation>,
) -> Result<Json<LeaveRequestDetail>> {
    Ok(Json(service(&ctx).partial_cancel(&user.actor(), &id, range).await?))
}

// ============================================================================
// Balance handlers
// ============================================================================

/// GET /api/leave/balances?employee_id=&year=
#[axum::debug_handler]
async fn list_balances(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<Vec<BalanceView>>> {
    let balances = service(&ctx)
        .list_balances(&user.actor(), query.employee_id, query.year)
        .await?;
    Ok(Json(balances))
}

/// POST /api/leave/balances/adjust
#[axum::debug_handler]
async fn adjust_balance(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    ApiJson(input): ApiJson<BalanceAdjustment>,
) -> Result<Json<AdjustmentOutcome>> {
    Ok(Json(service(&ctx).adjust_balance(&user.actor(), input).await?))
}

/// POST /api/leave/balances/carry-forward
#[axum::debug_handler]
async fn carry_forward(
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    ApiJson(req): ApiJson<CarryForwardRequest>,
) -> Result<Json<CarryForwardSummary>> {
    Ok(Json(
        service(&ctx).carry_forward(&user.actor(), req.from_year).await?,
    ))
}
