//! Leave service queries (tenant database).
//!
//! Working-day table, holidays and opt-ins, leave types, balances, requests,
//! adjustments and partial cancellations. Functions that run inside balance
//! transactions are generic over the executor so callers can pass either the
//! pool or `&mut *tx`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

use super::{map_unique, DbPool};
use crate::models::{HalfDay, HolidayType, LeaveStatus};
use crate::services::calendar::{CalendarHoliday, WorkWeek};
use crate::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Holiday record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Holiday {
    pub id: String,
    pub date: NaiveDate,
    pub name: String,
    pub holiday_type: String,
    pub created_at: DateTime<Utc>,
}

impl Holiday {
    pub fn type_enum(&self) -> HolidayType {
        HolidayType::from_str(&self.holiday_type).unwrap_or_default()
    }

    pub fn to_calendar(&self) -> CalendarHoliday {
        CalendarHoliday {
            id: self.id.clone(),
            date: self.date,
            holiday_type: self.type_enum(),
        }
    }
}

/// Leave type (policy) record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeaveType {
    pub id: String,
    pub code: String,
    pub name: String,
    pub annual_allowance: f64,
    pub allow_half_day: bool,
    pub carry_forward_max: f64,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Per-employee, per-type, per-year balance.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeaveBalance {
    pub id: String,
    pub employee_id: String,
    pub leave_type_id: String,
    pub year: i64,
    pub total: f64,
    pub used: f64,
    pub pending: f64,
    pub carry_forward: f64,
    pub adjustment: f64,
    pub updated_at: DateTime<Utc>,
}

impl LeaveBalance {
    /// Days that can still be requested.
    pub fn available(&self) -> f64 {
        self.total + self.carry_forward + self.adjustment - self.used - self.pending
    }
}

/// Leave request record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: String,
    pub employee_id: String,
    pub leave_type_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub half_day: String,
    pub days: f64,
    pub cancelled_days: f64,
    pub status: String,
    pub reason: Option<String>,
    pub reviewer_id: Option<String>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn status_enum(&self) -> Result<LeaveStatus> {
        LeaveStatus::from_str(&self.status)
            .ok_or_else(|| Error::Internal(format!("Unknown leave status {}", self.status)))
    }
}

/// A cancelled sub-range of an approved request.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeaveCancellation {
    pub id: String,
    pub request_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: f64,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
}

/// Manual balance correction.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeaveAdjustment {
    pub id: String,
    pub balance_id: String,
    pub delta: f64,
    pub reason: String,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a holiday.
#[derive(Debug, Clone)]
pub struct CreateHoliday {
    pub id: String,
    pub date: NaiveDate,
    pub name: String,
    pub holiday_type: HolidayType,
}

/// Input for creating a leave type.
#[derive(Debug, Clone)]
pub struct CreateLeaveType {
    pub id: String,
    pub code: String,
    pub name: String,
    pub annual_allowance: f64,
    pub allow_half_day: bool,
    pub carry_forward_max: f64,
}

/// Input for inserting a pending leave request.
#[derive(Debug, Clone)]
pub struct CreateLeaveRequest {
    pub id: String,
    pub employee_id: String,
    pub leave_type_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub half_day: HalfDay,
    pub days: f64,
    pub reason: Option<String>,
}

/// Filter for listing leave requests.
#[derive(Debug, Clone, Default)]
pub struct LeaveRequestFilter {
    pub employee_id: Option<String>,
    pub status: Option<LeaveStatus>,
    pub employee_ids: Option<Vec<String>>,
}

// ============================================================================
// Working Days
// ============================================================================

/// Stored `(weekday, is_working)` rows; empty when never configured.
pub async fn get_working_day_rows<'e, E>(executor: E) -> Result<Vec<(i64, bool)>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(i64, bool)> =
        sqlx::query_as("SELECT weekday, is_working FROM working_days ORDER BY weekday")
            .fetch_all(executor)
            .await?;
    Ok(rows)
}

/// Replace the weekly table.
pub async fn replace_working_days(pool: &DbPool, week: &WorkWeek) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM working_days").execute(&mut *tx).await?;
    for (weekday, is_working) in week.to_rows() {
        sqlx::query("INSERT INTO working_days (weekday, is_working) VALUES (?, ?)")
            .bind(weekday)
            .bind(is_working)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

// ============================================================================
// Holidays
// ============================================================================

pub async fn create_holiday(pool: &DbPool, input: CreateHoliday) -> Result<Holiday> {
    let holiday = sqlx::query_as::<_, Holiday>(
        r#"
        INSERT INTO holidays (id, date, name, holiday_type, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(input.date)
    .bind(&input.name)
    .bind(input.holiday_type.as_str())
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(holiday)
}

pub async fn get_holiday(pool: &DbPool, id: &str) -> Result<Holiday> {
    sqlx::query_as::<_, Holiday>("SELECT * FROM holidays WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Holiday {}", id)))
}

/// Holidays in `[start, end]`.
pub async fn list_holidays_between<'e, E>(
    executor: E,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Holiday>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let holidays = sqlx::query_as::<_, Holiday>(
        "SELECT * FROM holidays WHERE date >= ? AND date <= ? ORDER BY date, name",
    )
    .bind(start)
    .bind(end)
    .fetch_all(executor)
    .await?;
    Ok(holidays)
}

pub async fn delete_holiday(pool: &DbPool, id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM holiday_opt_ins WHERE holiday_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM holidays WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Holiday {}", id)));
    }
    tx.commit().await?;
    Ok(())
}

// ============================================================================
// Holiday Opt-ins
// ============================================================================

/// Record an opt-in; repeated opt-ins are a no-op.
pub async fn add_holiday_opt_in(pool: &DbPool, employee_id: &str, holiday_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO holiday_opt_ins (employee_id, holiday_id, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT (employee_id, holiday_id) DO NOTHING
        "#,
    )
    .bind(employee_id)
    .bind(holiday_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_holiday_opt_in(pool: &DbPool, employee_id: &str, holiday_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM holiday_opt_ins WHERE employee_id = ? AND holiday_id = ?")
        .bind(employee_id)
        .bind(holiday_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Holiday ids the employee opted into.
pub async fn list_holiday_opt_ins<'e, E>(executor: E, employee_id: &str) -> Result<Vec<String>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT holiday_id FROM holiday_opt_ins WHERE employee_id = ?")
            .bind(employee_id)
            .fetch_all(executor)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

// ============================================================================
// Leave Types
// ============================================================================

pub async fn create_leave_type(pool: &DbPool, input: CreateLeaveType) -> Result<LeaveType> {
    sqlx::query_as::<_, LeaveType>(
        r#"
        INSERT INTO leave_types (id, code, name, annual_allowance, allow_half_day, carry_forward_max, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.code)
    .bind(&input.name)
    .bind(input.annual_allowance)
    .bind(input.allow_half_day)
    .bind(input.carry_forward_max)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique(e, || format!("Leave type {} already exists", input.code)))
}

pub async fn get_leave_type<'e, E>(executor: E, id: &str) -> Result<LeaveType>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, LeaveType>("SELECT * FROM leave_types WHERE id = ? AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Leave type {}", id)))
}

pub async fn list_leave_types(pool: &DbPool) -> Result<Vec<LeaveType>> {
    let types = sqlx::query_as::<_, LeaveType>(
        "SELECT * FROM leave_types WHERE deleted_at IS NULL ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(types)
}

pub async fn search_leave_types(pool: &DbPool, query: &str, limit: i64) -> Result<Vec<LeaveType>> {
    let pattern = format!("%{}%", super::employees::escape_like(query));
    let types = sqlx::query_as::<_, LeaveType>(
        r#"
        SELECT * FROM leave_types
        WHERE deleted_at IS NULL
          AND (name LIKE ? ESCAPE '\' OR code LIKE ? ESCAPE '\')
        ORDER BY name
        LIMIT ?
        "#,
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(types)
}

// ============================================================================
// Balances
// ============================================================================

pub async fn find_balance<'e, E>(
    executor: E,
    employee_id: &str,
    leave_type_id: &str,
    year: i64,
) -> Result<Option<LeaveBalance>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let balance = sqlx::query_as::<_, LeaveBalance>(
        "SELECT * FROM leave_balances WHERE employee_id = ? AND leave_type_id = ? AND year = ?",
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .fetch_optional(executor)
    .await?;
    Ok(balance)
}

/// Insert a balance row seeded with `total`, or return the existing one.
pub async fn ensure_balance(
    conn: &mut sqlx::SqliteConnection,
    employee_id: &str,
    leave_type_id: &str,
    year: i64,
    total: f64,
) -> Result<LeaveBalance> {
    sqlx::query(
        r#"
        INSERT INTO leave_balances (id, employee_id, leave_type_id, year, total, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (employee_id, leave_type_id, year) DO NOTHING
        "#,
    )
    .bind(crate::models::new_id())
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .bind(total)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    find_balance(&mut *conn, employee_id, leave_type_id, year)
        .await?
        .ok_or_else(|| Error::Internal("Balance row vanished after insert".into()))
}

/// Apply deltas to the mutable balance columns.
pub async fn apply_balance_delta<'e, E>(
    executor: E,
    balance_id: &str,
    used: f64,
    pending: f64,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE leave_balances
        SET used = used + ?, pending = pending + ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(used)
    .bind(pending)
    .bind(Utc::now())
    .bind(balance_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn set_balance_carry_forward<'e, E>(executor: E, balance_id: &str, carry_forward: f64) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE leave_balances SET carry_forward = ?, updated_at = ? WHERE id = ?")
        .bind(carry_forward)
        .bind(Utc::now())
        .bind(balance_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn add_balance_adjustment(
    conn: &mut sqlx::SqliteConnection,
    balance_id: &str,
    delta: f64,
    reason: &str,
    actor_id: &str,
) -> Result<LeaveAdjustment> {
    sqlx::query("UPDATE leave_balances SET adjustment = adjustment + ?, updated_at = ? WHERE id = ?")
        .bind(delta)
        .bind(Utc::now())
        .bind(balance_id)
        .execute(&mut *conn)
        .await?;

    let adjustment = sqlx::query_as::<_, LeaveAdjustment>(
        r#"
        INSERT INTO leave_adjustments (id, balance_id, delta, reason, actor_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(crate::models::new_id())
    .bind(balance_id)
    .bind(delta)
    .bind(reason)
    .bind(actor_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(adjustment)
}

pub async fn list_balances(
    pool: &DbPool,
    employee_id: Option<&str>,
    year: Option<i64>,
) -> Result<Vec<LeaveBalance>> {
    let mut builder = sqlx::QueryBuilder::<Sqlite>::new("SELECT * FROM leave_balances WHERE 1 = 1");
    if let Some(employee_id) = employee_id {
        builder.push(" AND employee_id = ").push_bind(employee_id.to_string());
    }
    if let Some(year) = year {
        builder.push(" AND year = ").push_bind(year);
    }
    builder.push(" ORDER BY employee_id, year, leave_type_id");

    let balances = builder
        .build_query_as::<LeaveBalance>()
        .fetch_all(pool)
        .await?;
    Ok(balances)
}

pub async fn list_balances_for_year<'e, E>(executor: E, year: i64) -> Result<Vec<LeaveBalance>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let balances = sqlx::query_as::<_, LeaveBalance>("SELECT * FROM leave_balances WHERE year = ?")
        .bind(year)
        .fetch_all(executor)
        .await?;
    Ok(balances)
}

// ============================================================================
// Requests
// ============================================================================

pub async fn insert_leave_request<'e, E>(executor: E, input: CreateLeaveRequest) -> Result<LeaveRequest>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let request = sqlx::query_as::<_, LeaveRequest>(
        r#"
        INSERT INTO leave_requests
            (id, employee_id, leave_type_id, start_date, end_date, half_day, days, status, reason, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.employee_id)
    .bind(&input.leave_type_id)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.half_day.as_str())
    .bind(input.days)
    .bind(&input.reason)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await?;
    Ok(request)
}

pub async fn get_leave_request<'e, E>(executor: E, id: &str) -> Result<LeaveRequest>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, LeaveRequest>("SELECT * FROM leave_requests WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Leave request {}", id)))
}

/// Record the days a request charges on each counted date.
pub async fn insert_request_days(
    conn: &mut sqlx::SqliteConnection,
    request_id: &str,
    charged: &[(NaiveDate, f64)],
) -> Result<()> {
    for (date, days) in charged {
        sqlx::query("INSERT INTO leave_request_days (request_id, date, days) VALUES (?, ?, ?)")
            .bind(request_id)
            .bind(date)
            .bind(days)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn list_request_days<'e, E>(executor: E, request_id: &str) -> Result<Vec<(NaiveDate, f64)>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let days = sqlx::query_as::<_, (NaiveDate, f64)>(
        "SELECT date, days FROM leave_request_days WHERE request_id = ? ORDER BY date",
    )
    .bind(request_id)
    .fetch_all(executor)
    .await?;
    Ok(days)
}

/// Active requests of an employee overlapping `[start, end]`.
pub async fn find_overlapping_requests<'e, E>(
    executor: E,
    employee_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<LeaveRequest>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let requests = sqlx::query_as::<_, LeaveRequest>(
        r#"
        SELECT * FROM leave_requests
        WHERE employee_id = ? AND start_date <= ? AND end_date >= ?
        "#,
    )
    .bind(employee_id)
    .bind(end)
    .bind(start)
    .fetch_all(executor)
    .await?;
    Ok(requests
        .into_iter()
        .filter(|r| LeaveStatus::from_str(&r.status).is_some_and(|s| s.is_active()))
        .collect())
}

pub async fn list_leave_requests(pool: &DbPool, filter: &LeaveRequestFilter) -> Result<Vec<LeaveRequest>> {
    let mut builder = sqlx::QueryBuilder::<Sqlite>::new("SELECT * FROM leave_requests WHERE 1 = 1");

    if let Some(employee_id) = &filter.employee_id {
        builder.push(" AND employee_id = ").push_bind(employee_id.clone());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(ids) = &filter.employee_ids {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        builder.push(" AND employee_id IN (");
        {
            let mut separated = builder.separated(", ");
            for id in ids {
                separated.push_bind(id.clone());
            }
        }
        builder.push(")");
    }
    builder.push(" ORDER BY start_date DESC, created_at DESC");

    let requests = builder
        .build_query_as::<LeaveRequest>()
        .fetch_all(pool)
        .await?;
    Ok(requests)
}

/// Record a status change together with reviewer details.
pub async fn update_leave_request_status<'e, E>(
    executor: E,
    id: &str,
    status: LeaveStatus,
    reviewer_id: Option<&str>,
    review_note: Option<&str>,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?,
            reviewer_id = COALESCE(?, reviewer_id),
            review_note = COALESCE(?, review_note),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(reviewer_id)
    .bind(review_note)
    .bind(Utc::now())
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Move `days` of an approved request into its cancelled total.
pub async fn record_partial_cancellation(
    conn: &mut sqlx::SqliteConnection,
    request_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    days: f64,
    status: LeaveStatus,
    actor_id: &str,
) -> Result<LeaveCancellation> {
    sqlx::query(
        r#"
        UPDATE leave_requests
        SET days = days - ?, cancelled_days = cancelled_days + ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(days)
    .bind(days)
    .bind(status.as_str())
    .bind(Utc::now())
    .bind(request_id)
    .execute(&mut *conn)
    .await?;

    let cancellation = sqlx::query_as::<_, LeaveCancellation>(
        r#"
        INSERT INTO leave_cancellations (id, request_id, start_date, end_date, days, actor_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(crate::models::new_id())
    .bind(request_id)
    .bind(start)
    .bind(end)
    .bind(days)
    .bind(actor_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(cancellation)
}

pub async fn list_cancellations<'e, E>(executor: E, request_id: &str) -> Result<Vec<LeaveCancellation>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let cancellations = sqlx::query_as::<_, LeaveCancellation>(
        "SELECT * FROM leave_cancellations WHERE request_id = ? ORDER BY start_date",
    )
    .bind(request_id)
    .fetch_all(executor)
    .await?;
    Ok(cancellations)
}
