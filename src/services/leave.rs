//! Leave requests and balance bookkeeping.
//!
//! Balances are kept per employee, leave type and year:
//!
//! ```text
//! available = total + carry_forward + adjustment - used - pending
//! ```
//!
//! Every state change of a request and its balance effect run in a single
//! transaction. Day counts are computed by the [`LeaveCalendar`] when a
//! request is filed and stored on the request.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;

use super::calendar::{LeaveCalendar, WorkWeek};
use crate::db::{
    self, CreateHoliday, CreateLeaveRequest, CreateLeaveType, DbPool, Employee, Holiday, LeaveAdjustment,
    LeaveBalance, LeaveCancellation, LeaveRequest, LeaveRequestFilter, LeaveType,
};
use crate::error::{Error, Result};
use crate::models::{new_id, EmployeeRole, HalfDay, HolidayType, LeaveStatus};

// ============================================================================
// Inputs and views
// ============================================================================

/// The employee performing a leave operation.
#[derive(Debug, Clone)]
pub struct LeaveActor {
    pub employee_id: String,
    pub role: EmployeeRole,
}

impl LeaveActor {
    pub fn new(employee_id: impl Into<String>, role: EmployeeRole) -> Self {
        Self {
            employee_id: employee_id.into(),
            role,
        }
    }

    pub fn can_manage(&self) -> bool {
        self.role.can_manage_leave()
    }

    pub fn is_manager_of(&self, employee: &Employee) -> bool {
        employee.manager_id.as_deref() == Some(self.employee_id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLeaveType {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub annual_allowance: f64,
    #[serde(default = "default_true")]
    pub allow_half_day: bool,
    #[serde(default)]
    pub carry_forward_max: f64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHoliday {
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub holiday_type: HolidayType,
}

/// A leave request as filed, also used for previews.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveApplication {
    /// Defaults to the acting employee; admin/hr may file for others.
    #[serde(default)]
    pub employee_id: Option<String>,
    pub leave_type_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub half_day: HalfDay,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialCancellation {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceAdjustment {
    pub employee_id: String,
    pub leave_type_id: String,
    pub year: i64,
    pub delta: f64,
    pub reason: String,
}

/// Day count for a prospective request.
#[derive(Debug, Clone, Serialize)]
pub struct LeavePreview {
    pub employee_id: String,
    pub leave_type_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub half_day: HalfDay,
    pub days: f64,
    pub dates: Vec<NaiveDate>,
    pub available: f64,
    pub sufficient: bool,
}

/// Balance row with its derived availability.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    #[serde(flatten)]
    pub balance: LeaveBalance,
    pub available: f64,
}

impl From<LeaveBalance> for BalanceView {
    fn from(balance: LeaveBalance) -> Self {
        let available = balance.available();
        Self { balance, available }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentOutcome {
    pub balance: BalanceView,
    pub adjustment: LeaveAdjustment,
}

#[derive(Debug, Clone, Serialize)]
pub struct CarryForwardSummary {
    pub from_year: i64,
    pub to_year: i64,
    pub updated: usize,
    pub skipped: usize,
}

/// A request together with its partial cancellations.
#[derive(Debug, Clone, Serialize)]
pub struct LeaveRequestDetail {
    #[serde(flatten)]
    pub request: LeaveRequest,
    pub cancellations: Vec<LeaveCancellation>,
}

// ============================================================================
// Service
// ============================================================================

/// Leave operations against one tenant database.
#[derive(Clone)]
pub struct LeaveService {
    db: DbPool,
}

impl LeaveService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------------
    // Policy: leave types, working week, holidays
    // ------------------------------------------------------------------------

    pub async fn list_leave_types(&self) -> Result<Vec<LeaveType>> {
        db::list_leave_types(&self.db).await
    }

    pub async fn create_leave_type(&self, actor: &LeaveActor, input: NewLeaveType) -> Result<LeaveType> {
        require_manage(actor)?;

        let code = input.code.trim();
        let name = input.name.trim();
        if code.is_empty() || name.is_empty() {
            return Err(Error::Validation("Leave type code and name are required".into()));
        }
        ensure_day_quantity("annual_allowance", input.annual_allowance)?;
        ensure_day_quantity("carry_forward_max", input.carry_forward_max)?;

        let leave_type = db::create_leave_type(
            &self.db,
            CreateLeaveType {
                id: new_id(),
                code: code.to_string(),
                name: name.to_string(),
                annual_allowance: input.annual_allowance,
                allow_half_day: input.allow_half_day,
                carry_forward_max: input.carry_forward_max,
            },
        )
        .await?;

        info!(leave_type = %leave_type.code, "Created leave type");
        Ok(leave_type)
    }

    /// The effective week and whether the tenant configured one.
    pub async fn working_week(&self) -> Result<(WorkWeek, bool)> {
        let rows = db::get_working_day_rows(&self.db).await?;
        Ok((WorkWeek::from_rows(&rows), !rows.is_empty()))
    }

    pub async fn set_working_week(&self, actor: &LeaveActor, week: WorkWeek) -> Result<WorkWeek> {
        require_manage(actor)?;
        if week.working_day_count() == 0 {
            return Err(Error::Validation("At least one weekday must be a working day".into()));
        }
        db::replace_working_days(&self.db, &week).await?;
        Ok(week)
    }

    pub async fn list_holidays(&self, year: i32) -> Result<Vec<Holiday>> {
        let (start, end) = year_bounds(year)?;
        db::list_holidays_between(&self.db, start, end).await
    }

    pub async fn create_holiday(&self, actor: &LeaveActor, input: NewHoliday) -> Result<Holiday> {
        require_manage(actor)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Holiday name is required".into()));
        }

        db::create_holiday(
            &self.db,
            CreateHoliday {
                id: new_id(),
                date: input.date,
                name: name.to_string(),
                holiday_type: input.holiday_type,
            },
        )
        .await
    }

    pub async fn delete_holiday(&self, actor: &LeaveActor, id: &str) -> Result<()> {
        require_manage(actor)?;
        db::delete_holiday(&self.db, id).await
    }

    /// Opt the acting employee into an optional holiday.
    ///
    /// Requests already filed keep their stored day count.
    pub async fn opt_in(&self, actor: &LeaveActor, holiday_id: &str) -> Result<Holiday> {
        let holiday = db::get_holiday(&self.db, holiday_id).await?;
        if holiday.type_enum() != HolidayType::Optional {
            return Err(Error::Validation(format!(
                "Holiday {} is {} and does not accept opt-ins",
                holiday.name, holiday.holiday_type
            )));
        }
        db::add_holiday_opt_in(&self.db, &actor.employee_id, &holiday.id).await?;
        Ok(holiday)
    }

    pub async fn opt_out(&self, actor: &LeaveActor, holiday_id: &str) -> Result<()> {
        let holiday = db::get_holiday(&self.db, holiday_id).await?;
        if !db::remove_holiday_opt_in(&self.db, &actor.employee_id, &holiday.id).await? {
            return Err(Error::NotFound(format!("Opt-in for holiday {}", holiday.id)));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Count the days a request would consume without filing it.
    pub async fn preview(&self, actor: &LeaveActor, input: LeaveApplication) -> Result<LeavePreview> {
        let employee_id = input.employee_id.clone().unwrap_or_else(|| actor.employee_id.clone());
        self.ensure_visible(actor, &employee_id).await?;

        let mut conn = self.db.acquire().await?;
        db::get_employee(&mut *conn, &employee_id).await?;
        let leave_type = db::get_leave_type(&mut *conn, &input.leave_type_id).await?;
        check_shape(&leave_type, &input)?;

        let calendar = load_calendar(&mut conn, &employee_id, input.start_date, input.end_date).await?;
        let days = calendar.count_days(input.start_date, input.end_date, input.half_day)?;
        let dates = calendar.counted_dates(input.start_date, input.end_date)?;

        let year = i64::from(input.start_date.year());
        let available = db::find_balance(&mut *conn, &employee_id, &leave_type.id, year)
            .await?
            .map(|b| b.available())
            .unwrap_or(leave_type.annual_allowance);

        Ok(LeavePreview {
            employee_id,
            leave_type_id: leave_type.id,
            start_date: input.start_date,
            end_date: input.end_date,
            half_day: input.half_day,
            days,
            dates,
            available,
            sufficient: days > 0.0 && days <= available,
        })
    }

    /// File a request; its days move into the balance's `pending`.
    pub async fn apply(&self, actor: &LeaveActor, input: LeaveApplication) -> Result<LeaveRequest> {
        let employee_id = match input.employee_id.as_deref() {
            Some(id) if id != actor.employee_id => {
                require_manage(actor)?;
                id.to_string()
            }
            _ => actor.employee_id.clone(),
        };

        let mut tx = self.db.begin().await?;

        db::get_employee(&mut *tx, &employee_id).await?;
        let leave_type = db::get_leave_type(&mut *tx, &input.leave_type_id).await?;
        check_shape(&leave_type, &input)?;

        let calendar = load_calendar(&mut tx, &employee_id, input.start_date, input.end_date).await?;
        let charged = calendar.charged_days(input.start_date, input.end_date, input.half_day)?;
        let days: f64 = charged.iter().map(|(_, days)| days).sum();
        if days <= 0.0 {
            return Err(Error::Validation("The requested range contains no working days".into()));
        }

        let overlapping =
            db::find_overlapping_requests(&mut *tx, &employee_id, input.start_date, input.end_date).await?;
        if let Some(existing) = overlapping.first() {
            return Err(Error::Conflict(format!(
                "Overlaps leave request {} ({} to {})",
                existing.id, existing.start_date, existing.end_date
            )));
        }

        let year = i64::from(input.start_date.year());
        let balance =
            db::ensure_balance(&mut tx, &employee_id, &leave_type.id, year, leave_type.annual_allowance).await?;
        let available = balance.available();
        if days > available {
            return Err(Error::InsufficientBalance {
                requested: days,
                available,
            });
        }

        let request = db::insert_leave_request(
            &mut *tx,
            CreateLeaveRequest {
                id: new_id(),
                employee_id: employee_id.clone(),
                leave_type_id: leave_type.id.clone(),
                start_date: input.start_date,
                end_date: input.end_date,
                half_day: input.half_day,
                days,
                reason: input.reason.filter(|r| !r.trim().is_empty()),
            },
        )
        .await?;
        db::insert_request_days(&mut tx, &request.id, &charged).await?;
        db::apply_balance_delta(&mut *tx, &balance.id, 0.0, days).await?;

        tx.commit().await?;

        info!(
            request_id = %request.id,
            employee_id = %employee_id,
            leave_type = %leave_type.code,
            days,
            "Leave request filed"
        );
        Ok(request)
    }

    pub async fn approve(&self, actor: &LeaveActor, id: &str, note: Option<&str>) -> Result<LeaveRequest> {
        self.review(actor, id, note, LeaveStatus::Approved).await
    }

    pub async fn reject(&self, actor: &LeaveActor, id: &str, note: Option<&str>) -> Result<LeaveRequest> {
        self.review(actor, id, note, LeaveStatus::Rejected).await
    }

    async fn review(
        &self,
        actor: &LeaveActor,
        id: &str,
        note: Option<&str>,
        outcome: LeaveStatus,
    ) -> Result<LeaveRequest> {
        let action = if outcome == LeaveStatus::Approved {
            "approve"
        } else {
            "reject"
        };

        let mut tx = self.db.begin().await?;

        let request = db::get_leave_request(&mut *tx, id).await?;
        let employee = db::get_employee(&mut *tx, &request.employee_id).await?;
        authorize_review(actor, &employee)?;

        let status = request.status_enum()?;
        if status != LeaveStatus::Pending {
            return Err(Error::InvalidTransition {
                action,
                status: status.as_str().to_string(),
            });
        }

        let balance = request_balance(&mut tx, &request).await?;
        let used = if outcome == LeaveStatus::Approved {
            request.days
        } else {
            0.0
        };
        db::apply_balance_delta(&mut *tx, &balance.id, used, -request.days).await?;
        db::update_leave_request_status(&mut *tx, id, outcome, Some(&actor.employee_id), note).await?;

        let updated = db::get_leave_request(&mut *tx, id).await?;
        tx.commit().await?;

        info!(request_id = %id, reviewer = %actor.employee_id, status = %outcome, "Leave request reviewed");
        Ok(updated)
    }

    /// Cancel a pending or approved request in full.
    pub async fn cancel(&self, actor: &LeaveActor, id: &str, note: Option<&str>) -> Result<LeaveRequest> {
        let mut tx = self.db.begin().await?;

        let request = db::get_leave_request(&mut *tx, id).await?;
        authorize_owner(actor, &request)?;

        let status = request.status_enum()?;
        let (used, pending) = match status {
            LeaveStatus::Pending => (0.0, -request.days),
            LeaveStatus::Approved | LeaveStatus::PartiallyCancelled => (-request.days, 0.0),
            other => {
                return Err(Error::InvalidTransition {
                    action: "cancel",
                    status: other.as_str().to_string(),
                })
            }
        };

        let balance = request_balance(&mut tx, &request).await?;
        db::apply_balance_delta(&mut *tx, &balance.id, used, pending).await?;
        db::update_leave_request_status(&mut *tx, id, LeaveStatus::Cancelled, None, note).await?;

        let updated = db::get_leave_request(&mut *tx, id).await?;
        tx.commit().await?;

        info!(request_id = %id, actor = %actor.employee_id, from = %status, "Leave request cancelled");
        Ok(updated)
    }

    /// Give back part of an approved request.
    pub async fn partial_cancel(
        &self,
        actor: &LeaveActor,
        id: &str,
        range: PartialCancellation,
    ) -> Result<LeaveRequestDetail> {
        let (start, end) = (range.start_date, range.end_date);
        if end < start {
            return Err(Error::Validation(format!(
                "End date {} is before start date {}",
                end, start
            )));
        }

        let mut tx = self.db.begin().await?;

        let request = db::get_leave_request(&mut *tx, id).await?;
        authorize_owner(actor, &request)?;

        let status = request.status_enum()?;
        if !status.counts_as_used() {
            return Err(Error::InvalidTransition {
                action: "partially cancel",
                status: status.as_str().to_string(),
            });
        }

        if start < request.start_date || end > request.end_date {
            return Err(Error::Validation(format!(
                "Cancellation range must lie within {} to {}",
                request.start_date, request.end_date
            )));
        }

        let previous = db::list_cancellations(&mut *tx, id).await?;
        if let Some(clash) = previous.iter().find(|c| c.start_date <= end && c.end_date >= start) {
            return Err(Error::Conflict(format!(
                "Range overlaps an earlier cancellation ({} to {})",
                clash.start_date, clash.end_date
            )));
        }

        // Refund what was charged when the request was filed.
        let outstanding: Vec<(NaiveDate, f64)> = db::list_request_days(&mut *tx, id)
            .await?
            .into_iter()
            .filter(|(date, _)| !previous.iter().any(|c| c.start_date <= *date && *date <= c.end_date))
            .collect();
        let (inside, outside): (Vec<_>, Vec<_>) =
            outstanding.into_iter().partition(|(date, _)| start <= *date && *date <= end);

        let (days, next) = if outside.is_empty() {
            (request.days, LeaveStatus::Cancelled)
        } else {
            let refund: f64 = inside.iter().map(|(_, days)| days).sum();
            if refund <= 0.0 {
                return Err(Error::Validation("The cancellation range contains no leave days".into()));
            }
            let days = refund.min(request.days);
            let next = if request.days - days <= 0.0 {
                LeaveStatus::Cancelled
            } else {
                LeaveStatus::PartiallyCancelled
            };
            (days, next)
        };

        let balance = request_balance(&mut tx, &request).await?;
        db::apply_balance_delta(&mut *tx, &balance.id, -days, 0.0).await?;
        db::record_partial_cancellation(&mut tx, id, start, end, days, next, &actor.employee_id).await?;

        let request = db::get_leave_request(&mut *tx, id).await?;
        let cancellations = db::list_cancellations(&mut *tx, id).await?;
        tx.commit().await?;

        info!(request_id = %id, days, status = %next, "Leave request partially cancelled");
        Ok(LeaveRequestDetail {
            request,
            cancellations,
        })
    }

    pub async fn get_request(&self, actor: &LeaveActor, id: &str) -> Result<LeaveRequestDetail> {
        let request = db::get_leave_request(&self.db, id).await?;
        self.ensure_visible(actor, &request.employee_id).await?;
        let cancellations = db::list_cancellations(&self.db, id).await?;
        Ok(LeaveRequestDetail {
            request,
            cancellations,
        })
    }

    /// Requests visible to the actor: all for admin/hr, otherwise their own
    /// and their direct reports'.
    pub async fn list_requests(
        &self,
        actor: &LeaveActor,
        employee_id: Option<String>,
        status: Option<LeaveStatus>,
    ) -> Result<Vec<LeaveRequest>> {
        let mut filter = LeaveRequestFilter {
            employee_id,
            status,
            employee_ids: None,
        };

        if let Some(visible) = self.visible_employee_ids(actor).await? {
            match &filter.employee_id {
                Some(id) if !visible.contains(id) => return Err(Error::Forbidden),
                Some(_) => {}
                None => filter.employee_ids = Some(visible),
            }
        }

        db::list_leave_requests(&self.db, &filter).await
    }

    // ------------------------------------------------------------------------
    // Balances
    // ------------------------------------------------------------------------

    pub async fn list_balances(
        &self,
        actor: &LeaveActor,
        employee_id: Option<String>,
        year: Option<i64>,
    ) -> Result<Vec<BalanceView>> {
        let employee_id = match employee_id {
            Some(id) => {
                self.ensure_visible(actor, &id).await?;
                Some(id)
            }
            None if actor.can_manage() => None,
            None => Some(actor.employee_id.clone()),
        };

        let balances = db::list_balances(&self.db, employee_id.as_deref(), year).await?;
        Ok(balances.into_iter().map(BalanceView::from).collect())
    }

    /// Add `delta` days to a balance's adjustment.
    pub async fn adjust_balance(&self, actor: &LeaveActor, input: BalanceAdjustment) -> Result<AdjustmentOutcome> {
        require_manage(actor)?;

        if !input.delta.is_finite() || input.delta == 0.0 || (input.delta * 2.0).fract() != 0.0 {
            return Err(Error::Validation(
                "Adjustment must be a non-zero multiple of 0.5 days".into(),
            ));
        }
        ensure_year(input.year)?;
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(Error::Validation("Adjustment reason is required".into()));
        }

        let mut tx = self.db.begin().await?;

        db::get_employee(&mut *tx, &input.employee_id).await?;
        let leave_type = db::get_leave_type(&mut *tx, &input.leave_type_id).await?;
        let balance = db::ensure_balance(
            &mut tx,
            &input.employee_id,
            &leave_type.id,
            input.year,
            leave_type.annual_allowance,
        )
        .await?;

        let available = balance.available();
        if available + input.delta < 0.0 {
            return Err(Error::InsufficientBalance {
                requested: -input.delta,
                available,
            });
        }

        let adjustment =
            db::add_balance_adjustment(&mut tx, &balance.id, input.delta, reason, &actor.employee_id).await?;
        let balance = db::find_balance(&mut *tx, &input.employee_id, &leave_type.id, input.year)
            .await?
            .ok_or_else(|| Error::Internal("Balance row vanished during adjustment".into()))?;

        tx.commit().await?;

        info!(
            employee_id = %input.employee_id,
            leave_type = %leave_type.code,
            year = input.year,
            delta = input.delta,
            "Balance adjusted"
        );
        Ok(AdjustmentOutcome {
            balance: balance.into(),
            adjustment,
        })
    }

    /// Carry unused days of `from_year` into the following year.
    ///
    /// Re-running overwrites the carried amount instead of adding to it.
    pub async fn carry_forward(&self, actor: &LeaveActor, from_year: i64) -> Result<CarryForwardSummary> {
        require_manage(actor)?;
        ensure_year(from_year)?;
        let to_year = ensure_year(from_year + 1)?;

        let mut tx = self.db.begin().await?;
        let balances = db::list_balances_for_year(&mut *tx, from_year).await?;

        let mut types: HashMap<String, Option<LeaveType>> = HashMap::new();
        let mut updated = 0;
        let mut skipped = 0;

        for balance in balances {
            if !types.contains_key(&balance.leave_type_id) {
                let leave_type = match db::get_leave_type(&mut *tx, &balance.leave_type_id).await {
                    Ok(t) => Some(t),
                    Err(Error::NotFound(_)) => None,
                    Err(e) => return Err(e),
                };
                types.insert(balance.leave_type_id.clone(), leave_type);
            }

            let Some(leave_type) = types
                .get(&balance.leave_type_id)
                .and_then(|t| t.as_ref())
                .filter(|t| t.carry_forward_max > 0.0)
            else {
                skipped += 1;
                continue;
            };

            let amount = balance.available().max(0.0).min(leave_type.carry_forward_max);
            let next = db::ensure_balance(
                &mut tx,
                &balance.employee_id,
                &leave_type.id,
                to_year,
                leave_type.annual_allowance,
            )
            .await?;
            db::set_balance_carry_forward(&mut *tx, &next.id, amount).await?;
            updated += 1;
        }

        tx.commit().await?;

        info!(from_year, to_year, updated, skipped, "Carried balances forward");
        Ok(CarryForwardSummary {
            from_year,
            to_year,
            updated,
            skipped,
        })
    }

    // ------------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------------

    /// `None` means every employee is visible.
    async fn visible_employee_ids(&self, actor: &LeaveActor) -> Result<Option<Vec<String>>> {
        if actor.can_manage() {
            return Ok(None);
        }
        let mut ids = vec![actor.employee_id.clone()];
        ids.extend(db::list_direct_report_ids(&self.db, &actor.employee_id).await?);
        Ok(Some(ids))
    }

    async fn ensure_visible(&self, actor: &LeaveActor, employee_id: &str) -> Result<()> {
        if actor.can_manage() || actor.employee_id == employee_id {
            return Ok(());
        }
        let employee = db::get_employee(&self.db, employee_id).await?;
        if actor.is_manager_of(&employee) {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn load_calendar(
    conn: &mut SqliteConnection,
    employee_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<LeaveCalendar> {
    let rows = db::get_working_day_rows(&mut *conn).await?;
    let holidays = db::list_holidays_between(&mut *conn, start, end).await?;
    let opted_in = db::list_holiday_opt_ins(&mut *conn, employee_id).await?;

    Ok(LeaveCalendar::new(
        WorkWeek::from_rows(&rows),
        holidays.iter().map(Holiday::to_calendar),
        opted_in,
    ))
}

async fn request_balance(conn: &mut SqliteConnection, request: &LeaveRequest) -> Result<LeaveBalance> {
    let year = i64::from(request.start_date.year());
    db::find_balance(&mut *conn, &request.employee_id, &request.leave_type_id, year)
        .await?
        .ok_or_else(|| Error::Internal(format!("No balance row for leave request {}", request.id)))
}

fn check_shape(leave_type: &LeaveType, input: &LeaveApplication) -> Result<()> {
    if input.half_day.is_half() && !leave_type.allow_half_day {
        return Err(Error::Validation(format!(
            "Leave type {} does not allow half days",
            leave_type.code
        )));
    }
    if input.start_date.year() != input.end_date.year() {
        return Err(Error::Validation(
            "A leave request may not span calendar years; file one per year".into(),
        ));
    }
    Ok(())
}

fn require_manage(actor: &LeaveActor) -> Result<()> {
    if actor.can_manage() {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

/// Admin/hr or the employee's manager, never the employee themselves.
fn authorize_review(actor: &LeaveActor, employee: &Employee) -> Result<()> {
    if employee.id == actor.employee_id {
        return Err(Error::Forbidden);
    }
    if actor.can_manage() || actor.is_manager_of(employee) {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

fn authorize_owner(actor: &LeaveActor, request: &LeaveRequest) -> Result<()> {
    if request.employee_id == actor.employee_id || actor.can_manage() {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

/// Non-negative multiple of half a day.
fn ensure_day_quantity(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 || (value * 2.0).fract() != 0.0 {
        return Err(Error::Validation(format!(
            "{} must be a non-negative multiple of 0.5",
            field
        )));
    }
    Ok(())
}

/// Balance years outside this range are rejected.
const YEAR_RANGE: std::ops::RangeInclusive<i64> = 1900..=9999;

fn ensure_year(year: i64) -> Result<i64> {
    if YEAR_RANGE.contains(&year) {
        Ok(year)
    } else {
        Err(Error::Validation(format!(
            "Year must be between {} and {}",
            YEAR_RANGE.start(),
            YEAR_RANGE.end()
        )))
    }
}

fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1);
    let end = NaiveDate::from_ymd_opt(year, 12, 31);
    start
        .zip(end)
        .ok_or_else(|| Error::Validation(format!("Invalid year {}", year)))
}
