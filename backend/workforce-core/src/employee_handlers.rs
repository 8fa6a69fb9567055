// src/employee_handlers.rs
//
// Self-service handlers for the signed-in employee (`/api/me/...`).
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Datelike;
use serde::Deserialize;

use crate::attendance;
use crate::auth::EmployeeSession;
use crate::bank_accounts::{self, NewBankAccountChange};
use crate::employees;
use crate::error::AppError;
use crate::lunch_coupons;
use crate::models::{
    Attendance, BankAccountChangeRequest, EmployeeTestAssignment, EmployeeView, Id, LunchCoupon,
    Notification, Permit, Schedule, TestResult,
};
use crate::notifications;
use crate::permits::{self, NewPermit};
use crate::psychotest::{self, Submission, TestPaper};
use crate::routes::AppState;
use crate::workload;

pub async fn profile(
    me: EmployeeSession,
    State(state): State<AppState>,
) -> Result<Json<EmployeeView>, AppError> {
    Ok(Json(employees::get_employee(&state.db, me.employee_id)?))
}

#[derive(Deserialize, Debug)]
pub struct HistoryQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

pub async fn attendance_history(
    me: EmployeeSession,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Attendance>>, AppError> {
    let today = state.clock.today();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());
    Ok(Json(attendance::history(&state.db, me.employee_id, year, month)?))
}

pub async fn check_in(
    me: EmployeeSession,
    State(state): State<AppState>,
) -> Result<Json<Attendance>, AppError> {
    Ok(Json(attendance::check_in(
        &state.db,
        &state.policy,
        me.employee_id,
        state.clock.now(),
    )?))
}

pub async fn check_out(
    me: EmployeeSession,
    State(state): State<AppState>,
) -> Result<Json<Attendance>, AppError> {
    Ok(Json(attendance::check_out(
        &state.db,
        me.employee_id,
        state.clock.now(),
    )?))
}

#[derive(Deserialize, Debug)]
pub struct WeekQuery {
    pub year: Option<i32>,
    pub week: Option<u32>,
}

/// Own schedules for one ISO week, the current one by default.
pub async fn schedules(
    me: EmployeeSession,
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Vec<Schedule>>, AppError> {
    let (this_year, this_week) = workload::current_week(state.clock.today());
    let rows = workload::week_schedules(
        &state.db,
        query.year.unwrap_or(this_year),
        query.week.unwrap_or(this_week),
    )?;
    Ok(Json(
        rows.into_iter()
            .filter(|s| s.employee_id == me.employee_id)
            .collect(),
    ))
}

// --- Permits ---

pub async fn list_permits(
    me: EmployeeSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Permit>>, AppError> {
    Ok(Json(permits::list_for_employee(&state.db, me.employee_id)?))
}

pub async fn submit_permit(
    me: EmployeeSession,
    State(state): State<AppState>,
    Json(input): Json<NewPermit>,
) -> Result<Json<Permit>, AppError> {
    Ok(Json(permits::submit(
        &state.db,
        me.employee_id,
        input,
        state.clock.now(),
    )?))
}

pub async fn cancel_permit(
    me: EmployeeSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<Json<Permit>, AppError> {
    Ok(Json(permits::cancel(&state.db, me.employee_id, id)?))
}

// --- Bank account ---

pub async fn list_bank_changes(
    me: EmployeeSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<BankAccountChangeRequest>>, AppError> {
    Ok(Json(bank_accounts::requests_for_employee(
        &state.db,
        me.employee_id,
    )?))
}

pub async fn request_bank_change(
    me: EmployeeSession,
    State(state): State<AppState>,
    Json(input): Json<NewBankAccountChange>,
) -> Result<Json<BankAccountChangeRequest>, AppError> {
    Ok(Json(bank_accounts::request_change(
        &state.db,
        me.employee_id,
        input,
        state.clock.now(),
    )?))
}

pub async fn list_coupons(
    me: EmployeeSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<LunchCoupon>>, AppError> {
    Ok(Json(lunch_coupons::list_for_employee(&state.db, me.employee_id)?))
}

// --- Psychotests ---

pub async fn list_assignments(
    me: EmployeeSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<EmployeeTestAssignment>>, AppError> {
    Ok(Json(psychotest::list_assignments(
        &state.db,
        Some(me.employee_id),
    )?))
}

pub async fn start_test(
    me: EmployeeSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<Json<TestPaper>, AppError> {
    Ok(Json(psychotest::start(
        &state.db,
        me.employee_id,
        id,
        state.clock.now(),
    )?))
}

pub async fn submit_test(
    me: EmployeeSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(submission): Json<Submission>,
) -> Result<Json<TestResult>, AppError> {
    Ok(Json(psychotest::submit(
        &state.db,
        me.employee_id,
        id,
        submission,
        state.clock.now(),
    )?))
}

// --- Notifications ---

#[derive(Deserialize, Debug)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn list_notifications(
    me: EmployeeSession,
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(notifications::list_for_employee(
        &state.db,
        me.employee_id,
        query.unread_only,
    )?))
}

pub async fn mark_notification_read(
    me: EmployeeSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<Json<Notification>, AppError> {
    Ok(Json(notifications::mark_read(
        &state.db,
        me.employee_id,
        id,
        state.clock.now(),
    )?))
}
