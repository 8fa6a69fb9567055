// src/admin_handlers.rs
//
// Handlers behind the staff guard (`/api/admin/...`).
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::StaffSession;
use crate::bank_accounts;
use crate::employees::{self, EmployeeUpdate, NewEmployee, NewStaff};
use crate::error::AppError;
use crate::exports;
use crate::jobs::{self, JobReport};
use crate::lunch_coupons::{self, IssueSummary};
use crate::manpower::{self, Recommendation, TrainingParams};
use crate::models::{
    ApprovalStatus, BankAccountChangeLog, BankAccountChangeRequest, CronJobSetting,
    EmployeeTestAssignment, EmployeeView, Id, LunchCoupon, Permit, PriorityLabel, Schedule,
    StaffView, TestKind, TestResult, TrainedModel, Workload,
};
use crate::permits::{self, Review};
use crate::psychotest::{self, NewAssignment};
use crate::attendance::{self, MonthlyRecap};
use crate::routes::{csv_response, AppState};
use crate::workload::{self, NewSchedule};

#[derive(Deserialize, Debug)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Deserialize, Debug)]
pub struct WeekQuery {
    pub year: i32,
    pub week: u32,
}

#[derive(Deserialize, Debug)]
pub struct StatusQuery {
    pub status: Option<ApprovalStatus>,
}

// --- Employees ---

#[derive(Deserialize, Debug)]
pub struct EmployeeListQuery {
    #[serde(default)]
    pub include_retired: bool,
}

pub async fn list_employees(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<EmployeeListQuery>,
) -> Result<Json<Vec<EmployeeView>>, AppError> {
    Ok(Json(employees::list_employees(&state.db, query.include_retired)?))
}

pub async fn create_employee(
    staff: StaffSession,
    State(state): State<AppState>,
    Json(input): Json<NewEmployee>,
) -> Result<Json<EmployeeView>, AppError> {
    let view = employees::create_employee(&state.db, &state.clock, input)?;
    info!("Staff {} created employee {}", staff.staff_id, view.id);
    Ok(Json(view))
}

pub async fn show_employee(
    _staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<Json<EmployeeView>, AppError> {
    Ok(Json(employees::get_employee(&state.db, id)?))
}

pub async fn update_employee(
    _staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(update): Json<EmployeeUpdate>,
) -> Result<Json<EmployeeView>, AppError> {
    Ok(Json(employees::update_employee(&state.db, id, update)?))
}

pub async fn activate_employee(
    _staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<Json<EmployeeView>, AppError> {
    Ok(Json(employees::set_active(&state.db, &state.sessions, id, true)?))
}

pub async fn deactivate_employee(
    _staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<Json<EmployeeView>, AppError> {
    Ok(Json(employees::set_active(&state.db, &state.sessions, id, false)?))
}

pub async fn retire_employee(
    _staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<Json<EmployeeView>, AppError> {
    Ok(Json(employees::retire_employee(
        &state.db,
        &state.sessions,
        &state.clock,
        id,
    )?))
}

#[derive(Deserialize, Debug)]
pub struct PasswordReset {
    pub password: String,
}

pub async fn reset_password(
    _staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(body): Json<PasswordReset>,
) -> Result<Json<Value>, AppError> {
    employees::reset_password(&state.db, id, &body.password)?;
    Ok(Json(json!({ "message": "Password updated." })))
}

pub async fn bank_account_log(
    _staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<Json<Vec<BankAccountChangeLog>>, AppError> {
    Ok(Json(bank_accounts::change_log(&state.db, id)?))
}

// --- Staff (admin only) ---

pub async fn list_staff(
    staff: StaffSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<StaffView>>, AppError> {
    staff.require_admin()?;
    Ok(Json(employees::list_staff(&state.db)?))
}

pub async fn create_staff(
    staff: StaffSession,
    State(state): State<AppState>,
    Json(input): Json<NewStaff>,
) -> Result<Json<StaffView>, AppError> {
    staff.require_admin()?;
    Ok(Json(employees::create_staff(&state.db, &state.clock, input)?))
}

// --- Attendance, schedules & workload ---

pub async fn attendance_recap(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Vec<MonthlyRecap>>, AppError> {
    Ok(Json(attendance::recap_month(&state.db, query.year, query.month)?))
}

pub async fn week_schedules(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Vec<Schedule>>, AppError> {
    Ok(Json(workload::week_schedules(&state.db, query.year, query.week)?))
}

pub async fn assign_schedule(
    staff: StaffSession,
    State(state): State<AppState>,
    Json(input): Json<NewSchedule>,
) -> Result<Json<Schedule>, AppError> {
    Ok(Json(workload::assign_schedule(&state.db, staff.staff_id, input)?))
}

pub async fn remove_schedule(
    _staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<Json<Schedule>, AppError> {
    Ok(Json(workload::remove_schedule(&state.db, id)?))
}

pub async fn list_workloads(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Vec<Workload>>, AppError> {
    Ok(Json(workload::list_workloads(&state.db, query.year, query.week)?))
}

pub async fn recompute_workloads(
    _staff: StaffSession,
    State(state): State<AppState>,
    Json(week): Json<WeekQuery>,
) -> Result<Json<Vec<Workload>>, AppError> {
    Ok(Json(workload::recompute(
        &state.db,
        week.year,
        week.week,
        state.clock.now(),
    )?))
}

// --- Approvals ---

pub async fn list_permits(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<Permit>>, AppError> {
    Ok(Json(permits::list(&state.db, query.status)?))
}

pub async fn review_permit(
    staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(review): Json<Review>,
) -> Result<Json<Permit>, AppError> {
    Ok(Json(permits::review(
        &state.db,
        staff.staff_id,
        id,
        review,
        state.clock.now(),
    )?))
}

pub async fn list_bank_changes(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<BankAccountChangeRequest>>, AppError> {
    Ok(Json(bank_accounts::list_requests(&state.db, query.status)?))
}

pub async fn review_bank_change(
    staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(review): Json<Review>,
) -> Result<Json<BankAccountChangeRequest>, AppError> {
    Ok(Json(bank_accounts::review(
        &state.db,
        staff.staff_id,
        id,
        review,
        state.clock.now(),
    )?))
}

// --- Lunch coupons ---

#[derive(Deserialize, Debug)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

pub async fn list_coupons(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<LunchCoupon>>, AppError> {
    let date = query.date.unwrap_or_else(|| state.clock.today());
    Ok(Json(lunch_coupons::list_for_date(&state.db, date)?))
}

pub async fn issue_coupons(
    _staff: StaffSession,
    State(state): State<AppState>,
    Json(body): Json<DateQuery>,
) -> Result<Json<IssueSummary>, AppError> {
    let date = body.date.unwrap_or_else(|| state.clock.today());
    Ok(Json(lunch_coupons::issue_for_date(
        &state.db,
        date,
        state.config.lunch_coupon_value,
    )?))
}

#[derive(Deserialize, Debug)]
pub struct RedeemBody {
    pub code: String,
}

pub async fn redeem_coupon(
    _staff: StaffSession,
    State(state): State<AppState>,
    Json(body): Json<RedeemBody>,
) -> Result<Json<LunchCoupon>, AppError> {
    Ok(Json(lunch_coupons::redeem(&state.db, &body.code, state.clock.now())?))
}

// --- Psychotests ---

#[derive(Deserialize, Debug)]
pub struct ResultQuery {
    pub employee_id: Option<Id>,
    pub kind: Option<TestKind>,
}

pub async fn assign_test(
    staff: StaffSession,
    State(state): State<AppState>,
    Json(input): Json<NewAssignment>,
) -> Result<Json<EmployeeTestAssignment>, AppError> {
    Ok(Json(psychotest::assign(
        &state.db,
        staff.staff_id,
        input,
        state.clock.now(),
    )?))
}

pub async fn list_assignments(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<ResultQuery>,
) -> Result<Json<Vec<EmployeeTestAssignment>>, AppError> {
    let mut rows = psychotest::list_assignments(&state.db, query.employee_id)?;
    if let Some(kind) = query.kind {
        rows.retain(|a| a.kind == kind);
    }
    Ok(Json(rows))
}

#[derive(Deserialize, Debug)]
pub struct WarteggReview {
    pub box_scores: Vec<u8>,
}

pub async fn review_wartegg(
    staff: StaffSession,
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(body): Json<WarteggReview>,
) -> Result<Json<TestResult>, AppError> {
    Ok(Json(psychotest::review_wartegg(
        &state.db,
        staff.staff_id,
        id,
        body.box_scores,
        state.clock.now(),
    )?))
}

pub async fn list_results(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<ResultQuery>,
) -> Result<Json<Vec<TestResult>>, AppError> {
    Ok(Json(psychotest::list_results(
        &state.db,
        query.employee_id,
        query.kind,
    )?))
}

// --- Manpower recommender ---

#[derive(Deserialize, Debug)]
pub struct LabelBody {
    pub priority: bool,
}

pub async fn label_employee(
    staff: StaffSession,
    State(state): State<AppState>,
    Path(employee_id): Path<Id>,
    Json(body): Json<LabelBody>,
) -> Result<Json<PriorityLabel>, AppError> {
    Ok(Json(manpower::label(
        &state.db,
        staff.staff_id,
        employee_id,
        body.priority,
        state.clock.now(),
    )?))
}

pub async fn list_labels(
    _staff: StaffSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<PriorityLabel>>, AppError> {
    Ok(Json(manpower::list_labels(&state.db)?))
}

pub async fn train_model(
    staff: StaffSession,
    State(state): State<AppState>,
) -> Result<Json<TrainedModel>, AppError> {
    let trained = manpower::train_and_save(
        &state.db,
        TrainingParams::from(state.config.as_ref()),
        &state.config.model_file,
        state.clock.now(),
    )?;
    info!("Staff {} trained manpower model {}", staff.staff_id, trained.id);
    Ok(Json(trained))
}

#[derive(Deserialize, Debug)]
pub struct TopQuery {
    pub n: Option<usize>,
}

pub async fn recommendations(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    Ok(Json(manpower::recommend(
        &state.db,
        query.n.unwrap_or(10),
        state.clock.today(),
    )?))
}

// --- Scheduled jobs (admin only) ---

pub async fn list_jobs(
    staff: StaffSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<CronJobSetting>>, AppError> {
    staff.require_admin()?;
    Ok(Json(jobs::list_settings(&state.db)?))
}

#[derive(Deserialize, Debug)]
pub struct ToggleBody {
    pub enabled: bool,
}

pub async fn toggle_job(
    staff: StaffSession,
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<ToggleBody>,
) -> Result<Json<CronJobSetting>, AppError> {
    staff.require_admin()?;
    Ok(Json(jobs::set_enabled(&state.db, &name, body.enabled)?))
}

pub async fn run_job(
    staff: StaffSession,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<JobReport>, AppError> {
    staff.require_admin()?;
    Ok(Json(jobs::run_job(&state.db, &state.clock, &name)?))
}

// --- Exports ---

pub async fn export_attendance(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> Result<Response, AppError> {
    let body = exports::attendance_month(&state.db, query.year, query.month)?;
    Ok(csv_response(
        format!("attendance_{}_{:02}.csv", query.year, query.month),
        body,
    ))
}

pub async fn export_workload(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Response, AppError> {
    let body = exports::workload_week(&state.db, query.year, query.week)?;
    Ok(csv_response(
        format!("workload_{}_w{:02}.csv", query.year, query.week),
        body,
    ))
}

pub async fn export_test_results(
    _staff: StaffSession,
    State(state): State<AppState>,
    Query(query): Query<ResultQuery>,
) -> Result<Response, AppError> {
    let body = exports::test_results(&state.db, query.kind)?;
    let name = query.kind.map_or("all", |k| k.as_str());
    Ok(csv_response(format!("psychotest_results_{}.csv", name), body))
}
