// src/routes.rs
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::admin_handlers as admin;
use crate::attendance::AttendancePolicy;
use crate::auth::{self, AnySession, SessionStore};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::employee_handlers as me;
use crate::error::AppError;
use crate::models::{ApprovalStatus, AssignmentStatus, EmployeeView, StaffView};
use crate::store::Database;

// --- Shared Application State ---
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sessions: SessionStore,
    pub clock: Clock,
    pub config: Arc<AppConfig>,
    pub policy: AttendancePolicy,
}

impl AppState {
    pub fn new(db: Database, clock: Clock, config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;
        let policy = AttendancePolicy::from_config(&config)?;
        Ok(Self {
            sessions: SessionStore::new(config.session_ttl_hours, clock.clone()),
            db,
            clock,
            config: Arc::new(config),
            policy,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/staff/login", post(handle_staff_login))
        .route("/employee/login", post(handle_employee_login))
        .route("/logout", post(handle_logout));

    let admin_routes = Router::new()
        .route("/employees", get(admin::list_employees).post(admin::create_employee))
        .route("/employees/{id}", get(admin::show_employee).patch(admin::update_employee))
        .route("/employees/{id}/activate", post(admin::activate_employee))
        .route("/employees/{id}/deactivate", post(admin::deactivate_employee))
        .route("/employees/{id}/retire", post(admin::retire_employee))
        .route("/employees/{id}/password", put(admin::reset_password))
        .route("/employees/{id}/bank-account-log", get(admin::bank_account_log))
        .route("/staff", get(admin::list_staff).post(admin::create_staff))
        .route("/attendance/recap", get(admin::attendance_recap))
        .route("/schedules", get(admin::week_schedules).post(admin::assign_schedule))
        .route("/schedules/{id}", delete(admin::remove_schedule))
        .route("/workloads", get(admin::list_workloads))
        .route("/workloads/recompute", post(admin::recompute_workloads))
        .route("/permits", get(admin::list_permits))
        .route("/permits/{id}/review", post(admin::review_permit))
        .route("/bank-account-changes", get(admin::list_bank_changes))
        .route("/bank-account-changes/{id}/review", post(admin::review_bank_change))
        .route("/lunch-coupons", get(admin::list_coupons))
        .route("/lunch-coupons/issue", post(admin::issue_coupons))
        .route("/lunch-coupons/redeem", post(admin::redeem_coupon))
        .route(
            "/psychotests/assignments",
            get(admin::list_assignments).post(admin::assign_test),
        )
        .route("/psychotests/assignments/{id}/review", post(admin::review_wartegg))
        .route("/psychotests/results", get(admin::list_results))
        .route("/manpower/labels", get(admin::list_labels))
        .route("/manpower/labels/{employee_id}", put(admin::label_employee))
        .route("/manpower/train", post(admin::train_model))
        .route("/manpower/recommendations", get(admin::recommendations))
        .route("/jobs", get(admin::list_jobs))
        .route("/jobs/{name}", patch(admin::toggle_job))
        .route("/jobs/{name}/run", post(admin::run_job))
        .route("/exports/attendance", get(admin::export_attendance))
        .route("/exports/workload", get(admin::export_workload))
        .route("/exports/test-results", get(admin::export_test_results));

    let employee_routes = Router::new()
        .route("/", get(me::profile))
        .route("/attendance", get(me::attendance_history))
        .route("/attendance/check-in", post(me::check_in))
        .route("/attendance/check-out", post(me::check_out))
        .route("/schedules", get(me::schedules))
        .route("/permits", get(me::list_permits).post(me::submit_permit))
        .route("/permits/{id}/cancel", post(me::cancel_permit))
        .route(
            "/bank-account-changes",
            get(me::list_bank_changes).post(me::request_bank_change),
        )
        .route("/lunch-coupons", get(me::list_coupons))
        .route("/psychotests", get(me::list_assignments))
        .route("/psychotests/{id}/start", post(me::start_test))
        .route("/psychotests/{id}/submit", post(me::submit_test))
        .route("/notifications", get(me::list_notifications))
        .route("/notifications/{id}/read", post(me::mark_notification_read));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .nest("/me", employee_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `text/csv` download with a file name.
pub fn csv_response(filename: String, body: Vec<u8>) -> Response {
    (
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

// --- Auth ---

#[derive(Deserialize, Debug)]
pub struct StaffLogin {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct EmployeeLogin {
    pub nik: String,
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct LoginResponse<T> {
    pub token: String,
    pub expires_at: chrono::NaiveDateTime,
    pub user: T,
}

async fn handle_staff_login(
    State(state): State<AppState>,
    Json(body): Json<StaffLogin>,
) -> Result<Json<LoginResponse<StaffView>>, AppError> {
    let (session, user) = auth::login_staff(&state.db, &state.sessions, &body.email, &body.password)?;
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user,
    }))
}

async fn handle_employee_login(
    State(state): State<AppState>,
    Json(body): Json<EmployeeLogin>,
) -> Result<Json<LoginResponse<EmployeeView>>, AppError> {
    let (session, user) =
        auth::login_employee(&state.db, &state.sessions, &body.nik, &body.password)?;
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user,
    }))
}

async fn handle_logout(
    State(state): State<AppState>,
    AnySession { session }: AnySession,
) -> Result<Json<Value>, AppError> {
    state.sessions.revoke(&session.token)?;
    info!("{:?} {} logged out", session.guard, session.subject_id);
    Ok(Json(json!({ "message": "Logged out." })))
}

// --- Health & status ---

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_status(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let now = state.clock.now();
    let summary = state.db.read(|t| {
        json!({
            "time": now,
            "employees": t.employees.iter().filter(|e| e.retired_at.is_none()).count(),
            "on_leave": t.employees.iter().filter(|e| e.on_leave).count(),
            "pending_permits": t.permits.iter().filter(|p| p.status == ApprovalStatus::Pending).count(),
            "pending_bank_changes": t
                .bank_change_requests
                .iter()
                .filter(|r| r.status == ApprovalStatus::Pending)
                .count(),
            "awaiting_review": t
                .test_assignments
                .iter()
                .filter(|a| a.status == AssignmentStatus::AwaitingReview)
                .count(),
            "jobs": t.cron_settings.values().collect::<Vec<_>>(),
        })
    })?;
    Ok(Json(summary))
}
