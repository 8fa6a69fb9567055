// src/models.rs
//
// Flat records kept by the data layer. Every row carries its own id plus
// foreign keys to Employee / StaffUser.
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::manpower::ManpowerModel;
use crate::psychotest::{AnswerKey, TestOutcome};

pub type Id = u64;

// --- People ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Admin,
    Hr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffUser {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub role: StaffRole,
    pub password_hash: String,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Id,
    pub nik: String,
    pub name: String,
    pub department: String,
    pub position: String,
    pub hired_on: NaiveDate,
    pub bank_name: Option<String>,
    pub bank_account: Option<String>,
    pub bank_holder: Option<String>,
    pub password_hash: String,
    pub active: bool,
    /// Cuti: currently covered by an approved leave.
    pub on_leave: bool,
    pub retired_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Employee {
    pub fn can_log_in(&self) -> bool {
        self.active && self.retired_at.is_none()
    }

    /// Active, not retired and not on leave.
    pub fn is_available(&self) -> bool {
        self.can_log_in() && !self.on_leave
    }
}

/// Employee as exposed over HTTP; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeView {
    pub id: Id,
    pub nik: String,
    pub name: String,
    pub department: String,
    pub position: String,
    pub hired_on: NaiveDate,
    pub bank_name: Option<String>,
    pub bank_account: Option<String>,
    pub bank_holder: Option<String>,
    pub active: bool,
    pub on_leave: bool,
    pub retired_at: Option<NaiveDateTime>,
}

impl From<&Employee> for EmployeeView {
    fn from(e: &Employee) -> Self {
        Self {
            id: e.id,
            nik: e.nik.clone(),
            name: e.name.clone(),
            department: e.department.clone(),
            position: e.position.clone(),
            hired_on: e.hired_on,
            bank_name: e.bank_name.clone(),
            bank_account: e.bank_account.clone(),
            bank_holder: e.bank_holder.clone(),
            active: e.active,
            on_leave: e.on_leave,
            retired_at: e.retired_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffView {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub role: StaffRole,
    pub active: bool,
}

impl From<&StaffUser> for StaffView {
    fn from(s: &StaffUser) -> Self {
        Self {
            id: s.id,
            email: s.email.clone(),
            name: s.name.clone(),
            role: s.role,
            active: s.active,
        }
    }
}

// --- Attendance & scheduling ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    pub id: Id,
    pub employee_id: Id,
    pub date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Morning,
    Afternoon,
    Night,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Id,
    pub employee_id: Id,
    pub date: NaiveDate,
    pub shift: Shift,
    pub created_by: Id,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub id: Id,
    pub employee_id: Id,
    pub year: i32,
    pub week: u32,
    pub schedule_count: u32,
    pub points: u8,
    pub computed_at: NaiveDateTime,
}

// --- Approval workflows ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitKind {
    /// Cuti
    Leave,
    Sick,
    Personal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permit {
    pub id: Id,
    pub employee_id: Id,
    pub kind: PermitKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: ApprovalStatus,
    pub reviewed_by: Option<Id>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub review_note: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Permit {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountChangeRequest {
    pub id: Id,
    pub employee_id: Id,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub status: ApprovalStatus,
    pub reviewed_by: Option<Id>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub review_note: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountChangeLog {
    pub id: Id,
    pub employee_id: Id,
    pub request_id: Id,
    pub old_bank_name: Option<String>,
    pub old_account_number: Option<String>,
    pub new_bank_name: String,
    pub new_account_number: String,
    pub approved_by: Id,
    pub changed_at: NaiveDateTime,
}

// --- Lunch coupons ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Issued,
    Redeemed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LunchCoupon {
    pub id: Id,
    pub employee_id: Id,
    pub date: NaiveDate,
    pub code: String,
    pub value: Decimal,
    pub status: CouponStatus,
    pub redeemed_at: Option<NaiveDateTime>,
}

// --- Psychotests ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Kraepelin,
    /// Accuracy: spot the differing pair.
    Ketelitian,
    /// Counting / arithmetic.
    Hitungan,
    /// Pattern series.
    Deret,
    Analogy,
    Numeric,
    Disc,
    Personality,
    Wartegg,
}

impl TestKind {
    #[cfg(test)]
    pub const ALL: [TestKind; 9] = [
        TestKind::Kraepelin,
        TestKind::Ketelitian,
        TestKind::Hitungan,
        TestKind::Deret,
        TestKind::Analogy,
        TestKind::Numeric,
        TestKind::Disc,
        TestKind::Personality,
        TestKind::Wartegg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Kraepelin => "kraepelin",
            TestKind::Ketelitian => "ketelitian",
            TestKind::Hitungan => "hitungan",
            TestKind::Deret => "deret",
            TestKind::Analogy => "analogy",
            TestKind::Numeric => "numeric",
            TestKind::Disc => "disc",
            TestKind::Personality => "personality",
            TestKind::Wartegg => "wartegg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    /// Wartegg drawings submitted, waiting for a staff review.
    AwaitingReview,
    Completed,
    Expired,
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::AwaitingReview => "awaiting_review",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeTestAssignment {
    pub id: Id,
    pub employee_id: Id,
    pub kind: TestKind,
    pub assigned_by: Id,
    pub deadline: NaiveDateTime,
    pub status: AssignmentStatus,
    pub seed: u64,
    pub answer_key: Option<AnswerKey>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: Id,
    pub assignment_id: Id,
    pub employee_id: Id,
    pub kind: TestKind,
    /// Percentage for key-based tests, mean box score for Wartegg.
    pub score: Option<Decimal>,
    pub outcome: TestOutcome,
    pub submitted_at: NaiveDateTime,
    pub reviewed_by: Option<Id>,
}

// --- Recommender ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityLabel {
    pub employee_id: Id,
    pub priority: bool,
    pub labeled_by: Id,
    pub labeled_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub id: Id,
    pub model: ManpowerModel,
}

// --- Settings & notifications ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJobSetting {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub last_run_at: Option<NaiveDateTime>,
    pub last_outcome: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Id,
    pub employee_id: Id,
    pub message: String,
    pub created_at: NaiveDateTime,
    pub read_at: Option<NaiveDateTime>,
}
