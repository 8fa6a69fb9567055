// src/attendance.rs
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{ApprovalStatus, Attendance, AttendanceStatus, Id};
use crate::store::{Database, Tables};

/// Decides present vs. late from the check-in time.
#[derive(Debug, Clone, Copy)]
pub struct AttendancePolicy {
    pub work_start: NaiveTime,
    pub grace: Duration,
}

impl AttendancePolicy {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            work_start: config.work_start_time()?,
            grace: Duration::minutes(config.late_grace_minutes),
        })
    }

    pub fn status_for(&self, check_in: NaiveDateTime) -> AttendanceStatus {
        let deadline = check_in.date().and_time(self.work_start) + self.grace;
        if check_in > deadline {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }
}

pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::invalid("month", "The month is not a valid calendar month."))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| AppError::invalid("month", "The month is out of range."))?;
    Ok((first, next - Duration::days(1)))
}

/// True when an approved permit of the employee covers `date`.
pub fn has_approved_permit(tables: &Tables, employee_id: Id, date: NaiveDate) -> bool {
    tables.permits.iter().any(|p| {
        p.employee_id == employee_id && p.status == ApprovalStatus::Approved && p.covers(date)
    })
}

fn record_for(tables: &Tables, employee_id: Id, date: NaiveDate) -> Option<Id> {
    tables
        .attendance
        .iter()
        .find(|a| a.employee_id == employee_id && a.date == date)
        .map(|a| a.id)
}

pub fn check_in(
    db: &Database,
    policy: &AttendancePolicy,
    employee_id: Id,
    now: NaiveDateTime,
) -> Result<Attendance, AppError> {
    let today = now.date();
    let record = db.transaction(|t| {
        let employee = t.employee(employee_id)?;
        if !employee.can_log_in() {
            return Err(AppError::Forbidden("employee is not active".to_string()));
        }
        if employee.on_leave || has_approved_permit(t, employee_id, today) {
            return Err(AppError::Conflict(
                "employee is on leave (cuti) or has an approved permit today".to_string(),
            ));
        }
        if record_for(t, employee_id, today).is_some() {
            return Err(AppError::Conflict("already checked in today".to_string()));
        }
        let status = policy.status_for(now);
        let record = t.attendance.insert_with(|id| Attendance {
            id,
            employee_id,
            date: today,
            check_in: Some(now),
            check_out: None,
            status,
        });
        Ok(record.clone())
    })?;
    if record.status == AttendanceStatus::Late {
        warn!("Employee {} checked in late at {}", employee_id, now);
    } else {
        info!("Employee {} checked in at {}", employee_id, now);
    }
    Ok(record)
}

pub fn check_out(db: &Database, employee_id: Id, now: NaiveDateTime) -> Result<Attendance, AppError> {
    let record = db.transaction(|t| {
        let id = record_for(t, employee_id, now.date())
            .ok_or_else(|| AppError::Conflict("no check-in recorded today".to_string()))?;
        let record = t.attendance.find_mut(id, "Attendance")?;
        if record.check_in.is_none() {
            return Err(AppError::Conflict("no check-in recorded today".to_string()));
        }
        if record.check_out.is_some() {
            return Err(AppError::Conflict("already checked out today".to_string()));
        }
        record.check_out = Some(now);
        Ok(record.clone())
    })?;
    info!("Employee {} checked out at {}", employee_id, now);
    Ok(record)
}

pub fn history(
    db: &Database,
    employee_id: Id,
    year: i32,
    month: u32,
) -> Result<Vec<Attendance>, AppError> {
    let (first, last) = month_bounds(year, month)?;
    db.read(|t| {
        let mut rows: Vec<Attendance> = t
            .attendance
            .iter()
            .filter(|a| a.employee_id == employee_id && a.date >= first && a.date <= last)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.date);
        rows
    })
}

pub fn worked_hours(record: &Attendance) -> Decimal {
    match (record.check_in, record.check_out) {
        (Some(start), Some(end)) if end > start => {
            (Decimal::from((end - start).num_minutes()) / dec!(60)).round_dp(2)
        }
        _ => Decimal::ZERO,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyRecap {
    pub employee_id: Id,
    pub nik: String,
    pub name: String,
    pub year: i32,
    pub month: u32,
    pub present: u32,
    pub late: u32,
    pub absent: u32,
    pub on_leave: u32,
    pub worked_hours: Decimal,
}

/// One row per employee that is not retired.
pub fn recap_month(db: &Database, year: i32, month: u32) -> Result<Vec<MonthlyRecap>, AppError> {
    let (first, last) = month_bounds(year, month)?;
    db.read(|t| {
        t.employees
            .iter()
            .filter(|e| e.retired_at.is_none())
            .map(|e| {
                let mut recap = MonthlyRecap {
                    employee_id: e.id,
                    nik: e.nik.clone(),
                    name: e.name.clone(),
                    year,
                    month,
                    present: 0,
                    late: 0,
                    absent: 0,
                    on_leave: 0,
                    worked_hours: Decimal::ZERO,
                };
                for a in t
                    .attendance
                    .iter()
                    .filter(|a| a.employee_id == e.id && a.date >= first && a.date <= last)
                {
                    match a.status {
                        AttendanceStatus::Present => recap.present += 1,
                        AttendanceStatus::Late => recap.late += 1,
                        AttendanceStatus::Absent => recap.absent += 1,
                    }
                    recap.worked_hours += worked_hours(a);
                }
                let mut day = first;
                while day <= last {
                    if has_approved_permit(t, e.id, day) {
                        recap.on_leave += 1;
                    }
                    day += Duration::days(1);
                }
                recap
            })
            .collect()
    })
}

/// Attendance rate and late rate over the `days` days ending yesterday.
pub fn rates(tables: &Tables, employee_id: Id, today: NaiveDate, days: i64) -> (f64, f64) {
    let from = today - Duration::days(days);
    let rows: Vec<&Attendance> = tables
        .attendance
        .iter()
        .filter(|a| a.employee_id == employee_id && a.date >= from && a.date < today)
        .collect();
    let scheduled = tables
        .schedules
        .iter()
        .filter(|s| s.employee_id == employee_id && s.date >= from && s.date < today)
        .count();
    let attended = rows
        .iter()
        .filter(|a| a.status != AttendanceStatus::Absent)
        .count();
    let late = rows
        .iter()
        .filter(|a| a.status == AttendanceStatus::Late)
        .count();
    let expected = scheduled.max(rows.len()).max(1) as f64;
    let attendance_rate = (attended as f64 / expected).min(1.0);
    let late_rate = if attended == 0 {
        0.0
    } else {
        late as f64 / attended as f64
    };
    (attendance_rate, late_rate)
}
