// src/jobs.rs
//
// Scheduled maintenance jobs. Each one is gated by its CronJobSetting row and
// runs inside a single transaction.
use std::collections::HashSet;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::attendance::has_approved_permit;
use crate::auth::SessionStore;
use crate::clock::Clock;
use crate::error::AppError;
use crate::lunch_coupons;
use crate::models::{Attendance, AttendanceStatus, CronJobSetting, Id};
use crate::permits::sync_leave_flag;
use crate::psychotest;
use crate::store::{Database, Tables};
use crate::workload;

pub const RESET_LEAVE_STATUS: &str = "reset-leave-status";
pub const EXPIRE_LUNCH_COUPONS: &str = "expire-lunch-coupons";
pub const EXPIRE_TEST_ASSIGNMENTS: &str = "expire-test-assignments";
pub const MARK_ABSENT: &str = "mark-absent";
pub const RECOMPUTE_WORKLOAD: &str = "recompute-workload";

/// Every job with its description, in run order.
pub const JOB_CATALOG: [(&str, &str); 5] = [
    (
        RESET_LEAVE_STATUS,
        "Sync the cuti flag with approved leaves covering today",
    ),
    (
        EXPIRE_LUNCH_COUPONS,
        "Expire unredeemed lunch coupons from earlier days",
    ),
    (
        EXPIRE_TEST_ASSIGNMENTS,
        "Expire psychotest assignments past their deadline",
    ),
    (
        MARK_ABSENT,
        "Record yesterday's scheduled employees without attendance as absent",
    ),
    (
        RECOMPUTE_WORKLOAD,
        "Recompute workload points for the current ISO week",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Skipped,
    Completed { affected: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub name: String,
    pub outcome: JobOutcome,
    pub ran_at: NaiveDateTime,
}

fn reset_leave_status(tables: &mut Tables, now: NaiveDateTime) -> Result<usize, AppError> {
    let ids: Vec<Id> = tables
        .employees
        .iter()
        .filter(|e| e.retired_at.is_none())
        .map(|e| e.id)
        .collect();
    let mut changed = 0;
    for id in ids {
        if sync_leave_flag(tables, id, now.date())? {
            changed += 1;
        }
    }
    Ok(changed)
}

fn mark_absent(tables: &mut Tables, now: NaiveDateTime) -> Result<usize, AppError> {
    let yesterday = now.date() - Duration::days(1);
    let recorded: HashSet<Id> = tables
        .attendance
        .iter()
        .filter(|a| a.date == yesterday)
        .map(|a| a.employee_id)
        .collect();
    let missing: Vec<Id> = tables
        .schedules
        .iter()
        .filter(|s| s.date == yesterday && !recorded.contains(&s.employee_id))
        .map(|s| s.employee_id)
        .filter(|id| {
            tables
                .employees
                .get(*id)
                .map_or(false, |e| e.can_log_in())
        })
        .filter(|id| !has_approved_permit(tables, *id, yesterday))
        .collect();
    for employee_id in &missing {
        tables.attendance.insert_with(|id| Attendance {
            id,
            employee_id: *employee_id,
            date: yesterday,
            check_in: None,
            check_out: None,
            status: AttendanceStatus::Absent,
        });
    }
    Ok(missing.len())
}

fn execute(tables: &mut Tables, name: &str, now: NaiveDateTime) -> Result<usize, AppError> {
    match name {
        RESET_LEAVE_STATUS => reset_leave_status(tables, now),
        EXPIRE_LUNCH_COUPONS => Ok(lunch_coupons::expire_before(tables, now.date())),
        EXPIRE_TEST_ASSIGNMENTS => Ok(psychotest::expire_overdue(tables, now)),
        MARK_ABSENT => mark_absent(tables, now),
        RECOMPUTE_WORKLOAD => {
            let (year, week) = workload::current_week(now.date());
            Ok(workload::recompute_week(tables, year, week, now)?.len())
        }
        other => Err(AppError::not_found("Job", other)),
    }
}

fn setting_mut<'a>(tables: &'a mut Tables, name: &str) -> Result<&'a mut CronJobSetting, AppError> {
    tables
        .cron_settings
        .get_mut(name)
        .ok_or_else(|| AppError::not_found("Job", name))
}

/// Runs one job unless its setting disables it. A failing job rolls back and
/// only its outcome is recorded.
pub fn run_job(db: &Database, clock: &Clock, name: &str) -> Result<JobReport, AppError> {
    run_with(db, clock, name, |t, now| execute(t, name, now))
}

fn run_with(
    db: &Database,
    clock: &Clock,
    name: &str,
    job: impl FnOnce(&mut Tables, NaiveDateTime) -> Result<usize, AppError>,
) -> Result<JobReport, AppError> {
    let enabled = db.read(|t| t.cron_settings.get(name).map(|s| s.enabled))?;
    let now = clock.now();
    match enabled {
        None => return Err(AppError::not_found("Job", name)),
        Some(false) => {
            info!("Job '{}' is disabled, skipping", name);
            return Ok(JobReport {
                name: name.to_string(),
                outcome: JobOutcome::Skipped,
                ran_at: now,
            });
        }
        Some(true) => {}
    }

    let result = db.transaction(|t| {
        let affected = job(t, now)?;
        let setting = setting_mut(t, name)?;
        setting.last_run_at = Some(now);
        setting.last_outcome = Some(format!("ok: {} affected", affected));
        Ok(affected)
    });
    match result {
        Ok(affected) => {
            info!("Job '{}' finished: {} rows affected", name, affected);
            Ok(JobReport {
                name: name.to_string(),
                outcome: JobOutcome::Completed { affected },
                ran_at: now,
            })
        }
        Err(e) => {
            error!("Job '{}' failed and was rolled back: {}", name, e);
            // a broken snapshot must not hide the failure from the settings list
            let recorded = db.commit_in_memory_on_write_error(|t| {
                let setting = setting_mut(t, name)?;
                setting.last_run_at = Some(now);
                setting.last_outcome = Some(format!("failed: {}", e));
                Ok(())
            });
            if let Err(record_err) = recorded {
                warn!("Could not record failure of job '{}': {}", name, record_err);
            }
            Err(e)
        }
    }
}

/// Runs every job in catalog order; one failure does not stop the rest.
pub fn run_all(db: &Database, clock: &Clock) -> Vec<Result<JobReport, AppError>> {
    JOB_CATALOG
        .iter()
        .map(|(name, _)| run_job(db, clock, name))
        .collect()
}

pub async fn run_job_loop(db: Database, clock: Clock, sessions: SessionStore, interval_secs: u64) {
    info!("Starting background job loop, every {} seconds", interval_secs);
    loop {
        let failed = run_all(&db, &clock).iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!("{} scheduled job(s) failed this round", failed);
        }
        match sessions.purge_expired() {
            Ok(0) => {}
            Ok(purged) => info!("Purged {} expired session(s)", purged),
            Err(e) => warn!("Could not purge expired sessions: {}", e),
        }
        sleep(StdDuration::from_secs(interval_secs)).await;
    }
}

pub fn list_settings(db: &Database) -> Result<Vec<CronJobSetting>, AppError> {
    db.read(|t| t.cron_settings.values().cloned().collect())
}

pub fn set_enabled(db: &Database, name: &str, enabled: bool) -> Result<CronJobSetting, AppError> {
    let setting = db.transaction(|t| {
        let setting = setting_mut(t, name)?;
        setting.enabled = enabled;
        Ok(setting.clone())
    })?;
    info!("Job '{}' enabled={}", name, enabled);
    Ok(setting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalStatus, Permit, PermitKind, Schedule, Shift};
    use crate::test_support::{d, seed_employee, setup};

    #[test]
    fn disabled_job_is_skipped() {
        let (db, clock) = setup("2024-03-05 01:00:00");
        let id = seed_employee(&db, &clock, "3201000000000001", "Siti");
        db.transaction(|t| {
            t.schedules.insert_with(|sid| Schedule {
                id: sid,
                employee_id: id,
                date: d("2024-03-04"),
                shift: Shift::Morning,
                created_by: 1,
            });
            Ok(())
        })
        .unwrap();

        set_enabled(&db, MARK_ABSENT, false).unwrap();
        let report = run_job(&db, &clock, MARK_ABSENT).unwrap();
        assert_eq!(report.outcome, JobOutcome::Skipped);
        assert_eq!(db.read(|t| t.attendance.len()).unwrap(), 0);
        let setting = db.read(|t| t.cron_settings[MARK_ABSENT].clone()).unwrap();
        assert!(setting.last_run_at.is_none());

        set_enabled(&db, MARK_ABSENT, true).unwrap();
        let report = run_job(&db, &clock, MARK_ABSENT).unwrap();
        assert_eq!(report.outcome, JobOutcome::Completed { affected: 1 });
        // a second run finds the absent row and does nothing
        let report = run_job(&db, &clock, MARK_ABSENT).unwrap();
        assert_eq!(report.outcome, JobOutcome::Completed { affected: 0 });
        let setting = db.read(|t| t.cron_settings[MARK_ABSENT].clone()).unwrap();
        assert_eq!(setting.last_run_at, Some(clock.now()));
    }

    #[test]
    fn unknown_job_is_not_found() {
        let (db, clock) = setup("2024-03-05 01:00:00");
        assert!(matches!(
            run_job(&db, &clock, "defragment"),
            Err(AppError::NotFound { .. })
        ));
        assert!(set_enabled(&db, "defragment", true).is_err());
    }

    #[test]
    fn leave_flag_follows_the_calendar() {
        let (db, clock) = setup("2024-03-04 00:05:00");
        let id = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let now = clock.now();
        db.transaction(|t| {
            t.permits.insert_with(|pid| Permit {
                id: pid,
                employee_id: id,
                kind: PermitKind::Leave,
                start_date: d("2024-03-04"),
                end_date: d("2024-03-05"),
                reason: "family".into(),
                status: ApprovalStatus::Approved,
                reviewed_by: Some(1),
                reviewed_at: Some(now),
                review_note: None,
                created_at: now,
            });
            Ok(())
        })
        .unwrap();

        run_job(&db, &clock, RESET_LEAVE_STATUS).unwrap();
        assert!(db.read(|t| t.employee(id).unwrap().on_leave).unwrap());

        clock.set("2024-03-06 00:05:00");
        run_job(&db, &clock, RESET_LEAVE_STATUS).unwrap();
        assert!(!db.read(|t| t.employee(id).unwrap().on_leave).unwrap());
    }

    #[test]
    fn failing_job_rolls_back_and_records_the_failure() {
        let (db, clock) = setup("2024-03-05 01:00:00");
        let id = seed_employee(&db, &clock, "3201000000000001", "Siti");

        let result = run_with(&db, &clock, MARK_ABSENT, |t, now| {
            t.attendance.insert_with(|aid| Attendance {
                id: aid,
                employee_id: id,
                date: now.date(),
                check_in: None,
                check_out: None,
                status: AttendanceStatus::Absent,
            });
            Err(AppError::Conflict("schedule table is inconsistent".into()))
        });

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(db.read(|t| t.attendance.len()).unwrap(), 0);
        let setting = db.read(|t| t.cron_settings[MARK_ABSENT].clone()).unwrap();
        assert_eq!(setting.last_run_at, Some(clock.now()));
        assert!(setting
            .last_outcome
            .unwrap()
            .starts_with("failed: Conflict: schedule table is inconsistent"));
    }

    #[test]
    fn failure_is_recorded_when_the_snapshot_cannot_be_written() {
        // the snapshot's parent directory is a regular file
        let blocker = std::env::temp_dir().join(format!(
            "workforce_jobs_blocker_{}",
            std::process::id()
        ));
        std::fs::write(&blocker, b"not a directory").unwrap();
        let db = Database::open(&blocker.join("data.json")).unwrap();
        let clock = Clock::fixed("2024-03-05 01:00:00");

        let result = run_with(&db, &clock, RECOMPUTE_WORKLOAD, |_, _| Ok(3));

        assert!(matches!(result, Err(AppError::Io { .. })));
        let setting = db
            .read(|t| t.cron_settings[RECOMPUTE_WORKLOAD].clone())
            .unwrap();
        assert!(setting.last_outcome.unwrap().starts_with("failed: "));
        let _ = std::fs::remove_file(&blocker);
    }

    #[test]
    fn run_all_covers_the_catalog() {
        let (db, clock) = setup("2024-03-04 00:05:00");
        let reports = run_all(&db, &clock);
        assert_eq!(reports.len(), JOB_CATALOG.len());
        assert!(reports.iter().all(|r| r.is_ok()));
        assert_eq!(list_settings(&db).unwrap().len(), JOB_CATALOG.len());
    }
}
