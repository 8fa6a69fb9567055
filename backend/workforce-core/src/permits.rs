// src/permits.rs
//
// Leave (cuti), sick and personal permits: pending -> approved | rejected.
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, Validator};
use crate::models::{ApprovalStatus, Id, Permit, PermitKind};
use crate::notifications::notify;
use crate::store::{Database, Tables};

#[derive(Debug, Clone, Deserialize)]
pub struct NewPermit {
    pub kind: PermitKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target(&self) -> ApprovalStatus {
        match self {
            Decision::Approve => ApprovalStatus::Approved,
            Decision::Reject => ApprovalStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub decision: Decision,
    pub note: Option<String>,
}

/// The only legal moves out of `pending`.
pub fn ensure_transition(
    entity: &'static str,
    from: ApprovalStatus,
    to: ApprovalStatus,
) -> Result<(), AppError> {
    match (from, to) {
        (ApprovalStatus::Pending, ApprovalStatus::Approved)
        | (ApprovalStatus::Pending, ApprovalStatus::Rejected)
        | (ApprovalStatus::Pending, ApprovalStatus::Cancelled) => Ok(()),
        _ => Err(AppError::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

pub fn submit(
    db: &Database,
    employee_id: Id,
    input: NewPermit,
    now: NaiveDateTime,
) -> Result<Permit, AppError> {
    Validator::new()
        .require(&input.reason, "reason")
        .check(
            input.end_date >= input.start_date,
            "end_date",
            "The end date must be a date after or equal to start date.",
        )
        .finish()?;

    let permit = db.transaction(|t| {
        let employee = t.employee(employee_id)?;
        if !employee.can_log_in() {
            return Err(AppError::Forbidden("employee is not active".to_string()));
        }
        let overlapping = t.permits.iter().any(|p| {
            p.employee_id == employee_id
                && matches!(p.status, ApprovalStatus::Pending | ApprovalStatus::Approved)
                && p.overlaps(input.start_date, input.end_date)
        });
        if overlapping {
            return Err(AppError::invalid(
                "start_date",
                "The requested dates overlap another pending or approved permit.",
            ));
        }
        let permit = t.permits.insert_with(|id| Permit {
            id,
            employee_id,
            kind: input.kind,
            start_date: input.start_date,
            end_date: input.end_date,
            reason: input.reason.trim().to_string(),
            status: ApprovalStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_note: None,
            created_at: now,
        });
        Ok(permit.clone())
    })?;
    info!(
        "Employee {} submitted {:?} permit {} ({} .. {})",
        employee_id, permit.kind, permit.id, permit.start_date, permit.end_date
    );
    Ok(permit)
}

/// Re-derives `on_leave` for one employee from approved leaves covering `today`.
pub fn sync_leave_flag(tables: &mut Tables, employee_id: Id, today: NaiveDate) -> Result<bool, AppError> {
    let on_leave = tables.permits.iter().any(|p| {
        p.employee_id == employee_id
            && p.kind == PermitKind::Leave
            && p.status == ApprovalStatus::Approved
            && p.covers(today)
    });
    let employee = tables.employee_mut(employee_id)?;
    let changed = employee.on_leave != on_leave;
    employee.on_leave = on_leave;
    Ok(changed)
}

pub fn review(
    db: &Database,
    staff_id: Id,
    permit_id: Id,
    review: Review,
    now: NaiveDateTime,
) -> Result<Permit, AppError> {
    let target = review.decision.target();
    let permit = db.transaction(|t| {
        let permit = t.permits.find_mut(permit_id, "Permit")?;
        ensure_transition("permit", permit.status, target)?;
        permit.status = target;
        permit.reviewed_by = Some(staff_id);
        permit.reviewed_at = Some(now);
        permit.review_note = review.note.clone();
        let permit = permit.clone();

        if target == ApprovalStatus::Approved && permit.kind == PermitKind::Leave {
            sync_leave_flag(t, permit.employee_id, now.date())?;
        }
        notify(
            t,
            permit.employee_id,
            format!(
                "Your {:?} permit for {} to {} was {}.",
                permit.kind, permit.start_date, permit.end_date, permit.status
            ),
            now,
        );
        Ok(permit)
    })?;
    info!(
        "Staff {} {} permit {}",
        staff_id, permit.status, permit.id
    );
    Ok(permit)
}

pub fn cancel(
    db: &Database,
    employee_id: Id,
    permit_id: Id,
) -> Result<Permit, AppError> {
    db.transaction(|t| {
        let permit = t
            .permits
            .get_mut(permit_id)
            .filter(|p| p.employee_id == employee_id)
            .ok_or_else(|| AppError::not_found("Permit", permit_id))?;
        ensure_transition("permit", permit.status, ApprovalStatus::Cancelled)?;
        permit.status = ApprovalStatus::Cancelled;
        warn!("Employee {} cancelled permit {}", employee_id, permit_id);
        Ok(permit.clone())
    })
}

pub fn list_for_employee(db: &Database, employee_id: Id) -> Result<Vec<Permit>, AppError> {
    db.read(|t| {
        let mut rows: Vec<Permit> = t
            .permits
            .iter()
            .filter(|p| p.employee_id == employee_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        rows
    })
}

pub fn list(db: &Database, status: Option<ApprovalStatus>) -> Result<Vec<Permit>, AppError> {
    db.read(|t| {
        t.permits
            .iter()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{d, seed_employee, setup};

    fn leave(start: &str, end: &str) -> NewPermit {
        NewPermit {
            kind: PermitKind::Leave,
            start_date: d(start),
            end_date: d(end),
            reason: "Mudik".to_string(),
        }
    }

    fn approve() -> Review {
        Review {
            decision: Decision::Approve,
            note: None,
        }
    }

    #[test]
    fn only_pending_permits_can_be_reviewed() {
        let (db, clock) = setup("2024-04-01 09:00:00");
        let id = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let permit = submit(&db, id, leave("2024-04-08", "2024-04-10"), clock.now()).unwrap();

        review(&db, 1, permit.id, approve(), clock.now()).unwrap();
        let second = review(
            &db,
            1,
            permit.id,
            Review {
                decision: Decision::Reject,
                note: Some("too late".into()),
            },
            clock.now(),
        );
        assert!(matches!(second, Err(AppError::InvalidTransition { .. })));
        assert!(cancel(&db, id, permit.id).is_err());
    }

    #[test]
    fn approving_leave_covering_today_sets_cuti() {
        let (db, clock) = setup("2024-04-08 09:00:00");
        let id = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let permit = submit(&db, id, leave("2024-04-08", "2024-04-09"), clock.now()).unwrap();
        review(&db, 1, permit.id, approve(), clock.now()).unwrap();

        assert!(db.read(|t| t.employee(id).unwrap().on_leave).unwrap());
        let notes = crate::notifications::list_for_employee(&db, id, true).unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.contains("approved"));
    }

    #[test]
    fn overlapping_and_inverted_ranges_are_invalid() {
        let (db, clock) = setup("2024-04-01 09:00:00");
        let id = seed_employee(&db, &clock, "3201000000000001", "Siti");
        submit(&db, id, leave("2024-04-08", "2024-04-10"), clock.now()).unwrap();

        assert!(matches!(
            submit(&db, id, leave("2024-04-10", "2024-04-12"), clock.now()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            submit(&db, id, leave("2024-04-20", "2024-04-19"), clock.now()),
            Err(AppError::Validation(_))
        ));

        let rejected = submit(&db, id, leave("2024-05-01", "2024-05-01"), clock.now()).unwrap();
        review(
            &db,
            1,
            rejected.id,
            Review {
                decision: Decision::Reject,
                note: None,
            },
            clock.now(),
        )
        .unwrap();
        // a rejected permit no longer blocks the dates
        assert!(submit(&db, id, leave("2024-05-01", "2024-05-02"), clock.now()).is_ok());
        assert_eq!(list(&db, Some(ApprovalStatus::Pending)).unwrap().len(), 2);
    }
}
