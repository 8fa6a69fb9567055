// src/bank_accounts.rs
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, Validator};
use crate::models::{
    ApprovalStatus, BankAccountChangeLog, BankAccountChangeRequest, Id,
};
use crate::notifications::notify;
use crate::permits::{ensure_transition, Review};
use crate::store::Database;

static ACCOUNT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{6,20}$").expect("account number pattern compiles"));

#[derive(Debug, Clone, Deserialize)]
pub struct NewBankAccountChange {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
}

pub fn request_change(
    db: &Database,
    employee_id: Id,
    input: NewBankAccountChange,
    now: NaiveDateTime,
) -> Result<BankAccountChangeRequest, AppError> {
    let account_number: String = input
        .account_number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    Validator::new()
        .require(&input.bank_name, "bank_name")
        .require(&input.account_holder, "account_holder")
        .check(
            ACCOUNT_NUMBER.is_match(&account_number),
            "account_number",
            "The account number must be between 6 and 20 digits.",
        )
        .finish()?;

    let request = db.transaction(|t| {
        let employee = t.employee(employee_id)?;
        if employee.bank_account.as_deref() == Some(account_number.as_str())
            && employee.bank_name.as_deref() == Some(input.bank_name.trim())
        {
            return Err(AppError::invalid(
                "account_number",
                "The new account is the same as the current one.",
            ));
        }
        let pending = t
            .bank_change_requests
            .iter()
            .any(|r| r.employee_id == employee_id && r.status == ApprovalStatus::Pending);
        if pending {
            return Err(AppError::Conflict(
                "a bank account change is already waiting for approval".to_string(),
            ));
        }
        let request = t.bank_change_requests.insert_with(|id| BankAccountChangeRequest {
            id,
            employee_id,
            bank_name: input.bank_name.trim().to_string(),
            account_number: account_number.clone(),
            account_holder: input.account_holder.trim().to_string(),
            status: ApprovalStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_note: None,
            created_at: now,
        });
        Ok(request.clone())
    })?;
    info!(
        "Employee {} requested bank account change {}",
        employee_id, request.id
    );
    Ok(request)
}

/// Approval copies the new account onto the employee and appends a change log.
pub fn review(
    db: &Database,
    staff_id: Id,
    request_id: Id,
    review: Review,
    now: NaiveDateTime,
) -> Result<BankAccountChangeRequest, AppError> {
    let target = review.decision.target();
    let request = db.transaction(|t| {
        let request = t
            .bank_change_requests
            .find_mut(request_id, "Bank account change request")?;
        ensure_transition("bank account change request", request.status, target)?;
        request.status = target;
        request.reviewed_by = Some(staff_id);
        request.reviewed_at = Some(now);
        request.review_note = review.note.clone();
        let request = request.clone();

        if target == ApprovalStatus::Approved {
            let employee = t.employee_mut(request.employee_id)?;
            let old_bank_name = employee.bank_name.replace(request.bank_name.clone());
            let old_account_number = employee.bank_account.replace(request.account_number.clone());
            employee.bank_holder = Some(request.account_holder.clone());
            t.bank_change_logs.insert_with(|id| BankAccountChangeLog {
                id,
                employee_id: request.employee_id,
                request_id: request.id,
                old_bank_name,
                old_account_number,
                new_bank_name: request.bank_name.clone(),
                new_account_number: request.account_number.clone(),
                approved_by: staff_id,
                changed_at: now,
            });
        }
        notify(
            t,
            request.employee_id,
            format!(
                "Your bank account change to {} {} was {}.",
                request.bank_name, request.account_number, request.status
            ),
            now,
        );
        Ok(request)
    })?;
    info!(
        "Staff {} {} bank account change {}",
        staff_id, request.status, request.id
    );
    Ok(request)
}

pub fn list_requests(
    db: &Database,
    status: Option<ApprovalStatus>,
) -> Result<Vec<BankAccountChangeRequest>, AppError> {
    db.read(|t| {
        t.bank_change_requests
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect()
    })
}

pub fn requests_for_employee(
    db: &Database,
    employee_id: Id,
) -> Result<Vec<BankAccountChangeRequest>, AppError> {
    db.read(|t| {
        t.bank_change_requests
            .iter()
            .filter(|r| r.employee_id == employee_id)
            .cloned()
            .collect()
    })
}

pub fn change_log(db: &Database, employee_id: Id) -> Result<Vec<BankAccountChangeLog>, AppError> {
    db.read(|t| {
        t.bank_change_logs
            .iter()
            .filter(|l| l.employee_id == employee_id)
            .cloned()
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permits::Decision;
    use crate::test_support::{seed_employee, setup};

    fn mandiri() -> NewBankAccountChange {
        NewBankAccountChange {
            bank_name: "Mandiri".to_string(),
            account_number: "137-00-1234567".to_string(),
            account_holder: "Siti Aminah".to_string(),
        }
    }

    #[test]
    fn approval_applies_account_and_logs_old_values() {
        let (db, clock) = setup("2024-06-03 10:00:00");
        let id = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let request = request_change(&db, id, mandiri(), clock.now()).unwrap();
        assert_eq!(request.account_number, "137001234567");

        review(
            &db,
            9,
            request.id,
            Review {
                decision: Decision::Approve,
                note: None,
            },
            clock.now(),
        )
        .unwrap();

        let employee = db.read(|t| t.employee(id).unwrap().clone()).unwrap();
        assert_eq!(employee.bank_name.as_deref(), Some("Mandiri"));
        assert_eq!(employee.bank_account.as_deref(), Some("137001234567"));

        let log = change_log(&db, id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].old_bank_name.as_deref(), Some("BCA"));
        assert_eq!(log[0].old_account_number.as_deref(), Some("1234567890"));
        assert_eq!(log[0].approved_by, 9);
    }

    #[test]
    fn rejection_leaves_employee_untouched_and_one_pending_at_a_time() {
        let (db, clock) = setup("2024-06-03 10:00:00");
        let id = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let request = request_change(&db, id, mandiri(), clock.now()).unwrap();
        assert!(matches!(
            request_change(&db, id, mandiri(), clock.now()),
            Err(AppError::Conflict(_))
        ));

        review(
            &db,
            9,
            request.id,
            Review {
                decision: Decision::Reject,
                note: Some("name mismatch".into()),
            },
            clock.now(),
        )
        .unwrap();
        let employee = db.read(|t| t.employee(id).unwrap().clone()).unwrap();
        assert_eq!(employee.bank_name.as_deref(), Some("BCA"));
        assert!(change_log(&db, id).unwrap().is_empty());
    }

    #[test]
    fn account_number_must_be_digits() {
        let (db, clock) = setup("2024-06-03 10:00:00");
        let id = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let mut input = mandiri();
        input.account_number = "12AB".into();
        assert!(matches!(
            request_change(&db, id, input, clock.now()),
            Err(AppError::Validation(_))
        ));
    }
}
