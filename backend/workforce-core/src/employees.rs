// src/employees.rs
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::auth::{hash_password, Guard, SessionStore};
use crate::clock::Clock;
use crate::error::{AppError, Validator};
use crate::models::{Employee, EmployeeView, Id, StaffRole, StaffUser, StaffView};
use crate::store::Database;

static NIK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{16}$").expect("NIK pattern compiles"));
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn is_valid_nik(nik: &str) -> bool {
    NIK_PATTERN.is_match(nik)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEmployee {
    pub nik: String,
    pub name: String,
    pub department: String,
    pub position: String,
    pub hired_on: NaiveDate,
    pub password: String,
    pub bank_name: Option<String>,
    pub bank_account: Option<String>,
    pub bank_holder: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStaff {
    pub email: String,
    pub name: String,
    pub role: StaffRole,
    pub password: String,
}

pub fn create_employee(
    db: &Database,
    clock: &Clock,
    input: NewEmployee,
) -> Result<EmployeeView, AppError> {
    let nik = input.nik.trim().to_string();
    Validator::new()
        .check(is_valid_nik(&nik), "nik", "The NIK must be exactly 16 digits.")
        .require(&input.name, "name")
        .require(&input.department, "department")
        .require(&input.position, "position")
        .check(
            input.password.len() >= MIN_PASSWORD_LEN,
            "password",
            "The password must be at least 8 characters.",
        )
        .finish()?;

    let password_hash = hash_password(&input.password);
    let now = clock.now();
    let view = db.transaction(|t| {
        if t.employee_by_nik(&nik).is_some() {
            return Err(AppError::invalid("nik", "The NIK has already been taken."));
        }
        let employee = t.employees.insert_with(|id| Employee {
            id,
            nik: nik.clone(),
            name: input.name.trim().to_string(),
            department: input.department.trim().to_string(),
            position: input.position.trim().to_string(),
            hired_on: input.hired_on,
            bank_name: input.bank_name.clone(),
            bank_account: input.bank_account.clone(),
            bank_holder: input.bank_holder.clone(),
            password_hash,
            active: true,
            on_leave: false,
            retired_at: None,
            created_at: now,
        });
        Ok(EmployeeView::from(&*employee))
    })?;
    info!("Created employee {} (NIK {})", view.id, view.nik);
    Ok(view)
}

pub fn list_employees(db: &Database, include_retired: bool) -> Result<Vec<EmployeeView>, AppError> {
    db.read(|t| {
        t.employees
            .iter()
            .filter(|e| include_retired || e.retired_at.is_none())
            .map(EmployeeView::from)
            .collect()
    })
}

pub fn get_employee(db: &Database, id: Id) -> Result<EmployeeView, AppError> {
    db.read(|t| t.employee(id).map(EmployeeView::from))?
}

pub fn update_employee(
    db: &Database,
    id: Id,
    update: EmployeeUpdate,
) -> Result<EmployeeView, AppError> {
    let mut v = Validator::new();
    for (field, value) in [
        ("name", &update.name),
        ("department", &update.department),
        ("position", &update.position),
    ] {
        if let Some(value) = value {
            v.require(value, field);
        }
    }
    v.finish()?;

    db.transaction(|t| {
        let employee = t.employee_mut(id)?;
        if let Some(name) = &update.name {
            employee.name = name.trim().to_string();
        }
        if let Some(department) = &update.department {
            employee.department = department.trim().to_string();
        }
        if let Some(position) = &update.position {
            employee.position = position.trim().to_string();
        }
        Ok(EmployeeView::from(&*employee))
    })
}

/// Deactivating also ends every open session of the employee.
pub fn set_active(
    db: &Database,
    sessions: &SessionStore,
    id: Id,
    active: bool,
) -> Result<EmployeeView, AppError> {
    let view = db.transaction(|t| {
        let employee = t.employee_mut(id)?;
        if employee.retired_at.is_some() && active {
            return Err(AppError::Conflict(
                "a retired employee cannot be reactivated".to_string(),
            ));
        }
        employee.active = active;
        Ok(EmployeeView::from(&*employee))
    })?;
    if !active {
        let dropped = sessions.revoke_subject(Guard::Employee, id)?;
        info!("Deactivated employee {} ({} sessions ended)", id, dropped);
    } else {
        info!("Reactivated employee {}", id);
    }
    Ok(view)
}

pub fn retire_employee(
    db: &Database,
    sessions: &SessionStore,
    clock: &Clock,
    id: Id,
) -> Result<EmployeeView, AppError> {
    let now = clock.now();
    let view = db.transaction(|t| {
        let employee = t.employee_mut(id)?;
        if employee.retired_at.is_none() {
            employee.retired_at = Some(now);
        }
        employee.active = false;
        Ok(EmployeeView::from(&*employee))
    })?;
    sessions.revoke_subject(Guard::Employee, id)?;
    info!("Retired employee {}", id);
    Ok(view)
}

pub fn reset_password(db: &Database, id: Id, password: &str) -> Result<(), AppError> {
    Validator::new()
        .check(
            password.len() >= MIN_PASSWORD_LEN,
            "password",
            "The password must be at least 8 characters.",
        )
        .finish()?;
    let password_hash = hash_password(password);
    db.transaction(|t| {
        t.employee_mut(id)?.password_hash = password_hash;
        Ok(())
    })?;
    info!("Password reset for employee {}", id);
    Ok(())
}

pub fn create_staff(db: &Database, clock: &Clock, input: NewStaff) -> Result<StaffView, AppError> {
    let email = input.email.trim().to_lowercase();
    Validator::new()
        .check(
            EMAIL_PATTERN.is_match(&email),
            "email",
            "The email must be a valid email address.",
        )
        .require(&input.name, "name")
        .check(
            input.password.len() >= MIN_PASSWORD_LEN,
            "password",
            "The password must be at least 8 characters.",
        )
        .finish()?;

    let password_hash = hash_password(&input.password);
    let now = clock.now();
    let view = db.transaction(|t| {
        if t.staff_by_email(&email).is_some() {
            return Err(AppError::invalid("email", "The email has already been taken."));
        }
        let staff = t.staff.insert_with(|id| StaffUser {
            id,
            email: email.clone(),
            name: input.name.trim().to_string(),
            role: input.role,
            password_hash,
            active: true,
            created_at: now,
        });
        Ok(StaffView::from(&*staff))
    })?;
    info!("Created staff user {} ({:?})", view.email, view.role);
    Ok(view)
}

pub fn list_staff(db: &Database) -> Result<Vec<StaffView>, AppError> {
    db.read(|t| t.staff.iter().map(StaffView::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::login_employee;

    fn new_employee(nik: &str) -> NewEmployee {
        NewEmployee {
            nik: nik.to_string(),
            name: "Budi Santoso".to_string(),
            department: "Produksi".to_string(),
            position: "Operator".to_string(),
            hired_on: NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
            password: "password123".to_string(),
            bank_name: None,
            bank_account: None,
            bank_holder: None,
        }
    }

    #[test]
    fn nik_must_be_sixteen_digits() {
        assert!(is_valid_nik("3201234567890001"));
        assert!(!is_valid_nik("320123456789000"));
        assert!(!is_valid_nik("32012345678900a1"));
    }

    #[test]
    fn duplicate_nik_is_rejected() {
        let db = Database::in_memory();
        let clock = Clock::fixed("2024-01-02 09:00:00");
        create_employee(&db, &clock, new_employee("3201234567890001")).unwrap();
        let err = create_employee(&db, &clock, new_employee("3201234567890001")).unwrap_err();
        match err {
            AppError::Validation(bag) => assert!(bag.contains_key("nik")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn deactivated_employee_cannot_log_in() {
        let db = Database::in_memory();
        let clock = Clock::fixed("2024-01-02 09:00:00");
        let sessions = SessionStore::new(8, clock.clone());
        let employee = create_employee(&db, &clock, new_employee("3201234567890001")).unwrap();

        let (session, _) =
            login_employee(&db, &sessions, "3201234567890001", "password123").unwrap();
        set_active(&db, &sessions, employee.id, false).unwrap();

        assert!(sessions.resolve(&session.token).is_err());
        match login_employee(&db, &sessions, "3201234567890001", "password123") {
            Err(AppError::Authentication(message)) => {
                assert_eq!(message, crate::auth::DEACTIVATED_MESSAGE)
            }
            other => panic!("expected deactivated error, got {:?}", other),
        }
    }

    #[test]
    fn retired_employee_stays_inactive() {
        let db = Database::in_memory();
        let clock = Clock::fixed("2024-01-02 09:00:00");
        let sessions = SessionStore::new(8, clock.clone());
        let employee = create_employee(&db, &clock, new_employee("3201234567890001")).unwrap();

        retire_employee(&db, &sessions, &clock, employee.id).unwrap();
        assert!(set_active(&db, &sessions, employee.id, true).is_err());
        assert!(list_employees(&db, false).unwrap().is_empty());
        assert_eq!(list_employees(&db, true).unwrap().len(), 1);
    }
}
