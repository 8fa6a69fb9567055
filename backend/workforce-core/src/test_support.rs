// src/test_support.rs
//
// Shared fixtures for unit tests.
use chrono::NaiveDate;

use crate::auth::hash_password;
use crate::clock::Clock;
use crate::models::{Employee, Id, StaffRole, StaffUser};
use crate::store::Database;

pub const TEST_PASSWORD: &str = "password123";

pub fn d(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
}

pub fn setup(datetime_str: &str) -> (Database, Clock) {
    (Database::in_memory(), Clock::fixed(datetime_str))
}

pub fn seed_employee(db: &Database, clock: &Clock, nik: &str, name: &str) -> Id {
    let now = clock.now();
    let password_hash = hash_password(TEST_PASSWORD);
    db.transaction(|t| {
        Ok(t.employees
            .insert_with(|id| Employee {
                id,
                nik: nik.to_string(),
                name: name.to_string(),
                department: "Produksi".to_string(),
                position: "Operator".to_string(),
                hired_on: d("2021-01-04"),
                bank_name: Some("BCA".to_string()),
                bank_account: Some("1234567890".to_string()),
                bank_holder: Some(name.to_string()),
                password_hash,
                active: true,
                on_leave: false,
                retired_at: None,
                created_at: now,
            })
            .id)
    })
    .expect("seed employee")
}

pub fn seed_staff(db: &Database, clock: &Clock, email: &str, role: StaffRole) -> Id {
    let now = clock.now();
    let password_hash = hash_password(TEST_PASSWORD);
    db.transaction(|t| {
        Ok(t.staff
            .insert_with(|id| StaffUser {
                id,
                email: email.to_string(),
                name: "HR Staff".to_string(),
                role,
                password_hash,
                active: true,
                created_at: now,
            })
            .id)
    })
    .expect("seed staff")
}
