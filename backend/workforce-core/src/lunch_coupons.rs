// src/lunch_coupons.rs
use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::{AttendanceStatus, CouponStatus, Id, LunchCoupon};
use crate::store::{Database, Tables};

const CODE_LEN: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct IssueSummary {
    pub date: NaiveDate,
    pub issued: usize,
    pub already_issued: usize,
}

fn new_code(rng: &mut impl Rng, taken: &HashSet<String>) -> String {
    loop {
        let code: String = (0..CODE_LEN)
            .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_uppercase())
            .collect();
        if !taken.contains(&code) {
            return code;
        }
    }
}

/// Issues one coupon per eligible employee for `date`. Running it twice
/// for the same day only issues coupons that are still missing.
pub fn issue_in(
    tables: &mut Tables,
    date: NaiveDate,
    value: Decimal,
    rng: &mut impl Rng,
) -> IssueSummary {
    let checked_in: HashSet<Id> = tables
        .attendance
        .iter()
        .filter(|a| a.date == date && a.check_in.is_some() && a.status != AttendanceStatus::Absent)
        .map(|a| a.employee_id)
        .collect();
    let already: HashSet<Id> = tables
        .lunch_coupons
        .iter()
        .filter(|c| c.date == date)
        .map(|c| c.employee_id)
        .collect();
    let mut codes: HashSet<String> = tables.lunch_coupons.iter().map(|c| c.code.clone()).collect();

    let eligible: Vec<Id> = tables
        .employees
        .iter()
        .filter(|e| e.is_available() && checked_in.contains(&e.id))
        .map(|e| e.id)
        .collect();

    let mut summary = IssueSummary {
        date,
        issued: 0,
        already_issued: 0,
    };
    for employee_id in eligible {
        if already.contains(&employee_id) {
            summary.already_issued += 1;
            continue;
        }
        let code = new_code(rng, &codes);
        codes.insert(code.clone());
        tables.lunch_coupons.insert_with(|id| LunchCoupon {
            id,
            employee_id,
            date,
            code,
            value,
            status: CouponStatus::Issued,
            redeemed_at: None,
        });
        summary.issued += 1;
    }
    summary
}

pub fn issue_for_date(
    db: &Database,
    date: NaiveDate,
    value: Decimal,
) -> Result<IssueSummary, AppError> {
    let summary = db.transaction(|t| Ok(issue_in(t, date, value, &mut rand::thread_rng())))?;
    info!(
        "Lunch coupons for {}: {} issued, {} already present",
        date, summary.issued, summary.already_issued
    );
    Ok(summary)
}

pub fn redeem(db: &Database, code: &str, now: NaiveDateTime) -> Result<LunchCoupon, AppError> {
    let code = code.trim().to_ascii_uppercase();
    db.transaction(|t| {
        let coupon = t
            .lunch_coupons
            .iter_mut()
            .find(|c| c.code == code)
            .ok_or_else(|| AppError::not_found("Lunch coupon", &code))?;
        match coupon.status {
            CouponStatus::Redeemed => {
                return Err(AppError::Conflict("coupon already redeemed".to_string()))
            }
            CouponStatus::Expired => {
                return Err(AppError::Conflict("coupon has expired".to_string()))
            }
            CouponStatus::Issued => {}
        }
        if coupon.date != now.date() {
            warn!("Coupon {} presented on {} but is valid on {}", code, now.date(), coupon.date);
            return Err(AppError::Conflict(format!(
                "coupon is only valid on {}",
                coupon.date
            )));
        }
        coupon.status = CouponStatus::Redeemed;
        coupon.redeemed_at = Some(now);
        info!("Coupon {} redeemed by employee {}", code, coupon.employee_id);
        Ok(coupon.clone())
    })
}

pub fn list_for_employee(db: &Database, employee_id: Id) -> Result<Vec<LunchCoupon>, AppError> {
    db.read(|t| {
        let mut rows: Vec<LunchCoupon> = t
            .lunch_coupons
            .iter()
            .filter(|c| c.employee_id == employee_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows
    })
}

pub fn list_for_date(db: &Database, date: NaiveDate) -> Result<Vec<LunchCoupon>, AppError> {
    db.read(|t| t.lunch_coupons.iter().filter(|c| c.date == date).cloned().collect())
}

/// Unredeemed coupons from days before `today` become expired.
pub fn expire_before(tables: &mut Tables, today: NaiveDate) -> usize {
    let mut expired = 0;
    for coupon in tables.lunch_coupons.iter_mut() {
        if coupon.status == CouponStatus::Issued && coupon.date < today {
            coupon.status = CouponStatus::Expired;
            expired += 1;
        }
    }
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{check_in, AttendancePolicy};
    use crate::config::AppConfig;
    use crate::test_support::{d, seed_employee, setup};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn policy() -> AttendancePolicy {
        AttendancePolicy::from_config(&AppConfig::default()).unwrap()
    }

    #[test]
    fn issues_only_to_checked_in_employees_and_only_once() {
        let (db, clock) = setup("2024-05-06 07:50:00");
        let siti = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let _budi = seed_employee(&db, &clock, "3201000000000002", "Budi");
        check_in(&db, &policy(), siti, clock.now()).unwrap();

        let first = issue_for_date(&db, clock.today(), dec!(25000)).unwrap();
        assert_eq!((first.issued, first.already_issued), (1, 0));
        let second = issue_for_date(&db, clock.today(), dec!(25000)).unwrap();
        assert_eq!((second.issued, second.already_issued), (0, 1));

        let coupons = list_for_employee(&db, siti).unwrap();
        assert_eq!(coupons.len(), 1);
        assert_eq!(coupons[0].value, dec!(25000));
        assert_eq!(coupons[0].code.len(), CODE_LEN);
    }

    #[test]
    fn redeem_once_and_only_on_the_day() {
        let (db, clock) = setup("2024-05-06 07:50:00");
        let siti = seed_employee(&db, &clock, "3201000000000001", "Siti");
        check_in(&db, &policy(), siti, clock.now()).unwrap();
        issue_for_date(&db, clock.today(), dec!(25000)).unwrap();
        let code = list_for_employee(&db, siti).unwrap()[0].code.clone();

        clock.set("2024-05-07 12:00:00");
        assert!(matches!(redeem(&db, &code, clock.now()), Err(AppError::Conflict(_))));

        clock.set("2024-05-06 12:00:00");
        let coupon = redeem(&db, &code.to_lowercase(), clock.now()).unwrap();
        assert_eq!(coupon.status, CouponStatus::Redeemed);
        assert!(matches!(redeem(&db, &code, clock.now()), Err(AppError::Conflict(_))));
        assert!(matches!(redeem(&db, "NOPE", clock.now()), Err(AppError::NotFound { .. })));
    }

    #[test]
    fn generated_codes_are_unique() {
        let (db, clock) = setup("2024-05-06 07:50:00");
        let mut rng = StdRng::seed_from_u64(7);
        for i in 0..20 {
            let id = seed_employee(&db, &clock, &format!("32010000000001{:02}", i), "E");
            check_in(&db, &policy(), id, clock.now()).unwrap();
        }
        let summary = db
            .transaction(|t| Ok(issue_in(t, d("2024-05-06"), dec!(1000), &mut rng)))
            .unwrap();
        assert_eq!(summary.issued, 20);
        let codes: HashSet<String> = list_for_date(&db, d("2024-05-06"))
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes.len(), 20);
    }
}
