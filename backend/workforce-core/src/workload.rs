// src/workload.rs
//
// Weekly shift schedules and the workload points derived from them.
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::models::{Id, Schedule, Shift, Workload};
use crate::store::{Database, Tables};

/// ≤2 schedules → 1 point, ≤4 → 2, anything more → 3.
pub fn workload_points(schedule_count: u32) -> u8 {
    match schedule_count {
        0..=2 => 1,
        3..=4 => 2,
        _ => 3,
    }
}

pub fn iso_week_bounds(year: i32, week: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
        .ok_or_else(|| AppError::invalid("week", "The week is not a valid ISO week."))?;
    Ok((monday, monday + Duration::days(6)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSchedule {
    pub employee_id: Id,
    pub date: NaiveDate,
    pub shift: Shift,
}

pub fn assign_schedule(
    db: &Database,
    staff_id: Id,
    input: NewSchedule,
) -> Result<Schedule, AppError> {
    let schedule = db.transaction(|t| {
        let employee = t.employee(input.employee_id)?;
        if !employee.can_log_in() {
            return Err(AppError::invalid(
                "employee_id",
                "The selected employee is not active.",
            ));
        }
        let taken = t
            .schedules
            .iter()
            .any(|s| s.employee_id == input.employee_id && s.date == input.date);
        if taken {
            return Err(AppError::Conflict(format!(
                "employee {} already has a shift on {}",
                input.employee_id, input.date
            )));
        }
        let schedule = t.schedules.insert_with(|id| Schedule {
            id,
            employee_id: input.employee_id,
            date: input.date,
            shift: input.shift,
            created_by: staff_id,
        });
        Ok(schedule.clone())
    })?;
    info!(
        "Scheduled employee {} on {} ({:?})",
        schedule.employee_id, schedule.date, schedule.shift
    );
    Ok(schedule)
}

pub fn remove_schedule(db: &Database, id: Id) -> Result<Schedule, AppError> {
    db.transaction(|t| {
        t.schedules
            .remove(id)
            .ok_or_else(|| AppError::not_found("Schedule", id))
    })
}

pub fn week_schedules(db: &Database, year: i32, week: u32) -> Result<Vec<Schedule>, AppError> {
    let (monday, sunday) = iso_week_bounds(year, week)?;
    db.read(|t| {
        let mut rows: Vec<Schedule> = t
            .schedules
            .iter()
            .filter(|s| s.date >= monday && s.date <= sunday)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.date, s.employee_id));
        rows
    })
}

/// Rebuilds the workload rows of one ISO week inside an open transaction.
pub fn recompute_week(
    tables: &mut Tables,
    year: i32,
    week: u32,
    now: NaiveDateTime,
) -> Result<Vec<Workload>, AppError> {
    let (monday, sunday) = iso_week_bounds(year, week)?;
    let employee_ids: Vec<Id> = tables
        .employees
        .iter()
        .filter(|e| e.retired_at.is_none())
        .map(|e| e.id)
        .collect();

    let stale: Vec<Id> = tables
        .workloads
        .iter()
        .filter(|w| w.year == year && w.week == week)
        .map(|w| w.id)
        .collect();
    for id in stale {
        tables.workloads.remove(id);
    }

    let mut rows = Vec::with_capacity(employee_ids.len());
    for employee_id in employee_ids {
        let schedule_count = tables
            .schedules
            .iter()
            .filter(|s| s.employee_id == employee_id && s.date >= monday && s.date <= sunday)
            .count() as u32;
        let row = tables.workloads.insert_with(|id| Workload {
            id,
            employee_id,
            year,
            week,
            schedule_count,
            points: workload_points(schedule_count),
            computed_at: now,
        });
        rows.push(row.clone());
    }
    info!(
        "Recomputed workload for {}-W{:02}: {} employees",
        year,
        week,
        rows.len()
    );
    Ok(rows)
}

pub fn recompute(
    db: &Database,
    year: i32,
    week: u32,
    now: NaiveDateTime,
) -> Result<Vec<Workload>, AppError> {
    db.transaction(|t| recompute_week(t, year, week, now))
}

pub fn list_workloads(db: &Database, year: i32, week: u32) -> Result<Vec<Workload>, AppError> {
    db.read(|t| {
        t.workloads
            .iter()
            .filter(|w| w.year == year && w.week == week)
            .cloned()
            .collect()
    })
}

/// Points of the most recently computed week, if any.
pub fn latest_points(tables: &Tables, employee_id: Id) -> Option<u8> {
    tables
        .workloads
        .iter()
        .filter(|w| w.employee_id == employee_id)
        .max_by_key(|w| (w.year, w.week))
        .map(|w| w.points)
}

pub fn current_week(date: NaiveDate) -> (i32, u32) {
    let iso = date.iso_week();
    (iso.year(), iso.week())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{d, seed_employee, setup};

    #[test]
    fn points_bucket_by_weekly_schedule_count() {
        let expected = [(0, 1), (1, 1), (2, 1), (3, 2), (4, 2), (5, 3), (7, 3)];
        for (count, points) in expected {
            assert_eq!(workload_points(count), points, "count {}", count);
        }
    }

    #[test]
    fn duplicate_shift_on_same_day_is_a_conflict() {
        let (db, clock) = setup("2024-03-04 09:00:00");
        let id = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let input = NewSchedule {
            employee_id: id,
            date: d("2024-03-05"),
            shift: Shift::Morning,
        };
        assign_schedule(&db, 1, input.clone()).unwrap();
        assert!(matches!(
            assign_schedule(&db, 1, input),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn recompute_counts_only_the_requested_week() {
        let (db, clock) = setup("2024-03-04 09:00:00");
        let busy = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let quiet = seed_employee(&db, &clock, "3201000000000002", "Budi");

        // 2024-W10 runs Mon 4 March .. Sun 10 March
        for day in ["2024-03-04", "2024-03-05", "2024-03-06", "2024-03-07", "2024-03-08"] {
            assign_schedule(
                &db,
                1,
                NewSchedule {
                    employee_id: busy,
                    date: d(day),
                    shift: Shift::Night,
                },
            )
            .unwrap();
        }
        assign_schedule(
            &db,
            1,
            NewSchedule {
                employee_id: quiet,
                date: d("2024-03-11"),
                shift: Shift::Morning,
            },
        )
        .unwrap();

        let rows = recompute(&db, 2024, 10, clock.now()).unwrap();
        let busy_row = rows.iter().find(|w| w.employee_id == busy).unwrap();
        let quiet_row = rows.iter().find(|w| w.employee_id == quiet).unwrap();
        assert_eq!((busy_row.schedule_count, busy_row.points), (5, 3));
        assert_eq!((quiet_row.schedule_count, quiet_row.points), (0, 1));

        // recomputing replaces rather than duplicates
        recompute(&db, 2024, 10, clock.now()).unwrap();
        assert_eq!(list_workloads(&db, 2024, 10).unwrap().len(), 2);
        assert_eq!(current_week(d("2024-03-10")), (2024, 10));
    }
}
