// src/exports.rs
//
// CSV exports for HR reporting.
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::attendance;
use crate::error::{io_context, AppError};
use crate::models::{Id, TestKind};
use crate::psychotest;
use crate::store::Database;
use crate::workload;

fn to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| io_context(e.into_error(), "Failed to flush CSV export"))
}

pub fn attendance_month(db: &Database, year: i32, month: u32) -> Result<Vec<u8>, AppError> {
    let rows = attendance::recap_month(db, year, month)?;
    info!("Exporting attendance recap {}-{:02}: {} rows", year, month, rows.len());
    to_csv(&rows)
}

#[derive(Debug, Serialize)]
struct WorkloadRow {
    employee_id: Id,
    nik: String,
    name: String,
    year: i32,
    week: u32,
    schedule_count: u32,
    points: u8,
}

pub fn workload_week(db: &Database, year: i32, week: u32) -> Result<Vec<u8>, AppError> {
    let workloads = workload::list_workloads(db, year, week)?;
    let rows = db.read(|t| {
        workloads
            .iter()
            .map(|w| {
                let (nik, name) = t
                    .employees
                    .get(w.employee_id)
                    .map(|e| (e.nik.clone(), e.name.clone()))
                    .unwrap_or_default();
                WorkloadRow {
                    employee_id: w.employee_id,
                    nik,
                    name,
                    year: w.year,
                    week: w.week,
                    schedule_count: w.schedule_count,
                    points: w.points,
                }
            })
            .collect::<Vec<_>>()
    })?;
    info!("Exporting workload {}-W{:02}: {} rows", year, week, rows.len());
    to_csv(&rows)
}

#[derive(Debug, Serialize)]
struct ResultRow {
    result_id: Id,
    employee_id: Id,
    nik: String,
    name: String,
    kind: &'static str,
    score: Option<Decimal>,
    submitted_at: NaiveDateTime,
    reviewed_by: Option<Id>,
}

pub fn test_results(db: &Database, kind: Option<TestKind>) -> Result<Vec<u8>, AppError> {
    let results = psychotest::list_results(db, None, kind)?;
    let rows = db.read(|t| {
        results
            .iter()
            .map(|r| {
                let (nik, name) = t
                    .employees
                    .get(r.employee_id)
                    .map(|e| (e.nik.clone(), e.name.clone()))
                    .unwrap_or_default();
                ResultRow {
                    result_id: r.id,
                    employee_id: r.employee_id,
                    nik,
                    name,
                    kind: r.kind.as_str(),
                    score: r.score,
                    submitted_at: r.submitted_at,
                    reviewed_by: r.reviewed_by,
                }
            })
            .collect::<Vec<_>>()
    })?;
    to_csv(&rows)
}
