// src/manpower.rs
//
// Manpower priority recommender: logistic regression over a handful of
// per-employee features, trained by batch gradient descent.
use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attendance;
use crate::config::AppConfig;
use crate::error::{io_context, AppError};
use crate::models::{Employee, Id, PriorityLabel, TrainedModel};
use crate::psychotest;
use crate::store::{Database, Tables};
use crate::workload;

pub const FEATURE_NAMES: [&str; 5] = [
    "workload_points",
    "attendance_rate",
    "late_rate",
    "mean_test_score",
    "tenure_years",
];
/// Look-back window for the attendance features.
pub const RATE_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManpowerModel {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub samples: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// Share of training rows classified correctly.
    pub accuracy: f64,
    pub trained_at: NaiveDateTime,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ManpowerModel {
    fn standardize(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(x, (mean, std))| (x - mean) / std)
            .collect()
    }

    /// Probability that the employee is a priority.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let z: f64 = self
            .standardize(features)
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrainingParams {
    pub epochs: usize,
    pub learning_rate: f64,
}

impl From<&AppConfig> for TrainingParams {
    fn from(config: &AppConfig) -> Self {
        Self {
            epochs: config.training_epochs,
            learning_rate: config.learning_rate,
        }
    }
}

pub fn features_for(tables: &Tables, employee: &Employee, today: NaiveDate) -> Vec<f64> {
    let points = workload::latest_points(tables, employee.id).unwrap_or(0);
    let (attendance_rate, late_rate) =
        attendance::rates(tables, employee.id, today, RATE_WINDOW_DAYS);
    let mean_score = psychotest::mean_score(tables, employee.id)
        .and_then(|s| s.to_f64())
        .unwrap_or(0.0)
        / 100.0;
    let tenure_years = (today - employee.hired_on).num_days().max(0) as f64 / 365.25;
    vec![
        f64::from(points),
        attendance_rate,
        late_rate,
        mean_score,
        tenure_years,
    ]
}

pub fn label(
    db: &Database,
    staff_id: Id,
    employee_id: Id,
    priority: bool,
    now: NaiveDateTime,
) -> Result<PriorityLabel, AppError> {
    db.transaction(|t| {
        t.employee(employee_id)?;
        let label = PriorityLabel {
            employee_id,
            priority,
            labeled_by: staff_id,
            labeled_at: now,
        };
        t.priority_labels.insert(employee_id, label.clone());
        debug!("Employee {} labeled priority={}", employee_id, priority);
        Ok(label)
    })
}

pub fn list_labels(db: &Database) -> Result<Vec<PriorityLabel>, AppError> {
    db.read(|t| t.priority_labels.values().cloned().collect())
}

/// Fits the model on `rows` of (features, label).
pub fn fit(
    rows: &[(Vec<f64>, bool)],
    params: TrainingParams,
    now: NaiveDateTime,
) -> Result<ManpowerModel, AppError> {
    let positives = rows.iter().filter(|(_, y)| *y).count();
    if rows.len() < 2 || positives == 0 || positives == rows.len() {
        return Err(AppError::invalid(
            "labels",
            "Training needs at least one priority and one non-priority label.",
        ));
    }
    let n = rows.len() as f64;
    let width = FEATURE_NAMES.len();

    let mut means = vec![0.0; width];
    for (x, _) in rows {
        for (m, v) in means.iter_mut().zip(x) {
            *m += v / n;
        }
    }
    let mut stds = vec![0.0; width];
    for (x, _) in rows {
        for ((s, v), m) in stds.iter_mut().zip(x).zip(&means) {
            *s += (v - m).powi(2) / n;
        }
    }
    for s in stds.iter_mut() {
        *s = s.sqrt();
        // constant feature
        if *s < 1e-9 {
            *s = 1.0;
        }
    }

    let mut model = ManpowerModel {
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        weights: vec![0.0; width],
        bias: 0.0,
        means,
        stds,
        samples: rows.len(),
        epochs: params.epochs,
        learning_rate: params.learning_rate,
        accuracy: 0.0,
        trained_at: now,
    };
    let standardized: Vec<(Vec<f64>, f64)> = rows
        .iter()
        .map(|(x, y)| (model.standardize(x), if *y { 1.0 } else { 0.0 }))
        .collect();

    for _ in 0..params.epochs {
        let mut grad_w = vec![0.0; width];
        let mut grad_b = 0.0;
        for (x, y) in &standardized {
            let z: f64 = x.iter().zip(&model.weights).map(|(a, w)| a * w).sum::<f64>() + model.bias;
            let error = sigmoid(z) - y;
            for (g, a) in grad_w.iter_mut().zip(x) {
                *g += error * a / n;
            }
            grad_b += error / n;
        }
        for (w, g) in model.weights.iter_mut().zip(&grad_w) {
            *w -= params.learning_rate * g;
        }
        model.bias -= params.learning_rate * grad_b;
    }

    let hits = rows
        .iter()
        .filter(|(x, y)| (model.predict(x) >= 0.5) == *y)
        .count();
    model.accuracy = hits as f64 / n;
    Ok(model)
}

/// Trains on every labeled, non-retired employee and stores a `TrainedModel` row.
/// The row commits only if `persist` accepts the fitted model.
fn train_with(
    db: &Database,
    params: TrainingParams,
    now: NaiveDateTime,
    persist: impl FnOnce(&ManpowerModel) -> Result<(), AppError>,
) -> Result<TrainedModel, AppError> {
    let today = now.date();
    let trained = db.transaction(|t| {
        let rows: Vec<(Vec<f64>, bool)> = t
            .priority_labels
            .values()
            .filter_map(|label| {
                let employee = t.employees.get(label.employee_id)?;
                if employee.retired_at.is_some() {
                    return None;
                }
                Some((features_for(t, employee, today), label.priority))
            })
            .collect();
        let model = fit(&rows, params, now)?;
        persist(&model)?;
        Ok(t.trained_models
            .insert_with(|id| TrainedModel { id, model })
            .clone())
    })?;
    info!(
        "Trained manpower model {} on {} samples, accuracy {:.3}",
        trained.id, trained.model.samples, trained.model.accuracy
    );
    Ok(trained)
}

pub fn save_model(path: &Path, model: &ManpowerModel) -> Result<(), AppError> {
    let json_string = serde_json::to_string_pretty(model)?;
    fs::write(path, json_string.as_bytes())
        .map_err(|e| io_context(e, format!("Failed to write model file: {:?}", path)))?;
    info!("Saved manpower model to {:?}", path);
    Ok(())
}

#[cfg(test)]
pub fn load_model(path: &Path) -> Result<ManpowerModel, AppError> {
    let json_string = fs::read_to_string(path)
        .map_err(|e| io_context(e, format!("Failed to read model file: {:?}", path)))?;
    Ok(serde_json::from_str(&json_string)?)
}

/// Train, then write the weights next to the data snapshot.
pub fn train_and_save(
    db: &Database,
    params: TrainingParams,
    model_file: &Path,
    now: NaiveDateTime,
) -> Result<TrainedModel, AppError> {
    train_with(db, params, now, |model| save_model(model_file, model))
}

pub fn latest_model(db: &Database) -> Result<Option<TrainedModel>, AppError> {
    db.read(|t| t.trained_models.iter().max_by_key(|m| m.id).cloned())
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub employee_id: Id,
    pub nik: String,
    pub name: String,
    pub probability: f64,
    pub features: Vec<f64>,
}

/// Top `n` available employees by predicted priority.
pub fn recommend(db: &Database, n: usize, today: NaiveDate) -> Result<Vec<Recommendation>, AppError> {
    let model = latest_model(db)?
        .ok_or_else(|| AppError::Conflict("no manpower model has been trained yet".to_string()))?
        .model;
    let mut ranked = db.read(|t| {
        t.employees
            .iter()
            .filter(|e| e.is_available())
            .map(|e| {
                let features = features_for(t, e, today);
                Recommendation {
                    employee_id: e.id,
                    nik: e.nik.clone(),
                    name: e.name.clone(),
                    probability: model.predict(&features),
                    features,
                }
            })
            .collect::<Vec<_>>()
    })?;
    ranked.sort_by(|a, b| {
        b.probability
            .total_cmp(&a.probability)
            .then(a.employee_id.cmp(&b.employee_id))
    });
    ranked.truncate(n);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Shift;
    use crate::test_support::{d, seed_employee, setup};
    use crate::workload::{assign_schedule, recompute, NewSchedule};

    fn params() -> TrainingParams {
        TrainingParams {
            epochs: 500,
            learning_rate: 0.5,
        }
    }

    fn at() -> NaiveDateTime {
        d("2024-08-01").and_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn separable_rows_are_learned() {
        let rows = vec![
            (vec![3.0, 0.95, 0.0, 0.9, 4.0], true),
            (vec![3.0, 0.90, 0.1, 0.8, 3.0], true),
            (vec![1.0, 0.50, 0.6, 0.3, 0.5], false),
            (vec![1.0, 0.40, 0.5, 0.2, 1.0], false),
        ];
        let model = fit(&rows, params(), at()).unwrap();
        assert_eq!(model.accuracy, 1.0);
        assert!(model.predict(&rows[0].0) > 0.5);
        assert!(model.predict(&rows[2].0) < 0.5);
        assert_eq!(model.feature_names.len(), model.weights.len());
    }

    #[test]
    fn one_class_is_not_enough() {
        let rows = vec![(vec![1.0; 5], true), (vec![2.0; 5], true)];
        assert!(matches!(fit(&rows, params(), at()), Err(AppError::Validation(_))));
        assert!(fit(&rows[..1], params(), at()).is_err());
    }

    #[test]
    fn recommend_ranks_busy_employee_first() {
        let (db, clock) = setup("2024-08-05 09:00:00");
        let busy = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let quiet = seed_employee(&db, &clock, "3201000000000002", "Budi");
        for day in ["2024-08-05", "2024-08-06", "2024-08-07", "2024-08-08", "2024-08-09"] {
            assign_schedule(
                &db,
                1,
                NewSchedule {
                    employee_id: busy,
                    date: d(day),
                    shift: Shift::Morning,
                },
            )
            .unwrap();
        }
        recompute(&db, 2024, 32, clock.now()).unwrap();

        assert!(recommend(&db, 5, clock.today()).is_err());
        label(&db, 1, busy, true, clock.now()).unwrap();
        label(&db, 1, quiet, false, clock.now()).unwrap();
        let path = std::env::temp_dir().join(format!(
            "manpower_model_rank_{}.json",
            std::process::id()
        ));
        let trained = train_and_save(&db, params(), &path, clock.now()).unwrap();
        assert_eq!(trained.model.samples, 2);
        assert_eq!(load_model(&path).unwrap(), trained.model);
        let _ = fs::remove_file(&path);

        let ranked = recommend(&db, 1, clock.today()).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].employee_id, busy);
    }

    #[test]
    fn unwritable_model_file_keeps_no_row() {
        let (db, clock) = setup("2024-08-05 09:00:00");
        let first = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let second = seed_employee(&db, &clock, "3201000000000002", "Budi");
        label(&db, 1, first, true, clock.now()).unwrap();
        label(&db, 1, second, false, clock.now()).unwrap();

        let missing_dir = std::env::temp_dir()
            .join(format!("manpower_missing_{}", std::process::id()))
            .join("model.json");
        let result = train_and_save(&db, params(), &missing_dir, clock.now());

        assert!(matches!(result, Err(AppError::Io { .. })));
        assert!(latest_model(&db).unwrap().is_none());
    }

    #[test]
    fn model_file_round_trips() {
        let rows = vec![(vec![3.0, 1.0, 0.0, 1.0, 2.0], true), (vec![1.0, 0.5, 0.5, 0.0, 1.0], false)];
        let model = fit(&rows, params(), at()).unwrap();
        let path = std::env::temp_dir().join(format!("manpower_model_test_{}.json", std::process::id()));
        save_model(&path, &model).unwrap();
        assert_eq!(load_model(&path).unwrap(), model);
        let _ = fs::remove_file(&path);
    }
}
