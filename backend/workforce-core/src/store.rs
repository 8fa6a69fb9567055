// src/store.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{io_context, AppError};
use crate::jobs;
use crate::models::*;

/// Rows keyed by an auto-incremented id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table<T> {
    next_id: Id,
    rows: BTreeMap<Id, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    pub fn insert_with(&mut self, build: impl FnOnce(Id) -> T) -> &mut T {
        self.next_id += 1;
        let id = self.next_id;
        self.rows.entry(id).or_insert(build(id))
    }

    pub fn get(&self, id: Id) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    pub fn find(&self, id: Id, entity: &'static str) -> Result<&T, AppError> {
        self.rows.get(&id).ok_or_else(|| AppError::not_found(entity, id))
    }

    pub fn find_mut(&mut self, id: Id, entity: &'static str) -> Result<&mut T, AppError> {
        self.rows
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(entity, id))
    }

    pub fn remove(&mut self, id: Id) -> Option<T> {
        self.rows.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.rows.values_mut()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    pub staff: Table<StaffUser>,
    pub employees: Table<Employee>,
    pub attendance: Table<Attendance>,
    pub schedules: Table<Schedule>,
    pub workloads: Table<Workload>,
    pub permits: Table<Permit>,
    pub bank_change_requests: Table<BankAccountChangeRequest>,
    pub bank_change_logs: Table<BankAccountChangeLog>,
    pub lunch_coupons: Table<LunchCoupon>,
    pub test_assignments: Table<EmployeeTestAssignment>,
    pub test_results: Table<TestResult>,
    pub trained_models: Table<TrainedModel>,
    pub notifications: Table<Notification>,
    /// Keyed by employee id.
    pub priority_labels: BTreeMap<Id, PriorityLabel>,
    /// Keyed by job name.
    pub cron_settings: BTreeMap<String, CronJobSetting>,
}

impl Tables {
    /// Adds a setting row for every known job that has none yet.
    pub fn seed_defaults(&mut self) {
        for (name, description) in jobs::JOB_CATALOG {
            self.cron_settings
                .entry(name.to_string())
                .or_insert_with(|| CronJobSetting {
                    name: name.to_string(),
                    description: description.to_string(),
                    enabled: true,
                    last_run_at: None,
                    last_outcome: None,
                });
        }
    }

    pub fn employee(&self, id: Id) -> Result<&Employee, AppError> {
        self.employees.find(id, "Employee")
    }

    pub fn employee_mut(&mut self, id: Id) -> Result<&mut Employee, AppError> {
        self.employees.find_mut(id, "Employee")
    }

    pub fn employee_by_nik(&self, nik: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.nik == nik)
    }

    pub fn staff_by_email(&self, email: &str) -> Option<&StaffUser> {
        self.staff
            .iter()
            .find(|s| s.email.eq_ignore_ascii_case(email))
    }
}

/// In-memory tables behind one mutex, optionally snapshotted to a JSON file
/// after every committed transaction.
#[derive(Clone)]
pub struct Database {
    tables: Arc<Mutex<Tables>>,
    snapshot_path: Option<Arc<PathBuf>>,
}

impl Database {
    pub fn in_memory() -> Self {
        let mut tables = Tables::default();
        tables.seed_defaults();
        Self {
            tables: Arc::new(Mutex::new(tables)),
            snapshot_path: None,
        }
    }

    pub fn open(path: &Path) -> Result<Self, AppError> {
        let mut tables = match load_snapshot(path)? {
            Some(tables) => {
                info!(
                    "Loaded data snapshot {:?}: {} employees, {} staff",
                    path,
                    tables.employees.len(),
                    tables.staff.len()
                );
                tables
            }
            None => {
                info!("No data snapshot at {:?}, starting empty", path);
                Tables::default()
            }
        };
        tables.seed_defaults();
        Ok(Self {
            tables: Arc::new(Mutex::new(tables)),
            snapshot_path: Some(Arc::new(path.to_path_buf())),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::LockError("data tables mutex poisoned".to_string()))
    }

    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R, AppError> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    /// Runs `f` against a working copy. The copy replaces the live tables only
    /// when `f` succeeds and the snapshot (if any) was written.
    pub fn transaction<R>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        match f(&mut working) {
            Ok(out) => {
                if let Some(path) = &self.snapshot_path {
                    save_snapshot(path, &working)?;
                }
                *guard = working;
                Ok(out)
            }
            Err(e) => {
                debug!("Transaction rolled back: {}", e);
                Err(e)
            }
        }
    }

    /// Like `transaction`, except that a failed snapshot write still keeps the
    /// change in memory. It reaches disk with the next successful commit.
    pub fn commit_in_memory_on_write_error(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<(), AppError>,
    ) -> Result<(), AppError> {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        f(&mut working)?;
        let saved = match &self.snapshot_path {
            Some(path) => save_snapshot(path, &working),
            None => Ok(()),
        };
        *guard = working;
        if let Err(e) = saved {
            warn!("Snapshot write failed, change kept in memory only: {}", e);
        }
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> Result<Option<Tables>, AppError> {
    if !path.exists() {
        return Ok(None);
    }
    let json_string = fs::read_to_string(path)
        .map_err(|e| io_context(e, format!("Failed to read data snapshot: {:?}", path)))?;
    let tables: Tables = serde_json::from_str(&json_string)?;
    Ok(Some(tables))
}

fn save_snapshot(path: &Path, tables: &Tables) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                io_context(e, format!("Failed to create snapshot directory: {:?}", parent))
            })?;
        }
    }
    let json_string = serde_json::to_string_pretty(tables)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json_string.as_bytes())
        .map_err(|e| io_context(e, format!("Failed to write data snapshot: {:?}", tmp_path)))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        warn!("Could not move snapshot into place: {}", e);
        io_context(e, format!("Failed to replace data snapshot: {:?}", path))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_employee(id: Id) -> Employee {
        Employee {
            id,
            nik: "3201010101010001".to_string(),
            name: "Siti".to_string(),
            department: "Ops".to_string(),
            position: "Operator".to_string(),
            hired_on: NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(),
            bank_name: None,
            bank_account: None,
            bank_holder: None,
            password_hash: String::new(),
            active: true,
            on_leave: false,
            retired_at: None,
            created_at: NaiveDate::from_ymd_opt(2020, 1, 6)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn ids_increase_and_are_never_reused() {
        let mut table: Table<Employee> = Table::default();
        let first = table.insert_with(sample_employee).id;
        let second = table.insert_with(sample_employee).id;
        table.remove(second);
        let third = table.insert_with(sample_employee).id;
        assert_eq!((first, second, third), (1, 2, 3));
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = Database::in_memory();
        let result: Result<(), AppError> = db.transaction(|t| {
            t.employees.insert_with(sample_employee);
            Err(AppError::Conflict("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(db.read(|t| t.employees.len()).unwrap(), 0);

        db.transaction(|t| {
            t.employees.insert_with(sample_employee);
            Ok(())
        })
        .unwrap();
        assert_eq!(db.read(|t| t.employees.len()).unwrap(), 1);
    }

    #[test]
    fn snapshot_survives_reopen() {
        let path = std::env::temp_dir().join(format!(
            "workforce_store_test_{}.json",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);

        let db = Database::open(&path).unwrap();
        db.transaction(|t| {
            t.employees.insert_with(sample_employee);
            Ok(())
        })
        .unwrap();

        let reopened = Database::open(&path).unwrap();
        let nik = reopened
            .read(|t| t.employee(1).map(|e| e.nik.clone()))
            .unwrap()
            .unwrap();
        assert_eq!(nik, "3201010101010001");
        assert!(reopened
            .read(|t| t.cron_settings.len())
            .unwrap()
            > 0);

        let _ = fs::remove_file(&path);
    }
}
