// src/auth.rs
//
// Two login guards: staff sign in with email, employees with their NIK.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, NaiveDateTime};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{EmployeeView, Id, StaffRole, StaffView};
use crate::routes::AppState;
use crate::store::Database;

pub const FAILED_LOGIN_MESSAGE: &str = "These credentials do not match our records.";
pub const DEACTIVATED_MESSAGE: &str = "This account has been deactivated.";
const UNAUTHENTICATED_MESSAGE: &str = "Unauthenticated.";
const SALT_LEN: usize = 16;

// --- Passwords ---

pub fn hash_password(password: &str) -> String {
    let salt: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    format!("{}${}", salt, digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => {
            let actual = digest(salt, password);
            actual.len() == expected.len()
                && actual
                    .bytes()
                    .zip(expected.bytes())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
        }
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

// --- Sessions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    Staff,
    Employee,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub guard: Guard,
    pub subject_id: Id,
    pub expires_at: NaiveDateTime,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    ttl: Duration,
    clock: Clock,
}

impl SessionStore {
    pub fn new(ttl_hours: i64, clock: Clock) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::hours(ttl_hours),
            clock,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>, AppError> {
        self.sessions
            .lock()
            .map_err(|_| AppError::LockError("session mutex poisoned".to_string()))
    }

    pub fn issue(&self, guard: Guard, subject_id: Id) -> Result<Session, AppError> {
        let mut bytes = [0u8; 32];
        thread_rng().fill(&mut bytes);
        let session = Session {
            token: URL_SAFE_NO_PAD.encode(bytes),
            guard,
            subject_id,
            expires_at: self.clock.now() + self.ttl,
        };
        let mut sessions = self.lock()?;
        purge_expired(&mut sessions, self.clock.now());
        sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    /// Drops sessions past their expiry; returns how many went.
    pub fn purge_expired(&self) -> Result<usize, AppError> {
        let mut sessions = self.lock()?;
        Ok(purge_expired(&mut sessions, self.clock.now()))
    }

    pub fn resolve(&self, token: &str) -> Result<Session, AppError> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::Authentication(UNAUTHENTICATED_MESSAGE.to_string()))?;
        if self.clock.now() >= session.expires_at {
            sessions.remove(token);
            return Err(AppError::Authentication(
                UNAUTHENTICATED_MESSAGE.to_string(),
            ));
        }
        Ok(session)
    }

    pub fn revoke(&self, token: &str) -> Result<bool, AppError> {
        Ok(self.lock()?.remove(token).is_some())
    }

    /// Drops every session of one subject, e.g. after deactivation.
    pub fn revoke_subject(&self, guard: Guard, subject_id: Id) -> Result<usize, AppError> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, s| !(s.guard == guard && s.subject_id == subject_id));
        Ok(before - sessions.len())
    }
}

fn purge_expired(sessions: &mut HashMap<String, Session>, now: NaiveDateTime) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| s.expires_at > now);
    before - sessions.len()
}

// --- Login ---

pub fn login_staff(
    db: &Database,
    sessions: &SessionStore,
    email: &str,
    password: &str,
) -> Result<(Session, StaffView), AppError> {
    let staff = db.read(|t| t.staff_by_email(email.trim()).cloned())?;
    let staff = match staff {
        Some(s) if verify_password(password, &s.password_hash) => s,
        _ => {
            warn!("Failed staff login for {}", email);
            return Err(AppError::Authentication(FAILED_LOGIN_MESSAGE.to_string()));
        }
    };
    if !staff.active {
        warn!("Deactivated staff {} attempted to log in", staff.id);
        return Err(AppError::Authentication(DEACTIVATED_MESSAGE.to_string()));
    }
    let session = sessions.issue(Guard::Staff, staff.id)?;
    info!("Staff {} logged in", staff.id);
    Ok((session, StaffView::from(&staff)))
}

pub fn login_employee(
    db: &Database,
    sessions: &SessionStore,
    nik: &str,
    password: &str,
) -> Result<(Session, EmployeeView), AppError> {
    let employee = db.read(|t| t.employee_by_nik(nik.trim()).cloned())?;
    let employee = match employee {
        Some(e) if verify_password(password, &e.password_hash) => e,
        _ => {
            warn!("Failed employee login for NIK {}", nik);
            return Err(AppError::Authentication(FAILED_LOGIN_MESSAGE.to_string()));
        }
    };
    if !employee.can_log_in() {
        warn!("Deactivated employee {} attempted to log in", employee.id);
        return Err(AppError::Authentication(DEACTIVATED_MESSAGE.to_string()));
    }
    let session = sessions.issue(Guard::Employee, employee.id)?;
    info!("Employee {} logged in", employee.id);
    Ok((session, EmployeeView::from(&employee)))
}

// --- Extractors ---

fn bearer_token(parts: &Parts) -> Result<String, AppError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .ok_or_else(|| AppError::Authentication(UNAUTHENTICATED_MESSAGE.to_string()))
}

/// An authenticated staff member.
#[derive(Debug, Clone)]
pub struct StaffSession {
    pub staff_id: Id,
    pub role: StaffRole,
}

impl StaffSession {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == StaffRole::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("administrator role required".to_string()))
        }
    }
}

impl FromRequestParts<AppState> for StaffSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)?;
        let session = state.sessions.resolve(&token)?;
        if session.guard != Guard::Staff {
            return Err(AppError::Forbidden("staff access only".to_string()));
        }
        let staff = state
            .db
            .read(|t| t.staff.get(session.subject_id).cloned())?
            .filter(|s| s.active)
            .ok_or_else(|| AppError::Authentication(DEACTIVATED_MESSAGE.to_string()))?;
        Ok(StaffSession {
            staff_id: staff.id,
            role: staff.role,
        })
    }
}

/// An authenticated employee (NIK login).
#[derive(Debug, Clone)]
pub struct EmployeeSession {
    pub employee_id: Id,
}

impl FromRequestParts<AppState> for EmployeeSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)?;
        let session = state.sessions.resolve(&token)?;
        if session.guard != Guard::Employee {
            return Err(AppError::Forbidden("employee access only".to_string()));
        }
        let active = state
            .db
            .read(|t| t.employees.get(session.subject_id).map(|e| e.can_log_in()))?
            .unwrap_or(false);
        if !active {
            state.sessions.revoke(&token)?;
            return Err(AppError::Authentication(DEACTIVATED_MESSAGE.to_string()));
        }
        Ok(EmployeeSession {
            employee_id: session.subject_id,
        })
    }
}

/// Any authenticated user; used by logout.
#[derive(Debug, Clone)]
pub struct AnySession {
    pub session: Session,
}

impl FromRequestParts<AppState> for AnySession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)?;
        let session = state.sessions.resolve(&token)?;
        Ok(AnySession { session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_salted_and_verifiable() {
        let a = hash_password("rahasia123");
        let b = hash_password("rahasia123");
        assert_ne!(a, b);
        assert!(verify_password("rahasia123", &a));
        assert!(verify_password("rahasia123", &b));
        assert!(!verify_password("rahasia124", &a));
        assert!(!verify_password("rahasia123", "no-separator"));
    }

    #[test]
    fn sessions_expire_with_the_clock() {
        let clock = Clock::fixed("2024-05-01 08:00:00");
        let store = SessionStore::new(2, clock.clone());
        let session = store.issue(Guard::Employee, 7).unwrap();

        assert_eq!(store.resolve(&session.token).unwrap().subject_id, 7);
        clock.advance(Duration::hours(2));
        assert!(matches!(
            store.resolve(&session.token),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn issuing_drops_expired_sessions() {
        let clock = Clock::fixed("2024-05-01 08:00:00");
        let store = SessionStore::new(1, clock.clone());
        for id in 0..1000 {
            store.issue(Guard::Employee, id).unwrap();
        }
        clock.advance(Duration::days(30));
        let fresh = store.issue(Guard::Staff, 1).unwrap();

        assert_eq!(store.sessions.lock().unwrap().len(), 1);
        assert!(store.resolve(&fresh.token).is_ok());

        clock.advance(Duration::hours(1));
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert!(store.sessions.lock().unwrap().is_empty());
    }

    #[test]
    fn revoke_subject_only_touches_that_guard() {
        let store = SessionStore::new(1, Clock::fixed("2024-05-01 08:00:00"));
        let employee = store.issue(Guard::Employee, 1).unwrap();
        let staff = store.issue(Guard::Staff, 1).unwrap();

        assert_eq!(store.revoke_subject(Guard::Employee, 1).unwrap(), 1);
        assert!(store.resolve(&employee.token).is_err());
        assert!(store.resolve(&staff.token).is_ok());
    }
}
