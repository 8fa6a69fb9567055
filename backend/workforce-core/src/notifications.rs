// src/notifications.rs
use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::AppError;
use crate::models::{Id, Notification};
use crate::store::{Database, Tables};

/// Queues an in-app notification inside an open transaction.
pub fn notify(tables: &mut Tables, employee_id: Id, message: String, now: NaiveDateTime) {
    debug!("Notification to employee {}: {}", employee_id, message);
    tables.notifications.insert_with(|id| Notification {
        id,
        employee_id,
        message,
        created_at: now,
        read_at: None,
    });
}

/// Newest first.
pub fn list_for_employee(
    db: &Database,
    employee_id: Id,
    unread_only: bool,
) -> Result<Vec<Notification>, AppError> {
    db.read(|t| {
        let mut list: Vec<Notification> = t
            .notifications
            .iter()
            .filter(|n| n.employee_id == employee_id)
            .filter(|n| !unread_only || n.read_at.is_none())
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        list
    })
}

pub fn mark_read(
    db: &Database,
    employee_id: Id,
    notification_id: Id,
    now: NaiveDateTime,
) -> Result<Notification, AppError> {
    db.transaction(|t| {
        let notification = t
            .notifications
            .get_mut(notification_id)
            .filter(|n| n.employee_id == employee_id)
            .ok_or_else(|| AppError::not_found("Notification", notification_id))?;
        if notification.read_at.is_none() {
            notification.read_at = Some(now);
        }
        Ok(notification.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_employee, setup};

    #[test]
    fn employees_only_see_and_mark_their_own() {
        let (db, clock) = setup("2024-02-01 10:00:00");
        let siti = seed_employee(&db, &clock, "3201000000000001", "Siti");
        let budi = seed_employee(&db, &clock, "3201000000000002", "Budi");
        let now = clock.now();
        db.transaction(|t| {
            notify(t, siti, "first".into(), now);
            notify(t, siti, "second".into(), now);
            notify(t, budi, "other".into(), now);
            Ok(())
        })
        .unwrap();

        let list = list_for_employee(&db, siti, false).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].message, "second");

        assert!(mark_read(&db, budi, list[0].id, now).is_err());
        mark_read(&db, siti, list[0].id, now).unwrap();
        assert_eq!(list_for_employee(&db, siti, true).unwrap().len(), 1);
    }
}
