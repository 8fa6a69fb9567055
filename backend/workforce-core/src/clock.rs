// src/clock.rs
#[cfg(test)]
use std::sync::{Arc, Mutex};

#[cfg(test)]
use chrono::Duration;
use chrono::{Local, NaiveDate, NaiveDateTime};

/// Source of "now" for the whole service. Tests pin it to a fixed instant.
#[derive(Clone)]
pub enum Clock {
    System,
    #[cfg(test)]
    Fixed(Arc<Mutex<NaiveDateTime>>),
}

impl Clock {
    #[cfg(test)]
    pub fn fixed(datetime_str: &str) -> Self {
        let dt = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_else(|_| panic!("Invalid datetime string: {}", datetime_str));
        Clock::Fixed(Arc::new(Mutex::new(dt)))
    }

    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            #[cfg(test)]
            Clock::Fixed(current) => match current.lock() {
                Ok(guard) => *guard,
                Err(poisoned) => *poisoned.into_inner(),
            },
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Moves a fixed clock; no-op on the system clock.
    #[cfg(test)]
    pub fn set(&self, datetime_str: &str) {
        if let Clock::Fixed(current) = self {
            let dt = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S")
                .unwrap_or_else(|_| panic!("Invalid datetime string: {}", datetime_str));
            if let Ok(mut guard) = current.lock() {
                *guard = dt;
            }
        }
    }

    #[cfg(test)]
    pub fn advance(&self, duration: Duration) {
        if let Clock::Fixed(current) = self {
            if let Ok(mut guard) = current.lock() {
                *guard += duration;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_moves_only_when_told() {
        let clock = Clock::fixed("2024-03-04 07:30:00");
        let shared = clock.clone();
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());

        shared.advance(Duration::hours(20));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());

        shared.set("2024-12-31 23:59:59");
        assert_eq!(clock.now().to_string(), "2024-12-31 23:59:59");
    }
}
