use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Utc};
use std::sync::Mutex;

/// Source of "now" for business rules that depend on the local calendar.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Wall-clock time in the business's time zone.
    fn now_local(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now_local().date()
    }
}

/// Reads the system clock, shifted to a fixed offset when one is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    offset: Option<FixedOffset>,
}

impl SystemClock {
    pub fn new(offset: Option<FixedOffset>) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> NaiveDateTime {
        let now = Utc::now();
        match self.offset {
            Some(offset) => now.with_timezone(&offset).naive_local(),
            None => now.with_timezone(&Local).naive_local(),
        }
    }
}

/// Clock pinned to a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    local: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(local: NaiveDateTime) -> Self {
        Self {
            local: Mutex::new(local),
        }
    }

    pub fn set(&self, local: NaiveDateTime) {
        if let Ok(mut guard) = self.local.lock() {
            *guard = local;
        }
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now_local().and_utc()
    }

    fn now_local(&self) -> NaiveDateTime {
        match self.local.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_its_instant() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let clock = FixedClock::new(at);
        assert_eq!(clock.now_local(), at);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());

        let later = at + chrono::Duration::days(1);
        clock.set(later);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
    }

    #[test]
    fn system_clock_applies_offset() {
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();
        let clock = SystemClock::new(Some(offset));
        let utc = clock.now_utc().naive_utc();
        let local = clock.now_local();
        let diff = (local - utc).num_minutes();
        // allow for the two reads straddling a minute boundary
        assert!((299..=300).contains(&diff), "diff was {diff}");
    }
}
