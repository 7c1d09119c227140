use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};
use thiserror::Error;

/// A visit window must still have this much room before it closes for a
/// same-day booking to be accepted.
pub const SLOT_CLOSING_BUFFER_MINUTES: u32 = 30;

/// A bookable two-hour visit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub label: &'static str,
    start_hour: u32,
    end_hour: u32,
}

impl TimeSlot {
    pub const fn new(label: &'static str, start_hour: u32, end_hour: u32) -> Self {
        Self {
            label,
            start_hour,
            end_hour,
        }
    }

    fn end_minutes(&self) -> u32 {
        self.end_hour * 60
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }
}

/// The fixed visit windows offered for engineer visits: seven two-hour
/// slots spanning 07:00–21:00.
pub const TIME_SLOTS: [TimeSlot; 7] = [
    TimeSlot::new("07:00-09:00", 7, 9),
    TimeSlot::new("09:00-11:00", 9, 11),
    TimeSlot::new("11:00-13:00", 11, 13),
    TimeSlot::new("13:00-15:00", 13, 15),
    TimeSlot::new("15:00-17:00", 15, 17),
    TimeSlot::new("17:00-19:00", 17, 19),
    TimeSlot::new("19:00-21:00", 19, 21),
];

pub fn find_slot(label: &str) -> Option<&'static TimeSlot> {
    TIME_SLOTS.iter().find(|slot| slot.label == label)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleRejection {
    #[error("scheduled date {0} is in the past")]
    DateInPast(NaiveDate),

    #[error("unknown time slot '{0}'")]
    UnknownSlot(String),

    #[error("time slot '{0}' is already closing for today; pick a later window")]
    SlotClosing(String),
}

fn minutes_of_day(now: DateTime<FixedOffset>) -> u32 {
    now.time().hour() * 60 + now.time().minute()
}

/// Whether `slot` can still be booked on `date`, as seen at `now`
/// (service-local time). Future dates accept every slot; today only the
/// windows whose end lies more than the closing buffer away.
pub fn slot_valid_on(slot: &TimeSlot, date: NaiveDate, now: DateTime<FixedOffset>) -> bool {
    let today = now.date_naive();
    if date > today {
        return true;
    }
    if date < today {
        return false;
    }
    minutes_of_day(now) + SLOT_CLOSING_BUFFER_MINUTES < slot.end_minutes()
}

/// Every slot still bookable on `date` as seen at `now`.
pub fn valid_slots(date: NaiveDate, now: DateTime<FixedOffset>) -> Vec<&'static TimeSlot> {
    TIME_SLOTS
        .iter()
        .filter(|slot| slot_valid_on(slot, date, now))
        .collect()
}

/// Validates a requested visit date and optional time slot.
pub fn validate_schedule(
    date: NaiveDate,
    slot: Option<&str>,
    now: DateTime<FixedOffset>,
) -> Result<(), ScheduleRejection> {
    let today = now.date_naive();
    if date < today {
        return Err(ScheduleRejection::DateInPast(date));
    }

    if let Some(label) = slot {
        let slot = find_slot(label)
            .ok_or_else(|| ScheduleRejection::UnknownSlot(label.to_string()))?;
        if !slot_valid_on(slot, date, now) {
            return Err(ScheduleRejection::SlotClosing(label.to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn local(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600 + 1800)
            .unwrap()
            .with_ymd_and_hms(y, m, d, hh, mm, 0)
            .unwrap()
    }

    #[test]
    fn seven_slots_span_seven_to_twenty_one() {
        assert_eq!(TIME_SLOTS.len(), 7);
        assert_eq!(TIME_SLOTS[0].start_hour(), 7);
        assert_eq!(TIME_SLOTS[6].end_hour(), 21);
        for window in TIME_SLOTS.windows(2) {
            assert_eq!(window[0].end_hour(), window[1].start_hour());
        }
    }

    #[test]
    fn past_dates_are_rejected() {
        let now = local(2025, 3, 10, 12, 0);
        let yesterday = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(
            validate_schedule(yesterday, None, now),
            Err(ScheduleRejection::DateInPast(yesterday))
        );
    }

    #[test]
    fn unknown_slot_label_is_rejected() {
        let now = local(2025, 3, 10, 6, 0);
        let today = now.date_naive();
        assert_eq!(
            validate_schedule(today, Some("08:00-10:00"), now),
            Err(ScheduleRejection::UnknownSlot("08:00-10:00".into()))
        );
    }

    // The 07:00-09:00 window closes to bookings at 08:30 (09:00 minus the
    // 30-minute buffer).
    #[test_case(8, 0 => true; "08:00 still books the morning slot")]
    #[test_case(8, 29 => true; "08:29 is the last valid minute")]
    #[test_case(8, 30 => false; "08:30 is already too late")]
    #[test_case(8, 45 => false; "08:45 is rejected")]
    fn same_day_boundary(hh: u32, mm: u32) -> bool {
        let now = local(2025, 3, 10, hh, mm);
        let today = now.date_naive();
        validate_schedule(today, Some("07:00-09:00"), now).is_ok()
    }

    #[test]
    fn future_dates_accept_every_slot() {
        let now = local(2025, 3, 10, 20, 59);
        let tomorrow = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();
        assert_eq!(valid_slots(tomorrow, now).len(), 7);
        for slot in TIME_SLOTS.iter() {
            assert!(validate_schedule(tomorrow, Some(slot.label), now).is_ok());
        }
    }

    #[test]
    fn late_evening_leaves_no_slots_today() {
        let now = local(2025, 3, 10, 20, 31);
        let today = now.date_naive();
        assert!(valid_slots(today, now).is_empty());
    }

    #[test]
    fn midday_keeps_only_later_windows() {
        let now = local(2025, 3, 10, 12, 0);
        let today = now.date_naive();
        let open: Vec<&str> = valid_slots(today, now).iter().map(|s| s.label).collect();
        assert_eq!(
            open,
            vec!["11:00-13:00", "13:00-15:00", "15:00-17:00", "17:00-19:00", "19:00-21:00"]
        );
    }
}
