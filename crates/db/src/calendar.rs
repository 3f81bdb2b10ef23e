use async_trait::async_trait;
use cadence_core::{Calendar, CalendarError, LeadId, Meeting, MeetingSlot};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};

use crate::repositories::SqlMeetingRepository;
use crate::DbPool;

const SLOT_HOURS: [u32; 2] = [10, 14];
const SLOT_DURATION_MINUTES: u32 = 30;

/// Calendar collaborator backed by the meetings table. Availability policy:
/// the next weekday business-hour slots (10:00 and 14:00), strictly in the
/// future relative to lookup time.
#[derive(Clone)]
pub struct SqlCalendar {
    meetings: SqlMeetingRepository,
}

impl SqlCalendar {
    pub fn new(pool: DbPool) -> Self {
        Self { meetings: SqlMeetingRepository::new(pool) }
    }
}

#[async_trait]
impl Calendar for SqlCalendar {
    async fn available_slots(
        &self,
        _lead_id: Option<&LeadId>,
        count: usize,
    ) -> Result<Vec<MeetingSlot>, CalendarError> {
        Ok(plan_slots(Utc::now(), count))
    }

    async fn create_meeting(
        &self,
        lead_id: &LeadId,
        start: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<Meeting, CalendarError> {
        self.meetings
            .create(lead_id, start, duration_minutes)
            .await
            .map_err(|err| CalendarError::Booking(err.to_string()))
    }
}

/// Upcoming weekday slots after `now`, earliest first, duplicate-free by
/// construction.
pub fn plan_slots(now: DateTime<Utc>, count: usize) -> Vec<MeetingSlot> {
    let mut slots = Vec::with_capacity(count);
    let mut day_offset = 1;

    while slots.len() < count && day_offset <= 14 {
        let date = (now + Duration::days(day_offset)).date_naive();
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            day_offset += 1;
            continue;
        }

        for hour in SLOT_HOURS {
            if slots.len() >= count {
                break;
            }
            let start = Utc
                .with_ymd_and_hms(date.year(), date.month(), date.day(), hour, 0, 0)
                .single()
                .unwrap_or(now + Duration::days(day_offset));
            slots.push(MeetingSlot {
                start,
                duration_minutes: SLOT_DURATION_MINUTES,
                display_text: display_text(day_offset, hour, &date.format("%d/%m").to_string()),
            });
        }

        day_offset += 1;
    }

    slots
}

fn display_text(day_offset: i64, hour: u32, date_label: &str) -> String {
    let day_phrase = match day_offset {
        1 => "Tomorrow".to_string(),
        2 => "The day after tomorrow".to_string(),
        _ => format!("In {day_offset} days"),
    };
    format!("{day_phrase} at {hour}:00 ({date_label})")
}
