use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    DailyAvailability, DayOfWeek, DoctorError, SlotOccupancy, TimeSlotAvailability,
    WeeklyScheduleEntry,
};
use crate::services::{doctor::DoctorService, schedule::ScheduleService};

const OPEN_STATUS: &str = "available";
const OCCUPIED_STATUSES: [&str; 3] = ["booked", "confirmed", "in_progress"];

/// Schedule-derived slot times for one weekday, deduplicated and ordered.
/// Invalid entries are skipped.
pub fn schedule_times_for_day(
    entries: &[WeeklyScheduleEntry],
    day: DayOfWeek,
) -> Vec<(NaiveTime, NaiveTime)> {
    let mut times = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.day_of_week == day) {
        match entry.slot_times() {
            Ok(slots) => {
                for (start, end) in slots {
                    times.entry(start).or_insert(end);
                }
            }
            Err(e) => warn!("Skipping schedule entry {:?}: {}", entry.id, e),
        }
    }
    times.into_iter().collect()
}

/// A time is available when an open slot exists at that start and nothing occupies it.
pub fn annotate_availability(
    times: &[(NaiveTime, NaiveTime)],
    existing: &[SlotOccupancy],
) -> Vec<TimeSlotAvailability> {
    let open: HashSet<NaiveTime> = existing
        .iter()
        .filter(|slot| slot.status == OPEN_STATUS)
        .map(|slot| slot.start_time)
        .collect();
    let occupied: HashSet<NaiveTime> = existing
        .iter()
        .filter(|slot| OCCUPIED_STATUSES.contains(&slot.status.as_str()))
        .map(|slot| slot.start_time)
        .collect();

    times
        .iter()
        .map(|&(start_time, end_time)| TimeSlotAvailability {
            start_time,
            end_time,
            available: open.contains(&start_time) && !occupied.contains(&start_time),
        })
        .collect()
}

pub struct AvailabilityService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    schedules: ScheduleService,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            schedules: ScheduleService::new(config),
        }
    }

    /// Availability of an approved doctor's schedule on one date
    pub async fn get_daily_availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<DailyAvailability, DoctorError> {
        let doctor = self.doctors.get_approved_doctor(doctor_id, auth_token).await?;
        let day = DayOfWeek::from(date.weekday());

        let entries = self.schedules.get_schedule(doctor.id, auth_token).await?;
        let times = schedule_times_for_day(&entries, day);

        let existing = if times.is_empty() {
            Vec::new()
        } else {
            self.slot_occupancy(doctor_id, date, auth_token).await?
        };

        let slots = annotate_availability(&times, &existing);
        debug!(
            "Doctor {} on {}: {} of {} slots available",
            doctor_id,
            date,
            slots.iter().filter(|s| s.available).count(),
            slots.len()
        );

        Ok(DailyAvailability {
            doctor_id: doctor.id,
            date,
            day_of_week: day,
            slots,
        })
    }

    async fn slot_occupancy(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<SlotOccupancy>, DoctorError> {
        let path = format!(
            "/rest/v1/appointment_slots?select=start_time,status&doctor_id=eq.{}&date=eq.{}&status=neq.cancelled",
            doctor_id, date
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(DoctorError::from))
            .collect()
    }
}
