// libs/appointment-cell/src/services/generator.rs
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::models::{DayOfWeek, Doctor, DoctorStatus, WeeklyScheduleEntry};
use doctor_cell::services::{DoctorService, ScheduleObserver, ScheduleService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, GenerationReport, NewSlot, SlotKey, SlotStatus};

/// Expands weekly entries into dated slots over `[from, to]`.
///
/// Entries that fail validation are skipped and counted; the remaining entries still
/// cover the whole horizon. A `(date, start)` produced twice yields one slot.
pub fn expand_schedule(
    doctor_id: Uuid,
    entries: &[WeeklyScheduleEntry],
    from: NaiveDate,
    to: NaiveDate,
) -> (Vec<NewSlot>, usize) {
    let mut skipped = 0;
    let mut templates: Vec<(DayOfWeek, Vec<(NaiveTime, NaiveTime)>)> = Vec::new();

    for entry in entries {
        match entry.slot_times() {
            Ok(times) => templates.push((entry.day_of_week, times)),
            Err(e) => {
                warn!("Skipping schedule entry {:?} of doctor {}: {}", entry.id, doctor_id, e);
                skipped += 1;
            }
        }
    }

    let mut seen = HashSet::new();
    let mut slots = Vec::new();

    for date in from.iter_days().take_while(|d| *d <= to) {
        let day = DayOfWeek::from(date.weekday());
        for (_, times) in templates.iter().filter(|(d, _)| *d == day) {
            for &(start_time, end_time) in times {
                if seen.insert((date, start_time)) {
                    slots.push(NewSlot {
                        doctor_id,
                        date,
                        start_time,
                        end_time,
                        status: SlotStatus::Available,
                    });
                }
            }
        }
    }

    (slots, skipped)
}

/// Drops candidates that collide with an existing non-cancelled slot.
pub fn exclude_existing(candidates: Vec<NewSlot>, existing: &HashSet<(NaiveDate, NaiveTime)>) -> Vec<NewSlot> {
    candidates
        .into_iter()
        .filter(|slot| !existing.contains(&(slot.date, slot.start_time)))
        .collect()
}

/// Longest horizon a single generation request may cover.
pub const MAX_HORIZON_WEEKS: i64 = 52;

/// `[today, today + weeks]`, both ends inclusive; `weeks` is clamped to `1..=MAX_HORIZON_WEEKS`.
pub fn default_horizon(today: NaiveDate, weeks: i64) -> (NaiveDate, NaiveDate) {
    (today, today + Duration::weeks(weeks.clamp(1, MAX_HORIZON_WEEKS)))
}

pub struct SlotGenerationService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    schedules: ScheduleService,
    horizon_weeks: i64,
}

impl SlotGenerationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            schedules: ScheduleService::new(config),
            horizon_weeks: config.slot_horizon_weeks,
        }
    }

    pub fn horizon_from_today(&self, weeks: Option<i64>) -> (NaiveDate, NaiveDate) {
        default_horizon(Utc::now().date_naive(), weeks.unwrap_or(self.horizon_weeks))
    }

    /// Generate the doctor's slots over `[from, to]`, skipping times already present.
    pub async fn generate_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<GenerationReport, AppointmentError> {
        if to < from {
            return Err(AppointmentError::ValidationError(format!(
                "Horizon end {} is before start {}",
                to, from
            )));
        }

        let doctor = self.doctors.get_doctor(doctor_id, auth_token).await?;
        let entries = self.schedules.get_schedule(doctor.id, auth_token).await?;

        let (candidates, skipped_entries) = expand_schedule(doctor.id, &entries, from, to);
        debug!(
            "Doctor {}: {} candidate slots between {} and {}",
            doctor.id,
            candidates.len(),
            from,
            to
        );

        let new_slots = if candidates.is_empty() {
            candidates
        } else {
            let existing = self.existing_slot_keys(&doctor, from, to, auth_token).await?;
            exclude_existing(candidates, &existing)
        };

        let created = new_slots.len();
        if created > 0 {
            let rows = serde_json::to_value(&new_slots)?;
            let _: Value = self.supabase.request(
                Method::POST,
                "/rest/v1/appointment_slots",
                Some(auth_token),
                Some(rows),
            ).await?;
        }

        info!(
            "Generated {} slots for doctor {} between {} and {} ({} entries skipped)",
            created, doctor.id, from, to, skipped_entries
        );

        Ok(GenerationReport {
            doctor_id: doctor.id,
            from,
            to,
            created,
            skipped_entries,
        })
    }

    pub async fn generate_default_horizon(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<GenerationReport, AppointmentError> {
        let (from, to) = self.horizon_from_today(None);
        self.generate_slots(doctor_id, from, to, auth_token).await
    }

    /// Generate `weeks` ahead (the configured horizon when `None`) for every approved
    /// doctor; one doctor's failure does not stop the others.
    pub async fn generate_for_all_approved(
        &self,
        weeks: Option<i64>,
        auth_token: &str,
    ) -> Result<Vec<GenerationReport>, AppointmentError> {
        let doctors = self.doctors.list_by_status(DoctorStatus::Approved, auth_token).await?;
        let (from, to) = self.horizon_from_today(weeks);

        let mut reports = Vec::with_capacity(doctors.len());
        for doctor in doctors {
            match self.generate_slots(doctor.id, from, to, auth_token).await {
                Ok(report) => reports.push(report),
                Err(e) => error!("Slot generation failed for doctor {}: {}", doctor.id, e),
            }
        }
        Ok(reports)
    }

    async fn existing_slot_keys(
        &self,
        doctor: &Doctor,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<HashSet<(NaiveDate, NaiveTime)>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointment_slots?select=date,start_time&doctor_id=eq.{}&date=gte.{}&date=lte.{}&status=neq.{}",
            doctor.id,
            from,
            to,
            SlotStatus::Cancelled
        );
        let result: Vec<SlotKey> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(result.into_iter().map(|key| (key.date, key.start_time)).collect())
    }
}

/// Regenerates the default horizon after a doctor saves a new weekly schedule.
pub struct SlotGenerationObserver {
    config: Arc<AppConfig>,
}

impl SlotGenerationObserver {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScheduleObserver for SlotGenerationObserver {
    async fn schedule_saved(&self, doctor: &Doctor, auth_token: &str) {
        let service = SlotGenerationService::new(&self.config);
        if let Err(e) = service.generate_default_horizon(doctor.id, auth_token).await {
            warn!("Slot generation after schedule save failed for doctor {}: {}", doctor.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn entry(doctor_id: Uuid, day: DayOfWeek, start: NaiveTime, end: NaiveTime) -> WeeklyScheduleEntry {
        WeeklyScheduleEntry {
            id: Some(Uuid::new_v4()),
            doctor_id,
            day_of_week: day,
            start_time: Some(start),
            end_time: Some(end),
            duration_minutes: 30,
            gap_minutes: None,
        }
    }

    #[test]
    fn monday_half_hour_yields_one_slot_per_monday() {
        let doctor_id = Uuid::new_v4();
        let entries = vec![entry(doctor_id, DayOfWeek::Monday, t(9, 0), t(9, 30))];

        // 2025-06-02 through 2025-06-30 covers five Mondays.
        let (slots, skipped) = expand_schedule(doctor_id, &entries, d(2025, 6, 2), d(2025, 6, 30));

        assert_eq!(skipped, 0);
        assert_eq!(slots.len(), 5);
        for slot in &slots {
            assert_eq!(slot.date.weekday(), chrono::Weekday::Mon);
            assert_eq!((slot.start_time, slot.end_time), (t(9, 0), t(9, 30)));
            assert_eq!(slot.status, SlotStatus::Available);
        }
    }

    #[test]
    fn regeneration_over_same_horizon_creates_nothing() {
        let doctor_id = Uuid::new_v4();
        let entries = vec![entry(doctor_id, DayOfWeek::Monday, t(9, 0), t(9, 30))];
        let (first, _) = expand_schedule(doctor_id, &entries, d(2025, 6, 2), d(2025, 6, 30));

        let existing: HashSet<_> = first.iter().map(|s| (s.date, s.start_time)).collect();
        let (again, _) = expand_schedule(doctor_id, &entries, d(2025, 6, 2), d(2025, 6, 30));
        assert!(exclude_existing(again, &existing).is_empty());

        // An overlapping, longer horizon only adds the uncovered Monday.
        let (extended, _) = expand_schedule(doctor_id, &entries, d(2025, 6, 16), d(2025, 7, 7));
        let fresh = exclude_existing(extended, &existing);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].date, d(2025, 7, 7));
    }

    #[test]
    fn overlapping_entries_do_not_duplicate_times() {
        let doctor_id = Uuid::new_v4();
        let entries = vec![
            entry(doctor_id, DayOfWeek::Tuesday, t(9, 0), t(10, 0)),
            entry(doctor_id, DayOfWeek::Tuesday, t(9, 30), t(11, 0)),
        ];
        let (slots, _) = expand_schedule(doctor_id, &entries, d(2025, 6, 3), d(2025, 6, 3));
        let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![t(9, 0), t(9, 30), t(10, 0), t(10, 30)]);
    }

    #[test]
    fn invalid_entries_are_skipped_without_aborting() {
        let doctor_id = Uuid::new_v4();
        let mut missing_end = entry(doctor_id, DayOfWeek::Monday, t(14, 0), t(15, 0));
        missing_end.end_time = None;
        let inverted = entry(doctor_id, DayOfWeek::Monday, t(12, 0), t(11, 0));
        let valid = entry(doctor_id, DayOfWeek::Monday, t(9, 0), t(10, 0));

        let (slots, skipped) = expand_schedule(doctor_id, &[missing_end, inverted, valid], d(2025, 6, 2), d(2025, 6, 2));
        assert_eq!(skipped, 2);
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn default_horizon_is_inclusive_weeks_ahead() {
        let (from, to) = default_horizon(d(2025, 6, 2), 4);
        assert_eq!(from, d(2025, 6, 2));
        assert_eq!(to, d(2025, 6, 30));
    }

    #[test]
    fn horizon_weeks_are_clamped() {
        assert_eq!(default_horizon(d(2025, 6, 2), 0).1, d(2025, 6, 9));
        assert_eq!(default_horizon(d(2025, 6, 2), -3).1, d(2025, 6, 9));
        assert_eq!(default_horizon(d(2025, 6, 2), i64::MAX).1, d(2026, 6, 1));
    }
}
