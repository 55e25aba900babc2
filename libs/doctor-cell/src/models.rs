use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// DOCTOR PROFILE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DoctorStatus {
    Pending,
    Approved,
    Rejected,
}

impl DoctorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoctorStatus::Pending => "PENDING",
            DoctorStatus::Approved => "APPROVED",
            DoctorStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: String,
    pub full_name: String,
    pub specialty: String,
    pub consultation_fee: Decimal,
    pub location: Option<String>,
    /// Minutes per consultation.
    pub consultation_duration: i32,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub status: DoctorStatus,
    #[serde(default)]
    pub profile_configured: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Doctor {
    pub fn is_approved(&self) -> bool {
        self.status == DoctorStatus::Approved
    }
}

pub const DEFAULT_SPECIALTY: &str = "General";
pub const DEFAULT_CONSULTATION_MINUTES: i32 = 30;
/// Longest pause allowed between two consultations; one day.
pub const MAX_GAP_MINUTES: i32 = 1440;

/// Profile created for a freshly registered doctor.
#[derive(Debug, Clone, Serialize)]
pub struct NewDoctorProfile {
    pub user_id: String,
    pub full_name: String,
    pub specialty: String,
    pub consultation_fee: Decimal,
    pub consultation_duration: i32,
    pub status: DoctorStatus,
    pub profile_configured: bool,
}

impl NewDoctorProfile {
    pub fn pending(user_id: &str, full_name: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            full_name: full_name.to_string(),
            specialty: DEFAULT_SPECIALTY.to_string(),
            consultation_fee: Decimal::ZERO,
            consultation_duration: DEFAULT_CONSULTATION_MINUTES,
            status: DoctorStatus::Pending,
            profile_configured: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDoctorProfileRequest {
    pub full_name: Option<String>,
    pub specialty: Option<String>,
    pub consultation_fee: Option<Decimal>,
    pub location: Option<String>,
    pub consultation_duration: Option<i32>,
    pub bio: Option<String>,
}

impl UpdateDoctorProfileRequest {
    pub fn validate(&self) -> Result<(), DoctorError> {
        if let Some(specialty) = &self.specialty {
            if specialty.trim().is_empty() {
                return Err(DoctorError::ValidationError("Specialty cannot be empty".to_string()));
            }
        }
        if let Some(fee) = self.consultation_fee {
            if fee.is_sign_negative() {
                return Err(DoctorError::ValidationError("Consultation fee cannot be negative".to_string()));
            }
        }
        if let Some(duration) = self.consultation_duration {
            if duration <= 0 {
                return Err(DoctorError::ValidationError("Consultation duration must be positive".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorSearchFilters {
    pub specialty: Option<String>,
    pub location: Option<String>,
}

impl DoctorSearchFilters {
    fn normalized(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_lowercase)
    }

    pub fn specialty_term(&self) -> Option<String> {
        Self::normalized(&self.specialty)
    }

    pub fn location_term(&self) -> Option<String> {
        Self::normalized(&self.location)
    }

    /// Case-insensitive substring match on both filters, approved doctors only.
    pub fn matches(&self, doctor: &Doctor) -> bool {
        if !doctor.is_approved() {
            return false;
        }
        let specialty_ok = self
            .specialty_term()
            .map_or(true, |term| doctor.specialty.to_lowercase().contains(&term));
        let location_ok = self.location_term().map_or(true, |term| {
            doctor
                .location
                .as_deref()
                .is_some_and(|location| location.to_lowercase().contains(&term))
        });
        specialty_ok && location_ok
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoUploadRequest {
    /// Base64 data URL, or bare base64 together with `content_type`.
    pub data: String,
    pub content_type: Option<String>,
}

// ==============================================================================
// WEEKLY SCHEDULE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
            DayOfWeek::Sunday => "SUNDAY",
        }
    }
}

/// Stored weekly template row. Times are nullable in storage; rows missing either
/// bound are skipped wherever the schedule is expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyScheduleEntry {
    pub id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub duration_minutes: i32,
    pub gap_minutes: Option<i32>,
}

impl WeeklyScheduleEntry {
    /// Validated `(start, end)` bounds of the entry.
    pub fn bounds(&self) -> Result<(NaiveTime, NaiveTime), DoctorError> {
        let (start, end) = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(DoctorError::ValidationError(format!(
                    "Schedule entry for {} has no start or end time",
                    self.day_of_week.as_str()
                )))
            }
        };
        validate_window(start, end, self.duration_minutes, self.gap_minutes)?;
        Ok((start, end))
    }

    /// Start and end of every consultation the entry yields in one day.
    pub fn slot_times(&self) -> Result<Vec<(NaiveTime, NaiveTime)>, DoctorError> {
        let (start, end) = self.bounds()?;
        Ok(expand_window(start, end, self.duration_minutes, self.gap_minutes.unwrap_or(0)))
    }
}

/// Walks `[start, end]` in steps of `duration + gap`, emitting a slot while it still
/// ends at or before `end`.
pub fn expand_window(
    start: NaiveTime,
    end: NaiveTime,
    duration_minutes: i32,
    gap_minutes: i32,
) -> Vec<(NaiveTime, NaiveTime)> {
    let mut slots = Vec::new();
    if duration_minutes <= 0 || gap_minutes < 0 {
        return slots;
    }

    let duration = i64::from(duration_minutes) * 60;
    let step = duration + i64::from(gap_minutes) * 60;
    let end_secs = i64::from(end.num_seconds_from_midnight());
    let mut t = i64::from(start.num_seconds_from_midnight());

    while t + duration <= end_secs {
        let slot_start = u32::try_from(t).ok().and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, 0));
        let slot_end = u32::try_from(t + duration).ok().and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, 0));
        if let (Some(slot_start), Some(slot_end)) = (slot_start, slot_end) {
            slots.push((slot_start, slot_end));
        }
        t += step;
    }

    slots
}

fn validate_window(
    start: NaiveTime,
    end: NaiveTime,
    duration_minutes: i32,
    gap_minutes: Option<i32>,
) -> Result<(), DoctorError> {
    if start >= end {
        return Err(DoctorError::ValidationError(format!(
            "Start time {} must be before end time {}",
            start, end
        )));
    }
    if duration_minutes <= 0 {
        return Err(DoctorError::ValidationError("Consultation duration must be positive".to_string()));
    }
    if gap_minutes.is_some_and(|gap| gap < 0) {
        return Err(DoctorError::ValidationError("Gap between consultations cannot be negative".to_string()));
    }
    if gap_minutes.is_some_and(|gap| gap > MAX_GAP_MINUTES) {
        return Err(DoctorError::ValidationError(format!(
            "Gap between consultations cannot exceed {} minutes",
            MAX_GAP_MINUTES
        )));
    }
    let window_minutes = (end - start).num_minutes();
    if i64::from(duration_minutes) > window_minutes {
        return Err(DoctorError::ValidationError(format!(
            "Consultation duration {} exceeds the {} minute window",
            duration_minutes, window_minutes
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleEntryInput {
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Replaces a doctor's whole weekly template.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateWeeklyScheduleRequest {
    pub duration_minutes: i32,
    pub gap_minutes: Option<i32>,
    pub entries: Vec<ScheduleEntryInput>,
}

impl UpdateWeeklyScheduleRequest {
    pub fn validate(&self) -> Result<(), DoctorError> {
        if self.duration_minutes <= 0 {
            return Err(DoctorError::ValidationError("Consultation duration must be positive".to_string()));
        }
        for entry in &self.entries {
            validate_window(entry.start_time, entry.end_time, self.duration_minutes, self.gap_minutes)?;
        }
        Ok(())
    }

    pub fn into_entries(self, doctor_id: Uuid) -> Vec<WeeklyScheduleEntry> {
        let duration = self.duration_minutes;
        let gap = self.gap_minutes;
        self.entries
            .into_iter()
            .map(|entry| WeeklyScheduleEntry {
                id: None,
                doctor_id,
                day_of_week: entry.day_of_week,
                start_time: Some(entry.start_time),
                end_time: Some(entry.end_time),
                duration_minutes: duration,
                gap_minutes: gap,
            })
            .collect()
    }
}

// ==============================================================================
// DAILY AVAILABILITY
// ==============================================================================

/// Start time and status of an existing slot row, as read for availability.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotOccupancy {
    pub start_time: NaiveTime,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSlotAvailability {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyAvailability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub day_of_week: DayOfWeek,
    pub slots: Vec<TimeSlotAvailability>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,
    #[error("Doctor profile not found for this account")]
    ProfileNotFound,
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for DoctorError {
    fn from(e: anyhow::Error) -> Self {
        DoctorError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DoctorError {
    fn from(e: serde_json::Error) -> Self {
        DoctorError::Database(format!("Failed to decode doctor data: {}", e))
    }
}

impl From<DoctorError> for AppError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound | DoctorError::ProfileNotFound => AppError::NotFound(e.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::Forbidden(msg) => AppError::Forbidden(msg),
            DoctorError::Conflict(msg) => AppError::Conflict(msg),
            DoctorError::Storage(msg) => AppError::Internal(msg),
            DoctorError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(start: Option<NaiveTime>, end: Option<NaiveTime>, duration: i32, gap: Option<i32>) -> WeeklyScheduleEntry {
        WeeklyScheduleEntry {
            id: None,
            doctor_id: Uuid::new_v4(),
            day_of_week: DayOfWeek::Monday,
            start_time: start,
            end_time: end,
            duration_minutes: duration,
            gap_minutes: gap,
        }
    }

    #[test]
    fn window_walk_includes_slot_ending_at_boundary() {
        let slots = expand_window(t(9, 0), t(10, 0), 30, 0);
        assert_eq!(slots, vec![(t(9, 0), t(9, 30)), (t(9, 30), t(10, 0))]);
    }

    #[test]
    fn window_walk_drops_partial_tail() {
        let slots = expand_window(t(9, 0), t(10, 10), 30, 0);
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|(_, end)| *end <= t(10, 10)));
    }

    #[test]
    fn gap_is_added_between_slots() {
        let slots = expand_window(t(9, 0), t(10, 30), 30, 15);
        assert_eq!(slots, vec![(t(9, 0), t(9, 30)), (t(9, 45), t(10, 15))]);
    }

    #[test]
    fn generated_slots_never_overlap_or_exceed_end() {
        for duration in [5, 15, 20, 30, 45, 60] {
            for gap in [0, 5, 10] {
                let end = t(17, 0);
                let slots = expand_window(t(8, 0), end, duration, gap);
                assert!(!slots.is_empty());
                for pair in slots.windows(2) {
                    assert!(pair[0].1 <= pair[1].0);
                }
                for (start, slot_end) in &slots {
                    assert_eq!((*slot_end - *start).num_minutes(), i64::from(duration));
                    assert!(*slot_end <= end);
                }
            }
        }
    }

    #[test]
    fn extreme_gap_yields_single_slot_without_overflow() {
        for gap in [MAX_GAP_MINUTES, 71_582_758, 100_000_000, i32::MAX] {
            let slots = expand_window(t(9, 0), t(10, 0), 30, gap);
            assert_eq!(slots, vec![(t(9, 0), t(9, 30))], "gap {}", gap);
        }
    }

    #[test]
    fn oversized_gap_is_rejected_at_validation() {
        assert!(entry(Some(t(9, 0)), Some(t(10, 0)), 30, Some(MAX_GAP_MINUTES)).bounds().is_ok());
        assert!(matches!(
            entry(Some(t(9, 0)), Some(t(10, 0)), 30, Some(100_000_000)).slot_times(),
            Err(DoctorError::ValidationError(_))
        ));

        let request = UpdateWeeklyScheduleRequest {
            duration_minutes: 30,
            gap_minutes: Some(MAX_GAP_MINUTES + 1),
            entries: vec![ScheduleEntryInput {
                day_of_week: DayOfWeek::Monday,
                start_time: t(9, 0),
                end_time: t(10, 0),
            }],
        };
        assert!(matches!(request.validate(), Err(DoctorError::ValidationError(_))));
    }

    #[test]
    fn entry_without_times_is_rejected() {
        let missing = entry(Some(t(9, 0)), None, 30, None);
        assert!(matches!(missing.slot_times(), Err(DoctorError::ValidationError(_))));
    }

    #[test]
    fn entry_with_inverted_or_short_window_is_rejected() {
        assert!(entry(Some(t(10, 0)), Some(t(9, 0)), 30, None).bounds().is_err());
        assert!(entry(Some(t(9, 0)), Some(t(9, 20)), 30, None).bounds().is_err());
        assert!(entry(Some(t(9, 0)), Some(t(9, 30)), 0, None).bounds().is_err());
        assert_eq!(entry(Some(t(9, 0)), Some(t(9, 30)), 30, None).slot_times().unwrap().len(), 1);
    }

    #[test]
    fn schedule_request_validation() {
        let request = UpdateWeeklyScheduleRequest {
            duration_minutes: 30,
            gap_minutes: None,
            entries: vec![ScheduleEntryInput {
                day_of_week: DayOfWeek::Monday,
                start_time: t(9, 0),
                end_time: t(9, 30),
            }],
        };
        assert!(request.validate().is_ok());

        let bad = UpdateWeeklyScheduleRequest {
            duration_minutes: 45,
            ..request.clone()
        };
        assert!(matches!(bad.validate(), Err(DoctorError::ValidationError(_))));
    }

    #[test]
    fn day_of_week_wire_format() {
        assert_eq!(serde_json::to_string(&DayOfWeek::Monday).unwrap(), "\"MONDAY\"");
        let day: DayOfWeek = serde_json::from_str("\"SUNDAY\"").unwrap();
        assert_eq!(Weekday::from(day), Weekday::Sun);
    }

    #[test]
    fn search_filter_is_case_insensitive_substring() {
        let doctor: Doctor = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "user_id": "u1",
            "full_name": "Dr. House",
            "specialty": "Cardiology",
            "consultation_fee": 100,
            "location": "Lisbon Centre",
            "consultation_duration": 30,
            "bio": null,
            "photo_url": null,
            "status": "APPROVED",
            "profile_configured": true,
            "created_at": null,
            "updated_at": null
        }))
        .unwrap();

        let filters = DoctorSearchFilters {
            specialty: Some("CARDIO".to_string()),
            location: Some("lisbon".to_string()),
        };
        assert!(filters.matches(&doctor));

        let pending = Doctor { status: DoctorStatus::Pending, ..doctor.clone() };
        assert!(!filters.matches(&pending));

        let elsewhere = DoctorSearchFilters { location: Some("porto".to_string()), ..filters };
        assert!(!elsewhere.matches(&doctor));
    }
}
