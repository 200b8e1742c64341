//! Read-side projections over the appointment collection.
//!
//! Every function here is pure and borrows; nothing mutates appointments.
//! Results are scoped to what the caller's role may see: clients their own
//! bookings, providers their own assignments, owners everything.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::appointment::Appointment;
use crate::error::CoreError;
use crate::roles::Role;
use crate::status::AppointmentStatus;

/// Appointments visible to `user_id` acting as `role`, ordered by slot.
pub fn appointments_for_user<'a>(
    appointments: &'a [Appointment],
    role: Role,
    user_id: &str,
) -> Vec<&'a Appointment> {
    let mut scoped: Vec<_> = appointments
        .iter()
        .filter(|a| a.involves(role, user_id))
        .collect();
    scoped.sort_by_key(|a| (a.date, a.start_time));
    scoped
}

/// Appointments in `status` within the caller's scope.
pub fn appointments_by_status<'a>(
    appointments: &'a [Appointment],
    role: Role,
    user_id: &str,
    status: AppointmentStatus,
) -> Vec<&'a Appointment> {
    appointments_for_user(appointments, role, user_id)
        .into_iter()
        .filter(|a| a.status == status)
        .collect()
}

/// The caller's appointments grouped by status.
pub fn group_by_status<'a>(
    appointments: &'a [Appointment],
    role: Role,
    user_id: &str,
) -> BTreeMap<AppointmentStatus, Vec<&'a Appointment>> {
    let mut groups: BTreeMap<AppointmentStatus, Vec<&Appointment>> = BTreeMap::new();
    for appt in appointments_for_user(appointments, role, user_id) {
        groups.entry(appt.status).or_default().push(appt);
    }
    groups
}

/// Requests awaiting a provider decision.
pub fn pending_requests<'a>(
    appointments: &'a [Appointment],
    role: Role,
    user_id: &str,
) -> Vec<&'a Appointment> {
    appointments_by_status(appointments, role, user_id, AppointmentStatus::Requested)
}

/// Confirmed appointments on `today`.
pub fn todays_confirmed<'a>(
    appointments: &'a [Appointment],
    role: Role,
    user_id: &str,
    today: NaiveDate,
) -> Vec<&'a Appointment> {
    appointments_by_status(appointments, role, user_id, AppointmentStatus::Confirmed)
        .into_iter()
        .filter(|a| a.date == today)
        .collect()
}

/// A client's live bookings that have not started yet relative to `now`.
///
/// Terminal appointments are never upcoming even if their slot lies ahead.
pub fn upcoming<'a>(
    appointments: &'a [Appointment],
    client_id: &str,
    now: NaiveDateTime,
) -> Vec<&'a Appointment> {
    appointments_for_user(appointments, Role::Client, client_id)
        .into_iter()
        .filter(|a| !a.status.is_terminal() && a.date.and_time(a.start_time) >= now)
        .collect()
}

/// A client's finished or elapsed bookings, most recent first.
pub fn past<'a>(
    appointments: &'a [Appointment],
    client_id: &str,
    now: NaiveDateTime,
) -> Vec<&'a Appointment> {
    let mut past: Vec<_> = appointments_for_user(appointments, Role::Client, client_id)
        .into_iter()
        .filter(|a| a.status.is_terminal() || a.date.and_time(a.start_time) < now)
        .collect();
    past.reverse();
    past
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Owner revenue estimate from completed appointments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueEstimate {
    pub completed_count: usize,
    pub service_revenue: f64,
    pub tips: f64,
    pub tax: f64,
    pub total: f64,
}

/// Sum completed appointments' money fields. Owner only.
pub fn revenue_estimate(
    appointments: &[Appointment],
    role: Role,
) -> Result<RevenueEstimate, CoreError> {
    if role != Role::Owner {
        return Err(CoreError::Unauthorized(
            "Revenue analytics are available to shop owners only".into(),
        ));
    }

    let completed = appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Completed);

    let mut estimate = RevenueEstimate {
        completed_count: 0,
        service_revenue: 0.0,
        tips: 0.0,
        tax: 0.0,
        total: 0.0,
    };
    for appt in completed {
        estimate.completed_count += 1;
        estimate.service_revenue += appt.service_amount;
        estimate.tips += appt.tip_amount;
        estimate.tax += appt.tax_amount;
        estimate.total += appt.total_amount;
    }
    Ok(estimate)
}

/// Per-status counts and completed revenue for one provider on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderDailySummary {
    pub provider_id: String,
    pub date: NaiveDate,
    pub counts: BTreeMap<AppointmentStatus, usize>,
    pub completed_revenue: f64,
}

pub fn provider_daily_summary(
    appointments: &[Appointment],
    provider_id: &str,
    date: NaiveDate,
) -> ProviderDailySummary {
    let mut counts = BTreeMap::new();
    let mut completed_revenue = 0.0;
    for appt in appointments
        .iter()
        .filter(|a| a.provider_id == provider_id && a.date == date)
    {
        *counts.entry(appt.status).or_insert(0) += 1;
        if appt.status == AppointmentStatus::Completed {
            completed_revenue += appt.total_amount;
        }
    }
    ProviderDailySummary {
        provider_id: provider_id.to_owned(),
        date,
        counts,
        completed_revenue,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveTime;

    use super::*;
    use crate::appointment::NewAppointment;
    use crate::roles::Actor;

    fn appt(client: &str, provider: &str, day: u32, hour: u32, status: AppointmentStatus) -> Appointment {
        let input = NewAppointment {
            client_id: Some(client.into()),
            provider_id: Some(provider.into()),
            service_id: Some("S1".into()),
            date: NaiveDate::from_ymd_opt(2024, 9, day),
            start_time: NaiveTime::from_hms_opt(hour, 0, 0),
            duration: Some(30),
            service_amount: 40.0,
            tax_amount: 2.0,
            ..Default::default()
        };
        let mut a = Appointment::request(&Actor::client(client), input).unwrap();
        // Views only read `status`; bypassing the machine is fine for fixtures.
        a.status = status;
        a
    }

    fn fixture() -> Vec<Appointment> {
        use AppointmentStatus as S;
        vec![
            appt("C1", "P1", 16, 17, S::Requested),
            appt("C1", "P2", 16, 9, S::Confirmed),
            appt("C2", "P1", 16, 10, S::Confirmed),
            appt("C2", "P1", 15, 10, S::Completed),
            appt("C1", "P1", 14, 12, S::Cancelled),
            appt("C1", "P1", 20, 12, S::Confirmed),
        ]
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn scope_by_role() {
        let all = fixture();
        assert_eq!(appointments_for_user(&all, Role::Client, "C1").len(), 4);
        assert_eq!(appointments_for_user(&all, Role::Provider, "P1").len(), 5);
        assert_eq!(appointments_for_user(&all, Role::Owner, "anyone").len(), 6);
    }

    #[test]
    fn scoped_list_is_sorted_by_slot() {
        let all = fixture();
        let dates: Vec<_> = appointments_for_user(&all, Role::Client, "C1")
            .iter()
            .map(|a| (a.date, a.start_time))
            .collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn by_status_stays_in_scope() {
        let all = fixture();
        let confirmed =
            appointments_by_status(&all, Role::Provider, "P1", AppointmentStatus::Confirmed);
        assert_eq!(confirmed.len(), 2);
        assert!(confirmed.iter().all(|a| a.provider_id == "P1"));
    }

    #[test]
    fn grouping_covers_every_scoped_appointment() {
        let all = fixture();
        let groups = group_by_status(&all, Role::Owner, "O1");
        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, all.len());
        assert_eq!(groups[&AppointmentStatus::Confirmed].len(), 3);
    }

    #[test]
    fn pending_and_today() {
        let all = fixture();
        assert_eq!(pending_requests(&all, Role::Provider, "P1").len(), 1);
        let today = NaiveDate::from_ymd_opt(2024, 9, 16).unwrap();
        assert_eq!(todays_confirmed(&all, Role::Owner, "O1", today).len(), 2);
        assert_eq!(todays_confirmed(&all, Role::Provider, "P2", today).len(), 1);
    }

    #[test]
    fn upcoming_and_past_for_client() {
        let all = fixture();
        let now = at(16, 12);
        let up = upcoming(&all, "C1", now);
        assert_eq!(up.len(), 2);
        assert!(up.iter().all(|a| !a.status.is_terminal()));

        let gone = past(&all, "C1", now);
        assert_eq!(gone.len(), 2);
        // Most recent first.
        assert!(gone[0].date >= gone[1].date);
    }

    #[test]
    fn revenue_is_owner_only() {
        let all = fixture();
        assert_matches!(
            revenue_estimate(&all, Role::Provider),
            Err(CoreError::Unauthorized(_))
        );
        let estimate = revenue_estimate(&all, Role::Owner).unwrap();
        assert_eq!(estimate.completed_count, 1);
        assert_eq!(estimate.total, 42.0);
    }

    #[test]
    fn provider_summary_counts_day() {
        let all = fixture();
        let summary =
            provider_daily_summary(&all, "P1", NaiveDate::from_ymd_opt(2024, 9, 16).unwrap());
        assert_eq!(summary.counts[&AppointmentStatus::Requested], 1);
        assert_eq!(summary.counts[&AppointmentStatus::Confirmed], 1);
        assert_eq!(summary.completed_revenue, 0.0);
    }
}
