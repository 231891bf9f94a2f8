//! Aggregate statistics endpoints.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::errors::ApiError;
use crate::persistence::audit_repository::{AuditLogRepository, StatusChangeRow};
use crate::persistence::stats::StatsRepository;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/statistics/summary", get(summary))
        .route("/api/statistics/status-duration", get(status_duration))
        .route("/api/statistics/timeline", get(timeline))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub total_deeds: i64,
    pub total_cooperatives: i64,
    pub status_distribution: BTreeMap<String, i64>,
    pub average_borrowers_per_deed: f64,
}

async fn summary(State(state): State<AppState>) -> Result<Json<SummaryResponse>, ApiError> {
    let stats = StatsRepository::new(state.pool.clone());

    let total_deeds = stats.total_deeds().await?;
    let total_cooperatives = stats.total_cooperatives().await?;
    let total_borrowers = stats.total_borrowers().await?;

    let status_distribution: BTreeMap<String, i64> = stats
        .status_distribution()
        .await?
        .into_iter()
        .map(|row| (row.status, row.count))
        .collect();

    let average_borrowers_per_deed = if total_deeds == 0 {
        0.0
    } else {
        round2(total_borrowers as f64 / total_deeds as f64)
    };

    Ok(Json(SummaryResponse {
        total_deeds,
        total_cooperatives,
        status_distribution,
        average_borrowers_per_deed,
    }))
}

#[derive(Debug, PartialEq, Serialize)]
pub struct StatusDuration {
    pub status: String,
    pub average_hours: f64,
    pub min_hours: f64,
    pub max_hours: f64,
    pub transitions: usize,
}

/// Pair consecutive status changes per deed and report how long deeds sit
/// in each status. The elapsed time between two changes counts toward the
/// status the first change moved the deed into.
pub fn compute_status_durations(rows: &[StatusChangeRow]) -> Vec<StatusDuration> {
    let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for pair in rows.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        if from.deed_id != to.deed_id {
            continue;
        }
        let status = from
            .action_type
            .strip_prefix("STATUS_CHANGED_TO_")
            .unwrap_or(&from.action_type)
            .to_string();
        let hours = (to.timestamp - from.timestamp).num_seconds() as f64 / 3600.0;
        samples.entry(status).or_default().push(hours);
    }

    samples
        .into_iter()
        .map(|(status, hours)| {
            let sum: f64 = hours.iter().sum();
            let min = hours.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = hours.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            StatusDuration {
                status,
                average_hours: round2(sum / hours.len() as f64),
                min_hours: round2(min),
                max_hours: round2(max),
                transitions: hours.len(),
            }
        })
        .collect()
}

async fn status_duration(
    State(state): State<AppState>,
) -> Result<Json<Vec<StatusDuration>>, ApiError> {
    let rows = AuditLogRepository::new(state.pool.clone())
        .status_changes()
        .await?;
    Ok(Json(compute_status_durations(&rows)))
}

#[derive(Debug, Deserialize)]
pub struct TimelineParams {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TimelineDay {
    pub date: String,
    pub new_deeds: i64,
    pub completed_deeds: i64,
}

async fn timeline(
    State(state): State<AppState>,
    Query(params): Query<TimelineParams>,
) -> Result<Json<Vec<TimelineDay>>, ApiError> {
    let days = params.days.unwrap_or(30);
    if !(1..=365).contains(&days) {
        return Err(ApiError::Validation(
            "days must be between 1 and 365".to_string(),
        ));
    }

    let since = Utc::now() - Duration::days(days);
    let stats = StatsRepository::new(state.pool.clone());

    let mut merged: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for row in stats.deeds_created_per_day(since).await? {
        merged.entry(row.day).or_default().0 = row.count;
    }
    for row in stats.completions_per_day(since).await? {
        merged.entry(row.day).or_default().1 = row.count;
    }

    let body = merged
        .into_iter()
        .map(|(date, (new_deeds, completed_deeds))| TimelineDay {
            date,
            new_deeds,
            completed_deeds,
        })
        .collect();
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(deed_id: i64, action: &str, hour: u32) -> StatusChangeRow {
        StatusChangeRow {
            deed_id,
            action_type: action.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_durations_pair_consecutive_changes_per_deed() {
        let rows = vec![
            row(1, "STATUS_CHANGED_TO_PENDING_BORROWER_SIGNATURE", 0),
            row(1, "STATUS_CHANGED_TO_PENDING_HOUSING_COOPERATIVE_SIGNATURE", 2),
            row(1, "STATUS_CHANGED_TO_COMPLETED", 5),
            row(2, "STATUS_CHANGED_TO_PENDING_BORROWER_SIGNATURE", 1),
            row(2, "STATUS_CHANGED_TO_PENDING_HOUSING_COOPERATIVE_SIGNATURE", 5),
        ];

        let durations = compute_status_durations(&rows);
        assert_eq!(durations.len(), 2);

        let borrower_phase = durations
            .iter()
            .find(|d| d.status == "PENDING_BORROWER_SIGNATURE")
            .unwrap();
        assert_eq!(borrower_phase.transitions, 2);
        assert_eq!(borrower_phase.average_hours, 3.0);
        assert_eq!(borrower_phase.min_hours, 2.0);
        assert_eq!(borrower_phase.max_hours, 4.0);

        let cooperative_phase = durations
            .iter()
            .find(|d| d.status == "PENDING_HOUSING_COOPERATIVE_SIGNATURE")
            .unwrap();
        assert_eq!(cooperative_phase.transitions, 1);
        assert_eq!(cooperative_phase.average_hours, 3.0);
    }

    #[test]
    fn test_durations_never_pair_across_deeds() {
        let rows = vec![
            row(1, "STATUS_CHANGED_TO_PENDING_BORROWER_SIGNATURE", 0),
            row(2, "STATUS_CHANGED_TO_PENDING_BORROWER_SIGNATURE", 3),
        ];
        assert!(compute_status_durations(&rows).is_empty());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.0 / 3.0), 0.33);
        assert_eq!(round2(1.999), 2.0);
    }
}
