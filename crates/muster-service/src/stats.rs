//! [`StatsAggregator`] — roster-wide derived metrics.
//!
//! Read-only and uncached: the report runs a handful of aggregate
//! queries against indexed tables and is not latency-critical.

use std::{collections::BTreeMap, sync::Arc};

use muster_core::{
  Error, Result,
  store::{AggregateRow, AggregateSpec, RecordStore},
};
use serde::Serialize;

/// The roster statistics report.
#[derive(Debug, Clone, Serialize)]
pub struct RosterStats {
  pub total:           u64,
  pub active:          u64,
  pub inactive:        u64,
  /// Average age over all records, active or not; 0 for an empty roster.
  pub average_age:     f64,
  /// Present entries / all entries × 100 across every record; 0 when no
  /// attendance has been recorded.
  pub attendance_rate: f64,
  /// Active-record count per department; departmentless records are
  /// excluded from the breakdown.
  pub by_department:   BTreeMap<String, u64>,
}

pub struct StatsAggregator<S> {
  store: Arc<S>,
}

impl<S> StatsAggregator<S>
where
  S: RecordStore,
  S::Error: Into<Error>,
{
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub async fn collect(&self) -> Result<RosterStats> {
    let counts = self
      .store
      .aggregate(AggregateSpec::RecordCounts)
      .await
      .map_err(Into::into)?;
    let total = labelled(&counts, "total") as u64;
    let active = labelled(&counts, "active") as u64;

    let ages = self
      .store
      .aggregate(AggregateSpec::AverageAge)
      .await
      .map_err(Into::into)?;
    let average_age = ages.first().map(|r| r.value).unwrap_or(0.0);

    let attendance = self
      .store
      .aggregate(AggregateSpec::AttendanceTotals)
      .await
      .map_err(Into::into)?;
    let entries = labelled(&attendance, "total");
    let present = labelled(&attendance, "present");
    let attendance_rate =
      if entries == 0.0 { 0.0 } else { present / entries * 100.0 };

    let departments = self
      .store
      .aggregate(AggregateSpec::ActiveByDepartment)
      .await
      .map_err(Into::into)?;
    let by_department = departments
      .into_iter()
      .filter_map(|row| row.label.map(|dept| (dept, row.value as u64)))
      .collect();

    Ok(RosterStats {
      total,
      active,
      inactive: total - active,
      average_age,
      attendance_rate,
      by_department,
    })
  }
}

fn labelled(rows: &[AggregateRow], label: &str) -> f64 {
  rows
    .iter()
    .find(|r| r.label.as_deref() == Some(label))
    .map(|r| r.value)
    .unwrap_or(0.0)
}
