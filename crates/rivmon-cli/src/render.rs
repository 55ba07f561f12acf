//! Plain-text rendering of API responses.

use std::fmt::Write as _;

use anyhow::Result;
use rivmon_core::{
  query::{QueryResult, Row},
  station::Station,
};
use serde::Serialize;

pub fn json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// One line per station: id, type, title, metrics.
pub fn stations(stations: &[Station]) -> String {
  let id_width = stations.iter().map(|s| s.id.len()).max().unwrap_or(0);
  let mut out = String::new();
  for s in stations {
    let metrics: Vec<&str> = s.metrics.iter().map(String::as_str).collect();
    let _ = writeln!(
      out,
      "{:<id_width$}  {:<10}  {}  [{}]",
      s.id,
      s.kind.to_string(),
      s.title,
      metrics.join(", ")
    );
  }
  out
}

/// A header line, then one line per row. Bucket rows show the mean.
pub fn query(result: &QueryResult) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{}/{} @ {}: {} rows, {} pending",
    result.station_id,
    result.metric,
    result.granularity,
    result.rows.len(),
    result.pending
  );
  for row in &result.rows {
    match row {
      Row::Raw(r) => {
        let _ = writeln!(
          out,
          "{}  {:>12.3}  {}",
          r.timestamp.to_rfc3339(),
          r.value,
          r.reason
        );
      }
      Row::Bucket(b) => {
        let mean = b.sum / b.count.max(1) as f64;
        let _ = writeln!(
          out,
          "{}  n={:<5} mean={:<10.3} min={:<10.3} max={:<10.3} last={:<10.3}{}",
          b.bucket_start.to_rfc3339(),
          b.count,
          mean,
          b.min,
          b.max,
          b.last,
          if b.sealed { "" } else { " (open)" }
        );
      }
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use rivmon_core::{
    bucket::Granularity,
    query::BucketRow,
    station::StationKind,
  };

  #[test]
  fn station_lines_are_aligned() {
    let stations = vec![
      Station {
        id:      "ds-001".into(),
        title:   "Upper Weir".into(),
        kind:    StationKind::Discharge,
        metrics: ["discharge".to_string(), "velocity".to_string()].into(),
        color:   None,
      },
      Station {
        id:      "aws-0001".into(),
        title:   "Ridge".into(),
        kind:    StationKind::RainGauge,
        metrics: ["rainfallHr".to_string()].into(),
        color:   None,
      },
    ];
    let text = super::stations(&stations);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "ds-001    discharge   Upper Weir  [discharge, velocity]");
    assert_eq!(lines[1], "aws-0001  rain-gauge  Ridge  [rainfallHr]");
  }

  #[test]
  fn open_buckets_are_flagged() {
    let result = QueryResult {
      station_id:  "ds-001".into(),
      metric:      "discharge".into(),
      granularity: Granularity::Hour,
      rows:        vec![Row::Bucket(BucketRow {
        bucket_start: "2026-01-13T02:00:00Z".parse().unwrap(),
        count:        4,
        sum:          10.0,
        min:          1.0,
        max:          4.0,
        last:         4.0,
        sealed:       false,
      })],
      pending:     2,
    };
    let text = query(&result);
    assert!(text.starts_with("ds-001/discharge @ hour: 1 rows, 2 pending\n"));
    assert!(text.contains("mean=2.500"));
    assert!(text.trim_end().ends_with("(open)"));
  }
}
