//! Stations: the immutable registry entries readings are validated against.
//!
//! Station kind and colour are closed enums, checked once when a registry
//! snapshot is loaded rather than on every read.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The kind of monitoring station.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StationKind {
  Discharge,
  Weather,
  RainGauge,
}

impl StationKind {
  /// Every metric key a station of this kind may report.
  pub fn metric_catalog(self) -> &'static [&'static str] {
    match self {
      Self::Discharge => &["discharge", "velocity", "waterLevel", "flowRate"],
      Self::Weather => &[
        "windSpeed",
        "windDirection",
        "temperature",
        "relativeHumidity",
        "airPressure",
        "solarRadiation",
        "rainfallHr",
        "rainfallDay",
        "rainfallTotal",
      ],
      Self::RainGauge => {
        &["rainfallHr", "rainfallDay", "rainfallTotal", "intensity"]
      }
    }
  }
}

/// Display classification carried through to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationColor {
  Blue,
  Green,
  Orange,
  Yellow,
}

/// An immutable registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
  pub id:      String,
  pub title:   String,
  #[serde(rename = "type")]
  pub kind:    StationKind,
  /// Metric keys this station reports; a subset of the kind's catalog.
  pub metrics: BTreeSet<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub color:   Option<StationColor>,
}

impl Station {
  pub fn has_metric(&self, metric: &str) -> bool {
    self.metrics.contains(metric)
  }

  /// Check the entry is well-formed: a non-empty id and a non-empty metric
  /// set drawn from the kind's catalog.
  pub fn validate(&self) -> Result<()> {
    let invalid = |reason: String| Error::InvalidStation {
      station_id: self.id.clone(),
      reason,
    };

    if self.id.trim().is_empty() {
      return Err(invalid("station id is empty".into()));
    }
    if self.metrics.is_empty() {
      return Err(invalid("station defines no metrics".into()));
    }

    let catalog = self.kind.metric_catalog();
    if let Some(bad) = self.metrics.iter().find(|m| !catalog.contains(&m.as_str()))
    {
      return Err(invalid(format!(
        "metric {bad:?} is not valid for a {} station",
        self.kind
      )));
    }
    Ok(())
  }
}

/// The on-disk shape of a registry snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
  pub stations: Vec<Station>,
}

impl RegistrySnapshot {
  pub fn from_json(raw: &str) -> Result<Self> { Ok(serde_json::from_str(raw)?) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn station(kind: StationKind, metrics: &[&str]) -> Station {
    Station {
      id:      "ds-001".into(),
      title:   "Upper Weir".into(),
      kind,
      metrics: metrics.iter().map(|m| m.to_string()).collect(),
      color:   None,
    }
  }

  #[test]
  fn kind_round_trips_through_kebab_case() {
    assert_eq!(StationKind::RainGauge.to_string(), "rain-gauge");
    assert_eq!(
      "rain-gauge".parse::<StationKind>().unwrap(),
      StationKind::RainGauge
    );
    let json = serde_json::to_string(&StationKind::RainGauge).unwrap();
    assert_eq!(json, "\"rain-gauge\"");
  }

  #[test]
  fn validate_accepts_catalog_metrics() {
    station(StationKind::Discharge, &["discharge", "waterLevel"])
      .validate()
      .unwrap();
  }

  #[test]
  fn validate_rejects_foreign_metric() {
    let err = station(StationKind::RainGauge, &["discharge"])
      .validate()
      .unwrap_err();
    assert!(matches!(err, Error::InvalidStation { .. }), "{err}");
  }

  #[test]
  fn validate_rejects_empty_metrics() {
    let err = station(StationKind::Weather, &[]).validate().unwrap_err();
    assert!(matches!(err, Error::InvalidStation { .. }));
  }

  #[test]
  fn snapshot_parses_type_field() {
    let raw = r#"{"stations":[{"id":"rg-001","title":"Hill Gauge",
      "type":"rain-gauge","metrics":["rainfallHr"],"color":"green"}]}"#;
    let snapshot = RegistrySnapshot::from_json(raw).unwrap();
    assert_eq!(snapshot.stations.len(), 1);
    assert_eq!(snapshot.stations[0].kind, StationKind::RainGauge);
    assert_eq!(snapshot.stations[0].color, Some(StationColor::Green));
  }
}
