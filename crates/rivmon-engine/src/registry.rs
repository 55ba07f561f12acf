//! The station registry: loaded once at startup, read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};

use rivmon_core::{
  Error, Result,
  station::{RegistrySnapshot, Station, StationKind},
};

/// Immutable metadata for every known station, keyed by id.
///
/// Mutation (`register`) needs `&mut self`, so once the registry is shared
/// behind an `Arc` it is effectively frozen.
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
  stations: BTreeMap<String, Station>,
}

impl StationRegistry {
  pub fn new() -> Self { Self::default() }

  /// Build a registry from a snapshot, failing on the first invalid or
  /// duplicate entry.
  pub fn from_snapshot(snapshot: RegistrySnapshot) -> Result<Self> {
    let mut registry = Self::new();
    for station in snapshot.stations {
      registry.register(station)?;
    }
    Ok(registry)
  }

  pub fn from_json(raw: &str) -> Result<Self> {
    Self::from_snapshot(RegistrySnapshot::from_json(raw)?)
  }

  /// Add a station. Fails with [`Error::DuplicateStation`] if the id is
  /// already present, or [`Error::InvalidStation`] if the entry is malformed.
  pub fn register(&mut self, station: Station) -> Result<()> {
    station.validate()?;
    if self.stations.contains_key(&station.id) {
      return Err(Error::DuplicateStation(station.id));
    }
    self.stations.insert(station.id.clone(), station);
    Ok(())
  }

  pub fn lookup(&self, station_id: &str) -> Result<&Station> {
    self
      .stations
      .get(station_id)
      .ok_or_else(|| Error::UnknownStation(station_id.to_owned()))
  }

  pub fn valid_metrics(&self, station_id: &str) -> Result<&BTreeSet<String>> {
    Ok(&self.lookup(station_id)?.metrics)
  }

  /// Resolve the station and check it reports `metric`.
  pub fn check_metric(&self, station_id: &str, metric: &str) -> Result<&Station> {
    let station = self.lookup(station_id)?;
    if !station.has_metric(metric) {
      return Err(Error::InvalidMetric {
        station_id: station_id.to_owned(),
        metric:     metric.to_owned(),
      });
    }
    Ok(station)
  }

  /// All stations in id order, optionally restricted to one kind.
  pub fn list(&self, kind: Option<StationKind>) -> Vec<Station> {
    self
      .stations
      .values()
      .filter(|s| kind.is_none_or(|k| s.kind == k))
      .cloned()
      .collect()
  }

  pub fn len(&self) -> usize { self.stations.len() }

  pub fn is_empty(&self) -> bool { self.stations.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn discharge(id: &str) -> Station {
    Station {
      id:      id.into(),
      title:   format!("Station {id}"),
      kind:    StationKind::Discharge,
      metrics: ["discharge", "velocity", "waterLevel"]
        .into_iter()
        .map(String::from)
        .collect(),
      color:   None,
    }
  }

  #[test]
  fn register_rejects_duplicates() {
    let mut registry = StationRegistry::new();
    registry.register(discharge("ds-001")).unwrap();
    let err = registry.register(discharge("ds-001")).unwrap_err();
    assert!(matches!(err, Error::DuplicateStation(id) if id == "ds-001"));
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn lookup_unknown_station() {
    let registry = StationRegistry::new();
    assert!(matches!(
      registry.lookup("nope"),
      Err(Error::UnknownStation(_))
    ));
  }

  #[test]
  fn check_metric_rejects_undefined_metric() {
    let mut registry = StationRegistry::new();
    registry.register(discharge("ds-001")).unwrap();
    registry.check_metric("ds-001", "discharge").unwrap();
    assert!(matches!(
      registry.check_metric("ds-001", "flowRate"),
      Err(Error::InvalidMetric { .. })
    ));
    assert_eq!(registry.valid_metrics("ds-001").unwrap().len(), 3);
  }

  #[test]
  fn list_filters_by_kind() {
    let raw = r#"{"stations":[
      {"id":"ds-001","title":"Weir","type":"discharge","metrics":["discharge"]},
      {"id":"aws-001","title":"Ridge","type":"weather","metrics":["temperature"]},
      {"id":"ds-002","title":"Bridge","type":"discharge","metrics":["velocity"]}
    ]}"#;
    let registry = StationRegistry::from_json(raw).unwrap();
    assert_eq!(registry.list(None).len(), 3);
    let ids: Vec<_> = registry
      .list(Some(StationKind::Discharge))
      .into_iter()
      .map(|s| s.id)
      .collect();
    assert_eq!(ids, ["ds-001", "ds-002"]);
  }

  #[test]
  fn snapshot_with_duplicate_fails_to_load() {
    let raw = r#"{"stations":[
      {"id":"rg-001","title":"A","type":"rain-gauge","metrics":["intensity"]},
      {"id":"rg-001","title":"B","type":"rain-gauge","metrics":["intensity"]}
    ]}"#;
    assert!(matches!(
      StationRegistry::from_json(raw),
      Err(Error::DuplicateStation(_))
    ));
  }

  #[test]
  fn bundled_snapshot_loads() {
    let registry =
      StationRegistry::from_json(include_str!("../../../stations.json")).unwrap();
    assert_eq!(registry.list(Some(StationKind::RainGauge)).len(), 2);
    assert!(registry.check_metric("ds-001", "discharge").is_ok());
  }
}
