use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::ground_track::{forecast, ForecastWindow, TrackSegment};
use crate::core::catalog::Catalog;
use crate::core::elements::ElementRecord;
use crate::core::frames::GeodeticPoint;
use crate::core::orbit::{KeplerSettings, OrbitState, Propagator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    /// In the catalog but not propagated yet.
    Pending,
    Propagated,
    /// Held over from an earlier tick. Part of the published vocabulary for
    /// renderers; the engine reports failures as `Decayed` or `ParseInvalid`.
    Stale,
    Decayed,
    /// The element set is unusable.
    ParseInvalid,
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("unknown object {id}")]
    UnknownObject { id: u32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectSnapshot {
    pub id: u32,
    pub name: String,
    pub state_kind: StateKind,
    pub orbit_state: Option<OrbitState>,
    pub geodetic: Option<GeodeticPoint>,
    pub ground_track: Arc<[TrackSegment]>,
    pub last_error: Option<String>,
    #[serde(skip)]
    pub record: Arc<ElementRecord>,
}

/// Everything computed in one tick, against one catalog generation and one time.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub time: DateTime<Utc>,
    pub catalog_generation: u64,
    pub objects: BTreeMap<u32, ObjectSnapshot>,
}

impl Snapshot {
    pub fn empty(time: DateTime<Utc>) -> Self {
        Self { tick: 0, time, catalog_generation: 0, objects: BTreeMap::new() }
    }

    pub fn get(&self, id: u32) -> Option<&ObjectSnapshot> {
        self.objects.get(&id)
    }

    pub fn count_by_kind(&self) -> BTreeMap<StateKind, usize> {
        let mut counts = BTreeMap::new();
        for object in self.objects.values() {
            *counts.entry(object.state_kind).or_insert(0) += 1;
        }
        counts
    }

    /// Object whose sub-satellite point is closest (great-circle) to a map coordinate.
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Option<u32> {
        self.objects
            .values()
            .filter_map(|o| {
                let g = o.geodetic?;
                Some((o.id, angular_distance(latitude, longitude, g.latitude, g.longitude)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}

fn angular_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

/// Detail view of one object for the selection pane.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectDetail {
    pub id: u32,
    pub name: String,
    pub international_designator: String,
    pub epoch: DateTime<Utc>,
    pub state_kind: StateKind,
    pub position: Option<[f64; 3]>,
    pub velocity: Option<[f64; 3]>,
    pub speed: Option<f64>,
    pub geodetic: Option<GeodeticPoint>,
    pub altitude: Option<f64>,
    /// Seconds.
    pub orbital_period: f64,
    pub forecast: Option<Arc<[TrackSegment]>>,
    pub record: Arc<ElementRecord>,
}

/// Looks up `id` in the catalog and combines it with the latest tick.
/// With `forecast_window` set, the predicted track from the snapshot time is included.
pub fn select(
    catalog: &Catalog,
    snapshot: &Snapshot,
    id: u32,
    kepler: &KeplerSettings,
    forecast_window: Option<ForecastWindow>,
) -> Result<ObjectDetail, TrackingError> {
    let record = catalog.get(id).ok_or(TrackingError::UnknownObject { id })?;
    let object = snapshot.get(id);
    let state_kind = object.map_or(StateKind::Pending, |o| o.state_kind);
    let orbit_state = object.and_then(|o| o.orbit_state);
    let geodetic = object.and_then(|o| o.geodetic);

    let forecast = match forecast_window {
        Some(window) if state_kind != StateKind::ParseInvalid => {
            let track = Propagator::new(&record)
                .and_then(|p| forecast(&p, snapshot.time, window, kepler));
            match track {
                Ok(track) => Some(track),
                Err(e) => {
                    debug!(norad = id, error = %e, "No forecast for selected object");
                    None
                }
            }
        }
        _ => None,
    };

    Ok(ObjectDetail {
        id,
        name: record.name.clone(),
        international_designator: record.international_designator.clone(),
        epoch: record.epoch,
        state_kind,
        position: orbit_state.map(|s| s.position),
        velocity: orbit_state.map(|s| s.velocity),
        speed: orbit_state.map(|s| s.speed()),
        geodetic,
        altitude: geodetic.map(|g| g.altitude),
        orbital_period: record.orbital_period().num_milliseconds() as f64 / 1000.0,
        forecast,
        record,
    })
}

