use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::ground_track::{GroundTrack, TrackWindow};
use super::snapshot::{ObjectSnapshot, Snapshot, StateKind};
use crate::core::catalog::Catalog;
use crate::core::elements::ElementRecord;
use crate::core::frames::{to_geodetic, GeodeticPoint};
use crate::core::orbit::{KeplerSettings, OrbitState, PropagationError, Propagator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub kepler: KeplerSettings,
    /// Trailing track length; `None` keeps one orbital period per object.
    pub track_max_age: Option<Duration>,
    pub track_max_points: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { kepler: KeplerSettings::default(), track_max_age: None, track_max_points: 720 }
    }
}

impl EngineSettings {
    fn track_window(&self, record: &ElementRecord) -> TrackWindow {
        match self.track_max_age {
            Some(max_age) => TrackWindow { max_age, max_points: self.track_max_points },
            None => TrackWindow::one_period(record, self.track_max_points),
        }
    }
}

fn failure_kind(error: &PropagationError) -> StateKind {
    match error {
        PropagationError::Decayed { .. } => StateKind::Decayed,
        PropagationError::InvalidElements { .. } | PropagationError::NonConvergent { .. } => {
            StateKind::ParseInvalid
        }
    }
}

#[derive(Debug)]
struct TrackedObject {
    record: Arc<ElementRecord>,
    propagator: Result<Propagator, PropagationError>,
    state_kind: StateKind,
    orbit_state: Option<OrbitState>,
    geodetic: Option<GeodeticPoint>,
    track: GroundTrack,
    last_error: Option<String>,
}

impl TrackedObject {
    fn new(record: Arc<ElementRecord>, settings: &EngineSettings) -> Self {
        Self {
            propagator: Propagator::new(&record),
            track: GroundTrack::new(settings.track_window(&record)),
            record,
            state_kind: StateKind::Pending,
            orbit_state: None,
            geodetic: None,
            last_error: None,
        }
    }

    /// Rebuilds the propagator when the catalog hands out a different record.
    fn sync_record(&mut self, record: &Arc<ElementRecord>, settings: &EngineSettings) {
        if Arc::ptr_eq(&self.record, record) {
            return;
        }
        debug!(norad = record.norad_id, "Element set replaced");
        self.record = Arc::clone(record);
        self.propagator = Propagator::new(record);
        self.track.set_window(settings.track_window(record));
    }

    fn advance(&mut self, time: DateTime<Utc>, kepler: &KeplerSettings) {
        let result = match &self.propagator {
            Ok(propagator) => propagator.propagate_at(time, kepler),
            Err(e) => Err(e.clone()),
        };
        match result {
            Ok(state) => {
                let point = to_geodetic(&state);
                self.track.push(point);
                self.orbit_state = Some(state);
                self.geodetic = Some(point);
                self.last_error = None;
                self.transition(StateKind::Propagated, None);
            }
            Err(e) => self.transition(failure_kind(&e), Some(&e)),
        }
    }

    fn transition(&mut self, next: StateKind, error: Option<&PropagationError>) {
        if let Some(e) = error {
            self.last_error = Some(e.to_string());
        }
        if next == self.state_kind {
            return;
        }
        let norad = self.record.norad_id;
        match (next, error) {
            (StateKind::Decayed, _) => info!(norad, name = %self.record.name, "Object has decayed"),
            (StateKind::ParseInvalid, Some(e))
                if matches!(e, PropagationError::NonConvergent { .. }) =>
            {
                warn!(norad, error = %e, "Kepler solve failed; keeping last state")
            }
            (StateKind::ParseInvalid, Some(e)) => {
                warn!(norad, error = %e, "Element set is unusable")
            }
            (StateKind::Propagated, _) if self.state_kind != StateKind::Pending => {
                info!(norad, from = ?self.state_kind, "Object propagating again")
            }
            _ => {}
        }
        self.state_kind = next;
    }

    fn snapshot(&mut self, id: u32) -> ObjectSnapshot {
        ObjectSnapshot {
            id,
            name: self.record.name.clone(),
            state_kind: self.state_kind,
            orbit_state: self.orbit_state,
            geodetic: self.geodetic,
            ground_track: self.track.segments(),
            last_error: self.last_error.clone(),
            record: Arc::clone(&self.record),
        }
    }
}

/// Per-object tracking state advanced one tick at a time.
#[derive(Debug, Default)]
pub struct TrackingEngine {
    settings: EngineSettings,
    objects: HashMap<u32, TrackedObject>,
    ticks: u64,
}

impl TrackingEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings, objects: HashMap::new(), ticks: 0 }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn tracked(&self) -> usize {
        self.objects.len()
    }

    /// Propagates every catalog entry to `time`. All objects see the same
    /// catalog value and the same target time.
    pub fn tick(&mut self, catalog: &Catalog, time: DateTime<Utc>) -> Snapshot {
        self.ticks += 1;
        let settings = &self.settings;
        self.objects.retain(|id, _| catalog.contains(*id));

        let mut objects = BTreeMap::new();
        for (id, record) in catalog.iter() {
            let object = self
                .objects
                .entry(id)
                .or_insert_with(|| TrackedObject::new(Arc::clone(record), settings));
            object.sync_record(record, settings);
            match catalog.rejection(id) {
                Some(rejection) => {
                    if object.state_kind != StateKind::ParseInvalid {
                        warn!(norad = id, error = %rejection, "Latest element set rejected");
                        object.state_kind = StateKind::ParseInvalid;
                    }
                    object.last_error = Some(rejection.to_string());
                }
                None => object.advance(time, &settings.kepler),
            }
            objects.insert(id, object.snapshot(id));
        }

        debug!(
            tick = self.ticks,
            objects = objects.len(),
            generation = catalog.generation(),
            "Tick complete"
        );
        Snapshot { tick: self.ticks, time, catalog_generation: catalog.generation(), objects }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::CatalogHandle;
    use crate::core::tle::parse_batch;
    use crate::core::tle::tests::{ISS_L1, ISS_L2, MOLNIYA_L1, MOLNIYA_L2, VANGUARD_L1, VANGUARD_L2};
    use crate::tracking::ground_track::ForecastWindow;
    use crate::tracking::snapshot::{select, TrackingError};

    fn catalog_with(text: &str) -> CatalogHandle {
        let handle = CatalogHandle::new();
        handle.refresh(parse_batch(text), &[]);
        handle
    }

    fn three_objects() -> CatalogHandle {
        catalog_with(&format!(
            "ISS\n{ISS_L1}\n{ISS_L2}\n{VANGUARD_L1}\n{VANGUARD_L2}\n{MOLNIYA_L1}\n{MOLNIYA_L2}\n"
        ))
    }

    #[test]
    fn tick_propagates_every_object() {
        let handle = three_objects();
        let catalog = handle.load();
        let mut engine = TrackingEngine::new(EngineSettings::default());
        let t0 = catalog.get(25544).unwrap().epoch;

        let snapshot = engine.tick(&catalog, t0);
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.objects.len(), 3);
        assert_eq!(snapshot.catalog_generation, catalog.generation());
        for object in snapshot.objects.values() {
            assert_eq!(object.state_kind, StateKind::Propagated, "{}", object.id);
            assert_eq!(object.geodetic.unwrap().time, t0);
        }

        for minute in 1..=5 {
            engine.tick(&catalog, t0 + Duration::minutes(minute));
        }
        let snapshot = engine.tick(&catalog, t0 + Duration::minutes(6));
        let iss = snapshot.get(25544).unwrap();
        let points: usize = iss.ground_track.iter().map(Vec::len).sum();
        assert_eq!(points, 7);
    }

    #[test]
    fn failures_keep_last_good_state() {
        let handle = three_objects();
        let mut engine = TrackingEngine::new(EngineSettings::default());
        let t0 = handle.get(25544).unwrap().epoch;
        let first = engine.tick(&handle.load(), t0);
        let good = first.get(5).unwrap().orbit_state.unwrap();

        // Same ids, but Vanguard now decays and the ISS record is corrupted.
        let mut decayed = (*handle.get(5).unwrap()).clone();
        decayed.mean_motion = 16.0;
        decayed.eccentricity = 0.2;
        let corrupted = format!("{}0", &ISS_L2[..68]);
        let mut batch = parse_batch(&format!("{ISS_L1}\n{corrupted}\n"));
        batch.records.push(decayed);
        handle.refresh(batch, &[]);

        let second = engine.tick(&handle.load(), t0 + Duration::minutes(1));
        let vanguard = second.get(5).unwrap();
        assert_eq!(vanguard.state_kind, StateKind::Decayed);
        assert_eq!(vanguard.orbit_state.unwrap(), good);
        assert!(vanguard.last_error.is_some());
        let iss = second.get(25544).unwrap();
        assert_eq!(iss.state_kind, StateKind::ParseInvalid);
        assert_eq!(iss.geodetic.unwrap().time, t0);
        assert_eq!(second.get(8195).unwrap().state_kind, StateKind::Propagated);
    }

    #[test]
    fn non_convergence_is_invalid_and_recovers() {
        let handle = three_objects();
        let catalog = handle.load();
        let t0 = catalog.get(8195).unwrap().epoch;
        let mut engine = TrackingEngine::new(EngineSettings::default());
        engine.tick(&catalog, t0);

        engine.settings.kepler = KeplerSettings { tolerance: 1e-12, max_iterations: 1 };
        let failed = engine.tick(&catalog, t0 + Duration::minutes(1));
        let molniya = failed.get(8195).unwrap();
        assert_eq!(molniya.state_kind, StateKind::ParseInvalid);
        assert_eq!(molniya.geodetic.unwrap().time, t0);
        assert!(molniya.last_error.as_deref().unwrap().contains("did not converge"));

        engine.settings.kepler = KeplerSettings::default();
        let recovered = engine.tick(&catalog, t0 + Duration::minutes(2));
        let molniya = recovered.get(8195).unwrap();
        assert_eq!(molniya.state_kind, StateKind::Propagated);
        assert!(molniya.last_error.is_none());
    }

    #[test]
    fn removed_objects_are_dropped() {
        let handle = three_objects();
        let mut engine = TrackingEngine::new(EngineSettings::default());
        let t0 = handle.get(25544).unwrap().epoch;
        engine.tick(&handle.load(), t0);
        handle.refresh(Default::default(), &[5]);
        let snapshot = engine.tick(&handle.load(), t0 + Duration::seconds(1));
        assert!(snapshot.get(5).is_none());
        assert_eq!(engine.tracked(), 2);
    }

    #[test]
    fn tick_uses_the_catalog_it_was_given() {
        let handle = three_objects();
        let held = handle.load();
        handle.refresh(Default::default(), &[5, 8195]);
        let mut engine = TrackingEngine::new(EngineSettings::default());
        let snapshot = engine.tick(&held, held.get(5).unwrap().epoch);
        assert_eq!(snapshot.objects.len(), 3);
        assert_eq!(snapshot.catalog_generation, held.generation());
    }

    #[test]
    fn selection_and_nearest() {
        let handle = three_objects();
        let catalog = handle.load();
        let mut engine = TrackingEngine::new(EngineSettings::default());
        let t0 = catalog.get(25544).unwrap().epoch;
        let kepler = KeplerSettings::default();

        let pending = select(&catalog, &Snapshot::empty(t0), 25544, &kepler, None).unwrap();
        assert_eq!(pending.state_kind, StateKind::Pending);
        assert!(pending.position.is_none());

        let snapshot = engine.tick(&catalog, t0);
        let record = catalog.get(25544).unwrap();
        let window = ForecastWindow::one_period(&record);
        let detail = select(&catalog, &snapshot, 25544, &kepler, Some(window)).unwrap();
        assert_eq!(detail.name, "ISS");
        assert_eq!(detail.state_kind, StateKind::Propagated);
        assert!((detail.altitude.unwrap() - 355.1).abs() < 0.05);
        assert!((detail.speed.unwrap() - 7.7).abs() < 0.2);
        assert!((detail.orbital_period - 5495.745).abs() < 0.01);
        assert!(detail.forecast.unwrap().iter().map(Vec::len).sum::<usize>() > 90);

        assert!(matches!(
            select(&catalog, &snapshot, 99999, &kepler, None),
            Err(TrackingError::UnknownObject { id: 99999 })
        ));

        let iss_point = snapshot.get(25544).unwrap().geodetic.unwrap();
        assert_eq!(
            snapshot.nearest(iss_point.latitude + 0.5, iss_point.longitude - 0.5),
            Some(25544)
        );
        assert_eq!(Snapshot::empty(t0).nearest(0.0, 0.0), None);
        assert_eq!(snapshot.count_by_kind().get(&StateKind::Propagated), Some(&3));
    }
}
