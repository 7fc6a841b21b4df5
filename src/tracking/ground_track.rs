use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::core::elements::ElementRecord;
use crate::core::frames::{to_geodetic, GeodeticPoint};
use crate::core::orbit::{KeplerSettings, PropagationError, Propagator};

/// A run of points that never crosses the antimeridian.
pub type TrackSegment = Vec<GeodeticPoint>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackWindow {
    pub max_age: Duration,
    pub max_points: usize,
}

impl TrackWindow {
    /// One orbital period of `record`, capped at `max_points`.
    pub fn one_period(record: &ElementRecord, max_points: usize) -> Self {
        Self { max_age: record.orbital_period(), max_points }
    }
}

#[derive(Debug, Clone, Copy)]
struct TrackPoint {
    point: GeodeticPoint,
    starts_segment: bool,
}

/// Bounded trailing ground track for one object.
#[derive(Debug, Clone)]
pub struct GroundTrack {
    window: TrackWindow,
    points: VecDeque<TrackPoint>,
    published: Option<Arc<[TrackSegment]>>,
}

fn crosses_antimeridian(previous: &GeodeticPoint, next: &GeodeticPoint) -> bool {
    (next.longitude - previous.longitude).abs() > 180.0
}

impl GroundTrack {
    pub fn new(window: TrackWindow) -> Self {
        Self { window, points: VecDeque::new(), published: None }
    }

    pub fn window(&self) -> TrackWindow {
        self.window
    }

    pub fn set_window(&mut self, window: TrackWindow) {
        if window != self.window {
            self.window = window;
            self.evict();
            self.published = None;
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&GeodeticPoint> {
        self.points.back().map(|p| &p.point)
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.published = None;
    }

    /// Appends a point. A point older than the last one restarts the track;
    /// one with the same timestamp is ignored.
    pub fn push(&mut self, point: GeodeticPoint) {
        if let Some(last) = self.points.back() {
            if point.time == last.point.time {
                return;
            }
            if point.time < last.point.time {
                self.points.clear();
            }
        }
        let starts_segment = self
            .points
            .back()
            .map_or(true, |last| crosses_antimeridian(&last.point, &point));
        self.points.push_back(TrackPoint { point, starts_segment });
        self.evict();
        self.published = None;
    }

    fn evict(&mut self) {
        let Some(newest) = self.points.back().map(|p| p.point.time) else {
            return;
        };
        let oldest_allowed = newest - self.window.max_age;
        while let Some(front) = self.points.front() {
            if self.points.len() > self.window.max_points || front.point.time < oldest_allowed {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    /// Segments split at antimeridian crossings. The returned value is never
    /// modified afterwards; later pushes build a new one.
    pub fn segments(&mut self) -> Arc<[TrackSegment]> {
        if let Some(published) = &self.published {
            return Arc::clone(published);
        }
        let mut segments: Vec<TrackSegment> = Vec::new();
        for (i, p) in self.points.iter().enumerate() {
            match segments.last_mut() {
                Some(current) if i > 0 && !p.starts_segment => current.push(p.point),
                _ => segments.push(vec![p.point]),
            }
        }
        let published: Arc<[TrackSegment]> = segments.into();
        self.published = Some(Arc::clone(&published));
        published
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastWindow {
    pub span: Duration,
    pub step: Duration,
}

impl ForecastWindow {
    /// One orbital period ahead in one-minute steps.
    pub fn one_period(record: &ElementRecord) -> Self {
        Self { span: record.orbital_period(), step: Duration::minutes(1) }
    }
}

/// Predicted track from `start` over `window.span`.
pub fn forecast(
    propagator: &Propagator,
    start: DateTime<Utc>,
    window: ForecastWindow,
    settings: &KeplerSettings,
) -> Result<Arc<[TrackSegment]>, PropagationError> {
    let mut track = GroundTrack::new(TrackWindow { max_age: window.span, max_points: usize::MAX });
    if window.step <= Duration::zero() || window.span < Duration::zero() {
        return Ok(track.segments());
    }
    let end = start + window.span;
    let mut time = start;
    while time <= end {
        let state = propagator.propagate_at(time, settings)?;
        track.push(to_geodetic(&state));
        time += window.step;
    }
    Ok(track.segments())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tle::parse_element_set;
    use crate::core::tle::tests::{ISS_L1, ISS_L2};
    use chrono::TimeZone;

    fn at(minute: i64, longitude: f64) -> GeodeticPoint {
        GeodeticPoint {
            latitude: 0.0,
            longitude,
            altitude: 400.0,
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
        }
    }

    fn window(minutes: i64, points: usize) -> TrackWindow {
        TrackWindow { max_age: Duration::minutes(minutes), max_points: points }
    }

    #[test]
    fn splits_at_antimeridian() {
        let mut track = GroundTrack::new(window(100, 100));
        for (i, lon) in [170.0, 175.0, 179.5, -179.0, -175.0].iter().enumerate() {
            track.push(at(i as i64, *lon));
        }
        let segments = track.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].len(), 3);
        assert_eq!(segments[1].len(), 2);
        assert_eq!(segments[1][0].longitude, -179.0);
        for segment in segments.iter() {
            for pair in segment.windows(2) {
                assert!((pair[1].longitude - pair[0].longitude).abs() <= 180.0);
            }
        }
    }

    #[test]
    fn evicts_by_age_and_count() {
        let mut track = GroundTrack::new(window(10, 100));
        for i in 0..30 {
            track.push(at(i, 0.0));
        }
        assert_eq!(track.len(), 11);

        let mut track = GroundTrack::new(window(1000, 5));
        for i in 0..30 {
            track.push(at(i, i as f64));
        }
        assert_eq!(track.len(), 5);
        let segments = track.segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0][0].longitude, 25.0);
    }

    #[test]
    fn eviction_of_segment_head_keeps_split() {
        let mut track = GroundTrack::new(window(1000, 3));
        for (i, lon) in [178.0, 179.0, -179.0, -178.0, -177.0].iter().enumerate() {
            track.push(at(i as i64, *lon));
        }
        let segments = track.segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 3);
        assert_eq!(segments[0][0].longitude, -179.0);
    }

    #[test]
    fn published_segments_are_stable() {
        let mut track = GroundTrack::new(window(100, 100));
        track.push(at(0, 10.0));
        track.push(at(1, 11.0));
        let handed_out = track.segments();
        assert!(Arc::ptr_eq(&handed_out, &track.segments()));
        track.push(at(2, 12.0));
        assert_eq!(handed_out[0].len(), 2);
        assert_eq!(track.segments()[0].len(), 3);
    }

    #[test]
    fn time_going_backwards_restarts() {
        let mut track = GroundTrack::new(window(100, 100));
        track.push(at(10, 0.0));
        track.push(at(11, 1.0));
        track.push(at(11, 2.0));
        assert_eq!(track.len(), 2);
        track.push(at(5, 3.0));
        assert_eq!(track.len(), 1);
        assert_eq!(track.latest().unwrap().longitude, 3.0);
    }

    #[test]
    fn forecast_covers_one_period() {
        let record = parse_element_set(None, ISS_L1, ISS_L2).unwrap();
        let propagator = Propagator::new(&record).unwrap();
        let window = ForecastWindow::one_period(&record);
        let segments =
            forecast(&propagator, record.epoch, window, &KeplerSettings::default()).unwrap();
        let points: usize = segments.iter().map(Vec::len).sum();
        // 91.6 minutes at one-minute steps
        assert_eq!(points, 92);
        assert!(segments.len() <= 2);
        let first = segments[0][0];
        let last = *segments.last().unwrap().last().unwrap();
        assert!(first.latitude.abs() < 52.0 && last.latitude.abs() < 52.0);
    }
}
