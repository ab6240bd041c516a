//! Render loop.
//!
//! Animates from the previous snapshot to the current one over one poll
//! interval, then rests on the current snapshot until the next rotation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};

use skytrack_core::{interpolate_flight, interpolation_fraction, project, BoundingBox, SnapshotPair};

use crate::canvas::Canvas;
use crate::state::Session;

/// Draw one frame at interpolation fraction `t`. Returns the number of
/// flights drawn.
pub fn render_frame(pair: &SnapshotPair, bbox: &BoundingBox, t: f64, canvas: &mut dyn Canvas) -> usize {
    canvas.clear();
    let (width, height) = canvas.size();
    let previous = pair.previous_by_id();

    let mut drawn = 0;
    for current in pair.current.iter().filter(|f| bbox.contains(f.lat, f.lon)) {
        let prior = previous.get(current.icao24.as_str()).copied();
        let pose = interpolate_flight(prior, current, t);
        let at = project(pose.lat, pose.lon, bbox, width, height);
        canvas.draw_marker(at, pose.heading_deg, &current.callsign);
        drawn += 1;
    }
    drawn
}

async fn draw(session: &Session, canvas: &mut (dyn Canvas + Send), t: f64) {
    let pair = session.snapshot();
    let bbox = session.bbox().current();
    let caption = session.status().await.caption();

    canvas.caption(&caption);
    render_frame(&pair, &bbox, t, canvas);
    if let Err(e) = canvas.present() {
        tracing::error!("Frame present failed: {}", e);
    }
}

/// Start the render loop.
///
/// Frames are scheduled only while an animation is running; a snapshot
/// rotation starts one, reaching `t == 1` ends it.
pub async fn run_render_loop(
    session: Arc<Session>,
    mut canvas: Box<dyn Canvas + Send>,
    poll_interval: Duration,
    frame_interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut snapshots = session.snapshots();
    let mut bbox = session.bbox().subscribe();
    let mut frames = interval(frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut started: Option<Instant> = None;

    draw(&session, canvas.as_mut(), 1.0).await;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Render loop shutting down");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                snapshots.borrow_and_update();
                started = Some(Instant::now());
                draw(&session, canvas.as_mut(), 0.0).await;
            }
            changed = bbox.changed() => {
                if changed.is_err() {
                    break;
                }
                bbox.borrow_and_update();
                if started.is_none() {
                    draw(&session, canvas.as_mut(), 1.0).await;
                }
            }
            _ = frames.tick(), if started.is_some() => {
                if let Some(start) = started {
                    let t = interpolation_fraction(start.elapsed(), poll_interval);
                    draw(&session, canvas.as_mut(), t).await;
                    if t >= 1.0 {
                        started = None;
                        tracing::debug!("Animation settled");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skytrack_core::{Flight, ScreenPoint};

    #[derive(Default)]
    struct RecordingCanvas {
        markers: Vec<(ScreenPoint, f64, String)>,
    }

    impl Canvas for RecordingCanvas {
        fn size(&self) -> (f64, f64) {
            (100.0, 100.0)
        }
        fn clear(&mut self) {
            self.markers.clear();
        }
        fn caption(&mut self, _text: &str) {}
        fn draw_marker(&mut self, at: ScreenPoint, heading_deg: f64, label: &str) {
            self.markers.push((at, heading_deg, label.to_string()));
        }
        fn present(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn flight(id: &str, lat: f64, lon: f64, heading_deg: f64) -> Flight {
        Flight {
            icao24: id.to_string(),
            callsign: id.to_uppercase(),
            country: "United States".to_string(),
            lat,
            lon,
            altitude_ft: 30_000,
            speed_mph: None,
            heading_deg,
            last_contact: None,
        }
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap()
    }

    #[test]
    fn interpolates_matched_flights_midway() {
        let pair = SnapshotPair {
            previous: vec![flight("a", 2.0, 2.0, 0.0)],
            current: vec![flight("a", 4.0, 6.0, 90.0)],
            updated_at: None,
        };
        let mut canvas = RecordingCanvas::default();

        let drawn = render_frame(&pair, &bbox(), 0.5, &mut canvas);

        assert_eq!(drawn, 1);
        let (at, heading, label) = &canvas.markers[0];
        assert_eq!(at.x, 40.0);
        assert_eq!(at.y, 70.0);
        assert_eq!(*heading, 45.0);
        assert_eq!(label, "A");
    }

    #[test]
    fn new_flights_draw_at_current_position() {
        let pair = SnapshotPair {
            previous: vec![flight("a", 2.0, 2.0, 0.0)],
            current: vec![flight("b", 5.0, 5.0, 180.0)],
            updated_at: None,
        };
        let mut canvas = RecordingCanvas::default();

        render_frame(&pair, &bbox(), 0.25, &mut canvas);

        let (at, heading, _) = &canvas.markers[0];
        assert_eq!((at.x, at.y), (50.0, 50.0));
        assert_eq!(*heading, 180.0);
    }

    #[test]
    fn matches_by_id_not_position() {
        let pair = SnapshotPair {
            previous: vec![flight("b", 8.0, 8.0, 0.0), flight("a", 2.0, 2.0, 0.0)],
            current: vec![flight("a", 4.0, 4.0, 0.0), flight("b", 6.0, 6.0, 0.0)],
            updated_at: None,
        };
        let mut canvas = RecordingCanvas::default();

        render_frame(&pair, &bbox(), 0.5, &mut canvas);

        assert_eq!(canvas.markers[0].0.x, 30.0);
        assert_eq!(canvas.markers[1].0.x, 70.0);
    }

    #[test]
    fn at_rest_uses_current_values_only() {
        let pair = SnapshotPair {
            previous: vec![flight("a", 2.0, 2.0, 10.0)],
            current: vec![flight("a", 4.0, 6.0, 90.0)],
            updated_at: None,
        };
        let mut canvas = RecordingCanvas::default();

        render_frame(&pair, &bbox(), 1.0, &mut canvas);

        let (at, heading, _) = &canvas.markers[0];
        assert_eq!((at.x, at.y), (60.0, 60.0));
        assert_eq!(*heading, 90.0);
    }

    #[test]
    fn skips_flights_outside_box() {
        let pair = SnapshotPair {
            previous: vec![],
            current: vec![flight("in", 5.0, 5.0, 0.0), flight("out", 20.0, 5.0, 0.0)],
            updated_at: None,
        };
        let mut canvas = RecordingCanvas::default();

        assert_eq!(render_frame(&pair, &bbox(), 1.0, &mut canvas), 1);
        assert_eq!(canvas.markers[0].2, "IN");
    }

    /// Records the first marker of every presented frame.
    #[derive(Clone, Default)]
    struct SharedCanvas {
        pending: Arc<std::sync::Mutex<Vec<ScreenPoint>>>,
        frames: Arc<std::sync::Mutex<Vec<Option<ScreenPoint>>>>,
    }

    impl SharedCanvas {
        fn frames(&self) -> Vec<Option<ScreenPoint>> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl Canvas for SharedCanvas {
        fn size(&self) -> (f64, f64) {
            (100.0, 100.0)
        }
        fn clear(&mut self) {
            self.pending.lock().unwrap().clear();
        }
        fn caption(&mut self, _text: &str) {}
        fn draw_marker(&mut self, at: ScreenPoint, _heading_deg: f64, _label: &str) {
            self.pending.lock().unwrap().push(at);
        }
        fn present(&mut self) -> std::io::Result<()> {
            let first = self.pending.lock().unwrap().first().copied();
            self.frames.lock().unwrap().push(first);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn animation_runs_one_interval_then_rests() {
        let session = Arc::new(Session::new(
            skytrack_opensky::TokenManager::new(reqwest::Client::new(), "http://127.0.0.1:9/token"),
            skytrack_core::BoundingBoxControl::new(bbox()),
        ));
        session.commit(vec![flight("a", 5.0, 0.0, 90.0)]);

        let canvas = SharedCanvas::default();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_render_loop(
            session.clone(),
            Box::new(canvas.clone()),
            Duration::from_secs(1),
            Duration::from_millis(100),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(canvas.frames().len(), 1);

        session.commit(vec![flight("a", 5.0, 10.0, 90.0)]);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let frames = canvas.frames();
        assert!(frames.len() > 3);
        let xs: Vec<f64> = frames[1..].iter().map(|f| f.unwrap().x).collect();
        assert_eq!(xs[0], 0.0);
        assert!(xs.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*xs.last().unwrap(), 100.0);

        // Settled: no further frames until the next rotation.
        let settled = frames.len();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(canvas.frames().len(), settled);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
