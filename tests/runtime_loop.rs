use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use moonwatch::ephemeris::ConfiguredLoader;
use moonwatch::error::LocationError;
use moonwatch::location::{Geolocator, LocationService, Reachability};
use moonwatch::runtime::{stop_channel, Runtime};
use moonwatch::utils::config::EphemerisSource;
use moonwatch::{EngineConfig, ObserverLocation, Snapshot, SnapshotSink};

#[derive(Clone, Default)]
struct Collect(Arc<Mutex<Vec<Snapshot>>>);

impl SnapshotSink for Collect {
    fn publish(&mut self, snapshot: &Snapshot) -> std::io::Result<()> {
        self.0.lock().push(snapshot.clone());
        Ok(())
    }
}

struct Online;

impl Reachability for Online {
    fn is_online(&self) -> bool {
        true
    }
}

struct Tokyo;

impl Geolocator for Tokyo {
    fn name(&self) -> &str {
        "tokyo"
    }

    fn resolve(&self) -> Result<ObserverLocation, LocationError> {
        ObserverLocation::new("Tokyo, JP", 35.6762, 139.6503, "Asia/Tokyo")
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn loop_publishes_snapshots_until_stopped() {
    let mut config = EngineConfig::default();
    config.ephemeris.source = EphemerisSource::Series;

    let service = LocationService::new(Box::new(Online), config.default_location.clone())
        .with_primary(Box::new(Tokyo));
    let runtime = Runtime::new(config.clone(), Arc::new(ConfiguredLoader::from_config(&config)))
        .with_location_service(Arc::new(service));

    let sink = Collect::default();
    let (stop_tx, stop_rx) = stop_channel();
    let run = tokio::spawn(runtime.run(Box::new(sink.clone()), stop_rx));

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    stop_tx.send(true).unwrap();
    let stats = run.await.unwrap();

    assert!(stats.ticks >= 2, "{stats:?}");
    assert_eq!(stats.failed_ticks, 0);
    assert!(stats.location_reports >= 1);

    let snapshots = sink.0.lock();
    assert_eq!(snapshots.len() as u64, stats.ticks);
    let last = snapshots.last().unwrap();
    assert_eq!(last.location.name(), "Tokyo, JP");
    assert_eq!(last.online, Some(true));
    assert!(last.altitude_deg.is_available());
    assert!(snapshots.windows(2).all(|w| w[0].utc_time < w[1].utc_time));
}
