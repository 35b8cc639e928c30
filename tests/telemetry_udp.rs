//! Telemetry over a real loopback UDP link, from session to receiver.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thrust_daq::hardware::MockLoadCell;
use thrust_daq::telemetry::{FINISHED_MESSAGE, START_MESSAGE};
use thrust_daq::transport::{PeerId, TelemetryReceiver, UdpTransport};
use thrust_daq::{Devices, SessionController, SessionSettings, TelemetrySettings};

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

#[tokio::test]
async fn receiver_sees_start_samples_and_finish() {
    let mut receiver = TelemetryReceiver::bind(loopback()).await.unwrap();
    let peer = PeerId::new(receiver.local_addr().unwrap().to_string());

    let mut settings = SessionSettings::new(Duration::from_millis(20), Duration::from_millis(200));
    let dir = tempfile::tempdir().unwrap();
    settings.fallback_path = dir.path().join("Thrust_values.csv");
    settings.telemetry = Some(TelemetrySettings {
        peer,
        period: Duration::from_millis(20),
    });

    let link = Arc::new(UdpTransport::bind(loopback()).await.unwrap());
    let devices = Devices::load_cell(Arc::new(MockLoadCell::new(100)));
    let mut session = SessionController::new(settings, devices, link).unwrap();

    let collect = tokio::spawn(async move {
        let mut texts = Vec::new();
        while let Some((_, text)) = receiver.recv().await.unwrap() {
            texts.push(text);
        }
        texts
    });

    let summary = session.record().await.unwrap();
    assert_eq!(summary.samples, 10);

    let texts = tokio::time::timeout(Duration::from_secs(5), collect)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(texts.first().map(String::as_str), Some(START_MESSAGE));
    assert_eq!(texts.last().map(String::as_str), Some(FINISHED_MESSAGE));
    assert!(texts.iter().all(|t| t.len() <= 250));
}
