//! Client-level integration tests against a mock AVR TCP server.
//!
//! These verify the connection lifecycle, request/response correlation under
//! interleaving, zone discovery, source map construction and local command
//! validation, all without real hardware.

mod mock_avr;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use avrlink::error::Error;
use avrlink::params::PARAM_ENABLED_LISTENING_MODES;
use avrlink::{AvrClient, Zone};

use mock_avr::MockAvrServer;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

async fn connected_client(server: &MockAvrServer) -> Arc<AvrClient> {
    let client = AvrClient::new(server.addr.ip().to_string(), Some(server.addr.port()), None);
    client.connect(false).await.unwrap();
    client
}

/// Poll until `predicate` holds or the timeout expires.
async fn wait_until<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    predicate()
}

#[tokio::test]
async fn connect_discover_and_device_info() {
    init_tracing();
    let server = MockAvrServer::start().await;
    let client = connected_client(&server).await;
    assert!(client.available());

    // double connect is rejected
    assert!(matches!(client.connect(false).await, Err(Error::AlreadyConnected)));

    client.query_device_info().await.unwrap();
    {
        let properties = client.properties();
        let properties = properties.read();
        assert_eq!(properties.amp.get("model"), Some(&json!("VSX-930")));
        assert_eq!(properties.amp.get("mac_addr"), Some(&json!("00:05:9A:3C:7A:00")));
        assert_eq!(properties.amp.get("software_version"), Some(&json!("1.368")));
    }
    // model defaults were re-derived from the reported model
    assert!(!client.params().get_int_list(PARAM_ENABLED_LISTENING_MODES).is_empty());

    client.query_zones(false).await.unwrap();
    {
        let properties = client.properties();
        let properties = properties.read();
        assert!(properties.zones.contains(&Zone::Z1));
        assert!(properties.zones.contains(&Zone::Z2));
        // Zone 3 and HDZone answered E04 and were not discovered
        assert!(!properties.zones.contains(&Zone::Z3));
        assert!(!properties.zones.contains(&Zone::Hdz));
        assert_eq!(properties.max_volume.get(&Zone::Z1), Some(&185));
        assert_eq!(properties.max_volume.get(&Zone::Z2), Some(&81));
    }

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn request_response_correlation_under_interleaving() {
    init_tracing();
    let server = MockAvrServer::start().await;
    let client = connected_client(&server).await;
    client.properties().write().zones.insert(Zone::Z1);

    // the mock sends VOL100 ahead of the RGD response: the requester must
    // skip it, and the volume must be committed before the request returns
    let response = client.send_command("system_query_model", Zone::Z1, &[]).await.unwrap();
    assert_eq!(response.as_deref(), Some("RGD<VSX-930/B>"));
    assert_eq!(client.properties().read().volume.get(&Zone::Z1), Some(&100));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn build_source_dict_and_manual_override() {
    init_tracing();
    let server = MockAvrServer::start().await;
    let client = connected_client(&server).await;
    client.params().set_user_param("max_source_id", json!(5));

    client.build_source_dict().await.unwrap();
    {
        let properties = client.properties();
        let properties = properties.read();
        assert_eq!(properties.source_id_to_name.get(&1), Some(&"CD".to_string()));
        assert_eq!(properties.source_id_to_name.get(&2), Some(&"TUNER".to_string()));
        assert_eq!(properties.source_name_to_id.len(), 2);
    }

    // a manually-set source dict freezes the map against decoded frames
    client.set_source_dict(BTreeMap::from([(25, "BD".to_string())])).unwrap();
    server.inject("RGB011CD");
    tokio::time::sleep(Duration::from_millis(200)).await;
    {
        let properties = client.properties();
        let properties = properties.read();
        assert_eq!(properties.source_id_to_name.len(), 1);
        assert!(properties.source_name_to_id.contains_key("BD"));
    }

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn volume_bounds_rejected_before_emission() {
    init_tracing();
    let server = MockAvrServer::start().await;
    let client = connected_client(&server).await;
    {
        let properties = client.properties();
        let mut properties = properties.write();
        properties.zones.insert(Zone::Z1);
        properties.max_volume.insert(Zone::Z1, 185);
    }

    let err = client.set_volume_level(200, Zone::Z1).await.unwrap_err();
    assert!(matches!(err, Error::LocalCommand { .. }));
    assert!(!server.received_commands().iter().any(|c| c.contains("VL")));

    // at the bound the command is emitted and acknowledged
    client.set_volume_level(185, Zone::Z1).await.unwrap();
    assert!(server.received_commands().contains(&"185VL".to_string()));
    assert_eq!(client.properties().read().volume.get(&Zone::Z1), Some(&185));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn power_on_fires_zone_callbacks() {
    init_tracing();
    let server = MockAvrServer::start().await;
    let client = connected_client(&server).await;
    {
        let properties = client.properties();
        let mut properties = properties.write();
        properties.zones.insert(Zone::Z1);
        // mark the initial refresh done so power-on only queues the basic query
        properties.zones_initial_refresh.insert(Zone::Z1);
    }

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_cb = fired.clone();
    client.set_zone_callback(
        Zone::Z1,
        Box::new(move || {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        }),
    );

    client.turn_on(Zone::Z1).await.unwrap();
    assert!(
        wait_until(|| fired.load(Ordering::SeqCst) > 0, Duration::from_secs(2)).await,
        "zone callback did not fire"
    );
    assert_eq!(client.properties().read().power.get(&Zone::Z1), Some(&true));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn unsupported_command_surfaces_wire_error() {
    init_tracing();
    let server = MockAvrServer::start().await;
    let client = connected_client(&server).await;
    client.properties().write().zones.insert(Zone::Z1);

    // mock answers E04 to tone queries; the requester is woken with the
    // decoded command error, not a timeout
    let err = client.send_command("query_tone_status", Zone::Z1, &[]).await.unwrap_err();
    match err {
        Error::CommandResponse { command, response } => {
            assert_eq!(command, "?TO");
            assert_eq!(response, "E04");
        }
        other => panic!("expected CommandResponse error, got {other}"),
    }

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn async_status_frames_update_state() {
    init_tracing();
    let server = MockAvrServer::start().await;
    let client = connected_client(&server).await;
    client.properties().write().zones.insert(Zone::Z1);

    server.inject("MUT0");
    server.inject("SR0001");
    let updated = wait_until(
        || {
            let properties = client.properties();
            let properties = properties.read();
            properties.mute.get(&Zone::Z1) == Some(&true)
                && properties.listening_mode.as_deref() == Some("STEREO")
        },
        Duration::from_secs(2),
    )
    .await;
    assert!(updated, "injected frames were not decoded");

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn reconnects_after_connection_drop() {
    init_tracing();
    let server = MockAvrServer::start().await;
    let client = AvrClient::new(server.addr.ip().to_string(), Some(server.addr.port()), None);
    client.connect(true).await.unwrap();
    assert!(client.available());

    server.close_connection();
    // the listener observes EOF, disconnects and schedules reconnection
    assert!(
        wait_until(|| !client.available(), Duration::from_secs(2)).await,
        "client did not notice the dropped connection"
    );
    // backoff floor is 4 s; allow some headroom
    assert!(
        wait_until(|| client.available(), Duration::from_secs(15)).await,
        "client did not reconnect"
    );

    client.shutdown().await.unwrap();
}
