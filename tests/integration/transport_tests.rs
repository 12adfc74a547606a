//! Web and mesh transports feeding one dispatcher.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use beacon::adapters::mesh_rpc::{FrameError, MeshRpcAdapter};
use beacon::adapters::web_rpc::{StationEvent, SubmitError, WebRpcAdapter};
use beacon::app::handlers::register_functions;
use beacon::app::ports::ProvisioningLinkPort;
use beacon::app::service::{BeaconService, Collaborators};
use beacon::app::subscribers::register_subscribers;
use beacon::rpc::channels::EnqueueError;
use beacon::rpc::{ChannelHub, ChannelState, Dispatcher, DispatcherConfig, FunctionRegistry};
use beacon::settings::{Schema, SettingsNotifier, SettingsStore};
use serde_json::json;

use crate::mock_hw::{Call, FixedRng, MemStorage, Recorder, TEST_USER_ID};

const DONGLE: [u8; 6] = [0x24, 0x0A, 0xC4, 0x12, 0x34, 0x56];

struct Stack {
    hub: Arc<ChannelHub>,
    web: Arc<WebRpcAdapter>,
    mesh: Arc<MeshRpcAdapter>,
    rec: Arc<Recorder>,
    dispatcher: Dispatcher<BeaconService<MemStorage>>,
}

/// The firmware's wiring, with the mesh adapter as provisioning link and
/// the recorder behind every other port.
fn stack() -> Stack {
    let rec = Recorder::new();
    let hub = Arc::new(ChannelHub::new());
    let web = WebRpcAdapter::new(Arc::clone(&hub));
    web.attach().unwrap();
    let mesh = MeshRpcAdapter::new(Arc::clone(&hub), rec.clone());

    let mut notifier = SettingsNotifier::new();
    register_subscribers(&mut notifier, rec.clone(), rec.clone(), rec.clone());
    let mut svc = BeaconService::new(
        SettingsStore::new(MemStorage::new()),
        Schema::beacon(),
        notifier,
        Box::new(FixedRng(TEST_USER_ID)),
        Collaborators {
            system: rec.clone(),
            network: rec.clone(),
            provisioning: Some(mesh.clone() as Arc<dyn ProvisioningLinkPort>),
        },
    );
    svc.boot();

    let mut registry = FunctionRegistry::new();
    register_functions(&mut registry);
    let dispatcher = Dispatcher::new(registry, Arc::clone(&hub), svc);
    Stack {
        hub,
        web,
        mesh,
        rec,
        dispatcher,
    }
}

#[test]
fn web_request_is_answered_on_its_connection() {
    let mut s = stack();
    s.web.on_station_event(StationEvent::GotIp);

    let conn = s.web.submit(br#"{"function":"GetSystemInfo"}"#).unwrap();
    assert_eq!(s.dispatcher.poll_once(), 1);
    let resp = s.web.await_response(conn, Duration::from_millis(10)).unwrap();
    assert_eq!(resp["userId"], TEST_USER_ID);
}

#[test]
fn web_channel_follows_the_station_ip() {
    let s = stack();
    let id = s.web.channel_id();
    assert_eq!(s.hub.state(id), ChannelState::Disabled);
    assert_eq!(
        s.web.submit(br#"{"function":"GetSettings"}"#),
        Err(SubmitError::Rejected(EnqueueError::Disabled))
    );

    s.web.on_station_event(StationEvent::GotIp);
    assert_eq!(s.hub.state(id), ChannelState::Enabled);
    s.web.on_station_event(StationEvent::LostIp);
    assert_eq!(s.hub.state(id), ChannelState::Disabled);
}

#[test]
fn malformed_web_body_never_reaches_the_dispatcher() {
    let mut s = stack();
    s.web.on_station_event(StationEvent::GotIp);
    let reply = s.web.handle(b"{\"function\":", Duration::from_millis(1));
    assert_eq!(reply.status, 400);
    assert_eq!(s.dispatcher.poll_once(), 0);
    assert_eq!(s.dispatcher.stats().served, 0);
}

#[test]
fn unknown_function_over_web_is_a_well_formed_error() {
    let mut s = stack();
    s.web.on_station_event(StationEvent::GotIp);
    let conn = s.web.submit(br#"{"function":"SelfDestruct"}"#).unwrap();
    s.dispatcher.poll_once();
    let resp = s.web.await_response(conn, Duration::from_millis(10)).unwrap();
    assert_eq!(resp["error"], "UnknownFunction");
    assert_eq!(resp["function"], "SelfDestruct");
    assert_eq!(s.dispatcher.stats().unknown, 1);
}

#[test]
fn mesh_credentials_hand_over_to_wifi() {
    let mut s = stack();
    s.rec.ap_joins.store(true, Ordering::SeqCst);
    let id = s.mesh.initialize().unwrap();
    assert_eq!(s.hub.state(id), ChannelState::Enabled);

    s.mesh
        .on_receive(
            DONGLE,
            br#"{"function":"BroadcastWifiCredentials","SSID":"camp","Password":"hunter22"}"#,
        )
        .unwrap();
    assert_eq!(s.dispatcher.poll_once(), 1);

    // The handler released the link: channel disabled, radio kept on.
    assert_eq!(s.hub.state(id), ChannelState::Disabled);
    let calls = s.rec.calls();
    assert!(calls.contains(&Call::ConnectAp {
        ssid: "camp".into()
    }));
    assert!(calls.contains(&Call::MeshStop {
        disable_radio: false
    }));
    // Mesh traffic is fire-and-forget.
    assert_eq!(s.rec.count(|c| matches!(c, Call::MeshSend { .. })), 0);
    assert_eq!(s.dispatcher.stats().discarded, 1);

    assert_eq!(
        s.mesh.on_receive(DONGLE, br#"{"function":"GetSettings"}"#),
        Err(FrameError::Rejected(EnqueueError::Disabled))
    );
}

#[test]
fn one_request_per_channel_per_pass() {
    let mut s = stack();
    s.web.on_station_event(StationEvent::GotIp);
    s.mesh.initialize().unwrap();

    let a = s.web.submit(br#"{"function":"GetSystemInfo"}"#).unwrap();
    let b = s.web.submit(br#"{"function":"GetSystemInfo"}"#).unwrap();
    s.mesh
        .on_receive(DONGLE, br#"{"function":"GetSystemInfo"}"#)
        .unwrap();

    assert_eq!(s.dispatcher.poll_once(), 2);
    assert!(s.web.await_response(a, Duration::from_millis(10)).is_some());
    assert_eq!(s.dispatcher.poll_once(), 1);
    assert!(s.web.await_response(b, Duration::from_millis(10)).is_some());
    assert_eq!(s.dispatcher.poll_once(), 0);
}

#[test]
fn full_web_queue_pushes_back() {
    let s = stack();
    s.web.on_station_event(StationEvent::GotIp);
    for _ in 0..beacon::adapters::web_rpc::WEB_CHANNEL_CAPACITY {
        s.web.submit(br#"{"function":"GetSettings"}"#).unwrap();
    }
    let reply = s
        .web
        .handle(br#"{"function":"GetSettings"}"#, Duration::from_millis(1));
    assert_eq!(reply.status, 429);
}

#[test]
fn spawned_dispatcher_serves_blocking_web_clients() {
    let s = stack();
    s.web.on_station_event(StationEvent::GotIp);
    let web = Arc::clone(&s.web);
    let config = DispatcherConfig {
        idle_wait: Duration::from_millis(1),
        ..DispatcherConfig::default()
    };
    let _worker = s.dispatcher.spawn(config).unwrap();

    let reply = web.handle(
        json!({"function": "UpdateSetting", "field": "User Name", "value": "Ranger"})
            .to_string()
            .as_bytes(),
        Duration::from_secs(2),
    );
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, json!({"field": "User Name", "value": "Ranger"}));
}
