//! Settings and system RPC functions served end to end through the
//! dispatcher, against mock storage and recorded collaborators.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use beacon::app::handlers::register_functions;
use beacon::app::service::BeaconService;
use beacon::rpc::channels::ChannelConfig;
use beacon::rpc::{
    Address, ChannelHub, ChannelId, Dispatcher, FunctionRegistry, ResponsePolicy, RpcRequest,
};
use beacon::settings::store::{SETTINGS_KEY, SETTINGS_NAMESPACE};
use beacon::settings::{Scalar, Schema, SettingsDocument, keys};
use serde_json::{Value, json};

use crate::mock_hw::{Call, MemStorage, Recorder, RecordingTransport, TEST_USER_ID, service_with};

const CLIENT: Address = Address::Connection(7);

struct Rig {
    dispatcher: Dispatcher<BeaconService<MemStorage>>,
    hub: Arc<ChannelHub>,
    channel: ChannelId,
    transport: Arc<RecordingTransport>,
    storage: MemStorage,
    rec: Arc<Recorder>,
}

impl Rig {
    fn new() -> Self {
        let storage = MemStorage::new();
        let rec = Recorder::new();
        let mut svc = service_with(storage.clone(), Schema::beacon(), &rec);
        svc.boot();
        rec.clear();

        let hub = Arc::new(ChannelHub::new());
        let transport = RecordingTransport::new();
        let channel = hub
            .add_channel(
                ChannelConfig {
                    label: "test",
                    capacity: 8,
                    policy: ResponsePolicy::EchoToSender,
                },
                transport.clone(),
            )
            .unwrap();
        hub.enable(channel).unwrap();

        let mut registry = FunctionRegistry::new();
        register_functions(&mut registry);
        let dispatcher = Dispatcher::new(registry, Arc::clone(&hub), svc);
        Self {
            dispatcher,
            hub,
            channel,
            transport,
            storage,
            rec,
        }
    }

    /// Queue `request`, run one pass, return the response if one was sent.
    fn call(&mut self, request: Value) -> Option<Value> {
        let before = self.transport.responses().len();
        let request = RpcRequest::from_value(request).unwrap();
        self.hub.enqueue(self.channel, request, CLIENT).unwrap();
        assert_eq!(self.dispatcher.poll_once(), 1);
        let sent = self.transport.responses();
        if sent.len() == before {
            return None;
        }
        let (response, to) = sent.last().cloned().unwrap();
        assert_eq!(to, CLIENT);
        Some(response)
    }

    fn svc(&self) -> &BeaconService<MemStorage> {
        self.dispatcher.context()
    }

    fn value(&self, key: &str) -> Option<Scalar> {
        self.svc().settings().value(key).cloned()
    }

    fn persisted(&self) -> SettingsDocument {
        let blob = self.storage.get(SETTINGS_NAMESPACE, SETTINGS_KEY).unwrap();
        SettingsDocument::decode(&blob).unwrap()
    }
}

#[test]
fn get_settings_returns_the_ui_document() {
    let mut rig = Rig::new();
    let resp = rig.call(json!({"function": "GetSettings"})).unwrap();
    let settings = resp["settings"].as_object().unwrap();
    assert_eq!(settings.len(), Schema::beacon().fields().len());
    assert_eq!(settings["Frequency"]["cfgType"], 9);
    assert_eq!(settings["Frequency"]["cfgVal"], 914.9);
    assert_eq!(settings["Color Theme"]["valTxt"][2], "Green");
    assert_eq!(settings["UserID"], TEST_USER_ID);
    // Schema order is kept on the wire.
    assert_eq!(settings.keys().next().map(String::as_str), Some(keys::USER_ID));
}

#[test]
fn valid_update_is_stored_persisted_and_announced() {
    let mut rig = Rig::new();
    let writes = rig.svc().store().writes();

    let resp = rig
        .call(json!({"function": "UpdateSetting", "field": "Frequency", "value": 903.5}))
        .unwrap();
    assert_eq!(resp, json!({"field": "Frequency", "value": 903.5}));
    assert_eq!(rig.value(keys::FREQUENCY), Some(Scalar::Float(903.5)));
    assert_eq!(rig.svc().store().writes(), writes + 1);
    assert_eq!(
        rig.persisted().value(keys::FREQUENCY),
        Some(&Scalar::Float(903.5))
    );
    assert_eq!(rig.rec.last_frequency(), Some(903.5));
}

#[test]
fn out_of_range_frequency_is_rejected_without_side_effects() {
    let mut rig = Rig::new();
    let writes = rig.svc().store().writes();

    let resp = rig
        .call(json!({"function": "UpdateSetting", "field": "Frequency", "value": 915.1}))
        .unwrap();
    assert_eq!(resp["error"], "ValidationFailed");
    assert_eq!(resp["function"], "UpdateSetting");
    assert_eq!(resp["field"], "Frequency");
    assert_eq!(rig.value(keys::FREQUENCY), Some(Scalar::Float(914.9)));
    assert_eq!(rig.svc().store().writes(), writes);
    assert!(rig.rec.calls().is_empty());
}

#[test]
fn frequency_must_sit_on_the_channel_grid() {
    let mut rig = Rig::new();
    let resp = rig
        .call(json!({"function": "UpdateSetting", "field": "Frequency", "value": 910.2}))
        .unwrap();
    assert_eq!(resp["error"], "ValidationFailed");

    // 902.3 + 39 * 0.2
    let resp = rig
        .call(json!({"function": "UpdateSetting", "field": "Frequency", "value": 910.1}))
        .unwrap();
    assert_eq!(resp["field"], "Frequency");
    assert!(resp.get("error").is_none());
}

#[test]
fn read_only_and_unknown_fields_are_refused() {
    let mut rig = Rig::new();

    let resp = rig
        .call(json!({"function": "UpdateSetting", "field": "UserID", "value": 1}))
        .unwrap();
    assert_eq!(resp["error"], "ValidationFailed");
    assert!(resp["message"].as_str().unwrap().contains("read-only"));
    assert_eq!(rig.value(keys::USER_ID), Some(Scalar::Int(TEST_USER_ID.into())));

    let resp = rig
        .call(json!({"function": "UpdateSetting", "field": "Firmware Version", "value": "9.9.9"}))
        .unwrap();
    assert_eq!(resp["error"], "ValidationFailed");

    let resp = rig
        .call(json!({"function": "UpdateSetting", "field": "Volume", "value": 3}))
        .unwrap();
    assert_eq!(resp["error"], "ValidationFailed");
    assert_eq!(resp["field"], "Volume");
}

#[test]
fn missing_params_are_invalid() {
    let mut rig = Rig::new();
    let resp = rig
        .call(json!({"function": "UpdateSetting", "field": "Frequency"}))
        .unwrap();
    assert_eq!(resp["error"], "InvalidParams");

    let resp = rig
        .call(json!({"function": "UpdateSetting", "field": "Frequency", "value": [1]}))
        .unwrap();
    assert_eq!(resp["error"], "InvalidParams");
}

#[test]
fn storage_failure_is_reported_but_memory_and_subscribers_follow() {
    let mut rig = Rig::new();
    rig.storage.fail_writes(true);

    let resp = rig
        .call(json!({"function": "UpdateSetting", "field": "Silent Mode", "value": true}))
        .unwrap();
    assert_eq!(resp["error"], "StorageError");
    assert_eq!(rig.value(keys::SILENT_MODE), Some(Scalar::Bool(true)));
    assert!(rig.rec.calls().contains(&Call::SilentMode(true)));
    assert_eq!(
        rig.persisted().value(keys::SILENT_MODE),
        Some(&Scalar::Bool(false))
    );

    // Once storage recovers the next write carries the earlier change.
    rig.storage.fail_writes(false);
    rig.call(json!({"function": "UpdateSetting", "field": "24H Time", "value": true}))
        .unwrap();
    assert_eq!(
        rig.persisted().value(keys::SILENT_MODE),
        Some(&Scalar::Bool(true))
    );
}

#[test]
fn batch_update_is_all_or_nothing() {
    let mut rig = Rig::new();
    let writes = rig.svc().store().writes();

    let resp = rig
        .call(json!({
            "function": "UpdateSettings",
            "settings": {"Broadcast Attempts": 4, "Frequency": 999.0}
        }))
        .unwrap();
    assert_eq!(resp["error"], "ValidationFailed");
    assert_eq!(resp["field"], "Frequency");
    assert_eq!(rig.value(keys::BROADCAST_ATTEMPTS), Some(Scalar::Int(3)));
    assert_eq!(rig.svc().store().writes(), writes);

    let resp = rig
        .call(json!({
            "function": "UpdateSettings",
            "settings": {"Broadcast Attempts": 4, "24H Time": true, "Color Theme": 8}
        }))
        .unwrap();
    assert_eq!(resp, json!({"updated": 3}));
    assert_eq!(rig.value(keys::BROADCAST_ATTEMPTS), Some(Scalar::Int(4)));
    assert_eq!(rig.svc().store().writes(), writes + 1);
    // One notification round for the whole batch.
    assert_eq!(rig.rec.count(|c| matches!(c, Call::Time24h(_))), 1);
    assert_eq!(
        rig.rec.last_theme(),
        Some(beacon::settings::Rgb::new(0xFF, 0xA5, 0x00))
    );
}

#[test]
fn system_info_reports_versions_and_heap() {
    let mut rig = Rig::new();
    let resp = rig.call(json!({"function": "GetSystemInfo"})).unwrap();
    assert_eq!(resp["firmwareVersion"], env!("CARGO_PKG_VERSION"));
    assert_eq!(resp["hardwareVersion"], 3);
    assert_eq!(resp["userId"], TEST_USER_ID);
    assert_eq!(resp["deviceName"], "Beacon_EE42");
    assert_eq!(resp["uptimeSecs"], 42);
    assert_eq!(resp["freeHeap"], 150_000);
    assert_eq!(resp["settingsOverflowed"], false);
}

#[test]
fn restart_has_no_response() {
    let mut rig = Rig::new();
    assert_eq!(rig.call(json!({"function": "RestartSystem"})), None);
    assert_eq!(rig.rec.calls(), vec![Call::Restart]);
}

#[test]
fn wifi_credentials_release_the_provisioning_link_on_success() {
    let mut rig = Rig::new();

    let resp = rig
        .call(json!({"function": "BroadcastWifiCredentials", "SSID": "camp", "Password": "hunter22"}))
        .unwrap();
    assert_eq!(resp, json!({"connected": false}));
    assert_eq!(
        rig.rec.count(|c| matches!(c, Call::ProvisioningDeinit { .. })),
        0
    );

    rig.rec.ap_joins.store(true, Ordering::SeqCst);
    let resp = rig
        .call(json!({"function": "BroadcastWifiCredentials", "SSID": "camp", "Password": "hunter22"}))
        .unwrap();
    assert_eq!(resp, json!({"connected": true}));
    assert!(rig.rec.calls().contains(&Call::ProvisioningDeinit {
        disable_radio: false
    }));

    let resp = rig
        .call(json!({"function": "BroadcastWifiCredentials", "SSID": "camp"}))
        .unwrap();
    assert_eq!(resp["error"], "InvalidParams");
}
