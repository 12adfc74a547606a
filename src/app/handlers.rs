//! RPC functions served by the beacon.
//!
//! | Function                   | Params                          | Response                     |
//! |----------------------------|---------------------------------|------------------------------|
//! | `GetSettings`              |                                 | `{"settings": {...}}`        |
//! | `UpdateSetting`            | `field`, `value`                | `{"field", "value"}`         |
//! | `UpdateSettings`           | `settings: {name: value, ...}`  | `{"updated": n}`             |
//! | `GetSystemInfo`            |                                 | versions, heap, uptime       |
//! | `RestartSystem`            |                                 | none                         |
//! | `BroadcastWifiCredentials` | `SSID`, `Password`              | `{"connected": bool}`        |

use log::{info, warn};
use serde_json::{Map, Value, json};

use super::ports::StoragePort;
use super::service::{BeaconService, SettingsUpdateError};
use crate::rpc::{FunctionRegistry, HandlerResult, RpcError, RpcRequest};
use crate::settings::{Scalar, keys};

pub mod names {
    pub const GET_SETTINGS: &str = "GetSettings";
    pub const UPDATE_SETTING: &str = "UpdateSetting";
    pub const UPDATE_SETTINGS: &str = "UpdateSettings";
    pub const GET_SYSTEM_INFO: &str = "GetSystemInfo";
    pub const RESTART_SYSTEM: &str = "RestartSystem";
    pub const BROADCAST_WIFI_CREDENTIALS: &str = "BroadcastWifiCredentials";
}

/// Register every beacon function.
pub fn register_functions<S>(registry: &mut FunctionRegistry<BeaconService<S>>)
where
    S: StoragePort + 'static,
{
    registry.register(names::GET_SETTINGS, get_settings::<S>);
    registry.register(names::UPDATE_SETTING, update_setting::<S>);
    registry.register(names::UPDATE_SETTINGS, update_settings::<S>);
    registry.register(names::GET_SYSTEM_INFO, get_system_info::<S>);
    registry.register(names::RESTART_SYSTEM, restart_system::<S>);
    registry.register(
        names::BROADCAST_WIFI_CREDENTIALS,
        broadcast_wifi_credentials::<S>,
    );
}

fn get_settings<S: StoragePort>(svc: &mut BeaconService<S>, _req: &RpcRequest) -> HandlerResult {
    Ok(Some(json!({ "settings": svc.settings().to_json() })))
}

fn update_setting<S: StoragePort>(svc: &mut BeaconService<S>, req: &RpcRequest) -> HandlerResult {
    let field = req.str_param("field").ok_or(RpcError::InvalidParams("field"))?;
    let value = req
        .param("value")
        .and_then(Scalar::from_json)
        .ok_or(RpcError::InvalidParams("value"))?;

    let stored = svc.update_setting(field, &value).map_err(into_rpc_error)?;
    Ok(Some(json!({ "field": field, "value": stored.to_json() })))
}

fn update_settings<S: StoragePort>(svc: &mut BeaconService<S>, req: &RpcRequest) -> HandlerResult {
    let settings = req
        .param("settings")
        .and_then(Value::as_object)
        .ok_or(RpcError::InvalidParams("settings"))?;
    let updates = parse_updates(settings)?;
    let updated = svc.update_settings(&updates).map_err(into_rpc_error)?;
    Ok(Some(json!({ "updated": updated })))
}

fn parse_updates(settings: &Map<String, Value>) -> Result<Vec<(String, Scalar)>, RpcError> {
    settings
        .iter()
        .map(|(name, v)| {
            Scalar::from_json(v)
                .map(|s| (name.clone(), s))
                .ok_or_else(|| RpcError::Validation {
                    field: name.clone(),
                    reason: "value must be a bool, number or string".into(),
                })
        })
        .collect()
}

fn get_system_info<S: StoragePort>(svc: &mut BeaconService<S>, _req: &RpcRequest) -> HandlerResult {
    let info = svc.system().system_info();
    let doc = svc.settings();
    let text = |key| doc.value(key).and_then(Scalar::as_text).unwrap_or_default();
    Ok(Some(json!({
        "firmwareVersion": text(keys::FIRMWARE_VERSION),
        "hardwareVersion": doc.value(keys::HARDWARE_VERSION).and_then(Scalar::as_int),
        "deviceName": text(keys::DEVICE_NAME),
        "userId": doc.value(keys::USER_ID).and_then(Scalar::as_int),
        "uptimeSecs": info.uptime_secs,
        "freeHeap": info.free_heap,
        "minFreeHeap": info.min_free_heap,
        "settingsOverflowed": svc.store().overflowed(),
    })))
}

fn restart_system<S: StoragePort>(svc: &mut BeaconService<S>, _req: &RpcRequest) -> HandlerResult {
    warn!("RPC: restart requested");
    svc.system().restart();
    Ok(None)
}

fn broadcast_wifi_credentials<S: StoragePort>(
    svc: &mut BeaconService<S>,
    req: &RpcRequest,
) -> HandlerResult {
    let ssid = req.str_param("SSID").ok_or(RpcError::InvalidParams("SSID"))?;
    let password = req
        .str_param("Password")
        .ok_or(RpcError::InvalidParams("Password"))?;

    let connected = svc.network().connect_to_access_point(ssid, password);
    if connected {
        info!("RPC: joined '{}', releasing provisioning link", ssid);
        if let Some(link) = svc.provisioning() {
            link.deinitialize(false);
        }
    } else {
        warn!("RPC: could not join '{}'", ssid);
    }
    Ok(Some(json!({ "connected": connected })))
}

fn into_rpc_error(e: SettingsUpdateError) -> RpcError {
    match e {
        SettingsUpdateError::Rejected { field, error } => RpcError::Validation {
            field,
            reason: error.to_string(),
        },
        SettingsUpdateError::NotPersisted(e) => RpcError::Storage(e.to_string()),
    }
}
