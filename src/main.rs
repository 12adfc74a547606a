//! Field beacon firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsAdapter     HardwareRng    SystemAdapter   LogCollaborators│
//! │  (StoragePort)  (RandomSource) (SystemPort)    (LED/radio/...) │
//! │  WebRpcAdapter  MeshRpcAdapter                                 │
//! │  (POST /rpc)    (ESP-NOW provisioning)                         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │         BeaconService (settings store · schema)        │    │
//! │  │         Dispatcher (registry · channels)               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use beacon::adapters::log_sink::LogCollaborators;
use beacon::adapters::mesh_rpc::MeshRpcAdapter;
use beacon::adapters::nvs::NvsAdapter;
use beacon::adapters::rng::HardwareRng;
use beacon::adapters::system::SystemAdapter;
use beacon::adapters::web_rpc::{StationEvent, WebRpcAdapter};
use beacon::app::handlers::register_functions;
use beacon::app::ports::{ProvisioningLinkPort, SystemPort};
use beacon::app::service::{BeaconService, Collaborators};
use beacon::app::subscribers::register_subscribers;
use beacon::rpc::{ChannelHub, Dispatcher, DispatcherConfig, FunctionRegistry};
use beacon::settings::schema::PROVISIONING_ESP_NOW;
use beacon::settings::{BeaconSettings, Schema, SettingsNotifier, SettingsStore};

/// Heartbeat period of the idle main task.
const HEARTBEAT: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    // ── 1. Runtime and logging ────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Beacon v{}                          ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Adapters ───────────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {e}"))?;
    let collaborators = Arc::new(LogCollaborators::new());
    let system = Arc::new(SystemAdapter::new());

    let hub = Arc::new(ChannelHub::new());
    let web = WebRpcAdapter::new(Arc::clone(&hub));
    web.attach().context("web channel")?;
    let mesh = MeshRpcAdapter::new(Arc::clone(&hub), collaborators.clone());

    // ── 3. Settings: load → migrate → persist → notify ────────
    let mut notifier = SettingsNotifier::new();
    register_subscribers(
        &mut notifier,
        collaborators.clone(),
        collaborators.clone(),
        system.clone(),
    );

    let mut service = BeaconService::new(
        SettingsStore::new(nvs),
        Schema::beacon(),
        notifier,
        Box::new(HardwareRng::new()),
        Collaborators {
            system: system.clone(),
            network: collaborators.clone(),
            provisioning: Some(mesh.clone() as Arc<dyn ProvisioningLinkPort>),
        },
    );
    let boot = service.boot();
    if let Err(e) = boot.check() {
        // In-memory settings stay authoritative until the next good write.
        warn!("Boot: {}", e);
    }
    let settings = BeaconSettings::from_document(service.settings())
        .context("migrated settings incomplete")?;
    let snapshot = service.snapshot();

    // ── 4. RPC dispatcher ─────────────────────────────────────
    let mut registry = FunctionRegistry::new();
    register_functions(&mut registry);
    let dispatcher = Dispatcher::new(registry, Arc::clone(&hub), service);
    let _dispatcher = dispatcher
        .spawn(DispatcherConfig::default())
        .context("dispatcher worker")?;

    // ── 5. Transports ─────────────────────────────────────────
    if settings.wifi_provisioning == PROVISIONING_ESP_NOW {
        if let Err(e) = mesh.initialize() {
            warn!("Mesh: provisioning unavailable: {}", e);
        }
    }

    let _server = web.serve()?;
    let sysloop = esp_idf_svc::eventloop::EspSystemEventLoop::take()?;
    let station = Arc::clone(&web);
    let _ip_events = sysloop.subscribe::<esp_idf_svc::netif::IpEvent, _>(move |event| {
        match event {
            esp_idf_svc::netif::IpEvent::DhcpIpAssigned(_) => {
                station.on_station_event(StationEvent::GotIp);
            }
            esp_idf_svc::netif::IpEvent::DhcpIpDeassigned(_) => {
                station.on_station_event(StationEvent::LostIp);
            }
            _ => {}
        }
    })?;

    info!(
        "System ready: {} ({:08X}), {} RPC channels",
        settings.device_name,
        settings.user_id,
        hub.len()
    );

    // ── 6. Idle heartbeat ─────────────────────────────────────
    loop {
        std::thread::sleep(HEARTBEAT);
        let info = system.system_info();
        info!(
            "HEARTBEAT | up={}s | heap={}/{} | settings gen={}",
            info.uptime_secs,
            info.free_heap,
            info.min_free_heap,
            snapshot.generation()
        );
    }
}
