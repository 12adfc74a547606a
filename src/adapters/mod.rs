//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                       | Connects to               |
//! |-------------|----------------------------------|---------------------------|
//! | `log_sink`  | LedPort, RadioPort, DisplayPort  | Serial log output         |
//! |             | NetworkPort, MeshLinkPort        |                           |
//! | `mesh_rpc`  | Transport, ProvisioningLinkPort  | ESP-NOW provisioning link |
//! | `nvs`       | StoragePort                      | NVS / in-memory store     |
//! | `rng`       | RandomSource                     | ESP32 hardware RNG        |
//! | `system`    | SystemPort                       | esp_restart, heap, timer  |
//! | `web_rpc`   | Transport                        | HTTP `POST /rpc`          |

pub mod log_sink;
pub mod mesh_rpc;
pub mod nvs;
pub mod rng;
pub mod system;
pub mod web_rpc;
