//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to               |
//! |-------------|--------------------|---------------------------|
//! | `hardware`  | ActuatorPort       | Relay / SSR GPIOs         |
//! | `log_sink`  | EventSink          | Serial log output         |
//! | `nvs`       | ConfigPort         | NVS / in-memory store     |
//! |             | StoragePort        |                           |
//! | `time`      | -                  | ESP32 high-res timer      |
//! | `wifi`      | -                  | ESP-IDF WiFi STA → signals|
//!
//! The thermocouple port is implemented directly by
//! [`Max31856`](crate::drivers::max31856::Max31856).

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
