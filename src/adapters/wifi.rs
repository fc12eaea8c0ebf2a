//! WiFi station link.
//!
//! The access machine only needs two facts from the network: "connected
//! (with this address)" and "connection lost".  [`LinkMonitor`] turns the
//! link level into those edges on the [`SignalQueue`] and paces reconnect
//! attempts with exponential backoff.  [`StationLink`] is the ESP-IDF
//! station it watches.  A connect attempt is only started, never awaited:
//! the link coming up shows on a later poll, so the control loop keeps
//! running while the station associates.

use log::{info, warn};

use crate::signals::{AccessSignal, SignalQueue};

const INITIAL_BACKOFF_MS: u64 = 2_000;
const MAX_BACKOFF_MS: u64 = 60_000;

// ───────────────────────────────────────────────────────────────
// Link monitor
// ───────────────────────────────────────────────────────────────

/// What the monitor needs from a station.
pub trait Station {
    /// Associated and holding an address.
    fn is_up(&self) -> bool;
    /// Begin a connect attempt and return without waiting for it.
    fn start_connect(&mut self);
}

pub struct LinkMonitor {
    up: bool,
    next_attempt_ms: u64,
    backoff_ms: u64,
    attempts: u32,
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkMonitor {
    /// Starts down with an attempt due immediately.
    pub fn new() -> Self {
        Self {
            up: false,
            next_attempt_ms: 0,
            backoff_ms: INITIAL_BACKOFF_MS,
            attempts: 0,
        }
    }

    /// Feed the current link level.  Pushes `NetworkConnected` on a rising
    /// edge and `NetworkError` on a falling edge.  Returns `true` when the
    /// caller should try to (re)connect now.
    pub fn observe(&mut self, now: u64, up: bool, queue: &SignalQueue) -> bool {
        match (self.up, up) {
            (false, true) => {
                info!("WiFi: link up after {} attempt(s)", self.attempts);
                self.up = true;
                self.backoff_ms = INITIAL_BACKOFF_MS;
                self.attempts = 0;
                if !queue.push(AccessSignal::NetworkConnected) {
                    warn!("WiFi: signal queue full, connect dropped");
                }
                false
            }
            (true, false) => {
                warn!("WiFi: link lost");
                self.up = false;
                self.next_attempt_ms = now + self.backoff_ms;
                if !queue.push(AccessSignal::NetworkError) {
                    warn!("WiFi: signal queue full, error dropped");
                }
                false
            }
            (true, true) => false,
            (false, false) => {
                if now < self.next_attempt_ms {
                    return false;
                }
                self.attempts += 1;
                self.next_attempt_ms = now + self.backoff_ms;
                self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
                true
            }
        }
    }

    /// One loop pass: observe `station` and start a connect when due.
    pub fn poll(&mut self, now: u64, station: &mut impl Station, queue: &SignalQueue) {
        if self.observe(now, station.is_up(), queue) {
            station.start_connect();
        }
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn backoff_ms(&self) -> u64 {
        self.backoff_ms
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF station
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct StationLink {
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
}

#[cfg(target_os = "espidf")]
impl StationLink {
    /// Configure and start the station.  Connecting is left to the
    /// [`LinkMonitor`].
    pub fn new(
        modem: esp_idf_svc::hal::modem::Modem,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        ssid: &str,
        password: &str,
    ) -> anyhow::Result<Self> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

        let mut wifi = EspWifi::new(modem, sysloop, None)?;
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| anyhow::anyhow!("SSID longer than 32 bytes"))?,
            password: password
                .try_into()
                .map_err(|_| anyhow::anyhow!("password longer than 64 bytes"))?,
            auth_method,
            ..Default::default()
        }))?;
        wifi.start()?;
        info!("WiFi: station started for '{}'", ssid);
        Ok(Self { wifi })
    }

    /// Station IPv4 address, if assigned.
    pub fn ip(&self) -> Option<[u8; 4]> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip.octets())
    }
}

#[cfg(target_os = "espidf")]
impl Station for StationLink {
    fn is_up(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    /// `esp_wifi_connect` only queues the association; failures are
    /// logged and retried by the monitor.
    fn start_connect(&mut self) {
        if self.wifi.is_connected().unwrap_or(false) {
            return;
        }
        if let Err(e) = self.wifi.connect() {
            warn!("WiFi: connect not started ({})", e);
        }
    }
}
