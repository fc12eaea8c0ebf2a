//! Kiln node firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Max31856          HardwareAdapter   LogEventSink   NvsAdapter │
//! │  (Thermocouple)    (Actuators)       (EventSink)    (Config +  │
//! │                                                      Storage)  │
//! │  StationLink ─▶ LinkMonitor ─▶ SIGNALS ◀─ card / approval cbs  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  Access FSM · Supervisor · PID · Schedule engine       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyInputPin, AnyOutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::spi::{SpiDeviceDriver, SpiDriver, SpiDriverConfig, config::Config};
use esp_idf_svc::hal::units::Hertz;

use kilnnode::adapters::hardware::{HardwareAdapter, OutputPins};
use kilnnode::adapters::log_sink::LogEventSink;
use kilnnode::adapters::nvs::NvsAdapter;
use kilnnode::adapters::time::Esp32Clock;
use kilnnode::adapters::wifi::{LinkMonitor, StationLink};
use kilnnode::app::ports::{ActuatorPort, ConfigPort};
use kilnnode::app::service::NodeService;
use kilnnode::config::SystemConfig;
use kilnnode::drivers::max31856::Max31856;
use kilnnode::drivers::watchdog::Watchdog;
use kilnnode::pins;
use kilnnode::signals::SIGNALS;

const WATCHDOG_TIMEOUT_MS: u32 = 10_000;

fn output(gpio: i32) -> Result<PinDriver<'static, AnyOutputPin, esp_idf_svc::hal::gpio::Output>> {
    // SAFETY: each GPIO number in the pin table is claimed exactly once.
    let pin = unsafe { AnyOutputPin::new(gpio) };
    Ok(PinDriver::output(pin)?)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Kiln node v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let watchdog = Watchdog::new(WATCHDOG_TIMEOUT_MS);
    let clock = Esp32Clock::new();

    // ── 2. Outputs first, so nothing floats while the rest comes up ──
    let mut hw = HardwareAdapter::new(OutputPins {
        ssr: output(pins::SSR_GPIO)?,
        fan: output(pins::FAN_GPIO)?,
        lamp: output(pins::LAMP_GPIO)?,
        door_lock: output(pins::DOOR_LOCK_GPIO)?,
        aux_relay: output(pins::AUX_RELAY_GPIO)?,
    });

    // ── 3. Thermocouple converter ─────────────────────────────
    // SAFETY: SPI pins are claimed exactly once.
    let (sclk, sdo, sdi, cs) = unsafe {
        (
            AnyOutputPin::new(pins::TC_SPI_CLK_GPIO),
            AnyOutputPin::new(pins::TC_SPI_DI_GPIO),
            AnyInputPin::new(pins::TC_SPI_DO_GPIO),
            AnyOutputPin::new(pins::TC_SPI_CS_GPIO),
        )
    };
    let bus = SpiDriver::new(peripherals.spi2, sclk, sdo, Some(sdi), &SpiDriverConfig::new())?;
    let spi = SpiDeviceDriver::new(
        bus,
        Some(cs),
        &Config::new()
            .baudrate(Hertz(pins::TC_SPI_FREQ_HZ))
            .data_mode(embedded_hal::spi::MODE_1),
    )?;
    let mut probe = Max31856::new(spi);
    if let Err(e) = probe.init() {
        // The reader debounces the failures; the oven will refuse to start.
        error!("MAX31856 init failed: {:?}", e);
    }

    // ── 4. Config and schedules from NVS ──────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {e}"))?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    let loop_interval = std::time::Duration::from_millis(u64::from(config.loop_interval_ms));

    let mut sink = LogEventSink::new();
    let mut node = NodeService::new(config);
    node.load_schedules(&nvs);
    node.start(clock.uptime_ms(), &mut sink);

    // ── 5. Network ────────────────────────────────────────────
    // Card reader and approval callbacks push into SIGNALS the same way.
    let mut station = StationLink::new(
        peripherals.modem,
        sysloop,
        option_env!("KILN_WIFI_SSID").unwrap_or(""),
        option_env!("KILN_WIFI_PASS").unwrap_or(""),
    )?;
    let mut link = LinkMonitor::new();

    info!("System ready. Entering main loop.");

    // ── 6. Main loop ──────────────────────────────────────────
    loop {
        let now = clock.uptime_ms();

        link.poll(now, &mut station, &SIGNALS);
        let ip = station.ip().unwrap_or_default();
        SIGNALS.drain(|signal| {
            if let Err(e) = node.handle_command(signal.into_command(ip), &mut hw, &mut sink) {
                warn!("Signal {:?} not applied: {}", signal, e);
            }
        });

        node.tick(now, &mut probe, &mut hw, &mut sink);
        node.auto_save_if_needed(&nvs);

        if node.take_reboot_request() {
            hw.all_off();
            warn!("Restarting");
            esp_idf_svc::hal::reset::restart();
        }

        watchdog.feed();
        std::thread::sleep(loop_interval);
    }
}
