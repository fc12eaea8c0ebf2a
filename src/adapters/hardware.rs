//! Hardware adapter bridging the relay outputs to [`ActuatorPort`].
//!
//! Owns one [`Relay`] per output.  The thermocouple converter is a
//! separate [`ThermocouplePort`](crate::app::ports::ThermocouplePort)
//! implementation so the service can borrow both at once.

use embedded_hal::digital::OutputPin;
use log::info;

use crate::app::ports::ActuatorPort;
use crate::drivers::relay::Relay;

/// The five output pins, in board order.
pub struct OutputPins<P> {
    pub ssr: P,
    pub fan: P,
    pub lamp: P,
    pub door_lock: P,
    pub aux_relay: P,
}

/// Concrete adapter that puts every output behind [`ActuatorPort`].
pub struct HardwareAdapter<P: OutputPin> {
    ssr: Relay<P>,
    fan: Relay<P>,
    lamp: Relay<P>,
    door_lock: Relay<P>,
    aux_relay: Relay<P>,
}

impl<P: OutputPin> HardwareAdapter<P> {
    /// Take ownership of the pins.  Every output starts released.
    pub fn new(pins: OutputPins<P>) -> Self {
        let adapter = Self {
            ssr: Relay::new(pins.ssr, "ssr", false),
            fan: Relay::new(pins.fan, "fan", false),
            lamp: Relay::new(pins.lamp, "lamp", false),
            door_lock: Relay::new(pins.door_lock, "door_lock", false),
            aux_relay: Relay::new(pins.aux_relay, "aux_relay", false),
        };
        info!("HardwareAdapter: outputs released");
        adapter
    }

    pub fn ssr_on(&self) -> bool {
        self.ssr.is_on()
    }

    pub fn door_open(&self) -> bool {
        self.door_lock.is_on()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<P: OutputPin> ActuatorPort for HardwareAdapter<P> {
    fn set_door_lock(&mut self, open: bool) {
        self.door_lock.set(open);
    }

    fn set_aux_relay(&mut self, on: bool) {
        self.aux_relay.set(on);
    }

    fn set_ssr(&mut self, on: bool) {
        self.ssr.set(on);
    }

    fn set_fan(&mut self, on: bool) {
        self.fan.set(on);
    }

    fn set_lamp(&mut self, on: bool) {
        self.lamp.set(on);
    }

    fn all_off(&mut self) {
        self.ssr.set(false);
        self.door_lock.set(false);
        self.aux_relay.set(false);
        self.fan.set(false);
        self.lamp.set(false);
    }
}
