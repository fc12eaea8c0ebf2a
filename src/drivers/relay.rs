//! Relay and SSR outputs over an `embedded-hal` `OutputPin`.
//!
//! The actuator port is infallible, so a pin error is logged and the
//! cached level is left unchanged; the next level set retries.

use embedded_hal::digital::OutputPin;
use log::warn;

pub struct Relay<P> {
    pin: P,
    name: &'static str,
    active_low: bool,
    on: bool,
}

impl<P: OutputPin> Relay<P> {
    /// Wrap `pin` and drive it to the released level.
    pub fn new(pin: P, name: &'static str, active_low: bool) -> Self {
        let mut relay = Self {
            pin,
            name,
            active_low,
            on: true,
        };
        relay.set(false);
        relay
    }

    pub fn set(&mut self, on: bool) {
        let high = on != self.active_low;
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.on = on,
            Err(e) => warn!(
                "Relay {}: pin write failed ({:?})",
                self.name,
                embedded_hal::digital::Error::kind(&e)
            ),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
