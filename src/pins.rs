//! GPIO / peripheral pin assignments for the kiln node board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// MAX31856 thermocouple converter (SPI)
// ---------------------------------------------------------------------------

/// Chip select, active LOW.
pub const TC_SPI_CS_GPIO: i32 = 15;
/// Converter SDI (controller MOSI).
pub const TC_SPI_DI_GPIO: i32 = 5;
/// Converter SDO (controller MISO).
pub const TC_SPI_DO_GPIO: i32 = 2;
pub const TC_SPI_CLK_GPIO: i32 = 14;
/// SPI clock; the converter accepts up to 5 MHz.
pub const TC_SPI_FREQ_HZ: u32 = 1_000_000;

// ---------------------------------------------------------------------------
// Oven outputs
// ---------------------------------------------------------------------------

/// Solid-state relay feeding the heating elements.
pub const SSR_GPIO: i32 = 4;
/// Electronics cooling fan.
pub const FAN_GPIO: i32 = 32;
/// "Kiln hot" signal lamp.
pub const LAMP_GPIO: i32 = 33;

// ---------------------------------------------------------------------------
// Door
// ---------------------------------------------------------------------------

/// Door-lock relay, HIGH = unlocked.
pub const DOOR_LOCK_GPIO: i32 = 12;
/// Auxiliary relay next to the lock.
pub const AUX_RELAY_GPIO: i32 = 13;
