//! Sensor subsystem.
//!
//! The node has a single process sensor: a type-K thermocouple behind a
//! MAX31856 converter.  [`thermocouple::ThermocoupleReader`] turns its raw
//! conversions into validated temperatures and a debounced fault flag.

pub mod thermocouple;
