//! Temperature control: the PID law and the SSR time-proportioning loop.

pub mod heater;
pub mod pid;
