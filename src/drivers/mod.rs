//! Device drivers over `embedded-hal` traits, plus the task watchdog.

pub mod max31856;
pub mod relay;
pub mod watchdog;
