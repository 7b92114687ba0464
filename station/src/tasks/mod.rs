//! Loop bodies of the periodic tasks. Each one waits only on its own ticker, the firmware
//! spawns them as executor tasks with the concrete peripherals.

pub mod acquisition;
pub mod input;
pub mod presentation;
pub mod upload;
