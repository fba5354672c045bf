//! Helper functions to deal with serial port devices.

mod keyboard;
mod ports;

pub(crate) use keyboard::poll_escape;
pub(crate) use ports::{open_and_setup_port, select_port, wait_for_port};
