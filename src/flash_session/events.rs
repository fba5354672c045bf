//! Events for the `flashcom` flashing session state machine.
//!
//! This module is private and restricted to the
//! [`flash_session`](crate::flash_session) scope. The public interface of
//! the state machine is provided by [`flash_session`](crate::flash_session).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an
//! overview of states, events and transitions.

use crate::settings::Settings;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// WaitForPortEvent ============================================================

/// Event fired to trigger a transition to the `WaitForPort` state.
///
/// Fired from the `Init` state when a specific device path was provided in
/// the settings; flashing holds on until the device node shows up.
#[derive(Debug)]
pub(crate) struct WaitForPortEvent {
    pub settings: Settings,
}

// SelectPortEvent =============================================================

/// Event fired to trigger the transition to the `SelectPort` state.
///
/// This event can happen under one of the following circumstances:
///
///  1. While at the `Init` state and no device path was provided.
///  2. While at the `WaitForPort` state and the user cancels the wait with
///     the `ESC` key, to pick a different device instead.
///  3. While at the `SelectPort` state and the user declines the current
///     list, to refresh it with the currently connected devices.
#[derive(Debug)]
pub(crate) struct SelectPortEvent {
    pub settings: Settings,
}

// PortReadyEvent ==============================================================

/// Event fired when a serial port with a valid device path is available,
/// either because the port we were waiting on came up or because one was
/// selected from the detected ports. Triggers the transition to the
/// `Flashing` state.
#[derive(Debug)]
pub(crate) struct PortReadyEvent {
    pub settings: Settings,
}

// FlashingDoneEvent ===========================================================

/// Event fired when the flashing sequence has run to its end, successfully
/// or not. Triggers a transition to the `Done` state.
///
/// There is deliberately no transition back into `Flashing`: a failed
/// sequence is not retried from inside the state machine, the whole program
/// run is the retry unit.
#[derive(Debug)]
pub(crate) struct FlashingDoneEvent {
    pub settings: Settings,
    /// When `true`, indicates that negotiation or one of the flash stages
    /// failed.
    pub with_errors: bool,
}

// ExitEvent ===================================================================

/// The last event that can be triggered in the flashing session state
/// machine; it makes the event loop terminate with an `exit status`, handing
/// control back to the caller that started the event loop.
///
/// **Example**
/// ```ignore
/// use crate::settings::*;
/// use crate::flash_session as fsm;
///
/// let settings = SettingsBuilder::new().finalize();
/// let mut sm = fsm::factory(settings);
/// let status = sm.run(); // status code returned after the `Exit` event
/// println!("status: {}", status);
/// ```
#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub settings: Settings,
    pub with_error: bool,
}

// Events enum =================================================================

/// Events that can be triggered within the flashing session state machine.
///
/// Each possible value holds an `event`, which in turn may hold additional
/// data for the state transition. Such data is passed by the origin state
/// for potential use by the target state.
#[derive(Debug)]
pub(crate) enum Event {
    WaitForPort(WaitForPortEvent),
    SelectPort(SelectPortEvent),
    PortReady(PortReadyEvent),
    FlashingDone(FlashingDoneEvent),
    Exit(ExitEvent),
}
