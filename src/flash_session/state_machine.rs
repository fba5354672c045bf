//! `flashcom` flashing session state machine.
//!
//! One session run goes from acquiring a serial device, through negotiating
//! with the target's stub loader, to streaming the three images and
//! reporting the outcome:
//!
//! ```text
//!                    START
//!                      |
//!                      v
//!                  .-------.
//!                  | Init  |
//!                  '-------'
//!                      |
//!                      v
//!            no  .----------.  yes
//!          .----( port path? )----.
//!   .----. |     '----------'     |
//!   |    | v                      v
//!   |  .------------.      .-------------.
//!   '--| SelectPort |<-----| WaitForPort |
//!      '------------'  ESC '-------------'
//!            |                    |
//!            |    port ready     |
//!            '-------.   .-------'
//!                    v   v
//!                .----------.
//!                | Flashing |
//!                '----------'
//!                      |
//!                      v
//!                  .-------.
//!                  | Done  |--> EXIT
//!                  '-------'
//! ```
//!
//! `Flashing` always moves to `Done`; there is no retry loop inside the
//! machine, the exit status tells the caller whether a new run is needed.

use super::events::*;
use super::states::*;
use crate::settings::Settings;

// =============================================================================
// Public Interface
// =============================================================================

/// Represents the `flashcom` flashing session state machine. Use the
/// `factory()` function to get an instance then run it by calling its
/// `run()` method.
pub struct FlashSession {
    sm: SessionStates,
}
impl FlashSession {
    /// The flashing session state machine event loop runs until the `Done`
    /// state is reached and its `should_exit` flag is set. At such point,
    /// the event loop terminates and returns an exit code indicating no
    /// errors when equal to **`0`**; otherwise a termination with error.
    pub fn run(&mut self) -> i8 {
        loop {
            self.sm = self.sm.step();
            if let SessionStates::Done(sm) = &self.sm {
                if sm.state.should_exit {
                    return if sm.state.with_error { 1 } else { 0 };
                }
            }
        }
    }
}

/// Factory function for the `flashcom` flashing session state machine. Use
/// it to get an instance of the state machine, which you can run by invoking
/// its `run()` method.
pub fn factory(settings: Settings) -> FlashSession {
    FlashSession {
        // The machine naturally starts in the `Init` state.
        sm: SessionStates::Init(SessionSM::new(settings)),
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// The raw state machine implementing `flashcom`'s flashing session.
///
/// This is a private interface, abstracted for a simpler and more intuitive
/// use in the public `FlashSession` interface.
///
/// Note that using a generic type that holds the current state serves two
/// purposes. It allows for also having shared data by all states that is
/// not really part of state data (the settings). Additionally, it's nicer
/// when debugging to see the state machine and the current state it is
/// holding at any time.
#[derive(Debug)]
struct SessionSM<S: Runnable> {
    settings: Settings,
    state: S,
}
impl<S: Runnable> SessionSM<S> {
    fn run(&mut self) -> Event {
        self.state.run(&self.settings)
    }
}

/// The state machine starts in the `InitState`.
impl SessionSM<InitState> {
    fn new(settings: Settings) -> Self {
        SessionSM {
            settings,
            state: InitState {},
        }
    }
}

/// An enum wrapper around the states of the flashing session state machine.
/// It provides a simpler and more intuitive model for manipulating states
/// and their transitions.
enum SessionStates {
    Init(SessionSM<InitState>),
    WaitForPort(SessionSM<WaitForPortState>),
    SelectPort(SessionSM<SelectPortState>),
    Flashing(SessionSM<FlashingState>),
    Done(SessionSM<DoneState>),
}
impl SessionStates {
    /// The unit of work in the state machine event loop. It checks the
    /// current state and the current event and decides the next transition.
    /// State transitions from events are implemented using the rust
    /// `From`/`Into` pattern. Most of the potential errors of
    /// state/event/transition mismatches can be caught at compile time.
    fn step(&mut self) -> Self {
        match self {
            SessionStates::Init(sm) => {
                let event = sm.run();
                match event {
                    Event::WaitForPort(ev) => SessionStates::WaitForPort(ev.into()),
                    Event::SelectPort(ev) => SessionStates::SelectPort(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::WaitForPort(sm) => {
                let event = sm.run();
                match event {
                    Event::PortReady(ev) => SessionStates::Flashing(ev.into()),
                    Event::SelectPort(ev) => SessionStates::SelectPort(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::SelectPort(sm) => {
                let event = sm.run();
                match event {
                    Event::SelectPort(ev) => SessionStates::SelectPort(ev.into()),
                    Event::PortReady(ev) => SessionStates::Flashing(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::Flashing(sm) => {
                let event = sm.run();
                match event {
                    Event::FlashingDone(ev) => SessionStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::Done(sm) => {
                let event = sm.run();
                match event {
                    Event::Exit(ev) => SessionStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<WaitForPortEvent> for SessionSM<WaitForPortState> {
    fn from(event: WaitForPortEvent) -> SessionSM<WaitForPortState> {
        SessionSM {
            settings: event.settings,
            state: WaitForPortState {},
        }
    }
}

impl From<SelectPortEvent> for SessionSM<SelectPortState> {
    fn from(event: SelectPortEvent) -> SessionSM<SelectPortState> {
        SessionSM {
            settings: event.settings,
            state: SelectPortState {},
        }
    }
}

impl From<PortReadyEvent> for SessionSM<FlashingState> {
    fn from(event: PortReadyEvent) -> SessionSM<FlashingState> {
        SessionSM {
            settings: event.settings,
            state: FlashingState {},
        }
    }
}

impl From<FlashingDoneEvent> for SessionSM<DoneState> {
    fn from(event: FlashingDoneEvent) -> SessionSM<DoneState> {
        SessionSM {
            settings: event.settings,
            state: DoneState {
                with_error: event.with_errors,
                should_exit: false,
            },
        }
    }
}
impl From<ExitEvent> for SessionSM<DoneState> {
    fn from(event: ExitEvent) -> SessionSM<DoneState> {
        SessionSM {
            settings: event.settings,
            state: DoneState {
                with_error: event.with_error,
                should_exit: true,
            },
        }
    }
}
