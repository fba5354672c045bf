//! Flashcom pushes a complete firmware image set (bootloader, partition
//! table, application) from the host onto a target chip over a serial
//! connection, talking to the stub loader running in the target's ROM. The
//! three binaries are written in a fixed order, each one streamed in bounded
//! chunks with live progress reporting, and the whole sequence stops at the
//! first failure so the caller always knows exactly which stage and which
//! byte offset went wrong.
//!
//! The crate splits into three layers:
//!
//! * [`loader`] — the seam towards the stub-loader protocol. The
//!   [`Loader`](loader::Loader) trait exposes the handful of primitives the
//!   orchestration needs (handshake, rate change, begin-flash, chunk write,
//!   verify); [`SerialLoader`](loader::SerialLoader) is the concrete adapter
//!   over a serial port.
//! * [`flasher`] — the core orchestration: session negotiation
//!   ([`connect`](flasher::connect)), the chunked transfer engine
//!   ([`transfer`](flasher::transfer)) and the three-stage flash plan
//!   ([`FlashPlan`](flasher::FlashPlan)). Everything here is synchronous and
//!   strictly sequential; the serial link is half-duplex and there is never
//!   more than one request in flight.
//! * [`flash_session`] — the interactive session state machine driving the
//!   above from port selection to exit status.
//!
//! Most of the interactive behavior is implemented as a state machine. State
//! machines are implemented in terms of **states** and **transitions**
//! between them with the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * Transitions between states are triggered via typed **events** and
//!   follow defined semantics.
//! * Only explicitly defined transitions should be permitted and as many
//!   errors as possible should be detected at **compile-time**.
//! * Transitioning from one state to another consumes the original state and
//!   renders it unusable. Data can be transferred from one state to the next
//!   by attaching it to the transition event.
//!
//! The implementation of state transitions leverages `rust`'s `From` and
//! `Into` pattern: `events` are converted into new `states` and only
//! transitions for which the `From` trait is implemented are authorized.

mod flash_session;
mod flasher;
mod loader;
mod settings;
mod utils;

pub use flash_session::{factory, FlashSession};
pub use flasher::{
    connect, flash_all, transfer, BinarySource, ConnectError, FlashPlan, FlashTarget, Session,
    SourceError, StageReport, TransferError, TransferOutcome, TransferProgress,
    APPLICATION_ADDRESS, CHUNK_CAPACITY, PARTITION_ADDRESS, VERIFY_MISMATCH,
};
pub use loader::{ChipId, ErrorCode, Loader, RateChange, SerialLoader, Verification};
pub use settings::{Settings, SettingsBuilder};
