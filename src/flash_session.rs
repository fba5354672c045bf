//! `flashcom` flashing session state machine.
//!
//! **Example** - Importing the public interfaces through flash_session:
//! ```ignore
//! use crate::{
//!     flash_session::{self as fsm},
//!     settings::Settings,
//! };
//! ```
//!
//! **Example** - Executing the state machine event loop:
//! ```ignore
//! let settings = SettingsBuilder::new()
//!     .path("COM4")
//!     .higher_rate(230_400)
//!     .finalize();
//! let mut fsm = fsm::factory(settings);
//! fsm.run();
//! ```

mod events;
mod state_machine;
mod states;

pub use state_machine::{factory, FlashSession};
