//! The flashing core: session negotiation and the chunked image transfer
//! engine, plus the fixed three-stage flash plan (bootloader → partition
//! table → application).
//!
//! **Example** - flashing a prepared plan through an established session:
//! ```ignore
//! let session = flasher::connect(loader, 115_200, Some(230_400))?;
//! let mut plan = flasher::FlashPlan::for_chip(session.chip(), &settings)?;
//! let reports = flasher::flash_all(&mut session, &mut plan.targets, false, |_, _| {});
//! ```
//!
//! Everything in this module is synchronous and strictly sequential: one
//! request in flight at a time, no retries, no resumption. A failed transfer
//! is restarted from byte zero by the caller, if at all.

mod engine;
mod errors;
mod negotiator;
mod plan;

#[cfg(test)]
pub(crate) mod mock;

pub use engine::{transfer, TransferOutcome, TransferProgress, CHUNK_CAPACITY};
pub use errors::{ConnectError, TransferError, VERIFY_MISMATCH};
pub use negotiator::{connect, Session};
pub use plan::{
    flash_all, BinarySource, FlashPlan, FlashTarget, SourceError, StageReport,
    APPLICATION_ADDRESS, PARTITION_ADDRESS,
};
