//! The seam towards the stub-loader protocol running on the target chip.
//!
//! The flashing orchestration in [`flasher`](crate::flasher) never touches
//! the wire directly; it consumes the small set of primitives defined by the
//! [`Loader`] trait. The concrete implementation used by the CLI is
//! [`SerialLoader`], which frames these primitives as request/response
//! exchanges over a serial port. Tests drive the orchestration through a
//! scripted mock instead.

mod serial;

pub use serial::SerialLoader;

/// Numeric error code reported by the loader protocol or the local
/// transport. Codes are opaque to the orchestration layer; they are carried
/// through the error types for diagnostics only.
pub type ErrorCode = u32;

/// Identity of the chip detected during the handshake.
///
/// The chip generation decides two things in this crate: whether the stub
/// loader accepts the rate-change command, and where the bootloader image
/// lives in flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipId {
    Esp8266,
    Esp32,
    Esp32S2,
    Esp32S3,
    Esp32C3,
}

impl ChipId {
    /// Whether the stub loader on this chip accepts the change-transmission
    /// rate command. The oldest generation does not.
    pub fn supports_rate_change(self) -> bool {
        !matches!(self, ChipId::Esp8266)
    }

    /// Flash offset of the bootloader image for this chip generation.
    /// Legacy chips keep the first sector reserved; newer generations place
    /// the bootloader at offset zero.
    pub fn bootloader_address(self) -> u32 {
        match self {
            ChipId::Esp8266 | ChipId::Esp32 | ChipId::Esp32S2 => 0x1000,
            ChipId::Esp32S3 | ChipId::Esp32C3 => 0x0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChipId::Esp8266 => "ESP8266",
            ChipId::Esp32 => "ESP32",
            ChipId::Esp32S2 => "ESP32-S2",
            ChipId::Esp32S3 => "ESP32-S3",
            ChipId::Esp32C3 => "ESP32-C3",
        }
    }
}

/// Outcome of a rate-change request to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateChange {
    /// The target accepted the new rate and will listen at it from the next
    /// exchange on.
    Accepted,
    /// The target's loader does not implement the rate-change command. Not
    /// an error; the session continues at the current rate.
    Unsupported,
}

/// Outcome of a post-write verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Flash contents match what was written.
    Match,
    /// The target's loader does not implement the verify command.
    Unsupported,
    /// Verification ran and the flash contents do not match.
    Mismatch,
}

/// The stub-loader primitives consumed by the flashing orchestration.
///
/// Implementations own the wire protocol (framing, checksums, command
/// encoding) and any per-frame retry or timeout policy. The orchestration
/// layer treats every `Err` as terminal for the operation in progress and
/// never retries on its own.
///
/// All calls are strictly sequential request/response exchanges; the link is
/// half-duplex and a second request must never be issued before the previous
/// response arrived.
pub trait Loader {
    /// Perform the loader handshake with protocol defaults and detect the
    /// chip identity.
    fn handshake(&mut self) -> Result<ChipId, ErrorCode>;

    /// Ask the target to switch to `rate` symbols-per-second. The local
    /// transport is not touched; pair with [`set_rate`](Loader::set_rate)
    /// after an `Accepted` response.
    fn change_rate(&mut self, rate: u32) -> Result<RateChange, ErrorCode>;

    /// Reconfigure the local transport to `rate` symbols-per-second.
    fn set_rate(&mut self, rate: u32) -> Result<(), ErrorCode>;

    /// Declare an upcoming image write of `total_size` bytes at `address`,
    /// transferred in units of at most `chunk_capacity` bytes. The target
    /// pre-erases the region before acknowledging.
    fn begin_flash(
        &mut self,
        address: u32,
        total_size: u32,
        chunk_capacity: u32,
    ) -> Result<(), ErrorCode>;

    /// Write one chunk of image data at the current flash position.
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ErrorCode>;

    /// Verify the region written since the last
    /// [`begin_flash`](Loader::begin_flash).
    fn verify(&mut self) -> Result<Verification, ErrorCode>;
}
