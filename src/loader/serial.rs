//! Serial-port implementation of the [`Loader`] seam.
//!
//! Requests are framed as `[opcode][len u16 le][payload]` and every request
//! is answered with `[opcode][status]` (plus one data byte for the
//! handshake). Status `0` is success; any other value is passed through to
//! the orchestration layer as an [`ErrorCode`]. The target is strictly
//! request/response, so each exchange drains exactly one reply before the
//! next command may be issued.

use std::io::prelude::*;

use hexplay::HexViewBuilder;
use log::{debug, log_enabled, trace, Level::Debug};
use serialport::{ClearBuffer, SerialPort};

use super::{ChipId, ErrorCode, Loader, RateChange, Verification};

// Command opcodes understood by the stub loader.
const OP_SYNC: u8 = 0x01;
const OP_CHANGE_RATE: u8 = 0x02;
const OP_FLASH_BEGIN: u8 = 0x03;
const OP_FLASH_DATA: u8 = 0x04;
const OP_FLASH_VERIFY: u8 = 0x05;

// Status bytes reported by the target.
const STATUS_OK: u8 = 0x00;
const STATUS_UNSUPPORTED: u8 = 0x05;
const STATUS_MISMATCH: u8 = 0x06;

// Local (host-side) error codes, kept out of the range used by target
// status bytes.
pub(crate) const ERR_TIMEOUT: ErrorCode = 0x100;
pub(crate) const ERR_TRANSPORT: ErrorCode = 0x101;
pub(crate) const ERR_PROTOCOL: ErrorCode = 0x102;

/// [`Loader`] implementation talking to the target's stub loader over an
/// already opened and configured serial port.
pub struct SerialLoader {
    port: Box<dyn SerialPort>,
    trace_data: bool,
}

impl SerialLoader {
    /// Wrap an open serial port. `trace_data` enables hex dumps of the raw
    /// responses at debug log level.
    pub fn new(port: Box<dyn SerialPort>, trace_data: bool) -> Self {
        SerialLoader { port, trace_data }
    }

    fn send(&mut self, opcode: u8, payload: &[u8]) -> Result<(), ErrorCode> {
        debug_assert!(payload.len() <= u16::MAX as usize);

        let mut frame = Vec::with_capacity(3 + payload.len());
        frame.push(opcode);
        frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        frame.extend_from_slice(payload);

        trace!("{} bytes to send for opcode {:#04x}", frame.len(), opcode);
        self.port.write_all(&frame).map_err(io_error_code)
    }

    /// Wait for `expected` response bytes and read them. The wait is bounded
    /// by a fixed-delay retry loop so a dead target surfaces as a timeout
    /// instead of blocking forever.
    fn receive(&mut self, expected: usize) -> Result<Vec<u8>, ErrorCode> {
        use retry::{delay, retry};

        let waited = retry(
            delay::Fixed::from_millis(100).take(29),
            || -> Result<u32, ErrorCode> {
                let available = self.port.bytes_to_read().map_err(|_| ERR_TRANSPORT)?;
                trace!("Bytes available to read: {}", available);
                if (available as usize) >= expected {
                    Ok(available)
                } else {
                    Err(ERR_TIMEOUT)
                }
            },
        );
        if waited.is_err() {
            return Err(ERR_TIMEOUT);
        }

        let mut response = vec![0; expected];
        self.port
            .read_exact(response.as_mut_slice())
            .map_err(io_error_code)?;

        if self.trace_data && log_enabled!(Debug) {
            let view = HexViewBuilder::new(&response)
                .address_offset(0)
                .row_width(16)
                .finish();
            println!("{}", view);
        }

        Ok(response)
    }

    /// One full exchange: send a command, read back `[opcode][status]` plus
    /// `data` extra bytes, and check the echo. Returns the status byte and
    /// the extra bytes.
    fn exchange(
        &mut self,
        opcode: u8,
        payload: &[u8],
        data: usize,
    ) -> Result<(u8, Vec<u8>), ErrorCode> {
        self.send(opcode, payload)?;
        let response = self.receive(2 + data)?;
        if response[0] != opcode {
            debug!(
                "response opcode {:#04x} does not echo request {:#04x}",
                response[0], opcode
            );
            return Err(ERR_PROTOCOL);
        }
        Ok((response[1], response[2..].to_vec()))
    }
}

impl Loader for SerialLoader {
    fn handshake(&mut self) -> Result<ChipId, ErrorCode> {
        // Drop anything the target pushed while it was resetting so the sync
        // response is the first thing we read.
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|_| ERR_TRANSPORT)?;

        let (status, data) = self.exchange(OP_SYNC, &[], 1)?;
        if status != STATUS_OK {
            return Err(status as ErrorCode);
        }
        let chip = chip_from_code(data[0]).ok_or(ERR_PROTOCOL)?;
        debug!("handshake done, detected {}", chip.name());
        Ok(chip)
    }

    fn change_rate(&mut self, rate: u32) -> Result<RateChange, ErrorCode> {
        let (status, _) = self.exchange(OP_CHANGE_RATE, &rate.to_le_bytes(), 0)?;
        match status {
            STATUS_OK => Ok(RateChange::Accepted),
            STATUS_UNSUPPORTED => Ok(RateChange::Unsupported),
            other => Err(other as ErrorCode),
        }
    }

    fn set_rate(&mut self, rate: u32) -> Result<(), ErrorCode> {
        self.port.set_baud_rate(rate).map_err(|_| ERR_TRANSPORT)
    }

    fn begin_flash(
        &mut self,
        address: u32,
        total_size: u32,
        chunk_capacity: u32,
    ) -> Result<(), ErrorCode> {
        let mut payload = [0u8; 12];
        payload[0..4].copy_from_slice(&address.to_le_bytes());
        payload[4..8].copy_from_slice(&total_size.to_le_bytes());
        payload[8..12].copy_from_slice(&chunk_capacity.to_le_bytes());

        let (status, _) = self.exchange(OP_FLASH_BEGIN, &payload, 0)?;
        match status {
            STATUS_OK => Ok(()),
            other => Err(other as ErrorCode),
        }
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ErrorCode> {
        let (status, _) = self.exchange(OP_FLASH_DATA, chunk, 0)?;
        match status {
            STATUS_OK => Ok(()),
            other => Err(other as ErrorCode),
        }
    }

    fn verify(&mut self) -> Result<Verification, ErrorCode> {
        let (status, _) = self.exchange(OP_FLASH_VERIFY, &[], 0)?;
        match status {
            STATUS_OK => Ok(Verification::Match),
            STATUS_UNSUPPORTED => Ok(Verification::Unsupported),
            STATUS_MISMATCH => Ok(Verification::Mismatch),
            other => Err(other as ErrorCode),
        }
    }
}

fn io_error_code(err: std::io::Error) -> ErrorCode {
    if err.kind() == std::io::ErrorKind::TimedOut {
        ERR_TIMEOUT
    } else {
        ERR_TRANSPORT
    }
}

fn chip_from_code(code: u8) -> Option<ChipId> {
    match code {
        0x00 => Some(ChipId::Esp8266),
        0x01 => Some(ChipId::Esp32),
        0x02 => Some(ChipId::Esp32S2),
        0x03 => Some(ChipId::Esp32S3),
        0x04 => Some(ChipId::Esp32C3),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_codes_round_trip_known_generations() {
        assert_eq!(chip_from_code(0x00), Some(ChipId::Esp8266));
        assert_eq!(chip_from_code(0x03), Some(ChipId::Esp32S3));
        assert_eq!(chip_from_code(0x7f), None);
    }

    #[test]
    fn io_timeout_maps_to_timeout_code() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "late");
        assert_eq!(io_error_code(err), ERR_TIMEOUT);
        let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert_eq!(io_error_code(err), ERR_TRANSPORT);
    }
}
