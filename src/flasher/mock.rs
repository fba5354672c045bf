//! Scripted [`Loader`] used by the negotiator/engine/plan tests.
//!
//! Every primitive records its arguments and answers from a configurable
//! script, so tests can both inject failures at precise points (e.g. "reject
//! the 151st chunk write") and assert afterwards on exactly what reached the
//! wire.

use crate::loader::{ChipId, ErrorCode, Loader, RateChange, Verification};

#[derive(Debug)]
pub(crate) struct MockLoader {
    pub chip: ChipId,

    // Scripted answers.
    pub handshake_error: Option<ErrorCode>,
    pub change_rate_result: Result<RateChange, ErrorCode>,
    pub set_rate_error: Option<ErrorCode>,
    pub begin_error: Option<ErrorCode>,
    /// Reject the write with this 0-based index (counted across the whole
    /// session) with the given code.
    pub fail_write_at: Option<(usize, ErrorCode)>,
    pub verify_result: Result<Verification, ErrorCode>,

    // Recorded traffic.
    pub handshakes: usize,
    pub rate_requests: Vec<u32>,
    pub local_rates: Vec<u32>,
    pub begins: Vec<(u32, u32, u32)>,
    /// Length of each chunk written, in order.
    pub writes: Vec<usize>,
    /// All chunk payloads, concatenated.
    pub written: Vec<u8>,
    pub verifies: usize,
}

impl MockLoader {
    pub fn new(chip: ChipId) -> Self {
        MockLoader {
            chip,
            handshake_error: None,
            change_rate_result: Ok(RateChange::Accepted),
            set_rate_error: None,
            begin_error: None,
            fail_write_at: None,
            verify_result: Ok(Verification::Match),
            handshakes: 0,
            rate_requests: Vec::new(),
            local_rates: Vec::new(),
            begins: Vec::new(),
            writes: Vec::new(),
            written: Vec::new(),
            verifies: 0,
        }
    }
}

impl Loader for MockLoader {
    fn handshake(&mut self) -> Result<ChipId, ErrorCode> {
        self.handshakes += 1;
        match self.handshake_error {
            Some(code) => Err(code),
            None => Ok(self.chip),
        }
    }

    fn change_rate(&mut self, rate: u32) -> Result<RateChange, ErrorCode> {
        self.rate_requests.push(rate);
        self.change_rate_result
    }

    fn set_rate(&mut self, rate: u32) -> Result<(), ErrorCode> {
        if let Some(code) = self.set_rate_error {
            return Err(code);
        }
        self.local_rates.push(rate);
        Ok(())
    }

    fn begin_flash(
        &mut self,
        address: u32,
        total_size: u32,
        chunk_capacity: u32,
    ) -> Result<(), ErrorCode> {
        if let Some(code) = self.begin_error {
            return Err(code);
        }
        self.begins.push((address, total_size, chunk_capacity));
        Ok(())
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ErrorCode> {
        if let Some((index, code)) = self.fail_write_at {
            if self.writes.len() == index {
                self.writes.push(chunk.len());
                return Err(code);
            }
        }
        self.writes.push(chunk.len());
        self.written.extend_from_slice(chunk);
        Ok(())
    }

    fn verify(&mut self) -> Result<Verification, ErrorCode> {
        self.verifies += 1;
        self.verify_result
    }
}
