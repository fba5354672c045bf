//! The image transfer engine: moves exactly `size` bytes from a source into
//! target flash, one bounded chunk at a time.
//!
//! One transfer walks a fixed path: begin-flash (the target pre-erases the
//! region), then a strictly sequential chunk loop, then an optional
//! verification. The first failure anywhere on that path ends the transfer;
//! there is no chunk retry and no resumption, a retry means a fresh
//! begin-flash from byte zero.

use std::cmp::min;
use std::io::Read;

use log::{info, trace};

use super::errors::{TransferError, VERIFY_MISMATCH};
use super::negotiator::Session;
use super::plan::FlashTarget;
use crate::loader::{Loader, Verification};

/// Size of the reusable chunk buffer. Also the unit size declared to the
/// target in the begin-flash request, so the target knows the largest data
/// frame it will see.
pub const CHUNK_CAPACITY: usize = 1024;

/// Byte counts of an in-progress transfer, recomputed after each chunk.
///
/// Percentage display, if any, is a pure function of these two integers and
/// is a presentation concern outside this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_written: u64,
    pub bytes_total: u64,
}

/// How a successful transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// All bytes written; no verification was requested.
    Completed,
    /// All bytes written and the target confirmed the flash contents.
    Verified,
    /// All bytes written; verification was requested but the target's
    /// loader does not implement it. Informational, not a failure.
    VerifyUnsupported,
}

/// Stream `target.size` bytes from its source into target flash at
/// `target.address`, in chunks of at most [`CHUNK_CAPACITY`] bytes.
///
/// After every successful chunk the cumulative byte counts are reported
/// through `on_progress`, so a transfer of `N` bytes invokes the callback
/// exactly `ceil(N / CHUNK_CAPACITY)` times and the last invocation reports
/// `bytes_written == bytes_total`.
///
/// With `verify` set, a verification request follows the last chunk; see
/// [`TransferOutcome`] for how an unsupported verify command is reported.
///
/// On any error the transfer is over: a begin-flash or chunk-write rejection
/// leaves the target's flash state undefined for the region, and the only
/// way forward is a fresh transfer from byte zero.
pub fn transfer<L, S, F>(
    session: &mut Session<L>,
    target: &mut FlashTarget<S>,
    verify: bool,
    mut on_progress: Option<F>,
) -> Result<TransferOutcome, TransferError>
where
    L: Loader,
    S: Read,
    F: FnMut(TransferProgress),
{
    debug_assert!(target.size > 0);

    info!(
        "Erasing {} bytes at {:#x} for `{}` (this may take a while)...",
        target.size, target.address, target.label
    );
    session
        .loader_mut()
        .begin_flash(target.address, target.size as u32, CHUNK_CAPACITY as u32)
        .map_err(TransferError::BeginFailed)?;

    info!("Start programming `{}`", target.label);
    let total = target.size;
    let mut written: u64 = 0;
    let mut chunk = [0u8; CHUNK_CAPACITY];

    while written < total {
        let want = min(total - written, CHUNK_CAPACITY as u64) as usize;
        let got = fill_chunk(&mut target.source, &mut chunk[..want]);
        trace!("{} bytes read from image source", got);
        if got < want {
            // The source promised `total` bytes and delivered fewer; the
            // image on flash would be garbage, so give up here.
            return Err(TransferError::SourceTruncated {
                expected: total,
                got: written + got as u64,
            });
        }

        session
            .loader_mut()
            .write_chunk(&chunk[..want])
            .map_err(|code| TransferError::ChunkWriteFailed(code, written))?;

        written += want as u64;
        trace!("{}/{} bytes written to flash", written, total);
        if let Some(callback) = on_progress.as_mut() {
            callback(TransferProgress {
                bytes_written: written,
                bytes_total: total,
            });
        }
    }

    info!("Finished programming `{}`", target.label);

    if !verify {
        return Ok(TransferOutcome::Completed);
    }

    match session.loader_mut().verify() {
        Ok(Verification::Match) => {
            info!("Flash verified for `{}`", target.label);
            Ok(TransferOutcome::Verified)
        }
        Ok(Verification::Unsupported) => {
            info!(
                "target does not support the flash verify command, skipping `{}`",
                target.label
            );
            Ok(TransferOutcome::VerifyUnsupported)
        }
        Ok(Verification::Mismatch) => Err(TransferError::VerifyFailed(VERIFY_MISMATCH)),
        Err(code) => Err(TransferError::VerifyFailed(code)),
    }
}

/// Fill `buf` from the source, tolerating partial reads. Returns the number
/// of bytes actually placed in `buf`; fewer than `buf.len()` means the
/// source ended early (a read error counts as an early end, the transfer
/// cannot proceed either way).
fn fill_chunk<S: Read>(source: &mut S, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    filled
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::flasher::mock::MockLoader;
    use crate::flasher::negotiator::connect;
    use crate::loader::{ChipId, Verification};

    fn session_for(loader: MockLoader) -> Session<MockLoader> {
        connect(loader, 115_200, None).unwrap()
    }

    fn target_of(size: usize, address: u32) -> FlashTarget<Cursor<Vec<u8>>> {
        FlashTarget::new("app", Cursor::new(vec![0xAB; size]), size as u64, address)
    }

    #[test]
    fn success_writes_exactly_declared_size() {
        let mut session = session_for(MockLoader::new(ChipId::Esp32));
        let mut target = target_of(4096, 0x1000);

        let outcome = transfer(&mut session, &mut target, false, none_progress()).unwrap();
        assert_eq!(outcome, TransferOutcome::Completed);

        let loader = session.into_loader();
        assert_eq!(loader.begins, vec![(0x1000, 4096, 1024)]);
        assert_eq!(loader.written.len(), 4096);
        assert_eq!(loader.writes, vec![1024, 1024, 1024, 1024]);
    }

    #[test]
    fn trailing_partial_chunk_is_sized_exactly() {
        let mut session = session_for(MockLoader::new(ChipId::Esp32));
        let mut target = target_of(3072 + 100, 0x8000);

        transfer(&mut session, &mut target, false, none_progress()).unwrap();
        assert_eq!(session.into_loader().writes, vec![1024, 1024, 1024, 100]);
    }

    #[test]
    fn progress_reported_once_per_chunk_and_monotonic() {
        let mut session = session_for(MockLoader::new(ChipId::Esp32));
        let mut target = target_of(2500, 0x10000);

        let mut seen: Vec<TransferProgress> = Vec::new();
        transfer(
            &mut session,
            &mut target,
            false,
            Some(|p: TransferProgress| seen.push(p)),
        )
        .unwrap();

        // ceil(2500 / 1024) = 3 callbacks
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0].bytes_written < w[1].bytes_written));
        assert!(seen.iter().all(|p| p.bytes_total == 2500));
        let last = seen.last().unwrap();
        assert_eq!(last.bytes_written, last.bytes_total);
    }

    #[test]
    fn begin_failure_attempts_no_writes() {
        let mut loader = MockLoader::new(ChipId::Esp32);
        loader.begin_error = Some(0x33);
        let mut session = session_for(loader);
        let mut target = target_of(1024, 0x1000);

        let err = transfer(&mut session, &mut target, false, none_progress()).unwrap_err();
        assert_eq!(err, TransferError::BeginFailed(0x33));
        assert!(session.into_loader().writes.is_empty());
    }

    #[test]
    fn chunk_failure_carries_offset_and_stops_the_loop() {
        let mut loader = MockLoader::new(ChipId::Esp32);
        // Chunks 0..150 succeed, the next write is rejected with code 5.
        loader.fail_write_at = Some((150, 5));
        let mut session = session_for(loader);
        let mut target = target_of(204_800, 0x10000);

        let err = transfer(&mut session, &mut target, false, none_progress()).unwrap_err();
        assert_eq!(err, TransferError::ChunkWriteFailed(5, 153_600));
        assert_eq!(err.offset(), Some(153_600));

        // The failing chunk was the last attempt; nothing after it.
        assert_eq!(session.into_loader().writes.len(), 151);
    }

    #[test]
    fn truncated_source_is_detected_before_the_short_chunk_is_written() {
        let mut session = session_for(MockLoader::new(ChipId::Esp32));
        // Declares 2048 bytes but the source only holds 1500.
        let mut target =
            FlashTarget::new("app", Cursor::new(vec![0u8; 1500]), 2048, 0x10000);

        let err = transfer(&mut session, &mut target, false, none_progress()).unwrap_err();
        assert_eq!(
            err,
            TransferError::SourceTruncated {
                expected: 2048,
                got: 1500
            }
        );
        // The complete first chunk went out, the short second one did not.
        assert_eq!(session.into_loader().writes, vec![1024]);
    }

    #[test]
    fn verify_match_reports_verified() {
        let mut session = session_for(MockLoader::new(ChipId::Esp32));
        let mut target = target_of(1024, 0x1000);

        let outcome = transfer(&mut session, &mut target, true, none_progress()).unwrap();
        assert_eq!(outcome, TransferOutcome::Verified);
        assert_eq!(session.into_loader().verifies, 1);
    }

    #[test]
    fn verify_unsupported_is_still_a_success() {
        let mut loader = MockLoader::new(ChipId::Esp8266);
        loader.verify_result = Ok(Verification::Unsupported);
        let mut session = session_for(loader);
        let mut target = target_of(1024, 0x1000);

        let outcome = transfer(&mut session, &mut target, true, none_progress()).unwrap();
        assert_eq!(outcome, TransferOutcome::VerifyUnsupported);
    }

    #[test]
    fn verify_mismatch_fails_despite_all_bytes_written() {
        let mut loader = MockLoader::new(ChipId::Esp32);
        loader.verify_result = Ok(Verification::Mismatch);
        let mut session = session_for(loader);
        let mut target = target_of(2048, 0x1000);

        let err = transfer(&mut session, &mut target, true, none_progress()).unwrap_err();
        assert_eq!(err, TransferError::VerifyFailed(VERIFY_MISMATCH));
        // Every byte did go out before the verdict.
        assert_eq!(session.into_loader().written.len(), 2048);
    }

    #[test]
    fn no_verify_request_without_configuration() {
        let mut session = session_for(MockLoader::new(ChipId::Esp32));
        let mut target = target_of(1024, 0x1000);

        transfer(&mut session, &mut target, false, none_progress()).unwrap();
        assert_eq!(session.into_loader().verifies, 0);
    }

    fn none_progress() -> Option<fn(TransferProgress)> {
        None
    }
}
