//! Session negotiation with the target's stub loader.
//!
//! [`connect`] is the entry leaf of the flashing core: it performs the
//! handshake, optionally upgrades the transmission rate, and hands back a
//! [`Session`] that every subsequent transfer borrows.

use log::{info, warn};

use super::errors::ConnectError;
use crate::loader::{ChipId, Loader, RateChange};

/// An established link to the target's loader.
///
/// Owns the loader handle and carries the negotiated transmission rate and
/// the chip identity detected during the handshake. Exactly one session is
/// active at a time over one transport; the design does not support
/// concurrent sessions, and all calls through a session are strictly
/// sequential.
///
/// Once the rate has been upgraded it applies to every subsequent operation
/// on the session; it is never silently reverted.
#[derive(Debug)]
pub struct Session<L> {
    loader: L,
    chip: ChipId,
    rate: u32,
}

impl<L: Loader> Session<L> {
    /// The chip identity detected during the handshake.
    pub fn chip(&self) -> ChipId {
        self.chip
    }

    /// The effective transmission rate of the link.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Release the session and hand the loader back.
    pub fn into_loader(self) -> L {
        self.loader
    }

    pub(crate) fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }
}

/// Open a session with the target loader and, if `preferred_rate` is given,
/// try to raise the transmission rate for the rest of the session.
///
/// `initial_rate` is the rate the transport is currently configured at;
/// `preferred_rate` of `None` or zero keeps it. The upgrade is only
/// attempted on chips whose loader implements the rate-change command, and a
/// target reporting the command unsupported is not an error: the session
/// simply continues at `initial_rate`. A rate change that the target
/// accepted but that could not be completed is fatal, because the two ends
/// of the link no longer agree on the rate.
///
/// No retries happen at this layer. A failed negotiation is surfaced to the
/// caller, who decides whether to retry the whole connect.
pub fn connect<L: Loader>(
    mut loader: L,
    initial_rate: u32,
    preferred_rate: Option<u32>,
) -> Result<Session<L>, ConnectError> {
    let chip = loader.handshake().map_err(ConnectError::HandshakeFailed)?;
    info!("Connected to target, detected {}", chip.name());

    let mut rate = initial_rate;
    if let Some(preferred) = preferred_rate.filter(|r| *r != 0) {
        if !chip.supports_rate_change() {
            info!(
                "{} does not support the rate-change command, staying at {} baud",
                chip.name(),
                rate
            );
        } else {
            match loader.change_rate(preferred) {
                Ok(RateChange::Accepted) => {
                    // The target already listens at the new rate; the local
                    // transport must follow or every later frame is garbage.
                    loader
                        .set_rate(preferred)
                        .map_err(ConnectError::RateChangeFailed)?;
                    rate = preferred;
                    info!("Transmission rate changed to {} baud", rate);
                }
                Ok(RateChange::Unsupported) => {
                    warn!(
                        "target reported rate change unsupported, staying at {} baud",
                        rate
                    );
                }
                Err(code) => return Err(ConnectError::RateChangeFailed(code)),
            }
        }
    }

    Ok(Session { loader, chip, rate })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flasher::mock::MockLoader;
    use crate::loader::Verification;

    #[test]
    fn handshake_failure_is_fatal() {
        let mut loader = MockLoader::new(ChipId::Esp32);
        loader.handshake_error = Some(0x21);

        let result = connect(loader, 115_200, Some(230_400));
        assert_eq!(result.unwrap_err(), ConnectError::HandshakeFailed(0x21));
    }

    #[test]
    fn no_preferred_rate_keeps_default() {
        let loader = MockLoader::new(ChipId::Esp32);

        let session = connect(loader, 115_200, None).unwrap();
        assert_eq!(session.rate(), 115_200);
        assert_eq!(session.chip(), ChipId::Esp32);
        assert!(session.into_loader().rate_requests.is_empty());
    }

    #[test]
    fn zero_preferred_rate_keeps_default() {
        let loader = MockLoader::new(ChipId::Esp32);

        let session = connect(loader, 115_200, Some(0)).unwrap();
        assert_eq!(session.rate(), 115_200);
        assert!(session.into_loader().rate_requests.is_empty());
    }

    #[test]
    fn rate_upgrade_applies_to_both_ends() {
        let loader = MockLoader::new(ChipId::Esp32);

        let session = connect(loader, 115_200, Some(230_400)).unwrap();
        assert_eq!(session.rate(), 230_400);

        let loader = session.into_loader();
        assert_eq!(loader.rate_requests, vec![230_400]);
        assert_eq!(loader.local_rates, vec![230_400]);
    }

    #[test]
    fn chip_without_rate_change_is_never_asked() {
        let loader = MockLoader::new(ChipId::Esp8266);

        let session = connect(loader, 115_200, Some(230_400)).unwrap();
        assert_eq!(session.rate(), 115_200);
        assert!(session.into_loader().rate_requests.is_empty());
    }

    #[test]
    fn target_reporting_unsupported_is_not_an_error() {
        let mut loader = MockLoader::new(ChipId::Esp32);
        loader.change_rate_result = Ok(RateChange::Unsupported);

        let session = connect(loader, 115_200, Some(230_400)).unwrap();
        assert_eq!(session.rate(), 115_200);
        // The request was made, but the local transport stayed untouched.
        let loader = session.into_loader();
        assert_eq!(loader.rate_requests, vec![230_400]);
        assert!(loader.local_rates.is_empty());
    }

    #[test]
    fn protocol_error_during_rate_change_is_fatal() {
        let mut loader = MockLoader::new(ChipId::Esp32);
        loader.change_rate_result = Err(0x42);

        let result = connect(loader, 115_200, Some(230_400));
        assert_eq!(result.unwrap_err(), ConnectError::RateChangeFailed(0x42));
    }

    #[test]
    fn local_reconfiguration_failure_is_fatal() {
        let mut loader = MockLoader::new(ChipId::Esp32);
        loader.set_rate_error = Some(0x43);

        let result = connect(loader, 115_200, Some(230_400));
        assert_eq!(result.unwrap_err(), ConnectError::RateChangeFailed(0x43));
    }

    #[test]
    fn verify_mock_defaults_are_success() {
        // Guards the mock against silently drifting defaults, which the
        // engine tests rely on.
        let mut loader = MockLoader::new(ChipId::Esp32C3);
        assert_eq!(loader.verify(), Ok(Verification::Match));
    }
}
