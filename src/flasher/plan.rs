//! The fixed three-stage flash plan and the short-circuiting pipeline that
//! runs it.
//!
//! Flash addresses are a fixed convention: the bootloader offset depends on
//! the chip generation (see [`ChipId::bootloader_address`]), the partition
//! table and the application live at [`PARTITION_ADDRESS`] and
//! [`APPLICATION_ADDRESS`] on every generation. The flash order is always
//! bootloader → partition table → application, and the pipeline never looks
//! inside the binaries.

use std::fs::File;
use std::io::{self, Read};

use log::{debug, info};
use thiserror::Error;

use super::engine::{transfer, TransferOutcome, TransferProgress};
use super::errors::TransferError;
use super::negotiator::Session;
use crate::loader::{ChipId, Loader};
use crate::settings::Settings;

/// Flash offset of the partition table, all chip generations.
pub const PARTITION_ADDRESS: u32 = 0x8000;
/// Flash offset of the application image, all chip generations.
pub const APPLICATION_ADDRESS: u32 = 0x10000;

const DEFAULT_BOOTLOADER_IMAGE: &str = "bootloader.bin";
const DEFAULT_PARTITION_IMAGE: &str = "partition-table.bin";
const DEFAULT_FIRMWARE_IMAGE: &str = "firmware.bin";

/// A readable byte source with a total length known up front.
///
/// The length is queried exactly once, before a transfer begins; after that
/// the engine trusts it and reads exactly that many bytes.
pub trait BinarySource: Read {
    fn total_len(&mut self) -> io::Result<u64>;
}

impl BinarySource for File {
    fn total_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl<T: AsRef<[u8]>> BinarySource for io::Cursor<T> {
    fn total_len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().as_ref().len() as u64)
    }
}

/// One flashable region: a byte source, its declared size, the destination
/// flash offset and a human-readable label for reporting.
///
/// Immutable once constructed; the transfer engine borrows it only for the
/// duration of one transfer call.
#[derive(Debug)]
pub struct FlashTarget<S> {
    pub source: S,
    pub size: u64,
    pub address: u32,
    pub label: String,
}

impl<S> FlashTarget<S> {
    pub fn new(label: &str, source: S, size: u64, address: u32) -> Self {
        FlashTarget {
            source,
            size,
            address,
            label: label.to_owned(),
        }
    }
}

impl FlashTarget<File> {
    /// Open `path` and probe its size. Every failure names the stage and the
    /// exact file, so a missing partition table is never reported as a
    /// generic abort.
    pub fn from_file(label: &str, path: &str, address: u32) -> Result<Self, SourceError> {
        info!("Opening {} image `{}`", label, path);
        let mut file = File::open(path).map_err(|source| SourceError::Open {
            label: label.to_owned(),
            path: path.to_owned(),
            source,
        })?;
        let size = file.total_len().map_err(|source| SourceError::Probe {
            label: label.to_owned(),
            path: path.to_owned(),
            source,
        })?;
        if size == 0 {
            return Err(SourceError::Empty {
                label: label.to_owned(),
                path: path.to_owned(),
            });
        }
        // The begin-flash request carries the total size in 4 bytes.
        if size > u32::MAX as u64 {
            return Err(SourceError::TooBig {
                label: label.to_owned(),
                path: path.to_owned(),
                size,
            });
        }
        debug!("{} is {} bytes long", label, size);
        Ok(FlashTarget::new(label, file, size, address))
    }
}

/// Failure to obtain one of the image sources. Each condition names the
/// stage and the file it concerns.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("could not open {label} image `{path}`: {source}")]
    Open {
        label: String,
        path: String,
        source: io::Error,
    },
    #[error("could not determine the size of {label} image `{path}`: {source}")]
    Probe {
        label: String,
        path: String,
        source: io::Error,
    },
    #[error("{label} image `{path}` is empty")]
    Empty { label: String, path: String },
    #[error("{label} image `{path}` is too big for the loader protocol ({size} bytes)")]
    TooBig {
        label: String,
        path: String,
        size: u64,
    },
}

/// The ordered list of targets for one complete flashing run.
pub struct FlashPlan {
    pub targets: Vec<FlashTarget<File>>,
}

impl FlashPlan {
    /// Build the bootloader → partition table → application plan for the
    /// detected chip, opening all three image files up front so that a
    /// missing file is reported before anything touches the target's flash.
    pub fn for_chip(chip: ChipId, settings: &Settings) -> Result<Self, SourceError> {
        let bootloader = FlashTarget::from_file(
            "bootloader",
            settings
                .bootloader_image
                .as_deref()
                .unwrap_or(DEFAULT_BOOTLOADER_IMAGE),
            chip.bootloader_address(),
        )?;
        let partition_table = FlashTarget::from_file(
            "partition-table",
            settings
                .partition_image
                .as_deref()
                .unwrap_or(DEFAULT_PARTITION_IMAGE),
            PARTITION_ADDRESS,
        )?;
        let application = FlashTarget::from_file(
            "application",
            settings
                .firmware_image
                .as_deref()
                .unwrap_or(DEFAULT_FIRMWARE_IMAGE),
            APPLICATION_ADDRESS,
        )?;

        Ok(FlashPlan {
            targets: vec![bootloader, partition_table, application],
        })
    }
}

/// Tagged result of one pipeline stage.
#[derive(Debug)]
pub struct StageReport {
    pub label: String,
    /// Bytes confirmed written when the stage ended, successfully or not.
    pub bytes_written: u64,
    pub bytes_total: u64,
    pub result: Result<TransferOutcome, TransferError>,
}

impl StageReport {
    pub fn is_done(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run the transfer engine over an ordered list of targets through one
/// session, stopping at the first fatal stage.
///
/// Produces one [`StageReport`] per *attempted* stage; stages after a
/// failure are not attempted at all (if the bootloader fails, the partition
/// table and the application are never touched). `on_progress` receives the
/// stage label along with the raw byte counts.
pub fn flash_all<L, S, F>(
    session: &mut Session<L>,
    targets: &mut [FlashTarget<S>],
    verify: bool,
    mut on_progress: F,
) -> Vec<StageReport>
where
    L: Loader,
    S: Read,
    F: FnMut(&str, TransferProgress),
{
    let mut reports = Vec::with_capacity(targets.len());

    for target in targets.iter_mut() {
        let label = target.label.clone();
        let total = target.size;
        info!("Loading {}...", label);

        let mut written: u64 = 0;
        let result = transfer(
            session,
            target,
            verify,
            Some(|progress: TransferProgress| {
                written = progress.bytes_written;
                on_progress(&label, progress);
            }),
        );

        let failed = result.is_err();
        reports.push(StageReport {
            label,
            bytes_written: written,
            bytes_total: total,
            result,
        });

        if failed {
            // First fatal error aborts the remaining sequence; the caller
            // decides whether to restart anything.
            break;
        }
    }

    reports
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

    fn three_stage_plan() -> Vec<FlashTarget<Cursor<Vec<u8>>>> {
        vec![
            FlashTarget::new("bootloader", Cursor::new(vec![1; 4096]), 4096, 0x1000),
            FlashTarget::new("partition-table", Cursor::new(vec![2; 3072]), 3072, 0x8000),
            FlashTarget::new(
                "application",
                Cursor::new(vec![3; 204_800]),
                204_800,
                0x10000,
            ),
        ]
    }

    #[test]
    fn bootloader_address_depends_on_chip_generation() {
        assert_eq!(ChipId::Esp32.bootloader_address(), 0x1000);
        assert_eq!(ChipId::Esp8266.bootloader_address(), 0x1000);
        assert_eq!(ChipId::Esp32S3.bootloader_address(), 0x0);
        assert_eq!(ChipId::Esp32C3.bootloader_address(), 0x0);
    }

    #[test]
    fn end_to_end_three_stages_all_done() {
        let mut session = connect(MockLoader::new(ChipId::Esp32), 115_200, None).unwrap();
        let mut targets = three_stage_plan();

        let reports = flash_all(&mut session, &mut targets, false, |_, _| {});

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(StageReport::is_done));
        assert_eq!(reports[0].bytes_written, 4096);
        assert_eq!(reports[1].bytes_written, 3072);
        assert_eq!(reports[2].bytes_written, 204_800);

        let loader = session.into_loader();
        assert_eq!(loader.written.len(), 211_968);
        assert_eq!(
            loader.begins,
            vec![
                (0x1000, 4096, 1024),
                (0x8000, 3072, 1024),
                (0x10000, 204_800, 1024)
            ]
        );
    }

    #[test]
    fn application_chunk_failure_keeps_earlier_stages_done() {
        let mut loader = MockLoader::new(ChipId::Esp32);
        // Bootloader takes 4 chunks, partition table 3. The application's
        // writes start at index 7; its 151st chunk is index 7 + 150.
        loader.fail_write_at = Some((7 + 150, 5));
        let mut session = connect(loader, 115_200, None).unwrap();
        let mut targets = three_stage_plan();

        let reports = flash_all(&mut session, &mut targets, false, |_, _| {});

        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_done());
        assert!(reports[1].is_done());
        assert_eq!(
            *reports[2].result.as_ref().unwrap_err(),
            TransferError::ChunkWriteFailed(5, 153_600)
        );
        assert_eq!(reports[2].bytes_written, 153_600);
    }

    #[test]
    fn bootloader_failure_stops_the_whole_sequence() {
        let mut loader = MockLoader::new(ChipId::Esp32);
        loader.begin_error = Some(0x34);
        let mut session = connect(loader, 115_200, None).unwrap();
        let mut targets = three_stage_plan();

        let reports = flash_all(&mut session, &mut targets, false, |_, _| {});

        // Only the failed first stage is reported; nothing else was tried.
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].label, "bootloader");
        assert_eq!(
            *reports[0].result.as_ref().unwrap_err(),
            TransferError::BeginFailed(0x34)
        );
        assert!(session.into_loader().writes.is_empty());
    }

    #[test]
    fn progress_callback_sees_stage_labels_in_flash_order() {
        let mut session = connect(MockLoader::new(ChipId::Esp32), 115_200, None).unwrap();
        let mut targets = three_stage_plan();

        let mut labels: Vec<String> = Vec::new();
        flash_all(&mut session, &mut targets, false, |label, _| {
            if labels.last().map(String::as_str) != Some(label) {
                labels.push(label.to_owned());
            }
        });

        assert_eq!(labels, vec!["bootloader", "partition-table", "application"]);
    }

    #[test]
    fn missing_file_names_the_stage_and_path() {
        let err = FlashTarget::from_file(
            "partition-table",
            "definitely/not/here.bin",
            PARTITION_ADDRESS,
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("partition-table"));
        assert!(message.contains("definitely/not/here.bin"));
    }
}
