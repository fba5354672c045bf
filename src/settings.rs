//! Settings for the serial link, the transmission-rate upgrade and the image
//! set to be flashed.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

// =============================================================================
// Public Interface
// =============================================================================

/// Groups all settings used by `flashcom` for one flashing session and acts
/// as a [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
///
/// Anything that the flashing layers need to know is carried here explicitly;
/// there is no process-wide mutable configuration anywhere in the crate.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The port name, usually the device path.
    pub path: Option<String>,
    /// The baud rate in symbols-per-second used for the initial handshake.
    pub baud_rate: u32,
    /// Number of bits used to represent a character sent on the line.
    pub data_bits: DataBits,
    /// The type of signalling to use for controlling data transfer.
    pub flow_control: FlowControl,
    /// The type of parity to use for error checking.
    pub parity: Parity,
    /// Number of bits to use to signal the end of a character.
    pub stop_bits: StopBits,

    /// Transmission rate to upgrade to after the handshake. `None` (or zero)
    /// keeps the initial `baud_rate` for the whole session. Chips that do not
    /// support the rate-change command stay at `baud_rate` as well.
    pub higher_rate: Option<u32>,

    /// Request an integrity verification of the flashed region after all
    /// chunks of an image have been written. On targets that do not support
    /// the verify command this is recorded and skipped.
    pub verify: bool,

    /// Dump the raw loader responses as hex tables at debug log level.
    pub trace_data: bool,

    /// Path to the bootloader image. Defaults to `bootloader.bin` in the
    /// current working directory.
    pub bootloader_image: Option<String>,
    /// Path to the partition-table image. Defaults to `partition-table.bin`.
    pub partition_image: Option<String>,
    /// Path to the application image. Defaults to `firmware.bin`.
    pub firmware_image: Option<String>,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```ignore
/// let settings = SettingsBuilder::new()
///     .path("/dev/ttyUSB0")
///     .higher_rate(230_400)
///     .finalize();
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values and no path for the
    /// port.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                path: None,
                baud_rate: 115_200,
                data_bits: DataBits::Eight,
                flow_control: FlowControl::None,
                parity: Parity::None,
                stop_bits: StopBits::One,
                higher_rate: None,
                verify: false,
                trace_data: false,
                bootloader_image: None,
                partition_image: None,
                firmware_image: None,
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the serial port
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = Some(path.into().as_ref().to_owned());
        self
    }

    /// Set the baud rate in symbols-per-second used for the handshake
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the number of bits used to represent a character sent on the line
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.settings.data_bits = data_bits;
        self
    }

    /// Set the type of signalling to use for controlling data transfer
    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    /// Set the type of parity to use for error checking
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// Set the number of bits to use to signal the end of a character
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    /// Set the transmission rate to upgrade to after the handshake. A value
    /// of zero keeps the handshake rate.
    pub fn higher_rate(mut self, higher_rate: u32) -> Self {
        self.settings.higher_rate = if higher_rate == 0 {
            None
        } else {
            Some(higher_rate)
        };
        self
    }

    /// Request post-write integrity verification of every flashed image
    pub fn verify(mut self, verify: bool) -> Self {
        self.settings.verify = verify;
        self
    }

    /// Dump loader traffic as hex tables at debug log level
    pub fn trace_data(mut self, trace_data: bool) -> Self {
        self.settings.trace_data = trace_data;
        self
    }

    /// Set the path to the bootloader image
    pub fn bootloader_image<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.bootloader_image = Some(path.into().as_ref().to_owned());
        self
    }

    /// Set the path to the partition-table image
    pub fn partition_image<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.partition_image = Some(path.into().as_ref().to_owned());
        self
    }

    /// Set the path to the application image
    pub fn firmware_image<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.firmware_image = Some(path.into().as_ref().to_owned());
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        SettingsBuilder::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            path: None,
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            higher_rate: None,
            verify: false,
            trace_data: false,
            bootloader_image: None,
            partition_image: None,
            firmware_image: None,
            _private_use_builder: (),
        }
    )
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
    assert_eq!(settings.path.unwrap(), "/dev/ttyUSB0");
}

#[test]
fn baud_rate() {
    let baud_rate = 96_000;
    let settings = SettingsBuilder::new().baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn higher_rate() {
    let settings = SettingsBuilder::new().higher_rate(230_400).finalize();
    assert_eq!(settings.higher_rate, Some(230_400));
}

#[test]
fn higher_rate_zero_means_keep_default() {
    let settings = SettingsBuilder::new().higher_rate(0).finalize();
    assert_eq!(settings.higher_rate, None);
}

#[test]
fn data_bits() {
    let data_bits = DataBits::Seven;
    let settings = SettingsBuilder::new().data_bits(data_bits).finalize();
    assert_eq!(settings.data_bits, data_bits);
}

#[test]
fn flow_control() {
    let flow_control = FlowControl::Hardware;
    let settings = SettingsBuilder::new().flow_control(flow_control).finalize();
    assert_eq!(settings.flow_control, flow_control);
}

#[test]
fn stop_bits() {
    let stop_bits = StopBits::Two;
    let settings = SettingsBuilder::new().stop_bits(stop_bits).finalize();
    assert_eq!(settings.stop_bits, stop_bits);
}

#[test]
fn parity() {
    let parity = Parity::Even;
    let settings = SettingsBuilder::new().parity(parity).finalize();
    assert_eq!(settings.parity, parity);
}

#[test]
fn verify() {
    let settings = SettingsBuilder::new().verify(true).finalize();
    assert!(settings.verify);
}

#[test]
fn image_paths() {
    let settings = SettingsBuilder::new()
        .bootloader_image("build/bootloader.bin")
        .partition_image("build/partition-table.bin")
        .firmware_image("build/app.bin")
        .finalize();
    assert_eq!(settings.bootloader_image.unwrap(), "build/bootloader.bin");
    assert_eq!(
        settings.partition_image.unwrap(),
        "build/partition-table.bin"
    );
    assert_eq!(settings.firmware_image.unwrap(), "build/app.bin");
}
