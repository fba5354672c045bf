//! Serial port device discovery, selection and setup.

use std::{thread, time::Duration};

use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use serialport::{available_ports, SerialPort, SerialPortType};

use crate::{utils::poll_escape, Settings};

//==============================================================================
// Public Interface
//==============================================================================

/// Present the list of connected serial devices for interactive selection.
///
/// When no devices are connected yet, a spinner keeps refreshing the list
/// until at least one shows up (probably waiting for the board to be plugged
/// in). Returns `None` when the user declines the list, which callers treat
/// as a request for a refreshed selection round.
pub(crate) fn select_port() -> Option<String> {
    let pb = waiting_spinner();
    let mut waited: usize = 0;

    // Avoid cursor flicker during the waiting
    Term::stdout().hide_cursor().ok();
    let found_ports = loop {
        let found_ports = enumerate_usb_serial_ports();
        if !found_ports.is_empty() {
            pb.finish_with_message("Select a port to be used:");
            break found_ports;
        }
        pb.set_message(format!(
            "[{:03}s] ⌛ Waiting for a USB serial controller to be connected...",
            style(waited).dim()
        ));
        thread::sleep(Duration::from_secs(1));
        waited += 1;
    };
    Term::stdout().show_cursor().ok();

    let selection = select_port_interactive(&found_ports);
    match &selection {
        Some(path) => {
            pb.finish_with_message(format!("👍 Serial port {} is ready", style(path).green()));
        }
        None => {
            pb.finish_with_message("❌ Selection canceled -> refreshing...");
        }
    }
    selection
}

/// Wait for the device node at `path` to show up on the system, checking
/// every half second. While waiting, the user can cancel with the `ESC` key.
///
/// Returns `true` when the wait was canceled by the user.
pub(crate) fn wait_for_port(path: &str) -> bool {
    let pb = waiting_spinner();
    let mut polls: usize = 0;

    loop {
        let found_ports = enumerate_usb_serial_ports();
        if found_ports.iter().any(|p| p.starts_with(path)) {
            pb.finish_with_message(format!("👍 Serial port {} is ready", style(path).green()));
            return false;
        }

        pb.set_message(format!(
            "[{:03}s] ⏳ Waiting for {} to be ready (ESC to cancel)...",
            style(polls / 2).dim(),
            style(path).cyan()
        ));

        // poll_escape blocks for up to half a second, which doubles as the
        // re-enumeration period.
        if let Ok(true) = poll_escape() {
            pb.finish_with_message(format!(
                "❌ Waiting on port {} canceled",
                style(path).cyan()
            ));
            return true;
        }
        polls += 1;
    }
}

/// Open the port named in the settings and configure it with the settings'
/// line parameters. Opening is retried a few times with a fixed delay, as
/// some USB serial controllers need a moment after enumeration before the
/// device node accepts being opened.
pub(crate) fn open_and_setup_port(
    settings: &Settings,
) -> Result<Box<dyn SerialPort>, serialport::Error> {
    use retry::{delay, retry_with_index};

    let path = settings.path.clone().unwrap();
    let result = retry_with_index(
        delay::Fixed::from_millis(1000).take(4),
        |index| -> Result<Box<dyn SerialPort>, serialport::Error> {
            debug!("Trying to open {} (attempt {})", path, index);
            serialport::new(&path, settings.baud_rate)
                .data_bits(settings.data_bits)
                .stop_bits(settings.stop_bits)
                .parity(settings.parity)
                .flow_control(settings.flow_control)
                .open()
        },
    );

    let mut port = result.map_err(|err| match err {
        retry::Error::Operation {
            error,
            total_delay,
            tries,
        } => {
            info!(
                "Failed to open the port after {:?} and {} tries: {}",
                total_delay, tries, error
            );
            error
        }
        retry::Error::Internal(_) => serialport::Error::new(
            serialport::ErrorKind::Unknown,
            "internal error while retrying to open the port",
        ),
    })?;

    // Configure the port again after open; not all platforms apply every
    // builder value.
    port.set_baud_rate(settings.baud_rate)?;
    port.set_data_bits(settings.data_bits)?;
    port.set_stop_bits(settings.stop_bits)?;
    port.set_parity(settings.parity)?;
    port.set_flow_control(settings.flow_control)?;

    info!(
        "Opened {} at {} baud",
        port.name().unwrap_or_else(|| path.clone()),
        settings.baud_rate
    );

    Ok(port)
}

//==============================================================================
// Private stuff
//==============================================================================

fn waiting_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(120);
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
            .template("[FC] {spinner:.blue} {msg}"),
    );
    pb
}

/// Enumerates serial devices of type USB on the system
fn enumerate_usb_serial_ports() -> Vec<String> {
    let mut usb_ports = vec![];
    match available_ports() {
        Ok(ports) => {
            for p in ports {
                match p.port_type {
                    // USB ports give us more info about the connected serial
                    // controller
                    SerialPortType::UsbPort(info) => {
                        let extended_name = format!(
                            "{}: ({} / {})",
                            p.port_name,
                            info.manufacturer.as_ref().map_or("", String::as_str),
                            info.product.as_ref().map_or("", String::as_str)
                        );
                        usb_ports.push(extended_name);
                    }
                    // We're also interested in the other devices, such as
                    // virtual ports for testing
                    _ => {
                        usb_ports.push(p.port_name);
                    }
                }
            }
        }
        Err(ref e) => {
            info!("error: {}", e.to_string());
        }
    }
    usb_ports
}

fn select_port_interactive(ports: &[String]) -> Option<String> {
    let term = Term::buffered_stderr();
    let theme = ColorfulTheme::default();

    let mut select = Select::with_theme(&theme);
    for item in ports {
        select.item(item);
    }

    let selection = select.default(0).interact_on_opt(&term).ok()?;
    selection.map(|x| String::from(ports.get(x).unwrap().split(':').next().unwrap()))
}
