//! States for the `flashcom` flashing session state machine.
//!
//! This module is private and restricted to the
//! [`flash_session`](crate::flash_session) scope. The public interface of
//! the state machine is provided by [`flash_session`](crate::flash_session).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an
//! overview of states, events and transitions.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use super::events::*;
use crate::flasher::{connect, flash_all, FlashPlan, StageReport, TransferOutcome};
use crate::loader::SerialLoader;
use crate::settings::Settings;
use crate::utils::{open_and_setup_port, select_port, wait_for_port};

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into
/// it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state can do any work that needs to be done and
    /// when finished, requests a transition to a `new state` by returning
    /// the appropriate `event`. The `state` and the `event` are consumed to
    /// create the `new state` using the corresponding [`From`] trait
    /// implementation (provided such implementation exists).
    fn run(&mut self, settings: &Settings) -> Event;
}

// Init State ==================================================================

/// The initial state of the flashing session state machine.
///
/// From the `InitState`, the state machine can evolve via the following
/// transitions:
///
///  * **[`WaitForPortEvent`] => [`WaitForPortState`]** when a specific
///    device path was provided in the settings,
///  * **[`SelectPortEvent`] => [`SelectPortState`]** when no device path was
///    provided.
#[derive(Debug)]
pub(crate) struct InitState {}
impl Runnable for InitState {
    fn run(&mut self, settings: &Settings) -> Event {
        info!("=> Init");
        match settings.path {
            Some(_) => Event::WaitForPort(WaitForPortEvent {
                settings: settings.clone(),
            }),
            None => Event::SelectPort(SelectPortEvent {
                settings: settings.clone(),
            }),
        }
    }
}

// WaitForPort State ===========================================================

/// Waits for the requested device node to show up on the system, e.g. after
/// the board is plugged in. The user can cancel the wait with `ESC` and pick
/// a different device instead.
///
///  * **[`PortReadyEvent`] => [`FlashingState`]** when the device is ready,
///  * **[`SelectPortEvent`] => [`SelectPortState`]** when the wait is
///    canceled.
#[derive(Debug)]
pub(crate) struct WaitForPortState {}
impl Runnable for WaitForPortState {
    fn run(&mut self, settings: &Settings) -> Event {
        info!("=> WaitForPort");
        let path = settings.path.as_ref().unwrap();
        if wait_for_port(path) {
            Event::SelectPort(SelectPortEvent {
                settings: settings.clone(),
            })
        } else {
            Event::PortReady(PortReadyEvent {
                settings: settings.clone(),
            })
        }
    }
}

// SelectPort State ============================================================

/// Presents the list of detected serial devices for interactive selection.
/// Declining the list loops back into this state with a refreshed list, so
/// the board can be plugged in while `flashcom` is already running.
///
///  * **[`PortReadyEvent`] => [`FlashingState`]** once a port is selected,
///  * **[`SelectPortEvent`] => [`SelectPortState`]** to refresh the list.
#[derive(Debug)]
pub(crate) struct SelectPortState {}
impl Runnable for SelectPortState {
    fn run(&mut self, settings: &Settings) -> Event {
        info!("=> SelectPort");
        match select_port() {
            Some(path) => {
                let mut cloned_settings = settings.clone();
                cloned_settings.path = Some(path);
                Event::PortReady(PortReadyEvent {
                    settings: cloned_settings,
                })
            }
            None => Event::SelectPort(SelectPortEvent {
                settings: settings.clone(),
            }),
        }
    }
}

// Flashing State ==============================================================

/// Runs one complete flashing sequence: open and configure the port,
/// negotiate the session (with the optional rate upgrade), build the
/// three-stage plan and stream the images, reporting each stage's outcome.
///
/// Whatever happens, the sequence runs exactly once; a failure is reported
/// and surfaced through the exit status, never retried here (spelling out
/// which stage and which byte offset failed is worth more than a blind
/// retry, and the caller may have to re-enter download mode first anyway).
///
///  * **[`FlashingDoneEvent`] => [`DoneState`]** always.
#[derive(Debug)]
pub(crate) struct FlashingState {}
impl Runnable for FlashingState {
    fn run(&mut self, settings: &Settings) -> Event {
        info!("=> Flashing");
        let with_errors = !flash_images(settings);
        Event::FlashingDone(FlashingDoneEvent {
            settings: settings.clone(),
            with_errors,
        })
    }
}

/// The full flashing sequence for one session. Returns `true` when the
/// session negotiation and all three stages succeeded.
fn flash_images(settings: &Settings) -> bool {
    let port = match open_and_setup_port(settings) {
        Ok(port) => port,
        Err(ref e) => {
            info!("error: {:?}", e.to_string());
            println!("{}", style("[FC] 💥 Could not open the serial port!").red());
            return false;
        }
    };

    let loader = SerialLoader::new(port, settings.trace_data);
    let mut session = match connect(loader, settings.baud_rate, settings.higher_rate) {
        Ok(session) => session,
        Err(ref e) => {
            println!("{}", style(format!("[FC] 💥 {}", e)).red());
            return false;
        }
    };
    println!(
        "[FC] 🔗 Connected to {} at {} baud",
        style(session.chip().name()).cyan(),
        session.rate()
    );

    let mut plan = match FlashPlan::for_chip(session.chip(), settings) {
        Ok(plan) => plan,
        Err(ref e) => {
            println!("{}", style(format!("[FC] 💥 {}", e)).red());
            return false;
        }
    };

    // One progress bar per stage, fed with the raw byte counts reported by
    // the engine.
    let mut bar: Option<(String, ProgressBar)> = None;
    let reports = flash_all(
        &mut session,
        &mut plan.targets,
        settings.verify,
        |label, progress| {
            if bar.as_ref().map(|(l, _)| l.as_str()) != Some(label) {
                if let Some((_, pb)) = bar.take() {
                    pb.finish();
                }
                let pb = ProgressBar::new(progress.bytes_total);
                pb.set_style(ProgressStyle::default_bar()
                    .template("[FC] ⏩ {msg:>15} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .progress_chars("=>-"));
                pb.set_message(label.to_owned());
                bar = Some((label.to_owned(), pb));
            }
            if let Some((_, pb)) = bar.as_ref() {
                pb.set_position(progress.bytes_written);
            }
        },
    );
    if let Some((_, pb)) = bar.take() {
        pb.finish();
    }

    report_stages(&reports)
}

fn report_stages(reports: &[StageReport]) -> bool {
    let mut all_done = true;
    for report in reports {
        match &report.result {
            Ok(outcome) => {
                let note = match outcome {
                    TransferOutcome::Completed => "",
                    TransferOutcome::Verified => " (verified)",
                    TransferOutcome::VerifyUnsupported => " (verify not supported by target)",
                };
                println!(
                    "{}",
                    style(format!(
                        "[FC] ✅ {}: {} bytes written{}",
                        report.label, report.bytes_written, note
                    ))
                    .green()
                );
            }
            Err(err) => {
                all_done = false;
                println!(
                    "{}",
                    style(format!(
                        "[FC] 💥 {} failed after {} of {} bytes: {}",
                        report.label, report.bytes_written, report.bytes_total, err
                    ))
                    .red()
                );
            }
        }
    }
    all_done
}

// Done State ==================================================================

/// Reached when the flashing session state machine completes its execution
/// and is about to terminate (normally or abnormally).
///
/// This state goes into a 2-phase execution. During the initial phase, it
/// runs like any other state to report the overall outcome. It then triggers
/// the [`ExitEvent`] to cause the state machine to terminate and exit.
///
/// Termination due to errors is indicated with the `with_error` field; this
/// condition sets the return value of the state machine event loop.
#[derive(Debug, Copy, Clone)]
pub(crate) struct DoneState {
    /// When `true`, indicates an abnormal completion caused by an error.
    pub with_error: bool,
    /// When `true` instructs the state machine to exit its event loop.
    pub should_exit: bool,
}
impl Runnable for DoneState {
    fn run(&mut self, settings: &Settings) -> Event {
        info!(
            "=> Done with{}errors",
            if self.with_error { " " } else { " no " }
        );
        if self.with_error {
            println!(
                "{}",
                style("[FC] 💥 Flashing did not complete!").red()
            );
            println!("[FC] 🔁 Put the target back in download mode and run flashcom again.");
        } else {
            println!("{}", style("[FC] 🎉 All images flashed!").green());
        }

        Event::Exit(ExitEvent {
            settings: settings.clone(),
            with_error: self.with_error,
        })
    }
}
