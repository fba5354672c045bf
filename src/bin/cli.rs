//! Flashcom command line interface.

use std::process;

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_t, App, AppSettings::*, Arg,
};
use console::style;
use log::{debug, trace, LevelFilter};
use serialport::{DataBits, FlowControl, Parity, StopBits};
use simplelog::*;

use flashcom as fc;

fn main() {
    println!("[FC] flashcom v{}", crate_version!());

    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(0);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            Flashcom pushes a complete firmware image set to a target chip \
            over the serial port, talking to the stub loader running in the \
            target's ROM. Three binaries are flashed in a fixed order:\n\
               \t* the bootloader (address depends on the chip generation) \n\
               \t* the partition table (at 0x8000) \n\
               \t* the application (at 0x10000) \n\
            \n\
            After the handshake, flashcom can optionally raise the \
            transmission rate for the rest of the session, and optionally ask \
            the target to verify each flashed image. The sequence stops at \
            the first failure and reports which stage and which byte offset \
            went wrong; flashing is never retried silently.\n\
            \n\
            Flashcom can be started before or after the target is plugged \
            in; when no device is given it offers the connected ports for \
            selection.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("DEVICE_TTY")
                .help("the USB tty device to use")
                .long_help(
                    "the USB tty device to use; may change when the board \
                     is unplugged and re-plugged and may differ between \
                     systems. You can opt for selecting a device while \
                     `flashcom` is running.",
                )
                .short("-t")
                .long("--tty")
                .takes_value(true)
                .require_equals(true),
        )
        .arg(
            Arg::with_name("BAUD_RATE")
                .help("serial port baud rate for the handshake")
                .short("-b")
                .long("--baud-rate")
                .takes_value(true)
                .default_value("115200")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("HIGHER_RATE")
                .help("transmission rate to upgrade to after the handshake")
                .long_help(
                    "transmission rate to upgrade to after the handshake; \
                     use 0 to keep the handshake baud rate for the whole \
                     session. Targets that do not support the rate-change \
                     command stay at the handshake rate as well.",
                )
                .short("-r")
                .long("--rate")
                .takes_value(true)
                .default_value("230400")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("DATA_BITS")
                .help("number of bits per character")
                .short("-d")
                .long("--data-bits")
                .takes_value(true)
                .possible_values(&["5", "6", "7", "8"])
                .default_value("8")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("STOP_BITS")
                .help("number of stop bits per byte")
                .short("-s")
                .long("--stop-bits")
                .takes_value(true)
                .possible_values(&["1", "2"])
                .default_value("1")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("PARITY")
                .help("parity checking protocol")
                .short("-p")
                .long("--parity")
                .takes_value(true)
                .possible_values(&["none", "odd", "even"])
                .default_value("none")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("FLOW_CONTROL")
                .help("flow control mode")
                .short("-f")
                .long("--flow-control")
                .takes_value(true)
                .possible_values(&["none", "soft", "hard"])
                .default_value("none")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("VERIFY")
                .help("verify each image after flashing it")
                .long("--verify"),
        )
        .arg(
            Arg::with_name("TRACE_DATA")
                .help("dump loader responses as hex tables at debug verbosity")
                .long("--trace-data"),
        )
        .arg(
            Arg::with_name("BOOTLOADER_IMAGE")
                .help("path to the bootloader image")
                .long_help(
                    "path to the bootloader image; when not set, `flashcom` \
                     looks for `bootloader.bin` in the current working \
                     directory.",
                )
                .long("--bootloader")
                .takes_value(true)
                .require_equals(true),
        )
        .arg(
            Arg::with_name("PARTITION_IMAGE")
                .help("path to the partition-table image")
                .long_help(
                    "path to the partition-table image; when not set, \
                     `flashcom` looks for `partition-table.bin` in the \
                     current working directory.",
                )
                .long("--partition-table")
                .takes_value(true)
                .require_equals(true),
        )
        .arg(
            Arg::with_name("FIRMWARE_IMAGE")
                .help("path to the application image to be flashed")
                .long_help(
                    "path to the application image; when not set, `flashcom` \
                     looks for `firmware.bin` in the current working \
                     directory.",
                )
                .index(1),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .get_matches();

    // Vary the output based on how many times the user used the "verbose"
    // flag (i.e. 'flashcom -v -v -v' or 'flashcom -vvv' vs 'flashcom -v'
    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    TermLogger::init(log_level, Config::default(), TerminalMode::Mixed).unwrap();

    trace!("{:#?}", matches);

    // Arguments with default values ===========================================

    // It's safe to call unwrap on all command line arguments with default
    // values, because the value will either be what the user input at
    // runtime or the default value

    let baud_rate = value_t!(matches.value_of("BAUD_RATE"), u32).unwrap_or_else(|_| {
        println!(
            "{}: `{}` needs to be a numeric value",
            style("error").red(),
            style("baud-rate").cyan()
        );
        println!(
            "   {} `{}` is not a valid value",
            style("-->").cyan(),
            style(matches.value_of("BAUD_RATE").unwrap()).on_red()
        );
        process::exit(-1);
    });

    let higher_rate = value_t!(matches.value_of("HIGHER_RATE"), u32).unwrap_or_else(|_| {
        println!(
            "{}: `{}` needs to be a numeric value",
            style("error").red(),
            style("rate").cyan()
        );
        println!(
            "   {} `{}` is not a valid value",
            style("-->").cyan(),
            style(matches.value_of("HIGHER_RATE").unwrap()).on_red()
        );
        process::exit(-1);
    });

    let data_bits = match matches.value_of("DATA_BITS").unwrap() {
        "5" => DataBits::Five,
        "6" => DataBits::Six,
        "7" => DataBits::Seven,
        "8" => DataBits::Eight,
        _ => unreachable!(),
    };

    let stop_bits = match matches.value_of("STOP_BITS").unwrap() {
        "1" => StopBits::One,
        "2" => StopBits::Two,
        _ => unreachable!(),
    };

    let parity = match matches.value_of("PARITY").unwrap() {
        "none" => Parity::None,
        "even" => Parity::Even,
        "odd" => Parity::Odd,
        _ => unreachable!(),
    };

    let flow_control = match matches.value_of("FLOW_CONTROL").unwrap() {
        "none" => FlowControl::None,
        "soft" => FlowControl::Software,
        "hard" => FlowControl::Hardware,
        _ => unreachable!(),
    };

    // END - Arguments with default values =====================================

    let mut settings = fc::SettingsBuilder::default()
        .baud_rate(baud_rate)
        .higher_rate(higher_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .flow_control(flow_control)
        .verify(matches.is_present("VERIFY"))
        .trace_data(matches.is_present("TRACE_DATA"))
        .finalize();

    // START - Arguments with NO default values ================================

    if matches.is_present("DEVICE_TTY") {
        settings.path = Some(matches.value_of("DEVICE_TTY").unwrap().into());
    }

    if matches.is_present("BOOTLOADER_IMAGE") {
        settings.bootloader_image = Some(matches.value_of("BOOTLOADER_IMAGE").unwrap().into());
    }

    if matches.is_present("PARTITION_IMAGE") {
        settings.partition_image = Some(matches.value_of("PARTITION_IMAGE").unwrap().into());
    }

    if matches.is_present("FIRMWARE_IMAGE") {
        settings.firmware_image = Some(matches.value_of("FIRMWARE_IMAGE").unwrap().into());
    }

    // END - Arguments =========================================================

    // Run the state machine ===================================================

    let mut session = fc::factory(settings);
    let exit_code = session.run();
    debug!("exit code: {}", exit_code);
    std::process::exit(exit_code.into());
}
