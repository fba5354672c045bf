use std::io::stdout;
use std::{process, time::Duration};

use crossterm::{
    cursor::{Hide, MoveToColumn, Show},
    event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
    Result,
};

/// Poll the keyboard for up to half a second and report whether `ESC` was
/// pressed. The terminal is switched to raw mode only for the duration of
/// the poll.
pub(crate) fn poll_escape() -> Result<bool> {
    let mut esc_pressed = false;

    enable_raw_mode()?;
    execute!(stdout(), Hide)?;
    let got_event = poll(Duration::from_millis(500))?;
    execute!(stdout(), MoveToColumn(0), Show)?;
    disable_raw_mode()?;

    if got_event {
        // It's guaranteed that read() wont block if `poll` returns `Ok(true)`
        let event = read()?;

        if event == Event::Key(KeyCode::Esc.into()) {
            esc_pressed = true;
        } else if event
            == Event::Key(KeyEvent {
                modifiers: KeyModifiers::CONTROL,
                code: KeyCode::Char('c'),
            })
        {
            // In raw mode Ctrl+C arrives as a key event; honor it here.
            process::exit(0);
        }
    }

    Ok(esc_pressed)
}
