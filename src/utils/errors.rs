//! User-facing diagnostics for the command line. Library code logs through
//! `tracing` instead; these are for messages the user must always see.

use crate::cli::ColorMode;
use nu_ansi_term::{Color, Style};
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_EXIT_CODE: i32 = 1;

static USE_COLOR: AtomicBool = AtomicBool::new(true);

pub(crate) fn configure_color(cmode: ColorMode) {
    USE_COLOR.store(matches!(cmode, ColorMode::On), Ordering::Relaxed);
}

pub(crate) fn color_mode() -> ColorMode {
    match USE_COLOR.load(Ordering::Relaxed) {
        true => ColorMode::On,
        false => ColorMode::Off,
    }
}

fn labelled(label: &str, style: Style, text: &str) -> String {
    match color_mode() {
        ColorMode::On => {
            let text_style = Color::Default.bold();

            format!("{} {}", style.paint(label), text_style.paint(text))
        }
        ColorMode::Off => format!("{} {}", label, text),
    }
}

pub(crate) fn error_internal(text: &str) {
    eprintln!("{}", labelled("error:", Color::Red.bold(), text));
}

pub(crate) fn warn_internal(text: &str) {
    eprintln!("{}", labelled("warning:", Color::Yellow.bold(), text));
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::warn_internal(&formatted);
    })
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
    })
}

#[macro_export]
macro_rules! die {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
        ::std::process::exit($crate::utils::errors::DEFAULT_EXIT_CODE);
    })
}
