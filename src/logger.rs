//! Colored, timestamped console macros used across the model.
//!
//! `warn!` and `error!` always print. `info!`, `log!` and the high-volume `event!` channel
//! (critical-path chains, ledger appends, configuration summaries) only print when
//! `LOG_OBSERVATORY_EVENTS` is set.

pub(crate) const VERBOSE_ENV: &str = "LOG_OBSERVATORY_EVENTS";

pub(crate) fn verbose() -> bool { std::env::var_os(VERBOSE_ENV).is_some() }

/// Prints one tagged line. `$style` is an ANSI SGR code, `$tag` is padded to five characters.
macro_rules! emit {
    ($style:literal, $tag:literal, $($arg:tt)*) => {
        println!(
            concat!("\x1b[", $style, "m[", $tag, "][{}]\x1b[0m {}"),
            chrono::Utc::now().format("%H:%M:%S%.3f"),
            format!($($arg)*)
        )
    };
}

macro_rules! info {
    ($($arg:tt)*) => {
        if $crate::logger::verbose() {
            $crate::logger::emit!("32", "INFO ", $($arg)*)
        }
    };
}

macro_rules! log {
    ($($arg:tt)*) => {
        if $crate::logger::verbose() {
            $crate::logger::emit!("33", "LOG  ", $($arg)*)
        }
    };
}

macro_rules! warn_ {
    ($($arg:tt)*) => { $crate::logger::emit!("35", "WARN ", $($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { $crate::logger::emit!("31", "ERROR", $($arg)*) };
}

macro_rules! event {
    ($($arg:tt)*) => {
        if $crate::logger::verbose() {
            $crate::logger::emit!("36", "EVENT", $($arg)*)
        }
    };
}

pub(crate) use {emit, error, event, info, log};
pub(crate) use warn_ as warn;
