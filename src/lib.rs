/*!
Server-rendered museum management: visitor accounts, visit reservations
with blocked-slot checking, an artifact catalog, and a quiz.
*/

pub mod auth;
pub mod avail;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod img;
pub mod inter;
pub mod mail;
pub mod quiz;
pub mod session;
pub mod store;
pub mod user;

use time::{format_description::FormatItem, macros::format_description};

/// Calendar dates travel as "YYYY-MM-DD" everywhere: form inputs,
/// emails, and rendered pages.
pub const DATE_FMT: &[FormatItem] = format_description!("[year]-[month]-[day]");

pub fn log_level_from_env() -> simplelog::LevelFilter {
    use simplelog::LevelFilter;

    let mut level_string = match std::env::var("LOG_LEVEL") {
        Err(_) => { return LevelFilter::Warn; },
        Ok(s) => s,
    };

    level_string.make_ascii_lowercase();
    match level_string.as_str() {
        "max" => LevelFilter::max(),
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn ensure_logging() {
        use simplelog::{TermLogger, TerminalMode, ColorChoice};
        let log_cfg = simplelog::ConfigBuilder::new()
            .add_filter_allow_str("museo")
            .build();
        let res = TermLogger::init(
            log_level_from_env(),
            log_cfg,
            TerminalMode::Stdout,
            ColorChoice::Auto
        );

        match res {
            Ok(_) => { log::info!("Test logging started."); },
            Err(_) => { log::info!("Test logging already started."); },
        }
    }
}
