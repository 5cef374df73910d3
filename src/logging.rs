/*!

Console logging for simulations, built on the `log` facade with a `log4rs` backend.

Library code logs through the usual macros, re-exported here so call sites can write
`use crate::logging::{debug, trace};`. Nothing is printed until a binary or test calls
[`enable_logging`]. The installed `log4rs::Handle` is kept so that the level can be changed
or logging silenced later in the run.

*/

use crate::error::SimError;
use log4rs::{
    Handle,
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use std::sync::Mutex;

pub use log::{LevelFilter, debug, error, info, trace, warn};

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
const DEFAULT_LOG_PATTERN: &str = "{h({l})} {M} - {m}{n}";
const CONSOLE_APPENDER: &str = "console";

static LOG_HANDLE: Mutex<Option<Handle>> = Mutex::new(None);

fn build_config(level: LevelFilter) -> Result<Config, SimError> {
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
        .build();

    Config::builder()
        .appender(Appender::builder().build(CONSOLE_APPENDER, Box::new(console)))
        .build(Root::builder().appender(CONSOLE_APPENDER).build(level))
        .map_err(|errors| SimError::Logging(errors.to_string()))
}

/// Enables console logging at the default level (`Info`).
pub fn enable_logging() -> Result<(), SimError> {
    set_log_level(DEFAULT_LOG_LEVEL)
}

/// Turns logging off without uninstalling the logger.
pub fn disable_logging() -> Result<(), SimError> {
    set_log_level(LevelFilter::Off)
}

/// Sets the maximum level that reaches the console, installing the logger on first use.
pub fn set_log_level(level: LevelFilter) -> Result<(), SimError> {
    let config = build_config(level)?;
    let mut handle = LOG_HANDLE
        .lock()
        .map_err(|_| SimError::Logging("log handle lock poisoned".to_string()))?;

    match handle.as_ref() {
        Some(handle) => handle.set_config(config),
        None => {
            let new_handle =
                log4rs::init_config(config).map_err(|e| SimError::Logging(e.to_string()))?;
            *handle = Some(new_handle);
        }
    }
    log::set_max_level(level);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_can_be_reconfigured() {
        enable_logging().unwrap();
        assert_eq!(log::max_level(), LevelFilter::Info);

        set_log_level(LevelFilter::Trace).unwrap();
        assert_eq!(log::max_level(), LevelFilter::Trace);
        trace!("reconfigured to trace");

        disable_logging().unwrap();
        assert_eq!(log::max_level(), LevelFilter::Off);
    }
}
