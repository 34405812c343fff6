//! Engine logging.
//!
//! Log messages describe what a run is doing internally: lifecycle transitions, executed events,
//! infections and interventions. They are separate from the statistics a run returns from
//! `Simulator::run`, which are the observations a model is actually interested in.
//!
//! The five `log` macros are re-exported here so models can log through the same backend:
//!
//! ```rust
//! use epinet::log::debug;
//!
//! fn close_schools() {
//!     debug!("closing the school layer");
//! }
//! ```
//!
//! Nothing is printed until a level is chosen. [`set_log_level`] sets the level for every module
//! and [`enable_logging`] / [`disable_logging`] are shorthands for `Trace` and `Off`. Individual
//! module paths can be given their own level:
//!
//! ```rust
//! use epinet::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! set_log_level(LevelFilter::Info);
//! // One line per executed event
//! set_module_filter("epinet::simulator", LevelFilter::Trace);
//! // Quiet disease models
//! set_module_filter("epinet::disease", LevelFilter::Off);
//! ```
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
pub use log::{debug, error, info, trace, warn, LevelFilter};
#[cfg(feature = "logging")]
use log4rs::Handle;

static LOG_SETTINGS: LazyLock<Mutex<LogSettings>> = LazyLock::new(Mutex::default);

/// The process-wide logging setup. There is a single instance behind [`LOG_SETTINGS`]; every
/// change goes through [`LogSettings::apply`] so the backend always mirrors it.
#[derive(Debug)]
pub(in crate::log) struct LogSettings {
    /// Level for modules without a filter of their own. `Off` silences everything.
    pub(in crate::log) level: LevelFilter,
    /// Module path to level, in the order the filters were first set. A filter overrides the
    /// global level either way, so it can also raise a module above it.
    pub(in crate::log) filters: IndexMap<String, LevelFilter>,

    #[cfg(feature = "logging")]
    handle: Option<Handle>,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: LevelFilter::Off,
            filters: IndexMap::new(),

            #[cfg(feature = "logging")]
            handle: None,
        }
    }
}

impl LogSettings {
    /// Applies `changes` and reinstalls the backend if any filter actually changed.
    fn update_filters<'a>(&mut self, changes: impl IntoIterator<Item = (&'a str, LevelFilter)>) {
        let mut changed = false;
        for (module, level) in changes {
            let previous = self.filters.insert(module.to_string(), level);
            changed |= previous != Some(level);
        }
        if changed {
            self.apply();
        }
    }
}

fn settings() -> MutexGuard<'static, LogSettings> {
    // A panic while holding the lock leaves the settings themselves intact
    LOG_SETTINGS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shows every message. Same as `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Same as `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the level used by every module without a filter of its own.
pub fn set_log_level(level: LevelFilter) {
    let mut settings = settings();
    settings.level = level;
    settings.apply();
}

/// The level set by [`set_log_level`].
#[must_use]
pub fn log_level() -> LevelFilter {
    settings().level
}

/// Gives `module` (and its submodules) a level of its own.
pub fn set_module_filter(module: &str, level: LevelFilter) {
    settings().update_filters([(module, level)]);
}

/// Sets several module filters, reinstalling the backend at most once.
pub fn set_module_filters(filters: &[(&str, LevelFilter)]) {
    settings().update_filters(filters.iter().copied());
}

/// Puts `module` back under the global level.
pub fn remove_module_filter(module: &str) {
    let mut settings = settings();
    if settings.filters.shift_remove(module).is_some() {
        settings.apply();
    }
}

/// The module filters currently in place, in the order they were first set.
#[must_use]
pub fn module_filters() -> Vec<(String, LevelFilter)> {
    settings()
        .filters
        .iter()
        .map(|(module, level)| (module.clone(), *level))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // The settings are global, so these tests must not interleave
    static SERIAL: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

    #[test]
    fn global_level() {
        let _serial = SERIAL.lock().unwrap();
        set_log_level(LevelFilter::Error);
        assert_eq!(log_level(), LevelFilter::Error);
        error!("global level is error");
        trace!("never shown");

        enable_logging();
        assert_eq!(log_level(), LevelFilter::Trace);
        assert_eq!(log::max_level(), LevelFilter::Trace);

        disable_logging();
        assert_eq!(log_level(), LevelFilter::Off);
    }

    fn enabled(target: &str, level: log::Level) -> bool {
        log::logger().enabled(&log::Metadata::builder().target(target).level(level).build())
    }

    #[test]
    fn disabled_means_silent() {
        let _serial = SERIAL.lock().unwrap();
        enable_logging();
        disable_logging();
        assert_eq!(log::max_level(), LevelFilter::Off);
        assert!(!enabled("epinet::simulator", log::Level::Info));
        assert!(!enabled("epinet::simulator", log::Level::Error));

        set_log_level(LevelFilter::Warn);
        assert!(!enabled("epinet::simulator", log::Level::Info));
        disable_logging();
    }

    #[test]
    fn module_filters_keep_their_order() {
        let _serial = SERIAL.lock().unwrap();
        assert!(module_filters().is_empty());

        set_module_filter("epinet::simulator", LevelFilter::Info);
        set_module_filters(&[
            ("epinet::disease", LevelFilter::Warn),
            ("epinet::simulator", LevelFilter::Trace),
        ]);
        assert_eq!(
            module_filters(),
            vec![
                ("epinet::simulator".to_string(), LevelFilter::Trace),
                ("epinet::disease".to_string(), LevelFilter::Warn),
            ]
        );

        remove_module_filter("epinet::disease");
        remove_module_filter("epinet::not_a_module");
        set_module_filter("epinet::simulator", LevelFilter::Debug);
        assert_eq!(
            module_filters(),
            vec![("epinet::simulator".to_string(), LevelFilter::Debug)]
        );
        remove_module_filter("epinet::simulator");
        assert!(module_filters().is_empty());
    }
}
