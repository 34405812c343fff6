use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

use crate::log::LogSettings;

// ISO 8601 timestamp, colour coded level, then the module that logged
const PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";
const APPENDER: &str = "console";

impl LogSettings {
    /// Installs (or reconfigures) the `log4rs` console logger to match these settings.
    pub(in crate::log) fn apply(&mut self) {
        let console = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build();
        let loggers = self
            .filters
            .iter()
            .map(|(module, level)| Logger::builder().build(module.clone(), *level));
        let built = Config::builder()
            .appender(Appender::builder().build(APPENDER, Box::new(console)))
            .loggers(loggers)
            .build(Root::builder().appender(APPENDER).build(self.level));
        let config = match built {
            Ok(config) => config,
            Err(e) => {
                // Only a malformed module path gets here; the previous logger stays in place
                eprintln!("epinet: invalid log configuration: {e}");
                return;
            }
        };

        if let Some(handle) = &self.handle {
            handle.set_config(config);
            return;
        }
        match log4rs::init_config(config) {
            Ok(handle) => self.handle = Some(handle),
            // Someone else installed a logger; the level is all we can still control
            Err(_) => log::set_max_level(self.level),
        }
    }
}
