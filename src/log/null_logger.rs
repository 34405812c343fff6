//! Without the `logging` feature there is no backend; only the `log` facade's maximum level is
//! kept in sync so the macros stay cheap.
use crate::log::LogSettings;

impl LogSettings {
    pub(in crate::log) fn apply(&mut self) {
        log::set_max_level(self.level);
    }
}
