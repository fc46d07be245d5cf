//! Initialisation du logging (tracing)

use pmoconfig::Config;
use std::sync::{Arc, RwLock};
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt, Registry,
};

/// Contrôle du niveau de log après l'initialisation
#[derive(Clone)]
pub struct LogControl {
    max_level: Arc<RwLock<Level>>,
    reload_handle: reload::Handle<LevelFilter, Registry>,
}

impl LogControl {
    pub fn level(&self) -> Level {
        *self
            .max_level
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Change le niveau minimal ; retourne `false` si `level` est inconnu
    pub fn set_level(&self, level: &str) -> bool {
        let Some(level) = string_to_level(level) else {
            return false;
        };

        if let Err(e) = self.reload_handle.reload(level_to_levelfilter(level)) {
            tracing::warn!("Failed to reload log filter: {}", e);
            return false;
        }

        *self
            .max_level
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = level;
        true
    }
}

/// Installe le subscriber global à partir de la configuration
///
/// Le niveau vient de `host.logger.min_level` (TRACE s'il est invalide), la
/// sortie console de `host.logger.enable_console`. Si un subscriber global
/// est déjà installé, il est conservé.
pub fn init_logging(config: &Config) -> LogControl {
    let configured = config.get_log_min_level();
    let level = string_to_level(&configured).unwrap_or(Level::TRACE);

    let (filter, reload_handle) = reload::Layer::new(level_to_levelfilter(level));
    let subscriber = Registry::default().with(filter);

    let installed = if config.get_log_enable_console() {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }

    LogControl {
        max_level: Arc::new(RwLock::new(level)),
        reload_handle,
    }
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

fn level_to_levelfilter(level: Level) -> LevelFilter {
    match level {
        Level::ERROR => LevelFilter::ERROR,
        Level::WARN => LevelFilter::WARN,
        Level::INFO => LevelFilter::INFO,
        Level::DEBUG => LevelFilter::DEBUG,
        Level::TRACE => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_level() {
        assert_eq!(string_to_level("info"), Some(Level::INFO));
        assert_eq!(string_to_level(" WARN "), Some(Level::WARN));
        assert_eq!(string_to_level("verbose"), None);
    }

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(level_to_levelfilter(Level::DEBUG), LevelFilter::DEBUG);
        assert_eq!(level_to_levelfilter(Level::ERROR), LevelFilter::ERROR);
    }
}
