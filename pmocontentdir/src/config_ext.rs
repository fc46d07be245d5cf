//! Extension pour construire le ContentDirectory depuis pmoconfig
//!
//! Ce module fournit le trait `ContentDirectoryConfigExt` qui ajoute à
//! `pmoconfig::Config` la création d'un service ContentDirectory déjà monté
//! sur les répertoires configurés (`content.directories`).

use crate::content_handler::ContentDirectory;
use crate::url::BaseUrlResolver;
use pmoconfig::Config;
use std::path::Path;
use std::sync::Arc;

/// Trait d'extension pour créer le ContentDirectory depuis la configuration
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmocontentdir::ContentDirectoryConfigExt;
///
/// let config = get_config();
/// let directory = config.create_content_directory();
/// let response = directory.browse("0", "BrowseDirectChildren", "*", 0, 0, "")?;
/// ```
pub trait ContentDirectoryConfigExt {
    /// Crée le service et monte chaque répertoire de `content.directories`
    fn create_content_directory(&self) -> ContentDirectory;
}

impl ContentDirectoryConfigExt for Config {
    fn create_content_directory(&self) -> ContentDirectory {
        ContentDirectory::from_config(self)
    }
}

impl ContentDirectory {
    /// Service configuré : URL de base, chemin du service et points de montage
    ///
    /// Un répertoire configuré qui n'existe pas est monté quand même (il
    /// pourra apparaître plus tard) ; un chemin refusé est ignoré.
    pub fn from_config(config: &Config) -> Self {
        let urls = BaseUrlResolver::from_config(config);
        tracing::debug!(prefix = urls.prefix(), "Resource URL prefix");

        let directory = Self::new(Arc::new(urls));

        for dir in config.get_directories() {
            if !Path::new(&dir).is_dir() {
                tracing::warn!(path = %dir, "Configured directory is not reachable yet");
            }

            if let Err(e) = directory.add_directory(&dir) {
                tracing::warn!(path = %dir, error = %e, "Directory ignored");
            }
        }

        directory
    }
}
