//! Service ContentDirectory UPnP sur des répertoires locaux.
//!
//! Ce crate expose une arborescence de fichiers (audio, images, playlists,
//! etc.) sous la forme d'objets ContentDirectory identifiés par des entiers,
//! et implémente le protocole Browse avec le suivi des versions
//! (UpdateID / SystemUpdateID).
//!
//! # Architecture
//!
//! - [`registry::ObjectRegistry`] : correspondance id ↔ chemin, parents
//! - [`tracker::ChangeTracker`] : versions des containers et version globale
//! - [`mime`] : type mime, classe UPnP, profil DLNA
//! - [`extractors`] : métadonnées des fichiers (tags audio, en-têtes et EXIF des images)
//! - [`assembler::ResultAssembler`] : enregistrements DIDL-Lite
//! - [`content_handler::ContentDirectory`] : actions du service
//! - [`url`] : URLs des ressources servies en HTTP
//!
//! La racine synthétique a l'id `0` ; chaque répertoire monté avec
//! [`ContentDirectory::add_directory`] devient l'un de ses enfants directs.
//! Les identifiants des fichiers sont attribués au fil des parcours et
//! restent stables pendant toute la vie du service.
//!
//! # Utilisation de base
//!
//! ```rust,no_run
//! use pmocontentdir::{BaseUrlResolver, ContentDirectory};
//! use std::sync::Arc;
//!
//! let urls = BaseUrlResolver::new("http://192.168.1.10:8080", "/ContentDirectory");
//! let directory = ContentDirectory::new(Arc::new(urls));
//! directory.add_directory("/srv/music")?;
//!
//! let response = directory.browse("0", "BrowseDirectChildren", "*", 0, 0, "")?;
//! println!("{} objets, SystemUpdateID {}", response.total_matches,
//!          directory.get_system_update_id());
//! # Ok::<(), pmocontentdir::ContentDirectoryError>(())
//! ```

pub mod assembler;
pub mod config_ext;
pub mod content_handler;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod mime;
pub mod mounts;
pub mod registry;
pub mod tracker;
pub mod url;

pub use pmodidl;

pub use config_ext::ContentDirectoryConfigExt;
pub use content_handler::{BrowseFlag, BrowseResponse, ContentDirectory};
pub use error::{ContentDirectoryError, Result};
pub use extractors::{ExtractorSet, MetadataExtractor};
pub use url::{BaseUrlResolver, UrlResolver};

/// Identifiant d'un objet du ContentDirectory
pub type ObjectId = u32;

/// Identifiant de la racine synthétique
pub const ROOT_ID: ObjectId = 0;

/// Chemin (et titre) enregistré pour la racine
pub const ROOT_NAME: &str = "Root";
