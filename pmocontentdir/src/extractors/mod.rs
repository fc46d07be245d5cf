//! Extraction des métadonnées d'un fichier selon son type mime
//!
//! Chaque [`MetadataExtractor`] déclare les types mime qu'il sait traiter.
//! L'extraction est « best effort » : un fichier illisible ou sans tags
//! retombe sur le titre (nom du fichier) et la date du système de fichiers,
//! sans attributs techniques.

mod audio;
mod picture;

pub use audio::AudioExtractor;
pub use picture::ImageExtractor;

use chrono::{DateTime, Local, SecondsFormat};
use std::fmt::Debug;
use std::fs::Metadata;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Erreur interne d'extraction, toujours rattrapée par le repli
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Tag error: {0}")]
    Tag(#[from] lofty::error::LoftyError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Champs descriptifs lus dans le fichier
///
/// Après [`ExtractorSet::extract`], `title` et `date` sont toujours
/// renseignés.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataOverrides {
    pub title: Option<String>,
    pub date: Option<String>,
    pub creator: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub track_number: Option<u32>,
    pub publisher: Option<String>,
}

/// Attributs techniques d'un flux audio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioAttrs {
    /// Débit annoncé par le décodeur, en kbps
    pub bitrate_kbps: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub duration: Option<Duration>,
}

/// Attributs techniques d'une image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttrs {
    pub width: u32,
    pub height: u32,
    /// Bits par pixel
    pub color_depth: u16,
    pub bits_per_sample: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum MediaAttrs {
    Audio(AudioAttrs),
    Image(ImageAttrs),
    #[default]
    None,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    pub overrides: MetadataOverrides,
    pub attrs: MediaAttrs,
}

/// Extracteur de métadonnées pour une famille de types mime
pub trait MetadataExtractor: Send + Sync + Debug {
    /// Nom court, utilisé dans les logs
    fn name(&self) -> &'static str;

    fn handles(&self, mime: &str) -> bool;

    fn extract(&self, path: &Path) -> Result<ExtractedMetadata, ExtractionError>;
}

/// Ensemble ordonné d'extracteurs ; le premier qui accepte le type gagne
#[derive(Debug)]
pub struct ExtractorSet {
    extractors: Vec<Box<dyn MetadataExtractor>>,
}

impl ExtractorSet {
    /// Ensemble vide : seul le repli s'applique
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Audio (lofty) et images
    pub fn with_defaults() -> Self {
        let mut set = Self::empty();
        set.register(Box::new(AudioExtractor));
        set.register(Box::new(ImageExtractor));
        set
    }

    pub fn register(&mut self, extractor: Box<dyn MetadataExtractor>) {
        self.extractors.push(extractor);
    }

    /// Extrait les métadonnées de `path`, complétées par le repli
    ///
    /// Ne retourne jamais d'erreur : tout échec de l'extracteur est journalisé
    /// et remplacé par le titre et la date issus du système de fichiers.
    pub fn extract(&self, mime: &str, path: &Path, stat: &Metadata) -> ExtractedMetadata {
        let extracted = match self.extractors.iter().find(|e| e.handles(mime)) {
            Some(extractor) => match extractor.extract(path) {
                Ok(extracted) => extracted,
                Err(e) => {
                    tracing::debug!(
                        path = %path.display(),
                        extractor = extractor.name(),
                        error = %e,
                        "Metadata extraction failed, using file name"
                    );
                    ExtractedMetadata::default()
                }
            },
            None => ExtractedMetadata::default(),
        };

        with_fallback(extracted, path, stat)
    }
}

impl Default for ExtractorSet {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn with_fallback(mut extracted: ExtractedMetadata, path: &Path, stat: &Metadata) -> ExtractedMetadata {
    let overrides = &mut extracted.overrides;

    if overrides.title.as_deref().is_none_or(str::is_empty) {
        overrides.title = Some(file_title(path));
    }

    if overrides.date.is_none() {
        let changed = stat.created().or_else(|_| stat.modified()).ok();
        overrides.date = Some(iso_date(changed.unwrap_or(SystemTime::UNIX_EPOCH)));
    }

    extracted
}

/// Nom de fichier affiché quand aucun titre n'est disponible
pub(crate) fn file_title(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

pub(crate) fn iso_date(time: SystemTime) -> String {
    DateTime::<Local>::from(time).to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Garde une chaîne de tag si elle n'est pas vide
pub(crate) fn non_empty(value: impl AsRef<str>) -> Option<String> {
    let value = value.as_ref().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Failing;

    impl MetadataExtractor for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn handles(&self, _mime: &str) -> bool {
            true
        }

        fn extract(&self, _path: &Path) -> Result<ExtractedMetadata, ExtractionError> {
            Err(std::io::Error::other("boom").into())
        }
    }

    #[derive(Debug)]
    struct Fixed;

    impl MetadataExtractor for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn handles(&self, mime: &str) -> bool {
            mime == "text/plain"
        }

        fn extract(&self, _path: &Path) -> Result<ExtractedMetadata, ExtractionError> {
            Ok(ExtractedMetadata {
                overrides: MetadataOverrides {
                    title: Some("From tag".to_string()),
                    album: Some("Album".to_string()),
                    ..Default::default()
                },
                attrs: MediaAttrs::None,
            })
        }
    }

    fn file(dir: &TempDir, name: &str) -> (std::path::PathBuf, Metadata) {
        let path = dir.path().join(name);
        std::fs::write(&path, b"data").unwrap();
        let stat = std::fs::metadata(&path).unwrap();
        (path, stat)
    }

    #[test]
    fn test_failure_falls_back_to_file_name() {
        let dir = TempDir::new().unwrap();
        let (path, stat) = file(&dir, "notes.txt");

        let mut set = ExtractorSet::empty();
        set.register(Box::new(Failing));
        let extracted = set.extract("text/plain", &path, &stat);

        assert_eq!(extracted.overrides.title.as_deref(), Some("notes.txt"));
        assert!(extracted.overrides.date.is_some());
        assert_eq!(extracted.attrs, MediaAttrs::None);
    }

    #[test]
    fn test_first_matching_extractor_wins() {
        let dir = TempDir::new().unwrap();
        let (path, stat) = file(&dir, "notes.txt");

        let mut set = ExtractorSet::empty();
        set.register(Box::new(Fixed));
        set.register(Box::new(Failing));

        let extracted = set.extract("text/plain", &path, &stat);
        assert_eq!(extracted.overrides.title.as_deref(), Some("From tag"));
        assert_eq!(extracted.overrides.album.as_deref(), Some("Album"));
        assert!(extracted.overrides.date.is_some());

        // un autre type tombe sur Failing, donc sur le repli
        let other = set.extract("application/pdf", &path, &stat);
        assert_eq!(other.overrides.title.as_deref(), Some("notes.txt"));
    }

    #[test]
    fn test_no_extractor_uses_fallback() {
        let dir = TempDir::new().unwrap();
        let (path, stat) = file(&dir, "blob.bin");

        let extracted = ExtractorSet::empty().extract("application/octet-stream", &path, &stat);
        assert_eq!(extracted.overrides.title.as_deref(), Some("blob.bin"));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" Rock "), Some("Rock".to_string()));
    }

    #[test]
    fn test_iso_date_has_offset() {
        let date = iso_date(SystemTime::UNIX_EPOCH);
        assert!(date.starts_with("19"));
        assert!(date.contains('T'));
    }
}
