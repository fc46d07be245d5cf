use crate::ObjectId;
use std::path::Path;

/// Erreurs du service ContentDirectory
///
/// Toutes ces erreurs remontent jusqu'à l'appelant (couche d'actions UPnP)
/// et deviennent une faute au niveau de la requête. Les échecs d'extraction
/// de métadonnées n'apparaissent pas ici : ils sont absorbés par
/// [`crate::extractors::ExtractorSet`].
#[derive(Debug, thiserror::Error)]
pub enum ContentDirectoryError {
    /// BrowseFlag inconnu ou argument mal formé
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Identifiant absent du registre (ou non numérique)
    #[error("Invalid object id: {0}")]
    InvalidObjectId(String),

    /// Chemin jamais enregistré, sans parent fourni pour l'enregistrer
    #[error("Object {0} does not exist")]
    UnknownObject(String),

    /// Le fichier ou répertoire a disparu ou n'est plus lisible
    #[error("Object {id} ({path}) is unavailable: {reason}")]
    ObjectUnavailable {
        id: ObjectId,
        path: String,
        reason: String,
    },

    #[error("Failed to build result: {0}")]
    Serialization(String),
}

impl ContentDirectoryError {
    pub(crate) fn unavailable(id: ObjectId, path: &Path, err: impl std::fmt::Display) -> Self {
        Self::ObjectUnavailable {
            id,
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type for ContentDirectory operations
pub type Result<T> = std::result::Result<T, ContentDirectoryError>;
