//! # ContentDirectory - Service de navigation dans les répertoires exposés
//!
//! Ce module implémente les actions du service UPnP ContentDirectory sur un
//! ensemble de répertoires locaux (les points de montage) :
//!
//! - **Browse** : métadonnées d'un objet ou liste de ses enfants directs
//! - **GetSystemUpdateID** : version globale du contenu
//! - **GetSearchCapabilities / GetSortCapabilities** : aucune capacité
//! - **ContainerUpdateIDs** : versions des containers observés
//!
//! Le résultat d'un Browse est un document DIDL-Lite sérialisé par
//! [`pmodidl`].

use crate::assembler::ResultAssembler;
use crate::error::{ContentDirectoryError, Result};
use crate::extractors::ExtractorSet;
use crate::mounts::MountList;
use crate::registry::ObjectRegistry;
use crate::tracker::ChangeTracker;
use crate::url::UrlResolver;
use crate::{ObjectId, ROOT_ID};
use pmodidl::DIDLLite;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Valeurs de l'argument `BrowseFlag`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseFlag {
    BrowseMetadata,
    BrowseDirectChildren,
}

impl FromStr for BrowseFlag {
    type Err = ContentDirectoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BrowseMetadata" => Ok(Self::BrowseMetadata),
            "BrowseDirectChildren" => Ok(Self::BrowseDirectChildren),
            other => Err(ContentDirectoryError::InvalidArgument(format!(
                "Invalid BrowseFlag: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for BrowseFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrowseMetadata => write!(f, "BrowseMetadata"),
            Self::BrowseDirectChildren => write!(f, "BrowseDirectChildren"),
        }
    }
}

/// Arguments de sortie de l'action Browse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseResponse {
    /// Document DIDL-Lite
    pub result: String,
    pub number_returned: u32,
    pub total_matches: u32,
    /// UpdateID de l'objet parcouru, lu après construction du résultat
    pub update_id: u32,
}

/// Service ContentDirectory sur des répertoires locaux
///
/// Toutes les méthodes prennent `&self` : le service est destiné à être
/// partagé entre les threads de la couche HTTP, derrière un `Arc`.
pub struct ContentDirectory {
    registry: Arc<ObjectRegistry>,
    tracker: Arc<ChangeTracker>,
    mounts: Arc<MountList>,
    assembler: ResultAssembler,
}

impl ContentDirectory {
    /// Crée un service sans point de montage, avec les extracteurs par défaut
    pub fn new(urls: Arc<dyn UrlResolver>) -> Self {
        Self::with_extractors(urls, ExtractorSet::with_defaults())
    }

    pub fn with_extractors(urls: Arc<dyn UrlResolver>, extractors: ExtractorSet) -> Self {
        let registry = Arc::new(ObjectRegistry::new());
        let tracker = Arc::new(ChangeTracker::new());
        let mounts = Arc::new(MountList::new());

        let assembler = ResultAssembler::new(
            registry.clone(),
            tracker.clone(),
            mounts.clone(),
            extractors,
            urls,
        );

        Self {
            registry,
            tracker,
            mounts,
            assembler,
        }
    }

    /// Expose `path` comme enfant direct de la racine
    ///
    /// Idempotent : un répertoire déjà monté garde son id et le
    /// SystemUpdateID n'est incrémenté qu'au premier ajout. Le répertoire
    /// n'a pas besoin d'exister encore.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` si le chemin est vide, s'il contient un point de
    /// montage existant ou s'il est contenu dans l'un d'eux.
    pub fn add_directory(&self, path: impl AsRef<Path>) -> Result<ObjectId> {
        let path = normalize_mount_path(path.as_ref())?;

        let (id, added) = self.mounts.add(&path, || {
            let id = self.registry.resolve_or_register(&path, ROOT_ID);
            match self.registry.parent_of(id)? {
                Some(ROOT_ID) => Ok(id),
                _ => Err(ContentDirectoryError::InvalidArgument(format!(
                    "{} is already exposed under another directory",
                    path.display()
                ))),
            }
        })?;

        if added {
            self.tracker.bump_system();
            tracing::info!(id, path = %path.display(), "📁 Directory mounted");
        }

        Ok(id)
    }

    /// Action Browse
    ///
    /// # Arguments
    ///
    /// * `object_id` - L'ID de l'objet à parcourir ("0" pour la racine)
    /// * `browse_flag` - "BrowseMetadata" ou "BrowseDirectChildren"
    /// * `filter`, `starting_index`, `requested_count`, `sort_criteria` -
    ///   acceptés mais ignorés : la liste complète est toujours retournée,
    ///   triée par nom
    ///
    /// # Errors
    ///
    /// Le `browse_flag` est validé avant tout accès au registre : une
    /// requête invalide ne modifie aucun état.
    pub fn browse(
        &self,
        object_id: &str,
        browse_flag: &str,
        filter: &str,
        starting_index: u32,
        requested_count: u32,
        sort_criteria: &str,
    ) -> Result<BrowseResponse> {
        tracing::debug!(
            object_id = %object_id,
            browse_flag = %browse_flag,
            "ContentDirectory::Browse"
        );
        tracing::trace!(
            filter = %filter,
            starting_index,
            requested_count,
            sort_criteria = %sort_criteria,
            "Ignored Browse arguments"
        );

        let flag: BrowseFlag = browse_flag.parse()?;
        let id: ObjectId = object_id
            .trim()
            .parse()
            .map_err(|_| ContentDirectoryError::InvalidObjectId(object_id.to_string()))?;

        let (number_returned, total_matches, records) = match flag {
            BrowseFlag::BrowseMetadata => (1, 1, vec![self.assembler.assemble_metadata(id)?]),
            BrowseFlag::BrowseDirectChildren => self.assembler.assemble_children(id)?,
        };

        let result = DIDLLite::with_objects(records)
            .to_xml()
            .map_err(ContentDirectoryError::Serialization)?;
        let update_id = self.tracker.update_id_of(id);

        tracing::debug!(
            object_id = id,
            %flag,
            number_returned,
            total_matches,
            update_id,
            "ContentDirectory::Browse done"
        );

        Ok(BrowseResponse {
            result,
            number_returned,
            total_matches,
            update_id,
        })
    }

    /// Action GetSystemUpdateID
    pub fn get_system_update_id(&self) -> u32 {
        self.tracker.system_update_id()
    }

    /// Action GetSearchCapabilities : la recherche n'est pas supportée
    pub fn get_search_capabilities(&self) -> &'static str {
        ""
    }

    /// Action GetSortCapabilities : l'ordre est toujours celui des noms
    pub fn get_sort_capabilities(&self) -> &'static str {
        ""
    }

    /// Valeur de la variable d'état ContainerUpdateIDs
    pub fn container_update_ids(&self) -> String {
        self.tracker.container_update_ids()
    }

    /// Chemins montés, dans l'ordre d'ajout
    pub fn directories(&self) -> Vec<PathBuf> {
        self.mounts.snapshot().into_iter().map(|(path, _)| path).collect()
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }
}

/// Supprime les `/` finaux, doublés et les composants `.`
fn normalize_mount_path(path: &Path) -> Result<PathBuf> {
    let normalized: PathBuf = path.components().collect();
    if normalized.as_os_str().is_empty() {
        return Err(ContentDirectoryError::InvalidArgument(
            "Empty directory path".to_string(),
        ));
    }
    Ok(normalized)
}
