use crate::ObjectId;
use crate::error::{ContentDirectoryError, Result};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Répertoires exposés sous la racine, dans l'ordre d'ajout
///
/// Deux points de montage ne sont jamais imbriqués : un objet a un seul
/// parent, et il doit être le même quel que soit le montage par lequel on
/// arrive jusqu'à lui.
#[derive(Debug, Default)]
pub struct MountList {
    mounts: RwLock<Vec<(PathBuf, ObjectId)>>,
}

impl MountList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute `path` s'il n'est pas déjà monté
    ///
    /// `register` est appelé sous le verrou de la liste, une seule fois par
    /// chemin. Retourne l'id du montage et `true` s'il vient d'être ajouté.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` si `path` contient un point de montage existant ou
    /// est contenu dans l'un d'eux. Les erreurs de `register` sont propagées.
    pub fn add(
        &self,
        path: &Path,
        register: impl FnOnce() -> Result<ObjectId>,
    ) -> Result<(ObjectId, bool)> {
        let mut mounts = self.mounts.write().unwrap_or_else(PoisonError::into_inner);

        if let Some((_, id)) = mounts.iter().find(|(p, _)| p == path) {
            return Ok((*id, false));
        }

        if let Some((other, _)) = mounts
            .iter()
            .find(|(p, _)| path.starts_with(p) || p.starts_with(path))
        {
            return Err(ContentDirectoryError::InvalidArgument(format!(
                "{} overlaps mounted directory {}",
                path.display(),
                other.display()
            )));
        }

        let id = register()?;
        mounts.push((path.to_path_buf(), id));
        Ok((id, true))
    }

    /// Copie de la liste courante
    pub fn snapshot(&self) -> Vec<(PathBuf, ObjectId)> {
        self.mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.mounts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
