//! Registre des objets : correspondance bidirectionnelle id ↔ chemin
//!
//! Les chemins sont conservés tels quels (`PathBuf`), sans conversion en
//! UTF-8 : deux noms qui ne diffèrent que par des octets invalides restent
//! deux objets distincts.
//!
//! Les identifiants sont attribués paresseusement, la première fois qu'un
//! chemin est rencontré, par un compteur strictement croissant. Un id n'est
//! jamais réattribué et son chemin comme son parent ne changent plus.
//!
//! L'allocation et les insertions dans les trois tables se font dans une
//! seule section critique en écriture : un lecteur ne voit jamais un objet
//! à moitié enregistré.

use crate::error::{ContentDirectoryError, Result};
use crate::{ObjectId, ROOT_ID, ROOT_NAME};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    next_id: ObjectId,
    paths: HashMap<ObjectId, PathBuf>,
    ids: HashMap<PathBuf, ObjectId>,
    parents: HashMap<ObjectId, Option<ObjectId>>,
}

impl Tables {
    fn insert(&mut self, path: &Path, parent: Option<ObjectId>) -> ObjectId {
        if let Some(&id) = self.ids.get(path) {
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;

        self.paths.insert(id, path.to_path_buf());
        self.ids.insert(path.to_path_buf(), id);
        self.parents.insert(id, parent);

        id
    }
}

/// Table des objets du ContentDirectory
#[derive(Debug)]
pub struct ObjectRegistry {
    tables: RwLock<Tables>,
}

impl ObjectRegistry {
    /// Crée un registre contenant uniquement la racine synthétique (id 0)
    pub fn new() -> Self {
        let mut tables = Tables::default();
        tables.insert(Path::new(ROOT_NAME), None);

        Self {
            tables: RwLock::new(tables),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Retourne l'id d'un chemin déjà enregistré
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<ObjectId> {
        let path = path.as_ref();
        self.read()
            .ids
            .get(path)
            .copied()
            .ok_or_else(|| ContentDirectoryError::UnknownObject(path.display().to_string()))
    }

    /// Retourne l'id de `path`, en l'enregistrant sous `parent` s'il est nouveau
    ///
    /// Idempotent : un chemin connu garde son id et son parent d'origine,
    /// même si un autre `parent` est passé.
    pub fn resolve_or_register(&self, path: impl AsRef<Path>, parent: ObjectId) -> ObjectId {
        let path = path.as_ref();
        if let Some(&id) = self.read().ids.get(path) {
            return id;
        }

        let id = self.write().insert(path, Some(parent));
        tracing::trace!(id, path = %path.display(), parent, "Registered object");
        id
    }

    /// Chemin associé à `id`
    pub fn path_of(&self, id: ObjectId) -> Result<PathBuf> {
        self.read()
            .paths
            .get(&id)
            .cloned()
            .ok_or_else(|| ContentDirectoryError::InvalidObjectId(id.to_string()))
    }

    /// Parent de `id` ; `None` pour la racine
    pub fn parent_of(&self, id: ObjectId) -> Result<Option<ObjectId>> {
        self.read()
            .parents
            .get(&id)
            .copied()
            .ok_or_else(|| ContentDirectoryError::InvalidObjectId(id.to_string()))
    }

    /// Point de montage (enfant direct de la racine) dont `id` descend
    pub fn mount_root_of(&self, id: ObjectId) -> Result<ObjectId> {
        let tables = self.read();
        let mut current = id;

        loop {
            match tables.parents.get(&current) {
                Some(Some(ROOT_ID)) => return Ok(current),
                Some(Some(parent)) => current = *parent,
                Some(None) | None => {
                    return Err(ContentDirectoryError::InvalidObjectId(id.to_string()));
                }
            }
        }
    }

    /// Nombre d'objets enregistrés, racine comprise
    pub fn len(&self) -> usize {
        self.read().paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
