//! Suivi des modifications : UpdateID par container et SystemUpdateID
//!
//! Un container est versionné paresseusement : c'est au moment où il est
//! consulté que sa date de modification est comparée à la dernière date
//! observée. Si elle a avancé (à la seconde près), l'UpdateID du container
//! et le SystemUpdateID sont incrémentés ensemble.

use crate::ObjectId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
struct TrackerState {
    observed_mtime: HashMap<ObjectId, i64>,
    update_ids: HashMap<ObjectId, u32>,
}

/// Compteurs de version du ContentDirectory
///
/// La comparaison et les deux incréments sont faits sous le même verrou :
/// deux consultations concurrentes d'un container modifié ne produisent
/// qu'une seule incrémentation.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    state: Mutex<TrackerState>,
    system_update_id: AtomicU32,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enregistre une consultation du container `id` modifié à `modified`
    ///
    /// Retourne `true` si la date a avancé depuis la dernière observation
    /// (ou si le container n'avait jamais été observé), auquel cas
    /// l'UpdateID du container et le SystemUpdateID ont été incrémentés.
    pub fn note_access(&self, id: ObjectId, modified: SystemTime) -> bool {
        let mtime = mtime_secs(modified);
        let mut state = self.lock();

        let observed = state.observed_mtime.get(&id).copied().unwrap_or(i64::MIN);
        if mtime <= observed {
            return false;
        }

        state.observed_mtime.insert(id, mtime);
        let update_id = state.update_ids.entry(id).or_insert(0);
        *update_id = update_id.wrapping_add(1);
        let container_update = *update_id;
        let system = self.system_update_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        drop(state);

        tracing::debug!(
            id,
            update_id = container_update,
            system_update_id = system,
            "Container changed"
        );
        true
    }

    /// UpdateID courant du container (0 s'il n'a jamais été observé)
    pub fn update_id_of(&self, id: ObjectId) -> u32 {
        self.lock().update_ids.get(&id).copied().unwrap_or(0)
    }

    /// SystemUpdateID courant
    pub fn system_update_id(&self) -> u32 {
        self.system_update_id.load(Ordering::SeqCst)
    }

    /// Incrémente le SystemUpdateID seul (ajout d'un point de montage)
    pub fn bump_system(&self) -> u32 {
        let _state = self.lock();
        let id = self.system_update_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        tracing::info!("ContentDirectory: SystemUpdateID -> {}", id);
        id
    }

    /// Valeur de la variable d'état ContainerUpdateIDs
    ///
    /// Format UPnP `id,updateId,id,updateId,...`, trié par id, limité aux
    /// containers dont l'UpdateID est non nul.
    pub fn container_update_ids(&self) -> String {
        let state = self.lock();
        let mut entries: Vec<(ObjectId, u32)> = state
            .update_ids
            .iter()
            .filter(|(_, update_id)| **update_id > 0)
            .map(|(id, update_id)| (*id, *update_id))
            .collect();
        drop(state);

        entries.sort_unstable();
        entries
            .iter()
            .map(|(id, update_id)| format!("{},{}", id, update_id))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Date de modification en secondes entières depuis l'epoch
pub(crate) fn mtime_secs(modified: SystemTime) -> i64 {
    match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64) - 1,
    }
}
