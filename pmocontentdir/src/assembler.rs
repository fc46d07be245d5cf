//! Construction des enregistrements DIDL-Lite à partir du système de fichiers
//!
//! - la racine (id 0) a pour enfants les points de montage ;
//! - un répertoire devient un `container`, ses entrées (hors fichiers
//!   cachés) sont triées par nom et enregistrées sous lui ;
//! - un fichier devient un `item` avec une unique ressource HTTP.

use crate::error::{ContentDirectoryError, Result};
use crate::extractors::{file_title, ExtractedMetadata, ExtractorSet, MediaAttrs};
use crate::mime::{item_class, protocol_info, MimeTypes};
use crate::mounts::MountList;
use crate::registry::ObjectRegistry;
use crate::tracker::ChangeTracker;
use crate::url::UrlResolver;
use crate::{ObjectId, ROOT_ID, ROOT_NAME};
use pmodidl::{Container, DidlObject, Item, Resource};
use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

pub const CONTAINER_CLASS: &str = "object.container";

/// Un objet prêt à être sérialisé
pub type ResultRecord = DidlObject;

/// Entrées visibles d'un répertoire
///
/// `modified` est la plus récente des dates de modification du répertoire
/// et de ses entrées directes : modifier un fichier fait changer la version
/// du répertoire qui le contient. En contrepartie, chaque liste coûte un
/// `stat` par entrée, et un Browse des enfants en fait autant pour chaque
/// sous-répertoire listé, au lieu d'un seul `stat` du répertoire.
///
/// Les entrées gardent leurs noms bruts : seuls le titre et l'URL en
/// dérivent une forme texte.
#[derive(Debug)]
struct DirListing {
    entries: Vec<PathBuf>,
    modified: SystemTime,
}

fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().starts_with(b".")
}

fn list_directory(path: &Path, stat: &Metadata) -> io::Result<DirListing> {
    let mut modified = stat.modified()?;
    let mut entries = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if is_hidden(&entry.file_name()) {
            continue;
        }

        let entry_path = entry.path();
        if let Ok(entry_modified) = fs::metadata(&entry_path).and_then(|m| m.modified()) {
            modified = modified.max(entry_modified);
        }
        entries.push(entry_path);
    }

    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(DirListing { entries, modified })
}

pub struct ResultAssembler {
    registry: Arc<ObjectRegistry>,
    tracker: Arc<ChangeTracker>,
    mounts: Arc<MountList>,
    mimes: MimeTypes,
    extractors: ExtractorSet,
    urls: Arc<dyn UrlResolver>,
}

impl ResultAssembler {
    pub fn new(
        registry: Arc<ObjectRegistry>,
        tracker: Arc<ChangeTracker>,
        mounts: Arc<MountList>,
        extractors: ExtractorSet,
        urls: Arc<dyn UrlResolver>,
    ) -> Self {
        Self {
            registry,
            tracker,
            mounts,
            mimes: MimeTypes::new(),
            extractors,
            urls,
        }
    }

    /// Enregistrement décrivant l'objet `id` lui-même
    pub fn assemble_metadata(&self, id: ObjectId) -> Result<ResultRecord> {
        let path = self.registry.path_of(id)?;
        self.object_record(id, &path)
    }

    /// Enfants directs de `id` : `(nombre retourné, total, enregistrements)`
    ///
    /// Un item n'a pas d'enfants. Une entrée qui disparaît pendant la
    /// construction fait échouer toute la requête.
    pub fn assemble_children(&self, id: ObjectId) -> Result<(u32, u32, Vec<ResultRecord>)> {
        let path = self.registry.path_of(id)?;

        let children: Vec<(ObjectId, PathBuf)> = if id == ROOT_ID {
            self.mounts
                .snapshot()
                .into_iter()
                .map(|(mount_path, mount_id)| (mount_id, mount_path))
                .collect()
        } else {
            let dir = path.as_path();
            let stat =
                fs::metadata(dir).map_err(|e| ContentDirectoryError::unavailable(id, dir, e))?;
            if !stat.is_dir() {
                return Ok((0, 0, Vec::new()));
            }

            let listing = list_directory(dir, &stat)
                .map_err(|e| ContentDirectoryError::unavailable(id, dir, e))?;
            self.tracker.note_access(id, listing.modified);

            listing
                .entries
                .into_iter()
                .map(|child| (self.registry.resolve_or_register(&child, id), child))
                .collect()
        };

        let records = children
            .iter()
            .map(|(child_id, child_path)| self.object_record(*child_id, child_path))
            .collect::<Result<Vec<_>>>()?;

        let count = records.len() as u32;
        Ok((count, count, records))
    }

    fn object_record(&self, id: ObjectId, path: &Path) -> Result<ResultRecord> {
        if id == ROOT_ID {
            return Ok(self.container(id, ROOT_NAME.to_string(), self.mounts.len())?.into());
        }

        let stat = fs::metadata(path).map_err(|e| ContentDirectoryError::unavailable(id, path, e))?;
        let title = file_title(path);

        if stat.is_dir() {
            let listing = list_directory(path, &stat)
                .map_err(|e| ContentDirectoryError::unavailable(id, path, e))?;
            self.tracker.note_access(id, listing.modified);
            Ok(self.container(id, title, listing.entries.len())?.into())
        } else {
            Ok(self.item(id, path, title, &stat)?.into())
        }
    }

    fn parent_id(&self, id: ObjectId) -> Result<String> {
        Ok(match self.registry.parent_of(id)? {
            Some(parent) => parent.to_string(),
            None => "-1".to_string(),
        })
    }

    fn container(&self, id: ObjectId, title: String, child_count: usize) -> Result<Container> {
        Ok(Container {
            id: id.to_string(),
            parent_id: self.parent_id(id)?,
            restricted: Some("1".to_string()),
            child_count: Some(child_count.to_string()),
            title,
            class: CONTAINER_CLASS.to_string(),
        })
    }

    fn item(&self, id: ObjectId, path: &Path, title: String, stat: &Metadata) -> Result<Item> {
        let mime = self.mimes.mime_type(path);
        let ExtractedMetadata { overrides, attrs } = self.extractors.extract(&mime, path, stat);

        let mut resource = Resource {
            protocol_info: protocol_info(&mime),
            size: Some(stat.len().to_string()),
            url: self.resource_url(id, path)?,
            ..Default::default()
        };

        match attrs {
            MediaAttrs::Audio(audio) => {
                resource.bitrate = audio.bitrate_bytes().map(|b| b.to_string());
                resource.sample_frequency = audio.sample_rate.map(|s| s.to_string());
                resource.nr_audio_channels = audio.channels.map(|c| c.to_string());
                resource.duration = audio.upnp_duration();
            }
            MediaAttrs::Image(image) => {
                resource.resolution = Some(image.resolution());
                resource.color_depth = Some(image.color_depth.to_string());
                resource.bits_per_sample = Some(image.bits_per_sample.to_string());
            }
            MediaAttrs::None => {}
        }

        Ok(Item {
            id: id.to_string(),
            parent_id: self.parent_id(id)?,
            restricted: Some("1".to_string()),
            class: item_class(&mime).to_string(),
            title: overrides.title.unwrap_or(title),
            date: overrides.date,
            creator: overrides.creator.clone(),
            artist: overrides.creator,
            genre: overrides.genre,
            album: overrides.album,
            original_track_number: overrides.track_number.map(|n| n.to_string()),
            publisher: overrides.publisher,
            resources: vec![resource],
        })
    }

    /// URL de la ressource : `<montage>/<chemin relatif au montage>`
    ///
    /// Un objet dont le chemin n'est pas sous son point de montage n'a pas
    /// d'URL valide : il est signalé indisponible.
    fn resource_url(&self, id: ObjectId, path: &Path) -> Result<String> {
        let mount = self.registry.mount_root_of(id)?;
        let mount_path = self.registry.path_of(mount)?;

        let relative = path.strip_prefix(&mount_path).map_err(|_| {
            tracing::warn!(
                id,
                path = %path.display(),
                mount = %mount_path.display(),
                "Object outside of its mount point"
            );
            ContentDirectoryError::unavailable(id, path, "not under its mount point")
        })?;

        Ok(self.urls.build_url(mount, relative))
    }
}
