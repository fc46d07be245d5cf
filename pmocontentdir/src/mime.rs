//! Détection du type mime, classe UPnP et profil DLNA d'un fichier

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use lofty::file::FileType;
use lofty::probe::Probe;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const PLAYLIST_MIME: &str = "audio/x-mpegurl";

/// Cache des types mime, par chemin
///
/// Le premier type détecté pour un chemin est conservé pour toute la durée
/// de vie du service, même si le fichier est remplacé ensuite.
#[derive(Debug, Default)]
pub struct MimeTypes {
    cache: RwLock<HashMap<PathBuf, String>>,
}

impl MimeTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type mime de `path`, détecté une seule fois
    pub fn mime_type(&self, path: &Path) -> String {
        if let Some(mime) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return mime.clone();
        }

        let detected = detect_mime_type(path);

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_path_buf())
            .or_insert(detected)
            .clone()
    }
}

/// Détecte le type mime de `path` sans passer par le cache
///
/// Extension d'abord (avec deux cas particuliers, les playlists m3u et les
/// conteneurs Ogg), puis inspection du contenu quand l'extension est
/// inconnue.
pub fn detect_mime_type(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("m3u") => return PLAYLIST_MIME.to_string(),
        Some("ogg") | Some("oga") => return "audio/ogg".to_string(),
        _ => {}
    }

    if extension.is_some() {
        if let Some(mime) = mime_guess::from_path(path).first() {
            return mime.essence_str().to_string();
        }
    }

    sniff_mime_type(path).unwrap_or_else(|| OCTET_STREAM.to_string())
}

fn sniff_mime_type(path: &Path) -> Option<String> {
    let mut header = [0u8; 64];
    let read = File::open(path).and_then(|mut f| f.read(&mut header)).ok()?;
    if read == 0 {
        return None;
    }

    if let Ok(format) = image::guess_format(&header[..read]) {
        return Some(format.to_mime_type().to_string());
    }

    let file_type = Probe::open(path).ok()?.guess_file_type().ok()?.file_type()?;
    audio_mime(file_type).map(str::to_string)
}

fn audio_mime(file_type: FileType) -> Option<&'static str> {
    match file_type {
        FileType::Mpeg => Some("audio/mpeg"),
        FileType::Flac => Some("audio/flac"),
        FileType::Vorbis | FileType::Opus | FileType::Speex => Some("audio/ogg"),
        FileType::Mp4 => Some("audio/mp4"),
        FileType::Aac => Some("audio/aac"),
        FileType::Aiff => Some("audio/aiff"),
        FileType::Wav => Some("audio/wav"),
        FileType::WavPack => Some("audio/x-wavpack"),
        FileType::Ape => Some("audio/x-ape"),
        _ => None,
    }
}

/// Classe UPnP d'un item selon son type mime
pub fn item_class(mime: &str) -> &'static str {
    if mime == PLAYLIST_MIME {
        return "object.item.playlist";
    }

    match mime.split('/').next().unwrap_or_default() {
        "audio" => "object.item.audioItem",
        "image" => "object.item.imageItem",
        "text" => "object.item.textItem",
        "video" => "object.item.videoItem",
        _ => "object.item",
    }
}

/// Profil DLNA connu pour ce type mime
pub fn dlna_profile(mime: &str) -> Option<&'static str> {
    match mime {
        "audio/mpeg" => Some("DLNA.ORG_PN=MP3"),
        "image/jpeg" => Some("DLNA.ORG_PN=JPEG_LRG"),
        _ => None,
    }
}

/// Attribut `protocolInfo` d'une ressource servie en HTTP
pub fn protocol_info(mime: &str) -> String {
    match dlna_profile(mime) {
        Some(pn) => format!("http-get:*:{}:{};DLNA.ORG_OP=01;DLNA.ORG_CI=0", mime, pn),
        None => format!("http-get:*:{}:DLNA.ORG_OP=01;DLNA.ORG_CI=0", mime),
    }
}
