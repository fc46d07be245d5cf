use super::{
    non_empty, AudioAttrs, ExtractedMetadata, ExtractionError, MediaAttrs, MetadataExtractor,
    MetadataOverrides,
};
use lofty::config::ParseOptions;
use lofty::id3::v1::GENRES;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use std::path::Path;
use std::time::Duration;

/// Tags et propriétés des fichiers audio, lus avec lofty
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioExtractor;

impl MetadataExtractor for AudioExtractor {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn handles(&self, mime: &str) -> bool {
        mime.starts_with("audio/") && mime != crate::mime::PLAYLIST_MIME
    }

    fn extract(&self, path: &Path) -> Result<ExtractedMetadata, ExtractionError> {
        let tagged_file = Probe::open(path)?
            .guess_file_type()?
            .options(ParseOptions::new())
            .read()?;

        let properties = tagged_file.properties();
        let attrs = AudioAttrs {
            bitrate_kbps: properties.audio_bitrate(),
            sample_rate: properties.sample_rate(),
            channels: properties.channels(),
            duration: Some(properties.duration()),
        };

        let overrides = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .map(overrides_from_tag)
            .unwrap_or_default();

        tracing::trace!(
            path = %path.display(),
            title = ?overrides.title,
            artist = ?overrides.creator,
            "Audio tags read"
        );

        Ok(ExtractedMetadata {
            overrides,
            attrs: MediaAttrs::Audio(attrs),
        })
    }
}

fn overrides_from_tag(tag: &Tag) -> MetadataOverrides {
    MetadataOverrides {
        title: tag.title().and_then(non_empty),
        date: tag.year().filter(|y| *y > 0).map(|y| format!("{:04}-01-01", y)),
        creator: tag.artist().and_then(non_empty),
        album: tag.album().and_then(non_empty),
        genre: tag.genre().and_then(non_empty).map(|g| genre_name(&g)),
        track_number: tag.track(),
        publisher: tag.get_string(&ItemKey::Publisher).and_then(non_empty),
    }
}

impl AudioAttrs {
    /// Débit en octets par seconde, dérivé des kbps (×128)
    pub fn bitrate_bytes(&self) -> Option<u64> {
        self.bitrate_kbps.map(|kbps| u64::from(kbps) * 128)
    }

    /// Attribut `duration` d'une ressource
    pub fn upnp_duration(&self) -> Option<String> {
        self.duration.map(format_duration)
    }
}

/// Résout les références numériques ID3v1 de la forme `(17)`
pub(crate) fn genre_name(genre: &str) -> String {
    genre
        .strip_prefix('(')
        .and_then(|g| g.strip_suffix(')'))
        .and_then(|n| n.parse::<usize>().ok())
        .and_then(|n| GENRES.get(n))
        .map(|name| name.to_string())
        .unwrap_or_else(|| genre.to_string())
}

/// Durée au format UPnP `H:MM:SS.FF` (centièmes tronqués)
pub(crate) fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!(
        "{}:{:02}:{:02}.{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60,
        duration.subsec_millis() / 10
    )
}
