use super::{
    non_empty, ExtractedMetadata, ExtractionError, ImageAttrs, MediaAttrs, MetadataExtractor,
    MetadataOverrides,
};
use chrono::{Local, NaiveDate, SecondsFormat, TimeZone};
use exif::{In, Tag, Value};
use image::{ImageDecoder, ImageFormat, ImageReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Dimensions et profondeur de couleur des images
///
/// Seul l'en-tête est décodé ; les pixels ne sont jamais chargés. Pour les
/// JPEG et TIFF, les champs EXIF `DateTimeOriginal`, `ImageDescription` et
/// `Artist` remplacent la date, le titre et l'auteur.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageExtractor;

impl MetadataExtractor for ImageExtractor {
    fn name(&self) -> &'static str {
        "image"
    }

    fn handles(&self, mime: &str) -> bool {
        mime.starts_with("image/")
    }

    fn extract(&self, path: &Path) -> Result<ExtractedMetadata, ExtractionError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let has_exif = matches!(reader.format(), Some(ImageFormat::Jpeg | ImageFormat::Tiff));
        let decoder = reader.into_decoder()?;

        let (width, height) = decoder.dimensions();
        let color = decoder.color_type();
        let color_depth = color.bits_per_pixel();
        let channels = u16::from(color.channel_count().max(1));

        let overrides = if has_exif {
            // une image sans EXIF garde ses attributs
            exif_overrides(path).unwrap_or_else(|e| {
                tracing::trace!(path = %path.display(), error = %e, "No EXIF data");
                MetadataOverrides::default()
            })
        } else {
            MetadataOverrides::default()
        };

        Ok(ExtractedMetadata {
            overrides,
            attrs: MediaAttrs::Image(ImageAttrs {
                width,
                height,
                color_depth,
                bits_per_sample: color_depth / channels,
            }),
        })
    }
}

fn exif_overrides(path: &Path) -> Result<MetadataOverrides, ExtractionError> {
    let mut reader = BufReader::new(File::open(path)?);
    let exif = exif::Reader::new().read_from_container(&mut reader)?;

    let text = |tag: Tag| {
        ascii(&exif, tag).and_then(|raw| non_empty(String::from_utf8_lossy(raw)))
    };

    Ok(MetadataOverrides {
        title: text(Tag::ImageDescription),
        date: ascii(&exif, Tag::DateTimeOriginal).and_then(exif_date),
        creator: text(Tag::Artist),
        ..Default::default()
    })
}

fn ascii(exif: &exif::Exif, tag: Tag) -> Option<&[u8]> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => parts.first().map(Vec::as_slice),
        _ => None,
    }
}

/// `AAAA:MM:JJ HH:MM:SS` (heure locale de la prise de vue) en RFC 3339
fn exif_date(raw: &[u8]) -> Option<String> {
    let taken = exif::DateTime::from_ascii(raw).ok()?;
    let naive = NaiveDate::from_ymd_opt(
        i32::from(taken.year),
        u32::from(taken.month),
        u32::from(taken.day),
    )?
    .and_hms_opt(
        u32::from(taken.hour),
        u32::from(taken.minute),
        u32::from(taken.second),
    )?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|date| date.to_rfc3339_opts(SecondsFormat::Secs, false))
}

impl ImageAttrs {
    /// Attribut `resolution` d'une ressource : `LARGEURxHAUTEUR`
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
