//! # pmodidl - DIDL-Lite
//!
//! Modèle de document DIDL-Lite utilisé pour les réponses `Browse` du
//! ContentDirectory : sérialisation vers XML et relecture (tests, clients).
//!
//! Contrairement à un document à deux listes (containers puis items), les
//! objets sont conservés dans une séquence unique : l'ordre d'une réponse
//! `BrowseDirectChildren` (tri lexicographique des entrées d'un répertoire)
//! est ainsi préservé tel quel dans le XML produit.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

pub const DIDL_NAMESPACE: &str = "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/";
pub const UPNP_NAMESPACE: &str = "urn:schemas-upnp-org:metadata-1-0/upnp/";
pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";
pub const DLNA_NAMESPACE: &str = "urn:schemas-dlna-org:metadata-1-0/";

// ============= Couche d'abstraction générique =============

/// Trait pour tout parser de métadonnées média
pub trait MediaMetadataParser: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Parse une chaîne de métadonnées
    fn parse(input: &str) -> Result<Self, Self::Error>;

    /// Retourne le format du parser
    fn format_name() -> &'static str;
}

impl MediaMetadataParser for DIDLLite {
    type Error = quick_xml::de::DeError;

    fn parse(input: &str) -> Result<Self, Self::Error> {
        quick_xml::de::from_str(input)
    }

    fn format_name() -> &'static str {
        "DIDL-Lite"
    }
}

// ============= Structures DIDL-Lite =============

/// Racine d'un document DIDL-Lite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "DIDL-Lite")]
pub struct DIDLLite {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    #[serde(rename = "@xmlns:upnp", skip_serializing_if = "Option::is_none")]
    pub xmlns_upnp: Option<String>,

    #[serde(rename = "@xmlns:dc", skip_serializing_if = "Option::is_none")]
    pub xmlns_dc: Option<String>,

    #[serde(rename = "@xmlns:dlna", skip_serializing_if = "Option::is_none")]
    pub xmlns_dlna: Option<String>,

    /// Containers et items, dans l'ordre du document
    #[serde(rename = "$value", default)]
    pub objects: Vec<DidlObject>,
}

/// Un objet du document : container ou item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DidlObject {
    #[serde(rename = "container")]
    Container(Container),

    #[serde(rename = "item")]
    Item(Item),
}

/// Container (répertoire, racine de montage, racine du serveur)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@parentID")]
    pub parent_id: String,

    #[serde(rename = "@restricted", skip_serializing_if = "Option::is_none")]
    pub restricted: Option<String>,

    #[serde(rename = "@childCount", skip_serializing_if = "Option::is_none")]
    pub child_count: Option<String>,

    #[serde(rename = "dc:title", alias = "title")]
    pub title: String,

    #[serde(rename = "upnp:class", alias = "class")]
    pub class: String,
}

/// Item : un fichier exposé avec sa ressource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@parentID")]
    pub parent_id: String,

    #[serde(rename = "@restricted", skip_serializing_if = "Option::is_none")]
    pub restricted: Option<String>,

    #[serde(rename = "upnp:class", alias = "class")]
    pub class: String,

    #[serde(rename = "dc:title", alias = "title")]
    pub title: String,

    #[serde(
        rename = "dc:date",
        alias = "date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,

    #[serde(
        rename = "dc:creator",
        alias = "creator",
        skip_serializing_if = "Option::is_none"
    )]
    pub creator: Option<String>,

    #[serde(
        rename = "upnp:artist",
        alias = "artist",
        skip_serializing_if = "Option::is_none"
    )]
    pub artist: Option<String>,

    #[serde(
        rename = "upnp:genre",
        alias = "genre",
        skip_serializing_if = "Option::is_none"
    )]
    pub genre: Option<String>,

    #[serde(
        rename = "upnp:album",
        alias = "album",
        skip_serializing_if = "Option::is_none"
    )]
    pub album: Option<String>,

    #[serde(
        rename = "upnp:originalTrackNumber",
        alias = "originalTrackNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_track_number: Option<String>,

    #[serde(
        rename = "dc:publisher",
        alias = "publisher",
        skip_serializing_if = "Option::is_none"
    )]
    pub publisher: Option<String>,

    #[serde(rename = "res", default)]
    pub resources: Vec<Resource>,
}

/// Ressource média (`res`) : URL et attributs techniques
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "@protocolInfo")]
    pub protocol_info: String,

    #[serde(rename = "@size", skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(rename = "@duration", skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// Débit en octets par seconde
    #[serde(rename = "@bitrate", skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,

    #[serde(rename = "@sampleFrequency", skip_serializing_if = "Option::is_none")]
    pub sample_frequency: Option<String>,

    #[serde(rename = "@nrAudioChannels", skip_serializing_if = "Option::is_none")]
    pub nr_audio_channels: Option<String>,

    #[serde(rename = "@resolution", skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(rename = "@colorDepth", skip_serializing_if = "Option::is_none")]
    pub color_depth: Option<String>,

    #[serde(rename = "@bitsPerSample", skip_serializing_if = "Option::is_none")]
    pub bits_per_sample: Option<String>,

    #[serde(rename = "$text")]
    pub url: String,
}

// ============= Implémentation des méthodes =============

impl DIDLLite {
    /// Document vide avec les namespaces habituels (DIDL-Lite, upnp, dc, dlna)
    pub fn new() -> Self {
        Self::with_objects(Vec::new())
    }

    /// Document contenant `objects`, dans cet ordre
    pub fn with_objects(objects: Vec<DidlObject>) -> Self {
        Self {
            xmlns: DIDL_NAMESPACE.to_string(),
            xmlns_upnp: Some(UPNP_NAMESPACE.to_string()),
            xmlns_dc: Some(DC_NAMESPACE.to_string()),
            xmlns_dlna: Some(DLNA_NAMESPACE.to_string()),
            objects,
        }
    }

    /// Sérialise le document en XML
    pub fn to_xml(&self) -> Result<String, String> {
        quick_xml::se::to_string(self)
            .map_err(|e| format!("Failed to serialize DIDL-Lite: {}", e))
    }

    /// Nombre d'objets (containers + items)
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Itère sur les containers, dans l'ordre du document
    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.objects.iter().filter_map(|o| match o {
            DidlObject::Container(c) => Some(c),
            DidlObject::Item(_) => None,
        })
    }

    /// Itère sur les items, dans l'ordre du document
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.objects.iter().filter_map(|o| match o {
            DidlObject::Item(i) => Some(i),
            DidlObject::Container(_) => None,
        })
    }

    /// Trouve un container par ID
    pub fn get_container_by_id(&self, id: &str) -> Option<&Container> {
        self.containers().find(|c| c.id == id)
    }

    /// Trouve un item par ID
    pub fn get_item_by_id(&self, id: &str) -> Option<&Item> {
        self.items().find(|i| i.id == id)
    }

    /// Génère une représentation Markdown
    pub fn to_markdown(&self) -> String {
        let mut buf = String::new();
        buf.push_str("### DIDL-Lite Document\n\n");

        for object in &self.objects {
            match object {
                DidlObject::Container(c) => c.write_markdown(&mut buf),
                DidlObject::Item(i) => i.write_markdown(&mut buf),
            }
        }

        buf
    }
}

impl Default for DIDLLite {
    fn default() -> Self {
        Self::new()
    }
}

impl DidlObject {
    pub fn id(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.id,
            DidlObject::Item(i) => &i.id,
        }
    }

    pub fn parent_id(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.parent_id,
            DidlObject::Item(i) => &i.parent_id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.title,
            DidlObject::Item(i) => &i.title,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, DidlObject::Container(_))
    }
}

impl From<Container> for DidlObject {
    fn from(container: Container) -> Self {
        DidlObject::Container(container)
    }
}

impl From<Item> for DidlObject {
    fn from(item: Item) -> Self {
        DidlObject::Item(item)
    }
}

impl Container {
    fn write_markdown(&self, buf: &mut String) {
        let _ = writeln!(buf, "- **Container**: {}", self.title);
        let _ = writeln!(buf, "  - ID: `{}`", self.id);
        let _ = writeln!(buf, "  - ParentID: `{}`", self.parent_id);
        let _ = writeln!(buf, "  - Class: `{}`", self.class);
        if let Some(ref count) = self.child_count {
            let _ = writeln!(buf, "  - ChildCount: `{}`", count);
        }
        buf.push('\n');
    }
}

impl Item {
    /// Retourne la ressource principale (première disponible)
    pub fn primary_resource(&self) -> Option<&Resource> {
        self.resources.first()
    }

    /// Itère sur les métadonnées sous forme de paires clé-valeur
    pub fn metadata(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut pairs = vec![("title", self.title.as_str())];

        let optional = [
            ("date", &self.date),
            ("creator", &self.creator),
            ("artist", &self.artist),
            ("album", &self.album),
            ("genre", &self.genre),
            ("trackNumber", &self.original_track_number),
            ("publisher", &self.publisher),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                pairs.push((key, value.as_str()));
            }
        }

        pairs.into_iter()
    }

    fn write_markdown(&self, buf: &mut String) {
        let _ = writeln!(buf, "- **Item**: {}", self.title);
        let _ = writeln!(buf, "  - ID: `{}`", self.id);
        let _ = writeln!(buf, "  - ParentID: `{}`", self.parent_id);
        let _ = writeln!(buf, "  - Class: `{}`", self.class);

        for (key, value) in self.metadata().skip(1) {
            let _ = writeln!(buf, "  - {}: {}", key, value);
        }

        for res in &self.resources {
            let _ = writeln!(buf, "  - URL: {}", res.url);
            let _ = writeln!(buf, "    - Protocol: `{}`", res.protocol_info);
            if let Some(ref size) = res.size {
                let _ = writeln!(buf, "    - Size: `{}`", size);
            }
            if let Some(ref dur) = res.duration {
                let _ = writeln!(buf, "    - Duration: `{}`", dur);
            }
            if let Some(ref resolution) = res.resolution {
                let _ = writeln!(buf, "    - Resolution: `{}`", resolution);
            }
        }

        buf.push('\n');
    }
}
