//! Construction des URLs de ressources

use crate::ObjectId;
use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Debug;
use std::path::{Component, Path};

/// Caractères laissés tels quels dans un segment de chemin
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',');

/// Fabrique l'URL HTTP d'une ressource à partir de son point de montage et
/// de son chemin relatif à celui-ci
///
/// L'URL a la forme `<préfixe>/<id du point de montage>/<chemin dans le
/// montage>`.
pub trait UrlResolver: Send + Sync + Debug {
    fn build_url(&self, mount: ObjectId, relative_path: &Path) -> String;
}

/// Résolveur par défaut : URL de base du serveur + chemin du service
#[derive(Debug, Clone)]
pub struct BaseUrlResolver {
    prefix: String,
}

impl BaseUrlResolver {
    pub fn new(base_url: &str, service_path: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let service = service_path.trim_matches('/');

        let prefix = if service.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, service)
        };

        Self { prefix }
    }

    pub fn from_config(config: &pmoconfig::Config) -> Self {
        Self::new(&config.get_base_url(), &config.get_service_path())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl UrlResolver for BaseUrlResolver {
    /// Les octets des noms sont encodés tels quels : un nom qui n'est pas de
    /// l'UTF-8 valide garde une URL qui désigne le bon fichier.
    fn build_url(&self, mount: ObjectId, relative_path: &Path) -> String {
        let mut url = format!("{}/{}", self.prefix, mount);
        for component in relative_path.components() {
            if let Component::Normal(segment) = component {
                url.push('/');
                url.extend(percent_encode(segment.as_encoded_bytes(), SEGMENT));
            }
        }
        url
    }
}
