// ─── Package Manifest ───
// Reads the identity block out of an unpacked package's AppxManifest.xml.

use std::path::Path;

use serde::Deserialize;

use crate::core::error::RegistrationError;

pub const MANIFEST_FILE: &str = "AppxManifest.xml";

#[derive(Debug, Deserialize)]
struct PackageManifest {
    #[serde(rename = "Identity")]
    identity: PackageIdentity,
}

/// `<Identity Name=".." Version=".." Publisher=".." ProcessorArchitecture=".."/>`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageIdentity {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Version")]
    pub version: String,
    #[serde(rename = "@Publisher", default)]
    pub publisher: Option<String>,
    #[serde(rename = "@ProcessorArchitecture", default)]
    pub architecture: Option<String>,
}

pub fn parse_identity(xml: &str) -> Result<PackageIdentity, quick_xml::DeError> {
    quick_xml::de::from_str::<PackageManifest>(xml).map(|manifest| manifest.identity)
}

pub async fn read_identity(path: &Path) -> Result<PackageIdentity, RegistrationError> {
    let xml = match tokio::fs::read_to_string(path).await {
        Ok(xml) => xml,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(RegistrationError::ManifestMissing(path.to_path_buf()))
        }
        Err(err) => {
            return Err(RegistrationError::ManifestInvalid {
                path: path.to_path_buf(),
                message: err.to_string(),
            })
        }
    };

    parse_identity(&xml).map_err(|err| RegistrationError::ManifestInvalid {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
