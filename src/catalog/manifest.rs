//! Firmware versions and their declared build options

use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// One configurable build option as declared by the firmware's options file.
///
/// The shape is owned by the firmware repository; brewbot only stores the
/// object and serves it back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionDescriptor(pub Map<String, Value>);

/// Version tag to option descriptors, for every version whose options
/// file existed and parsed.
///
/// Built once per refresh cycle and published whole; there is no API for
/// modifying a manifest after construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OptionsManifest {
    versions: BTreeMap<String, Vec<OptionDescriptor>>,
}

impl OptionsManifest {
    pub fn contains(&self, version: &str) -> bool {
        self.versions.contains_key(version)
    }

    pub fn get(&self, version: &str) -> Option<&[OptionDescriptor]> {
        self.versions.get(version).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Version tags in lexical order
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    /// Version tags ordered by semantic version, newest first
    pub fn newest_first(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.versions().collect();
        tags.sort_by(|a, b| {
            let va = parse_version_tag(a);
            let vb = parse_version_tag(b);
            vb.cmp(&va).then_with(|| b.cmp(a))
        });
        tags
    }

    /// The `BuildVersion` radio selector listing every known version.
    ///
    /// Clients render it ahead of the per-version options so the user can
    /// pick which firmware release to build.
    pub fn version_selector(&self) -> Value {
        let options: Vec<Value> = self
            .newest_first()
            .into_iter()
            .map(|tag| json!({ "optName": tag, "name": tag }))
            .collect();

        json!([{
            "type": "radio",
            "id": crate::build::VERSION_FIELD,
            "title": "Firmware Version",
            "description": "Select the firmware version you want to install on your BrewTroller Board",
            "options": options,
        }])
    }
}

impl FromIterator<(String, Vec<OptionDescriptor>)> for OptionsManifest {
    fn from_iter<I: IntoIterator<Item = (String, Vec<OptionDescriptor>)>>(iter: I) -> Self {
        Self {
            versions: iter.into_iter().collect(),
        }
    }
}

/// Parse an options file: a JSON array of option objects
pub fn parse_descriptors(content: &[u8]) -> serde_json::Result<Vec<OptionDescriptor>> {
    serde_json::from_slice(content)
}

/// Parse a `v<major>.<minor>.<patch>` tag, returning `None` for anything else
pub fn parse_version_tag(tag: &str) -> Option<Version> {
    tag.strip_prefix('v')
        .and_then(|v| Version::parse(v).ok())
}
