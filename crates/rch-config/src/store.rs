//! ---
//! rch_section: "02-configuration"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "JSON bundle store backing host and component configuration."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use rch_common::error::codes;
use rch_common::{HostError, HostResult, Messages};

/// Bundle loaded when no name is requested or the requested one is absent.
pub const DEFAULT_BUNDLE: &str = "default";

/// File extension bundle files carry inside the store directory.
pub const BUNDLE_EXTENSION: &str = "rch";

/// Store directory used when the host is not told otherwise.
pub const DEFAULT_DIRECTORY: &str = "config";

/// Ordered map of lowercased section names to raw section values.
pub type SectionMap = IndexMap<String, serde_json::Value>;

/// The bundle store: a directory of `*.rch` JSON files plus the currently
/// selected bundle's sections.
///
/// One store instance serves the whole host; interior locking keeps
/// selection atomic, so readers either see the previous bundle in full or
/// the new one in full, never a mix.
#[derive(Debug)]
pub struct BundleStore {
    directory: PathBuf,
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    active: Option<String>,
    sections: SectionMap,
}

impl Default for BundleStore {
    fn default() -> Self {
        Self::new(DEFAULT_DIRECTORY)
    }
}

impl BundleStore {
    /// Create a store over the given directory. Nothing is read until a
    /// bundle is selected.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Directory this store reads bundles from.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Name of the currently selected bundle, if any.
    pub fn active(&self) -> Option<String> {
        self.inner.read().active.clone()
    }

    /// Load the named bundle and replace the active section map wholesale.
    pub fn select(&self, name: &str) -> HostResult<()> {
        let path = self.bundle_path(name);
        let sections = load_sections(&path, name)?;
        let mut inner = self.inner.write();
        inner.active = Some(name.to_owned());
        inner.sections = sections;
        debug!(
            bundle = %name,
            path = %path.display(),
            sections = inner.sections.len(),
            "bundle selected"
        );
        Ok(())
    }

    /// Select the requested bundle, falling back to [`DEFAULT_BUNDLE`] when
    /// no name is given or the named bundle cannot be loaded. Returns the
    /// name that ended up active.
    pub fn select_or_default(&self, name: Option<&str>) -> HostResult<String> {
        if let Some(requested) = name {
            match self.select(requested) {
                Ok(()) => return Ok(requested.to_owned()),
                Err(err) => warn!(
                    bundle = %requested,
                    error = %err,
                    "requested bundle unavailable, falling back to `{DEFAULT_BUNDLE}`"
                ),
            }
        }
        self.select(DEFAULT_BUNDLE)?;
        Ok(DEFAULT_BUNDLE.to_owned())
    }

    /// Fetch one section as raw JSON. The name is matched
    /// case-insensitively; a miss is a configuration error naming the
    /// section and the active bundle.
    pub fn section_raw(&self, name: &str) -> HostResult<serde_json::Value> {
        let key = name.to_lowercase();
        let inner = self.inner.read();
        let bundle = inner.active.as_deref().unwrap_or("<none>");
        match inner.sections.get(&key) {
            Some(value) => Ok(value.clone()),
            None => Err(HostError::configuration(
                codes::SECTION_MISSING,
                Messages::new(
                    format!("section `{key}` missing from bundle `{bundle}`"),
                    format!("section `{key}` missing"),
                    format!("add a `{key}` section to `{bundle}.{BUNDLE_EXTENSION}`"),
                    "a required configuration section is missing".to_owned(),
                ),
            )),
        }
    }

    /// Fetch one section decoded as `T`.
    pub fn section<T: DeserializeOwned>(&self, name: &str) -> HostResult<T> {
        let raw = self.section_raw(name)?;
        let bundle = self.active().unwrap_or_else(|| "<none>".to_owned());
        let key = name.to_lowercase();
        serde_json::from_value(raw).map_err(|err| {
            HostError::configuration_with(
                codes::SECTION_MALFORMED,
                Messages::new(
                    format!("section `{key}` of bundle `{bundle}` is malformed: {err}"),
                    format!("section `{key}` malformed"),
                    format!("fix the `{key}` section in `{bundle}.{BUNDLE_EXTENSION}`"),
                    "a configuration section could not be understood".to_owned(),
                ),
                anyhow::Error::new(err),
            )
        })
    }

    /// True when the active bundle carries the named section.
    pub fn has_section(&self, name: &str) -> bool {
        self.inner.read().sections.contains_key(&name.to_lowercase())
    }

    /// Section names of the active bundle in file order.
    pub fn section_names(&self) -> Vec<String> {
        self.inner.read().sections.keys().cloned().collect()
    }

    /// Names of every bundle available in the store directory, sorted.
    pub fn bundles(&self) -> HostResult<Vec<String>> {
        let entries = fs::read_dir(&self.directory).map_err(|err| {
            store_unreadable(&self.directory, anyhow::Error::new(err))
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|err| store_unreadable(&self.directory, anyhow::Error::new(err)))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(BUNDLE_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    names.push(stem.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn bundle_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.{BUNDLE_EXTENSION}"))
    }
}

fn store_unreadable(directory: &Path, source: anyhow::Error) -> HostError {
    HostError::configuration_with(
        codes::BUNDLE_LOAD_FAILED,
        Messages::new(
            format!("bundle store {} could not be read", directory.display()),
            "bundle store unreadable",
            format!("check that {} exists and is readable", directory.display()),
            "the configuration store could not be read".to_owned(),
        ),
        source,
    )
}

fn load_sections(path: &Path, bundle: &str) -> HostResult<SectionMap> {
    let contents = fs::read_to_string(path).map_err(|err| {
        HostError::configuration_with(
            codes::BUNDLE_LOAD_FAILED,
            Messages::new(
                format!("bundle `{bundle}` could not be read from {}", path.display()),
                format!("bundle `{bundle}` unavailable"),
                format!("place `{bundle}.{BUNDLE_EXTENSION}` in the store directory"),
                format!("the configuration profile `{bundle}` could not be loaded"),
            ),
            anyhow::Error::new(err),
        )
    })?;
    let value: serde_json::Value = serde_json::from_str(&contents).map_err(|err| {
        HostError::configuration_with(
            codes::BUNDLE_LOAD_FAILED,
            Messages::new(
                format!("bundle `{bundle}` is not valid JSON: {err}"),
                format!("bundle `{bundle}` unparseable"),
                format!("fix the JSON syntax of `{bundle}.{BUNDLE_EXTENSION}`"),
                format!("the configuration profile `{bundle}` could not be loaded"),
            ),
            anyhow::Error::new(err),
        )
    })?;
    let object = match value {
        serde_json::Value::Object(object) => object,
        other => {
            return Err(HostError::configuration(
                codes::BUNDLE_LOAD_FAILED,
                Messages::new(
                    format!(
                        "bundle `{bundle}` must be a JSON object of sections, found {}",
                        json_kind(&other)
                    ),
                    format!("bundle `{bundle}` has the wrong shape"),
                    "a bundle file is one JSON object keyed by section name".to_owned(),
                    format!("the configuration profile `{bundle}` could not be loaded"),
                ),
            ))
        }
    };
    // Later duplicates win once keys collapse to lowercase, matching a
    // plain map insert.
    let mut sections = SectionMap::with_capacity(object.len());
    for (key, value) in object {
        sections.insert(key.to_lowercase(), value);
    }
    Ok(sections)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
