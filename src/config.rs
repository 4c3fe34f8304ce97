use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map},
    Error, Figment, Metadata, Profile, Provider,
};
use serde::{Deserialize, Serialize};

/// default directory and file names
pub const SOURCE_DIR: &str = "source";
pub const BUILD_DIR: &str = "build";
pub const SETTINGS_FILE: &str = "settings.yml";
pub const SETTINGS_TOML: &str = "clay.toml";
pub const ENV_PREFIX: &str = "CLAY_";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// the project settings, merged from defaults, `settings.yml`, `clay.toml`,
/// `CLAY_*` environment variables and command line flags (in that order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// patterns of files that are never built nor indexed
    pub exclude: Vec<String>,
    /// patterns that override `exclude` and the partials filter
    pub include: Vec<String>,
    /// drop html fragments (no doctype / `<html>`) from the build and the index
    pub filter_partials: bool,
    /// converters applied to matching source extensions
    pub pre_processors: Vec<String>,
    /// filters applied to every html output
    pub post_processors: Vec<String>,
    /// prepended to `template:` names given in markdown front matter
    pub theme_prefix: String,
    pub host: String,
    pub port: u16,
    /// overwrite copied files even when the destination is newer
    pub force: bool,
    /// everything else in the settings file, handed to the templates as is
    #[serde(flatten)]
    pub context: BTreeMap<String, serde_yml::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            include: Vec::new(),
            filter_partials: true,
            pre_processors: ["markdown", "scss", "less", "coffee"]
                .map(String::from)
                .to_vec(),
            post_processors: Vec::new(),
            theme_prefix: String::new(),
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            force: false,
            context: BTreeMap::new(),
        }
    }
}

/// values given on the command line, they win over everything else
#[derive(Debug, Default, Clone, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

impl Settings {
    pub fn figment() -> Figment {
        Figment::from(Self::default())
    }

    /// load the settings of the project at `root`
    ///
    /// a broken settings file is reported and replaced by the defaults
    pub fn load<T: AsRef<Path>>(root: T, overrides: &Overrides) -> Self {
        let root = root.as_ref();
        match Self::try_load(root, overrides) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("Ignoring the project settings: {err}");
                Self::figment()
                    .merge(Serialized::defaults(overrides))
                    .extract()
                    .unwrap_or_default()
            }
        }
    }

    pub fn try_load(root: &Path, overrides: &Overrides) -> crate::error::Result<Self> {
        let mut figment = Self::figment();
        let yaml = root.join(SETTINGS_FILE);
        if yaml.is_file() {
            figment = figment.merge(LegacySettings::file(yaml)?);
        }
        let settings = figment
            .merge(Toml::file(root.join(SETTINGS_TOML)))
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(overrides))
            .extract()?;
        Ok(settings)
    }

    /// the data handed to every template
    pub fn template_context(&self) -> minijinja::Value {
        minijinja::Value::from_serialize(&self.context)
    }
}

impl Provider for Settings {
    fn metadata(&self) -> Metadata {
        Metadata::named("Clay defaults")
    }
    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Serialized::defaults(self).data()
    }
}

/// `settings.yml` with its historical spellings (`FILTER`, `INCLUDE`,
/// `FILTER_PARTIALS`, `layouts-prefix`, ...) folded into the field names of
/// [`Settings`]. Keys that aren't settings keep their case.
#[derive(Debug)]
pub struct LegacySettings {
    path: PathBuf,
    values: BTreeMap<String, serde_yml::Value>,
}

impl LegacySettings {
    pub fn file(path: PathBuf) -> crate::error::Result<Self> {
        let source = fs::read_to_string(&path).map_err(crate::error::Error::with_path(&path))?;
        Self::parse(path, &source)
    }

    pub fn parse(path: PathBuf, source: &str) -> crate::error::Result<Self> {
        let raw: Option<BTreeMap<String, serde_yml::Value>> = serde_yml::from_str(source)?;
        let values = raw
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (normalize_key(&key), value))
            .collect();
        Ok(Self { path, values })
    }
}

impl Provider for LegacySettings {
    fn metadata(&self) -> Metadata {
        Metadata::named(format!("settings file `{}`", self.path.display()))
    }
    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Serialized::defaults(&self.values).data()
    }
}

pub fn normalize_key(key: &str) -> String {
    let folded = key.trim().to_lowercase().replace('-', "_");
    let canonical = match folded.as_str() {
        "filter" | "exclude" => "exclude",
        "include" => "include",
        "filter_partials" => "filter_partials",
        "pre_processors" | "processors" => "pre_processors",
        "post_processors" => "post_processors",
        "theme_prefix" | "layouts_prefix" => "theme_prefix",
        "host" => "host",
        "port" => "port",
        "force" => "force",
        _ => return key.to_string(),
    };
    canonical.to_string()
}
