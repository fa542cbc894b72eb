// Copyright 2024-Present Metatide, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration units of the Metatide control plane: index templates,
//! component templates, index settings, and compiled mappings, together with
//! their shape validation and user-facing (de)serialization.

use std::str::FromStr;

use anyhow::{bail, Context};
use json_comments::StripComments;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::warn;

mod index_settings;
mod mapping;
mod template_config;

pub use index_settings::{
    DefaultSettingsValidator, IndexMode, IndexSettings, IndexSettingsValidator, InvalidSetting,
    HIDDEN_SETTING, INDEX_MODE_SETTING, NUMBER_OF_REPLICAS_SETTING, NUMBER_OF_SHARDS_SETTING,
    ROUTING_PATH_SETTING, TIME_SERIES_END_TIME_SETTING, TIME_SERIES_START_TIME_SETTING,
};
pub use mapping::{
    CompiledMapping, FieldMapping, JsonMappingCompiler, MappingCompiler, MappingConflict,
};
pub use template_config::serialize::{
    load_component_template_from_user_config, load_index_template_from_user_config,
};
pub use template_config::{
    AliasDefinition, ComponentTemplate, DataStreamTemplate, IndexTemplate, TemplateBundle,
};

/// Index template identifier.
pub type TemplateId = String;

/// Component template identifier.
pub type ComponentTemplateId = String;

/// Index identifier.
pub type IndexId = String;

/// Checks whether an identifier conforms to Metatide object naming conventions.
pub fn validate_identifier(label: &str, value: &str) -> anyhow::Result<()> {
    static IDENTIFIER_REGEX: OnceCell<Regex> = OnceCell::new();

    if IDENTIFIER_REGEX
        .get_or_init(|| {
            Regex::new(r"^[a-zA-Z][a-zA-Z0-9-_\.]{2,254}$")
                .expect("regular expression should compile")
        })
        .is_match(value)
    {
        return Ok(());
    }
    bail!(
        "{label} identifier `{value}` is invalid: identifiers must match the following regular \
         expression: `^[a-zA-Z][a-zA-Z0-9-_\\.]{{2,254}}$`"
    );
}

/// Checks whether an index name pattern conforms to Metatide conventions.
/// Index name patterns accept the same characters as identifiers AND accept
/// `*` chars to allow for glob-like patterns, plus a single leading `-` to
/// mark an exclusion pattern.
pub fn validate_index_name_pattern(pattern: &str) -> anyhow::Result<()> {
    static PATTERN_REGEX: OnceCell<Regex> = OnceCell::new();

    let positive_pattern = pattern.strip_prefix('-').unwrap_or(pattern);

    if !PATTERN_REGEX
        .get_or_init(|| {
            Regex::new(r"^[a-zA-Z\*][a-zA-Z0-9-_\.\*]{0,254}$")
                .expect("regular expression should compile")
        })
        .is_match(positive_pattern)
    {
        bail!(
            "index name pattern `{pattern}` is invalid: patterns must match the following \
             regular expression: `^[a-zA-Z\\*][a-zA-Z0-9-_\\.\\*]{{0,254}}$`"
        );
    }
    // Multiple consecutive stars bring no additional expressiveness.
    if positive_pattern.contains("**") {
        bail!(
            "index name pattern `{pattern}` is invalid: patterns must not contain multiple \
             consecutive `*`"
        );
    }
    if !positive_pattern.contains('*') && positive_pattern.len() < 3 {
        bail!(
            "index name pattern `{pattern}` is invalid: an exact index name must have at least 3 \
             characters"
        );
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Yaml => "yaml",
        }
    }

    pub fn sniff_from_path(path: &std::path::Path) -> anyhow::Result<ConfigFormat> {
        let extension_str: &str = path
            .extension()
            .and_then(|extension| extension.to_str())
            .with_context(|| {
                format!(
                    "failed to read config file `{}`: file extension is missing; supported file \
                     formats and extensions are JSON (.json), TOML (.toml), and YAML (.yaml or \
                     .yml)",
                    path.display()
                )
            })?;
        ConfigFormat::from_str(extension_str).with_context(|| {
            format!(
                "failed to identify configuration file format `{}`",
                path.display()
            )
        })
    }

    pub fn parse<T>(&self, payload: &[u8]) -> anyhow::Result<T>
    where T: DeserializeOwned {
        match self {
            ConfigFormat::Json => {
                let mut json_value: JsonValue =
                    serde_json::from_reader(StripComments::new(payload))?;
                let version_value = json_value.get_mut("version").context("missing `version`")?;
                if let Some(version_number) = version_value.as_u64() {
                    warn!("`version` is supposed to be a string");
                    *version_value = JsonValue::String(version_number.to_string());
                }
                serde_json::from_value(json_value).context("failed to parse JSON config file")
            }
            ConfigFormat::Toml => {
                let payload_str = std::str::from_utf8(payload)
                    .context("config file contains invalid UTF-8 characters")?;
                let mut toml_value: toml::Value =
                    toml::from_str(payload_str).context("failed to parse TOML config file")?;
                let version_value = toml_value.get_mut("version").context("missing `version`")?;
                if let Some(version_number) = version_value.as_integer() {
                    warn!("`version` is supposed to be a string");
                    *version_value = toml::Value::String(version_number.to_string());
                    let reserialized = toml::to_string(&toml_value)
                        .context("failed to reserialize TOML config")?;
                    toml::from_str(&reserialized).context("failed to parse TOML config file")
                } else {
                    toml::from_str(payload_str).context("failed to parse TOML config file")
                }
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_slice(payload).context("failed to parse YAML config file")
            }
        }
    }
}

impl FromStr for ConfigFormat {
    type Err = anyhow::Error;

    fn from_str(ext: &str) -> anyhow::Result<Self> {
        match ext {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => bail!(
                "file extension `.{ext}` is not supported; supported file formats and extensions \
                 are JSON (.json), TOML (.toml), and YAML (.yaml or .yml)",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_identifier, validate_index_name_pattern};

    #[test]
    fn test_validate_identifier() {
        validate_identifier("template", "").unwrap_err();
        validate_identifier("template", "-").unwrap_err();
        validate_identifier("template", "_").unwrap_err();
        validate_identifier("template", "f").unwrap_err();
        validate_identifier("template", "fo").unwrap_err();
        validate_identifier("template", "_foo").unwrap_err();
        validate_identifier("template", ".foo.bar").unwrap_err();
        validate_identifier("template", "foo").unwrap();
        validate_identifier("template", "f-_").unwrap();
        validate_identifier("template", "foo.bar").unwrap();

        assert!(validate_identifier("component", "foo!")
            .unwrap_err()
            .to_string()
            .contains("component identifier `foo!` is invalid"));
    }

    #[test]
    fn test_validate_index_name_pattern() {
        validate_index_name_pattern("*").unwrap();
        validate_index_name_pattern("logs.*").unwrap();
        validate_index_name_pattern("logs-*-*").unwrap();
        validate_index_name_pattern("-logs-internal").unwrap();
        validate_index_name_pattern("ab").unwrap_err();
        validate_index_name_pattern("").unwrap_err();
        validate_index_name_pattern("**").unwrap_err();
        assert!(validate_index_name_pattern("foo!")
            .unwrap_err()
            .to_string()
            .contains("index name pattern `foo!` is invalid"));
    }
}
