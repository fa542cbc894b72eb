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

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Indexing mode of an index, derived from the `index.mode` setting.
pub const INDEX_MODE_SETTING: &str = "index.mode";

/// Comma-separated list of dimension field paths used to route documents in
/// time-series mode.
pub const ROUTING_PATH_SETTING: &str = "index.routing_path";

pub const NUMBER_OF_SHARDS_SETTING: &str = "index.number_of_shards";

pub const NUMBER_OF_REPLICAS_SETTING: &str = "index.number_of_replicas";

pub const HIDDEN_SETTING: &str = "index.hidden";

pub const TIME_SERIES_START_TIME_SETTING: &str = "index.time_series.start_time";

pub const TIME_SERIES_END_TIME_SETTING: &str = "index.time_series.end_time";

/// A sparse map of index-scoped settings.
///
/// Absent keys are "unset", not "default": composition layers only ever
/// override keys they explicitly carry, and defaults are applied by the
/// consumers of the final, fully composed settings.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexSettings(BTreeMap<String, JsonValue>);

impl IndexSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Chainable variant of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(JsonValue::as_str)
    }

    /// Returns the setting as a `u32`, accepting both JSON numbers and
    /// numeric strings.
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        match self.0.get(key)? {
            JsonValue::Number(number) => number.as_u64().and_then(|value| value.try_into().ok()),
            JsonValue::String(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            JsonValue::Bool(value) => Some(*value),
            JsonValue::String(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    /// Returns a new settings map where `other`'s keys win key-for-key over
    /// `self`'s.
    pub fn overlay(&self, other: &IndexSettings) -> IndexSettings {
        let mut merged = self.0.clone();
        for (key, value) in &other.0 {
            merged.insert(key.clone(), value.clone());
        }
        IndexSettings(merged)
    }

    /// Indexing mode carried by these settings. Unset or unparseable modes
    /// degrade to [`IndexMode::Standard`]; the settings validator is the
    /// gate that rejects unparseable values.
    pub fn index_mode(&self) -> IndexMode {
        self.get_str(INDEX_MODE_SETTING)
            .and_then(|mode| mode.parse().ok())
            .unwrap_or_default()
    }
}

impl FromIterator<(String, JsonValue)> for IndexSettings {
    fn from_iter<T: IntoIterator<Item = (String, JsonValue)>>(iter: T) -> Self {
        IndexSettings(iter.into_iter().collect())
    }
}

/// Indexing mode of an index.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    #[default]
    Standard,
    TimeSeries,
}

impl IndexMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexMode::Standard => "standard",
            IndexMode::TimeSeries => "time_series",
        }
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for IndexMode {
    type Err = anyhow::Error;

    fn from_str(mode_str: &str) -> anyhow::Result<Self> {
        match mode_str {
            "standard" => Ok(IndexMode::Standard),
            "time_series" => Ok(IndexMode::TimeSeries),
            _ => anyhow::bail!("unknown index mode `{mode_str}`"),
        }
    }
}

/// A setting rejected by a settings validator, with the reason.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("`{key}`: {reason}")]
pub struct InvalidSetting {
    pub key: String,
    pub reason: String,
}

impl InvalidSetting {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Schema validation boundary for index-scoped settings.
///
/// The cluster embedding this core supplies the authoritative registry of
/// known settings; [`DefaultSettingsValidator`] covers the settings this core
/// itself interprets.
pub trait IndexSettingsValidator: Send + Sync {
    /// Returns every unknown or invalid setting, not just the first one.
    fn validate(&self, settings: &IndexSettings) -> Result<(), Vec<InvalidSetting>>;
}

/// Registry-backed validator for the index-scoped settings this core
/// interprets, including cross-setting rules.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSettingsValidator;

impl DefaultSettingsValidator {
    fn validate_setting(key: &str, value: &JsonValue) -> Result<(), String> {
        match key {
            NUMBER_OF_SHARDS_SETTING => match as_u32(value) {
                Some(num_shards) if num_shards >= 1 => Ok(()),
                _ => Err("expected a positive integer".to_string()),
            },
            NUMBER_OF_REPLICAS_SETTING => match as_u32(value) {
                Some(_) => Ok(()),
                None => Err("expected a non-negative integer".to_string()),
            },
            INDEX_MODE_SETTING => match value.as_str() {
                Some(mode_str) => mode_str
                    .parse::<IndexMode>()
                    .map(|_| ())
                    .map_err(|error| error.to_string()),
                None => Err("expected a string".to_string()),
            },
            ROUTING_PATH_SETTING => match value.as_str() {
                Some(routing_path) if !routing_path.trim().is_empty() => Ok(()),
                Some(_) => Err("expected a non-empty field path list".to_string()),
                None => Err("expected a string".to_string()),
            },
            HIDDEN_SETTING => match value {
                JsonValue::Bool(_) => Ok(()),
                JsonValue::String(value) if value.parse::<bool>().is_ok() => Ok(()),
                _ => Err("expected a boolean".to_string()),
            },
            TIME_SERIES_START_TIME_SETTING | TIME_SERIES_END_TIME_SETTING => {
                match value.as_str() {
                    Some(timestamp) => OffsetDateTime::parse(timestamp, &Rfc3339)
                        .map(|_| ())
                        .map_err(|_| "expected an RFC 3339 timestamp".to_string()),
                    None => Err("expected an RFC 3339 timestamp string".to_string()),
                }
            }
            _ => Err("unknown index setting".to_string()),
        }
    }
}

impl IndexSettingsValidator for DefaultSettingsValidator {
    fn validate(&self, settings: &IndexSettings) -> Result<(), Vec<InvalidSetting>> {
        let mut violations: Vec<InvalidSetting> = Vec::new();

        for (key, value) in settings.iter() {
            if let Err(reason) = Self::validate_setting(key, value) {
                violations.push(InvalidSetting::new(key.as_str(), reason));
            }
        }
        if settings.contains_key(ROUTING_PATH_SETTING)
            && settings.index_mode() != IndexMode::TimeSeries
        {
            violations.push(InvalidSetting::new(
                ROUTING_PATH_SETTING,
                format!("requires `{INDEX_MODE_SETTING}: time_series`"),
            ));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn as_u32(value: &JsonValue) -> Option<u32> {
    match value {
        JsonValue::Number(number) => number.as_u64().and_then(|value| value.try_into().ok()),
        JsonValue::String(value) => value.parse().ok(),
        _ => None,
    }
}
