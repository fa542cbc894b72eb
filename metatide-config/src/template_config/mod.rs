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

pub(crate) mod serialize;

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::template_config::serialize::{VersionedComponentTemplate, VersionedIndexTemplate};
use crate::{
    validate_identifier, validate_index_name_pattern, CompiledMapping, ComponentTemplateId,
    IndexSettings, MappingConflict, TemplateId,
};

/// An alias attached to indices created from a template.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AliasDefinition {
    #[serde(default)]
    pub is_write_alias: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<String>,
}

/// The settings/mapping/alias bundle carried by templates.
///
/// Immutable value; composition goes through [`overlay`](Self::overlay).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TemplateBundle {
    #[serde(default, skip_serializing_if = "IndexSettings::is_empty")]
    pub settings: IndexSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<CompiledMapping>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, AliasDefinition>,
}

impl TemplateBundle {
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty() && self.mapping.is_none() && self.aliases.is_empty()
    }

    /// Overlays `other` on top of `self`: settings key-for-key, mappings
    /// deep-merged, aliases unioned by name — `other` wins everywhere except
    /// that a mapping field-type clash is a hard error.
    pub fn overlay(&self, other: &TemplateBundle) -> Result<TemplateBundle, MappingConflict> {
        let settings = self.settings.overlay(&other.settings);
        let mapping = match (&self.mapping, &other.mapping) {
            (Some(left), Some(right)) => Some(left.merge(right)?),
            (Some(mapping), None) | (None, Some(mapping)) => Some(mapping.clone()),
            (None, None) => None,
        };
        let mut aliases = self.aliases.clone();
        for (alias_name, alias) in &other.aliases {
            aliases.insert(alias_name.clone(), alias.clone());
        }
        Ok(TemplateBundle {
            settings,
            mapping,
            aliases,
        })
    }
}

/// Marks a template as backing a data stream.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DataStreamTemplate {
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub allow_custom_routing: bool,
}

/// A named, versioned, priority-ranked configuration unit matched against
/// index names by glob patterns.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "VersionedIndexTemplate")]
#[serde(try_from = "VersionedIndexTemplate")]
pub struct IndexTemplate {
    pub template_id: TemplateId,
    pub index_patterns: Vec<String>,
    pub template: Option<TemplateBundle>,
    /// Ordered list of component templates composed under the inline bundle;
    /// later entries override earlier ones.
    pub composed_of: Vec<ComponentTemplateId>,
    /// Tie-breaker between pattern matches: higher wins. Never part of the
    /// template's identity.
    pub priority: u32,
    pub version: Option<u64>,
    pub data_stream: Option<DataStreamTemplate>,
    pub metadata: Option<BTreeMap<String, JsonValue>>,
}

impl IndexTemplate {
    /// Validates the template's shape: identifier, pattern list, pattern
    /// syntax. Referential checks against a concrete metadata snapshot are
    /// the mutation service's concern.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_identifier("template", &self.template_id)?;

        if self.index_patterns.is_empty() {
            bail!("template `{}` must declare at least one index pattern", self.template_id);
        }
        for pattern in &self.index_patterns {
            validate_index_name_pattern(pattern)
                .with_context(|| format!("invalid pattern in template `{}`", self.template_id))?;
        }
        if !self
            .index_patterns
            .iter()
            .any(|pattern| !pattern.starts_with('-'))
        {
            bail!(
                "template `{}` must declare at least one non-exclusion index pattern",
                self.template_id
            );
        }
        Ok(())
    }

    /// The inline bundle, or an empty one when the template only composes
    /// component templates.
    pub fn inline_bundle(&self) -> TemplateBundle {
        self.template.clone().unwrap_or_default()
    }

    #[cfg(any(test, feature = "testsuite"))]
    pub fn for_test(template_id: &str, index_patterns: &[&str], priority: u32) -> Self {
        IndexTemplate {
            template_id: template_id.to_string(),
            index_patterns: index_patterns
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
            template: None,
            composed_of: Vec::new(),
            priority,
            version: None,
            data_stream: None,
            metadata: None,
        }
    }
}

/// A reusable settings/mapping/alias fragment referenced from index
/// templates via `composed_of`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "VersionedComponentTemplate")]
#[serde(try_from = "VersionedComponentTemplate")]
pub struct ComponentTemplate {
    pub component_id: ComponentTemplateId,
    pub template: TemplateBundle,
    pub version: Option<u64>,
    pub metadata: Option<BTreeMap<String, JsonValue>>,
}

impl ComponentTemplate {
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_identifier("component template", &self.component_id)?;
        Ok(())
    }

    #[cfg(any(test, feature = "testsuite"))]
    pub fn for_test(component_id: &str, settings: IndexSettings) -> Self {
        ComponentTemplate {
            component_id: component_id.to_string(),
            template: TemplateBundle {
                settings,
                mapping: None,
                aliases: BTreeMap::new(),
            },
            version: None,
            metadata: None,
        }
    }
}
