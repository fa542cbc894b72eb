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

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{ComponentTemplate, DataStreamTemplate, IndexTemplate, TemplateBundle};
use crate::{ComponentTemplateId, ConfigFormat, TemplateId};

/// Alias for the latest serialization format.
type IndexTemplateForSerialization = IndexTemplateV0_1;
type ComponentTemplateForSerialization = ComponentTemplateV0_1;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "version")]
pub(crate) enum VersionedIndexTemplate {
    #[serde(rename = "0.1")]
    V0_1(IndexTemplateV0_1),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "version")]
pub(crate) enum VersionedComponentTemplate {
    #[serde(rename = "0.1")]
    V0_1(ComponentTemplateV0_1),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct IndexTemplateV0_1 {
    pub template_id: TemplateId,
    pub index_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateBundle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub composed_of: Vec<ComponentTemplateId>,
    #[serde(default)]
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_stream: Option<DataStreamTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, JsonValue>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ComponentTemplateV0_1 {
    pub component_id: ComponentTemplateId,
    pub template: TemplateBundle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, JsonValue>>,
}

impl From<IndexTemplate> for VersionedIndexTemplate {
    fn from(index_template: IndexTemplate) -> Self {
        VersionedIndexTemplate::V0_1(IndexTemplateV0_1 {
            template_id: index_template.template_id,
            index_patterns: index_template.index_patterns,
            template: index_template.template,
            composed_of: index_template.composed_of,
            priority: index_template.priority,
            template_version: index_template.version,
            data_stream: index_template.data_stream,
            metadata: index_template.metadata,
        })
    }
}

impl TryFrom<VersionedIndexTemplate> for IndexTemplate {
    type Error = anyhow::Error;

    fn try_from(versioned_template: VersionedIndexTemplate) -> anyhow::Result<IndexTemplate> {
        let VersionedIndexTemplate::V0_1(template) = versioned_template;
        template.build_and_validate()
    }
}

impl IndexTemplateForSerialization {
    pub fn build_and_validate(self) -> anyhow::Result<IndexTemplate> {
        let index_template = IndexTemplate {
            template_id: self.template_id,
            index_patterns: self.index_patterns,
            template: self.template,
            composed_of: self.composed_of,
            priority: self.priority,
            version: self.template_version,
            data_stream: self.data_stream,
            metadata: self.metadata,
        };
        index_template.validate()?;
        Ok(index_template)
    }
}

impl From<ComponentTemplate> for VersionedComponentTemplate {
    fn from(component_template: ComponentTemplate) -> Self {
        VersionedComponentTemplate::V0_1(ComponentTemplateV0_1 {
            component_id: component_template.component_id,
            template: component_template.template,
            template_version: component_template.version,
            metadata: component_template.metadata,
        })
    }
}

impl TryFrom<VersionedComponentTemplate> for ComponentTemplate {
    type Error = anyhow::Error;

    fn try_from(
        versioned_component: VersionedComponentTemplate,
    ) -> anyhow::Result<ComponentTemplate> {
        let VersionedComponentTemplate::V0_1(component) = versioned_component;
        component.build_and_validate()
    }
}

impl ComponentTemplateForSerialization {
    pub fn build_and_validate(self) -> anyhow::Result<ComponentTemplate> {
        let component_template = ComponentTemplate {
            component_id: self.component_id,
            template: self.template,
            version: self.template_version,
            metadata: self.metadata,
        };
        component_template.validate()?;
        Ok(component_template)
    }
}

/// Parses and validates an [`IndexTemplate`] as supplied by a user with a
/// given [`ConfigFormat`].
pub fn load_index_template_from_user_config(
    config_format: ConfigFormat,
    config_content: &[u8],
) -> anyhow::Result<IndexTemplate> {
    let versioned_template: VersionedIndexTemplate = config_format.parse(config_content)?;
    let VersionedIndexTemplate::V0_1(template) = versioned_template;
    template.build_and_validate()
}

/// Parses and validates a [`ComponentTemplate`] as supplied by a user with a
/// given [`ConfigFormat`].
pub fn load_component_template_from_user_config(
    config_format: ConfigFormat,
    config_content: &[u8],
) -> anyhow::Result<ComponentTemplate> {
    let versioned_component: VersionedComponentTemplate = config_format.parse(config_content)?;
    let VersionedComponentTemplate::V0_1(component) = versioned_component;
    component.build_and_validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexSettings, ROUTING_PATH_SETTING};

    #[test]
    fn test_index_template_json_roundtrip() {
        let template = IndexTemplate {
            template_id: "logs".to_string(),
            index_patterns: vec!["logs-*-*".to_string()],
            template: Some(TemplateBundle {
                settings: IndexSettings::new().with(ROUTING_PATH_SETTING, "uid"),
                mapping: None,
                aliases: BTreeMap::new(),
            }),
            composed_of: vec!["logs-common".to_string()],
            priority: 100,
            version: Some(3),
            data_stream: Some(DataStreamTemplate::default()),
            metadata: None,
        };
        let template_json = serde_json::to_string(&template).unwrap();
        assert!(template_json.contains(r#""version":"0.1""#));

        let deserialized: IndexTemplate = serde_json::from_str(&template_json).unwrap();
        assert_eq!(deserialized, template);
    }

    #[test]
    fn test_index_template_deserialization_validates_shape() {
        let template_json = r#"{
            "version": "0.1",
            "template_id": "logs",
            "index_patterns": []
        }"#;
        let error = serde_json::from_str::<IndexTemplate>(template_json).unwrap_err();
        assert!(error.to_string().contains("at least one index pattern"));
    }

    #[test]
    fn test_load_index_template_from_yaml() {
        let template_yaml = r#"
            version: "0.1"
            template_id: metrics
            index_patterns:
              - metrics-*
            priority: 50
            data_stream:
              hidden: false
              allow_custom_routing: false
        "#;
        let template =
            load_index_template_from_user_config(ConfigFormat::Yaml, template_yaml.as_bytes())
                .unwrap();
        assert_eq!(template.template_id, "metrics");
        assert_eq!(template.index_patterns, ["metrics-*"]);
        assert_eq!(template.priority, 50);
        assert!(template.data_stream.is_some());
    }

    #[test]
    fn test_load_component_template_from_json_with_numeric_version() {
        // A numeric `version` is coerced to a string for backward
        // compatibility with hand-written configs.
        let component_json = r#"{
            "version": 0.1,
            "component_id": "logs-common",
            "template": {
                "settings": {"index.number_of_replicas": 2}
            }
        }"#;
        let error = load_component_template_from_user_config(
            ConfigFormat::Json,
            component_json.as_bytes(),
        );
        // 0.1 is a float, not an integer: coercion only applies to integers.
        error.unwrap_err();

        let component_json = r#"{
            "version": "0.1",
            "component_id": "logs-common",
            "template": {
                "settings": {"index.number_of_replicas": 2}
            }
        }"#;
        let component = load_component_template_from_user_config(
            ConfigFormat::Json,
            component_json.as_bytes(),
        )
        .unwrap();
        assert_eq!(component.component_id, "logs-common");
        assert_eq!(
            component.template.settings.get_u32("index.number_of_replicas"),
            Some(2)
        );
    }
}
