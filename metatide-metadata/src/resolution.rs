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

use metatide_config::{
    AliasDefinition, CompiledMapping, DataStreamTemplate, IndexMode, IndexSettings, IndexTemplate,
    TemplateBundle, TemplateId, ROUTING_PATH_SETTING,
};
use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, MetadataError, MetadataResult};
use crate::metadata::ClusterMetadata;
use crate::template_matcher::TemplateMatcher;

/// The fully composed configuration a new index matching some template must
/// have: the winning template's component templates merged in `composed_of`
/// order, topped by its inline bundle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// The winning template.
    pub template_id: TemplateId,
    /// The winning template's data stream marker, if any.
    pub data_stream: Option<DataStreamTemplate>,
    pub settings: IndexSettings,
    pub mapping: CompiledMapping,
    pub aliases: BTreeMap<String, AliasDefinition>,
}

impl EffectiveConfig {
    pub fn index_mode(&self) -> IndexMode {
        self.settings.index_mode()
    }

    /// Whether indices created from this configuration can back a
    /// time-series data stream: the winning template must be marked as a
    /// data stream template, and the effective settings must declare
    /// `index.mode: time_series` together with a routing path.
    pub fn is_time_series_compatible(&self) -> bool {
        self.data_stream.is_some()
            && self.index_mode() == IndexMode::TimeSeries
            && self
                .settings
                .get_str(ROUTING_PATH_SETTING)
                .is_some_and(|routing_path| !routing_path.trim().is_empty())
    }
}

/// Returns the template winning the pattern match for `index_name`, if any:
/// highest priority first, ties broken by lexical template ID order.
pub fn find_matching_template<'a>(
    metadata: &'a ClusterMetadata,
    index_name: &str,
) -> MetadataResult<Option<&'a IndexTemplate>> {
    let template_matcher = TemplateMatcher::try_from_templates(metadata.templates().values())?;
    let Some(template_id) = template_matcher.find_match(index_name) else {
        return Ok(None);
    };
    let template = metadata
        .template(template_id)
        .expect("matched template should exist in the snapshot");
    Ok(Some(template))
}

/// Resolves the effective configuration for `index_name` against the given
/// snapshot. Purely computes a value; no side effects.
pub fn resolve_effective_config(
    metadata: &ClusterMetadata,
    index_name: &str,
) -> MetadataResult<EffectiveConfig> {
    let Some(template) = find_matching_template(metadata, index_name)? else {
        return Err(MetadataError::NotFound(EntityKind::IndexTemplate {
            template_id: index_name.to_string(),
        }));
    };
    compose_template(metadata, template)
}

/// Composes a concrete template against the component templates of the given
/// snapshot, without running the pattern match.
pub(crate) fn compose_template(
    metadata: &ClusterMetadata,
    template: &IndexTemplate,
) -> MetadataResult<EffectiveConfig> {
    let mut accumulator = TemplateBundle::default();

    for component_id in &template.composed_of {
        let component = metadata.get_component_template(component_id)?;
        accumulator = accumulator
            .overlay(&component.template)
            .map_err(|conflict| MetadataError::CompositionConflict {
                template_id: template.template_id.clone(),
                conflict,
            })?;
    }
    let composed = accumulator
        .overlay(&template.inline_bundle())
        .map_err(|conflict| MetadataError::CompositionConflict {
            template_id: template.template_id.clone(),
            conflict,
        })?;

    Ok(EffectiveConfig {
        template_id: template.template_id.clone(),
        data_stream: template.data_stream,
        settings: composed.settings,
        mapping: composed.mapping.unwrap_or_default(),
        aliases: composed.aliases,
    })
}

#[cfg(test)]
mod tests {
    use metatide_config::{
        ComponentTemplate, FieldMapping, INDEX_MODE_SETTING, NUMBER_OF_SHARDS_SETTING,
    };

    use super::*;

    fn template_with_settings(
        template_id: &str,
        index_patterns: &[&str],
        priority: u32,
        settings: IndexSettings,
    ) -> IndexTemplate {
        let mut template = IndexTemplate::for_test(template_id, index_patterns, priority);
        template.template = Some(TemplateBundle {
            settings,
            mapping: None,
            aliases: BTreeMap::new(),
        });
        template
    }

    #[test]
    fn test_resolution_selects_highest_priority_regardless_of_insertion_order() {
        let high = template_with_settings(
            "high",
            &["logs-*"],
            100,
            IndexSettings::new().with(NUMBER_OF_SHARDS_SETTING, 4),
        );
        let low = template_with_settings(
            "low",
            &["logs-*"],
            50,
            IndexSettings::new().with(NUMBER_OF_SHARDS_SETTING, 1),
        );

        for templates in [[high.clone(), low.clone()], [low, high]] {
            let mut builder = ClusterMetadata::empty().to_builder();
            for template in templates {
                builder = builder.set_template(template);
            }
            let metadata = builder.build();

            let effective_config = resolve_effective_config(&metadata, "logs-app").unwrap();
            assert_eq!(effective_config.template_id, "high");
            assert_eq!(
                effective_config.settings.get_u32(NUMBER_OF_SHARDS_SETTING),
                Some(4)
            );
        }
    }

    #[test]
    fn test_resolution_reports_not_found() {
        let metadata = ClusterMetadata::empty();
        let error = resolve_effective_config(&metadata, "logs-app").unwrap_err();
        assert!(matches!(
            error,
            MetadataError::NotFound(EntityKind::IndexTemplate { .. })
        ));
    }

    #[test]
    fn test_composition_override_order() {
        let component_1 = ComponentTemplate::for_test(
            "component-1",
            IndexSettings::new()
                .with(NUMBER_OF_SHARDS_SETTING, 1)
                .with("index.number_of_replicas", 0),
        );
        let component_2 = ComponentTemplate::for_test(
            "component-2",
            IndexSettings::new().with(NUMBER_OF_SHARDS_SETTING, 2),
        );
        let mut template = template_with_settings(
            "logs",
            &["logs-*"],
            100,
            IndexSettings::new().with("index.number_of_replicas", 2),
        );
        template.composed_of = vec!["component-1".to_string(), "component-2".to_string()];

        let metadata = ClusterMetadata::empty()
            .to_builder()
            .set_component_template(component_1)
            .set_component_template(component_2)
            .set_template(template)
            .build();

        let effective_config = resolve_effective_config(&metadata, "logs-app").unwrap();
        // component-2 overrides component-1, the inline bundle overrides both.
        assert_eq!(
            effective_config.settings.get_u32(NUMBER_OF_SHARDS_SETTING),
            Some(2)
        );
        assert_eq!(
            effective_config.settings.get_u32("index.number_of_replicas"),
            Some(2)
        );
    }

    #[test]
    fn test_composition_rejects_mapping_conflicts() {
        let mut component_1 = ComponentTemplate::for_test("component-1", IndexSettings::new());
        component_1.template.mapping = Some(CompiledMapping {
            properties: BTreeMap::from([("uid".to_string(), FieldMapping::new("keyword"))]),
        });
        let mut component_2 = ComponentTemplate::for_test("component-2", IndexSettings::new());
        component_2.template.mapping = Some(CompiledMapping {
            properties: BTreeMap::from([("uid".to_string(), FieldMapping::new("long"))]),
        });

        let mut template = IndexTemplate::for_test("logs", &["logs-*"], 100);
        template.composed_of = vec!["component-1".to_string(), "component-2".to_string()];

        let metadata = ClusterMetadata::empty()
            .to_builder()
            .set_component_template(component_1)
            .set_component_template(component_2)
            .set_template(template)
            .build();

        let error = resolve_effective_config(&metadata, "logs-app").unwrap_err();
        let MetadataError::CompositionConflict {
            template_id,
            conflict,
        } = error
        else {
            panic!("expected a composition conflict, got `{error:?}`");
        };
        assert_eq!(template_id, "logs");
        assert_eq!(conflict.field, "uid");
        assert_eq!(conflict.left_type, "keyword");
        assert_eq!(conflict.right_type, "long");
    }

    #[test]
    fn test_composition_reports_unknown_component() {
        let mut template = IndexTemplate::for_test("logs", &["logs-*"], 100);
        template.composed_of = vec!["missing".to_string()];
        let metadata = ClusterMetadata::empty()
            .to_builder()
            .set_template(template)
            .build();

        let error = resolve_effective_config(&metadata, "logs-app").unwrap_err();
        assert!(matches!(
            error,
            MetadataError::NotFound(EntityKind::ComponentTemplate { .. })
        ));
    }

    #[test]
    fn test_time_series_compatibility() {
        let mut template = template_with_settings(
            "logs",
            &["logs-*"],
            100,
            IndexSettings::new()
                .with(INDEX_MODE_SETTING, "time_series")
                .with(ROUTING_PATH_SETTING, "uid"),
        );
        template.data_stream = Some(DataStreamTemplate::default());
        let metadata = ClusterMetadata::empty()
            .to_builder()
            .set_template(template)
            .build();

        let effective_config = resolve_effective_config(&metadata, "logs-app").unwrap();
        assert_eq!(effective_config.index_mode(), IndexMode::TimeSeries);
        assert!(effective_config.is_time_series_compatible());

        // Same settings without the data stream marker are not enough.
        let template = template_with_settings(
            "plain",
            &["plain-*"],
            100,
            IndexSettings::new()
                .with(INDEX_MODE_SETTING, "time_series")
                .with(ROUTING_PATH_SETTING, "uid"),
        );
        let metadata = ClusterMetadata::empty()
            .to_builder()
            .set_template(template)
            .build();
        let effective_config = resolve_effective_config(&metadata, "plain-app").unwrap();
        assert!(!effective_config.is_time_series_compatible());
    }
}
