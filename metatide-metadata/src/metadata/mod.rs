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

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use metatide_config::{
    AliasDefinition, CompiledMapping, ComponentTemplate, ComponentTemplateId, IndexId,
    IndexSettings, IndexTemplate, TemplateId, NUMBER_OF_REPLICAS_SETTING,
    NUMBER_OF_SHARDS_SETTING,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::data_stream::{DataStream, DataStreamName};
use crate::error::{EntityKind, MetadataError, MetadataResult};
use crate::metadata::serialize::VersionedClusterMetadata;

/// Metadata of a concrete index, as recorded in the cluster snapshot once
/// index creation has been prepared.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub index_id: IndexId,
    /// Final, fully composed settings (template composition plus provider
    /// layers).
    pub settings: IndexSettings,
    pub mapping: CompiledMapping,
    pub aliases: BTreeMap<String, AliasDefinition>,
    /// Time at which the index was created, as a unix timestamp.
    pub create_timestamp: i64,
}

impl IndexMetadata {
    pub fn new(
        index_id: IndexId,
        settings: IndexSettings,
        mapping: CompiledMapping,
        aliases: BTreeMap<String, AliasDefinition>,
    ) -> Self {
        IndexMetadata {
            index_id,
            settings,
            mapping,
            aliases,
            create_timestamp: OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    pub fn number_of_shards(&self) -> u32 {
        self.settings.get_u32(NUMBER_OF_SHARDS_SETTING).unwrap_or(1)
    }

    pub fn number_of_replicas(&self) -> u32 {
        self.settings
            .get_u32(NUMBER_OF_REPLICAS_SETTING)
            .unwrap_or(1)
    }

    /// Total shard copies held open by this index: primaries and their
    /// replicas.
    pub fn total_shard_copies(&self) -> u32 {
        self.number_of_shards() * (1 + self.number_of_replicas())
    }

    #[cfg(any(test, feature = "testsuite"))]
    pub fn for_test(index_id: &str, num_shards: u32, num_replicas: u32) -> Self {
        IndexMetadata::new(
            index_id.to_string(),
            IndexSettings::new()
                .with(NUMBER_OF_SHARDS_SETTING, num_shards)
                .with(NUMBER_OF_REPLICAS_SETTING, num_replicas),
            CompiledMapping::default(),
            BTreeMap::new(),
        )
    }
}

/// The immutable, versioned whole-cluster metadata view.
///
/// Every transition operation takes a snapshot and returns a new one with
/// `version + 1` (or an error, in which case the input snapshot remains
/// authoritative). Derived snapshots are only ever constructed through
/// [`ClusterMetadataBuilder`]; no in-place mutation of a snapshot is
/// observable.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "VersionedClusterMetadata")]
#[serde(try_from = "VersionedClusterMetadata")]
pub struct ClusterMetadata {
    version: u64,
    indexes: HashMap<IndexId, IndexMetadata>,
    templates: HashMap<TemplateId, IndexTemplate>,
    component_templates: HashMap<ComponentTemplateId, ComponentTemplate>,
    data_streams: HashMap<DataStreamName, DataStream>,
}

impl ClusterMetadata {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn indexes(&self) -> &HashMap<IndexId, IndexMetadata> {
        &self.indexes
    }

    pub fn index(&self, index_id: &str) -> Option<&IndexMetadata> {
        self.indexes.get(index_id)
    }

    pub fn templates(&self) -> &HashMap<TemplateId, IndexTemplate> {
        &self.templates
    }

    pub fn template(&self, template_id: &str) -> Option<&IndexTemplate> {
        self.templates.get(template_id)
    }

    pub fn component_templates(&self) -> &HashMap<ComponentTemplateId, ComponentTemplate> {
        &self.component_templates
    }

    pub fn component_template(&self, component_id: &str) -> Option<&ComponentTemplate> {
        self.component_templates.get(component_id)
    }

    pub fn data_streams(&self) -> &HashMap<DataStreamName, DataStream> {
        &self.data_streams
    }

    pub fn data_stream(&self, name: &str) -> Option<&DataStream> {
        self.data_streams.get(name)
    }

    pub fn get_index_template(&self, template_id: &str) -> MetadataResult<&IndexTemplate> {
        self.templates.get(template_id).ok_or_else(|| {
            MetadataError::NotFound(EntityKind::IndexTemplate {
                template_id: template_id.to_string(),
            })
        })
    }

    pub fn get_component_template(
        &self,
        component_id: &str,
    ) -> MetadataResult<&ComponentTemplate> {
        self.component_templates.get(component_id).ok_or_else(|| {
            MetadataError::NotFound(EntityKind::ComponentTemplate {
                component_id: component_id.to_string(),
            })
        })
    }

    /// Index templates sorted by template ID.
    pub fn list_index_templates(&self) -> Vec<&IndexTemplate> {
        self.templates
            .values()
            .sorted_by(|left, right| left.template_id.cmp(&right.template_id))
            .collect()
    }

    /// Index templates referencing the given component template, sorted by
    /// template ID.
    pub fn templates_composed_of(&self, component_id: &str) -> Vec<&IndexTemplate> {
        self.templates
            .values()
            .filter(|template| {
                template
                    .composed_of
                    .iter()
                    .any(|referenced_id| referenced_id == component_id)
            })
            .sorted_by(|left, right| left.template_id.cmp(&right.template_id))
            .collect()
    }

    pub fn to_builder(&self) -> ClusterMetadataBuilder {
        ClusterMetadataBuilder {
            inner: self.clone(),
        }
    }
}

/// The only construction path for derived snapshots: clone, apply changes,
/// bump the version on `build`.
#[derive(Debug)]
pub struct ClusterMetadataBuilder {
    inner: ClusterMetadata,
}

impl ClusterMetadataBuilder {
    pub fn set_template(mut self, template: IndexTemplate) -> Self {
        self.inner
            .templates
            .insert(template.template_id.clone(), template);
        self
    }

    pub fn remove_template(mut self, template_id: &str) -> Self {
        self.inner.templates.remove(template_id);
        self
    }

    pub fn set_component_template(mut self, component: ComponentTemplate) -> Self {
        self.inner
            .component_templates
            .insert(component.component_id.clone(), component);
        self
    }

    pub fn remove_component_template(mut self, component_id: &str) -> Self {
        self.inner.component_templates.remove(component_id);
        self
    }

    pub fn set_index(mut self, index_metadata: IndexMetadata) -> Self {
        self.inner
            .indexes
            .insert(index_metadata.index_id.clone(), index_metadata);
        self
    }

    pub fn set_data_stream(mut self, data_stream: DataStream) -> Self {
        self.inner
            .data_streams
            .insert(data_stream.name.clone(), data_stream);
        self
    }

    pub fn build(mut self) -> ClusterMetadata {
        self.inner.version += 1;
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_leaves_input_snapshot_untouched() {
        let metadata = ClusterMetadata::empty();
        let template = IndexTemplate::for_test("logs", &["logs-*"], 100);

        let new_metadata = metadata.to_builder().set_template(template).build();

        assert_eq!(metadata.version(), 0);
        assert!(metadata.template("logs").is_none());
        assert_eq!(new_metadata.version(), 1);
        assert!(new_metadata.template("logs").is_some());
    }

    #[test]
    fn test_templates_composed_of() {
        let metadata = ClusterMetadata::empty()
            .to_builder()
            .set_component_template(ComponentTemplate::for_test(
                "common",
                IndexSettings::new(),
            ))
            .set_template({
                let mut template = IndexTemplate::for_test("zulu", &["z-*"], 10);
                template.composed_of = vec!["common".to_string()];
                template
            })
            .set_template({
                let mut template = IndexTemplate::for_test("alpha", &["a-*"], 10);
                template.composed_of = vec!["common".to_string()];
                template
            })
            .set_template(IndexTemplate::for_test("other", &["o-*"], 10))
            .build();

        let referencing: Vec<&str> = metadata
            .templates_composed_of("common")
            .iter()
            .map(|template| template.template_id.as_str())
            .collect();
        assert_eq!(referencing, ["alpha", "zulu"]);
        assert!(metadata.templates_composed_of("missing").is_empty());
    }

    #[test]
    fn test_total_shard_copies() {
        let index_metadata = IndexMetadata::for_test("logs-0001", 3, 1);
        assert_eq!(index_metadata.total_shard_copies(), 6);

        // Defaults to one primary and one replica when unset.
        let index_metadata = IndexMetadata::new(
            "logs-0002".to_string(),
            IndexSettings::new(),
            CompiledMapping::default(),
            BTreeMap::new(),
        );
        assert_eq!(index_metadata.total_shard_copies(), 2);
    }
}
