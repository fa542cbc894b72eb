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

use std::collections::HashMap;

use metatide_config::{ComponentTemplate, ComponentTemplateId, IndexId, IndexTemplate, TemplateId};
use serde::{Deserialize, Serialize};

use super::{ClusterMetadata, IndexMetadata};
use crate::data_stream::{DataStream, DataStreamName};

/// Alias for the latest serialization format of the durable snapshot.
type ClusterMetadataForSerialization = ClusterMetadataV0_1;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "version")]
pub(crate) enum VersionedClusterMetadata {
    #[serde(rename = "0.1")]
    V0_1(ClusterMetadataV0_1),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ClusterMetadataV0_1 {
    #[serde(default)]
    pub metadata_version: u64,
    #[serde(default)]
    pub indexes: HashMap<IndexId, IndexMetadata>,
    #[serde(default)]
    pub templates: HashMap<TemplateId, IndexTemplate>,
    #[serde(default)]
    pub component_templates: HashMap<ComponentTemplateId, ComponentTemplate>,
    #[serde(default)]
    pub data_streams: HashMap<DataStreamName, DataStream>,
}

impl From<ClusterMetadata> for VersionedClusterMetadata {
    fn from(cluster_metadata: ClusterMetadata) -> Self {
        VersionedClusterMetadata::V0_1(ClusterMetadataV0_1 {
            metadata_version: cluster_metadata.version,
            indexes: cluster_metadata.indexes,
            templates: cluster_metadata.templates,
            component_templates: cluster_metadata.component_templates,
            data_streams: cluster_metadata.data_streams,
        })
    }
}

impl TryFrom<VersionedClusterMetadata> for ClusterMetadata {
    type Error = anyhow::Error;

    fn try_from(versioned_metadata: VersionedClusterMetadata) -> anyhow::Result<ClusterMetadata> {
        let VersionedClusterMetadata::V0_1(metadata) = versioned_metadata;
        metadata.build()
    }
}

impl ClusterMetadataForSerialization {
    fn build(self) -> anyhow::Result<ClusterMetadata> {
        for data_stream in self.data_streams.values() {
            for backing_index in &data_stream.indices {
                anyhow::ensure!(
                    self.indexes.contains_key(&backing_index.index_name),
                    "inconsistent snapshot: data stream `{}` references missing backing index \
                     `{}`",
                    data_stream.name,
                    backing_index.index_name,
                );
            }
        }
        Ok(ClusterMetadata {
            version: self.metadata_version,
            indexes: self.indexes,
            templates: self.templates,
            component_templates: self.component_templates,
            data_streams: self.data_streams,
        })
    }
}

#[cfg(test)]
mod tests {
    use metatide_config::IndexTemplate;

    use super::*;
    use crate::serde_utils;

    #[test]
    fn test_cluster_metadata_json_roundtrip() {
        let metadata = ClusterMetadata::empty()
            .to_builder()
            .set_template(IndexTemplate::for_test("logs", &["logs-*"], 100))
            .build();

        let metadata_json = serde_utils::to_json_str(&metadata).unwrap();
        assert!(metadata_json.contains(r#""version":"0.1""#));

        let deserialized: ClusterMetadata = serde_utils::from_json_str(&metadata_json).unwrap();
        assert_eq!(deserialized, metadata);
        assert_eq!(deserialized.version(), 1);
    }

    #[test]
    fn test_cluster_metadata_rejects_dangling_backing_index() {
        let snapshot_json = r#"{
            "version": "0.1",
            "metadata_version": 3,
            "data_streams": {
                "logs-mysql-default": {
                    "name": "logs-mysql-default",
                    "generation": 1,
                    "index_mode": "time_series",
                    "indices": [
                        {
                            "index_name": ".ds-logs-mysql-default-000001",
                            "from_timestamp": 0,
                            "to_timestamp": 1
                        }
                    ]
                }
            }
        }"#;
        let error = serde_utils::from_json_str::<ClusterMetadata>(snapshot_json).unwrap_err();
        assert!(error.to_string().contains("missing backing index"));
    }
}
