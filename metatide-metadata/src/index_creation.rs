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

use std::sync::Arc;

use metatide_config::{
    IndexId, IndexSettingsValidator, TIME_SERIES_END_TIME_SETTING, TIME_SERIES_START_TIME_SETTING,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

use crate::data_stream::{DataStream, DataStreamName};
use crate::error::{EntityKind, MetadataError, MetadataResult};
use crate::metadata::{ClusterMetadata, IndexMetadata};
use crate::resolution::resolve_effective_config;
use crate::settings_provider::IndexSettingProviders;
use crate::shard_limit::ShardLimitValidator;

#[derive(Clone, Debug)]
pub struct CreateIndexRequest {
    pub index_name: IndexId,
    /// Set when the index backs a data stream. Template resolution then runs
    /// against the data stream name, not the backing index name.
    pub data_stream_name: Option<DataStreamName>,
    pub resolution_timestamp: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct CreateDataStreamRequest {
    pub data_stream_name: DataStreamName,
    pub resolution_timestamp: OffsetDateTime,
}

/// Prepares index and data-stream creations: resolves the effective
/// configuration, layers in provider settings, validates the result, and
/// enforces the shard budget.
///
/// This is the control-plane half of index creation: the returned snapshot
/// and index metadata are the hand-off to the physical allocation machinery,
/// which is only ever given a complete, internally consistent configuration.
pub struct IndexCreationService {
    providers: IndexSettingProviders,
    shard_limit_validator: ShardLimitValidator,
    settings_validator: Arc<dyn IndexSettingsValidator>,
}

impl IndexCreationService {
    pub fn new(
        providers: IndexSettingProviders,
        shard_limit_validator: ShardLimitValidator,
        settings_validator: Arc<dyn IndexSettingsValidator>,
    ) -> Self {
        IndexCreationService {
            providers,
            shard_limit_validator,
            settings_validator,
        }
    }

    /// Computes the full configuration a new index must have and returns the
    /// snapshot recording it, along with the index metadata itself.
    pub fn prepare_create_index(
        &self,
        metadata: &ClusterMetadata,
        request: &CreateIndexRequest,
    ) -> MetadataResult<(ClusterMetadata, IndexMetadata)> {
        if metadata.index(&request.index_name).is_some() {
            return Err(MetadataError::AlreadyExists(EntityKind::Index {
                index_id: request.index_name.clone(),
            }));
        }
        let resolution_target = request
            .data_stream_name
            .as_deref()
            .unwrap_or(&request.index_name);
        let effective_config = resolve_effective_config(metadata, resolution_target)?;

        if request.data_stream_name.is_some() && effective_config.data_stream.is_none() {
            return Err(MetadataError::MalformedTemplate {
                template_id: effective_config.template_id.clone(),
                message: format!(
                    "template `{}` matches data stream `{resolution_target}` but does not \
                     declare a data stream marker",
                    effective_config.template_id
                ),
            });
        }
        let additional_settings = self.providers.collect_additional_settings(
            &request.index_name,
            request.data_stream_name.as_deref(),
            request.resolution_timestamp,
            &effective_config,
        )?;
        let final_settings = effective_config.settings.overlay(&additional_settings);

        self.settings_validator
            .validate(&final_settings)
            .map_err(|violations| MetadataError::SettingsRejected {
                template_id: effective_config.template_id.clone(),
                violations,
            })?;

        let index_metadata = IndexMetadata::new(
            request.index_name.clone(),
            final_settings,
            effective_config.mapping.clone(),
            effective_config.aliases.clone(),
        );
        self.shard_limit_validator
            .check_shard_limit(metadata, index_metadata.total_shard_copies())?;

        let new_metadata = metadata
            .to_builder()
            .set_index(index_metadata.clone())
            .build();

        info!(
            index_id = %request.index_name,
            template_id = %effective_config.template_id,
            "prepared index creation"
        );
        Ok((new_metadata, index_metadata))
    }

    /// Creates a data stream: resolves its template, creates the
    /// generation-1 backing index through the same pipeline, and records the
    /// stream.
    pub fn create_data_stream(
        &self,
        metadata: &ClusterMetadata,
        request: &CreateDataStreamRequest,
    ) -> MetadataResult<ClusterMetadata> {
        if metadata.data_stream(&request.data_stream_name).is_some() {
            return Err(MetadataError::AlreadyExists(EntityKind::DataStream {
                name: request.data_stream_name.clone(),
            }));
        }
        let effective_config = resolve_effective_config(metadata, &request.data_stream_name)?;
        let Some(data_stream_template) = effective_config.data_stream else {
            return Err(MetadataError::MalformedTemplate {
                template_id: effective_config.template_id.clone(),
                message: format!(
                    "template `{}` matches data stream `{}` but does not declare a data stream \
                     marker",
                    effective_config.template_id, request.data_stream_name
                ),
            });
        };
        let index_mode = effective_config.index_mode();
        let backing_index_name = DataStream::backing_index_name(&request.data_stream_name, 1);

        let create_index_request = CreateIndexRequest {
            index_name: backing_index_name.clone(),
            data_stream_name: Some(request.data_stream_name.clone()),
            resolution_timestamp: request.resolution_timestamp,
        };
        let (new_metadata, index_metadata) =
            self.prepare_create_index(metadata, &create_index_request)?;

        let (from_timestamp, to_timestamp) =
            backing_index_time_bounds(&index_metadata, request.resolution_timestamp);
        let data_stream = DataStream::new(
            request.data_stream_name.clone(),
            index_mode,
            data_stream_template.hidden,
        )
        .with_backing_index(backing_index_name, from_timestamp, to_timestamp);

        let new_metadata = new_metadata
            .to_builder()
            .set_data_stream(data_stream)
            .build();

        info!(
            data_stream = %request.data_stream_name,
            index_mode = %index_mode,
            "created data stream"
        );
        Ok(new_metadata)
    }
}

/// Time bounds of a backing index generation: the provider-injected
/// time-series bounds when present, the creation instant otherwise.
fn backing_index_time_bounds(
    index_metadata: &IndexMetadata,
    resolution_timestamp: OffsetDateTime,
) -> (i64, i64) {
    let parse_bound = |key: &str| {
        index_metadata
            .settings
            .get_str(key)
            .and_then(|bound| OffsetDateTime::parse(bound, &Rfc3339).ok())
            .map(|bound| bound.unix_timestamp())
    };
    let from_timestamp = parse_bound(TIME_SERIES_START_TIME_SETTING)
        .unwrap_or_else(|| resolution_timestamp.unix_timestamp());
    let to_timestamp = parse_bound(TIME_SERIES_END_TIME_SETTING)
        .unwrap_or_else(|| resolution_timestamp.unix_timestamp());
    (from_timestamp, to_timestamp)
}
