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

//! The Metatide cluster-metadata coordinator core.
//!
//! Everything in this crate is expressed as pure transitions over immutable
//! [`ClusterMetadata`] snapshots: a mutation operation takes one snapshot
//! and returns a new one, or fails and leaves the input snapshot
//! authoritative. Serializing concurrent writers and publishing accepted
//! snapshots is the enclosing cluster-coordination layer's job; nothing in
//! this crate blocks, retries, or holds locks across calls.

mod cluster_settings;
mod data_stream;
mod error;
mod index_creation;
mod metadata;
mod resolution;
pub mod serde_utils;
mod settings_provider;
mod shard_limit;
mod template_matcher;
mod template_service;

pub use cluster_settings::{
    ClusterSettings, DEFAULT_MAX_SHARDS_PER_NODE, MAX_SHARDS_PER_NODE_SETTING,
};
pub use data_stream::{
    check_time_series_consistency, DataStream, DataStreamIndexRef, DataStreamName,
    DEFAULT_TIMESTAMP_FIELD,
};
pub use error::{EntityKind, MetadataError, MetadataResult};
pub use index_creation::{CreateDataStreamRequest, CreateIndexRequest, IndexCreationService};
pub use metadata::{ClusterMetadata, ClusterMetadataBuilder, IndexMetadata};
pub use resolution::{find_matching_template, resolve_effective_config, EffectiveConfig};
pub use settings_provider::{
    IndexSettingProvider, IndexSettingProviders, IndexSettingsRequest, TimeSeriesSettingsProvider,
};
pub use shard_limit::ShardLimitValidator;
pub use template_service::TemplateService;
