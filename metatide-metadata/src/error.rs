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

use std::fmt;

use metatide_config::{ComponentTemplateId, IndexId, InvalidSetting, MappingConflict, TemplateId};
use serde::{Deserialize, Serialize};

use crate::data_stream::DataStreamName;

/// Kind of metadata entity an error refers to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    /// An index.
    Index {
        /// Index ID.
        index_id: IndexId,
    },
    /// An index template.
    IndexTemplate {
        /// Index template ID.
        template_id: TemplateId,
    },
    /// A component template.
    ComponentTemplate {
        /// Component template ID.
        component_id: ComponentTemplateId,
    },
    /// A data stream.
    DataStream {
        /// Data stream name.
        name: DataStreamName,
    },
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Index { index_id } => write!(f, "index `{index_id}`"),
            EntityKind::IndexTemplate { template_id } => {
                write!(f, "index template `{template_id}`")
            }
            EntityKind::ComponentTemplate { component_id } => {
                write!(f, "component template `{component_id}`")
            }
            EntityKind::DataStream { name } => write!(f, "data stream `{name}`"),
        }
    }
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Error returned by metadata transition and resolution operations.
///
/// Every variant carries the offending names so callers can render a precise
/// message without string parsing; list-carrying variants are sorted for
/// deterministic output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum MetadataError {
    #[error("{0} already exists")]
    AlreadyExists(EntityKind),

    #[error("template `{template_id}` is malformed: {message}")]
    MalformedTemplate {
        template_id: TemplateId,
        message: String,
    },

    #[error(
        "template `{template_id}` references unknown component templates [{}]",
        .component_ids.join(", ")
    )]
    UnknownComponentTemplate {
        template_id: TemplateId,
        component_ids: Vec<ComponentTemplateId>,
    },

    #[error(
        "settings rejected for template `{template_id}`: {}",
        .violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    SettingsRejected {
        template_id: TemplateId,
        violations: Vec<InvalidSetting>,
    },

    #[error("composing template `{template_id}` failed: {conflict}")]
    CompositionConflict {
        template_id: TemplateId,
        conflict: MappingConflict,
    },

    #[error(
        "data streams [{}] would no longer match a data stream template with a time_series index \
         mode",
        .data_streams.join(", ")
    )]
    DataStreamWouldBreak { data_streams: Vec<DataStreamName> },

    #[error(
        "component template `{component_id}` is still referenced by index templates [{}]",
        .template_ids.join(", ")
    )]
    ComponentTemplateInUse {
        component_id: ComponentTemplateId,
        template_ids: Vec<TemplateId>,
    },

    #[error("cluster shard limit exceeded: {current} shards open, at most {limit} allowed")]
    ShardLimitExceeded { current: u32, limit: u32 },

    #[error("{0} not found")]
    NotFound(EntityKind),

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("internal error: {message}; cause: `{cause}`")]
    Internal { message: String, cause: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_offending_names() {
        let error = MetadataError::DataStreamWouldBreak {
            data_streams: vec!["logs-mysql-default".to_string(), "logs-redis-eu".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "data streams [logs-mysql-default, logs-redis-eu] would no longer match a data \
             stream template with a time_series index mode"
        );

        let error = MetadataError::NotFound(EntityKind::IndexTemplate {
            template_id: "logs".to_string(),
        });
        assert_eq!(error.to_string(), "index template `logs` not found");

        let error = MetadataError::ShardLimitExceeded {
            current: 4,
            limit: 4,
        };
        assert_eq!(
            error.to_string(),
            "cluster shard limit exceeded: 4 shards open, at most 4 allowed"
        );
    }
}
