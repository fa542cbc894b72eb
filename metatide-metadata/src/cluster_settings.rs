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
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use crate::error::{MetadataError, MetadataResult};

/// Cluster-wide cap on the total number of open shard copies.
pub const MAX_SHARDS_PER_NODE_SETTING: &str = "cluster.max_shards_per_node";

pub const DEFAULT_MAX_SHARDS_PER_NODE: u32 = 1_000;

/// Live, dynamically updatable cluster-level settings.
///
/// Unlike everything else in this crate, cluster settings are not part of
/// the immutable metadata snapshot: consumers such as the shard limit
/// validator must observe updates made between snapshot transitions, so they
/// read through this registry at call time and never cache a value.
#[derive(Debug, Default)]
pub struct ClusterSettings {
    values: RwLock<BTreeMap<String, JsonValue>>,
}

impl ClusterSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_shards_per_node(max_shards_per_node: u32) -> Self {
        let cluster_settings = Self::new();
        cluster_settings
            .update(MAX_SHARDS_PER_NODE_SETTING, max_shards_per_node.into())
            .expect("max shards per node should be a known dynamic setting");
        cluster_settings
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        let values_rlock_guard = self.values.read().expect("cluster settings lock");
        match values_rlock_guard.get(key)? {
            JsonValue::Number(number) => number.as_u64().and_then(|value| value.try_into().ok()),
            JsonValue::String(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn max_shards_per_node(&self) -> u32 {
        self.get_u32(MAX_SHARDS_PER_NODE_SETTING)
            .unwrap_or(DEFAULT_MAX_SHARDS_PER_NODE)
    }

    /// Applies a dynamic settings update. Only known dynamic settings are
    /// accepted.
    pub fn update(&self, key: &str, value: JsonValue) -> MetadataResult<()> {
        if key != MAX_SHARDS_PER_NODE_SETTING {
            let message = format!("unknown dynamic cluster setting `{key}`");
            return Err(MetadataError::InvalidArgument { message });
        }
        let mut values_wlock_guard = self.values.write().expect("cluster settings lock");
        values_wlock_guard.insert(key.to_string(), value);
        Ok(())
    }
}
