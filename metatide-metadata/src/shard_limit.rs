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

use crate::cluster_settings::ClusterSettings;
use crate::error::{MetadataError, MetadataResult};
use crate::metadata::ClusterMetadata;

/// Enforces the cluster-wide shard budget before an index creation is
/// allowed to proceed.
///
/// Consulted at index-creation time only: a template alone does not create
/// shards. The limit is read from the live cluster settings on every call.
#[derive(Clone, Debug)]
pub struct ShardLimitValidator {
    cluster_settings: Arc<ClusterSettings>,
}

impl ShardLimitValidator {
    pub fn new(cluster_settings: Arc<ClusterSettings>) -> Self {
        ShardLimitValidator { cluster_settings }
    }

    #[cfg(any(test, feature = "testsuite"))]
    pub fn for_test(max_shards_per_node: u32) -> Self {
        ShardLimitValidator::new(Arc::new(ClusterSettings::with_max_shards_per_node(
            max_shards_per_node,
        )))
    }

    /// Checks that opening `proposed_shard_copies` additional shard copies
    /// keeps the cluster within its budget. Reaching the limit exactly is
    /// allowed.
    pub fn check_shard_limit(
        &self,
        metadata: &ClusterMetadata,
        proposed_shard_copies: u32,
    ) -> MetadataResult<()> {
        let current: u32 = metadata
            .indexes()
            .values()
            .map(|index_metadata| index_metadata.total_shard_copies())
            .sum();
        let limit = self.cluster_settings.max_shards_per_node();

        if current + proposed_shard_copies > limit {
            return Err(MetadataError::ShardLimitExceeded { current, limit });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster_settings::MAX_SHARDS_PER_NODE_SETTING;
    use crate::metadata::IndexMetadata;

    #[test]
    fn test_shard_limit_boundary_is_inclusive() {
        // 3 shards, 1 replica each: 6 shard copies open.
        let metadata = ClusterMetadata::empty()
            .to_builder()
            .set_index(IndexMetadata::for_test("existing", 3, 1))
            .build();

        let shard_limit_validator = ShardLimitValidator::for_test(8);
        // Reaching the limit exactly succeeds.
        shard_limit_validator.check_shard_limit(&metadata, 2).unwrap();

        let error = shard_limit_validator
            .check_shard_limit(&metadata, 3)
            .unwrap_err();
        assert_eq!(
            error,
            MetadataError::ShardLimitExceeded {
                current: 6,
                limit: 8,
            }
        );
    }

    #[test]
    fn test_shard_limit_reads_live_settings() {
        let cluster_settings = Arc::new(ClusterSettings::with_max_shards_per_node(2));
        let shard_limit_validator = ShardLimitValidator::new(cluster_settings.clone());
        let metadata = ClusterMetadata::empty();

        shard_limit_validator
            .check_shard_limit(&metadata, 4)
            .unwrap_err();

        cluster_settings
            .update(MAX_SHARDS_PER_NODE_SETTING, 16.into())
            .unwrap();
        // The updated limit is observed without rebuilding the validator.
        shard_limit_validator.check_shard_limit(&metadata, 4).unwrap();
    }
}
