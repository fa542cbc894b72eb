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

use metatide_config::{IndexId, IndexMode};
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, MetadataResult};
use crate::metadata::ClusterMetadata;
use crate::resolution::resolve_effective_config;

/// Data stream name.
pub type DataStreamName = String;

pub const DEFAULT_TIMESTAMP_FIELD: &str = "@timestamp";

/// One backing index generation of a data stream, with the time bounds of
/// the documents it accepts.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DataStreamIndexRef {
    pub index_name: IndexId,
    pub from_timestamp: i64,
    pub to_timestamp: i64,
}

/// A named, append-only sequence of auto-created backing indices sharing one
/// logical identity.
///
/// The template that created a data stream is deliberately not recorded:
/// it is re-resolved by name on every consistency check, which is exactly why
/// template changes can retroactively break a data stream.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DataStream {
    pub name: DataStreamName,
    #[serde(default = "DataStream::default_timestamp_field")]
    pub timestamp_field: String,
    /// Current generation; incremented on rollover.
    pub generation: u64,
    /// Backing index generations, oldest first. The last entry is the write
    /// index.
    pub indices: Vec<DataStreamIndexRef>,
    #[serde(default)]
    pub index_mode: IndexMode,
    #[serde(default)]
    pub hidden: bool,
}

impl DataStream {
    fn default_timestamp_field() -> String {
        DEFAULT_TIMESTAMP_FIELD.to_string()
    }

    pub fn new(name: DataStreamName, index_mode: IndexMode, hidden: bool) -> Self {
        DataStream {
            name,
            timestamp_field: Self::default_timestamp_field(),
            generation: 0,
            indices: Vec::new(),
            index_mode,
            hidden,
        }
    }

    /// Name of the backing index for the given generation of the given data
    /// stream.
    pub fn backing_index_name(data_stream_name: &str, generation: u64) -> String {
        format!(".ds-{data_stream_name}-{generation:06}")
    }

    pub fn next_backing_index_name(&self) -> String {
        Self::backing_index_name(&self.name, self.generation + 1)
    }

    /// The current write index, if any generation exists yet.
    pub fn write_index(&self) -> Option<&DataStreamIndexRef> {
        self.indices.last()
    }

    /// Appends the next generation's backing index.
    pub fn with_backing_index(
        mut self,
        index_name: IndexId,
        from_timestamp: i64,
        to_timestamp: i64,
    ) -> Self {
        self.generation += 1;
        self.indices.push(DataStreamIndexRef {
            index_name,
            from_timestamp,
            to_timestamp,
        });
        self
    }

    #[cfg(any(test, feature = "testsuite"))]
    pub fn for_test(name: &str, index_mode: IndexMode, time_bounds: &[(i64, i64)]) -> Self {
        let mut data_stream = DataStream::new(name.to_string(), index_mode, false);
        for (from_timestamp, to_timestamp) in time_bounds {
            let index_name = data_stream.next_backing_index_name();
            data_stream =
                data_stream.with_backing_index(index_name, *from_timestamp, *to_timestamp);
        }
        data_stream
    }
}

/// Checks that every time-series data stream of `current` still resolves to
/// a time-series-compatible template in the `proposed` template set.
///
/// The scan covers *all* data streams, not only the ones textually matching
/// the template under edit: a priority change on an unrelated template can
/// change which template wins for a given name. All broken streams are
/// collected before reporting so a rejection shows the full blast radius.
pub fn check_time_series_consistency(
    current: &ClusterMetadata,
    proposed: &ClusterMetadata,
) -> MetadataResult<()> {
    let mut broken_data_streams: Vec<DataStreamName> = Vec::new();

    for data_stream in current.data_streams().values() {
        if data_stream.index_mode != IndexMode::TimeSeries {
            continue;
        }
        // Only regressions are flagged: a stream with no compatible template
        // before the change cannot be broken by it.
        if !is_time_series_compatible(current, &data_stream.name) {
            continue;
        }
        if !is_time_series_compatible(proposed, &data_stream.name) {
            broken_data_streams.push(data_stream.name.clone());
        }
    }
    if broken_data_streams.is_empty() {
        Ok(())
    } else {
        broken_data_streams.sort_unstable();
        Err(MetadataError::DataStreamWouldBreak {
            data_streams: broken_data_streams,
        })
    }
}

/// A stream whose template set does not resolve or compose is a stream that
/// can no longer be re-created: incompatible, not a scan failure.
fn is_time_series_compatible(metadata: &ClusterMetadata, data_stream_name: &str) -> bool {
    match resolve_effective_config(metadata, data_stream_name) {
        Ok(effective_config) => effective_config.is_time_series_compatible(),
        Err(_) => false,
    }
}
