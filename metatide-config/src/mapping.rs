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

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Two composition layers map the same field to different types.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("field `{field}` is mapped both as `{left_type}` and as `{right_type}`")]
pub struct MappingConflict {
    /// Dotted path of the offending field.
    pub field: String,
    pub left_type: String,
    pub right_type: String,
}

/// Compiled form of a document mapping.
///
/// The raw mapping syntax is the mapping compiler's concern; this core only
/// ever sees the compiled tree, which it can compare structurally and
/// deep-merge during template composition.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CompiledMapping {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, FieldMapping>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(rename = "type", default = "FieldMapping::default_field_type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub time_series_dimension: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, FieldMapping>,
}

impl FieldMapping {
    fn default_field_type() -> String {
        "object".to_string()
    }

    pub fn new(field_type: impl Into<String>) -> Self {
        FieldMapping {
            field_type: field_type.into(),
            time_series_dimension: false,
            properties: BTreeMap::new(),
        }
    }

    pub fn dimension(field_type: impl Into<String>) -> Self {
        FieldMapping {
            field_type: field_type.into(),
            time_series_dimension: true,
            properties: BTreeMap::new(),
        }
    }
}

impl CompiledMapping {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Deep-merges `other` on top of `self`.
    ///
    /// New fields are additive; same-field merges recurse into object
    /// properties and let `other` win on per-field options, but a field
    /// mapped to two different types is a hard conflict, never a silent
    /// override.
    pub fn merge(&self, other: &CompiledMapping) -> Result<CompiledMapping, MappingConflict> {
        let properties = merge_properties(&self.properties, &other.properties, "")?;
        Ok(CompiledMapping { properties })
    }

    /// Sorted dotted paths of all fields flagged as time-series dimensions.
    pub fn routing_dimensions(&self) -> Vec<String> {
        let mut dimensions = Vec::new();
        collect_dimensions(&self.properties, "", &mut dimensions);
        dimensions.sort_unstable();
        dimensions
    }
}

fn merge_properties(
    left: &BTreeMap<String, FieldMapping>,
    right: &BTreeMap<String, FieldMapping>,
    path: &str,
) -> Result<BTreeMap<String, FieldMapping>, MappingConflict> {
    let mut merged = left.clone();

    for (field_name, right_field) in right {
        let field_path = join_path(path, field_name);

        match merged.get(field_name) {
            None => {
                merged.insert(field_name.clone(), right_field.clone());
            }
            Some(left_field) => {
                if left_field.field_type != right_field.field_type {
                    return Err(MappingConflict {
                        field: field_path,
                        left_type: left_field.field_type.clone(),
                        right_type: right_field.field_type.clone(),
                    });
                }
                let properties =
                    merge_properties(&left_field.properties, &right_field.properties, &field_path)?;
                merged.insert(
                    field_name.clone(),
                    FieldMapping {
                        field_type: right_field.field_type.clone(),
                        time_series_dimension: right_field.time_series_dimension,
                        properties,
                    },
                );
            }
        }
    }
    Ok(merged)
}

fn collect_dimensions(
    properties: &BTreeMap<String, FieldMapping>,
    path: &str,
    dimensions: &mut Vec<String>,
) {
    for (field_name, field_mapping) in properties {
        let field_path = join_path(path, field_name);
        if field_mapping.time_series_dimension {
            dimensions.push(field_path.clone());
        }
        collect_dimensions(&field_mapping.properties, &field_path, dimensions);
    }
}

fn join_path(path: &str, field_name: &str) -> String {
    if path.is_empty() {
        field_name.to_string()
    } else {
        format!("{path}.{field_name}")
    }
}

/// Boundary to the external mapping compiler: raw mapping source goes in, a
/// structurally comparable compiled form comes out. This core never parses
/// raw mapping syntax itself.
pub trait MappingCompiler: Send + Sync {
    fn compile(&self, mapping_source: &str) -> anyhow::Result<CompiledMapping>;
}

/// Default compiler for JSON `properties` documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonMappingCompiler;

impl MappingCompiler for JsonMappingCompiler {
    fn compile(&self, mapping_source: &str) -> anyhow::Result<CompiledMapping> {
        let compiled_mapping: CompiledMapping =
            serde_json::from_str(mapping_source).context("failed to compile mapping source")?;
        Ok(compiled_mapping)
    }
}

#[cfg(any(test, feature = "testsuite"))]
impl CompiledMapping {
    /// A minimal time-series mapping with the given dimension fields, all
    /// keywords.
    pub fn time_series_for_test(dimension_fields: &[&str]) -> Self {
        let properties = dimension_fields
            .iter()
            .map(|field_name| (field_name.to_string(), FieldMapping::dimension("keyword")))
            .collect();
        CompiledMapping { properties }
    }
}
