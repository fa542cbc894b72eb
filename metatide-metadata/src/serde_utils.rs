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

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, MetadataResult};

pub fn from_json_bytes<'de, T: Deserialize<'de>>(value_bytes: &'de [u8]) -> MetadataResult<T> {
    serde_json::from_slice(value_bytes).map_err(|error| {
        let struct_name = std::any::type_name::<T>();
        MetadataError::Internal {
            message: format!("failed to deserialize object `{struct_name}` from JSON"),
            cause: error.to_string(),
        }
    })
}

pub fn from_json_str<'de, T: Deserialize<'de>>(value_str: &'de str) -> MetadataResult<T> {
    serde_json::from_str(value_str).map_err(|error| {
        let struct_name = std::any::type_name::<T>();
        MetadataError::Internal {
            message: format!("failed to deserialize object `{struct_name}` from JSON"),
            cause: error.to_string(),
        }
    })
}

pub fn from_json_value<T: DeserializeOwned>(value: serde_json::Value) -> MetadataResult<T> {
    serde_json::from_value(value).map_err(|error| {
        let struct_name = std::any::type_name::<T>();
        MetadataError::Internal {
            message: format!("failed to deserialize object `{struct_name}` from JSON"),
            cause: error.to_string(),
        }
    })
}

pub fn to_json_str<T: Serialize>(value: &T) -> MetadataResult<String> {
    serde_json::to_string(value).map_err(|error| {
        let struct_name = std::any::type_name::<T>();
        MetadataError::Internal {
            message: format!("failed to serialize object `{struct_name}` to JSON"),
            cause: error.to_string(),
        }
    })
}

pub fn to_json_bytes_pretty<T: Serialize>(value: &T) -> MetadataResult<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|error| {
        let struct_name = std::any::type_name::<T>();
        MetadataError::Internal {
            message: format!("failed to serialize object `{struct_name}` to JSON"),
            cause: error.to_string(),
        }
    })
}
