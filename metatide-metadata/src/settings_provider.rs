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
    IndexMode, IndexSettings, ROUTING_PATH_SETTING, TIME_SERIES_END_TIME_SETTING,
    TIME_SERIES_START_TIME_SETTING,
};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::error::{MetadataError, MetadataResult};
use crate::resolution::EffectiveConfig;

/// Context handed to every setting provider for one index creation.
pub struct IndexSettingsRequest<'a> {
    pub index_name: &'a str,
    pub data_stream_name: Option<&'a str>,
    pub is_data_stream_backing: bool,
    pub resolution_timestamp: OffsetDateTime,
    /// The resolved template configuration, identical for every provider.
    pub effective: &'a EffectiveConfig,
    /// The settings view accumulated so far: the effective settings overlaid
    /// with the output of every previously applied provider.
    pub accumulated: &'a IndexSettings,
}

/// Computes additional index settings from a resolved template at
/// index-creation time.
///
/// Providers may only add or override settings, never remove ones resolution
/// already produced.
pub trait IndexSettingProvider: Send + Sync {
    fn additional_settings(
        &self,
        request: &IndexSettingsRequest<'_>,
    ) -> MetadataResult<IndexSettings>;
}

/// Ordered registry of setting providers.
///
/// Providers are applied in registration order, and that order is part of
/// the contract: provider N's output is visible to provider N+1 through the
/// accumulating settings view.
#[derive(Clone, Default)]
pub struct IndexSettingProviders {
    providers: Vec<Arc<dyn IndexSettingProvider>>,
}

impl IndexSettingProviders {
    pub fn new(providers: Vec<Arc<dyn IndexSettingProvider>>) -> Self {
        IndexSettingProviders { providers }
    }

    /// Folds all providers over the resolved configuration and returns the
    /// additional settings layer to apply on top of it.
    pub fn collect_additional_settings(
        &self,
        index_name: &str,
        data_stream_name: Option<&str>,
        resolution_timestamp: OffsetDateTime,
        effective: &EffectiveConfig,
    ) -> MetadataResult<IndexSettings> {
        let mut additional_settings = IndexSettings::new();

        for provider in &self.providers {
            let accumulated = effective.settings.overlay(&additional_settings);
            let request = IndexSettingsRequest {
                index_name,
                data_stream_name,
                is_data_stream_backing: data_stream_name.is_some(),
                resolution_timestamp,
                effective,
                accumulated: &accumulated,
            };
            let provider_settings = provider.additional_settings(&request)?;
            additional_settings = additional_settings.overlay(&provider_settings);
        }
        Ok(additional_settings)
    }
}

/// Injects the settings a time-series data stream backing index needs but
/// its template usually leaves implicit: the routing path, derived from the
/// mapping's dimension fields, and the accepted document time bounds around
/// the creation instant.
#[derive(Clone, Debug)]
pub struct TimeSeriesSettingsProvider {
    pub look_back: Duration,
    pub look_ahead: Duration,
}

impl Default for TimeSeriesSettingsProvider {
    fn default() -> Self {
        TimeSeriesSettingsProvider {
            look_back: Duration::hours(2),
            look_ahead: Duration::hours(2),
        }
    }
}

impl IndexSettingProvider for TimeSeriesSettingsProvider {
    fn additional_settings(
        &self,
        request: &IndexSettingsRequest<'_>,
    ) -> MetadataResult<IndexSettings> {
        let mut additional_settings = IndexSettings::new();

        if !request.is_data_stream_backing
            || request.accumulated.index_mode() != IndexMode::TimeSeries
        {
            return Ok(additional_settings);
        }
        if !request.accumulated.contains_key(ROUTING_PATH_SETTING) {
            let routing_dimensions = request.effective.mapping.routing_dimensions();
            if !routing_dimensions.is_empty() {
                additional_settings.set(ROUTING_PATH_SETTING, routing_dimensions.join(","));
            }
        }
        if !request
            .accumulated
            .contains_key(TIME_SERIES_START_TIME_SETTING)
        {
            let start_time = request.resolution_timestamp - self.look_back;
            additional_settings.set(TIME_SERIES_START_TIME_SETTING, format_timestamp(start_time)?);
        }
        if !request
            .accumulated
            .contains_key(TIME_SERIES_END_TIME_SETTING)
        {
            let end_time = request.resolution_timestamp + self.look_ahead;
            additional_settings.set(TIME_SERIES_END_TIME_SETTING, format_timestamp(end_time)?);
        }
        Ok(additional_settings)
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> MetadataResult<String> {
    timestamp
        .format(&Rfc3339)
        .map_err(|error| MetadataError::Internal {
            message: "failed to format time series bound".to_string(),
            cause: error.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use metatide_config::{CompiledMapping, DataStreamTemplate, INDEX_MODE_SETTING};
    use time::macros::datetime;

    use super::*;

    fn time_series_effective_config() -> EffectiveConfig {
        EffectiveConfig {
            template_id: "logs".to_string(),
            data_stream: Some(DataStreamTemplate::default()),
            settings: IndexSettings::new().with(INDEX_MODE_SETTING, "time_series"),
            mapping: CompiledMapping::time_series_for_test(&["uid", "region"]),
            aliases: BTreeMap::new(),
        }
    }

    struct FixedSettingsProvider(IndexSettings);

    impl IndexSettingProvider for FixedSettingsProvider {
        fn additional_settings(
            &self,
            _request: &IndexSettingsRequest<'_>,
        ) -> MetadataResult<IndexSettings> {
            Ok(self.0.clone())
        }
    }

    /// Echoes whether it saw `index.custom_marker` in the accumulated view.
    struct MarkerObservingProvider;

    impl IndexSettingProvider for MarkerObservingProvider {
        fn additional_settings(
            &self,
            request: &IndexSettingsRequest<'_>,
        ) -> MetadataResult<IndexSettings> {
            let mut settings = IndexSettings::new();
            let observed = request.accumulated.contains_key("index.custom_marker");
            settings.set("index.observed_marker", observed);
            Ok(settings)
        }
    }

    #[test]
    fn test_providers_applied_in_registration_order() {
        let mut marker_settings = IndexSettings::new();
        marker_settings.set("index.custom_marker", true);

        let providers = IndexSettingProviders::new(vec![
            Arc::new(FixedSettingsProvider(marker_settings.clone())),
            Arc::new(MarkerObservingProvider),
        ]);
        let effective = time_series_effective_config();
        let additional = providers
            .collect_additional_settings(
                ".ds-logs-mysql-default-000001",
                Some("logs-mysql-default"),
                OffsetDateTime::UNIX_EPOCH,
                &effective,
            )
            .unwrap();
        assert_eq!(additional.get_bool("index.observed_marker"), Some(true));

        // Reversed registration order: the marker is not yet visible.
        let providers = IndexSettingProviders::new(vec![
            Arc::new(MarkerObservingProvider),
            Arc::new(FixedSettingsProvider(marker_settings)),
        ]);
        let additional = providers
            .collect_additional_settings(
                ".ds-logs-mysql-default-000001",
                Some("logs-mysql-default"),
                OffsetDateTime::UNIX_EPOCH,
                &effective,
            )
            .unwrap();
        assert_eq!(additional.get_bool("index.observed_marker"), Some(false));
    }

    #[test]
    fn test_time_series_provider_injects_routing_path_and_bounds() {
        let providers =
            IndexSettingProviders::new(vec![Arc::new(TimeSeriesSettingsProvider::default())]);
        let effective = time_series_effective_config();
        let resolution_timestamp = datetime!(2024-05-21 12:00:00 UTC);

        let additional = providers
            .collect_additional_settings(
                ".ds-logs-mysql-default-000001",
                Some("logs-mysql-default"),
                resolution_timestamp,
                &effective,
            )
            .unwrap();
        assert_eq!(additional.get_str(ROUTING_PATH_SETTING), Some("region,uid"));
        assert_eq!(
            additional.get_str(TIME_SERIES_START_TIME_SETTING),
            Some("2024-05-21T10:00:00Z")
        );
        assert_eq!(
            additional.get_str(TIME_SERIES_END_TIME_SETTING),
            Some("2024-05-21T14:00:00Z")
        );
    }

    #[test]
    fn test_time_series_provider_ignores_standard_indices() {
        let providers =
            IndexSettingProviders::new(vec![Arc::new(TimeSeriesSettingsProvider::default())]);
        let mut effective = time_series_effective_config();
        effective.settings = IndexSettings::new();

        let additional = providers
            .collect_additional_settings(
                "logs-plain",
                None,
                OffsetDateTime::UNIX_EPOCH,
                &effective,
            )
            .unwrap();
        assert!(additional.is_empty());
    }

    #[test]
    fn test_time_series_provider_respects_explicit_routing_path() {
        let providers =
            IndexSettingProviders::new(vec![Arc::new(TimeSeriesSettingsProvider::default())]);
        let mut effective = time_series_effective_config();
        effective.settings = effective
            .settings
            .with(ROUTING_PATH_SETTING, "custom_dimension");

        let additional = providers
            .collect_additional_settings(
                ".ds-logs-mysql-default-000001",
                Some("logs-mysql-default"),
                OffsetDateTime::UNIX_EPOCH,
                &effective,
            )
            .unwrap();
        // The template's own routing path wins; only the bounds are added.
        assert!(!additional.contains_key(ROUTING_PATH_SETTING));
        assert!(additional.contains_key(TIME_SERIES_START_TIME_SETTING));
        assert!(additional.contains_key(TIME_SERIES_END_TIME_SETTING));
    }
}
