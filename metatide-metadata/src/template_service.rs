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

use itertools::Itertools;
use metatide_config::{ComponentTemplate, IndexSettings, IndexSettingsValidator, IndexTemplate};
use tracing::{info, warn};

use crate::data_stream::check_time_series_consistency;
use crate::error::{EntityKind, MetadataError, MetadataResult};
use crate::metadata::ClusterMetadata;
use crate::resolution::{compose_template, resolve_effective_config};

/// Validates template mutations against the full existing metadata and, when
/// valid, produces the next snapshot.
///
/// Every operation is a hard-gated, fail-closed transition: the first
/// failing gate aborts the whole mutation and the input snapshot remains
/// authoritative. All gates observe the same unmodified input snapshot; the
/// simulated-resolution gate runs against a private hypothetical copy that
/// only becomes the result on success.
pub struct TemplateService {
    settings_validator: Arc<dyn IndexSettingsValidator>,
}

impl TemplateService {
    pub fn new(settings_validator: Arc<dyn IndexSettingsValidator>) -> Self {
        TemplateService { settings_validator }
    }

    /// Adds or replaces an index template.
    ///
    /// With `create_only`, an existing template of the same name is an
    /// error instead of being replaced.
    pub fn create_index_template(
        &self,
        metadata: &ClusterMetadata,
        create_only: bool,
        template: IndexTemplate,
    ) -> MetadataResult<ClusterMetadata> {
        // Gate 1: shape.
        template
            .validate()
            .map_err(|error| MetadataError::MalformedTemplate {
                template_id: template.template_id.clone(),
                message: error.to_string(),
            })?;
        let missing_components: Vec<String> = template
            .composed_of
            .iter()
            .filter(|component_id| metadata.component_template(component_id).is_none())
            .cloned()
            .sorted()
            .dedup()
            .collect();
        if !missing_components.is_empty() {
            return Err(MetadataError::UnknownComponentTemplate {
                template_id: template.template_id.clone(),
                component_ids: missing_components,
            });
        }
        if create_only && metadata.template(&template.template_id).is_some() {
            return Err(MetadataError::AlreadyExists(EntityKind::IndexTemplate {
                template_id: template.template_id.clone(),
            }));
        }

        // Gate 2: settings.
        if let Some(bundle) = &template.template {
            self.validate_settings(&template.template_id, &bundle.settings)?;
        }

        // Gate 3: simulated resolution against a hypothetical snapshot.
        let proposed = metadata.to_builder().set_template(template.clone()).build();
        let probe_index_name = probe_index_name(&template);
        resolve_effective_config(&proposed, &probe_index_name)?;
        // A higher-priority unrelated template may win the probe; the
        // template under validation must compose either way.
        compose_template(&proposed, &template)?;

        // Gate 4: data stream consistency.
        if let Err(error) = check_time_series_consistency(metadata, &proposed) {
            warn!(template_id = %template.template_id, "rejected index template mutation: {error}");
            return Err(error);
        }

        info!(
            template_id = %template.template_id,
            index_patterns = ?template.index_patterns,
            priority = template.priority,
            "created index template"
        );
        Ok(proposed)
    }

    /// Removes an index template by name.
    pub fn delete_index_template(
        &self,
        metadata: &ClusterMetadata,
        template_id: &str,
    ) -> MetadataResult<ClusterMetadata> {
        metadata.get_index_template(template_id)?;

        let proposed = metadata.to_builder().remove_template(template_id).build();
        check_time_series_consistency(metadata, &proposed)?;

        info!(template_id = %template_id, "deleted index template");
        Ok(proposed)
    }

    /// Adds or replaces a component template.
    ///
    /// Replacing a component that index templates already compose re-runs
    /// the simulated resolution of every referencing template, so a
    /// component change cannot silently corrupt a composition.
    pub fn create_component_template(
        &self,
        metadata: &ClusterMetadata,
        create_only: bool,
        component: ComponentTemplate,
    ) -> MetadataResult<ClusterMetadata> {
        component
            .validate()
            .map_err(|error| MetadataError::MalformedTemplate {
                template_id: component.component_id.clone(),
                message: error.to_string(),
            })?;
        if create_only && metadata.component_template(&component.component_id).is_some() {
            return Err(MetadataError::AlreadyExists(EntityKind::ComponentTemplate {
                component_id: component.component_id.clone(),
            }));
        }
        self.validate_settings(&component.component_id, &component.template.settings)?;

        let proposed = metadata
            .to_builder()
            .set_component_template(component.clone())
            .build();
        for referencing_template in metadata.templates_composed_of(&component.component_id) {
            compose_template(&proposed, referencing_template)?;
        }
        check_time_series_consistency(metadata, &proposed)?;

        info!(component_id = %component.component_id, "created component template");
        Ok(proposed)
    }

    /// Removes a component template by name. A component still referenced by
    /// any index template cannot be removed.
    pub fn delete_component_template(
        &self,
        metadata: &ClusterMetadata,
        component_id: &str,
    ) -> MetadataResult<ClusterMetadata> {
        metadata.get_component_template(component_id)?;

        let referencing_template_ids: Vec<String> = metadata
            .templates_composed_of(component_id)
            .iter()
            .map(|template| template.template_id.clone())
            .collect();
        if !referencing_template_ids.is_empty() {
            return Err(MetadataError::ComponentTemplateInUse {
                component_id: component_id.to_string(),
                template_ids: referencing_template_ids,
            });
        }
        let proposed = metadata
            .to_builder()
            .remove_component_template(component_id)
            .build();

        info!(component_id = %component_id, "deleted component template");
        Ok(proposed)
    }

    fn validate_settings(
        &self,
        template_id: &str,
        settings: &IndexSettings,
    ) -> MetadataResult<()> {
        self.settings_validator
            .validate(settings)
            .map_err(|violations| MetadataError::SettingsRejected {
                template_id: template_id.to_string(),
                violations,
            })
    }
}

/// A synthetic index name matching the template's first positive pattern,
/// used to exercise resolution before committing the template.
fn probe_index_name(template: &IndexTemplate) -> String {
    let pattern = template
        .index_patterns
        .iter()
        .find(|pattern| !pattern.starts_with('-'))
        .expect("shape validation should guarantee a positive pattern");
    pattern.replace('*', "probe")
}
