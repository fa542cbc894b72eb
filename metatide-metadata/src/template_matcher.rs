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

use std::cmp::Reverse;

use metatide_config::{validate_index_name_pattern, IndexTemplate, TemplateId};
use regex::RegexSet;
use regex_syntax::escape_into;

use crate::error::{MetadataError, MetadataResult};

/// Matches index names against the pattern lists of a set of index
/// templates and selects the winning template.
///
/// Built from an immutable metadata snapshot and discarded with it; matchers
/// are never carried across snapshots.
#[derive(Debug, Default)]
pub(crate) struct TemplateMatcher {
    matchers: Vec<CompiledTemplateMatcher>,
}

#[derive(Debug)]
struct CompiledTemplateMatcher {
    template_id: TemplateId,
    priority: u32,
    positive_matcher: RegexSet,
    negative_matcher: RegexSet,
}

impl CompiledTemplateMatcher {
    /// Builds a matcher from a template's patterns using the following rules:
    /// - If a pattern does not contain a `*` char, it matches the exact name.
    /// - If a pattern contains one or more `*`, it matches the regex built
    ///   from the pattern where `*` is replaced by `.*`. All other regular
    ///   expression meta characters are escaped.
    /// - A leading `-` marks an exclusion pattern.
    fn try_from_template(template: &IndexTemplate) -> MetadataResult<Self> {
        let mut positive_patterns: Vec<&str> = Vec::new();
        let mut negative_patterns: Vec<&str> = Vec::new();

        for pattern in &template.index_patterns {
            if let Some(negative_pattern) = pattern.strip_prefix('-') {
                negative_patterns.push(negative_pattern);
            } else {
                positive_patterns.push(pattern);
            }
        }
        if positive_patterns.is_empty() {
            let message = format!(
                "failed to build template matcher: template `{}` must provide at least one \
                 positive index name pattern",
                template.template_id
            );
            return Err(MetadataError::InvalidArgument { message });
        }
        let positive_matcher = build_regex_set(&positive_patterns)?;
        let negative_matcher = build_regex_set(&negative_patterns)?;

        let matcher = CompiledTemplateMatcher {
            template_id: template.template_id.clone(),
            priority: template.priority,
            positive_matcher,
            negative_matcher,
        };
        Ok(matcher)
    }

    fn is_match(&self, index_name: &str) -> bool {
        self.positive_matcher.is_match(index_name) && !self.negative_matcher.is_match(index_name)
    }
}

impl TemplateMatcher {
    pub fn try_from_templates<'a>(
        templates: impl Iterator<Item = &'a IndexTemplate>,
    ) -> MetadataResult<Self> {
        let matchers = templates
            .map(CompiledTemplateMatcher::try_from_template)
            .collect::<MetadataResult<Vec<_>>>()?;
        Ok(TemplateMatcher { matchers })
    }

    /// Returns the winning template for `index_name`: the matching template
    /// with the highest priority, ties broken by lexical template ID order so
    /// the outcome never depends on insertion order.
    pub fn find_match(&self, index_name: &str) -> Option<&TemplateId> {
        self.matchers
            .iter()
            .filter(|matcher| matcher.is_match(index_name))
            .max_by(|left, right| {
                (left.priority, Reverse(&left.template_id))
                    .cmp(&(right.priority, Reverse(&right.template_id)))
            })
            .map(|matcher| &matcher.template_id)
    }
}

fn build_regex_set(patterns: &[&str]) -> MetadataResult<RegexSet> {
    for pattern in patterns {
        if *pattern == "*" {
            let regex_set = RegexSet::new([".*"]).expect("regular expression set should compile");
            return Ok(regex_set);
        }
        validate_index_name_pattern(pattern).map_err(|error| {
            let message = format!("failed to build template matcher: {error}");
            MetadataError::InvalidArgument { message }
        })?;
    }
    let regexes = patterns.iter().map(|pattern| build_regex(pattern));

    let regex_set = RegexSet::new(regexes).map_err(|error| {
        let message = format!("failed to build template matcher: {error}");
        MetadataError::InvalidArgument { message }
    })?;
    Ok(regex_set)
}

fn build_regex(pattern: &str) -> String {
    let mut regex = String::new();
    regex.push('^');

    for (idx, part) in pattern.split('*').enumerate() {
        if idx > 0 {
            regex.push_str(".*");
        }
        escape_into(part, &mut regex);
    }
    regex.push('$');
    regex
}
