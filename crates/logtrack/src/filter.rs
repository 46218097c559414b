// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decides which processes' logs are forwarded.
//!
//! Patterns are shell globs (`*`, `?`, bracket classes) compiled once at
//! startup from the comma-separated `include`/`exclude` configuration values.
//! The literal value `"*"` is a wildcard mode switch, not a pattern: it makes
//! the corresponding side match every process.

use crate::errors::ConfigError;
use glob::Pattern;

const MATCH_ALL: &str = "*";

/// Immutable include/exclude pattern lists, built once from configuration.
#[derive(Debug, Default)]
pub struct PatternSet {
    listen: Vec<Pattern>,
    ignore: Vec<Pattern>,
    include_all: bool,
    exclude_all: bool,
}

impl PatternSet {
    /// Compiles the raw configuration values into a pattern set.
    pub fn from_config(
        include: Option<&str>,
        exclude: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let include_all = include == Some(MATCH_ALL);
        let exclude_all = exclude == Some(MATCH_ALL);

        // The wildcard sentinel switches modes; it is never compiled as a
        // pattern of its own.
        let listen = if include_all {
            Vec::new()
        } else {
            compile_list(include)?
        };
        let ignore = if exclude_all {
            Vec::new()
        } else {
            compile_list(exclude)?
        };

        Ok(PatternSet {
            listen,
            ignore,
            include_all,
            exclude_all,
        })
    }

    /// Whether logs for `process_name` should enter the pipeline.
    ///
    /// Precedence: include-all forwards everything not ignored; exclude-all
    /// forwards only listed processes; otherwise a process must be listed and
    /// not ignored. Pure and deterministic.
    pub fn should_forward(&self, process_name: &str) -> bool {
        if self.include_all {
            !matches_any(&self.ignore, process_name)
        } else if self.exclude_all {
            matches_any(&self.listen, process_name)
        } else {
            matches_any(&self.listen, process_name) && !matches_any(&self.ignore, process_name)
        }
    }

    pub fn listen_count(&self) -> usize {
        self.listen.len()
    }

    pub fn ignore_count(&self) -> usize {
        self.ignore.len()
    }
}

fn matches_any(patterns: &[Pattern], name: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(name))
}

fn compile_list(raw: Option<&str>) -> Result<Vec<Pattern>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            Pattern::new(entry).map_err(|source| ConfigError::Pattern {
                pattern: entry.to_string(),
                source,
            })
        })
        .collect()
}
