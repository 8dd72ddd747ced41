// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::Error as _};

use crate::{ConfigError, ConfigurationSection, util::annotate};

fn default_filter() -> String {
    "info".to_owned()
}

fn is_default_filter(value: &String) -> bool {
    *value == default_filter()
}

fn filter_example() -> &'static str {
    "info,idlink_linking=debug,sqlx=warn"
}

/// How log lines are formatted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// The default format, with all the span fields on a single line
    #[default]
    Full,

    /// Shorter lines, only with the fields of the current span
    Compact,

    /// Multi-line, human-friendly output. Only useful for local development
    Pretty,
}

/// Configuration related to logging
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct LogConfig {
    /// Filter directives, in the `RUST_LOG` syntax
    ///
    /// The `RUST_LOG` environment variable takes precedence when set.
    /// Defaults to `info`.
    #[serde(default = "default_filter", skip_serializing_if = "is_default_filter")]
    #[schemars(example = "filter_example")]
    pub filter: String,

    /// Format of the log lines
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    fn is_default(&self) -> bool {
        is_default_filter(&self.filter) && self.format == LogFormat::Full
    }
}

/// Configuration related to logs and metrics
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct TelemetryConfig {
    /// Configuration related to logging
    #[serde(default, skip_serializing_if = "LogConfig::is_default")]
    pub log: LogConfig,
}

impl TelemetryConfig {
    /// Returns true if all fields are at their default values
    pub(crate) fn is_default(&self) -> bool {
        self.log.is_default()
    }
}

impl ConfigurationSection for TelemetryConfig {
    const PATH: Option<&'static str> = Some("telemetry");

    fn validate(&self, figment: &figment::Figment) -> Result<(), ConfigError> {
        if self.log.filter.trim().is_empty() {
            return annotate(
                figment,
                &["telemetry", "log", "filter"],
                figment::Error::custom("the log filter must not be empty"),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        Figment, Jail,
        providers::{Format, Yaml},
    };

    use super::*;

    #[test]
    fn load_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    telemetry:
                      log:
                        filter: debug,sqlx=warn
                        format: compact
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = TelemetryConfig::extract(&figment).map_err(|e| e.to_string())?;

            assert_eq!(config.log.filter, "debug,sqlx=warn");
            assert_eq!(config.log.format, LogFormat::Compact);
            assert!(!config.is_default());

            Ok(())
        });
    }
}
