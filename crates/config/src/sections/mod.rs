// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod database;
mod http;
mod identity_providers;
mod telemetry;

pub use self::{
    database::DatabaseConfig,
    http::HttpConfig,
    identity_providers::{IdentityProvidersConfig, ProviderConfig, ProviderKeys},
    telemetry::{LogConfig, LogFormat, TelemetryConfig},
};
use crate::{ConfigError, util::ConfigurationSection};

/// Application configuration root
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RootConfig {
    /// Configuration of the HTTP server
    #[serde(default, skip_serializing_if = "HttpConfig::is_default")]
    pub http: HttpConfig,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Configuration related to logs and metrics
    #[serde(default, skip_serializing_if = "TelemetryConfig::is_default")]
    pub telemetry: TelemetryConfig,

    /// Identity providers whose ID tokens can be linked
    #[serde(default, skip_serializing_if = "IdentityProvidersConfig::is_default")]
    pub identity_providers: IdentityProvidersConfig,
}

impl ConfigurationSection for RootConfig {
    fn validate(&self, figment: &figment::Figment) -> Result<(), ConfigError> {
        self.http.validate(figment)?;
        self.database.validate(figment)?;
        self.telemetry.validate(figment)?;
        self.identity_providers.validate(figment)?;

        Ok(())
    }
}
