// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use figment::Figment;
use serde::de::DeserializeOwned;

/// Errors returned when loading a section
pub type ConfigError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Trait implemented by all configuration sections, to load and validate a
/// specific part of the configuration
pub trait ConfigurationSection: Sized + DeserializeOwned {
    /// Where this section lives relative to the root
    const PATH: Option<&'static str> = None;

    /// Validate the configuration section
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    fn validate(&self, _figment: &Figment) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Extract the section from a [`Figment`] and validate it
    ///
    /// # Errors
    ///
    /// Returns an error if the section could not be loaded or is invalid
    fn extract(figment: &Figment) -> Result<Self, ConfigError> {
        let this: Self = if let Some(path) = Self::PATH {
            figment.extract_inner(path)?
        } else {
            figment.extract()?
        };

        this.validate(figment)?;
        Ok(this)
    }
}

/// Extension trait for [`ConfigurationSection`] with a [`Default`], to fall
/// back to the default value when the section is absent
pub trait ConfigurationSectionExt: ConfigurationSection + Default {
    /// Extract the section from the given [`Figment`], or return the default
    /// value if the section is not present
    ///
    /// # Errors
    ///
    /// Returns an error if the section is present but invalid
    fn extract_or_default(figment: &Figment) -> Result<Self, ConfigError> {
        let this: Self = if let Some(path) = Self::PATH {
            if !figment.contains(path) {
                return Ok(Self::default());
            }

            figment.extract_inner(path)?
        } else {
            figment.extract()?
        };

        this.validate(figment)?;
        Ok(this)
    }
}

impl<T: ConfigurationSection + Default> ConfigurationSectionExt for T {}

/// Attach the location of a value to a validation error, so that it points
/// to the right place in the configuration files
pub(crate) fn annotate(
    figment: &Figment,
    path: &[&str],
    mut error: figment::Error,
) -> Result<(), ConfigError> {
    error.metadata = figment.find_metadata(&path.join(".")).cloned();
    error.profile = Some(figment::Profile::Default);
    error.path = path.iter().map(|&segment| segment.to_owned()).collect();
    Err(error.into())
}
