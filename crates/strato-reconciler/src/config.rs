//! Provider-level connection settings.
//!
//! Explicit values win; the process environment fills gaps; the region
//! falls back to the deployment default.

use strato_compute::ConnectionSettings;
use thiserror::Error;

/// Environment fallback for the endpoint URL.
pub const ENDPOINT_ENV: &str = "AWS_ENDPOINT";
/// Environment fallback for the access key id.
pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
/// Environment fallback for the secret access key.
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
/// Region used when the deployment does not partition by region.
pub const DEFAULT_REGION: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("endpoint is required: set it explicitly or via AWS_ENDPOINT")]
    MissingEndpoint,
    #[error("access key is required: set it explicitly or via AWS_ACCESS_KEY_ID")]
    MissingAccessKey,
    #[error("secret key is required: set it explicitly or via AWS_SECRET_ACCESS_KEY")]
    MissingSecretKey,
}

/// Connection settings as the operator supplied them, before environment
/// fallbacks and defaults.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
    pub insecure_skip_tls: bool,
}

impl ProviderSettings {
    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<ConnectionSettings, SettingsError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup, for tests.
    pub fn resolve_with(
        self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ConnectionSettings, SettingsError> {
        let from_env = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let endpoint = non_empty(self.endpoint)
            .or_else(|| from_env(ENDPOINT_ENV))
            .ok_or(SettingsError::MissingEndpoint)?;
        let access_key = non_empty(self.access_key)
            .or_else(|| from_env(ACCESS_KEY_ENV))
            .ok_or(SettingsError::MissingAccessKey)?;
        let secret_key = non_empty(self.secret_key)
            .or_else(|| from_env(SECRET_KEY_ENV))
            .ok_or(SettingsError::MissingSecretKey)?;
        let region = non_empty(self.region).unwrap_or_else(|| DEFAULT_REGION.to_string());

        Ok(ConnectionSettings {
            endpoint,
            access_key,
            secret_key,
            region,
            insecure_skip_tls: self.insecure_skip_tls,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn explicit() -> ProviderSettings {
        ProviderSettings {
            endpoint: Some("https://compute.internal:8773".to_string()),
            access_key: Some("AK".to_string()),
            secret_key: Some("SK".to_string()),
            region: None,
            insecure_skip_tls: false,
        }
    }

    #[test]
    fn explicit_values_resolve_without_environment() {
        let settings = explicit().resolve_with(no_env).unwrap();
        assert_eq!(settings.endpoint, "https://compute.internal:8773");
        assert_eq!(settings.access_key, "AK");
        assert_eq!(settings.secret_key, "SK");
    }

    #[test]
    fn region_defaults_when_unset() {
        let settings = explicit().resolve_with(no_env).unwrap();
        assert_eq!(settings.region, DEFAULT_REGION);

        let mut with_region = explicit();
        with_region.region = Some("cn-north-1".to_string());
        assert_eq!(
            with_region.resolve_with(no_env).unwrap().region,
            "cn-north-1"
        );
    }

    #[test]
    fn environment_fills_missing_values() {
        let settings = ProviderSettings::default()
            .resolve_with(|name| match name {
                ENDPOINT_ENV => Some("http://compute.internal".to_string()),
                ACCESS_KEY_ENV => Some("env-ak".to_string()),
                SECRET_KEY_ENV => Some("env-sk".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings.endpoint, "http://compute.internal");
        assert_eq!(settings.access_key, "env-ak");
        assert_eq!(settings.secret_key, "env-sk");
    }

    #[test]
    fn explicit_values_win_over_environment() {
        let settings = explicit()
            .resolve_with(|_| Some("from-env".to_string()))
            .unwrap();
        assert_eq!(settings.access_key, "AK");
    }

    #[test]
    fn empty_strings_count_as_unset() {
        let mut settings = explicit();
        settings.endpoint = Some(String::new());
        assert_eq!(
            settings.resolve_with(no_env).unwrap_err(),
            SettingsError::MissingEndpoint
        );
    }

    #[test]
    fn each_missing_field_reports_its_own_error() {
        let mut no_access = explicit();
        no_access.access_key = None;
        assert_eq!(
            no_access.resolve_with(no_env).unwrap_err(),
            SettingsError::MissingAccessKey
        );

        let mut no_secret = explicit();
        no_secret.secret_key = None;
        assert_eq!(
            no_secret.resolve_with(no_env).unwrap_err(),
            SettingsError::MissingSecretKey
        );
    }
}
