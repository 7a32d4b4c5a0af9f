//! Connection configuration shape and validation

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Authentication methods a session may be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticationType {
    #[default]
    Default,
    Ntlm,
    AzureActiveDirectoryPassword,
    AzureActiveDirectoryAccessToken,
    AzureActiveDirectoryMsiVm,
    AzureActiveDirectoryMsiAppService,
}

impl AuthenticationType {
    pub const ALL: [Self; 6] = [
        Self::Default,
        Self::Ntlm,
        Self::AzureActiveDirectoryPassword,
        Self::AzureActiveDirectoryAccessToken,
        Self::AzureActiveDirectoryMsiVm,
        Self::AzureActiveDirectoryMsiAppService,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Ntlm => "ntlm",
            Self::AzureActiveDirectoryPassword => "azure-active-directory-password",
            Self::AzureActiveDirectoryAccessToken => "azure-active-directory-access-token",
            Self::AzureActiveDirectoryMsiVm => "azure-active-directory-msi-vm",
            Self::AzureActiveDirectoryMsiAppService => "azure-active-directory-msi-app-service",
        }
    }
}

impl fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthenticationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::config(format!("Invalid authentication type: '{s}'")))
    }
}

/// Connection settings passed through to the session untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt: Option<bool>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuthenticationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAuthentication {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<RawAuthenticationOptions>,
}

/// Unvalidated configuration as read from a file, JSON document or code.
///
/// Every field is optional here; [`RawConfig::validate`] enforces what a
/// session actually needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<RawAuthentication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ConnectionOptions>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl RawConfig {
    /// Check required fields and normalize the authentication type.
    ///
    /// An omitted authentication type becomes [`AuthenticationType::Default`].
    pub fn validate(self) -> Result<SqlConfig> {
        let server = present(self.server).ok_or_else(|| Error::config("No server configured"))?;
        let authentication = self
            .authentication
            .ok_or_else(|| Error::config("No authentication provided"))?;

        let kind = match present(authentication.kind) {
            Some(kind) => kind.parse()?,
            None => AuthenticationType::Default,
        };

        let options = authentication.options.unwrap_or_default();
        let (Some(user_name), Some(password)) =
            (present(options.user_name), present(options.password))
        else {
            return Err(Error::config("No user or pass provided"));
        };

        Ok(SqlConfig {
            server,
            authentication: Authentication {
                kind,
                options: AuthenticationOptions {
                    user_name,
                    password,
                    domain: options.domain,
                    extra: options.extra,
                },
            },
            options: self.options.unwrap_or_default(),
        })
    }
}

#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub user_name: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl fmt::Debug for AuthenticationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationOptions")
            .field("user_name", &self.user_name)
            .field("password", &"***")
            .field("domain", &self.domain)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Authentication {
    #[serde(rename = "type")]
    pub kind: AuthenticationType,
    pub options: AuthenticationOptions,
}

/// Validated configuration used to construct sessions.
///
/// Kept by the connection manager for the lifetime of the client so a
/// terminally closed session can be rebuilt with identical settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlConfig {
    server: String,
    authentication: Authentication,
    options: ConnectionOptions,
}

impl SqlConfig {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    #[must_use]
    pub const fn authentication(&self) -> &Authentication {
        &self.authentication
    }

    #[must_use]
    pub const fn options(&self) -> &ConnectionOptions {
        &self.options
    }
}

impl TryFrom<RawConfig> for SqlConfig {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self> {
        raw.validate()
    }
}

/// Configuration builder with fluent API
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    raw: RawConfig,
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: RawConfig {
                server: None,
                authentication: None,
                options: None,
            },
        }
    }

    fn auth(&mut self) -> &mut RawAuthentication {
        self.raw.authentication.get_or_insert_with(Default::default)
    }

    fn auth_options(&mut self) -> &mut RawAuthenticationOptions {
        self.auth().options.get_or_insert_with(Default::default)
    }

    fn connection_options(&mut self) -> &mut ConnectionOptions {
        self.raw.options.get_or_insert_with(Default::default)
    }

    #[must_use]
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.raw.server = Some(server.into());
        self
    }

    #[must_use]
    pub fn authentication_type(mut self, kind: AuthenticationType) -> Self {
        self.auth().kind = Some(kind.as_str().to_string());
        self
    }

    #[must_use]
    pub fn user_name(mut self, user_name: impl Into<String>) -> Self {
        self.auth_options().user_name = Some(user_name.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth_options().password = Some(password.into());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.auth_options().domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.connection_options().database = Some(database.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.connection_options().port = Some(port);
        self
    }

    #[must_use]
    pub fn encrypt(mut self, encrypt: bool) -> Self {
        self.connection_options().encrypt = Some(encrypt);
        self
    }

    /// Hand back the unvalidated shape, e.g. to layer env overrides on top.
    #[must_use]
    pub fn into_raw(self) -> RawConfig {
        self.raw
    }

    pub fn build(self) -> Result<SqlConfig> {
        self.raw.validate()
    }
}
