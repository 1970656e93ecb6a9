//! Per-instance Confluence client handles.
//!
//! The handle carries the tenant's base URL and an HTTP client with the
//! credential pre-applied as a default Authorization header. The CRUD
//! calls themselves live with the tool handlers; routing only promises
//! "given a resolved client handle, perform one call".

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

use wikimux_core::{ConfigError, InstanceConfig, InstanceCredential};

/// An authorized handle bound to one tenant.
#[derive(Debug)]
pub struct ConfluenceClient {
    instance_name: String,
    base_url: String,
    http: reqwest::Client,
}

impl ConfluenceClient {
    pub fn new(instance_name: &str, config: &InstanceConfig) -> Result<Self, ConfigError> {
        let base_url = config.base_url();
        url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidInstance {
            name: instance_name.to_string(),
            reason: format!("invalid domain: {e}"),
        })?;

        let auth_value = match &config.credential {
            InstanceCredential::Basic { email, api_token } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{email}:{api_token}"));
                format!("Basic {encoded}")
            }
            InstanceCredential::Oauth2 { access_token, .. } => {
                format!("Bearer {access_token}")
            }
        };

        let mut auth = HeaderValue::from_str(&auth_value).map_err(|_| {
            ConfigError::InvalidInstance {
                name: instance_name.to_string(),
                reason: "credential contains characters invalid in an Authorization header"
                    .to_string(),
            }
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::InvalidInstance {
                name: instance_name.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        debug!(
            instance = %instance_name,
            base_url = %base_url,
            "[ConfluenceClient] Client handle created"
        );

        Ok(Self {
            instance_name: instance_name.to_string(),
            base_url,
            http,
        })
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Prepare a request against the tenant's REST API.
    pub fn request(&self, method: reqwest::Method, api_path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, api_path.trim_start_matches('/'));
        self.http.request(method, url)
    }
}
