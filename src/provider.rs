//! Transport contract between a session and the device's HTTP surface

use std::{future::Future, pin::Pin};

use serde::de::DeserializeOwned;

use crate::DeviceError;

/// Query or form parameters of one request
pub type Params = Vec<(&'static str, String)>;

/// Future returned by every [`DeviceProvider`] call
pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<DeviceResponse, DeviceError>> + Send + 'a>>;

/// A transport able to reach the device
/// This is an ugly trait until async traits are object safe
///
/// Implementations resolve with the response body on a success status and
/// fail with [`DeviceError::HttpStatus`] otherwise.
pub trait DeviceProvider: Send + Sync + std::fmt::Debug {
    /// Issues `GET endpoint?params`
    fn get(&self, endpoint: &'static str, params: Params) -> ProviderFuture<'_>;

    /// Issues `POST endpoint` with `params` as an url-encoded form body
    fn post(&self, endpoint: &'static str, params: Params) -> ProviderFuture<'_>;

    fn label(&self) -> &str;
}

/// Body of a successful device response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceResponse {
    body: String,
}

impl DeviceResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn into_text(self) -> String {
        self.body
    }

    /// Parses the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DeviceError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[cfg(feature = "http")]
pub use http::HttpProvider;

#[cfg(feature = "http")]
mod http {
    use tracing::debug;

    use super::{DeviceProvider, DeviceResponse, Params, ProviderFuture};
    use crate::{config::Credentials, DeviceError, SessionConfig};

    /// [`DeviceProvider`] backed by a `reqwest` client
    #[derive(Debug, Clone)]
    pub struct HttpProvider {
        client: reqwest::Client,
        base_url: String,
        credentials: Option<Credentials>,
    }

    impl HttpProvider {
        /// Builds a client for the host, credentials and timeout in `config`
        ///
        /// # Errors
        /// `InvalidConfig` for `https://` hosts, the client is built without TLS
        pub fn new(config: &SessionConfig) -> Result<Self, DeviceError> {
            let base_url = config.base_url();
            if !base_url.starts_with("http://") {
                return Err(DeviceError::InvalidConfig(format!(
                    "{base_url} is not a plain http address"
                )));
            }
            let mut builder = reqwest::Client::builder();
            if let Some(timeout) = config.request_timeout {
                builder = builder.timeout(timeout);
            }
            Ok(Self {
                client: builder.build()?,
                base_url,
                credentials: config.credentials.clone(),
            })
        }

        pub(crate) fn url(&self, endpoint: &str) -> String {
            format!("{}{endpoint}", self.base_url)
        }

        async fn send(
            &self,
            request: reqwest::RequestBuilder,
        ) -> Result<DeviceResponse, DeviceError> {
            let request = match &self.credentials {
                Some(c) => request.basic_auth(&c.username, Some(&c.password)),
                None => request,
            };
            let res = request.send().await?;
            let status = res.status();
            let body = res.text().await?;
            if !status.is_success() {
                debug!("Device responded with {status}: {body}");
                return Err(DeviceError::HttpStatus(status.as_u16(), body));
            }
            Ok(DeviceResponse::new(body))
        }
    }

    impl DeviceProvider for HttpProvider {
        fn get(&self, endpoint: &'static str, params: Params) -> ProviderFuture<'_> {
            Box::pin(async move {
                let request = self.client.get(self.url(endpoint)).query(&params);
                self.send(request).await
            })
        }

        fn post(&self, endpoint: &'static str, params: Params) -> ProviderFuture<'_> {
            Box::pin(async move {
                let request = self.client.post(self.url(endpoint)).form(&params);
                self.send(request).await
            })
        }

        fn label(&self) -> &str {
            &self.base_url
        }
    }
}
