//! Session establishment against the portal's single sign-on chain.
//!
//! The portal answers the first request with a chain of 302s that bounces
//! through the SSO host and back. Redirects are followed by hand so HTTP
//! Basic credentials can be attached to exactly the hops that target the
//! SSO origin, and so a broken chain ends after [`MAX_AUTH_HOPS`].

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Certificate, StatusCode, Url};

use crate::config::PortalConfig;
use crate::credentials::Credentials;
use crate::error::{GhrsError, Result};

/// Redirects followed before giving up on the authentication chain.
pub const MAX_AUTH_HOPS: usize = 25;

/// A fetched page: where it came from and what it said.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// One request of the authentication chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAttempt {
    pub url: Url,
    /// Whether HTTP Basic credentials were sent with this request.
    pub basic_auth: bool,
    pub status: u16,
    /// Resolved `Location` of a 302 answer.
    pub location: Option<Url>,
}

/// Authenticated portal session.
///
/// Owns the cookie jar the portal uses to track server-side state, and the
/// page the authentication chain landed on, which carries the query form.
#[derive(Debug)]
pub struct Session {
    client: Client,
    landing: Page,
    attempts: Vec<AuthAttempt>,
}

impl Session {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn landing(&self) -> &Page {
        &self.landing
    }

    pub fn attempts(&self) -> &[AuthAttempt] {
        &self.attempts
    }

    /// Number of redirects followed to reach the landing page.
    pub fn hops(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }
}

/// Builds sessions for one portal configuration.
pub struct Authenticator {
    entry_url: Url,
    auth_url: Url,
    timeout: Duration,
    user_agent: String,
    root_certificate: Option<Certificate>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("entry_url", &self.entry_url.as_str())
            .field("auth_url", &self.auth_url.as_str())
            .field("timeout", &self.timeout)
            .field("custom_ca", &self.root_certificate.is_some())
            .finish()
    }
}

impl Authenticator {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let entry_url = parse_url("portal.entry_url", &config.entry_url)?;
        let auth_url = parse_url("portal.auth_url", &config.auth_url)?;

        let root_certificate = match config.ca_cert.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    GhrsError::Config(format!("failed to read portal.ca_cert '{path}': {e}"))
                })?;
                let cert = Certificate::from_pem(&pem).map_err(|e| {
                    GhrsError::Config(format!("invalid certificate in '{path}': {e}"))
                })?;
                Some(cert)
            }
            None => None,
        };

        Ok(Self {
            entry_url,
            auth_url,
            timeout: Duration::from_secs(config.timeout_secs),
            user_agent: config.user_agent.clone(),
            root_certificate,
        })
    }

    pub fn entry_url(&self) -> &Url {
        &self.entry_url
    }

    /// Whether a redirect to `target` should carry Basic credentials.
    pub fn is_auth_target(&self, target: &Url) -> bool {
        target.origin() == self.auth_url.origin()
    }

    /// Run the redirect chain and return the authenticated session.
    ///
    /// Succeeds only when the chain ends in HTTP 200. Any other final
    /// status, including a 302 still pending after [`MAX_AUTH_HOPS`]
    /// redirects, is reported as [`GhrsError::Auth`].
    pub fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let client = self.build_client()?;
        let mut attempts: Vec<AuthAttempt> = Vec::new();

        let mut url = self.entry_url.clone();
        let mut basic_auth = false;
        let response = loop {
            let mut request: RequestBuilder = client.get(url.clone());
            if basic_auth {
                request = request.basic_auth(credentials.identifier(), Some(credentials.secret()));
            }
            let response = request.send().map_err(GhrsError::AuthTransport)?;

            let status = response.status();
            let location = if status == StatusCode::FOUND {
                redirect_target(&url, &response)
            } else {
                None
            };
            tracing::debug!(
                hop = attempts.len(),
                url = %url,
                status = status.as_u16(),
                basic_auth,
                location = location.as_ref().map(Url::as_str),
                "auth request"
            );
            attempts.push(AuthAttempt {
                url: url.clone(),
                basic_auth,
                status: status.as_u16(),
                location: location.clone(),
            });

            let hops = attempts.len() - 1;
            match location {
                Some(next) if hops < MAX_AUTH_HOPS => {
                    basic_auth = self.is_auth_target(&next);
                    url = next;
                }
                _ => break response,
            }
        };

        let hops = attempts.len() - 1;
        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(status = status.as_u16(), hops, "session authentication failed");
            return Err(GhrsError::Auth {
                status: status.as_u16(),
                hops,
            });
        }

        let landing_url = response.url().clone();
        let body = response.text().map_err(GhrsError::AuthTransport)?;
        tracing::info!(hops, user = credentials.identifier(), "session authenticated");

        Ok(Session {
            client,
            landing: Page {
                url: landing_url,
                status: status.as_u16(),
                body,
            },
            attempts,
        })
    }

    fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone());
        if let Some(cert) = &self.root_certificate {
            builder = builder.add_root_certificate(cert.clone());
        }
        builder
            .build()
            .map_err(|e| GhrsError::Config(format!("failed to build HTTP client: {e}")))
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| GhrsError::Config(format!("{name} = '{value}': {e}")))
}

/// `Location` of a redirect, resolved against the URL that produced it.
pub(crate) fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}
