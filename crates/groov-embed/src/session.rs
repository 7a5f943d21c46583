//! Session initiators.
//!
//! Each integration variant knows how to build and run the request sequence
//! that ends in a response carrying the embed URL. The resolver only sees the
//! [`SessionInitiator`] trait.

use std::future::Future;
use std::pin::Pin;

use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::EmbedError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Builds and runs the request sequence for one integration variant.
pub trait SessionInitiator: Send + Sync {
    /// The display name of this variant (for logging).
    fn name(&self) -> &str;

    /// Run the full sequence and return the response whose body carries the
    /// embed URL.
    fn exchange<'a>(
        &'a self,
        transport: &'a dyn HttpTransport,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, EmbedError>> + Send + 'a>>;
}

/// Strip exactly one trailing `/`.
pub fn trim_trailing_slash(endpoint: &str) -> &str {
    endpoint.strip_suffix('/').unwrap_or(endpoint)
}

/// Caller-supplied parameters for a router registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterParams {
    pub registrar_endpoint: String,
    pub auth_header_name: String,
    pub auth_header_value: String,
    pub http_method: String,
}

/// Router-based registration.
///
/// Registers a freshly generated session id with the caller's registrar,
/// then looks the embed up on the Groov service using that id as the
/// credential.
#[derive(Debug, Clone)]
pub struct RouterSession {
    params: RouterParams,
    service: ServiceConfig,
    session_id: String,
}

impl RouterSession {
    pub fn new(params: RouterParams, service: ServiceConfig) -> Self {
        Self::with_session_id(params, service, Uuid::new_v4().to_string())
    }

    /// Use a caller-chosen session id instead of a random one.
    pub fn with_session_id(
        params: RouterParams,
        service: ServiceConfig,
        session_id: String,
    ) -> Self {
        Self {
            params,
            service,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn registration_request(&self) -> HttpRequest {
        let url = format!(
            "{}/{}",
            trim_trailing_slash(&self.params.registrar_endpoint),
            self.session_id
        );
        HttpRequest::new(self.params.http_method.to_lowercase(), url).header(
            self.params.auth_header_name.clone(),
            self.params.auth_header_value.clone(),
        )
    }

    pub fn lookup_request(&self) -> HttpRequest {
        HttpRequest::new("get", self.service.uri.clone())
            .header(self.service.auth_key.clone(), self.session_id.clone())
    }
}

impl SessionInitiator for RouterSession {
    fn name(&self) -> &str {
        "router"
    }

    fn exchange<'a>(
        &'a self,
        transport: &'a dyn HttpTransport,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, EmbedError>> + Send + 'a>> {
        Box::pin(async move {
            let registration = self.registration_request();
            let registered = transport.send(&registration).await?;
            tracing::debug!(
                session_id = %self.session_id,
                status = registered.status,
                "Widget session registered"
            );

            transport.send(&self.lookup_request()).await
        })
    }
}

/// Caller-supplied parameters for a token registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParams {
    pub external_user_id: String,
    pub auth_header_value: String,
}

/// Token-endpoint registration: one `PUT` whose response carries the embed URL.
#[derive(Debug, Clone)]
pub struct TokenSession {
    params: TokenParams,
    service: ServiceConfig,
}

impl TokenSession {
    pub fn new(params: TokenParams, service: ServiceConfig) -> Self {
        Self { params, service }
    }

    pub fn token_request(&self) -> HttpRequest {
        let url = format!(
            "{}/{}/token",
            self.service.token_uri, self.params.external_user_id
        );
        HttpRequest::new("put", url)
            .header(self.service.auth_key.clone(), self.params.auth_header_value.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(serde_json::json!({}))
    }
}

impl SessionInitiator for TokenSession {
    fn name(&self) -> &str {
        "token"
    }

    fn exchange<'a>(
        &'a self,
        transport: &'a dyn HttpTransport,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, EmbedError>> + Send + 'a>> {
        Box::pin(async move { transport.send(&self.token_request()).await })
    }
}
