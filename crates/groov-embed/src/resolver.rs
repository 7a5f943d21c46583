use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::{EmbedOptions, GroovConfig, ServiceConfig};
use crate::error::{ConfigError, EmbedError, FAILURE_MESSAGE};
use crate::render::{self, EmbedHost, Style, View};
use crate::response::EmbedResponse;
use crate::session::{RouterParams, RouterSession, SessionInitiator, TokenParams, TokenSession};
use crate::transport::HttpTransport;

/// Tri-state outcome of one activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum EmbedStatus {
    Loading,
    Failed(String),
    /// Resolved; the URL is absent when the service did not return one.
    Ready(Option<String>),
}

impl EmbedStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, EmbedStatus::Loading)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    status: EmbedStatus,
    disposed: bool,
}

/// Completes once the activation behind `rx` is disposed.
async fn disposal(rx: &mut watch::Receiver<Slot>) {
    loop {
        if rx.borrow_and_update().disposed {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Run a session's exchange and pull the embed URL out of the final response.
pub async fn resolve_embed_url(
    session: &dyn SessionInitiator,
    transport: &dyn HttpTransport,
    options: &EmbedOptions,
) -> Result<Option<String>, EmbedError> {
    let response = session.exchange(transport).await?;
    let url = EmbedResponse::from_body(&response.body)?.into_embed_url();

    if url.is_none() {
        if options.require_url {
            return Err(EmbedError::MissingEmbedUrl);
        }
        tracing::warn!(
            session = session.name(),
            "Response has no campaign.groovEmbedUrl, rendering without a URL"
        );
    }
    Ok(url)
}

/// Entry point for embedding: owns the service config and HTTP transport and
/// starts one [`EmbedActivation`] per mounted widget.
pub struct EmbedResolver {
    service: ServiceConfig,
    transport: Arc<dyn HttpTransport>,
    options: EmbedOptions,
}

impl EmbedResolver {
    pub fn new(
        service: ServiceConfig,
        transport: Arc<dyn HttpTransport>,
        options: EmbedOptions,
    ) -> Self {
        Self {
            service,
            transport,
            options,
        }
    }

    pub fn from_config(config: &GroovConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(
            config.service.clone(),
            config.build_transport()?,
            config.embed.clone(),
        ))
    }

    /// Mount a router-registered widget. A new session id is generated for
    /// this activation.
    pub fn activate_router(&self, params: RouterParams, frame_style: Style) -> EmbedActivation {
        let session = RouterSession::new(params, self.service.clone());
        tracing::debug!(session_id = %session.session_id(), "Generated widget session id");
        self.activate(Arc::new(session), frame_style)
    }

    /// Mount a token-registered widget.
    pub fn activate_token(&self, params: TokenParams, frame_style: Style) -> EmbedActivation {
        let session = TokenSession::new(params, self.service.clone());
        self.activate(Arc::new(session), frame_style)
    }

    /// Mount a widget driven by any session initiator.
    ///
    /// Spawns the fetch on the current tokio runtime; must be called from
    /// within one.
    pub fn activate(
        &self,
        session: Arc<dyn SessionInitiator>,
        frame_style: Style,
    ) -> EmbedActivation {
        let (tx, mut rx) = watch::channel(Slot {
            status: EmbedStatus::Loading,
            disposed: false,
        });
        let shared = Arc::new(tx);

        let task_shared = Arc::clone(&shared);
        let transport = Arc::clone(&self.transport);
        let options = self.options.clone();
        let task_session = Arc::clone(&session);

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = disposal(&mut rx) => {
                    tracing::debug!(
                        session = task_session.name(),
                        "Activation disposed mid-fetch, abandoning request"
                    );
                    return;
                }
                result = resolve_embed_url(
                    task_session.as_ref(),
                    transport.as_ref(),
                    &options,
                ) => result,
            };

            let next = match outcome {
                Ok(url) => EmbedStatus::Ready(url),
                Err(err) => {
                    tracing::error!(
                        session = task_session.name(),
                        error = %err,
                        detail = ?err,
                        response = ?err.response_body(),
                        "Error while fetching Groov embed URL"
                    );
                    EmbedStatus::Failed(FAILURE_MESSAGE.to_string())
                }
            };

            let applied = task_shared.send_if_modified(|slot| {
                if slot.disposed || slot.status.is_settled() {
                    return false;
                }
                slot.status = next;
                true
            });
            if !applied {
                tracing::debug!(
                    session = task_session.name(),
                    "Dropping embed result for a disposed activation"
                );
            }
        });

        EmbedActivation {
            shared,
            session_name: session.name().to_string(),
            frame_style,
        }
    }
}

/// One mounted widget.
///
/// The fetch runs exactly once, when the activation is created. Rendering is
/// a pure read of the current status. Dropping or disposing the activation
/// cancels an in-flight fetch and discards any late result.
pub struct EmbedActivation {
    shared: Arc<watch::Sender<Slot>>,
    session_name: String,
    frame_style: Style,
}

impl EmbedActivation {
    pub fn status(&self) -> EmbedStatus {
        self.shared.borrow().status.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.borrow().disposed
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn render(&self) -> View {
        render::render(&self.status(), &self.frame_style)
    }

    pub fn render_into(&self, host: &dyn EmbedHost) {
        host.show(&self.render());
    }

    /// Wait until the status settles (or the activation is disposed) and
    /// return it.
    pub async fn wait(&self) -> EmbedStatus {
        let mut rx = self.shared.subscribe();
        match rx
            .wait_for(|slot| slot.status.is_settled() || slot.disposed)
            .await
        {
            Ok(slot) => slot.status.clone(),
            Err(_) => self.status(),
        }
    }

    pub fn dispose(&self) {
        let changed = self.shared.send_if_modified(|slot| {
            if slot.disposed {
                return false;
            }
            slot.disposed = true;
            true
        });
        if changed {
            tracing::debug!(session = %self.session_name, "Activation disposed");
        }
    }
}

impl Drop for EmbedActivation {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::render::PageLoadError;
    use crate::transport::{StubReply, StubTransport};

    fn service() -> ServiceConfig {
        ServiceConfig {
            uri: "https://groov.test/widget".into(),
            token_uri: "https://groov.test/users".into(),
            auth_key: "x-groov-auth".into(),
        }
    }

    fn router_params() -> RouterParams {
        RouterParams {
            registrar_endpoint: "https://bank.test/widgets/".into(),
            auth_header_name: "x-bank-auth".into(),
            auth_header_value: "secret".into(),
            http_method: "POST".into(),
        }
    }

    fn token_params() -> TokenParams {
        TokenParams {
            external_user_id: "abc123".into(),
            auth_header_value: "tok".into(),
        }
    }

    fn embed_body(url: &str) -> StubReply {
        StubReply::ok_json(serde_json::json!({"campaign": {"groovEmbedUrl": url}}))
    }

    fn resolver(stub: Arc<StubTransport>, options: EmbedOptions) -> EmbedResolver {
        EmbedResolver::new(service(), stub, options)
    }

    #[tokio::test]
    async fn router_activation_becomes_ready() {
        let stub = Arc::new(StubTransport::new(vec![
            StubReply::status(200, ""),
            embed_body("https://e.x"),
        ]));
        let activation = resolver(stub.clone(), EmbedOptions::default())
            .activate_router(router_params(), Style::new());

        assert_eq!(activation.status(), EmbedStatus::Loading);
        let status = activation.wait().await;
        assert_eq!(status, EmbedStatus::Ready(Some("https://e.x".into())));
        assert_eq!(stub.call_count(), 2);
        assert_eq!(activation.session_name(), "router");
    }

    #[tokio::test]
    async fn failed_registration_ends_in_error_without_retry() {
        let stub = Arc::new(StubTransport::new(vec![StubReply::NetworkError(
            "connection refused".into(),
        )]));
        let activation = resolver(stub.clone(), EmbedOptions::default())
            .activate_router(router_params(), Style::new());

        let status = activation.wait().await;
        assert_eq!(status, EmbedStatus::Failed(FAILURE_MESSAGE.into()));
        assert_eq!(stub.call_count(), 1);

        match activation.render() {
            View::ErrorText { message, .. } => assert_eq!(message, FAILURE_MESSAGE),
            other => panic!("expected error view, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_2xx_lookup_is_a_failure() {
        let stub = Arc::new(StubTransport::new(vec![
            StubReply::status(200, ""),
            StubReply::status(403, r#"{"error":"forbidden"}"#),
        ]));
        let activation = resolver(stub, EmbedOptions::default())
            .activate_router(router_params(), Style::new());
        assert_eq!(
            activation.wait().await,
            EmbedStatus::Failed(FAILURE_MESSAGE.into())
        );
    }

    #[tokio::test]
    async fn missing_url_is_ready_without_url() {
        let stub = Arc::new(StubTransport::new(vec![
            StubReply::status(200, ""),
            StubReply::ok_json(serde_json::json!({"campaign": {}})),
        ]));
        let activation = resolver(stub, EmbedOptions::default())
            .activate_router(router_params(), Style::new());

        assert_eq!(activation.wait().await, EmbedStatus::Ready(None));
        let View::WebPage { page, .. } = activation.render() else {
            panic!("expected web page view");
        };
        assert!(page.source.uri.is_none());
    }

    #[tokio::test]
    async fn missing_url_fails_when_required() {
        let stub = Arc::new(StubTransport::new(vec![StubReply::ok_json(
            serde_json::json!({}),
        )]));
        let activation = resolver(stub, EmbedOptions { require_url: true })
            .activate_token(token_params(), Style::new());
        assert_eq!(
            activation.wait().await,
            EmbedStatus::Failed(FAILURE_MESSAGE.into())
        );
    }

    #[tokio::test]
    async fn wrongly_shaped_campaign_is_ready_without_url() {
        let stub = Arc::new(StubTransport::new(vec![StubReply::ok_json(
            serde_json::json!({"campaign": "inactive"}),
        )]));
        let activation = resolver(stub, EmbedOptions::default())
            .activate_token(token_params(), Style::new());
        assert_eq!(activation.wait().await, EmbedStatus::Ready(None));
    }

    #[tokio::test]
    async fn malformed_body_is_a_failure() {
        let stub = Arc::new(StubTransport::new(vec![StubReply::status(200, "not json")]));
        let activation = resolver(stub, EmbedOptions::default())
            .activate_token(token_params(), Style::new());
        assert_eq!(
            activation.wait().await,
            EmbedStatus::Failed(FAILURE_MESSAGE.into())
        );
    }

    #[tokio::test]
    async fn token_activation_sends_one_put() {
        let stub = Arc::new(StubTransport::new(vec![embed_body("https://e.x/t")]));
        let activation = resolver(stub.clone(), EmbedOptions::default())
            .activate_token(token_params(), Style::new());

        assert_eq!(
            activation.wait().await,
            EmbedStatus::Ready(Some("https://e.x/t".into()))
        );
        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "put");
        assert_eq!(requests[0].url, "https://groov.test/users/abc123/token");
        assert_eq!(requests[0].header_value("x-groov-auth"), Some("tok"));
    }

    #[tokio::test]
    async fn rerendering_does_not_refetch() {
        let stub = Arc::new(StubTransport::new(vec![embed_body("https://e.x")]));
        let activation = resolver(stub.clone(), EmbedOptions::default())
            .activate_token(token_params(), Style::new());
        activation.wait().await;

        let first = activation.render();
        for _ in 0..5 {
            assert_eq!(activation.render(), first);
        }
        assert_eq!(activation.wait().await, activation.status());
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn result_after_dispose_is_dropped() {
        let stub = Arc::new(
            StubTransport::new(vec![embed_body("https://e.x")]).with_delay(Duration::from_secs(5)),
        );
        let activation = resolver(stub.clone(), EmbedOptions::default())
            .activate_token(token_params(), Style::new());

        // Let the spawned fetch reach the transport.
        tokio::task::yield_now().await;
        activation.dispose();
        assert!(activation.is_disposed());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(stub.call_count(), 1);
        assert_eq!(stub.delivered_count(), 0);
        assert_eq!(activation.status(), EmbedStatus::Loading);
        assert_eq!(activation.wait().await, EmbedStatus::Loading);
        assert!(matches!(activation.render(), View::Spinner { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_activation_abandons_fetch() {
        let stub = Arc::new(
            StubTransport::new(vec![embed_body("https://e.x")]).with_delay(Duration::from_secs(5)),
        );
        let activation = resolver(stub.clone(), EmbedOptions::default())
            .activate_token(token_params(), Style::new());

        tokio::task::yield_now().await;
        assert_eq!(stub.call_count(), 1);
        drop(activation);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(stub.call_count(), 1);
        assert_eq!(stub.delivered_count(), 0);
    }

    #[tokio::test]
    async fn separate_activations_use_separate_session_ids() {
        let stub = Arc::new(StubTransport::new(vec![
            StubReply::status(200, ""),
            embed_body("https://e.x/1"),
            StubReply::status(200, ""),
            embed_body("https://e.x/2"),
        ]));
        let resolver = resolver(stub.clone(), EmbedOptions::default());

        let first = resolver.activate_router(router_params(), Style::new());
        first.wait().await;
        let second = resolver.activate_router(router_params(), Style::new());
        second.wait().await;

        let requests = stub.requests();
        assert_eq!(requests.len(), 4);
        assert_ne!(requests[0].url, requests[2].url);
        assert!(requests[0].url.starts_with("https://bank.test/widgets/"));
    }

    struct RecordingHost(std::sync::Mutex<Vec<String>>);

    impl EmbedHost for RecordingHost {
        fn show(&self, view: &View) {
            self.0.lock().unwrap().push(view.kind().to_string());
        }
    }

    #[tokio::test]
    async fn page_load_errors_do_not_change_status() {
        let stub = Arc::new(StubTransport::new(vec![embed_body("https://e.x")]));
        let activation = resolver(stub, EmbedOptions::default())
            .activate_token(token_params(), Style::new().with("height", 400));
        activation.wait().await;

        let host = RecordingHost(std::sync::Mutex::new(Vec::new()));
        activation.render_into(&host);
        host.on_load_error(&PageLoadError {
            url: Some("https://e.x".into()),
            code: Some(-6),
            description: "net::ERR_CONNECTION_REFUSED".into(),
        });
        activation.render_into(&host);

        assert_eq!(activation.status(), EmbedStatus::Ready(Some("https://e.x".into())));
        assert_eq!(*host.0.lock().unwrap(), vec!["web_page", "web_page"]);
    }
}
