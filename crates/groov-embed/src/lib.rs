//! Headless Groov widget embed.
//!
//! A widget is mounted by creating an [`EmbedActivation`] through an
//! [`EmbedResolver`]. The activation registers a session with the configured
//! backend, resolves the embed URL and exposes the current [`View`] for a
//! host to display.

pub mod config;
pub mod error;
pub mod render;
pub mod resolver;
pub mod response;
pub mod session;
pub mod transport;

pub use config::{EmbedOptions, GroovConfig, HttpConfig, ServiceConfig};
pub use error::{ConfigError, EmbedError, FAILURE_MESSAGE};
pub use render::{EmbedHost, LoggingHost, PageLoadError, Style, View, render};
pub use resolver::{EmbedActivation, EmbedResolver, EmbedStatus, resolve_embed_url};
pub use session::{RouterParams, RouterSession, SessionInitiator, TokenParams, TokenSession};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
