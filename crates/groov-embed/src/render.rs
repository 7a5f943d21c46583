use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resolver::EmbedStatus;

/// A flat bag of layout properties, keyed by property name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Style(BTreeMap<String, serde_json::Value>);

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Parse a caller-supplied style object such as `{"height": 400}`.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// `self` with every property of `overrides` applied on top.
    pub fn merged(&self, overrides: &Style) -> Style {
        let mut merged = self.0.clone();
        merged.extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Style(merged)
    }
}

fn center_style() -> Style {
    Style::new()
        .with("flex", 1)
        .with("justifyContent", "center")
        .with("alignItems", "center")
        .with("padding", 20)
}

fn error_text_style() -> Style {
    Style::new()
        .with("color", "red")
        .with("fontSize", 16)
        .with("textAlign", "center")
}

/// Full-bleed layout the caller's frame style is merged onto.
pub fn default_frame_style() -> Style {
    Style::new().with("flex", 1).with("width", "100%")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorSize {
    Small,
    Large,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub size: IndicatorSize,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSource {
    /// Absent when the service answered without an embed URL.
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPageProps {
    pub source: PageSource,
    pub javascript_enabled: bool,
    pub dom_storage_enabled: bool,
    pub start_in_loading_state: bool,
}

/// What the host should display for the current embed status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    Spinner {
        container: Style,
        indicator: Indicator,
    },
    ErrorText {
        container: Style,
        text_style: Style,
        message: String,
    },
    WebPage {
        container: Style,
        page: WebPageProps,
    },
}

impl View {
    pub fn kind(&self) -> &'static str {
        match self {
            View::Spinner { .. } => "spinner",
            View::ErrorText { .. } => "error_text",
            View::WebPage { .. } => "web_page",
        }
    }
}

pub fn render(status: &EmbedStatus, frame_style: &Style) -> View {
    match status {
        EmbedStatus::Loading => View::Spinner {
            container: center_style(),
            indicator: Indicator {
                size: IndicatorSize::Large,
                color: "#0000ff".into(),
            },
        },
        EmbedStatus::Failed(message) => View::ErrorText {
            container: center_style(),
            text_style: error_text_style(),
            message: message.clone(),
        },
        EmbedStatus::Ready(url) => View::WebPage {
            container: default_frame_style().merged(frame_style),
            page: WebPageProps {
                source: PageSource { uri: url.clone() },
                javascript_enabled: true,
                dom_storage_enabled: true,
                start_in_loading_state: true,
            },
        },
    }
}

/// A load failure reported by the page host after the view was shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLoadError {
    pub url: Option<String>,
    pub code: Option<i64>,
    pub description: String,
}

/// Something that can display a [`View`].
pub trait EmbedHost: Send + Sync {
    fn show(&self, view: &View);

    /// Called by the host when the embedded page fails to load. This never
    /// affects the embed status.
    fn on_load_error(&self, error: &PageLoadError) {
        tracing::error!(
            url = ?error.url,
            code = ?error.code,
            description = %error.description,
            "Embedded page failed to load"
        );
    }
}

/// Host that only logs what it would show.
pub struct LoggingHost;

impl EmbedHost for LoggingHost {
    fn show(&self, view: &View) {
        match view {
            View::WebPage { page, .. } => {
                tracing::info!(uri = ?page.source.uri, "Showing embedded page")
            }
            View::ErrorText { message, .. } => tracing::info!(%message, "Showing error"),
            View::Spinner { .. } => tracing::info!("Showing spinner"),
        }
    }
}
