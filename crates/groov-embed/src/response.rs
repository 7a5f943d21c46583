use serde_json::Value;

use crate::error::EmbedError;

/// Body returned by the Groov service, reduced to the part we read.
///
/// Every level of `campaign.groovEmbedUrl` is optional: a missing key, a
/// `null`, or a value of the wrong shape at any level all decode to an
/// absent campaign or URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedResponse {
    pub campaign: Option<Campaign>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Campaign {
    pub groov_embed_url: Option<String>,
}

impl EmbedResponse {
    /// Decode a response body. Only a body that is not JSON at all (an empty
    /// body included) is an error.
    pub fn from_body(body: &str) -> Result<Self, EmbedError> {
        let value: Value = serde_json::from_str(body)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        let campaign = value
            .as_object()
            .and_then(|root| root.get("campaign"))
            .and_then(Value::as_object)
            .map(|campaign| Campaign {
                groov_embed_url: campaign
                    .get("groovEmbedUrl")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        Self { campaign }
    }

    pub fn embed_url(&self) -> Option<&str> {
        self.campaign
            .as_ref()
            .and_then(|c| c.groov_embed_url.as_deref())
    }

    pub fn into_embed_url(self) -> Option<String> {
        self.campaign.and_then(|c| c.groov_embed_url)
    }
}
