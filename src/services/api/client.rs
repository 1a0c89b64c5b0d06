use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{CallRequest, ServerApi};
use crate::config::{ClientConfig, Endpoints};
use crate::error::{ClientError, Result};
use crate::kernel::event::{CallAck, ReplyRecord, SubscribeAck};
use crate::kernel::subscription::SubscriptionDescriptor;

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    endpoints: Endpoints,
}

#[derive(Serialize)]
struct ReplyBody<'a> {
    minutes: &'a str,
}

impl ApiClient {
    pub fn new(base_url: Url, endpoints: Endpoints, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url,
            endpoints,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ClientError::Network(format!("invalid base url {:?}: {e}", config.base_url))
        })?;
        Ok(Self::new(base_url, config.endpoints.clone(), config.request_timeout()))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Network(format!("invalid endpoint {path:?}: {e}")))
    }
}

fn check_status(response: Response) -> Result<Response> {
    if !response.status().is_success() {
        return Err(ClientError::Network(format!("server error: {}", response.status())));
    }
    Ok(response)
}

impl ServerApi for ApiClient {
    async fn post_call(&self, call: CallRequest) -> Result<CallAck> {
        let url = self.endpoint(&self.endpoints.call)?;
        let request = match call {
            CallRequest::Ring => self.client.post(url),
            CallRequest::RingWithVoice(clip) => {
                debug!("uploading {} bytes of voice ({} ms)", clip.len(), clip.duration_ms());
                let part = Part::bytes(clip.into_wav())
                    .file_name("voice.wav")
                    .mime_str("audio/wav")?;
                self.client.post(url).multipart(Form::new().part("audio", part))
            }
        };

        let response = check_status(request.send().await?)?;
        Ok(response.json::<CallAck>().await?)
    }

    async fn subscribe(&self, subscription: &SubscriptionDescriptor) -> Result<SubscribeAck> {
        let url = self.endpoint(&self.endpoints.subscribe)?;
        let request = self.client.post(url).json(subscription.as_json());
        let response = check_status(request.send().await?)?;
        Ok(response.json::<SubscribeAck>().await?)
    }

    async fn poll_reply(&self) -> Result<ReplyRecord> {
        let url = self.endpoint(&self.endpoints.poll_reply)?;
        let response = check_status(self.client.get(url).send().await?)?;
        Ok(response.json::<ReplyRecord>().await?)
    }

    async fn post_reply(&self, minutes: &str) -> Result<()> {
        let url = self.endpoint(&self.endpoints.reply)?;
        check_status(self.client.post(url).json(&ReplyBody { minutes }).send().await?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_resolve_from_site_root() {
        let base = Url::parse("http://localhost:5000/app/").unwrap();
        let api = ApiClient::new(base, Endpoints::default(), Duration::from_secs(1));
        assert_eq!(
            api.endpoint(&api.endpoints.poll_reply).unwrap().as_str(),
            "http://localhost:5000/api/poll_reply"
        );
    }

    #[test]
    fn reply_body_shape() {
        let body = serde_json::to_value(ReplyBody { minutes: "5 minutes" }).unwrap();
        assert_eq!(body, serde_json::json!({ "minutes": "5 minutes" }));
    }
}
