//! Postmark outbound email client.
//! See: https://postmarkapp.com/developer/api/email-api

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::kernel::{BaseEmailService, EmailMessage};

const POSTMARK_EMAIL_ENDPOINT: &str = "https://api.postmarkapp.com/email";

pub struct PostmarkClient {
    client: Client,
    server_token: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct PostmarkEmail<'a> {
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "To")]
    to: &'a str,
    #[serde(rename = "Subject")]
    subject: &'a str,
    #[serde(rename = "TextBody")]
    text_body: &'a str,
    #[serde(rename = "HtmlBody", skip_serializing_if = "Option::is_none")]
    html_body: Option<&'a str>,
    #[serde(rename = "MessageStream")]
    message_stream: &'static str,
}

#[derive(Debug, Deserialize)]
struct PostmarkResponse {
    #[serde(rename = "ErrorCode")]
    error_code: i64,
    #[serde(rename = "Message")]
    message: String,
}

impl PostmarkClient {
    pub fn new(server_token: String, from: String) -> Self {
        Self {
            client: Client::new(),
            server_token,
            from,
        }
    }
}

#[async_trait]
impl BaseEmailService for PostmarkClient {
    async fn send_email(&self, message: &EmailMessage) -> Result<()> {
        let email = PostmarkEmail {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text_body: &message.text_body,
            html_body: message.html_body.as_deref(),
            message_stream: "outbound",
        };

        let response = self
            .client
            .post(POSTMARK_EMAIL_ENDPOINT)
            .timeout(Duration::from_secs(15))
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.server_token)
            .json(&email)
            .send()
            .await?;

        let status = response.status();
        let body: PostmarkResponse = response.json().await?;

        if !status.is_success() || body.error_code != 0 {
            error!(
                status = %status,
                error_code = body.error_code,
                "Postmark send failed: {}",
                body.message
            );
            anyhow::bail!("Postmark error {}: {}", body.error_code, body.message);
        }

        info!("Email accepted by Postmark");
        Ok(())
    }
}
