use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::kernel::BasePushNotificationService;

const EXPO_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

/// Expo Push Notification Client
/// Delivers offer notifications to the professionals' mobile app
pub struct ExpoClient {
    client: Client,
    access_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: serde_json::Value,
    sound: &'static str,
    priority: &'static str,
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    data: ExpoTicket,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    message: Option<String>,
}

impl ExpoClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            access_token,
        }
    }
}

#[async_trait]
impl BasePushNotificationService for ExpoClient {
    async fn send_notification(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let message = ExpoMessage {
            to: push_token,
            title,
            body,
            data,
            sound: "default",
            // Offers expire in minutes; ask for immediate delivery
            priority: "high",
        };

        let mut request = self
            .client
            .post(EXPO_PUSH_ENDPOINT)
            .timeout(Duration::from_secs(15))
            .json(&message);

        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            error!("Expo push failed {}: {}", status, body);
            anyhow::bail!("Expo push API error {}: {}", status, body);
        }

        let expo_response: ExpoResponse = response.json().await?;
        check_ticket(&expo_response.data)?;

        info!("Expo notification accepted for delivery");
        Ok(())
    }
}

fn check_ticket(ticket: &ExpoTicket) -> Result<()> {
    if ticket.status == "error" {
        let message = ticket.message.as_deref().unwrap_or("unknown error");
        error!("Expo ticket error: {}", message);
        anyhow::bail!("Expo ticket error: {}", message);
    }
    Ok(())
}
