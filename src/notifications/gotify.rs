use reqwest::Client;
use serde::Serialize;

use super::{NotificationError, NotificationMessage};

/// Client for Gotify push notifications
/// https://gotify.net/docs/pushmsg
pub struct GotifyClient {
    client: Client,
    url: String,
    token: String,
}

#[derive(Serialize)]
struct GotifyMessage {
    title: String,
    message: String,
    priority: u8,
    extras: GotifyExtras,
}

#[derive(Serialize)]
struct GotifyExtras {
    #[serde(rename = "nimbus::notification")]
    notification: GotifyNotificationExtras,
}

#[derive(Serialize)]
struct GotifyNotificationExtras {
    id: u32,
    tags: Vec<String>,
}

impl GotifyClient {
    pub fn new(client: Client, url: &str, token: &str) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub async fn send(&self, message: &NotificationMessage) -> Result<(), NotificationError> {
        let url = format!("{}/message", self.url);

        tracing::debug!(title = %message.title, "Sending gotify notification");

        let gotify_msg = GotifyMessage {
            title: message.title.clone(),
            message: message.body.clone(),
            priority: message.priority.as_gotify_priority(),
            extras: GotifyExtras {
                notification: GotifyNotificationExtras {
                    id: message.id,
                    tags: message.tags.clone(),
                },
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("token", &self.token)])
            .json(&gotify_msg)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::ServiceError(format!(
                "gotify returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_gotify_client_creation() {
        let client = GotifyClient::new(Client::new(), "https://gotify.example.com/", "my-app-token");
        assert_eq!(client.url, "https://gotify.example.com");
        assert_eq!(client.token, "my-app-token");
    }

    #[tokio::test]
    async fn test_gotify_payload_carries_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message"))
            .and(query_param("token", "my-app-token"))
            .and(body_partial_json(serde_json::json!({
                "title": "Popup Service",
                "message": "Hello World 7",
                "priority": 5,
                "extras": {"nimbus::notification": {"id": 1}}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = GotifyClient::new(Client::new(), &server.uri(), "my-app-token");
        client
            .send(&NotificationMessage::new(1, "Popup Service", "Hello World 7"))
            .await
            .unwrap();
    }
}
