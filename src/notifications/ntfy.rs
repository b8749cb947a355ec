use reqwest::Client;

use super::{NotificationError, NotificationMessage};

#[derive(Debug, Clone)]
pub enum NtfyAuth {
    Token(String),
    Basic { username: String, password: String },
}

/// Client for ntfy.sh push notifications
/// https://docs.ntfy.sh/publish/
pub struct NtfyClient {
    client: Client,
    url: String,
    topic: String,
    auth: Option<NtfyAuth>,
}

impl NtfyClient {
    pub fn new(client: Client, url: &str, topic: &str, auth: Option<NtfyAuth>) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            topic: topic.to_string(),
            auth,
        }
    }

    pub async fn send(&self, message: &NotificationMessage) -> Result<(), NotificationError> {
        let url = format!("{}/{}", self.url, self.topic);

        tracing::debug!(url = %url, title = %message.title, "Sending ntfy notification");

        let mut request = self
            .client
            .post(&url)
            .header("Title", &message.title)
            .header("Priority", message.priority.as_ntfy_priority().to_string());

        // Add tags if present
        if !message.tags.is_empty() {
            request = request.header("Tags", message.tags.join(","));
        }

        request = match &self.auth {
            Some(NtfyAuth::Token(token)) => request.bearer_auth(token),
            Some(NtfyAuth::Basic { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            None => request,
        };

        let response = request.body(message.body.clone()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::ServiceError(format!(
                "ntfy returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_ntfy_client_creation() {
        let client = NtfyClient::new(Client::new(), "https://ntfy.sh/", "test-topic", None);
        assert_eq!(client.url, "https://ntfy.sh");
        assert_eq!(client.topic, "test-topic");
        assert!(client.auth.is_none());
    }

    #[tokio::test]
    async fn test_ntfy_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .and(header("Authorization", "Bearer my-token"))
            .and(header("Title", "Popup Service"))
            .and(header("Priority", "4"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = NtfyClient::new(
            Client::new(),
            &server.uri(),
            "alerts",
            Some(NtfyAuth::Token("my-token".to_string())),
        );
        let message = NotificationMessage::new(1, "Popup Service", "Hello World 3")
            .with_priority(super::super::Priority::High);

        client.send(&message).await.unwrap();
    }

    #[tokio::test]
    async fn test_ntfy_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = NtfyClient::new(Client::new(), &server.uri(), "alerts", None);
        let err = client
            .send(&NotificationMessage::new(1, "t", "b"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("403"));
    }
}
