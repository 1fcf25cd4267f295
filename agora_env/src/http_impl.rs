//! Production implementation of the environment traits over HTTP.
//!
//! `HttpBackend` speaks JSON to the social-network service of record,
//! `HttpOracle` to an OpenAI-compatible chat-completions endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::{
    Article, ContentGateway, ContentId, DecisionOracle, EnvError, FollowAction, FollowGateway,
    FollowRequest, Fetched, ImageAnnotator, ImageAsset, ImageLibrary, Interest, OpinionUpdate,
    PopulationRegistry, Publication, ReactionKind, ReadRequest, Registration, SimTime,
    SocialService, TimeSource, TopicId, UserId, Vote,
};

/// Production backend for the social-network service of record.
pub struct HttpBackend {
    client: Client,

    /// Base url, always ending with `/`
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RemovedResponse {
    removed: Vec<u64>,
}

impl HttpBackend {
    /// Creates a backend talking to `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EnvError> {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Creates an Arc-wrapped backend for sharing across services.
    pub fn shared(base_url: impl Into<String>, timeout: Duration) -> Result<Arc<Self>, EnvError> {
        Self::new(base_url, timeout).map(Arc::new)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, EnvError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .send()
            .await?;
        Self::decode(endpoint, response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, EnvError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .json(body)
            .send()
            .await?;
        Self::decode(endpoint, response).await
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<T, EnvError> {
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(EnvError::not_found(endpoint));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnvError::transport(format!("{} returned {}: {}", endpoint, status, body)));
        }
        let value: Value = response.json().await?;
        debug!(endpoint, "response received");
        if let Some(status) = value.get("status").and_then(Value::as_str) {
            if status != "200" {
                return Err(EnvError::unavailable(format!("{}: {}", endpoint, status)));
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn post_unit<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<(), EnvError> {
        let _: Value = self.post_json(endpoint, body).await?;
        Ok(())
    }

    async fn publish(&self, endpoint: &str, body: Value) -> Result<ContentId, EnvError> {
        let created: IdResponse = self.post_json(endpoint, &body).await?;
        Ok(ContentId(created.id))
    }

    async fn id_list(&self, endpoint: &str, body: Value) -> Fetched<Vec<ContentId>> {
        let result: Result<Vec<u64>, EnvError> = self.post_json(endpoint, &body).await;
        Fetched::from_result(result.map(|ids| ids.into_iter().map(ContentId).collect()))
    }
}

fn publication_body(user: UserId, slot: u64, p: &Publication) -> Value {
    json!({
        "user_id": user.0,
        "tweet": p.text,
        "hashtags": p.hashtags,
        "mentions": p.mentions,
        "emotions": p.emotions,
        "topics": p.topics,
        "tid": slot,
    })
}

#[async_trait]
impl TimeSource for HttpBackend {
    async fn current_time(&self) -> Result<SimTime, EnvError> {
        self.get_json("current_time").await
    }

    async fn update_time(&self, day: u32, slot: u32) -> Result<SimTime, EnvError> {
        self.post_json("update_time", &json!({ "day": day, "round": slot })).await
    }
}

#[async_trait]
impl SocialService for HttpBackend {
    async fn post(&self, user: UserId, slot: u64, post: &Publication) -> Result<ContentId, EnvError> {
        self.publish("post", publication_body(user, slot, post)).await
    }

    async fn comment(
        &self,
        user: UserId,
        slot: u64,
        target: ContentId,
        comment: &Publication,
    ) -> Result<ContentId, EnvError> {
        let mut body = publication_body(user, slot, comment);
        body["post_id"] = json!(target.0);
        self.publish("comment", body).await
    }

    async fn share(
        &self,
        user: UserId,
        slot: u64,
        target: ContentId,
        commentary: &Publication,
    ) -> Result<ContentId, EnvError> {
        let mut body = publication_body(user, slot, commentary);
        body["post_id"] = json!(target.0);
        self.publish("share", body).await
    }

    async fn comment_image(
        &self,
        user: UserId,
        slot: u64,
        image: &ImageAsset,
        comment: &Publication,
    ) -> Result<ContentId, EnvError> {
        let mut body = publication_body(user, slot, comment);
        body["image_id"] = json!(image.id);
        body["article_id"] = json!(image.article.map(|a| a.0));
        self.publish("comment_image", body).await
    }

    async fn react(
        &self,
        user: UserId,
        slot: u64,
        target: ContentId,
        kind: ReactionKind,
    ) -> Result<(), EnvError> {
        let body = json!({ "user_id": user.0, "post_id": target.0, "type": kind.as_str(), "tid": slot });
        self.post_unit("reaction", &body).await
    }

    async fn follow(
        &self,
        user: UserId,
        slot: u64,
        target: UserId,
        action: FollowAction,
    ) -> Result<(), EnvError> {
        let body = json!({ "user_id": user.0, "target": target.0, "action": action.as_str(), "tid": slot });
        self.post_unit("follow", &body).await
    }

    async fn cast_vote(
        &self,
        user: UserId,
        slot: u64,
        target: ContentId,
        vote: Vote,
    ) -> Result<(), EnvError> {
        let body = json!({
            "user_id": user.0,
            "post_id": target.0,
            "preference": vote.code(),
            "content_type": "Post",
            "tid": slot,
        });
        self.post_unit("cast_preference", &body).await
    }

    async fn content_text(&self, content: ContentId) -> Result<String, EnvError> {
        self.post_json("get_post", &json!({ "id": content.0 })).await
    }

    async fn thread(&self, content: ContentId, max_len: usize) -> Result<Vec<String>, EnvError> {
        let mut thread: Vec<String> = self.post_json("get_thread", &json!({ "post_id": content.0 })).await?;
        if thread.len() > max_len {
            thread.drain(..thread.len() - max_len);
        }
        Ok(thread)
    }

    async fn article(&self, content: ContentId) -> Result<Option<Article>, EnvError> {
        self.post_json("get_article", &json!({ "post_id": content.0 })).await
    }

    async fn author(&self, content: ContentId) -> Result<UserId, EnvError> {
        let author: IdResponse = self.post_json("get_post_author", &json!({ "post_id": content.0 })).await?;
        Ok(UserId(author.id))
    }

    async fn content_topics(&self, content: ContentId) -> Result<Vec<Interest>, EnvError> {
        self.post_json("get_post_topics", &json!({ "post_id": content.0 })).await
    }

    async fn interests(&self, user: UserId, window: u32) -> Result<Vec<Interest>, EnvError> {
        self.post_json("get_user_interests", &json!({ "user_id": user.0, "n_rounds": window }))
            .await
    }

    async fn record_interests(
        &self,
        user: UserId,
        slot: u64,
        topics: &[TopicId],
    ) -> Result<(), EnvError> {
        let body = json!({ "user_id": user.0, "interests": topics, "round": slot });
        self.post_unit("set_user_interests", &body).await
    }

    async fn opinions(&self, user: UserId) -> Result<BTreeMap<TopicId, f64>, EnvError> {
        self.post_json("get_user_opinions", &json!({ "user_id": user.0 })).await
    }

    async fn set_opinions(&self, update: &OpinionUpdate) -> Result<(), EnvError> {
        self.post_unit("set_user_opinions", update).await
    }

    async fn peer_opinions(&self, user: UserId, topic: TopicId) -> Result<Vec<f64>, EnvError> {
        self.post_json("get_users_opinions", &json!({ "user_id": user.0, "topic": topic.0 }))
            .await
    }
}

#[async_trait]
impl ContentGateway for HttpBackend {
    async fn read(&self, user: UserId, request: &ReadRequest) -> Fetched<Vec<ContentId>> {
        let body = json!({
            "uid": user.0,
            "limit": request.limit,
            "mode": request.mode,
            "visibility_rounds": request.visibility_rounds,
            "articles": request.articles,
        });
        self.id_list("read", body).await
    }

    async fn search(&self, user: UserId) -> Fetched<Vec<ContentId>> {
        self.id_list("search", json!({ "uid": user.0 })).await
    }

    async fn read_mentions(&self, user: UserId) -> Fetched<Vec<ContentId>> {
        self.id_list("read_mentions", json!({ "uid": user.0 })).await
    }
}

#[async_trait]
impl FollowGateway for HttpBackend {
    async fn follow_suggestions(
        &self,
        user: UserId,
        request: &FollowRequest,
    ) -> Fetched<HashMap<UserId, f64>> {
        let body = json!({
            "user_id": user.0,
            "mode": request.mode,
            "n_neighbors": request.n_neighbors,
            "leaning_biased": request.leaning_biased,
        });
        let result: Result<HashMap<u64, f64>, EnvError> = self.post_json("follow_suggestions", &body).await;
        match result {
            Ok(map) => Fetched::from_map(map.into_iter().map(|(k, w)| (UserId(k), w)).collect()),
            Err(e) => Fetched::Failed(e),
        }
    }
}

#[async_trait]
impl PopulationRegistry for HttpBackend {
    async fn register(&self, registration: &Registration) -> Result<UserId, EnvError> {
        let created: IdResponse = self.post_json("register", registration).await?;
        Ok(UserId(created.id))
    }

    async fn churn(&self, n: usize, at_slot: u64) -> Result<Vec<UserId>, EnvError> {
        let removed: RemovedResponse = self
            .post_json("churn", &json!({ "n_users": n, "left_on": at_slot }))
            .await?;
        Ok(removed.removed.into_iter().map(UserId).collect())
    }
}

#[async_trait]
impl ImageLibrary for HttpBackend {
    async fn candidate_image(&self) -> Fetched<ImageAsset> {
        match self.get_json::<Option<ImageAsset>>("random_image").await {
            Ok(Some(image)) => Fetched::Found(image),
            Ok(None) => Fetched::Empty,
            Err(e) => Fetched::Failed(e),
        }
    }

    async fn set_description(&self, image: u64, description: &str) -> Result<(), EnvError> {
        let body = json!({ "image_id": image, "description": description });
        self.post_unit("image_description", &body).await
    }

    async fn discard(&self, image: u64) -> Result<(), EnvError> {
        self.post_unit("delete_image", &json!({ "image_id": image })).await
    }
}

// ===== Chat-completions oracle =====

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: Value,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Decision oracle backed by an OpenAI-compatible chat-completions API.
pub struct HttpOracle {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl HttpOracle {
    /// Creates an oracle posting to `url` (the full chat-completions url).
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, EnvError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
            model: model.into(),
            api_key: None,
            temperature: None,
            max_tokens: None,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    async fn complete(&self, messages: Vec<Message>) -> Result<String, EnvError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(EnvError::unavailable("rate limited"));
            }
            return Err(EnvError::transport(format!("API error {}: {}", status, error_text)));
        }

        let result: ChatResponse = response.json().await?;
        let content = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EnvError::malformed("no choices in completion"))?;
        match content {
            Value::String(text) => Ok(text),
            other => Err(EnvError::malformed(format!("unexpected content: {}", other))),
        }
    }
}

#[async_trait]
impl DecisionOracle for HttpOracle {
    async fn generate(&self, persona: &str, instruction: &str) -> Result<String, EnvError> {
        self.complete(vec![
            Message { role: "system".to_string(), content: Value::String(persona.to_string()) },
            Message { role: "user".to_string(), content: Value::String(instruction.to_string()) },
        ])
        .await
    }
}

#[async_trait]
impl ImageAnnotator for HttpOracle {
    async fn describe(&self, image_url: &str) -> Result<String, EnvError> {
        let content = json!([
            { "type": "text", "text": "Describe the image in one short paragraph." },
            { "type": "image_url", "image_url": { "url": image_url } },
        ]);
        self.complete(vec![Message { role: "user".to_string(), content }]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let backend = HttpBackend::new("http://localhost:5010", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.base_url, "http://localhost:5010/");
    }

    #[test]
    fn test_publication_body_fields() {
        let p = Publication {
            text: "hello #rust".to_string(),
            hashtags: vec!["#rust".to_string()],
            topics: vec![TopicId(3)],
            ..Default::default()
        };
        let body = publication_body(UserId(7), 42, &p);
        assert_eq!(body["user_id"], 7);
        assert_eq!(body["tweet"], "hello #rust");
        assert_eq!(body["topics"][0], 3);
        assert_eq!(body["tid"], 42);
    }

    #[test]
    fn test_chat_request_skips_unset_options() {
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![],
            temperature: None,
            max_tokens: Some(64),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("temperature"));
        assert!(json.contains("\"max_tokens\":64"));
    }

    /// Serves one canned HTTP response on a local port.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_current_time_decodes_round() {
        let url = serve_once("200 OK", r#"{"day": 3, "round": 7, "id": 80}"#).await;
        let backend = HttpBackend::new(url, Duration::from_secs(5)).unwrap();
        let now = backend.current_time().await.unwrap();
        assert_eq!(now, SimTime { day: 3, slot: 7, id: 80 });
    }

    #[tokio::test]
    async fn test_error_status_payload_is_unavailable() {
        let url = serve_once("200 OK", r#"{"status": "404"}"#).await;
        let backend = HttpBackend::new(url, Duration::from_secs(5)).unwrap();
        let err = backend.current_time().await.unwrap_err();
        assert!(matches!(err, EnvError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_read_is_tagged() {
        let url = serve_once("500 Internal Server Error", "{}").await;
        let backend = HttpBackend::new(url, Duration::from_secs(5)).unwrap();
        let fetched = backend.read(UserId(1), &ReadRequest::default()).await;
        assert!(fetched.is_failed());
    }

    #[tokio::test]
    async fn test_churn_returns_removed_ids() {
        let url = serve_once("200 OK", r#"{"removed": [4, 9]}"#).await;
        let backend = HttpBackend::new(url, Duration::from_secs(5)).unwrap();
        let removed = backend.churn(2, 30).await.unwrap();
        assert_eq!(removed, vec![UserId(4), UserId(9)]);
    }
}
