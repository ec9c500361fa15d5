//! Posts replies back to the chat via the DingTalk robot webhook, and
//! formats the reply bodies.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::DingtalkConfig;
use crate::resolver::Track;
use crate::signature;

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    msgtype: &'static str,
    text: TextContent<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    at: Option<At<'a>>,
}

#[derive(Debug, Serialize)]
struct TextContent<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct At<'a> {
    #[serde(rename = "atUserIds")]
    at_user_ids: &'a [String],
}

pub struct Notifier {
    client: reqwest::Client,
    config: DingtalkConfig,
}

impl Notifier {
    pub fn new(config: DingtalkConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Post a text message to the robot webhook, @-mentioning `at_user_ids`
    /// when non-empty. Signs a fresh timestamp with the shared secret.
    /// Returns the platform's JSON acknowledgment uninterpreted.
    pub async fn send_text(&self, content: &str, at_user_ids: &[String]) -> Result<Value> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let sign = signature::sign(&self.config.secret, &timestamp);

        let message = TextMessage {
            msgtype: "text",
            text: TextContent { content },
            at: (!at_user_ids.is_empty()).then_some(At { at_user_ids }),
        };

        debug!("Posting robot message ({} mentions)", at_user_ids.len());

        let response = self
            .client
            .post(&self.config.webhook_url)
            .query(&[
                ("access_token", self.config.access_token()),
                ("timestamp", timestamp.as_str()),
                ("sign", sign.as_str()),
            ])
            .json(&message)
            .send()
            .await
            .context("Failed to post message to the DingTalk webhook")?;

        response
            .json()
            .await
            .context("Failed to parse DingTalk webhook acknowledgment")
    }
}

// ── Reply formatting ───────────────────────────────────────────────────────────

/// Usage hint sent when `id` or `s` is missing.
pub fn usage_error_text() -> &'static str {
    "❌ 参数错误，请使用格式: @机器人 getmusic id=歌曲ID s=来源 [p=音质]"
}

/// Reply body for a successful resolution.
pub fn success_text(source: &str, song_id: &str, quality: &str, track: &Track) -> String {
    format!(
        "🎵 音乐信息:\n\
         - 来源: {source}\n\
         - 歌曲ID: {song_id}\n\
         - 音质: {quality}\n\
         - 播放地址: {url}\n\
         - 信息: {info}\n\
         - 过期时间: {expire}",
        quality = track.quality.as_deref().unwrap_or(quality),
        url = track.url.as_deref().unwrap_or("无"),
        info = track.info.as_deref().unwrap_or("无"),
        expire = expire_text(track.expire.as_ref()),
    )
}

/// Reply body for a failed resolution.
pub fn failure_text(error: &str) -> String {
    let error = if error.is_empty() { "未知错误" } else { error };
    format!(
        "❌ 获取音乐信息失败:\n\
         - 错误: {error}\n\
         - 请检查参数是否正确"
    )
}

// Expiry arrives as a bare string or a number; render both without quotes.
fn expire_text(expire: Option<&Value>) -> String {
    match expire {
        None | Some(Value::Null) => "无".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn track(url: Option<&str>, info: Option<&str>, expire: Option<Value>) -> Track {
        Track {
            url: url.map(String::from),
            info: info.map(String::from),
            quality: None,
            expire,
        }
    }

    #[test]
    fn test_success_text_contains_all_fields() {
        let t = track(
            Some("http://x/y.mp3"),
            Some("Song - Artist"),
            Some(json!("2099-01-01")),
        );
        let text = success_text("kuwo", "123", "128k", &t);
        assert!(text.starts_with("🎵"));
        assert!(text.contains("来源: kuwo"));
        assert!(text.contains("歌曲ID: 123"));
        assert!(text.contains("音质: 128k"));
        assert!(text.contains("播放地址: http://x/y.mp3"));
        assert!(text.contains("信息: Song - Artist"));
        assert!(text.contains("过期时间: 2099-01-01"));
    }

    #[test]
    fn test_success_text_numeric_expiry_unquoted() {
        let t = track(Some("http://x"), None, Some(json!(1700000000)));
        let text = success_text("kuwo", "1", "128k", &t);
        assert!(text.contains("过期时间: 1700000000"));
    }

    #[test]
    fn test_success_text_tolerates_absent_fields() {
        let t = track(None, None, None);
        let text = success_text("kuwo", "1", "128k", &t);
        assert!(text.contains("播放地址: 无"));
        assert!(text.contains("过期时间: 无"));
    }

    #[test]
    fn test_failure_text_includes_error() {
        let text = failure_text("connection refused");
        assert!(text.starts_with("❌"));
        assert!(text.contains("connection refused"));
        assert!(text.contains("请检查参数是否正确"));
    }

    #[test]
    fn test_failure_text_empty_error_falls_back() {
        assert!(failure_text("").contains("未知错误"));
    }

    type Received = Arc<Mutex<Vec<(HashMap<String, String>, Value)>>>;

    async fn spawn_webhook() -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));

        async fn send(
            State(received): State<Received>,
            Query(params): Query<HashMap<String, String>>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            received.lock().await.push((params, body));
            Json(json!({"errcode": 0, "errmsg": "ok"}))
        }

        let router = Router::new()
            .route("/robot/send", post(send))
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (
            format!("http://{addr}/robot/send?access_token=tok123"),
            received,
        )
    }

    fn test_dingtalk_config(webhook_url: String) -> DingtalkConfig {
        DingtalkConfig {
            secret: "SECtest".to_string(),
            webhook_url,
        }
    }

    #[tokio::test]
    async fn test_send_text_posts_signed_payload() {
        let (webhook_url, received) = spawn_webhook().await;
        let notifier = Notifier::new(test_dingtalk_config(webhook_url));

        let ack = notifier
            .send_text("hello", &["staff-1".to_string()])
            .await
            .unwrap();
        assert_eq!(ack["errcode"], 0);

        let received = received.lock().await;
        assert_eq!(received.len(), 1);
        let (params, body) = &received[0];

        assert_eq!(params.get("access_token").map(String::as_str), Some("tok123"));
        let timestamp = params.get("timestamp").expect("timestamp param");
        let sign = params.get("sign").expect("sign param");
        assert!(signature::verify("SECtest", timestamp, sign));

        assert_eq!(body["msgtype"], "text");
        assert_eq!(body["text"]["content"], "hello");
        assert_eq!(body["at"]["atUserIds"][0], "staff-1");
    }

    #[tokio::test]
    async fn test_send_text_omits_at_without_mentions() {
        let (webhook_url, received) = spawn_webhook().await;
        let notifier = Notifier::new(test_dingtalk_config(webhook_url));

        notifier.send_text("hello", &[]).await.unwrap();

        let received = received.lock().await;
        let (_, body) = &received[0];
        assert!(body.get("at").is_none());
    }

    #[tokio::test]
    async fn test_send_text_refused_connection_is_an_error() {
        // Nothing listens on port 1; connect fails immediately.
        let notifier = Notifier::new(test_dingtalk_config(
            "http://127.0.0.1:1/robot/send?access_token=t".to_string(),
        ));
        assert!(notifier.send_text("hello", &[]).await.is_err());
    }
}
