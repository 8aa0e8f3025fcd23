//! Tests for notify module

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::TelegramConfig;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[test]
    fn test_notifier_from_empty_token_is_disabled() {
        let notifier = TelegramNotifier::from_config(&TelegramConfig::default()).unwrap();
        assert!(!notifier.is_enabled());
    }

    #[test]
    fn test_notifier_from_token_is_enabled() {
        let config = TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_url: "https://api.telegram.org/".to_string(),
            request_timeout_secs: 30,
        };
        let notifier = TelegramNotifier::from_config(&config).unwrap();
        assert!(notifier.is_enabled());
        assert_eq!(
            notifier.endpoint(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn test_disabled_notifier_accepts_messages() {
        let notifier = TelegramNotifier::disabled();
        assert!(notifier.send(42, "<b>hello</b>").await.is_ok());
    }

    #[tokio::test]
    async fn test_unresponsive_endpoint_times_out() {
        // Accepts connections and never writes a response
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let notifier = TelegramNotifier::new(
            "123:abc".to_string(),
            &format!("http://{}", addr),
            Duration::from_millis(300),
        )
        .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), notifier.send(42, "hi")).await;
        let sent = result.expect("send must give up on its own");
        assert!(matches!(sent, Err(ScreenerError::Network(_))));
    }

    #[test]
    fn test_message_payload() {
        let msg = TelegramMessage {
            chat_id: 42,
            text: "hi".to_string(),
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["chat_id"], 42);
        assert_eq!(json["parse_mode"], "HTML");
        assert_eq!(json["disable_web_page_preview"], true);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        // Multi-byte characters are never split
        assert_eq!(truncate("🚀🚀🚀🚀🚀", 4), "🚀...");
    }

    #[tokio::test]
    async fn test_mock_channel() {
        let mut channel = MockNotificationChannel::new();
        channel
            .expect_send()
            .withf(|user, text| *user == 7 && text.contains("PUMP"))
            .times(1)
            .returning(|_, _| Ok(()));

        channel.send(7, "PUMP alert").await.unwrap();
    }
}
