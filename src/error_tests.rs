//! Tests for error types

#[cfg(test)]
mod tests {
    use super::super::error::ScreenerError;

    #[test]
    fn test_api_error() {
        let err = ScreenerError::Api("HTTP 503".to_string());
        assert!(err.to_string().contains("API error"));
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_exchange_error_names_exchange() {
        let err = ScreenerError::exchange("bybit", "retCode 10001");
        assert_eq!(err.to_string(), "Exchange bybit error: retCode 10001");
    }

    #[test]
    fn test_timeout_error() {
        let err = ScreenerError::Timeout {
            context: "binance tickers".to_string(),
            secs: 30,
        };
        assert!(err.to_string().contains("30s"));
        assert!(err.to_string().contains("binance tickers"));
    }

    #[test]
    fn test_unknown_exchange_error() {
        let err = ScreenerError::UnknownExchange("kraken".to_string());
        assert!(err.to_string().contains("kraken"));
    }

    #[test]
    fn test_invalid_setting_error() {
        let err = ScreenerError::InvalidSetting("interval must be 1..=120".to_string());
        assert!(err.to_string().starts_with("Invalid setting"));
    }

    #[test]
    fn test_indicator_unavailable_error() {
        let err = ScreenerError::IndicatorUnavailable("no candles".to_string());
        assert!(err.to_string().contains("Indicator unavailable"));
    }

    #[test]
    fn test_delivery_error() {
        let err = ScreenerError::Delivery("chat not found".to_string());
        assert!(err.to_string().contains("Delivery failed"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ScreenerError = json_err.into();
        assert!(matches!(err, ScreenerError::Json(_)));
    }

    #[test]
    fn test_error_debug_format() {
        let err = ScreenerError::Internal("boom".to_string());
        let debug = format!("{:?}", err);
        assert!(debug.contains("Internal"));
    }
}
