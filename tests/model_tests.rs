//! Unit tests for domain models and codecs through the public API.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;

// Note: These tests can be run with: cargo test --test model_tests

mod envelope_tests {
    use super::*;
    use webhook_relay::AppError;
    use webhook_relay::models::{ForwardedFile, RelayEnvelope};

    #[test]
    fn test_success_envelope_serialization() {
        let envelope = RelayEnvelope {
            success: true,
            status: Some(201),
            data: Some(json!({"id": 7})),
            duration_ms: Some(12),
            target: Some("https://hooks.example/in".to_string()),
            ..RelayEnvelope::default()
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["status"], 201);
        assert_eq!(value["data"], json!({"id": 7}));
        assert!(value.get("error").is_none());
        assert!(value.get("files").is_none());
    }

    #[test]
    fn test_envelope_round_trip_keeps_files() {
        let envelope = RelayEnvelope {
            success: true,
            status: Some(200),
            files: Some(vec![ForwardedFile {
                name: "file".to_string(),
                filename: "a.png".to_string(),
                size: 3,
                mime_type: "image/png".to_string(),
            }]),
            ..RelayEnvelope::default()
        };

        let text = serde_json::to_string(&envelope).unwrap();
        let back: RelayEnvelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_error_envelopes_carry_codes() {
        let cases = [
            (AppError::MissingDestination, "missing_destination", 400),
            (
                AppError::MalformedDestination("x".into()),
                "malformed_destination",
                400,
            ),
            (
                AppError::ForbiddenDestination("10.0.0.1".into()),
                "forbidden_destination",
                403,
            ),
            (AppError::Timeout(50), "timeout", 504),
            (
                AppError::ConnectionFailed("refused".into()),
                "connection_failed",
                502,
            ),
        ];

        for (error, code, status) in cases {
            assert_eq!(error.status_code().as_u16(), status);
            let envelope = error.to_envelope();
            assert!(!envelope.success);
            assert_eq!(envelope.error.as_deref(), Some(code));
            assert!(envelope.status.is_none());
        }
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let envelope = AppError::Internal("db password is hunter2".into()).to_envelope();
        assert!(!envelope.message.unwrap().contains("hunter2"));
    }
}

mod directive_tests {
    use std::time::Duration;
    use webhook_relay::models::{RelayDirective, RelayTimeout, reserved_body_fields};

    #[test]
    fn test_default_directive() {
        let directive = RelayDirective::default();
        assert_eq!(directive.method, axum::http::Method::POST);
        assert_eq!(directive.timeout.duration, Duration::from_secs(30));
        assert!(directive.destination_url.is_none());
    }

    #[test]
    fn test_timeout_parsing() {
        assert_eq!(
            RelayTimeout::from_requested("5000", 120_000).unwrap().as_millis(),
            5000
        );
        assert_eq!(
            RelayTimeout::from_requested("5000.0", 120_000)
                .unwrap()
                .as_millis(),
            5000
        );
        assert!(RelayTimeout::from_requested("0", 120_000).is_none());
        assert!(RelayTimeout::from_requested("-5", 120_000).is_none());
        assert!(RelayTimeout::from_requested("soon", 120_000).is_none());
    }

    #[test]
    fn test_timeout_is_clamped_but_requested_value_kept() {
        let timeout = RelayTimeout::from_requested("999999999", 120_000).unwrap();
        assert_eq!(timeout.as_millis(), 120_000);
        assert_eq!(timeout.requested_ms, Some(999_999_999));
    }

    #[test]
    fn test_reserved_fields() {
        let reserved: Vec<&str> = reserved_body_fields().collect();
        for name in ["targetUrl", "webhook_url", "target", "webhook_auth", "timeout", "headers"] {
            assert!(reserved.contains(&name), "{name} should be reserved");
        }
        assert!(!reserved.contains(&"payload"));
    }
}

mod body_tests {
    use super::*;
    use webhook_relay::codec::{BodyCodec, form, json as json_codec};
    use webhook_relay::models::{CanonicalBody, FieldValue, OutboundBody};

    #[test]
    fn test_codec_selection() {
        assert_eq!(
            BodyCodec::from_content_type(Some("application/json; charset=utf-8")),
            BodyCodec::Json
        );
        assert_eq!(
            BodyCodec::from_content_type(Some("Application/X-WWW-Form-Urlencoded")),
            BodyCodec::UrlEncoded
        );
        assert_eq!(
            BodyCodec::from_content_type(Some("multipart/form-data; boundary=xyz")),
            BodyCodec::Multipart
        );
        assert_eq!(
            BodyCodec::from_content_type(Some("text/plain")),
            BodyCodec::Json
        );
        assert_eq!(BodyCodec::from_content_type(None), BodyCodec::Json);
    }

    #[test]
    fn test_malformed_json_is_empty_body() {
        assert!(json_codec::decode(b"{not json").is_empty());
        assert!(json_codec::decode(b"[1, 2, 3]").is_empty());
        assert!(json_codec::decode(b"   ").is_empty());
    }

    #[test]
    fn test_json_keeps_types_on_reencode() {
        let body = json_codec::decode(br#"{"n": 1, "ok": true, "tags": ["a"]}"#);

        let encoded = BodyCodec::Json.encode(&body).unwrap();
        let OutboundBody::Bytes(bytes) = encoded else {
            panic!("expected bytes");
        };
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"n": 1, "ok": true, "tags": ["a"]}));
    }

    #[test]
    fn test_form_to_json_keeps_repeated_keys_as_list() {
        let body = form::decode(b"tag=a&tag=b&name=Ada");

        assert_eq!(
            body.json_document(),
            json!({"name": "Ada", "tag": ["a", "b"]})
        );
    }

    #[test]
    fn test_first_text_reads_any_encoding() {
        assert_eq!(
            FieldValue::Json(json!(" https://x.example ")).first_text(),
            Some("https://x.example".to_string())
        );
        assert_eq!(FieldValue::Json(json!(5000)).first_text(), Some("5000".into()));
        assert_eq!(FieldValue::Json(json!(null)).first_text(), None);
        assert_eq!(FieldValue::Text("   ".into()).first_text(), None);
    }

    #[test]
    fn test_multipart_encode_keeps_attachments() {
        let mut body = CanonicalBody::default();
        body.push_text("title", "x");

        let encoded = BodyCodec::Multipart.encode(&body).unwrap();
        assert_eq!(encoded, OutboundBody::Multipart(body));
    }
}

mod validation_tests {
    use webhook_relay::DestinationPolicy;
    use webhook_relay::models::ValidationFailure;

    #[test]
    fn test_missing_and_blank() {
        let policy = DestinationPolicy::default();
        assert_eq!(
            policy.validate(None),
            Err(ValidationFailure::MissingDestination)
        );
        assert_eq!(
            policy.validate(Some("   ")),
            Err(ValidationFailure::MissingDestination)
        );
    }

    #[test]
    fn test_public_destination_is_accepted() {
        let url = DestinationPolicy::default()
            .validate(Some("https://hooks.example/in?x=1"))
            .unwrap();
        assert_eq!(url.host_str(), Some("hooks.example"));
    }

    #[test]
    fn test_allow_private_still_checks_scheme() {
        let policy = DestinationPolicy::new(true);
        assert!(policy.validate(Some("http://127.0.0.1:9000/hook")).is_ok());
        assert!(matches!(
            policy.validate(Some("file:///etc/passwd")),
            Err(ValidationFailure::MalformedDestination(_))
        ));
    }
}
