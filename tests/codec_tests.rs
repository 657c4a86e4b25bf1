use translate_chat::codec::{
    decode_event, decode_hex, decode_request, encode_event, encode_hex, encode_request,
};
use translate_chat::{ChatError, IncomingEvent, LanguageCode, OutgoingRequest};

#[test]
fn test_encode_request_fields() {
    let request = OutgoingRequest::new("hello", LanguageCode::new("fr").unwrap());
    let frame = encode_request(&request).unwrap();

    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["text"], "hello");
    assert_eq!(value["target_language"], "fr");
    assert_eq!(value.as_object().unwrap().len(), 2);

    assert_eq!(decode_request(&frame).unwrap(), request);
}

#[test]
fn test_request_round_trip() {
    let cases = [
        ("", "en"),
        ("hello", "fr"),
        (r#"she said "hi" \ then left"#, "de"),
        ("line one\nline two\r\n\ttabbed", "it"),
        ("¿Dónde está la estación?", "es"),
        ("東京はどこですか", "ja"),
        ("good night 🌙👋", "pt-BR"),
        ("nul\u{0}byte", "zh-Hant-TW"),
        ("   padded   ", "sr-Latn"),
    ];

    for (text, code) in cases {
        let request = OutgoingRequest::new(text, LanguageCode::new(code).unwrap());
        let frame = encode_request(&request).unwrap();

        assert_eq!(decode_request(&frame).unwrap(), request, "frame {frame:?}");
    }
}

#[test]
fn test_decode_event_with_audio() {
    let frame = r#"{"original_text":"hello","translated_text":"bonjour","audio_bytes":"00ff10"}"#;
    let event = decode_event(frame).unwrap();

    assert_eq!(event.original_text, "hello");
    assert_eq!(event.translated_text, "bonjour");
    assert_eq!(event.audio_bytes.as_deref(), Some("00ff10"));
    assert_eq!(decode_hex(event.audio_bytes.as_deref().unwrap()).unwrap(), vec![0x00, 0xFF, 0x10]);
}

#[test]
fn test_decode_event_without_audio() {
    let missing = decode_event(r#"{"original_text":"hi","translated_text":"salut"}"#).unwrap();
    assert_eq!(missing.audio_bytes, None);

    let null =
        decode_event(r#"{"original_text":"hi","translated_text":"salut","audio_bytes":null}"#)
            .unwrap();
    assert_eq!(null.audio_bytes, None);
}

#[test]
fn test_decode_event_ignores_unknown_fields() {
    let event = decode_event(
        r#"{"original_text":"hi","translated_text":"ciao","source_language":"en","latency_ms":12}"#,
    )
    .unwrap();
    assert_eq!(event.translated_text, "ciao");
}

#[test]
fn test_decode_event_rejects_malformed_frames() {
    let frames = [
        "",
        "not json",
        "[]",
        r#"{"original_text":"hi"}"#,
        r#"{"translated_text":"salut"}"#,
        r#"{"original_text":1,"translated_text":"salut"}"#,
        r#"{"original_text":"hi","translated_text":"salut","audio_bytes":42}"#,
    ];

    for frame in frames {
        assert!(
            matches!(decode_event(frame), Err(ChatError::MalformedEvent(_))),
            "accepted {frame:?}"
        );
    }
}

#[test]
fn test_encode_event_omits_missing_audio() {
    let event = IncomingEvent {
        original_text: "yes".to_string(),
        translated_text: "oui".to_string(),
        audio_bytes: None,
    };
    let frame = encode_event(&event).unwrap();
    assert!(!frame.contains("audio_bytes"));

    let with_audio = IncomingEvent {
        audio_bytes: Some(encode_hex(&[1, 2, 254])),
        ..event
    };
    let frame = encode_event(&with_audio).unwrap();
    assert!(frame.contains(r#""audio_bytes":"0102fe""#));
    assert_eq!(decode_event(&frame).unwrap(), with_audio);
}

#[test]
fn test_language_codes() {
    for code in ["en", "fr", "pt-BR", "zh-CN", "yue"] {
        assert_eq!(LanguageCode::new(code).unwrap().as_str(), code);
    }

    for code in ["", "-fr", "fr-", "f r", "fr_FR", "日本"] {
        assert!(
            matches!(LanguageCode::new(code), Err(ChatError::InvalidLanguage(_))),
            "accepted {code:?}"
        );
    }

    let parsed: LanguageCode = "de".parse().unwrap();
    assert_eq!(parsed.to_string(), "de");
}

#[test]
fn test_request_with_invalid_language_is_malformed() {
    let result = decode_request(r#"{"text":"hello","target_language":"not a code"}"#);
    assert!(matches!(result, Err(ChatError::MalformedEvent(_))));
}
