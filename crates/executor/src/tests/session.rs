//! Session state tests: persistence and repeat detection.

use crate::{RequestContext, SessionState, VERIFICATION_FIELD};
use boardsearch_core::Requester;
use boardsearch_search::RequestFields;

#[test]
fn test_session_json_round_trip() {
    let session = SessionState {
        last_search: Some("clay soil".to_string()),
        verification_passed: true,
    };
    let json = session.to_json().unwrap();
    assert_eq!(SessionState::from_json(&json), session);
}

#[test]
fn test_corrupt_session_starts_fresh() {
    assert_eq!(SessionState::from_json("{not json"), SessionState::new());
}

#[test]
fn test_repeat_detection() {
    let mut session = SessionState::new();
    assert!(!session.is_repeat_of("roses"));
    session.last_search = Some("roses".to_string());
    assert!(session.is_repeat_of("roses"));
    assert!(!session.is_repeat_of("tulips"));
}

#[test]
fn test_request_context_fields() {
    let ctx = RequestContext::new(
        Requester::guest("10.0.0.9"),
        RequestFields::new()
            .with("start", " 60 ")
            .with(VERIFICATION_FIELD, "1"),
    );
    assert_eq!(ctx.start(), 60);
    assert!(ctx.from_verification_form());

    let plain = RequestContext::new(Requester::guest("10.0.0.9"), RequestFields::new().with("start", "x"));
    assert_eq!(plain.start(), 0);
    assert!(!plain.from_verification_form());
}
