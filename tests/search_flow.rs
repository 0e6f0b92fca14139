//! End-to-end search flow
//!
//! Drives the public facade the way a forum would: configuration from a
//! file, a controller over an in-memory forum, and rendered result pages.

use std::sync::Arc;

use boardsearch::{
    Board, BoardId, BoardPermissions, MemberId, MemoryForum, Message, MessageId, RequestContext,
    RequestFields, Requester, SearchConfig, SearchController, SearchIndexKind, SearchOutcome,
    SearchParams, SearchResults, SessionState, TopicId, WordCensor, CONFIG_FILE_NAME,
};
use chrono::{Duration, Utc};

// ============================================================================
// Test Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn create_forum() -> Arc<MemoryForum> {
    let forum = MemoryForum::new();
    forum.add_board(Board {
        id: BoardId(1),
        name: "Vegetables".to_string(),
        category_id: 1,
        category_name: "Garden".to_string(),
    });
    forum.add_board(Board {
        id: BoardId(2),
        name: "Flowers".to_string(),
        category_id: 1,
        category_name: "Garden".to_string(),
    });
    forum.add_member(MemberId(1), "alice");
    forum.add_member(MemberId(2), "bob");

    let posts = [
        (1, 1, 1, 1, "Heavy clay", "[b]Clay[/b] soil stays wet all winter, darn it", 20),
        (2, 1, 1, 2, "Re: Heavy clay", "Raised beds fix clay drainage", 19),
        (3, 2, 2, 2, "Tulips", "Tulip bulbs rot in clay", 4),
        (4, 3, 2, 1, "Seed swap", "Anyone swapping poppy seeds?", 1),
    ];
    for (id, topic, board, poster, subject, body, days) in posts {
        forum.add_message(Message {
            id: MessageId(id),
            topic_id: TopicId(topic),
            board_id: BoardId(board),
            poster_id: MemberId(poster),
            poster_name: if poster == 1 { "alice" } else { "bob" }.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            posted_at: Utc::now() - Duration::days(days),
            smileys_enabled: true,
        });
    }
    Arc::new(forum)
}

fn request(fields: RequestFields) -> RequestContext {
    RequestContext::new(Requester::member(MemberId(1), "198.51.100.4"), fields)
        .with_permissions(BoardPermissions::everything())
}

fn expect_results(outcome: SearchOutcome) -> SearchResults {
    match outcome {
        SearchOutcome::Results(results) => results,
        SearchOutcome::Form(form) => panic!("expected results, form had {:?}", form.issues),
    }
}

fn message_ids(results: &SearchResults) -> Vec<u32> {
    results.items.iter().map(|i| i.message_id.get()).collect()
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_controller_from_config_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    SearchConfig::write_default_if_missing(&path).unwrap();
    let config = SearchConfig::from_file(&path).unwrap();
    assert_eq!(config.results_per_page, 30);
    assert_eq!(config.index, SearchIndexKind::Standard);

    // An existing file is never overwritten
    std::fs::write(&path, "index = \"fulltext\"\nresults_per_page = 2\n").unwrap();
    SearchConfig::write_default_if_missing(&path).unwrap();
    let config = SearchConfig::from_file(&path).unwrap();
    assert_eq!(config.index, SearchIndexKind::Fulltext);

    let forum = create_forum();
    let controller = SearchController::new(Arc::new(config), forum.clone(), forum.clone()).unwrap();
    let page = expect_results(
        controller
            .action_results(&request(RequestFields::new().with("search", "clay")), &mut SessionState::new())
            .unwrap(),
    );
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.page.num_pages(), 2);
}

#[test]
fn test_invalid_config_rejected() {
    let forum = create_forum();
    let config = SearchConfig {
        results_per_page: 0,
        ..SearchConfig::default()
    };
    assert!(SearchController::new(Arc::new(config), forum.clone(), forum.clone()).is_err());
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_full_bodies_are_rendered_censored_and_highlighted() {
    init_tracing();
    let forum = create_forum();
    let controller = SearchController::new(Arc::new(SearchConfig::default()), forum.clone(), forum.clone())
        .unwrap()
        .with_censor(Arc::new(WordCensor::new(["darn"], "****")));

    let page = expect_results(
        controller
            .action_results(
                &request(
                    RequestFields::new()
                        .with("search", "clay")
                        .with("brd", "1")
                        .with("show_complete", "1"),
                ),
                &mut SessionState::new(),
            )
            .unwrap(),
    );
    assert!(!page.compact);

    let first = page.items.iter().find(|i| i.message_id == MessageId(1)).unwrap();
    assert_eq!(first.board_name, "Vegetables");
    assert_eq!(first.category_name, "Garden");
    assert!(first.body.contains("<strong>Clay</strong>"));
    assert!(first.body.contains("****"));
    assert!(!first.body.contains("darn"));
    assert!(first
        .body_highlighted
        .contains("<strong><span class=\"highlight\">Clay</span></strong>"));
    assert!(first
        .subject_highlighted
        .contains("<strong class=\"highlight\">clay</strong>"));
    assert!(first.permissions.can_reply);
}

#[test]
fn test_compact_excerpts_strip_markup() {
    let forum = create_forum();
    let controller =
        SearchController::new(Arc::new(SearchConfig::default()), forum.clone(), forum.clone()).unwrap();

    let page = expect_results(
        controller
            .action_results(
                &request(RequestFields::new().with("search", "tulip*").with("searchtype", "2")),
                &mut SessionState::new(),
            )
            .unwrap(),
    );
    assert!(page.compact);
    assert_eq!(message_ids(&page), vec![3]);
    assert!(!page.items[0].body.contains('<'));
}

// ============================================================================
// Backends and Sorting
// ============================================================================

#[test]
fn test_backends_render_the_same_page() {
    let forum = create_forum();
    let mut pages = Vec::new();
    for index in [SearchIndexKind::Standard, SearchIndexKind::Fulltext] {
        let config = SearchConfig {
            index,
            ..SearchConfig::default()
        };
        let controller = SearchController::new(Arc::new(config), forum.clone(), forum.clone()).unwrap();
        let page = expect_results(
            controller
                .action_results(&request(RequestFields::new().with("search", "clay -tulip")), &mut SessionState::new())
                .unwrap(),
        );
        pages.push(message_ids(&page));
    }
    assert_eq!(pages[0], pages[1]);
    let mut ids = pages[0].clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_date_sort_is_newest_first() {
    let forum = create_forum();
    let controller =
        SearchController::new(Arc::new(SearchConfig::default()), forum.clone(), forum.clone()).unwrap();

    let page = expect_results(
        controller
            .action_results(
                &request(RequestFields::new().with("search", "clay").with("sort", "date")),
                &mut SessionState::new(),
            )
            .unwrap(),
    );
    assert_eq!(message_ids(&page), vec![3, 2, 1]);
    assert_eq!(SearchParams::decode(&page.params_token).param("sort").unwrap(), "date");
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn test_session_survives_serialization_between_requests() {
    let forum = create_forum();
    let controller = SearchController::new(
        Arc::new(SearchConfig {
            enable_captcha: true,
            ..SearchConfig::default()
        }),
        forum.clone(),
        forum.clone(),
    )
    .unwrap();
    let guest = |fields: RequestFields| RequestContext::new(Requester::guest("203.0.113.9"), fields);

    // No verifier configured: submitting the challenge form passes it
    let mut session = SessionState::new();
    let page = expect_results(
        controller
            .action_results(
                &guest(RequestFields::new().with("search", "poppy").with("search_vv", "1")),
                &mut session,
            )
            .unwrap(),
    );
    assert_eq!(message_ids(&page), vec![4]);

    let stored = session.to_json().unwrap();
    let mut restored = SessionState::from_json(&stored);
    assert!(restored.verification_passed);

    let outcome = controller
        .action_results(&guest(RequestFields::new().with("search", "tulips")), &mut restored)
        .unwrap();
    assert!(matches!(outcome, SearchOutcome::Results(_)));
}
