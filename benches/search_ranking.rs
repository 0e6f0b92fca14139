//! Search Ranking Benchmarks
//!
//! Run with: cargo bench --bench search_ranking
//!
//! Labels:
//! - rank_candidates: scoring and ordering only, by candidate count
//! - search_query: backend plus ranking, by backend and forum size

use std::sync::Arc;
use std::time::Duration;

use boardsearch::{
    rank_candidates, select_api, Board, BoardId, Candidate, MemberId, MemoryForum, Message,
    MessageId, ScorerContext, SearchConfig, SearchEngine, SearchIndexKind, SearchParams, SortKey,
    TopicId, WeightConfig, WeightFactors, WeightedScorer,
};
use chrono::{DateTime, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

// ============================================================================
// Constants and Utilities
// ============================================================================

/// Fixed seed for reproducible data
const BENCH_SEED: u64 = 0x5EED_B0A2_D5EA_2C40;

/// Simple LCG for deterministic pseudo-random data
fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

const WORDS: [&str; 10] = [
    "clay", "soil", "compost", "roses", "tomato", "blight", "spade", "mulch", "frost", "seed",
];

fn sentence(state: &mut u64, len: usize) -> String {
    (0..len)
        .map(|_| WORDS[(lcg_next(state) % WORDS.len() as u64) as usize])
        .collect::<Vec<_>>()
        .join(" ")
}

fn candidates(count: usize) -> Vec<Candidate> {
    let mut state = BENCH_SEED;
    (0..count as u32)
        .map(|i| {
            let r = lcg_next(&mut state);
            Candidate {
                message_id: MessageId(i + 1),
                topic_id: TopicId(i / 8 + 1),
                board_id: BoardId(i % 4 + 1),
                poster_id: MemberId(i % 50 + 1),
                posted_at: now() - chrono::Duration::hours((r % 20_000) as i64),
                is_sticky: r % 17 == 0,
                is_first_message: i % 8 == 0,
                topic_replies: 7,
                subject_hits: (r % 3) as u32,
                body_hits: (r % 4) as u32,
            }
        })
        .collect()
}

fn populate_forum(count: usize) -> Arc<MemoryForum> {
    let forum = MemoryForum::new();
    for id in 1..=4 {
        forum.add_board(Board {
            id: BoardId(id),
            name: format!("Board {}", id),
            category_id: 1,
            category_name: "Garden".to_string(),
        });
    }
    let mut state = BENCH_SEED;
    for i in 0..count as u32 {
        let r = lcg_next(&mut state);
        forum.add_message(Message {
            id: MessageId(i + 1),
            topic_id: TopicId(i / 8 + 1),
            board_id: BoardId(i % 4 + 1),
            poster_id: MemberId(i % 50 + 1),
            poster_name: format!("member{}", i % 50 + 1),
            subject: sentence(&mut state, 3),
            body: sentence(&mut state, 40),
            posted_at: now() - chrono::Duration::hours((r % 20_000) as i64),
            smileys_enabled: true,
        });
    }
    Arc::new(forum)
}

// ============================================================================
// rank_candidates
// ============================================================================

fn bench_rank_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_candidates");
    let scorer = WeightedScorer::new(WeightFactors::from_config(&WeightConfig::default(), true));

    for count in [100, 1_000, 10_000] {
        let input = candidates(count);
        let mut ctx = ScorerContext::new(now(), 2).with_recent_window(120.0);
        ctx.count_topics(&input);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("relevance", count), &input, |b, input| {
            b.iter(|| rank_candidates(input, &scorer, &ctx, 5_000, SortKey::Relevance))
        });
    }
    group.finish();
}

// ============================================================================
// search_query
// ============================================================================

fn bench_search_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_query");
    group.measurement_time(Duration::from_secs(5));

    for count in [1_000, 10_000] {
        let forum = populate_forum(count);
        for kind in [SearchIndexKind::Standard, SearchIndexKind::Fulltext] {
            let config = Arc::new(SearchConfig {
                index: kind,
                ..SearchConfig::default()
            });
            let api = select_api(&config, forum.clone()).unwrap();
            let label = match kind {
                SearchIndexKind::Standard => "standard",
                SearchIndexKind::Fulltext => "fulltext",
            };

            group.throughput(Throughput::Elements(count as u64));
            group.bench_with_input(BenchmarkId::new(label, count), &count, |b, _| {
                b.iter(|| {
                    let mut engine =
                        SearchEngine::new(config.clone(), forum.clone(), forum.clone()).with_now(now());
                    engine.set_weights(WeightFactors::from_config(&config.weights, true));
                    engine.set_params(
                        SearchParams::new()
                            .with_search("clay compost -blight")
                            .with_boards([BoardId(1), BoardId(2), BoardId(3), BoardId(4)]),
                        false,
                    );
                    engine.search_query(api.as_ref()).unwrap()
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_rank_candidates, bench_search_query);
criterion_main!(benches);
