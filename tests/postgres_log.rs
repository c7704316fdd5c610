//! Postgres purge log contract tests.
//!
//! - Need a reachable database in `DATABASE_URL`; `sqlx::test` creates a
//!   scratch database per test and applies `./migrations`.
//! - Marked `#[ignore]`; run with `cargo test -- --ignored`.

use std::time::Duration;

use sqlx::PgPool;

use purgery::application::repos::PurgeLogRepo;
use purgery::domain::position::LogPosition;
use purgery::infra::db::PostgresRepositories;

const TTL: Duration = Duration::from_secs(60);

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn appended_positions_strictly_increase(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    let mut last = LogPosition::ZERO;
    for index in 0..20 {
        let position = repo
            .append(&format!("http://example.com/{index}"))
            .await
            .expect("append");
        assert!(position > last, "{position} after {last}");
        last = position;
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn bootstrap_keeps_the_first_value(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    let first = repo
        .bootstrap_checkpoint("purgery:checkpoints:a", LogPosition::new(1_000, 0), TTL)
        .await
        .expect("bootstrap");
    let second = repo
        .bootstrap_checkpoint("purgery:checkpoints:a", LogPosition::new(9_000, 0), TTL)
        .await
        .expect("bootstrap");

    assert_eq!(first, LogPosition::new(1_000, 0));
    assert_eq!(second, first);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn stale_checkpoint_survives_bootstrap(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);
    let key = "purgery:checkpoints:b";

    repo.advance_checkpoint(key, LogPosition::new(5_000, 2), Duration::ZERO)
        .await
        .expect("advance");
    assert_eq!(
        repo.load_checkpoint(key).await.expect("load"),
        Some(LogPosition::new(5_000, 2))
    );

    let resumed = repo
        .bootstrap_checkpoint(key, LogPosition::new(7_000, 0), TTL)
        .await
        .expect("bootstrap");
    assert_eq!(resumed, LogPosition::new(5_000, 2));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn advance_never_moves_backwards(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);
    let key = "purgery:checkpoints:c";

    repo.advance_checkpoint(key, LogPosition::new(5_000, 3), TTL)
        .await
        .expect("advance");
    repo.advance_checkpoint(key, LogPosition::new(5_000, 1), TTL)
        .await
        .expect("advance");

    assert_eq!(
        repo.load_checkpoint(key).await.expect("load"),
        Some(LogPosition::new(5_000, 3))
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn blocking_read_wakes_on_append(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);
    let reader = repo.clone();

    let handle = tokio::spawn(async move {
        reader
            .read_after(LogPosition::ZERO, Duration::from_secs(5))
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let position = repo.append("http://example.com/a").await.expect("append");

    let entry = handle
        .await
        .expect("reader joins")
        .expect("read")
        .expect("entry");
    assert_eq!(entry.position, position);
    assert_eq!(entry.url, "http://example.com/a");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn blocking_read_times_out_without_appends(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);
    let position = repo.append("http://example.com/a").await.expect("append");

    let entry = repo
        .read_after(position, Duration::from_millis(100))
        .await
        .expect("read");
    assert!(entry.is_none());
    repo.ping().await.expect("ping");
}
