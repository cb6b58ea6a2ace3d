mod common;

use std::time::Duration;

use common::{position, RecordingStore};
use shiori::{FlushOutcome, PersistenceScheduler};
use tokio::time;

const DEBOUNCE: Duration = Duration::from_millis(3_000);

fn scheduler(store: &std::sync::Arc<RecordingStore>) -> PersistenceScheduler {
    PersistenceScheduler::new("book-1", store.clone(), DEBOUNCE, 20)
}

async fn past_debounce() {
    time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
}

#[tokio::test(start_paused = true)]
async fn identical_signatures_collapse_into_one_write() {
    let store = RecordingStore::new();
    let scheduler = scheduler(&store);

    for i in 0..5 {
        // Snippets differ only after the signature prefix.
        let sentence = format!("The harbour was quiet that night, take {i}");
        scheduler.schedule(position(2, 140, &sentence)).await;
        time::sleep(Duration::from_millis(500)).await;
    }
    past_debounce().await;
    assert_eq!(store.save_count(), 1);

    scheduler
        .schedule(position(2, 140, "The harbour was quiet that night, again"))
        .await;
    past_debounce().await;
    assert_eq!(store.save_count(), 1);
    assert_eq!(scheduler.write_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn nothing_is_written_before_the_quiet_period_ends() {
    let store = RecordingStore::new();
    let scheduler = scheduler(&store);

    scheduler.schedule(position(0, 10, "first")).await;
    time::sleep(Duration::from_millis(2_000)).await;
    scheduler.schedule(position(0, 20, "second")).await;
    time::sleep(Duration::from_millis(2_000)).await;
    assert_eq!(store.save_count(), 0);

    time::sleep(Duration::from_millis(1_100)).await;
    let saves = store.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].chapter_char_offset, 20);
    assert_eq!(saves[0].sentence_text, "second");
}

#[tokio::test(start_paused = true)]
async fn forced_flush_writes_the_just_scheduled_position() {
    let store = RecordingStore::new();
    let scheduler = scheduler(&store);

    let p = position(1, 77, "She closed the book.");
    scheduler.schedule(p.clone()).await;
    assert!(scheduler.has_timer().await);

    assert_eq!(scheduler.force_flush_now().await, FlushOutcome::Written);
    assert!(!scheduler.has_timer().await);
    assert_eq!(store.saves()[0].clone().into_position(), p);

    past_debounce().await;
    assert_eq!(store.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_snippets_are_never_persisted() {
    let store = RecordingStore::new();
    let scheduler = scheduler(&store);

    scheduler.schedule(position(0, 300, "")).await;
    past_debounce().await;
    assert_eq!(store.save_count(), 0);
    assert!(scheduler.pending().await.is_none());

    scheduler.schedule(position(0, 300, "")).await;
    assert_eq!(scheduler.force_flush_now().await, FlushOutcome::Rejected);
    assert_eq!(scheduler.force_flush_now().await, FlushOutcome::Idle);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_write_stays_pending_until_the_next_flush() {
    let store = RecordingStore::new();
    let scheduler = scheduler(&store);
    store.set_failing(true);

    scheduler.schedule(position(4, 12, "It was raining.")).await;
    past_debounce().await;
    assert_eq!(store.save_count(), 0);
    assert!(scheduler.pending().await.is_some());
    // No automatic retry.
    past_debounce().await;
    assert_eq!(store.save_count(), 0);

    store.set_failing(false);
    assert_eq!(scheduler.force_flush_now().await, FlushOutcome::Written);
    assert_eq!(store.saves()[0].chapter_char_offset, 12);
    assert!(scheduler.pending().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_timer_but_keeps_the_pending_position() {
    let store = RecordingStore::new();
    let scheduler = scheduler(&store);

    scheduler.schedule(position(0, 5, "Hello there.")).await;
    scheduler.shutdown().await;
    past_debounce().await;
    assert_eq!(store.save_count(), 0);

    assert_eq!(scheduler.force_flush_now().await, FlushOutcome::Written);
    assert_eq!(store.save_count(), 1);
}
