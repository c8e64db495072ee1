use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::sleep;

use focus_timer::{
    services::DriverPreference, FocusTimer, TimerEvent, TimerOptions, TimerState, TimerUpdate,
};

fn record(timer: &FocusTimer) -> Arc<Mutex<Vec<TimerUpdate>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = timer.subscribe(move |update| sink.lock().unwrap().push(update.clone()));
    seen
}

fn events(seen: &Arc<Mutex<Vec<TimerUpdate>>>) -> Vec<TimerEvent> {
    seen.lock().unwrap().iter().map(|u| u.event).collect()
}

#[tokio::test(start_paused = true)]
async fn short_countdown_completes_exactly_once() {
    let timer = FocusTimer::new(0);
    let seen = record(&timer);

    timer.set_duration_seconds(3);
    timer.start();
    sleep(Duration::from_millis(3_500)).await;

    let events = events(&seen);
    assert_eq!(events.iter().filter(|e| **e == TimerEvent::Complete).count(), 1);
    assert_eq!(events.last(), Some(&TimerEvent::Complete));

    let snapshot = timer.snapshot();
    assert_eq!(snapshot.state, TimerState::Completed);
    assert_eq!(snapshot.remaining_seconds, 0);

    // further polling never re-completes
    sleep(Duration::from_secs(2)).await;
    assert_eq!(self::events(&seen).len(), events.len());
}

#[tokio::test(start_paused = true)]
async fn pause_holds_the_remaining_time() {
    let timer = FocusTimer::new(0);
    timer.set_duration_seconds(1500);
    timer.start();
    sleep(Duration::from_secs(1)).await;
    timer.pause();

    let paused = timer.snapshot();
    assert_eq!(paused.state, TimerState::Paused);
    assert!(matches!(paused.remaining_seconds, 1498 | 1499));

    sleep(Duration::from_secs(2)).await;
    assert_eq!(timer.snapshot().remaining_seconds, paused.remaining_seconds);
}

#[tokio::test(start_paused = true)]
async fn immediate_pause_and_resume_loses_nothing() {
    let timer = FocusTimer::new(0);
    timer.set_duration_seconds(30);
    timer.start();
    timer.pause();
    timer.resume();

    let snapshot = timer.snapshot();
    assert_eq!(snapshot.state, TimerState::Running);
    assert_eq!(snapshot.remaining_seconds, 30);
}

#[tokio::test(start_paused = true)]
async fn stop_then_reset_restores_the_duration() {
    let timer = FocusTimer::new(0);
    timer.set_duration_seconds(45);
    timer.start();
    timer.stop();
    assert_eq!(timer.snapshot().state, TimerState::Stopped);

    timer.reset();
    let snapshot = timer.snapshot();
    assert_eq!(snapshot.state, TimerState::Idle);
    assert_eq!(snapshot.remaining_seconds, 45);
}

#[tokio::test(start_paused = true)]
async fn remaining_never_increases_while_running() {
    let timer = FocusTimer::new(12);
    let seen = record(&timer);
    timer.start();
    sleep(Duration::from_secs(13)).await;

    let remaining: Vec<u64> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|u| u.snapshot.remaining_seconds)
        .collect();
    assert!(remaining.windows(2).all(|pair| pair[0] >= pair[1]));
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .all(|u| u.snapshot.remaining_seconds <= u.snapshot.planned_duration_seconds));
}

#[tokio::test]
async fn background_commands_before_ready_apply_in_order() {
    let options = TimerOptions {
        worker_ready_delay: Duration::from_millis(200),
        ..TimerOptions::default()
    };
    let timer = FocusTimer::builder(0)
        .preference(DriverPreference::Background)
        .options(options)
        .build();
    let seen = record(&timer);

    timer.set_duration_seconds(1);
    timer.start();
    sleep(Duration::from_millis(2_000)).await;

    let events = events(&seen);
    assert_eq!(events.first(), Some(&TimerEvent::Reset));
    assert_eq!(events.get(1), Some(&TimerEvent::Start));
    assert_eq!(events.last(), Some(&TimerEvent::Complete));
    assert_eq!(timer.snapshot().state, TimerState::Completed);
}
