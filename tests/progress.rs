use pdf_batch::progress::ProgressState;
use std::time::{Duration, Instant};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn estimate_unknown_until_first_file() {
    let t0 = Instant::now();
    let mut p = ProgressState::default();
    p.start(4, t0);

    let snap = p.snapshot(t0 + secs(5));
    assert_eq!(snap.elapsed, secs(5));
    assert_eq!(snap.estimated_remaining, None);
    assert_eq!(snap.remaining, 4);

    p.complete_one();
    let snap = p.snapshot(t0 + secs(10));
    assert_eq!(snap.completed, 1);
    assert_eq!(snap.estimated_remaining, Some(secs(30)));
    assert_eq!(snap.percent(), 25.0);
}

#[test]
fn paused_time_is_excluded() {
    let t0 = Instant::now();
    let mut p = ProgressState::default();
    p.start(2, t0);

    p.pause(t0 + secs(10));
    assert!(p.is_paused());
    // Frozen while paused.
    assert_eq!(p.elapsed(t0 + secs(40)), secs(10));

    p.resume(t0 + secs(70));
    assert!(!p.is_paused());
    assert_eq!(p.elapsed(t0 + secs(75)), secs(15));

    p.complete_one();
    assert_eq!(p.estimated_remaining(t0 + secs(75)), Some(secs(15)));
}

#[test]
fn repeated_pause_keeps_the_first_instant() {
    let t0 = Instant::now();
    let mut p = ProgressState::default();
    p.start(1, t0);
    p.pause(t0 + secs(1));
    p.pause(t0 + secs(5));
    p.resume(t0 + secs(9));
    assert_eq!(p.elapsed(t0 + secs(10)), secs(2));
}

#[test]
fn completed_never_exceeds_total() {
    let t0 = Instant::now();
    let mut p = ProgressState::default();
    p.start(2, t0);
    for _ in 0..5 {
        p.complete_one();
    }
    assert_eq!(p.completed(), p.total());
    assert_eq!(p.snapshot(t0).remaining, 0);
    assert_eq!(p.estimated_remaining(t0 + secs(4)), Some(Duration::ZERO));
}

#[test]
fn finish_freezes_the_clock_and_closes_a_pause() {
    let t0 = Instant::now();
    let mut p = ProgressState::default();
    p.start(3, t0);
    p.pause(t0 + secs(4));
    p.finish(t0 + secs(6));

    assert!(!p.is_paused());
    assert_eq!(p.elapsed(t0 + secs(100)), secs(4));
}

#[test]
fn not_started_reads_zero() {
    let p = ProgressState::default();
    let snap = p.snapshot(Instant::now());
    assert_eq!(snap.elapsed, Duration::ZERO);
    assert_eq!(snap.total, 0);
    assert_eq!(snap.percent(), 0.0);
}
