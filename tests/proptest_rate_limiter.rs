use proptest::prelude::*;
use std::time::{Duration, Instant};
use treasure_hunter_bot::rate_limiter::WindowLog;

const WINDOW: Duration = Duration::from_secs(60);

proptest! {
    /// No rolling window ever contains more than `limit` admitted requests.
    #[test]
    fn never_exceeds_limit_in_any_window(
        limit in 1usize..15,
        // Gaps between consecutive requests, in milliseconds
        gaps in proptest::collection::vec(0u64..20_000, 1..200),
    ) {
        let start = Instant::now();
        let mut log = WindowLog::new();
        let mut now = start;
        let mut admitted = Vec::new();

        for gap in gaps {
            now += Duration::from_millis(gap);
            if log.admit(now, limit, WINDOW).is_allowed() {
                admitted.push(now);
            }
        }

        for (i, first) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|t| t.duration_since(*first) < WINDOW)
                .count();
            prop_assert!(in_window <= limit, "{} requests within one window", in_window);
        }
    }

    /// A denied request leaves the stored timestamps untouched.
    #[test]
    fn denial_never_mutates(
        limit in 1usize..10,
        offsets in proptest::collection::vec(0u64..59_000, 1..40),
        probe in 0u64..120_000,
    ) {
        let start = Instant::now();
        let mut log = WindowLog::new();
        let mut sorted = offsets;
        sorted.sort_unstable();
        for offset in &sorted {
            let _ = log.admit(start + Duration::from_millis(*offset), limit, WINDOW);
        }

        let last = sorted.last().copied().unwrap_or(0);
        let at = start + Duration::from_millis(last.max(probe));
        let before = log.timestamps();
        let admission = log.admit(at, limit, WINDOW);

        if !admission.is_allowed() {
            prop_assert_eq!(log.timestamps(), before);
            prop_assert!(admission.retry_after_secs() <= WINDOW.as_secs());
        }
    }

    /// Once the limit is reached, the reported wait is exactly what it takes
    /// to be admitted again.
    #[test]
    fn retry_after_is_accurate(limit in 1usize..10, spacing_ms in 1u64..5_000) {
        let start = Instant::now();
        let mut log = WindowLog::new();
        for i in 0..limit {
            let t = start + Duration::from_millis(spacing_ms * i as u64);
            prop_assert!(log.admit(t, limit, WINDOW).is_allowed());
        }

        let now = start + Duration::from_millis(spacing_ms * limit as u64);
        let denied = log.admit(now, limit, WINDOW);
        if let treasure_hunter_bot::rate_limiter::Admission::Denied { retry_after } = denied {
            prop_assert!(!log.admit(now + retry_after - Duration::from_nanos(1), limit, WINDOW).is_allowed());
            prop_assert!(log.admit(now + retry_after, limit, WINDOW).is_allowed());
        } else {
            // Only possible when the whole burst already left the window
            prop_assert!(spacing_ms * limit as u64 >= WINDOW.as_millis() as u64);
        }
    }
}
