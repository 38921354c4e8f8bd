//! Property-based tests for the Lineplay replay engine.
//!
//! Uses proptest to generate random well-formed feeds, replays them
//! unthrottled, and checks ordering, skip and accrual invariants.

use lineplay_core::record::RawRecord;
use lineplay_core::replay::{ReplayConfig, TimelineReplayer};
use lineplay_core::test_utils::*;
use lineplay_core::time::SimTime;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

const OBJECTS: [&str; 4] = ["A", "B", "Queue for A", "Unknown"];

/// One generated event: gap to the previous record (hundredths), target
/// object, event kind and state value.
fn arb_event() -> impl Strategy<Value = (u32, usize, u8, u8)> {
    (0..400u32, 0..OBJECTS.len(), 0..4u8, 0..8u8)
}

/// A feed with non-decreasing timestamps written with two decimals. Some
/// records have an empty Timestamp.
fn arb_feed(max_len: usize) -> impl Strategy<Value = Vec<RawRecord>> {
    proptest::collection::vec(arb_event(), 1..=max_len).prop_map(|events| {
        let mut hundredths = 0u32;
        events
            .into_iter()
            .map(|(gap, obj, kind, value)| {
                hundredths += gap;
                let ts = format!("{}.{:02}", hundredths / 100, hundredths % 100);
                let object = OBJECTS[obj];
                match kind {
                    0 => raw_part(&ts, object, "Work_In", "S"),
                    1 => raw_part(&ts, object, "Work_Out", "S"),
                    2 => raw_state(&ts, object, value),
                    _ => raw_part("", object, "Work_In", "S"),
                }
            })
            .collect()
    })
}

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime")
        .block_on(fut)
}

fn t(hundredths: u32) -> SimTime {
    SimTime::from_num(hundredths) / 100
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Delivered timestamps never go backwards.
    #[test]
    fn delivered_times_non_decreasing(feed in arb_feed(60)) {
        let log = CallLog::new();
        let mut reg = recorded_registry(&OBJECTS[..3], &log);
        block_on(async {
            TimelineReplayer::new(ReplayConfig::default())
                .unwrap()
                .run(ok_feed(feed), &mut reg)
                .await
                .unwrap()
        });
        let times = log.group_times();
        prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    /// Nothing below the skip floor reaches an observer, and the skip count
    /// matches the timed records below the floor.
    #[test]
    fn skip_floor_respected(feed in arb_feed(60), floor in 0u32..6000) {
        let floor_time = t(floor);
        let expected_skipped = feed
            .iter()
            .filter_map(|r| r.timestamp_text())
            .filter(|text| text.parse::<SimTime>().unwrap() < floor_time)
            .count() as u64;

        let log = CallLog::new();
        let mut reg = recorded_registry(&OBJECTS[..3], &log);
        let cfg = ReplayConfig { skip_to: floor_time, ..ReplayConfig::default() };
        let summary = block_on(async {
            TimelineReplayer::new(cfg)
                .unwrap()
                .run(ok_feed(feed), &mut reg)
                .await
                .unwrap()
        });

        prop_assert!(log.group_times().iter().all(|&time| time >= floor_time));
        prop_assert_eq!(summary.records_skipped, expected_skipped);
    }

    /// A Working interval [t0, t1] ending in Work_Out shows exactly t1 - t0
    /// to the work-out observer, and the accrual is cleared afterwards.
    #[test]
    fn work_out_sees_exact_interval(start in 0u32..100_000, len in 0u32..100_000) {
        let t0 = format!("{}.{:02}", start / 100, start % 100);
        let end = start + len;
        let t1 = format!("{}.{:02}", end / 100, end % 100);

        let log = CallLog::new();
        let mut reg = recorded_registry(&["A"], &log);
        let feed = vec![raw_state(&t0, "A", 1), raw_part(&t1, "A", "Work_Out", "S")];
        block_on(async {
            TimelineReplayer::new(ReplayConfig::default())
                .unwrap()
                .run(ok_feed(feed), &mut reg)
                .await
                .unwrap()
        });

        let calls = log.calls();
        let out = calls.iter().find(|c| c.label == "work_out").unwrap();
        let expected = t1.parse::<SimTime>().unwrap() - t0.parse::<SimTime>().unwrap();
        prop_assert_eq!(out.process_time, Some(expected));
        prop_assert_eq!(reg.activity("A").unwrap().process_time(), SimTime::ZERO);
    }
}
