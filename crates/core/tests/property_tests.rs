use cuegraph_core::timecode;
use cuegraph_core::timeline::{absorb, group};
use cuegraph_core::{ConsolidatedEvent, Consolidator, TimedEvent};
use proptest::prelude::*;

fn arb_event() -> impl Strategy<Value = TimedEvent> {
    (
        prop::sample::select(vec!["Red", "Blue", "Strobe", "Haze", "MIC01 - ON"]),
        0u64..20_000,
        0u64..10_000,
    )
        .prop_map(|(name, start, duration)| {
            TimedEvent::new(
                name,
                timecode::format_timecode(start),
                timecode::format_timecode(duration),
            )
        })
}

proptest! {
    #[test]
    fn test_timecode_round_trip(units in 0u64..10_000_000) {
        let rendered = timecode::format_timecode(units);
        prop_assert_eq!(timecode::normalize(&rendered).unwrap(), units);
    }

    #[test]
    fn test_quantize_lands_on_resolution(units in 0u64..1_000_000, resolution in 1u64..500) {
        let quantized = timecode::quantize(units, resolution);
        prop_assert_eq!(quantized % resolution, 0);
        prop_assert!(quantized.abs_diff(units) * 2 <= resolution);
    }

    #[test]
    fn test_consolidation_is_idempotent(
        events in prop::collection::vec(arb_event(), 0..12),
        resolution in prop::sample::select(vec![1u64, 10, 100]),
    ) {
        let consolidator = Consolidator::new(resolution);
        let once = consolidator.consolidate(&events).unwrap();
        let twice = consolidator.consolidate_entries(once.clone());
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn test_consolidated_entries_are_disjoint_in_signature(
        events in prop::collection::vec(arb_event(), 0..12),
    ) {
        let consolidated = Consolidator::default().consolidate(&events).unwrap();

        for (i, a) in consolidated.iter().enumerate() {
            prop_assert!(!a.names.is_empty());
            for b in &consolidated[i + 1..] {
                prop_assert_ne!(a.signature(), b.signature());
                prop_assert!(!a.strictly_contains(b));
                prop_assert!(!b.strictly_contains(a));
            }
        }
        prop_assert!(consolidated.windows(2).all(|pair| pair[0].start <= pair[1].start));
    }

    #[test]
    fn test_every_name_survives_absorption(
        events in prop::collection::vec(arb_event(), 1..12),
    ) {
        let entries: Vec<ConsolidatedEvent> = events
            .iter()
            .map(|event| {
                ConsolidatedEvent::new(
                    vec![event.name.clone()],
                    timecode::normalize(&event.start).unwrap(),
                    timecode::normalize(&event.duration).unwrap(),
                )
            })
            .collect();

        let absorbed = absorb(group(entries));

        for event in &events {
            prop_assert!(absorbed.iter().any(|entry| entry.names.contains(&event.name)));
        }
    }
}
