use proptest::prelude::*;

use flashpass::mastery::aggregate_levels;
use flashpass::model::{Card, CardDraft, MASTERY_LEVELS};
use flashpass::session::StudySession;

#[derive(Debug, Clone)]
enum Op {
    Flip,
    Next,
    Previous,
    Record(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Flip),
        Just(Op::Next),
        Just(Op::Previous),
        (-10i64..150).prop_map(Op::Record),
    ]
}

fn cards(n: usize) -> Vec<Card> {
    (0..n)
        .map(|i| {
            Card::from_draft(CardDraft {
                front: format!("front {i}"),
                back: format!("back {i}"),
            })
        })
        .collect()
}

proptest! {
    /// The cursor never leaves [0, len-1] and every mirror entry stays one
    /// of the five levels, no matter what sequence of operations runs.
    #[test]
    fn session_invariants_hold_under_any_op_sequence(
        len in 1usize..8,
        ops in proptest::collection::vec(op_strategy(), 0..64),
    ) {
        let mut session = StudySession::new("owner");
        session.load(None, cards(len));

        for op in ops {
            match op {
                Op::Flip => session.flip(),
                Op::Next => { session.next(); }
                Op::Previous => { session.previous(); }
                Op::Record(value) => {
                    let valid = MASTERY_LEVELS.contains(&(value.clamp(0, 255) as u8))
                        && (0..=100).contains(&value);
                    prop_assert_eq!(session.record_mastery(value).is_ok(), valid);
                }
            }

            prop_assert!(session.cursor() < len);
            let progress = session.progress_fraction();
            prop_assert!(progress > 0.0 && progress <= 1.0);
            for index in 0..len {
                let level = session.mastery_at(index).unwrap();
                prop_assert!(MASTERY_LEVELS.contains(&level.percent()));
            }
            prop_assert!(session.set_mastery() <= 100);
        }
    }

    /// The aggregate is always within [0, 100] and bounded by the extremes
    /// of its inputs.
    #[test]
    fn aggregate_stays_bounded(
        levels in proptest::collection::vec(
            proptest::sample::select(MASTERY_LEVELS.to_vec()),
            0..32,
        ),
    ) {
        let parsed: Vec<_> = levels
            .iter()
            .map(|&v| flashpass::model::MasteryLevel::from_percent(v as i64).unwrap())
            .collect();
        let aggregated = aggregate_levels(parsed.iter().copied());
        prop_assert!(aggregated <= 100);
        if let (Some(min), Some(max)) = (levels.iter().min(), levels.iter().max()) {
            prop_assert!(aggregated >= *min);
            prop_assert!(aggregated <= *max);
        } else {
            prop_assert_eq!(aggregated, 0);
        }
    }
}
