use proptest::prelude::*;
use std::sync::Arc;
use swot_core::{EndReason, QuestionId, RoundPlan, TrainingState};
use swot_engine::TrainingEngine;
use swot_test_utils::{fast_options, questions, RecordingCritiqueOracle, ScriptedSolveOracle};

/// Question count, batch size, and a batch index within (or just past) the plan
fn round_shape() -> impl Strategy<Value = (usize, usize, usize)> {
    (1usize..12, 1usize..5).prop_flat_map(|(count, batch_size)| {
        let batches = (count + batch_size - 1) / batch_size;
        (Just(count), Just(batch_size), 0..=batches)
    })
}

struct Resumed {
    plan: RoundPlan,
    calls: Vec<(QuestionId, usize)>,
    state: TrainingState,
    end_reason: Option<EndReason>,
    loops: u32,
}

/// Restore a paused session at `start_index` of a one-round plan and resume it
fn resume_at(count: usize, batch_size: usize, start_index: usize) -> Resumed {
    let names: Vec<String> = (0..count).map(|i| format!("q{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let solver = Arc::new(ScriptedSolveOracle::always_correct());
        let engine = TrainingEngine::builder(solver.clone(), Arc::new(RecordingCritiqueOracle::new()))
            .with_options(fast_options().with_batch_size(batch_size).with_max_loop_count(1))
            .with_questions(questions(&refs))
            .build()
            .unwrap();

        let ids: Vec<QuestionId> = names.iter().map(|n| QuestionId::from(n.as_str())).collect();
        let plan = RoundPlan::partition(&ids, batch_size);
        let mut snapshot = engine.snapshot();
        snapshot.training_state = TrainingState::Paused;
        snapshot.session.round_plan = Some(plan.clone());
        snapshot.session.last_batch_index = start_index;
        engine.restore(snapshot).unwrap();

        assert!(engine.resume());
        let state = engine.wait_until_settled().await;
        let session = engine.session();
        Resumed {
            calls: ids.iter().map(|id| (id.clone(), solver.call_count(id.as_str()))).collect(),
            plan,
            state,
            end_reason: engine.end_reason(),
            loops: session.total_loop_count,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_resume_runs_each_remaining_batch_once((count, batch_size, start_index) in round_shape()) {
        let resumed = resume_at(count, batch_size, start_index);

        prop_assert_eq!(resumed.state, TrainingState::Ended);
        prop_assert_eq!(resumed.end_reason, Some(EndReason::LoopBudgetExhausted));
        prop_assert_eq!(resumed.loops, 1);

        for (id, calls) in &resumed.calls {
            let batch = resumed
                .plan
                .batches
                .iter()
                .position(|b| b.contains(id))
                .unwrap();
            let expected = usize::from(batch >= start_index);
            prop_assert_eq!(*calls, expected, "question {} in batch {}", id, batch);
        }
    }

    #[test]
    fn prop_partition_covers_ids_in_order(count in 0usize..40, batch_size in 1usize..8) {
        let ids: Vec<QuestionId> = (0..count).map(|i| QuestionId::from(format!("q{i}").as_str())).collect();
        let plan = RoundPlan::partition(&ids, batch_size);

        prop_assert_eq!(plan.len(), (count + batch_size - 1) / batch_size);
        prop_assert!(plan.batches.iter().all(|b| !b.is_empty() && b.len() <= batch_size));
        let flattened: Vec<QuestionId> = plan.batches.concat();
        prop_assert_eq!(flattened, ids);
    }
}
