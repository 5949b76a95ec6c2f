//! End-to-end tests for pipeline execution.

use crate::completion::{Completion, HandleSet};
use crate::core::{Outcome, OutcomeKind};
use crate::executor::{ExecutionService, ExecutorConfig, TokioExecutor};
use crate::pipeline::Pipeline;
use crate::policy::{ExceptionPolicy, RecordingPolicy, RetryOncePolicy};
use crate::stages::Collector;
use crate::testing::{
    assert_abandoned, assert_completed, assert_dropped, int_pipeline, pipeline_on, test_executor,
    FailingPipe, RecordingPipe, SlowPipe, WAIT,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Record {
    key: &'static str,
    seq: u32,
}

fn record(key: &'static str, seq: u32) -> Record {
    Record { key, seq }
}

fn kind_of(handles: &HandleSet, id: crate::core::PipelineId) -> Option<OutcomeKind> {
    handles.get(id).and_then(|h| h.kind())
}

// Sequential traversal

#[test]
fn test_stages_apply_in_order() {
    let p = int_pipeline("order")
        .map(|x| x + 1)
        .map(|x| x * 3)
        .map(|x| x - 2);
    assert_eq!(p.process(4), Some(13));
}

#[test]
fn test_map_changes_type() {
    let p = int_pipeline("typed").map(|x| format!("#{x}")).map(String::len);
    assert_eq!(p.process(123), Some(4));
}

#[test]
fn test_drop_short_circuits_later_stages() {
    let spy = RecordingPipe::new();
    let p = int_pipeline("drop").filter(|x| *x > 0).connect(spy.clone());

    assert_eq!(p.process(-5), None);
    assert_eq!(spy.calls(), 0);

    assert_eq!(p.process(5), Some(5));
    assert_eq!(spy.inputs(), vec![5]);
}

#[test]
fn test_filter_then_action() {
    let p = int_pipeline("t").filter(|x| *x > 0).action(|x| x * 2);

    assert_eq!(p.process(3), Some(6));
    assert_eq!(p.process(-1), None);
    assert_eq!(p.process(0), None);
}

#[test]
fn test_distinct_and_duplicates() {
    let distinct = int_pipeline("distinct").distinct();
    assert_eq!(distinct.process(7), Some(7));
    assert_eq!(distinct.process(7), None);

    let duplicates = int_pipeline("duplicates").duplicates();
    assert_eq!(duplicates.process(7), None);
    assert_eq!(duplicates.process(7), Some(7));
}

#[test]
fn test_distinct_by_key() {
    let p = pipeline_on::<Record>("records", &test_executor()).distinct_by(|r| r.key);

    let outputs: Vec<_> = [record("a", 1), record("a", 2), record("b", 3)]
        .into_iter()
        .map(|r| p.process(r))
        .collect();

    assert_eq!(outputs, vec![Some(record("a", 1)), None, Some(record("b", 3))]);
}

#[test]
fn test_duplicates_by_key() {
    let p = pipeline_on::<Record>("records", &test_executor()).duplicates_by(|r| r.key);

    assert_eq!(p.process(record("a", 1)), None);
    assert_eq!(p.process(record("a", 2)), Some(record("a", 2)));
    assert_eq!(p.process(record("b", 3)), None);
}

#[test]
fn test_bounds_are_inclusive() {
    let p = int_pipeline("bounds").min(0).max(10);
    let kept: Vec<_> = (-2..=12).filter_map(|x| p.process(x)).collect();
    assert_eq!(kept, (0..=10).collect::<Vec<_>>());
}

#[test]
fn test_bounds_with_comparator() {
    let p = pipeline_on::<String>("words", &test_executor())
        .min_by("bb".to_string(), |a, b| a.len().cmp(&b.len()))
        .max_by("dddd".to_string(), |a, b| a.len().cmp(&b.len()));

    assert_eq!(p.process("a".to_string()), None);
    assert_eq!(p.process("zz".to_string()), Some("zz".to_string()));
    assert_eq!(p.process("yyyy".to_string()), Some("yyyy".to_string()));
    assert_eq!(p.process("xxxxx".to_string()), None);
}

#[test]
fn test_peek_sees_values_in_place() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let p = int_pipeline("peek")
        .map(|x| x * 10)
        .peek(move |x| sink.lock().push(*x))
        .map(|x| x + 1);

    assert_eq!(p.process(2), Some(21));
    assert_eq!(*seen.lock(), vec![20]);
}

#[test]
fn test_collect_forwards_and_accumulates() {
    let collector = Collector::to_vec();
    let p = int_pipeline("collect").filter(|x| x % 2 == 0).collect(&collector).map(|x| x / 2);

    let outputs: Vec<_> = (1..=6).filter_map(|x| p.process(x)).collect();
    assert_eq!(outputs, vec![1, 2, 3]);
    assert_eq!(collector.take(), vec![2, 4, 6]);
    assert!(collector.result().is_empty());
}

#[test]
fn test_intermediate_pipeline_is_a_branch_point() {
    let base = int_pipeline("base").map(|x| x + 1);
    let doubled = base.map(|x| x * 2);
    let tripled = base.map(|x| x * 3);

    assert_eq!(base.process(1), Some(2));
    assert_eq!(doubled.process(1), Some(4));
    assert_eq!(tripled.process(1), Some(6));
    assert_eq!(base.len(), 1);
}

#[test]
fn test_derived_pipelines_share_stage_state() {
    let distinct = int_pipeline("shared").distinct();
    let extended = distinct.map(|x| x * 100);

    assert_eq!(extended.process(1), Some(100));
    assert_eq!(distinct.process(1), None);
}

#[test]
fn test_process_outcome_tells_drop_from_failure() {
    let p = int_pipeline("outcome")
        .filter(|x| *x != 0)
        .try_map(|x| if *x < 0 { anyhow::bail!("negative") } else { Ok(*x) });

    assert_completed(&p.process_outcome(1), &1);
    assert_dropped(&p.process_outcome(0));
    let failure = p.process_outcome(-1);
    let failure = assert_abandoned(&failure);
    assert_eq!(failure.stage, "try_map");
    assert_eq!(failure.error, "negative");
    assert!(!failure.parallel);
}

// Exception policy

#[test]
fn test_always_failing_stage_runs_at_most_twice() {
    let failing = FailingPipe::new("always");
    let p = int_pipeline("retry")
        .connect(failing.clone())
        .with_exception_policy(RetryOncePolicy::new());

    assert_eq!(p.process(1), None);
    assert_eq!(failing.calls(), 2);
}

#[test]
fn test_second_approval_is_ignored() {
    let policy = Arc::new(RecordingPolicy::retrying());
    let failing = FailingPipe::new("always");
    let p = int_pipeline("retry")
        .connect(failing.clone())
        .with_shared_policy(policy.clone());

    let outcome = p.process_outcome(1);
    assert_eq!(assert_abandoned(&outcome).attempts, 2);
    assert_eq!(failing.calls(), 2);

    let attempts: Vec<u32> = policy.failures().iter().map(|f| f.attempts).collect();
    assert_eq!(attempts, vec![1, 2]);
}

#[test]
fn test_default_policy_never_retries() {
    let failing = FailingPipe::new("once");
    let p = int_pipeline("default").connect(failing.clone());

    assert_eq!(p.process(1), None);
    assert_eq!(failing.calls(), 1);
}

#[test]
fn test_policy_can_be_replaced() {
    let failing = FailingPipe::new("boom");
    let mut p = int_pipeline("replace").connect(failing.clone());
    p.set_exception_policy(RetryOncePolicy::new());

    assert_eq!(p.process(1), None);
    assert_eq!(failing.calls(), 2);
}

#[test]
fn test_panicking_stage_is_abandoned() {
    let spy = RecordingPipe::new();
    let p = int_pipeline("panic")
        .map(|x: &i32| -> i32 { if *x == 13 { panic!("unlucky") } else { *x } })
        .connect(spy.clone());

    let outcome = p.process_outcome(13);
    assert!(assert_abandoned(&outcome).error.contains("unlucky"));
    assert_eq!(spy.calls(), 0);
    assert_eq!(p.process(12), Some(12));
}

// Fork and switch, sequential

#[test]
fn test_fork_runs_each_child_once_inline() {
    let (spy_a, spy_b) = (RecordingPipe::new(), RecordingPipe::new());
    let a = int_pipeline("a").connect(spy_a.clone());
    let b = int_pipeline("b").connect(spy_b.clone());
    let root = int_pipeline("root").map(|x| x + 1).fork([&a, &b]);

    assert_eq!(root.process(1), None);
    assert_eq!(spy_a.inputs(), vec![2]);
    assert_eq!(spy_b.inputs(), vec![2]);
}

#[test]
fn test_fork_child_failure_is_isolated() {
    let spy = RecordingPipe::new();
    let failing = int_pipeline("failing").connect(FailingPipe::new("child"));
    let healthy = int_pipeline("healthy").connect(spy.clone());
    let root = int_pipeline("root").fork([&failing, &healthy]);

    assert_dropped(&root.process_outcome(4));
    assert_eq!(spy.inputs(), vec![4]);
}

#[test]
fn test_switch_routes_copy_and_continues() {
    let spy = RecordingPipe::new();
    let alternate = int_pipeline("big").connect(spy.clone());
    let main = int_pipeline("main").switch_if(|x| *x > 100, &alternate).map(|x| x + 1);

    assert_eq!(main.process(5), Some(6));
    assert_eq!(spy.calls(), 0);

    assert_eq!(main.process(500), Some(501));
    assert_eq!(spy.inputs(), vec![500]);
}

#[test]
fn test_branch_uses_its_own_policy() {
    let child_policy = Arc::new(RecordingPolicy::new());
    let root_policy = Arc::new(RecordingPolicy::new());
    let child = int_pipeline("child")
        .connect(FailingPipe::new("child failure"))
        .with_shared_policy(child_policy.clone());
    let root = int_pipeline("root")
        .with_shared_policy(root_policy.clone())
        .switch_if(|_| true, &child);

    assert_eq!(root.process(1), Some(1));
    assert_eq!(child_policy.len(), 1);
    assert!(root_policy.is_empty());
}

// Parallel traversal

#[test]
fn test_parallel_run_resolves_root_handle() {
    let p = int_pipeline("parallel").filter(|x| *x > 0).map(|x| x * 2);

    let completed = p.process_parallel(21).unwrap();
    assert_eq!(completed.wait_timeout(WAIT).unwrap(), Outcome::Completed(42));
    assert_eq!(completed.handle().pipeline_id(), p.id());

    let dropped = p.process_parallel(-1).unwrap();
    assert_eq!(dropped.wait_timeout(WAIT).unwrap(), Outcome::Dropped);
}

#[test]
fn test_parallel_fork_fan_out() {
    let (spy_a, spy_b) = (RecordingPipe::new(), RecordingPipe::new());
    let a = int_pipeline("a").connect(spy_a.clone()).map(|x| x * 10);
    let b = int_pipeline("b").connect(spy_b.clone()).map(|x| x * 100);
    let root = int_pipeline("root").fork([&a, &b]);

    let submission = root.process_parallel(3).unwrap();
    assert_eq!(submission.handles().len(), 3);
    assert!(Pipeline::wait_for_all_timeout(submission.handles(), WAIT));

    assert_eq!(submission.wait(), Outcome::Dropped);
    let handles = submission.handles();
    assert_eq!(handles.handle::<i32>(a.id()).unwrap().wait(), Outcome::Completed(30));
    assert_eq!(handles.handle::<i32>(b.id()).unwrap().wait(), Outcome::Completed(300));
    assert_eq!(spy_a.inputs(), vec![3]);
    assert_eq!(spy_b.inputs(), vec![3]);
}

#[test]
fn test_switch_miss_does_not_hang_wait_for_all() {
    let spy = RecordingPipe::new();
    let alternate = int_pipeline("alternate").connect(spy.clone());
    let main = int_pipeline("main").switch_if(|x| *x > 100, &alternate).map(|x| x + 1);

    let submission = main.process_parallel(1).unwrap();
    assert!(Pipeline::wait_for_all_timeout(submission.handles(), WAIT));

    assert_eq!(submission.wait(), Outcome::Completed(2));
    assert_eq!(kind_of(submission.handles(), alternate.id()), Some(OutcomeKind::Dropped));
    assert_eq!(spy.calls(), 0);
}

#[test]
fn test_switch_hit_runs_alternate_in_parallel() {
    let alternate = int_pipeline("alternate").map(|x| x * 2);
    let main = int_pipeline("main").switch_if(|x| *x > 100, &alternate);

    let submission = main.process_parallel(200).unwrap();
    assert_eq!(submission.wait_for_all(), Outcome::Completed(200));

    let alt = submission.handles().handle::<i32>(alternate.id()).unwrap();
    assert_eq!(alt.get(), Some(Outcome::Completed(400)));
}

#[test]
fn test_drop_before_fork_releases_children() {
    let spy = RecordingPipe::new();
    let grandchild = int_pipeline("grandchild").connect(spy.clone());
    let child = int_pipeline("child").fork([&grandchild]);
    let root = int_pipeline("root").filter(|x| *x > 0).fork([&child]);

    let submission = root.process_parallel(-1).unwrap();
    assert!(Pipeline::wait_for_all_timeout(submission.handles(), WAIT));

    assert_eq!(kind_of(submission.handles(), child.id()), Some(OutcomeKind::Dropped));
    assert_eq!(kind_of(submission.handles(), grandchild.id()), Some(OutcomeKind::Dropped));
    assert_eq!(spy.calls(), 0);
}

#[test]
fn test_failure_before_switch_releases_alternate() {
    let alternate = int_pipeline("alternate");
    let main = int_pipeline("main")
        .connect(FailingPipe::new("upstream"))
        .switch_if(|_| true, &alternate);

    let submission = main.process_parallel(1).unwrap();
    assert!(Pipeline::wait_for_all_timeout(submission.handles(), WAIT));

    let root = submission.wait();
    let failure = assert_abandoned(&root);
    assert!(failure.parallel);
    assert_eq!(failure.stage, "failing");
    assert_eq!(kind_of(submission.handles(), alternate.id()), Some(OutcomeKind::Dropped));
}

#[test]
fn test_retry_bound_holds_in_parallel() {
    let failing = FailingPipe::new("always");
    let p = int_pipeline("retry")
        .connect(failing.clone())
        .with_exception_policy(RetryOncePolicy::new());

    let outcome = p.process_parallel(1).unwrap().wait_timeout(WAIT).unwrap();
    assert_eq!(assert_abandoned(&outcome).attempts, 2);
    assert_eq!(failing.calls(), 2);
}

#[test]
fn test_same_name_children_matched_by_id() {
    let first = int_pipeline("child").map(|x| x + 1);
    let second = int_pipeline("child").map(|x| x + 2);
    let root = int_pipeline("root").fork([&first, &second]);

    let submission = root.process_parallel(10).unwrap();
    assert!(Pipeline::wait_for_all_timeout(submission.handles(), WAIT));

    let handles = submission.handles();
    assert_eq!(handles.by_identifier("child").len(), 2);
    assert_eq!(handles.handle::<i32>(first.id()).unwrap().wait(), Outcome::Completed(11));
    assert_eq!(handles.handle::<i32>(second.id()).unwrap().wait(), Outcome::Completed(12));
}

#[test]
fn test_children_of_other_types() {
    let labels = pipeline_on::<i32>("labels", &test_executor()).map(|x| format!("item-{x}"));
    let root = int_pipeline("root").fork([&labels]);

    let submission = root.process_parallel(5).unwrap();
    assert!(Pipeline::wait_for_all_timeout(submission.handles(), WAIT));

    let label = submission.handles().handle::<String>(labels.id()).unwrap();
    assert_eq!(label.wait(), Outcome::Completed("item-5".to_string()));
}

#[test]
fn test_wait_for_one_returns_first_finisher() {
    let slow = int_pipeline("slow").connect(SlowPipe::with_delay_ms(300));
    let fast = int_pipeline("fast").map(|x| x + 1);

    let slow_run = slow.process_parallel(1).unwrap();
    let fast_run = fast.process_parallel(1).unwrap();

    let mut union = HandleSet::new();
    for handle in slow_run.handles().iter().chain(fast_run.handles().iter()) {
        union.insert(Arc::clone(handle));
    }

    let first = Pipeline::wait_for_one(&union).unwrap();
    assert_eq!(first.pipeline_id(), fast.id());
    Pipeline::wait_for_all(&union);
    assert!(union.is_all_done());
}

#[test]
fn test_collectors_under_parallel_load() {
    let count = Collector::counting();
    let sum = Collector::summing(|x: &i32| i64::from(*x));
    let p = int_pipeline("load").collect(&count).collect(&sum);

    let submissions: Vec<_> = (1..=200).map(|x| p.process_parallel(x).unwrap()).collect();
    for submission in &submissions {
        submission.wait_timeout(WAIT).unwrap();
    }

    assert_eq!(count.result(), 200);
    assert_eq!(sum.result(), 20_100);
}

#[test]
fn test_distinct_under_parallel_load() {
    let p = int_pipeline("dedupe").map(|x| x % 10).distinct();

    let outcomes: Vec<_> = (0..100)
        .map(|x| p.process_parallel(x).unwrap())
        .map(|s| s.wait_timeout(WAIT).unwrap())
        .collect();

    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    assert_eq!(completed, 10);
}

#[test]
fn test_submission_rejected_by_shut_down_executor() {
    let executor = Arc::new(TokioExecutor::with_config(ExecutorConfig::new().with_worker_threads(1)));
    executor.shutdown();
    let shared: Arc<dyn ExecutionService> = executor;
    let p = pipeline_on::<i32>("closed", &shared);

    assert!(p.process_parallel(1).is_err());
}

#[test]
fn test_unsubmittable_child_is_released() {
    let closed = Arc::new(TokioExecutor::with_config(ExecutorConfig::new().with_worker_threads(1)));
    closed.shutdown();
    let closed: Arc<dyn ExecutionService> = closed;

    let child = pipeline_on::<i32>("child", &closed).map(|x| x + 1);
    let root = int_pipeline("root").fork([&child]);

    let submission = root.process_parallel(1).unwrap();
    assert!(Pipeline::wait_for_all_timeout(submission.handles(), WAIT));
    assert_eq!(kind_of(submission.handles(), child.id()), Some(OutcomeKind::Dropped));
}

#[test]
fn test_runner_uses_runtime_handle_executor() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .build()
        .unwrap();
    let executor: Arc<dyn ExecutionService> = Arc::new(runtime.handle().clone());
    let p = pipeline_on::<i32>("handle", &executor).map(|x| x - 1);

    let outcome = p.process_parallel(1).unwrap().wait_timeout(WAIT).unwrap();
    assert_eq!(outcome, Outcome::Completed(0));
}

#[test]
fn test_stage_may_wait_on_nested_parallel_run() {
    let executor: Arc<dyn ExecutionService> =
        Arc::new(TokioExecutor::with_config(ExecutorConfig::new().with_worker_threads(1)));
    let inner = pipeline_on::<i32>("inner", &executor).map(|x| x * 10);
    let outer = pipeline_on::<i32>("outer", &executor).try_map(move |x| {
        let run = inner.process_parallel(*x)?;
        Pipeline::wait_for_one(run.handles());
        Ok(run.wait_timeout(WAIT)?.into_value().unwrap_or_default())
    });

    assert_eq!(outer.process(2), Some(20));
    let outcome = outer.process_parallel(3).unwrap().wait_timeout(WAIT).unwrap();
    assert_eq!(outcome, Outcome::Completed(30));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_waits_on_submission() {
    let spy = RecordingPipe::new();
    let child = int_pipeline("child").connect(spy.clone());
    let root = int_pipeline("root").switch_if(|_| true, &child).map(|x| x * 2);

    let submission = root.process_parallel(4).unwrap();
    assert_eq!(submission.all_completed().await, Outcome::Completed(8));
    assert_eq!(spy.inputs(), vec![4]);

    let first = submission.handles().first_completed().await.unwrap();
    assert!(first.is_done());
}

#[test]
fn test_closure_policy() {
    fn retry_first(failure: &crate::policy::PipeFailure<'_>) -> bool {
        failure.attempt == 1
    }

    let failing = FailingPipe::new("boom");
    let p = int_pipeline("closure")
        .connect(failing.clone())
        .with_exception_policy(retry_first);

    assert!(p.exception_policy().on_failure(&crate::policy::PipeFailure {
        stage: "s",
        pipeline: "p",
        pipeline_id: p.id(),
        parallel: false,
        input: &1,
        error: &anyhow::anyhow!("x"),
        attempt: 1,
    }));
    assert_eq!(p.process(1), None);
    assert_eq!(failing.calls(), 2);
}
