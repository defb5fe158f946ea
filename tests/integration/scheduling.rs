//! Scheduling correctness tests.
//!
//! These tests verify which tasks the orchestrator produces, in what order,
//! and that repeated or stray results never corrupt an expression.

use std::collections::HashSet;

use abacus::core::{parse, ExpressionId, ExpressionStatus, Operator, TaskId};
use abacus::Error;

use crate::fixtures::{
    drain, evaluate, evaluate_expression, instant_orchestrator, poll_all,
};

/// Test: Scenario "2+2*2"
/// Given an expression whose right operand is a product
/// When tasks are completed one by one
/// Then the product is dispatched first and the sum follows with its result
#[test]
fn test_precedence_dispatch_order() {
    let orch = instant_orchestrator();
    let id = orch.submit("2+2*2").unwrap();

    let first = orch.poll_task().unwrap();
    assert_eq!((first.operator, first.arg1, first.arg2), (Operator::Mul, 2.0, 2.0));
    assert!(matches!(orch.poll_task(), Err(Error::NoTaskAvailable)));

    let status = orch.complete_task(first.id, 4.0).unwrap();
    assert_eq!(status, ExpressionStatus::InProgress);

    let second = orch.poll_task().unwrap();
    assert_eq!((second.operator, second.arg1, second.arg2), (Operator::Add, 2.0, 4.0));
    assert!(matches!(orch.poll_task(), Err(Error::NoTaskAvailable)));

    let status = orch.complete_task(second.id, 6.0).unwrap();
    assert_eq!(status, ExpressionStatus::Completed);

    let view = orch.get_expression(id).unwrap();
    assert_eq!(view.status, ExpressionStatus::Completed);
    assert_eq!(view.result, Some(6.0));
}

/// Test: Scenario "(2+2)*2"
/// Given a parenthesized sum on the left of a product
/// When tasks are completed one by one
/// Then the sum is dispatched first and the product consumes its result
#[test]
fn test_parentheses_dispatch_order() {
    let orch = instant_orchestrator();
    let id = orch.submit("(2+2)*2").unwrap();

    let first = orch.poll_task().unwrap();
    assert_eq!((first.operator, first.arg1, first.arg2), (Operator::Add, 2.0, 2.0));
    orch.complete_task(first.id, 4.0).unwrap();

    let second = orch.poll_task().unwrap();
    assert_eq!((second.operator, second.arg1, second.arg2), (Operator::Mul, 4.0, 2.0));
    orch.complete_task(second.id, 8.0).unwrap();

    let view = orch.get_expression(id).unwrap();
    assert_eq!(view.status, ExpressionStatus::Completed);
    assert_eq!(view.result, Some(8.0));
}

/// Test: Scenario "2+("
/// Given malformed input
/// When it is submitted
/// Then it is rejected and never listed
#[test]
fn test_invalid_expression_not_recorded() {
    let orch = instant_orchestrator();
    let err = orch.submit("2+(").unwrap_err();
    assert!(matches!(err, Error::InvalidExpression(_)));

    assert!(orch.list_expressions().unwrap().is_empty());
    assert!(matches!(orch.poll_task(), Err(Error::NoTaskAvailable)));

    // The rejected submission does not consume an id
    let id = orch.submit("1+1").unwrap();
    assert_eq!(id, ExpressionId(1));
}

/// Test: Scenario "1+1" then "3+3"
/// Given two expressions submitted back to back
/// When tasks are polled
/// Then they come out in submission order
#[test]
fn test_fifo_across_expressions() {
    let orch = instant_orchestrator();
    let first = orch.submit("1+1").unwrap();
    let second = orch.submit("3+3").unwrap();

    let a = orch.poll_task().unwrap();
    let b = orch.poll_task().unwrap();
    assert_eq!(a.expression_id, first);
    assert_eq!((a.arg1, a.arg2), (1.0, 1.0));
    assert_eq!(b.expression_id, second);
    assert_eq!((b.arg1, b.arg2), (3.0, 3.0));
}

/// Test: One task per operation
/// Given expressions of varying shape
/// When they are evaluated to completion
/// Then exactly one task was generated per operator node
#[test]
fn test_one_task_per_operation() {
    for text in [
        "1+2",
        "1+2+3+4+5",
        "(1+2)*(3+4)",
        "((1+2)*(3-4))/(5+6*7)",
        "2*3+4*5-6/3",
    ] {
        let orch = instant_orchestrator();
        orch.submit(text).unwrap();
        let tasks = drain(&orch);

        let expected = parse(text).unwrap().operation_count();
        assert_eq!(tasks.len(), expected, "task count for {}", text);

        let unique: HashSet<TaskId> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(unique.len(), expected, "duplicate task ids for {}", text);
    }
}

/// Test: Completion order does not matter
/// Given several tasks ready at once
/// When they are completed in reverse dispatch order
/// Then the task count and final result are unchanged
#[test]
fn test_reverse_completion_order() {
    let text = "(1+2)*(3+4)-(5+6)*(7-8)";
    let orch = instant_orchestrator();
    let id = orch.submit(text).unwrap();

    let mut generated = 0;
    loop {
        let ready = poll_all(&orch);
        if ready.is_empty() {
            break;
        }
        generated += ready.len();
        for task in ready.iter().rev() {
            orch.complete_task(task.id, evaluate(task)).unwrap();
        }
    }

    assert_eq!(generated, parse(text).unwrap().operation_count());
    let view = orch.get_expression(id).unwrap();
    assert_eq!(view.result, Some(21.0 + 11.0));
}

/// Test: Ready tasks across subtrees
/// Given independent subexpressions
/// When the expression is submitted
/// Then every independent leaf-pair operation is queued at once
#[test]
fn test_independent_subtrees_ready_together() {
    let orch = instant_orchestrator();
    orch.submit("(1+2)*(3+4)").unwrap();

    let ready = poll_all(&orch);
    let pairs: Vec<(f64, f64)> = ready.iter().map(|t| (t.arg1, t.arg2)).collect();
    assert_eq!(pairs, vec![(1.0, 2.0), (3.0, 4.0)]);
}

/// Test: Discovery is idempotent
/// Given tasks already queued or in flight
/// When nothing is completed
/// Then polling never yields a second task for the same node
#[test]
fn test_no_duplicate_tasks_without_completion() {
    let orch = instant_orchestrator();
    orch.submit("(1+2)*(3+4)").unwrap();

    let first = orch.poll_task().unwrap();
    let stats = orch.stats().unwrap();
    assert_eq!(stats.queued_tasks, 1);
    assert_eq!(stats.in_flight_tasks, 1);

    let second = orch.poll_task().unwrap();
    assert_ne!(first.node, second.node);
    assert!(matches!(orch.poll_task(), Err(Error::NoTaskAvailable)));
}

/// Test: Stray and repeated results
/// Given a completed task and an id the orchestrator never issued
/// When results are posted for them
/// Then both are rejected and the expression is unaffected
#[test]
fn test_task_not_found_leaves_state_unchanged() {
    let orch = instant_orchestrator();
    let id = orch.submit("(1+2)*3").unwrap();

    let task = orch.poll_task().unwrap();
    orch.complete_task(task.id, 3.0).unwrap();
    let before = orch.get_expression(id).unwrap();
    let stats_before = orch.stats().unwrap();

    let err = orch.complete_task(task.id, 100.0).unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(t) if t == task.id));
    let err = orch.complete_task(TaskId::new(), 100.0).unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));

    assert_eq!(orch.get_expression(id).unwrap(), before);
    assert_eq!(orch.stats().unwrap(), stats_before);

    // The pending product still sees the first result
    let next = orch.poll_task().unwrap();
    assert_eq!((next.arg1, next.arg2), (3.0, 3.0));
}

/// Test: Empty queue
/// Given no expressions
/// When a worker polls
/// Then it gets NoTaskAvailable immediately
#[test]
fn test_poll_empty_queue() {
    let orch = instant_orchestrator();
    let started = std::time::Instant::now();
    assert!(matches!(orch.poll_task(), Err(Error::NoTaskAvailable)));
    assert!(started.elapsed() < std::time::Duration::from_secs(1));
}

/// Test: Bare numbers
/// Given an expression with no operators
/// When it is submitted
/// Then it completes immediately without producing tasks
#[test]
fn test_literal_completes_on_submit() {
    let orch = instant_orchestrator();
    let id = orch.submit("42").unwrap();

    let view = orch.get_expression(id).unwrap();
    assert_eq!(view.status, ExpressionStatus::Completed);
    assert_eq!(view.result, Some(42.0));
    assert!(matches!(orch.poll_task(), Err(Error::NoTaskAvailable)));
}

/// Test: Status lifecycle
/// Given a freshly submitted expression
/// When its first task is polled
/// Then the status moves from pending to in_progress
#[test]
fn test_status_transitions() {
    let orch = instant_orchestrator();
    let id = orch.submit("1+2").unwrap();
    assert_eq!(orch.get_expression(id).unwrap().status, ExpressionStatus::Pending);

    let task = orch.poll_task().unwrap();
    assert_eq!(orch.get_expression(id).unwrap().status, ExpressionStatus::InProgress);

    orch.complete_task(task.id, 3.0).unwrap();
    assert_eq!(orch.get_expression(id).unwrap().status, ExpressionStatus::Completed);
}

/// Test: Arithmetic results
/// Given a range of expressions
/// When evaluated through the orchestrator
/// Then results match ordinary left-associative arithmetic
#[test]
fn test_results_match_arithmetic() {
    let orch = instant_orchestrator();
    let cases = [
        ("8-3-2", 3.0),
        ("16/4/2", 2.0),
        ("2*(3+4)*5", 70.0),
        ("1.5*4", 6.0),
        ("10/4", 2.5),
        ("((((1))))+2", 3.0),
    ];
    for (text, expected) in cases {
        assert_eq!(evaluate_expression(&orch, text), expected, "{}", text);
    }

    let listed = orch.list_expressions().unwrap();
    assert_eq!(listed.len(), cases.len());
    let ids: Vec<u64> = listed.iter().map(|v| v.id.0).collect();
    assert_eq!(ids, (1..=cases.len() as u64).collect::<Vec<_>>());
}

/// Test: Unknown expression id
/// Given no such expression
/// When it is looked up
/// Then ExpressionNotFound is returned
#[test]
fn test_unknown_expression() {
    let orch = instant_orchestrator();
    let err = orch.get_expression(ExpressionId(7)).unwrap_err();
    assert!(matches!(err, Error::ExpressionNotFound(ExpressionId(7))));
}

/// Test: Lease expiry
/// Given a task lease and a task that was never answered
/// When the lease elapses
/// Then the task is requeued and can still be completed once
#[test]
fn test_lease_requeues_abandoned_task() {
    use std::time::{Duration, Instant};

    let orch = instant_orchestrator().with_task_lease(Some(Duration::from_millis(50)));
    let id = orch.submit("2*3").unwrap();

    let abandoned = orch.poll_task().unwrap();
    assert_eq!(orch.reclaim_expired_at(Instant::now()).unwrap(), 0);
    assert!(matches!(orch.poll_task(), Err(Error::NoTaskAvailable)));

    let later = Instant::now() + Duration::from_millis(100);
    assert_eq!(orch.reclaim_expired_at(later).unwrap(), 1);

    let retried = orch.poll_task().unwrap();
    assert_eq!(retried.id, abandoned.id);
    orch.complete_task(retried.id, 6.0).unwrap();
    assert!(matches!(
        orch.complete_task(abandoned.id, 6.0),
        Err(Error::TaskNotFound(_))
    ));
    assert_eq!(orch.get_expression(id).unwrap().result, Some(6.0));
}
