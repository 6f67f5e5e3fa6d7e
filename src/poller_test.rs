// Unit tests for the condition poller

use super::*;
use std::cell::Cell;

fn condition(timeout_ms: u64, interval_ms: u64) -> Condition {
    Condition::new("test condition")
        .with_timeout(Duration::from_millis(timeout_ms))
        .with_interval(Duration::from_millis(interval_ms))
}

#[tokio::test]
async fn test_satisfied_after_condition_becomes_true() {
    let started = Instant::now();
    let ready_at = Duration::from_millis(150);

    let outcome = wait_until(&condition(2000, 20), || async move {
        if started.elapsed() >= ready_at {
            Ok::<_, HarnessError>(Probe::Ready("cards"))
        } else {
            Ok(Probe::NotYet("0 cards".to_string()))
        }
    })
    .await;

    match outcome {
        WaitOutcome::Satisfied {
            value,
            elapsed,
            attempts,
        } => {
            assert_eq!(value, "cards");
            assert!(elapsed >= ready_at, "elapsed {:?} before ready", elapsed);
            assert!(elapsed < Duration::from_millis(2000));
            assert!(attempts > 1);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_times_out_when_never_true() {
    let outcome = wait_until(&condition(200, 20), || async {
        Ok::<Probe<()>, HarnessError>(Probe::NotYet("0 element(s) matched".to_string()))
    })
    .await;

    let WaitOutcome::TimedOut(report) = outcome else {
        panic!("expected timeout");
    };
    assert!(report.elapsed >= Duration::from_millis(200));
    assert_eq!(report.timeout, Duration::from_millis(200));
    assert_eq!(report.last_observation.as_deref(), Some("0 element(s) matched"));
    assert!(report.attempts >= 2);
}

#[tokio::test]
async fn test_predicate_runs_at_least_once_with_zero_timeout() {
    let calls = Cell::new(0);
    let outcome = wait_until(&condition(0, 10), || {
        calls.set(calls.get() + 1);
        async { Ok::<_, HarnessError>(Probe::Ready(42)) }
    })
    .await;

    assert_eq!(calls.get(), 1);
    assert_eq!(outcome.into_result().unwrap(), 42);

    let calls = Cell::new(0);
    let outcome = wait_until(&condition(0, 10), || {
        calls.set(calls.get() + 1);
        async { Ok::<Probe<()>, HarnessError>(Probe::NotYet("never".into())) }
    })
    .await;
    assert_eq!(calls.get(), 1);
    assert!(!outcome.is_satisfied());
}

#[tokio::test]
async fn test_predicate_errors_count_as_not_ready() {
    let calls = Cell::new(0);
    let outcome = wait_until(&condition(1000, 10), || {
        calls.set(calls.get() + 1);
        let n = calls.get();
        async move {
            if n < 3 {
                Err(HarnessError::StaleElement("element is not attached".to_string()))
            } else {
                Ok(Probe::Ready(n))
            }
        }
    })
    .await;

    assert_eq!(outcome.into_result().unwrap(), 3);
}

#[tokio::test]
async fn test_error_is_reported_as_last_observation() {
    let outcome = wait_until(&condition(50, 10), || async {
        Err::<Probe<()>, _>(HarnessError::Driver("no such window".to_string()))
    })
    .await;

    let WaitOutcome::TimedOut(report) = outcome else {
        panic!("expected timeout");
    };
    assert_eq!(report.last_observation.as_deref(), Some("error: WebDriver command failed: no such window"));
}

#[tokio::test]
async fn test_polls_on_fixed_cadence() {
    let calls = Cell::new(0u32);
    let outcome = wait_until(&condition(300, 50), || {
        calls.set(calls.get() + 1);
        async { Ok::<Probe<()>, HarnessError>(Probe::NotYet("pending".into())) }
    })
    .await;

    assert!(!outcome.is_satisfied());
    // One evaluation per 50ms tick plus the first, never a busy loop
    assert!(calls.get() >= 2 && calls.get() <= 8, "calls = {}", calls.get());
}

#[tokio::test]
async fn test_zero_interval_does_not_spin() {
    let calls = Cell::new(0u32);
    wait_until(&condition(100, 0), || {
        calls.set(calls.get() + 1);
        async { Ok::<Probe<()>, HarnessError>(Probe::NotYet("pending".into())) }
    })
    .await;

    assert!(calls.get() <= 12, "calls = {}", calls.get());
}

#[tokio::test]
async fn test_timeout_converts_to_harness_error() {
    let outcome = wait_until(&condition(30, 10), || async {
        Ok::<Probe<()>, HarnessError>(Probe::NotYet("3 element(s) matched, need 5".into()))
    })
    .await;

    match outcome.into_result() {
        Err(HarnessError::TimedOut {
            description,
            timeout_ms,
            last_observation,
            ..
        }) => {
            assert_eq!(description, "test condition");
            assert_eq!(timeout_ms, 30);
            assert_eq!(last_observation, "3 element(s) matched, need 5");
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_stable_wait_waits_for_repeat_sample() {
    let samples = [1usize, 3, 5, 5, 5];
    let index = Cell::new(0);
    let outcome = wait_until_stable(
        &condition(2000, 10),
        || {
            let value = samples[index.get().min(samples.len() - 1)];
            index.set(index.get() + 1);
            async move { Ok::<_, HarnessError>(value) }
        },
        |count| *count >= 1,
    )
    .await;

    match outcome {
        WaitOutcome::Satisfied { value, attempts, .. } => {
            assert_eq!(value, 5);
            assert_eq!(attempts, 4);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_stable_wait_rejects_unaccepted_values() {
    let outcome = wait_until_stable(
        &condition(100, 10),
        || async { Ok::<usize, HarnessError>(0) },
        |count| *count >= 1,
    )
    .await;

    let WaitOutcome::TimedOut(report) = outcome else {
        panic!("expected timeout");
    };
    assert_eq!(report.last_observation.as_deref(), Some("sampled 0"));
}

#[tokio::test]
async fn test_stable_wait_restarts_after_error() {
    let index = Cell::new(0);
    let outcome = wait_until_stable(
        &condition(1000, 10),
        || {
            let n = index.get();
            index.set(n + 1);
            async move {
                match n {
                    0 => Ok(2usize),
                    1 => Err(HarnessError::StaleElement("element is not attached".to_string())),
                    _ => Ok(2),
                }
            }
        },
        |_| true,
    )
    .await;

    match outcome {
        // 2, error, 2, 2: the error resets the previous sample
        WaitOutcome::Satisfied { attempts, .. } => assert_eq!(attempts, 4),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_permanent_error_stops_the_wait() {
    let calls = Cell::new(0);
    let outcome = wait_until(&condition(1000, 10), || {
        calls.set(calls.get() + 1);
        async {
            Err::<Probe<()>, _>(HarnessError::InvalidSelector {
                input: "ul > li".to_string(),
                reason: "unsupported combinator".to_string(),
            })
        }
    })
    .await;

    assert_eq!(calls.get(), 1);
    match outcome {
        WaitOutcome::Failed {
            error, attempts, ..
        } => {
            assert_eq!(attempts, 1);
            assert!(matches!(error, HarnessError::InvalidSelector { .. }));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_waiting_on_released_session_fails_on_first_attempt() {
    use crate::config::SessionConfig;
    use crate::driver::MemoryConnector;
    use crate::locator::{Scope, Selector};
    use crate::session::Session;

    let connector = MemoryConnector::new();
    let mut session = Session::acquire(&connector, SessionConfig::default())
        .await
        .unwrap();
    session.release().await.unwrap();

    let session = &session;
    let card = &Selector::class("card");
    let started = Instant::now();
    let outcome = wait_until(&condition(500, 50), || async move {
        let count = session.find_all(Scope::Document, card).await?.len();
        Ok::<_, HarnessError>(Probe::Ready(count))
    })
    .await;

    assert!(started.elapsed() < Duration::from_millis(100));
    let WaitOutcome::Failed { attempts, .. } = &outcome else {
        panic!("expected an immediate failure, got {:?}", outcome);
    };
    assert_eq!(*attempts, 1);
    assert!(matches!(
        outcome.into_result(),
        Err(HarnessError::Lifecycle { .. })
    ));
}

#[tokio::test]
async fn test_stable_wait_stops_on_permanent_error() {
    let outcome = wait_until_stable(
        &condition(1000, 10),
        || async {
            Err::<usize, _>(HarnessError::Lifecycle {
                session_id: "abc".to_string(),
                operation: "query elements",
            })
        },
        |_| true,
    )
    .await;

    assert!(matches!(
        outcome,
        WaitOutcome::Failed { attempts: 1, .. }
    ));
}
