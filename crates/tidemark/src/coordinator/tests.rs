use super::take_slot;
use crate::{
    Coordinator, CoordinatorConfig, Error, ExitReason, GeneratorError, LabelEvery, Phase,
    RunSummary, Stamped, generator_fn,
};
use core::convert::Infallible;
use std::{sync::mpsc, thread, time::Duration};

const FIZZBUZZ_0_TO_15: [&str; 16] = [
    "0", "1", "2", "Fizz", "4", "Buzz", "Fizz", "7", "8", "Fizz", "Buzz", "11", "Fizz", "13",
    "14", "FizzBuzz",
];

fn fizzbuzz(step: u64, slots: &[Option<String>]) -> String {
    let words: String = slots.iter().flatten().map(String::as_str).collect();
    if words.is_empty() {
        step.to_string()
    } else {
        words
    }
}

fn run_collect(coordinator: &mut Coordinator<String>) -> (Vec<String>, RunSummary) {
    let mut lines = Vec::new();
    let summary = coordinator
        .run(fizzbuzz, |_, line| {
            lines.push(line);
            Ok::<_, Infallible>(())
        })
        .unwrap();
    (lines, summary)
}

fn fizz_buzz_coordinator(low: usize, high: usize, step_bound: u64) -> Coordinator<String> {
    let mut coordinator = Coordinator::new(CoordinatorConfig::new(low, high, step_bound).unwrap());
    coordinator
        .add_producer(LabelEvery::new(3, "Fizz").unwrap())
        .unwrap();
    coordinator
        .add_producer(LabelEvery::new(5, "Buzz").unwrap())
        .unwrap();
    coordinator
}

fn expected_fizzbuzz(step_bound: u64) -> Vec<String> {
    (0..=step_bound)
        .map(|n| match (n > 0 && n % 3 == 0, n > 0 && n % 5 == 0) {
            (true, true) => "FizzBuzz".to_string(),
            (true, false) => "Fizz".to_string(),
            (false, true) => "Buzz".to_string(),
            (false, false) => n.to_string(),
        })
        .collect()
}

#[test]
fn fizz_buzz_through_fifteen() {
    let mut coordinator = fizz_buzz_coordinator(3, 10, 15);
    let (lines, summary) = run_collect(&mut coordinator);

    assert_eq!(lines, FIZZBUZZ_0_TO_15);
    assert_eq!(summary.steps, 16);
    assert!(!summary.stopped_early);
    assert_eq!(summary.producers.len(), 2);
    assert!(summary.producers.iter().all(|exit| exit.is_completed()));
    assert!(
        summary
            .producers
            .iter()
            .all(|exit| exit.steps_pushed == 16)
    );
    assert_eq!(coordinator.phase(), Phase::Terminated);
}

#[test]
fn single_producer_matching_every_step() {
    let mut coordinator =
        Coordinator::new(CoordinatorConfig::new(3, 10, 5).unwrap());
    coordinator
        .add_producer(LabelEvery::new(1, "X").unwrap().matching_zero())
        .unwrap();

    let (lines, summary) = run_collect(&mut coordinator);
    assert_eq!(lines, ["X"; 6]);
    assert_eq!(summary.steps, 6);
}

#[test]
fn zero_low_watermark_runs_to_completion() {
    let mut coordinator = fizz_buzz_coordinator(0, 1, 100);
    let (lines, _) = run_collect(&mut coordinator);
    assert_eq!(lines, expected_fizzbuzz(100));

    for stats in coordinator.lane_stats() {
        assert!(stats.peak_len <= 1);
        assert_eq!(stats.pushed, 101);
        assert_eq!(stats.popped, 101);
    }
}

#[test]
fn lanes_stay_within_watermarks() {
    let mut coordinator = fizz_buzz_coordinator(3, 10, 2_000);
    let (lines, _) = run_collect(&mut coordinator);
    assert_eq!(lines.len(), 2_001);

    for stats in coordinator.lane_stats() {
        assert!(stats.peak_len <= 10, "peak {} above high", stats.peak_len);
        if let Some(trough) = stats.trough_len {
            assert!(trough >= 3, "trough {trough} below low");
        }
    }
}

#[test]
fn identical_runs_produce_identical_records() {
    let (first, _) = run_collect(&mut fizz_buzz_coordinator(2, 5, 500));
    let (second, _) = run_collect(&mut fizz_buzz_coordinator(2, 5, 500));
    assert_eq!(first, second);
    assert_eq!(first, expected_fizzbuzz(500));
}

#[test]
fn invalid_watermarks_fail_before_construction() {
    assert!(matches!(
        CoordinatorConfig::new(10, 3, 15),
        Err(Error::InvalidWatermarks { low: 10, high: 3 })
    ));
    assert!(matches!(
        CoordinatorConfig::new(4, 4, 15),
        Err(Error::InvalidWatermarks { .. })
    ));
}

#[test]
fn start_without_producers_is_rejected() {
    let mut coordinator: Coordinator<String> =
        Coordinator::new(CoordinatorConfig::new(3, 10, 15).unwrap());
    assert!(matches!(coordinator.start(), Err(Error::NoProducers)));
    assert_eq!(coordinator.phase(), Phase::Configured);

    let result = coordinator.run(fizzbuzz, |_, _| Ok::<_, Infallible>(()));
    assert!(matches!(result, Err(Error::NoProducers)));
}

#[test]
fn generator_failure_yields_sentinel_for_that_lane_only() {
    let mut coordinator = Coordinator::new(CoordinatorConfig::new(3, 10, 15).unwrap());
    coordinator
        .add_producer(LabelEvery::new(3, "Fizz").unwrap())
        .unwrap();
    coordinator
        .add_producer(generator_fn(|_, step| {
            if step == 5 {
                Err(GeneratorError::new("buzz broke"))
            } else if step > 0 && step % 5 == 0 {
                Ok("Buzz".to_string())
            } else {
                Ok(String::new())
            }
        }))
        .unwrap();

    let mut records = Vec::new();
    let summary = coordinator
        .run(
            |step, slots: &[Option<String>]| (step, slots.to_vec()),
            |_, record| {
                records.push(record);
                Ok::<_, Infallible>(())
            },
        )
        .unwrap();

    assert_eq!(records.len(), 16);
    for (step, slots) in &records {
        assert!(slots[0].is_some(), "fizz lane missing at step {step}");
        assert_eq!(slots[1].is_some(), *step < 5, "buzz lane at step {step}");
    }
    assert_eq!(records[3].1[0].as_deref(), Some("Fizz"));

    assert!(summary.producers[0].is_completed());
    match &summary.producers[1].reason {
        ExitReason::GeneratorFailed { step, error } => {
            assert_eq!(*step, 5);
            assert_eq!(error.reason(), "buzz broke");
        }
        other => panic!("unexpected exit {other:?}"),
    }
}

#[test]
fn sink_error_tears_down_and_reports_step() {
    let mut coordinator = fizz_buzz_coordinator(3, 10, 10_000);
    let result = coordinator.run(fizzbuzz, |step, _| {
        if step == 3 {
            Err("disk full")
        } else {
            Ok(())
        }
    });

    match result {
        Err(Error::Sink { step, source }) => {
            assert_eq!(step, 3);
            assert_eq!(source.to_string(), "disk full");
        }
        other => panic!("expected sink error, got {other:?}"),
    }
    assert_eq!(coordinator.phase(), Phase::Terminated);
    assert_eq!(coordinator.steps_completed(), 3);
}

#[test]
fn stop_handle_ends_run_after_current_step() {
    let mut coordinator = fizz_buzz_coordinator(3, 10, 10_000);
    let stop = coordinator.stop_handle();

    let mut lines = Vec::new();
    let summary = coordinator
        .run(fizzbuzz, |step, line| {
            lines.push(line);
            if step == 4 {
                stop.request_stop();
            }
            Ok::<_, Infallible>(())
        })
        .unwrap();

    assert!(summary.stopped_early);
    assert_eq!(summary.steps, 5);
    assert_eq!(lines, &FIZZBUZZ_0_TO_15[..5]);
    assert!(
        summary
            .producers
            .iter()
            .all(|exit| matches!(exit.reason, ExitReason::Stopped))
    );
}

#[test]
fn reset_allows_a_new_round_with_new_producers() {
    let mut coordinator = fizz_buzz_coordinator(3, 10, 15);
    let (first, _) = run_collect(&mut coordinator);
    assert_eq!(first, FIZZBUZZ_0_TO_15);

    assert!(matches!(
        coordinator.add_producer(LabelEvery::new(7, "Baz").unwrap()),
        Err(Error::InvalidState {
            expected: Phase::Configured,
            actual: Phase::Terminated
        })
    ));
    assert!(matches!(
        coordinator.run(fizzbuzz, |_, _| Ok::<_, Infallible>(())),
        Err(Error::InvalidState { .. })
    ));

    coordinator.reset().unwrap();
    assert_eq!(coordinator.phase(), Phase::Configured);
    assert_eq!(coordinator.producer_count(), 0);

    coordinator
        .add_producer(LabelEvery::new(7, "Baz").unwrap())
        .unwrap();
    let (second, summary) = run_collect(&mut coordinator);
    let expected: Vec<String> = (0..=15u64)
        .map(|n| {
            if n > 0 && n % 7 == 0 {
                "Baz".to_string()
            } else {
                n.to_string()
            }
        })
        .collect();
    assert_eq!(second, expected);
    assert_eq!(summary.producers.len(), 1);
}

#[test]
fn reset_is_refused_while_running() {
    let mut coordinator = fizz_buzz_coordinator(3, 10, 1_000);
    coordinator.start().unwrap();
    assert!(matches!(
        coordinator.reset(),
        Err(Error::InvalidState {
            actual: Phase::Running,
            ..
        })
    ));

    let exits = coordinator.shutdown();
    assert_eq!(exits.len(), 2);
    assert!(coordinator.shutdown().is_empty());
    coordinator.reset().unwrap();
}

#[test]
fn dropping_a_running_coordinator_joins_producers() {
    let (tx, rx) = mpsc::channel();
    let dropper = thread::spawn(move || {
        let mut coordinator = fizz_buzz_coordinator(3, 10, u64::MAX - 1);
        coordinator.start().unwrap();
        drop(coordinator);
        tx.send(()).unwrap();
    });

    rx.recv_timeout(Duration::from_secs(5))
        .expect("drop did not release producers");
    dropper.join().unwrap();
}

#[test]
fn mismatched_step_is_rejected() {
    assert_eq!(
        take_slot(0, 7, Some(Stamped { step: 7, item: 'a' })).unwrap(),
        Some('a')
    );
    assert_eq!(take_slot::<char>(0, 7, None).unwrap(), None);
    assert!(matches!(
        take_slot(2, 7, Some(Stamped { step: 6, item: 'a' })),
        Err(Error::StepMismatch {
            producer: 2,
            expected: 7,
            found: 6
        })
    ));
}
