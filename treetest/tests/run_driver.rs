//! End-to-end runs through `Framework::run`: aggregation, reporter events,
//! skip propagation, and the running guard.

use std::cell::Cell;
use std::rc::Rc;

use treetest::test_support::{RecordingReporter, ReporterEvent, TestProject};
use treetest::{EngineError, Framework, SuiteOutcome, TestStatus};

/// Two tests, one failing:
///
/// ```text
/// math
/// ├── adds   (1 + 1 == 2)  -> passed
/// └── fails  (1 + 1 == 3)  -> failed
/// ```
#[test]
fn math_suite_reports_one_pass_one_failure() {
    let project = TestProject::new().expect("project");
    let reporter = RecordingReporter::default();
    let framework = project.framework().with_reporter(reporter.clone());
    framework
        .describe("math", |d| {
            d.test("adds", |t| {
                t.expect(1 + 1).to_equal(2);
            });
            d.test("fails", |t| {
                t.expect(1 + 1).to_equal(3);
            });
        })
        .expect("register");

    let outcome = framework.run().expect("run");
    assert!(!outcome.success());
    assert_eq!(outcome.aggregate.tests_passed, 1);
    assert_eq!(outcome.aggregate.tests_failed, 1);
    assert_eq!(outcome.aggregate.tests_skipped, 0);
    assert_eq!(outcome.aggregate.suites_failed, 1);

    let math = outcome.suite("math").expect("math suite");
    assert_eq!(math.test("adds").expect("adds").status, TestStatus::Passed);
    match &math.test("fails").expect("fails").status {
        TestStatus::Failed {
            message, location, ..
        } => {
            assert_eq!(message, "expected 3, received 2");
            let location = location.as_ref().expect("location");
            assert!(location.file.ends_with("run_driver.rs"), "{location}");
        }
        other => panic!("unexpected status {other:?}"),
    }

    let events = reporter.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], ReporterEvent::RunStart(vec!["math".to_string()]));
    assert_eq!(events[1], ReporterEvent::SuiteStart("math".to_string()));
    match &events[2] {
        ReporterEvent::SuiteResult {
            suite,
            summary,
            tests_so_far,
            tests,
        } => {
            assert_eq!(suite, "math");
            assert_eq!(summary.outcome, SuiteOutcome::Failed);
            assert_eq!(*tests_so_far, 2);
            assert_eq!(tests, &vec!["math > adds", "math > fails"]);
        }
        other => panic!("unexpected event {other:?}"),
    }
    match &events[3] {
        ReporterEvent::RunComplete(aggregate) => {
            assert_eq!(aggregate, &outcome.aggregate);
            assert!(aggregate.snapshots.is_some());
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn later_failures_do_not_replace_the_first() {
    let project = TestProject::new().expect("project");
    let reached_end = Cell::new(false);
    let reached_end = &reached_end;
    let framework = project.framework();
    framework
        .describe("first wins", move |d| {
            d.test("two failures", move |t| {
                t.expect("a").to_equal("b");
                t.expect(10).to_equal(20);
                t.fail("explicit");
                reached_end.set(true);
            });
        })
        .expect("register");

    let outcome = framework.run().expect("run");
    assert!(reached_end.get());
    let suite = outcome.suite("first wins").expect("suite");
    match &suite.tests[0].status {
        TestStatus::Failed { message, .. } => assert_eq!(message, r#"expected "b", received "a""#),
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn skipped_suite_never_invokes_test_bodies() {
    let project = TestProject::new().expect("project");
    let invoked = Cell::new(0);
    let invoked = &invoked;
    let framework = project.framework();
    framework
        .describe_skip("later", move |d| {
            d.test("a", move |_| invoked.set(invoked.get() + 1));
            d.describe("inner", move |d| {
                d.test("b", move |_| invoked.set(invoked.get() + 1));
                d.test("c", move |_| invoked.set(invoked.get() + 1));
            });
        })
        .expect("register");
    framework
        .describe("empty", |_| {})
        .expect("register");

    let outcome = framework.run().expect("run");
    assert_eq!(invoked.get(), 0);
    assert!(outcome.success());
    assert_eq!(outcome.aggregate.tests_skipped, 3);
    assert_eq!(outcome.aggregate.suites_skipped, 1);
    assert_eq!(outcome.aggregate.suites_passed, 1);

    let later = outcome.suite("later").expect("later");
    for test in later.all_tests() {
        assert!(matches!(test.status, TestStatus::Skipped { location: Some(_) }));
    }
}

#[test]
fn test_skip_inside_running_suite() {
    let project = TestProject::new().expect("project");
    let framework = project.framework();
    framework
        .describe("mixed", |d| {
            d.test("runs", |_| {});
            d.test_skip("pending", |_| -> () { panic!("must not run") });
        })
        .expect("register");

    let outcome = framework.run().expect("run");
    assert_eq!(outcome.aggregate.tests_passed, 1);
    assert_eq!(outcome.aggregate.tests_skipped, 1);
    assert_eq!(outcome.aggregate.suites_passed, 1);
}

#[test]
fn returned_errors_and_panics_are_exceptions() {
    let project = TestProject::new().expect("project");
    let framework = project.framework();
    framework
        .describe("errors", |d| {
            d.test("io", |_| -> anyhow::Result<()> {
                anyhow::bail!("disk on fire")
            });
            d.test("parse", |_| {
                let parsed: Option<u8> = "x".parse().ok();
                parsed.expect("numeric input");
            });
        })
        .expect("register");

    let outcome = framework.run().expect("run");
    assert_eq!(outcome.aggregate.tests_failed, 2);
    let suite = outcome.suite("errors").expect("suite");
    match &suite.test("io").expect("io").status {
        TestStatus::Exception { error, .. } => assert_eq!(error, "disk on fire"),
        other => panic!("unexpected status {other:?}"),
    }
    match &suite.test("parse").expect("parse").status {
        TestStatus::Exception {
            error, location, ..
        } => {
            assert_eq!(error, "numeric input");
            assert!(location.as_ref().expect("location").file.ends_with("run_driver.rs"));
        }
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn matcher_extension_is_visible_to_tests() {
    struct Tolerance(f64);

    let project = TestProject::new().expect("project");
    let framework = project.framework();
    framework
        .describe_with("floats", Tolerance(0.01), |d| {
            d.test("close enough", |t| {
                let tolerance = t.extension::<Tolerance>().map_or(0.0, |tol| tol.0);
                t.expect(0.1 + 0.2).to_satisfy("within tolerance of 0.3", |v: &f64| {
                    (v - 0.3).abs() < tolerance
                });
            });
        })
        .expect("register");

    assert!(framework.run().expect("run").success());
}

#[test]
fn mocks_record_calls_made_by_the_test() {
    let project = TestProject::new().expect("project");
    let framework = project.framework();
    framework
        .describe("mocks", |d| {
            d.test("records", |t| {
                let double = t.mock(|n: &u32| n * 2);
                let total: u32 = (1..=3).map(|n| double.call(n)).sum();
                t.expect(total).to_equal(12);
                t.expect(double.call_count()).to_equal(3);
                let args: Vec<u32> = double.calls().into_iter().map(|call| call.args).collect();
                t.expect(args).to_equal(vec![1, 2, 3]);
            });
        })
        .expect("register");

    assert!(framework.run().expect("run").success());
}

#[test]
fn nested_run_and_registration_are_rejected_during_a_run() {
    let project = TestProject::new().expect("project");
    let framework: Rc<Framework<'static>> = Rc::new(project.framework());
    let nested_run = Rc::new(Cell::new(false));
    let nested_register = Rc::new(Cell::new(false));

    {
        let inner = Rc::clone(&framework);
        let nested_run = Rc::clone(&nested_run);
        let nested_register = Rc::clone(&nested_register);
        framework
            .describe("reentrant", move |d| {
                d.test("calls back into the framework", move |_| {
                    assert!(inner.is_running());
                    nested_run.set(matches!(inner.run(), Err(EngineError::AlreadyRunning)));
                    nested_register.set(matches!(
                        inner.describe("late", |_| {}),
                        Err(EngineError::RegisterWhileRunning { .. })
                    ));
                });
            })
            .expect("register");
    }

    let outcome = framework.run().expect("run");
    assert!(outcome.success());
    assert!(nested_run.get());
    assert!(nested_register.get());
    assert!(!framework.is_running());

    framework.describe("after", |_| {}).expect("register after run");
    assert_eq!(framework.suite_names(), vec!["after"]);
}

#[test]
fn aggregate_serializes_to_json() {
    let project = TestProject::new().expect("project");
    let framework = project.framework();
    framework
        .describe("json", |d| {
            d.test("passes", |_| {});
        })
        .expect("register");

    let outcome = framework.run().expect("run");
    let json: serde_json::Value =
        serde_json::from_str(&outcome.aggregate.to_json().expect("json")).expect("parse");
    assert_eq!(json["tests_passed"], 1);
    assert_eq!(json["tests_failed"], 0);
    assert_eq!(json["snapshots"]["total"], 0);
}
