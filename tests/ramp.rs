use httpmock::MockServer;
use serial_test::serial;

mod common;

use gander::prelude::*;
use gander::ramp::RampAction;

#[test]
#[serial]
/// Each stage is recorded once, followed by draining and a final entry.
fn ramp_history() {
    let server = MockServer::start();
    let _mocks = common::setup_user_api(&server, common::HEALTHY);

    let configuration = common::build_configuration(&server, vec!["--ramp", "2,1s;4,1s;0,1s"]);
    let metrics = common::run_load_test(configuration);

    let actions: Vec<RampAction> = metrics.history.iter().map(|step| step.action).collect();
    assert_eq!(
        actions,
        vec![
            RampAction::Increasing,
            RampAction::Increasing,
            RampAction::Decreasing,
            RampAction::Draining,
            RampAction::Finished,
        ]
    );
    let users: Vec<usize> = metrics.history.iter().map(|step| step.users).collect();
    assert_eq!(users, vec![2, 4, 0, 0, 0]);
    assert_eq!(metrics.users, 4);
    assert!(metrics.duration >= 2);

    // History timestamps never go backwards.
    for pair in metrics.history.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[test]
#[serial]
/// A linear ramp never exceeds the stage target.
fn linear_ramp() {
    let server = MockServer::start();
    let _mocks = common::setup_user_api(&server, common::HEALTHY);

    let configuration = common::build_configuration(
        &server,
        vec!["--ramp", "4,2s", "--ramp-policy", "linear"],
    );
    let metrics = common::run_load_test(configuration);

    assert!(metrics.users >= 1);
    assert!(metrics.users <= 4);
    assert_eq!(metrics.history[0].action, RampAction::Increasing);
    assert!(metrics.iterations > 0);
    assert!(metrics.check().is_ok());
}

#[test]
#[serial]
/// The iteration budget ends the load test before the ramp does.
fn iteration_budget() {
    let server = MockServer::start();
    let mocks = common::setup_user_api(&server, common::HEALTHY);

    let configuration = common::build_configuration(
        &server,
        vec![
            "--ramp",
            "5,30s",
            "--pacing",
            "0",
            "--iterations",
            "20",
            "--weights",
            "1,0,0,0",
        ],
    );
    let metrics = common::run_load_test(configuration);

    assert_eq!(metrics.iterations, 20);
    assert_eq!(mocks[common::READ_KEY].hits(), 20);
    assert_eq!(metrics.count(classify(Action::Read, Some(200))), 20);
    assert!(metrics.duration < 30);
    assert_eq!(
        metrics.history.last().map(|step| step.action),
        Some(RampAction::Finished)
    );
}
