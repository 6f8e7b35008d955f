use httpmock::MockServer;
use serial_test::serial;

mod common;

use gander::prelude::*;

// Count every request recorded for `action`.
fn recorded(metrics: &GanderMetrics, action: Action) -> usize {
    metrics
        .buckets
        .iter()
        .filter(|(bucket, _)| bucket.action == action)
        .map(|(_, count)| count)
        .sum()
}

#[test]
#[serial]
/// Every action against a healthy target lands in an expected bucket.
fn healthy_target() {
    let server = MockServer::start();
    let mocks = common::setup_user_api(&server, common::HEALTHY);

    let configuration = common::build_configuration(&server, vec!["--seed", "7"]);
    let metrics = common::run_load_test(configuration);

    // Both pools were seeded in full.
    assert_eq!(metrics.read_pool, 5);
    assert_eq!(metrics.write_pool, 5);

    assert!(metrics.iterations > 0);
    assert_eq!(metrics.unexpected(), 0);
    assert_eq!(metrics.skipped_total(), 0);
    assert_eq!(metrics.transport_failures, 0);
    assert!(!metrics.target_unreachable);
    assert_eq!(metrics.total_requests(), metrics.iterations);
    assert!(metrics.check().is_ok());

    // The server saw exactly the requests that were recorded, plus seeding.
    assert_eq!(
        mocks[common::READ_KEY].hits(),
        metrics.count(classify(Action::Read, Some(200)))
    );
    assert_eq!(
        mocks[common::UPDATE_KEY].hits(),
        metrics.count(classify(Action::Update, Some(200)))
    );
    assert_eq!(
        mocks[common::CREATE_KEY].hits(),
        metrics.count(classify(Action::Create, Some(201))) + 10
    );
    assert_eq!(
        mocks[common::DELETE_KEY].hits(),
        metrics.count(classify(Action::Delete, Some(200)))
    );

    // Reads dominate with the default weights.
    assert!(recorded(&metrics, Action::Read) > recorded(&metrics, Action::Create));
    assert_eq!(metrics.users, 2);
}

#[test]
#[serial]
/// Not found, forbidden and conflict are accepted outcomes.
fn accepted_statuses() {
    let server = MockServer::start();
    let _mocks = common::setup_user_api(&server, [404, 403, 409, 404]);

    let configuration = common::build_configuration(&server, vec![]);
    let metrics = common::run_load_test(configuration);

    // A 409 admits the identifier into the pool.
    assert_eq!(metrics.read_pool, 5);
    assert_eq!(metrics.write_pool, 5);

    assert_eq!(metrics.unexpected(), 0);
    assert_eq!(
        metrics.count(classify(Action::Read, Some(404))),
        recorded(&metrics, Action::Read)
    );
    assert_eq!(
        metrics.count(classify(Action::Update, Some(403))),
        recorded(&metrics, Action::Update)
    );
    assert_eq!(
        metrics.count(classify(Action::Create, Some(409))),
        recorded(&metrics, Action::Create)
    );
    assert!(metrics.check().is_ok());
}

#[test]
#[serial]
/// Any other status is recorded as unexpected and fails the check.
fn unexpected_status() {
    let server = MockServer::start();
    let _mocks = common::setup_user_api(&server, [500, 200, 201, 200]);

    let configuration =
        common::build_configuration(&server, vec!["--weights", "0.5,0.5,0,0"]);
    let metrics = common::run_load_test(configuration);

    let unexpected = metrics.count(OutcomeBucket::new(Action::Read, StatusClass::Unexpected));
    assert!(unexpected > 0);
    assert_eq!(unexpected, recorded(&metrics, Action::Read));
    assert_eq!(metrics.unexpected(), unexpected);
    // The server answered, so nothing failed at the transport level.
    assert_eq!(metrics.transport_failures, 0);
    assert_eq!(
        metrics.requests[&Action::Read].status_code_counts.get(&500),
        Some(&unexpected)
    );

    match metrics.check() {
        Err(GanderError::UnexpectedOutcomes { count, detail }) => {
            assert_eq!(count, unexpected);
            assert!(detail.contains("READ_UNEXPECTED"));
        }
        other => panic!("expected UnexpectedOutcomes, got {:?}", other),
    }
}

// Mock seeding, plus an update endpoint that only accepts the bearer token.
fn setup_authorized_update(server: &MockServer) -> (httpmock::Mock, httpmock::Mock) {
    let create = server.mock(|when, then| {
        when.method(httpmock::Method::POST).path(common::CREATE_PATH);
        then.status(201);
    });
    let update = server.mock(|when, then| {
        when.method(httpmock::Method::PUT)
            .path(common::UPDATE_PATH)
            .header("Authorization", "Bearer secret");
        then.status(200);
    });
    (create, update)
}

#[test]
#[serial]
/// Updates carry the bearer token unless configured otherwise.
fn update_authorization() {
    let server = MockServer::start();
    let (_create, update) = setup_authorized_update(&server);
    let configuration = common::build_configuration(
        &server,
        vec!["--token", "secret", "--weights", "0,1,0,0"],
    );
    let metrics = common::run_load_test(configuration);
    assert!(update.hits() > 0);
    assert_eq!(update.hits(), metrics.iterations);
    assert_eq!(
        metrics.count(classify(Action::Update, Some(200))),
        metrics.iterations
    );

    // Without the token no update matches, and the mock server answers 404.
    let server = MockServer::start();
    let (_create, update) = setup_authorized_update(&server);
    let configuration = common::build_configuration(
        &server,
        vec![
            "--token",
            "secret",
            "--weights",
            "0,1,0,0",
            "--update-without-auth",
        ],
    );
    let metrics = common::run_load_test(configuration);
    assert_eq!(update.hits(), 0);
    assert_eq!(metrics.count(classify(Action::Update, Some(200))), 0);
    assert_eq!(
        metrics.count(classify(Action::Update, Some(404))),
        metrics.iterations
    );
}
