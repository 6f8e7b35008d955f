use httpmock::MockServer;
use serial_test::serial;

mod common;

use gander::prelude::*;

#[test]
#[serial]
/// Every recorded request is written to the request log, in any format.
fn request_log() {
    for (format, header) in [("csv", 1), ("json", 0), ("raw", 0)] {
        let request_log = format!("requests-{}.log", format);
        common::cleanup_files(vec![request_log.as_str()]);

        let server = MockServer::start();
        let _mocks = common::setup_user_api(&server, common::HEALTHY);
        let configuration = common::build_configuration(
            &server,
            vec!["--request-log", request_log.as_str(), "--request-format", format],
        );
        let metrics = common::run_load_test(configuration);

        assert!(metrics.total_requests() > 0);
        // Seeding requests are not logged.
        assert_eq!(
            common::file_length(&request_log),
            metrics.total_requests() + header
        );
        common::cleanup_files(vec![request_log.as_str()]);
    }
}

#[test]
#[serial]
/// Each CSV row carries the outcome bucket of its request.
fn request_log_rows() {
    let request_log = "request-rows.csv";
    common::cleanup_files(vec![request_log]);

    let server = MockServer::start();
    let _mocks = common::setup_user_api(&server, common::HEALTHY);
    let configuration = common::build_configuration(
        &server,
        vec![
            "--request-log",
            request_log,
            "--request-format",
            "csv",
            "--weights",
            "1,0,0,0",
        ],
    );
    let metrics = common::run_load_test(configuration);

    let contents = std::fs::read_to_string(request_log).expect("failed to read request log");
    let mut lines = contents.lines();
    assert_eq!(
        lines.next(),
        Some("elapsed,user,action,name,identifier,status_code,response_time,bucket,error")
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), metrics.total_requests());
    for row in rows {
        assert!(row.contains(",READ,"));
        assert!(row.contains(",200,"));
        assert!(row.contains("READ_200"));
    }
    common::cleanup_files(vec![request_log]);
}

#[test]
#[serial]
/// The html report and the json summary are written when the load test ends.
fn report_and_summary() {
    let report_file = "report-test.html";
    let summary_file = "summary-test.json";
    common::cleanup_files(vec![report_file, summary_file]);

    let server = MockServer::start();
    let _mocks = common::setup_user_api(&server, common::HEALTHY);
    let configuration = common::build_configuration(
        &server,
        vec![
            "--report-file",
            report_file,
            "--summary-file",
            summary_file,
            "--p95-threshold",
            "5000",
        ],
    );
    let metrics = common::run_load_test(configuration);

    let report = std::fs::read_to_string(report_file).expect("failed to read report");
    assert!(report.contains("READ_200"));
    assert!(report.contains(&server.base_url()));
    assert!(common::file_length(report_file) > 10);

    let summary = std::fs::read_to_string(summary_file).expect("failed to read summary");
    let summary: serde_json::Value =
        serde_json::from_str(&summary).expect("summary is not valid json");
    assert_eq!(summary["iterations"], metrics.iterations);
    assert_eq!(summary["users"], 2);
    assert_eq!(summary["read_pool"], 5);
    assert_eq!(summary["p95_threshold"], 5000);
    assert_eq!(summary["target_unreachable"], false);
    assert_eq!(
        summary["buckets"]["READ_200"],
        metrics.count(classify(Action::Read, Some(200)))
    );

    common::cleanup_files(vec![report_file, summary_file]);
}

#[test]
#[serial]
/// An unwritable request log fails before any load is generated.
fn unwritable_request_log() {
    let server = MockServer::start();
    let mocks = common::setup_user_api(&server, common::HEALTHY);

    let configuration = common::build_configuration(
        &server,
        vec!["--request-log", "missing-directory/nested/requests.log"],
    );
    match GanderAttack::initialize_with_config(configuration).execute() {
        Err(GanderError::Io(_)) => (),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("load test should not have run"),
    }

    // Not even the pools were seeded.
    for mock in &mocks {
        assert_eq!(mock.hits(), 0);
    }
}
