use gumdrop::Options;
use httpmock::{
    Method::{DELETE, GET, POST, PUT},
    Mock, MockServer,
};
use std::io::{self, BufRead};

use gander::config::GanderConfiguration;
use gander::metrics::GanderMetrics;
use gander::GanderAttack;

// Paths of the user API on the mock server.
pub const CREATE_PATH: &str = "/api/users";
pub const READ_PATH: &str = "/api/users/get-by-email";
pub const UPDATE_PATH: &str = "/api/users/update";
pub const DELETE_PATH: &str = "/api/users";

// Indexes to the mocks returned by setup_user_api, in Action order.
#[allow(dead_code)]
pub const READ_KEY: usize = 0;
#[allow(dead_code)]
pub const UPDATE_KEY: usize = 1;
#[allow(dead_code)]
pub const CREATE_KEY: usize = 2;
#[allow(dead_code)]
pub const DELETE_KEY: usize = 3;

/// A target that answers every action successfully.
#[allow(dead_code)]
pub const HEALTHY: [u16; 4] = [200, 200, 201, 200];

/// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
/// compiler warnings during testing.

/// The following options are configured by default, if not set to a custom value:
///  --host <mock-server>
///  --ramp 2,1s
///  --read-pool 5
///  --write-pool 5
///  --pacing 10
///  --timeout 5
pub fn build_configuration(server: &MockServer, custom: Vec<&str>) -> GanderConfiguration {
    // Start with an empty configuration.
    let mut configuration: Vec<&str> = vec![];
    // Declare server_url here no matter what, so its lifetime is sufficient when needed.
    let server_url = server.base_url();

    // Merge in all custom options first.
    configuration.extend_from_slice(&custom);

    // Default to using mock server if not otherwise configured.
    if !configuration.contains(&"--host") {
        configuration.extend_from_slice(&["--host", &server_url]);
    }

    // Default to a short ramp with 2 users if not otherwise configured.
    if !configuration.contains(&"--ramp") {
        configuration.extend_from_slice(&["--ramp", "2,1s"]);
    }

    // Default to small pools if not otherwise configured.
    if !configuration.contains(&"--read-pool") {
        configuration.extend_from_slice(&["--read-pool", "5"]);
    }
    if !configuration.contains(&"--write-pool") {
        configuration.extend_from_slice(&["--write-pool", "5"]);
    }

    // Default to a short pause between iterations if not otherwise configured.
    if !configuration.contains(&"--pacing") {
        configuration.extend_from_slice(&["--pacing", "10"]);
    }

    if !configuration.contains(&"--timeout") {
        configuration.extend_from_slice(&["--timeout", "5"]);
    }

    // Parse these options to generate a GanderConfiguration.
    GanderConfiguration::parse_args_default(&configuration)
        .expect("failed to parse options and generate a configuration")
}

/// Mock every endpoint of the user API, answering each action with the matching status
/// from `statuses` (read, update, create, delete). Returns the mocks in the same order.
pub fn setup_user_api(server: &MockServer, statuses: [u16; 4]) -> Vec<Mock> {
    vec![
        server.mock(|when, then| {
            when.method(GET).path(READ_PATH);
            then.status(statuses[0]);
        }),
        server.mock(|when, then| {
            when.method(PUT).path(UPDATE_PATH);
            then.status(statuses[1]);
        }),
        server.mock(|when, then| {
            when.method(POST).path(CREATE_PATH);
            then.status(statuses[2]);
        }),
        server.mock(|when, then| {
            when.method(DELETE).path(DELETE_PATH);
            then.status(statuses[3]);
        }),
    ]
}

/// Run the actual load test, returning the GanderMetrics.
#[allow(dead_code)]
pub fn run_load_test(configuration: GanderConfiguration) -> GanderMetrics {
    GanderAttack::initialize_with_config(configuration)
        .execute()
        .expect("load test failed")
}

/// Helper to count the number of lines in a test artifact.
#[allow(dead_code)]
pub fn file_length(file_name: &str) -> usize {
    if let Ok(file) = std::fs::File::open(std::path::Path::new(file_name)) {
        io::BufReader::new(file).lines().count()
    } else {
        0
    }
}

/// Helper to delete test artifacts, if existing.
#[allow(dead_code)]
pub fn cleanup_files(files: Vec<&str>) {
    for file in files {
        if std::path::Path::new(file).exists() {
            std::fs::remove_file(file).expect("failed to remove file");
        }
    }
}
