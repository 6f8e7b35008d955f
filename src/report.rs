//! Optionally writes an html-formatted report and a json summary after running a load test.

use chrono::prelude::*;
use serde::Serialize;
use std::mem;
use strum::IntoEnumIterator;

use crate::action::Action;
use crate::classify::OutcomeBucket;
use crate::metrics::{self, GanderMetrics};
use crate::GanderError;

/// Defines the metrics reported about requests.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RequestRow {
    pub action: String,
    pub name: String,
    pub number_of_requests: usize,
    pub number_of_unexpected: usize,
    pub response_time_average: String,
    pub response_time_minimum: usize,
    pub response_time_maximum: usize,
    pub requests_per_second: String,
    pub unexpected_per_second: String,
}

/// Defines the metrics reported about responses.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResponseRow {
    pub action: String,
    pub name: String,
    pub percentile_50: String,
    pub percentile_75: String,
    pub percentile_90: String,
    pub percentile_95: String,
    pub percentile_99: String,
    pub percentile_100: String,
}

// Requests per action that landed in an unexpected bucket.
fn unexpected_for(metrics: &GanderMetrics, action: Action) -> usize {
    metrics
        .buckets
        .iter()
        .filter(|(bucket, _)| bucket.action == action && !bucket.is_expected())
        .map(|(_, count)| count)
        .sum()
}

/// Build one request row per action that made requests, followed by an aggregated row.
pub(crate) fn request_rows(metrics: &GanderMetrics) -> Vec<RequestRow> {
    let mut rows = Vec::new();
    let mut row = |action: &str, request: &metrics::RequestAggregate, unexpected: usize| {
        let (requests_per_second, unexpected_per_second) = metrics::per_second_calculations(
            metrics.duration,
            request.response_time_counter,
            unexpected,
        );
        let average = match request.response_time_counter {
            0 => 0.0,
            counter => request.total_response_time as f32 / counter as f32,
        };
        rows.push(RequestRow {
            action: action.to_string(),
            name: request.name.clone(),
            number_of_requests: request.response_time_counter,
            number_of_unexpected: unexpected,
            response_time_average: format!("{:.2}", average),
            response_time_minimum: request.min_response_time,
            response_time_maximum: request.max_response_time,
            requests_per_second: format!("{:.2}", requests_per_second),
            unexpected_per_second: format!("{:.2}", unexpected_per_second),
        });
    };

    for action in Action::iter() {
        if let Some(request) = metrics.requests.get(&action) {
            row(&action.to_string(), request, unexpected_for(metrics, action));
        }
    }
    if metrics.requests.len() > 1 {
        row("", &metrics.aggregate(), metrics.unexpected());
    }
    rows
}

/// Helper to generate a single response row.
fn response_row(action: &str, request: &metrics::RequestAggregate) -> ResponseRow {
    // Calculate percentiles in a loop.
    let mut percentiles = Vec::new();
    for percent in &[0.5, 0.75, 0.9, 0.95, 0.99, 1.0] {
        percentiles.push(metrics::format_number(request.percentile(*percent)));
    }

    // Now take the Strings out of the Vector and build a ResponseRow object.
    ResponseRow {
        action: action.to_string(),
        name: request.name.clone(),
        percentile_50: mem::take(&mut percentiles[0]),
        percentile_75: mem::take(&mut percentiles[1]),
        percentile_90: mem::take(&mut percentiles[2]),
        percentile_95: mem::take(&mut percentiles[3]),
        percentile_99: mem::take(&mut percentiles[4]),
        percentile_100: mem::take(&mut percentiles[5]),
    }
}

pub(crate) fn response_rows(metrics: &GanderMetrics) -> Vec<ResponseRow> {
    let mut rows: Vec<ResponseRow> = Action::iter()
        .filter_map(|action| {
            metrics
                .requests
                .get(&action)
                .map(|request| response_row(&action.to_string(), request))
        })
        .collect();
    if metrics.requests.len() > 1 {
        rows.push(response_row("", &metrics.aggregate()));
    }
    rows
}

// Escape text inserted into the report.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Build the html report.
pub(crate) fn build_report(metrics: &GanderMetrics, host: &str) -> String {
    let start_time = metrics
        .started
        .map(|started| started.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    let end_time = metrics
        .started
        .map(|started| {
            (started + chrono::Duration::seconds(metrics.duration as i64))
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default();

    let outcome_rows: String = OutcomeBucket::all()
        .into_iter()
        .filter(|bucket| bucket.is_expected() || metrics.count(*bucket) > 0)
        .map(|bucket| {
            let class = if bucket.is_expected() { "" } else { " class=\"unexpected\"" };
            format!(
                "<tr{}><td>{}</td><td>{}</td></tr>",
                class,
                bucket,
                metrics::format_number(metrics.count(bucket))
            )
        })
        .chain(metrics.skipped.iter().map(|(action, count)| {
            format!(
                "<tr><td>{}_SKIPPED</td><td>{}</td></tr>",
                action,
                metrics::format_number(*count)
            )
        }))
        .collect::<Vec<String>>()
        .join("\n");

    let request_rows: String = request_rows(metrics)
        .iter()
        .map(|row| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                row.action,
                escape(&row.name),
                row.number_of_requests,
                row.number_of_unexpected,
                row.response_time_average,
                row.response_time_minimum,
                row.response_time_maximum,
                row.requests_per_second,
                row.unexpected_per_second,
            )
        })
        .collect::<Vec<String>>()
        .join("\n");

    let response_rows: String = response_rows(metrics)
        .iter()
        .map(|row| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                row.action,
                escape(&row.name),
                row.percentile_50,
                row.percentile_75,
                row.percentile_90,
                row.percentile_95,
                row.percentile_99,
                row.percentile_100,
            )
        })
        .collect::<Vec<String>>()
        .join("\n");

    let history_rows: String = metrics
        .history
        .iter()
        .map(|step| {
            format!(
                "<tr><td>{}</td><td>{:?}</td><td>{}</td></tr>",
                step.timestamp
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S"),
                step.action,
                step.users
            )
        })
        .collect::<Vec<String>>()
        .join("\n");

    let error_rows: String = metrics
        .errors
        .values()
        .map(|error| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                error.occurrences,
                error.action,
                escape(&error.error)
            )
        })
        .collect::<Vec<String>>()
        .join("\n");

    let status = if metrics.target_unreachable {
        "<p class=\"unexpected\">TARGET UNREACHABLE: every request failed before receiving a response.</p>".to_string()
    } else {
        match metrics.check() {
            Ok(_) => "<p>All outcomes expected.</p>".to_string(),
            Err(e) => format!("<p class=\"unexpected\">{}</p>", escape(&e.to_string())),
        }
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Gander Report</title>
    <style>
        .container {{
            width: 1000px;
            margin: 0 auto;
            padding: 10px;
            background: #173529;
            font-family: Arial, Helvetica, sans-serif;
            font-size: 14px;
            color: #fff;
        }}

        .info span {{
            color: #b3c3bc;
        }}

        table {{
            border-collapse: collapse;
            text-align: center;
            width: 100%;
        }}

        td, th {{
            border: 1px solid #cad9ea;
            color: #666;
            height: 30px;
        }}

        thead th {{
            background-color: #cce8eb;
            width: 100px;
        }}

        tr:nth-child(odd) {{
            background: #fff;
        }}

        tr:nth-child(even) {{
            background: #f5fafa;
        }}

        .unexpected, .unexpected td {{
            color: #c0392b;
            font-weight: bold;
        }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Gander Report</h1>

        <div class="info">
            <p>During: <span>{start_time} - {end_time}</span></p>
            <p>Target Host: <span>{host}</span></p>
            <p>Users: <span>{users}</span>, Iterations: <span>{iterations}</span></p>
            <p>Pools: <span>{read_pool} read, {write_pool} write</span></p>
            <p>p95: <span>{p95} ms</span>, threshold: <span>{threshold}</span></p>
            {status}
        </div>

        <div class="history">
            <h2>Ramp</h2>
            <table>
                <thead>
                    <tr>
                        <th>Timestamp</th>
                        <th>Action</th>
                        <th>Users</th>
                    </tr>
                </thead>
                <tbody>
                    {history_rows}
                </tbody>
            </table>
        </div>

        <div class="outcomes">
            <h2>Outcomes</h2>
            <table>
                <thead>
                    <tr>
                        <th>Bucket</th>
                        <th>Count</th>
                    </tr>
                </thead>
                <tbody>
                    {outcome_rows}
                </tbody>
            </table>
        </div>

        <div class="requests">
            <h2>Request Metrics</h2>
            <table>
                <thead>
                    <tr>
                        <th>Action</th>
                        <th>Name</th>
                        <th># Requests</th>
                        <th># Unexpected</th>
                        <th>Average (ms)</th>
                        <th>Min (ms)</th>
                        <th>Max (ms)</th>
                        <th>RPS</th>
                        <th>Unexpected/s</th>
                    </tr>
                </thead>
                <tbody>
                    {request_rows}
                </tbody>
            </table>
        </div>

        <div class="responses">
            <h2>Response Time Metrics</h2>
            <table>
                <thead>
                    <tr>
                        <th>Action</th>
                        <th>Name</th>
                        <th>50%ile (ms)</th>
                        <th>75%ile (ms)</th>
                        <th>90%ile (ms)</th>
                        <th>95%ile (ms)</th>
                        <th>99%ile (ms)</th>
                        <th>100%ile (ms)</th>
                    </tr>
                </thead>
                <tbody>
                    {response_rows}
                </tbody>
            </table>
        </div>

        <div class="errors">
            <h2>Errors</h2>
            <table>
                <thead>
                    <tr>
                        <th>#</th>
                        <th>Action</th>
                        <th>Error</th>
                    </tr>
                </thead>
                <tbody>
                    {error_rows}
                </tbody>
            </table>
        </div>
    </div>
</body>
</html>"#,
        start_time = start_time,
        end_time = end_time,
        host = escape(host),
        users = metrics.users,
        iterations = metrics::format_number(metrics.iterations),
        read_pool = metrics.read_pool,
        write_pool = metrics.write_pool,
        p95 = metrics::format_number(metrics.p95()),
        threshold = match metrics.p95_threshold {
            0 => "disabled".to_string(),
            threshold => format!("{} ms", metrics::format_number(threshold)),
        },
        status = status,
        history_rows = history_rows,
        outcome_rows = outcome_rows,
        request_rows = request_rows,
        response_rows = response_rows,
        error_rows = error_rows,
    )
}

/// Write the html report to `path`.
pub(crate) async fn write_html_report(
    path: &str,
    metrics: &GanderMetrics,
    host: &str,
) -> Result<(), GanderError> {
    tokio::fs::write(path, build_report(metrics, host)).await?;
    info!("wrote html report file to: {}", path);
    Ok(())
}

/// Write the json summary to `path`.
pub(crate) async fn write_summary(path: &str, metrics: &GanderMetrics) -> Result<(), GanderError> {
    let summary = serde_json::to_string_pretty(metrics)?;
    tokio::fs::write(path, summary).await?;
    info!("wrote json summary file to: {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::metrics::{Aggregator, RequestMetric};
    use crate::ramp::{RampAction, RampHistory};

    fn metrics() -> GanderMetrics {
        let aggregator = Aggregator::new();
        let requests = [
            (Action::Read, Some(200), 12),
            (Action::Read, Some(404), 30),
            (Action::Create, Some(201), 45),
            (Action::Delete, None, 60_000),
        ];
        for (action, status_code, response_time) in requests {
            aggregator.record(&RequestMetric {
                elapsed: 0,
                user: 0,
                action,
                name: format!("{} /api/users", action.method()),
                identifier: "get_abc@test.com".to_string(),
                status_code,
                response_time,
                bucket: classify(action, status_code),
                error: status_code.map_or(Some("timeout: <slow>".to_string()), |_| None),
            });
        }
        aggregator.record_skipped(Action::Update);
        let mut metrics = aggregator.snapshot();
        metrics.started = Some(Local::now());
        metrics.duration = 10;
        metrics.users = 2;
        metrics.history = vec![
            RampHistory::step(RampAction::Increasing, 0),
            RampHistory::step(RampAction::Finished, 0),
        ];
        metrics
    }

    #[test]
    fn rows() {
        let metrics = metrics();
        let requests = request_rows(&metrics);
        // READ, CREATE, DELETE and the aggregate.
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].action, "READ");
        assert_eq!(requests[0].number_of_requests, 2);
        assert_eq!(requests[0].number_of_unexpected, 0);
        assert_eq!(requests[0].response_time_average, "21.00");
        assert_eq!(requests[2].action, "DELETE");
        assert_eq!(requests[2].number_of_unexpected, 1);
        assert_eq!(requests[3].number_of_requests, 4);
        assert_eq!(requests[3].number_of_unexpected, 1);
        assert_eq!(requests[3].requests_per_second, "0.40");

        let responses = response_rows(&metrics);
        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0].percentile_100, "30");
        assert_eq!(responses[2].percentile_50, "60,000");
    }

    #[test]
    fn html_report() {
        let report = build_report(&metrics(), "http://localhost:8080");
        assert!(report.starts_with("<!DOCTYPE html>"));
        assert!(report.contains("http://localhost:8080"));
        assert!(report.contains("<td>READ_404</td><td>1</td>"));
        assert!(report.contains("<td>UPDATE_SKIPPED</td><td>1</td>"));
        assert!(report.contains("DELETE_UNEXPECTED"));
        assert!(report.contains("timeout: &lt;slow&gt;"));
        assert!(report.contains("Increasing"));
        assert!(!report.contains("{start_time}"));
    }

    #[tokio::test]
    async fn summary_file() {
        let path = std::env::temp_dir().join(format!("gander-summary-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();
        write_summary(&path, &metrics()).await.unwrap();
        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(summary["buckets"]["READ_200"], 1);
        assert_eq!(summary["buckets"]["DELETE_UNEXPECTED"], 1);
        assert_eq!(summary["skipped"]["UPDATE"], 1);
        assert_eq!(summary["transport_failures"], 1);
        assert_eq!(summary["history"].as_array().unwrap().len(), 2);
        std::fs::remove_file(&path).unwrap();
    }
}
