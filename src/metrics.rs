//! Metrics collected and aggregated during load tests.
//!
//! Every [`VirtualUser`](../user/struct.VirtualUser.html) records into one shared
//! [`Aggregator`]. Outcome counters are lock-free atomics. Response times and errors are
//! kept behind short-lived mutexes. When the load test has drained, the engine takes a
//! [`GanderMetrics`] snapshot.
//!
//! When the [`GanderMetrics`] object is viewed with [`std::fmt::Display`], the outcome
//! buckets, per-action requests, response times, status codes and errors are displayed
//! in tables.

use chrono::prelude::*;
use itertools::Itertools;
use num_format::{Locale, ToFormattedString};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use strum::IntoEnumIterator;

use crate::action::Action;
use crate::classify::{OutcomeBucket, STATUS_CLASSES};
use crate::ramp::RampHistory;
use crate::util;
use crate::GanderError;

const BUCKETS: usize = 4 * STATUS_CLASSES;

/// A single request made by a virtual user.
///
/// Copies are sent to the request log when `--request-log` is enabled.
#[derive(Clone, Debug, Serialize)]
pub struct RequestMetric {
    /// How many milliseconds the load test has been running.
    pub elapsed: u64,
    /// Which virtual user made the request.
    pub user: usize,
    /// The action performed.
    pub action: Action,
    /// The method and path, ie `GET /api/users/get-by-email`.
    pub name: String,
    /// The targeted identifier.
    pub identifier: String,
    /// The returned status code, `None` when the request failed at the transport level.
    pub status_code: Option<u16>,
    /// How many milliseconds the request took.
    pub response_time: u64,
    /// The bucket this request was classified into.
    #[serde(serialize_with = "serialize_bucket")]
    pub bucket: OutcomeBucket,
    /// Transport error, if any.
    pub error: Option<String>,
}

fn serialize_bucket<S>(bucket: &OutcomeBucket, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&bucket.to_string())
}

/// Response times and status codes seen for one [`Action`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RequestAggregate {
    /// The method and path, ie `DELETE /api/users`.
    pub name: String,
    /// Per-response-time counters, tracking how often requests completed with this response time.
    ///
    /// Response times below 100ms are stored without rounding. Response times between 100 and
    /// 500ms are rounded to the nearest 10ms, between 500 and 1000ms to the nearest 100ms, and
    /// larger response times are rounded to the nearest 1000ms.
    pub response_times: BTreeMap<usize, usize>,
    /// The shortest response time seen so far, not rounded.
    pub min_response_time: usize,
    /// The longest response time seen so far, not rounded.
    pub max_response_time: usize,
    /// Total combined response times seen so far.
    pub total_response_time: usize,
    /// Total number of response times seen so far.
    pub response_time_counter: usize,
    /// Per-status-code counters.
    pub status_code_counts: BTreeMap<u16, usize>,
    /// Requests that never received a status code.
    pub transport_failures: usize,
}
impl RequestAggregate {
    pub(crate) fn new(name: &str) -> Self {
        RequestAggregate {
            name: name.to_string(),
            response_times: BTreeMap::new(),
            min_response_time: 0,
            max_response_time: 0,
            total_response_time: 0,
            response_time_counter: 0,
            status_code_counts: BTreeMap::new(),
            transport_failures: 0,
        }
    }

    /// Track response time.
    pub(crate) fn set_response_time(&mut self, response_time: u64) {
        let response_time = response_time as usize;

        // Update minimum if this one is fastest yet.
        if self.min_response_time == 0
            || (response_time > 0 && response_time < self.min_response_time)
        {
            self.min_response_time = response_time;
        }
        if response_time > self.max_response_time {
            self.max_response_time = response_time;
        }
        self.total_response_time += response_time;
        self.response_time_counter += 1;

        *self
            .response_times
            .entry(round_response_time(response_time))
            .or_insert(0) += 1;
    }

    /// Increment counter for status code, creating new counter if first time seeing status code.
    pub(crate) fn set_status_code(&mut self, status_code: Option<u16>) {
        match status_code {
            Some(code) => *self.status_code_counts.entry(code).or_insert(0) += 1,
            None => self.transport_failures += 1,
        }
    }

    /// The response time `percent` of requests completed within.
    pub fn percentile(&self, percent: f32) -> usize {
        response_time_percentile(
            &self.response_times,
            self.response_time_counter,
            self.min_response_time,
            self.max_response_time,
            percent,
        )
    }
}

// Round the response time so similar times are combined, minimizing required memory.
fn round_response_time(response_time: usize) -> usize {
    if response_time < 100 {
        response_time
    } else if response_time < 500 {
        ((response_time as f64 / 10.0).round() * 10.0) as usize
    } else if response_time < 1000 {
        ((response_time as f64 / 100.0).round() * 100.0) as usize
    } else {
        ((response_time as f64 / 1000.0).round() * 1000.0) as usize
    }
}

/// For tracking and counting transport errors detected during a load test.
///
/// Errors sharing an action and message are contained within a single `ErrorMetric`,
/// with `occurrences` indicating how many times it was seen.
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct ErrorMetric {
    /// The action that resulted in an error.
    pub action: Action,
    /// The method and path of the failing request.
    pub name: String,
    /// The error string.
    pub error: String,
    /// How many times this error occurred.
    pub occurrences: usize,
}

/// Thread-safe counters shared by every virtual user during a load test.
///
/// # Example
/// ```rust
/// use gander::action::Action;
/// use gander::classify::classify;
/// use gander::metrics::Aggregator;
///
/// let aggregator = Aggregator::new();
/// aggregator.increment(classify(Action::Read, Some(200)));
/// aggregator.record_skipped(Action::Delete);
///
/// let metrics = aggregator.snapshot();
/// assert_eq!(metrics.count(classify(Action::Read, Some(200))), 1);
/// assert_eq!(metrics.skipped_total(), 1);
/// ```
#[derive(Debug)]
pub struct Aggregator {
    buckets: [AtomicUsize; BUCKETS],
    skipped: [AtomicUsize; 4],
    iterations: AtomicUsize,
    transport_failures: AtomicUsize,
    connect_failures: AtomicUsize,
    requests: Mutex<BTreeMap<Action, RequestAggregate>>,
    errors: Mutex<BTreeMap<String, ErrorMetric>>,
}
impl Aggregator {
    pub fn new() -> Self {
        Aggregator {
            buckets: std::array::from_fn(|_| AtomicUsize::new(0)),
            skipped: std::array::from_fn(|_| AtomicUsize::new(0)),
            iterations: AtomicUsize::new(0),
            transport_failures: AtomicUsize::new(0),
            connect_failures: AtomicUsize::new(0),
            requests: Mutex::new(BTreeMap::new()),
            errors: Mutex::new(BTreeMap::new()),
        }
    }

    /// Add one to the counter for `bucket`.
    pub fn increment(&self, bucket: OutcomeBucket) {
        self.buckets[bucket.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// The current value of the counter for `bucket`.
    pub fn count(&self, bucket: OutcomeBucket) -> usize {
        self.buckets[bucket.index()].load(Ordering::Relaxed)
    }

    /// Count an iteration that could not run because its pool was empty.
    pub fn record_skipped(&self, action: Action) {
        self.skipped[action.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Count a finished iteration.
    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a request that could not connect to the host at all.
    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record everything known about a completed request.
    pub fn record(&self, request: &RequestMetric) {
        self.increment(request.bucket);

        {
            let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
            let aggregate = requests
                .entry(request.action)
                .or_insert_with(|| RequestAggregate::new(&request.name));
            aggregate.set_response_time(request.response_time);
            aggregate.set_status_code(request.status_code);
        }

        if let Some(error) = request.error.as_ref() {
            self.transport_failures.fetch_add(1, Ordering::Relaxed);
            let key = format!("{}.{}", request.action, error);
            let mut errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
            errors
                .entry(key)
                .or_insert_with(|| ErrorMetric {
                    action: request.action,
                    name: request.name.clone(),
                    error: error.clone(),
                    occurrences: 0,
                })
                .occurrences += 1;
        }
    }

    /// Number of finished iterations so far.
    pub fn iterations(&self) -> usize {
        self.iterations.load(Ordering::Relaxed)
    }

    /// A point-in-time copy of everything recorded so far.
    ///
    /// Only the counters are filled in, run details such as the duration are set by
    /// the caller.
    pub fn snapshot(&self) -> GanderMetrics {
        let buckets = OutcomeBucket::all()
            .into_iter()
            .filter_map(|bucket| match self.count(bucket) {
                0 => None,
                count => Some((bucket, count)),
            })
            .collect();
        let skipped = Action::iter()
            .filter_map(
                |action| match self.skipped[action.index()].load(Ordering::Relaxed) {
                    0 => None,
                    count => Some((action, count)),
                },
            )
            .collect();
        let requests = self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let errors = self
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        GanderMetrics {
            buckets,
            skipped,
            requests,
            errors,
            iterations: self.iterations(),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            ..Default::default()
        }
    }
}
impl Default for Aggregator {
    fn default() -> Self {
        Aggregator::new()
    }
}

/// Metrics collected during a load test.
///
/// Returned by [`GanderAttack::execute()`](../struct.GanderAttack.html#method.execute).
#[derive(Clone, Debug, Default)]
pub struct GanderMetrics {
    /// When the load test started.
    pub started: Option<DateTime<Local>>,
    /// Total number of seconds the load test ran.
    pub duration: usize,
    /// The most virtual users running at once.
    pub users: usize,
    /// Transitions between ramp stages.
    pub history: Vec<RampHistory>,
    /// How often each outcome bucket was hit. Buckets that never happened are absent.
    pub buckets: BTreeMap<OutcomeBucket, usize>,
    /// Iterations skipped because the pool they needed was empty, per action.
    pub skipped: BTreeMap<Action, usize>,
    /// Response times and status codes per action.
    pub requests: BTreeMap<Action, RequestAggregate>,
    /// Transport errors grouped by action and message.
    pub errors: BTreeMap<String, ErrorMetric>,
    /// Iterations that finished, including skipped ones.
    pub iterations: usize,
    /// Requests that never received a response.
    pub transport_failures: usize,
    /// Transport failures where no connection to the host could be established.
    pub connect_failures: usize,
    /// Set when requests were made and none of them could connect to the host.
    pub target_unreachable: bool,
    /// Identifiers seeded into the read pool.
    pub read_pool: usize,
    /// Identifiers seeded into the write pool.
    pub write_pool: usize,
    /// Maximum allowed 95th percentile response time in milliseconds, 0 when disabled.
    pub p95_threshold: usize,
    /// Whether to print metrics when the load test finishes.
    pub(crate) display_metrics: bool,
}
impl GanderMetrics {
    /// How often `bucket` was hit.
    pub fn count(&self, bucket: OutcomeBucket) -> usize {
        self.buckets.get(&bucket).copied().unwrap_or(0)
    }

    /// Total requests classified into any bucket.
    pub fn total_requests(&self) -> usize {
        self.buckets.values().sum()
    }

    /// Requests classified into an unexpected bucket.
    pub fn unexpected(&self) -> usize {
        self.buckets
            .iter()
            .filter(|(bucket, _)| !bucket.is_expected())
            .map(|(_, count)| count)
            .sum()
    }

    /// Total skipped iterations.
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Response times of every request merged together.
    pub fn aggregate(&self) -> RequestAggregate {
        let mut aggregate = RequestAggregate::new("Aggregated");
        for request in self.requests.values() {
            aggregate.response_times =
                merge_times(aggregate.response_times, &request.response_times);
            aggregate.total_response_time += request.total_response_time;
            aggregate.response_time_counter += request.response_time_counter;
            aggregate.min_response_time =
                update_min_time(aggregate.min_response_time, request.min_response_time);
            aggregate.max_response_time =
                update_max_time(aggregate.max_response_time, request.max_response_time);
            for (status_code, count) in &request.status_code_counts {
                *aggregate.status_code_counts.entry(*status_code).or_insert(0) += count;
            }
            aggregate.transport_failures += request.transport_failures;
        }
        aggregate
    }

    /// The 95th percentile response time across every request.
    pub fn p95(&self) -> usize {
        self.aggregate().percentile(0.95)
    }

    /// Confirm the load test met its expectations.
    ///
    /// Fails with [`GanderError::UnexpectedOutcomes`] if any request landed in an
    /// unexpected bucket, then with [`GanderError::ThresholdExceeded`] if the 95th
    /// percentile response time reached the configured threshold.
    pub fn check(&self) -> Result<(), GanderError> {
        let unexpected = self.unexpected();
        if unexpected > 0 {
            let buckets = self
                .buckets
                .iter()
                .filter(|(bucket, _)| !bucket.is_expected())
                .map(|(bucket, count)| format!("{}: {}", bucket, count))
                .join(", ");
            return Err(GanderError::UnexpectedOutcomes {
                count: unexpected,
                detail: buckets,
            });
        }

        if self.p95_threshold > 0 {
            let p95 = self.p95();
            if p95 >= self.p95_threshold {
                return Err(GanderError::ThresholdExceeded {
                    p95,
                    threshold: self.p95_threshold,
                });
            }
        }

        Ok(())
    }

    /// Display all metrics from a completed load test.
    pub fn print(&self) {
        if self.display_metrics {
            info!("printing final metrics after {} seconds...", self.duration);
            print!("{}", self);
        }
    }

    pub(crate) fn fmt_overview(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.target_unreachable {
            writeln!(
                fmt,
                "\n !!! TARGET UNREACHABLE: all {} requests failed without a response !!!",
                format_number(self.transport_failures)
            )?;
        }
        writeln!(
            fmt,
            "\n === OVERVIEW ===\n ------------------------------------------------------------------------------"
        )?;
        if let Some(started) = self.started {
            writeln!(
                fmt,
                " {:<24} | {}",
                "Started",
                started.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        writeln!(fmt, " {:<24} | {} seconds", "Duration", self.duration)?;
        writeln!(fmt, " {:<24} | {}", "Users", format_number(self.users))?;
        writeln!(
            fmt,
            " {:<24} | {} read, {} write",
            "Seeded pools",
            format_number(self.read_pool),
            format_number(self.write_pool)
        )?;
        writeln!(
            fmt,
            " {:<24} | {}",
            "Iterations",
            format_number(self.iterations)
        )?;
        writeln!(
            fmt,
            " {:<24} | {}",
            "Skipped",
            format_number(self.skipped_total())
        )
    }

    /// Prepares a table of outcome buckets.
    pub(crate) fn fmt_outcomes(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.buckets.is_empty() && self.skipped.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === OUTCOMES ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>10} | {:>8}",
            "Bucket", "# reqs", "%", "req/s"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        let total = self.total_requests();
        for (bucket, count) in self.buckets.iter() {
            let percent = *count as f32 / total as f32 * 100.0;
            let (reqs, _) = per_second_calculations(self.duration, *count, 0);
            writeln!(
                fmt,
                " {:<24} | {:>13} | {:>10.1} | {:>8.reqs_p$}",
                util::truncate_string(&bucket.to_string(), 24),
                format_number(*count),
                percent,
                reqs,
                reqs_p = determine_precision(reqs),
            )?;
        }
        for (action, count) in self.skipped.iter() {
            writeln!(
                fmt,
                " {:<24} | {:>13} | {:>10} | {:>8}",
                format!("{}_SKIPPED", action),
                format_number(*count),
                "",
                "",
            )?;
        }

        Ok(())
    }

    /// Prepares a table of requests and transport failures per action.
    pub(crate) fn fmt_requests(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If there's nothing to display, exit immediately.
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === PER REQUEST METRICS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8} | {:>7}",
            "Name", "# reqs", "# fails", "req/s", "fail/s"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        let aggregate = self.aggregate();
        let rows = self
            .requests
            .values()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .chain(std::iter::once(&aggregate));
        for (index, request) in rows.enumerate() {
            if index == self.requests.len() {
                if self.requests.len() < 2 {
                    break;
                }
                writeln!(
                    fmt,
                    " -------------------------+---------------+----------------+----------+--------"
                )?;
            }
            let total_count = request.response_time_counter;
            let fail_count = request.transport_failures;
            let fail_percent = if fail_count > 0 {
                fail_count as f32 / total_count as f32 * 100.0
            } else {
                0.0
            };
            let (reqs, fails) = per_second_calculations(self.duration, total_count, fail_count);
            // Compress 100.0 and 0.0 to 100 and 0 respectively to save width.
            let fails_column = if fail_percent as usize == 100 || fail_percent as usize == 0 {
                format!("{} ({}%)", format_number(fail_count), fail_percent as usize)
            } else {
                format!("{} ({:.1}%)", format_number(fail_count), fail_percent)
            };
            writeln!(
                fmt,
                " {:<24} | {:>13} | {:>14} | {:>8.reqs_p$} | {:>7.fails_p$}",
                util::truncate_string(&request.name, 24),
                format_number(total_count),
                fails_column,
                reqs,
                fails,
                reqs_p = determine_precision(reqs),
                fails_p = determine_precision(fails),
            )?;
        }

        Ok(())
    }

    /// Prepares a table of response times and percentiles per action.
    pub(crate) fn fmt_response_times(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>11} | {:>10} | {:>10} | {:>11}",
            "Name", "Avg (ms)", "Min", "Max", "Median"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        let aggregate = self.aggregate();
        for request in self.requests.values().sorted_by(|a, b| a.name.cmp(&b.name)) {
            self.fmt_response_time_row(fmt, request)?;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+-------------+------------+-------------+-----------"
            )?;
            self.fmt_response_time_row(fmt, &aggregate)?;
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " Slowest response within specified percentile of requests (in ms):"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6}",
            "Name", "50%", "75%", "95%", "98%", "99%", "99.9%"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for request in self.requests.values().sorted_by(|a, b| a.name.cmp(&b.name)) {
            fmt_percentile_row(fmt, request)?;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+--------+--------+--------+--------+--------+-------"
            )?;
            fmt_percentile_row(fmt, &aggregate)?;
        }

        Ok(())
    }

    fn fmt_response_time_row(
        &self,
        fmt: &mut fmt::Formatter<'_>,
        request: &RequestAggregate,
    ) -> fmt::Result {
        let average = match request.response_time_counter {
            0 => 0.0,
            _ => request.total_response_time as f32 / request.response_time_counter as f32,
        };
        writeln!(
            fmt,
            " {:<24} | {:>11.avg_precision$} | {:>10} | {:>11} | {:>10}",
            util::truncate_string(&request.name, 24),
            average,
            format_number(request.min_response_time),
            format_number(request.max_response_time),
            format_number(util::median(
                &request.response_times,
                request.response_time_counter,
                request.min_response_time,
                request.max_response_time
            )),
            avg_precision = determine_precision(average),
        )
    }

    /// Prepares a table of response status codes.
    pub(crate) fn fmt_status_codes(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<24} | {:>51} ", "Name", "Status codes")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for request in self.requests.values().sorted_by(|a, b| a.name.cmp(&b.name)) {
            writeln!(
                fmt,
                " {:<24} | {:>51}",
                util::truncate_string(&request.name, 24),
                prepare_status_codes(&request.status_code_counts),
            )?;
        }
        writeln!(
            fmt,
            " -------------------------+----------------------------------------------------"
        )?;
        let aggregate = self.aggregate();
        writeln!(
            fmt,
            " {:<24} | {:>51} ",
            "Aggregated",
            prepare_status_codes(&aggregate.status_code_counts)
        )
    }

    /// Prepares a table of transport errors.
    pub(crate) fn fmt_errors(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === ERRORS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<11} | Error", "Count")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        // Reverse sort errors to display the error occurring the most first.
        for (occurrences, error) in self
            .errors
            .values()
            .map(|error| {
                (
                    error.occurrences,
                    format!("{} {}: {}", error.action, error.name, error.error),
                )
            })
            .sorted()
            .rev()
        {
            writeln!(fmt, " {:<12}  {}", format_number(occurrences), error)?;
        }
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )
    }
}

fn fmt_percentile_row(fmt: &mut fmt::Formatter<'_>, request: &RequestAggregate) -> fmt::Result {
    writeln!(
        fmt,
        " {:<24} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6}",
        util::truncate_string(&request.name, 24),
        format_number(request.percentile(0.5)),
        format_number(request.percentile(0.75)),
        format_number(request.percentile(0.95)),
        format_number(request.percentile(0.98)),
        format_number(request.percentile(0.99)),
        format_number(request.percentile(0.999)),
    )
}

impl Serialize for GanderMetrics {
    // GanderMetrics serialization can't be derived because of the started field and the
    // bucket keys.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("GanderMetrics", 16)?;
        // Convert started field to a unix timestamp.
        let timestamp = self.started.map(|started| started.timestamp()).unwrap_or(0);
        s.serialize_field("started", &timestamp)?;
        s.serialize_field("duration", &self.duration)?;
        s.serialize_field("users", &self.users)?;
        s.serialize_field("history", &self.history)?;
        let buckets: BTreeMap<String, usize> = self
            .buckets
            .iter()
            .map(|(bucket, count)| (bucket.to_string(), *count))
            .collect();
        s.serialize_field("buckets", &buckets)?;
        s.serialize_field("skipped", &self.skipped)?;
        s.serialize_field("requests", &self.requests)?;
        s.serialize_field("errors", &self.errors)?;
        s.serialize_field("iterations", &self.iterations)?;
        s.serialize_field("transport_failures", &self.transport_failures)?;
        s.serialize_field("connect_failures", &self.connect_failures)?;
        s.serialize_field("target_unreachable", &self.target_unreachable)?;
        s.serialize_field("read_pool", &self.read_pool)?;
        s.serialize_field("write_pool", &self.write_pool)?;
        s.serialize_field("p95", &self.p95())?;
        s.serialize_field("p95_threshold", &self.p95_threshold)?;
        s.end()
    }
}

/// Implement format trait to allow displaying metrics.
impl fmt::Display for GanderMetrics {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_overview(fmt)?;
        self.fmt_outcomes(fmt)?;
        self.fmt_requests(fmt)?;
        self.fmt_response_times(fmt)?;
        self.fmt_status_codes(fmt)?;
        self.fmt_errors(fmt)
    }
}

/// Helper to calculate requests and fails per seconds.
pub(crate) fn per_second_calculations(duration: usize, total: usize, fail: usize) -> (f32, f32) {
    if duration == 0 {
        (0.0, 0.0)
    } else {
        (
            total as f32 / duration as f32,
            fail as f32 / duration as f32,
        )
    }
}

fn determine_precision(value: f32) -> usize {
    if value < 1000.0 {
        2
    } else {
        0
    }
}

/// Format large number in locale appropriate style.
pub(crate) fn format_number(number: usize) -> String {
    (number).to_formatted_string(&Locale::en)
}

/// A helper function that merges together times.
pub(crate) fn merge_times(
    mut global_response_times: BTreeMap<usize, usize>,
    local_response_times: &BTreeMap<usize, usize>,
) -> BTreeMap<usize, usize> {
    for (response_time, count) in local_response_times {
        *global_response_times.entry(*response_time).or_insert(0) += count;
    }
    global_response_times
}

/// A helper function to update the global minimum time based on local time.
pub(crate) fn update_min_time(global_min: usize, min: usize) -> usize {
    if global_min == 0 || (min > 0 && min < global_min) {
        min
    } else {
        global_min
    }
}

/// A helper function to update the global maximum time based on local time.
pub(crate) fn update_max_time(global_max: usize, max: usize) -> usize {
    global_max.max(max)
}

/// Get the response time that a certain number of percent of the requests finished within.
pub(crate) fn response_time_percentile(
    response_times: &BTreeMap<usize, usize>,
    total_requests: usize,
    min: usize,
    max: usize,
    percent: f32,
) -> usize {
    let percentile_request = (total_requests as f32 * percent).round() as usize;
    debug!(
        "percentile: {}, request {} of total {}",
        percent, percentile_request, total_requests
    );

    let mut total_count: usize = 0;
    for (value, counter) in response_times {
        total_count += counter;
        if total_count >= percentile_request {
            return (*value).clamp(min, max.max(min));
        }
    }
    0
}

/// Helper to format seen status codes, ie `1,024 [200], 3 [404]`.
pub(crate) fn prepare_status_codes(status_code_counts: &BTreeMap<u16, usize>) -> String {
    status_code_counts
        .iter()
        .map(|(status_code, count)| {
            format!("{} [{}]", count.to_formatted_string(&Locale::en), status_code)
        })
        .join(", ")
}
