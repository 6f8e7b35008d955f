//! Optional request log thread.
//!
//! The request log is enabled with the `--request-log` command-line option, or the
//! [`GanderDefault::RequestLog`](../config/enum.GanderDefault.html#variant.RequestLog)
//! default configuration option. When enabled, this thread is launched and a channel is
//! provided from all [`VirtualUser`](../user/struct.VirtualUser.html) tasks to send a copy
//! of every request for efficient logging to file. The logger thread uses Tokio's
//! asynchronous [`BufWriter`](https://docs.rs/tokio/*/tokio/io/struct.BufWriter.html).
//!
//! The format is configured with `--request-format`:
//!  - `json`: one JSON object per line (default)
//!  - `csv`: comma separated values with a header
//!  - `raw`: Rust's Debug output
//!
//! A JSON formatted request looks like:
//! ```json
//! {"elapsed":1520,"user":3,"action":"DELETE","name":"DELETE /api/users","identifier":"write_0xnn2hdj1q@test.com","status_code":200,"response_time":12,"bucket":"DELETE_200","error":null}
//! ```

use lazy_static::lazy_static;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::metrics::RequestMetric;
use crate::GanderError;

/// Sends messages to the logger thread. `None` tells the logger to flush and exit.
pub type GanderLoggerSender = flume::Sender<Option<GanderLog>>;

lazy_static! {
    static ref LOG_FORMAT: RegexSet = RegexSet::new([
        r"(?i)^(json|jsn)$",
        r"(?i)^(csv|comma)$",
        r"(?i)^(raw|debug)$",
    ])
    .expect("failed to compile log format RegexSet");
}

/// Messages accepted by the logger thread.
#[derive(Debug, Serialize)]
pub enum GanderLog {
    Request(RequestMetric),
}

/// Supported request log formats.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum GanderLogFormat {
    #[default]
    Json,
    Csv,
    Raw,
}
/// Allow `--request-format` from the command line using text variations on supported
/// `GanderLogFormat`s.
impl FromStr for GanderLogFormat {
    type Err = GanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let matches = LOG_FORMAT.matches(s);
        if matches.matched(0) {
            Ok(GanderLogFormat::Json)
        } else if matches.matched(1) {
            Ok(GanderLogFormat::Csv)
        } else if matches.matched(2) {
            Ok(GanderLogFormat::Raw)
        } else {
            Err(GanderError::InvalidOption {
                option: format!("GanderLogFormat::{:?}", s),
                value: s.to_string(),
                detail: "Invalid log format, expected: csv, json, or raw".to_string(),
            })
        }
    }
}
impl fmt::Display for GanderLogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GanderLogFormat::Json => write!(f, "json"),
            GanderLogFormat::Csv => write!(f, "csv"),
            GanderLogFormat::Raw => write!(f, "raw"),
        }
    }
}

const CSV_HEADER: &str =
    "elapsed,user,action,name,identifier,status_code,response_time,bucket,error";

// Quote a CSV field if it contains a delimiter or a quote.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_request(request: &RequestMetric, format: GanderLogFormat) -> String {
    match format {
        GanderLogFormat::Json => json!(request).to_string(),
        GanderLogFormat::Csv => [
            request.elapsed.to_string(),
            request.user.to_string(),
            request.action.to_string(),
            csv_field(&request.name),
            csv_field(&request.identifier),
            request
                .status_code
                .map(|code| code.to_string())
                .unwrap_or_default(),
            request.response_time.to_string(),
            request.bucket.to_string(),
            csv_field(request.error.as_deref().unwrap_or("")),
        ]
        .join(","),
        GanderLogFormat::Raw => format!("{:?}", request),
    }
}

/// Create the request log, failing before the load test starts if it can't be written.
pub(crate) async fn open_request_log(request_log: &str) -> Result<File, GanderError> {
    File::create(request_log).await.map_err(|e| {
        error!("failed to create request_log {}: {}", request_log, e);
        GanderError::Io(e)
    })
}

/// Logger thread, waits for messages from
/// [`VirtualUser`](../user/struct.VirtualUser.html) tasks and writes them to the
/// already opened request log.
pub(crate) async fn logger_main(
    request_log: String,
    file: File,
    format: GanderLogFormat,
    receiver: flume::Receiver<Option<GanderLog>>,
) -> Result<(), GanderError> {
    info!("writing requests to request_log: {}", &request_log);
    let mut request_log_file = BufWriter::with_capacity(64 * 1024, file);

    if format == GanderLogFormat::Csv {
        request_log_file
            .write_all(format!("{}\n", CSV_HEADER).as_ref())
            .await?;
    }

    // Loop waiting for and writing requests from VirtualUser tasks.
    while let Ok(message) = receiver.recv_async().await {
        match message {
            Some(GanderLog::Request(request)) => {
                let formatted = format_request(&request, format);
                if let Err(e) = request_log_file
                    .write_all(format!("{}\n", formatted).as_ref())
                    .await
                {
                    warn!("failed to write to {}: {}", &request_log, e);
                }
            }
            // Empty message means it's time to exit.
            None => break,
        }
    }

    info!("flushing request_log: {}", &request_log);
    request_log_file.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::classify::classify;

    fn request(status_code: Option<u16>) -> RequestMetric {
        RequestMetric {
            elapsed: 1_520,
            user: 3,
            action: Action::Delete,
            name: "DELETE /api/users".to_string(),
            identifier: "write_abc@test.com".to_string(),
            status_code,
            response_time: 12,
            bucket: classify(Action::Delete, status_code),
            error: status_code.map_or(Some("timeout: slow, very slow".to_string()), |_| None),
        }
    }

    #[test]
    fn parse_formats() {
        assert_eq!(GanderLogFormat::from_str("JSON").unwrap(), GanderLogFormat::Json);
        assert_eq!(GanderLogFormat::from_str("csv").unwrap(), GanderLogFormat::Csv);
        assert_eq!(GanderLogFormat::from_str("debug").unwrap(), GanderLogFormat::Raw);
        assert!(GanderLogFormat::from_str("xml").is_err());
    }

    #[test]
    fn formats() {
        let json: serde_json::Value =
            serde_json::from_str(&format_request(&request(Some(200)), GanderLogFormat::Json))
                .unwrap();
        assert_eq!(json["action"], "DELETE");
        assert_eq!(json["bucket"], "DELETE_200");
        assert_eq!(json["status_code"], 200);

        assert_eq!(
            format_request(&request(Some(404)), GanderLogFormat::Csv),
            "1520,3,DELETE,DELETE /api/users,write_abc@test.com,404,12,DELETE_404,"
        );
        assert_eq!(
            format_request(&request(None), GanderLogFormat::Csv),
            "1520,3,DELETE,DELETE /api/users,write_abc@test.com,,12,DELETE_UNEXPECTED,\"timeout: slow, very slow\""
        );
        assert!(format_request(&request(None), GanderLogFormat::Raw).starts_with("RequestMetric"));
    }

    #[tokio::test]
    async fn unwritable_request_log() {
        let path = std::env::temp_dir()
            .join("gander-missing-directory")
            .join("requests.log");
        let result = open_request_log(&path.to_string_lossy()).await;
        assert!(matches!(result, Err(GanderError::Io(_))));
    }

    #[tokio::test]
    async fn writes_requests_until_exit() {
        let path = std::env::temp_dir().join(format!("gander-requests-{}.csv", std::process::id()));
        let path = path.to_string_lossy().to_string();
        let (sender, receiver) = flume::unbounded();
        let file = open_request_log(&path).await.unwrap();
        let logger = tokio::spawn(logger_main(
            path.clone(),
            file,
            GanderLogFormat::Csv,
            receiver,
        ));
        sender.send(Some(GanderLog::Request(request(Some(200))))).unwrap();
        sender.send(Some(GanderLog::Request(request(Some(403))))).unwrap();
        sender.send(None).unwrap();
        logger.await.unwrap().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[2].contains("DELETE_403"));
        std::fs::remove_file(&path).unwrap();
    }
}
