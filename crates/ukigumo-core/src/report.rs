//! Result reporting to the collector endpoint.
//!
//! A [`Report`] is sent once per run as an
//! `application/x-www-form-urlencoded` POST. There is no retry: a failed
//! delivery is returned to the caller, who decides whether it is fatal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::error::ReportError;
use crate::obs;
use crate::runner::RunOutcome;
use crate::status::Status;

/// Branch reported when the caller does not know the real one.
pub const DEFAULT_BRANCH: &str = "master";

/// Revision reported for every run.
pub const DEFAULT_REVISION: &str = "1";

/// Repository URL reported when the caller does not know the real one.
pub const PLACEHOLDER_REPO: &str = "http://example.com";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Payload posted to the collector.
///
/// `body` keeps the raw log bytes; commands are free to print non-UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub status: Status,
    pub project: String,
    pub branch: String,
    pub vc_log: String,
    pub body: Vec<u8>,
    pub revision: String,
    pub repo: String,
}

impl Report {
    /// Report for `project` with the default branch, revision and repo.
    pub fn new(status: Status, project: impl Into<String>, log: &[u8]) -> Self {
        Self {
            status,
            project: project.into(),
            branch: DEFAULT_BRANCH.to_string(),
            vc_log: String::new(),
            body: log.to_vec(),
            revision: DEFAULT_REVISION.to_string(),
            repo: PLACEHOLDER_REPO.to_string(),
        }
    }

    pub fn from_outcome(project: impl Into<String>, outcome: &RunOutcome) -> Self {
        Self::new(outcome.status, project, &outcome.log)
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = repo.into();
        self
    }

    /// Form fields in wire order, values as raw bytes.
    pub fn fields(&self) -> [(&'static str, &[u8]); 7] {
        [
            ("status", self.status.code().as_bytes()),
            ("project", self.project.as_bytes()),
            ("branch", self.branch.as_bytes()),
            ("vc_log", self.vc_log.as_bytes()),
            ("body", &self.body),
            ("revision", self.revision.as_bytes()),
            ("repo", self.repo.as_bytes()),
        ]
    }

    /// `application/x-www-form-urlencoded` encoding of [`Report::fields`].
    ///
    /// Values are percent-encoded byte for byte, so a log that is not
    /// valid UTF-8 still decodes to exactly the captured bytes.
    pub fn to_form(&self) -> String {
        let mut form = String::new();
        for (name, value) in self.fields() {
            if !form.is_empty() {
                form.push('&');
            }
            form.extend(form_urlencoded::byte_serialize(name.as_bytes()));
            form.push('=');
            form.extend(form_urlencoded::byte_serialize(value));
        }
        form
    }
}

/// What the collector answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportReceipt {
    pub http_status: u16,
    pub body: String,
}

/// Destination for run reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver one report.
    async fn submit(&self, report: &Report) -> Result<ReportReceipt, ReportError>;
}

/// HTTP client settings for [`HttpReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    /// Deadline for the whole POST, connect included. `None` disables it.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            user_agent: format!("ukigumo/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Posts reports to a collector over HTTP.
pub struct HttpReporter {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpReporter {
    pub fn new(endpoint: &str, config: ReporterConfig) -> Result<Self, ReportError> {
        let url = reqwest::Url::parse(endpoint).map_err(|e| ReportError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ReportError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ReportError::Client(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReportSink for HttpReporter {
    async fn submit(&self, report: &Report) -> Result<ReportReceipt, ReportError> {
        let result = post_form(&self.client, &self.endpoint, report).await;
        match &result {
            Ok(receipt) => obs::emit_report_sent(&self.endpoint, report.status, receipt.http_status),
            Err(e) => obs::emit_report_failed(&self.endpoint, e),
        }
        result
    }
}

async fn post_form(
    client: &reqwest::Client,
    endpoint: &str,
    report: &Report,
) -> Result<ReportReceipt, ReportError> {
    let response = client
        .post(endpoint)
        .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
        .body(report.to_form())
        .send()
        .await?;
    let http_status = response.status();
    let body = response.text().await.unwrap_or_default();

    if !http_status.is_success() {
        return Err(ReportError::Rejected {
            status: http_status.as_u16(),
            body,
        });
    }

    Ok(ReportReceipt {
        http_status: http_status.as_u16(),
        body,
    })
}

/// Send `report` to `endpoint` with a one-off [`HttpReporter`].
pub async fn report(
    endpoint: &str,
    report: &Report,
    config: ReporterConfig,
) -> Result<ReportReceipt, ReportError> {
    HttpReporter::new(endpoint, config)?.submit(report).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_defaults() {
        let report = Report::new(Status::Fail, "demo", b"log output");
        assert_eq!(report.status, Status::Fail);
        assert_eq!(report.project, "demo");
        assert_eq!(report.branch, "master");
        assert_eq!(report.vc_log, "");
        assert_eq!(report.body, b"log output");
        assert_eq!(report.revision, "1");
        assert_eq!(report.repo, "http://example.com");
    }

    #[test]
    fn test_report_overrides() {
        let report = Report::new(Status::Success, "demo", b"")
            .with_branch("topic")
            .with_repo("git://example.org/demo.git");
        assert_eq!(report.branch, "topic");
        assert_eq!(report.repo, "git://example.org/demo.git");
    }

    #[test]
    fn test_report_form_encodes_status_code() {
        let report = Report::new(Status::Timeout, "demo", b"");
        assert_eq!(
            report.to_form(),
            "status=6&project=demo&branch=master&vc_log=&body=&revision=1&repo=http%3A%2F%2Fexample.com"
        );
    }

    #[test]
    fn test_report_form_keeps_raw_log_bytes() {
        let report = Report::new(Status::Fail, "demo", b"caf\xe9 \xff\n");
        let form = report.to_form();
        assert!(form.contains("&body=caf%E9+%FF%0A&"), "{}", form);
    }

    #[test]
    fn test_reporter_rejects_bad_endpoint() {
        let err = HttpReporter::new("not a url", ReporterConfig::default())
            .err()
            .expect("should fail");
        assert!(matches!(err, ReportError::InvalidEndpoint { .. }));

        let err = HttpReporter::new("ftp://example.com/", ReporterConfig::default())
            .err()
            .expect("should fail");
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_reporter_config_default_has_deadline() {
        let config = ReporterConfig::default();
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert!(config.user_agent.starts_with("ukigumo/"));
    }
}
