use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

/// One attendance submission.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSubmission {
    pub student_id: String,
    pub course_id: String,
    /// Date in YYYY-MM-DD form.
    pub date: String,
    /// One of "present", "absent", "late", "excused".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
}

/// Service response to a record submission.
#[derive(Debug, Deserialize)]
pub struct RecordOutcome {
    pub message: String,
    pub record_id: String,
    pub duplicate: bool,
}

/// One circuit breaker's published state.
#[derive(Debug, Deserialize)]
pub struct CircuitInfo {
    pub name: String,
    pub state: String,
    pub failure_count: u32,
    pub success_count: u32,
}

pub struct AttendanceClient {
    client: Client,
    base_url: String,
}

impl AttendanceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Record one attendance event. Resubmitting the same event succeeds
    /// with `duplicate = true`.
    pub async fn record(
        &self,
        submission: RecordSubmission,
    ) -> Result<RecordOutcome, Box<dyn std::error::Error>> {
        let resp = self
            .client
            .post(format!("{}/api/attendance", self.base_url))
            .json(&submission)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(format!("attendance service returned status {}: {}", status, text).into());
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch the state of every circuit breaker.
    pub async fn circuit_breakers(&self) -> Result<Vec<CircuitInfo>, Box<dyn std::error::Error>> {
        let resp = self
            .client
            .get(format!("{}/api/attendance/circuit-breakers", self.base_url))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(format!("attendance service returned status {}: {}", status, text).into());
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Perform a plain GET against the service.
    pub async fn get(&self, path: &str) -> Result<Response, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
    }
}
