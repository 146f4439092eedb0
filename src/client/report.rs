// Expected-vs-actual probe report and threshold calibration

use super::http::{ClientResult, DriftClient, ProbeOutcome};
use super::scenarios::{Expectation, Scenario};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub expected: Expectation,
    pub actual: Option<String>,
    pub score: Option<f64>,
    pub nihss: Option<u8>,
    pub status: Option<u16>,
    pub passed: bool,
    pub error: Option<String>,
    /// Counted towards threshold calibration
    pub calibrates: bool,
}

impl ScenarioResult {
    pub fn from_outcome(scenario: &Scenario, outcome: &ProbeOutcome) -> Self {
        let actual = outcome.body.severity.clone();
        let passed = match scenario.expected {
            Expectation::Severity(severity) => {
                outcome.is_success() && actual.as_deref() == Some(severity.to_string())
            }
            Expectation::Failure => !outcome.is_success(),
        };

        Self {
            name: scenario.name.to_string(),
            expected: scenario.expected,
            actual,
            score: outcome.body.effective_score(),
            nihss: outcome.body.effective_nihss(),
            status: Some(outcome.status),
            passed,
            error: outcome.body.error.clone(),
            calibrates: scenario.calibrates(),
        }
    }

    /// The request never produced a decodable response
    pub fn from_failure(scenario: &Scenario, error: String) -> Self {
        Self {
            name: scenario.name.to_string(),
            expected: scenario.expected,
            actual: None,
            score: None,
            nihss: None,
            status: None,
            passed: false,
            error: Some(error),
            calibrates: scenario.calibrates(),
        }
    }

    fn calibration_score(&self) -> Option<f64> {
        if !self.calibrates || self.error.is_some() {
            return None;
        }
        self.score
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalibrationSummary {
    pub samples: usize,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub mean_score: Option<f64>,
    pub median_score: Option<f64>,
    /// Share of scenarios that passed, 0-100
    pub accuracy_percent: f64,
    /// Highest score among scenarios expected to be normal
    pub suggested_threshold: Option<f64>,
    /// Lowest score among scenarios expected to drift
    pub alternative_threshold: Option<f64>,
}

impl CalibrationSummary {
    pub fn from_results(results: &[ScenarioResult]) -> Self {
        let mut scores: Vec<f64> = results.iter().filter_map(|r| r.calibration_score()).collect();
        scores.sort_by(f64::total_cmp);

        let passed = results.iter().filter(|r| r.passed).count();
        let accuracy_percent = if results.is_empty() {
            0.0
        } else {
            passed as f64 / results.len() as f64 * 100.0
        };

        let scores_expecting = |drift: bool| {
            results
                .iter()
                .filter(move |r| r.expected.expects_drift() == Some(drift))
                .filter_map(|r| r.calibration_score())
        };

        Self {
            samples: scores.len(),
            min_score: scores.first().copied(),
            max_score: scores.last().copied(),
            mean_score: (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64),
            median_score: median(&scores),
            accuracy_percent,
            suggested_threshold: scores_expecting(false).reduce(f64::max),
            alternative_threshold: scores_expecting(true).reduce(f64::min),
        }
    }
}

/// Median of sorted values
fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub endpoint: String,
    pub results: Vec<ScenarioResult>,
    pub calibration: CalibrationSummary,
}

impl ProbeReport {
    pub fn new(endpoint: impl Into<String>, results: Vec<ScenarioResult>) -> Self {
        let calibration = CalibrationSummary::from_results(&results);
        Self {
            endpoint: endpoint.into(),
            results,
            calibration,
        }
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.results.len()
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v))
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Endpoint: {}", self.endpoint)?;
        writeln!(
            f,
            "{:<18} {:<10} {:<10} {:>8} {:>6} {:>6}  {}",
            "scenario", "expected", "actual", "score", "nihss", "status", "result"
        )?;
        for r in &self.results {
            writeln!(
                f,
                "{:<18} {:<10} {:<10} {:>8} {:>6} {:>6}  {}",
                r.name,
                r.expected.label(),
                r.actual.as_deref().unwrap_or("-"),
                fmt_opt(r.score),
                r.nihss.map_or_else(|| "-".to_string(), |n| n.to_string()),
                r.status.map_or_else(|| "-".to_string(), |s| s.to_string()),
                if r.passed { "PASS" } else { "FAIL" }
            )?;
            if let Some(error) = r.error.as_deref().filter(|_| !r.passed) {
                writeln!(f, "{:<18} error: {}", "", error)?;
            }
        }

        let c = &self.calibration;
        writeln!(f)?;
        writeln!(f, "Passed {}/{} ({:.1}%)", self.passed(), self.results.len(), c.accuracy_percent)?;
        writeln!(
            f,
            "Scores over {} samples: min {} max {} mean {} median {}",
            c.samples,
            fmt_opt(c.min_score),
            fmt_opt(c.max_score),
            fmt_opt(c.mean_score),
            fmt_opt(c.median_score)
        )?;
        writeln!(f, "Suggested normal threshold: {}", fmt_opt(c.suggested_threshold))?;
        write!(f, "Alternative (lowest drift score): {}", fmt_opt(c.alternative_threshold))
    }
}

/// Send every scenario in order and collect the report
pub async fn run_scenarios(client: &DriftClient, scenarios: &[Scenario]) -> ProbeReport {
    let mut results = Vec::with_capacity(scenarios.len());

    for scenario in scenarios {
        let result: ClientResult<ProbeOutcome> = client.analyze(&scenario.request).await;
        let result = match result {
            Ok(outcome) => ScenarioResult::from_outcome(scenario, &outcome),
            Err(e) => {
                warn!(scenario = scenario.name, error = %e, "Probe request failed");
                ScenarioResult::from_failure(scenario, e.to_string())
            }
        };
        info!(
            scenario = scenario.name,
            expected = scenario.expected.label(),
            actual = result.actual.as_deref().unwrap_or("-"),
            passed = result.passed,
            "Scenario finished"
        );
        results.push(result);
    }

    ProbeReport::new(client.endpoint(), results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::http::decode_response;
    use crate::client::scenarios::builtin_scenarios;
    use crate::handler::{handle_event, DriftService};
    use crate::models::assessment::Severity;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn result(expected: Expectation, score: f64, passed: bool) -> ScenarioResult {
        ScenarioResult {
            name: "x".to_string(),
            expected,
            actual: None,
            score: Some(score),
            nihss: None,
            status: Some(200),
            passed,
            error: None,
            calibrates: true,
        }
    }

    #[test]
    fn test_calibration_summary() {
        let results = vec![
            result(Expectation::Severity(Severity::Normal), 0.05, true),
            result(Expectation::Severity(Severity::Normal), 0.12, false),
            result(Expectation::Severity(Severity::Mild), 0.24, true),
            result(Expectation::Severity(Severity::Severe), 0.60, true),
        ];
        let summary = CalibrationSummary::from_results(&results);

        assert_eq!(summary.samples, 4);
        assert_eq!(summary.min_score, Some(0.05));
        assert_eq!(summary.max_score, Some(0.60));
        assert!((summary.median_score.unwrap() - 0.18).abs() < 1e-12);
        assert!((summary.mean_score.unwrap() - 0.2525).abs() < 1e-12);
        assert_eq!(summary.accuracy_percent, 75.0);
        assert_eq!(summary.suggested_threshold, Some(0.12));
        assert_eq!(summary.alternative_threshold, Some(0.24));
    }

    #[test]
    fn test_empty_calibration() {
        let summary = CalibrationSummary::from_results(&[]);
        assert_eq!(summary, CalibrationSummary::default());
    }

    #[test]
    fn test_results_against_local_handler() {
        let service = DriftService::default();
        let results: Vec<ScenarioResult> = builtin_scenarios()
            .iter()
            .map(|scenario| {
                let event = serde_json::to_value(&scenario.request).unwrap();
                let envelope = handle_event(&event, &service);
                let text = serde_json::to_string(&envelope).unwrap();
                let outcome = decode_response(200, &text).unwrap();
                ScenarioResult::from_outcome(scenario, &outcome)
            })
            .collect();

        let report = ProbeReport::new("local", results);
        assert!(report.all_passed(), "{}", report);
        // The forced result and the failure are left out of calibration
        assert_eq!(report.calibration.samples, 6);
        assert_eq!(report.calibration.accuracy_percent, 100.0);
        assert!(report.to_string().contains("missing_keypoint"));
    }

    #[tokio::test]
    async fn test_run_scenarios_against_wrong_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"severity": "normal"})))
            .mount(&server)
            .await;

        let client = DriftClient::new(server.uri(), 5).unwrap();
        let report = run_scenarios(&client, &builtin_scenarios()).await;

        assert_eq!(report.results.len(), 8);
        let steady = report.results.iter().find(|r| r.name == "steady").unwrap();
        assert!(steady.passed);
        let missing = report.results.iter().find(|r| r.name == "missing_keypoint").unwrap();
        assert!(!missing.passed);
        assert!(!report.all_passed());
    }
}
