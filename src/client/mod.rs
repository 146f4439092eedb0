// Probe client for drift endpoints: send scenario payloads, decode the
// responses, and compare them with the expected severities

pub mod http;
pub mod report;
pub mod scenarios;

pub use http::{decode_response, ClientError, DriftClient, ProbeOutcome};
pub use report::{run_scenarios, CalibrationSummary, ProbeReport, ScenarioResult};
pub use scenarios::{builtin_scenarios, find_scenario, Expectation, Scenario};
