//! Semantic checks on BenchmarkJob that the CRD schema cannot express.
//!
//! Four checks run in a fixed order and the first failure wins:
//! endpoint exclusivity, traffic scenario grammar, additional request
//! parameters, and the output storage URI.

use std::collections::BTreeMap;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::crd::{
    BenchmarkJob, BenchmarkJobSpec, BenchmarkTask, EndpointError, EndpointSpec, EndpointTarget,
    StorageSpec,
};
use crate::storage::{StorageUriError, validate_storage_uri};

/// Temperatures above this are accepted but logged.
pub const TEMPERATURE_WARN_THRESHOLD: f64 = 1.5;

const TEXT_TO_TEXT_SCENARIO: &str = r"^(?:N\([0-9]+,[0-9]+\)/\([0-9]+,[0-9]+\)|U\([0-9]+,[0-9]+\)(?:/\([0-9]+,[0-9]+\))?|D\([0-9]+,[0-9]+\))$";
const TEXT_TO_EMBEDDINGS_SCENARIO: &str = r"^E\([0-9]+,[0-9]+\)$";
const IMAGE_SCENARIO: &str = r"^I\([0-9]+,[0-9]+(?:,[0-9]+)?\)$";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("invalid traffic scenarios: {0}")]
    TrafficScenarios(#[from] ScenarioError),

    #[error("invalid additional request parameters: {0}")]
    AdditionalRequestParams(#[from] RequestParamError),

    #[error("invalid storage: {0}")]
    Storage(#[from] OutputStorageError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    /// Only reachable when the job lists no scenarios and the task has no defaults.
    #[error("no validation pattern defined for task: {0}")]
    UnknownTask(String),

    #[error("failed to validate scenario '{scenario}': {source}")]
    Scenario {
        scenario: String,
        #[source]
        source: ScenarioFormatError,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioFormatError {
    #[error("no validation pattern defined for task: {0}")]
    UnknownTask(String),

    #[error("invalid scenario format for task '{task}': {scenario}")]
    Mismatch { task: String, scenario: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestParamError {
    #[error("invalid temperature: {0}")]
    Temperature(#[from] FloatError),

    #[error("ignore_eos must be 'true' or 'false'")]
    IgnoreEos,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FloatError {
    #[error("parsing {0:?}: invalid syntax")]
    Syntax(String),

    #[error("parsing {0:?}: value out of range")]
    Range(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum OutputStorageError {
    #[error("storageUri cannot be empty")]
    MissingUri,

    #[error("error parsing storage URI: {0}")]
    Uri(#[from] StorageUriError),
}

/// Compiled scenario grammar per task, built once and shared read-only.
#[derive(Debug, Clone)]
pub struct ScenarioGrammar {
    patterns: BTreeMap<BenchmarkTask, Regex>,
}

impl ScenarioGrammar {
    pub fn new() -> Result<Self, regex::Error> {
        let mut patterns = BTreeMap::new();
        for task in BenchmarkTask::ALL {
            let pattern = match task {
                BenchmarkTask::TextToText => TEXT_TO_TEXT_SCENARIO,
                BenchmarkTask::TextToEmbeddings => TEXT_TO_EMBEDDINGS_SCENARIO,
                BenchmarkTask::ImageToText | BenchmarkTask::ImageToEmbeddings => IMAGE_SCENARIO,
            };
            patterns.insert(task, Regex::new(pattern)?);
        }
        Ok(Self { patterns })
    }

    pub fn pattern(&self, task: BenchmarkTask) -> Option<&Regex> {
        self.patterns.get(&task)
    }

    /// Full-string match of `scenario` against the grammar for `task`.
    pub fn check(&self, task: &str, scenario: &str) -> Result<(), ScenarioFormatError> {
        let pattern = task
            .parse::<BenchmarkTask>()
            .ok()
            .and_then(|task| self.pattern(task))
            .ok_or_else(|| ScenarioFormatError::UnknownTask(task.to_string()))?;

        if pattern.is_match(scenario) {
            Ok(())
        } else {
            Err(ScenarioFormatError::Mismatch {
                task: task.to_string(),
                scenario: scenario.to_string(),
            })
        }
    }
}

/// Stateless validator for BenchmarkJob admission.
#[derive(Debug, Clone)]
pub struct BenchmarkJobValidator {
    grammar: ScenarioGrammar,
}

impl BenchmarkJobValidator {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            grammar: ScenarioGrammar::new()?,
        })
    }

    pub fn validate(&self, job: &BenchmarkJob) -> Result<(), ValidationError> {
        self.validate_spec(&job.spec)
    }

    pub fn validate_spec(&self, spec: &BenchmarkJobSpec) -> Result<(), ValidationError> {
        let target_kind = match validate_endpoint(&spec.endpoint)? {
            EndpointTarget::InferenceService(_) => "inferenceService",
            EndpointTarget::Direct(_) => "endpoint",
        };
        debug!(target_kind, task = %spec.task, "endpoint resolved");

        self.validate_traffic_scenarios(&spec.task, &spec.traffic_scenarios)?;
        validate_additional_request_params(&spec.additional_request_params)?;
        validate_output_location(spec.output_location.as_ref())?;
        Ok(())
    }

    /// Checks every scenario, or the task defaults when none are listed.
    /// The defaults are never written back to the object.
    pub fn validate_traffic_scenarios(
        &self,
        task: &str,
        scenarios: &[String],
    ) -> Result<(), ScenarioError> {
        if scenarios.is_empty() {
            let defaults = task
                .parse::<BenchmarkTask>()
                .map_err(|_| ScenarioError::UnknownTask(task.to_string()))?
                .default_scenarios();
            return self.check_all(task, defaults.iter().copied());
        }
        self.check_all(task, scenarios.iter().map(String::as_str))
    }

    fn check_all<'a>(
        &self,
        task: &str,
        scenarios: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), ScenarioError> {
        for scenario in scenarios {
            self.grammar
                .check(task, scenario)
                .map_err(|source| ScenarioError::Scenario {
                    scenario: scenario.to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}

pub fn validate_endpoint(endpoint: &EndpointSpec) -> Result<EndpointTarget<'_>, EndpointError> {
    endpoint.target()
}

/// Only `temperature` and `ignore_eos` are inspected; other keys pass through.
pub fn validate_additional_request_params(
    params: &BTreeMap<String, String>,
) -> Result<(), RequestParamError> {
    for (key, value) in params {
        match key.as_str() {
            "temperature" => {
                let temperature = parse_float(value)?;
                if temperature > TEMPERATURE_WARN_THRESHOLD {
                    warn!(temperature, "temperature is too high");
                }
            }
            "ignore_eos" => {
                if value != "true" && value != "false" {
                    return Err(RequestParamError::IgnoreEos);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

pub fn validate_output_location(storage: Option<&StorageSpec>) -> Result<(), OutputStorageError> {
    let Some(storage) = storage else {
        return Ok(());
    };
    let uri = storage
        .storage_uri
        .as_deref()
        .ok_or(OutputStorageError::MissingUri)?;
    let storage_type = validate_storage_uri(uri)?;
    debug!(%storage_type, "output location accepted");
    Ok(())
}

/// Decimal or `0x` hexadecimal float. Magnitudes beyond `f64` are an error
/// unless spelled as an infinity literal.
fn parse_float(value: &str) -> Result<f64, FloatError> {
    let parsed = if is_hex_literal(value) {
        parse_hex_float(value)
    } else {
        value.parse::<f64>().ok()
    }
    .ok_or_else(|| FloatError::Syntax(value.to_string()))?;

    if parsed.is_infinite() && !is_infinity_literal(value) {
        return Err(FloatError::Range(value.to_string()));
    }
    Ok(parsed)
}

fn unsigned(value: &str) -> (bool, &str) {
    match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    }
}

fn is_hex_literal(value: &str) -> bool {
    let (_, digits) = unsigned(value);
    digits.starts_with("0x") || digits.starts_with("0X")
}

fn is_infinity_literal(value: &str) -> bool {
    let (_, word) = unsigned(value);
    word.eq_ignore_ascii_case("inf") || word.eq_ignore_ascii_case("infinity")
}

/// `0x` mantissa with a mandatory binary exponent, e.g. `0x1.8p1`.
fn parse_hex_float(value: &str) -> Option<f64> {
    let (negative, digits) = unsigned(value);
    let body = digits.get(2..)?;
    let (mantissa, exponent) = body.split_once(['p', 'P'])?;
    let exponent: i32 = exponent.parse().ok()?;

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut significand = 0f64;
    for c in int_part.chars().chain(frac_part.chars()) {
        significand = significand * 16.0 + f64::from(c.to_digit(16)?);
    }

    let frac_bits = i32::try_from(frac_part.len()).ok()?.checked_mul(4)?;
    let scale = exponent.checked_sub(frac_bits)?;
    let magnitude = if significand == 0.0 {
        0.0
    } else {
        significand * 2f64.powi(scale)
    };
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Endpoint, InferenceServiceReference};

    fn validator() -> BenchmarkJobValidator {
        BenchmarkJobValidator::new().unwrap()
    }

    fn url_endpoint() -> EndpointSpec {
        EndpointSpec {
            inference_service: None,
            endpoint: Some(Endpoint {
                url: "https://api.openai.com/v1/chat/completions".into(),
                api_format: "openai".into(),
                model_name: "gpt-4o".into(),
            }),
        }
    }

    fn spec(task: &str, scenarios: &[&str]) -> BenchmarkJobSpec {
        BenchmarkJobSpec {
            task: task.into(),
            endpoint: url_endpoint(),
            traffic_scenarios: scenarios.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn text_to_text_grammar() {
        let grammar = ScenarioGrammar::new().unwrap();
        for ok in [
            "N(480,240)/(300,150)",
            "U(10,20)",
            "U(10,20)/(5,5)",
            "D(100,1000)",
        ] {
            assert_eq!(grammar.check("text-to-text", ok), Ok(()), "{ok}");
        }
        for bad in [
            "N(480,240)",
            "D(100,100)/(1,1)",
            "D(1,2)x",
            "xD(1,2)",
            "N(1,2)/(3,4)D(1,2)",
            "D( 1,2)",
            "D(1,2)\n",
            "D(١,2)",
            "E(1,2)",
            "",
        ] {
            assert!(grammar.check("text-to-text", bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn image_and_embedding_grammars() {
        let grammar = ScenarioGrammar::new().unwrap();
        for task in ["image-to-text", "image-to-embeddings"] {
            assert_eq!(grammar.check(task, "I(512,512)"), Ok(()));
            assert_eq!(grammar.check(task, "I(512,512,4)"), Ok(()));
            assert!(grammar.check(task, "I(512)").is_err());
            assert!(grammar.check(task, "I(1,2,3,4)").is_err());
        }
        assert_eq!(grammar.check("text-to-embeddings", "E(64,128)"), Ok(()));
        assert!(grammar.check("text-to-embeddings", "E(64)").is_err());
    }

    // Fails for text-to-embeddings: its defaults are `E(n)` while the
    // grammar requires `E(n,m)`. Keep failing until the two are reconciled.
    #[test]
    fn default_scenarios_match_their_grammar() {
        let grammar = ScenarioGrammar::new().unwrap();
        for task in BenchmarkTask::ALL {
            for scenario in task.default_scenarios() {
                assert_eq!(grammar.check(task.as_str(), scenario), Ok(()), "{task}: {scenario}");
            }
        }
    }

    #[test]
    fn unknown_task_is_named() {
        let v = validator();
        let err = v
            .validate_traffic_scenarios("audio-to-text", &["D(1,1)".into()])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to validate scenario 'D(1,1)': no validation pattern defined for task: audio-to-text"
        );

        let err = v.validate_traffic_scenarios("audio-to-text", &[]).unwrap_err();
        assert_eq!(err, ScenarioError::UnknownTask("audio-to-text".into()));
    }

    #[test]
    fn first_bad_scenario_is_reported() {
        let err = validator()
            .validate_spec(&spec("text-to-text", &["D(1,1)", "bad-1", "bad-2"]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid traffic scenarios: failed to validate scenario 'bad-1': invalid scenario format for task 'text-to-text': bad-1"
        );
    }

    #[test]
    fn endpoint_must_be_exactly_one() {
        let v = validator();

        let mut none = spec("text-to-text", &[]);
        none.endpoint = EndpointSpec::default();
        assert_eq!(
            v.validate_spec(&none).unwrap_err().to_string(),
            "invalid endpoint: endpoint or InferenceService must be specified"
        );

        let mut both = spec("text-to-text", &[]);
        both.endpoint.inference_service = Some(InferenceServiceReference {
            name: "svc".into(),
            namespace: "default".into(),
        });
        assert_eq!(
            v.validate_spec(&both).unwrap_err().to_string(),
            "invalid endpoint: endpoint and InferenceService cannot be specified together"
        );

        let mut isvc_only = both.clone();
        isvc_only.endpoint.endpoint = None;
        assert!(v.validate_spec(&isvc_only).is_ok());
    }

    #[test]
    fn endpoint_failure_masks_later_failures() {
        let mut job = spec("text-to-text", &["invalid-format"]);
        job.endpoint = EndpointSpec::default();
        job.additional_request_params = params(&[("temperature", "hot")]);
        job.output_location = Some(StorageSpec::default());

        let err = validator().validate_spec(&job).unwrap_err();
        assert!(matches!(err, ValidationError::Endpoint(EndpointError::Missing)));
    }

    #[test]
    fn params_failure_masks_storage_failure() {
        let mut job = spec("text-to-text", &[]);
        job.additional_request_params = params(&[("ignore_eos", "yes")]);
        job.output_location = Some(StorageSpec::default());

        let err = validator().validate_spec(&job).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid additional request parameters: ignore_eos must be 'true' or 'false'"
        );
    }

    #[test]
    fn temperature_must_parse_but_may_be_high() {
        assert!(validate_additional_request_params(&params(&[("temperature", "0.7")])).is_ok());
        assert!(validate_additional_request_params(&params(&[("temperature", "2.0")])).is_ok());
        assert!(matches!(
            validate_additional_request_params(&params(&[("temperature", "invalid")])),
            Err(RequestParamError::Temperature(_))
        ));
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        for value in ["1e400", "-1e400", "0x1p2000"] {
            assert_eq!(
                validate_additional_request_params(&params(&[("temperature", value)])),
                Err(RequestParamError::Temperature(FloatError::Range(value.into()))),
                "{value}"
            );
        }

        let err = validate_additional_request_params(&params(&[("temperature", "1e400")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"invalid temperature: parsing "1e400": value out of range"#
        );
    }

    #[test]
    fn temperature_accepts_float_literals() {
        assert_eq!(parse_float("0x1p-2"), Ok(0.25));
        assert_eq!(parse_float("-0X1.8p1"), Ok(-3.0));
        assert_eq!(parse_float("0x0p5000"), Ok(0.0));
        assert_eq!(parse_float("1e-400"), Ok(0.0));
        assert_eq!(parse_float(".5"), Ok(0.5));
        assert_eq!(parse_float("+Inf"), Ok(f64::INFINITY));
        assert_eq!(parse_float("-infinity"), Ok(f64::NEG_INFINITY));
        assert!(parse_float("NaN").unwrap().is_nan());

        for bad in ["0x1", "0xp1", "0x1.g p1", "1e", "", "0x1p"] {
            assert_eq!(parse_float(bad), Err(FloatError::Syntax(bad.into())), "{bad:?}");
        }
    }

    #[test]
    fn ignore_eos_is_case_sensitive() {
        assert!(validate_additional_request_params(&params(&[("ignore_eos", "true")])).is_ok());
        assert!(validate_additional_request_params(&params(&[("ignore_eos", "false")])).is_ok());
        assert_eq!(
            validate_additional_request_params(&params(&[("ignore_eos", "True")])),
            Err(RequestParamError::IgnoreEos)
        );
    }

    #[test]
    fn unrecognized_params_pass_through() {
        let p = params(&[("max_tokens", "not-a-number"), ("top_p", "")]);
        assert!(validate_additional_request_params(&p).is_ok());
    }

    #[test]
    fn output_location_rules() {
        assert_eq!(validate_output_location(None), Ok(()));
        assert_eq!(
            validate_output_location(Some(&StorageSpec::default())),
            Err(OutputStorageError::MissingUri)
        );

        let with_uri = |uri: &str| StorageSpec {
            storage_uri: Some(uri.into()),
            ..Default::default()
        };
        assert_eq!(
            validate_output_location(Some(&with_uri("oci://n/ns/b/bucket/o/path/to/object"))),
            Ok(())
        );
        assert_eq!(
            validate_output_location(Some(&with_uri(""))),
            Err(OutputStorageError::Uri(StorageUriError::UnknownType(String::new())))
        );

        let err = validate_output_location(Some(&with_uri("oci://mynamespace/b/mybucket/o/object")))
            .unwrap_err();
        assert!(err.to_string().starts_with("error parsing storage URI: invalid OCI storage URI format"));
    }

    #[test]
    fn verdict_is_idempotent() {
        let v = validator();
        let mut job = spec("text-to-text", &["D(1,1)", "nope"]);
        job.additional_request_params = params(&[("temperature", "x"), ("ignore_eos", "maybe")]);

        let first = v.validate_spec(&job).unwrap_err().to_string();
        let second = v.validate_spec(&job).unwrap_err().to_string();
        assert_eq!(first, second);

        job.traffic_scenarios.clear();
        let first = v.validate_spec(&job).unwrap_err().to_string();
        let second = v.validate_spec(&job).unwrap_err().to_string();
        assert_eq!(first, second);
        assert_eq!(
            first,
            "invalid additional request parameters: ignore_eos must be 'true' or 'false'"
        );
    }
}
