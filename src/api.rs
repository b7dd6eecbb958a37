//! JSON Boundary
//!
//! Stateless entry points for a transport layer: parse a request payload,
//! forward it to the analyzer and return the response body. Nothing here
//! keeps state between calls.

use crate::analyzer::{Analysis, Analyzer, Edge, InputFormatError};
use crate::bankers::{self, BankersError, SafetyRequest, SafetyStatus};
use crate::graph::CycleEdge;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request field holding the edge list.
pub const EDGE_LIST_FIELD: &str = "resource_allocation";

/// Response body of a detection request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub deadlock_detected: bool,
    pub cycle: Vec<CycleEdge>,
}

impl From<Analysis> for DetectionResponse {
    fn from(analysis: Analysis) -> Self {
        Self {
            deadlock_detected: analysis.deadlock_detected,
            cycle: analysis.cycle,
        }
    }
}

/// Client-visible error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Extracts the edge list from a detection request payload.
pub fn parse_detection_request(payload: &Value) -> Result<Vec<Edge>, InputFormatError> {
    let object = payload.as_object().ok_or(InputFormatError::NotAnObject)?;
    let edges = object
        .get(EDGE_LIST_FIELD)
        .ok_or(InputFormatError::MissingField(EDGE_LIST_FIELD))?;
    let items = edges.as_array().ok_or(InputFormatError::NotAList)?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            Edge::deserialize(item).map_err(|e| InputFormatError::MalformedEdge {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Handles a detection request, returning the narrowed response.
pub fn detect_deadlock(
    analyzer: &Analyzer,
    payload: &Value,
) -> Result<DetectionResponse, InputFormatError> {
    detect_deadlock_detailed(analyzer, payload).map(DetectionResponse::from)
}

/// Handles a detection request, keeping the evaluated conditions.
pub fn detect_deadlock_detailed(
    analyzer: &Analyzer,
    payload: &Value,
) -> Result<Analysis, InputFormatError> {
    let edges = parse_detection_request(payload).map_err(|e| analyzer.reject(e))?;
    analyzer.analyze_checked(&edges)
}

/// Handles a detection request from a raw JSON body.
pub fn detect_deadlock_str(
    analyzer: &Analyzer,
    body: &str,
) -> Result<DetectionResponse, InputFormatError> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|e| analyzer.reject(InputFormatError::InvalidJson(e.to_string())))?;
    detect_deadlock(analyzer, &payload)
}

/// Handles a Banker's safety request.
pub fn check_safety(analyzer: &Analyzer, payload: &Value) -> Result<SafetyStatus, BankersError> {
    let request = SafetyRequest::deserialize(payload)
        .map_err(|e| BankersError::InvalidRequest(e.to_string()))?;
    let status = bankers::check_safety(&request)?;

    if let Some(metrics) = analyzer.metrics() {
        metrics.record_safety_check(&status);
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_edge_list() {
        let edges =
            parse_detection_request(&json!({ "resource_allocation": [["P1", "R1"], ["R1", "P2"]] }))
                .unwrap();
        assert_eq!(edges, vec![Edge::new("P1", "R1"), Edge::new("R1", "P2")]);
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert_eq!(
            parse_detection_request(&json!([["P1", "R1"]])),
            Err(InputFormatError::NotAnObject)
        );
        assert_eq!(
            parse_detection_request(&json!({})),
            Err(InputFormatError::MissingField(EDGE_LIST_FIELD))
        );
        assert_eq!(
            parse_detection_request(&json!({ "resource_allocation": "P1,R1" })),
            Err(InputFormatError::NotAList)
        );
    }

    #[test]
    fn test_parse_reports_malformed_edge_index() {
        for bad in [json!(["P1"]), json!(["P1", "R1", "P2"]), json!(["P1", 7]), json!("P1")] {
            let payload = json!({ "resource_allocation": [["P1", "R1"], bad] });
            match parse_detection_request(&payload) {
                Err(InputFormatError::MalformedEdge { index, .. }) => assert_eq!(index, 1),
                other => panic!("expected malformed edge, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_response_narrows_analysis() {
        let analyzer = Analyzer::default();
        let response = detect_deadlock(
            &analyzer,
            &json!({ "resource_allocation": [["P1", "R1"], ["R1", "P1"]] }),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "deadlock_detected": true,
                "cycle": [["P1", "R1", "forward"], ["R1", "P1", "forward"]]
            })
        );
    }

    #[test]
    fn test_invalid_json_body() {
        let analyzer = Analyzer::default();
        assert!(matches!(
            detect_deadlock_str(&analyzer, "{ not json"),
            Err(InputFormatError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_error_response_body() {
        let body = ErrorResponse::from_error(&InputFormatError::NotAList);
        assert_eq!(
            body.error,
            "Edge list must be a list of [source, target] pairs"
        );
    }

    #[test]
    fn test_check_safety_parses_request() {
        let analyzer = Analyzer::default();
        let status = check_safety(
            &analyzer,
            &json!({
                "available": [3, 3, 2],
                "max": [[7, 5, 3], [3, 2, 2], [9, 0, 2]],
                "allocation": [[0, 1, 0], [2, 0, 0], [3, 0, 2]],
                "request": [1, 0, 2],
                "process": 1
            }),
        )
        .unwrap();
        assert_eq!(status, SafetyStatus::Unsafe { sequence: vec![1] });

        assert!(matches!(
            check_safety(&analyzer, &json!({ "available": [1] })),
            Err(BankersError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_check_safety_rejects_overflowing_units() {
        let analyzer = Analyzer::default();
        let result = check_safety(
            &analyzer,
            &json!({
                "available": [u64::MAX],
                "max": [[1]],
                "allocation": [[1]],
                "request": [0],
                "process": 0
            }),
        );

        assert_eq!(
            result,
            Err(BankersError::Overflow {
                process: 0,
                resource: 0
            })
        );
    }
}
