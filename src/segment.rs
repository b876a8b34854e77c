//! Segment instructions: the canonical, validated shape of one unit of work.
//!
//! Callers submit segments as untyped JSON records (they typically originate
//! from an outer model's tool call); `SegmentInstruction::from_value` coerces
//! each record before a run executes anything.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{HostId, SegmentId};

/// An instruction for creating one segment of an interactive stream.
///
/// Defines what content a host should produce and how the segment relates to
/// earlier segments in the flow. `use_output_from` lists segment ids whose
/// stored results are prepended to this segment's instruction as context.
/// Only ids that already finished by the time this segment runs resolve;
/// segments run strictly in submitted order and forward references are
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInstruction {
    /// Unique identifier for this segment within the run.
    pub segment_id: SegmentId,
    /// Id of the host that should produce this segment.
    pub host_id: HostId,
    /// Instruction text handed to the host.
    pub instruction: String,
    /// Ids of earlier segments whose results feed this one, in the order
    /// their context should appear.
    #[serde(default)]
    pub use_output_from: Vec<SegmentId>,
}

impl SegmentInstruction {
    /// Coerce a raw caller-supplied record into a validated instruction.
    ///
    /// Missing required fields and wrong value types are errors; unknown
    /// fields are ignored.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_full_record() {
        let record = json!({
            "segment_id": "recap",
            "host_id": "narrator",
            "instruction": "Recap the last episode",
            "use_output_from": ["intro", "interview"],
        });

        let segment = SegmentInstruction::from_value(&record).unwrap();
        assert_eq!(segment.segment_id.as_str(), "recap");
        assert_eq!(segment.host_id.as_str(), "narrator");
        assert_eq!(segment.instruction, "Recap the last episode");
        assert_eq!(
            segment.use_output_from,
            vec![SegmentId::new("intro"), SegmentId::new("interview")]
        );
    }

    #[test]
    fn test_coerce_defaults_use_output_from() {
        let record = json!({
            "segment_id": "intro",
            "host_id": "narrator",
            "instruction": "Open the stream",
        });

        let segment = SegmentInstruction::from_value(&record).unwrap();
        assert!(segment.use_output_from.is_empty());
    }

    #[test]
    fn test_coerce_missing_field_fails() {
        let record = json!({
            "segment_id": "intro",
            "instruction": "Open the stream",
        });

        assert!(SegmentInstruction::from_value(&record).is_err());
    }

    #[test]
    fn test_coerce_wrong_type_fails() {
        let record = json!({
            "segment_id": "intro",
            "host_id": "narrator",
            "instruction": 42,
        });

        assert!(SegmentInstruction::from_value(&record).is_err());
    }

    #[test]
    fn test_coerce_ignores_unknown_fields() {
        let record = json!({
            "segment_id": "intro",
            "host_id": "narrator",
            "instruction": "Open the stream",
            "priority": "high",
        });

        assert!(SegmentInstruction::from_value(&record).is_ok());
    }
}
