//! Serde roundtrip and JsonSchema validation tests for persisted types.

use std::collections::BTreeMap;

use chrono::Utc;
use schemars::schema_for;
use verdict_core::entities::*;
use verdict_core::enums::*;
use verdict_core::events::ValidationEvent;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            // Serde roundtrip
            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            assert_eq!(
                recovered,
                val,
                "serde roundtrip failed for {}",
                stringify!($ty)
            );

            // Schema validation
            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

roundtrip_and_validate!(
    record_roundtrip,
    AnalysisRecord,
    AnalysisRecord {
        id: "ana-a3f8b2c1".into(),
        set_id: "set-0011aabb".into(),
        subject_id: "dQw4w9WgXcQ".into(),
        created_at: Utc::now(),
        raw_text: "VIDEO_ANALYSIS_REPORT_START\n...\nVIDEO_ANALYSIS_REPORT_END".into(),
        outcome: RecordOutcome::Accepted,
        quality_score: 85,
        artifact_ref: Some(".verdict/artifacts/dQw4w9WgXcQ/ana-a3f8b2c1.md".into()),
        evaluation_rank: None,
        evaluation_score: None,
        evaluated: false,
        deleted_flag: false,
    }
);

roundtrip_and_validate!(
    record_evaluated_roundtrip,
    AnalysisRecord,
    AnalysisRecord {
        id: "ana-00000002".into(),
        set_id: "set-0011aabb".into(),
        subject_id: "dQw4w9WgXcQ".into(),
        created_at: Utc::now(),
        raw_text: String::new(),
        outcome: RecordOutcome::Degraded,
        quality_score: 40,
        artifact_ref: None,
        evaluation_rank: Some(3),
        evaluation_score: Some(6.5),
        evaluated: true,
        deleted_flag: true,
    }
);

roundtrip_and_validate!(
    set_roundtrip,
    AnalysisSet,
    AnalysisSet {
        id: "set-0011aabb".into(),
        subject_id: "dQw4w9WgXcQ".into(),
        status: SetStatus::Evaluated,
        next_evaluation_due_at: Utc::now(),
        best_record_id: Some("ana-a3f8b2c1".into()),
        evaluation_result: Some(serde_json::json!({"evaluations": []})),
        evaluated_at: Some(Utc::now()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    evaluation_result_roundtrip,
    EvaluationResult,
    EvaluationResult {
        evaluations: vec![CandidateEvaluation {
            analysis_id: "ana-a3f8b2c1".into(),
            scores: BTreeMap::from([("depth".to_string(), 8.0), ("accuracy".to_string(), 9.0)]),
            total_score: 8.5,
            quality_rank: Some(1),
        }],
        declared_best_id: Some("ana-a3f8b2c1".into()),
    }
);

roundtrip_and_validate!(
    validation_event_roundtrip,
    ValidationEvent,
    ValidationEvent::new(
        ValidatorKind::Module,
        1,
        serde_json::json!({"is_valid": true, "quality_score": 90}),
        Utc::now(),
    )
    .with_subject("dQw4w9WgXcQ")
    .with_module(ModuleKind::Personas)
    .with_extra(serde_json::json!({"retry_needed": false}))
);

#[test]
fn candidate_flag_tracks_evaluation_and_deletion() {
    let mut record = AnalysisRecord {
        id: "ana-1".into(),
        set_id: "set-1".into(),
        subject_id: "s".into(),
        created_at: Utc::now(),
        raw_text: String::new(),
        outcome: RecordOutcome::Accepted,
        quality_score: 100,
        artifact_ref: None,
        evaluation_rank: None,
        evaluation_score: None,
        evaluated: false,
        deleted_flag: false,
    };
    assert!(record.is_candidate());
    record.evaluated = true;
    assert!(!record.is_candidate());
}
