//! Execution pipeline integration tests
//!
//! Exercises validate / run / generate_mapping end to end against the mock
//! engine: input contract enforcement, limit pre-checks, truncation,
//! timeouts, artifact resources, and error classification.

use std::sync::Arc;
use std::time::Duration;

use fakesmith::artifacts::{read_artifact, ArtifactContent};
use fakesmith::{
    FakesmithError, Limits, MockBehavior, MockEngine, Pipeline, RecipeInput, RunOptions,
    RunOutcome, TargetNumber, ValidateOptions, WorkspacePaths, TRUNCATION_MARKER,
};
use tempfile::TempDir;

const TWO_ENTITY_RECIPE: &str = "\
- object: Account
  fields:
    Name:
      fake: Company
- object: Contact
  fields:
    AccountId:
      reference: Account
";

fn pipeline_with(limits: Limits) -> (TempDir, Arc<MockEngine>, Pipeline) {
    let tmp = TempDir::new().unwrap();
    let workspace = Arc::new(WorkspacePaths::new(tmp.path()).unwrap());
    let mock = Arc::new(MockEngine::new());
    let pipeline = Pipeline::new(workspace, limits, mock.clone());
    (tmp, mock, pipeline)
}

fn pipeline() -> (TempDir, Arc<MockEngine>, Pipeline) {
    pipeline_with(Limits::testing())
}

fn runs_dir(tmp: &TempDir) -> std::path::PathBuf {
    tmp.path().join(".fakesmith").join("runs")
}

fn run_count(tmp: &TempDir) -> usize {
    match std::fs::read_dir(runs_dir(tmp)) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

// ============================================================================
// INPUT CONTRACT
// ============================================================================

#[tokio::test]
async fn both_recipe_sources_fail_before_any_run_is_allocated() {
    let (tmp, mock, pipeline) = pipeline();
    let input = RecipeInput {
        recipe_path: Some("a.yml".to_string()),
        recipe_text: Some("- object: A\n".to_string()),
    };

    let err = pipeline.run(&input, RunOptions::default()).await.unwrap_err();
    assert!(matches!(err, FakesmithError::RecipeInputExclusive));
    assert_eq!(run_count(&tmp), 0);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn neither_recipe_source_fails_the_same_way() {
    let (tmp, _mock, pipeline) = pipeline();
    let err = pipeline
        .validate(&RecipeInput::default(), ValidateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FakesmithError::RecipeInputExclusive));
    assert_eq!(run_count(&tmp), 0);
}

#[tokio::test]
async fn escaping_recipe_path_is_invalid_input() {
    let (tmp, mock, pipeline) = pipeline();
    let input = RecipeInput::from_path("../../outside.yml");
    let err = pipeline.run(&input, RunOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), "InvalidInput");
    assert_eq!(run_count(&tmp), 0);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn unsupported_format_fails_before_run_allocation() {
    let (tmp, mock, pipeline) = pipeline();
    let opts = RunOptions {
        output_format: "parquet".to_string(),
        ..RunOptions::default()
    };
    let err = pipeline
        .run(&RecipeInput::from_text("- object: A\n"), opts)
        .await
        .unwrap_err();
    assert!(matches!(err, FakesmithError::UnsupportedFormat { .. }));
    assert_eq!(run_count(&tmp), 0);
    assert_eq!(mock.call_count(), 0);
}

// ============================================================================
// LIMIT PRE-CHECKS (engine must never be invoked)
// ============================================================================

#[tokio::test]
async fn reps_over_limit_never_reach_the_engine() {
    let (_tmp, mock, pipeline) = pipeline();
    let opts = RunOptions {
        reps: Some(6), // testing limit is 5
        ..RunOptions::default()
    };
    let err = pipeline
        .run(&RecipeInput::from_text("- object: A\n"), opts)
        .await
        .unwrap_err();
    assert!(matches!(err, FakesmithError::RepsExceedLimit { limit: 5 }));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn target_count_over_limit_never_reaches_the_engine() {
    let (_tmp, mock, pipeline) = pipeline();
    let opts = RunOptions {
        target_number: Some(TargetNumber {
            table: "Account".to_string(),
            count: 51, // testing limit is 50
        }),
        ..RunOptions::default()
    };
    let err = pipeline
        .run(&RecipeInput::from_text("- object: A\n"), opts)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FakesmithError::TargetCountExceedsLimit { limit: 50 }
    ));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn reps_and_target_together_are_rejected() {
    let (_tmp, mock, pipeline) = pipeline();
    let opts = RunOptions {
        reps: Some(1),
        target_number: Some(TargetNumber {
            table: "Account".to_string(),
            count: 1,
        }),
        ..RunOptions::default()
    };
    assert!(matches!(
        pipeline
            .run(&RecipeInput::from_text("- object: A\n"), opts)
            .await,
        Err(FakesmithError::StoppingConflict)
    ));
    assert_eq!(mock.call_count(), 0);
}

// ============================================================================
// SUCCESSFUL RUNS
// ============================================================================

#[tokio::test]
async fn txt_run_captures_output_and_reports_the_artifact() {
    let (_tmp, _mock, pipeline) = pipeline();
    let opts = RunOptions {
        reps: Some(1),
        ..RunOptions::default()
    };
    let outcome = pipeline
        .run(&RecipeInput::from_text("- object: Account\n"), opts)
        .await
        .unwrap();

    let RunOutcome::Ok(success) = outcome else {
        panic!("expected success");
    };
    assert_eq!(success.output_format, "txt");
    assert!(success.stdout_text.contains("Account(id=1)"));
    assert!(!success.stdout_truncated);
    assert_eq!(
        success.resources,
        vec![format!("fakesmith://runs/{}/output.txt", success.run_id)]
    );
    assert!(!success.summary.is_empty());
}

#[tokio::test]
async fn csv_run_yields_a_directory_resource_and_no_capture() {
    let (_tmp, mock, pipeline) = pipeline();
    let opts = RunOptions {
        output_format: "csv".to_string(),
        ..RunOptions::default()
    };
    let outcome = pipeline
        .run(&RecipeInput::from_text("- object: Account\n"), opts)
        .await
        .unwrap();

    let RunOutcome::Ok(success) = outcome else {
        panic!("expected success");
    };
    assert_eq!(success.stdout_text, "");
    assert!(!success.stdout_truncated);
    assert_eq!(
        success.resources,
        vec![format!("fakesmith://runs/{}/csv", success.run_id)]
    );
    // The engine was told not to capture.
    assert!(!mock.last_request().unwrap().capture);
}

#[tokio::test]
async fn continuation_artifact_is_reported_when_requested() {
    let (_tmp, _mock, pipeline) = pipeline();
    let opts = RunOptions {
        generate_continuation: true,
        ..RunOptions::default()
    };
    let outcome = pipeline
        .run(&RecipeInput::from_text("- object: Account\n"), opts)
        .await
        .unwrap();

    let RunOutcome::Ok(success) = outcome else {
        panic!("expected success");
    };
    assert!(success
        .resources
        .iter()
        .any(|r| r.ends_with("/continuation.yml")));
}

#[tokio::test]
async fn recipe_path_input_reads_the_workspace_file() {
    let (tmp, mock, pipeline) = pipeline();
    std::fs::write(tmp.path().join("recipe.yml"), TWO_ENTITY_RECIPE).unwrap();

    let outcome = pipeline
        .run(&RecipeInput::from_path("recipe.yml"), RunOptions::default())
        .await
        .unwrap();
    assert!(outcome.is_ok());
    assert_eq!(mock.last_request().unwrap().recipe_text, TWO_ENTITY_RECIPE);
}

// ============================================================================
// TRUNCATION
// ============================================================================

#[tokio::test]
async fn long_capture_is_truncated_at_the_cap_with_marker() {
    let limits = Limits::testing(); // cap: 200 chars
    let tmp = TempDir::new().unwrap();
    let workspace = Arc::new(WorkspacePaths::new(tmp.path()).unwrap());
    let mock = Arc::new(MockEngine::new().with_default_output("x".repeat(500)));
    let pipeline = Pipeline::new(workspace, limits, mock);

    let outcome = pipeline
        .run(
            &RecipeInput::from_text("- object: A\n"),
            RunOptions::default(),
        )
        .await
        .unwrap();

    let RunOutcome::Ok(success) = outcome else {
        panic!("expected success");
    };
    assert!(success.stdout_truncated);
    assert_eq!(
        success.stdout_text.chars().count(),
        200 + TRUNCATION_MARKER.chars().count()
    );
    assert!(success.stdout_text.ends_with(TRUNCATION_MARKER));
}

#[tokio::test]
async fn short_capture_is_returned_unchanged() {
    let (_tmp, _mock, pipeline) = pipeline();
    let outcome = pipeline
        .run(
            &RecipeInput::from_text("- object: A\n"),
            RunOptions::default(),
        )
        .await
        .unwrap();
    let RunOutcome::Ok(success) = outcome else {
        panic!("expected success");
    };
    assert!(!success.stdout_truncated);
    assert!(!success.stdout_text.contains("truncated"));
}

// ============================================================================
// TIMEOUTS
// ============================================================================

#[tokio::test]
async fn blocked_engine_yields_a_timeout_failure_with_no_resources() {
    let limits = Limits {
        timeout_seconds: 1,
        ..Limits::testing()
    };
    let tmp = TempDir::new().unwrap();
    let workspace = Arc::new(WorkspacePaths::new(tmp.path()).unwrap());
    let mock = Arc::new(MockEngine::with_behaviors(vec![MockBehavior::Block(
        Duration::from_secs(30),
    )]));
    let pipeline = Pipeline::new(workspace, limits, mock);

    let outcome = pipeline
        .run(
            &RecipeInput::from_text("- object: A\n"),
            RunOptions::default(),
        )
        .await
        .unwrap();

    let RunOutcome::Err(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.error.kind, "Timeout");
    assert_eq!(failure.error.message, "Operation exceeded 1s");
    assert!(failure.resources.is_empty());
    assert!(!failure.run_id.is_empty());
}

#[tokio::test]
async fn blocked_validation_downgrades_to_a_structured_result() {
    let limits = Limits {
        timeout_seconds: 1,
        ..Limits::testing()
    };
    let tmp = TempDir::new().unwrap();
    let workspace = Arc::new(WorkspacePaths::new(tmp.path()).unwrap());
    let mock = Arc::new(MockEngine::with_behaviors(vec![MockBehavior::Block(
        Duration::from_secs(30),
    )]));
    let pipeline = Pipeline::new(workspace, limits, mock);

    let result = pipeline
        .validate(
            &RecipeInput::from_text("- object: A\n"),
            ValidateOptions::default(),
        )
        .await
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.errors[0].kind, "Timeout");
}

// ============================================================================
// ERROR CLASSIFICATION
// ============================================================================

#[tokio::test]
async fn undefined_reference_shows_up_as_an_engine_kind() {
    let (_tmp, mock, pipeline) = pipeline();
    mock.queue(MockBehavior::ContentError {
        kind: "DataGenNameError".to_string(),
        message: "Object 'Organization' referenced before definition".to_string(),
        filename: Some("recipe.yml".to_string()),
        line: Some(6),
    });

    let result = pipeline
        .validate(
            &RecipeInput::from_text(TWO_ENTITY_RECIPE),
            ValidateOptions::default(),
        )
        .await
        .unwrap();

    assert!(!result.valid);
    let error = &result.errors[0];
    assert_eq!(error.kind, "DataGenNameError");
    assert!(error.message.contains("Organization"));
    assert_eq!(error.filename.as_deref(), Some("recipe.yml"));
    assert_eq!(error.line, Some(6));
}

#[tokio::test]
async fn engine_content_error_fails_the_run_with_no_resources() {
    let (_tmp, mock, pipeline) = pipeline();
    mock.queue(MockBehavior::ContentError {
        kind: "DataGenSyntaxError".to_string(),
        message: "mapping values are not allowed here".to_string(),
        filename: None,
        line: Some(2),
    });

    let outcome = pipeline
        .run(
            &RecipeInput::from_text("- object: A\n"),
            RunOptions::default(),
        )
        .await
        .unwrap();

    let RunOutcome::Err(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.error.kind, "DataGenSyntaxError");
    assert!(failure.resources.is_empty());
    // A run id is always present, even on failure.
    assert_eq!(failure.run_id.len(), 32);
}

#[tokio::test]
async fn syntax_judgement_is_left_entirely_to_the_engine() {
    // Duplicate mapping keys are rejected by some YAML parsers but accepted
    // by the engine's own; the pipeline must not second-guess the recipe
    // text and must always consult the engine.
    let (_tmp, mock, pipeline) = pipeline();
    let duplicate_keys = "- object: Account\n  fields:\n    Name: a\n    Name: b\n";

    let result = pipeline
        .validate(
            &RecipeInput::from_text(duplicate_keys),
            ValidateOptions::default(),
        )
        .await
        .unwrap();
    assert!(result.valid);
    assert_eq!(mock.call_count(), 1);
    assert_eq!(mock.last_request().unwrap().recipe_text, duplicate_keys);
}

#[tokio::test]
async fn engine_system_conditions_are_downgraded_not_raised() {
    let (_tmp, mock, pipeline) = pipeline();
    mock.queue(MockBehavior::Fail("engine binary vanished".to_string()));

    let result = pipeline
        .validate(
            &RecipeInput::from_text("- object: A\n"),
            ValidateOptions::default(),
        )
        .await
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.errors[0].kind, "EngineUnavailable");
}

// ============================================================================
// MAPPING
// ============================================================================

#[tokio::test]
async fn mapping_preview_carries_the_reference_between_entities() {
    let (_tmp, mock, pipeline) = pipeline();
    let mapping_yaml = "\
Account:\n  sf_object: Account\nContact:\n  sf_object: Contact\n  lookups:\n    AccountId:\n      table: Account\n";
    mock.queue(MockBehavior::Succeed {
        output: mapping_yaml.to_string(),
        summary: "mapping generated".to_string(),
    });

    let outcome = pipeline
        .generate_mapping(&RecipeInput::from_text(TWO_ENTITY_RECIPE), &[])
        .await
        .unwrap();

    let fakesmith::MappingOutcome::Ok(success) = outcome else {
        panic!("expected success");
    };
    assert!(success.mapping_preview.contains("AccountId"));
    assert!(success.mapping_preview.contains("table: Account"));
    assert!(!success.mapping_truncated);
    assert_eq!(
        success.resources,
        vec![format!("fakesmith://runs/{}/mapping.yml", success.run_id)]
    );

    // The mapping run drives exactly one repetition.
    let request = mock.last_request().unwrap();
    assert_eq!(
        request.stopping,
        fakesmith::engine::StoppingCriterion::Reps(1)
    );
    assert!(request.mapping_file.is_some());
}

#[tokio::test]
async fn one_bad_declaration_path_fails_the_whole_mapping_call() {
    let (tmp, mock, pipeline) = pipeline();
    std::fs::write(tmp.path().join("decl.yml"), "Account:\n").unwrap();

    let declarations = vec![
        "decl.yml".to_string(),
        "../../etc/declarations.yml".to_string(),
    ];
    let err = pipeline
        .generate_mapping(&RecipeInput::from_text("- object: A\n"), &declarations)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidInput");
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn empty_mapping_output_is_a_benign_empty_preview() {
    let tmp = TempDir::new().unwrap();
    let workspace = Arc::new(WorkspacePaths::new(tmp.path()).unwrap());
    let mock = Arc::new(MockEngine::new().with_default_output(String::new()));
    let pipeline = Pipeline::new(workspace, Limits::testing(), mock);

    let outcome = pipeline
        .generate_mapping(&RecipeInput::from_text("- object: A\n"), &[])
        .await
        .unwrap();
    let fakesmith::MappingOutcome::Ok(success) = outcome else {
        panic!("expected success");
    };
    assert_eq!(success.mapping_preview, "");
    assert!(!success.mapping_truncated);
}

#[tokio::test]
async fn engine_failure_during_mapping_is_a_structured_failure() {
    let (_tmp, mock, pipeline) = pipeline();
    mock.queue(MockBehavior::ContentError {
        kind: "DataGenError".to_string(),
        message: "plugin not found".to_string(),
        filename: None,
        line: None,
    });

    let outcome = pipeline
        .generate_mapping(&RecipeInput::from_text("- object: A\n"), &[])
        .await
        .unwrap();
    let fakesmith::MappingOutcome::Err(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.error.kind, "DataGenError");
    assert!(failure.resources.is_empty());
}

// ============================================================================
// ARTIFACT READ-BACK
// ============================================================================

#[tokio::test]
async fn csv_run_artifacts_are_listable_as_a_directory() {
    let (_tmp, _mock, pipeline) = pipeline();
    let opts = RunOptions {
        output_format: "csv".to_string(),
        ..RunOptions::default()
    };
    let outcome = pipeline
        .run(&RecipeInput::from_text("- object: Account\n"), opts)
        .await
        .unwrap();
    let RunOutcome::Ok(success) = outcome else {
        panic!("expected success");
    };

    let run_id = fakesmith::RunId::parse(&success.run_id).unwrap();
    let content = read_artifact(pipeline.store(), &run_id, "csv").unwrap();
    assert_eq!(
        content,
        ArtifactContent::Listing(vec!["csv/data.csv".to_string()])
    );
}

#[tokio::test]
async fn txt_artifact_reads_back_the_generated_text() {
    let (_tmp, _mock, pipeline) = pipeline();
    let outcome = pipeline
        .run(
            &RecipeInput::from_text("- object: Account\n"),
            RunOptions::default(),
        )
        .await
        .unwrap();
    let RunOutcome::Ok(success) = outcome else {
        panic!("expected success");
    };

    let run_id = fakesmith::RunId::parse(&success.run_id).unwrap();
    let content = read_artifact(pipeline.store(), &run_id, "output.txt").unwrap();
    assert_eq!(content, ArtifactContent::Text("Account(id=1)\n".to_string()));
}
