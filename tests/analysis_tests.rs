//! Whole-project analysis runs: streaming, warnings, failures and cancellation

mod common;

use common::{CountingConstructor, RecordingEngine, memory_fs, workspace, workspace_with};
use lintbridge::analysis::{FileType, RunState};
use lintbridge::tsconfig::MISSING_EXTENDED_TSCONFIG;
use lintbridge::{
    AnalysisRequest, AnalysisService, CanonicalPath, IncrementalResult, InputFile, MemoryFileSystem,
    ProjectAnalysisOrchestrator, RuleConfig, Settings,
};
use std::sync::Arc;

fn ten_file_project() -> MemoryFileSystem {
    let mut fs = memory_fs(&[("/p/tsconfig.json", "{}")]);
    for index in 0..10 {
        fs.insert(format!("/p/src/file{index}.ts").as_str(), "export {};");
    }
    fs
}

fn file_results(messages: &[IncrementalResult]) -> usize {
    messages
        .iter()
        .filter(|m| matches!(m, IncrementalResult::FileResult(_)))
        .count()
}

#[test]
fn unmatched_file_runs_under_a_synthetic_program() {
    let mut ws = workspace(memory_fs(&[("/p/loose/script.ts", "const a = 1;")]));
    let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(RecordingEngine::default()));

    let result = orchestrator
        .analyze(&mut ws, AnalysisRequest::new("/p"), None)
        .unwrap();

    let file = &result.files[0];
    assert!(file.error.is_none());
    let config_path = file.config_path.clone().unwrap();
    assert!(config_path.file_name().unwrap().starts_with("tsconfig-"));

    let handle = ws.cache().get(&config_path).unwrap();
    assert!(handle.is_fallback);
    assert!(!handle.missing_config);
    assert_eq!(handle.files, vec![CanonicalPath::from("/p/loose/script.ts")]);
    assert!(ws.store().get(&config_path).is_none());
}

#[test]
fn missing_extended_package_config_degrades_to_defaults() {
    let mut ws = workspace(memory_fs(&[
        ("/p/tsconfig.json", r#"{ "extends": "@tsconfig/strictest" }"#),
        ("/p/src/index.ts", "export const x = 1;"),
    ]));
    let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(RecordingEngine::default()));
    let mut messages: Vec<IncrementalResult> = Vec::new();

    let result = orchestrator
        .analyze(&mut ws, AnalysisRequest::new("/p"), Some(&mut messages))
        .unwrap();

    let file = &result.files[0];
    assert!(file.error.is_none());
    assert_eq!(file.config_path, Some(CanonicalPath::from("/p/tsconfig.json")));

    let handle = ws.cache().get(&"/p/tsconfig.json".into()).unwrap();
    assert!(handle.missing_config);
    assert_eq!(handle.warnings.len(), 1);
    assert!(handle.warnings[0].contains("/node_modules/@tsconfig/strictest/tsconfig.json"));

    match messages.last() {
        Some(IncrementalResult::Meta { warnings }) => {
            assert!(warnings.contains(&MISSING_EXTENDED_TSCONFIG.to_string()));
            assert!(warnings.contains(&handle.warnings[0]));
        }
        other => panic!("expected a final meta message, got {other:?}"),
    }
}

#[test]
fn cancelling_after_three_results_streams_four_messages() {
    let mut ws = workspace(ten_file_project());
    let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(RecordingEngine::default()));
    let mut messages: Vec<IncrementalResult> = Vec::new();

    let mut sink = |message: IncrementalResult| {
        messages.push(message);
        if file_results(&messages) == 3 {
            orchestrator.cancel();
        }
        true
    };
    let result = orchestrator
        .analyze(&mut ws, AnalysisRequest::new("/p"), Some(&mut sink))
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.files.len(), 3);
    assert_eq!(messages.len(), 4);
    assert_eq!(messages.last(), Some(&IncrementalResult::Cancelled));
    assert!(!messages.iter().any(|m| matches!(m, IncrementalResult::Meta { .. })));
    assert_eq!(orchestrator.state(), RunState::Cancelled);
}

#[test]
fn cancellation_is_terminal_and_single_wherever_it_lands() {
    for cancel_after in 1..=10 {
        let mut ws = workspace(ten_file_project());
        let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(RecordingEngine::default()));
        let mut messages: Vec<IncrementalResult> = Vec::new();

        let mut sink = |message: IncrementalResult| {
            messages.push(message);
            if file_results(&messages) >= cancel_after {
                orchestrator.cancel();
            }
            true
        };
        orchestrator
            .analyze(&mut ws, AnalysisRequest::new("/p"), Some(&mut sink))
            .unwrap();

        let cancelled: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == IncrementalResult::Cancelled)
            .map(|(index, _)| index)
            .collect();
        if cancel_after < 10 {
            assert_eq!(cancelled, vec![messages.len() - 1], "cancel after {cancel_after}");
            assert_eq!(file_results(&messages), cancel_after);
        } else {
            // The last file was already checked; the run completes normally
            assert!(cancelled.is_empty());
            assert!(matches!(messages.last(), Some(IncrementalResult::Meta { .. })));
        }
    }
}

#[test]
fn each_configuration_is_built_once_per_run() {
    let constructor = Arc::new(CountingConstructor::default());
    let mut ws = workspace_with(ten_file_project(), constructor.clone());
    let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(RecordingEngine::default()));

    let result = orchestrator
        .analyze(&mut ws, AnalysisRequest::new("/p"), None)
        .unwrap();

    assert_eq!(result.files.len(), 10);
    assert_eq!(constructor.builds(), 1);
    let ids: Vec<_> = result.files.iter().map(|f| f.program_id.clone().unwrap()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn programs_used_in_a_run_stay_alive_until_it_ends() {
    let mut settings = Settings::default();
    settings.analysis.max_cached_programs = 1;
    let constructor = Arc::new(CountingConstructor::default());
    let mut ws = lintbridge::Workspace::new(
        Arc::new(settings),
        Arc::new(memory_fs(&[
            ("/p/tsconfig.json", r#"{ "include": ["a", "c"] }"#),
            ("/p/b/tsconfig.json", "{}"),
            ("/p/a/one.ts", ""),
            ("/p/b/two.ts", ""),
            ("/p/c/three.ts", ""),
        ])),
        constructor.clone(),
    );
    let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(RecordingEngine::default()));

    orchestrator
        .analyze(&mut ws, AnalysisRequest::new("/p"), None)
        .unwrap();

    assert_eq!(constructor.builds_of("/p/tsconfig.json"), 1);
    assert_eq!(constructor.builds_of("/p/b/tsconfig.json"), 1);
}

#[test]
fn one_failing_file_does_not_stop_the_run() {
    let mut ws = workspace(memory_fs(&[
        ("/p/tsconfig.json", "{}"),
        ("/p/a.ts", ""),
        ("/p/b.ts", "syntax error here"),
        ("/p/c.ts", ""),
    ]));
    let engine = Arc::new(RecordingEngine::failing_on(&["/p/b.ts"]));
    let orchestrator = ProjectAnalysisOrchestrator::new(engine.clone());
    let mut messages: Vec<IncrementalResult> = Vec::new();

    let result = orchestrator
        .analyze(&mut ws, AnalysisRequest::new("/p"), Some(&mut messages))
        .unwrap();

    assert_eq!(engine.checked_count(), 3);
    let errors: Vec<_> = result.files.iter().filter(|f| f.error.is_some()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, CanonicalPath::from("/p/b.ts"));
    assert!(matches!(messages.last(), Some(IncrementalResult::Meta { .. })));
}

#[test]
fn broken_configuration_is_reported_once_and_files_fall_back() {
    let mut ws = workspace(memory_fs(&[
        ("/p/tsconfig.json", r#"{ "compilerOptions": { "notAnOption": true } }"#),
        ("/p/a.ts", ""),
        ("/p/b.ts", ""),
    ]));
    let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(RecordingEngine::default()));

    let result = orchestrator
        .analyze(&mut ws, AnalysisRequest::new("/p"), None)
        .unwrap();

    assert!(result.files.iter().all(|f| f.error.is_none()));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("Unknown compiler option 'notAnOption'."));
}

#[test]
fn missing_base_directory_is_fatal() {
    let mut ws = workspace(memory_fs(&[("/p/a.ts", "")]));
    let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(RecordingEngine::default()));
    let mut messages: Vec<IncrementalResult> = Vec::new();

    let error = orchestrator
        .analyze(&mut ws, AnalysisRequest::new("/elsewhere"), Some(&mut messages))
        .unwrap_err();

    assert_eq!(error.status_code(), "ANALYSIS_ENUMERATION_ERROR");
    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0], IncrementalResult::Error { .. }));
}

#[test]
fn rules_are_filtered_by_file_type() {
    let mut ws = workspace(memory_fs(&[
        ("/p/tsconfig.json", "{}"),
        ("/p/src/app.ts", ""),
        ("/p/src/app.test.ts", ""),
    ]));
    let engine = Arc::new(RecordingEngine::default());
    let orchestrator = ProjectAnalysisOrchestrator::new(engine.clone());

    let mut request = AnalysisRequest::new("/p");
    request.files = Some(vec![
        InputFile::new("/p/src/app.ts"),
        InputFile::new("/p/src/app.test.ts").with_type(FileType::Test),
    ]);
    request.rules = vec![
        RuleConfig::new("no-unused-vars"),
        RuleConfig {
            file_type_targets: vec![FileType::Test],
            ..RuleConfig::new("no-exclusive-tests")
        },
    ];

    let result = orchestrator.analyze(&mut ws, request, None).unwrap();

    let checked = engine.checked.lock();
    let test_file = checked.iter().find(|c| c.path.as_str().ends_with("app.test.ts")).unwrap();
    let main_file = checked.iter().find(|c| c.path.as_str().ends_with("app.ts")).unwrap();
    assert_eq!(test_file.rules, vec!["no-unused-vars", "no-exclusive-tests"]);
    assert_eq!(main_file.rules, vec!["no-unused-vars"]);
    assert!(checked.iter().all(|c| c.had_program));
    assert_eq!(result.files.iter().map(|f| f.issues.len()).sum::<usize>(), 3);
}

#[test]
fn in_memory_requests_never_touch_the_disk() {
    let service = AnalysisService::with_defaults(
        Settings::default(),
        Arc::new(RecordingEngine::default()),
    );
    let mut request = AnalysisRequest::new("/virtual/project");
    request.options.no_fs = true;
    request.files = Some(vec![
        InputFile::new("/virtual/project/tsconfig.json").with_content(r#"{ "include": ["src"] }"#),
        InputFile::new("/virtual/project/src/main.ts").with_content("import { helper } from './helper';"),
        InputFile::new("/virtual/project/src/helper.ts").with_content("export const helper = 1;"),
    ]);

    let result = service.analyze_project(request, None).unwrap();

    assert_eq!(result.files.len(), 2);
    for file in &result.files {
        assert!(file.error.is_none(), "{:?}", file.error);
        assert_eq!(
            file.config_path,
            Some(CanonicalPath::from("/virtual/project/tsconfig.json"))
        );
    }
}

#[test]
fn repeated_in_memory_requests_reuse_programs_until_contents_change() {
    let constructor = Arc::new(CountingConstructor::default());
    let mut ws = workspace_with(MemoryFileSystem::new(), constructor.clone());
    let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(RecordingEngine::default()));
    let request = |main: &str| {
        let mut request = AnalysisRequest::new("/virtual");
        request.options.no_fs = true;
        request.files = Some(vec![
            InputFile::new("/virtual/tsconfig.json").with_content("{}"),
            InputFile::new("/virtual/main.ts").with_content(main),
        ]);
        request
    };

    orchestrator.analyze(&mut ws, request("export {};"), None).unwrap();
    orchestrator.analyze(&mut ws, request("export {};"), None).unwrap();
    assert_eq!(constructor.builds(), 1);

    orchestrator.analyze(&mut ws, request("export const a = 1;"), None).unwrap();
    assert_eq!(constructor.builds(), 2);
}
