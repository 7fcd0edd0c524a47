use std::path::Path;
use std::sync::Arc;
use tsjest_core::config::{
    CodeItem, CodeList, DiagnosticsOptions, DiagnosticsSetting, HostConfig, TransformOptions,
    TsConfigSource, TsJestOptions,
};
use tsjest_core::diagnostics::{codes, DiagnosticHandler};
use tsjest_core::errors::TransformError;
use tsjest_test_helpers::fixtures;
use tsjest_test_helpers::{
    RecordingFallback, TestProject, CANNOT_FIND_NAME, PROJECT_ROOT, TYPE_NOT_ASSIGNABLE,
};

fn process(
    project: &TestProject,
    relative: &str,
    options: TsJestOptions,
    transform: TransformOptions,
) -> Result<tsjest_core::TransformedSource, TransformError> {
    let source = project.read(relative).unwrap_or_default();
    let host = project.host_config(options);
    project
        .transformer()
        .process(&source, &project.path(relative), &host, &transform)
}

fn ignore(codes: &[u32]) -> TsJestOptions {
    TsJestOptions {
        diagnostics: Some(DiagnosticsSetting::Options(DiagnosticsOptions {
            ignore_codes: Some(CodeList::Many(
                codes.iter().map(|c| CodeItem::Number(*c)).collect(),
            )),
            ..Default::default()
        })),
        ..Default::default()
    }
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn test_type_error_fails_with_code() {
    let project = TestProject::new().file("src/bad.ts", fixtures::type_error_assignment());

    let err = process(&project, "src/bad.ts", TsJestOptions::default(), TransformOptions::default())
        .unwrap_err();

    let TransformError::Compile(err) = err else {
        panic!("expected a compile error, got {err:?}");
    };
    assert!(err.diagnostic_codes().contains(&TYPE_NOT_ASSIGNABLE));
    assert!(err.to_string().contains("TS2322"));
}

#[test]
fn test_plain_diagnostic_format() {
    let project = TestProject::new().file("src/bad.ts", fixtures::type_error_assignment());
    let options = TsJestOptions {
        diagnostics: Some(DiagnosticsSetting::Options(DiagnosticsOptions {
            pretty: Some(false),
            ..Default::default()
        })),
        ..Default::default()
    };

    let err = process(&project, "src/bad.ts", options, TransformOptions::default()).unwrap_err();

    assert!(err.to_string().contains(
        "src/bad.ts(1,7): error TS2322: Type 'number' is not assignable to type 'string'."
    ));
}

#[test]
fn test_ignored_type_error_compiles() {
    let project = TestProject::new().file("src/bad.ts", fixtures::type_error_assignment());

    let output = process(
        &project,
        "src/bad.ts",
        ignore(&[TYPE_NOT_ASSIGNABLE]),
        TransformOptions::default(),
    )
    .unwrap();

    assert!(output.code.contains("const x = 5;"));
    assert!(output.code.contains("exports.default = x;"));
    assert!(!project.diagnostics.has_errors());
}

#[test]
fn test_isolated_modules_skip_type_errors() {
    let project = TestProject::new().file("src/bad.ts", fixtures::type_error_assignment());
    let options = TsJestOptions {
        isolated_modules: true,
        ..Default::default()
    };

    let output = process(&project, "src/bad.ts", options, TransformOptions::default()).unwrap();

    assert!(output.code.contains("const x = 5;"));
    assert_eq!(project.stats().transpiles(), 1);
    assert_eq!(project.stats().emits(), 0);
}

#[test]
fn test_javascript_without_allow_js_passes_through() {
    let project = TestProject::new().file("src/legacy.js", fixtures::plain_javascript());

    let output = process(&project, "src/legacy.js", TsJestOptions::default(), TransformOptions::default())
        .unwrap();

    assert_eq!(output.code, fixtures::plain_javascript());
    assert!(output.map.is_none());
    assert_eq!(project.diagnostics.codes(), vec![codes::JS_FILE_WITHOUT_ALLOW_JS]);
    assert!(project.diagnostics.messages_with_code(codes::JS_FILE_WITHOUT_ALLOW_JS)[0]
        .contains("allowJs"));
    assert_eq!(project.stats().emits(), 0);
}

#[test]
fn test_javascript_with_allow_js_is_compiled() {
    let project = TestProject::new()
        .file("tsconfig.json", r#"{ "compilerOptions": { "allowJs": true } }"#)
        .file("src/legacy.js", "export const answer = 42;\n");

    let output = process(&project, "src/legacy.js", TsJestOptions::default(), TransformOptions::default())
        .unwrap();

    assert!(output.code.contains("exports.answer = answer;"));
    assert!(project.diagnostics.codes().is_empty());
}

#[test]
fn test_declaration_file_yields_empty_output() {
    let project = TestProject::new().file("src/types.d.ts", fixtures::declaration_file());

    let output = process(&project, "src/types.d.ts", TsJestOptions::default(), TransformOptions::default())
        .unwrap();

    assert_eq!(output.code, "");
    assert_eq!(project.stats().emits(), 0);
    assert_eq!(project.stats().transpiles(), 0);
}

#[test]
fn test_esm_output_when_host_supports_it() {
    let source = "import { add } from \"./math\";\nexport const total = add(1, 2);\n";
    let project = TestProject::new()
        .file("tsconfig.json", fixtures::tsconfig_commonjs())
        .file("src/math.ts", fixtures::typed_function())
        .file("src/main.ts", source);
    let esm = TsJestOptions {
        use_esm: true,
        ..Default::default()
    };

    let output = process(&project, "src/main.ts", esm.clone(), TransformOptions::esm()).unwrap();
    assert!(output.code.contains("import { add } from \"./math\";"));
    assert!(output.code.contains("export const total"));
    assert!(!output.code.contains("require("));

    let output = process(&project, "src/main.ts", esm, TransformOptions::default()).unwrap();
    assert!(output.code.contains("require(\"./math\")"));
    assert!(output.code.contains("exports.total = total;"));
    assert!(!output.code.contains("export const"));
}

#[test]
fn test_esm_requires_use_esm_option() {
    let project = TestProject::new().file("src/a.ts", fixtures::simple_module());

    let output =
        process(&project, "src/a.ts", TsJestOptions::default(), TransformOptions::esm()).unwrap();

    assert!(output.code.starts_with("\"use strict\";"));
    assert!(output.code.contains("exports.greeting = greeting;"));
}

// ============================================================================
// Output shape
// ============================================================================

#[test]
fn test_output_has_inline_source_map() {
    let project = TestProject::new().file("src/a.ts", fixtures::simple_module());

    let output =
        process(&project, "src/a.ts", TsJestOptions::default(), TransformOptions::default()).unwrap();

    let last_line = output.code.lines().last().unwrap();
    assert!(last_line.starts_with("//# sourceMappingURL=data:application/json;charset=utf-8;base64,"));
    let map: serde_json::Value = serde_json::from_str(output.map.as_deref().unwrap()).unwrap();
    assert_eq!(map["file"], "/project/src/a.ts");
    assert_eq!(map["sources"][0], "/project/src/a.ts");
}

#[test]
fn test_compiling_twice_is_idempotent() {
    let project = TestProject::new().file("src/a.ts", fixtures::simple_module());
    let host = project.host_config(TsJestOptions::default());
    let transformer = project.transformer();
    let path = project.path("src/a.ts");

    let first = transformer
        .process(fixtures::simple_module(), &path, &host, &TransformOptions::default())
        .unwrap();
    let second = transformer
        .process(fixtures::simple_module(), &path, &host, &TransformOptions::default())
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(project.stats().emits(), 1);
}

#[test]
fn test_changed_content_is_recompiled() {
    let project = TestProject::new();
    let host = project.host_config(TsJestOptions::default());
    let transformer = project.transformer();
    let path = project.path("src/a.ts");

    let first = transformer
        .process("export const a = 1;\n", &path, &host, &TransformOptions::default())
        .unwrap();
    let second = transformer
        .process("export const a = 2;\n", &path, &host, &TransformOptions::default())
        .unwrap();

    assert!(first.code.contains("const a = 1;"));
    assert!(second.code.contains("const a = 2;"));
    assert_eq!(project.stats().emits(), 2);
}

#[test]
fn test_emit_skipped_names_file() {
    let project = TestProject::new().file("src/a.ts", fixtures::simple_module());
    project.typescript.skip_emit(project.path("src/a.ts"));

    let err = process(&project, "src/a.ts", TsJestOptions::default(), TransformOptions::default())
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("/project/src/a.ts"));
    assert!(message.contains("Emit skipped"));
}

// ============================================================================
// Diagnostics policy
// ============================================================================

#[test]
fn test_path_regex_limits_reported_files() {
    let project = TestProject::new().file("src/bad.ts", fixtures::type_error_assignment());
    let options = TsJestOptions {
        diagnostics: Some(DiagnosticsSetting::Options(DiagnosticsOptions {
            path_regex: Some(r"\.spec\.ts$".to_string()),
            ..Default::default()
        })),
        ..Default::default()
    };

    let output = process(&project, "src/bad.ts", options, TransformOptions::default()).unwrap();

    assert!(output.code.contains("const x = 5;"));
    assert_eq!(project.stats().semantic_checks(), 0);
}

#[test]
fn test_warn_only_reports_instead_of_failing() {
    let project = TestProject::new().file("src/bad.ts", fixtures::type_error_assignment());
    let options = TsJestOptions {
        diagnostics: Some(DiagnosticsSetting::Options(DiagnosticsOptions {
            warn_only: true,
            ..Default::default()
        })),
        ..Default::default()
    };

    process(&project, "src/bad.ts", options, TransformOptions::default()).unwrap();

    assert_eq!(project.diagnostics.codes(), vec![TYPE_NOT_ASSIGNABLE]);
    assert_eq!(project.diagnostics.warning_count(), 1);
}

#[test]
fn test_disabled_diagnostics() {
    let project = TestProject::new().file("src/bad.ts", fixtures::syntax_error_missing_brace());
    let options = TsJestOptions {
        diagnostics: Some(DiagnosticsSetting::Toggle(false)),
        ..Default::default()
    };

    process(&project, "src/bad.ts", options, TransformOptions::default()).unwrap();

    assert!(project.diagnostics.codes().is_empty());
}

#[test]
fn test_ignored_code_never_in_error() {
    let source = "const x: string = 5;\nexport function broken() {\n";
    let project = TestProject::new().file("src/bad.ts", source);

    let err = process(
        &project,
        "src/bad.ts",
        ignore(&[TYPE_NOT_ASSIGNABLE]),
        TransformOptions::default(),
    )
    .unwrap_err();

    let TransformError::Compile(err) = err else {
        panic!("expected a compile error");
    };
    assert_eq!(err.diagnostic_codes(), &[1005]);
    assert!(!err.to_string().contains("TS2322"));
}

// ============================================================================
// Stringify, unknown files and the fallback transformer
// ============================================================================

#[test]
fn test_stringify_content() {
    let project = TestProject::new().file("src/view.html", "<p class=\"x\">hi</p>\n");
    let options = TsJestOptions {
        stringify_content_path_regex: Some(r"\.html$".to_string()),
        ..Default::default()
    };

    let output = process(&project, "src/view.html", options, TransformOptions::default()).unwrap();

    assert_eq!(output.code, r#"module.exports="<p class=\"x\">hi</p>\n""#);
    assert!(project.diagnostics.codes().is_empty());
}

#[test]
fn test_unknown_file_type_passes_through() {
    let project = TestProject::new().file("src/App.vue", "<template></template>\n");

    let output = process(&project, "src/App.vue", TsJestOptions::default(), TransformOptions::default())
        .unwrap();

    assert_eq!(output.code, "<template></template>\n");
    assert_eq!(project.diagnostics.codes(), vec![codes::UNKNOWN_FILE_TYPE]);
}

#[test]
fn test_fallback_post_processes_compiled_output() {
    let babel = RecordingFallback::new("babel-jest");
    let project = TestProject::new()
        .file("src/a.ts", fixtures::simple_module())
        .with_fallback(babel.clone());
    let transform = TransformOptions {
        instrument: true,
        ..Default::default()
    };

    let output = process(&project, "src/a.ts", TsJestOptions::default(), transform).unwrap();

    assert!(output.code.starts_with(RecordingFallback::MARKER));
    assert!(output.code.contains("exports.greeting = greeting;"));
    assert_eq!(babel.calls(), vec![(project.path("src/a.ts"), false)]);
}

#[test]
fn test_fallback_receives_unknown_files() {
    let babel = RecordingFallback::new("babel-jest");
    let project = TestProject::new()
        .file("src/App.vue", "<template></template>\n")
        .with_fallback(babel.clone());

    let output = process(&project, "src/App.vue", TsJestOptions::default(), TransformOptions::default())
        .unwrap();

    assert_eq!(
        output.code,
        format!("{}<template></template>\n", RecordingFallback::MARKER)
    );
    assert!(project.diagnostics.messages_with_code(codes::UNKNOWN_FILE_TYPE)[0]
        .contains("`babel-jest`"));
}

#[test]
fn test_fallback_skips_declaration_and_stringified_files() {
    let babel = RecordingFallback::new("babel-jest");
    let project = TestProject::new()
        .file("src/types.d.ts", fixtures::declaration_file())
        .file("src/view.html", "<p></p>")
        .with_fallback(babel.clone());
    let options = TsJestOptions {
        stringify_content_path_regex: Some(r"\.html$".to_string()),
        ..Default::default()
    };

    process(&project, "src/types.d.ts", options.clone(), TransformOptions::default()).unwrap();
    process(&project, "src/view.html", options, TransformOptions::default()).unwrap();

    assert!(babel.calls().is_empty());
}

// ============================================================================
// Configuration reuse
// ============================================================================

#[test]
fn test_config_set_shared_between_live_and_serialized_config() {
    let project = TestProject::new().file("src/a.ts", fixtures::simple_module());
    let transformer = project.transformer();
    let host = project.host_config(TsJestOptions::default());
    let serialized = host.to_canonical_json();

    transformer
        .get_cache_key(
            fixtures::simple_module(),
            &project.path("src/a.ts"),
            &serialized,
            &TransformOptions::default(),
        )
        .unwrap();
    let from_serialized = transformer
        .config_set(&Arc::new(HostConfig::from_json(&serialized).unwrap()))
        .unwrap();
    let from_live = transformer.config_set(&host).unwrap();

    assert!(Arc::ptr_eq(&from_serialized, &from_live));
    assert!(Arc::ptr_eq(&from_live, &transformer.config_set(&host).unwrap()));
}

#[test]
fn test_distinct_configs_get_distinct_sets() {
    let project = TestProject::new();
    let transformer = project.transformer();
    let full = project.host_config(TsJestOptions::default());
    let isolated = project.host_config(TsJestOptions {
        isolated_modules: true,
        ..Default::default()
    });

    let a = transformer.config_set(&full).unwrap();
    let b = transformer.config_set(&isolated).unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(a.cache_key(), b.cache_key());
}

#[test]
fn test_invalid_tsconfig_is_fatal() {
    let project = TestProject::new()
        .file("src/a.ts", fixtures::simple_module())
        .file("tsconfig.json", "{ \"compilerOptions\": ");

    let err = process(&project, "src/a.ts", TsJestOptions::default(), TransformOptions::default())
        .unwrap_err();

    assert!(matches!(err, TransformError::Config(_)));
}

#[test]
fn test_missing_explicit_tsconfig_is_fatal() {
    let project = TestProject::new().file("src/a.ts", fixtures::simple_module());
    let options = TsJestOptions {
        tsconfig: Some(TsConfigSource::Path("<rootDir>/tsconfig.test.json".to_string())),
        ..Default::default()
    };

    let err = process(&project, "src/a.ts", options, TransformOptions::default()).unwrap_err();

    assert!(err.to_string().contains("/project/tsconfig.test.json"));
}

#[test]
fn test_unknown_compiler_is_fatal() {
    let project = TestProject::new().file("src/a.ts", fixtures::simple_module());
    let options = TsJestOptions {
        compiler: Some("ttypescript".to_string()),
        ..Default::default()
    };

    let err = process(&project, "src/a.ts", options, TransformOptions::default()).unwrap_err();

    assert!(err.to_string().contains("ttypescript"));
}

// ============================================================================
// Project files
// ============================================================================

const USES_DEV_GLOBAL: &str = "export const dev = __DEV__;\n";

fn project_with_global(tsconfig: &str) -> TestProject {
    TestProject::new()
        .file("tsconfig.json", tsconfig)
        .file("src/global.d.ts", "declare const __DEV__: boolean;\n")
        .file("src/lib.ts", fixtures::simple_module())
        .file("src/other.test.ts", fixtures::simple_module())
        .file("src/app.test.ts", USES_DEV_GLOBAL)
}

#[test]
fn test_tsconfig_files_are_part_of_the_program() {
    let project = project_with_global(r#"{ "include": ["src"] }"#);

    process(&project, "src/app.test.ts", TsJestOptions::default(), TransformOptions::default())
        .unwrap();

    let program = project.stats().program_files();
    let root = Path::new(PROJECT_ROOT);
    assert!(program.contains(&root.join("src/global.d.ts")));
    assert!(program.contains(&root.join("src/lib.ts")));
    assert!(program.contains(&root.join("src/app.test.ts")));
    assert!(!program.contains(&root.join("src/other.test.ts")));
}

#[test]
fn test_global_declared_in_listed_file_compiles() {
    let project = project_with_global(r#"{ "files": ["src/global.d.ts", "src/lib.ts"] }"#);

    let output = process(&project, "src/app.test.ts", TsJestOptions::default(), TransformOptions::default())
        .unwrap();

    assert!(output.code.contains("const dev = __DEV__;"));
}

#[test]
fn test_global_missing_from_tsconfig_files_fails() {
    let project = project_with_global(r#"{ "files": ["src/lib.ts"] }"#);

    let err = process(&project, "src/app.test.ts", TsJestOptions::default(), TransformOptions::default())
        .unwrap_err();

    let TransformError::Compile(err) = err else {
        panic!("expected a compile error, got {err:?}");
    };
    assert_eq!(err.diagnostic_codes(), &[CANNOT_FIND_NAME]);
}

#[test]
fn test_reading_project_files_keeps_program_version() {
    let project = project_with_global(r#"{ "include": ["src"] }"#);

    process(&project, "src/app.test.ts", TsJestOptions::default(), TransformOptions::default())
        .unwrap();

    // global.d.ts is read during the type check; the import walk after it
    // still sees the same program
    assert_eq!(project.stats().program_builds(), 1);
}
