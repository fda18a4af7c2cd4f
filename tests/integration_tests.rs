//! End-to-end tests: source text through tokenization, parsing and semantic
//! analysis, using only the public API.

use std::rc::Rc;

use tracec::{
    ast::{
        ast::Program,
        types::{MapKey, SizedType},
    },
    config::AnalyserConfig,
    errors::errors::PassError,
    lexer::lexer::tokenize,
    log::{DiagnosticCollector, LogType},
    parser::parser::parse,
    pass_manager::{create_semantic_pass, PassContext, PassManager},
    providers::{PermissiveSymbols, StaticFeatures},
    semantic_analyser::SemanticAnalyser,
};

fn parse_program(source: &str) -> Program {
    let tokens = tokenize(source.to_string(), Some("test.bt".to_string())).unwrap();
    let (_, program) = parse(tokens, Rc::new("test.bt".to_string()));
    program.unwrap()
}

/// Analyses `source` with every feature available and returns the errors,
/// the passes taken and the collected diagnostics.
fn check(source: &str) -> (usize, usize, DiagnosticCollector) {
    let mut program = parse_program(source);
    let mut sink = DiagnosticCollector::new();
    let features = StaticFeatures::all();

    let mut analyser = SemanticAnalyser::new(
        &mut sink,
        &features,
        &PermissiveSymbols,
        AnalyserConfig::default(),
    );
    let errors = analyser.analyse(&mut program);
    let passes = analyser.num_passes();
    drop(analyser);

    (errors, passes, sink)
}

#[test]
fn test_simple_program_takes_two_passes() {
    let (errors, passes, sink) =
        check("kprobe:do_nanosleep { @start[tid] = nsecs; } BEGIN { $x = 1; printf(\"%d\\n\", $x); }");

    assert_eq!(errors, 0, "{:?}", sink.errors());
    assert_eq!(passes, 2);
}

#[test]
fn test_map_value_mismatch_names_both_sites() {
    let (errors, _, sink) = check("BEGIN { @x = 1; } END { @x = \"hello\"; }");

    assert_eq!(errors, 1);
    assert!(sink.contains(LogType::Error, "Type mismatch for @x"));
    assert!(sink.contains(LogType::Hint, "first used here"));
}

#[test]
fn test_duplicate_declaration() {
    let (errors, _, sink) = check("BEGIN { let $a; if (1) { let $a = 2; } }");

    assert!(errors > 0);
    assert!(sink.contains(LogType::Error, "Variable $a was already declared"));
    assert!(sink.contains(LogType::Hint, "$a was first declared here"));
}

#[test]
fn test_map_key_widening_is_idempotent() {
    let mut program = parse_program("BEGIN { @m[\"abc\"] = 1; @m[\"abcdefghi\"] = 2; }");
    let mut sink = DiagnosticCollector::new();
    let features = StaticFeatures::all();
    let mut analyser = SemanticAnalyser::new(
        &mut sink,
        &features,
        &PermissiveSymbols,
        AnalyserConfig::default(),
    );

    assert_eq!(analyser.analyse(&mut program), 0);
    let first = analyser.maps().get_map_key_type("@m").cloned();
    assert_eq!(first, Some(MapKey::new(vec![SizedType::string(10)])));

    assert_eq!(analyser.analyse(&mut program), 0);
    assert_eq!(analyser.maps().get_map_key_type("@m").cloned(), first);
}

#[test]
fn test_for_loop_capture_before_assignment() {
    let (errors, _, sink) =
        check("BEGIN { @m[1] = 1; for ($kv : @m) { @n = $y; } $y = 2; }");
    assert!(errors > 0);
    assert!(sink.contains(
        LogType::Error,
        "Loop body captures variable $y before its type is known"
    ));

    let (errors, _, sink) =
        check("BEGIN { @m[1] = 1; $y = 2; for ($kv : @m) { @n = $y; } }");
    assert_eq!(errors, 0, "{:?}", sink.errors());
}

#[test]
fn test_for_loop_names_reused_after_loop() {
    let (errors, _, sink) =
        check("BEGIN { @m[1] = 1; for ($kv : @m) { $t = 1; print($t); } $t = 2; }");
    assert_eq!(errors, 0, "{:?}", sink.errors());

    let (errors, _, sink) =
        check("BEGIN { @m[1] = 1; for ($kv : @m) { print($kv.0); } $kv = 2; }");
    assert_eq!(errors, 0, "{:?}", sink.errors());
}

#[test]
fn test_map_used_in_later_probe() {
    let (errors, _, sink) = check("BEGIN { @x = 1; } END { print(@x); }");
    assert_eq!(errors, 0, "{:?}", sink.errors());
}

#[test]
fn test_string_values_unify_across_probes() {
    let mut program = parse_program("BEGIN { @x = \"a\"; } BEGIN { @x = \"longer\"; }");
    let mut sink = DiagnosticCollector::new();
    let features = StaticFeatures::all();
    let mut analyser = SemanticAnalyser::new(
        &mut sink,
        &features,
        &PermissiveSymbols,
        AnalyserConfig::default(),
    );

    assert_eq!(analyser.analyse(&mut program), 0);
    assert_eq!(
        analyser.maps().get_map_type("@x"),
        Some(&SizedType::string(7))
    );
}

#[test]
fn test_literal_argument_required() {
    let (errors, _, sink) = check("BEGIN { $b = 2; @h = hist(5, $b); }");

    assert!(errors > 0);
    assert!(sink.contains(
        LogType::Error,
        "hist() expects an integer literal for argument 2"
    ));
}

#[test]
fn test_forward_reference_resolves() {
    let (errors, passes, sink) = check("BEGIN { @a = @b; } END { @b = 1; }");

    assert_eq!(errors, 0, "{:?}", sink.errors());
    assert_eq!(passes, 3);
}

#[test]
fn test_warnings_reported_once() {
    let (errors, _, sink) = check("BEGIN { $a = (uint32)1; $b = -1; if ($a < $b) { } }");

    assert_eq!(errors, 0, "{:?}", sink.errors());
    assert_eq!(sink.count(LogType::Warning), 1);
}

#[test]
fn test_pass_manager_runs_semantic_stage() {
    let features = StaticFeatures::all();
    let config = AnalyserConfig::default();
    let mut manager = PassManager::new();
    manager.add_pass(create_semantic_pass());

    let mut program = parse_program("BEGIN { @x = 1; }");
    let mut sink = DiagnosticCollector::new();
    let mut ctx = PassContext {
        program: &mut program,
        sink: &mut sink,
        features: &features,
        symbols: &PermissiveSymbols,
        config: &config,
    };
    assert_eq!(manager.run(&mut ctx), Ok(()));

    let mut program = parse_program("BEGIN { @x = 1; @x = \"a\"; }");
    let mut sink = DiagnosticCollector::new();
    let mut ctx = PassContext {
        program: &mut program,
        sink: &mut sink,
        features: &features,
        symbols: &PermissiveSymbols,
        config: &config,
    };
    assert!(matches!(
        manager.run(&mut ctx),
        Err(PassError::Failed { pass: "Semantic", .. })
    ));
}
