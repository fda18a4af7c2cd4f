//! Unit tests for the semantic analyser module.

use std::rc::Rc;

use super::{
    calls::{format_specifiers, lookup_call, single_provider_type, ArgKind},
    maps::{MapRegistry, MapTypeError},
    scopes::{Declaration, ScopeError, ScopeTable, Variable},
    semantic_analyser::SemanticAnalyser,
};
use crate::{
    ast::{
        ast::{AttachPoint, ProbeType, Program},
        expressions::{ExprKind, Expression},
        statements::StmtKind,
        types::{MapKey, Record, SizedType, StackMode, Type},
    },
    config::AnalyserConfig,
    lexer::lexer::tokenize,
    log::{DiagnosticCollector, LogType},
    parser::parser::parse,
    providers::{PermissiveSymbols, StaticFeatures, StaticSymbols, SymbolProvider},
    Position, Span,
};

fn span_at(offset: u32) -> Span {
    let file = Rc::new(String::from("test.bt"));
    Span::new(Position(offset, Rc::clone(&file)), Position(offset + 1, file))
}

fn decl(node: u32, offset: u32) -> Declaration {
    Declaration {
        node,
        span: span_at(offset),
    }
}

fn parse_source(source: &str) -> Program {
    let tokens = tokenize(source.to_string(), Some("test.bt".to_string())).unwrap();
    let (_, result) = parse(tokens, Rc::new("test.bt".to_string()));
    result.unwrap()
}

struct Outcome {
    program: Program,
    sink: DiagnosticCollector,
    errors: usize,
    passes: usize,
}

fn analyse_with(
    source: &str,
    config: AnalyserConfig,
    features: &StaticFeatures,
    symbols: &dyn SymbolProvider,
) -> Outcome {
    let mut program = parse_source(source);
    let mut sink = DiagnosticCollector::new();

    let (errors, passes) = {
        let mut analyser = SemanticAnalyser::new(&mut sink, features, symbols, config);
        let errors = analyser.analyse(&mut program);
        (errors, analyser.num_passes())
    };

    Outcome {
        program,
        sink,
        errors,
        passes,
    }
}

fn analyse(source: &str) -> Outcome {
    analyse_with(
        source,
        AnalyserConfig::default(),
        &StaticFeatures::all(),
        &PermissiveSymbols,
    )
}

fn assert_ok(source: &str) -> Outcome {
    let outcome = analyse(source);
    assert_eq!(
        outcome.errors,
        0,
        "unexpected errors for {:?}: {:?}",
        source,
        outcome.sink.errors()
    );
    outcome
}

fn assert_error(source: &str, needle: &str) -> Outcome {
    let outcome = analyse(source);
    assert!(outcome.errors > 0, "expected an error for {:?}", source);
    assert!(
        outcome.sink.contains(LogType::Error, needle),
        "no error containing {:?} for {:?}: {:?}",
        needle,
        source,
        outcome.sink.errors()
    );
    outcome
}

/// Type written to the value of the `n`th statement of the first probe.
fn stmt_type(program: &Program, n: usize) -> SizedType {
    match &program.probes[0].block.stmts[n].kind {
        StmtKind::Expr(expr) => expr.ty.clone(),
        StmtKind::AssignMap { expr, .. } | StmtKind::AssignVar { expr, .. } => expr.ty.clone(),
        other => panic!("statement has no value: {:?}", other),
    }
}

// Scope table

#[test]
fn test_scope_lookup_walks_outwards() {
    let mut scopes = ScopeTable::new();
    scopes.push(1);
    scopes
        .declare("$x", Variable::new(SizedType::int64(), true, true), decl(1, 0))
        .unwrap();

    scopes.push(2);
    assert_eq!(scopes.find("$x").unwrap().ty, SizedType::int64());
    assert_eq!(scopes.find_scope("$x"), Some(1));
    assert_eq!(scopes.depth(), 2);

    scopes.pop();
    scopes.pop();
    assert!(scopes.find("$x").is_none());
    assert!(scopes.get(1, "$x").is_some());
}

#[test]
fn test_scope_redeclaration() {
    let mut scopes = ScopeTable::new();
    scopes.push(1);
    scopes.declare("$x", Variable::implicit(), decl(10, 4)).unwrap();

    // same declaring node on a later pass
    assert!(scopes.declare("$x", Variable::implicit(), decl(10, 4)).is_ok());

    scopes.push(2);
    match scopes.declare("$x", Variable::implicit(), decl(11, 20)) {
        Err(ScopeError::Redeclared { name, first }) => {
            assert_eq!(name, "$x");
            assert_eq!(first, span_at(4));
        }
        other => panic!("expected a redeclaration error, got {:?}", other),
    }
}

#[test]
fn test_scope_declare_without_scope() {
    let mut scopes = ScopeTable::new();
    assert!(matches!(
        scopes.declare("$x", Variable::implicit(), decl(1, 0)),
        Err(ScopeError::Undefined { .. })
    ));
}

#[test]
fn test_scope_assign_keeps_integer_width() {
    let mut scopes = ScopeTable::new();
    scopes.push(1);
    scopes
        .declare("$x", Variable::new(SizedType::int(32, true), false, false), decl(1, 0))
        .unwrap();

    let ty = scopes.assign("$x", &SizedType::uint64()).unwrap();
    assert_eq!(ty, SizedType::int(32, true));
    assert!(scopes.find("$x").unwrap().was_assigned);
}

#[test]
fn test_scope_assign_grows_strings() {
    let mut scopes = ScopeTable::new();
    scopes.push(1);
    scopes.declare("$s", Variable::implicit(), decl(1, 0)).unwrap();

    assert_eq!(scopes.assign("$s", &SizedType::string(4)).unwrap(), SizedType::string(4));
    assert_eq!(scopes.assign("$s", &SizedType::string(10)).unwrap(), SizedType::string(10));
    assert_eq!(scopes.assign("$s", &SizedType::string(2)).unwrap(), SizedType::string(10));
}

#[test]
fn test_scope_assign_non_resizable() {
    let mut scopes = ScopeTable::new();
    scopes.push(1);
    scopes.declare("$s", Variable::implicit(), decl(1, 0)).unwrap();
    scopes.assign("$s", &SizedType::string(4)).unwrap();
    scopes.mark_non_resizable("$s");

    assert!(matches!(
        scopes.assign("$s", &SizedType::string(10)),
        Err(ScopeError::SizeMismatch { .. })
    ));
    assert!(scopes.assign("$s", &SizedType::string(3)).is_ok());
}

#[test]
fn test_scope_assign_type_mismatch() {
    let mut scopes = ScopeTable::new();
    scopes.push(1);
    scopes.declare("$x", Variable::implicit(), decl(1, 0)).unwrap();
    scopes.assign("$x", &SizedType::int64()).unwrap();

    let error = scopes.assign("$x", &SizedType::string(3)).unwrap_err();
    assert!(matches!(error, ScopeError::TypeMismatch { .. }));
    assert!(error.to_string().contains("Type mismatch for $x"));
}

#[test]
fn test_scope_reset_assignments() {
    let mut scopes = ScopeTable::new();
    scopes.push(1);
    scopes.declare("$x", Variable::implicit(), decl(1, 0)).unwrap();
    scopes.assign("$x", &SizedType::int64()).unwrap();

    scopes.reset_assignments();

    let variable = scopes.find("$x").unwrap();
    assert!(!variable.was_assigned);
    assert_eq!(variable.ty, SizedType::int64());
}

// Map registry

#[test]
fn test_map_value_widens() {
    let mut maps = MapRegistry::new();
    maps.assign_map_type("@s", &SizedType::string(2), &span_at(0)).unwrap();
    let ty = maps.assign_map_type("@s", &SizedType::string(7), &span_at(9)).unwrap();

    assert_eq!(ty, SizedType::string(7));
    assert_eq!(maps.get_map_type("@s"), Some(&SizedType::string(7)));
}

#[test]
fn test_map_value_mismatch_names_first_site() {
    let mut maps = MapRegistry::new();
    maps.assign_map_type("@x", &SizedType::int64(), &span_at(3)).unwrap();

    let error = maps
        .assign_map_type("@x", &SizedType::string(4), &span_at(30))
        .unwrap_err();

    assert_eq!(error.first_site(), Some(&span_at(3)));
    assert!(error.to_string().contains("Type mismatch for @x"));
}

#[test]
fn test_create_key_type_widens_integers() {
    let key = MapRegistry::create_key_type(&[SizedType::int(32, false), SizedType::string(3)]);
    assert_eq!(key.args, vec![SizedType::uint64(), SizedType::string(3)]);
}

#[test]
fn test_map_key_widening_is_monotonic() {
    let mut maps = MapRegistry::new();
    let short = MapKey::new(vec![SizedType::string(4)]);
    let long = MapKey::new(vec![SizedType::string(10)]);

    maps.assign_key("@m", &short, &span_at(0)).unwrap();
    maps.assign_key("@m", &long, &span_at(5)).unwrap();
    let key = maps.assign_key("@m", &short, &span_at(9)).unwrap();

    assert_eq!(key, long);
}

#[test]
fn test_map_key_arity_mismatch() {
    let mut maps = MapRegistry::new();
    maps.assign_key("@m", &MapKey::new(vec![SizedType::int64()]), &span_at(0))
        .unwrap();

    let error = maps
        .assign_key(
            "@m",
            &MapKey::new(vec![SizedType::int64(), SizedType::int64()]),
            &span_at(8),
        )
        .unwrap_err();
    assert!(matches!(error, MapTypeError::KeyMismatch { .. }));
}

#[test]
fn test_validate_map_key() {
    assert!(MapRegistry::validate_map_key("@m", &MapKey::new(vec![SizedType::int64()])).is_ok());
    assert!(MapRegistry::validate_map_key("@m", &MapKey::new(vec![SizedType::count()])).is_err());
    assert!(MapRegistry::validate_map_key("@m", &MapKey::new(vec![SizedType::none()])).is_err());
}

// Call table

#[test]
fn test_call_table() {
    let hist = lookup_call("hist").unwrap();
    assert!(hist.map_only);
    assert_eq!((hist.min_args, hist.max_args), (1, 2));

    let signal = lookup_call("signal").unwrap();
    assert!(signal.is_unsafe);
    assert_eq!(signal.helper, Some("send_signal"));

    assert!(lookup_call("nope").is_none());
}

#[test]
fn test_format_specifiers() {
    assert_eq!(format_specifiers("%d %s %%"), vec!['d', 's']);
    assert_eq!(format_specifiers("%-10lld|%5.2s|%lu"), vec!['d', 's', 'u']);
    assert!(format_specifiers("no specifiers").is_empty());
}

#[test]
fn test_single_provider_type() {
    let program = parse_source("kprobe:a, kprobe:b { } kprobe:a, uprobe:/bin/sh:f { }");
    assert_eq!(single_provider_type(&program.probes[0]), ProbeType::Kprobe);
    assert_eq!(single_provider_type(&program.probes[1]), ProbeType::Invalid);
}

// Driver

#[test]
fn test_two_passes_without_forward_references() {
    let outcome = assert_ok("BEGIN { @x = 1; $y = @x + 2; }");
    assert_eq!(outcome.passes, 2);
}

#[test]
fn test_forward_reference_takes_an_extra_pass() {
    let outcome = assert_ok("BEGIN { @y = @x; } END { @x = 1; }");
    assert_eq!(outcome.passes, 3);
}

#[test]
fn test_undefined_map_is_reported_in_final_pass() {
    let outcome = assert_error("BEGIN { @y = @x; }", "Undefined map: @x");
    assert!(outcome
        .sink
        .contains(LogType::Error, "Unable to resolve all types"));
}

#[test]
fn test_rerun_is_identical() {
    let mut program = parse_source("BEGIN { @m[\"ab\"] = 1; @m[\"abcdef\"] = 2; }");
    let features = StaticFeatures::all();
    let mut sink = DiagnosticCollector::new();
    let mut analyser = SemanticAnalyser::new(
        &mut sink,
        &features,
        &PermissiveSymbols,
        AnalyserConfig::default(),
    );

    assert_eq!(analyser.analyse(&mut program), 0);
    let first = analyser.maps().get_map_key_type("@m").cloned();
    assert_eq!(analyser.analyse(&mut program), 0);

    assert_eq!(analyser.maps().get_map_key_type("@m").cloned(), first);
    assert_eq!(first, Some(MapKey::new(vec![SizedType::string(7)])));
    assert_eq!(analyser.num_passes(), 2);
}

// Expressions

#[test]
fn test_literal_types() {
    let outcome = assert_ok("BEGIN { $a = 1; $b = 18446744073709551615; $c = \"abc\"; }");
    assert_eq!(stmt_type(&outcome.program, 0), SizedType::int64());
    assert_eq!(stmt_type(&outcome.program, 1), SizedType::uint64());
    assert_eq!(stmt_type(&outcome.program, 2), SizedType::string(4));
}

#[test]
fn test_string_too_long() {
    let outcome = analyse_with(
        "BEGIN { $a = \"abcdefgh\"; }",
        AnalyserConfig::default().with_max_strlen(4),
        &StaticFeatures::all(),
        &PermissiveSymbols,
    );
    assert!(outcome.sink.contains(LogType::Error, "String is too long"));
}

#[test]
fn test_config_block_overrides_max_strlen() {
    let outcome = analyse("config = { max_strlen = 4 } BEGIN { $a = \"abcdefgh\"; }");
    assert!(outcome.sink.contains(LogType::Error, "over 4 bytes"));
}

#[test]
fn test_unrecognized_config_variable() {
    assert_error("config = { nope = 1 } BEGIN { }", "Unrecognized config variable");
}

#[test]
fn test_integer_promotion() {
    let outcome = assert_ok("BEGIN { $a = (int32)1; $b = (uint8)2; $c = $a + $b; $d = $a == $b; }");
    assert_eq!(stmt_type(&outcome.program, 2), SizedType::int(32, false));
    assert_eq!(stmt_type(&outcome.program, 3), SizedType::uint64());
}

#[test]
fn test_divide_by_zero() {
    assert_error("BEGIN { $a = 1 / 0; }", "Divide or modulo by 0");
}

#[test]
fn test_string_comparison() {
    assert_ok("BEGIN { $a = \"x\" == \"y\"; }");
    assert_error("BEGIN { $a = \"x\" < \"y\"; }", "can not be used on expressions of type");
}

#[test]
fn test_type_mismatch_in_binop() {
    assert_error("BEGIN { $a = 1 + \"x\"; }", "Type mismatch for '+'");
}

#[test]
fn test_sign_mismatch_warns_once() {
    let outcome = assert_ok("BEGIN { @x = @y; $a = 1; if ($a < pid) { } } END { @y = 1; }");
    assert_eq!(outcome.passes, 3);
    assert_eq!(outcome.sink.count(LogType::Warning), 1);
    assert!(outcome
        .sink
        .contains(LogType::Warning, "comparison of integers of different signs"));
}

#[test]
fn test_increment_establishes_int64() {
    let outcome = assert_ok("BEGIN { @c++; $x = @c; }");
    assert_eq!(stmt_type(&outcome.program, 1), SizedType::int64());
}

#[test]
fn test_increment_requires_map_or_variable() {
    assert_error("BEGIN { $a = 1++; }", "must be applied to a map or variable");
}

#[test]
fn test_positional_parameters() {
    let outcome = analyse_with(
        "BEGIN { $a = $1; $b = $2; $c = $#; }",
        AnalyserConfig::default().with_params(vec!["10".to_string(), "bash".to_string()]),
        &StaticFeatures::all(),
        &PermissiveSymbols,
    );
    assert_eq!(outcome.errors, 0);
    assert_eq!(stmt_type(&outcome.program, 0), SizedType::int64());
    assert_eq!(stmt_type(&outcome.program, 1), SizedType::string(5));
    assert_eq!(stmt_type(&outcome.program, 2), SizedType::int64());
}

#[test]
fn test_unused_positional_parameters_warn() {
    let outcome = analyse_with(
        "BEGIN { }",
        AnalyserConfig::default().with_params(vec!["10".to_string()]),
        &StaticFeatures::all(),
        &PermissiveSymbols,
    );
    assert_eq!(outcome.errors, 0);
    assert!(outcome
        .sink
        .contains(LogType::Warning, "Positional parameters were given"));
}

#[test]
fn test_dollar_zero_is_invalid() {
    assert_error("BEGIN { $a = $0; }", "$0 is not a valid parameter");
}

#[test]
fn test_tuple_field_access() {
    let outcome = assert_ok("BEGIN { $t = (1, \"ab\"); $s = $t.1; }");
    assert_eq!(
        stmt_type(&outcome.program, 0),
        SizedType::tuple(vec![SizedType::int64(), SizedType::string(3)])
    );
    assert_eq!(stmt_type(&outcome.program, 1), SizedType::string(3));
}

#[test]
fn test_struct_field_access() {
    let symbols = StaticSymbols::new().with_struct(Record::from_fields(
        "task",
        vec![("pid", SizedType::int(32, true)), ("tgid", SizedType::int(32, true))],
    ));
    let outcome = analyse_with(
        "BEGIN { $t = (struct task *)0; $p = $t->tgid; }",
        AnalyserConfig::default(),
        &StaticFeatures::all(),
        &symbols,
    );
    assert_eq!(outcome.errors, 0, "{:?}", outcome.sink.errors());
    assert_eq!(stmt_type(&outcome.program, 1), SizedType::int(32, true));
}

#[test]
fn test_unknown_identifier() {
    assert_error("BEGIN { $a = NOPE; }", "Unknown identifier");
}

#[test]
fn test_enum_identifier() {
    let symbols = StaticSymbols::new().with_enum("TASK_RUNNING", 0);
    let outcome = analyse_with(
        "BEGIN { $a = TASK_RUNNING; }",
        AnalyserConfig::default(),
        &StaticFeatures::all(),
        &symbols,
    );
    assert_eq!(outcome.errors, 0);
    assert_eq!(stmt_type(&outcome.program, 0), SizedType::uint64());
}

// Builtins

#[test]
fn test_builtin_types() {
    let outcome = assert_ok("kprobe:f { $a = pid; $b = comm; $c = func; $d = arg0; }");
    assert_eq!(stmt_type(&outcome.program, 0), SizedType::uint64());
    assert_eq!(stmt_type(&outcome.program, 1), SizedType::string(16));
    assert_eq!(stmt_type(&outcome.program, 2), SizedType::ksym());
    assert_eq!(stmt_type(&outcome.program, 3).addrspace, crate::ast::types::AddrSpace::Kernel);
}

#[test]
fn test_probe_builtin_takes_longest_name() {
    let outcome = assert_ok("kprobe:a, kprobe:longer { $p = probe; }");
    assert_eq!(stmt_type(&outcome.program, 0), SizedType::string("kprobe:longer".len() + 1));
}

#[test]
fn test_retval_needs_return_probe() {
    assert_error("kprobe:f { $r = retval; }", "retval builtin can only be used");
    assert_ok("kretprobe:f { $r = retval; }");
}

#[test]
fn test_cpid_needs_child() {
    assert_error("BEGIN { $c = cpid; }", "cpid cannot be used without child command");
}

#[test]
fn test_arg_out_of_range() {
    assert_error("kprobe:f { $a = arg6; }", "out of range");
}

#[test]
fn test_tracepoint_args() {
    let symbols = StaticSymbols::new().with_tracepoint(
        "sched",
        "sched_switch",
        Record::from_fields("sched_switch_args", vec![("prev_pid", SizedType::int(32, true))]),
    );
    let outcome = analyse_with(
        "tracepoint:sched:sched_switch { $p = args.prev_pid; }",
        AnalyserConfig::default(),
        &StaticFeatures::all(),
        &symbols,
    );
    assert_eq!(outcome.errors, 0, "{:?}", outcome.sink.errors());
    assert_eq!(stmt_type(&outcome.program, 0).kind, Type::Integer);
}

// Calls

#[test]
fn test_aggregations_must_be_assigned_to_maps() {
    assert_ok("BEGIN { @c = count(); @s = sum(1); @h = hist(2); @l = lhist(3, 0, 100, 10); }");
    assert_error("BEGIN { $c = count(); }", "count() should be directly assigned to a map");
    assert_error("BEGIN { count(); }", "should be directly assigned to a map");
}

#[test]
fn test_aggregation_values_do_not_mix() {
    assert_error("BEGIN { @c = count(); @c = 1; }", "Type mismatch for @c");
}

#[test]
fn test_sum_sign_follows_argument() {
    let outcome = assert_ok("BEGIN { @s = sum((uint32)1); @t = sum(-1); }");
    assert_eq!(stmt_type(&outcome.program, 0), SizedType::sum(false));
    assert_eq!(stmt_type(&outcome.program, 1), SizedType::sum(true));
}

#[test]
fn test_unknown_function() {
    assert_error("BEGIN { nope(); }", "Unknown function: 'nope'");
}

#[test]
fn test_call_arity() {
    assert_error("BEGIN { @l = lhist(1, 2); }", "lhist() requires 4 argument(s) (2 provided)");
    assert_error("BEGIN { exit(1, 2); }", "can only take up to 1 arguments");
    assert_error("BEGIN { printf(); }", "requires at least 1 argument(s)");
}

#[test]
fn test_hist_bits_range() {
    assert_error("BEGIN { @h = hist(1, 6); }", "bits 6 must be between 0 and 5");
}

#[test]
fn test_lhist_bounds() {
    assert_error("BEGIN { @l = lhist(1, 10, 5, 1); }", "invalid max value");
    assert_error("BEGIN { @l = lhist(1, 0, 100000, 1); }", "too many buckets");
}

#[test]
fn test_printf_format_checks() {
    assert_ok("BEGIN { printf(\"%d %s\\n\", 1, \"a\"); }");
    assert_error("BEGIN { printf(\"%d %d\", 1); }", "expects 2 argument(s) but 1 were provided");
    assert_error("BEGIN { printf(\"%d\", \"a\"); }", "%d specifier does not accept argument 2");
    assert_error("BEGIN { printf(\"%q\", 1); }", "invalid format specifier '%q'");
}

#[test]
fn test_printf_format_must_be_literal() {
    assert_error(
        "BEGIN { $f = \"%d\"; printf($f, 1); }",
        "printf() expects a string literal for argument 1",
    );
}

#[test]
fn test_format_string_skips_max_strlen() {
    let outcome = analyse_with(
        "BEGIN { printf(\"a rather long format string %d\\n\", 1); }",
        AnalyserConfig::default().with_max_strlen(8),
        &StaticFeatures::all(),
        &PermissiveSymbols,
    );
    assert_eq!(outcome.errors, 0, "{:?}", outcome.sink.errors());
}

#[test]
fn test_unsafe_calls() {
    assert_error("BEGIN { system(\"ls\"); }", "unsafe function being used in safe mode");
    assert_ok("config = { unsafe = 1 } BEGIN { system(\"ls\"); }");
}

#[test]
fn test_missing_helper() {
    let features = StaticFeatures::all().without_helper("send_signal");
    let outcome = analyse_with(
        "kprobe:f { signal(\"SIGKILL\"); }",
        AnalyserConfig::default().with_unsafe(true),
        &features,
        &PermissiveSymbols,
    );
    assert!(outcome.sink.contains(LogType::Error, "missing BPF helper send_signal"));
}

fn analyse_unsafe(source: &str) -> Outcome {
    analyse_with(
        source,
        AnalyserConfig::default().with_unsafe(true),
        &StaticFeatures::all(),
        &PermissiveSymbols,
    )
}

#[test]
fn test_signal_arguments() {
    for source in [
        "kprobe:f { signal(\"SIGKILL\"); }",
        "kprobe:f { signal(9); }",
        "kprobe:f { $n = 9; signal($n); }",
    ] {
        let outcome = analyse_unsafe(source);
        assert_eq!(outcome.errors, 0, "{:?}: {:?}", source, outcome.sink.errors());
    }

    let outcome = analyse_unsafe("kprobe:f { signal(\"SIGNOPE\"); }");
    assert!(outcome.sink.contains(LogType::Error, "signal: unknown signal 'SIGNOPE'"));

    let outcome = analyse_unsafe("kprobe:f { signal(65); }");
    assert!(outcome.sink.contains(LogType::Error, "signal: invalid signal number 65"));

    let outcome = analyse_unsafe("kprobe:f { $s = \"SIGKILL\"; signal($s); }");
    assert_eq!(outcome.errors, 1);
    assert!(outcome
        .sink
        .contains(LogType::Error, "signal() only accepts string literals or integers"));
}

#[test]
fn test_check_arg_without_fail_is_silent() {
    let features = StaticFeatures::all();
    let mut sink = DiagnosticCollector::new();
    let mut number = Expression::new(ExprKind::Integer(5), span_at(0));
    number.ty = SizedType::int64();
    let args = vec![number];

    {
        let mut analyser = SemanticAnalyser::new(
            &mut sink,
            &features,
            &PermissiveSymbols,
            AnalyserConfig::default(),
        );

        assert!(!analyser.check_arg("f", &args, ArgKind::String, 0, true, false));
        assert!(!analyser.check_arg("f", &args, ArgKind::Integer, 1, false, false));
        assert!(analyser.check_arg("f", &args, ArgKind::Integer, 0, true, false));
        assert_eq!(analyser.error_count(), 0);

        assert!(!analyser.check_arg("f", &args, ArgKind::String, 0, true, true));
        assert_eq!(analyser.error_count(), 1);
    }

    assert_eq!(sink.errors().len(), 1);
    assert!(sink.contains(LogType::Error, "f() expects a string for argument 1"));
}

#[test]
fn test_call_probe_type_restriction() {
    let outcome = analyse_with(
        "BEGIN { override(1); }",
        AnalyserConfig::default().with_unsafe(true),
        &StaticFeatures::all(),
        &PermissiveSymbols,
    );
    assert!(outcome
        .sink
        .contains(LogType::Error, "override() can not be used with 'special' probes"));
}

#[test]
fn test_str_sizes() {
    let outcome = assert_ok("kprobe:f { $a = str(arg0); $b = str(arg0, 8); }");
    assert_eq!(stmt_type(&outcome.program, 0), SizedType::string(64));
    assert_eq!(stmt_type(&outcome.program, 1), SizedType::string(9));
}

#[test]
fn test_stack_calls() {
    let outcome = assert_ok("kprobe:f { @a[kstack(perf, 3)] = 1; $b = kstack; }");
    let ty = match &outcome.program.probes[0].block.stmts[0].kind {
        StmtKind::AssignMap { map, .. } => match &map.kind {
            crate::ast::expressions::ExprKind::Map { keys, .. } => keys[0].ty.clone(),
            _ => unreachable!(),
        },
        _ => unreachable!(),
    };
    assert_eq!(ty, SizedType::stack(true, StackMode::Perf, 3));
    assert_eq!(stmt_type(&outcome.program, 1), SizedType::stack(true, StackMode::Bpftrace, 127));

    assert_error("kprobe:f { @a[kstack(2000)] = 1; }", "limit must be between 1 and 1024");
}

#[test]
fn test_delete_and_clear_take_maps() {
    assert_ok("BEGIN { @m[1] = 1; delete(@m, 1); delete(@m[1]); clear(@m); zero(@m); $n = len(@m); }");
    assert_error("BEGIN { $a = 1; clear($a); }", "clear() expects a map argument");
    assert_error("BEGIN { @m = 1; $n = len(@m); }", "len() expects a map with keys");
}

#[test]
fn test_print_non_map_takes_one_argument() {
    assert_error("BEGIN { print(1, 2); }", "only takes a single argument");
}

#[test]
fn test_register_names() {
    assert_ok("kprobe:f { $a = reg(\"ip\"); }");
    assert_error("kprobe:f { $a = reg(\"nope\"); }", "is not a valid register");
}

#[test]
fn test_subprogram_calls() {
    assert_ok("fn add($a: int64, $b: int64): int64 { return $a + $b; } BEGIN { $x = add(1, 2); }");
    assert_error(
        "fn add($a: int64): int64 { return $a; } BEGIN { $x = add(1, 2); }",
        "Function add requires 1 argument(s) (2 provided)",
    );
    assert_error(
        "fn add($a: int64): int64 { return $a; } BEGIN { $x = add(\"s\"); }",
        "argument 1 is of type 'string[2]'",
    );
}

#[test]
fn test_subprogram_return_type() {
    assert_error(
        "fn f(): int64 { return \"s\"; } BEGIN { }",
        "Function f is of type 'int64', cannot return 'string[2]'",
    );
}

#[test]
fn test_subprogram_name_conflicts() {
    assert_error("fn count(): void { } BEGIN { }", "reserved for a builtin function");
    assert_error("fn f(): void { } fn f(): void { } BEGIN { }", "Function 'f' is already defined");
}

// Statements

#[test]
fn test_duplicate_declaration() {
    let outcome = assert_error(
        "BEGIN { let $x = 1; let $x = 2; }",
        "Variable $x was already declared",
    );
    assert!(outcome.sink.contains(LogType::Hint, "$x was first declared here"));
}

#[test]
fn test_typed_declaration_is_not_resizable() {
    assert_error(
        "BEGIN { let $s: string[4] = \"ab\"; $s = \"abcdefgh\"; }",
        "String size mismatch for $s",
    );
}

#[test]
fn test_use_before_assignment() {
    assert_error("BEGIN { let $x; $y = $x; }", "Variable used before it was assigned: $x");
}

#[test]
fn test_variable_assignment_mismatch() {
    assert_error("BEGIN { $x = 1; $x = \"a\"; }", "Type mismatch for $x");
}

#[test]
fn test_invalid_condition() {
    assert_error("BEGIN { if (\"s\") { } }", "Invalid condition in if");
}

#[test]
fn test_unroll_bounds() {
    assert_ok("BEGIN { unroll(5) { } }");
    assert_error("BEGIN { unroll(101) { } }", "unroll maximum value is 100");
    assert_error("BEGIN { unroll(0) { } }", "unroll minimum value is 1");
}

#[test]
fn test_break_outside_loop() {
    assert_error("BEGIN { break; }", "'break' statement is not allowed outside of a loop");
    assert_ok("BEGIN { $i = 0; while ($i < 3) { $i++; if ($i == 2) { break; } } }");
}

#[test]
fn test_return_value_in_probe() {
    assert_error("BEGIN { return 1; }", "Return value is not allowed in a probe");
}

#[test]
fn test_for_loop_over_map() {
    let outcome = assert_ok("BEGIN { @m[\"a\"] = 1; for ($kv : @m) { $k = $kv.0; $v = $kv.1; } }");
    let StmtKind::For { var, .. } = &outcome.program.probes[0].block.stmts[1].kind else {
        panic!("expected a for loop");
    };
    assert_eq!(
        var.ty,
        SizedType::tuple(vec![SizedType::string(2), SizedType::int64()])
    );
}

#[test]
fn test_for_loop_rejects_scalar_and_hist_maps() {
    assert_error("BEGIN { @m = 1; for ($kv : @m) { } }", "does not support scalar map");
    assert_error("BEGIN { @h[1] = hist(1); for ($kv : @h) { } }", "does not support 'hist_t' map values");
}

#[test]
fn test_for_loop_shadowing() {
    assert_error(
        "BEGIN { @m[1] = 1; $kv = 1; for ($kv : @m) { } }",
        "Loop declaration shadows existing variable: $kv",
    );
}

#[test]
fn test_for_loop_captures() {
    let mut program = parse_source("BEGIN { @m[1] = 1; $y = 2; for ($kv : @m) { @n = $y; } }");
    let features = StaticFeatures::all();
    let mut sink = DiagnosticCollector::new();
    let mut analyser = SemanticAnalyser::new(
        &mut sink,
        &features,
        &PermissiveSymbols,
        AnalyserConfig::default(),
    );

    assert_eq!(analyser.analyse(&mut program), 0);
    let for_id = program.probes[0].block.stmts[2].id;
    assert_eq!(analyser.captures(for_id), Some(&["$y".to_string()][..]));
    assert!(!analyser.scopes().get(program.probes[0].block.id, "$y").unwrap().can_resize);
}

#[test]
fn test_for_loop_local_reused_after_loop() {
    let mut program =
        parse_source("BEGIN { @m[1] = 1; for ($kv : @m) { $t = 1; print($t); } $t = 2; }");
    let features = StaticFeatures::all();
    let mut sink = DiagnosticCollector::new();
    let mut analyser = SemanticAnalyser::new(
        &mut sink,
        &features,
        &PermissiveSymbols,
        AnalyserConfig::default(),
    );

    assert_eq!(analyser.analyse(&mut program), 0);
    let for_id = program.probes[0].block.stmts[1].id;
    assert_eq!(analyser.captures(for_id), Some(&[][..]));
}

#[test]
fn test_for_loop_variable_reused_after_loop() {
    assert_ok("BEGIN { @m[1] = 1; for ($kv : @m) { print($kv.0); } $kv = 2; }");
}

#[test]
fn test_scope_find_declared_is_per_pass() {
    let mut scopes = ScopeTable::new();
    scopes.push(1);
    scopes.declare("$x", Variable::implicit(), decl(1, 0)).unwrap();
    assert!(scopes.find_declared("$x").is_some());

    scopes.reset_assignments();
    assert!(scopes.find("$x").is_some());
    assert!(scopes.find_declared("$x").is_none());

    scopes.declare("$x", Variable::implicit(), decl(1, 0)).unwrap();
    assert!(scopes.find_declared("$x").is_some());
}

// Probes

#[test]
fn test_invalid_provider() {
    let mut program = parse_source("BEGIN { }");
    program.probes[0].attach_points = vec![AttachPoint::parse("nope:f", Span::null())];

    let features = StaticFeatures::all();
    let mut sink = DiagnosticCollector::new();
    let errors = SemanticAnalyser::new(
        &mut sink,
        &features,
        &PermissiveSymbols,
        AnalyserConfig::default(),
    )
    .analyse(&mut program);

    assert_eq!(errors, 1);
    assert!(sink.contains(LogType::Error, "Invalid provider: 'nope'"));
}

#[test]
fn test_unsupported_probe_type() {
    let features = StaticFeatures::all().without_probe_type(ProbeType::Fentry);
    let outcome = analyse_with("fentry:f { }", AnalyserConfig::default(), &features, &PermissiveSymbols);
    assert!(outcome.sink.contains(LogType::Error, "fentry probes are not supported"));
}

#[test]
fn test_missing_kernel_function() {
    let symbols = StaticSymbols::new().with_kernel_function("vfs_read");
    let config = AnalyserConfig::default();
    let features = StaticFeatures::all();

    let outcome = analyse_with("kprobe:vfs_read { }", config.clone(), &features, &symbols);
    assert_eq!(outcome.errors, 0);

    let outcome = analyse_with("kprobe:nope { }", config.clone(), &features, &symbols);
    assert!(outcome.sink.contains(LogType::Error, "Kernel function 'nope' does not exist"));

    let outcome = analyse_with("kprobe:nope { }", config.with_listing(true), &features, &symbols);
    assert_eq!(outcome.errors, 0);
}

#[test]
fn test_profile_units() {
    assert_ok("profile:hz:99 { }");
    assert_error("profile:parsecs:99 { }", "is not one of hz, s, ms or us");
}

#[test]
fn test_watchpoint_checks() {
    assert_ok("watchpoint:0x1000:8:rw { }");
    assert_error("watchpoint:0x1000:3:rw { }", "watchpoint length must be one of");
    assert_error("watchpoint:0x1000:8:rq { }", "watchpoint mode must be a combination");
}

#[test]
fn test_predicate_type() {
    assert_ok("kprobe:f /pid == 1/ { }");
    assert_error("kprobe:f /\"s\"/ { }", "Invalid type for predicate");
}

#[test]
fn test_begin_end_flags() {
    let mut program = parse_source("BEGIN { } END { }");
    let features = StaticFeatures::all();
    let mut sink = DiagnosticCollector::new();
    let mut analyser = SemanticAnalyser::new(
        &mut sink,
        &features,
        &PermissiveSymbols,
        AnalyserConfig::default(),
    );

    assert_eq!(analyser.analyse(&mut program), 0);
    assert!(analyser.has_begin_probe());
    assert!(analyser.has_end_probe());
    assert!(!analyser.has_pos_param());
}
