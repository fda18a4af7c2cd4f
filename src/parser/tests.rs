//! Unit tests for the parser module.

use std::rc::Rc;

use super::parser::parse;
use crate::{
    ast::{
        ast::{ProbeType, Program},
        expressions::{BinaryOp, ExprKind, FieldRef, TypeOrExpr, UnaryOp},
        statements::{JumpKind, StmtKind},
        types::{SizedType, StackMode, Type},
    },
    errors::errors::{Error, ErrorImpl},
    lexer::lexer::tokenize,
};

fn parse_source(source: &str) -> Result<Program, Error> {
    let tokens = tokenize(source.to_string(), Some("test.bt".to_string())).unwrap();
    let (_, result) = parse(tokens, Rc::new("test.bt".to_string()));
    result
}

fn first_stmt(source: &str) -> StmtKind {
    let program = parse_source(source).unwrap();
    program.probes[0].block.stmts[0].kind.clone()
}

#[test]
fn test_parse_probe_with_predicate() {
    let program = parse_source("kprobe:vfs_read, kprobe:vfs_write /pid == 1/ { @x = 1; }").unwrap();

    assert_eq!(program.probes.len(), 1);
    let probe = &program.probes[0];
    assert_eq!(probe.attach_points.len(), 2);
    assert_eq!(probe.attach_points[1].func, "vfs_write");

    let pred = probe.pred.as_ref().unwrap();
    assert!(matches!(pred.kind, ExprKind::Binop { op: BinaryOp::Eq, .. }));
}

#[test]
fn test_parse_predicate_with_parenthesised_division() {
    let program = parse_source("kprobe:f /($a / 2) > 1/ { }").unwrap();
    assert!(program.probes[0].pred.is_some());
}

#[test]
fn test_parse_begin_end() {
    let program = parse_source("BEGIN { } END { }").unwrap();

    assert_eq!(program.probes.len(), 2);
    assert_eq!(program.probes[0].attach_points[0].probe_type, ProbeType::Special);
    assert_eq!(program.probes[1].attach_points[0].provider, "END");
}

#[test]
fn test_parse_map_assignment_with_keys() {
    match first_stmt("BEGIN { @m[1, \"a\"] = 5 }") {
        StmtKind::AssignMap { map, expr } => {
            match map.kind {
                ExprKind::Map { ident, keys } => {
                    assert_eq!(ident, "@m");
                    assert_eq!(keys.len(), 2);
                }
                _ => panic!("expected map"),
            }
            assert!(matches!(expr.kind, ExprKind::Integer(5)));
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_compound_assignment_desugars() {
    match first_stmt("BEGIN { $x += 2; }") {
        StmtKind::AssignVar { var, expr, declaration } => {
            assert_eq!(var.variable_name(), Some("$x"));
            assert!(declaration.is_none());
            match expr.kind {
                ExprKind::Binop { op, left, .. } => {
                    assert_eq!(op, BinaryOp::Add);
                    assert!(left.is_variable());
                }
                _ => panic!("expected binop"),
            }
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_invalid_assignment_target() {
    let error = parse_source("BEGIN { 1 = 2; }").unwrap_err();
    assert!(matches!(error.get_internal_error(), ErrorImpl::InvalidAssignmentTarget { .. }));
}

#[test]
fn test_parse_precedence() {
    match first_stmt("BEGIN { $x = 1 + 2 * 3; }") {
        StmtKind::AssignVar { expr, .. } => match expr.kind {
            ExprKind::Binop { op, right, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(right.kind, ExprKind::Binop { op: BinaryOp::Mul, .. }));
            }
            _ => panic!("expected binop"),
        },
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_ternary() {
    match first_stmt("BEGIN { $x = $a ? 1 : $b ? 2 : 3; }") {
        StmtKind::AssignVar { expr, .. } => match expr.kind {
            ExprKind::Ternary { right, .. } => {
                assert!(matches!(right.kind, ExprKind::Ternary { .. }));
            }
            _ => panic!("expected ternary"),
        },
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_arrow_is_deref_field_access() {
    match first_stmt("kprobe:f { $x = $p->comm; }") {
        StmtKind::AssignVar { expr, .. } => match expr.kind {
            ExprKind::FieldAccess { expr, field } => {
                assert_eq!(field, FieldRef::Named("comm".to_string()));
                assert!(matches!(expr.kind, ExprKind::Unop { op: UnaryOp::Deref, .. }));
            }
            _ => panic!("expected field access"),
        },
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_tuple_and_index() {
    match first_stmt("BEGIN { $t = (1, \"a\"); }") {
        StmtKind::AssignVar { expr, .. } => {
            assert!(matches!(expr.kind, ExprKind::Tuple(ref elements) if elements.len() == 2))
        }
        other => panic!("unexpected statement {:?}", other),
    }

    match first_stmt("BEGIN { print($t.1); }") {
        StmtKind::Expr(expr) => match expr.kind {
            ExprKind::Call { args, .. } => {
                assert!(matches!(
                    args[0].kind,
                    ExprKind::FieldAccess { field: FieldRef::Index(1), .. }
                ));
            }
            _ => panic!("expected call"),
        },
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_cast() {
    match first_stmt("BEGIN { $x = (uint8 *)$p; }") {
        StmtKind::AssignVar { expr, .. } => match expr.kind {
            ExprKind::Cast { ty, .. } => {
                assert!(ty.is_pointer());
                assert_eq!(ty.pointee(), Some(&SizedType::int(8, false)));
            }
            _ => panic!("expected cast"),
        },
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_let_forms() {
    let program = parse_source("BEGIN { let $a; let $b: string[16]; let $c: uint32 = 1; }").unwrap();
    let stmts = &program.probes[0].block.stmts;

    assert!(matches!(stmts[0].kind, StmtKind::VarDecl { ty: None, .. }));
    match &stmts[1].kind {
        StmtKind::VarDecl { ty: Some(ty), .. } => assert_eq!(*ty, SizedType::string(16)),
        other => panic!("unexpected statement {:?}", other),
    }
    match &stmts[2].kind {
        StmtKind::AssignVar { declaration: Some(decl), .. } => {
            assert_eq!(decl.ty, Some(SizedType::uint32()))
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_unknown_type() {
    let error = parse_source("BEGIN { let $a: foo; }").unwrap_err();
    // `foo` is not a scalar type name
    assert!(matches!(error.get_internal_error(), ErrorImpl::UnknownType { .. }));
}

#[test]
fn test_parse_control_flow() {
    let source = "BEGIN { if ($a) { } else if ($b) { } else { } while ($i < 3) { $i++; break; } unroll(4) { continue; } }";
    let program = parse_source(source).unwrap();
    let stmts = &program.probes[0].block.stmts;

    match &stmts[0].kind {
        StmtKind::If { else_block: Some(else_block), .. } => {
            assert!(matches!(else_block.stmts[0].kind, StmtKind::If { .. }));
        }
        other => panic!("unexpected statement {:?}", other),
    }
    assert!(matches!(stmts[1].kind, StmtKind::While { .. }));
    match &stmts[2].kind {
        StmtKind::Unroll { block, .. } => {
            assert!(matches!(block.stmts[0].kind, StmtKind::Jump { kind: JumpKind::Continue, .. }))
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_for_loop() {
    match first_stmt("BEGIN { for ($kv : @m) { print($kv.0); } }") {
        StmtKind::For { var, map, block } => {
            assert_eq!(var.variable_name(), Some("$kv"));
            assert_eq!(map.map_ident(), Some("@m"));
            assert_eq!(block.stmts.len(), 1);
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_stack_mode_arguments() {
    match first_stmt("kprobe:f { @s[kstack(perf, 3)] = count(); }") {
        StmtKind::AssignMap { map, .. } => match map.kind {
            ExprKind::Map { keys, .. } => match &keys[0].kind {
                ExprKind::Call { func, args } => {
                    assert_eq!(func, "kstack");
                    assert!(matches!(args[0].kind, ExprKind::StackMode(StackMode::Perf)));
                    assert!(matches!(args[1].kind, ExprKind::Integer(3)));
                }
                _ => panic!("expected call"),
            },
            _ => panic!("expected map"),
        },
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_sizeof_and_offsetof() {
    match first_stmt("BEGIN { $a = sizeof(struct task_struct) + offsetof(struct task_struct, pid); }") {
        StmtKind::AssignVar { expr, .. } => match expr.kind {
            ExprKind::Binop { left, right, .. } => {
                match left.kind {
                    ExprKind::Sizeof(TypeOrExpr::Type(ty)) => {
                        assert!(matches!(ty.kind, Type::Record(_)))
                    }
                    _ => panic!("expected sizeof"),
                }
                assert!(matches!(right.kind, ExprKind::Offsetof { ref field, .. } if field == "pid"));
            }
            _ => panic!("expected binop"),
        },
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_subprog_and_config() {
    let source = "config = { max_strlen = 16; stack_mode = perf } fn add($a: int64, $b: int64): int64 { return $a + $b; } BEGIN { }";
    let program = parse_source(source).unwrap();

    let config = program.config.unwrap();
    assert_eq!(config.stmts.len(), 2);
    assert!(matches!(&config.stmts[0].kind, StmtKind::AssignConfigVar { name, .. } if name == "max_strlen"));

    let subprog = &program.subprogs[0];
    assert_eq!(subprog.name, "add");
    assert_eq!(subprog.args.len(), 2);
    assert_eq!(subprog.return_type, SizedType::int64());
}

#[test]
fn test_parse_duplicate_config() {
    let error = parse_source("config = { } config = { } BEGIN { }").unwrap_err();
    assert!(matches!(error.get_internal_error(), ErrorImpl::DuplicateConfig));
}

#[test]
fn test_parse_node_ids_are_unique() {
    let program = parse_source("BEGIN { $a = 1; { $b = 2; } } END { $c = 3; }").unwrap();

    let mut ids = vec![];
    for probe in &program.probes {
        ids.push(probe.id);
        ids.push(probe.block.id);
        for stmt in &probe.block.stmts {
            ids.push(stmt.id);
        }
    }
    let count = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), count);
}

#[test]
fn test_parse_missing_semicolon() {
    let error = parse_source("BEGIN { $a = 1 $b = 2 }").unwrap_err();
    assert_eq!(error.get_position().0, 15);
}
