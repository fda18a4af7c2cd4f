//! Lexical scopes for `$variables`.
//!
//! Each scope belongs to the node that opened it (probe, subprogram, block or
//! loop body) and survives across passes, so a later pass sees the types an
//! earlier one settled on. Lookup walks the active chain innermost first;
//! shadowing is not supported.

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    ast::{
        ast::NodeId,
        types::{is_same_type, unify, SizedType},
    },
    Span,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub ty: SizedType,
    /// Strings and buffers held by the variable may grow.
    pub can_resize: bool,
    /// Assigned earlier in program order during the current pass.
    pub was_assigned: bool,
    /// Declaration visited earlier in program order during the current pass.
    pub was_declared: bool,
}

impl Variable {
    pub fn new(ty: SizedType, can_resize: bool, was_assigned: bool) -> Self {
        Variable {
            ty,
            can_resize,
            was_assigned,
            was_declared: false,
        }
    }

    /// Implicitly declared by a first assignment.
    pub fn implicit() -> Self {
        Variable::new(SizedType::none(), true, false)
    }
}

/// Where a variable was first declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub node: NodeId,
    pub span: Span,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Variable {name} was already declared. Variable shadowing is not allowed.")]
    Redeclared { name: String, first: Span },
    #[error("Type mismatch for {name}: trying to assign value of type '{new}' when variable already contains a value of type '{old}'")]
    TypeMismatch {
        name: String,
        old: SizedType,
        new: SizedType,
    },
    #[error("String size mismatch for {name}: variable holds {old} but is assigned {new}")]
    SizeMismatch {
        name: String,
        old: SizedType,
        new: SizedType,
    },
    #[error("Undefined or undeclared variable: {name}")]
    Undefined { name: String },
}

#[derive(Debug, Default)]
struct Scope {
    variables: HashMap<String, Variable>,
    decls: HashMap<String, Declaration>,
}

#[derive(Debug, Default)]
pub struct ScopeTable {
    scopes: HashMap<NodeId, Scope>,
    stack: Vec<NodeId>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every scope.
    pub fn clear(&mut self) {
        self.scopes.clear();
        self.stack.clear();
    }

    pub fn push(&mut self, node: NodeId) {
        self.scopes.entry(node).or_default();
        self.stack.push(node);
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Start of a pass: nothing has been declared or assigned yet.
    pub fn reset_assignments(&mut self) {
        for scope in self.scopes.values_mut() {
            for variable in scope.variables.values_mut() {
                variable.was_assigned = false;
                variable.was_declared = false;
            }
        }
    }

    /// Innermost active scope holding `name`.
    pub fn find_scope(&self, name: &str) -> Option<NodeId> {
        self.stack.iter().rev().copied().find(|node| {
            self.scopes
                .get(node)
                .is_some_and(|scope| scope.variables.contains_key(name))
        })
    }

    pub fn find(&self, name: &str) -> Option<&Variable> {
        let node = self.find_scope(name)?;
        self.scopes.get(&node)?.variables.get(name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Variable> {
        let node = self.find_scope(name)?;
        self.scopes.get_mut(&node)?.variables.get_mut(name)
    }

    /// Declaration of a visible `name`.
    pub fn find_declaration(&self, name: &str) -> Option<&Declaration> {
        let node = self.find_scope(name)?;
        self.scopes.get(&node)?.decls.get(name)
    }

    /// Like [`find`](Self::find), but skips variables whose declaration
    /// comes later in program order than the current position.
    pub fn find_declared(&self, name: &str) -> Option<&Variable> {
        self.find(name).filter(|variable| variable.was_declared)
    }

    /// A variable as stored in the scope of `node`, active or not.
    pub fn get(&self, node: NodeId, name: &str) -> Option<&Variable> {
        self.scopes.get(&node)?.variables.get(name)
    }

    /// Declares `name` in the innermost scope.
    ///
    /// Re-running the same declaration on a later pass keeps the variable
    /// and only fills in a type that was still unresolved.
    pub fn declare(
        &mut self,
        name: &str,
        variable: Variable,
        decl: Declaration,
    ) -> Result<(), ScopeError> {
        if let Some(existing) = self.find_declaration(name) {
            if existing.node != decl.node {
                return Err(ScopeError::Redeclared {
                    name: String::from(name),
                    first: existing.span.clone(),
                });
            }

            if let Some(current) = self.find_mut(name) {
                if current.ty.has_none() {
                    current.ty = variable.ty;
                }
                current.was_assigned |= variable.was_assigned;
                current.was_declared = true;
            }
            return Ok(());
        }

        let Some(node) = self.stack.last().copied() else {
            return Err(ScopeError::Undefined {
                name: String::from(name),
            });
        };

        let scope = self.scopes.entry(node).or_default();
        scope.variables.insert(
            String::from(name),
            Variable {
                was_declared: true,
                ..variable
            },
        );
        scope.decls.insert(String::from(name), decl);
        Ok(())
    }

    /// Records an assignment of a value of type `ty`.
    ///
    /// The first assignment fixes the type. Integers of any width are
    /// accepted into an integer variable, which keeps its type. Strings and
    /// buffers grow when the variable allows it.
    pub fn assign(&mut self, name: &str, ty: &SizedType) -> Result<SizedType, ScopeError> {
        let Some(variable) = self.find_mut(name) else {
            return Err(ScopeError::Undefined {
                name: String::from(name),
            });
        };

        if variable.ty.is_none() {
            variable.ty = ty.clone();
        } else if variable.ty.is_int() && ty.is_int() {
            // keeps the declared width
        } else if is_same_type(&variable.ty, ty) {
            let Some(unified) = unify(&variable.ty, ty) else {
                return Err(ScopeError::TypeMismatch {
                    name: String::from(name),
                    old: variable.ty.clone(),
                    new: ty.clone(),
                });
            };

            if unified != variable.ty {
                if !variable.can_resize {
                    return Err(ScopeError::SizeMismatch {
                        name: String::from(name),
                        old: variable.ty.clone(),
                        new: ty.clone(),
                    });
                }
                variable.ty = unified;
            }
        } else {
            return Err(ScopeError::TypeMismatch {
                name: String::from(name),
                old: variable.ty.clone(),
                new: ty.clone(),
            });
        }

        variable.was_assigned = true;
        Ok(variable.ty.clone())
    }

    pub fn mark_non_resizable(&mut self, name: &str) {
        if let Some(variable) = self.find_mut(name) {
            variable.can_resize = false;
        }
    }
}
