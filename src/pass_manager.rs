//! Ordered pipeline of named stages over a parsed program.

use tracing::{info, warn};

use crate::{
    ast::ast::Program,
    config::AnalyserConfig,
    errors::errors::PassError,
    log::DiagnosticSink,
    providers::{FeatureProvider, SymbolProvider},
    semantic_analyser::SemanticAnalyser,
};

/// Everything a stage may read or decorate.
pub struct PassContext<'a> {
    pub program: &'a mut Program,
    pub sink: &'a mut dyn DiagnosticSink,
    pub features: &'a dyn FeatureProvider,
    pub symbols: &'a dyn SymbolProvider,
    pub config: &'a AnalyserConfig,
}

pub type PassFn = fn(&mut PassContext<'_>) -> Result<(), PassError>;

#[derive(Clone, Copy)]
pub struct Pass {
    pub name: &'static str,
    pub run: PassFn,
}

impl Pass {
    pub fn new(name: &'static str, run: PassFn) -> Self {
        Pass { name, run }
    }
}

#[derive(Default)]
pub struct PassManager {
    passes: Vec<Pass>,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, pass: Pass) -> &mut Self {
        self.passes.push(pass);
        self
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name).collect()
    }

    /// Runs every stage in order and stops at the first failure.
    pub fn run(&self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        for pass in &self.passes {
            info!(pass = pass.name, "running pass");

            if let Err(error) = (pass.run)(ctx) {
                warn!(pass = pass.name, %error, "pass failed");
                return Err(error);
            }
        }

        Ok(())
    }
}

fn run_semantic(ctx: &mut PassContext<'_>) -> Result<(), PassError> {
    let errors = SemanticAnalyser::new(
        &mut *ctx.sink,
        ctx.features,
        ctx.symbols,
        ctx.config.clone(),
    )
    .analyse(ctx.program);

    match errors {
        0 => Ok(()),
        errors => Err(PassError::Failed {
            pass: "Semantic",
            errors,
        }),
    }
}

pub fn create_semantic_pass() -> Pass {
    Pass::new("Semantic", run_semantic)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{
        lexer::lexer::tokenize,
        log::{DiagnosticCollector, LogType},
        parser::parser::parse,
        providers::{PermissiveSymbols, StaticFeatures},
    };

    fn parse_source(source: &str) -> Program {
        let tokens = tokenize(source.to_string(), Some("test.bt".to_string())).unwrap();
        parse(tokens, Rc::new("test.bt".to_string())).1.unwrap()
    }

    fn run_pipeline(manager: &PassManager, source: &str) -> (Result<(), PassError>, DiagnosticCollector) {
        let mut program = parse_source(source);
        let mut sink = DiagnosticCollector::new();
        let features = StaticFeatures::all();
        let config = AnalyserConfig::default();

        let result = {
            let mut ctx = PassContext {
                program: &mut program,
                sink: &mut sink,
                features: &features,
                symbols: &PermissiveSymbols,
                config: &config,
            };
            manager.run(&mut ctx)
        };

        (result, sink)
    }

    fn always_fails(_: &mut PassContext<'_>) -> Result<(), PassError> {
        Err(PassError::Failed {
            pass: "Fails",
            errors: 1,
        })
    }

    fn reports_hint(ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        ctx.sink.take_input(LogType::Hint, None, "after");
        Ok(())
    }

    #[test]
    fn test_semantic_pass_succeeds() {
        let mut manager = PassManager::new();
        manager.add_pass(create_semantic_pass());

        let (result, sink) = run_pipeline(&manager, "BEGIN { @x = 1; }");
        assert_eq!(result, Ok(()));
        assert!(sink.errors().is_empty());
    }

    #[test]
    fn test_semantic_pass_reports_error_count() {
        let mut manager = PassManager::new();
        manager.add_pass(create_semantic_pass());

        let (result, sink) = run_pipeline(&manager, "BEGIN { @x = 1; @x = \"a\"; }");
        assert_eq!(
            result,
            Err(PassError::Failed {
                pass: "Semantic",
                errors: sink.errors().len(),
            })
        );
    }

    #[test]
    fn test_stops_at_first_failure() {
        let mut manager = PassManager::new();
        manager
            .add_pass(Pass::new("Fails", always_fails))
            .add_pass(Pass::new("Hint", reports_hint));

        assert_eq!(manager.pass_names(), vec!["Fails", "Hint"]);

        let (result, sink) = run_pipeline(&manager, "BEGIN { }");
        assert!(result.is_err());
        assert!(sink.hints().is_empty());
    }
}
