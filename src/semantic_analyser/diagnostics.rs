//! Reporting helpers shared by every visitor.

use tracing::trace;

use crate::{log::LogType, Span};

use super::{maps::MapTypeError, scopes::ScopeError, semantic_analyser::SemanticAnalyser};

impl SemanticAnalyser<'_> {
    pub(super) fn error(&mut self, span: &Span, message: impl AsRef<str>) {
        self.error_count += 1;
        self.sink
            .take_input(LogType::Error, Some(span), message.as_ref());
    }

    /// Warnings are only emitted by the final pass.
    pub(super) fn warning(&mut self, span: &Span, message: impl AsRef<str>) {
        if self.pass_tracker.is_final_pass() {
            self.sink
                .take_input(LogType::Warning, Some(span), message.as_ref());
        }
    }

    pub(super) fn hint(&mut self, span: &Span, message: impl AsRef<str>) {
        self.sink.take_input(LogType::Hint, Some(span), message.as_ref());
    }

    /// A node whose type is not known yet. Counted as unresolved, or
    /// reported as `message` in the final pass.
    pub(super) fn defer_or_error(&mut self, span: &Span, message: impl AsRef<str>) {
        if self.pass_tracker.is_final_pass() {
            self.error(span, message);
        } else {
            trace!(
                pass = self.pass_tracker.get_num_passes(),
                offset = span.offset(),
                reason = message.as_ref(),
                "deferred"
            );
            self.pass_tracker.inc_num_unresolved();
        }
    }

    pub(super) fn scope_error(&mut self, span: &Span, error: ScopeError) {
        self.error(span, error.to_string());
        if let ScopeError::Redeclared { name, first } = &error {
            self.hint(first, format!("{} was first declared here", name));
        }
    }

    pub(super) fn map_error(&mut self, span: &Span, error: MapTypeError) {
        self.error(span, error.to_string());
        if let Some(first) = error.first_site() {
            self.hint(first, "first used here");
        }
    }
}
