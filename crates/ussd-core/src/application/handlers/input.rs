use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;
use ussd_dsl::{InputSpec, Node, NodeKind};

use super::{kind_mismatch, HandlerContext, NodeHandler, NodeResult};

/// Validates free text and stores it in the node's variable
pub struct InputHandler {
    // Compiled patterns keyed by source text, shared by all sessions
    patterns: DashMap<String, Regex>,
}

impl InputHandler {
    pub fn new() -> Self {
        Self {
            patterns: DashMap::new(),
        }
    }

    /// `None` when the pattern does not compile; validated flows never hit this
    fn matches(&self, pattern: &str, value: &str) -> Option<bool> {
        if let Some(regex) = self.patterns.get(pattern) {
            return Some(regex.is_match(value));
        }

        match Regex::new(pattern) {
            Ok(regex) => {
                let matched = regex.is_match(value);
                self.patterns.insert(pattern.to_string(), regex);
                Some(matched)
            }
            Err(err) => {
                tracing::error!(pattern, error = %err, "Input pattern failed to compile");
                None
            }
        }
    }

    fn check(&self, spec: &InputSpec, value: &str) -> Result<(), &'static str> {
        if spec.required && value.is_empty() {
            return Err("Input is required");
        }

        // Applies to empty input too; an optional field that may be skipped
        // needs a pattern that accepts ""
        if let Some(pattern) = &spec.pattern {
            if self.matches(pattern, value) != Some(true) {
                return Err("Invalid input format");
            }
        }

        Ok(())
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for InputHandler {
    async fn handle(&self, node: &Node, _ctx: &HandlerContext<'_>, input: &str) -> NodeResult {
        let NodeKind::Input { spec, next } = &node.kind else {
            return kind_mismatch(node, "input");
        };

        let value = input.trim();
        match self.check(spec, value) {
            Ok(()) => NodeResult::follow(next.as_ref()).with_update(&spec.variable_name, value),
            Err(message) => NodeResult::error(message),
        }
    }
}
