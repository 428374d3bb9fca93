use async_trait::async_trait;
use ussd_dsl::{Node, NodeKind};

use super::{kind_mismatch, HandlerContext, NodeHandler, NodeResult};

/// Matches the input against option keys
pub struct MenuHandler;

#[async_trait]
impl NodeHandler for MenuHandler {
    async fn handle(&self, node: &Node, _ctx: &HandlerContext<'_>, input: &str) -> NodeResult {
        let NodeKind::Menu { options } = &node.kind else {
            return kind_mismatch(node, "menu");
        };

        let key = input.trim();
        match options.iter().find(|option| option.key == key) {
            Some(option) => NodeResult::follow(option.target.as_ref()),
            None => NodeResult::error("Invalid option selected"),
        }
    }
}
