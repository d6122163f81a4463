use anyhow::Result;
use scanmesh_core::CoordinationClient;
use serde_json::json;

use super::print_json;
use crate::QueueAction;

pub async fn run(client: &CoordinationClient, action: QueueAction) -> Result<()> {
    let queue = client.queue();
    match action {
        QueueAction::Stats { scope } => {
            let scope = scope.scope();
            let pending = queue.pending_count(scope).await?;
            let known = queue.known_count(scope).await?;
            print_json(&json!({
                "scope": scope.to_string(),
                "pending": pending,
                "known": known,
            }))
        }
        QueueAction::Pop { scope, limit } => {
            let popped = queue.pop_addresses(scope.scope(), limit).await?;
            let mut items: Vec<_> = popped.into_values().collect();
            items.sort_by(|a, b| a.address_hash.cmp(&b.address_hash));
            print_json(&items)
        }
    }
}
