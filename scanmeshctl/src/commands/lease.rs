use anyhow::Result;
use scanmesh_core::{CoordinationClient, GroupKeys, Store};
use serde_json::json;

use super::print_json;
use crate::LeaseAction;

/// Reads the lease without taking it.
pub async fn run(client: &CoordinationClient, action: LeaseAction) -> Result<()> {
    match action {
        LeaseAction::Check { scope, phase, zone } => {
            let scope = scope.scope();
            let key = GroupKeys::new(scope).lease(phase, &zone);
            let stamp = client.store().get(&key).await?;
            let acquired_at: Option<i64> =
                stamp.as_deref().and_then(|raw| raw.parse().ok());
            print_json(&json!({
                "scope": scope.to_string(),
                "phase": phase.as_str(),
                "zone": zone,
                "held": stamp.is_some(),
                "acquired_at": acquired_at,
            }))
        }
    }
}
