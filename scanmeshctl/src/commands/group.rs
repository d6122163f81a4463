use anyhow::{Result, bail};
use scanmesh_core::{CoordError, CoordinationClient};
use serde_json::json;

use super::print_json;
use crate::GroupAction;

pub async fn run(client: &CoordinationClient, action: GroupAction) -> Result<()> {
    let groups = client.groups();
    match action {
        GroupAction::Show { scope, no_modules } => {
            let scope = scope.scope();
            match groups.get_group(scope, !no_modules).await {
                Ok(group) => print_json(&group),
                Err(CoordError::GroupNotFound(_)) => {
                    bail!("scan group {scope} does not exist")
                }
                Err(err) => Err(err.into()),
            }
        }
        GroupAction::Status { scope } => {
            let scope = scope.scope();
            let (exists, status) = groups.group_status(scope).await?;
            print_json(&json!({
                "scope": scope.to_string(),
                "exists": exists,
                "status": status,
            }))
        }
        GroupAction::Start { scope } => {
            groups.start(scope.scope()).await?;
            println!("started {}", scope.scope());
            Ok(())
        }
        GroupAction::Stop { scope } => {
            groups.stop(scope.scope()).await?;
            println!("stopped {}", scope.scope());
            Ok(())
        }
        GroupAction::Delete { scope, yes } => {
            if !yes {
                bail!("refusing to delete {} without --yes", scope.scope());
            }
            let removed = groups.delete(scope.scope()).await?;
            println!("deleted {} ({removed} keys)", scope.scope());
            Ok(())
        }
    }
}
