//! Cylinder management commands.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use gauge_core::{Cylinder, CylinderId};

use crate::{CylinderAction, Services};

pub async fn run<W: Write>(writer: &mut W, services: &Services, action: &CylinderAction) -> Result<()> {
    let registry = &services.registry;
    match action {
        CylinderAction::Add {
            name,
            tare,
            capacity,
            activate,
        } => {
            let id = registry.add(name, *tare, *capacity, *activate).await?;
            writeln!(writer, "Added cylinder {id} ({})", name.trim())?;
            if *activate {
                writeln!(writer, "Cylinder {id} is now active")?;
            }
        }
        CylinderAction::List { json } => {
            let cylinders = registry.list().await?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&cylinders)?)?;
            } else {
                write!(writer, "{}", format_cylinders(&cylinders))?;
            }
        }
        CylinderAction::Activate { id } => {
            let cylinder = registry.set_active(CylinderId::new(*id)).await?;
            writeln!(writer, "Activated cylinder {} ({})", cylinder.id, cylinder.name)?;
        }
        CylinderAction::Update {
            id,
            name,
            tare,
            capacity,
        } => {
            let id = CylinderId::new(*id);
            let current = registry.get(id).await?;
            let updated = registry
                .update(
                    id,
                    name.as_deref().unwrap_or(&current.name),
                    tare.unwrap_or(current.tare_kg),
                    capacity.unwrap_or(current.capacity_kg),
                )
                .await?;
            writeln!(
                writer,
                "Updated cylinder {}: {} (tare {:.1} kg, capacity {:.1} kg)",
                updated.id, updated.name, updated.tare_kg, updated.capacity_kg
            )?;
        }
        CylinderAction::Prune => {
            let deleted = registry.delete_inactive().await?;
            writeln!(writer, "Deleted {deleted} inactive cylinder(s)")?;
        }
    }
    Ok(())
}

/// Formats the cylinder table, marking the active one with `*`.
pub fn format_cylinders(cylinders: &[Cylinder]) -> String {
    let mut output = String::new();
    if cylinders.is_empty() {
        output.push_str("No cylinders configured.\n");
        return output;
    }
    output.push_str("Cylinders:\n");
    for cylinder in cylinders {
        let marker = if cylinder.is_active { '*' } else { ' ' };
        writeln!(
            output,
            "{marker} {:>3}  {:<16} tare {:>5.1} kg  capacity {:>5.1} kg",
            cylinder.id, cylinder.name, cylinder.tare_kg, cylinder.capacity_kg
        )
        .unwrap();
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    use gauge_pipeline::PipelineError;
    use insta::assert_snapshot;

    use crate::commands::memory_services;

    async fn run_action(services: &Services, action: CylinderAction) -> Result<String> {
        let mut output = Vec::new();
        run(&mut output, services, &action).await?;
        Ok(String::from_utf8(output).unwrap())
    }

    fn add(name: &str, activate: bool) -> CylinderAction {
        CylinderAction::Add {
            name: name.to_string(),
            tare: 5.0,
            capacity: 10.0,
            activate,
        }
    }

    #[tokio::test]
    async fn list_marks_active_cylinder() {
        let services = memory_services().await;
        run_action(&services, add("Propane", true)).await.unwrap();
        run_action(&services, add("Spare", false)).await.unwrap();

        let output = run_action(&services, CylinderAction::List { json: false })
            .await
            .unwrap();
        assert_snapshot!(output, @r"
        Cylinders:
        *   1  Propane          tare   5.0 kg  capacity  10.0 kg
            2  Spare            tare   5.0 kg  capacity  10.0 kg
        ");
    }

    #[tokio::test]
    async fn list_json_round_trips_cylinders() {
        let services = memory_services().await;
        run_action(&services, add("Propane", true)).await.unwrap();

        let output = run_action(&services, CylinderAction::List { json: true })
            .await
            .unwrap();
        let cylinders: Vec<Cylinder> = serde_json::from_str(&output).unwrap();
        assert_eq!(cylinders.len(), 1);
        assert_eq!(cylinders[0].name, "Propane");
        assert!(cylinders[0].is_active);
    }

    #[tokio::test]
    async fn empty_list() {
        let services = memory_services().await;
        let output = run_action(&services, CylinderAction::List { json: false })
            .await
            .unwrap();
        assert_eq!(output, "No cylinders configured.\n");
    }

    #[tokio::test]
    async fn activate_switches_active_cylinder() {
        let services = memory_services().await;
        run_action(&services, add("Propane", true)).await.unwrap();
        run_action(&services, add("Spare", false)).await.unwrap();

        let output = run_action(&services, CylinderAction::Activate { id: 2 })
            .await
            .unwrap();
        assert_eq!(output, "Activated cylinder 2 (Spare)\n");
        assert_eq!(services.registry.active().unwrap().name, "Spare");
    }

    #[tokio::test]
    async fn activate_unknown_cylinder_fails() {
        let services = memory_services().await;
        let err = run_action(&services, CylinderAction::Activate { id: 42 })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cylinder not found: 42");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn update_keeps_unspecified_fields() {
        let services = memory_services().await;
        run_action(&services, add("Propane", true)).await.unwrap();

        let output = run_action(
            &services,
            CylinderAction::Update {
                id: 1,
                name: None,
                tare: Some(6.5),
                capacity: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            output,
            "Updated cylinder 1: Propane (tare 6.5 kg, capacity 10.0 kg)\n"
        );
    }

    #[tokio::test]
    async fn add_rejects_invalid_input() {
        let services = memory_services().await;
        let err = run_action(&services, add("   ", false)).await.unwrap_err();
        assert_eq!(err.to_string(), "name cannot be empty");
    }

    #[tokio::test]
    async fn prune_removes_inactive_cylinders() {
        let services = memory_services().await;
        run_action(&services, add("Propane", true)).await.unwrap();
        run_action(&services, add("Spare", false)).await.unwrap();

        let output = run_action(&services, CylinderAction::Prune).await.unwrap();
        assert_eq!(output, "Deleted 1 inactive cylinder(s)\n");
        assert_eq!(services.registry.list().await.unwrap().len(), 1);
    }
}
