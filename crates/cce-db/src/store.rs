use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{Cluster, Machine, MachineKey};
use crate::status::BootstrapState;
use crate::{Error, Result};

/// Write access to Cluster and Machine resources used by the actuator.
///
/// The actuator mutates resources in place and hands them back here; it
/// never creates or deletes resources itself.
#[async_trait]
pub trait ResourceClient: Send + Sync + 'static {
    async fn update_cluster(&self, cluster: &Cluster) -> Result<()>;

    async fn update_machine(&self, machine: &Machine) -> Result<()>;

    /// Overwrite only the machine's bootstrap status.
    async fn record_bootstrap(&self, key: &MachineKey, state: &BootstrapState) -> Result<()>;

    /// The machine backing the cluster's `masterInstanceID`, if any.
    async fn master_machine(&self, cluster: &Cluster) -> Result<Option<Machine>>;
}

/// PostgreSQL-backed resource store. Resources live as JSONB documents.
#[derive(Clone)]
pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ── Clusters ────────────────────────────────────────────────────

    /// Insert a cluster, or replace the spec of an existing one. Status is
    /// never taken from the caller on conflict.
    pub async fn upsert_cluster(&self, cluster: &Cluster) -> Result<Cluster> {
        let mut resource = cluster.clone();
        let uid = resource.metadata.uid.unwrap_or_else(Uuid::new_v4);
        resource.metadata.uid = Some(uid);
        resource.metadata.resource_version = 1;
        resource.metadata.deletion_requested = false;

        let (Json(stored),): (Json<Cluster>,) = sqlx::query_as(
            r#"INSERT INTO clusters (name, uid, resource)
               VALUES ($1, $2, $3)
               ON CONFLICT (name) DO UPDATE
               SET resource = jsonb_set(
                       jsonb_set(clusters.resource, '{spec}', EXCLUDED.resource -> 'spec'),
                       '{metadata,resourceVersion}', to_jsonb(clusters.resource_version + 1)),
                   resource_version = clusters.resource_version + 1,
                   updated_at = now()
               RETURNING resource"#,
        )
        .bind(&resource.metadata.name)
        .bind(uid)
        .bind(Json(&resource))
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    pub async fn get_cluster(&self, name: &str) -> Result<Cluster> {
        let row: Option<(Json<Cluster>,)> =
            sqlx::query_as("SELECT resource FROM clusters WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        let (Json(cluster),) = row.ok_or_else(|| Error::NotFound {
            kind: "cluster",
            name: name.to_string(),
        })?;
        cluster.status.validate()?;
        Ok(cluster)
    }

    /// Remove a cluster and, by cascade, its machines.
    pub async fn delete_cluster(&self, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM clusters WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound {
                kind: "cluster",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    // ── Machines ────────────────────────────────────────────────────

    /// Insert a machine, or replace the spec of an existing one.
    pub async fn upsert_machine(&self, machine: &Machine) -> Result<Machine> {
        let mut resource = machine.clone();
        let uid = resource.metadata.uid.unwrap_or_else(Uuid::new_v4);
        resource.metadata.uid = Some(uid);
        resource.metadata.resource_version = 1;
        resource.metadata.deletion_requested = false;

        let (Json(mut stored), deletion_requested): (Json<Machine>, bool) = sqlx::query_as(
            r#"INSERT INTO machines (cluster_name, name, uid, resource)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (cluster_name, name) DO UPDATE
               SET resource = jsonb_set(
                       jsonb_set(machines.resource, '{spec}', EXCLUDED.resource -> 'spec'),
                       '{metadata,resourceVersion}', to_jsonb(machines.resource_version + 1)),
                   resource_version = machines.resource_version + 1,
                   updated_at = now()
               RETURNING resource, deletion_requested"#,
        )
        .bind(&resource.cluster_name)
        .bind(&resource.metadata.name)
        .bind(uid)
        .bind(Json(&resource))
        .fetch_one(&self.pool)
        .await?;

        stored.metadata.deletion_requested = deletion_requested;
        Ok(stored)
    }

    pub async fn get_machine(&self, key: &MachineKey) -> Result<Machine> {
        let row: Option<(Json<Machine>, bool)> = sqlx::query_as(
            "SELECT resource, deletion_requested FROM machines WHERE cluster_name = $1 AND name = $2",
        )
        .bind(&key.cluster)
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await?;

        let (Json(mut machine), deletion_requested) = row.ok_or_else(|| Error::NotFound {
            kind: "machine",
            name: key.to_string(),
        })?;
        machine.status.validate()?;
        machine.metadata.deletion_requested = deletion_requested;
        Ok(machine)
    }

    /// All machines with a valid status. Rows whose status fails
    /// validation are skipped with a warning.
    pub async fn list_machines(&self) -> Result<Vec<Machine>> {
        let rows: Vec<(Json<Machine>, bool)> = sqlx::query_as(
            "SELECT resource, deletion_requested FROM machines ORDER BY cluster_name, name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut machines = Vec::with_capacity(rows.len());
        for (Json(mut machine), deletion_requested) in rows {
            if let Err(e) = machine.status.validate() {
                tracing::warn!(machine = %machine.key(), error = %e, "skipping machine with invalid status");
                continue;
            }
            machine.metadata.deletion_requested = deletion_requested;
            machines.push(machine);
        }
        Ok(machines)
    }

    /// Mark a machine for deletion; the reconciler releases its instance.
    pub async fn request_machine_deletion(&self, key: &MachineKey) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE machines
               SET deletion_requested = true,
                   resource = jsonb_set(resource, '{metadata,deletionRequested}', 'true'),
                   updated_at = now()
               WHERE cluster_name = $1 AND name = $2"#,
        )
        .bind(&key.cluster)
        .bind(&key.name)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound {
                kind: "machine",
                name: key.to_string(),
            });
        }
        Ok(())
    }

    pub async fn remove_machine(&self, key: &MachineKey) -> Result<()> {
        sqlx::query("DELETE FROM machines WHERE cluster_name = $1 AND name = $2")
            .bind(&key.cluster)
            .bind(&key.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceClient for PgResourceStore {
    async fn update_cluster(&self, cluster: &Cluster) -> Result<()> {
        cluster.status.validate()?;
        let result = sqlx::query(
            r#"UPDATE clusters
               SET resource = jsonb_set($2, '{metadata,resourceVersion}', to_jsonb(resource_version + 1)),
                   resource_version = resource_version + 1,
                   updated_at = now()
               WHERE name = $1"#,
        )
        .bind(cluster.name())
        .bind(Json(cluster))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound {
                kind: "cluster",
                name: cluster.name().to_string(),
            });
        }
        Ok(())
    }

    async fn update_machine(&self, machine: &Machine) -> Result<()> {
        machine.status.validate()?;
        // deletion_requested stays column-owned so a concurrent delete
        // request is never lost to a stale copy.
        let result = sqlx::query(
            r#"UPDATE machines
               SET resource = jsonb_set(
                       jsonb_set($3, '{metadata,resourceVersion}', to_jsonb(resource_version + 1)),
                       '{metadata,deletionRequested}', to_jsonb(deletion_requested)),
                   resource_version = resource_version + 1,
                   updated_at = now()
               WHERE cluster_name = $1 AND name = $2"#,
        )
        .bind(&machine.cluster_name)
        .bind(machine.name())
        .bind(Json(machine))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound {
                kind: "machine",
                name: machine.key().to_string(),
            });
        }
        Ok(())
    }

    async fn record_bootstrap(&self, key: &MachineKey, state: &BootstrapState) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE machines
               SET resource = jsonb_set(
                       jsonb_set(resource, '{status,bootstrap}', $3, true),
                       '{metadata,resourceVersion}', to_jsonb(resource_version + 1)),
                   resource_version = resource_version + 1,
                   updated_at = now()
               WHERE cluster_name = $1 AND name = $2"#,
        )
        .bind(&key.cluster)
        .bind(&key.name)
        .bind(Json(state))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound {
                kind: "machine",
                name: key.to_string(),
            });
        }
        Ok(())
    }

    async fn master_machine(&self, cluster: &Cluster) -> Result<Option<Machine>> {
        let Some(master_id) = cluster.status.master_instance_id.as_deref() else {
            return Ok(None);
        };
        let row: Option<(Json<Machine>, bool)> = sqlx::query_as(
            r#"SELECT resource, deletion_requested FROM machines
               WHERE cluster_name = $1 AND resource -> 'status' ->> 'instanceID' = $2
               LIMIT 1"#,
        )
        .bind(cluster.name())
        .bind(master_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((Json(mut machine), deletion_requested)) = row else {
            return Ok(None);
        };
        machine.status.validate()?;
        machine.metadata.deletion_requested = deletion_requested;
        Ok(Some(machine))
    }
}
