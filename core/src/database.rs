/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::Utc;
use entity::build::BuildStatus;
use entity::deployment::DeploymentStatus;
use entity::log_entry::LogLevel;
use migration::Migrator;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionError, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use super::types::*;

pub async fn connect_db(cli: &Cli) -> DatabaseConnection {
    let db = Database::connect(cli.database_url.clone())
        .await
        .expect("Failed to connect to database");
    Migrator::up(&db, None).await.expect("Migrations failed");
    db
}

fn flatten_txn_err(e: TransactionError<DbErr>) -> DbErr {
    match e {
        TransactionError::Connection(e) => e,
        TransactionError::Transaction(e) => e,
    }
}

pub async fn find_active_deployment(
    db: &DatabaseConnection,
    project_id: Uuid,
) -> Result<Option<MDeployment>, DbErr> {
    EDeployment::find()
        .filter(CDeployment::Project.eq(project_id))
        .filter(CDeployment::Status.eq(DeploymentStatus::Active))
        .one(db)
        .await
}

/// Highest port currently assigned to any project.
pub async fn get_max_assigned_port(db: &DatabaseConnection) -> Result<Option<i32>, DbErr> {
    EProject::find()
        .select_only()
        .column(CProject::Port)
        .order_by_desc(CProject::Port)
        .limit(1)
        .into_tuple::<i32>()
        .one(db)
        .await
}

/// Promotes a build to the active deployment of its project. The prior
/// active deployment (if any) is deactivated in the same transaction, so
/// there is never a committed state with two active rows.
pub async fn promote_deployment(
    db: &DatabaseConnection,
    project_id: Uuid,
    build_id: Uuid,
) -> Result<MDeployment, DbErr> {
    db.transaction::<_, MDeployment, DbErr>(move |txn| {
        Box::pin(async move {
            EDeployment::update_many()
                .col_expr(
                    CDeployment::Status,
                    sea_orm::sea_query::Expr::value(DeploymentStatus::Inactive),
                )
                .filter(CDeployment::Project.eq(project_id))
                .filter(CDeployment::Status.eq(DeploymentStatus::Active))
                .exec(txn)
                .await?;

            let deployment = ADeployment {
                id: Set(Uuid::new_v4()),
                project: Set(project_id),
                build: Set(build_id),
                status: Set(DeploymentStatus::Active),
                activated_at: Set(Utc::now().naive_utc()),
            };

            deployment.insert(txn).await
        })
    })
    .await
    .map_err(flatten_txn_err)
}

/// Removes a project and everything it owns in one transaction:
/// env vars, deployments, logs, builds, then the project row itself.
pub async fn delete_project_cascade(
    db: &DatabaseConnection,
    project_id: Uuid,
    build_ids: Vec<Uuid>,
) -> Result<(), DbErr> {
    db.transaction::<_, (), DbErr>(move |txn| {
        Box::pin(async move {
            EEnvironmentVariable::delete_many()
                .filter(CEnvironmentVariable::Project.eq(project_id))
                .exec(txn)
                .await?;

            EDeployment::delete_many()
                .filter(CDeployment::Project.eq(project_id))
                .exec(txn)
                .await?;

            if !build_ids.is_empty() {
                ELogEntry::delete_many()
                    .filter(CLogEntry::Build.is_in(build_ids.clone()))
                    .exec(txn)
                    .await?;
            }

            EBuild::delete_many()
                .filter(CBuild::Project.eq(project_id))
                .exec(txn)
                .await?;

            EProject::delete_by_id(project_id).exec(txn).await?;

            Ok(())
        })
    })
    .await
    .map_err(flatten_txn_err)
}

pub async fn insert_log_entry(
    db: &DatabaseConnection,
    build_id: Uuid,
    level: LogLevel,
    message: String,
) -> Result<MLogEntry, DbErr> {
    let entry = ALogEntry {
        id: Set(Uuid::new_v4()),
        build: Set(build_id),
        level: Set(level),
        message: Set(message),
        timestamp: Set(Utc::now().naive_utc()),
    };

    entry.insert(db).await
}

/// Applies a status update. Terminal states are sticky: a build that
/// finished never moves back to pending or building.
pub async fn update_build_status(
    db: &DatabaseConnection,
    build: MBuild,
    status: BuildStatus,
) -> Result<MBuild, DbErr> {
    if build.status.is_terminal() && !status.is_terminal() {
        return Ok(build);
    }

    let build_id = build.id;
    let mut abuild: ABuild = build.into();
    abuild.status = Set(status);

    if status.is_terminal() {
        abuild.completed_at = Set(Some(Utc::now().naive_utc()));
    }

    if status == BuildStatus::Success {
        abuild.artifact_id = Set(Some(format!("{}.tar.gz", build_id)));
    }

    abuild.update(db).await
}
