use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Build::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Build::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Build::Project)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Build::Status)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Build::CommitSha)
                            .string(),
                    )
                    .col(
                        ColumnDef::new(Build::CommitMessage)
                            .string_len(255),
                    )
                    .col(
                        ColumnDef::new(Build::ArtifactId)
                            .string(),
                    )
                    .col(
                        ColumnDef::new(Build::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Build::CompletedAt)
                            .date_time(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-build-project")
                            .from(Build::Table, Build::Project)
                            .to(Project::Table, Project::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-build-project-commit")
                    .table(Build::Table)
                    .col(Build::Project)
                    .col(Build::CommitSha)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Build::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Build {
    Table,
    Id,
    Project,
    Status,
    CommitSha,
    CommitMessage,
    ArtifactId,
    CreatedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum Project {
    Table,
    Id,
}
