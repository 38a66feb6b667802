use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deployment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Deployment::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Deployment::Project)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deployment::Build)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deployment::Status)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deployment::ActivatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-deployment-project")
                            .from(Deployment::Table, Deployment::Project)
                            .to(Project::Table, Project::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-deployment-build")
                            .from(Deployment::Table, Deployment::Build)
                            .to(Build::Table, Build::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-deployment-project-status")
                    .table(Deployment::Table)
                    .col(Deployment::Project)
                    .col(Deployment::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deployment::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Deployment {
    Table,
    Id,
    Project,
    Build,
    Status,
    ActivatedAt,
}

#[derive(DeriveIden)]
enum Project {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Build {
    Table,
    Id,
}
