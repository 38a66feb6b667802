use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Project::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Project::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Project::Name)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Project::RepoUrl)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Project::RepoId)
                            .big_integer(),
                    )
                    .col(
                        ColumnDef::new(Project::DefaultBranch)
                            .string()
                            .not_null()
                            .default("main"),
                    )
                    .col(
                        ColumnDef::new(Project::RootDirectory)
                            .string()
                            .not_null()
                            .default("./"),
                    )
                    .col(
                        ColumnDef::new(Project::BuildCommand)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Project::Framework)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Project::Domain)
                            .string(),
                    )
                    .col(
                        ColumnDef::new(Project::Port)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Project::Installation)
                            .big_integer(),
                    )
                    .col(
                        ColumnDef::new(Project::AutoDeploy)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Project::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Project::UpdatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Project::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Project {
    Table,
    Id,
    Name,
    RepoUrl,
    RepoId,
    DefaultBranch,
    RootDirectory,
    BuildCommand,
    Framework,
    Domain,
    Port,
    Installation,
    AutoDeploy,
    CreatedAt,
    UpdatedAt,
}
