use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EnvironmentVariable::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnvironmentVariable::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EnvironmentVariable::Project)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnvironmentVariable::Key)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnvironmentVariable::Value)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnvironmentVariable::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnvironmentVariable::UpdatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-environment_variable-project")
                            .from(EnvironmentVariable::Table, EnvironmentVariable::Project)
                            .to(Project::Table, Project::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-environment_variable-project-key")
                    .table(EnvironmentVariable::Table)
                    .col(EnvironmentVariable::Project)
                    .col(EnvironmentVariable::Key)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EnvironmentVariable::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EnvironmentVariable {
    Table,
    Id,
    Project,
    Key,
    Value,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Project {
    Table,
    Id,
}
