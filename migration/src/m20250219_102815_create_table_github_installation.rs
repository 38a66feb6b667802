use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GithubInstallation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GithubInstallation::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GithubInstallation::InstallationId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(GithubInstallation::AccountLogin)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GithubInstallation::AccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GithubInstallation::AccountType)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GithubInstallation::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GithubInstallation {
    Table,
    Id,
    InstallationId,
    AccountLogin,
    AccountId,
    AccountType,
}
