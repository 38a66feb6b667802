use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LogEntry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LogEntry::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LogEntry::Build)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LogEntry::Level)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LogEntry::Message)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LogEntry::Timestamp)
                            .date_time()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-log_entry-build")
                            .from(LogEntry::Table, LogEntry::Build)
                            .to(Build::Table, Build::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-log_entry-build-timestamp")
                    .table(LogEntry::Table)
                    .col(LogEntry::Build)
                    .col(LogEntry::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LogEntry::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LogEntry {
    Table,
    Id,
    Build,
    Level,
    Message,
    Timestamp,
}

#[derive(DeriveIden)]
enum Build {
    Table,
    Id,
}
