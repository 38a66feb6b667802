pub use sea_orm_migration::prelude::*;

mod m20250219_101500_create_table_project;
mod m20250219_101830_create_table_build;
mod m20250219_102045_create_table_deployment;
mod m20250219_102310_create_table_log_entry;
mod m20250219_102540_create_table_environment_variable;
mod m20250219_102815_create_table_github_installation;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250219_101500_create_table_project::Migration),
            Box::new(m20250219_101830_create_table_build::Migration),
            Box::new(m20250219_102045_create_table_deployment::Migration),
            Box::new(m20250219_102310_create_table_log_entry::Migration),
            Box::new(m20250219_102540_create_table_environment_variable::Migration),
            Box::new(m20250219_102815_create_table_github_installation::Migration),
        ]
    }
}
