use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[sea_orm(string_value = "nextjs")]
    NextJs,
    #[sea_orm(string_value = "vite")]
    Vite,
    #[sea_orm(string_value = "express")]
    Express,
    #[sea_orm(string_value = "hono")]
    Hono,
    #[sea_orm(string_value = "elysia")]
    Elysia,
}

impl Framework {
    pub fn is_frontend(&self) -> bool {
        matches!(self, Framework::NextJs | Framework::Vite)
    }

    pub fn is_backend(&self) -> bool {
        !self.is_frontend()
    }

    /// Frameworks that need a `bun install` in the extracted build before
    /// the process can start. Vite ships a fully static bundle.
    pub fn requires_install(&self) -> bool {
        !matches!(self, Framework::Vite)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::NextJs => "nextjs",
            Framework::Vite => "vite",
            Framework::Express => "express",
            Framework::Hono => "hono",
            Framework::Elysia => "elysia",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nextjs" => Ok(Framework::NextJs),
            "vite" => Ok(Framework::Vite),
            "express" => Ok(Framework::Express),
            "hono" => Ok(Framework::Hono),
            "elysia" => Ok(Framework::Elysia),
            _ => Err(format!("Unknown framework: {}", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "project")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub name: String,
    pub repo_url: String,
    pub repo_id: Option<i64>,
    pub default_branch: String,
    pub root_directory: String,
    pub build_command: String,
    pub framework: Framework,
    pub domain: Option<String>,
    #[sea_orm(unique)]
    pub port: i32,
    pub installation: Option<i64>,
    pub auto_deploy: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::build::Entity")]
    Build,
    #[sea_orm(has_many = "super::deployment::Entity")]
    Deployment,
    #[sea_orm(has_many = "super::environment_variable::Entity")]
    EnvironmentVariable,
}

impl Related<super::build::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Build.def()
    }
}

impl Related<super::deployment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deployment.def()
    }
}

impl Related<super::environment_variable::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnvironmentVariable.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
