use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "github_installation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    /// Installation id assigned by the source provider.
    #[sea_orm(unique)]
    pub installation_id: i64,
    pub account_login: String,
    pub account_id: i64,
    pub account_type: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
