//! User entity: stored portal credentials and access flags

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub login: String,

    /// Portal password, needed to log in again on the user's behalf
    #[sea_orm(column_type = "Text")]
    pub password: String,

    pub school_id: i64,

    pub is_parent: bool,

    pub permission: bool,

    /// Children map from the last sign-in
    #[sea_orm(column_type = "JsonBinary")]
    pub children: Json,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::school::Entity",
        from = "Column::SchoolId",
        to = "super::school::Column::Id"
    )]
    School,

    #[sea_orm(has_many = "super::task_status::Entity")]
    TaskStatuses,
}

impl Related<super::school::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::School.def()
    }
}

impl Related<super::task_status::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskStatuses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
