//! SeaORM entity models
//!
//! Database entities for the user/school store

mod school;
mod task_status;
mod user;

pub use school::{
    Entity as SchoolEntity,
    Model as SchoolRow,
    ActiveModel as SchoolActiveModel,
    Column as SchoolColumn,
};

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use task_status::{
    Entity as TaskStatusEntity,
    Model as TaskStatus,
    ActiveModel as TaskStatusActiveModel,
    Column as TaskStatusColumn,
};
