use sea_orm::entity::prelude::*;

/// 短链接记录的软删除状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum FeedState {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "disabled")]
    Disabled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "feeds")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// 64 位内容指纹，按位存为有符号整数；不唯一
    pub url_hash: i64,
    #[sea_orm(column_type = "Text", unique)]
    pub url: String,
    pub owner_user_id: i64,
    pub created_at: DateTimeUtc,
    pub state: FeedState,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
