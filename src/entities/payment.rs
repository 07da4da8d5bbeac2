use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded payment against either an order request or a walk-in sale.
/// Exactly one of `order_id` / `transaction_id` is set.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub order_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,

    /// `cash`, `card`, or `charge_to_account`.
    pub method: String,

    pub amount: Decimal,
    pub tendered: Decimal,
    pub change: Decimal,
    pub received_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::walk_in_transaction::Entity",
        from = "Column::TransactionId",
        to = "super::walk_in_transaction::Column::Id"
    )]
    Transaction,
    #[sea_orm(
        belongs_to = "super::order_request::Entity",
        from = "Column::OrderId",
        to = "super::order_request::Column::Id"
    )]
    Order,
}

impl ActiveModelBehavior for ActiveModel {}
