use crate::{
    db::DbPool,
    entities::order_request::Entity as OrderRequestEntity,
    entities::payment::{self, Entity as PaymentEntity},
    entities::product::{self, Entity as ProductEntity},
    entities::walk_in_item::{self, Entity as WalkInItemEntity},
    entities::walk_in_transaction::{self, Entity as WalkInTransactionEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::batches,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Philippine VAT, included in shelf prices.
const VAT_DIVISOR: Decimal = dec!(1.12);
/// Statutory senior citizen / PWD discount on the VAT-exempt price.
const DISCOUNT_RATE: Decimal = dec!(0.20);

pub mod method {
    pub const CASH: &str = "cash";
    pub const CARD: &str = "card";
    pub const CHARGE_TO_ACCOUNT: &str = "charge_to_account";

    pub const ALL: &[&str] = &[CASH, CARD, CHARGE_TO_ACCOUNT];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    None,
    Senior,
    Pwd,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Senior => "senior",
            Self::Pwd => "pwd",
        }
    }

    pub fn is_vat_exempt(&self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Decimal,
    pub vat_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Computes receipt totals from the VAT-inclusive subtotal.
///
/// Regular sales pay the shelf price; the VAT line reports the 12% portion
/// already included in it. Senior citizens and PWDs buy VAT-exempt: the VAT
/// is backed out of the shelf price and a 20% discount is applied to the
/// exempt amount.
pub fn compute_totals(subtotal: Decimal, discount: DiscountKind) -> SaleTotals {
    if discount.is_vat_exempt() {
        let vat_exempt = round2(subtotal / VAT_DIVISOR);
        let discount_amount = round2(vat_exempt * DISCOUNT_RATE);
        SaleTotals {
            subtotal,
            vat_amount: Decimal::ZERO,
            discount_amount,
            total_amount: vat_exempt - discount_amount,
        }
    } else {
        let vat_exempt = round2(subtotal / VAT_DIVISOR);
        SaleTotals {
            subtotal,
            vat_amount: subtotal - vat_exempt,
            discount_amount: Decimal::ZERO,
            total_amount: subtotal,
        }
    }
}

fn generate_receipt_number() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("WI-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CheckoutItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct PaymentRequest {
    pub method: String,
    pub tendered: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CheckoutRequest {
    pub customer_name: Option<String>,
    pub discount: DiscountKind,
    #[validate(length(min = 1, message = "A sale needs at least one item"))]
    #[validate]
    pub items: Vec<CheckoutItemRequest>,
    #[validate]
    pub payment: PaymentRequest,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalkInItemResponse {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub tendered: Decimal,
    pub change: Decimal,
    pub received_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub receipt_number: String,
    pub cashier_id: Uuid,
    pub customer_name: Option<String>,
    pub discount: String,
    pub subtotal: Decimal,
    pub vat_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub items: Vec<WalkInItemResponse>,
    pub payment: Option<PaymentResponse>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub cashier_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Service for walk-in sales at the pharmacy counter.
#[derive(Clone)]
pub struct PosService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl PosService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn send_event(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                error!(error = %e, "failed to queue event");
            }
        }
    }

    /// Rings up a walk-in sale: deducts stock first-expiry-first-out,
    /// computes totals, and records the payment, all in one transaction.
    #[instrument(skip(self, request), fields(cashier_id = %cashier_id))]
    pub async fn checkout(
        &self,
        cashier_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<TransactionResponse, ServiceError> {
        request.validate()?;

        if !method::ALL.contains(&request.payment.method.as_str()) {
            return Err(ServiceError::ValidationError(format!(
                "Unknown payment method: {}",
                request.payment.method
            )));
        }

        let db = &*self.db_pool;
        let today = Utc::now().date_naive();

        let mut seen = std::collections::HashSet::new();
        for item in &request.items {
            if !seen.insert(item.product_id) {
                return Err(ServiceError::InvalidInput(format!(
                    "Product {} appears more than once",
                    item.product_id
                )));
            }
        }

        let product_ids: Vec<Uuid> = request.items.iter().map(|i| i.product_id).collect();
        let products = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(db)
            .await?;
        let products_by_id: HashMap<Uuid, &product::Model> =
            products.iter().map(|p| (p.id, p)).collect();

        // Price every line before touching stock.
        let mut lines = Vec::with_capacity(request.items.len());
        let mut subtotal = Decimal::ZERO;
        for item in &request.items {
            let product = products_by_id.get(&item.product_id).ok_or_else(|| {
                ServiceError::InvalidInput(format!("Product {} does not exist", item.product_id))
            })?;
            if !product.is_active {
                return Err(ServiceError::InvalidOperation(format!(
                    "Product '{}' is archived",
                    product.name
                )));
            }
            let line_total = round2(product.unit_price * Decimal::from(item.quantity));
            subtotal += line_total;
            lines.push((item.product_id, item.quantity, product.unit_price, line_total));
        }

        let totals = compute_totals(subtotal, request.discount);

        let change = request.payment.tendered - totals.total_amount;
        if change < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(format!(
                "Tendered {} does not cover the total {}",
                request.payment.tendered, totals.total_amount
            )));
        }

        let txn = db.begin().await?;
        let transaction_id = Uuid::new_v4();
        let now = Utc::now();

        for (product_id, quantity, _, _) in &lines {
            batches::deduct_fefo(&txn, *product_id, *quantity, today).await?;
        }

        let receipt_number = generate_receipt_number();
        walk_in_transaction::ActiveModel {
            id: Set(transaction_id),
            receipt_number: Set(receipt_number.clone()),
            cashier_id: Set(cashier_id),
            customer_name: Set(request.customer_name),
            discount: Set(request.discount.as_str().to_string()),
            subtotal: Set(totals.subtotal),
            vat_amount: Set(totals.vat_amount),
            discount_amount: Set(totals.discount_amount),
            total_amount: Set(totals.total_amount),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for (product_id, quantity, unit_price, line_total) in &lines {
            walk_in_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                transaction_id: Set(transaction_id),
                product_id: Set(*product_id),
                quantity: Set(*quantity),
                unit_price: Set(*unit_price),
                line_total: Set(*line_total),
            }
            .insert(&txn)
            .await?;
        }

        payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(None),
            transaction_id: Set(Some(transaction_id)),
            method: Set(request.payment.method),
            amount: Set(totals.total_amount),
            tendered: Set(request.payment.tendered),
            change: Set(change),
            received_by: Set(cashier_id),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(
            transaction_id = %transaction_id,
            receipt = %receipt_number,
            total = %totals.total_amount,
            "walk-in sale recorded"
        );
        self.send_event(Event::WalkInCompleted {
            transaction_id,
            receipt_number,
            total_amount: totals.total_amount,
        })
        .await;

        self.check_low_stock(lines.iter().map(|(id, ..)| *id)).await;

        self.get_transaction(transaction_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<TransactionResponse, ServiceError> {
        let db = &*self.db_pool;
        let model = WalkInTransactionEntity::find_by_id(transaction_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Transaction {} not found", transaction_id))
            })?;
        self.build_response(model).await
    }

    #[instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        filter: TransactionFilter,
        page: u64,
        per_page: u64,
    ) -> Result<TransactionListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = WalkInTransactionEntity::find();
        if let Some(cashier_id) = filter.cashier_id {
            query = query.filter(walk_in_transaction::Column::CashierId.eq(cashier_id));
        }
        if let Some(from) = filter.from {
            query = query.filter(walk_in_transaction::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(walk_in_transaction::Column::CreatedAt.lte(to));
        }

        let total = query.clone().count(db).await?;
        let models = query
            .order_by_desc(walk_in_transaction::Column::CreatedAt)
            .limit(per_page)
            .offset((page - 1) * per_page)
            .all(db)
            .await?;

        let mut transactions = Vec::with_capacity(models.len());
        for model in models {
            transactions.push(self.build_response(model).await?);
        }

        Ok(TransactionListResponse {
            transactions,
            total,
            page,
            per_page,
        })
    }

    /// Records a payment against a completed order request, for charge
    /// slips settled at the counter.
    #[instrument(skip(self, request))]
    pub async fn record_order_payment(
        &self,
        order_id: Uuid,
        received_by: Uuid,
        amount: Decimal,
        request: PaymentRequest,
    ) -> Result<PaymentResponse, ServiceError> {
        if !method::ALL.contains(&request.method.as_str()) {
            return Err(ServiceError::ValidationError(format!(
                "Unknown payment method: {}",
                request.method
            )));
        }
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Payment amount must be positive".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let order = OrderRequestEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.status != crate::services::orders::status::COMPLETED {
            return Err(ServiceError::InvalidOperation(
                "Payments can only be recorded against completed orders".to_string(),
            ));
        }

        let existing = PaymentEntity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "Order already has a payment recorded".to_string(),
            ));
        }

        let change = request.tendered - amount;
        if change < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(format!(
                "Tendered {} does not cover the amount {}",
                request.tendered, amount
            )));
        }

        let model = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(Some(order_id)),
            transaction_id: Set(None),
            method: Set(request.method),
            amount: Set(amount),
            tendered: Set(request.tendered),
            change: Set(change),
            received_by: Set(received_by),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        info!(order_id = %order_id, payment_id = %model.id, "order payment recorded");
        Ok(payment_to_response(model))
    }

    async fn build_response(
        &self,
        model: walk_in_transaction::Model,
    ) -> Result<TransactionResponse, ServiceError> {
        let db = &*self.db_pool;

        let items = WalkInItemEntity::find()
            .filter(walk_in_item::Column::TransactionId.eq(model.id))
            .all(db)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(db)
            .await?;
        let names: HashMap<Uuid, String> =
            products.into_iter().map(|p| (p.id, p.name)).collect();

        let payment = PaymentEntity::find()
            .filter(payment::Column::TransactionId.eq(model.id))
            .one(db)
            .await?
            .map(payment_to_response);

        Ok(TransactionResponse {
            id: model.id,
            receipt_number: model.receipt_number,
            cashier_id: model.cashier_id,
            customer_name: model.customer_name,
            discount: model.discount,
            subtotal: model.subtotal,
            vat_amount: model.vat_amount,
            discount_amount: model.discount_amount,
            total_amount: model.total_amount,
            items: items
                .into_iter()
                .map(|i| WalkInItemResponse {
                    product_id: i.product_id,
                    product_name: names
                        .get(&i.product_id)
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                    line_total: i.line_total,
                })
                .collect(),
            payment,
            created_at: model.created_at,
        })
    }

    async fn check_low_stock(&self, product_ids: impl Iterator<Item = Uuid>) {
        let db = &*self.db_pool;
        let today = Utc::now().date_naive();

        for product_id in product_ids {
            let product = match ProductEntity::find_by_id(product_id).one(db).await {
                Ok(Some(product)) => product,
                _ => continue,
            };
            let usable = match batches::usable_stock(db, product_id, today).await {
                Ok(usable) => usable,
                Err(_) => continue,
            };
            if usable <= product.reorder_level as i64 {
                self.send_event(Event::LowStock {
                    product_id,
                    product_name: product.name,
                    on_hand: usable as i32,
                    reorder_level: product.reorder_level,
                })
                .await;
            }
        }
    }
}

fn payment_to_response(model: payment::Model) -> PaymentResponse {
    PaymentResponse {
        id: model.id,
        method: model.method,
        amount: model.amount,
        tendered: model.tendered,
        change: model.change,
        received_by: model.received_by,
        created_at: model.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_sale_reports_inclusive_vat() {
        let totals = compute_totals(dec!(112.00), DiscountKind::None);
        assert_eq!(totals.total_amount, dec!(112.00));
        assert_eq!(totals.vat_amount, dec!(12.00));
        assert_eq!(totals.discount_amount, dec!(0));
    }

    #[test]
    fn senior_sale_removes_vat_then_discounts() {
        // 112.00 shelf price: 100.00 VAT-exempt, 20.00 discount, 80.00 due.
        let totals = compute_totals(dec!(112.00), DiscountKind::Senior);
        assert_eq!(totals.vat_amount, dec!(0));
        assert_eq!(totals.discount_amount, dec!(20.00));
        assert_eq!(totals.total_amount, dec!(80.00));
    }

    #[test]
    fn pwd_discount_matches_senior() {
        let senior = compute_totals(dec!(250.50), DiscountKind::Senior);
        let pwd = compute_totals(dec!(250.50), DiscountKind::Pwd);
        assert_eq!(senior, pwd);
    }

    #[test]
    fn rounding_is_bankers() {
        // 99.99 / 1.12 = 89.2767... -> 89.28; 89.28 * 0.20 = 17.856 -> 17.86
        let totals = compute_totals(dec!(99.99), DiscountKind::Senior);
        assert_eq!(totals.discount_amount, dec!(17.86));
        assert_eq!(totals.total_amount, dec!(71.42));
    }

    #[test]
    fn receipt_numbers_have_expected_shape() {
        let receipt = generate_receipt_number();
        assert!(receipt.starts_with("WI-"));
        assert_eq!(receipt.len(), "WI-20260101-ABCDEF".len());
    }
}
