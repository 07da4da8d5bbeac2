use crate::{
    db::DbPool,
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::order_request::{self, Entity as OrderRequestEntity},
    entities::payment::{self, Entity as PaymentEntity},
    entities::product::{self, Entity as ProductEntity},
    entities::product_batch::{self, Entity as BatchEntity},
    entities::walk_in_item::{self, Entity as WalkInItemEntity},
    entities::walk_in_transaction::{self, Entity as WalkInTransactionEntity},
    errors::ServiceError,
    services::batches::{batch_status, BatchStatus},
    services::orders::status,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChannelMetrics {
    pub revenue: Decimal,
    pub count: u64,
}

/// Revenue and volume for one reporting window, split by sales channel.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PeriodMetrics {
    pub walk_in: ChannelMetrics,
    pub orders: ChannelMetrics,
    pub total_revenue: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SalesMetrics {
    pub today: PeriodMetrics,
    pub this_week: PeriodMetrics,
    pub this_month: PeriodMetrics,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailySales {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub transactions: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_sold: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpiryAlerts {
    pub expiring: u64,
    pub expired: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LowStockProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub stock_available: i64,
    pub reorder_level: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderStatusCounts {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub completed: u64,
    pub cancelled: u64,
}

/// Everything the dashboard shows, in one response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub sales: SalesMetrics,
    pub sales_trend: Vec<DailySales>,
    pub top_products: Vec<TopProduct>,
    pub expiry_alerts: ExpiryAlerts,
    pub low_stock: Vec<LowStockProduct>,
    pub order_status: OrderStatusCounts,
}

/// Read-only rollups over sales, orders, and stock for the dashboard.
#[derive(Clone)]
pub struct AnalyticsService {
    db_pool: Arc<DbPool>,
    expiring_window_days: i64,
}

impl AnalyticsService {
    pub fn new(db_pool: Arc<DbPool>, expiring_window_days: i64) -> Self {
        Self {
            db_pool,
            expiring_window_days,
        }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardResponse, ServiceError> {
        Ok(DashboardResponse {
            sales: self.sales_metrics().await?,
            sales_trend: self.sales_trend(7).await?,
            top_products: self.top_products(30, 5).await?,
            expiry_alerts: self.expiry_alerts().await?,
            low_stock: self.low_stock_products().await?,
            order_status: self.order_status_counts().await?,
        })
    }

    /// Revenue comes from recorded payments so refused or unpaid work never
    /// counts as sales.
    #[instrument(skip(self))]
    pub async fn sales_metrics(&self) -> Result<SalesMetrics, ServiceError> {
        let now = Utc::now();
        let today = now.date_naive();
        let start_of_today = start_of_day(today);
        let start_of_week =
            start_of_day(today - Duration::days(today.weekday().num_days_from_monday() as i64));
        let start_of_month = start_of_day(today.with_day0(0).unwrap_or(today));

        Ok(SalesMetrics {
            today: self.period_metrics(start_of_today, now).await?,
            this_week: self.period_metrics(start_of_week, now).await?,
            this_month: self.period_metrics(start_of_month, now).await?,
        })
    }

    async fn period_metrics(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PeriodMetrics, ServiceError> {
        let db = &*self.db_pool;

        let payments = PaymentEntity::find()
            .filter(payment::Column::CreatedAt.gte(from))
            .filter(payment::Column::CreatedAt.lte(to))
            .all(db)
            .await?;

        let mut walk_in = ChannelMetrics {
            revenue: Decimal::ZERO,
            count: 0,
        };
        let mut orders = ChannelMetrics {
            revenue: Decimal::ZERO,
            count: 0,
        };
        for p in payments {
            if p.transaction_id.is_some() {
                walk_in.revenue += p.amount;
                walk_in.count += 1;
            } else {
                orders.revenue += p.amount;
                orders.count += 1;
            }
        }

        let total_revenue = walk_in.revenue + orders.revenue;
        Ok(PeriodMetrics {
            walk_in,
            orders,
            total_revenue,
        })
    }

    /// Daily revenue for the last `days` days, oldest first. Days with no
    /// sales appear as zeros.
    #[instrument(skip(self))]
    pub async fn sales_trend(&self, days: u32) -> Result<Vec<DailySales>, ServiceError> {
        let db = &*self.db_pool;
        let days = days.clamp(1, 90) as i64;
        let today = Utc::now().date_naive();
        let from = start_of_day(today - Duration::days(days - 1));

        let payments = PaymentEntity::find()
            .filter(payment::Column::CreatedAt.gte(from))
            .all(db)
            .await?;

        let mut buckets: HashMap<NaiveDate, (Decimal, u64)> = HashMap::new();
        for p in payments {
            let bucket = buckets.entry(p.created_at.date_naive()).or_default();
            bucket.0 += p.amount;
            bucket.1 += 1;
        }

        let trend = (0..days)
            .map(|offset| {
                let date = today - Duration::days(days - 1 - offset);
                let (revenue, transactions) = buckets.remove(&date).unwrap_or_default();
                DailySales {
                    date,
                    revenue,
                    transactions,
                }
            })
            .collect();
        Ok(trend)
    }

    /// Products with the most units moved over the window, walk-in sales and
    /// dispensed orders combined.
    #[instrument(skip(self))]
    pub async fn top_products(
        &self,
        days: u32,
        limit: usize,
    ) -> Result<Vec<TopProduct>, ServiceError> {
        let db = &*self.db_pool;
        let days = days.clamp(1, 365) as i64;
        let from = start_of_day(Utc::now().date_naive() - Duration::days(days - 1));

        let mut sold: HashMap<Uuid, i64> = HashMap::new();

        let transactions = WalkInTransactionEntity::find()
            .filter(walk_in_transaction::Column::CreatedAt.gte(from))
            .all(db)
            .await?;
        let transaction_ids: Vec<Uuid> = transactions.iter().map(|t| t.id).collect();
        if !transaction_ids.is_empty() {
            let items = WalkInItemEntity::find()
                .filter(walk_in_item::Column::TransactionId.is_in(transaction_ids))
                .all(db)
                .await?;
            for item in items {
                *sold.entry(item.product_id).or_default() += item.quantity as i64;
            }
        }

        let dispensed_orders = OrderRequestEntity::find()
            .filter(order_request::Column::Status.eq(status::COMPLETED))
            .filter(order_request::Column::DispensedAt.gte(from))
            .all(db)
            .await?;
        let order_ids: Vec<Uuid> = dispensed_orders.iter().map(|o| o.id).collect();
        if !order_ids.is_empty() {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.is_in(order_ids))
                .all(db)
                .await?;
            for item in items {
                *sold.entry(item.product_id).or_default() += item.quantity_dispensed as i64;
            }
        }

        let product_ids: Vec<Uuid> = sold.keys().copied().collect();
        let products = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(db)
            .await?;
        let names: HashMap<Uuid, String> =
            products.into_iter().map(|p| (p.id, p.name)).collect();

        let mut top: Vec<TopProduct> = sold
            .into_iter()
            .map(|(product_id, quantity_sold)| TopProduct {
                product_id,
                product_name: names
                    .get(&product_id)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                quantity_sold,
            })
            .collect();
        top.sort_by(|a, b| b.quantity_sold.cmp(&a.quantity_sold));
        top.truncate(limit);
        Ok(top)
    }

    /// Counts of batches currently expiring or expired, ignoring drained ones.
    #[instrument(skip(self))]
    pub async fn expiry_alerts(&self) -> Result<ExpiryAlerts, ServiceError> {
        let db = &*self.db_pool;
        let today = Utc::now().date_naive();

        let batches = BatchEntity::find()
            .filter(product_batch::Column::Quantity.gt(0))
            .all(db)
            .await?;

        let mut alerts = ExpiryAlerts {
            expiring: 0,
            expired: 0,
        };
        for batch in batches {
            match batch_status(
                batch.quantity,
                batch.expiry_date,
                today,
                self.expiring_window_days,
            ) {
                BatchStatus::Expiring => alerts.expiring += 1,
                BatchStatus::Expired => alerts.expired += 1,
                _ => {}
            }
        }
        Ok(alerts)
    }

    /// Active products whose usable stock is at or below the reorder level.
    #[instrument(skip(self))]
    pub async fn low_stock_products(&self) -> Result<Vec<LowStockProduct>, ServiceError> {
        let db = &*self.db_pool;
        let today = Utc::now().date_naive();

        let products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .all(db)
            .await?;
        let batches = BatchEntity::find()
            .filter(product_batch::Column::Quantity.gt(0))
            .filter(product_batch::Column::ExpiryDate.gte(today))
            .all(db)
            .await?;

        let mut available: HashMap<Uuid, i64> = HashMap::new();
        for batch in batches {
            *available.entry(batch.product_id).or_default() += batch.quantity as i64;
        }

        let mut low: Vec<LowStockProduct> = products
            .into_iter()
            .filter_map(|p| {
                let stock = available.get(&p.id).copied().unwrap_or(0);
                (stock <= p.reorder_level as i64).then_some(LowStockProduct {
                    product_id: p.id,
                    product_name: p.name,
                    stock_available: stock,
                    reorder_level: p.reorder_level,
                })
            })
            .collect();
        low.sort_by_key(|p| p.stock_available);
        Ok(low)
    }

    #[instrument(skip(self))]
    pub async fn order_status_counts(&self) -> Result<OrderStatusCounts, ServiceError> {
        let db = &*self.db_pool;
        let count_for = |s: &'static str| {
            OrderRequestEntity::find()
                .filter(order_request::Column::Status.eq(s))
                .count(db)
        };

        Ok(OrderStatusCounts {
            pending: count_for(status::PENDING).await?,
            approved: count_for(status::APPROVED).await?,
            rejected: count_for(status::REJECTED).await?,
            completed: count_for(status::COMPLETED).await?,
            cancelled: count_for(status::CANCELLED).await?,
        })
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}
