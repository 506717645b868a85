//! PostgreSQL store

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    CasOutcome, InventoryStore, NewOrder, OrderStore, PaymentStore, Result, StoreError,
};
use crate::inventory::{self, StockAdjustment};
use crate::models::{
    DeliveryState, Gateway, GatewayResult, HistorySort, InventoryRecord, NewPaymentTransaction,
    Order, OrderLine, OrderWithLines, PaymentState, PaymentTransaction, UpdateOrderRequest,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Connected to PostgreSQL and applied migrations");
        Ok(Self::new(pool))
    }

    async fn insert_order(tx: &mut Transaction<'_, Postgres>, new_order: NewOrder) -> Result<OrderWithLines> {
        let now = Utc::now();
        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, shop_id, user_id, address, receiver, phone, quantity, total,
                payment_method, payment_state, shipping_method, delivery_state,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 0, $13, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_order.shop_id)
        .bind(new_order.user_id)
        .bind(&new_order.address)
        .bind(&new_order.receiver)
        .bind(&new_order.phone)
        .bind(new_order.quantity)
        .bind(new_order.total)
        .bind(new_order.payment_method)
        .bind(PaymentState::Pending)
        .bind(new_order.shipping_method)
        .bind(DeliveryState::Ordered)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        let mut lines = Vec::with_capacity(new_order.lines.len());
        for (position, line) in (0i32..).zip(&new_order.lines) {
            let row = sqlx::query_as::<_, OrderLine>(
                r#"
                INSERT INTO order_lines (
                    id, order_id, product_id, shop_id, quantity, total, color, note,
                    position, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(line.product_id)
            .bind(order.shop_id)
            .bind(line.quantity)
            .bind(line.total)
            .bind(&line.color)
            .bind(&line.note)
            .bind(position)
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;
            lines.push(row);
        }

        for adjustment in inventory::plan(new_order.shop_id, &new_order.lines) {
            Self::apply_adjustment(tx, &adjustment).await?;
        }

        Ok(OrderWithLines { order, lines })
    }

    async fn apply_adjustment(
        tx: &mut Transaction<'_, Postgres>,
        adjustment: &StockAdjustment,
    ) -> Result<()> {
        let sold = sqlx::query(
            "UPDATE products SET sold_quantity = sold_quantity + $1 WHERE id = $2",
        )
        .bind(i64::from(adjustment.quantity))
        .bind(adjustment.product_id)
        .execute(&mut **tx)
        .await?;
        if sold.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(adjustment.product_id));
        }

        // Guarded decrement: the row only changes if enough stock remains.
        let decremented = sqlx::query_as::<_, (i32,)>(
            r#"
            UPDATE stock_products
            SET quantity = quantity - $1
            WHERE id = (
                SELECT id FROM stock_products
                WHERE product_id = $2 AND shop_id = $3
                ORDER BY id
                LIMIT 1
            )
            AND quantity >= $1
            RETURNING quantity
            "#,
        )
        .bind(adjustment.quantity)
        .bind(adjustment.product_id)
        .bind(adjustment.shop_id)
        .fetch_optional(&mut **tx)
        .await?;

        if decremented.is_none() {
            let available = sqlx::query_as::<_, (i32,)>(
                "SELECT quantity FROM stock_products WHERE product_id = $1 AND shop_id = $2 ORDER BY id LIMIT 1",
            )
            .bind(adjustment.product_id)
            .bind(adjustment.shop_id)
            .fetch_optional(&mut **tx)
            .await?;

            if let Some((available,)) = available {
                return Err(StoreError::InsufficientStock {
                    product_id: adjustment.product_id,
                    requested: adjustment.quantity,
                    available,
                });
            }
        }

        Ok(())
    }

    /// Resolve a conditional update that returned no row.
    async fn conflict_or_missing(&self, id: Uuid) -> Result<CasOutcome<Order>> {
        Ok(match self.get_order(id).await? {
            Some(current) => CasOutcome::Conflict(current),
            None => CasOutcome::Missing,
        })
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_orders(&self, orders: Vec<NewOrder>) -> Result<Vec<OrderWithLines>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(orders.len());
        for new_order in orders {
            created.push(Self::insert_order(&mut tx, new_order).await?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn lines_for_orders(&self, order_ids: &[Uuid]) -> Result<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(
            "SELECT * FROM order_lines WHERE order_id = ANY($1) ORDER BY created_at, order_id, position",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    async fn list_user_orders(
        &self,
        user_id: Uuid,
        limit: i64,
        sort: HistorySort,
    ) -> Result<Vec<Order>> {
        let mut query_builder: sqlx::QueryBuilder<Postgres> = sqlx::QueryBuilder::new(
            "SELECT * FROM orders WHERE deleted_at IS NULL AND user_id = ",
        );
        query_builder.push_bind(user_id);
        query_builder.push(match sort {
            HistorySort::CreatedAt => " ORDER BY created_at DESC",
            HistorySort::Total => " ORDER BY total DESC",
        });
        query_builder.push(" LIMIT ");
        query_builder.push_bind(limit);

        let orders = query_builder
            .build_query_as::<Order>()
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    async fn list_shop_orders(&self, shop_id: Uuid) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE shop_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn transition_delivery(
        &self,
        id: Uuid,
        from: &[DeliveryState],
        to: DeliveryState,
        force_paid: bool,
    ) -> Result<CasOutcome<Order>> {
        let updated = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET delivery_state = $3,
                payment_state = CASE WHEN $4 THEN 'Paid'::payment_state ELSE payment_state END,
                version = version + 1,
                updated_at = $5
            WHERE id = $1 AND deleted_at IS NULL AND delivery_state = ANY($2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(force_paid)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(order) => Ok(CasOutcome::Applied(order)),
            None => self.conflict_or_missing(id).await,
        }
    }

    async fn update_contact(
        &self,
        id: Uuid,
        update: &UpdateOrderRequest,
    ) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET address = COALESCE($2, address),
                receiver = COALESCE($3, receiver),
                phone = COALESCE($4, phone),
                version = version + 1,
                updated_at = $5
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.address)
        .bind(&update.receiver)
        .bind(&update.phone)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_shipment(
        &self,
        id: Uuid,
        carrier_order_code: Option<String>,
        shipment_error: Option<String>,
    ) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET carrier_order_code = $2, shipment_error = $3, updated_at = $4
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(carrier_order_code)
        .bind(shipment_error)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn stock_for(&self, product_id: Uuid, shop_id: Uuid) -> Result<Option<InventoryRecord>> {
        let record = sqlx::query_as::<_, InventoryRecord>(
            "SELECT * FROM stock_products WHERE product_id = $1 AND shop_id = $2 ORDER BY id LIMIT 1",
        )
        .bind(product_id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn sold_quantity(&self, product_id: Uuid) -> Result<Option<i64>> {
        let sold = sqlx::query_as::<_, (i64,)>("SELECT sold_quantity FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sold.map(|(sold,)| sold))
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn insert_transaction(&self, tx: NewPaymentTransaction) -> Result<PaymentTransaction> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            INSERT INTO payment_transactions (
                id, gateway, reference, request_id, order_id, amount, order_info,
                signature, request_params, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tx.gateway)
        .bind(&tx.reference)
        .bind(&tx.request_id)
        .bind(tx.order_id)
        .bind(tx.amount)
        .bind(&tx.order_info)
        .bind(&tx.signature)
        .bind(Json(&tx.request_params))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_transaction(
        &self,
        gateway: Gateway,
        reference: &str,
    ) -> Result<Option<PaymentTransaction>> {
        let row = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE gateway = $1 AND reference = $2",
        )
        .bind(gateway)
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn settle_transaction(
        &self,
        order_id: Uuid,
        transaction_id: Uuid,
        to: PaymentState,
        result: &GatewayResult,
    ) -> Result<CasOutcome<Order>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let settled = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET payment_state = $2, version = version + 1, updated_at = $3
            WHERE id = $1 AND deleted_at IS NULL AND payment_state = 'Pending'
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(to)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order) = settled else {
            tx.rollback().await?;
            return self.conflict_or_missing(order_id).await;
        };

        sqlx::query(
            r#"
            UPDATE payment_transactions
            SET result_code = $2, bank_code = $3, bank_tran_no = $4, card_type = $5,
                transaction_no = $6, pay_date = $7, response_time = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(transaction_id)
        .bind(&result.result_code)
        .bind(&result.bank_code)
        .bind(&result.bank_tran_no)
        .bind(&result.card_type)
        .bind(&result.transaction_no)
        .bind(&result.pay_date)
        .bind(&result.response_time)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CasOutcome::Applied(order))
    }
}
