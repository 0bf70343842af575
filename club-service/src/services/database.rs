//! PostgreSQL storage for club-service.

use super::metrics::DB_QUERY_DURATION;
use super::store::{
    ClubStore, ElectionStore, MappingStore, PartyStore, ReceiptStore, RoleStore, TermChange,
    TransactionStore,
};
use super::ServiceError;
use crate::models::{
    Creditor, Donor, Election, Mapping, Member, NewMapping, NewReceipt, NewReference, NewRole,
    NewTransaction, Receipt, ReferenceKind, Role, Transaction,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const RECEIPT_COLUMNS: &str = "receipt_id, name, valid_from, valid_to, creditor_id";
const MAPPING_COLUMNS: &str =
    "mapping_id, matcher, reference_kind, reference_target, purpose_id, area_id";
const TRANSACTION_COLUMNS: &str = "transaction_id, booking_day, value_day, name, description, \
     amount, reference_kind, reference_target, receipt_id, purpose_id, area_id";
const ROLE_COLUMNS: &str = "role_id, name, permissions, holder_member_id";
const ELECTION_COLUMNS: &str = "election_id, role_id, member_id, valid_from, valid_to";

fn reference_from_columns(
    kind: Option<String>,
    target: Option<Uuid>,
) -> Result<Option<NewReference>, ServiceError> {
    match (kind, target) {
        (Some(kind), Some(target)) => {
            let kind = ReferenceKind::parse(&kind).ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!("Unknown reference kind '{}'", kind))
            })?;
            Ok(Some(NewReference::from_parts(kind, target)))
        }
        (None, None) => Ok(None),
        _ => Err(ServiceError::Internal(anyhow::anyhow!(
            "Reference kind and target must both be set or both be empty"
        ))),
    }
}

fn reference_to_columns(reference: Option<&NewReference>) -> (Option<&'static str>, Option<Uuid>) {
    match reference {
        Some(r) => (Some(r.kind().as_str()), Some(r.target())),
        None => (None, None),
    }
}

#[derive(Debug, FromRow)]
struct MappingRow {
    mapping_id: Uuid,
    matcher: String,
    reference_kind: Option<String>,
    reference_target: Option<Uuid>,
    purpose_id: Option<Uuid>,
    area_id: Option<Uuid>,
}

impl TryFrom<MappingRow> for Mapping {
    type Error = ServiceError;

    fn try_from(row: MappingRow) -> Result<Self, Self::Error> {
        Ok(Mapping {
            mapping_id: row.mapping_id,
            matcher: row.matcher,
            reference: reference_from_columns(row.reference_kind, row.reference_target)?,
            purpose_id: row.purpose_id,
            area_id: row.area_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    transaction_id: Uuid,
    booking_day: NaiveDate,
    value_day: NaiveDate,
    name: String,
    description: String,
    amount: Decimal,
    reference_kind: Option<String>,
    reference_target: Option<Uuid>,
    receipt_id: Option<Uuid>,
    purpose_id: Option<Uuid>,
    area_id: Option<Uuid>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = ServiceError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            transaction_id: row.transaction_id,
            booking_day: row.booking_day,
            value_day: row.value_day,
            name: row.name,
            description: row.description,
            amount: row.amount,
            reference: reference_from_columns(row.reference_kind, row.reference_target)?,
            receipt_id: row.receipt_id,
            purpose_id: row.purpose_id,
            area_id: row.area_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: Uuid,
    name: String,
    permissions: Vec<String>,
    holder_member_id: Option<Uuid>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            role_id: row.role_id,
            name: row.name,
            permissions: row.permissions.into_iter().collect(),
            holder_member_id: row.holder_member_id,
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(database_url), fields(service = "club-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // Parties are maintained by the member administration; these exist for
    // seeding and tests.

    #[instrument(skip(self))]
    pub async fn insert_member(
        &self,
        first_name: &str,
        last_name: &str,
        subject: &str,
    ) -> Result<Member, ServiceError> {
        let member = sqlx::query_as::<_, Member>(
            "INSERT INTO members (member_id, first_name, last_name, subject) \
             VALUES ($1, $2, $3, $4) \
             RETURNING member_id, first_name, last_name, subject",
        )
        .bind(Uuid::new_v4())
        .bind(first_name)
        .bind(last_name)
        .bind(subject)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    #[instrument(skip(self))]
    pub async fn insert_donor(&self, name: &str) -> Result<Donor, ServiceError> {
        let donor = sqlx::query_as::<_, Donor>(
            "INSERT INTO donors (donor_id, name) VALUES ($1, $2) RETURNING donor_id, name",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(donor)
    }

    #[instrument(skip(self))]
    pub async fn insert_creditor(&self, name: &str) -> Result<Creditor, ServiceError> {
        let creditor = sqlx::query_as::<_, Creditor>(
            "INSERT INTO creditors (creditor_id, name) VALUES ($1, $2) \
             RETURNING creditor_id, name",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(creditor)
    }
}

#[async_trait]
impl PartyStore for Database {
    #[instrument(skip(self), fields(member_id = %member_id))]
    async fn find_member(&self, member_id: Uuid) -> Result<Option<Member>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_member"])
            .start_timer();

        let member = sqlx::query_as::<_, Member>(
            "SELECT member_id, first_name, last_name, subject FROM members WHERE member_id = $1",
        )
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(member)
    }

    #[instrument(skip(self), fields(donor_id = %donor_id))]
    async fn find_donor(&self, donor_id: Uuid) -> Result<Option<Donor>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_donor"])
            .start_timer();

        let donor =
            sqlx::query_as::<_, Donor>("SELECT donor_id, name FROM donors WHERE donor_id = $1")
                .bind(donor_id)
                .fetch_optional(&self.pool)
                .await?;

        timer.observe_duration();
        Ok(donor)
    }

    #[instrument(skip(self), fields(creditor_id = %creditor_id))]
    async fn find_creditor(&self, creditor_id: Uuid) -> Result<Option<Creditor>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_creditor"])
            .start_timer();

        let creditor = sqlx::query_as::<_, Creditor>(
            "SELECT creditor_id, name FROM creditors WHERE creditor_id = $1",
        )
        .bind(creditor_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(creditor)
    }
}

#[async_trait]
impl ReceiptStore for Database {
    #[instrument(skip(self, receipt), fields(creditor_id = %receipt.creditor_id))]
    async fn insert_receipt(&self, receipt: NewReceipt) -> Result<Receipt, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_receipt"])
            .start_timer();

        let query = format!(
            "INSERT INTO receipts ({RECEIPT_COLUMNS}) VALUES ($1, $2, $3, $4, $5) \
             RETURNING {RECEIPT_COLUMNS}"
        );
        let receipt = sqlx::query_as::<_, Receipt>(&query)
            .bind(Uuid::new_v4())
            .bind(&receipt.name)
            .bind(receipt.valid_from)
            .bind(receipt.valid_to)
            .bind(receipt.creditor_id)
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(receipt)
    }

    #[instrument(skip(self, receipt), fields(receipt_id = %receipt_id))]
    async fn update_receipt(
        &self,
        receipt_id: Uuid,
        receipt: NewReceipt,
    ) -> Result<Option<Receipt>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_receipt"])
            .start_timer();

        let query = format!(
            "UPDATE receipts SET name = $2, valid_from = $3, valid_to = $4, creditor_id = $5 \
             WHERE receipt_id = $1 RETURNING {RECEIPT_COLUMNS}"
        );
        let receipt = sqlx::query_as::<_, Receipt>(&query)
            .bind(receipt_id)
            .bind(&receipt.name)
            .bind(receipt.valid_from)
            .bind(receipt.valid_to)
            .bind(receipt.creditor_id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(receipt)
    }

    #[instrument(skip(self), fields(receipt_id = %receipt_id))]
    async fn find_receipt(&self, receipt_id: Uuid) -> Result<Option<Receipt>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_receipt"])
            .start_timer();

        let query = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE receipt_id = $1");
        let receipt = sqlx::query_as::<_, Receipt>(&query)
            .bind(receipt_id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(receipt)
    }

    #[instrument(skip(self))]
    async fn list_receipts(&self) -> Result<Vec<Receipt>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_receipts"])
            .start_timer();

        let query =
            format!("SELECT {RECEIPT_COLUMNS} FROM receipts ORDER BY valid_from, receipt_id");
        let receipts = sqlx::query_as::<_, Receipt>(&query)
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(receipts)
    }

    #[instrument(skip(self), fields(receipt_id = %receipt_id))]
    async fn delete_receipt(&self, receipt_id: Uuid) -> Result<bool, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_receipt"])
            .start_timer();

        let result = sqlx::query("DELETE FROM receipts WHERE receipt_id = $1")
            .bind(receipt_id)
            .execute(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(creditor_id = %creditor_id, date = %date))]
    async fn find_receipts_covering(
        &self,
        creditor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Receipt>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_receipts_covering"])
            .start_timer();

        let query = format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts \
             WHERE creditor_id = $1 AND valid_from <= $2 AND valid_to >= $2 \
             ORDER BY valid_from, receipt_id"
        );
        let receipts = sqlx::query_as::<_, Receipt>(&query)
            .bind(creditor_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(receipts)
    }
}

#[async_trait]
impl MappingStore for Database {
    #[instrument(skip(self, mapping), fields(matcher = %mapping.matcher))]
    async fn insert_mapping(&self, mapping: NewMapping) -> Result<Mapping, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_mapping"])
            .start_timer();

        let (kind, target) = reference_to_columns(mapping.reference.as_ref());
        let query = format!(
            "INSERT INTO mappings ({MAPPING_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {MAPPING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MappingRow>(&query)
            .bind(Uuid::new_v4())
            .bind(&mapping.matcher)
            .bind(kind)
            .bind(target)
            .bind(mapping.purpose_id)
            .bind(mapping.area_id)
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();
        row.try_into()
    }

    #[instrument(skip(self, mapping), fields(mapping_id = %mapping_id))]
    async fn update_mapping(
        &self,
        mapping_id: Uuid,
        mapping: NewMapping,
    ) -> Result<Option<Mapping>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_mapping"])
            .start_timer();

        let (kind, target) = reference_to_columns(mapping.reference.as_ref());
        let query = format!(
            "UPDATE mappings SET matcher = $2, reference_kind = $3, reference_target = $4, \
             purpose_id = $5, area_id = $6 WHERE mapping_id = $1 RETURNING {MAPPING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MappingRow>(&query)
            .bind(mapping_id)
            .bind(&mapping.matcher)
            .bind(kind)
            .bind(target)
            .bind(mapping.purpose_id)
            .bind(mapping.area_id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        row.map(Mapping::try_from).transpose()
    }

    #[instrument(skip(self), fields(mapping_id = %mapping_id))]
    async fn find_mapping(&self, mapping_id: Uuid) -> Result<Option<Mapping>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_mapping"])
            .start_timer();

        let query = format!("SELECT {MAPPING_COLUMNS} FROM mappings WHERE mapping_id = $1");
        let row = sqlx::query_as::<_, MappingRow>(&query)
            .bind(mapping_id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        row.map(Mapping::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_mappings(&self) -> Result<Vec<Mapping>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_mappings"])
            .start_timer();

        let query = format!("SELECT {MAPPING_COLUMNS} FROM mappings ORDER BY seq");
        let rows = sqlx::query_as::<_, MappingRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        rows.into_iter().map(Mapping::try_from).collect()
    }

    #[instrument(skip(self), fields(mapping_id = %mapping_id))]
    async fn delete_mapping(&self, mapping_id: Uuid) -> Result<bool, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_mapping"])
            .start_timer();

        let result = sqlx::query("DELETE FROM mappings WHERE mapping_id = $1")
            .bind(mapping_id)
            .execute(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TransactionStore for Database {
    #[instrument(skip(self, transaction), fields(value_day = %transaction.value_day))]
    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_transaction"])
            .start_timer();

        let (kind, target) = reference_to_columns(transaction.reference.as_ref());
        let query = format!(
            "INSERT INTO transactions ({TRANSACTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {TRANSACTION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(Uuid::new_v4())
            .bind(transaction.booking_day)
            .bind(transaction.value_day)
            .bind(&transaction.name)
            .bind(&transaction.description)
            .bind(transaction.amount)
            .bind(kind)
            .bind(target)
            .bind(transaction.receipt_id)
            .bind(transaction.purpose_id)
            .bind(transaction.area_id)
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();
        row.try_into()
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    async fn find_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_transaction"])
            .start_timer();

        let query =
            format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE transaction_id = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        row.map(Transaction::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_transactions(&self) -> Result<Vec<Transaction>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_transactions"])
            .start_timer();

        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY seq");
        let rows = sqlx::query_as::<_, TransactionRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        rows.into_iter().map(Transaction::try_from).collect()
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    async fn delete_transaction(&self, transaction_id: Uuid) -> Result<bool, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_transaction"])
            .start_timer();

        let result = sqlx::query("DELETE FROM transactions WHERE transaction_id = $1")
            .bind(transaction_id)
            .execute(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleStore for Database {
    #[instrument(skip(self, role), fields(name = %role.name))]
    async fn insert_role(&self, role: NewRole) -> Result<Role, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_role"])
            .start_timer();

        let permissions: Vec<String> = role.permissions.into_iter().collect();
        let query = format!(
            "INSERT INTO roles (role_id, name, permissions) VALUES ($1, $2, $3) \
             RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RoleRow>(&query)
            .bind(Uuid::new_v4())
            .bind(&role.name)
            .bind(&permissions)
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(row.into())
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_role"])
            .start_timer();

        let query = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE role_id = $1");
        let row = sqlx::query_as::<_, RoleRow>(&query)
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(row.map(Role::from))
    }

    #[instrument(skip(self))]
    async fn list_roles(&self) -> Result<Vec<Role>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_roles"])
            .start_timer();

        let query = format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name");
        let rows = sqlx::query_as::<_, RoleRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(rows.into_iter().map(Role::from).collect())
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    async fn delete_role(&self, role_id: Uuid) -> Result<bool, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_role"])
            .start_timer();

        // elections cascade
        let result = sqlx::query("DELETE FROM roles WHERE role_id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    async fn add_permission(
        &self,
        role_id: Uuid,
        permission: &str,
    ) -> Result<Option<Role>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_permission"])
            .start_timer();

        let query = format!(
            "UPDATE roles SET permissions = CASE \
                 WHEN $2 = ANY(permissions) THEN permissions \
                 ELSE array_append(permissions, $2) END \
             WHERE role_id = $1 RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RoleRow>(&query)
            .bind(role_id)
            .bind(permission)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(row.map(Role::from))
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    async fn remove_permission(
        &self,
        role_id: Uuid,
        permission: &str,
    ) -> Result<Option<Role>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_permission"])
            .start_timer();

        let query = format!(
            "UPDATE roles SET permissions = array_remove(permissions, $2) \
             WHERE role_id = $1 RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RoleRow>(&query)
            .bind(role_id)
            .bind(permission)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(row.map(Role::from))
    }
}

#[async_trait]
impl ElectionStore for Database {
    #[instrument(skip(self), fields(role_id = %role_id, member_id = %member_id))]
    async fn open_term(
        &self,
        role_id: Uuid,
        member_id: Uuid,
        on: NaiveDate,
    ) -> Result<TermChange, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["open_term"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT role_id FROM roles WHERE role_id = $1 FOR UPDATE")
                .bind(role_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(ServiceError::not_found("Role", role_id));
        }

        let close = format!(
            "UPDATE elections SET valid_to = $2 WHERE role_id = $1 AND valid_to IS NULL \
             RETURNING {ELECTION_COLUMNS}"
        );
        let closed = sqlx::query_as::<_, Election>(&close)
            .bind(role_id)
            .bind(on)
            .fetch_optional(&mut *tx)
            .await?;

        let open = format!(
            "INSERT INTO elections ({ELECTION_COLUMNS}) VALUES ($1, $2, $3, $4, NULL) \
             RETURNING {ELECTION_COLUMNS}"
        );
        let opened = sqlx::query_as::<_, Election>(&open)
            .bind(Uuid::new_v4())
            .bind(role_id)
            .bind(member_id)
            .bind(on)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE roles SET holder_member_id = $2 WHERE role_id = $1")
            .bind(role_id)
            .bind(member_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        timer.observe_duration();
        Ok(TermChange { closed, opened })
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    async fn close_term(
        &self,
        role_id: Uuid,
        on: NaiveDate,
    ) -> Result<Option<Election>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["close_term"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT role_id FROM roles WHERE role_id = $1 FOR UPDATE")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        let close = format!(
            "UPDATE elections SET valid_to = $2 WHERE role_id = $1 AND valid_to IS NULL \
             RETURNING {ELECTION_COLUMNS}"
        );
        let closed = sqlx::query_as::<_, Election>(&close)
            .bind(role_id)
            .bind(on)
            .fetch_optional(&mut *tx)
            .await?;

        if closed.is_some() {
            sqlx::query("UPDATE roles SET holder_member_id = NULL WHERE role_id = $1")
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        timer.observe_duration();
        Ok(closed)
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    async fn find_open_term(&self, role_id: Uuid) -> Result<Option<Election>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_open_term"])
            .start_timer();

        let query = format!(
            "SELECT {ELECTION_COLUMNS} FROM elections WHERE role_id = $1 AND valid_to IS NULL"
        );
        let term = sqlx::query_as::<_, Election>(&query)
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(term)
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    async fn list_terms(&self, role_id: Uuid) -> Result<Vec<Election>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_terms"])
            .start_timer();

        let query = format!(
            "SELECT {ELECTION_COLUMNS} FROM elections WHERE role_id = $1 \
             ORDER BY valid_from, valid_to NULLS LAST"
        );
        let terms = sqlx::query_as::<_, Election>(&query)
            .bind(role_id)
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(terms)
    }
}

#[async_trait]
impl ClubStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1").execute(&self.pool).await?;

        timer.observe_duration();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_columns_round_trip() {
        let id = Uuid::new_v4();
        let reference = NewReference::Donor { donor: id };
        let (kind, target) = reference_to_columns(Some(&reference));
        assert_eq!(kind, Some("donor"));

        let parsed = reference_from_columns(kind.map(str::to_string), target).unwrap();
        assert_eq!(parsed, Some(reference));
        assert_eq!(reference_from_columns(None, None).unwrap(), None);
    }

    #[test]
    fn half_set_reference_columns_are_rejected() {
        assert!(reference_from_columns(Some("member".to_string()), None).is_err());
        assert!(reference_from_columns(Some("sponsor".to_string()), Some(Uuid::new_v4())).is_err());
    }
}
