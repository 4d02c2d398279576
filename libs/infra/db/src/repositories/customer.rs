//! Customers and the supplier identities that own them.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use settlement_core_identifiers::{CompanyNumber, CustomerIdentity, GridParticipantId, PersonalNumber};
use settlement_domain_models::{Customer, SupplierIdentity, SupplierIdentityState};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

mod queries {
    pub const FIND_SUPPLIER_IDENTITY_BY_GLN: &str = "SELECT * FROM supplier_identities WHERE grid_participant_id = $1";
    pub const FIND_CUSTOMER_BY_ID: &str = "SELECT * FROM customers WHERE id = $1";
    pub const FIND_CUSTOMER_BY_IDENTITY: &str =
        "SELECT * FROM customers WHERE identity_kind = $1 AND identity_value = $2";
    pub const INSERT_CUSTOMER: &str = r#"
        INSERT INTO customers (id, supplier_identity_id, identity_kind, identity_value, name, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
    "#;
}

pub struct CustomerRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SupplierIdentityRow {
    id: Uuid,
    grid_participant_id: String,
    name: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    supplier_identity_id: Uuid,
    identity_kind: String,
    identity_value: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find_supplier_identity_by_gln(&self, gln: &GridParticipantId) -> Result<Option<SupplierIdentity>, DbError> {
        let row: Option<SupplierIdentityRow> = sqlx::query_as(queries::FIND_SUPPLIER_IDENTITY_BY_GLN)
            .bind(gln.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::map_supplier_identity).transpose()
    }

    #[instrument(skip(self))]
    pub async fn find_customer_by_id(&self, id: Uuid) -> Result<Option<Customer>, DbError> {
        let row: Option<CustomerRow> = sqlx::query_as(queries::FIND_CUSTOMER_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::map_customer).transpose()
    }

    #[instrument(skip(self))]
    pub async fn find_customer_by_identity(&self, identity: &CustomerIdentity) -> Result<Option<Customer>, DbError> {
        let (kind, value) = identity_kind_value(identity);
        let row: Option<CustomerRow> = sqlx::query_as(queries::FIND_CUSTOMER_BY_IDENTITY)
            .bind(kind)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::map_customer).transpose()
    }

    #[instrument(skip(self, customer))]
    pub async fn insert_customer(&self, customer: &Customer) -> Result<(), DbError> {
        let (kind, value) = identity_kind_value(&customer.number);
        sqlx::query(queries::INSERT_CUSTOMER)
            .bind(customer.id)
            .bind(customer.supplier_identity_id)
            .bind(kind)
            .bind(value)
            .bind(&customer.name)
            .bind(customer.created_at)
            .bind(customer.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn map_supplier_identity(row: SupplierIdentityRow) -> Result<SupplierIdentity, DbError> {
        Ok(SupplierIdentity {
            id: row.id,
            grid_participant_id: GridParticipantId::new(row.grid_participant_id)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            name: row.name,
            state: parse_supplier_identity_state(&row.state)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn map_customer(row: CustomerRow) -> Result<Customer, DbError> {
        let number = match row.identity_kind.as_str() {
            "personal" => CustomerIdentity::Personal(
                PersonalNumber::new(row.identity_value).map_err(|e| DbError::MappingError(e.to_string()))?,
            ),
            "company" => CustomerIdentity::Company(
                CompanyNumber::new(row.identity_value).map_err(|e| DbError::MappingError(e.to_string()))?,
            ),
            other => return Err(DbError::MappingError(format!("unknown identity_kind: {other}"))),
        };
        Ok(Customer {
            id: row.id,
            supplier_identity_id: row.supplier_identity_id,
            number,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn identity_kind_value(identity: &CustomerIdentity) -> (&'static str, &str) {
    match identity {
        CustomerIdentity::Personal(n) => ("personal", n.as_str()),
        CustomerIdentity::Company(n) => ("company", n.as_str()),
    }
}

fn parse_supplier_identity_state(s: &str) -> Result<SupplierIdentityState, DbError> {
    match s {
        "active" => Ok(SupplierIdentityState::Active),
        "legacy" => Ok(SupplierIdentityState::Legacy),
        "archived" => Ok(SupplierIdentityState::Archived),
        other => Err(DbError::MappingError(format!("unknown supplier_identity state: {other}"))),
    }
}
