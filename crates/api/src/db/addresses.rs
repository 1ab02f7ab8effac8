//! Address repository.
//!
//! Every read and write is scoped by the owning user: an address that
//! belongs to someone else behaves exactly like one that does not exist.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use nom_naa_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::address::{Address, ResolvedAddress};

const ADDRESS_COLUMNS: &str = "id, user_id, province_code, district_code, sub_district_code, \
                               province_name_th, district_name_th, sub_district_name_th, \
                               postal_code, address_detail, created_at, updated_at";

/// Internal row type for address queries.
#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    province_code: i32,
    district_code: i32,
    sub_district_code: i32,
    province_name_th: String,
    district_name_th: String,
    sub_district_name_th: String,
    postal_code: String,
    address_detail: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            province_code: row.province_code,
            district_code: row.district_code,
            sub_district_code: row.sub_district_code,
            province_name_th: row.province_name_th,
            district_name_th: row.district_name_th,
            sub_district_name_th: row.sub_district_name_th,
            postal_code: row.postal_code,
            address_detail: row.address_detail,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new address for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        address: &ResolvedAddress,
    ) -> Result<Address, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO shop.addresses (
                user_id, province_code, district_code, sub_district_code,
                province_name_th, district_name_th, sub_district_name_th,
                postal_code, address_detail
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(address.province.code)
        .bind(address.district.code)
        .bind(address.sub_district.code)
        .bind(&address.province.name_th)
        .bind(&address.district.name_th)
        .bind(&address.sub_district.name_th)
        .bind(&address.sub_district.postal_code)
        .bind(&address.address_detail)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// List a user's addresses, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.addresses WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    /// Get one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: AddressId,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.addresses WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    /// Get an address regardless of owner (used for order detail).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't exist.
    pub async fn get(&self, id: AddressId) -> Result<Address, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.addresses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Replace one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn update(
        &self,
        id: AddressId,
        user_id: UserId,
        address: &ResolvedAddress,
    ) -> Result<Address, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE shop.addresses
            SET province_code = $3,
                district_code = $4,
                sub_district_code = $5,
                province_name_th = $6,
                district_name_th = $7,
                sub_district_name_th = $8,
                postal_code = $9,
                address_detail = $10
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(address.province.code)
        .bind(address.district.code)
        .bind(address.sub_district.code)
        .bind(&address.province.name_th)
        .bind(&address.district.name_th)
        .bind(&address.sub_district.name_th)
        .bind(&address.sub_district.postal_code)
        .bind(&address.address_detail)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    /// Returns `RepositoryError::Conflict` if an order ships to it.
    pub async fn delete(&self, id: AddressId, user_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(e, |_| "address is used by an order".to_owned())
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Address `id` if `user_id` owns it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn owned_by(
    conn: &mut PgConnection,
    id: AddressId,
    user_id: UserId,
) -> Result<Option<Address>, RepositoryError> {
    let row = sqlx::query_as::<_, AddressRow>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM shop.addresses WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Address::from))
}
