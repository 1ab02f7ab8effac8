//! Region reference data (provinces, districts, sub-districts).
//!
//! Read-mostly. Rows are written only by `nn-cli seed regions`.

use sqlx::PgPool;

use super::RepositoryError;
use crate::models::address::{District, Province, SubDistrict};

#[derive(Debug, sqlx::FromRow)]
struct ProvinceRow {
    code: i32,
    name_th: String,
    name_en: String,
}

impl From<ProvinceRow> for Province {
    fn from(row: ProvinceRow) -> Self {
        Self {
            code: row.code,
            name_th: row.name_th,
            name_en: row.name_en,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DistrictRow {
    code: i32,
    province_code: i32,
    name_th: String,
    name_en: String,
}

impl From<DistrictRow> for District {
    fn from(row: DistrictRow) -> Self {
        Self {
            code: row.code,
            province_code: row.province_code,
            name_th: row.name_th,
            name_en: row.name_en,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubDistrictRow {
    code: i32,
    district_code: i32,
    province_code: i32,
    name_th: String,
    name_en: String,
    postal_code: String,
}

impl From<SubDistrictRow> for SubDistrict {
    fn from(row: SubDistrictRow) -> Self {
        Self {
            code: row.code,
            district_code: row.district_code,
            province_code: row.province_code,
            name_th: row.name_th,
            name_en: row.name_en,
            postal_code: row.postal_code,
        }
    }
}

/// Counts of rows written by a seed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedCounts {
    pub provinces: usize,
    pub districts: usize,
    pub sub_districts: usize,
}

/// Repository for region reference data.
pub struct RegionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RegionRepository<'a> {
    /// Create a new region repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All provinces ordered by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn provinces(&self) -> Result<Vec<Province>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProvinceRow>(
            "SELECT code, name_th, name_en FROM shop.provinces ORDER BY code",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Province::from).collect())
    }

    /// A province by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn province(&self, code: i32) -> Result<Option<Province>, RepositoryError> {
        let row = sqlx::query_as::<_, ProvinceRow>(
            "SELECT code, name_th, name_en FROM shop.provinces WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Province::from))
    }

    /// Districts of a province ordered by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn districts_in(&self, province_code: i32) -> Result<Vec<District>, RepositoryError> {
        let rows = sqlx::query_as::<_, DistrictRow>(
            r"
            SELECT code, province_code, name_th, name_en
            FROM shop.districts
            WHERE province_code = $1
            ORDER BY code
            ",
        )
        .bind(province_code)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(District::from).collect())
    }

    /// A district by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn district(&self, code: i32) -> Result<Option<District>, RepositoryError> {
        let row = sqlx::query_as::<_, DistrictRow>(
            "SELECT code, province_code, name_th, name_en FROM shop.districts WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(District::from))
    }

    /// Sub-districts of a district ordered by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sub_districts_in(
        &self,
        district_code: i32,
    ) -> Result<Vec<SubDistrict>, RepositoryError> {
        let rows = sqlx::query_as::<_, SubDistrictRow>(
            r"
            SELECT code, district_code, province_code, name_th, name_en, postal_code
            FROM shop.sub_districts
            WHERE district_code = $1
            ORDER BY code
            ",
        )
        .bind(district_code)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(SubDistrict::from).collect())
    }

    /// A sub-district by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sub_district(&self, code: i32) -> Result<Option<SubDistrict>, RepositoryError> {
        let row = sqlx::query_as::<_, SubDistrictRow>(
            r"
            SELECT code, district_code, province_code, name_th, name_en, postal_code
            FROM shop.sub_districts
            WHERE code = $1
            ",
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(SubDistrict::from))
    }

    /// Insert or update all reference rows in one transaction.
    ///
    /// Parents are written before children so foreign keys hold throughout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a row references a missing parent.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn upsert_all(
        &self,
        provinces: &[Province],
        districts: &[District],
        sub_districts: &[SubDistrict],
    ) -> Result<SeedCounts, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for p in provinces {
            sqlx::query(
                r"
                INSERT INTO shop.provinces (code, name_th, name_en)
                VALUES ($1, $2, $3)
                ON CONFLICT (code) DO UPDATE
                SET name_th = EXCLUDED.name_th, name_en = EXCLUDED.name_en
                ",
            )
            .bind(p.code)
            .bind(&p.name_th)
            .bind(&p.name_en)
            .execute(&mut *tx)
            .await?;
        }

        for d in districts {
            sqlx::query(
                r"
                INSERT INTO shop.districts (code, province_code, name_th, name_en)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (code) DO UPDATE
                SET province_code = EXCLUDED.province_code,
                    name_th = EXCLUDED.name_th,
                    name_en = EXCLUDED.name_en
                ",
            )
            .bind(d.code)
            .bind(d.province_code)
            .bind(&d.name_th)
            .bind(&d.name_en)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(e, |_| {
                    format!("district {} references unknown province", d.code)
                })
            })?;
        }

        for s in sub_districts {
            sqlx::query(
                r"
                INSERT INTO shop.sub_districts
                    (code, district_code, province_code, name_th, name_en, postal_code)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (code) DO UPDATE
                SET district_code = EXCLUDED.district_code,
                    province_code = EXCLUDED.province_code,
                    name_th = EXCLUDED.name_th,
                    name_en = EXCLUDED.name_en,
                    postal_code = EXCLUDED.postal_code
                ",
            )
            .bind(s.code)
            .bind(s.district_code)
            .bind(s.province_code)
            .bind(&s.name_th)
            .bind(&s.name_en)
            .bind(&s.postal_code)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(e, |_| {
                    format!("sub-district {} references unknown district", s.code)
                })
            })?;
        }

        tx.commit().await?;

        Ok(SeedCounts {
            provinces: provinces.len(),
            districts: districts.len(),
            sub_districts: sub_districts.len(),
        })
    }
}
