//! Region lookups and the per-user address book.
//!
//! Region reference data changes only when the seed command runs, so lookups
//! go through an in-process `moka` cache (1 hour TTL).

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, instrument};

use nom_naa_core::{AddressId, UserId};

use crate::db::RepositoryError;
use crate::db::addresses::AddressRepository;
use crate::db::regions::RegionRepository;
use crate::models::address::{
    Address, AddressInput, District, Province, ResolvedAddress, SubDistrict,
};

/// Longest accepted free-text address line.
const MAX_DETAIL_LENGTH: usize = 500;

/// Errors from region lookups and address book operations.
#[derive(Debug, Error)]
pub enum AddressError {
    /// A region looked up by code does not exist.
    #[error("{kind} {code} not found")]
    RegionNotFound { kind: &'static str, code: i32 },

    /// Submitted region codes are unknown or do not nest.
    #[error("{0}")]
    InvalidRegion(String),

    /// Free-text part of the address is empty or too long.
    #[error("{0}")]
    InvalidDetail(String),

    /// The caller has no address with this ID.
    #[error("address not found")]
    NotFound,

    /// The address is still referenced (by an order).
    #[error("{0}")]
    InUse(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

// =============================================================================
// Region directory
// =============================================================================

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum RegionKey {
    Provinces,
    Province(i32),
    Districts { province_code: i32 },
    District(i32),
    SubDistricts { district_code: i32 },
    SubDistrict(i32),
}

#[derive(Debug, Clone)]
enum RegionValue {
    Provinces(Arc<Vec<Province>>),
    Province(Province),
    Districts(Arc<Vec<District>>),
    District(District),
    SubDistricts(Arc<Vec<SubDistrict>>),
    SubDistrict(SubDistrict),
}

/// Cached access to provinces, districts and sub-districts.
#[derive(Clone)]
pub struct RegionDirectory {
    inner: Arc<RegionDirectoryInner>,
}

struct RegionDirectoryInner {
    pool: PgPool,
    cache: Cache<RegionKey, RegionValue>,
}

impl RegionDirectory {
    /// Create a directory backed by `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(20_000)
            .time_to_live(Duration::from_secs(3600))
            .build();

        Self {
            inner: Arc::new(RegionDirectoryInner { pool, cache }),
        }
    }

    fn repo(&self) -> RegionRepository<'_> {
        RegionRepository::new(&self.inner.pool)
    }

    /// All provinces.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Repository` if the database operation fails.
    pub async fn provinces(&self) -> Result<Arc<Vec<Province>>, AddressError> {
        if let Some(RegionValue::Provinces(list)) =
            self.inner.cache.get(&RegionKey::Provinces).await
        {
            debug!("Cache hit for provinces");
            return Ok(list);
        }

        let list = Arc::new(self.repo().provinces().await?);
        self.inner
            .cache
            .insert(RegionKey::Provinces, RegionValue::Provinces(Arc::clone(&list)))
            .await;
        Ok(list)
    }

    /// A province by code.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::RegionNotFound` if no province has this code.
    pub async fn province(&self, code: i32) -> Result<Province, AddressError> {
        let key = RegionKey::Province(code);
        if let Some(RegionValue::Province(p)) = self.inner.cache.get(&key).await {
            return Ok(p);
        }

        let province = self
            .repo()
            .province(code)
            .await?
            .ok_or(AddressError::RegionNotFound {
                kind: "province",
                code,
            })?;
        self.inner
            .cache
            .insert(key, RegionValue::Province(province.clone()))
            .await;
        Ok(province)
    }

    /// Districts of a province.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::RegionNotFound` if the province doesn't exist.
    pub async fn districts(&self, province_code: i32) -> Result<Arc<Vec<District>>, AddressError> {
        let key = RegionKey::Districts { province_code };
        if let Some(RegionValue::Districts(list)) = self.inner.cache.get(&key).await {
            return Ok(list);
        }

        self.province(province_code).await?;
        let list = Arc::new(self.repo().districts_in(province_code).await?);
        self.inner
            .cache
            .insert(key, RegionValue::Districts(Arc::clone(&list)))
            .await;
        Ok(list)
    }

    /// A district by code.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::RegionNotFound` if no district has this code.
    pub async fn district(&self, code: i32) -> Result<District, AddressError> {
        let key = RegionKey::District(code);
        if let Some(RegionValue::District(d)) = self.inner.cache.get(&key).await {
            return Ok(d);
        }

        let district = self
            .repo()
            .district(code)
            .await?
            .ok_or(AddressError::RegionNotFound {
                kind: "district",
                code,
            })?;
        self.inner
            .cache
            .insert(key, RegionValue::District(district.clone()))
            .await;
        Ok(district)
    }

    /// Sub-districts of a district.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::RegionNotFound` if the district doesn't exist.
    pub async fn sub_districts(
        &self,
        district_code: i32,
    ) -> Result<Arc<Vec<SubDistrict>>, AddressError> {
        let key = RegionKey::SubDistricts { district_code };
        if let Some(RegionValue::SubDistricts(list)) = self.inner.cache.get(&key).await {
            return Ok(list);
        }

        self.district(district_code).await?;
        let list = Arc::new(self.repo().sub_districts_in(district_code).await?);
        self.inner
            .cache
            .insert(key, RegionValue::SubDistricts(Arc::clone(&list)))
            .await;
        Ok(list)
    }

    /// A sub-district by code.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::RegionNotFound` if no sub-district has this code.
    pub async fn sub_district(&self, code: i32) -> Result<SubDistrict, AddressError> {
        let key = RegionKey::SubDistrict(code);
        if let Some(RegionValue::SubDistrict(s)) = self.inner.cache.get(&key).await {
            return Ok(s);
        }

        let sub_district = self
            .repo()
            .sub_district(code)
            .await?
            .ok_or(AddressError::RegionNotFound {
                kind: "sub-district",
                code,
            })?;
        self.inner
            .cache
            .insert(key, RegionValue::SubDistrict(sub_district.clone()))
            .await;
        Ok(sub_district)
    }

    /// Resolve submitted codes into reference rows and check they nest.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::InvalidRegion` if a code is unknown or the
    /// regions do not belong to each other.
    /// Returns `AddressError::InvalidDetail` if the address line is unusable.
    pub async fn resolve(&self, input: &AddressInput) -> Result<ResolvedAddress, AddressError> {
        let address_detail = validate_detail(&input.address_detail)?;

        let province = self
            .province(input.province_code)
            .await
            .map_err(unknown_as_invalid)?;
        let district = self
            .district(input.district_code)
            .await
            .map_err(unknown_as_invalid)?;
        let sub_district = self
            .sub_district(input.sub_district_code)
            .await
            .map_err(unknown_as_invalid)?;

        check_hierarchy(&province, &district, &sub_district)?;

        Ok(ResolvedAddress {
            province,
            district,
            sub_district,
            address_detail,
        })
    }
}

fn unknown_as_invalid(e: AddressError) -> AddressError {
    match e {
        AddressError::RegionNotFound { kind, code } => {
            AddressError::InvalidRegion(format!("unknown {kind} code {code}"))
        }
        other => other,
    }
}

/// Require district-in-province and sub-district-in-district.
fn check_hierarchy(
    province: &Province,
    district: &District,
    sub_district: &SubDistrict,
) -> Result<(), AddressError> {
    if district.province_code != province.code {
        return Err(AddressError::InvalidRegion(format!(
            "district {} is not in province {}",
            district.code, province.code
        )));
    }
    if sub_district.district_code != district.code || sub_district.province_code != province.code
    {
        return Err(AddressError::InvalidRegion(format!(
            "sub-district {} is not in district {}",
            sub_district.code, district.code
        )));
    }
    Ok(())
}

fn validate_detail(detail: &str) -> Result<String, AddressError> {
    let detail = detail.trim();
    if detail.is_empty() {
        return Err(AddressError::InvalidDetail(
            "address_detail is required".to_owned(),
        ));
    }
    if detail.chars().count() > MAX_DETAIL_LENGTH {
        return Err(AddressError::InvalidDetail(format!(
            "address_detail must be at most {MAX_DETAIL_LENGTH} characters"
        )));
    }
    Ok(detail.to_owned())
}

// =============================================================================
// Address book
// =============================================================================

/// A user's saved shipping addresses.
pub struct AddressBook<'a> {
    addresses: AddressRepository<'a>,
    regions: &'a RegionDirectory,
}

impl<'a> AddressBook<'a> {
    /// Create an address book service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, regions: &'a RegionDirectory) -> Self {
        Self {
            addresses: AddressRepository::new(pool),
            regions,
        }
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::InvalidRegion` / `InvalidDetail` for bad input.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create(&self, user_id: UserId, input: &AddressInput) -> Result<Address, AddressError> {
        let resolved = self.regions.resolve(input).await?;
        Ok(self.addresses.create(user_id, &resolved).await?)
    }

    /// All of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Repository` if the database operation fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, AddressError> {
        Ok(self.addresses.list_for_user(user_id).await?)
    }

    /// One of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if the user has no such address.
    pub async fn get(&self, id: AddressId, user_id: UserId) -> Result<Address, AddressError> {
        self.addresses
            .get_for_user(id, user_id)
            .await?
            .ok_or(AddressError::NotFound)
    }

    /// Replace one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if the user has no such address.
    #[instrument(skip(self, input), fields(user_id = %user_id, address_id = %id))]
    pub async fn update(
        &self,
        id: AddressId,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, AddressError> {
        let resolved = self.regions.resolve(input).await?;
        self.addresses
            .update(id, user_id, &resolved)
            .await
            .map_err(map_repository)
    }

    /// Delete one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if the user has no such address.
    /// Returns `AddressError::InUse` if an order ships to it.
    pub async fn delete(&self, id: AddressId, user_id: UserId) -> Result<(), AddressError> {
        self.addresses
            .delete(id, user_id)
            .await
            .map_err(map_repository)
    }
}

fn map_repository(e: RepositoryError) -> AddressError {
    match e {
        RepositoryError::NotFound => AddressError::NotFound,
        RepositoryError::Conflict(msg) => AddressError::InUse(msg),
        other => AddressError::Repository(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn bangkok() -> (Province, District, SubDistrict) {
        (
            Province {
                code: 10,
                name_th: "กรุงเทพมหานคร".into(),
                name_en: "Bangkok".into(),
            },
            District {
                code: 1001,
                province_code: 10,
                name_th: "พระนคร".into(),
                name_en: "Phra Nakhon".into(),
            },
            SubDistrict {
                code: 100_101,
                district_code: 1001,
                province_code: 10,
                name_th: "พระบรมมหาราชวัง".into(),
                name_en: "Phra Borom Maha Ratchawang".into(),
                postal_code: "10200".into(),
            },
        )
    }

    #[test]
    fn test_hierarchy_accepts_nested_regions() {
        let (p, d, s) = bangkok();
        assert!(check_hierarchy(&p, &d, &s).is_ok());
    }

    #[test]
    fn test_hierarchy_rejects_district_from_other_province() {
        let (p, mut d, s) = bangkok();
        d.province_code = 50;
        assert!(matches!(
            check_hierarchy(&p, &d, &s),
            Err(AddressError::InvalidRegion(_))
        ));
    }

    #[test]
    fn test_hierarchy_rejects_sub_district_from_other_district() {
        let (p, d, mut s) = bangkok();
        s.district_code = 1002;
        assert!(matches!(
            check_hierarchy(&p, &d, &s),
            Err(AddressError::InvalidRegion(_))
        ));
    }

    #[test]
    fn test_detail_is_trimmed_and_required() {
        assert_eq!(validate_detail("  99/1 Soi 3 ").unwrap(), "99/1 Soi 3");
        assert!(validate_detail("   ").is_err());
        assert!(validate_detail(&"x".repeat(MAX_DETAIL_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_unknown_code_becomes_bad_input() {
        let err = unknown_as_invalid(AddressError::RegionNotFound {
            kind: "district",
            code: 9999,
        });
        assert_eq!(err.to_string(), "unknown district code 9999");
    }
}
