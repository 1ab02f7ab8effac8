//! Address and region reference types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nom_naa_core::{AddressId, UserId};

/// A province (changwat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    pub code: i32,
    pub name_th: String,
    pub name_en: String,
}

/// A district (amphoe) within a province.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    pub code: i32,
    pub province_code: i32,
    pub name_th: String,
    pub name_en: String,
}

/// A sub-district (tambon) within a district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDistrict {
    pub code: i32,
    pub district_code: i32,
    pub province_code: i32,
    pub name_th: String,
    pub name_en: String,
    pub postal_code: String,
}

/// A user's shipping address.
///
/// Region names and the postal code are copied from reference data when the
/// address is written, so later reference-data edits do not rewrite history.
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub province_code: i32,
    pub district_code: i32,
    pub sub_district_code: i32,
    pub province_name_th: String,
    pub district_name_th: String,
    pub sub_district_name_th: String,
    pub postal_code: String,
    pub address_detail: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address request body, as sent by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub province_code: i32,
    pub district_code: i32,
    pub sub_district_code: i32,
    pub address_detail: String,
}

/// An address whose codes have been checked against reference data.
#[derive(Debug, Clone)]
pub struct ResolvedAddress {
    pub province: Province,
    pub district: District,
    pub sub_district: SubDistrict,
    pub address_detail: String,
}
