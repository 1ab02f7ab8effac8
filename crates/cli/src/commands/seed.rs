//! Seed region reference data (provinces, districts, sub-districts).
//!
//! # Usage
//!
//! ```bash
//! nn-cli seed regions --file data/regions.json
//! ```
//!
//! The file holds three arrays:
//!
//! ```json
//! {
//!   "provinces": [{"province_code": 10, "name_th": "...", "name_en": "Bangkok"}],
//!   "districts": [{"district_code": 1001, "province_code": 10, "name_th": "...", "name_en": "..."}],
//!   "sub_districts": [{"sub_district_code": 100101, "district_code": 1001,
//!                      "province_code": 10, "name_th": "...", "name_en": "...",
//!                      "postal_code": 10200}]
//! }
//! ```
//!
//! Rows are upserted by code, so re-running with a corrected file is safe.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use nom_naa_api::db::regions::RegionRepository;
use nom_naa_api::models::address::{District, Province, SubDistrict};

use super::{CommandError, connect};

#[derive(Debug, Deserialize)]
struct RegionFile {
    provinces: Vec<SeedProvince>,
    districts: Vec<SeedDistrict>,
    sub_districts: Vec<SeedSubDistrict>,
}

#[derive(Debug, Deserialize)]
struct SeedProvince {
    province_code: i32,
    name_th: String,
    name_en: String,
}

#[derive(Debug, Deserialize)]
struct SeedDistrict {
    district_code: i32,
    province_code: i32,
    name_th: String,
    name_en: String,
}

#[derive(Debug, Deserialize)]
struct SeedSubDistrict {
    sub_district_code: i32,
    district_code: i32,
    province_code: i32,
    name_th: String,
    name_en: String,
    postal_code: PostalCode,
}

/// Postal codes show up both as numbers and as strings in public datasets.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PostalCode {
    Number(u32),
    Text(String),
}

impl PostalCode {
    fn normalize(self) -> Result<String, CommandError> {
        let code = match self {
            Self::Number(n) => format!("{n:05}"),
            Self::Text(s) => s.trim().to_owned(),
        };
        if code.len() == 5 && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(code)
        } else {
            Err(CommandError::InvalidSeed(format!(
                "postal code must be five digits, got '{code}'"
            )))
        }
    }
}

/// Seed rows, converted and checked for dangling parent codes.
#[derive(Debug)]
struct Regions {
    provinces: Vec<Province>,
    districts: Vec<District>,
    sub_districts: Vec<SubDistrict>,
}

fn parse_regions(content: &str) -> Result<Regions, CommandError> {
    let file: RegionFile = serde_json::from_str(content)?;

    let provinces: Vec<Province> = file
        .provinces
        .into_iter()
        .map(|p| Province {
            code: p.province_code,
            name_th: p.name_th,
            name_en: p.name_en,
        })
        .collect();
    let province_codes: HashSet<i32> = provinces.iter().map(|p| p.code).collect();

    let districts = file
        .districts
        .into_iter()
        .map(|d| {
            if !province_codes.contains(&d.province_code) {
                return Err(CommandError::InvalidSeed(format!(
                    "district {} refers to unknown province {}",
                    d.district_code, d.province_code
                )));
            }
            Ok(District {
                code: d.district_code,
                province_code: d.province_code,
                name_th: d.name_th,
                name_en: d.name_en,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let district_codes: HashSet<(i32, i32)> = districts
        .iter()
        .map(|d| (d.code, d.province_code))
        .collect();

    let sub_districts = file
        .sub_districts
        .into_iter()
        .map(|s| {
            if !district_codes.contains(&(s.district_code, s.province_code)) {
                return Err(CommandError::InvalidSeed(format!(
                    "sub-district {} refers to unknown district {} in province {}",
                    s.sub_district_code, s.district_code, s.province_code
                )));
            }
            Ok(SubDistrict {
                code: s.sub_district_code,
                district_code: s.district_code,
                province_code: s.province_code,
                name_th: s.name_th,
                name_en: s.name_en,
                postal_code: s.postal_code.normalize()?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Regions {
        provinces,
        districts,
        sub_districts,
    })
}

/// Load a region file and upsert it.
///
/// The file is validated completely before connecting to the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, references a
/// missing parent, or the upsert fails.
pub async fn regions(file_path: &str) -> Result<(), CommandError> {
    let path = Path::new(file_path);
    tracing::info!(path = %file_path, "Loading region data from file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let regions = parse_regions(&content)?;

    tracing::info!(
        provinces = regions.provinces.len(),
        districts = regions.districts.len(),
        sub_districts = regions.sub_districts.len(),
        "Parsed region data"
    );

    let pool = connect().await?;
    let counts = RegionRepository::new(&pool)
        .upsert_all(
            &regions.provinces,
            &regions.districts,
            &regions.sub_districts,
        )
        .await?;

    tracing::info!(
        provinces = counts.provinces,
        districts = counts.districts,
        sub_districts = counts.sub_districts,
        "Region data seeded"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "provinces": [{"province_code": 10, "name_th": "กรุงเทพมหานคร", "name_en": "Bangkok"}],
        "districts": [{"district_code": 1001, "province_code": 10, "name_th": "เขตพระนคร", "name_en": "Phra Nakhon"}],
        "sub_districts": [
            {"sub_district_code": 100101, "district_code": 1001, "province_code": 10,
             "name_th": "พระบรมมหาราชวัง", "name_en": "Phra Borom Maha Ratchawang", "postal_code": 10200},
            {"sub_district_code": 100102, "district_code": 1001, "province_code": 10,
             "name_th": "วังบูรพาภิรมย์", "name_en": "Wang Burapha Phirom", "postal_code": "10200"}
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let regions = parse_regions(SAMPLE).unwrap();
        assert_eq!(regions.provinces.len(), 1);
        assert_eq!(regions.districts[0].province_code, 10);
        assert_eq!(regions.sub_districts.len(), 2);
        assert!(regions.sub_districts.iter().all(|s| s.postal_code == "10200"));
    }

    #[test]
    fn test_numeric_postal_codes_are_zero_padded() {
        assert_eq!(PostalCode::Number(1234).normalize().unwrap(), "01234");
        assert!(PostalCode::Text("1020".into()).normalize().is_err());
    }

    #[test]
    fn test_dangling_district_is_rejected() {
        let content = r#"{
            "provinces": [],
            "districts": [{"district_code": 1001, "province_code": 10, "name_th": "x", "name_en": "x"}],
            "sub_districts": []
        }"#;
        assert!(matches!(
            parse_regions(content),
            Err(CommandError::InvalidSeed(_))
        ));
    }
}
