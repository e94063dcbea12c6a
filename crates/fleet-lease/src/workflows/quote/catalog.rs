use std::io::Read;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use super::domain::{GroupCode, VehicleGroup};
use super::pricing::PricingError;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read vehicle group catalog: {0}")]
    Csv(#[from] csv::Error),
    #[error("vehicle group on line {line} is invalid: {source}")]
    InvalidRow {
        line: u64,
        #[source]
        source: PricingError,
    },
    #[error("vehicle group {0} appears more than once")]
    DuplicateGroup(GroupCode),
}

/// Parse vehicle groups from a CSV export with a header row.
pub fn parse_vehicle_groups<R: Read>(reader: R) -> Result<Vec<VehicleGroup>, CatalogError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut groups: Vec<VehicleGroup> = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or_default();
        let group = record.deserialize::<GroupRow>(Some(&headers))?.into_group();

        super::pricing::validate_group(&group)
            .map_err(|source| CatalogError::InvalidRow { line, source })?;
        if groups.iter().any(|existing| existing.code == group.code) {
            return Err(CatalogError::DuplicateGroup(group.code));
        }
        groups.push(group);
    }

    Ok(groups)
}

#[derive(Debug, Deserialize)]
struct GroupRow {
    code: String,
    name: String,
    #[serde(default)]
    description: String,
    revision_km: u32,
    #[serde(deserialize_with = "decimal_from_str")]
    revision_cost: Decimal,
    tire_km: u32,
    #[serde(deserialize_with = "decimal_from_str")]
    tire_cost: Decimal,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    ipva_annual: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    licensing_annual: Option<Decimal>,
}

impl GroupRow {
    fn into_group(self) -> VehicleGroup {
        VehicleGroup {
            code: GroupCode(self.code.to_ascii_uppercase()),
            name: self.name,
            description: self.description,
            revision_km: self.revision_km,
            revision_cost: self.revision_cost,
            tire_km: self.tire_km,
            tire_cost: self.tire_cost,
            ipva_annual: self.ipva_annual,
            licensing_annual: self.licensing_annual,
        }
    }
}

fn decimal_from_str<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim().parse::<Decimal>().map_err(serde::de::Error::custom)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "code,name,description,revision_km,revision_cost,tire_km,tire_cost,ipva_annual,licensing_annual\n";

    #[test]
    fn parses_groups_with_optional_costs() {
        let csv = format!(
            "{HEADER}a,Econômico,Hatch 1.0,10000,450.00,40000,1800.00,,\n\
             B+,Sedan,Sedan médio,10000,720.50,45000,2600.00,2400.00,160.00\n"
        );

        let groups = parse_vehicle_groups(csv.as_bytes()).expect("catalog parses");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].code, GroupCode("A".to_string()));
        assert_eq!(groups[0].ipva_annual, None);
        assert_eq!(groups[1].revision_cost, Decimal::new(72_050, 2));
        assert_eq!(groups[1].licensing_annual, Some(Decimal::new(160, 0)));
    }

    #[test]
    fn rejects_zero_intervals() {
        let csv = format!("{HEADER}C,SUV,,0,900.00,40000,3000.00,,\n");

        match parse_vehicle_groups(csv.as_bytes()) {
            Err(CatalogError::InvalidRow {
                source: PricingError::Validation { field, .. },
                ..
            }) => assert_eq!(field, "group.revision_km"),
            other => panic!("expected invalid row, got {other:?}"),
        }
    }

    #[test]
    fn rejects_costs_beyond_the_monetary_range() {
        let csv = format!("{HEADER}B,x,,1,79228162514264337593543950335,40000,2000,,\n");

        match parse_vehicle_groups(csv.as_bytes()) {
            Err(CatalogError::InvalidRow {
                line,
                source: PricingError::Validation { field, .. },
            }) => {
                assert_eq!(line, 2);
                assert_eq!(field, "group.revision_cost");
            }
            other => panic!("expected invalid row, got {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_codes() {
        let csv = format!(
            "{HEADER}A,Econômico,,10000,450.00,40000,1800.00,,\n\
             a,Econômico 2,,10000,450.00,40000,1800.00,,\n"
        );

        assert!(matches!(
            parse_vehicle_groups(csv.as_bytes()),
            Err(CatalogError::DuplicateGroup(code)) if code.0 == "A"
        ));
    }
}
