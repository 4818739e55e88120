// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::grid::GridMode;
use crate::ids::*;

/// A lens power in hundredths of a diopter. Server values arrive as decimal
/// strings ("-1.25", "2.00"); everything numeric (banding, coloring, sorting)
/// goes through this type so the string form never drives a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Diopter(i32);

impl Diopter {
    pub const fn from_hundredths(value: i32) -> Self {
        Self(value)
    }

    pub const fn hundredths(self) -> i32 {
        self.0
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let value = parse_hundredths(raw)?;
        i32::try_from(value).ok().map(Self)
    }

    pub fn format(self) -> String {
        format_hundredths(i64::from(self.0))
    }
}

impl fmt::Display for Diopter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Parses a plain decimal ("2", "-1.5", "+0.25", ".75") into hundredths,
/// rounding extra fraction digits half away from zero.
pub fn parse_hundredths(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|byte| byte.is_ascii_digit())
        || !fraction.bytes().all(|byte| byte.is_ascii_digit())
    {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut fraction_digits = fraction.bytes().map(|byte| i64::from(byte - b'0'));
    let tenths = fraction_digits.next().unwrap_or(0);
    let hundredths = fraction_digits.next().unwrap_or(0);
    let round_up = fraction_digits.next().is_some_and(|digit| digit >= 5);

    let magnitude = whole
        .checked_mul(100)?
        .checked_add(tenths * 10 + hundredths + i64::from(round_up))?;
    Some(if negative { -magnitude } else { magnitude })
}

pub fn format_hundredths(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    format!("{sign}{}.{:02}", magnitude / 100, magnitude % 100)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisValue<I> {
    pub id: I,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

pub type Sphere = AxisValue<SphereId>;
pub type Cylinder = AxisValue<CylinderId>;

impl<I> AxisValue<I> {
    pub fn new(id: I, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }

    pub fn diopter(&self) -> Option<Diopter> {
        Diopter::parse(&self.value)
    }

    pub fn display_value(&self) -> String {
        self.diopter()
            .map(Diopter::format)
            .unwrap_or_else(|| self.value.clone())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SphereSign {
    Positive,
    #[default]
    Negative,
}

impl SphereSign {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Positive => "(+)",
            Self::Negative => "(-)",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positive" | "+" => Some(Self::Positive),
            "negative" | "-" => Some(Self::Negative),
            _ => None,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }
}

const LOW_BAND_CEILING: Diopter = Diopter::from_hundredths(200);
const MID_BAND_CEILING: Diopter = Diopter::from_hundredths(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BandKind {
    Low,
    Mid,
    High,
}

impl BandKind {
    pub const ALL: [Self; 3] = [Self::Low, Self::Mid, Self::High];

    pub fn for_value(value: Diopter) -> Self {
        if value <= LOW_BAND_CEILING {
            Self::Low
        } else if value <= MID_BAND_CEILING {
            Self::Mid
        } else {
            Self::High
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "0.25 - 2",
            Self::Mid => "2.25 - 4",
            Self::High => "4.25 - 6",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CylinderBand {
    pub kind: BandKind,
    pub name: String,
    pub members: Vec<Cylinder>,
}

impl CylinderBand {
    pub fn empty(kind: BandKind) -> Self {
        Self {
            kind,
            name: kind.label().to_owned(),
            members: Vec::new(),
        }
    }

    pub fn contains(&self, id: CylinderId) -> bool {
        self.members.iter().any(|cylinder| cylinder.id == id)
    }
}

/// Splits the full cylinder list into the three fixed bands. Members are
/// sorted by numeric value and rewritten to their two-decimal form.
pub fn partition_cylinders(values: &[Cylinder]) -> Vec<CylinderBand> {
    let mut bands = BandKind::ALL.map(CylinderBand::empty);
    let mut parsed = Vec::with_capacity(values.len());
    for cylinder in values {
        match cylinder.diopter() {
            Some(diopter) => parsed.push((diopter, cylinder)),
            None => {
                tracing::warn!(
                    cylinder_id = cylinder.id.get(),
                    value = %cylinder.value,
                    "skipping cylinder with non-numeric value"
                );
            }
        }
    }
    parsed.sort_by_key(|(diopter, cylinder)| (*diopter, cylinder.id));

    for (diopter, cylinder) in parsed {
        let band = &mut bands[BandKind::for_value(diopter).index()];
        band.members.push(Cylinder::new(cylinder.id, diopter.format()));
    }
    bands.into()
}

/// Orders a sphere range outward from zero so row order never depends on
/// the order the backend happened to return.
pub fn sort_spheres(values: &mut [Sphere]) {
    values.sort_by_key(|sphere| {
        let magnitude = sphere
            .diopter()
            .map(|value| value.hundredths().unsigned_abs())
            .unwrap_or(u32::MAX);
        (magnitude, sphere.id)
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingRecord {
    pub sph: Sphere,
    pub cyl: Cylinder,
    pub quantity: i64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_cents"
    )]
    pub unit_price: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedStock {
    #[serde(deserialize_with = "category_id_flexible")]
    pub category_id: CategoryId,
    pub total_quantity: i64,
    #[serde(default)]
    pub consolidated_bags: Vec<ExistingRecord>,
}

/// An axis named only by its value, as the record detail endpoint sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisLabel {
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

impl AxisLabel {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Numeric comparison when both sides parse, so "-1" names "-1.00".
    pub fn matches<I>(&self, axis: &AxisValue<I>) -> bool {
        match (Diopter::parse(&self.value), axis.diopter()) {
            (Some(left), Some(right)) => left == right,
            _ => self.value.trim() == axis.value.trim(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBag {
    #[serde(default)]
    pub id: Option<i64>,
    pub quantity: i64,
    pub sph: AxisLabel,
    pub cyl: AxisLabel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUser {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordClient {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCategory {
    #[serde(default)]
    pub name: String,
}

/// A stored record as `/api/records/{id}` returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetail {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub user: RecordUser,
    #[serde(default)]
    pub client: RecordClient,
    #[serde(default)]
    pub category: RecordCategory,
    #[serde(default)]
    pub bags: Vec<RecordBag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatEntry {
    pub sph_id: SphereId,
    pub cyl_id: CylinderId,
    pub quantity: i64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_cents"
    )]
    pub unit_price: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPage {
    pub categories: Vec<Category>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub total_pages: i64,
    #[serde(default)]
    pub current_page: i64,
    #[serde(default)]
    pub current_page_size: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    Seller,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "superadmin",
            Self::Admin => "admin",
            Self::Seller => "seller",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "superadmin" | "super-admin" | "super_admin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "seller" => Some(Self::Seller),
            _ => None,
        }
    }
}

/// Who is signed in. Decoded once when the session starts and handed to
/// whatever needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub store_id: Option<StoreId>,
    pub store_name: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Income,
    Output,
    Sale,
}

impl RecordKind {
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Output => "output",
            Self::Sale => "sale",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Output => "output",
            Self::Sale => "sale",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "income" => Some(Self::Income),
            "output" => Some(Self::Output),
            "sale" | "sales" => Some(Self::Sale),
            _ => None,
        }
    }

    pub const fn grid_mode(self) -> GridMode {
        match self {
            Self::Income => GridMode::FreeEntry,
            Self::Output => GridMode::CappedByStock,
            Self::Sale => GridMode::Priced,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Integer(i64),
    Float(f64),
    String(String),
}

impl StringOrNumber {
    fn into_text(self) -> String {
        match self {
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::String(value) => value,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_text)
}

fn category_id_flexible<'de, D>(deserializer: D) -> Result<CategoryId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = StringOrNumber::deserialize(deserializer)?.into_text();
    raw.trim()
        .parse::<i64>()
        .map(CategoryId::new)
        .map_err(|_| serde::de::Error::custom(format!("invalid category id {raw:?}")))
}

pub fn cents_to_decimal(cents: i64) -> f64 {
    cents as f64 / 100.0
}

pub(crate) mod optional_cents {
    use super::{StringOrNumber, cents_to_decimal, parse_hundredths};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(cents) => serializer.serialize_some(&cents_to_decimal(*cents)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<StringOrNumber>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let text = match raw {
            StringOrNumber::Float(value) => format!("{value:.3}"),
            other => other.into_text(),
        };
        parse_hundredths(&text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid price {text:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AxisLabel, BandKind, Cylinder, Diopter, RecordDetail, RecordKind, SphereSign,
        format_hundredths, parse_hundredths, partition_cylinders, sort_spheres,
    };
    use crate::{CylinderId, GridMode, Sphere, SphereId};

    fn cylinders(values: &[&str]) -> Vec<Cylinder> {
        values
            .iter()
            .enumerate()
            .map(|(index, value)| Cylinder::new(CylinderId::new(index as i64 + 1), *value))
            .collect()
    }

    #[test]
    fn diopter_parses_signed_decimals() {
        assert_eq!(Diopter::parse("2.00"), Some(Diopter::from_hundredths(200)));
        assert_eq!(Diopter::parse("-1.25"), Some(Diopter::from_hundredths(-125)));
        assert_eq!(Diopter::parse("+0.5"), Some(Diopter::from_hundredths(50)));
        assert_eq!(Diopter::parse(".75"), Some(Diopter::from_hundredths(75)));
        assert_eq!(Diopter::parse("4"), Some(Diopter::from_hundredths(400)));
        assert_eq!(Diopter::parse(""), None);
        assert_eq!(Diopter::parse("-"), None);
        assert_eq!(Diopter::parse("abc"), None);
        assert_eq!(Diopter::parse("1.2.3"), None);
    }

    #[test]
    fn extra_fraction_digits_round_half_away_from_zero() {
        assert_eq!(parse_hundredths("2.005"), Some(201));
        assert_eq!(parse_hundredths("-2.005"), Some(-201));
        assert_eq!(parse_hundredths("2.004"), Some(200));
    }

    #[test]
    fn hundredths_format_with_two_decimals() {
        assert_eq!(format_hundredths(200), "2.00");
        assert_eq!(format_hundredths(-125), "-1.25");
        assert_eq!(format_hundredths(5), "0.05");
        assert_eq!(format_hundredths(-5), "-0.05");
    }

    #[test]
    fn band_thresholds_keep_boundaries_in_lower_band() {
        assert_eq!(BandKind::for_value(Diopter::from_hundredths(25)), BandKind::Low);
        assert_eq!(BandKind::for_value(Diopter::from_hundredths(200)), BandKind::Low);
        assert_eq!(BandKind::for_value(Diopter::from_hundredths(201)), BandKind::Mid);
        assert_eq!(BandKind::for_value(Diopter::from_hundredths(400)), BandKind::Mid);
        assert_eq!(BandKind::for_value(Diopter::from_hundredths(425)), BandKind::High);
    }

    #[test]
    fn partition_matches_reference_scenario() {
        let bands = partition_cylinders(&cylinders(&[
            "0.25", "2.00", "2.25", "4.00", "4.25", "6.00",
        ]));
        let values = bands
            .iter()
            .map(|band| {
                band.members
                    .iter()
                    .map(|cylinder| cylinder.value.as_str())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        assert_eq!(
            values,
            vec![
                vec!["0.25", "2.00"],
                vec!["2.25", "4.00"],
                vec!["4.25", "6.00"],
            ]
        );
        assert_eq!(bands[0].name, "0.25 - 2");
    }

    #[test]
    fn partition_sorts_and_formats_members() {
        let bands = partition_cylinders(&cylinders(&["1.5", "0.25", "2"]));
        let low = &bands[0];
        assert_eq!(
            low.members
                .iter()
                .map(|cylinder| (cylinder.id.get(), cylinder.value.as_str()))
                .collect::<Vec<_>>(),
            vec![(2, "0.25"), (1, "1.50"), (3, "2.00")]
        );
    }

    #[test]
    fn partition_skips_non_numeric_values_and_keeps_three_bands() {
        let bands = partition_cylinders(&cylinders(&["abc", "3.00"]));
        assert_eq!(bands.len(), 3);
        assert!(bands[0].members.is_empty());
        assert_eq!(bands[1].members.len(), 1);
        assert!(bands[2].members.is_empty());
    }

    #[test]
    fn spheres_sort_outward_from_zero() {
        let mut spheres = vec![
            Sphere::new(SphereId::new(3), "-2.00"),
            Sphere::new(SphereId::new(1), "0.00"),
            Sphere::new(SphereId::new(2), "-0.25"),
        ];
        sort_spheres(&mut spheres);
        assert_eq!(
            spheres.iter().map(|sphere| sphere.id.get()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn sign_toggles_and_parses() {
        assert_eq!(SphereSign::default(), SphereSign::Negative);
        assert_eq!(SphereSign::Negative.toggled(), SphereSign::Positive);
        assert_eq!(SphereSign::parse("positive"), Some(SphereSign::Positive));
        assert_eq!(SphereSign::parse("sideways"), None);
    }

    #[test]
    fn record_kind_selects_grid_mode() {
        assert_eq!(RecordKind::Income.grid_mode(), GridMode::FreeEntry);
        assert_eq!(RecordKind::Output.grid_mode(), GridMode::CappedByStock);
        assert_eq!(RecordKind::Sale.grid_mode(), GridMode::Priced);
        assert_eq!(RecordKind::parse("sales"), Some(RecordKind::Sale));
    }

    #[test]
    fn axis_labels_match_by_numeric_value() {
        let cylinder = Cylinder::new(CylinderId::new(4), "1.00");
        assert!(AxisLabel::new("1").matches(&cylinder));
        assert!(AxisLabel::new("1.00").matches(&cylinder));
        assert!(!AxisLabel::new("1.25").matches(&cylinder));

        let odd = Sphere::new(SphereId::new(9), "plano");
        assert!(AxisLabel::new(" plano").matches(&odd));
    }

    #[test]
    fn record_detail_decodes_wire_shape() {
        let detail: RecordDetail = serde_json::from_str(
            r#"{
                "id": 31,
                "date": "2026-02-10T12:00:00.000Z",
                "type": "income",
                "quantity": 5,
                "user": {"fullName": "Ana Ruiz", "email": "ana@example.com", "role": "admin"},
                "client": {"fullName": "Optica Sol", "address": "Av. Sol 12"},
                "category": {"name": "CR-39"},
                "bags": [{"id": 1, "quantity": 5, "sph": {"value": "-1.00"}, "cyl": {"value": 0.5}}]
            }"#,
        )
        .expect("record detail");
        assert_eq!(detail.id, "31");
        assert_eq!(detail.kind, "income");
        assert_eq!(detail.client.full_name, "Optica Sol");
        assert_eq!(detail.bags[0].cyl.value, "0.5");
    }
}
