// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::{CategoryId, ClientId, FlatEntry, GridEvent, Identity, RecordKind, UserId};

pub const DEFAULT_CATEGORY: CategoryId = CategoryId::new(1);

/// Body posted to `/api/records/{kind}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPayload {
    pub date: String,
    pub category_id: CategoryId,
    pub bag: Vec<FlatEntry>,
    pub client_id: ClientId,
    pub quantity: i64,
    pub user_id: UserId,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::model::optional_cents"
    )]
    pub total_price: Option<i64>,
}

/// The parent of a grid session: who the record is for, when, and which
/// material, plus the entry list the grid last pushed up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordForm {
    pub kind: RecordKind,
    pub identity: Identity,
    pub client_id: ClientId,
    pub client_name: String,
    pub category_id: CategoryId,
    pub date_input: String,
    entries: Vec<FlatEntry>,
    total_quantity: i64,
    total_price: i64,
}

impl RecordForm {
    pub fn new(
        kind: RecordKind,
        identity: Identity,
        client_id: ClientId,
        client_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            identity,
            client_id,
            client_name: client_name.into(),
            category_id: DEFAULT_CATEGORY,
            date_input: String::new(),
            entries: Vec::new(),
            total_quantity: 0,
            total_price: 0,
        }
    }

    pub fn entries(&self) -> &[FlatEntry] {
        &self.entries
    }

    pub const fn total_quantity(&self) -> i64 {
        self.total_quantity
    }

    pub const fn total_price(&self) -> i64 {
        self.total_price
    }

    /// Totals are recomputed here from the pushed entries rather than read
    /// back from the grid, so the two can be checked against each other.
    pub fn apply(&mut self, event: &GridEvent) {
        match event {
            GridEvent::EntriesChanged(entries) => {
                self.entries = entries.clone();
                self.total_quantity = entries
                    .iter()
                    .map(|entry| entry.quantity)
                    .fold(0, i64::saturating_add);
                self.total_price = entries
                    .iter()
                    .map(|entry| {
                        entry
                            .quantity
                            .saturating_mul(entry.unit_price.unwrap_or(0))
                    })
                    .fold(0, i64::saturating_add);
            }
            GridEvent::CategoryChanged(category_id) => {
                self.category_id = *category_id;
            }
            _ => {}
        }
    }

    pub fn apply_all(&mut self, events: &[GridEvent]) {
        for event in events {
            self.apply(event);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.date_input.trim().is_empty() {
            bail!("record date is required -- enter a date and retry");
        }
        parse_form_date(&self.date_input)?;
        if self.identity.user_id.get() <= 0 {
            bail!("signed-in user has no id -- sign in again and retry");
        }
        if self.client_id.get() <= 0 {
            bail!("record client is required -- choose a client and retry");
        }
        if self.category_id.get() <= 0 {
            bail!("record material is required -- choose a category and retry");
        }
        if self.entries.is_empty() {
            bail!("record has no quantities -- fill at least one grid cell and retry");
        }
        if let Some(entry) = self.entries.iter().find(|entry| entry.quantity < 1) {
            bail!(
                "quantity for sphere {} / cylinder {} must be at least 1",
                entry.sph_id,
                entry.cyl_id
            );
        }
        Ok(())
    }

    pub fn payload(&self) -> Result<RecordPayload> {
        self.validate()?;
        let date = parse_form_date(&self.date_input)?
            .format(&Rfc3339)
            .context("format record date")?;
        Ok(RecordPayload {
            date,
            category_id: self.category_id,
            bag: self.entries.clone(),
            client_id: self.client_id,
            quantity: self.total_quantity,
            user_id: self.identity.user_id,
            total_price: (self.kind == RecordKind::Sale).then_some(self.total_price),
        })
    }
}

/// Accepts `YYYY-MM-DDTHH:MM` (optionally with seconds) or a bare
/// `YYYY-MM-DD`, read as UTC.
pub fn parse_form_date(raw: &str) -> Result<OffsetDateTime> {
    let trimmed = raw.trim();
    let with_minutes = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    let with_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let date_only = format_description!("[year]-[month]-[day]");

    if let Ok(value) = PrimitiveDateTime::parse(trimmed, &with_minutes) {
        return Ok(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(trimmed, &with_seconds) {
        return Ok(value.assume_utc());
    }
    let date = Date::parse(trimmed, &date_only).with_context(|| {
        format!("invalid date {trimmed:?} -- use YYYY-MM-DD or YYYY-MM-DDTHH:MM")
    })?;
    Ok(PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
}

/// Renders a timestamp the way `parse_form_date` reads it back.
pub fn format_form_date(value: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}",
        value.year(),
        u8::from(value.month()),
        value.day(),
        value.hour(),
        value.minute()
    )
}
