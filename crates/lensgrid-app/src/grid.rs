// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::{
    BandKind, CategoryId, ConsolidatedStock, Cylinder, CylinderBand, CylinderId, ExistingRecord,
    FetchError, FetchLane, FetchReply, FetchRequest, FetchTicket, FlatEntry, Generations,
    RecordBag, RecordDetail, RecordId, Sphere, SphereId, SphereSign, parse_hundredths,
    partition_cylinders, sort_spheres,
};

/// Largest quantity one cell accepts. Longer input reads as zero.
pub const MAX_CELL_QUANTITY: i64 = 1_000_000;
/// Largest unit price in cents.
pub const MAX_UNIT_PRICE: i64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridMode {
    FreeEntry,
    CappedByStock,
    Priced,
    /// Read-only consolidated stock for one category.
    StockOverview,
    /// Read-only bags of one stored record.
    RecordDetail,
}

impl GridMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeEntry => "free-entry",
            Self::CappedByStock => "capped-by-available-stock",
            Self::Priced => "priced",
            Self::StockOverview => "stock-overview",
            Self::RecordDetail => "record-detail",
        }
    }

    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::StockOverview | Self::RecordDetail)
    }

    pub const fn loads_stock(self) -> bool {
        matches!(self, Self::CappedByStock | Self::Priced | Self::StockOverview)
    }

    /// Stock-checked grids disable cells whose available quantity is zero.
    pub const fn checks_stock(self) -> bool {
        matches!(self, Self::CappedByStock | Self::Priced)
    }

    pub const fn is_priced(self) -> bool {
        matches!(self, Self::Priced)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub sph: SphereId,
    pub cyl: CylinderId,
}

impl CellKey {
    pub const fn new(sph: SphereId, cyl: CylinderId) -> Self {
        Self { sph, cyl }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.sph, self.cyl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTotal {
    Amount(i64),
    Bonus,
}

impl LineTotal {
    pub const fn cents(self) -> i64 {
        match self {
            Self::Amount(cents) => cents,
            Self::Bonus => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Plain {
        quantity: i64,
    },
    Priced {
        quantity: i64,
        unit_price: i64,
        bonus: bool,
    },
}

impl Cell {
    pub const fn quantity(self) -> i64 {
        match self {
            Self::Plain { quantity } | Self::Priced { quantity, .. } => quantity,
        }
    }

    pub const fn unit_price(self) -> Option<i64> {
        match self {
            Self::Plain { .. } => None,
            Self::Priced { unit_price, .. } => Some(unit_price),
        }
    }

    pub const fn bonus(self) -> bool {
        matches!(self, Self::Priced { bonus: true, .. })
    }

    pub const fn line_total(self) -> Option<LineTotal> {
        match self {
            Self::Plain { .. } => None,
            Self::Priced { bonus: true, .. } => Some(LineTotal::Bonus),
            Self::Priced {
                quantity,
                unit_price,
                ..
            } => Some(LineTotal::Amount(quantity.saturating_mul(unit_price))),
        }
    }

    const fn with_quantity(self, quantity: i64) -> Self {
        match self {
            Self::Plain { .. } => Self::Plain { quantity },
            Self::Priced {
                unit_price, bonus, ..
            } => Self::Priced {
                quantity,
                unit_price,
                bonus,
            },
        }
    }
}

/// The sparse SPH×CYL matrix. Absent keys are implicitly zero. Values are
/// replaced wholesale on every edit; nothing mutates a shared instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridState {
    cells: BTreeMap<CellKey, Cell>,
}

impl GridState {
    pub fn get(&self, key: CellKey) -> Option<Cell> {
        self.cells.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellKey, Cell)> + '_ {
        self.cells.iter().map(|(key, cell)| (*key, *cell))
    }

    pub fn with_cell(&self, key: CellKey, cell: Cell) -> Self {
        let mut cells = self.cells.clone();
        cells.insert(key, cell);
        Self { cells }
    }

    pub fn flat_entries(&self) -> Vec<FlatEntry> {
        self.iter()
            .filter(|(_, cell)| cell.quantity() > 0)
            .map(|(key, cell)| FlatEntry {
                sph_id: key.sph,
                cyl_id: key.cyl,
                quantity: cell.quantity(),
                unit_price: cell.unit_price(),
            })
            .collect()
    }

    pub fn total_quantity(&self) -> i64 {
        self.cells
            .values()
            .map(|cell| cell.quantity())
            .fold(0, i64::saturating_add)
    }

    pub fn total_price(&self) -> i64 {
        self.cells
            .values()
            .filter_map(|cell| cell.line_total())
            .map(LineTotal::cents)
            .fold(0, i64::saturating_add)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    pub quantity: i64,
    pub unit_price: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableStock {
    pub category_id: CategoryId,
    pub total_quantity: i64,
    levels: BTreeMap<CellKey, StockLevel>,
}

impl AvailableStock {
    pub fn level(&self, key: CellKey) -> Option<StockLevel> {
        self.levels.get(&key).copied()
    }

    pub fn quantity(&self, key: CellKey) -> i64 {
        self.level(key).map_or(0, |level| level.quantity)
    }
}

impl From<ConsolidatedStock> for AvailableStock {
    fn from(stock: ConsolidatedStock) -> Self {
        let levels = stock
            .consolidated_bags
            .into_iter()
            .map(|bag| {
                (
                    CellKey::new(bag.sph.id, bag.cyl.id),
                    StockLevel {
                        quantity: bag.quantity,
                        unit_price: bag.unit_price,
                    },
                )
            })
            .collect();
        Self {
            category_id: stock.category_id,
            total_quantity: stock.total_quantity,
            levels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("sphere {0} is not in the loaded range")]
    UnknownSphere(SphereId),
    #[error("cylinder {0} is not in the active band")]
    UnknownCylinder(CylinderId),
    #[error("cell {0} has no available stock")]
    CellDisabled(CellKey),
    #[error("unit prices only apply to the priced grid")]
    NotPriced,
    #[error("cell {0} is bonused; its unit price is fixed at zero")]
    BonusLocked(CellKey),
    #[error("band {0} does not exist")]
    UnknownBand(usize),
    #[error("this grid is read-only")]
    ReadOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridEvent {
    EntriesChanged(Vec<FlatEntry>),
    BandsLoaded { bands: usize, cylinders: usize },
    SpheresLoaded { sign: SphereSign, count: usize },
    StockLoaded {
        category_id: CategoryId,
        total_quantity: i64,
    },
    RecordLoaded {
        bags: usize,
        quantity: i64,
    },
    FetchFailed { lane: FetchLane, error: FetchError },
    BandChanged(usize),
    CategoryChanged(CategoryId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridCommand {
    SetCell {
        sph: SphereId,
        cyl: CylinderId,
        raw: String,
    },
    SetUnitPrice {
        sph: SphereId,
        cyl: CylinderId,
        raw: String,
    },
    SetBonus {
        sph: SphereId,
        cyl: CylinderId,
        bonus: bool,
    },
    SelectBand(usize),
    NextBand,
    PrevBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    pub key: CellKey,
    pub quantity: i64,
    pub available: Option<i64>,
    pub editable: bool,
    pub color: BandKind,
    pub unit_price: Option<i64>,
    pub bonus: bool,
    pub line_total: Option<LineTotal>,
}

/// Quantity text is read the way a lenient integer prompt would: leading
/// digits count, anything else (empty, letters, negative numbers, values
/// above [`MAX_CELL_QUANTITY`]) is zero.
pub fn parse_quantity_or_zero(raw: &str) -> i64 {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits_end = rest
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..digits_end];
    if negative || digits.is_empty() {
        return 0;
    }
    match digits.parse::<i64>() {
        Ok(quantity) if quantity <= MAX_CELL_QUANTITY => quantity,
        _ => 0,
    }
}

/// A cell's color follows its own cylinder value, never the tab it sits in.
pub fn band_color(cylinder: &Cylinder) -> BandKind {
    cylinder
        .diopter()
        .map_or(BandKind::High, BandKind::for_value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSession {
    mode: GridMode,
    bands: Vec<CylinderBand>,
    active_band: usize,
    sign: SphereSign,
    spheres: Vec<Sphere>,
    category: Option<CategoryId>,
    stock: Option<AvailableStock>,
    record: Option<RecordId>,
    detail: Option<RecordDetail>,
    state: GridState,
    generations: Generations,
}

impl GridSession {
    pub fn new(mode: GridMode) -> Self {
        Self {
            mode,
            bands: Vec::new(),
            active_band: 0,
            sign: SphereSign::default(),
            spheres: Vec::new(),
            category: None,
            stock: None,
            record: None,
            detail: None,
            state: GridState::default(),
            generations: Generations::default(),
        }
    }

    pub fn with_sign(mut self, sign: SphereSign) -> Self {
        self.sign = sign;
        self
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_record(mut self, record: RecordId) -> Self {
        self.record = Some(record);
        self
    }

    pub const fn mode(&self) -> GridMode {
        self.mode
    }

    pub const fn sign(&self) -> SphereSign {
        self.sign
    }

    pub const fn category(&self) -> Option<CategoryId> {
        self.category
    }

    pub const fn record(&self) -> Option<RecordId> {
        self.record
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    pub fn stock(&self) -> Option<&AvailableStock> {
        self.stock.as_ref()
    }

    pub fn detail(&self) -> Option<&RecordDetail> {
        self.detail.as_ref()
    }

    pub fn bands(&self) -> &[CylinderBand] {
        &self.bands
    }

    pub const fn active_band_index(&self) -> usize {
        self.active_band
    }

    pub fn active_band(&self) -> Option<&CylinderBand> {
        self.bands.get(self.active_band)
    }

    pub fn rows(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn columns(&self) -> &[Cylinder] {
        self.active_band()
            .map(|band| band.members.as_slice())
            .unwrap_or_default()
    }

    /// Requests issued when the grid first appears.
    pub fn initial_requests(&mut self) -> Vec<FetchTicket> {
        let mut tickets = vec![self.begin_cylinder_load(), self.begin_sphere_load(self.sign)];
        if self.mode.loads_stock()
            && let Some(category) = self.category
        {
            tickets.push(self.begin_stock_load(category));
        }
        if self.mode == GridMode::RecordDetail
            && let Some(record) = self.record
        {
            tickets.push(self.begin_record_load(record));
        }
        tickets
    }

    pub fn begin_cylinder_load(&mut self) -> FetchTicket {
        self.bands.clear();
        self.active_band = 0;
        self.generations.issue(FetchRequest::Cylinders)
    }

    /// Switching sign drops the previous range outright; the new range is
    /// whatever the fresh fetch returns.
    pub fn begin_sphere_load(&mut self, sign: SphereSign) -> FetchTicket {
        self.sign = sign;
        self.spheres.clear();
        self.generations.issue(FetchRequest::Spheres(sign))
    }

    pub fn toggle_sign(&mut self) -> FetchTicket {
        self.begin_sphere_load(self.sign.toggled())
    }

    pub fn begin_stock_load(&mut self, category: CategoryId) -> FetchTicket {
        self.category = Some(category);
        self.stock = None;
        self.generations.issue(FetchRequest::Stock(category))
    }

    pub fn begin_record_load(&mut self, record: RecordId) -> FetchTicket {
        self.record = Some(record);
        self.detail = None;
        self.generations.issue(FetchRequest::Record(record))
    }

    /// Grids that do not look at stock only change the category. Pending
    /// edits survive the switch.
    pub fn select_category(
        &mut self,
        category: CategoryId,
    ) -> (Vec<GridEvent>, Option<FetchTicket>) {
        let events = vec![GridEvent::CategoryChanged(category)];
        if self.mode.loads_stock() {
            (events, Some(self.begin_stock_load(category)))
        } else {
            self.category = Some(category);
            (events, None)
        }
    }

    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<FetchReply, FetchError>,
    ) -> Vec<GridEvent> {
        let lane = ticket.lane();
        if !self.generations.is_current(ticket) {
            tracing::debug!(
                lane = lane.as_str(),
                generation = ticket.generation,
                current = self.generations.current(lane),
                "dropping stale fetch reply"
            );
            return Vec::new();
        }

        let reply = match result {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(
                    lane = lane.as_str(),
                    kind = error.kind(),
                    %error,
                    "fetch failed; keeping empty grid data"
                );
                return vec![GridEvent::FetchFailed { lane, error }];
            }
        };

        match (ticket.request, reply) {
            (FetchRequest::Cylinders, FetchReply::Cylinders(values)) => {
                self.bands = partition_cylinders(&values);
                self.active_band = 0;
                let cylinders = self.bands.iter().map(|band| band.members.len()).sum();
                let mut events = vec![GridEvent::BandsLoaded {
                    bands: self.bands.len(),
                    cylinders,
                }];
                events.extend(self.rebuild_detail());
                events
            }
            (FetchRequest::Spheres(sign), FetchReply::Spheres(mut values)) => {
                sort_spheres(&mut values);
                self.spheres = values;
                let mut events = vec![GridEvent::SpheresLoaded {
                    sign,
                    count: self.spheres.len(),
                }];
                events.extend(self.rebuild_detail());
                events
            }
            (FetchRequest::Stock(category_id), FetchReply::Stock(stock)) => {
                let overview =
                    (self.mode == GridMode::StockOverview).then(|| stock.consolidated_bags.clone());
                let stock = AvailableStock::from(stock);
                let total_quantity = stock.total_quantity;
                self.stock = Some(stock);
                let mut events = vec![GridEvent::StockLoaded {
                    category_id,
                    total_quantity,
                }];
                if let Some(bags) = overview {
                    self.state = GridState::default();
                    events.extend(self.ingest(&bags));
                }
                events
            }
            (FetchRequest::Record(_), FetchReply::Record(detail)) => {
                let mut events = vec![GridEvent::RecordLoaded {
                    bags: detail.bags.len(),
                    quantity: detail.quantity,
                }];
                self.detail = Some(detail);
                events.extend(self.rebuild_detail());
                events
            }
            (request, reply) => {
                tracing::warn!(
                    expected = request.lane().as_str(),
                    got = reply.lane().as_str(),
                    "fetch reply does not match its request"
                );
                Vec::new()
            }
        }
    }

    /// Seeds the matrix from existing records. Duplicate keys are not
    /// summed: the last record for a key wins. Negative quantities are
    /// stored as zero.
    pub fn ingest(&mut self, records: &[ExistingRecord]) -> Vec<GridEvent> {
        let mut state = self.state.clone();
        for record in records {
            let key = CellKey::new(record.sph.id, record.cyl.id);
            let quantity = if record.quantity < 0 {
                tracing::warn!(
                    cell = %key,
                    quantity = record.quantity,
                    "negative quantity from server; storing zero"
                );
                0
            } else {
                record.quantity
            };
            let cell = if self.mode.is_priced() {
                Cell::Priced {
                    quantity,
                    unit_price: record.unit_price.unwrap_or(0),
                    bonus: false,
                }
            } else {
                Cell::Plain { quantity }
            };
            state = state.with_cell(key, cell);
        }
        self.replace_state(state)
    }

    /// A disabled cell still accepts a clear, so a line left over from a
    /// previous category can be dropped.
    pub fn set_cell(
        &mut self,
        sph: SphereId,
        cyl: CylinderId,
        raw: &str,
    ) -> Result<Vec<GridEvent>, GridError> {
        let key = self.cell_key(sph, cyl)?;
        let quantity = parse_quantity_or_zero(raw);
        if quantity > 0 && !self.is_editable(key) {
            return Err(GridError::CellDisabled(key));
        }
        if raw.trim().parse::<i64>().ok() != Some(quantity) {
            tracing::debug!(
                target: "lensgrid::coercion",
                cell = %key,
                input = raw,
                quantity,
                "quantity input coerced"
            );
        }

        let cell = match self.state.get(key) {
            Some(existing) => existing.with_quantity(quantity),
            None => self.blank_cell(key).with_quantity(quantity),
        };
        Ok(self.replace_state(self.state.with_cell(key, cell)))
    }

    /// Empty text resets the price to zero; text that is not a
    /// non-negative decimal leaves the current price untouched.
    pub fn set_unit_price(
        &mut self,
        sph: SphereId,
        cyl: CylinderId,
        raw: &str,
    ) -> Result<Vec<GridEvent>, GridError> {
        if !self.mode.is_priced() {
            return Err(GridError::NotPriced);
        }
        let key = self.editable_key(sph, cyl)?;
        let current = self.state.get(key).unwrap_or_else(|| self.blank_cell(key));
        let Cell::Priced {
            quantity,
            unit_price,
            bonus,
        } = current
        else {
            return Err(GridError::NotPriced);
        };
        if bonus {
            return Err(GridError::BonusLocked(key));
        }

        let trimmed = raw.trim();
        let next_price = if trimmed.is_empty() {
            0
        } else {
            match parse_hundredths(trimmed) {
                Some(cents) if (0..=MAX_UNIT_PRICE).contains(&cents) => cents,
                _ => {
                    tracing::debug!(
                        target: "lensgrid::coercion",
                        cell = %key,
                        input = raw,
                        "ignoring invalid unit price"
                    );
                    unit_price
                }
            }
        };

        let cell = Cell::Priced {
            quantity,
            unit_price: next_price,
            bonus,
        };
        Ok(self.replace_state(self.state.with_cell(key, cell)))
    }

    /// Bonus lines are free: the flag forces the unit price to zero.
    pub fn set_bonus(
        &mut self,
        sph: SphereId,
        cyl: CylinderId,
        bonus: bool,
    ) -> Result<Vec<GridEvent>, GridError> {
        if !self.mode.is_priced() {
            return Err(GridError::NotPriced);
        }
        let key = self.editable_key(sph, cyl)?;
        let current = self.state.get(key).unwrap_or_else(|| self.blank_cell(key));
        let cell = match current {
            Cell::Priced {
                quantity,
                unit_price,
                ..
            } => Cell::Priced {
                quantity,
                unit_price: if bonus { 0 } else { unit_price },
                bonus,
            },
            Cell::Plain { .. } => return Err(GridError::NotPriced),
        };
        Ok(self.replace_state(self.state.with_cell(key, cell)))
    }

    pub fn derive_flat_entries(&self) -> Vec<FlatEntry> {
        self.state.flat_entries()
    }

    pub fn derive_total_quantity(&self) -> i64 {
        self.state.total_quantity()
    }

    pub fn derive_total_price(&self) -> i64 {
        self.state.total_price()
    }

    pub fn line_total(&self, key: CellKey) -> Option<LineTotal> {
        self.state.get(key).and_then(Cell::line_total)
    }

    /// Populated cells in key order, for summaries next to the grid.
    pub fn lines(&self) -> Vec<(CellKey, Cell)> {
        self.state
            .iter()
            .filter(|(_, cell)| cell.quantity() > 0)
            .collect()
    }

    pub fn select_band(&mut self, index: usize) -> Result<Vec<GridEvent>, GridError> {
        if index >= self.bands.len() {
            return Err(GridError::UnknownBand(index));
        }
        self.active_band = index;
        Ok(vec![GridEvent::BandChanged(index)])
    }

    pub fn next_band(&mut self) -> Vec<GridEvent> {
        self.rotate_band(1)
    }

    pub fn prev_band(&mut self) -> Vec<GridEvent> {
        self.rotate_band(-1)
    }

    pub fn is_editable(&self, key: CellKey) -> bool {
        if self.mode.is_read_only() {
            return false;
        }
        if !self.mode.checks_stock() {
            return true;
        }
        self.stock
            .as_ref()
            .is_some_and(|stock| stock.quantity(key) > 0)
    }

    pub fn cell_view(&self, sph: SphereId, cylinder: &Cylinder) -> CellView {
        let key = CellKey::new(sph, cylinder.id);
        let cell = self.state.get(key);
        let available = if self.mode.checks_stock() {
            Some(self.stock.as_ref().map_or(0, |stock| stock.quantity(key)))
        } else {
            None
        };
        CellView {
            key,
            quantity: cell.map_or(0, Cell::quantity),
            available,
            editable: self.is_editable(key),
            color: band_color(cylinder),
            unit_price: cell.and_then(Cell::unit_price),
            bonus: cell.is_some_and(Cell::bonus),
            line_total: cell.and_then(Cell::line_total),
        }
    }

    pub fn sphere_label(&self, id: SphereId) -> String {
        self.spheres
            .iter()
            .find(|sphere| sphere.id == id)
            .map(|sphere| sphere.display_value())
            .unwrap_or_else(|| format!("#{id}"))
    }

    pub fn cylinder_label(&self, id: CylinderId) -> String {
        self.bands
            .iter()
            .flat_map(|band| band.members.iter())
            .find(|cylinder| cylinder.id == id)
            .map(|cylinder| cylinder.value.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }

    pub fn dispatch(&mut self, command: GridCommand) -> Result<Vec<GridEvent>, GridError> {
        match command {
            GridCommand::SetCell { sph, cyl, raw } => self.set_cell(sph, cyl, &raw),
            GridCommand::SetUnitPrice { sph, cyl, raw } => self.set_unit_price(sph, cyl, &raw),
            GridCommand::SetBonus { sph, cyl, bonus } => self.set_bonus(sph, cyl, bonus),
            GridCommand::SelectBand(index) => self.select_band(index),
            GridCommand::NextBand => Ok(self.next_band()),
            GridCommand::PrevBand => Ok(self.prev_band()),
        }
    }

    fn cell_key(&self, sph: SphereId, cyl: CylinderId) -> Result<CellKey, GridError> {
        if self.mode.is_read_only() {
            return Err(GridError::ReadOnly);
        }
        if !self.spheres.iter().any(|sphere| sphere.id == sph) {
            return Err(GridError::UnknownSphere(sph));
        }
        if !self.active_band().is_some_and(|band| band.contains(cyl)) {
            return Err(GridError::UnknownCylinder(cyl));
        }
        Ok(CellKey::new(sph, cyl))
    }

    fn editable_key(&self, sph: SphereId, cyl: CylinderId) -> Result<CellKey, GridError> {
        let key = self.cell_key(sph, cyl)?;
        if !self.is_editable(key) {
            return Err(GridError::CellDisabled(key));
        }
        Ok(key)
    }

    /// Record bags name axes by value only; a bag shows up once both of its
    /// axes are loaded. Sphere values of the other sign wait for a toggle.
    fn rebuild_detail(&mut self) -> Vec<GridEvent> {
        let Some(detail) = &self.detail else {
            return Vec::new();
        };
        let records = detail
            .bags
            .iter()
            .filter_map(|bag| self.resolve_bag(bag))
            .collect::<Vec<_>>();
        self.state = GridState::default();
        self.ingest(&records)
    }

    fn resolve_bag(&self, bag: &RecordBag) -> Option<ExistingRecord> {
        let sph = self.spheres.iter().find(|sphere| bag.sph.matches(sphere))?;
        let cyl = self
            .bands
            .iter()
            .flat_map(|band| band.members.iter())
            .find(|cylinder| bag.cyl.matches(cylinder))?;
        Some(ExistingRecord {
            sph: sph.clone(),
            cyl: cyl.clone(),
            quantity: bag.quantity,
            unit_price: None,
        })
    }

    fn blank_cell(&self, key: CellKey) -> Cell {
        if self.mode.is_priced() {
            let unit_price = self
                .stock
                .as_ref()
                .and_then(|stock| stock.level(key))
                .and_then(|level| level.unit_price)
                .unwrap_or(0);
            Cell::Priced {
                quantity: 0,
                unit_price,
                bonus: false,
            }
        } else {
            Cell::Plain { quantity: 0 }
        }
    }

    fn replace_state(&mut self, state: GridState) -> Vec<GridEvent> {
        self.state = state;
        vec![GridEvent::EntriesChanged(self.state.flat_entries())]
    }

    fn rotate_band(&mut self, delta: isize) -> Vec<GridEvent> {
        if self.bands.is_empty() {
            return Vec::new();
        }
        let len = self.bands.len() as isize;
        let next = (self.active_band as isize + delta).rem_euclid(len) as usize;
        self.active_band = next;
        vec![GridEvent::BandChanged(next)]
    }
}
