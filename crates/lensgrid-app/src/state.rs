// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{FetchError, FetchLane, GridError, GridEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppMode {
    #[default]
    Nav,
    EditQuantity,
    EditPrice,
    EditDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub mode: AppMode,
    pub status_line: Option<String>,
    pub banner: Option<String>,
    banner_lane: Option<FetchLane>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    BeginQuantityEdit,
    BeginPriceEdit,
    BeginDateEdit,
    ExitToNav,
    SetStatus(String),
    ClearStatus,
    ShowBanner(String),
    DismissBanner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    StatusUpdated(String),
    StatusCleared,
    BannerShown(String),
    BannerDismissed,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::BeginQuantityEdit => self.set_mode(AppMode::EditQuantity),
            AppCommand::BeginPriceEdit => self.set_mode(AppMode::EditPrice),
            AppCommand::BeginDateEdit => self.set_mode(AppMode::EditDate),
            AppCommand::ExitToNav => {
                let mut events = self.set_mode(AppMode::Nav);
                events.push(self.set_status("nav"));
                events
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
            AppCommand::ShowBanner(message) => {
                self.banner = Some(message.clone());
                self.banner_lane = None;
                vec![AppEvent::BannerShown(message)]
            }
            AppCommand::DismissBanner => {
                self.banner = None;
                self.banner_lane = None;
                vec![AppEvent::BannerDismissed]
            }
        }
    }

    /// Folds grid events into what the user sees. Fetch failures get a
    /// banner that stays until the same lane loads again; everything else
    /// at most touches the status line.
    pub fn observe_grid(&mut self, events: &[GridEvent]) -> Vec<AppEvent> {
        let mut out = Vec::new();
        for event in events {
            match event {
                GridEvent::FetchFailed { lane, error } => {
                    out.extend(self.dispatch(AppCommand::ShowBanner(fetch_banner(*lane, error))));
                    self.banner_lane = Some(*lane);
                }
                GridEvent::BandsLoaded { .. } => {
                    out.extend(self.recovered(FetchLane::Cylinders));
                }
                GridEvent::SpheresLoaded { sign, count } => {
                    out.extend(self.recovered(FetchLane::Spheres));
                    out.push(self.set_status(&format!("sphere {}: {count} rows", sign.symbol())));
                }
                GridEvent::StockLoaded { total_quantity, .. } => {
                    out.extend(self.recovered(FetchLane::Stock));
                    out.push(self.set_status(&format!("available quantity: {total_quantity}")));
                }
                GridEvent::RecordLoaded { bags, quantity } => {
                    out.extend(self.recovered(FetchLane::Record));
                    out.push(self.set_status(&format!("record: {bags} bags, {quantity} lenses")));
                }
                GridEvent::EntriesChanged(_)
                | GridEvent::BandChanged(_)
                | GridEvent::CategoryChanged(_) => {}
            }
        }
        out
    }

    pub fn report_grid_error(&mut self, error: &GridError) -> AppEvent {
        self.set_status(&error.to_string())
    }

    fn recovered(&mut self, lane: FetchLane) -> Vec<AppEvent> {
        if self.banner_lane == Some(lane) {
            self.dispatch(AppCommand::DismissBanner)
        } else {
            Vec::new()
        }
    }

    fn set_mode(&mut self, mode: AppMode) -> Vec<AppEvent> {
        self.mode = mode;
        vec![AppEvent::ModeChanged(mode)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

fn fetch_banner(lane: FetchLane, error: &FetchError) -> String {
    if error.is_empty_result() {
        format!("{error} -- try the other sign or reload")
    } else {
        format!("could not load {}: {error} -- press r to retry", lane.as_str())
    }
}
