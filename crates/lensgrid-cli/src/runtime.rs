// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use lensgrid_app::{
    AxisLabel, Category, CategoryId, ConsolidatedStock, CylinderId, ExistingRecord, FetchError,
    FetchReply, FetchRequest, FetchTicket, RecordBag, RecordCategory, RecordClient, RecordDetail,
    RecordId, RecordKind, RecordPayload, RecordUser, SphereId, SphereSign,
};
use lensgrid_testkit::{
    StockFaker, categories, cylinder_values, demo_identity, record, sphere_values,
};
use lensgrid_tui::{GridRuntime, InternalEvent};
use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use std::thread;

const CATEGORY_PAGE_LIMIT: u32 = 100;

/// Talks to the real backend. Fetches run on their own thread so a slow
/// server never blocks the key loop.
pub struct ApiRuntime {
    client: lensgrid_api::Client,
}

impl ApiRuntime {
    pub fn new(client: lensgrid_api::Client) -> Self {
        Self { client }
    }
}

impl GridRuntime for ApiRuntime {
    fn fetch(&mut self, request: FetchRequest) -> Result<FetchReply, FetchError> {
        self.client.fetch(request)
    }

    fn list_categories(&mut self) -> Result<Vec<Category>> {
        let page = self.client.list_categories(1, CATEGORY_PAGE_LIMIT, "")?;
        Ok(page.categories)
    }

    fn submit_record(&mut self, kind: RecordKind, payload: &RecordPayload) -> Result<()> {
        self.client.submit_record(kind, payload)
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name(format!("fetch-{}", ticket.lane().as_str()))
            .spawn(move || {
                let result = client.fetch(ticket.request);
                let _ = tx.send(InternalEvent::Fetch { ticket, result });
            })
            .map_err(|error| anyhow!("spawn fetch thread: {error}"))?;
        Ok(())
    }
}

/// In-memory backend for `--demo`: fixture axes, seeded stock per
/// category, and submissions applied to that stock. Record #1 is seeded;
/// each accepted submission becomes the next record id.
pub struct DemoRuntime {
    faker: StockFaker,
    stock: BTreeMap<CategoryId, ConsolidatedStock>,
    records: Vec<RecordDetail>,
    submitted: Vec<(RecordKind, RecordPayload)>,
}

impl DemoRuntime {
    pub fn new(seed: u64) -> Self {
        let mut faker = StockFaker::new(seed);
        let seeded = faker.record_detail(RecordId::new(1), RecordKind::Income);
        Self {
            faker,
            stock: BTreeMap::new(),
            records: vec![seeded],
            submitted: Vec::new(),
        }
    }

    pub fn submitted(&self) -> &[(RecordKind, RecordPayload)] {
        &self.submitted
    }

    fn stock_for(&mut self, category: CategoryId) -> &mut ConsolidatedStock {
        let faker = &mut self.faker;
        self.stock
            .entry(category)
            .or_insert_with(|| faker.consolidated_stock(category, true))
    }

    fn apply_submission(&mut self, kind: RecordKind, payload: &RecordPayload) -> Result<()> {
        let stock = self.stock_for(payload.category_id);
        let mut levels = stock
            .consolidated_bags
            .iter()
            .map(|bag| ((bag.sph.id, bag.cyl.id), bag.quantity))
            .collect::<BTreeMap<_, _>>();

        for entry in &payload.bag {
            let available = levels.entry((entry.sph_id, entry.cyl_id)).or_insert(0);
            match kind {
                RecordKind::Income => *available += entry.quantity,
                RecordKind::Output | RecordKind::Sale => {
                    if entry.quantity > *available {
                        bail!(
                            "insufficient stock for sphere {} / cylinder {}: {} requested, {} available -- lower the quantity and retry",
                            entry.sph_id,
                            entry.cyl_id,
                            entry.quantity,
                            available
                        );
                    }
                    *available -= entry.quantity;
                }
            }
        }

        for ((sph, cyl), quantity) in levels {
            match stock
                .consolidated_bags
                .iter_mut()
                .find(|bag| bag.sph.id == sph && bag.cyl.id == cyl)
            {
                Some(bag) => bag.quantity = quantity,
                None => stock.consolidated_bags.push(demo_record(sph, cyl, quantity)?),
            }
        }
        stock.total_quantity = stock
            .consolidated_bags
            .iter()
            .map(|bag| bag.quantity)
            .fold(0, i64::saturating_add);
        Ok(())
    }

    fn next_record(&self, kind: RecordKind, payload: &RecordPayload) -> Result<RecordDetail> {
        let bags = payload
            .bag
            .iter()
            .zip(1..)
            .map(|(entry, id)| {
                let line = demo_record(entry.sph_id, entry.cyl_id, entry.quantity)?;
                Ok(RecordBag {
                    id: Some(id),
                    quantity: entry.quantity,
                    sph: AxisLabel::new(line.sph.value),
                    cyl: AxisLabel::new(line.cyl.value),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let material = categories()
            .into_iter()
            .find(|category| category.id == payload.category_id)
            .map_or_else(|| format!("#{}", payload.category_id), |category| category.name);
        let identity = demo_identity();
        let id = RecordId::new(i64::try_from(self.records.len())?.saturating_add(1));
        Ok(RecordDetail {
            id: id.to_string(),
            date: payload.date.clone(),
            kind: kind.label().to_owned(),
            quantity: payload.quantity,
            user: RecordUser {
                full_name: identity.full_name,
                email: String::new(),
                role: identity.role.as_str().to_owned(),
            },
            client: RecordClient {
                full_name: format!("client #{}", payload.client_id),
                address: String::new(),
            },
            category: RecordCategory { name: material },
            bags,
        })
    }
}

fn demo_record(sph: SphereId, cyl: CylinderId, quantity: i64) -> Result<ExistingRecord> {
    let sphere = [SphereSign::Negative, SphereSign::Positive]
        .into_iter()
        .flat_map(sphere_values)
        .find(|sphere| sphere.id == sph)
        .ok_or_else(|| anyhow!("sphere {sph} is not in the demo catalog"))?;
    let cylinder = cylinder_values()
        .into_iter()
        .find(|cylinder| cylinder.id == cyl)
        .ok_or_else(|| anyhow!("cylinder {cyl} is not in the demo catalog"))?;
    Ok(record(&sphere, &cylinder, quantity))
}

impl GridRuntime for DemoRuntime {
    fn fetch(&mut self, request: FetchRequest) -> Result<FetchReply, FetchError> {
        match request {
            FetchRequest::Cylinders => Ok(FetchReply::Cylinders(cylinder_values())),
            FetchRequest::Spheres(sign) => Ok(FetchReply::Spheres(sphere_values(sign))),
            FetchRequest::Stock(category) => {
                Ok(FetchReply::Stock(self.stock_for(category).clone()))
            }
            FetchRequest::Record(id) => self
                .records
                .iter()
                .find(|detail| detail.id == id.to_string())
                .cloned()
                .map(FetchReply::Record)
                .ok_or_else(|| FetchError::Status {
                    code: 404,
                    message: format!("record {id} not found"),
                }),
        }
    }

    fn list_categories(&mut self) -> Result<Vec<Category>> {
        Ok(categories())
    }

    fn submit_record(&mut self, kind: RecordKind, payload: &RecordPayload) -> Result<()> {
        let detail = self.next_record(kind, payload)?;
        self.apply_submission(kind, payload)?;
        tracing::info!(
            kind = kind.label(),
            record = %detail.id,
            lines = payload.bag.len(),
            quantity = payload.quantity,
            "demo record stored"
        );
        self.records.push(detail);
        self.submitted.push((kind, payload.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiRuntime, DemoRuntime};
    use anyhow::{Result, anyhow};
    use lensgrid_app::{
        CategoryId, ClientId, CylinderId, FetchError, FetchReply, FetchRequest, FlatEntry,
        GridMode, GridSession, RecordId, RecordKind, RecordPayload, SphereId, SphereSign, UserId,
    };
    use lensgrid_tui::{GridRuntime, InternalEvent};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tiny_http::{Header, Response, Server};

    fn payload(category: i64, entries: &[(i64, i64, i64)]) -> RecordPayload {
        let bag = entries
            .iter()
            .map(|(sph, cyl, quantity)| FlatEntry {
                sph_id: SphereId::new(*sph),
                cyl_id: CylinderId::new(*cyl),
                quantity: *quantity,
                unit_price: None,
            })
            .collect::<Vec<_>>();
        RecordPayload {
            date: "2026-05-02T08:00:00Z".to_owned(),
            category_id: CategoryId::new(category),
            quantity: bag.iter().map(|entry| entry.quantity).sum(),
            bag,
            client_id: ClientId::new(1),
            user_id: UserId::new(1),
            total_price: None,
        }
    }

    fn stock_at(runtime: &mut DemoRuntime, category: i64, sph: i64, cyl: i64) -> Result<i64> {
        let FetchReply::Stock(stock) =
            runtime.fetch(FetchRequest::Stock(CategoryId::new(category)))?
        else {
            return Err(anyhow!("expected stock reply"));
        };
        Ok(stock
            .consolidated_bags
            .iter()
            .find(|bag| bag.sph.id == SphereId::new(sph) && bag.cyl.id == CylinderId::new(cyl))
            .map_or(0, |bag| bag.quantity))
    }

    #[test]
    fn demo_fetches_fixture_axes() -> Result<()> {
        let mut runtime = DemoRuntime::new(3);
        let FetchReply::Cylinders(cylinders) = runtime.fetch(FetchRequest::Cylinders)? else {
            return Err(anyhow!("expected cylinders"));
        };
        assert_eq!(cylinders.len(), 24);

        let FetchReply::Spheres(spheres) =
            runtime.fetch(FetchRequest::Spheres(SphereSign::Positive))?
        else {
            return Err(anyhow!("expected spheres"));
        };
        assert_eq!(spheres[0].value, "0.00");
        assert!(!runtime.list_categories()?.is_empty());
        Ok(())
    }

    #[test]
    fn demo_stock_is_stable_per_category() -> Result<()> {
        let mut runtime = DemoRuntime::new(3);
        let first = runtime.fetch(FetchRequest::Stock(CategoryId::new(2)))?;
        let again = runtime.fetch(FetchRequest::Stock(CategoryId::new(2)))?;
        assert_eq!(first, again);
        Ok(())
    }

    #[test]
    fn demo_income_adds_stock_and_output_draws_it_down() -> Result<()> {
        let mut runtime = DemoRuntime::new(9);
        let before = stock_at(&mut runtime, 1, 101, 1)?;

        runtime.submit_record(RecordKind::Income, &payload(1, &[(101, 1, 5)]))?;
        assert_eq!(stock_at(&mut runtime, 1, 101, 1)?, before + 5);

        runtime.submit_record(RecordKind::Output, &payload(1, &[(101, 1, 2)]))?;
        assert_eq!(stock_at(&mut runtime, 1, 101, 1)?, before + 3);
        assert_eq!(runtime.submitted().len(), 2);
        Ok(())
    }

    #[test]
    fn demo_rejects_output_beyond_stock() -> Result<()> {
        let mut runtime = DemoRuntime::new(9);
        let available = stock_at(&mut runtime, 4, 110, 12)?;
        let error = runtime
            .submit_record(
                RecordKind::Sale,
                &payload(4, &[(110, 12, available + 1)]),
            )
            .expect_err("over-draw should fail");
        assert!(error.to_string().contains("insufficient stock"));
        assert_eq!(stock_at(&mut runtime, 4, 110, 12)?, available);
        assert!(runtime.submitted().is_empty());
        Ok(())
    }

    #[test]
    fn demo_records_are_seeded_and_grow_with_submissions() -> Result<()> {
        let mut runtime = DemoRuntime::new(9);
        let FetchReply::Record(seeded) = runtime.fetch(FetchRequest::Record(RecordId::new(1)))?
        else {
            return Err(anyhow!("expected record reply"));
        };
        assert_eq!(seeded.id, "1");
        assert!(!seeded.bags.is_empty());

        runtime.submit_record(RecordKind::Income, &payload(1, &[(101, 1, 5), (102, 2, 2)]))?;
        let FetchReply::Record(stored) = runtime.fetch(FetchRequest::Record(RecordId::new(2)))?
        else {
            return Err(anyhow!("expected record reply"));
        };
        assert_eq!(stored.quantity, 7);
        assert_eq!(stored.bags.len(), 2);
        assert_eq!(stored.kind, RecordKind::Income.label());

        let missing = runtime
            .fetch(FetchRequest::Record(RecordId::new(3)))
            .expect_err("unknown record should fail");
        assert!(matches!(missing, FetchError::Status { code: 404, .. }));
        Ok(())
    }

    #[test]
    fn demo_runtime_drives_a_record_view() -> Result<()> {
        let mut runtime = DemoRuntime::new(5);
        let mut session = GridSession::new(GridMode::RecordDetail).with_record(RecordId::new(1));
        let (tx, rx) = mpsc::channel();
        for ticket in session.initial_requests() {
            runtime.spawn_fetch(ticket, tx.clone())?;
        }
        drop(tx);
        for event in rx {
            if let InternalEvent::Fetch { ticket, result } = event {
                session.complete_fetch(ticket, result);
            }
        }
        let detail = session.detail().ok_or_else(|| anyhow!("record not loaded"))?;
        assert_eq!(session.derive_total_quantity(), detail.quantity);
        Ok(())
    }

    #[test]
    fn demo_runtime_drives_a_capped_session() -> Result<()> {
        let mut runtime = DemoRuntime::new(5);
        let mut session =
            GridSession::new(GridMode::CappedByStock).with_category(CategoryId::new(1));
        let (tx, rx) = mpsc::channel();
        for ticket in session.initial_requests() {
            runtime.spawn_fetch(ticket, tx.clone())?;
        }
        drop(tx);
        for event in rx {
            if let InternalEvent::Fetch { ticket, result } = event {
                session.complete_fetch(ticket, result);
            }
        }
        assert_eq!(session.bands().len(), 3);
        assert_eq!(session.rows().len(), 24);
        assert_eq!(
            session.stock().map(|stock| stock.category_id),
            Some(CategoryId::new(1))
        );
        Ok(())
    }

    #[test]
    fn api_runtime_fetches_on_a_worker_thread() -> Result<()> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let addr = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let request = server.recv().expect("request expected");
            assert_eq!(request.url(), "/api/cyl");
            let response = Response::from_string(r#"[{"id":1,"value":"0.25"}]"#).with_header(
                Header::from_bytes("Content-Type", "application/json")
                    .expect("valid content type header"),
            );
            request.respond(response).expect("response should succeed");
        });

        let client = lensgrid_api::Client::new(&addr, None, Duration::from_secs(2))?;
        let mut runtime = ApiRuntime::new(client);
        let mut session = GridSession::new(GridMode::FreeEntry);
        let ticket = session.begin_cylinder_load();
        let (tx, rx) = mpsc::channel();
        runtime.spawn_fetch(ticket, tx)?;

        let event = rx.recv_timeout(Duration::from_secs(5))?;
        let InternalEvent::Fetch { ticket: got, result } = event else {
            return Err(anyhow!("expected fetch event"));
        };
        assert_eq!(got, ticket);
        session.complete_fetch(got, result);
        assert_eq!(session.bands()[0].members.len(), 1);

        handle.join().expect("server thread should join");
        Ok(())
    }
}
