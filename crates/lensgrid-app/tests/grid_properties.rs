// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use lensgrid_app::{
    BandKind, CategoryId, ClientId, Cylinder, CylinderId, ExistingRecord, FetchReply, FlatEntry,
    GridError, GridEvent, GridMode, GridSession, LineTotal, RecordForm, RecordKind, Sphere,
    SphereId, SphereSign, partition_cylinders,
};
use lensgrid_testkit::{StockFaker, cylinder_values, demo_identity, record, sphere_values};
use std::collections::BTreeSet;

fn loaded(mode: GridMode) -> GridSession {
    let mut session = GridSession::new(mode);
    let cylinders = session.begin_cylinder_load();
    session.complete_fetch(cylinders, Ok(FetchReply::Cylinders(cylinder_values())));
    let spheres = session.begin_sphere_load(SphereSign::Negative);
    session.complete_fetch(
        spheres,
        Ok(FetchReply::Spheres(sphere_values(SphereSign::Negative))),
    );
    session
}

#[test]
fn banding_partitions_every_cylinder_exactly_once() {
    let mut faker = StockFaker::new(11);
    let values = faker.shuffled(&cylinder_values());
    let bands = partition_cylinders(&values);

    let mut seen = BTreeSet::new();
    for band in &bands {
        for member in &band.members {
            assert!(seen.insert(member.id), "cylinder {} in two bands", member.id);
            let diopter = member.diopter().expect("formatted member parses");
            assert_eq!(BandKind::for_value(diopter), band.kind);
        }
    }
    assert_eq!(seen.len(), values.len());
    assert_eq!(bands[0].members.last().map(|c| c.value.as_str()), Some("2.00"));
    assert_eq!(bands[1].members.last().map(|c| c.value.as_str()), Some("4.00"));
}

#[test]
fn band_members_are_sorted_regardless_of_backend_order() {
    let mut faker = StockFaker::new(5);
    let shuffled = faker.shuffled(&cylinder_values());
    let bands = partition_cylinders(&shuffled);
    for band in bands {
        let values = band
            .members
            .iter()
            .filter_map(Cylinder::diopter)
            .collect::<Vec<_>>();
        let mut sorted = values.clone();
        sorted.sort();
        assert_eq!(values, sorted);
    }
}

#[test]
fn sign_toggle_replaces_the_sphere_range() {
    let mut session = loaded(GridMode::FreeEntry);
    let negative = session
        .rows()
        .iter()
        .map(|sphere| sphere.id)
        .collect::<BTreeSet<_>>();

    let ticket = session.toggle_sign();
    assert!(session.rows().is_empty());
    session.complete_fetch(
        ticket,
        Ok(FetchReply::Spheres(sphere_values(SphereSign::Positive))),
    );

    let expected = sphere_values(SphereSign::Positive)
        .into_iter()
        .map(|sphere| sphere.id)
        .collect::<BTreeSet<_>>();
    let actual = session
        .rows()
        .iter()
        .map(|sphere| sphere.id)
        .collect::<BTreeSet<_>>();
    assert_eq!(actual, expected);
    assert!(actual.is_disjoint(&negative));
    assert_eq!(session.sign(), SphereSign::Positive);
}

#[test]
fn totals_agree_between_grid_and_form() -> Result<(), GridError> {
    let mut session = loaded(GridMode::FreeEntry);
    let mut form = RecordForm::new(
        RecordKind::Income,
        demo_identity(),
        ClientId::new(4),
        "Optica Sol",
    );

    let rows = session.rows().to_vec();
    let columns = session.columns().to_vec();
    let inputs = ["5", "abc", "12", "", "3x", "-2", "7"];
    for (index, raw) in inputs.iter().enumerate() {
        let sph = rows[index % rows.len()].id;
        let cyl = columns[index % columns.len()].id;
        let events = session.set_cell(sph, cyl, raw)?;
        form.apply_all(&events);

        let entries_sum: i64 = session
            .derive_flat_entries()
            .iter()
            .map(|entry| entry.quantity)
            .sum();
        assert_eq!(session.derive_total_quantity(), entries_sum);
        assert_eq!(session.derive_total_quantity(), form.total_quantity());
    }
    assert_eq!(form.total_quantity(), 5 + 12 + 3 + 7);
    Ok(())
}

#[test]
fn ingest_round_trips_distinct_records() {
    let cylinders = cylinder_values();
    let spheres = sphere_values(SphereSign::Negative);
    let records = vec![
        record(&spheres[0], &cylinders[0], 4),
        record(&spheres[1], &cylinders[9], 0),
        record(&spheres[2], &cylinders[20], 9),
        record(&spheres[3], &cylinders[3], 1),
    ];

    let mut session = GridSession::new(GridMode::FreeEntry);
    session.ingest(&records);

    let mut expected = records
        .iter()
        .filter(|record| record.quantity > 0)
        .map(|record| (record.sph.id, record.cyl.id, record.quantity))
        .collect::<Vec<_>>();
    let mut actual = session
        .derive_flat_entries()
        .into_iter()
        .map(|entry| (entry.sph_id, entry.cyl_id, entry.quantity))
        .collect::<Vec<_>>();
    expected.sort();
    actual.sort();
    assert_eq!(actual, expected);
}

#[test]
fn single_record_ingest_scenario() {
    let mut session = GridSession::new(GridMode::FreeEntry);
    let events = session.ingest(&[ExistingRecord {
        sph: Sphere::new(SphereId::new(1), "-1.00"),
        cyl: Cylinder::new(CylinderId::new(2), "0.50"),
        quantity: 5,
        unit_price: None,
    }]);

    let expected = vec![FlatEntry {
        sph_id: SphereId::new(1),
        cyl_id: CylinderId::new(2),
        quantity: 5,
        unit_price: None,
    }];
    assert_eq!(session.derive_flat_entries(), expected);
    assert_eq!(events, vec![GridEvent::EntriesChanged(expected)]);
}

#[test]
fn repeated_set_cell_is_idempotent() -> Result<(), GridError> {
    let mut session = loaded(GridMode::FreeEntry);
    let sph = session.rows()[0].id;
    let cyl = session.columns()[0].id;

    session.set_cell(sph, cyl, "5")?;
    let once = session.state().clone();
    session.set_cell(sph, cyl, "5")?;
    assert_eq!(session.state(), &once);
    Ok(())
}

#[test]
fn non_numeric_input_resets_cell_to_zero() -> Result<(), GridError> {
    let mut session = loaded(GridMode::FreeEntry);
    let sph = session.rows()[0].id;
    let cyl = session.columns()[0].id;

    session.set_cell(sph, cyl, "9")?;
    session.set_cell(sph, cyl, "abc")?;
    let column = session.columns()[0].clone();
    assert_eq!(session.cell_view(sph, &column).quantity, 0);
    Ok(())
}

#[test]
fn priced_bonus_scenario() -> Result<(), GridError> {
    let mut session = loaded(GridMode::Priced);
    let sph = session.rows()[0].id;
    let cylinder = session.columns()[0].clone();

    let stock_ticket = session.begin_stock_load(CategoryId::new(1));
    let mut stock = StockFaker::new(1).consolidated_stock(CategoryId::new(1), true);
    stock.consolidated_bags.push(ExistingRecord {
        sph: session.rows()[0].clone(),
        cyl: cylinder.clone(),
        quantity: 10,
        unit_price: Some(1_000),
    });
    session.complete_fetch(stock_ticket, Ok(FetchReply::Stock(stock)));

    session.set_cell(sph, cylinder.id, "3")?;
    session.set_unit_price(sph, cylinder.id, "2.5")?;
    let view = session.cell_view(sph, &cylinder);
    assert_eq!(view.line_total, Some(LineTotal::Amount(750)));

    session.set_bonus(sph, cylinder.id, true)?;
    let view = session.cell_view(sph, &cylinder);
    assert_eq!(view.line_total, Some(LineTotal::Bonus));
    assert_eq!(view.unit_price, Some(0));
    assert!(view.bonus);
    assert!(matches!(
        session.set_unit_price(sph, cylinder.id, "4"),
        Err(GridError::BonusLocked(_))
    ));
    assert_eq!(session.derive_total_price(), 0);
    Ok(())
}

#[test]
fn stale_stock_reply_never_overwrites_newer_category() {
    let mut session = loaded(GridMode::CappedByStock);
    let first = session.begin_stock_load(CategoryId::new(1));
    let (_, second) = session.select_category(CategoryId::new(2));
    let second = second.expect("capped grid fetches stock");

    let mut faker = StockFaker::new(8);
    session.complete_fetch(
        second,
        Ok(FetchReply::Stock(faker.consolidated_stock(CategoryId::new(2), false))),
    );
    let dropped = session.complete_fetch(
        first,
        Ok(FetchReply::Stock(faker.consolidated_stock(CategoryId::new(1), false))),
    );

    assert!(dropped.is_empty());
    assert_eq!(
        session.stock().map(|stock| stock.category_id),
        Some(CategoryId::new(2))
    );
}

#[test]
fn cell_colors_follow_cylinder_value_in_every_band() {
    let mut session = loaded(GridMode::FreeEntry);
    let sph = session.rows()[0].id;
    for index in 0..session.bands().len() {
        session.select_band(index).expect("band exists");
        let kind = session.bands()[index].kind;
        for column in session.columns().to_vec() {
            assert_eq!(session.cell_view(sph, &column).color, kind);
        }
    }
}
