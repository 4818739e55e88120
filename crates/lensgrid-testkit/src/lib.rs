// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use lensgrid_app::{
    AxisLabel, Category, CategoryId, ConsolidatedStock, Cylinder, CylinderId, ExistingRecord,
    Identity, RecordBag, RecordCategory, RecordClient, RecordDetail, RecordId, RecordKind,
    RecordUser, Role, Sphere, SphereId, SphereSign, StoreId, UserId, format_hundredths,
};

const STEP_HUNDREDTHS: i64 = 25;
const AXIS_STEPS: i64 = 24;
const NEGATIVE_SPHERE_ID_OFFSET: i64 = 100;

const CATEGORY_NAMES: [&str; 6] = [
    "CR-39",
    "Policarbonato",
    "Blue Cut",
    "Fotocromatico",
    "Alto Indice 1.67",
    "Trivex",
];

const CLIENT_NAMES: [&str; 8] = [
    "Optica Sol",
    "Vision Andina",
    "Lentes del Valle",
    "Optica Central",
    "Mirada Clara",
    "Optica Norte",
    "Foco Vision",
    "Cristal Optico",
];

/// Cylinder reference values 0.25 through 6.00 in quarter steps, ids
/// 1 through 24 in ascending value order.
pub fn cylinder_values() -> Vec<Cylinder> {
    (1..=AXIS_STEPS)
        .map(|step| {
            Cylinder::new(
                CylinderId::new(step),
                format_hundredths(step * STEP_HUNDREDTHS),
            )
        })
        .collect()
}

/// Sphere values for one sign. Positive covers 0.00 through 6.00, negative
/// covers -0.25 through -6.00; the two id ranges never overlap.
pub fn sphere_values(sign: SphereSign) -> Vec<Sphere> {
    match sign {
        SphereSign::Positive => (0..=AXIS_STEPS)
            .map(|step| {
                Sphere::new(
                    SphereId::new(step + 1),
                    format_hundredths(step * STEP_HUNDREDTHS),
                )
            })
            .collect(),
        SphereSign::Negative => (1..=AXIS_STEPS)
            .map(|step| {
                Sphere::new(
                    SphereId::new(NEGATIVE_SPHERE_ID_OFFSET + step),
                    format_hundredths(-step * STEP_HUNDREDTHS),
                )
            })
            .collect(),
    }
}

pub fn categories() -> Vec<Category> {
    CATEGORY_NAMES
        .iter()
        .enumerate()
        .map(|(index, name)| Category {
            id: CategoryId::new(index as i64 + 1),
            name: (*name).to_owned(),
        })
        .collect()
}

pub fn client_names() -> &'static [&'static str] {
    &CLIENT_NAMES
}

pub fn demo_identity() -> Identity {
    Identity {
        user_id: UserId::new(1),
        username: "demo".to_owned(),
        role: Role::Admin,
        store_id: Some(StoreId::new(1)),
        store_name: "Sucursal Demo".to_owned(),
        full_name: "Demo Admin".to_owned(),
    }
}

pub fn record(sphere: &Sphere, cylinder: &Cylinder, quantity: i64) -> ExistingRecord {
    ExistingRecord {
        sph: sphere.clone(),
        cyl: cylinder.clone(),
        quantity,
        unit_price: None,
    }
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for stock snapshots and shuffled axis lists. The same
/// seed always yields the same data.
#[derive(Debug, Clone)]
pub struct StockFaker {
    rng: DeterministicRng,
}

impl StockFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as usize;
        min + self.rng.int_n(span) as i64
    }

    /// Fisher-Yates over a copy, for checking that ordering never leaks
    /// from the backend into the grid.
    pub fn shuffled<T: Clone>(&mut self, values: &[T]) -> Vec<T> {
        let mut out = values.to_vec();
        for index in (1..out.len()).rev() {
            let swap = self.rng.int_n(index + 1);
            out.swap(index, swap);
        }
        out
    }

    /// Roughly a third of the cells carry stock; priced snapshots carry a
    /// unit price in whole fifty-cent steps.
    pub fn consolidated_stock(
        &mut self,
        category_id: CategoryId,
        priced: bool,
    ) -> ConsolidatedStock {
        let mut bags = Vec::new();
        for sign in [SphereSign::Negative, SphereSign::Positive] {
            for sphere in sphere_values(sign) {
                for cylinder in cylinder_values() {
                    if self.rng.int_n(3) != 0 {
                        continue;
                    }
                    let quantity = self.int_range(0, 12);
                    let unit_price = priced.then(|| self.int_range(30, 180) * 50);
                    bags.push(ExistingRecord {
                        sph: sphere.clone(),
                        cyl: cylinder,
                        quantity,
                        unit_price,
                    });
                }
            }
        }
        let total_quantity = bags.iter().map(|bag| bag.quantity).sum();
        ConsolidatedStock {
            category_id,
            total_quantity,
            consolidated_bags: bags,
        }
    }

    /// A stored record whose bags name their axes by value only, the way
    /// the detail endpoint sends them. Bags never repeat a cell.
    pub fn record_detail(&mut self, id: RecordId, kind: RecordKind) -> RecordDetail {
        let spheres = sphere_values(SphereSign::Negative);
        let cylinders = cylinder_values();
        let mut bags: Vec<RecordBag> = Vec::new();
        for bag_id in 1..=6 {
            let sphere = &spheres[self.rng.int_n(spheres.len())];
            let cylinder = &cylinders[self.rng.int_n(cylinders.len())];
            if bags
                .iter()
                .any(|bag| bag.sph.value == sphere.value && bag.cyl.value == cylinder.value)
            {
                continue;
            }
            bags.push(RecordBag {
                id: Some(bag_id),
                quantity: self.int_range(1, 6),
                sph: AxisLabel::new(sphere.value.clone()),
                cyl: AxisLabel::new(cylinder.value.clone()),
            });
        }
        let category = &CATEGORY_NAMES[self.rng.int_n(CATEGORY_NAMES.len())];
        let client = &CLIENT_NAMES[self.rng.int_n(CLIENT_NAMES.len())];
        RecordDetail {
            id: id.to_string(),
            date: "2026-02-10T12:00:00.000Z".to_owned(),
            kind: kind.label().to_owned(),
            quantity: bags.iter().map(|bag| bag.quantity).sum(),
            user: RecordUser {
                full_name: "Demo Admin".to_owned(),
                email: "demo@lensgrid.test".to_owned(),
                role: Role::Admin.as_str().to_owned(),
            },
            client: RecordClient {
                full_name: (*client).to_owned(),
                address: "Av. Central 100".to_owned(),
            },
            category: RecordCategory {
                name: (*category).to_owned(),
            },
            bags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StockFaker, categories, cylinder_values, demo_identity, sphere_values};
    use lensgrid_app::{CategoryId, RecordId, RecordKind, SphereSign};
    use std::collections::BTreeSet;

    #[test]
    fn cylinders_cover_quarter_steps() {
        let values = cylinder_values();
        assert_eq!(values.len(), 24);
        assert_eq!(values[0].value, "0.25");
        assert_eq!(values[7].value, "2.00");
        assert_eq!(values[23].value, "6.00");
    }

    #[test]
    fn sphere_signs_do_not_share_ids() {
        let positive = sphere_values(SphereSign::Positive)
            .into_iter()
            .map(|sphere| sphere.id)
            .collect::<BTreeSet<_>>();
        let negative = sphere_values(SphereSign::Negative)
            .into_iter()
            .map(|sphere| sphere.id)
            .collect::<BTreeSet<_>>();
        assert!(positive.is_disjoint(&negative));
        assert_eq!(sphere_values(SphereSign::Positive)[0].value, "0.00");
        assert_eq!(sphere_values(SphereSign::Negative)[0].value, "-0.25");
    }

    #[test]
    fn faker_is_deterministic() {
        let left = StockFaker::new(42).consolidated_stock(CategoryId::new(1), true);
        let right = StockFaker::new(42).consolidated_stock(CategoryId::new(1), true);
        assert_eq!(left, right);
    }

    #[test]
    fn stock_totals_match_bags() {
        let stock = StockFaker::new(7).consolidated_stock(CategoryId::new(2), false);
        let sum: i64 = stock.consolidated_bags.iter().map(|bag| bag.quantity).sum();
        assert_eq!(stock.total_quantity, sum);
        assert!(!stock.consolidated_bags.is_empty());
        assert!(stock.consolidated_bags.iter().all(|bag| bag.unit_price.is_none()));
    }

    #[test]
    fn priced_stock_uses_fifty_cent_steps() {
        let stock = StockFaker::new(9).consolidated_stock(CategoryId::new(1), true);
        for bag in &stock.consolidated_bags {
            let price = bag.unit_price.expect("priced bag");
            assert_eq!(price % 50, 0);
            assert!((1_500..=9_000).contains(&price));
        }
    }

    #[test]
    fn record_details_sum_their_bags_and_name_negative_spheres() {
        let detail = StockFaker::new(4).record_detail(RecordId::new(12), RecordKind::Output);
        assert_eq!(detail.id, "12");
        assert_eq!(detail.kind, "output");
        assert!(!detail.bags.is_empty());
        assert_eq!(
            detail.quantity,
            detail.bags.iter().map(|bag| bag.quantity).sum::<i64>()
        );
        assert!(detail.bags.iter().all(|bag| bag.sph.value.starts_with('-')));
    }

    #[test]
    fn shuffle_keeps_every_element() {
        let mut faker = StockFaker::new(3);
        let values = cylinder_values();
        let mut shuffled = faker.shuffled(&values);
        shuffled.sort_by_key(|cylinder| cylinder.id);
        assert_eq!(shuffled, values);
    }

    #[test]
    fn categories_start_at_one() {
        let categories = categories();
        assert_eq!(categories[0].id, CategoryId::new(1));
        assert!(demo_identity().user_id.get() > 0);
    }
}
