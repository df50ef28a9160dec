//! Built-in maintenance items shipped with the app.

use crate::model::MaintenanceItem;

struct BuiltIn {
    id: &'static str,
    name: &'static str,
    category: &'static str,
    km: u64,
    months: Option<u32>,
}

const fn built_in(
    id: &'static str,
    name: &'static str,
    category: &'static str,
    km: u64,
    months: Option<u32>,
) -> BuiltIn {
    BuiltIn {
        id,
        name,
        category,
        km,
        months,
    }
}

const BUILT_INS: &[BuiltIn] = &[
    built_in("engine-oil-filter", "Engine oil filter", "Filters & Plugs", 10_000, Some(12)),
    built_in("oil-plug", "Oil plug", "Filters & Plugs", 10_000, Some(12)),
    built_in("air-filter", "Air filter", "Filters & Plugs", 30_000, Some(24)),
    built_in("spark-plugs", "Spark plugs (4)", "Ignition", 30_000, Some(24)),
    built_in("ac-filter", "A/C filter", "Filters & Plugs", 20_000, None),
    built_in("accessory-belt", "Accessory belt", "Belts & Pulleys", 60_000, None),
    built_in("pulley-accessory-belt", "Pulley for accessory belt", "Belts & Pulleys", 60_000, None),
    built_in("coolant-pump-belt", "Coolant pump belt", "Belts & Pulleys", 100_000, None),
    built_in("atf-filter", "ATF Filter", "Transmission", 60_000, None),
    built_in("atf-filter-seal", "ATF Filter seal", "Transmission", 60_000, None),
    built_in("atf-plug-washer", "ATF Plug washer", "Transmission", 60_000, None),
    built_in("coolant-pump-seal", "Coolant pump seal", "Seals", 100_000, None),
    built_in("engine-oil-6l", "Engine Oil 6L", "Fluids", 10_000, Some(12)),
    built_in("atf-6l", "ATF 6L", "Fluids", 50_000, None),
    built_in("brake-fluid-1l", "Brake fluid 1L", "Fluids", 50_000, Some(24)),
    built_in("gear-oil", "High Performance Gear Oil", "Fluids", 50_000, None),
    built_in("coolant-fluid", "Coolant fluid", "Fluids", 50_000, None),
];

/// The fixed catalog, in definition order.
pub fn built_in_items() -> Vec<MaintenanceItem> {
    BUILT_INS
        .iter()
        .map(|b| MaintenanceItem {
            id: b.id.to_string(),
            name: b.name.to_string(),
            category: b.category.to_string(),
            interval_km: Some(b.km),
            interval_months: b.months,
            is_custom: false,
        })
        .collect()
}

pub fn is_built_in(id: &str) -> bool {
    BUILT_INS.iter().any(|b| b.id == id)
}

/// Built-ins first, then custom items in creation order.
pub fn full_catalog(custom: &[MaintenanceItem]) -> Vec<MaintenanceItem> {
    let mut items = built_in_items();
    items.extend(custom.iter().cloned());
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_built_ins_are_valid() {
        let items = built_in_items();
        assert_eq!(items.len(), 17);
        assert!(items.iter().all(|i| i.has_interval() && !i.is_custom));
        let ids: HashSet<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids.len(), items.len());
    }

    #[test]
    fn test_full_catalog_order() {
        let custom = MaintenanceItem {
            id: "c1".into(),
            name: "Wipers".into(),
            category: "Other".into(),
            interval_km: None,
            interval_months: Some(6),
            is_custom: true,
        };
        let all = full_catalog(std::slice::from_ref(&custom));
        assert_eq!(all.first().map(|i| i.id.as_str()), Some("engine-oil-filter"));
        assert_eq!(all.last(), Some(&custom));
        assert!(is_built_in("gear-oil"));
        assert!(!is_built_in("c1"));
    }
}
