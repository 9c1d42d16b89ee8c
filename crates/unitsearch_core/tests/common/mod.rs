#![allow(dead_code)]

use serde_json::{json, Value};
use unitsearch_core::{MemoryRosterRepository, RosterConfig, RosterService, SheetBundle};

/// Three members, one unit: m1 and m2 in unit A with weights 1 and 2,
/// m3 in no unit.
pub fn roster_json() -> Value {
    json!({
        "members": {
            "columns": ["id", "display_name", "branch", "status", "alias"],
            "rows": [
                {"id": "m1", "display_name": "Mio Sato", "branch": "JP", "status": "active", "alias": "Mii"},
                {"id": "m2", "display_name": "Mika Ueda", "branch": "JP", "status": "active", "alias": ""},
                {"id": "m3", "display_name": "Sam Reed", "branch": "EN", "status": "graduated", "alias": ""}
            ]
        },
        "member_generations": {
            "columns": ["member_id", "generation", "is_primary"],
            "rows": [
                {"member_id": "m1", "generation": "1", "is_primary": true},
                {"member_id": "m2", "generation": "1", "is_primary": true},
                {"member_id": "m3", "generation": "0", "is_primary": true}
            ]
        },
        "units": {
            "columns": ["id", "display_name", "note"],
            "rows": [
                {"id": "A", "display_name": "Aurora", "note": "debut unit"}
            ]
        },
        "unit_members": {
            "columns": ["unit_id", "member_id", "weight"],
            "rows": [
                {"unit_id": "A", "member_id": "m2", "weight": 2},
                {"unit_id": "A", "member_id": "m1", "weight": 1}
            ]
        },
        "unit_aliases": {
            "columns": ["unit_id", "alias"],
            "rows": [
                {"unit_id": "A", "alias": "Dawn"}
            ]
        }
    })
}

pub fn bundle_from(value: Value) -> SheetBundle {
    SheetBundle::from_json_str(&value.to_string()).unwrap()
}

pub fn roster_bundle() -> SheetBundle {
    bundle_from(roster_json())
}

/// Appends one row to `sheet` in a JSON bundle.
pub fn push_row(bundle: &mut Value, sheet: &str, row: Value) {
    bundle[sheet]["rows"].as_array_mut().unwrap().push(row);
}

pub fn loaded_service() -> RosterService<MemoryRosterRepository> {
    let service = RosterService::new(MemoryRosterRepository::new(), RosterConfig::default());
    service.reload(&roster_bundle()).unwrap();
    service
}
