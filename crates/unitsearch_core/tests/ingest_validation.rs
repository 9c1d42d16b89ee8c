mod common;

use common::{bundle_from, push_row, roster_bundle, roster_json};
use serde_json::json;
use unitsearch_core::ingest::normalize::{normalize_bundle, NormalizeOptions};
use unitsearch_core::{validate_bundle, SchemaIssue, ValidationError};

#[test]
fn valid_bundle_passes() {
    validate_bundle(&roster_bundle()).unwrap();
}

#[test]
fn missing_required_sheets_are_reported_together() {
    let mut value = roster_json();
    let sheets = value.as_object_mut().unwrap();
    sheets.remove("units");
    sheets.remove("member_generations");

    let errors = validate_bundle(&bundle_from(value)).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.first(),
        &ValidationError::MissingSheet {
            sheets: vec!["member_generations".to_string(), "units".to_string()],
        }
    );
}

#[test]
fn optional_sheets_may_be_absent() {
    let mut value = roster_json();
    value.as_object_mut().unwrap().remove("unit_aliases");
    validate_bundle(&bundle_from(value)).unwrap();
}

#[test]
fn legacy_unit_alias_sheet_name_is_accepted() {
    let mut value = roster_json();
    let sheets = value.as_object_mut().unwrap();
    let aliases = sheets.remove("unit_aliases").unwrap();
    sheets.insert("units_aliases".to_string(), aliases);

    let bundle = bundle_from(value);
    validate_bundle(&bundle).unwrap();
    let dataset = normalize_bundle(&bundle, &NormalizeOptions::default());
    assert!(dataset.units[0].aliases.contains("Dawn"));
}

#[test]
fn missing_column_is_a_schema_error() {
    let mut value = roster_json();
    value["units"] = json!({
        "columns": ["id"],
        "rows": [{"id": "A"}]
    });

    let errors = validate_bundle(&bundle_from(value)).unwrap_err();
    assert_eq!(
        errors.first(),
        &ValidationError::Schema {
            sheet: "units".to_string(),
            column: "display_name".to_string(),
            row: None,
            issue: SchemaIssue::MissingColumn,
        }
    );
}

#[test]
fn blank_key_and_bad_weight_point_at_rows() {
    let mut value = roster_json();
    push_row(
        &mut value,
        "members",
        json!({"id": " ", "display_name": "Ghost", "branch": "JP", "status": "active"}),
    );
    push_row(
        &mut value,
        "unit_members",
        json!({"unit_id": "A", "member_id": "m3", "weight": "heavy"}),
    );

    let errors: Vec<ValidationError> = validate_bundle(&bundle_from(value)).unwrap_err().into_vec();
    assert!(errors.contains(&ValidationError::Schema {
        sheet: "members".to_string(),
        column: "id".to_string(),
        row: Some(3),
        issue: SchemaIssue::BlankValue,
    }));
    assert!(errors.contains(&ValidationError::Schema {
        sheet: "unit_members".to_string(),
        column: "weight".to_string(),
        row: Some(2),
        issue: SchemaIssue::InvalidNumber("heavy".to_string()),
    }));
}

#[test]
fn duplicate_ids_and_memberships_are_rejected() {
    let mut value = roster_json();
    push_row(
        &mut value,
        "members",
        json!({"id": "m1", "display_name": "Copy", "branch": "JP", "status": "active"}),
    );
    push_row(
        &mut value,
        "unit_members",
        json!({"unit_id": "A", "member_id": "m1", "weight": 5}),
    );

    let errors = validate_bundle(&bundle_from(value)).unwrap_err().into_vec();
    assert!(errors.contains(&ValidationError::DuplicateKey {
        sheet: "members".to_string(),
        key: "m1".to_string(),
        row: 3,
        first_row: 0,
    }));
    assert!(errors.contains(&ValidationError::DuplicateKey {
        sheet: "unit_members".to_string(),
        key: "A/m1".to_string(),
        row: 2,
        first_row: 1,
    }));
}

#[test]
fn dangling_references_are_rejected() {
    let mut value = roster_json();
    push_row(
        &mut value,
        "unit_members",
        json!({"unit_id": "A", "member_id": "m404", "weight": 1}),
    );
    push_row(&mut value, "unit_aliases", json!({"unit_id": "Z", "alias": "Zed"}));

    let errors = validate_bundle(&bundle_from(value)).unwrap_err();
    let codes: Vec<&str> = errors.iter().map(ValidationError::code).collect();
    assert_eq!(codes, vec!["referential_integrity", "referential_integrity"]);
    assert_eq!(
        errors.first(),
        &ValidationError::ReferentialIntegrity {
            sheet: "unit_members".to_string(),
            column: "member_id".to_string(),
            row: 2,
            value: "m404".to_string(),
            target: "members".to_string(),
        }
    );
    assert!(errors.to_string().contains("(+1 more)"));
}

#[test]
fn blank_rows_are_ignored() {
    let mut value = roster_json();
    push_row(
        &mut value,
        "unit_members",
        json!({"unit_id": "", "member_id": null, "weight": ""}),
    );
    validate_bundle(&bundle_from(value)).unwrap();
}

#[test]
fn normalized_dataset_reflects_bundle() {
    let dataset = normalize_bundle(&roster_bundle(), &NormalizeOptions::default());

    let ids: Vec<&str> = dataset.members.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
    assert!(dataset.members[0].keywords.contains("Mii"));
    assert_eq!(dataset.members[0].primary_generation.as_deref(), Some("1"));

    let unit = &dataset.units[0];
    assert_eq!(unit.note.as_deref(), Some("debut unit"));
    let order: Vec<(&str, f64)> = unit
        .members
        .iter()
        .map(|entry| (entry.member_id.as_str(), entry.weight))
        .collect();
    assert_eq!(order, vec![("m1", 1.0), ("m2", 2.0)]);
    assert_eq!(dataset.membership_count(), 2);
}

#[test]
fn blank_weight_takes_configured_default() {
    let mut value = roster_json();
    value["unit_members"]["rows"][0]["weight"] = json!("");

    let options = NormalizeOptions { default_weight: 0.5 };
    let dataset = normalize_bundle(&bundle_from(value), &options);
    let order: Vec<&str> = dataset.units[0]
        .members
        .iter()
        .map(|entry| entry.member_id.as_str())
        .collect();
    assert_eq!(order, vec!["m2", "m1"]);
}

#[test]
fn padded_column_names_keep_their_values() {
    let mut value = roster_json();
    value["members"] = json!({
        "columns": ["id", " display_name ", "branch ", "status"],
        "rows": [
            {"id": "m1", " display_name ": "Mio Sato", "branch ": "JP", "status": "active"},
            {"id": "m2", " display_name ": "Mika Ueda", "branch ": "JP", "status": "active"},
            {"id": "m3", " display_name ": "Sam Reed", "branch ": "EN", "status": "graduated"}
        ]
    });

    let bundle = bundle_from(value);
    validate_bundle(&bundle).unwrap();
    let dataset = normalize_bundle(&bundle, &NormalizeOptions::default());
    assert_eq!(dataset.members[0].display_name, "Mio Sato");
    assert_eq!(dataset.members[2].branch, "EN");
}

#[test]
fn headerless_sheet_without_rows_is_an_empty_sheet() {
    let mut value = roster_json();
    value["member_generations"] = json!({"rows": []});

    let bundle = bundle_from(value);
    validate_bundle(&bundle).unwrap();
    let dataset = normalize_bundle(&bundle, &NormalizeOptions::default());
    assert!(dataset.members.iter().all(|member| member.generations.is_empty()));
}
