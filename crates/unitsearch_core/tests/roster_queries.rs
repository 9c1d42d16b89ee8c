mod common;

use common::{bundle_from, loaded_service, push_row, roster_json};
use serde_json::json;
use unitsearch_core::{
    EntityKind, MatchKind, MemberFilter, MemoryRosterRepository, RosterConfig, RosterError,
    RosterService, SearchQuery,
};

fn hit_ids(service: &RosterService<MemoryRosterRepository>, query: &SearchQuery) -> Vec<String> {
    service
        .search(query)
        .unwrap()
        .items
        .into_iter()
        .map(|hit| hit.member.id)
        .collect()
}

#[test]
fn get_unit_orders_members_by_weight() {
    let service = loaded_service();
    let unit = service.get_unit("A").unwrap();

    assert_eq!(unit.display_name, "Aurora");
    assert_eq!(unit.aliases, vec!["Dawn"]);
    assert_eq!(unit.member_ids(), vec!["m1", "m2"]);
    assert_eq!(service.unit_members("A").unwrap(), vec!["m1", "m2"]);
}

#[test]
fn weight_ties_break_by_member_id() {
    let mut value = roster_json();
    value["unit_members"]["rows"][0]["weight"] = json!(1);
    push_row(
        &mut value,
        "unit_members",
        json!({"unit_id": "A", "member_id": "m3", "weight": 0.5}),
    );
    let service = RosterService::new(MemoryRosterRepository::new(), RosterConfig::default());
    service.reload(&bundle_from(value)).unwrap();

    for _ in 0..3 {
        assert_eq!(service.unit_members("A").unwrap(), vec!["m3", "m1", "m2"]);
    }
}

#[test]
fn unknown_ids_are_not_found() {
    let service = loaded_service();
    match service.get_unit("Z").unwrap_err() {
        RosterError::NotFound(err) => {
            assert_eq!(err.kind, EntityKind::Unit);
            assert_eq!(err.id, "Z");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(service.get_member("m404").unwrap_err().code(), "not_found");
    assert!(service.member_units("m404").is_err());
}

#[test]
fn member_lookup_and_reverse_membership() {
    let service = loaded_service();
    let member = service.get_member("m3").unwrap();
    assert_eq!(member.display_name, "Sam Reed");
    assert!(member.generations.contains("0"));

    assert_eq!(service.member_units("m1").unwrap(), vec!["A"]);
    assert!(service.member_units("m3").unwrap().is_empty());
}

#[test]
fn list_members_treats_all_as_unconstrained() {
    let service = loaded_service();
    assert_eq!(service.list_members(&MemberFilter::any()).unwrap().len(), 3);
    assert_eq!(
        service
            .list_members(&MemberFilter::any().with_branch("ALL"))
            .unwrap()
            .len(),
        3
    );

    let graduated = service
        .list_members(&MemberFilter::from_options(None, Some("graduated"), None))
        .unwrap();
    assert_eq!(graduated.len(), 1);
    assert_eq!(graduated[0].id, "m3");

    let by_generation = service
        .list_members(&MemberFilter::any().with_generation("1").with_branch("JP"))
        .unwrap();
    assert_eq!(by_generation.len(), 2);
}

#[test]
fn search_with_branch_filter() {
    let service = loaded_service();
    let query = SearchQuery::new("m").with_filter(MemberFilter::any().with_branch("JP"));
    assert_eq!(hit_ids(&service, &query), vec!["m1", "m2"]);

    let everyone = SearchQuery::new("m");
    assert_eq!(hit_ids(&service, &everyone), vec!["m1", "m2", "m3"]);
}

#[test]
fn search_ranks_exact_then_token_then_substring() {
    let service = loaded_service();

    let page = service.search(&SearchQuery::new("mii")).unwrap();
    assert_eq!(page.items[0].member.id, "m1");
    assert_eq!(page.items[0].match_kind, MatchKind::Exact);

    let page = service.search(&SearchQuery::new("SATO")).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].match_kind, MatchKind::Token);

    let page = service.search(&SearchQuery::new("mi")).unwrap();
    let kinds: Vec<MatchKind> = page.items.iter().map(|hit| hit.match_kind).collect();
    assert_eq!(kinds, vec![MatchKind::Substring, MatchKind::Substring]);
}

#[test]
fn empty_query_matches_everyone_with_filters() {
    let service = loaded_service();
    let query = SearchQuery::new("  ").with_filter(MemberFilter::any().with_status("active"));
    let page = service.search(&query).unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|hit| hit.match_kind == MatchKind::All));
}

#[test]
fn pagination_reports_total_and_applied_limit() {
    let service = loaded_service();

    let page = service.search(&SearchQuery::new("").with_page(2, 1)).unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.applied_limit, 2);
    let ids: Vec<&str> = page.items.iter().map(|hit| hit.member.id.as_str()).collect();
    assert_eq!(ids, vec!["m2", "m3"]);

    let page = service.search(&SearchQuery::new("").with_page(0, 0)).unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 3);

    let page = service.search(&SearchQuery::new("").with_page(10, 50)).unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 3);

    let page = service.search(&SearchQuery::new("").with_page(5000, 0)).unwrap();
    assert_eq!(page.applied_limit, 100);

    let page = service.search(&SearchQuery::new("")).unwrap();
    assert_eq!(page.applied_limit, 20);
}

#[test]
fn unit_search_covers_aliases() {
    let service = loaded_service();
    let page = service.search_units("dawn", None, 0).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].unit_id, "A");
    assert_eq!(page.items[0].match_kind, MatchKind::Exact);

    assert_eq!(service.search_units("nothing", None, 0).unwrap().total, 0);
}

#[test]
fn facets_list_distinct_values() {
    let facets = loaded_service().facets().unwrap();
    assert_eq!(facets.branches, vec!["EN", "JP"]);
    assert_eq!(facets.statuses, vec!["active", "graduated"]);
    assert_eq!(facets.generations, vec!["0", "1"]);
}
