use quilt_engine as qe;

use std::collections::BTreeMap;

use qe::condition::permutations;
use qe::snapshot::{DayOfWeek, Season};
use qe::token::Contextual;
use qe::{ConditionFactory, ConditionKey, ConstraintSet, GameSnapshot, Scope, TokenContext, TokenString};

fn when(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

#[test]
fn exclusion_always_wins() {
    let mut set = ConstraintSet::bounded(["a", "b"]);
    set.exclude("a");
    assert!(!set.allows(&"a"));
    assert!(set.allows(&"b"));

    let mut open: ConstraintSet<&str> = ConstraintSet::unbounded();
    open.exclude("x");
    assert!(!open.allows(&"x"));
    assert!(open.allows(&"y"));
}

#[test]
fn every_weekday_has_four_days_which_map_back() {
    for &weekday in DayOfWeek::ALL {
        let days = ConditionFactory::days_for(weekday);
        assert_eq!(days.len(), 4);
        for day in days {
            assert_eq!(ConditionFactory::day_of_week_for(day), Some(weekday));
        }
    }
}

#[test]
fn weekday_conditions_narrow_the_days() {
    let context = TokenContext::with_game_tokens();
    let factory = ConditionFactory::new(&context, Scope::Global);
    let conditions = factory
        .parse_conditions(&when(&[("DayOfWeek", "Tuesday, Wednesday")]))
        .expect("conditions parse");
    let possible = factory.possible_values(&conditions);
    let days: Vec<String> = possible[&ConditionKey::new("Day")]
        .allowed_values()
        .expect("bounded")
        .into_iter()
        .map(|day| day.to_string())
        .collect();
    assert_eq!(days, vec!["2", "3", "9", "10", "16", "17", "23", "24"]);
}

#[test]
fn three_by_three_by_three_gives_27_permutations() {
    let dimensions: BTreeMap<&str, Vec<String>> = ["a", "b", "c"]
        .into_iter()
        .map(|key| (key, vec!["1".to_string(), "2".to_string(), "3".to_string()]))
        .collect();
    let all: Vec<_> = permutations(dimensions).expect("countable").collect();
    assert_eq!(all.len(), 27);
    let distinct: std::collections::BTreeSet<_> = all.iter().collect();
    assert_eq!(distinct.len(), 27);
}

#[test]
fn conditions_match_the_current_snapshot() {
    let mut context = TokenContext::with_game_tokens();
    let conditions = ConditionFactory::new(&context, Scope::Global)
        .parse_conditions(&when(&[("Season", "summer, FALL"), ("Hearts:Abigail", "4")]))
        .expect("conditions parse");

    let mut snapshot = GameSnapshot {
        season: Season::Fall,
        ..GameSnapshot::default()
    };
    snapshot.hearts.insert("Abigail".into(), 4);
    context.update_context(snapshot);
    assert!(ConditionFactory::new(&context, Scope::Global).is_match(&conditions));

    context.update_context(GameSnapshot::default());
    assert!(!ConditionFactory::new(&context, Scope::Global).is_match(&conditions));
    assert!(ConditionFactory::new(&context, Scope::Global).is_match(&qe::ConditionDictionary::new()));
}

#[test]
fn token_strings_without_tokens_resolve_to_their_text() {
    let context = TokenContext::with_game_tokens();
    let lookup = context.lookup(Scope::Global);
    let mut text = TokenString::parse("Data/Objects", &lookup);
    text.update(&lookup);
    assert_eq!(text.value(), Some("Data/Objects"));
    assert!(!text.has_any_tokens());
}

#[test]
fn repeated_context_updates_report_no_changes() {
    let mut context = TokenContext::with_game_tokens();
    let first = context.update_context(GameSnapshot::default());
    assert!(!first.changed.is_empty());
    let second = context.update_context(GameSnapshot::default());
    assert!(second.changed.is_empty());
}
