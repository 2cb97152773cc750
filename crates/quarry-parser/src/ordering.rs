//! `orderBy` / `sortedBy` pairing and `with` eager-load lists

use quarry_core::{Direction, OrderSpec};

use crate::coerce::{is_identifier, split_list};
use crate::params::ParamValue;

/// Pair ordering fields with directions by position.
///
/// A shorter direction list reuses its first entry; an absent or invalid
/// direction is ascending.
pub fn parse_order(order_by: Option<&ParamValue>, sorted_by: Option<&ParamValue>) -> Vec<OrderSpec> {
    let fields = order_by.map(list_of).unwrap_or_default();
    let directions = sorted_by.map(list_of).unwrap_or_default();
    let fallback = directions
        .first()
        .and_then(|d| Direction::parse(d))
        .unwrap_or_default();

    fields
        .iter()
        .enumerate()
        .filter_map(|(index, field)| {
            if !is_identifier(field) {
                log::debug!("Ignoring invalid order field '{}'", field);
                return None;
            }
            let direction = directions
                .get(index)
                .and_then(|d| Direction::parse(d))
                .unwrap_or(fallback);
            Some(OrderSpec::new(field.clone(), direction))
        })
        .collect()
}

/// Relation paths to eager-load
pub fn parse_with(with: Option<&ParamValue>) -> Vec<String> {
    let mut relations: Vec<String> = Vec::new();
    for path in with.map(list_of).unwrap_or_default() {
        if !is_identifier(&path) {
            log::debug!("Ignoring invalid relation '{}'", path);
            continue;
        }
        if !relations.contains(&path) {
            relations.push(path);
        }
    }
    relations
}

/// Comma separated scalar or a list of scalars
fn list_of(value: &ParamValue) -> Vec<String> {
    value.scalars().iter().flat_map(|s| split_list(s)).collect()
}
