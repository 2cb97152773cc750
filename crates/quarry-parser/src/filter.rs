//! Filter parameter parsing
//!
//! Supported shapes under the `filter` parameter:
//! - `filter[status]=active` equality (`true`/`false` become booleans)
//! - `filter[deleted_at]=` IS NULL
//! - `filter[id][]=1&filter[id][]=2` membership
//! - `filter[age][operator]=gt&filter[age][value]=30` explicit operator
//! - `filter[age][gte]=18&filter[age][lt]=65` operator keys
//! - `filter[or][0][]=email&filter[or][0][]==&filter[or][0][]=a@x.com` OR-group
//!   triples, also accepted as the literal `filter[or][0]=[email,=,a@x.com]`
//!
//! Fields that are neither searchable nor declared filterable, and malformed
//! entries, are dropped without failing the request.

use quarry_core::{Boolean, FilterCondition, Operator, Value};
use serde::{Deserialize, Serialize};

use crate::coerce::{coerce_ordered, coerce_scalar, is_identifier, normalize_date, split_list};
use crate::params::ParamValue;
use crate::search::SearchableFields;

/// Key under `filter` holding OR-groups
pub const OR_KEY: &str = "or";

/// Parsed filter parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    /// Conditions AND-joined at the top level
    pub conditions: Vec<FilterCondition>,
    /// Each group is one parenthesized OR clause
    pub or_groups: Vec<Vec<FilterCondition>>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.or_groups.is_empty()
    }
}

/// Raw operand before coercion
#[derive(Debug, Clone)]
enum RawOperand {
    Scalar(String),
    List(Vec<String>),
}

impl RawOperand {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Scalar(s) => Some(RawOperand::Scalar(s.clone())),
            ParamValue::List(_) => Some(RawOperand::List(value.scalars())),
            ParamValue::Map(_) => None,
        }
    }

    /// Operand as a list; scalars are split on commas
    fn into_list(self) -> Vec<String> {
        match self {
            RawOperand::Scalar(s) => split_list(&s),
            RawOperand::List(items) => items,
        }
    }
}

/// Parses the `filter` parameter against a searchable field set
#[derive(Debug, Clone)]
pub struct FilterParser<'a> {
    searchable: &'a SearchableFields,
    filterable: &'a [String],
}

impl<'a> FilterParser<'a> {
    pub fn new(searchable: &'a SearchableFields) -> Self {
        Self {
            searchable,
            filterable: &[],
        }
    }

    /// Also accept filters on these fields
    pub fn with_filterable(mut self, filterable: &'a [String]) -> Self {
        self.filterable = filterable;
        self
    }

    pub fn parse(&self, filter: &ParamValue) -> FilterSet {
        let mut set = FilterSet::default();

        let ParamValue::Map(entries) = filter else {
            log::debug!("Ignoring filter parameter that is not a map");
            return set;
        };

        for (key, value) in entries {
            if key == OR_KEY {
                self.parse_or(value, &mut set);
                continue;
            }
            if !self.allowed(key) {
                log::debug!("Ignoring filter on non-searchable field '{}'", key);
                continue;
            }
            set.conditions.extend(self.parse_field(key, value));
        }

        set
    }

    fn allowed(&self, path: &str) -> bool {
        is_identifier(path)
            && (self.searchable.contains(path) || self.filterable.iter().any(|f| f == path))
    }

    fn parse_field(&self, path: &str, value: &ParamValue) -> Vec<FilterCondition> {
        match value {
            ParamValue::Scalar(raw) if raw.is_empty() => {
                build(path, Operator::NotExists, None, Boolean::And)
                    .into_iter()
                    .collect()
            }
            ParamValue::Scalar(raw) => build(
                path,
                Operator::Eq,
                Some(RawOperand::Scalar(raw.clone())),
                Boolean::And,
            )
            .into_iter()
            .collect(),
            ParamValue::List(_) => build(
                path,
                Operator::In,
                RawOperand::from_param(value),
                Boolean::And,
            )
            .into_iter()
            .collect(),
            ParamValue::Map(entries) => self.parse_field_map(path, value, entries),
        }
    }

    fn parse_field_map(
        &self,
        path: &str,
        value: &ParamValue,
        entries: &[(String, ParamValue)],
    ) -> Vec<FilterCondition> {
        let explicit_op = value.get("operator").and_then(ParamValue::as_scalar);
        let explicit_value = value.get("value");

        if explicit_op.is_some() || explicit_value.is_some() {
            let operator = match explicit_op {
                Some(raw) => match raw.parse::<Operator>() {
                    Ok(op) => op,
                    Err(_) => {
                        log::debug!("Ignoring filter on '{}' with unknown operator '{}'", path, raw);
                        return Vec::new();
                    }
                },
                None => match explicit_value {
                    Some(ParamValue::List(_)) => Operator::In,
                    _ => Operator::Eq,
                },
            };
            let operand = explicit_value.and_then(RawOperand::from_param);
            return build(path, operator, operand, Boolean::And)
                .into_iter()
                .collect();
        }

        // Operator keys: filter[age][gte]=18&filter[age][lt]=65
        entries
            .iter()
            .filter_map(|(op_key, operand)| match op_key.parse::<Operator>() {
                Ok(op) => build(path, op, RawOperand::from_param(operand), Boolean::And),
                Err(_) => {
                    log::debug!("Ignoring filter key '{}' on '{}'", op_key, path);
                    None
                }
            })
            .collect()
    }

    fn parse_or(&self, value: &ParamValue, set: &mut FilterSet) {
        let mut group = Vec::new();

        for item in value.items() {
            if let Some(condition) = self.parse_triple(item) {
                group.push(condition);
                continue;
            }

            // A list of triples forms a separate group
            let nested: Vec<FilterCondition> = item
                .items()
                .into_iter()
                .filter_map(|triple| self.parse_triple(triple))
                .collect();
            if !nested.is_empty() {
                set.or_groups.push(nested);
            }
        }

        if !group.is_empty() {
            set.or_groups.insert(0, group);
        }
    }

    /// `[field, operator, value...]` as a list, a bracketed literal or a map
    fn parse_triple(&self, item: &ParamValue) -> Option<FilterCondition> {
        let (field, operator, operand) = match item {
            ParamValue::Scalar(raw) => {
                let inner = raw.trim().strip_prefix('[')?.strip_suffix(']')?;
                let mut parts = inner.splitn(3, ',').map(str::trim);
                let field = parts.next()?.to_string();
                let operator = parts.next()?.to_string();
                let operand = RawOperand::Scalar(parts.next().unwrap_or("").to_string());
                (field, operator, Some(operand))
            }
            ParamValue::List(items) => {
                let field = items.first()?.as_scalar()?.to_string();
                let operator = items.get(1)?.as_scalar()?.to_string();
                let operand = match &items[2..] {
                    [] => None,
                    [single] => RawOperand::from_param(single),
                    many => Some(RawOperand::List(
                        many.iter()
                            .filter_map(|v| v.as_scalar().map(str::to_string))
                            .collect(),
                    )),
                };
                (field, operator, operand)
            }
            ParamValue::Map(_) => {
                let field = item.get("field")?.as_scalar()?.to_string();
                let operator = item
                    .get("operator")
                    .and_then(ParamValue::as_scalar)
                    .unwrap_or("=")
                    .to_string();
                let operand = item.get("value").and_then(RawOperand::from_param);
                (field, operator, operand)
            }
        };

        if !self.allowed(&field) {
            log::debug!("Ignoring OR filter on non-searchable field '{}'", field);
            return None;
        }
        let operator = operator.parse::<Operator>().ok()?;
        build(&field, operator, operand, Boolean::Or)
    }
}

/// Turn one raw entry into a validated condition, or `None` to drop it
fn build(
    path: &str,
    operator: Operator,
    operand: Option<RawOperand>,
    boolean: Boolean,
) -> Option<FilterCondition> {
    let value = match operator {
        Operator::Exists | Operator::NotExists => Value::Null,
        Operator::Eq | Operator::Ne => match operand? {
            RawOperand::Scalar(raw) if raw.is_empty() => {
                // `= ''` reads as IS NULL, `!= ''` as IS NOT NULL
                let nullary = if operator == Operator::Eq {
                    Operator::NotExists
                } else {
                    Operator::Exists
                };
                return FilterCondition::with_boolean(path, nullary, Value::Null, boolean).ok();
            }
            RawOperand::Scalar(raw) => coerce_scalar(&raw),
            RawOperand::List(items) => {
                // A list with `=` is a membership test
                let list_op = if operator == Operator::Eq {
                    Operator::In
                } else {
                    Operator::NotIn
                };
                let values = items.iter().map(|s| coerce_scalar(s)).collect::<Vec<_>>();
                return FilterCondition::with_boolean(path, list_op, Value::Array(values), boolean)
                    .ok();
            }
        },
        Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte => match operand? {
            RawOperand::Scalar(raw) => coerce_ordered(&raw)?,
            RawOperand::List(_) => return None,
        },
        Operator::Like | Operator::Ilike | Operator::NotLike => match operand? {
            RawOperand::Scalar(raw) if !raw.is_empty() => Value::String(raw),
            _ => return None,
        },
        Operator::In | Operator::NotIn => {
            let items = operand?.into_list();
            if items.is_empty() {
                return None;
            }
            Value::Array(items.iter().map(|s| coerce_scalar(s)).collect())
        }
        Operator::Between | Operator::NotBetween => {
            let items = operand?.into_list();
            if items.len() != 2 {
                return None;
            }
            let bounds = items
                .iter()
                .map(|s| coerce_ordered(s))
                .collect::<Option<Vec<_>>>()?;
            Value::Array(bounds)
        }
        Operator::DateEq => match operand? {
            RawOperand::Scalar(raw) => Value::String(normalize_date(&raw)?),
            RawOperand::List(_) => return None,
        },
        Operator::DateBetween => {
            let items = operand?.into_list();
            let mut dates = items
                .iter()
                .map(|s| normalize_date(s))
                .collect::<Option<Vec<_>>>()?;
            match dates.len() {
                1 => dates.push(dates[0].clone()),
                2 => {}
                _ => return None,
            }
            Value::Array(dates.into_iter().map(Value::String).collect())
        }
    };

    match FilterCondition::with_boolean(path, operator, value, boolean) {
        Ok(condition) => Some(condition),
        Err(err) => {
            log::debug!("Dropping filter: {}", err);
            None
        }
    }
}
