//! Server-side filter predicates.
//!
//! A [`Condition`] is the table-native form of a filter. Real transports send
//! [`Condition::render`]'s expression string with its placeholder maps; in-memory tables call
//! [`Condition::evaluate`] directly.
//!
//! # Expression Syntax
//!
//! ```text
//! #n0 = :v0                 - Equality
//! contains(#n0, :v0)        - Substring
//! #n0 BETWEEN :v0 AND :v1   - Inclusive range
//! a AND b                   - Conjunction
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::{FilterDescriptor, FilterValue};
use crate::model::{WireItem, WireValue};
use crate::normalize::decimal_to_i64;

/// A predicate evaluated by the table against stored items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Eq {
        attribute: String,
        value: WireValue,
    },
    Contains {
        attribute: String,
        substring: String,
    },
    Between {
        attribute: String,
        low: WireValue,
        high: WireValue,
    },
    And(Box<Condition>, Box<Condition>),
}

/// A rendered expression with its attribute-name and value placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterExpression {
    pub expression: String,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, WireValue>,
}

impl From<&FilterDescriptor> for Condition {
    fn from(descriptor: &FilterDescriptor) -> Self {
        match descriptor {
            FilterDescriptor::Equals { attribute, value } => Condition::Eq {
                attribute: attribute.clone(),
                value: match value {
                    FilterValue::Int(n) => WireValue::number(*n),
                    FilterValue::Text(s) => WireValue::string(s.clone()),
                },
            },
            FilterDescriptor::Contains {
                attribute,
                substring,
            } => Condition::Contains {
                attribute: attribute.clone(),
                substring: substring.clone(),
            },
            FilterDescriptor::Between {
                attribute,
                start,
                end,
            } => Condition::Between {
                attribute: attribute.clone(),
                low: WireValue::number(*start),
                high: WireValue::number(*end),
            },
        }
    }
}

impl Condition {
    /// Left-folds the descriptors into one conjunction.
    pub fn all(descriptors: &[FilterDescriptor]) -> Option<Condition> {
        descriptors
            .iter()
            .map(Condition::from)
            .reduce(Condition::and)
    }

    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    /// Evaluates the predicate against a stored item.
    ///
    /// Missing attributes and type mismatches never match.
    pub fn evaluate(&self, item: &WireItem) -> bool {
        match self {
            Condition::Eq { attribute, value } => item
                .get(attribute)
                .is_some_and(|stored| compare(stored, value) == Some(Ordering::Equal)),
            Condition::Contains {
                attribute,
                substring,
            } => matches!(item.get(attribute), Some(WireValue::S(s)) if s.contains(substring.as_str())),
            Condition::Between {
                attribute,
                low,
                high,
            } => item.get(attribute).is_some_and(|stored| {
                matches!(
                    compare(stored, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(compare(stored, high), Some(Ordering::Less | Ordering::Equal))
            }),
            Condition::And(left, right) => left.evaluate(item) && right.evaluate(item),
        }
    }

    /// Renders the predicate into expression syntax.
    ///
    /// Attribute names are always aliased so reserved words (`status`, `name`, `timestamp`)
    /// are safe to use.
    pub fn render(&self) -> FilterExpression {
        let mut renderer = Renderer::default();
        let expression = renderer.render(self);
        FilterExpression {
            expression,
            names: renderer.names,
            values: renderer.values,
        }
    }
}

/// Orders two stored values of the same type; numbers compare by value.
fn compare(a: &WireValue, b: &WireValue) -> Option<Ordering> {
    match (a, b) {
        (WireValue::S(a), WireValue::S(b)) => Some(a.cmp(b)),
        (WireValue::N(a), WireValue::N(b)) => match (decimal_to_i64(a), decimal_to_i64(b)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        },
        (WireValue::Bool(a), WireValue::Bool(b)) => Some(a.cmp(b)),
        (WireValue::Null(_), WireValue::Null(_)) => Some(Ordering::Equal),
        _ => None,
    }
}

#[derive(Default)]
struct Renderer {
    names: BTreeMap<String, String>,
    values: BTreeMap<String, WireValue>,
    name_slots: BTreeMap<String, String>,
}

impl Renderer {
    fn render(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Eq { attribute, value } => {
                let name = self.name(attribute);
                let value = self.value(value.clone());
                format!("{} = {}", name, value)
            }
            Condition::Contains {
                attribute,
                substring,
            } => {
                let name = self.name(attribute);
                let value = self.value(WireValue::string(substring.clone()));
                format!("contains({}, {})", name, value)
            }
            Condition::Between {
                attribute,
                low,
                high,
            } => {
                let name = self.name(attribute);
                let low = self.value(low.clone());
                let high = self.value(high.clone());
                format!("{} BETWEEN {} AND {}", name, low, high)
            }
            // AND is associative, so the left-folded tree renders flat.
            Condition::And(left, right) => {
                let left = self.render(left);
                let right = self.render(right);
                format!("{} AND {}", left, right)
            }
        }
    }

    fn name(&mut self, attribute: &str) -> String {
        if let Some(slot) = self.name_slots.get(attribute) {
            return slot.clone();
        }
        let slot = format!("#n{}", self.name_slots.len());
        self.name_slots.insert(attribute.to_string(), slot.clone());
        self.names.insert(slot.clone(), attribute.to_string());
        slot
    }

    fn value(&mut self, value: WireValue) -> String {
        let slot = format!(":v{}", self.values.len());
        self.values.insert(slot.clone(), value);
        slot
    }
}
