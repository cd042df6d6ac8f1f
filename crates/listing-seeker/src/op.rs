//! Lookup operators for query clauses.
//!
//! The [`Op`] enum mirrors the lookup suffixes accepted in filter keys
//! (`age__gte`, `name__icontains`, `tags__in`). A key without a recognised
//! suffix is an exact match on the whole key.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::SeekerError;

/// Lookup operator for a query clause.
///
/// Operators are grouped by the values they work on:
/// - **Equality**: `Exact`, `IExact`, `Ne`
/// - **Text**: `Contains`, `IContains`, `StartsWith`, `IStartsWith`,
///   `EndsWith`, `IEndsWith`, `Regex`, `IRegex`
/// - **Ordering**: `Gt`, `Gte`, `Lt`, `Lte`
/// - **Membership**: `In`
/// - **Presence**: `IsNull`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Op {
    // Equality
    /// Equal. The default when a key carries no lookup suffix.
    #[default]
    Exact,
    /// Case-insensitive equality on the text form.
    IExact,
    /// Not equal.
    Ne,

    // Text
    /// Text contains substring.
    Contains,
    /// Case-insensitive substring.
    IContains,
    /// Text starts with prefix.
    StartsWith,
    /// Case-insensitive prefix.
    IStartsWith,
    /// Text ends with suffix.
    EndsWith,
    /// Case-insensitive suffix.
    IEndsWith,
    /// Text matches a regular expression.
    Regex,
    /// Text matches a regular expression, ignoring case.
    IRegex,

    // Ordering
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,

    /// Value is one of the given list.
    In,

    /// Field is (or is not) missing / null, driven by a boolean clause value.
    IsNull,
}

impl Op {
    /// All operators, in lookup-name order of declaration.
    pub const ALL: [Op; 17] = [
        Op::Exact,
        Op::IExact,
        Op::Ne,
        Op::Contains,
        Op::IContains,
        Op::StartsWith,
        Op::IStartsWith,
        Op::EndsWith,
        Op::IEndsWith,
        Op::Regex,
        Op::IRegex,
        Op::Gt,
        Op::Gte,
        Op::Lt,
        Op::Lte,
        Op::In,
        Op::IsNull,
    ];

    /// Parses a lookup name. `equal` and `eq` are accepted for `exact`.
    pub fn parse(lookup: &str) -> Option<Op> {
        let op = match lookup {
            "exact" | "equal" | "eq" => Op::Exact,
            "iexact" => Op::IExact,
            "ne" => Op::Ne,
            "contains" => Op::Contains,
            "icontains" => Op::IContains,
            "startswith" => Op::StartsWith,
            "istartswith" => Op::IStartsWith,
            "endswith" => Op::EndsWith,
            "iendswith" => Op::IEndsWith,
            "regex" => Op::Regex,
            "iregex" => Op::IRegex,
            "gt" => Op::Gt,
            "gte" => Op::Gte,
            "lt" => Op::Lt,
            "lte" => Op::Lte,
            "in" => Op::In,
            "isnull" => Op::IsNull,
            _ => return None,
        };
        Some(op)
    }

    /// Splits `field__lookup` into the field path and its operator.
    ///
    /// When the last `__` segment is not a lookup name, the whole key is the
    /// field path and the operator is [`Op::Exact`].
    ///
    /// ```
    /// use listing_seeker::Op;
    ///
    /// assert_eq!(Op::split_lookup("age__gte"), ("age", Op::Gte));
    /// assert_eq!(Op::split_lookup("author__name"), ("author__name", Op::Exact));
    /// ```
    pub fn split_lookup(key: &str) -> (&str, Op) {
        if let Some((field, lookup)) = key.rsplit_once("__") {
            if let Some(op) = Op::parse(lookup) {
                if !field.is_empty() {
                    return (field, op);
                }
            }
        }
        (key, Op::Exact)
    }

    /// Returns `true` for operators working on the text form of a value.
    pub fn is_text_op(self) -> bool {
        matches!(
            self,
            Op::IExact
                | Op::Contains
                | Op::IContains
                | Op::StartsWith
                | Op::IStartsWith
                | Op::EndsWith
                | Op::IEndsWith
                | Op::Regex
                | Op::IRegex
        )
    }

    /// Returns `true` for operators evaluated from an [`Ordering`].
    pub fn is_ordering_op(self) -> bool {
        matches!(
            self,
            Op::Exact | Op::Ne | Op::Gt | Op::Gte | Op::Lt | Op::Lte
        )
    }

    /// Returns `true` if the text comparison ignores case.
    pub fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Op::IExact | Op::IContains | Op::IStartsWith | Op::IEndsWith | Op::IRegex
        )
    }

    /// Evaluates a comparison given an ordering result (field compared to clause).
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Op::Exact => ordering == Ordering::Equal,
            Op::Ne => ordering != Ordering::Equal,
            Op::Gt => ordering == Ordering::Greater,
            Op::Gte => ordering != Ordering::Less,
            Op::Lt => ordering == Ordering::Less,
            Op::Lte => ordering != Ordering::Greater,
            _ => false,
        }
    }

    /// Returns the lookup name of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Exact => "exact",
            Op::IExact => "iexact",
            Op::Ne => "ne",
            Op::Contains => "contains",
            Op::IContains => "icontains",
            Op::StartsWith => "startswith",
            Op::IStartsWith => "istartswith",
            Op::EndsWith => "endswith",
            Op::IEndsWith => "iendswith",
            Op::Regex => "regex",
            Op::IRegex => "iregex",
            Op::Gt => "gt",
            Op::Gte => "gte",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::In => "in",
            Op::IsNull => "isnull",
        }
    }
}

impl FromStr for Op {
    type Err = SeekerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::parse(s).ok_or_else(|| SeekerError::UnknownLookup {
            key: s.to_string(),
            lookup: s.to_string(),
        })
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_parse_names() {
        for op in Op::ALL {
            assert_eq!(Op::parse(op.as_str()), Some(op));
        }
        assert_eq!(Op::parse("equal"), Some(Op::Exact));
        assert_eq!(Op::parse("eq"), Some(Op::Exact));
        assert_eq!(Op::parse("between"), None);
    }

    #[test]
    fn op_split_lookup() {
        assert_eq!(Op::split_lookup("age"), ("age", Op::Exact));
        assert_eq!(Op::split_lookup("age__lte"), ("age", Op::Lte));
        assert_eq!(Op::split_lookup("name__icontains"), ("name", Op::IContains));
        assert_eq!(
            Op::split_lookup("company__name__in"),
            ("company__name", Op::In)
        );
        // Not a lookup: stays part of the path
        assert_eq!(Op::split_lookup("company__name"), ("company__name", Op::Exact));
        assert_eq!(Op::split_lookup("__gt"), ("__gt", Op::Exact));
    }

    #[test]
    fn op_type_checks() {
        assert!(Op::IContains.is_text_op());
        assert!(Op::Regex.is_text_op());
        assert!(!Op::Gt.is_text_op());

        assert!(Op::Exact.is_ordering_op());
        assert!(Op::Lte.is_ordering_op());
        assert!(!Op::In.is_ordering_op());

        assert!(Op::IRegex.is_case_insensitive());
        assert!(!Op::Regex.is_case_insensitive());
    }

    #[test]
    fn op_eval_ordering() {
        assert!(Op::Exact.eval_ordering(Ordering::Equal));
        assert!(!Op::Exact.eval_ordering(Ordering::Less));

        assert!(Op::Ne.eval_ordering(Ordering::Less));
        assert!(!Op::Ne.eval_ordering(Ordering::Equal));

        assert!(Op::Gt.eval_ordering(Ordering::Greater));
        assert!(!Op::Gt.eval_ordering(Ordering::Equal));

        assert!(Op::Gte.eval_ordering(Ordering::Equal));
        assert!(!Op::Gte.eval_ordering(Ordering::Less));

        assert!(Op::Lt.eval_ordering(Ordering::Less));
        assert!(Op::Lte.eval_ordering(Ordering::Equal));
        assert!(!Op::Lte.eval_ordering(Ordering::Greater));

        assert!(!Op::Contains.eval_ordering(Ordering::Equal));
    }

    #[test]
    fn op_from_str() {
        assert_eq!("gte".parse::<Op>().unwrap(), Op::Gte);
        assert!("nope".parse::<Op>().is_err());
    }

    #[test]
    fn op_display() {
        assert_eq!(Op::Exact.to_string(), "exact");
        assert_eq!(Op::IStartsWith.to_string(), "istartswith");
    }
}
