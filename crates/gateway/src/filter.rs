//! Compiles flat query parameters into a parameterized scan filter.
//!
//! Each parameter becomes one parenthesized group: an equality predicate for
//! scalar fields, or one `contains` predicate per comma-separated value for
//! list fields (ORed together). Groups are ANDed in input order. Values never
//! enter the expression text; they are carried in [`CompiledFilter::bindings`]
//! under placeholder names derived from the field name.

use std::collections::{BTreeMap, HashSet};

use catalog_contracts::{FieldKind, RECORD_SCHEMA};

const MULTI_VALUE_SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    pub expression: String,
    /// Placeholder (including the leading `:`) to literal value.
    pub bindings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("no filter parameters were provided")]
    Empty,
    #[error("The field, {field}, was not found on resource type: {resource}")]
    UnknownField {
        field: String,
        resource: &'static str,
    },
    #[error("The field, {field}, was provided more than once")]
    DuplicateField { field: String },
    #[error("Unexpected null value found in parameter map.")]
    MissingValue { field: String },
}

impl FilterError {
    pub fn reason(&self) -> &'static str {
        match self {
            FilterError::Empty => "empty",
            FilterError::UnknownField { .. } => "unknown_field",
            FilterError::DuplicateField { .. } => "duplicate_field",
            FilterError::MissingValue { .. } => "missing_value",
        }
    }
}

/// Compile `(field, value)` pairs, in the order given, into a filter.
///
/// An empty input means "no filter" and must be handled by the caller; it is
/// rejected here with [`FilterError::Empty`].
pub fn compile<'a, I>(params: I) -> Result<CompiledFilter, FilterError>
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut groups = Vec::new();
    let mut bindings = BTreeMap::new();
    let mut seen = HashSet::new();

    for (field, value) in params {
        let kind = RECORD_SCHEMA
            .filter_kind(field)
            .ok_or_else(|| FilterError::UnknownField {
                field: field.to_string(),
                resource: RECORD_SCHEMA.resource_name,
            })?;

        if !seen.insert(field) {
            return Err(FilterError::DuplicateField {
                field: field.to_string(),
            });
        }

        let value = value.ok_or_else(|| FilterError::MissingValue {
            field: field.to_string(),
        })?;

        let predicate = match kind {
            FieldKind::Scalar => {
                let placeholder = bind(&mut bindings, field, None, value);
                format!("{} = {}", field, placeholder)
            }
            FieldKind::MultiValued => {
                let values = value.split(MULTI_VALUE_SEPARATOR).collect::<Vec<_>>();
                if values.len() == 1 {
                    let placeholder = bind(&mut bindings, field, None, value);
                    format!("contains({},{})", field, placeholder)
                } else {
                    values
                        .iter()
                        .enumerate()
                        .map(|(idx, v)| {
                            let placeholder = bind(&mut bindings, field, Some(idx), v);
                            format!("contains({},{})", field, placeholder)
                        })
                        .collect::<Vec<_>>()
                        .join(" or ")
                }
            }
        };

        groups.push(format!("({})", predicate));
    }

    if groups.is_empty() {
        return Err(FilterError::Empty);
    }

    Ok(CompiledFilter {
        expression: groups.join(" and "),
        bindings,
    })
}

fn bind(
    bindings: &mut BTreeMap<String, String>,
    field: &str,
    index: Option<usize>,
    value: &str,
) -> String {
    let placeholder = match index {
        Some(idx) => format!(":{}{}", field, idx),
        None => format!(":{}", field),
    };
    let previous = bindings.insert(placeholder.clone(), value.to_string());
    debug_assert!(previous.is_none(), "placeholder {} bound twice", placeholder);
    placeholder
}
