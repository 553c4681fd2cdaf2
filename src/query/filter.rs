use rusqlite::types::ToSql;

use super::expr::{parse_expr, CompareOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Title,
    Cuisine,
}

impl TextField {
    fn column(self) -> &'static str {
        match self {
            TextField::Title => "title",
            TextField::Cuisine => "cuisine",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    TotalTime,
    Rating,
    Calories,
}

impl NumericField {
    fn column(self) -> &'static str {
        match self {
            NumericField::TotalTime => "total_time",
            NumericField::Rating => "rating",
            NumericField::Calories => "calories_kcal",
        }
    }

    fn is_integer(self) -> bool {
        !matches!(self, NumericField::Rating)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Case-insensitive substring match; `needle` is stored lowercased.
    TextContains { field: TextField, needle: String },
    NumericCompare {
        field: NumericField,
        op: CompareOp,
        value: f64,
    },
}

impl Filter {
    /// `None` only for empty input. Whitespace-only input trims to an empty needle,
    /// which matches every record whose field is present.
    pub fn text(field: TextField, raw: &str) -> Option<Filter> {
        if raw.is_empty() {
            return None;
        }
        let needle = raw.trim().to_lowercase();
        Some(Filter::TextContains { field, needle })
    }

    /// `None` when the expression doesn't parse: the field is then simply not filtered.
    pub fn numeric(field: NumericField, raw: &str) -> Option<Filter> {
        let (op, value) = parse_expr(raw)?;
        Some(Filter::NumericCompare { field, op, value })
    }

    fn push_sql(&self, conditions: &mut Vec<String>, params: &mut Vec<Box<dyn ToSql>>) {
        match self {
            Filter::TextContains { field, needle } => {
                conditions.push(format!(
                    "instr(fold_case({}), ?{}) > 0",
                    field.column(),
                    params.len() + 1
                ));
                params.push(Box::new(needle.clone()));
            }
            Filter::NumericCompare { field, op, value } => {
                // NULL never satisfies a comparison against a concrete value
                conditions.push(format!(
                    "{col} IS NOT NULL AND {col} {op} ?{n}",
                    col = field.column(),
                    op = op.as_sql(),
                    n = params.len() + 1
                ));
                if field.is_integer() {
                    params.push(Box::new(value.trunc() as i64));
                } else {
                    params.push(Box::new(*value));
                }
            }
        }
    }
}

/// Logical AND of zero or more filters. Empty matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    filters: Vec<Filter>,
}

impl Predicate {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn and(mut self, filter: Option<Filter>) -> Self {
        self.filters.extend(filter);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Render as a ` WHERE ...` clause (empty string when unfiltered) plus positional params.
    pub fn to_sql(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        for f in &self.filters {
            f.push_sql(&mut conditions, &mut params);
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        (where_clause, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_no_filter() {
        assert_eq!(Filter::text(TextField::Title, ""), None);
        assert_eq!(
            Filter::text(TextField::Cuisine, "   "),
            Some(Filter::TextContains {
                field: TextField::Cuisine,
                needle: String::new()
            })
        );
        assert_eq!(
            Filter::text(TextField::Cuisine, " Italian "),
            Some(Filter::TextContains {
                field: TextField::Cuisine,
                needle: "italian".into()
            })
        );
    }

    #[test]
    fn unparseable_numeric_is_no_filter() {
        assert_eq!(Filter::numeric(NumericField::Calories, "lots"), None);
        assert_eq!(
            Filter::numeric(NumericField::Rating, ">=4.5"),
            Some(Filter::NumericCompare {
                field: NumericField::Rating,
                op: CompareOp::Ge,
                value: 4.5
            })
        );
    }

    #[test]
    fn empty_predicate_has_no_where() {
        let (sql, params) = Predicate::all().to_sql();
        assert!(sql.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn conditions_are_anded_with_numbered_params() {
        let p = Predicate::all()
            .and(Filter::text(TextField::Title, "Pie"))
            .and(Filter::numeric(NumericField::Calories, "<=400"))
            .and(Filter::numeric(NumericField::TotalTime, "nope"));
        assert_eq!(p.filters().len(), 2);
        let (sql, params) = p.to_sql();
        assert_eq!(
            sql,
            " WHERE instr(fold_case(title), ?1) > 0 AND calories_kcal IS NOT NULL AND calories_kcal <= ?2"
        );
        assert_eq!(params.len(), 2);
    }
}
