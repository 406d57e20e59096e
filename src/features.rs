//! Per-user engagement features from click and view event lists
//!
//! Each extractor owns an ordered table of categories. A category is a name
//! plus a case-insensitive regex searched anywhere in the token text, so
//! category definitions stay data and can be swapped out in tests.

use std::collections::HashSet;

use ndarray::Array2;
use polars::prelude::*;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::data::{read_identifiers, read_text_cells, require_columns};
use crate::decode::{decode_events, Token};
use crate::error::{CohortError, Result};

/// Default header of the click-events column
pub const DEFAULT_CLICK_COLUMN: &str = "Click Events LOFT";
/// Default header of the view-events column
pub const DEFAULT_VIEW_COLUMN: &str = "View Events";

const CLICK_PATTERNS: &[(&str, &str)] = &[
    ("price_sheet", r"PRICE\$(UNLOCK_PRICESHEET|PRICE_SHEET)"),
    ("brochure_download", r"BROCHURE_DOWNLOAD"),
    ("plan_click", r"PLANS\$"),
    ("video_click", r"VIDEOS\$"),
    ("payment", r"PAYMENT_STRUCTURE|EMI_CALCULATOR"),
    ("whatsapp", r"WHATSAPP"),
    ("contact_or_otp", r"ENQUIRY_DIALOG\$(GET_OTP|SUBMIT_LEAD|LEAD_CREATED)"),
];

const VIEW_PATTERNS: &[(&str, &str)] = &[
    ("price_view", r"PRICE_"),
    ("brochure_view", r"BROCHURE"),
    ("plan_view", r"PLAN"),
    ("video_view", r"VIDEO"),
    ("gallery_view", r"GALLERY"),
];

/// A named, case-insensitive token pattern.
#[derive(Debug, Clone)]
pub struct Category {
    pub name: String,
    pattern: Regex,
}

impl Category {
    pub fn new(name: &str, pattern: &str) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| CohortError::InvalidConfig(format!("category '{}': {}", name, e)))?;
        Ok(Self {
            name: name.to_string(),
            pattern,
        })
    }

    /// Substring search; non-string tokens never match.
    pub fn matches(&self, token: &Token) -> bool {
        token.as_str().is_some_and(|text| self.pattern.is_match(text))
    }
}

fn builtin(table: &[(&str, &str)]) -> Vec<Category> {
    table
        .iter()
        .map(|(name, pattern)| Category::new(name, pattern).expect("regex is valid"))
        .collect()
}

/// Built-in click categories, in output column order
pub fn default_click_categories() -> Vec<Category> {
    builtin(CLICK_PATTERNS)
}

/// Built-in view categories, in output column order
pub fn default_view_categories() -> Vec<Category> {
    builtin(VIEW_PATTERNS)
}

/// Identifier-keyed table of numeric features.
///
/// The first column holds the user identifier as text; every other column is
/// a feature (`Int64` counts or `Float64` dwell time).
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    id_column: String,
    df: DataFrame,
}

impl FeatureFrame {
    pub fn new(df: DataFrame, id_column: &str) -> Result<Self> {
        require_columns(&df, "feature", &[id_column])?;
        Ok(Self {
            id_column: id_column.to_string(),
            df,
        })
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// User identifiers in row order
    pub fn ids(&self) -> Result<Vec<String>> {
        let ids = self.df.column(&self.id_column)?.cast(&DataType::String)?;
        Ok(ids
            .str()?
            .into_iter()
            .map(|id| id.unwrap_or_default().to_string())
            .collect())
    }

    /// Feature column names in output order
    pub fn feature_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .filter(|name| *name != self.id_column)
            .map(str::to_string)
            .collect()
    }

    /// One feature column as reals
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.df.column(name)?.cast(&DataType::Float64)?;
        Ok(column
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect())
    }

    /// Feature value for one identifier
    pub fn value(&self, id: &str, name: &str) -> Option<f64> {
        let row = self.ids().ok()?.iter().position(|i| i == id)?;
        self.values(name).ok()?.get(row).copied()
    }

    /// Dense (n_users, n_features) matrix in column order
    pub fn to_matrix(&self) -> Result<Array2<f64>> {
        let columns = self
            .feature_names()
            .iter()
            .map(|name| self.values(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Array2::from_shape_fn(
            (self.height(), columns.len()),
            |(row, col)| columns[col][row],
        ))
    }
}

/// Hashable identity of a token under the set semantics of the source data:
/// `1`, `1.0` and `True` are the same element.
#[derive(Debug, PartialEq, Eq, Hash)]
enum TokenKey<'a> {
    Text(&'a str),
    Number(u64),
    Other(String),
}

impl<'a> TokenKey<'a> {
    fn of(token: &'a Token) -> Self {
        match token {
            Token::Str(s) => TokenKey::Text(s),
            Token::Int(_) | Token::Float(_) | Token::Bool(_) => {
                let value = token.as_real().unwrap_or(f64::NAN);
                // -0.0 == 0.0
                let value = if value == 0.0 { 0.0 } else { value };
                TokenKey::Number(value.to_bits())
            }
            other => TokenKey::Other(other.to_string()),
        }
    }
}

fn distinct_count<'a>(tokens: impl Iterator<Item = &'a Token>) -> usize {
    tokens.map(TokenKey::of).collect::<HashSet<_>>().len()
}

/// Click counts for one user
#[derive(Debug, Clone, PartialEq)]
pub struct ClickRow {
    pub categories: Vec<i64>,
    pub n_clicks: i64,
    pub n_click_unique: i64,
}

/// Click Feature Extractor
#[derive(Debug, Clone)]
pub struct ClickExtractor {
    /// Header of the click-events column
    pub column: String,
    pub categories: Vec<Category>,
}

impl Default for ClickExtractor {
    fn default() -> Self {
        Self {
            column: DEFAULT_CLICK_COLUMN.to_string(),
            categories: default_click_categories(),
        }
    }
}

impl ClickExtractor {
    /// Tally one decoded click sequence
    pub fn summarise(&self, tokens: &[Token]) -> ClickRow {
        let categories = self
            .categories
            .iter()
            .map(|cat| tokens.iter().filter(|t| cat.matches(t)).count() as i64)
            .collect();

        ClickRow {
            categories,
            n_clicks: tokens.len() as i64,
            n_click_unique: distinct_count(tokens.iter()) as i64,
        }
    }

    /// Build click features: identifier, one column per category,
    /// `n_clicks` and `n_click_unique`.
    pub fn extract(&self, df: &DataFrame, id_column: &str) -> Result<FeatureFrame> {
        require_columns(df, "click", &[id_column, self.column.as_str()])?;
        let ids = read_identifiers(df, "click", id_column)?;
        let cells = read_text_cells(df, &self.column)?;

        let mut per_category = vec![Vec::with_capacity(ids.len()); self.categories.len()];
        let mut n_clicks = Vec::with_capacity(ids.len());
        let mut n_unique = Vec::with_capacity(ids.len());
        let mut empty_cells = 0usize;

        for cell in &cells {
            let tokens = decode_events(*cell);
            if tokens.is_empty() {
                empty_cells += 1;
            }
            let row = self.summarise(&tokens);
            for (column, count) in per_category.iter_mut().zip(row.categories) {
                column.push(count);
            }
            n_clicks.push(row.n_clicks);
            n_unique.push(row.n_click_unique);
        }

        if empty_cells > 0 {
            warn!(
                "{} of {} click rows decoded to no events",
                empty_cells,
                cells.len()
            );
        }

        let mut columns = vec![Series::new(id_column, &ids)];
        for (cat, values) in self.categories.iter().zip(per_category) {
            columns.push(Series::new(&cat.name, values));
        }
        columns.push(Series::new("n_clicks", n_clicks));
        columns.push(Series::new("n_click_unique", n_unique));

        let frame = FeatureFrame::new(DataFrame::new(columns)?, id_column)?;
        debug!("Extracted click features for {} users", frame.height());
        Ok(frame)
    }
}

/// View counts and dwell time for one user
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub categories: Vec<i64>,
    pub n_view_events: i64,
    pub n_view_unique: i64,
    pub total_view_time: f64,
}

/// View Feature Extractor
#[derive(Debug, Clone)]
pub struct ViewExtractor {
    /// Header of the view-events column
    pub column: String,
    pub categories: Vec<Category>,
}

impl Default for ViewExtractor {
    fn default() -> Self {
        Self {
            column: DEFAULT_VIEW_COLUMN.to_string(),
            categories: default_view_categories(),
        }
    }
}

impl ViewExtractor {
    /// Tally one decoded view sequence.
    ///
    /// Only list/tuple tokens take part in category counts, distinct labels
    /// and dwell time; every token counts toward `n_view_events`. A duration
    /// that is not a finite number fails the whole row with the user's
    /// identifier.
    pub fn summarise(&self, id: &str, tokens: &[Token]) -> Result<ViewRow> {
        let pairs: Vec<&[Token]> = tokens.iter().filter_map(Token::as_sequence).collect();

        let categories = self
            .categories
            .iter()
            .map(|cat| {
                pairs
                    .iter()
                    .filter(|pair| pair.first().is_some_and(|label| cat.matches(label)))
                    .count() as i64
            })
            .collect();

        let n_view_unique = distinct_count(pairs.iter().filter_map(|pair| pair.first())) as i64;

        let mut total_view_time = 0.0;
        for pair in pairs.iter().filter(|pair| pair.len() > 1) {
            let duration = pair[1]
                .as_real()
                .filter(|d| d.is_finite())
                .ok_or_else(|| CohortError::InvalidDuration {
                    id: id.to_string(),
                    value: pair[1].to_string(),
                })?;
            total_view_time += duration;
        }

        Ok(ViewRow {
            categories,
            n_view_events: tokens.len() as i64,
            n_view_unique,
            total_view_time,
        })
    }

    /// Build view features: identifier, one column per category,
    /// `n_view_events`, `n_view_unique` and `total_view_time`.
    pub fn extract(&self, df: &DataFrame, id_column: &str) -> Result<FeatureFrame> {
        require_columns(df, "view", &[id_column, self.column.as_str()])?;
        let ids = read_identifiers(df, "view", id_column)?;
        let cells = read_text_cells(df, &self.column)?;

        let mut per_category = vec![Vec::with_capacity(ids.len()); self.categories.len()];
        let mut n_events = Vec::with_capacity(ids.len());
        let mut n_unique = Vec::with_capacity(ids.len());
        let mut view_time = Vec::with_capacity(ids.len());
        let mut empty_cells = 0usize;

        for (id, cell) in ids.iter().zip(&cells) {
            let tokens = decode_events(*cell);
            if tokens.is_empty() {
                empty_cells += 1;
            }
            let row = self.summarise(id, &tokens)?;
            for (column, count) in per_category.iter_mut().zip(row.categories) {
                column.push(count);
            }
            n_events.push(row.n_view_events);
            n_unique.push(row.n_view_unique);
            view_time.push(row.total_view_time);
        }

        if empty_cells > 0 {
            warn!(
                "{} of {} view rows decoded to no events",
                empty_cells,
                cells.len()
            );
        }

        let mut columns = vec![Series::new(id_column, &ids)];
        for (cat, values) in self.categories.iter().zip(per_category) {
            columns.push(Series::new(&cat.name, values));
        }
        columns.push(Series::new("n_view_events", n_events));
        columns.push(Series::new("n_view_unique", n_unique));
        columns.push(Series::new("total_view_time", view_time));

        let frame = FeatureFrame::new(DataFrame::new(columns)?, id_column)?;
        debug!("Extracted view features for {} users", frame.height());
        Ok(frame)
    }
}

/// Index column that carries click-table row order through the join
const CLICK_ROW: &str = "click_row";

/// Inner-join click and view features on identifier.
///
/// Row order follows the click table. Users missing from either side are
/// dropped.
pub fn assemble(clicks: &FeatureFrame, views: &FeatureFrame) -> Result<FeatureFrame> {
    let joined = clicks
        .dataframe()
        .clone()
        .lazy()
        .with_row_index(CLICK_ROW, None)
        .join(
            views.dataframe().clone().lazy(),
            [col(clicks.id_column())],
            [col(views.id_column())],
            JoinArgs::new(JoinType::Inner),
        )
        .sort([CLICK_ROW], SortMultipleOptions::default())
        .collect()?
        .drop(CLICK_ROW)?;

    let frame = FeatureFrame::new(joined, clicks.id_column())?;
    debug!(
        "Joined {} click users and {} view users into {} rows",
        clicks.height(),
        views.height(),
        frame.height()
    );
    Ok(frame)
}
