use rust_decimal::Decimal;
use serde::Serialize;

/// One per-seller sales aggregate, already normalized to the canonical
/// three-column shape every source must produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesAggregate {
    pub company: String,
    pub seller_name: String,
    pub total_sales: Decimal,
}

/// The union of all source fragments for one run.
///
/// Rows keep the order their fragments were supplied in; duplicate
/// `(company, seller_name)` keys are allowed here and only collapse at load
/// time, where the keyed overwrite resolves them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidatedTable {
    rows: Vec<SalesAggregate>,
}

impl ConsolidatedTable {
    pub fn new(rows: Vec<SalesAggregate>) -> Self {
        Self { rows }
    }

    /// Concatenates the fragments in the order they were supplied in.
    /// Empty input yields an empty table; no row is dropped, reordered
    /// across fragments, or deduplicated.
    pub fn consolidate(fragments: Vec<Vec<SalesAggregate>>) -> Self {
        let mut rows = Vec::with_capacity(fragments.iter().map(Vec::len).sum());
        for fragment in fragments {
            rows.extend(fragment);
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[SalesAggregate] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<SalesAggregate> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
