use serde::{Deserialize, Serialize};

use crate::domain::order::OrderStatus;

/// Hard cap on root rows returned by any root query.
pub const MAX_RESULTS: usize = 1000;

/// Optional order filter. Absent fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSearch {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    /// Case-sensitive substring of the member name.
    #[serde(default)]
    pub member_name: Option<String>,
}

/// One conjunct of an [`OrderSearch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPredicate<'a> {
    StatusEq(OrderStatus),
    MemberNameContains(&'a str),
}

impl OrderPredicate<'_> {
    pub fn matches(&self, status: OrderStatus, member_name: &str) -> bool {
        match self {
            OrderPredicate::StatusEq(wanted) => *wanted == status,
            OrderPredicate::MemberNameContains(needle) => member_name.contains(needle),
        }
    }
}

impl OrderSearch {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_member_name(mut self, name: impl Into<String>) -> Self {
        self.member_name = Some(name.into());
        self
    }

    /// Lowers the filter into the predicates every store applies as a
    /// conjunction, in this order. A blank member name adds no predicate.
    pub fn predicates(&self) -> Vec<OrderPredicate<'_>> {
        let mut predicates = Vec::with_capacity(2);
        if let Some(status) = self.status {
            predicates.push(OrderPredicate::StatusEq(status));
        }
        if let Some(name) = self.member_name.as_deref() {
            if !name.trim().is_empty() {
                predicates.push(OrderPredicate::MemberNameContains(name));
            }
        }
        predicates
    }

    pub fn matches(&self, status: OrderStatus, member_name: &str) -> bool {
        self.predicates()
            .iter()
            .all(|p| p.matches(status, member_name))
    }
}

/// Offset/limit window over a root query. `limit` never exceeds [`MAX_RESULTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    offset: usize,
    limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: limit.min(MAX_RESULTS),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Effective `(offset, limit)` for an optional page; no page means the
    /// first [`MAX_RESULTS`] rows.
    pub fn window(page: Option<Page>) -> (usize, usize) {
        page.map_or((0, MAX_RESULTS), |p| (p.offset, p.limit))
    }
}
