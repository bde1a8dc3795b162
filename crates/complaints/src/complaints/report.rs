use serde::{Deserialize, Serialize};

use super::domain::{Category, Complaint, ComplaintStatus};

/// Sort direction for listings, keyed on creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Pagination request with service-enforced defaults and caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
    pub sort: SortOrder,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 100;

    pub fn new(page: Option<usize>, limit: Option<usize>, sort: Option<SortOrder>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            sort: sort.unwrap_or_default(),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

/// One page of a scoped listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page: usize,
    pub total_pages: usize,
}

/// Paginate an already-scoped, already-sorted selection.
pub fn paginate(mut complaints: Vec<Complaint>, request: PageRequest) -> Page<Complaint> {
    match request.sort {
        SortOrder::NewestFirst => complaints.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::OldestFirst => complaints.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
    }

    let total_count = complaints.len();
    let limit = request.limit.max(1);
    let total_pages = total_count.div_ceil(limit).max(1);
    // Fields are public, so clamp here as well as in `PageRequest::new`.
    let page = request.page.clamp(1, total_pages);
    let items = complaints
        .into_iter()
        .skip((page - 1) * limit)
        .take(limit)
        .collect();

    Page {
        items,
        total_count,
        page,
        total_pages,
    }
}

/// Status breakdown plus average satisfaction over a scoped selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplaintStats {
    pub total: usize,
    pub pending: usize,
    pub assigned: usize,
    pub resolved: usize,
    pub closed: usize,
    pub escalated: usize,
    pub final_resolution: usize,
    pub avg_rating: Option<f64>,
}

impl ComplaintStats {
    pub fn collect(complaints: &[Complaint]) -> Self {
        let count = |status: ComplaintStatus| {
            complaints
                .iter()
                .filter(|complaint| complaint.status == status)
                .count()
        };

        // An escalated complaint's rating joins the average only once the
        // appeal is finalized.
        let ratings: Vec<u8> = complaints
            .iter()
            .filter(|complaint| {
                matches!(
                    complaint.status,
                    ComplaintStatus::Closed | ComplaintStatus::FinalResolution
                )
            })
            .filter_map(|complaint| complaint.feedback.as_ref())
            .map(|feedback| feedback.rating)
            .collect();
        let avg_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().map(|rating| f64::from(*rating)).sum::<f64>() / ratings.len() as f64)
        };

        Self {
            total: complaints.len(),
            pending: count(ComplaintStatus::Pending),
            assigned: count(ComplaintStatus::Assigned),
            resolved: count(ComplaintStatus::Resolved),
            closed: count(ComplaintStatus::Closed),
            escalated: count(ComplaintStatus::Escalated),
            final_resolution: count(ComplaintStatus::FinalResolution),
            avg_rating,
        }
    }
}

/// Per-category complaint counts within the caller's scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: &'static str,
    pub count: usize,
}

pub fn category_distribution(complaints: &[Complaint]) -> Vec<CategoryCount> {
    [Category::Electrical, Category::Civil, Category::Misc]
        .into_iter()
        .map(|category| CategoryCount {
            category: category.label(),
            count: complaints
                .iter()
                .filter(|complaint| complaint.category == category)
                .count(),
        })
        .collect()
}
