use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for complaints, formatted `CMP-YY-MM-NNNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplaintId(pub String);

impl ComplaintId {
    /// Build an identifier from the per-month sequence allocated by the store.
    pub fn from_sequence(year: i32, month: u32, sequence: u32) -> Self {
        Self(format!(
            "CMP-{:02}-{:02}-{:04}",
            year.rem_euclid(100),
            month,
            sequence
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComplaintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for an authenticated principal supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(pub String);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a registered resource a complaint is filed against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub String);

/// Maintenance departments a complaint can be categorized under.
///
/// `Misc` has no department of its own; its complaints route to the
/// super-admin pool instead of a departmental agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Electrical,
    Civil,
    Misc,
}

impl Category {
    pub const fn label(self) -> &'static str {
        match self {
            Category::Electrical => "electrical",
            Category::Civil => "civil",
            Category::Misc => "misc",
        }
    }

    /// Closed subcategory set a submission is validated against.
    pub const fn subcategories(self) -> &'static [&'static str] {
        match self {
            Category::Electrical => &["Lighting", "Wiring", "Power Backup", "Appliance"],
            Category::Civil => &["Plumbing", "Carpentry", "Masonry", "Painting"],
            Category::Misc => &["Housekeeping", "Security", "Other"],
        }
    }

    pub fn allows_subcategory(self, subcategory: &str) -> bool {
        self.subcategories()
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(subcategory))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kinds of registered resources; used for reference only, never mutated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Personal,
    Functional,
    General,
}

/// Snapshot of a registry resource resolved through the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub name: String,
}

/// Closed role set; department admins carry the department they govern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Resident,
    MaintenanceStaff,
    DepartmentAdmin(Category),
    SuperAdmin,
}

/// Authenticated identity snapshot consumed by every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub role: Role,
    pub approved: bool,
}

/// Lifecycle states. `Closed` and `FinalResolution` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    Assigned,
    Resolved,
    Closed,
    Escalated,
    FinalResolution,
}

impl ComplaintStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "pending",
            ComplaintStatus::Assigned => "assigned",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::Closed => "closed",
            ComplaintStatus::Escalated => "escalated",
            ComplaintStatus::FinalResolution => "final_resolution",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ComplaintStatus::Closed | ComplaintStatus::FinalResolution
        )
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One audit-trail entry; appended on every successful transition, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: ComplaintStatus,
    pub actor: PrincipalId,
    pub at: DateTime<Utc>,
    pub note: String,
}

/// Citizen satisfaction captured on the transition out of `Resolved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: u8,
    pub comment: String,
}

/// Escalation record; present only in `Escalated` and `FinalResolution`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub reason: String,
    pub appellate_authority: PrincipalId,
    pub final_resolution: Option<String>,
}

/// The complaint aggregate. Mutated only through the lifecycle engine;
/// `version` backs optimistic concurrency at the store boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: ComplaintId,
    pub reporter: PrincipalId,
    pub resource: ResourceId,
    pub category: Category,
    pub subcategory: String,
    pub description: String,
    pub images: Vec<String>,
    pub status: ComplaintStatus,
    pub assigned_agency: Option<PrincipalId>,
    pub assigned_staff: Option<PrincipalId>,
    pub resolution_notes: Option<String>,
    pub feedback: Option<Feedback>,
    pub escalation: Option<Escalation>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub final_resolved_at: Option<DateTime<Utc>>,
    pub version: u64,
}

/// Reporter-supplied payload for a new complaint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintSubmission {
    pub resource: ResourceId,
    pub category: Category,
    pub subcategory: String,
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Malformed or out-of-range input; rejected before any effect is applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("description must be between {min} and {max} characters, got {got}")]
    DescriptionLength {
        min: usize,
        max: usize,
        got: usize,
    },
    #[error("a complaint may carry at most {max} images, got {got}")]
    TooManyImages { max: usize, got: usize },
    #[error("subcategory '{subcategory}' is not valid for category {category}")]
    UnknownSubcategory {
        category: Category,
        subcategory: String,
    },
    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),
    #[error("'{id}' is not an approved assignment target")]
    IneligibleAssignee { id: String },
}
