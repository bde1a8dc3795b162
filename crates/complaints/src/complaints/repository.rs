use serde::{Deserialize, Serialize};

use super::domain::{
    Category, Complaint, ComplaintId, ComplaintStatus, Principal, PrincipalId, Resource,
    ResourceId,
};

/// Filters applied when selecting complaints. The scoping layer rewrites
/// these per caller role before a repository ever sees them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintFilters {
    pub reporter: Option<PrincipalId>,
    pub assigned_staff: Option<PrincipalId>,
    pub category: Option<Category>,
    pub status: Option<ComplaintStatus>,
}

impl ComplaintFilters {
    pub fn matches(&self, complaint: &Complaint) -> bool {
        if let Some(reporter) = &self.reporter {
            if &complaint.reporter != reporter {
                return false;
            }
        }
        if let Some(staff) = &self.assigned_staff {
            if complaint.assigned_staff.as_ref() != Some(staff) {
                return false;
            }
        }
        if let Some(category) = self.category {
            if complaint.category != category {
                return false;
            }
        }
        if let Some(status) = self.status {
            if complaint.status != status {
                return false;
            }
        }
        true
    }
}

/// Storage abstraction so the engine can be exercised in isolation.
///
/// `update` is version-checked: callers bump `version` by exactly one and
/// implementations must reject the write with `Conflict` unless the stored
/// record is exactly one version behind. That check is the mutual-exclusion
/// unit for concurrent transitions on a single complaint.
pub trait ComplaintRepository: Send + Sync {
    fn insert(&self, complaint: Complaint) -> Result<Complaint, RepositoryError>;
    fn update(&self, complaint: Complaint) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ComplaintId) -> Result<Option<Complaint>, RepositoryError>;
    fn select(&self, filters: &ComplaintFilters) -> Result<Vec<Complaint>, RepositoryError>;
    /// Allocate the next identifier sequence for the given calendar month.
    /// Must be atomic; two concurrent submissions never share a sequence.
    fn next_sequence(&self, year: i32, month: u32) -> Result<u32, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record version conflict")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Lifecycle events a notification can announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    ComplaintSubmitted,
    ComplaintAssigned,
    StaffAssigned,
    ComplaintResolved,
    ComplaintClosed,
    ComplaintEscalated,
    ComplaintFinalized,
}

/// Payload handed to the gateway after a transition commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: PrincipalId,
    pub title: String,
    pub message: String,
    pub event: NotificationEvent,
    pub complaint_id: ComplaintId,
}

/// Best-effort delivery boundary. Failures are logged by the caller and
/// never surface to the operation that triggered them.
pub trait NotificationGateway: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), GatewayError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Read-only lookups against the external identity and resource registries.
pub trait Directory: Send + Sync {
    fn resolve_principal(&self, id: &PrincipalId) -> Result<Option<Principal>, RepositoryError>;
    fn resolve_resource(&self, id: &ResourceId) -> Result<Option<Resource>, RepositoryError>;
    /// Approved admins of one department, in natural lookup order.
    fn department_admins(&self, department: Category) -> Result<Vec<Principal>, RepositoryError>;
    /// Approved super admins, in natural lookup order.
    fn super_admins(&self) -> Result<Vec<Principal>, RepositoryError>;
}
