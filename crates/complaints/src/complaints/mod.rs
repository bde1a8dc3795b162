//! Complaint lifecycle engine: domain model, state machine, authorization
//! scoping, audit trail, and the reporting facade.
//!
//! The engine core (`lifecycle`) is pure; storage, directory lookups, and
//! notification dispatch sit behind traits so the whole graph is testable
//! with in-memory fakes.

pub mod domain;
pub mod lifecycle;
pub mod report;
pub mod repository;
pub mod router;
pub mod scope;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Category, Complaint, ComplaintId, ComplaintStatus, ComplaintSubmission, Escalation, Feedback,
    HistoryEntry, Principal, PrincipalId, Resource, ResourceId, ResourceKind, Role,
    ValidationError,
};
pub use lifecycle::{ComplaintEvent, LifecycleEngine, TransitionError};
pub use report::{CategoryCount, ComplaintStats, Page, PageRequest, SortOrder};
pub use repository::{
    ComplaintFilters, ComplaintRepository, Directory, GatewayError, Notification,
    NotificationEvent, NotificationGateway, RepositoryError,
};
pub use router::{complaint_router, PRINCIPAL_HEADER};
pub use service::{ComplaintService, ComplaintServiceError};
