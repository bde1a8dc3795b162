use super::domain::{Complaint, Principal, Role};
use super::repository::ComplaintFilters;

/// Lifecycle actions gated per role before the state machine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AssignAgency,
    AssignStaff,
    Resolve,
    Feedback,
    Finalize,
}

/// Rewrite requested filters into the caller's effective scope.
///
/// The same rewrite backs listing, stats, and category distribution so
/// aggregate counts can never leak cross-tenant data.
pub fn effective_filters(principal: &Principal, requested: ComplaintFilters) -> ComplaintFilters {
    match principal.role {
        Role::Resident => ComplaintFilters {
            // Non-overridable: residents only ever see their own reports.
            reporter: Some(principal.id.clone()),
            ..requested
        },
        Role::MaintenanceStaff => ComplaintFilters {
            assigned_staff: Some(principal.id.clone()),
            ..requested
        },
        Role::DepartmentAdmin(department) => ComplaintFilters {
            category: Some(department),
            ..requested
        },
        Role::SuperAdmin => requested,
    }
}

/// Whether a single complaint is visible to the caller.
pub fn can_view(principal: &Principal, complaint: &Complaint) -> bool {
    match principal.role {
        Role::Resident => complaint.reporter == principal.id,
        Role::MaintenanceStaff => complaint.assigned_staff.as_ref() == Some(&principal.id),
        Role::DepartmentAdmin(department) => complaint.category == department,
        Role::SuperAdmin => true,
    }
}

/// Role gate for transition requests. The state machine enforces its own
/// preconditions on top of this; feedback additionally requires the actor
/// to be the reporter, which is checked against the record itself.
pub fn may_perform(principal: &Principal, action: Action, complaint: &Complaint) -> bool {
    match action {
        Action::AssignAgency | Action::AssignStaff => match principal.role {
            Role::SuperAdmin => true,
            Role::DepartmentAdmin(department) => complaint.category == department,
            Role::Resident | Role::MaintenanceStaff => false,
        },
        Action::Resolve => match principal.role {
            Role::SuperAdmin => true,
            Role::DepartmentAdmin(department) => complaint.category == department,
            Role::MaintenanceStaff => {
                complaint.assigned_staff.as_ref() == Some(&principal.id)
                    || complaint.assigned_agency.as_ref() == Some(&principal.id)
            }
            Role::Resident => false,
        },
        Action::Feedback => complaint.reporter == principal.id,
        Action::Finalize => principal.role == Role::SuperAdmin,
    }
}
