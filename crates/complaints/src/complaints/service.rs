use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::{debug, warn};

use super::domain::{
    Category, Complaint, ComplaintId, ComplaintStatus, ComplaintSubmission, Principal, PrincipalId,
    Role, ValidationError,
};
use super::lifecycle::{ComplaintEvent, LifecycleEngine, TransitionError};
use super::report::{self, CategoryCount, ComplaintStats, Page, PageRequest};
use super::repository::{
    ComplaintFilters, ComplaintRepository, Directory, Notification, NotificationGateway,
    RepositoryError,
};
use super::scope::{self, Action};
use crate::config::{AppellateAuthority, EngineConfig};

/// Error raised by the complaint service.
#[derive(Debug, thiserror::Error)]
pub enum ComplaintServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error(transparent)]
    InvalidState(TransitionError),
    #[error("operation not permitted for this principal")]
    Forbidden,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn not_found(kind: &'static str, id: impl ToString) -> ComplaintServiceError {
    ComplaintServiceError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn transition_error(error: TransitionError) -> ComplaintServiceError {
    match error {
        TransitionError::NotAppellateAuthority => ComplaintServiceError::Forbidden,
        other => ComplaintServiceError::InvalidState(other),
    }
}

/// Service composing the lifecycle engine, store, directory, and gateway.
///
/// Every transition follows the same shape: load the aggregate, run the
/// pure engine, commit the version-bumped record, then dispatch the
/// returned notifications. A version conflict re-reads and re-runs the
/// precondition, so of two racing transitions exactly one commits and the
/// other observes the post-transition state.
pub struct ComplaintService<R, N, D> {
    repository: Arc<R>,
    gateway: Arc<N>,
    directory: Arc<D>,
    engine: LifecycleEngine,
}

impl<R, N, D> ComplaintService<R, N, D>
where
    R: ComplaintRepository + 'static,
    N: NotificationGateway + 'static,
    D: Directory + 'static,
{
    pub fn new(repository: Arc<R>, gateway: Arc<N>, directory: Arc<D>, config: EngineConfig) -> Self {
        Self {
            repository,
            gateway,
            directory,
            engine: LifecycleEngine::new(config),
        }
    }

    /// Create a `Pending` complaint and inform the assignment audience.
    pub fn submit(
        &self,
        reporter: &Principal,
        submission: ComplaintSubmission,
    ) -> Result<Complaint, ComplaintServiceError> {
        self.engine.validate_submission(&submission)?;

        if self
            .directory
            .resolve_resource(&submission.resource)?
            .is_none()
        {
            return Err(not_found("resource", &submission.resource.0));
        }

        let now = Utc::now();
        let sequence = self.repository.next_sequence(now.year(), now.month())?;
        let id = ComplaintId::from_sequence(now.year(), now.month(), sequence);

        let audience: Vec<PrincipalId> = match submission.category {
            Category::Misc => self.directory.super_admins()?,
            department => self.directory.department_admins(department)?,
        }
        .into_iter()
        .map(|principal| principal.id)
        .collect();

        let (complaint, effects) = self
            .engine
            .open(id, reporter, submission, audience, now);
        let stored = self.repository.insert(complaint)?;
        self.dispatch(effects);
        Ok(stored)
    }

    /// Hand a pending complaint to a maintenance agency.
    pub fn assign_to_agency(
        &self,
        id: &ComplaintId,
        agency_id: &PrincipalId,
        actor: &Principal,
    ) -> Result<Complaint, ComplaintServiceError> {
        let agency = self
            .directory
            .resolve_principal(agency_id)?
            .ok_or_else(|| not_found("agency", agency_id))?;
        let eligible = agency.approved
            && matches!(
                agency.role,
                Role::DepartmentAdmin(_) | Role::MaintenanceStaff
            );
        if !eligible {
            return Err(ValidationError::IneligibleAssignee {
                id: agency.id.0.clone(),
            }
            .into());
        }

        self.commit(id, |complaint, engine| {
            if !scope::may_perform(actor, Action::AssignAgency, complaint) {
                return Err(ComplaintServiceError::Forbidden);
            }
            engine
                .apply(
                    complaint,
                    ComplaintEvent::Assign {
                        agency: agency.id.clone(),
                    },
                    actor,
                    Utc::now(),
                )
                .map_err(transition_error)
        })
    }

    /// Nominate the staff member working the complaint; status is unchanged.
    pub fn assign_to_staff(
        &self,
        id: &ComplaintId,
        staff_id: &PrincipalId,
        actor: &Principal,
    ) -> Result<Complaint, ComplaintServiceError> {
        let staff = self
            .directory
            .resolve_principal(staff_id)?
            .ok_or_else(|| not_found("staff", staff_id))?;
        if !staff.approved || staff.role != Role::MaintenanceStaff {
            return Err(ValidationError::IneligibleAssignee {
                id: staff.id.0.clone(),
            }
            .into());
        }

        self.commit(id, |complaint, engine| {
            if !scope::may_perform(actor, Action::AssignStaff, complaint) {
                return Err(ComplaintServiceError::Forbidden);
            }
            engine
                .apply(
                    complaint,
                    ComplaintEvent::AssignStaff {
                        staff: staff.id.clone(),
                    },
                    actor,
                    Utc::now(),
                )
                .map_err(transition_error)
        })
    }

    /// Mark an assigned complaint resolved and ask the reporter for feedback.
    pub fn resolve(
        &self,
        id: &ComplaintId,
        notes: &str,
        actor: &Principal,
    ) -> Result<Complaint, ComplaintServiceError> {
        self.commit(id, |complaint, engine| {
            if !scope::may_perform(actor, Action::Resolve, complaint) {
                return Err(ComplaintServiceError::Forbidden);
            }
            engine
                .apply(
                    complaint,
                    ComplaintEvent::Resolve {
                        notes: notes.to_string(),
                    },
                    actor,
                    Utc::now(),
                )
                .map_err(transition_error)
        })
    }

    /// Record satisfaction feedback; rating 3+ closes, below 3 escalates.
    pub fn submit_feedback(
        &self,
        id: &ComplaintId,
        rating: u8,
        comment: &str,
        actor: &Principal,
    ) -> Result<Complaint, ComplaintServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ValidationError::RatingOutOfRange(rating).into());
        }

        self.commit(id, |complaint, engine| {
            if !scope::may_perform(actor, Action::Feedback, complaint) {
                return Err(ComplaintServiceError::Forbidden);
            }
            // Authority lookup only once the record can actually escalate;
            // a failed precondition reports the transition error instead.
            let appellate_authority =
                if rating < 3 && complaint.status == ComplaintStatus::Resolved {
                    Some(self.appellate_authority()?)
                } else {
                    None
                };
            engine
                .apply(
                    complaint,
                    ComplaintEvent::Feedback {
                        rating,
                        comment: comment.to_string(),
                        appellate_authority,
                    },
                    actor,
                    Utc::now(),
                )
                .map_err(transition_error)
        })
    }

    /// Issue the final resolution on an escalated complaint. Terminal.
    pub fn finalize(
        &self,
        id: &ComplaintId,
        resolution: &str,
        actor: &Principal,
    ) -> Result<Complaint, ComplaintServiceError> {
        self.commit(id, |complaint, engine| {
            if !scope::may_perform(actor, Action::Finalize, complaint) {
                return Err(ComplaintServiceError::Forbidden);
            }
            engine
                .apply(
                    complaint,
                    ComplaintEvent::Finalize {
                        resolution: resolution.to_string(),
                    },
                    actor,
                    Utc::now(),
                )
                .map_err(transition_error)
        })
    }

    /// Fetch one complaint, honoring the caller's visibility scope.
    pub fn get(
        &self,
        id: &ComplaintId,
        principal: &Principal,
    ) -> Result<Complaint, ComplaintServiceError> {
        let complaint = self
            .repository
            .fetch(id)?
            .ok_or_else(|| not_found("complaint", id))?;
        if !scope::can_view(principal, &complaint) {
            return Err(ComplaintServiceError::Forbidden);
        }
        Ok(complaint)
    }

    /// Scoped, paginated listing.
    pub fn list(
        &self,
        principal: &Principal,
        filters: ComplaintFilters,
        request: PageRequest,
    ) -> Result<Page<Complaint>, ComplaintServiceError> {
        let selection = self.scoped_selection(principal, filters)?;
        Ok(report::paginate(selection, request))
    }

    /// Scoped status breakdown and average rating.
    pub fn stats(
        &self,
        principal: &Principal,
        filters: ComplaintFilters,
    ) -> Result<ComplaintStats, ComplaintServiceError> {
        let selection = self.scoped_selection(principal, filters)?;
        Ok(ComplaintStats::collect(&selection))
    }

    /// Scoped per-category counts.
    pub fn category_distribution(
        &self,
        principal: &Principal,
        filters: ComplaintFilters,
    ) -> Result<Vec<CategoryCount>, ComplaintServiceError> {
        let selection = self.scoped_selection(principal, filters)?;
        Ok(report::category_distribution(&selection))
    }

    /// Resolve the caller's identity header against the directory.
    pub fn authenticate(&self, id: &PrincipalId) -> Result<Principal, ComplaintServiceError> {
        let principal = self
            .directory
            .resolve_principal(id)?
            .ok_or_else(|| not_found("principal", id))?;
        if !principal.approved {
            return Err(ComplaintServiceError::Forbidden);
        }
        Ok(principal)
    }

    fn scoped_selection(
        &self,
        principal: &Principal,
        filters: ComplaintFilters,
    ) -> Result<Vec<Complaint>, ComplaintServiceError> {
        let filters = scope::effective_filters(principal, filters);
        Ok(self.repository.select(&filters)?)
    }

    fn appellate_authority(&self) -> Result<PrincipalId, ComplaintServiceError> {
        match self.engine.config().appellate_authority.clone() {
            AppellateAuthority::Configured(id) => {
                let id = PrincipalId(id);
                let principal = self
                    .directory
                    .resolve_principal(&id)?
                    .ok_or_else(|| not_found("appellate authority", &id))?;
                if !principal.approved || principal.role != Role::SuperAdmin {
                    return Err(not_found("appellate authority", &id));
                }
                Ok(principal.id)
            }
            AppellateAuthority::FirstApproved => self
                .directory
                .super_admins()?
                .into_iter()
                .find(|principal| principal.approved)
                .map(|principal| principal.id)
                .ok_or_else(|| not_found("appellate authority", "first approved super admin")),
        }
    }

    /// Load-apply-commit loop with conflict retry. The attempt closure runs
    /// against a fresh copy on every pass; after a lost race the re-read
    /// record fails its precondition and the loop exits with that error.
    fn commit<F>(&self, id: &ComplaintId, mut attempt: F) -> Result<Complaint, ComplaintServiceError>
    where
        F: FnMut(&mut Complaint, &LifecycleEngine) -> Result<Vec<Notification>, ComplaintServiceError>,
    {
        loop {
            let mut complaint = self
                .repository
                .fetch(id)?
                .ok_or_else(|| not_found("complaint", id))?;

            let effects = attempt(&mut complaint, &self.engine)?;

            complaint.version += 1;
            match self.repository.update(complaint.clone()) {
                Ok(()) => {
                    self.dispatch(effects);
                    return Ok(complaint);
                }
                Err(RepositoryError::Conflict) => {
                    debug!(complaint = %id, "transition lost a version race, re-reading");
                    continue;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Fire-and-forget dispatch, strictly after commit. Failures are logged
    /// and swallowed; a committed transition is never reversed or retried.
    fn dispatch(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            let complaint = notification.complaint_id.clone();
            let event = notification.event;
            if let Err(error) = self.gateway.send(notification) {
                warn!(%complaint, ?event, %error, "notification dispatch failed");
            }
        }
    }
}
