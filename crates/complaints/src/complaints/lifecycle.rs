use chrono::{DateTime, Utc};

use crate::config::EngineConfig;

use super::domain::{
    Complaint, ComplaintId, ComplaintStatus, ComplaintSubmission, Escalation, Feedback,
    HistoryEntry, Principal, PrincipalId, Role, ValidationError,
};
use super::repository::{Notification, NotificationEvent};

/// Events that drive a complaint along its lifecycle graph.
///
/// Recipient principals are resolved by the orchestrating service before
/// an event is applied; the engine itself never performs lookups.
#[derive(Debug, Clone)]
pub enum ComplaintEvent {
    Assign {
        agency: PrincipalId,
    },
    AssignStaff {
        staff: PrincipalId,
    },
    Resolve {
        notes: String,
    },
    Feedback {
        rating: u8,
        comment: String,
        /// Present when the rating escalates; `None` otherwise.
        appellate_authority: Option<PrincipalId>,
    },
    Finalize {
        resolution: String,
    },
}

impl ComplaintEvent {
    /// Short verb used in `InvalidTransition` messages and history notes.
    pub fn action(&self) -> &'static str {
        match self {
            ComplaintEvent::Assign { .. } => "assign",
            ComplaintEvent::AssignStaff { .. } => "assign staff",
            ComplaintEvent::Resolve { .. } => "resolve",
            ComplaintEvent::Feedback { .. } => "record feedback",
            ComplaintEvent::Finalize { .. } => "finalize",
        }
    }
}

/// Transition rejected by the state machine; the complaint is untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {action} a complaint in status '{from}'")]
    InvalidTransition {
        from: ComplaintStatus,
        action: &'static str,
    },
    #[error("complaint has no assigned agency")]
    AgencyNotAssigned,
    #[error("only a super admin may issue a final resolution")]
    NotAppellateAuthority,
    #[error("no appellate authority is available for escalation")]
    AppellateAuthorityUnavailable,
}

/// Pure transition core of the complaint state machine.
///
/// `apply` mutates the aggregate in place and returns the notifications to
/// dispatch once the mutation has committed. It performs no I/O, which keeps
/// every branch of the graph unit-testable without a store or a notifier.
#[derive(Debug, Clone)]
pub struct LifecycleEngine {
    config: EngineConfig,
}

impl LifecycleEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reject malformed submissions before anything is persisted.
    pub fn validate_submission(
        &self,
        submission: &ComplaintSubmission,
    ) -> Result<(), ValidationError> {
        let length = submission.description.trim().chars().count();
        if length < self.config.description_min || length > self.config.description_max {
            return Err(ValidationError::DescriptionLength {
                min: self.config.description_min,
                max: self.config.description_max,
                got: length,
            });
        }

        if submission.images.len() > self.config.max_images {
            return Err(ValidationError::TooManyImages {
                max: self.config.max_images,
                got: submission.images.len(),
            });
        }

        if !submission
            .category
            .allows_subcategory(&submission.subcategory)
        {
            return Err(ValidationError::UnknownSubcategory {
                category: submission.category,
                subcategory: submission.subcategory.clone(),
            });
        }

        Ok(())
    }

    /// Build a `Pending` complaint from a validated submission.
    ///
    /// `audience` is the already-resolved set of admins to inform: the
    /// super-admin pool for `Misc`, otherwise the department's admins.
    pub fn open(
        &self,
        id: ComplaintId,
        reporter: &Principal,
        submission: ComplaintSubmission,
        audience: Vec<PrincipalId>,
        now: DateTime<Utc>,
    ) -> (Complaint, Vec<Notification>) {
        let complaint = Complaint {
            id: id.clone(),
            reporter: reporter.id.clone(),
            resource: submission.resource,
            category: submission.category,
            subcategory: submission.subcategory,
            description: submission.description,
            images: submission.images,
            status: ComplaintStatus::Pending,
            assigned_agency: None,
            assigned_staff: None,
            resolution_notes: None,
            feedback: None,
            escalation: None,
            history: vec![HistoryEntry {
                status: ComplaintStatus::Pending,
                actor: reporter.id.clone(),
                at: now,
                note: "complaint submitted".to_string(),
            }],
            created_at: now,
            updated_at: now,
            assigned_at: None,
            resolved_at: None,
            closed_at: None,
            final_resolved_at: None,
            version: 1,
        };

        let effects = audience
            .into_iter()
            .map(|recipient| {
                notification(
                    recipient,
                    NotificationEvent::ComplaintSubmitted,
                    "New complaint submitted",
                    format!(
                        "Complaint {id} ({} / {}) awaits assignment",
                        complaint.category, complaint.subcategory
                    ),
                    &id,
                )
            })
            .collect();

        (complaint, effects)
    }

    /// Run one event through the state machine.
    ///
    /// On success the aggregate carries the new status, exactly one extra
    /// history entry, and a bumped `updated_at`. On error it is unchanged;
    /// callers must discard their working copy rather than persist it.
    pub fn apply(
        &self,
        complaint: &mut Complaint,
        event: ComplaintEvent,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, TransitionError> {
        let effects = match event {
            ComplaintEvent::Assign { agency } => self.assign(complaint, agency, actor, now)?,
            ComplaintEvent::AssignStaff { staff } => {
                self.assign_staff(complaint, staff, actor, now)?
            }
            ComplaintEvent::Resolve { notes } => self.resolve(complaint, notes, actor, now)?,
            ComplaintEvent::Feedback {
                rating,
                comment,
                appellate_authority,
            } => self.feedback(complaint, rating, comment, appellate_authority, actor, now)?,
            ComplaintEvent::Finalize { resolution } => {
                self.finalize(complaint, resolution, actor, now)?
            }
        };

        complaint.updated_at = now;
        Ok(effects)
    }

    fn assign(
        &self,
        complaint: &mut Complaint,
        agency: PrincipalId,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, TransitionError> {
        if complaint.status != ComplaintStatus::Pending {
            return Err(TransitionError::InvalidTransition {
                from: complaint.status,
                action: "assign",
            });
        }

        complaint.status = ComplaintStatus::Assigned;
        complaint.assigned_agency = Some(agency.clone());
        complaint.assigned_at = Some(now);
        push_history(
            complaint,
            actor,
            now,
            format!("assigned to agency {agency}"),
        );

        Ok(vec![
            notification(
                agency,
                NotificationEvent::ComplaintAssigned,
                "Complaint assigned to your agency",
                format!("Complaint {} requires attention", complaint.id),
                &complaint.id,
            ),
            notification(
                complaint.reporter.clone(),
                NotificationEvent::ComplaintAssigned,
                "Your complaint has been assigned",
                format!("Complaint {} is now with a maintenance agency", complaint.id),
                &complaint.id,
            ),
        ])
    }

    fn assign_staff(
        &self,
        complaint: &mut Complaint,
        staff: PrincipalId,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, TransitionError> {
        if complaint.status.is_terminal() {
            return Err(TransitionError::InvalidTransition {
                from: complaint.status,
                action: "assign staff",
            });
        }
        if complaint.assigned_agency.is_none() {
            return Err(TransitionError::AgencyNotAssigned);
        }

        // Status is unchanged; the handover is still audit-worthy.
        complaint.assigned_staff = Some(staff.clone());
        push_history(complaint, actor, now, format!("staff {staff} assigned"));

        Ok(vec![notification(
            staff,
            NotificationEvent::StaffAssigned,
            "Complaint assigned to you",
            format!("You are now responsible for complaint {}", complaint.id),
            &complaint.id,
        )])
    }

    fn resolve(
        &self,
        complaint: &mut Complaint,
        notes: String,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, TransitionError> {
        if complaint.status != ComplaintStatus::Assigned {
            return Err(TransitionError::InvalidTransition {
                from: complaint.status,
                action: "resolve",
            });
        }

        complaint.status = ComplaintStatus::Resolved;
        complaint.resolved_at = Some(now);
        complaint.resolution_notes = Some(notes);
        push_history(complaint, actor, now, "marked resolved".to_string());

        Ok(vec![notification(
            complaint.reporter.clone(),
            NotificationEvent::ComplaintResolved,
            "Your complaint has been resolved",
            format!(
                "Complaint {} was resolved; please rate the outcome",
                complaint.id
            ),
            &complaint.id,
        )])
    }

    fn feedback(
        &self,
        complaint: &mut Complaint,
        rating: u8,
        comment: String,
        appellate_authority: Option<PrincipalId>,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, TransitionError> {
        if complaint.status != ComplaintStatus::Resolved {
            return Err(TransitionError::InvalidTransition {
                from: complaint.status,
                action: "record feedback",
            });
        }

        // Satisfaction threshold: 3 and above closes, below 3 escalates.
        if rating >= 3 {
            complaint.status = ComplaintStatus::Closed;
            complaint.closed_at = Some(now);
            complaint.feedback = Some(Feedback {
                rating,
                comment,
            });
            push_history(
                complaint,
                actor,
                now,
                format!("closed with rating {rating}"),
            );

            let mut effects = Vec::new();
            if let Some(agency) = complaint.assigned_agency.clone() {
                effects.push(notification(
                    agency,
                    NotificationEvent::ComplaintClosed,
                    "Complaint closed",
                    format!("Complaint {} was closed with rating {rating}", complaint.id),
                    &complaint.id,
                ));
            }
            return Ok(effects);
        }

        let authority =
            appellate_authority.ok_or(TransitionError::AppellateAuthorityUnavailable)?;
        let reason = if comment.trim().is_empty() {
            self.config.default_escalation_reason.clone()
        } else {
            comment.clone()
        };

        complaint.status = ComplaintStatus::Escalated;
        complaint.feedback = Some(Feedback { rating, comment });
        complaint.escalation = Some(Escalation {
            reason,
            appellate_authority: authority.clone(),
            final_resolution: None,
        });
        push_history(
            complaint,
            actor,
            now,
            format!("escalated after rating {rating}"),
        );

        let mut effects = vec![notification(
            authority,
            NotificationEvent::ComplaintEscalated,
            "Complaint escalated to you",
            format!("Complaint {} needs a final resolution", complaint.id),
            &complaint.id,
        )];
        if let Some(agency) = complaint.assigned_agency.clone() {
            effects.push(notification(
                agency,
                NotificationEvent::ComplaintEscalated,
                "Complaint escalated",
                format!(
                    "Complaint {} was escalated after low-satisfaction feedback",
                    complaint.id
                ),
                &complaint.id,
            ));
        }
        Ok(effects)
    }

    fn finalize(
        &self,
        complaint: &mut Complaint,
        resolution: String,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, TransitionError> {
        if actor.role != Role::SuperAdmin {
            return Err(TransitionError::NotAppellateAuthority);
        }
        if complaint.status != ComplaintStatus::Escalated {
            return Err(TransitionError::InvalidTransition {
                from: complaint.status,
                action: "finalize",
            });
        }

        complaint.status = ComplaintStatus::FinalResolution;
        complaint.final_resolved_at = Some(now);
        complaint.closed_at = Some(now);
        if let Some(escalation) = complaint.escalation.as_mut() {
            escalation.final_resolution = Some(resolution);
        }
        push_history(complaint, actor, now, "final resolution issued".to_string());

        let mut effects = vec![notification(
            complaint.reporter.clone(),
            NotificationEvent::ComplaintFinalized,
            "Final resolution issued",
            format!(
                "Complaint {} was closed by the appellate authority",
                complaint.id
            ),
            &complaint.id,
        )];
        if let Some(agency) = complaint.assigned_agency.clone() {
            effects.push(notification(
                agency,
                NotificationEvent::ComplaintFinalized,
                "Final resolution issued",
                format!("Complaint {} received its final resolution", complaint.id),
                &complaint.id,
            ));
        }
        Ok(effects)
    }
}

fn push_history(complaint: &mut Complaint, actor: &Principal, at: DateTime<Utc>, note: String) {
    complaint.history.push(HistoryEntry {
        status: complaint.status,
        actor: actor.id.clone(),
        at,
        note,
    });
}

fn notification(
    recipient: PrincipalId,
    event: NotificationEvent,
    title: &str,
    message: String,
    complaint_id: &ComplaintId,
) -> Notification {
    Notification {
        recipient,
        title: title.to_string(),
        message,
        event,
        complaint_id: complaint_id.clone(),
    }
}
