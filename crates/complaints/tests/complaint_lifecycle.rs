use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Utc};
use complaints::complaints::{
    Category, Complaint, ComplaintFilters, ComplaintId, ComplaintRepository, ComplaintService,
    ComplaintServiceError, ComplaintStatus, ComplaintSubmission, Directory, GatewayError,
    Notification, NotificationGateway, Principal, PrincipalId, RepositoryError, Resource,
    ResourceId, ResourceKind, Role,
};
use complaints::config::EngineConfig;

#[derive(Default)]
struct MemoryStore {
    records: Mutex<HashMap<ComplaintId, Complaint>>,
    sequences: Mutex<HashMap<(i32, u32), u32>>,
}

impl ComplaintRepository for MemoryStore {
    fn insert(&self, complaint: Complaint) -> Result<Complaint, RepositoryError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if guard.contains_key(&complaint.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(complaint.id.clone(), complaint.clone());
        Ok(complaint)
    }

    fn update(&self, complaint: Complaint) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let stored = guard.get(&complaint.id).ok_or(RepositoryError::NotFound)?;
        if stored.version + 1 != complaint.version {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(complaint.id.clone(), complaint);
        Ok(())
    }

    fn fetch(&self, id: &ComplaintId) -> Result<Option<Complaint>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned())
    }

    fn select(&self, filters: &ComplaintFilters) -> Result<Vec<Complaint>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("store mutex poisoned")
            .values()
            .filter(|complaint| filters.matches(complaint))
            .cloned()
            .collect())
    }

    fn next_sequence(&self, year: i32, month: u32) -> Result<u32, RepositoryError> {
        let mut guard = self.sequences.lock().expect("sequence mutex poisoned");
        let entry = guard.entry((year, month)).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}

#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<Notification>>,
}

impl NotificationGateway for RecordingGateway {
    fn send(&self, notification: Notification) -> Result<(), GatewayError> {
        self.sent
            .lock()
            .expect("gateway mutex poisoned")
            .push(notification);
        Ok(())
    }
}

struct StaticDirectory {
    principals: Vec<Principal>,
    resources: Vec<Resource>,
}

impl StaticDirectory {
    fn community() -> Self {
        let principal = |id: &str, role| Principal {
            id: PrincipalId(id.to_string()),
            role,
            approved: true,
        };
        Self {
            principals: vec![
                principal("res-1", Role::Resident),
                principal("ea-1", Role::DepartmentAdmin(Category::Electrical)),
                principal("ms-1", Role::MaintenanceStaff),
                principal("sa-1", Role::SuperAdmin),
            ],
            resources: vec![Resource {
                id: ResourceId("unit-12".to_string()),
                kind: ResourceKind::Personal,
                name: "Unit 12".to_string(),
            }],
        }
    }
}

impl Directory for StaticDirectory {
    fn resolve_principal(&self, id: &PrincipalId) -> Result<Option<Principal>, RepositoryError> {
        Ok(self
            .principals
            .iter()
            .find(|principal| &principal.id == id)
            .cloned())
    }

    fn resolve_resource(&self, id: &ResourceId) -> Result<Option<Resource>, RepositoryError> {
        Ok(self
            .resources
            .iter()
            .find(|resource| &resource.id == id)
            .cloned())
    }

    fn department_admins(&self, department: Category) -> Result<Vec<Principal>, RepositoryError> {
        Ok(self
            .principals
            .iter()
            .filter(|principal| {
                principal.approved && principal.role == Role::DepartmentAdmin(department)
            })
            .cloned()
            .collect())
    }

    fn super_admins(&self) -> Result<Vec<Principal>, RepositoryError> {
        Ok(self
            .principals
            .iter()
            .filter(|principal| principal.approved && principal.role == Role::SuperAdmin)
            .cloned()
            .collect())
    }
}

type Service = ComplaintService<MemoryStore, RecordingGateway, StaticDirectory>;

fn build_service() -> Service {
    ComplaintService::new(
        Arc::new(MemoryStore::default()),
        Arc::new(RecordingGateway::default()),
        Arc::new(StaticDirectory::community()),
        EngineConfig::default(),
    )
}

fn cast() -> (Principal, Principal, Principal, Principal) {
    let directory = StaticDirectory::community();
    let find = |id: &str| {
        directory
            .resolve_principal(&PrincipalId(id.to_string()))
            .expect("lookup succeeds")
            .expect("principal exists")
    };
    (find("res-1"), find("ea-1"), find("ms-1"), find("sa-1"))
}

fn lighting_submission() -> ComplaintSubmission {
    ComplaintSubmission {
        resource: ResourceId("unit-12".to_string()),
        category: Category::Electrical,
        subcategory: "Lighting".to_string(),
        description: "Stairwell lamp has been dark for three days".to_string(),
        images: Vec::new(),
    }
}

#[test]
fn first_complaint_of_the_month_is_numbered_0001() {
    let service = build_service();
    let (resident, _, _, _) = cast();

    let complaint = service
        .submit(&resident, lighting_submission())
        .expect("submission accepted");

    let now = Utc::now();
    assert_eq!(
        complaint.id,
        ComplaintId::from_sequence(now.year(), now.month(), 1)
    );
    assert_eq!(complaint.status, ComplaintStatus::Pending);
}

#[test]
fn happy_path_ends_closed_with_full_audit_trail() {
    let service = build_service();
    let (resident, admin, staff, _) = cast();

    let complaint = service
        .submit(&resident, lighting_submission())
        .expect("submitted");
    service
        .assign_to_agency(&complaint.id, &staff.id, &admin)
        .expect("assigned");
    service
        .resolve(&complaint.id, "swapped the fixture", &staff)
        .expect("resolved");
    let closed = service
        .submit_feedback(&complaint.id, 5, "works again", &resident)
        .expect("feedback accepted");

    assert_eq!(closed.status, ComplaintStatus::Closed);
    assert!(closed.closed_at.is_some());
    let statuses: Vec<ComplaintStatus> =
        closed.history.iter().map(|entry| entry.status).collect();
    assert_eq!(
        statuses,
        vec![
            ComplaintStatus::Pending,
            ComplaintStatus::Assigned,
            ComplaintStatus::Resolved,
            ComplaintStatus::Closed,
        ]
    );
}

#[test]
fn appeal_path_ends_in_final_resolution() {
    let service = build_service();
    let (resident, admin, staff, super_admin) = cast();

    let complaint = service
        .submit(&resident, lighting_submission())
        .expect("submitted");
    service
        .assign_to_agency(&complaint.id, &staff.id, &admin)
        .expect("assigned");
    service
        .resolve(&complaint.id, "tightened the wiring", &staff)
        .expect("resolved");
    let escalated = service
        .submit_feedback(&complaint.id, 1, "still broken", &resident)
        .expect("feedback accepted");

    assert_eq!(escalated.status, ComplaintStatus::Escalated);
    let escalation = escalated.escalation.as_ref().expect("escalation recorded");
    assert_eq!(escalation.reason, "still broken");
    assert_eq!(escalation.appellate_authority, super_admin.id);

    let finalized = service
        .finalize(&complaint.id, "repaired", &super_admin)
        .expect("finalized");
    assert_eq!(finalized.status, ComplaintStatus::FinalResolution);
    assert!(finalized.closed_at.is_some());
    assert_eq!(finalized.history.len(), 5);
}

#[test]
fn finalizing_a_pending_complaint_is_rejected_without_mutation() {
    let service = build_service();
    let (resident, _, _, super_admin) = cast();

    let complaint = service
        .submit(&resident, lighting_submission())
        .expect("submitted");
    let result = service.finalize(&complaint.id, "done", &super_admin);
    assert!(matches!(
        result,
        Err(ComplaintServiceError::InvalidState(_))
    ));

    let stored = service
        .get(&complaint.id, &super_admin)
        .expect("fetch succeeds");
    assert_eq!(stored.status, ComplaintStatus::Pending);
    assert_eq!(stored.history.len(), 1);
}
