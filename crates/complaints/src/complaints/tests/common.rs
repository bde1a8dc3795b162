use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::complaints::domain::{
    Category, Complaint, ComplaintId, ComplaintSubmission, Principal, PrincipalId, Resource,
    ResourceId, ResourceKind, Role,
};
use crate::complaints::repository::{
    ComplaintFilters, ComplaintRepository, Directory, GatewayError, Notification,
    NotificationGateway, RepositoryError,
};
use crate::complaints::service::ComplaintService;
use crate::config::EngineConfig;

pub(super) type TestService = ComplaintService<MemoryRepository, MemoryGateway, MemoryDirectory>;

#[derive(Default)]
pub(super) struct MemoryRepository {
    records: Mutex<HashMap<ComplaintId, Complaint>>,
    sequences: Mutex<HashMap<(i32, u32), u32>>,
}

impl ComplaintRepository for MemoryRepository {
    fn insert(&self, complaint: Complaint) -> Result<Complaint, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&complaint.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(complaint.id.clone(), complaint.clone());
        Ok(complaint)
    }

    fn update(&self, complaint: Complaint) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard
            .get(&complaint.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version + 1 != complaint.version {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(complaint.id.clone(), complaint);
        Ok(())
    }

    fn fetch(&self, id: &ComplaintId) -> Result<Option<Complaint>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn select(&self, filters: &ComplaintFilters) -> Result<Vec<Complaint>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
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
pub(super) struct MemoryGateway {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryGateway {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("gateway mutex poisoned").clone()
    }
}

impl NotificationGateway for MemoryGateway {
    fn send(&self, notification: Notification) -> Result<(), GatewayError> {
        self.sent
            .lock()
            .expect("gateway mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingGateway;

impl NotificationGateway for FailingGateway {
    fn send(&self, _notification: Notification) -> Result<(), GatewayError> {
        Err(GatewayError::Transport("push backend offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    principals: Mutex<Vec<Principal>>,
    resources: Mutex<Vec<Resource>>,
}

impl MemoryDirectory {
    pub(super) fn with_principal(self, principal: Principal) -> Self {
        self.principals
            .lock()
            .expect("directory mutex poisoned")
            .push(principal);
        self
    }

    pub(super) fn with_resource(self, resource: Resource) -> Self {
        self.resources
            .lock()
            .expect("directory mutex poisoned")
            .push(resource);
        self
    }
}

impl Directory for MemoryDirectory {
    fn resolve_principal(&self, id: &PrincipalId) -> Result<Option<Principal>, RepositoryError> {
        let guard = self.principals.lock().expect("directory mutex poisoned");
        Ok(guard.iter().find(|principal| &principal.id == id).cloned())
    }

    fn resolve_resource(&self, id: &ResourceId) -> Result<Option<Resource>, RepositoryError> {
        let guard = self.resources.lock().expect("directory mutex poisoned");
        Ok(guard.iter().find(|resource| &resource.id == id).cloned())
    }

    fn department_admins(&self, department: Category) -> Result<Vec<Principal>, RepositoryError> {
        let guard = self.principals.lock().expect("directory mutex poisoned");
        Ok(guard
            .iter()
            .filter(|principal| {
                principal.approved && principal.role == Role::DepartmentAdmin(department)
            })
            .cloned()
            .collect())
    }

    fn super_admins(&self) -> Result<Vec<Principal>, RepositoryError> {
        let guard = self.principals.lock().expect("directory mutex poisoned");
        Ok(guard
            .iter()
            .filter(|principal| principal.approved && principal.role == Role::SuperAdmin)
            .cloned()
            .collect())
    }
}

pub(super) fn principal(id: &str, role: Role) -> Principal {
    Principal {
        id: PrincipalId(id.to_string()),
        role,
        approved: true,
    }
}

pub(super) fn resident() -> Principal {
    principal("res-1", Role::Resident)
}

pub(super) fn electrical_admin() -> Principal {
    principal("ea-1", Role::DepartmentAdmin(Category::Electrical))
}

pub(super) fn civil_admin() -> Principal {
    principal("ca-1", Role::DepartmentAdmin(Category::Civil))
}

pub(super) fn staff() -> Principal {
    principal("ms-1", Role::MaintenanceStaff)
}

pub(super) fn super_admin() -> Principal {
    principal("sa-1", Role::SuperAdmin)
}

pub(super) fn standard_directory() -> MemoryDirectory {
    MemoryDirectory::default()
        .with_principal(resident())
        .with_principal(principal("res-2", Role::Resident))
        .with_principal(electrical_admin())
        .with_principal(civil_admin())
        .with_principal(staff())
        .with_principal(super_admin())
        .with_principal(principal("sa-2", Role::SuperAdmin))
        .with_resource(Resource {
            id: ResourceId("unit-12".to_string()),
            kind: ResourceKind::Personal,
            name: "Unit 12".to_string(),
        })
        .with_resource(Resource {
            id: ResourceId("pump-house".to_string()),
            kind: ResourceKind::Functional,
            name: "Pump house".to_string(),
        })
}

pub(super) fn build_service() -> (
    Arc<TestService>,
    Arc<MemoryRepository>,
    Arc<MemoryGateway>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let gateway = Arc::new(MemoryGateway::default());
    let directory = Arc::new(standard_directory());
    let service = Arc::new(ComplaintService::new(
        repository.clone(),
        gateway.clone(),
        directory,
        EngineConfig::default(),
    ));
    (service, repository, gateway)
}

pub(super) fn submission() -> ComplaintSubmission {
    ComplaintSubmission {
        resource: ResourceId("unit-12".to_string()),
        category: Category::Electrical,
        subcategory: "Lighting".to_string(),
        description: "Corridor light on the second floor keeps flickering".to_string(),
        images: vec!["img/corridor-1.jpg".to_string()],
    }
}

pub(super) fn civil_submission() -> ComplaintSubmission {
    ComplaintSubmission {
        resource: ResourceId("pump-house".to_string()),
        category: Category::Civil,
        subcategory: "Plumbing".to_string(),
        description: "Main riser valve is leaking near the pump house".to_string(),
        images: Vec::new(),
    }
}

/// Submit and walk a complaint up to `Assigned` with staff attached.
pub(super) fn assigned_complaint(service: &TestService) -> Complaint {
    let complaint = service
        .submit(&resident(), submission())
        .expect("submission accepted");
    service
        .assign_to_agency(&complaint.id, &staff().id, &electrical_admin())
        .expect("assignment accepted");
    service
        .assign_to_staff(&complaint.id, &staff().id, &electrical_admin())
        .expect("staff assignment accepted")
}

/// Submit and walk a complaint up to `Resolved`.
pub(super) fn resolved_complaint(service: &TestService) -> Complaint {
    let complaint = assigned_complaint(service);
    service
        .resolve(&complaint.id, "replaced the ballast", &staff())
        .expect("resolution accepted")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
