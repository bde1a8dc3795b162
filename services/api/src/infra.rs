use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

use complaints::complaints::{
    Category, Complaint, ComplaintFilters, ComplaintId, ComplaintRepository, Directory,
    GatewayError, Notification, NotificationGateway, Principal, PrincipalId, RepositoryError,
    Resource, ResourceId, ResourceKind, Role,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory complaint store backing the reference deployment. The versioned
/// update check makes it a faithful stand-in for a database with optimistic
/// locking.
#[derive(Default)]
pub(crate) struct InMemoryComplaintRepository {
    records: Mutex<HashMap<ComplaintId, Complaint>>,
    sequences: Mutex<HashMap<(i32, u32), u32>>,
}

impl ComplaintRepository for InMemoryComplaintRepository {
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
        let stored = guard.get(&complaint.id).ok_or(RepositoryError::NotFound)?;
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

/// Gateway stand-in that logs deliveries instead of pushing to a device.
/// Real push/SMS delivery belongs to an external notifier.
#[derive(Default)]
pub(crate) struct LoggingNotificationGateway;

impl NotificationGateway for LoggingNotificationGateway {
    fn send(&self, notification: Notification) -> Result<(), GatewayError> {
        info!(
            recipient = %notification.recipient,
            complaint = %notification.complaint_id,
            event = ?notification.event,
            title = %notification.title,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Seeded identity and resource registry for the reference deployment.
pub(crate) struct SeededDirectory {
    principals: Vec<Principal>,
    resources: Vec<Resource>,
}

impl SeededDirectory {
    pub(crate) fn community() -> Self {
        let principal = |id: &str, role| Principal {
            id: PrincipalId(id.to_string()),
            role,
            approved: true,
        };
        let resource = |id: &str, kind, name: &str| Resource {
            id: ResourceId(id.to_string()),
            kind,
            name: name.to_string(),
        };

        Self {
            principals: vec![
                principal("res-1", Role::Resident),
                principal("res-2", Role::Resident),
                principal("ea-1", Role::DepartmentAdmin(Category::Electrical)),
                principal("ca-1", Role::DepartmentAdmin(Category::Civil)),
                principal("ms-1", Role::MaintenanceStaff),
                principal("ms-2", Role::MaintenanceStaff),
                principal("sa-1", Role::SuperAdmin),
            ],
            resources: vec![
                resource("unit-12", ResourceKind::Personal, "Unit 12"),
                resource("pump-house", ResourceKind::Functional, "Pump house"),
                resource("clubhouse", ResourceKind::General, "Clubhouse"),
            ],
        }
    }
}

impl Directory for SeededDirectory {
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
