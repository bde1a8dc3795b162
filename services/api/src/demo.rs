use crate::infra::{InMemoryComplaintRepository, LoggingNotificationGateway, SeededDirectory};
use clap::Args;
use std::sync::Arc;

use complaints::complaints::{
    Category, Complaint, ComplaintService, ComplaintSubmission, Directory, Principal, PrincipalId,
    ResourceId,
};
use complaints::config::EngineConfig;
use complaints::error::AppError;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Feedback rating for the first demo complaint (1-5, default 5)
    #[arg(long)]
    pub(crate) rating: Option<u8>,
    /// Skip the escalation walk-through
    #[arg(long)]
    pub(crate) skip_escalation: bool,
}

type DemoService =
    ComplaintService<InMemoryComplaintRepository, LoggingNotificationGateway, SeededDirectory>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let directory = Arc::new(SeededDirectory::community());
    let service: DemoService = ComplaintService::new(
        Arc::new(InMemoryComplaintRepository::default()),
        Arc::new(LoggingNotificationGateway),
        directory.clone(),
        EngineConfig::default(),
    );

    let resident = lookup(&directory, "res-1")?;
    let admin = lookup(&directory, "ea-1")?;
    let staff = lookup(&directory, "ms-1")?;
    let super_admin = lookup(&directory, "sa-1")?;

    println!("Complaint lifecycle demo");

    let rating = args.rating.unwrap_or(5).clamp(1, 5);
    println!("\n== Feedback path (rating {rating}) ==");
    let complaint = walk_to_resolved(&service, &resident, &admin, &staff, "Lighting")?;
    let complaint = service.submit_feedback(
        &complaint.id,
        rating,
        "demo feedback",
        &resident,
    )?;
    render_timeline(&complaint);

    if !args.skip_escalation {
        println!("\n== Escalation path ==");
        let complaint = walk_to_resolved(&service, &resident, &admin, &staff, "Wiring")?;
        let complaint =
            service.submit_feedback(&complaint.id, 1, "problem came back overnight", &resident)?;
        render_timeline(&complaint);

        let complaint = service.finalize(
            &complaint.id,
            "replaced the full circuit after inspection",
            &super_admin,
        )?;
        render_timeline(&complaint);
    }

    Ok(())
}

fn lookup(directory: &SeededDirectory, id: &str) -> Result<Principal, AppError> {
    directory
        .resolve_principal(&PrincipalId(id.to_string()))
        .map_err(complaints::complaints::ComplaintServiceError::from)
        .map_err(AppError::from)?
        .ok_or_else(|| {
            AppError::from(complaints::complaints::ComplaintServiceError::NotFound {
                kind: "principal",
                id: id.to_string(),
            })
        })
}

fn walk_to_resolved(
    service: &DemoService,
    resident: &Principal,
    admin: &Principal,
    staff: &Principal,
    subcategory: &str,
) -> Result<Complaint, AppError> {
    let complaint = service.submit(
        resident,
        ComplaintSubmission {
            resource: ResourceId("unit-12".to_string()),
            category: Category::Electrical,
            subcategory: subcategory.to_string(),
            description: "Demo walkthrough of the complaint lifecycle engine".to_string(),
            images: Vec::new(),
        },
    )?;
    service.assign_to_agency(&complaint.id, &staff.id, admin)?;
    service.assign_to_staff(&complaint.id, &staff.id, admin)?;
    let complaint = service.resolve(&complaint.id, "demo resolution notes", staff)?;
    Ok(complaint)
}

fn render_timeline(complaint: &Complaint) {
    println!(
        "{} | {} / {} | status {}",
        complaint.id,
        complaint.category,
        complaint.subcategory,
        complaint.status
    );
    for entry in &complaint.history {
        println!(
            "  {} | {} | by {} | {}",
            entry.at.format("%Y-%m-%d %H:%M:%S"),
            entry.status,
            entry.actor,
            entry.note
        );
    }
    if let Some(feedback) = &complaint.feedback {
        println!("  feedback: rating {} ({})", feedback.rating, feedback.comment);
    }
    if let Some(escalation) = &complaint.escalation {
        println!(
            "  escalation: {} -> authority {}",
            escalation.reason, escalation.appellate_authority
        );
        if let Some(resolution) = &escalation.final_resolution {
            println!("  final resolution: {resolution}");
        }
    }
}
