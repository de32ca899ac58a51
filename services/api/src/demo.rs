use crate::infra::{
    AllowlistRoleProvider, InMemoryApplicationRepository, InMemoryAuditTrail,
    RecordingNotificationGateway,
};
use clap::Args;
use judgedesk::error::AppError;
use judgedesk::workflows::applicants::{
    AdminGateway, ApplicationLifecycle, ApplicationSubmission, AttachmentDescriptor,
    LifecyclePolicy,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Park verified applications for an operator decision instead of
    /// auto-approving on email verification
    #[arg(long)]
    pub(crate) require_admin_approval: bool,
    /// Operator name used for the admin decision portion of the demo
    #[arg(long, default_value = "ops")]
    pub(crate) actor: String,
    /// Have the operator decline instead of approve
    #[arg(long)]
    pub(crate) decline: bool,
    /// Base URL embedded in verification and signup links
    #[arg(long)]
    pub(crate) base_url: Option<String>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        require_admin_approval,
        actor,
        decline,
        base_url,
    } = args;

    let policy = LifecyclePolicy {
        auto_approve_on_verify: !require_admin_approval,
        public_base_url: base_url.unwrap_or_else(|| "http://127.0.0.1:3000".to_string()),
    };

    let repository = Arc::new(InMemoryApplicationRepository::default());
    let audit = Arc::new(InMemoryAuditTrail::default());
    let notifier = Arc::new(RecordingNotificationGateway::default());
    let lifecycle = Arc::new(ApplicationLifecycle::new(
        repository,
        audit,
        notifier.clone(),
        policy,
    ));
    let gateway = AdminGateway::new(
        lifecycle.clone(),
        Arc::new(AllowlistRoleProvider::new(vec![actor.clone()])),
    );

    println!("Applicant lifecycle demo");

    let record = match lifecycle.submit(demo_submission()) {
        Ok(record) => record,
        Err(err) => {
            println!("  Submission rejected: {}", err);
            return Ok(());
        }
    };
    println!(
        "- Received application {} for {} -> status {}",
        record.id, record.email, record.status
    );

    match lifecycle.submit(demo_submission()) {
        Ok(_) => println!("  Unexpected: duplicate submission accepted"),
        Err(err) => println!("- Duplicate submission rejected: {}", err),
    }

    let Some(token) = record.verification_token.as_ref() else {
        println!("  No verification token issued, stopping");
        return Ok(());
    };
    println!("- Applicant clicks the emailed verification link");
    let verified = match lifecycle.verify_email(&record.email, &token.secret) {
        Ok(verified) => verified,
        Err(err) => {
            println!("  Verification failed: {}", err);
            return Ok(());
        }
    };
    println!(
        "  Email verified -> status {} (verified={})",
        verified.status, verified.verified
    );

    let mut approved = !require_admin_approval && !decline;
    if require_admin_approval {
        match lifecycle.pending_review(10) {
            Ok(pending) => println!("- {} application(s) awaiting an operator", pending.len()),
            Err(err) => println!("  Pending listing unavailable: {}", err),
        }
    }
    if require_admin_approval || decline {
        let decision = if decline {
            gateway.decline(&record.id, &actor, Some("demo decline".to_string()))
        } else {
            gateway.approve(&record.id, &actor, None)
        };
        match decision {
            Ok(outcome) => {
                println!(
                    "- Operator {} moved {} -> {}",
                    actor, outcome.previous_status, outcome.new_status
                );
                approved = !decline;
            }
            Err(err) => println!("  Operator decision failed: {}", err),
        }
    }

    if approved {
        match lifecycle.issue_signup_link(&record.email) {
            Ok(link) => println!("- Signup link issued: {}", link.signup_url),
            Err(err) => println!("  Signup link unavailable: {}", err),
        }
    }

    match lifecycle.audit_history(&record.email) {
        Ok(history) => {
            println!("\nStatus history (most recent first)");
            for entry in &history.status_history {
                let notes = entry
                    .notes
                    .as_deref()
                    .map(|notes| format!(" ({notes})"))
                    .unwrap_or_default();
                println!(
                    "- {} -> {} by {} at {}{}",
                    entry.previous_status,
                    entry.new_status,
                    entry.actor.name(),
                    entry.occurred_at,
                    notes
                );
            }
        }
        Err(err) => println!("  History unavailable: {}", err),
    }

    let sent = notifier.sent();
    if sent.is_empty() {
        println!("\nNotifications: none dispatched");
    } else {
        println!("\nNotifications dispatched");
        for notification in sent {
            println!(
                "- template={} -> {}",
                notification.kind.template_key(),
                notification.recipient
            );
        }
    }

    Ok(())
}

fn demo_submission() -> ApplicationSubmission {
    ApplicationSubmission {
        email: "judge@example.com".to_string(),
        full_name: "Dana Reyes".to_string(),
        phone: Some("+1-515-555-0117".to_string()),
        region: Some("Midwest".to_string()),
        education: Some("JD, Drake University".to_string()),
        experience: Some("Nine seasons judging regional showcases".to_string()),
        motivation: Some("Keep the judging bench independent".to_string()),
        attachments: vec![AttachmentDescriptor {
            name: "CV".to_string(),
            storage_key: "uploads/judge-example/cv.pdf".to_string(),
        }],
    }
}
