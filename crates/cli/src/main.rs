use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vetrack_core::{
    configured_registry, ChangeOutcome, CoreConfig, DialogDriver, PatientId, PatientService,
    ProtectionDialog, ProtectionPolicyResolver, StatusChangeWorkflow,
};

mod prompt;

#[derive(Parser)]
#[command(name = "vet")]
#[command(about = "VetTrack clinic staff CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List statuses and their protection levels
    Statuses,
    /// List all patients
    List,
    /// Register a patient
    Add {
        /// Patient name
        name: String,
        /// Species (dog, cat, ...)
        species: String,
        /// Owner's name
        owner: String,
        /// Initial status (defaults to the first registry status)
        #[arg(long)]
        status: Option<String>,
    },
    /// Change a patient's status, confirming protected changes interactively
    SetStatus {
        /// Patient id
        patient_id: String,
        /// Status to move the patient to
        status: String,
    },
    /// Show a patient's public tracking link and timeline
    Track {
        /// Patient id
        patient_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vetrack=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("VETRACK_DATA_DIR").ok(),
        std::env::var("VETRACK_STATUS_FILE").ok(),
        std::env::var("VETRACK_DELAY_SECONDS").ok(),
        std::env::var("VETRACK_PUBLIC_BASE_URL").ok(),
    )?);
    let registry = configured_registry(cfg.status_file());
    let patients = PatientService::new(cfg.clone(), registry.clone());

    match cli.command {
        Some(Commands::Statuses) => {
            for status in registry.statuses()? {
                match status.description {
                    Some(description) => println!(
                        "{:<20} {:<15} {}",
                        status.name, status.protection_level, description
                    ),
                    None => println!("{:<20} {}", status.name, status.protection_level),
                }
            }
        }
        Some(Commands::List) => {
            let all = patients.list();
            if all.is_empty() {
                println!("No patients found.");
            } else {
                for patient in all {
                    println!(
                        "ID: {}, Name: {} ({}), Owner: {}, Status: {}",
                        patient.id,
                        patient.name,
                        patient.species,
                        patient.owner_name,
                        patient.status
                    );
                }
            }
        }
        Some(Commands::Add {
            name,
            species,
            owner,
            status,
        }) => {
            let patient = patients.create(&name, &species, &owner, status.as_deref())?;
            println!("Registered {} with ID: {}", patient.name, patient.id);
            println!("Tracking link: {}", cfg.tracking_url(&patient.tracking_token));
        }
        Some(Commands::SetStatus { patient_id, status }) => {
            let patient_id = PatientId::parse(&patient_id)?;
            let patient = patients
                .get(&patient_id)
                .with_context(|| format!("loading patient {patient_id}"))?;

            let (dialog, _driver) =
                DialogDriver::spawn(ProtectionDialog::new(cfg.delay_seconds()));
            let workflow = StatusChangeWorkflow::new(
                ProtectionPolicyResolver::new(registry.clone()),
                dialog.clone(),
                Arc::new(patients.clone()),
            );

            let pending = workflow.change_status(&patient, &status).await?;
            if pending.opened_in().is_some() {
                prompt::run(&dialog).await?;
            }

            match pending.outcome().await {
                ChangeOutcome::Committed(updated) => {
                    println!("{} is now '{}'", updated.name, updated.status)
                }
                ChangeOutcome::CommitFailed(err) => {
                    eprintln!("Error updating status: {}", err)
                }
                ChangeOutcome::Cancelled | ChangeOutcome::Superseded => {
                    println!(
                        "Status change cancelled; {} is still '{}'",
                        patient.name, patient.status
                    )
                }
            }
        }
        Some(Commands::Track { patient_id }) => {
            let patient = patients.get(&PatientId::parse(&patient_id)?)?;
            println!("Tracking link: {}", cfg.tracking_url(&patient.tracking_token));
            println!(
                "{} ({}) is currently '{}'",
                patient.name, patient.species, patient.status
            );
            for entry in &patient.timeline {
                println!(
                    "  {}  {}",
                    entry.recorded_at.format("%Y-%m-%d %H:%M"),
                    entry.status
                );
            }
        }
        None => {
            println!("Use 'vet --help' for commands");
        }
    }

    Ok(())
}
