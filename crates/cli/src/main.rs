use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use healthassist_core::{
    constants::DEFAULT_NOTIFICATION_LIMIT,
    reminders::ReminderService,
    repositories::health_records::{HealthRecordService, RecordType},
    repositories::notifications::NotificationService,
    repositories::patients::{NewPatient, PatientService},
    repositories::users::{NewUser, Role, UserService},
    CoreConfig, Database,
};

#[derive(Parser)]
#[command(name = "healthassist")]
#[command(about = "HealthAssist care assistant CLI")]
struct Cli {
    /// Directory holding the collection files
    #[arg(long, env = "HEALTHASSIST_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all patients
    ListPatients,
    /// Add a patient
    AddPatient {
        name: String,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long, default_value = "")]
        gender: String,
        /// Height in centimetres
        #[arg(long)]
        height: Option<f64>,
        /// Weight in kilograms
        #[arg(long)]
        weight: Option<f64>,
        /// Condition in the medical history (repeatable)
        #[arg(long = "condition")]
        conditions: Vec<String>,
        /// Link the patient to this login
        #[arg(long)]
        user: Option<String>,
    },
    /// Register a user account
    Register {
        username: String,
        password: String,
        /// admin, doctor or patient
        #[arg(long, default_value = "patient")]
        role: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Check a username and password
    Login { username: String, password: String },
    /// Add a health record to a patient
    AddRecord {
        patient_id: String,
        /// Record type, e.g. Consultation or "Lab Result"
        kind: String,
        /// JSON object with the record contents
        data: String,
        #[arg(long, default_value = "admin")]
        created_by: String,
    },
    /// Show current notifications of a user
    Notifications {
        username: String,
        #[arg(long)]
        include_read: bool,
        #[arg(long, default_value_t = DEFAULT_NOTIFICATION_LIMIT)]
        limit: usize,
    },
    /// Generate reminders for a user
    Remind { username: String },
    /// Show a patient's BMI
    Bmi { patient_id: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'healthassist --help' for commands");
        return Ok(());
    };

    let db = Database::open(Arc::new(CoreConfig::new(cli.data_dir)?));

    match command {
        Commands::ListPatients => {
            let patients = PatientService::new(db).list()?;
            if patients.is_empty() {
                println!("No patients found.");
            } else {
                for patient in patients {
                    println!(
                        "ID: {}, Name: {}, Age: {}",
                        patient.id,
                        patient.name,
                        patient.age.map_or_else(|| "-".into(), |a| a.to_string())
                    );
                }
            }
        }
        Commands::AddPatient {
            name,
            age,
            gender,
            height,
            weight,
            conditions,
            user,
        } => {
            let mut new = NewPatient::new(name);
            new.age = age;
            new.gender = gender;
            new.height = height;
            new.weight = weight;
            new.medical_history = conditions;
            new.user_id = user;
            match PatientService::new(db).create(new) {
                Ok(patient) => println!("Added patient {} ({})", patient.name, patient.id),
                Err(e) => eprintln!("Error adding patient: {}", e),
            }
        }
        Commands::Register {
            username,
            password,
            role,
            name,
            email,
        } => {
            let role: Role = role.parse()?;
            let new = NewUser {
                username,
                password,
                role,
                name,
                email,
            };
            match UserService::new(db).register(new) {
                Ok(user) => println!("Registered {} as {}", user.username, user.role),
                Err(e) => eprintln!("Error registering user: {}", e),
            }
        }
        Commands::Login { username, password } => {
            match UserService::new(db).authenticate(&username, &password)? {
                Some(user) => println!("Welcome, {} ({})", user.name, user.role),
                None => eprintln!("Invalid username or password"),
            }
        }
        Commands::AddRecord {
            patient_id,
            kind,
            data,
            created_by,
        } => {
            let data: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&data)?;
            if PatientService::new(Arc::clone(&db)).get(&patient_id)?.is_none() {
                eprintln!("No patient with ID {}", patient_id);
                return Ok(());
            }
            let record = HealthRecordService::new(db).add(
                &patient_id,
                RecordType::from(kind.as_str()),
                data,
                &created_by,
            )?;
            println!("Added {} record {}", record.kind, record.id);
        }
        Commands::Notifications {
            username,
            include_read,
            limit,
        } => {
            let notifications =
                NotificationService::new(db).current(&username, include_read, limit, Utc::now())?;
            if notifications.is_empty() {
                println!("No notifications.");
            }
            for n in notifications {
                let marker = if n.read { " " } else { "*" };
                println!("{} [{}] {}: {}", marker, n.kind, n.title, n.message);
            }
        }
        Commands::Remind { username } => {
            let created = ReminderService::new(db).generate_all(
                &username,
                Utc::now(),
                &mut rand::thread_rng(),
            )?;
            println!("Created {} notification(s) for {}", created.len(), username);
            for n in created {
                println!("  {}", n.title);
            }
        }
        Commands::Bmi { patient_id } => match PatientService::new(db).bmi(&patient_id)? {
            Some(bmi) => println!("BMI: {:.2} ({})", bmi.value, bmi.category),
            None => println!("Height and weight are required to calculate BMI"),
        },
    }

    Ok(())
}
