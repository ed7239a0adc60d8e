mod prompt;

use anyhow::Result;
use clap::Parser;
use prompt::{
    Command, SymptomEdit, menu, parse_choice, parse_command, parse_symptom_edits, parse_yes_no,
};
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use wizard_flow::{
    DetailValue, HttpAnalysisRequester, MedicalHistory, PatientType, StayReason, Step, Transition,
    UserDetailsUpdate, UserType, WizardConfig, WizardController, WizardError, WizardUpdate,
    WizardVariant,
    catalog::{self, DetailField},
    render_report,
    sequencer::required_user_details,
};

#[derive(Parser, Debug)]
#[command(name = "symptom-checker", version, about = "Interactive symptom checker")]
struct Args {
    #[arg(
        long,
        env = "SYMPTOM_CHECKER_URL",
        default_value = "http://localhost:3000",
        help = "Base URL of the symptom checker service"
    )]
    server_url: String,
    #[arg(long, default_value_t = WizardVariant::MultiRole, help = "single-role or multi-role")]
    variant: WizardVariant,
    #[arg(long, default_value_t = 60, help = "Seconds to wait for the analysis")]
    timeout_secs: u64,
    #[arg(long, help = "Print the raw analysis JSON instead of the report")]
    json: bool,
}

const USER_TYPES: &[&str] = &["Individual", "Hospital", "Insurance"];
const PATIENT_TYPES: &[&str] = &["Myself", "Someone else"];
const HISTORY_QUESTIONS: &[&str] = &[
    "Recent injury",
    "Smoking",
    "Allergies",
    "Overweight",
    "Hypertension",
];

const TERMS: &str = "This tool provides general health information only. It does not give \
medical diagnoses and does not replace a consultation with a qualified healthcare provider. \
In an emergency, call your local emergency number.";

/// What the screen asked the driver loop to do next
enum Action {
    Advance,
    Stay,
    Command(Command),
}

struct Terminal {
    lines: Lines<BufReader<Stdin>>,
}

impl Terminal {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Prompt for one line. End of input reads as `:quit`.
    async fn ask(&mut self, question: &str) -> Result<std::result::Result<String, Command>> {
        print!("{question} ");
        std::io::stdout().flush()?;
        let Some(line) = self.lines.next_line().await? else {
            return Ok(Err(Command::Quit));
        };
        Ok(match parse_command(&line) {
            Some(command) => Err(command),
            None => Ok(line.trim().to_string()),
        })
    }
}

macro_rules! answer {
    ($terminal:expr, $question:expr) => {
        match $terminal.ask($question).await? {
            Ok(answer) => answer,
            Err(command) => return Ok(Action::Command(command)),
        }
    };
}

fn user_type_from(label: &str) -> Option<UserType> {
    match label {
        "Individual" => Some(UserType::Individual),
        "Hospital" => Some(UserType::Hospital),
        "Insurance" => Some(UserType::Insurance),
        _ => None,
    }
}

fn field_label(field: &str) -> &'static str {
    match field {
        "name" => "Your name",
        "hospitalName" => "Hospital name",
        "patientName" => "Patient name",
        "insurancePolicyNumber" => "Insurance policy number",
        "specialist" => "Specialist",
        _ => "Value",
    }
}

/// Show a rejected answer and keep the user on the screen
fn rejected(e: WizardError) -> Result<Action> {
    match e {
        WizardError::InvalidAnswer { reason, .. } => {
            println!("  {reason}");
            Ok(Action::Stay)
        }
        other => Err(other.into()),
    }
}

async fn welcome(terminal: &mut Terminal) -> Result<Action> {
    println!("\nSymptom Checker");
    println!("Answer a few questions and get AI-generated care recommendations.");
    println!("Type :back, :restart or :quit at any prompt.");
    answer!(terminal, "Press Enter to begin.");
    Ok(Action::Advance)
}

async fn terms(controller: &WizardController, terminal: &mut Terminal) -> Result<Action> {
    println!("\n{TERMS}");
    let answer = answer!(terminal, "Do you accept these terms? [y/n]");
    match parse_yes_no(&answer) {
        Some(accepted) => {
            controller.update(WizardUpdate {
                accepted_terms: Some(accepted),
                ..Default::default()
            })?;
            if !accepted {
                println!("  You need to accept the terms to continue.");
                return Ok(Action::Stay);
            }
            Ok(Action::Advance)
        }
        None => Ok(Action::Stay),
    }
}

async fn user_type(controller: &WizardController, terminal: &mut Terminal) -> Result<Action> {
    println!("\nWho are you?\n{}", menu(USER_TYPES));
    let answer = answer!(terminal, ">");
    let Some(user_type) = parse_choice(&answer, USER_TYPES).and_then(user_type_from) else {
        return Ok(Action::Stay);
    };
    controller.update(WizardUpdate {
        user_type: Some(user_type),
        ..Default::default()
    })?;
    Ok(Action::Advance)
}

async fn user_details(controller: &WizardController, terminal: &mut Terminal) -> Result<Action> {
    let state = controller.state();
    let Some(user_type) = state.user_type else {
        return Ok(Action::Stay);
    };

    println!("\nYour details (Enter keeps the current value)");
    let mut details = UserDetailsUpdate::default();
    let mut specialist = None;
    for field in required_user_details(user_type) {
        if *field == "specialist" {
            println!("{}", menu(catalog::SPECIALISTS));
            let answer = answer!(terminal, &format!("{}:", field_label(field)));
            if !answer.is_empty() {
                specialist = parse_choice(&answer, catalog::SPECIALISTS).map(str::to_string);
            }
            continue;
        }

        let answer = answer!(terminal, &format!("{}:", field_label(field)));
        if answer.is_empty() {
            continue;
        }
        match *field {
            "name" => details.name = Some(answer),
            "hospitalName" => details.hospital_name = Some(answer),
            "patientName" => details.patient_name = Some(answer),
            "insurancePolicyNumber" => details.insurance_policy_number = Some(answer),
            _ => {}
        }
    }

    if let Err(e) = controller.update(WizardUpdate {
        user_details: Some(details),
        specialist,
        ..Default::default()
    }) {
        return rejected(e);
    }
    Ok(Action::Advance)
}

async fn patient(controller: &WizardController, terminal: &mut Terminal) -> Result<Action> {
    println!("\nWho is this assessment for?\n{}", menu(PATIENT_TYPES));
    let answer = answer!(terminal, ">");
    let patient_type = match parse_choice(&answer, PATIENT_TYPES) {
        Some("Myself") => PatientType::Myself,
        Some(_) => PatientType::Other,
        None => return Ok(Action::Stay),
    };

    println!("Medical history ([y/n], Enter to skip)");
    let mut flags = [None; 5];
    for (flag, question) in flags.iter_mut().zip(HISTORY_QUESTIONS) {
        let answer = answer!(terminal, &format!("  {question}?"));
        *flag = parse_yes_no(&answer);
    }
    let [recent_injury, smoking, allergies, overweight, hypertension] = flags;

    controller.update(WizardUpdate {
        patient_type: Some(patient_type),
        medical_history: Some(MedicalHistory {
            recent_injury,
            smoking,
            allergies,
            overweight,
            hypertension,
        }),
        ..Default::default()
    })?;
    Ok(Action::Advance)
}

async fn symptoms(controller: &WizardController, terminal: &mut Terminal) -> Result<Action> {
    let state = controller.state();
    println!("\nSelected: {}", list_or_none(&state.symptoms));
    println!("Available: {}", controller.available_symptoms("").join(", "));
    let answer = answer!(
        terminal,
        "Add symptoms (comma separated, -name removes, ?term searches, Enter continues):"
    );

    if answer.is_empty() {
        return Ok(Action::Advance);
    }
    if let Some(term) = answer.strip_prefix('?') {
        let found = controller.available_symptoms(term);
        println!("  Matches: {}", list_or_none(&found));
        return Ok(Action::Stay);
    }

    for edit in parse_symptom_edits(&answer) {
        let outcome = match edit {
            SymptomEdit::Add(name) => controller.add_symptom(&name),
            SymptomEdit::Remove(name) => controller.remove_symptom(&name),
        };
        if let Err(e) = outcome {
            rejected(e)?;
        }
    }
    Ok(Action::Stay)
}

async fn symptom_details(controller: &WizardController, terminal: &mut Terminal) -> Result<Action> {
    let state = controller.state();
    if !state.has_detail_forms() {
        println!("\nNo further questions for the selected symptoms.");
        answer!(terminal, "Press Enter to continue.");
        return Ok(Action::Advance);
    }
    println!("\nA few more questions (Enter to skip)");
    for symptom in &state.symptoms {
        let Some(form) = catalog::detail_form(symptom) else {
            continue;
        };
        println!("{}", form.symptom);
        for field in form.fields {
            let value = match field {
                DetailField::Choice { key, options } => {
                    let question = format!("  {key} ({}):", options.join("/"));
                    let answer = answer!(terminal, &question);
                    parse_choice(&answer, options)
                        .map(|option| DetailValue::Choice(option.to_string()))
                }
                DetailField::Flag { label, .. } => {
                    let answer = answer!(terminal, &format!("  {label}? [y/n]"));
                    parse_yes_no(&answer).map(DetailValue::Flag)
                }
            };
            if let Some(value) = value {
                if let Err(e) = controller.set_symptom_detail(symptom, field.key(), value) {
                    rejected(e)?;
                }
            }
        }
    }
    Ok(Action::Advance)
}

async fn care(controller: &WizardController, terminal: &mut Terminal) -> Result<Action> {
    println!("\nWhat kind of care are you looking for?\n{}", menu(catalog::CARE_TYPES));
    let answer = answer!(terminal, ">");
    let Some(care_type) = parse_choice(&answer, catalog::CARE_TYPES) else {
        return Ok(Action::Stay);
    };
    controller.update(WizardUpdate {
        care_type: Some(care_type.to_string()),
        ..Default::default()
    })?;
    println!("Analyzing your symptoms...");
    Ok(Action::Advance)
}

async fn results(
    controller: &WizardController,
    terminal: &mut Terminal,
    json: bool,
) -> Result<Action> {
    if let Some(payload) = controller.state().results {
        if json {
            println!("{}", serde_json::to_string_pretty(&payload)?);
        } else {
            println!("\n{}", render_report(&payload).markdown);
        }
    }
    answer!(terminal, "Type :restart to start over or :quit to exit.");
    Ok(Action::Stay)
}

fn list_or_none<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    items
        .iter()
        .map(|item| AsRef::<str>::as_ref(item))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn advance(controller: &WizardController) -> Result<()> {
    match controller.advance().await {
        Ok(Transition::Moved { from, to }) => debug!(from = %from, to = %to, "moved"),
        Ok(Transition::Stayed {
            reason: StayReason::Incomplete,
            ..
        }) => println!("  Please complete this step before continuing."),
        Ok(Transition::Stayed { .. }) => {}
        Ok(Transition::Discarded) => println!("  The previous analysis was discarded."),
        Err(WizardError::Analysis(e)) => {
            warn!(error = %e, "analysis failed");
            println!("  Failed to analyze symptoms ({e}). Please try again.");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn run(controller: &WizardController, terminal: &mut Terminal, json: bool) -> Result<()> {
    loop {
        let action = match controller.current_step() {
            Step::Welcome => welcome(terminal).await?,
            Step::Terms => terms(controller, terminal).await?,
            Step::UserType => user_type(controller, terminal).await?,
            Step::UserDetails => user_details(controller, terminal).await?,
            Step::Patient => patient(controller, terminal).await?,
            Step::Symptoms => symptoms(controller, terminal).await?,
            Step::SymptomDetails => symptom_details(controller, terminal).await?,
            Step::Care => care(controller, terminal).await?,
            Step::Results => results(controller, terminal, json).await?,
        };

        match action {
            Action::Advance => advance(controller).await?,
            Action::Stay => {}
            Action::Command(Command::Back) => {
                if let Transition::Stayed { .. } = controller.back()? {
                    println!("  Going back is not available here.");
                }
            }
            Action::Command(Command::Restart) => controller.restart(),
            Action::Command(Command::Quit) => return Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = Args::parse();
    let timeout = Duration::from_secs(args.timeout_secs);
    let requester = HttpAnalysisRequester::new(&args.server_url, timeout)?;
    debug!(endpoint = %requester.endpoint(), "analysis endpoint");

    let controller = WizardController::new(
        WizardConfig {
            variant: args.variant,
            analysis_timeout: timeout,
        },
        Arc::new(requester),
    );

    let mut terminal = Terminal::new();
    run(&controller, &mut terminal, args.json).await
}
