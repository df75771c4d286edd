use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use trainer_plans_app::{PlanService, Role, SessionContext};
use trainer_plans_client::config::Config;
use trainer_plans_client::generator::WebhookPlanGenerator;
use trainer_plans_client::http_client::RestPlanStore;
use trainer_plans_client::workout::Exercise;
use trainer_plans_client::{MealEdit, NormalizedPlan, PlanKind};

#[derive(Debug, Parser)]
#[command(name = "trainer-plans", about = "View and edit client diet and workout plans")]
struct Cli {
    /// Signed-in user id
    #[arg(long, env = "TRAINER_PLANS_USER_ID")]
    user_id: String,
    /// Trainer the session belongs to
    #[arg(long, env = "TRAINER_PLANS_TRAINER_ID")]
    trainer_id: String,
    /// Set when signed in as a client rather than the trainer
    #[arg(long, env = "TRAINER_PLANS_CLIENT_ID")]
    client_id: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Diet,
    Workout,
}

impl From<KindArg> for PlanKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Diet => PlanKind::Diet,
            KindArg::Workout => PlanKind::Workout,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a diet, one block per day or option
    ShowDiet {
        #[arg(long)]
        id: String,
        /// Day or option to list first
        #[arg(long)]
        select: Option<String>,
    },
    /// Replace one meal and save the recomputed diet
    EditMeal {
        #[arg(long)]
        diet_id: String,
        #[arg(long)]
        label: String,
        #[arg(long)]
        slot: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        ingredients: String,
        #[arg(long)]
        kcals: String,
        #[arg(long, default_value = "")]
        groups: String,
    },
    /// Print a workout routine
    ShowWorkout {
        #[arg(long)]
        id: String,
    },
    /// Replace one exercise and save the routine
    EditExercise {
        #[arg(long)]
        workout_id: String,
        #[arg(long)]
        day: usize,
        #[arg(long)]
        exercise: usize,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        prior_series: String,
        #[arg(long, default_value = "")]
        rest: String,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long, default_value = "")]
        first_set: String,
        #[arg(long, default_value = "")]
        second_set: String,
        #[arg(long, default_value = "")]
        third_set: String,
        #[arg(long, default_value = "")]
        rir: String,
    },
    /// Ask the trainer to revise a plan (client sessions only)
    RequestChange {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        plan_id: String,
        #[arg(long)]
        message: String,
    },
    /// Print the JSON schema of the meal edit form
    Schema,
}

fn print_diet(plan: &NormalizedPlan, selected: Option<&str>) {
    let Some(first) = plan.select(selected) else {
        println!("(no plan data)");
        return;
    };
    let ordered = plan
        .entries
        .iter()
        .filter(|e| e.label == first)
        .chain(plan.entries.iter().filter(|e| e.label != first));
    for entry in ordered {
        println!("== {} ==", entry.label);
        for meal in &entry.meals {
            println!(
                "  {:<9} {} ({} kcal) [{}]",
                meal.key, meal.slot.name, meal.slot.kcals, meal.slot.food_groups
            );
            if !meal.slot.ingredients.is_empty() {
                println!("            {}", meal.slot.ingredients);
            }
        }
        println!(
            "  total {} / target {} kcal, variance {}",
            entry.total_kcal, entry.target_kcal, entry.variance
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Configure logging from env var `TRAINER_PLANS_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("TRAINER_PLANS_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(format!("{log_env},hyper=warn,reqwest=warn"))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hyper=warn,reqwest=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::debug!(%log_env, "trainer-plans: log filter");

    let cli = Cli::parse();
    if let Command::Schema = cli.command {
        let schema = schemars::schema_for!(MealEdit);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = Config::from_env()?;
    let token = config
        .access_token
        .clone()
        .unwrap_or_else(|| SecretString::new(String::new().into()));
    let role = match cli.client_id {
        Some(client_id) => Role::Client {
            client_id,
            trainer_id: cli.trainer_id,
        },
        None => Role::Trainer {
            trainer_id: cli.trainer_id,
        },
    };
    let session = SessionContext::new(cli.user_id, role, token);
    let service = PlanService::new(
        Arc::new(RestPlanStore::from_config(&config)),
        Arc::new(WebhookPlanGenerator::from_config(&config)),
    );

    let outcome = match cli.command {
        Command::ShowDiet { id, select } => {
            service.load_diet(&session, &id).await.map(|diet| {
                if let Some(notice) = &diet.notice {
                    eprintln!("{notice}");
                }
                print_diet(diet.plan.visible(), select.as_deref());
            })
        }
        Command::EditMeal {
            diet_id,
            label,
            slot,
            name,
            ingredients,
            kcals,
            groups,
        } => match service.load_diet(&session, &diet_id).await {
            Ok(mut diet) => {
                let edit = MealEdit::new(name, ingredients, kcals, groups);
                service
                    .edit_meal(&session, &mut diet, &label, &slot, edit)
                    .await
                    .map(|()| print_diet(diet.plan.visible(), Some(label.as_str())))
            }
            Err(e) => Err(e),
        },
        Command::ShowWorkout { id } => service.load_workout(&session, &id).await.map(|w| {
            if let Some(notice) = &w.notice {
                eprintln!("{notice}");
            }
            for day in w.view().days {
                println!("== {} ==", day.day_name);
                for (i, ex) in day.exercises.iter().enumerate() {
                    println!(
                        "  {i}. {} | previas {} | descanso {} | {} / {} / {} | RIR {}",
                        ex.name, ex.prior_series, ex.rest, ex.first_set, ex.second_set, ex.third_set, ex.rir
                    );
                }
            }
        }),
        Command::EditExercise {
            workout_id,
            day,
            exercise,
            name,
            prior_series,
            rest,
            notes,
            first_set,
            second_set,
            third_set,
            rir,
        } => match service.load_workout(&session, &workout_id).await {
            Ok(mut loaded) => {
                let replacement = Exercise {
                    name,
                    prior_series,
                    rest,
                    notes,
                    first_set,
                    second_set,
                    third_set,
                    rir,
                    ..Exercise::default()
                };
                service
                    .edit_exercise(&session, &mut loaded, day, exercise, &replacement)
                    .await
                    .map(|()| println!("saved workout {}", loaded.record.id))
            }
            Err(e) => Err(e),
        },
        Command::RequestChange {
            kind,
            plan_id,
            message,
        } => service
            .request_change(&session, kind.into(), &plan_id, &message)
            .await
            .map(|r| println!("change request {} filed", r.id)),
        Command::Schema => Ok(()),
    };

    if let Err(e) = outcome {
        tracing::error!(kind = ?e.kind(), "{e}");
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}
