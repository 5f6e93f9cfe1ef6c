//! studytrack CLI — grade quizzes and track study progress from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use studytrack_core::model::{KnowledgeLevel, LearningStyle};

mod commands;

#[derive(Parser)]
#[command(
    name = "studytrack",
    version,
    about = "Quiz grading, spaced repetition, and study streaks"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a batch of quiz responses and record the session
    Grade {
        /// Student id
        #[arg(long)]
        student: String,

        /// Topic the quiz covers
        #[arg(long)]
        topic: String,

        /// JSON file with the responses
        #[arg(long)]
        responses: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print a student's full profile as JSON
    Profile {
        /// Student id
        #[arg(long)]
        student: String,
    },

    /// Review one item and reschedule it
    Review {
        /// Student id
        #[arg(long)]
        student: String,

        /// Item to review (usually a topic)
        #[arg(long)]
        item: String,

        /// Recall quality, 0 (blackout) to 5 (perfect)
        #[arg(long, allow_negative_numbers = true)]
        quality: i64,
    },

    /// List items due for review today
    Due {
        /// Student id
        #[arg(long)]
        student: String,
    },

    /// Show mastery and next steps for a topic
    Progress {
        /// Student id
        #[arg(long)]
        student: String,

        /// Topic to summarize
        #[arg(long)]
        topic: String,
    },

    /// Set the knowledge level for a subject
    Level {
        /// Student id
        #[arg(long)]
        student: String,

        /// Subject name
        #[arg(long)]
        subject: String,

        /// beginner, intermediate, or advanced
        #[arg(long)]
        level: KnowledgeLevel,

        /// Learning style: visual, verbal, or practical
        #[arg(long)]
        style: Option<LearningStyle>,
    },

    /// Mark a topic as completed
    Complete {
        /// Student id
        #[arg(long)]
        student: String,

        /// Topic name
        #[arg(long)]
        topic: String,
    },

    /// Log study time
    Study {
        /// Student id
        #[arg(long)]
        student: String,

        /// Minutes studied; negative values count as zero
        #[arg(long, allow_negative_numbers = true)]
        minutes: i64,
    },

    /// Create starter config and example quiz
    Init,
}

#[tokio::main]
async fn main() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "studytrack=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        command => run(command, cli.config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(command: Commands, config: Option<PathBuf>) -> anyhow::Result<()> {
    let engine = commands::build_engine(config.as_deref())?;

    match command {
        Commands::Grade {
            student,
            topic,
            responses,
            format,
        } => commands::grade::execute(&engine, &student, &topic, &responses, &format).await,
        Commands::Profile { student } => commands::profile::execute(&engine, &student).await,
        Commands::Review {
            student,
            item,
            quality,
        } => commands::review::execute(&engine, &student, &item, quality).await,
        Commands::Due { student } => commands::due::execute(&engine, &student).await,
        Commands::Progress { student, topic } => {
            commands::progress::execute(&engine, &student, &topic).await
        }
        Commands::Level {
            student,
            subject,
            level,
            style,
        } => commands::level::execute(&engine, &student, &subject, level, style).await,
        Commands::Complete { student, topic } => {
            commands::complete::execute(&engine, &student, &topic).await
        }
        Commands::Study { student, minutes } => {
            commands::study::execute(&engine, &student, minutes).await
        }
        Commands::Init => commands::init::execute(),
    }
}
