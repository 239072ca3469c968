use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{CategoryFilter, TopicFilter, TopicId, UserId};
use services::{
    AppConfig, AppServices, CatalogService, Clock, ProgressStore, QuizSession, RemoteStatus,
    RemoteTarget, RemoteWrite, SessionState, TopicAction,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

const HOME_PREVIEW: usize = 3;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidTopic { raw: String },
    InvalidUser { raw: String },
    InvalidRemote { raw: String, message: String },
    MissingTopic,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidTopic { raw } => write!(f, "invalid --topic value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidRemote { raw, message } => {
                write!(f, "invalid --remote value {raw}: {message}")
            }
            ArgsError::MissingTopic => write!(f, "reset requires --topic <id>"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_topic(raw: String) -> Result<TopicId, ArgsError> {
    TopicId::new(raw.clone()).map_err(|_| ArgsError::InvalidTopic { raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz [global flags] summary");
    eprintln!("  quiz [global flags] topics [--search <text>] [--category <name|all>]");
    eprintln!("  quiz [global flags] quiz   [--topic <id>] [--retake]");
    eprintln!("  quiz [global flags] reset  --topic <id>");
    eprintln!();
    eprintln!("Global flags:");
    eprintln!("  --content <dir>   question content directory (default: data)");
    eprintln!("  --cache <file>    local progress cache (default: quiz-cache.json)");
    eprintln!("  --remote <url>    sqlite:<path> or http(s) realtime database URL");
    eprintln!("  --user <id>       signed-in user whose progress is synced");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_CONTENT_DIR, QUIZ_CACHE_PATH, QUIZ_REMOTE_URL, QUIZ_REMOTE_TOKEN,");
    eprintln!("  QUIZ_USER_ID, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Summary,
    Topics(TopicFilter),
    Quiz { topic: Option<TopicId>, retake: bool },
    Reset { topic: TopicId },
}

struct Args {
    config: AppConfig,
    command: Command,
}

impl Args {
    fn parse(
        mut config: AppConfig,
        args: impl IntoIterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let mut args = args.into_iter();
        let mut command_name: Option<String> = None;
        let mut search = String::new();
        let mut category = CategoryFilter::All;
        let mut topic = None;
        let mut retake = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--content" => {
                    config.content_dir = PathBuf::from(require_value(&mut args, "--content")?);
                }
                "--cache" => {
                    config.cache_path = PathBuf::from(require_value(&mut args, "--cache")?);
                }
                "--remote" => {
                    let raw = require_value(&mut args, "--remote")?;
                    let token = match &config.remote {
                        Some(RemoteTarget::Rest { auth_token, .. }) => auth_token.clone(),
                        _ => None,
                    };
                    let target = RemoteTarget::parse(&raw, token).map_err(|e| {
                        ArgsError::InvalidRemote {
                            raw: raw.clone(),
                            message: e.to_string(),
                        }
                    })?;
                    config.remote = Some(target);
                }
                "--user" => {
                    let raw = require_value(&mut args, "--user")?;
                    let user =
                        UserId::new(raw.clone()).map_err(|_| ArgsError::InvalidUser { raw })?;
                    config.user = Some(user);
                }
                "--search" => search = require_value(&mut args, "--search")?,
                "--category" => {
                    category = CategoryFilter::parse(&require_value(&mut args, "--category")?);
                }
                "--topic" => topic = Some(parse_topic(require_value(&mut args, "--topic")?)?),
                "--retake" => retake = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if command_name.is_none() && !arg.starts_with("--") => {
                    command_name = Some(arg);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match command_name.as_deref() {
            None | Some("summary") => Command::Summary,
            Some("topics") => Command::Topics(TopicFilter { search, category }),
            Some("quiz") => Command::Quiz { topic, retake },
            Some("reset") => Command::Reset {
                topic: topic.ok_or(ArgsError::MissingTopic)?,
            },
            Some(other) => return Err(ArgsError::UnknownArg(other.to_owned())),
        };

        Ok(Self { config, command })
    }
}

fn report_remote(status: &RemoteStatus) {
    match status {
        RemoteStatus::Skipped => {}
        RemoteStatus::Merged { adopted, rejected } => {
            if !adopted.is_empty() {
                println!("Synced {} topic(s) from your other devices.", adopted.len());
            }
            if *rejected > 0 {
                println!("Skipped {rejected} unreadable saved result(s).");
            }
        }
        RemoteStatus::Failed(_) => {
            println!("Could not reach the server; showing progress saved on this device.");
        }
    }
}

fn report_write(write: RemoteWrite) {
    if write == RemoteWrite::Failed {
        println!("Saved on this device only; the server could not be reached.");
    }
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

fn show_summary(store: &ProgressStore) {
    let stats = store.overall_stats();
    println!("Topics:              {}", stats.total_topics);
    println!("Completed topics:    {}", stats.completed_topics);
    println!(
        "Answered questions:  {}/{}",
        stats.completed_questions, stats.total_questions
    );
    println!(
        "Score:               {}/{}",
        stats.total_score, stats.total_possible_score
    );
    println!("Average accuracy:    {}%", stats.average_accuracy);
    println!();
    println!("Top topics:");
    for ranked in store.top_topics(HOME_PREVIEW) {
        println!(
            "  {:<24} {:>3}%  ({}/{})",
            ranked.topic.title(),
            ranked.progress.percentage,
            ranked.progress.score,
            ranked.progress.total_questions
        );
    }
}

fn show_topics(store: &ProgressStore, filter: &TopicFilter) {
    let catalog = store.catalog();
    let categories = catalog.categories();
    if !categories.is_empty() {
        println!("Categories: all, {}", categories.join(", "));
    }

    let cards = CatalogService::topic_cards(catalog, store.progress(), filter);
    if cards.is_empty() {
        println!("No topics match.");
        return;
    }
    for card in cards {
        let action = match card.action {
            TopicAction::Start => "start",
            TopicAction::ContinueOrRestart => "continue / restart",
        };
        println!(
            "{:<16} {:<24} {:>3}%  [{action}]",
            card.topic.id().as_str(),
            card.topic.title(),
            card.progress.percentage
        );
        if !card.topic.description().is_empty() {
            println!("{:<16} {}", "", card.topic.description());
        }
    }
}

fn show_question(session: &QuizSession) {
    let Some(question) = session.current_question() else {
        return;
    };
    let progress = session.progress();
    println!();
    println!(
        "Question {}/{} ({}%)",
        progress.position, progress.total, progress.percent
    );
    println!("{}", question.prompt());
    for (index, option) in question.options().iter().enumerate() {
        let marker = if session.current_answer() == u32::try_from(index).ok() {
            '*'
        } else {
            ' '
        };
        println!(" {marker} {}) {option}", index + 1);
    }

    let mut controls = vec!["<number> answer"];
    if progress.can_go_back {
        controls.push("p previous");
    }
    if progress.can_advance {
        controls.push("n next");
    }
    if progress.can_submit {
        controls.push("s submit");
    }
    controls.push("q save and quit");
    println!("[{}]", controls.join(", "));
}

async fn run_quiz(
    services: &AppServices,
    store: &mut ProgressStore,
    topic: Option<TopicId>,
    retake: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(topic) = &topic {
        services.catalog().select_topic(topic);
    }
    let mut session = services.quiz().open(topic, retake, store).await;
    if let SessionState::LoadFailed(message) = session.state() {
        println!("{message}");
        return Ok(());
    }
    println!("{}", session.title());

    let mut input: Lines<BufReader<Stdin>> = BufReader::new(tokio::io::stdin()).lines();
    loop {
        show_question(&session);
        let Some(line) = input.next_line().await? else {
            break;
        };
        match line.trim() {
            "n" => {
                if session.progress().can_advance {
                    session.next();
                }
            }
            "p" => {
                session.previous();
            }
            "s" if session.progress().can_submit => {
                let (result, sync) = session.submit(store)?;
                println!();
                println!(
                    "Score: {}/{} ({}%)  correct {}, wrong {}",
                    result.score, result.total, result.percentage, result.correct, result.wrong
                );
                report_write(sync.settled().await);
                return Ok(());
            }
            "q" => break,
            raw => match raw.parse::<u32>() {
                Ok(choice) if choice > 0 => {
                    if let Err(err) = session.select_answer(choice - 1) {
                        println!("{err}");
                    }
                }
                _ => println!("Unrecognised input: {raw}"),
            },
        }
    }

    if let Some(sync) = session.exit(store)? {
        println!("Progress saved.");
        report_write(sync.settled().await);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let parsed = Args::parse(config, std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    tracing::debug!(command = ?parsed.command, user = ?parsed.config.user, "starting");

    let services = AppServices::from_config(&parsed.config, Clock::default_clock()).await;
    let (mut store, outcome) = match services.progress_store().await {
        Ok(loaded) => loaded,
        Err(err) => {
            println!("{}", err.user_message());
            return Err(err.into());
        }
    };
    report_remote(&outcome.remote);

    match parsed.command {
        Command::Summary => show_summary(&store),
        Command::Topics(filter) => show_topics(&store, &filter),
        Command::Quiz { topic, retake } => run_quiz(&services, &mut store, topic, retake).await?,
        Command::Reset { topic } => {
            report_write(store.clear_attempt(&topic).settled().await);
            println!("Progress for {topic} cleared.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "quiz=info,services=info,storage=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(AppConfig::default(), args.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn no_command_shows_summary() {
        assert_eq!(parse(&[]).unwrap().command, Command::Summary);
    }

    #[test]
    fn global_flags_mix_with_command_flags() {
        let args = parse(&[
            "--cache",
            "/tmp/c.json",
            "quiz",
            "--topic",
            "fractions",
            "--retake",
            "--user",
            "u1",
        ])
        .unwrap();
        assert_eq!(args.config.cache_path, PathBuf::from("/tmp/c.json"));
        assert_eq!(args.config.user.unwrap().as_str(), "u1");
        assert_eq!(
            args.command,
            Command::Quiz {
                topic: Some(TopicId::new("fractions").unwrap()),
                retake: true,
            }
        );
    }

    #[test]
    fn topics_filter_and_reset_requirements() {
        let args = parse(&["topics", "--search", "frac", "--category", "all"]).unwrap();
        assert_eq!(
            args.command,
            Command::Topics(TopicFilter {
                search: "frac".into(),
                category: CategoryFilter::All,
            })
        );
        assert!(matches!(parse(&["reset"]), Err(ArgsError::MissingTopic)));
        assert!(matches!(
            parse(&["--remote", "ftp://x"]),
            Err(ArgsError::InvalidRemote { .. })
        ));
        assert!(matches!(parse(&["quiz", "extra"]), Err(ArgsError::UnknownArg(_))));
    }
}
