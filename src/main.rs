use anyhow::Result;
use std::path::PathBuf;

use wildlens::app::{App, View};
use wildlens::config::Config;
use wildlens::journal::ChatRole;
use wildlens::logging;
use wildlens::scout::HOPE_SPOTLIGHT_THRESHOLD;

enum Command {
    Log { file: PathBuf, favorite: bool },
    Journal,
    Show { entry_id: String },
    Remove { entry_id: String },
    Chat { entry_id: String, message: String },
    Complete { entry_id: String, title: String },
    Profile,
    Hub,
    ClearJournal,
    ResetProfile,
}

struct CliArgs {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut positional: Vec<String> = Vec::new();
    let mut favorite = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("wildlens {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--favorite" | "-f" => favorite = true,
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let command = match positional.first().map(String::as_str) {
        Some("log") => Command::Log {
            file: PathBuf::from(expect_arg(&positional, 1, "log <file>")),
            favorite,
        },
        Some("journal") => Command::Journal,
        Some("show") => Command::Show {
            entry_id: expect_arg(&positional, 1, "show <entry-id>"),
        },
        Some("remove") => Command::Remove {
            entry_id: expect_arg(&positional, 1, "remove <entry-id>"),
        },
        Some("chat") => Command::Chat {
            entry_id: expect_arg(&positional, 1, "chat <entry-id> <message>"),
            message: expect_arg(&positional, 2, "chat <entry-id> <message>"),
        },
        Some("complete") => Command::Complete {
            entry_id: expect_arg(&positional, 1, "complete <entry-id> <mission-title>"),
            title: expect_arg(&positional, 2, "complete <entry-id> <mission-title>"),
        },
        Some("profile") => Command::Profile,
        Some("hub") => Command::Hub,
        Some("clear-journal") => Command::ClearJournal,
        Some("reset-profile") => Command::ResetProfile,
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
        None => {
            print_help();
            std::process::exit(1);
        }
    };

    CliArgs {
        config_path,
        command,
    }
}

fn expect_arg(positional: &[String], index: usize, usage: &str) -> String {
    match positional.get(index) {
        Some(value) => value.clone(),
        None => {
            eprintln!("Usage: wildlens {}", usage);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!("wildlens - AI-assisted nature journal");
    println!();
    println!("Usage: wildlens [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  log <file>                    Analyze a media file and log the sighting");
    println!("  journal                       List journal entries, newest first");
    println!("  show <entry-id>               Show a full sighting report");
    println!("  remove <entry-id>             Remove an entry from the journal");
    println!("  chat <entry-id> <message>     Talk with a logged subject");
    println!("  complete <entry-id> <title>   Complete a suggested field mission");
    println!("  profile                       Show the scout profile");
    println!("  hub                           Global impact summary");
    println!("  clear-journal                 Clear the journal and reset progress");
    println!("  reset-profile                 Reset the scout profile only");
    println!();
    println!("Options:");
    println!("  -f, --favorite        Mark the logged sighting as a favorite (with log)");
    println!("  -c, --config <path>   Use an alternate config file");
    println!("  -h, --help            Show this help");
    println!("  -V, --version         Show version");
}

/// Print any notifications the last operation armed.
fn drain_notifications(app: &mut App) {
    if let Some(rank) = app.take_rank_up() {
        println!();
        println!("*** RANK UP! You are now a {}. ***", rank.title());
        app.acknowledge_rank_up();
    }
    if let Some(spotlight) = app.take_hope_spotlight() {
        println!();
        println!("*** Hope Spotlight unlocked: {} ***", spotlight.subject_name);
        if let Some(story) = spotlight.story {
            println!("{}", story);
        }
        app.acknowledge_hope_spotlight();
    }
}

fn print_profile(app: &App) {
    let profile = app.engine.profile();
    println!("Rank: {}", profile.rank.title());
    match profile.rank.next_threshold() {
        Some(next) => println!("XP:   {} ({} to next rank)", profile.xp, next - profile.xp),
        None => println!("XP:   {}", profile.xp),
    }
    println!(
        "Endangered sightings: {} ({} to next Hope Spotlight)",
        profile.endangered_sightings_count,
        HOPE_SPOTLIGHT_THRESHOLD
            - profile.endangered_sightings_count % HOPE_SPOTLIGHT_THRESHOLD
    );
    println!("Hope Spotlights unlocked: {}", profile.hope_spotlights_unlocked);
    if !profile.completed_missions.is_empty() {
        println!("Completed missions:");
        for title in &profile.completed_missions {
            println!("  - {}", title);
        }
    }
}

fn run(mut app: App, command: Command) -> Result<()> {
    match command {
        Command::Log { file, favorite } => match app.submit_media(&file, favorite) {
            Ok(outcome) => {
                println!(
                    "Logged {} ({} XP){}",
                    outcome.subject_name,
                    outcome.xp_awarded,
                    if outcome.endangered {
                        " - an endangered species!"
                    } else {
                        ""
                    }
                );
                println!("Entry id: {}", outcome.entry_id);
                drain_notifications(&mut app);
            }
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },
        Command::Journal => {
            if app.journal.entries().is_empty() {
                println!("The journal is empty. Log your first sighting!");
            }
            for entry in app.journal.entries() {
                println!(
                    "{}  {}  {} [{}]{}",
                    entry.id,
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.analysis.subject_name,
                    entry.analysis.conservation_status.label(),
                    if entry.is_favorite { " *" } else { "" }
                );
            }
        }
        Command::Show { entry_id } => {
            let entry = app
                .journal
                .get(&entry_id)
                .ok_or_else(|| anyhow::anyhow!("No journal entry with id {}", entry_id))?;
            println!("{}", entry.analysis.subject_name);
            println!("Status:    {}", entry.analysis.conservation_status.label());
            println!("Trend:     {:?}", entry.analysis.population_trend);
            println!("Location:  {}", entry.analysis.estimated_location);
            println!("Ecosystem: {}", entry.analysis.ecosystem);
            if !entry.analysis.primary_threats.is_empty() {
                println!("Threats:   {}", entry.analysis.primary_threats.join(", "));
            }
            println!();
            println!("{}", entry.analysis.description);
            if !entry.analysis.suggested_missions.is_empty() {
                println!();
                println!("Field missions:");
                for mission in &entry.analysis.suggested_missions {
                    let done = app.engine.mission_completed(&mission.title);
                    println!(
                        "  [{}] {} {} ({} XP) - {}",
                        if done { "x" } else { " " },
                        mission.emoji,
                        mission.title,
                        mission.xp,
                        mission.description
                    );
                }
            }
            if !entry.chat_history.is_empty() {
                println!();
                println!("Chat:");
                for turn in &entry.chat_history {
                    let speaker = match turn.role {
                        ChatRole::User => "You",
                        ChatRole::Agent => entry.analysis.subject_name.as_str(),
                    };
                    println!("  {}: {}", speaker, turn.text);
                }
            }
        }
        Command::Remove { entry_id } => {
            app.journal.remove_entry(&entry_id);
            println!("Removed {}", entry_id);
        }
        Command::Chat { entry_id, message } => {
            let reply = app.chat(&entry_id, &message)?;
            println!("{}", reply);
        }
        Command::Complete { entry_id, title } => {
            if app.complete_mission(&entry_id, &title)? {
                println!("Mission complete: {}", title);
                drain_notifications(&mut app);
            } else {
                println!("Mission \"{}\" was already completed.", title);
            }
        }
        Command::Profile => print_profile(&app),
        Command::Hub => {
            let entries = app.journal.entries();
            println!("Sightings logged: {}", entries.len());
            println!("Endangered sightings: {}", app.journal.endangered_count());
            let ecosystems: std::collections::BTreeSet<&str> = entries
                .iter()
                .map(|e| e.analysis.ecosystem.as_str())
                .filter(|e| !e.is_empty())
                .collect();
            if !ecosystems.is_empty() {
                println!("Ecosystems visited:");
                for ecosystem in ecosystems {
                    println!("  - {}", ecosystem);
                }
            }
            app.set_view(View::Hub);
        }
        Command::ClearJournal => {
            app.clear_journal();
            println!("Journal cleared and profile reset.");
        }
        Command::ResetProfile => {
            app.reset_profile();
            println!("Profile reset.");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = parse_args();

    logging::init(None)?;

    let config = match &cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let app = App::new(config)?;
    // The check-in greeting belongs to the capture flow, not to read-only
    // commands.
    if matches!(cli.command, Command::Log { .. }) {
        if let Some(message) = app.check_in() {
            println!("{}", message);
            println!();
        }
    }

    run(app, cli.command)
}
