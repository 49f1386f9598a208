use std::path::{Path, PathBuf};

use clap::{
    error::{ContextKind, ContextValue, ErrorKind},
    Parser, Subcommand,
};
use gvt::{
    version_store::directory::DirectoryVersionStore, Config, Error, Outcome, Repository,
    VersionNumber,
};

#[derive(Parser, Debug)]
#[command(name = "gvt", about = "a minimal local version tracker")]
struct Arguments {
    #[arg(long, global = true, help = "run as if started in this directory")]
    cwd: Option<PathBuf>,
    #[arg(long, global = true, help = "enable debug logging")]
    debug: bool,
    #[clap(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(about = "initialize a repository in the working directory")]
    Init,
    #[clap(about = "start tracking a file in a new version")]
    Add {
        file: Option<PathBuf>,
        #[arg(short, long, help = "message to leave with this version")]
        message: Option<String>,
    },
    #[clap(about = "stop tracking a file as of a new version")]
    Detach {
        file: Option<PathBuf>,
        #[arg(short, long, help = "message to leave with this version")]
        message: Option<String>,
    },
    #[clap(about = "snapshot the latest contents of a tracked file")]
    Commit {
        file: Option<PathBuf>,
        #[arg(short, long, help = "message to leave with this version")]
        message: Option<String>,
    },
    #[clap(about = "restore the tracked files of a version")]
    Checkout {
        #[arg(allow_hyphen_values = true)]
        version: Option<String>,
    },
    #[clap(about = "show a version and its full message")]
    Version {
        #[arg(allow_hyphen_values = true)]
        version: Option<String>,
    },
    #[clap(about = "show one line per version, oldest first")]
    History {
        #[arg(long, allow_hyphen_values = true, help = "only show the last N versions")]
        last: Option<String>,
    },
    #[clap(about = "remove version directories left behind by an interrupted command")]
    Recover,
}

/// What the process reports before exiting. Code `0` goes to stdout, anything
/// else to stderr.
struct Exit {
    code: i32,
    message: String,
}

impl Exit {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn ok(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    fn finish(self) -> ! {
        if !self.message.is_empty() {
            if self.code == 0 {
                println!("{}", self.message);
            } else {
                eprintln!("{}", self.message);
            }
        }
        std::process::exit(self.code)
    }
}

fn not_initialized() -> Exit {
    Exit::new(
        -2,
        "Current directory is not initialized. Please use \"init\" command to initialize.",
    )
}

fn system_failure(err: Error) -> Exit {
    eprintln!("{}", err);
    Exit::new(-3, "Underlying system problem. See ERR for details.")
}

fn open(config: &Config) -> Result<Repository<DirectoryVersionStore>, Exit> {
    Repository::open(config).map_err(|err| match err {
        Error::NotInitialized => not_initialized(),
        err => system_failure(err),
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn parse_number(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn init(config: &Config) -> Exit {
    match Repository::init(config) {
        Ok(_) => Exit::ok("Current directory initialized successfully."),
        Err(Error::AlreadyInitialized) => {
            Exit::new(10, "Current directory is already initialized.")
        }
        Err(err) => system_failure(err),
    }
}

fn add(config: &Config, file: Option<PathBuf>, message: String) -> Result<Exit, Exit> {
    let file = file.ok_or_else(|| Exit::new(20, "Please specify file to add."))?;
    let mut repo = open(config)?;
    Ok(match repo.add_file(&file, &message) {
        Ok(Outcome::Created(_)) => {
            Exit::ok(format!("File {} added successfully.", file.display()))
        }
        Ok(_) => Exit::ok(format!("File already added. File: {}", file.display())),
        Err(Error::NotFound(_)) => Exit::new(21, format!("File not found. File: {}", file.display())),
        Err(err) => system_failure(err),
    })
}

fn detach(config: &Config, file: Option<PathBuf>, message: String) -> Result<Exit, Exit> {
    let file = file.ok_or_else(|| Exit::new(30, "Please specify file to detach."))?;
    let mut repo = open(config)?;
    let name = display_name(&file);
    Ok(match repo.detach_file(&file, &message) {
        Ok(Outcome::Created(_)) => Exit::ok(format!("File {} detached successfully.", name)),
        Ok(_) => Exit::ok(format!("File {} is not added to gvt.", name)),
        Err(err) => system_failure(err),
    })
}

fn commit(config: &Config, file: Option<PathBuf>, message: String) -> Result<Exit, Exit> {
    let file = file.ok_or_else(|| Exit::new(50, "Please specify file to commit."))?;
    let mut repo = open(config)?;
    let name = display_name(&file);
    Ok(match repo.commit_file(&file, &message) {
        Ok(Outcome::Created(_)) => {
            Exit::ok(format!("File {} committed successfully.", file.display()))
        }
        Ok(_) => Exit::ok(format!("File is not added to gvt. File: {}", name)),
        Err(Error::NotFound(_)) => Exit::new(51, format!("File not found. File: {}", file.display())),
        Err(err) => {
            eprintln!("{}", err);
            Exit::new(
                52,
                format!("File cannot be committed, see ERR for details. File: {}", name),
            )
        }
    })
}

fn checkout(config: &Config, version: Option<String>) -> Result<Exit, Exit> {
    let raw = version.unwrap_or_default();
    let number = parse_number(&raw)
        .ok_or_else(|| Exit::new(60, format!("Invalid version number: {}", raw)))?;
    let repo = open(config)?;
    let version = u32::try_from(number)
        .map(VersionNumber)
        .map_err(|_| Exit::new(40, format!("Invalid version number: {}", number)))?;
    Ok(match repo.checkout(version) {
        Ok(_) => Exit::ok(format!("Checkout successful for version: {}", version)),
        Err(Error::InvalidVersion(v)) => Exit::new(40, format!("Invalid version number: {}", v)),
        Err(err) => system_failure(err),
    })
}

fn version(config: &Config, version: Option<String>) -> Result<Exit, Exit> {
    let requested = match version {
        None => None,
        Some(raw) => match parse_number(&raw) {
            Some(-1) => None,
            Some(n) => Some(
                u32::try_from(n)
                    .map(VersionNumber)
                    .map_err(|_| Exit::new(60, format!("Invalid version number: {}.", n)))?,
            ),
            None => return Err(Exit::new(60, format!("Invalid version number: {}.", raw))),
        },
    };
    let repo = open(config)?;
    Ok(match repo.show_version(requested) {
        Ok(info) => Exit::ok(info.to_string()),
        Err(Error::InvalidVersion(v)) => Exit::new(60, format!("Invalid version number: {}.", v)),
        Err(err) => system_failure(err),
    })
}

fn history(config: &Config, last: Option<String>) -> Result<Exit, Exit> {
    let last = last.and_then(|raw| parse_number(&raw)).unwrap_or(0);
    let repo = open(config)?;
    // A negative window selects nothing.
    let Ok(last) = usize::try_from(last) else {
        return Ok(Exit::ok(""));
    };
    Ok(match repo.list_history(last) {
        Ok(entries) => Exit::ok(
            entries
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Err(err) => system_failure(err),
    })
}

fn recover(config: &Config) -> Result<Exit, Exit> {
    let mut repo = open(config)?;
    Ok(match repo.recover() {
        Ok(removed) if removed.is_empty() => Exit::ok("No orphaned versions."),
        Ok(removed) => Exit::ok(
            removed
                .iter()
                .map(|v| format!("Removed orphaned version {}", v))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Err(err) => system_failure(err),
    })
}

fn main() {
    let args = match Arguments::try_parse() {
        Ok(args) => args,
        Err(err) if err.kind() == ErrorKind::InvalidSubcommand => {
            let name = match err.get(ContextKind::InvalidSubcommand) {
                Some(ContextValue::String(name)) => name.clone(),
                _ => String::new(),
            };
            Exit::new(1, format!("Unknown command {}.", name)).finish()
        }
        Err(err) => err.exit(),
    };

    let filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let config = match Config::discover(args.cwd) {
        Ok(config) => config,
        Err(err) => system_failure(err.into()).finish(),
    };
    log::debug!("working directory {:?}", config.work_dir());

    use Command::*;
    let exit = match args.cmd {
        None => Exit::new(1, "Please specify command."),
        Some(Init) => init(&config),
        Some(Add { file, message }) => add(&config, file, message.unwrap_or_default())
            .unwrap_or_else(|exit| exit),
        Some(Detach { file, message }) => detach(&config, file, message.unwrap_or_default())
            .unwrap_or_else(|exit| exit),
        Some(Commit { file, message }) => commit(&config, file, message.unwrap_or_default())
            .unwrap_or_else(|exit| exit),
        Some(Checkout { version: v }) => checkout(&config, v).unwrap_or_else(|exit| exit),
        Some(Version { version: v }) => version(&config, v).unwrap_or_else(|exit| exit),
        Some(History { last }) => history(&config, last).unwrap_or_else(|exit| exit),
        Some(Recover) => recover(&config).unwrap_or_else(|exit| exit),
    };
    exit.finish()
}
