use std::{env, fmt::Display, str::FromStr};

use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, SetLoggerError};

/// External crates only need to log warnings and errors
const EXTERNAL_LEVEL: LevelFilter = LevelFilter::Warn;
const DEFAULT_LEVEL: LevelFilter = LevelFilter::Info;

/// Installs the logger. The level of tavern's own records can be set with `TAVERN_LOG`.
pub fn init_logger() -> Result<(), SetLoggerError> {
    let local_level = env::var("TAVERN_LOG")
        .ok()
        .and_then(|level| LevelFilter::from_str(&level).ok())
        .unwrap_or(DEFAULT_LEVEL);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{} {} {:^8} {}",
                now.format("%H:%M:%S%.3f").to_string().bright_black(),
                level_to_string(&record.level()),
                target,
                message
            ))
        })
        .filter(move |meta| {
            let target = Target::from_str(meta.target());

            if target.is_local() {
                meta.level() <= local_level
            } else {
                meta.level() <= EXTERNAL_LEVEL
            }
        })
        .chain(std::io::stdout())
        .apply()
}

/// Where a record came from, by crate
enum Target {
    External(String),
    Server,
    Collab,
    Core,
    Tavern,
}

impl Target {
    fn from_str(path: &str) -> Self {
        match path.split("::").next().unwrap_or_default() {
            "tavern_core" => Self::Core,
            "tavern_server" => Self::Server,
            "tavern_collab" => Self::Collab,
            "tavern" => Self::Tavern,
            other => Self::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        !matches!(self, Self::External(_))
    }

    fn label(&self) -> ColoredString {
        match self {
            Self::External(name) => name.as_str().dimmed(),
            Self::Server => "SERVER".bright_green(),
            Self::Collab => "COLLAB".bright_purple(),
            Self::Core => "CORE".blue(),
            Self::Tavern => "TAVERN".bright_yellow(),
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.label(), f)
    }
}

fn level_to_string(level: &Level) -> String {
    let badge = match level {
        Level::Error => " ERR ".black().on_red().bold(),
        Level::Warn => " WRN ".black().on_yellow().bold(),
        Level::Info => " INF ".black().on_blue().bold(),
        Level::Debug => " DBG ".white().on_black(),
        Level::Trace => " TRC ".normal(),
    };

    badge.to_string()
}
