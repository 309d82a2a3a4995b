use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveTime};
use serde::Serialize;
use services::{AppServices, ProgressError, ProgressService};
use speech_core::model::{ChapterNumber, DoctorId, WordId};
use tracing_subscriber::EnvFilter;

/// Exit status when the patient, chapter or word does not resolve.
const EXIT_NOT_FOUND: i32 = 3;
const EXIT_FAILURE: i32 = 2;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    MissingDoctor,
    MissingPatient,
    WordWithoutChapter,
    ConflictingModes { first: &'static str, second: &'static str },
    MissingOption { flag: &'static str, mode: &'static str },
    UnexpectedOption { flag: &'static str },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingDoctor => write!(f, "--doctor (or SPEECH_DOCTOR_ID) is required"),
            ArgsError::MissingPatient => write!(f, "--patient is required for this report"),
            ArgsError::WordWithoutChapter => write!(f, "--word requires --chapter"),
            ArgsError::ConflictingModes { first, second } => {
                write!(f, "{first} cannot be combined with {second}")
            }
            ArgsError::MissingOption { flag, mode } => write!(f, "{mode} requires {flag}"),
            ArgsError::UnexpectedOption { flag } => {
                write!(f, "{flag} only applies to --record-trial or --record-session")
            }
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

fn parse_value<T: FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    let parsed = raw.trim().parse();
    parsed.map_err(|_| ArgsError::InvalidValue { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  speech-report --doctor <id> --patient <code>                      # dashboard");
    eprintln!("  speech-report --doctor <id> --patient <code> --chapter <n>        # one chapter");
    eprintln!("  speech-report --doctor <id> --patient <code> --chapter <n> --word <text>");
    eprintln!("  speech-report --doctor <id> --patient <code> --graph");
    eprintln!("  speech-report --doctor <id> --patient <code> --sessions");
    eprintln!("  speech-report --doctor <id> --patient <code> --trials             # raw trial list");
    eprintln!("  speech-report --chapter <n>                                        # word list");
    eprintln!();
    eprintln!("Recording:");
    eprintln!("  speech-report --doctor <id> --patient <code> --record-trial <word_id>");
    eprintln!("                --trial-number <n> --accuracy <pct> [--date <YYYY-MM-DD>] [--time <HH:MM:SS>]");
    eprintln!("  speech-report --doctor <id> --patient <code> --record-session");
    eprintln!("                --duration <text> --score <pct> [--date <YYYY-MM-DD>]");
    eprintln!("  --date and --time default to the local clock.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>   default sqlite:speech.sqlite3");
    eprintln!("  --pretty            indent JSON output");
    eprintln!("  --verbose           debug logging");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SPEECH_DB_URL, SPEECH_DOCTOR_ID, SPEECH_LOG");
}

#[derive(Debug, Clone, PartialEq)]
enum Report {
    Summary,
    Chapter(ChapterNumber),
    Word {
        chapter: ChapterNumber,
        word: String,
    },
    ChapterWords(ChapterNumber),
    Graph,
    Sessions,
    Trials,
    RecordTrial {
        word_id: WordId,
        trial_number: u32,
        accuracy: f64,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    },
    RecordSession {
        duration: String,
        score: f64,
        date: Option<NaiveDate>,
    },
}

/// Flags that pick what the binary does; at most one may be given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Chapter(ChapterNumber),
    Graph,
    Sessions,
    Trials,
    RecordTrial(WordId),
    RecordSession,
}

impl Mode {
    fn flag(self) -> &'static str {
        match self {
            Mode::Chapter(_) => "--chapter",
            Mode::Graph => "--graph",
            Mode::Sessions => "--sessions",
            Mode::Trials => "--trials",
            Mode::RecordTrial(_) => "--record-trial",
            Mode::RecordSession => "--record-session",
        }
    }
}

fn select_mode(current: &mut Option<Mode>, next: Mode) -> Result<(), ArgsError> {
    match *current {
        Some(first) if first != next => Err(ArgsError::ConflictingModes {
            first: first.flag(),
            second: next.flag(),
        }),
        _ => {
            *current = Some(next);
            Ok(())
        }
    }
}

/// Values only meaningful to the record modes.
#[derive(Default)]
struct RecordOptions {
    trial_number: Option<u32>,
    accuracy: Option<f64>,
    duration: Option<String>,
    score: Option<f64>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
}

impl RecordOptions {
    fn trial_only(&self) -> Option<&'static str> {
        if self.trial_number.is_some() {
            Some("--trial-number")
        } else if self.accuracy.is_some() {
            Some("--accuracy")
        } else if self.time.is_some() {
            Some("--time")
        } else {
            None
        }
    }

    fn session_only(&self) -> Option<&'static str> {
        if self.duration.is_some() {
            Some("--duration")
        } else if self.score.is_some() {
            Some("--score")
        } else {
            None
        }
    }

    fn reject_all(&self) -> Result<(), ArgsError> {
        let stray = self
            .trial_only()
            .or_else(|| self.session_only())
            .or(self.date.map(|_| "--date"));
        match stray {
            Some(flag) => Err(ArgsError::UnexpectedOption { flag }),
            None => Ok(()),
        }
    }
}

struct Args {
    db_url: String,
    doctor_id: Option<DoctorId>,
    patient_code: Option<String>,
    report: Report,
    pretty: bool,
    verbose: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("SPEECH_DB_URL").ok().map_or_else(
            || normalize_sqlite_url("sqlite:speech.sqlite3".into()),
            normalize_sqlite_url,
        );
        let mut doctor_id = std::env::var("SPEECH_DOCTOR_ID")
            .ok()
            .and_then(|value| value.parse::<DoctorId>().ok());
        let mut patient_code = None;
        let mut mode = None;
        let mut word = None;
        let mut record = RecordOptions::default();
        let mut pretty = false;
        let mut verbose = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--doctor" => doctor_id = Some(parse_value(args, "--doctor")?),
                "--patient" => patient_code = Some(require_value(args, "--patient")?),
                "--chapter" => select_mode(&mut mode, Mode::Chapter(parse_value(args, "--chapter")?))?,
                "--word" => word = Some(require_value(args, "--word")?),
                "--graph" => select_mode(&mut mode, Mode::Graph)?,
                "--sessions" => select_mode(&mut mode, Mode::Sessions)?,
                "--trials" => select_mode(&mut mode, Mode::Trials)?,
                "--record-trial" => {
                    let word_id = parse_value(args, "--record-trial")?;
                    select_mode(&mut mode, Mode::RecordTrial(word_id))?;
                }
                "--record-session" => select_mode(&mut mode, Mode::RecordSession)?,
                "--trial-number" => record.trial_number = Some(parse_value(args, "--trial-number")?),
                "--accuracy" => record.accuracy = Some(parse_value(args, "--accuracy")?),
                "--duration" => record.duration = Some(require_value(args, "--duration")?),
                "--score" => record.score = Some(parse_value(args, "--score")?),
                "--date" => record.date = Some(parse_value(args, "--date")?),
                "--time" => record.time = Some(parse_value(args, "--time")?),
                "--pretty" => pretty = true,
                "--verbose" | "-v" => verbose = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if word.is_some() && !matches!(mode, Some(Mode::Chapter(_))) {
            return Err(ArgsError::WordWithoutChapter);
        }

        let report = match mode {
            Some(Mode::RecordTrial(word_id)) => {
                if let Some(flag) = record.session_only() {
                    return Err(ArgsError::UnexpectedOption { flag });
                }
                Report::RecordTrial {
                    word_id,
                    trial_number: record.trial_number.ok_or(ArgsError::MissingOption {
                        flag: "--trial-number",
                        mode: "--record-trial",
                    })?,
                    accuracy: record.accuracy.ok_or(ArgsError::MissingOption {
                        flag: "--accuracy",
                        mode: "--record-trial",
                    })?,
                    date: record.date,
                    time: record.time,
                }
            }
            Some(Mode::RecordSession) => {
                if let Some(flag) = record.trial_only() {
                    return Err(ArgsError::UnexpectedOption { flag });
                }
                Report::RecordSession {
                    duration: record.duration.ok_or(ArgsError::MissingOption {
                        flag: "--duration",
                        mode: "--record-session",
                    })?,
                    score: record.score.ok_or(ArgsError::MissingOption {
                        flag: "--score",
                        mode: "--record-session",
                    })?,
                    date: record.date,
                }
            }
            other => {
                record.reject_all()?;
                match (other, word) {
                    (Some(Mode::Chapter(chapter)), Some(word)) => Report::Word { chapter, word },
                    (Some(Mode::Chapter(chapter)), None) if patient_code.is_some() => {
                        Report::Chapter(chapter)
                    }
                    (Some(Mode::Chapter(chapter)), None) => Report::ChapterWords(chapter),
                    (Some(Mode::Graph), _) => Report::Graph,
                    (Some(Mode::Sessions), _) => Report::Sessions,
                    (Some(Mode::Trials), _) => Report::Trials,
                    _ => Report::Summary,
                }
            }
        };

        Ok(Self {
            db_url,
            doctor_id,
            patient_code,
            report,
            pretty,
            verbose,
        })
    }

    fn patient(&self) -> Result<(DoctorId, &str), ArgsError> {
        let doctor = self.doctor_id.ok_or(ArgsError::MissingDoctor)?;
        let code = self
            .patient_code
            .as_deref()
            .ok_or(ArgsError::MissingPatient)?;
        Ok((doctor, code))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SPEECH_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), serde_json::Error> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

async fn render(
    progress: &ProgressService,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Report::ChapterWords(chapter) = &args.report {
        print_json(&progress.chapter_words(*chapter).await?, args.pretty)?;
        return Ok(());
    }

    let (doctor, code) = args.patient()?;
    match &args.report {
        Report::ChapterWords(_) => {}
        Report::Summary => {
            print_json(&progress.summarize_patient(doctor, code).await?, args.pretty)?;
        }
        Report::Chapter(chapter) => {
            let result = progress.chapter_progress(doctor, code, *chapter).await?;
            print_json(&result, args.pretty)?;
        }
        Report::Word { chapter, word } => {
            let history = progress.word_trials(doctor, code, *chapter, word).await?;
            print_json(&history, args.pretty)?;
        }
        Report::Graph => {
            print_json(&progress.graph_data(doctor, code).await?, args.pretty)?;
        }
        Report::Sessions => {
            print_json(&progress.session_history(doctor, code).await?, args.pretty)?;
        }
        Report::Trials => {
            print_json(&progress.list_trials(doctor, code).await?, args.pretty)?;
        }
        Report::RecordTrial {
            word_id,
            trial_number,
            accuracy,
            date,
            time,
        } => {
            let now = Local::now();
            let id = progress
                .record_trial(
                    doctor,
                    code,
                    *word_id,
                    *trial_number,
                    *accuracy,
                    date.unwrap_or_else(|| now.date_naive()),
                    time.unwrap_or_else(|| now.time()),
                )
                .await?;
            print_json(&serde_json::json!({ "id": id }), args.pretty)?;
        }
        Report::RecordSession {
            duration,
            score,
            date,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let id = progress
                .record_session(doctor, code, date, duration, *score)
                .await?;
            print_json(&serde_json::json!({ "id": id }), args.pretty)?;
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    init_tracing(parsed.verbose);

    prepare_sqlite_file(&parsed.db_url)?;
    let services = AppServices::new_sqlite(&parsed.db_url).await?;
    tracing::debug!(db = %parsed.db_url, report = ?parsed.report, "opened progress database");

    render(&services.progress(), &parsed).await
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn exit_code(err: &(dyn std::error::Error + 'static)) -> i32 {
    if err
        .downcast_ref::<ProgressError>()
        .is_some_and(ProgressError::is_not_found)
    {
        EXIT_NOT_FOUND
    } else {
        EXIT_FAILURE
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(exit_code(err.as_ref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(&mut args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn chapter_with_word_selects_word_history() {
        let args = parse(&["--doctor", "3", "--patient", "P-1", "--chapter", "2", "--word", "sun"])
            .unwrap();
        assert_eq!(
            args.report,
            Report::Word {
                chapter: ChapterNumber::new(2),
                word: "sun".into()
            }
        );
        assert_eq!(args.doctor_id, Some(DoctorId::new(3)));
    }

    #[test]
    fn chapter_without_patient_lists_words() {
        let args = parse(&["--chapter", "4"]).unwrap();
        assert_eq!(args.report, Report::ChapterWords(ChapterNumber::new(4)));
        assert!(matches!(
            args.patient(),
            Err(ArgsError::MissingDoctor | ArgsError::MissingPatient)
        ));
    }

    #[test]
    fn word_requires_chapter() {
        assert!(matches!(
            parse(&["--word", "pig"]),
            Err(ArgsError::WordWithoutChapter)
        ));
        assert!(matches!(
            parse(&["--graph", "--word", "pig"]),
            Err(ArgsError::WordWithoutChapter)
        ));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&["--doctor", "abc"]),
            Err(ArgsError::InvalidValue { flag: "--doctor", .. })
        ));
        assert!(matches!(
            parse(&["--chapter"]),
            Err(ArgsError::MissingValue { flag: "--chapter" })
        ));
        assert!(matches!(
            parse(&["--record-session", "--duration", "30 min", "--score", "80", "--date", "2024-13-01"]),
            Err(ArgsError::InvalidValue { flag: "--date", .. })
        ));
        assert!(matches!(parse(&["--bogus"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn report_flags_are_mutually_exclusive() {
        let err = parse(&["--chapter", "1", "--graph"]).err().unwrap();
        assert!(matches!(
            err,
            ArgsError::ConflictingModes {
                first: "--chapter",
                second: "--graph"
            }
        ));
        assert_eq!(err.to_string(), "--chapter cannot be combined with --graph");
        assert!(matches!(
            parse(&["--sessions", "--trials"]),
            Err(ArgsError::ConflictingModes { .. })
        ));
        assert!(parse(&["--graph", "--graph"]).is_ok());
    }

    #[test]
    fn trials_flag_selects_raw_listing() {
        let args = parse(&["--doctor", "1", "--patient", "P-1", "--trials"]).unwrap();
        assert_eq!(args.report, Report::Trials);
    }

    #[test]
    fn record_trial_collects_its_options() {
        let args = parse(&[
            "--doctor", "1", "--patient", "P-1", "--record-trial", "12", "--trial-number", "3",
            "--accuracy", "87.5", "--date", "2024-04-02", "--time", "09:30:00",
        ])
        .unwrap();
        assert_eq!(
            args.report,
            Report::RecordTrial {
                word_id: WordId::new(12),
                trial_number: 3,
                accuracy: 87.5,
                date: NaiveDate::from_ymd_opt(2024, 4, 2),
                time: NaiveTime::from_hms_opt(9, 30, 0),
            }
        );
    }

    #[test]
    fn record_trial_requires_accuracy() {
        assert!(matches!(
            parse(&["--record-trial", "12", "--trial-number", "3"]),
            Err(ArgsError::MissingOption {
                flag: "--accuracy",
                mode: "--record-trial"
            })
        ));
    }

    #[test]
    fn record_session_defaults_date_to_none() {
        let args = parse(&["--record-session", "--duration", "45 min", "--score", "82"]).unwrap();
        assert_eq!(
            args.report,
            Report::RecordSession {
                duration: "45 min".into(),
                score: 82.0,
                date: None,
            }
        );
    }

    #[test]
    fn record_options_need_their_mode() {
        assert!(matches!(
            parse(&["--graph", "--accuracy", "90"]),
            Err(ArgsError::UnexpectedOption { flag: "--accuracy" })
        ));
        assert!(matches!(
            parse(&["--record-session", "--duration", "5 min", "--score", "1", "--trial-number", "2"]),
            Err(ArgsError::UnexpectedOption { flag: "--trial-number" })
        ));
        assert!(matches!(
            parse(&["--record-trial", "1", "--trial-number", "1", "--accuracy", "1", "--score", "2"]),
            Err(ArgsError::UnexpectedOption { flag: "--score" })
        ));
    }

    #[test]
    fn not_found_errors_get_their_own_exit_code() {
        let missing: Box<dyn std::error::Error> = Box::new(ProgressError::PatientNotFound);
        assert_eq!(exit_code(missing.as_ref()), EXIT_NOT_FOUND);

        let args: Box<dyn std::error::Error> = Box::new(ArgsError::MissingPatient);
        assert_eq!(exit_code(args.as_ref()), EXIT_FAILURE);
    }

    #[test]
    fn normalizes_relative_sqlite_paths() {
        let url = normalize_sqlite_url("sqlite:data/speech.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/speech.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
