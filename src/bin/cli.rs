use chrono::Local;
use code::my_helper::{CommandCompleter, MyHelper, COMMANDS};
use edu_admin::api_client::{ApiClient, UploadFile};
use edu_admin::api_result::{ApiResult, ResponseBody};
use edu_admin::config::{ClientConfig, ErrorMessages};
use edu_admin::resource::{Page, Resource};
use rustyline::highlight::MatchingBracketHighlighter;
use rustyline::hint::HistoryHinter;
use rustyline::history::FileHistory;
use rustyline::validate::MatchingBracketValidator;
use rustyline::{Cmd, CompletionType, Config, EditMode, Editor, Event, EventHandler, KeyEvent};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
extern crate edu_admin;
mod code {
    pub mod my_helper;
}

use clap::Parser;

const DEFAULT_HISTORY_FILE: &str = "history.txt";

const HELP: &str = "\
login <email> <password>        Get a token
logout                          Forget the token
me                              Who the token belongs to
register <json>                 Create a user
stats                           Dashboard statistics
list <resource> [skip] [limit] [category]
get <resource> <id>
create <resource> <json>
update <resource> <id> <json>
delete <resource> <id>
upload <file> [key=value ...]   Upload a library document
avatar <file>                   Upload an avatar
avatars                         Available avatars
notifications                   List notifications
read <id>                       Mark a notification read
init-sample-data                Ask the backend to seed itself
health                          Backend health
quit
Resources: courses assignments exams webinars students library forum";

/// Command line argument definitions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Arguments {
    /// Backend URL.  [Default: `EDU_API_BASE_URL` or http://localhost:8000]
    #[arg(long, short = 'u')]
    base_url: Option<String>,

    /// File the token is kept in.  [Default: `EDU_TOKEN_FILE` or the
    /// per-user data directory]
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// Error wording: "standard" or "dashboard"
    #[arg(long)]
    wording: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Log requests to stderr
    #[arg(long, short = 'v')]
    verbose: bool,

    /// The file name that commands and replies are recorded in
    #[arg(long, short = 'r')]
    record_file: Option<String>,

    #[arg(long, default_value = DEFAULT_HISTORY_FILE)]
    history_file: String,
}

/// A structure to hold data for the interface.
struct CliInterface {
    history_file: String,

    /// Transcript of commands and replies, if asked for
    record_file: Option<File>,
}

impl CliInterface {
    fn set_up_read_line(&self) -> rustyline::Result<Editor<MyHelper, FileHistory>> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();
        let h = MyHelper {
            completer: CommandCompleter::new(),
            highlighter: MatchingBracketHighlighter::new(),
            hinter: HistoryHinter {},
            validator: MatchingBracketValidator::new(),
        };
        let mut read_line = Editor::with_config(config)?;
        read_line.set_helper(Some(h));
        read_line.bind_sequence(KeyEvent::alt('n'), Cmd::HistorySearchForward);
        read_line.bind_sequence(KeyEvent::alt('p'), Cmd::HistorySearchBackward);
        if read_line.load_history(self.history_file.as_str()).is_err() {
            println!("No previous history.");
        }

        // C-q quits, same as C-c
        read_line.bind_sequence(
            Event::KeySeq(vec![KeyEvent::ctrl('q')]),
            EventHandler::Simple(Cmd::Interrupt),
        );
        Ok(read_line)
    }

    fn record(&mut self, tag: &str, text: &str) {
        if let Some(ref mut file) = self.record_file {
            let line = format!("{tag}: {}\n{text}\n", Local::now().format("%Y-%m-%dT%H:%M:%S"));
            if let Err(err) = file.write_all(line.as_bytes()) {
                log::warn!("Recording failed: {err}");
            }
        }
    }

    /// Run one command line.  Errors from the backend become the reply
    /// text; only a broken shell returns `Err`.
    async fn process_command(
        &self,
        line: &str,
        api: &ApiClient,
    ) -> Result<String, Box<dyn Error>> {
        let (words, rest) = take_words(line, 1);
        let cmd = match words.first() {
            Some(cmd) => *cmd,
            None => return Ok(String::new()),
        };
        let response_text = match cmd {
            "help" => HELP.to_string(),
            "login" => {
                let (args, _) = take_words(rest, 2);
                match args.as_slice() {
                    [email, password] => match api.login(email, password).await {
                        Ok(r) => format!(
                            "Logged in as {email}.  Token type: {}",
                            r.body
                                .get("token_type")
                                .and_then(Value::as_str)
                                .unwrap_or("bearer")
                        ),
                        Err(err) => format!("{err}"),
                    },
                    _ => "login <email> <password>".to_string(),
                }
            }
            "logout" => match api.logout() {
                Ok(()) => "Logged out".to_string(),
                Err(err) => format!("{err}"),
            },
            "me" => render(api.get_current_user().await).await,
            "register" => match parse_json(rest) {
                Ok(user) => render(api.register(&user).await).await,
                Err(msg) => msg,
            },
            "stats" => render(api.statistics().await).await,
            "list" => {
                let (args, category) = take_words(rest, 3);
                match parse_resource(args.first().copied()) {
                    Ok(resource) => {
                        let defaults = Page::default();
                        let skip = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(defaults.skip);
                        let limit = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(defaults.limit);
                        let category = if category.is_empty() { None } else { Some(category) };
                        render(api.list(resource, Page::new(skip, limit), category).await).await
                    }
                    Err(msg) => msg,
                }
            }
            "get" | "delete" => {
                let (args, _) = take_words(rest, 2);
                match (parse_resource(args.first().copied()), args.get(1)) {
                    (Ok(resource), Some(id)) if cmd == "get" => {
                        render(api.get_one(resource, id).await).await
                    }
                    (Ok(resource), Some(id)) => render(api.delete_one(resource, id).await).await,
                    (Err(msg), _) => msg,
                    (Ok(_), None) => format!("{cmd} <resource> <id>"),
                }
            }
            "create" => {
                let (args, json) = take_words(rest, 1);
                match (parse_resource(args.first().copied()), parse_json(json)) {
                    (Ok(resource), Ok(data)) => render(api.create(resource, &data).await).await,
                    (Err(msg), _) | (_, Err(msg)) => msg,
                }
            }
            "update" => {
                let (args, json) = take_words(rest, 2);
                match (parse_resource(args.first().copied()), args.get(1), parse_json(json)) {
                    (Ok(resource), Some(id), Ok(data)) => {
                        render(api.update(resource, id, &data).await).await
                    }
                    (Err(msg), _, _) => msg,
                    (_, None, _) => "update <resource> <id> <json>".to_string(),
                    (_, _, Err(msg)) => msg,
                }
            }
            "upload" => {
                let (args, fields) = take_words(rest, 1);
                match args.first() {
                    Some(file_name) => match parse_fields(fields) {
                        Ok(fields) => match UploadFile::from_path(Path::new(file_name)).await {
                            Ok(file) => render(api.upload_document(file, &fields).await).await,
                            Err(err) => format!("{err}"),
                        },
                        Err(msg) => msg,
                    },
                    None => "upload <file> [key=value ...]".to_string(),
                }
            }
            "avatar" => {
                let (args, _) = take_words(rest, 1);
                match args.first() {
                    Some(file_name) => match UploadFile::from_path(Path::new(file_name)).await {
                        Ok(file) => render(api.upload_avatar(file).await).await,
                        Err(err) => format!("{err}"),
                    },
                    None => "avatar <file>".to_string(),
                }
            }
            "avatars" => render(api.available_avatars().await).await,
            "notifications" => render(api.notifications().await).await,
            "read" => {
                let (args, _) = take_words(rest, 1);
                match args.first() {
                    Some(id) => render(api.mark_notification_read(id).await).await,
                    None => "read <notification id>".to_string(),
                }
            }
            "init-sample-data" => render(api.init_sample_data().await).await,
            "health" => render(api.health().await).await,
            _ => format!("Unknown command: {cmd}.  Commands: {}", COMMANDS.join(" ")),
        };
        Ok(response_text)
    }
}

/// Split off up to `n` leading words and return them with the rest of
/// the line
fn take_words(line: &str, n: usize) -> (Vec<&str>, &str) {
    let mut words = Vec::new();
    let mut rest = line.trim_start();
    while words.len() < n && !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        words.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    (words, rest.trim_end())
}

fn parse_resource(word: Option<&str>) -> Result<Resource, String> {
    match word {
        Some(word) => Resource::from_str(word).map_err(|err| format!("{word}: {err}")),
        None => Err("Which resource?".to_string()),
    }
}

fn parse_json(text: &str) -> Result<Value, String> {
    if text.is_empty() {
        return Err("Expected a JSON object".to_string());
    }
    serde_json::from_str(text).map_err(|err| format!("Bad JSON: {err}"))
}

/// `title=Algebra category=math` into a field map
fn parse_fields(text: &str) -> Result<BTreeMap<String, String>, String> {
    let mut fields = BTreeMap::new();
    for pair in text.split_whitespace() {
        match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                fields.insert(key.to_string(), value.to_string());
            }
            _ => return Err(format!("{pair}: expected key=value")),
        }
    }
    Ok(fields)
}

/// Turn a reply into text for the terminal
async fn render(
    result: Result<ApiResult<ResponseBody>, edu_admin::api_error::ApiError>,
) -> String {
    match result {
        Ok(r) => match r.body {
            ResponseBody::Json(value) => {
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }
            ResponseBody::Raw(response) => {
                let content_type = r
                    .headers
                    .get("content-type")
                    .cloned()
                    .unwrap_or_else(|| "unknown content type".to_string());
                match response.text().await {
                    Ok(text) => format!("({content_type})\n{text}"),
                    Err(err) => format!("({content_type}) {err}"),
                }
            }
        },
        Err(err) => format!("{err}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Get the command line options
    let cmd_line_opts = Arguments::parse();

    let level = if cmd_line_opts.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    // Environment first, then the command line
    let mut config = ClientConfig::from_env();
    if let Some(url) = cmd_line_opts.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(file) = cmd_line_opts.token_file {
        config.token_file = Some(file);
    }
    if let Some(wording) = cmd_line_opts.wording {
        config.messages = match ErrorMessages::from_str(wording.as_str()) {
            Ok(m) => m,
            Err(_) => return Err(format!("{wording} is not standard or dashboard").into()),
        };
    }
    if let Some(secs) = cmd_line_opts.timeout {
        config.timeout = Some(std::time::Duration::from_secs(secs));
    }

    let api = ApiClient::with_file_store(&config)?.on_session_expired(|| {
        eprintln!("Session expired.  Log in again: login <email> <password>");
    });
    println!("{api}");

    let record_file = match cmd_line_opts.record_file {
        Some(ref name) => Some(
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(name.as_str())?,
        ),
        None => None,
    };
    let mut cli_interface = CliInterface {
        history_file: cmd_line_opts.history_file,
        record_file,
    };
    let mut read_line: Editor<MyHelper, FileHistory> = cli_interface.set_up_read_line()?;

    let mut count = 1;
    loop {
        let p = format!("{count}> ");
        let input = match read_line.readline(&p) {
            Ok(line) => line,
            Err(err) => {
                // Exit from loop
                eprintln!("Readline {err}");
                break;
            }
        };
        read_line.add_history_entry(input.as_str())?;
        count += 1;

        let command = input.trim();
        if command == "quit" {
            break;
        }
        cli_interface.record("Q", command);
        let start = Instant::now();
        let response_text = cli_interface.process_command(command, &api).await?;
        log::debug!("{command}: {:?}", start.elapsed());
        cli_interface.record("A", response_text.as_str());
        println!("{response_text}");
    }

    read_line.append_history(cli_interface.history_file.as_str())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_and_remainder() {
        let (words, rest) = take_words("  create   courses {\"title\": \"Đại số\"} ", 2);
        assert_eq!(words, vec!["create", "courses"]);
        assert_eq!(rest, "{\"title\": \"Đại số\"}");

        let (words, rest) = take_words("list forum", 4);
        assert_eq!(words, vec!["list", "forum"]);
        assert_eq!(rest, "");
    }

    #[test]
    fn fields_need_keys() {
        let fields = parse_fields("title=Algebra category=math").unwrap();
        assert_eq!(fields.get("title").map(String::as_str), Some("Algebra"));
        assert_eq!(fields.len(), 2);
        assert!(parse_fields("=oops").is_err());
        assert!(parse_fields("novalue").is_err());
        assert!(parse_fields("").unwrap().is_empty());
    }

    #[test]
    fn resource_words() {
        assert_eq!(parse_resource(Some("exams")), Ok(Resource::Exams));
        assert!(parse_resource(Some("grades")).is_err());
        assert!(parse_resource(None).is_err());
    }
}
