use edu_admin::resource::RESOURCES;
use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::highlight::MatchingBracketHighlighter;
use rustyline::hint::HistoryHinter;
use rustyline::validate::MatchingBracketValidator;
use rustyline::Context;

/// Shell commands, in the order `help` lists them
pub const COMMANDS: [&str; 19] = [
    "login",
    "logout",
    "me",
    "register",
    "stats",
    "list",
    "get",
    "create",
    "update",
    "delete",
    "upload",
    "avatar",
    "avatars",
    "notifications",
    "read",
    "init-sample-data",
    "health",
    "help",
    "quit",
];

/// Completes the command word, resource names after the commands that
/// take one, and file names everywhere else.
pub struct CommandCompleter {
    pub filename: FilenameCompleter,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self {
            filename: FilenameCompleter::new(),
        }
    }

    fn matching(start: usize, prefix: &str, words: &[String]) -> (usize, Vec<Pair>) {
        let pairs = words
            .iter()
            .filter(|w| w.starts_with(prefix))
            .map(|w| Pair {
                display: w.clone(),
                replacement: format!("{w} "),
            })
            .collect();
        (start, pairs)
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before = &line[..pos];
        let start = before
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        let prefix = &before[start..];
        let preceding: Vec<&str> = before[..start].split_whitespace().collect();
        match preceding.as_slice() {
            [] => {
                let commands: Vec<String> = COMMANDS.iter().map(|c| c.to_string()).collect();
                Ok(Self::matching(start, prefix, &commands))
            }
            ["list" | "get" | "create" | "update" | "delete"] => {
                let resources: Vec<String> = RESOURCES.iter().map(|r| r.to_string()).collect();
                Ok(Self::matching(start, prefix, &resources))
            }
            _ => self.filename.complete(line, pos, ctx),
        }
    }
}

#[derive(
    rustyline::Helper,
    rustyline::Completer,
    rustyline::Hinter,
    rustyline::Validator,
    rustyline::Highlighter,
)]
pub struct MyHelper {
    #[rustyline(Completer)]
    pub completer: CommandCompleter,
    #[rustyline(Highlighter)]
    pub highlighter: MatchingBracketHighlighter,
    #[rustyline(Validator)]
    pub validator: MatchingBracketValidator,
    #[rustyline(Hinter)]
    pub hinter: HistoryHinter,
}
