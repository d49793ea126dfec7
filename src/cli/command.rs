/// A command typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Exit,
    AddFeature,
    FixIssue,
    Explain,
    Deploy,
    Status,
    Feedback,
    Help,
    Empty,
    Unknown(String),
}

/// Parses one line of input.
///
/// `exit`/`quit` must match exactly; every other command matches when its
/// keyword appears anywhere in the line ("add a feature" → `AddFeature`).
pub fn parse(input: &str) -> ReplCommand {
    let line = input.trim().to_lowercase();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    if line == "exit" || line == "quit" {
        return ReplCommand::Exit;
    }

    const KEYWORDS: [(&str, ReplCommand); 7] = [
        ("feature", ReplCommand::AddFeature),
        ("fix", ReplCommand::FixIssue),
        ("explain", ReplCommand::Explain),
        ("deploy", ReplCommand::Deploy),
        ("status", ReplCommand::Status),
        ("feedback", ReplCommand::Feedback),
        ("help", ReplCommand::Help),
    ];

    KEYWORDS
        .iter()
        .find(|(keyword, _)| line.contains(keyword))
        .map(|(_, command)| command.clone())
        .unwrap_or_else(|| ReplCommand::Unknown(input.trim().to_string()))
}

pub const HELP: &str = "Commands:
  feature   add a feature to the project
  fix       fix an issue in the project
  explain   explain a source file
  deploy    show deployment options
  status    show project status
  feedback  leave feedback
  exit      leave the session";
