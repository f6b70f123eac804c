//! Shell command parsing.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: String, password: String },
    Register {
        username: String,
        password: String,
        email: Option<String>,
    },
    Logout,
    Status,
    Upload(Vec<PathBuf>),
    Jobs,
    Refresh(String),
    Demo(bool),
    Probe,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
Commands:
  login <username> <password>             sign in
  register <username> <password> [email]  create an account
  logout                                  sign out (also leaves demo mode)
  status (whoami)                         show session state
  upload <file> [file...]                 submit files for verification
  jobs                                    list jobs, newest first
  refresh <job_id>                        fetch a job's progress
  demo on|off                             enter or leave demo mode
  probe                                   check whether the backend answers
  help                                    show this text
  quit                                    exit";

impl Command {
    /// Parse one input line. `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("login", [username, password]) => Self::Login {
                username: (*username).to_string(),
                password: (*password).to_string(),
            },
            ("login", _) => return Err(ParseError::Usage("login <username> <password>")),
            ("register", [username, password, rest @ ..]) if rest.len() <= 1 => Self::Register {
                username: (*username).to_string(),
                password: (*password).to_string(),
                email: rest.first().map(|e| (*e).to_string()),
            },
            ("register", _) => {
                return Err(ParseError::Usage("register <username> <password> [email]"));
            }
            ("logout", []) => Self::Logout,
            ("status" | "whoami", []) => Self::Status,
            ("upload", paths) if !paths.is_empty() => {
                Self::Upload(paths.iter().map(PathBuf::from).collect())
            }
            ("upload", _) => return Err(ParseError::Usage("upload <file> [file...]")),
            ("jobs", []) => Self::Jobs,
            ("refresh", [id]) => Self::Refresh((*id).to_string()),
            ("refresh", _) => return Err(ParseError::Usage("refresh <job_id>")),
            ("demo", [toggle]) => match toggle.to_ascii_lowercase().as_str() {
                "on" => Self::Demo(true),
                "off" => Self::Demo(false),
                _ => return Err(ParseError::Usage("demo on|off")),
            },
            ("demo", _) => return Err(ParseError::Usage("demo on|off")),
            ("probe", []) => Self::Probe,
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => return Err(ParseError::Unknown(head.to_string())),
        };
        Ok(Some(command))
    }
}
