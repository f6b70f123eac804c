//! Interactive shell over the session core.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use tokio::io::{AsyncBufReadExt, BufReader};
use verifier_core::{
    DemoFallback, JobId, JobRecord, JobRegistry, Reachability, SessionManager, SessionState,
    UploadFile, upload_failure_message,
};
use verifier_utils::sanitize_display_text;

use crate::command::{Command, HELP, ParseError};

pub struct Shell {
    session: Arc<SessionManager>,
    jobs: JobRegistry,
}

enum Flow {
    Continue,
    Quit,
}

impl Shell {
    pub fn new(session: Arc<SessionManager>) -> Self {
        let jobs = JobRegistry::new(Arc::clone(&session));
        Self { session, jobs }
    }

    fn fallback(&self) -> &DemoFallback {
        self.session.fallback()
    }

    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        self.print_status();
        println!("Type `help` for commands.");

        loop {
            print_prompt(self.session.fallback().is_simulated());
            let Some(line) = lines.next_line().await.context("failed to read input")? else {
                break;
            };
            match Command::parse(&line) {
                Ok(None) => {}
                Ok(Some(command)) => {
                    if let Flow::Quit = self.execute(command).await {
                        break;
                    }
                }
                Err(ParseError::Usage(usage)) => println!("usage: {usage}"),
                Err(err) => println!("{err}"),
            }
        }
        Ok(())
    }

    async fn execute(&self, command: Command) -> Flow {
        match command {
            Command::Login { username, password } => self.login(&username, &password).await,
            Command::Register {
                username,
                password,
                email,
            } => match self
                .session
                .register(&username, &password, email.as_deref())
                .await
            {
                Ok(message) => println!("{}", display(&message)),
                Err(err) => println!("Registration failed: {}", display(&err.to_string())),
            },
            Command::Logout => {
                self.session.logout();
                println!("Logged out.");
            }
            Command::Status => self.print_status(),
            Command::Upload(paths) => self.upload(paths).await,
            Command::Jobs => print_jobs(&self.jobs.list()),
            Command::Refresh(id) => match self.jobs.refresh(&JobId::new(id.clone())).await {
                Ok(Some(record)) => print_jobs(std::slice::from_ref(&record)),
                Ok(None) => println!("No job {} in this session.", display(&id)),
                Err(err) => println!("Refresh failed: {}", display(&err.to_string())),
            },
            Command::Demo(true) => {
                self.fallback().enter_simulated();
                println!("Demo Mode on. Nothing is sent to the backend.");
                self.print_status();
            }
            Command::Demo(false) => {
                self.fallback().exit_simulated();
                println!("Demo Mode off.");
            }
            Command::Probe => match self.fallback().probe().await {
                Reachability::Reachable => println!("Backend reachable."),
                Reachability::Unreachable => {
                    println!("Backend unreachable. `demo on` switches to Demo Mode.");
                }
            },
            Command::Help => println!("{HELP}"),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    async fn login(&self, username: &str, password: &str) {
        println!("Signing in...");
        match self.session.login(username, password).await {
            Ok(profile) => println!(
                "Signed in as {} ({} plan).",
                display(&profile.username),
                display(&profile.plan)
            ),
            Err(err) => {
                println!("{}", display(&err.user_message()));
                if err.offers_simulated_mode() {
                    println!("Run `demo on` to continue offline.");
                }
            }
        }
    }

    /// Read every file first, then submit them all concurrently.
    async fn upload(&self, paths: Vec<PathBuf>) {
        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            match read_upload(path).await {
                Ok(file) => files.push(file),
                Err(err) => println!("Skipping {}: {err:#}", path.display()),
            }
        }

        let results = join_all(files.into_iter().map(|file| self.jobs.submit(file))).await;
        for result in results {
            match result {
                Ok(record) => println!(
                    "Queued {} as job {}.",
                    display(&record.filename),
                    display(record.id.as_str())
                ),
                Err(err) => println!("{}", display(&upload_failure_message(&err))),
            }
        }
    }

    fn print_status(&self) {
        let snapshot = self.session.snapshot();
        let mode = if snapshot.mode.is_simulated() {
            " [Demo Mode]"
        } else {
            ""
        };
        match (&snapshot.state, &snapshot.profile) {
            (SessionState::Authenticated, Some(profile)) => {
                let mut line = format!(
                    "Signed in as {} ({} plan){mode}",
                    display(&profile.username),
                    display(&profile.plan)
                );
                if let Some(credits) = profile.credits {
                    line.push_str(&format!(", {credits} credits"));
                }
                println!("{line}");
            }
            (state, _) => println!("Session: {state}{mode}"),
        }
        if let Some(notice) = snapshot.notice {
            println!("{}", display(&notice.message));
        }
    }
}

async fn read_upload(path: &Path) -> Result<UploadFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadFile::new(filename, bytes)?)
}

fn print_prompt(simulated: bool) {
    use std::io::Write;

    let prompt = if simulated { "verifier[demo]> " } else { "verifier> " };
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(prompt.as_bytes());
    let _ = stdout.flush();
}

fn print_jobs(records: &[JobRecord]) {
    if records.is_empty() {
        println!("No jobs yet.");
        return;
    }
    for record in records {
        println!(
            "{:<40} {:<24} {:<10} {:>5}  {}",
            display(record.id.as_str()),
            display(&record.filename),
            record.status.as_str(),
            display(&record.progress),
            record.submitted_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

/// Backend-supplied text is untrusted; strip escape sequences before printing.
fn display(text: &str) -> String {
    sanitize_display_text(text)
}
