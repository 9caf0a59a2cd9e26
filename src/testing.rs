//! In-memory collaborators for exercising the pipeline without a host.
//!
//! These implement the [`ProcessRunner`], [`HttpProbe`] and
//! [`LicenseSource`] seams with canned answers and record what was asked
//! of them. They back this crate's own tests and let embedding programs
//! dry-run a profile. Only built with the `testing` feature.

use crate::http::{HttpProbe, HttpResponse, ProbeError};
use crate::license::{LicenseSource, LicenseSupply};
use crate::runner::{CommandOutput, ProcessRunner, RunnerError, StructuredCommand};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

type Reply<T, E> = Box<dyn Fn(usize) -> Result<T, E> + Send + Sync>;

struct Rule<T, E> {
    pattern: String,
    reply: Reply<T, E>,
    hits: usize,
}

/// Rules matched by substring, first match wins, each with a hit counter.
struct Rules<T, E> {
    rules: Vec<Rule<T, E>>,
    calls: Vec<String>,
}

impl<T, E> Rules<T, E> {
    fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Vec::new(),
        }
    }

    fn push(&mut self, pattern: &str, reply: Reply<T, E>) {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            reply,
            hits: 0,
        });
    }

    fn answer(&mut self, key: String) -> Option<Result<T, E>> {
        let answer = self
            .rules
            .iter_mut()
            .find(|rule| key.contains(&rule.pattern))
            .map(|rule| {
                let reply = (rule.reply)(rule.hits);
                rule.hits += 1;
                reply
            });
        self.calls.push(key);
        answer
    }
}

/// A [`ProcessRunner`] that answers from a script.
///
/// Each rule matches when its pattern is a substring of the rendered
/// command line (`program arg1 arg2 ...`). Unmatched commands succeed with
/// empty output.
pub struct ScriptedRunner {
    inner: Mutex<Rules<CommandOutput, RunnerError>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    /// A runner where every command succeeds silently.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Rules::new()),
        }
    }

    /// Answer commands containing `pattern` with `output`.
    pub fn respond(self, pattern: &str, output: CommandOutput) -> Self {
        self.respond_with(pattern, move |_| Ok(output.clone()))
    }

    /// Answer commands containing `pattern` as if the program did not exist.
    pub fn respond_missing(self, pattern: &str) -> Self {
        let program = pattern.to_string();
        self.respond_with(pattern, move |_| {
            Err(RunnerError::ProgramNotFound {
                program: program.clone(),
            })
        })
    }

    /// Answer commands containing `pattern` with `reply(n)`, where `n` is
    /// the 0-based number of earlier matches of this rule.
    pub fn respond_with<F>(self, pattern: &str, reply: F) -> Self
    where
        F: Fn(usize) -> Result<CommandOutput, RunnerError> + Send + Sync + 'static,
    {
        lock(&self.inner).push(pattern, Box::new(reply));
        self
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.inner).calls.clone()
    }

    /// How many command lines contained `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        lock(&self.inner)
            .calls
            .iter()
            .filter(|call| call.contains(pattern))
            .count()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &StructuredCommand) -> Result<CommandOutput, RunnerError> {
        lock(&self.inner)
            .answer(command.to_string())
            .unwrap_or_else(|| Ok(CommandOutput::ok("")))
    }
}

/// An [`HttpProbe`] that answers from a script.
///
/// Rules match by URL substring. Unmatched URLs fail as unreachable.
pub struct ScriptedHttp {
    inner: Mutex<Rules<HttpResponse, ProbeError>>,
}

impl Default for ScriptedHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHttp {
    /// A probe where every URL is unreachable.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Rules::new()),
        }
    }

    /// Answer URLs containing `pattern` with `status` and `body`.
    pub fn respond(self, pattern: &str, status: u16, body: &str) -> Self {
        let body = body.to_string();
        self.respond_with(pattern, move |_| {
            Ok(HttpResponse {
                status,
                body: body.clone(),
            })
        })
    }

    /// Answer URLs containing `pattern` with `reply(n)`, where `n` is the
    /// 0-based number of earlier matches of this rule.
    pub fn respond_with<F>(self, pattern: &str, reply: F) -> Self
    where
        F: Fn(usize) -> Result<HttpResponse, ProbeError> + Send + Sync + 'static,
    {
        lock(&self.inner).push(pattern, Box::new(reply));
        self
    }

    /// Every URL requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.inner).calls.clone()
    }

    /// How many requested URLs contained `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        lock(&self.inner)
            .calls
            .iter()
            .filter(|call| call.contains(pattern))
            .count()
    }
}

#[async_trait]
impl HttpProbe for ScriptedHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, ProbeError> {
        lock(&self.inner)
            .answer(url.to_string())
            .unwrap_or_else(|| {
                Err(ProbeError {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                })
            })
    }
}

/// A [`LicenseSource`] that hands out canned answers in order.
pub struct CannedLicenseSource {
    answers: Mutex<VecDeque<LicenseSupply>>,
    asked: Mutex<usize>,
}

impl CannedLicenseSource {
    /// Answer each request with the next item of `answers`.
    pub fn new(answers: impl IntoIterator<Item = LicenseSupply>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(0),
        }
    }

    /// How many times a license was requested.
    pub fn times_asked(&self) -> usize {
        *lock(&self.asked)
    }
}

#[async_trait]
impl LicenseSource for CannedLicenseSource {
    async fn request_license(&self) -> std::io::Result<LicenseSupply> {
        *lock(&self.asked) += 1;
        lock(&self.answers).pop_front().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no canned license left")
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
