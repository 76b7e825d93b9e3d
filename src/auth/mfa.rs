// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! MFA code sources

use std::io::{self, BufRead};
use std::thread;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{GarminError, LoginStep, Result};

/// Supplies a one-time MFA code from some out-of-band channel.
///
/// Implementations must return promptly once `cancel` fires.
#[async_trait]
pub trait MfaPrompter: Send + Sync {
    async fn mfa_code(&self, cancel: &CancellationToken) -> Result<String>;
}

/// Reads the code from the terminal.
///
/// The line is read on a detached OS thread, so a cancelled prompt never
/// leaves the runtime waiting on a blocked stdin read at shutdown.
#[derive(Debug, Clone)]
pub struct ConsolePrompter {
    prompt: String,
}

impl ConsolePrompter {
    pub fn new() -> Self {
        Self {
            prompt: "Enter Garmin MFA code: ".to_string(),
        }
    }

    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl Default for ConsolePrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MfaPrompter for ConsolePrompter {
    async fn mfa_code(&self, cancel: &CancellationToken) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(GarminError::Cancelled {
                step: LoginStep::MfaPrompt,
            });
        }

        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(self.prompt.as_bytes())
            .await
            .map_err(read_error)?;
        stderr.flush().await.map_err(read_error)?;

        let line = read_line_detached(|| io::stdin().lock()).map_err(read_error)?;
        await_line(line, cancel).await
    }
}

fn read_error(e: io::Error) -> GarminError {
    GarminError::InvalidInput(format!("could not read MFA code: {e}"))
}

/// Read one line from the reader built by `open` on its own thread
fn read_line_detached<R, F>(open: F) -> io::Result<oneshot::Receiver<io::Result<String>>>
where
    F: FnOnce() -> R + Send + 'static,
    R: BufRead,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name("mfa-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            let result = open().read_line(&mut line).map(|_| line);
            // The receiver is gone when the prompt was cancelled
            let _ = tx.send(result);
        })?;
    Ok(rx)
}

async fn await_line(
    line: oneshot::Receiver<io::Result<String>>,
    cancel: &CancellationToken,
) -> Result<String> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GarminError::Cancelled { step: LoginStep::MfaPrompt }),
        line = line => match line {
            Ok(Ok(line)) => Ok(line.trim().to_string()),
            Ok(Err(e)) => Err(read_error(e)),
            Err(_) => Err(GarminError::InvalidInput(
                "MFA code reader stopped without a line".to_string(),
            )),
        },
    }
}

/// Hands out a fixed code: for `--mfa-code` style flags and tests
#[derive(Debug, Clone, Default)]
pub struct StaticPrompter {
    code: Option<String>,
}

impl StaticPrompter {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
        }
    }

    /// A prompter that never has a code
    pub fn empty() -> Self {
        Self { code: None }
    }
}

#[async_trait]
impl MfaPrompter for StaticPrompter {
    async fn mfa_code(&self, cancel: &CancellationToken) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(GarminError::Cancelled {
                step: LoginStep::MfaPrompt,
            });
        }
        Ok(self.code.clone().unwrap_or_default())
    }
}
