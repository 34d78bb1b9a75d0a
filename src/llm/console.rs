//! Operator console model: prompts are shown on stderr and the operator types the reply.
//!
//! A reply ends with a line containing a single `.` or at end of input.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use super::{LanguageModel, LlmError};

pub struct ConsoleModel {
    stdin: Mutex<BufReader<tokio::io::Stdin>>,
}

impl ConsoleModel {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for ConsoleModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for ConsoleModel {
    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        // Hold the reader for the whole exchange so concurrent prompts don't interleave.
        let mut stdin = self.stdin.lock().await;

        let mut stderr = tokio::io::stderr();
        let banner = format!("\n----- prompt -----\n{}\n----- reply (end with '.') -----\n", prompt);
        stderr
            .write_all(banner.as_bytes())
            .await
            .map_err(|e| LlmError::unavailable(e.to_string()))?;
        stderr
            .flush()
            .await
            .map_err(|e| LlmError::unavailable(e.to_string()))?;

        let mut reply = String::new();
        loop {
            let mut line = String::new();
            let read = stdin
                .read_line(&mut line)
                .await
                .map_err(|e| LlmError::unavailable(e.to_string()))?;
            if read == 0 || line.trim_end() == "." {
                break;
            }
            reply.push_str(&line);
        }

        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(LlmError::empty_response());
        }
        Ok(reply)
    }
}
