use anyhow::{Result, bail};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Line-oriented operator input.
pub struct Prompter<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> Prompter<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Prints `prompt` and reads one trimmed line; `None` once input is closed.
    pub async fn line(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;

        let mut buf = String::new();
        if self.reader.read_line(&mut buf).await? == 0 {
            return Ok(None);
        }
        Ok(Some(buf.trim().to_string()))
    }

    /// Asks a question; an empty answer takes `default`.
    pub async fn ask(&mut self, question: &str, default: &str) -> Result<String> {
        let prompt = if default.is_empty() {
            format!("{}: ", question)
        } else {
            format!("{} [{}]: ", question, default)
        };
        match self.line(&prompt).await? {
            Some(answer) if !answer.is_empty() => Ok(answer),
            Some(_) => Ok(default.to_string()),
            None => bail!("Input closed"),
        }
    }

    pub async fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let Some(answer) = self.line(&format!("{} [{}]: ", question, hint)).await? else {
                bail!("Input closed");
            };
            match answer.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => println!("Please answer y or n"),
            }
        }
    }

    /// Reads a 1-based choice in `1..=count`; empty input takes `default`.
    pub async fn choose(&mut self, question: &str, count: usize, default: usize) -> Result<usize> {
        loop {
            let Some(answer) = self
                .line(&format!("{} [1-{}, default {}]: ", question, count, default))
                .await?
            else {
                bail!("Input closed");
            };
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=count).contains(&n) => return Ok(n),
                _ => println!("Please enter a number between 1 and {}", count),
            }
        }
    }
}
