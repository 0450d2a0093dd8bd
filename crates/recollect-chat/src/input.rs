//! Where user messages come from: the terminal or a script file.

use std::io::Write;
use std::path::Path;

use recollect::conversation::{InputFuture, InputSource, ScriptedInput};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Reads one message per line from standard input, printing a prompt first.
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
    prompt: String,
}

impl StdinInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            prompt: prompt.into(),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new("> ")
    }
}

impl InputSource for StdinInput {
    fn next_line(&mut self) -> InputFuture<'_> {
        Box::pin(async move {
            let mut stdout = std::io::stdout();
            write!(stdout, "{}", self.prompt)?;
            stdout.flush()?;
            Ok(self.lines.next_line().await?)
        })
    }
}

/// Load a script file: one message per non-blank line.
pub fn load_script(path: &Path) -> recollect::Result<ScriptedInput> {
    let script = std::fs::read_to_string(path)?;
    Ok(ScriptedInput::from_script(&script))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn script_file_yields_non_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Hi, my name is Ada.").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  What is 6 * 7?  ").unwrap();

        let mut input = load_script(file.path()).unwrap();
        assert_eq!(input.remaining(), 2);
        assert_eq!(
            input.next_line().await.unwrap().as_deref(),
            Some("Hi, my name is Ada.")
        );
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("What is 6 * 7?"));
        assert_eq!(input.next_line().await.unwrap(), None);
    }

    #[test]
    fn missing_script_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_script(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, recollect::Error::Io(_)));
    }
}
