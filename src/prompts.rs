//! Interactive prompts that fill in a run's missing settings.
//!
//! The CLI asks only for what was not given on the command line, and only
//! when stdin is a terminal. Every answer is validated here, so a
//! [`crate::config::RunConfig`] built from prompted values is as trustworthy
//! as one built from flags.
//!
//! [`Prompter`] is generic over its reader and writer so tests can script a
//! session without a terminal.

use crate::config::OutputFormat;
use crate::error::BatchError;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Banner printed before the first prompt.
pub const WELCOME: &str = "Welcome to docbatch, the batch document converter!";

pub const TARGET_PROMPT: &str = "Enter the path to the PDF, image file, or folder to convert: ";
pub const FORMAT_PROMPT: &str = "Enter the number of your choice: ";
pub const OCR_PROMPT: &str = "Enable OCR for image files? (y/n): ";

/// Menu label of each format, in [`OutputFormat::ALL`] order.
fn menu_label(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Html => "HTML     (image embedding and referencing supported)",
        OutputFormat::Json => "JSON     (lossless serialization of the document model)",
        OutputFormat::Markdown => "Markdown",
        OutputFormat::Text => "Text     (plain text, no Markdown markers)",
        OutputFormat::Doctags => "Doctags",
    }
}

/// Parse a menu answer: `1`–`5` or a format name such as `md`.
pub fn parse_format_choice(answer: &str) -> Result<OutputFormat, BatchError> {
    let answer = answer.trim();
    if let Ok(n) = answer.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| OutputFormat::ALL.get(i).copied())
            .ok_or_else(|| {
                BatchError::InvalidConfig(format!(
                    "Invalid choice '{answer}' (expected 1-{})",
                    OutputFormat::ALL.len()
                ))
            });
    }
    answer.parse()
}

/// Parse a yes/no answer. An empty answer means no.
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" | "" => Some(false),
        _ => None,
    }
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn welcome(&mut self) -> Result<(), BatchError> {
        writeln!(self.output, "{WELCOME}").map_err(terminal_err)
    }

    /// Ask for the file or folder to convert.
    pub fn target(&mut self) -> Result<PathBuf, BatchError> {
        let answer = self.ask(TARGET_PROMPT)?;
        if answer.is_empty() {
            return Err(BatchError::InvalidConfig(
                "A file or folder to convert is required".into(),
            ));
        }
        Ok(PathBuf::from(answer))
    }

    /// Show the format menu and read a choice.
    pub fn format(&mut self) -> Result<OutputFormat, BatchError> {
        writeln!(self.output, "\nSelect output format:").map_err(terminal_err)?;
        for (i, f) in OutputFormat::ALL.iter().enumerate() {
            writeln!(self.output, "{}. {}", i + 1, menu_label(*f)).map_err(terminal_err)?;
        }
        let answer = self.ask(FORMAT_PROMPT)?;
        parse_format_choice(&answer)
    }

    /// Ask whether OCR should run on image files.
    pub fn ocr(&mut self) -> Result<bool, BatchError> {
        let answer = self.ask(OCR_PROMPT)?;
        parse_yes_no(&answer).ok_or_else(|| {
            BatchError::InvalidConfig(format!("Invalid answer '{answer}' (expected y or n)"))
        })
    }

    fn ask(&mut self, question: &str) -> Result<String, BatchError> {
        write!(self.output, "{question}").map_err(terminal_err)?;
        self.output.flush().map_err(terminal_err)?;

        let mut line = String::new();
        let n = self.input.read_line(&mut line).map_err(terminal_err)?;
        if n == 0 {
            return Err(BatchError::InvalidConfig(format!(
                "No answer to '{}'",
                question.trim_end_matches([' ', ':'])
            )));
        }
        Ok(line.trim().to_string())
    }
}

fn terminal_err(e: io::Error) -> BatchError {
    BatchError::Io {
        path: PathBuf::from("<terminal>"),
        source: e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(script: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn full_session() {
        let mut p = prompter("  docs/reports \n3\ny\n");
        p.welcome().unwrap();
        assert_eq!(p.target().unwrap(), PathBuf::from("docs/reports"));
        assert_eq!(p.format().unwrap(), OutputFormat::Markdown);
        assert!(p.ocr().unwrap());

        let shown = String::from_utf8(p.output).unwrap();
        assert!(shown.starts_with(WELCOME));
        assert!(shown.contains("5. Doctags"));
        assert!(shown.contains(OCR_PROMPT));
    }

    #[test]
    fn menu_numbers_and_names() {
        assert_eq!(parse_format_choice("1").unwrap(), OutputFormat::Html);
        assert_eq!(parse_format_choice("4").unwrap(), OutputFormat::Text);
        assert_eq!(parse_format_choice("json").unwrap(), OutputFormat::Json);
        assert!(parse_format_choice("0").is_err());
        assert!(parse_format_choice("6").is_err());
        assert!(parse_format_choice("pdf").is_err());
    }

    #[test]
    fn yes_no_answers() {
        assert_eq!(parse_yes_no("Y"), Some(true));
        assert_eq!(parse_yes_no(" no "), Some(false));
        assert_eq!(parse_yes_no(""), Some(false));
        assert_eq!(parse_yes_no("maybe"), None);
    }

    #[test]
    fn invalid_answers_are_config_errors() {
        assert!(matches!(
            prompter("\n").target(),
            Err(BatchError::InvalidConfig(_))
        ));
        assert!(matches!(
            prompter("9\n").format(),
            Err(BatchError::InvalidConfig(_))
        ));
        assert!(matches!(
            prompter("perhaps\n").ocr(),
            Err(BatchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn eof_is_a_config_error() {
        let err = prompter("").target().unwrap_err();
        assert!(err.to_string().contains("No answer"), "got: {err}");
    }
}
