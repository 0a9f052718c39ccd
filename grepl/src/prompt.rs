//! # Terminal Prompt
//!
//! A [`Prompt`] reading from the terminal with `rustyline`.
//!
//! The line editor lives on its own input thread and the prompt talks to it over channels,
//! so the filler owning the prompt can be moved to the blocking pool.
//!
//! * Ctrl-D is reported as end of input.
//! * Ctrl-C is reported as an abort.
use colored::{Color, Colorize};
use grepl_core::fill::{FieldPrompt, Prompt, PromptError};
use rustyline::{DefaultEditor, error::ReadlineError};
use std::io;
use std::sync::mpsc;

/// Cycled through as nested messages are completed.
const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::BrightRed,
];

pub struct TerminalPrompt {
    requests: mpsc::Sender<String>,
    lines: mpsc::Receiver<Result<String, PromptError>>,
}

impl TerminalPrompt {
    /// Starts the input thread.
    pub fn spawn() -> Result<Self, PromptError> {
        let (request_tx, request_rx) = mpsc::channel::<String>();
        let (line_tx, line_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        std::thread::Builder::new()
            .name("grepl-input".to_string())
            .spawn(move || {
                let mut editor = match DefaultEditor::new() {
                    Ok(editor) => {
                        let _ = ready_tx.send(Ok(()));
                        editor
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(into_prompt_error(err)));
                        return;
                    }
                };

                for prompt in request_rx {
                    let line = readline(&mut editor, &prompt);
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
            })?;

        ready_rx.recv().map_err(|_| input_closed())??;

        Ok(Self {
            requests: request_tx,
            lines: line_rx,
        })
    }

    fn readline(&mut self, prompt: String) -> Result<String, PromptError> {
        self.requests.send(prompt).map_err(|_| input_closed())?;
        self.lines.recv().map_err(|_| input_closed())?
    }
}

impl Prompt for TerminalPrompt {
    fn input(&mut self, prompt: &FieldPrompt) -> Result<String, PromptError> {
        let color = PALETTE[prompt.color % PALETTE.len()];
        let hint = if prompt.repeated {
            " (empty to finish)".dimmed().to_string()
        } else {
            String::new()
        };

        self.readline(format!("{}{hint}> ", prompt.label.color(color)))
    }

    fn select(&mut self, message: &str, options: &[String]) -> Result<String, PromptError> {
        println!("{}", message.bold());
        for (i, option) in options.iter().enumerate() {
            println!("  {} {option}", format!("{})", i + 1).cyan());
        }

        loop {
            let answer = self.readline(format!("{} ", "select>".bold()))?;
            let answer = answer.trim();

            let by_index = answer
                .parse::<usize>()
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| options.get(i));
            let by_name = options.iter().find(|o| o.as_str() == answer);

            if let Some(choice) = by_index.or(by_name) {
                return Ok(choice.clone());
            }
            println!("{}", format!("'{answer}' is not one of the options").yellow());
        }
    }
}

fn readline(editor: &mut DefaultEditor, prompt: &str) -> Result<String, PromptError> {
    let line = editor.readline(prompt).map_err(into_prompt_error)?;
    if !line.is_empty() {
        let _ = editor.add_history_entry(line.as_str());
    }
    Ok(line)
}

fn into_prompt_error(err: ReadlineError) -> PromptError {
    match err {
        ReadlineError::Eof => PromptError::EndOfInput,
        ReadlineError::Interrupted => PromptError::Aborted,
        ReadlineError::Io(err) => PromptError::Io(err),
        err => PromptError::Io(io::Error::other(err.to_string())),
    }
}

fn input_closed() -> PromptError {
    PromptError::Io(io::Error::other("the input thread has stopped"))
}
