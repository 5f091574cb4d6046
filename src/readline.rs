//! Line editing with persistent history.
//!
//! Wraps a rustyline editor and the `$HOME/.mal-history` file: existing
//! entries are loaded when the editor is created, and every line read is
//! appended. History writes are best-effort; a failure is reported on
//! stderr and never interrupts the session.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::Error;

const HISTORY_FILE: &str = ".mal-history";

pub struct LineReader {
    editor: DefaultEditor,
    history: Option<PathBuf>,
}

impl LineReader {
    pub fn new() -> Result<Self, Error> {
        let mut editor = DefaultEditor::new()
            .map_err(|err| Error::IoError(format!("unable to initialize line editor: {err}")))?;
        let history =
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE));
        if let Some(path) = &history
            && let Ok(content) = std::fs::read_to_string(path)
        {
            for line in content.lines().filter(|line| !line.is_empty()) {
                let _ = editor.add_history_entry(line);
            }
        }
        Ok(LineReader { editor, history })
    }

    /// Read one line. `Ok(None)` means the user closed the stream
    /// (end-of-file or interrupt) rather than entering text.
    pub fn read(&mut self, prompt: &str) -> Result<Option<String>, Error> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                let _ = self.editor.add_history_entry(&line);
                self.append_history(&line);
                Ok(Some(line))
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(None),
            Err(err) => Err(Error::IoError(format!("readline failed: {err}"))),
        }
    }

    fn append_history(&self, line: &str) {
        let Some(path) = &self.history else { return };
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if written.is_err() {
            eprintln!("error writing to history");
        }
    }
}
