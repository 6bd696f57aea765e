//! User interaction operations (confirmation, choice and free-text prompts).

use anyhow::{Result, bail};

use super::RealRuntime;

use std::io::{self, BufRead, Write};

/// Core, testable implementation that reads from any BufRead and writes to any Write.
/// This is intentionally free-standing so tests can exercise it without needing a RealRuntime.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let response = line.trim().to_lowercase();
    Ok(response == "y" || response == "yes")
}

/// Numbered single choice. An empty answer picks `default`.
pub(crate) fn select_with_io<R: BufRead, W: Write>(
    prompt: &str,
    options: &[String],
    default: usize,
    input: &mut R,
    output: &mut W,
) -> Result<usize> {
    if options.is_empty() {
        bail!("Nothing to choose from for \"{}\"", prompt);
    }
    let default = default.min(options.len() - 1);

    writeln!(output, "{}", prompt)?;
    for (i, option) in options.iter().enumerate() {
        let marker = if i == default { '>' } else { ' ' };
        writeln!(output, "{} {}) {}", marker, i + 1, option)?;
    }
    write!(output, "Select [1-{}] (default {}): ", options.len(), default + 1)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();

    if answer.is_empty() {
        return Ok(default);
    }

    match answer.parse::<usize>() {
        Ok(n) if (1..=options.len()).contains(&n) => Ok(n - 1),
        _ => match options.iter().position(|o| o == answer) {
            Some(index) => Ok(index),
            None => bail!("Invalid selection \"{}\"", answer),
        },
    }
}

pub(crate) fn ask_text_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<String> {
    write!(output, "{} ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

impl RealRuntime {
    pub(crate) fn confirm_impl(&self, prompt: &str) -> Result<bool> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stdin_lock = stdin.lock();
        confirm_with_io(prompt, &mut stdin_lock, &mut stdout)
    }

    pub(crate) fn select_impl(
        &self,
        prompt: &str,
        options: &[String],
        default: usize,
    ) -> Result<usize> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stdin_lock = stdin.lock();
        select_with_io(prompt, options, default, &mut stdin_lock, &mut stdout)
    }

    pub(crate) fn ask_text_impl(&self, prompt: &str) -> Result<String> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stdin_lock = stdin.lock();
        ask_text_with_io(prompt, &mut stdin_lock, &mut stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::{ask_text_with_io, confirm_with_io, select_with_io};
    use anyhow::Result;
    use std::io::Cursor;

    fn options() -> Vec<String> {
        vec!["dependencies".into(), "devDependencies".into()]
    }

    #[test]
    fn confirms_yes_and_short_y() -> Result<()> {
        let cases = vec!["y\n", "Y\n", "yes\n", " YES \n", "  y  \n"];
        for case in cases {
            let mut input = Cursor::new(case.as_bytes());
            let mut output = Vec::new();
            let ok = confirm_with_io("Proceed?", &mut input, &mut output)?;
            assert!(ok, "expected '{}' to be accepted as yes", case);
            let out = String::from_utf8(output)?;
            assert!(out.contains("Proceed? [y/N]"));
        }
        Ok(())
    }

    #[test]
    fn rejects_no_and_empty() -> Result<()> {
        let cases = vec!["n\n", "no\n", "\n", "  \n", "other\n"];
        for case in cases {
            let mut input = Cursor::new(case.as_bytes());
            let mut output = Vec::new();
            let ok = confirm_with_io("Continue?", &mut input, &mut output)?;
            assert!(!ok, "expected '{}' to be rejected as no", case);
        }
        Ok(())
    }

    #[test]
    fn select_by_number_and_by_name() -> Result<()> {
        let mut output = Vec::new();
        let picked = select_with_io("How?", &options(), 0, &mut Cursor::new(b"2\n"), &mut output)?;
        assert_eq!(picked, 1);

        let out = String::from_utf8(output)?;
        assert!(out.starts_with("How?\n"));
        assert!(out.contains("> 1) dependencies"));
        assert!(out.contains("  2) devDependencies"));

        let picked = select_with_io(
            "How?",
            &options(),
            0,
            &mut Cursor::new(b"devDependencies\n"),
            &mut Vec::new(),
        )?;
        assert_eq!(picked, 1);
        Ok(())
    }

    #[test]
    fn select_empty_answer_uses_default() -> Result<()> {
        let picked = select_with_io("How?", &options(), 1, &mut Cursor::new(b"\n"), &mut Vec::new())?;
        assert_eq!(picked, 1);
        Ok(())
    }

    #[test]
    fn select_rejects_out_of_range() {
        let result = select_with_io("How?", &options(), 0, &mut Cursor::new(b"3\n"), &mut Vec::new());
        assert!(result.is_err());

        let result = select_with_io("How?", &[], 0, &mut Cursor::new(b"1\n"), &mut Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn ask_text_trims_answer() -> Result<()> {
        let mut output = Vec::new();
        let answer = ask_text_with_io(
            "Breaking changes:",
            &mut Cursor::new(b"  renamed load()  \n"),
            &mut output,
        )?;
        assert_eq!(answer, "renamed load()");
        assert_eq!(String::from_utf8(output)?, "Breaking changes: ");
        Ok(())
    }
}
