use glossary_core::OverwritePrompt;
use std::io::{BufRead, Write};

/// Asks on the terminal before overwriting an existing term.
///
/// The read blocks, so it runs through `block_in_place` to leave the Ctrl-C handler
/// free to cancel the run. Requires the multi-threaded runtime.
pub struct StdinPrompt;

impl OverwritePrompt for StdinPrompt {
    fn confirm_overwrite(&self, name_path: &[String]) -> bool {
        tokio::task::block_in_place(|| {
            let stdin = std::io::stdin();
            let stderr = std::io::stderr();
            ask(&mut stdin.lock(), &mut stderr.lock(), name_path)
        })
    }
}

/// Repeats the question until the answer is `y` or `n`. End of input declines.
pub fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, name_path: &[String]) -> bool {
    loop {
        let _ = writeln!(
            output,
            "Glossary term {} already exists, do you want to update it? [y/n]",
            name_path.join("->")
        );
        let _ = output.flush();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }

        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return true,
            "n" | "no" => return false,
            _ => continue,
        }
    }
}
