use std::io;

use dialoguer::FuzzySelect;
use dialoguer::theme::ColorfulTheme;

/// Interactive choice among candidate names.
pub trait Picker {
    /// Returns the chosen index, or `None` when the user aborts.
    fn pick(&mut self, prompt: &str, items: &[String]) -> io::Result<Option<usize>>;
}

/// Type-to-filter list on the terminal.
#[derive(Debug, Default)]
pub struct FuzzyPicker;

impl Picker for FuzzyPicker {
    fn pick(&mut self, prompt: &str, items: &[String]) -> io::Result<Option<usize>> {
        let choice = FuzzySelect::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact_opt();

        match choice {
            Ok(choice) => Ok(choice),
            // Ctrl+C at the prompt counts as aborting the choice
            Err(dialoguer::Error::IO(e)) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(io::Error::other(e)),
        }
    }
}
