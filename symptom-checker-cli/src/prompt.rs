//! Line-oriented input parsing for the terminal wizard.

/// Navigation words accepted on every screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Back,
    Restart,
    Quit,
}

pub fn parse_command(input: &str) -> Option<Command> {
    match input.trim().to_ascii_lowercase().as_str() {
        ":back" | ":b" => Some(Command::Back),
        ":restart" => Some(Command::Restart),
        ":quit" | ":q" => Some(Command::Quit),
        _ => None,
    }
}

pub fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// A 1-based menu pick, or an option typed out in full (case-insensitive)
pub fn parse_choice<'a>(input: &str, options: &[&'a str]) -> Option<&'a str> {
    let input = input.trim();
    if let Ok(index) = input.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| options.get(i)).copied();
    }
    options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(input))
        .copied()
}

/// Edits on the symptoms screen: `+Cough`, `-Cough`, or a bare name to add
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymptomEdit {
    Add(String),
    Remove(String),
}

pub fn parse_symptom_edits(input: &str) -> Vec<SymptomEdit> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.strip_prefix('-') {
            Some(name) => SymptomEdit::Remove(name.trim().to_string()),
            None => SymptomEdit::Add(item.trim_start_matches('+').trim().to_string()),
        })
        .collect()
}

pub fn menu(options: &[&str]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("  {}. {}", i + 1, option))
        .collect::<Vec<_>>()
        .join("\n")
}
