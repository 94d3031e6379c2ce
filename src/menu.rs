//! Numbered interactive menu.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    SingleSensorTest,
    AllSensorsTest,
    GpioTest,
    ShowConfig,
    Exit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 5] = [
        MenuChoice::SingleSensorTest,
        MenuChoice::AllSensorsTest,
        MenuChoice::GpioTest,
        MenuChoice::ShowConfig,
        MenuChoice::Exit,
    ];

    pub fn number(self) -> usize {
        match self {
            MenuChoice::SingleSensorTest => 1,
            MenuChoice::AllSensorsTest => 2,
            MenuChoice::GpioTest => 3,
            MenuChoice::ShowConfig => 4,
            MenuChoice::Exit => 5,
        }
    }
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuChoice::SingleSensorTest => "Single sensor test",
            MenuChoice::AllSensorsTest => "All sensors test",
            MenuChoice::GpioTest => "Basic GPIO test",
            MenuChoice::ShowConfig => "Show configuration only",
            MenuChoice::Exit => "Exit",
        };
        write!(f, "{}. {label}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidChoice(pub String);

impl fmt::Display for InvalidChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid choice {:?}, expected 1-{}", self.0, MenuChoice::ALL.len())
    }
}

impl std::error::Error for InvalidChoice {}

impl FromStr for MenuChoice {
    type Err = InvalidChoice;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        trimmed
            .parse::<usize>()
            .ok()
            .and_then(|number| {
                MenuChoice::ALL
                    .into_iter()
                    .find(|choice| choice.number() == number)
            })
            .ok_or_else(|| InvalidChoice(trimmed.to_string()))
    }
}

/// Prints the menu to `output` and parses one line from `input`.
///
/// End of input counts as [`MenuChoice::Exit`].
pub fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> io::Result<Result<MenuChoice, InvalidChoice>> {
    writeln!(output, "\nSelect an option:")?;
    for choice in MenuChoice::ALL {
        writeln!(output, "{choice}")?;
    }
    write!(output, "\nChoice (1-{}): ", MenuChoice::ALL.len())?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(Ok(MenuChoice::Exit));
    }
    Ok(line.parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_number() {
        for choice in MenuChoice::ALL {
            assert_eq!(choice.number().to_string().parse::<MenuChoice>(), Ok(choice));
        }
    }

    #[test]
    fn rejects_out_of_range_and_text() {
        assert_eq!("6".parse::<MenuChoice>(), Err(InvalidChoice("6".into())));
        assert!("two".parse::<MenuChoice>().is_err());
        assert!("".parse::<MenuChoice>().is_err());
    }

    #[test]
    fn prompt_lists_options_and_reads_choice() {
        let mut input = io::Cursor::new(" 2 \n");
        let mut output: Vec<u8> = Vec::new();
        let choice = prompt(&mut input, &mut output).unwrap();
        assert_eq!(choice, Ok(MenuChoice::AllSensorsTest));
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("1. Single sensor test"));
        assert!(shown.contains("5. Exit"));
    }

    #[test]
    fn end_of_input_exits() {
        let mut input = io::Cursor::new("");
        let choice = prompt(&mut input, &mut Vec::<u8>::new()).unwrap();
        assert_eq!(choice, Ok(MenuChoice::Exit));
    }
}
