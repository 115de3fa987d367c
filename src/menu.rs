use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::schema::SuiteKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    SystemInfo,
    Demo,
    Suite(SuiteKind),
    RunAll,
    Charts,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::SystemInfo),
            "2" => Some(Self::Demo),
            "3" => Some(Self::Suite(SuiteKind::Triangles)),
            "4" => Some(Self::Suite(SuiteKind::Lighting)),
            "5" => Some(Self::Suite(SuiteKind::Textures)),
            "6" => Some(Self::RunAll),
            "7" => Some(Self::Charts),
            "0" => Some(Self::Exit),
            _ => None,
        }
    }
}

const MENU_TEXT: &str = "\
1. System information
2. Quick demo
3. Triangle benchmark
4. Lighting benchmark
5. Texture benchmark
6. Run all benchmarks
7. Generate charts
0. Exit";

/// Interactive loop until `0` or end of input. A failing action is reported
/// and the menu is shown again.
pub fn run_menu<R, W, F>(input: &mut R, output: &mut W, mut dispatch: F) -> Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(MenuChoice) -> Result<()>,
{
    loop {
        writeln!(output)?;
        writeln!(output, "{}", "=".repeat(40))?;
        writeln!(output, "GLBENCH")?;
        writeln!(output, "{}", "=".repeat(40))?;
        writeln!(output, "{}", MENU_TEXT)?;

        let choice = loop {
            write!(output, "Choose an option: ")?;
            output.flush()?;

            let mut line = String::new();
            let read = input
                .read_line(&mut line)
                .context("failed to read menu choice")?;
            if read == 0 {
                writeln!(output)?;
                return Ok(());
            }

            match MenuChoice::parse(&line) {
                Some(choice) => break choice,
                None => writeln!(output, "Invalid option '{}', enter 0-7.", line.trim())?,
            }
        };

        if choice == MenuChoice::Exit {
            writeln!(output, "Bye.")?;
            return Ok(());
        }

        if let Err(error) = dispatch(choice) {
            writeln!(output, "Error: {:#}", error)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::io::Cursor;

    fn drive(script: &str, fail_on: Option<MenuChoice>) -> (Vec<MenuChoice>, String) {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        let mut seen = Vec::new();
        run_menu(&mut input, &mut output, |choice| {
            seen.push(choice);
            if Some(choice) == fail_on {
                bail!("simulated failure");
            }
            Ok(())
        })
        .expect("menu should exit cleanly");
        (seen, String::from_utf8(output).expect("menu output is utf-8"))
    }

    #[test]
    fn every_choice_maps_to_an_action() {
        let (seen, _) = drive("1\n2\n3\n4\n5\n6\n7\n0\n", None);
        assert_eq!(
            seen,
            vec![
                MenuChoice::SystemInfo,
                MenuChoice::Demo,
                MenuChoice::Suite(SuiteKind::Triangles),
                MenuChoice::Suite(SuiteKind::Lighting),
                MenuChoice::Suite(SuiteKind::Textures),
                MenuChoice::RunAll,
                MenuChoice::Charts,
            ]
        );
    }

    #[test]
    fn invalid_input_reprompts() {
        let (seen, output) = drive("9\nabc\n\n 7 \n0\n", None);
        assert_eq!(seen, vec![MenuChoice::Charts]);
        assert_eq!(output.matches("Invalid option").count(), 3);
    }

    #[test]
    fn end_of_input_exits() {
        let (seen, output) = drive("1\n", None);
        assert_eq!(seen, vec![MenuChoice::SystemInfo]);
        assert!(!output.contains("Bye."));
    }

    #[test]
    fn failures_are_reported_and_menu_continues() {
        let (seen, output) = drive("7\n1\n0\n", Some(MenuChoice::Charts));
        assert_eq!(seen, vec![MenuChoice::Charts, MenuChoice::SystemInfo]);
        assert!(output.contains("Error: simulated failure"));
        assert!(output.contains("Bye."));
    }
}
