//! Line commands read from stdin while `pulsegrid play` runs.
//!
//! Rows and columns are 1-based on the command line.

use pulsegrid_core::{SoundId, COLUMNS, ROWS};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Toggle,
    Tempo(f64),
    Set {
        row: usize,
        column: usize,
        id: SoundId,
    },
    ClearCell {
        row: usize,
        column: usize,
    },
    ClearAll,
    Template,
    Preview(SoundId),
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  start | stop | toggle      transport
  tempo <bpm>                set tempo (72-148)
  set <row> <col> <id>       bind a sound to a cell
  clear <row> <col>          empty a cell
  clear                      empty the whole grid
  template                   reset the grid to the catalog template
  preview <id>               play one sound now
  show                       print the grid
  help                       this text
  quit                       exit";

fn parse_index(value: Option<&str>, what: &str, max: usize) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("missing {what}"))?;
    let n: usize = value
        .parse()
        .map_err(|_| format!("{what} must be a number, got '{value}'"))?;
    if n == 0 || n > max {
        return Err(format!("{what} must be between 1 and {max}"));
    }
    Ok(n - 1)
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "start" | "play" => Command::Start,
        "stop" => Command::Stop,
        "toggle" | "t" => Command::Toggle,
        "tempo" | "bpm" => {
            let value = words.next().ok_or("missing tempo")?;
            let bpm = value
                .parse::<f64>()
                .map_err(|_| format!("tempo must be a number, got '{value}'"))?;
            Command::Tempo(bpm)
        }
        "set" => {
            let row = parse_index(words.next(), "row", ROWS)?;
            let column = parse_index(words.next(), "column", COLUMNS)?;
            let id = words.next().ok_or("missing sound id")?;
            Command::Set {
                row,
                column,
                id: SoundId::from(id),
            }
        }
        "clear" => match words.next() {
            None => Command::ClearAll,
            Some(row) => {
                let row = parse_index(Some(row), "row", ROWS)?;
                let column = parse_index(words.next(), "column", COLUMNS)?;
                Command::ClearCell { row, column }
            }
        },
        "template" | "reset" => Command::Template,
        "preview" | "p" => {
            let id = words.next().ok_or("missing sound id")?;
            Command::Preview(SoundId::from(id))
        }
        "show" | "s" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };

    if let Some(extra) = words.next() {
        return Err(format!("unexpected argument '{extra}'"));
    }
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport() {
        assert_eq!(parse("start"), Ok(Some(Command::Start)));
        assert_eq!(parse("  STOP "), Ok(Some(Command::Stop)));
        assert_eq!(parse("t"), Ok(Some(Command::Toggle)));
        assert_eq!(parse("tempo 96"), Ok(Some(Command::Tempo(96.0))));
        assert_eq!(parse(""), Ok(None));
    }

    #[test]
    fn test_parse_cells_are_one_based() {
        assert_eq!(
            parse("set 1 8 kick"),
            Ok(Some(Command::Set {
                row: 0,
                column: 7,
                id: "kick".into()
            }))
        );
        assert_eq!(
            parse("clear 5 1"),
            Ok(Some(Command::ClearCell { row: 4, column: 0 }))
        );
        assert_eq!(parse("clear"), Ok(Some(Command::ClearAll)));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse("set 0 1 kick").is_err());
        assert!(parse("set 6 1 kick").is_err());
        assert!(parse("set 1 9 kick").is_err());
        assert!(parse("set 1 1").is_err());
        assert!(parse("tempo fast").is_err());
        assert!(parse("stop now").is_err());
        assert!(parse("dance").is_err());
    }
}
