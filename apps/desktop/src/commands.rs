//! Line commands typed into the terminal session.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    /// Zero-based row index.
    Toggle(usize),
    /// Zero-based source and destination rows.
    Move { from: usize, to: usize },
    Scroll(isize),
    Render,
    Help,
    Quit,
    Invalid(String),
}

pub const HELP: &str = "\
/TERM        search (a lone / clears the filter)
x N          toggle selection of row N
m FROM TO    move row FROM to position TO
j / k        scroll down / up
r            redraw
q            quit";

fn row_number(raw: Option<&str>) -> Option<usize> {
    raw?.parse::<usize>().ok()?.checked_sub(1)
}

/// Parses one input line. Row numbers are shown and typed one-based.
pub fn parse_command(line: &str, page_height: usize) -> Command {
    if let Some(term) = line.trim_start().strip_prefix('/') {
        return Command::Search(term.trim().to_string());
    }

    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Command::Render;
    };
    let page = page_height.max(1) as isize;

    match head {
        "x" => match row_number(parts.next()) {
            Some(row) => Command::Toggle(row),
            None => Command::Invalid("usage: x N".into()),
        },
        "m" => match (row_number(parts.next()), row_number(parts.next())) {
            (Some(from), Some(to)) => Command::Move { from, to },
            _ => Command::Invalid("usage: m FROM TO".into()),
        },
        "j" => Command::Scroll(page),
        "k" => Command::Scroll(-page),
        "r" => Command::Render,
        "h" | "?" | "help" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command '{other}', type ? for help")),
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
