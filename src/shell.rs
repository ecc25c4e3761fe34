//! A line-oriented command interpreter for driving an [`AvlSet`] by hand.
//!
//! Each line holds one command; blank lines and lines starting with `#` are ignored.
//!
//! | Command   | Alias      | Effect                                            |
//! |:----------|:-----------|:--------------------------------------------------|
//! | `i <key>` | `insert`   | inserts `key`                                     |
//! | `l <key>` | `lookup`   | prints `Y` if `key` is present, `N` otherwise     |
//! | `r <key>` | `remove`   | removes `key`, if present                         |
//! | `s`       | `size`     | prints the number of keys                         |
//! | `c`       | `clear`    | removes all keys                                  |
//! | `p`       | `print`    | prints the keys in ascending order                |
//! | `v`       | `sanity`   | prints the result of the structural sanity check  |
//! | `g`       | `graph`    | prints the tree in graphviz format                |
//!
//! Keys are signed 64-bit integers.

use std::{
    fmt,
    io::{BufRead, Write},
    str::FromStr,
};

use crate::{AvlSet, ParseError, ShellError};

/// A single driver command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Insert(i64),
    Lookup(i64),
    Remove(i64),
    Size,
    Clear,
    Print,
    Sanity,
    Graph,
}

impl Command {
    /// Returns `true` if the command may change the set.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::Insert(_) | Command::Remove(_) | Command::Clear
        )
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let op = words.next().unwrap_or_default();

        let mut key = || -> Result<i64, ParseError> {
            let word = words
                .next()
                .ok_or_else(|| ParseError::MissingKey(op.to_owned()))?;
            word.parse()
                .map_err(|_| ParseError::InvalidKey(word.to_owned()))
        };

        let command = match op {
            "i" | "insert" => Command::Insert(key()?),
            "l" | "lookup" => Command::Lookup(key()?),
            "r" | "remove" => Command::Remove(key()?),
            "s" | "size" => Command::Size,
            "c" | "clear" => Command::Clear,
            "p" | "print" => Command::Print,
            "v" | "sanity" => Command::Sanity,
            "g" | "graph" => Command::Graph,
            _ => return Err(ParseError::UnknownOperation(op.to_owned())),
        };

        let rest = words.collect::<Vec<_>>();
        if !rest.is_empty() {
            return Err(ParseError::TrailingInput(rest.join(" ")));
        }

        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Insert(key) => write!(f, "i {key}"),
            Command::Lookup(key) => write!(f, "l {key}"),
            Command::Remove(key) => write!(f, "r {key}"),
            Command::Size => f.write_str("s"),
            Command::Clear => f.write_str("c"),
            Command::Print => f.write_str("p"),
            Command::Sanity => f.write_str("v"),
            Command::Graph => f.write_str("g"),
        }
    }
}

/// Runs driver commands against an [`AvlSet<i64>`].
#[derive(Debug, Default)]
pub struct Shell {
    set: AvlSet<i64>,
    verify: bool,
}

impl Shell {
    /// Creates a shell over an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the shell check the tree's invariants after every mutating command.
    ///
    /// A failed check stops [`run`](Shell::run) with [`ShellError::Insane`].
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Returns the set driven by this shell.
    pub fn set(&self) -> &AvlSet<i64> {
        &self.set
    }

    /// Executes a single command, writing its output to `out`.
    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> Result<(), ShellError> {
        log::debug!("executing `{command}`");

        match command {
            Command::Insert(key) => {
                self.set.insert(key);
            }
            Command::Lookup(key) => {
                let found = self.set.lookup(&key) != self.set.cursor_end();
                writeln!(out, "{}", if found { "Y" } else { "N" })?;
            }
            Command::Remove(key) => {
                self.set.remove(&key);
            }
            Command::Size => writeln!(out, "{}", self.set.len())?,
            Command::Clear => self.set.clear(),
            Command::Print => {
                let keys = self
                    .set
                    .iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(out, "{keys}")?;
            }
            Command::Sanity => {
                if self.set.sanity_check() {
                    writeln!(out, "passed sanity check")?;
                } else {
                    writeln!(out, "failed sanity check")?;
                }
            }
            Command::Graph => {
                let mut graph = String::new();
                // Writing into a `String` cannot fail.
                let _ = self.set.dotgraph("avl", &mut graph);
                writeln!(out, "{graph}")?;
            }
        }

        if self.verify && command.is_mutating() {
            if let Err(violation) = self.set.check_invariants() {
                return Err(ShellError::Insane {
                    command: command.to_string(),
                    violation,
                });
            }
        }

        Ok(())
    }

    /// Reads commands from `input` line by line and executes them.
    ///
    /// Malformed lines are reported and skipped.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> Result<(), ShellError> {
        for (line_no, line) in input.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.parse::<Command>() {
                Ok(command) => self.execute(command, &mut out)?,
                Err(err) => log::warn!("line {}: {err}", line_no + 1),
            }
        }

        out.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str) -> String {
        let mut out = Vec::new();
        Shell::new()
            .verify(true)
            .run(script.as_bytes(), &mut out)
            .expect("script failed");
        String::from_utf8(out).expect("output is not UTF-8")
    }

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!("i 5".parse::<Command>(), Ok(Command::Insert(5)));
        assert_eq!("lookup -3".parse::<Command>(), Ok(Command::Lookup(-3)));
        assert_eq!("  r   7 ".parse::<Command>(), Ok(Command::Remove(7)));
        assert_eq!("sanity".parse::<Command>(), Ok(Command::Sanity));
        assert_eq!("s".parse::<Command>(), Ok(Command::Size));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(
            "x".parse::<Command>(),
            Err(ParseError::UnknownOperation("x".into()))
        );
        assert_eq!(
            "i".parse::<Command>(),
            Err(ParseError::MissingKey("i".into()))
        );
        assert_eq!(
            "i five".parse::<Command>(),
            Err(ParseError::InvalidKey("five".into()))
        );
        assert_eq!(
            "p 1".parse::<Command>(),
            Err(ParseError::TrailingInput("1".into()))
        );
    }

    #[test]
    fn drives_a_set() {
        let output = run("\
            # build a small tree
            i 5
            i 3
            i 8
            i 1
            i 4
            i 7
            i 9
            i 4
            p
            s
            l 4
            l 6
            r 5
            r 6
            p
            v
            c
            s
            v
        ");

        assert_eq!(
            output,
            "1 3 4 5 7 8 9\n7\nY\nN\n1 3 4 7 8 9\npassed sanity check\n0\npassed sanity check\n"
        );
    }

    #[test]
    fn skips_unknown_lines() {
        let output = run("i 1\nbogus\ni 2\np\n");

        assert_eq!(output, "1 2\n");
    }

    #[test]
    fn prints_a_graph() {
        let output = run("i 2\ni 1\ni 3\ng\n");

        assert!(output.starts_with("digraph \"graph-avl\""));
        assert!(output.contains("[label=\"2:=\"]"));
        assert!(output.contains("\"graphavl-2\" -> \"graphavl-1\";"));
    }
}
