//! Interactive query session.

use crate::error::{PolarError, PolarResult};
use crate::polar::Polar;
use crate::query::{Query, ResultSet};
use camino::Utf8PathBuf;
use clap::Parser;
use polar_host_types::{Engine, EngineError};
use std::ffi::OsString;
use std::io::{self, BufRead, Write};

#[derive(Parser, Debug)]
#[command(name = "polar-repl", about = "Interactive policy query session")]
struct ReplArgs {
    /// Policy files to load before the first prompt.
    files: Vec<Utf8PathBuf>,
}

impl<E: Engine> Polar<E> {
    /// Run a session on stdin/stdout.
    ///
    /// With `load` (or `repl.autoload` in the settings), the process arguments
    /// are policy files to load first.
    pub fn repl(&mut self, load: bool) -> PolarResult<()> {
        if load || self.repl_settings().autoload {
            self.load_args(std::env::args_os())?;
        }
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_repl(stdin.lock(), stdout.lock())
    }

    /// Queue the files named on a `polar-repl [FILES]...` command line.
    ///
    /// The first item is the program name, as with `std::env::args_os`.
    pub fn load_args<I, T>(&mut self, args: I) -> PolarResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = ReplArgs::try_parse_from(args)
            .map_err(|e| PolarError::InvalidArguments(e.to_string()))?;
        self.load_files(args.files)
    }

    /// Read queries from `input` until EOF, printing results to `output`.
    ///
    /// Parse errors and failing queries are reported and the session goes on;
    /// only console IO failures and non-parse errors while opening a query
    /// end it.
    pub fn run_repl<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> PolarResult<()> {
        self.load_queued_files()?;
        let prompt = self.repl_settings().prompt.clone();

        let mut line = String::new();
        loop {
            write!(output, "{prompt}").map_err(PolarError::Console)?;
            output.flush().map_err(PolarError::Console)?;

            line.clear();
            if input.read_line(&mut line).map_err(PolarError::Console)? == 0 {
                return Ok(());
            }
            let text = line.trim_end_matches(['\n', '\r']);
            let text = text.strip_suffix(';').unwrap_or(text);
            if text.trim().is_empty() {
                continue;
            }

            let inner = match self.engine_mut().new_query_from_text(text) {
                Ok(inner) => inner,
                Err(EngineError::Parse(message)) => {
                    writeln!(output, "Parse error: {message}").map_err(PolarError::Console)?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let results: PolarResult<Vec<ResultSet>> =
                Query::new(inner, self.host().duplicate()).collect();
            write_results(&mut output, results).map_err(PolarError::Console)?;
        }
    }
}

fn write_results<W: Write>(output: &mut W, results: PolarResult<Vec<ResultSet>>) -> io::Result<()> {
    match results {
        Err(e) => writeln!(output, "{e}"),
        Ok(results) if results.is_empty() => writeln!(output, "false"),
        Ok(results) => {
            for result in results {
                if result.is_empty() {
                    writeln!(output, "true")?;
                } else {
                    writeln!(output, "{result}")?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::HostValue;
    use polar_host_test_util::{Script, ScriptedEngine};
    use std::collections::BTreeMap;

    #[test]
    fn args_name_policy_files() {
        let args = ReplArgs::try_parse_from(["polar-repl", "a.polar", "b.pol"]).expect("parse");
        assert_eq!(
            args.files,
            vec![Utf8PathBuf::from("a.polar"), Utf8PathBuf::from("b.pol")]
        );
    }

    #[test]
    fn unknown_flags_are_invalid_arguments() {
        let mut polar = Polar::with_factory(Script::new().factory());
        let err = polar
            .load_args(["polar-repl", "--verbose"])
            .expect_err("unknown flag");
        assert!(matches!(err, PolarError::InvalidArguments(_)));
    }

    #[test]
    fn bad_file_arguments_are_rejected() {
        let mut polar: Polar<ScriptedEngine> = Polar::new();
        let err = polar
            .load_args(["polar-repl", "notes.txt"])
            .expect_err("extension");
        assert!(matches!(err, PolarError::InvalidExtension { .. }));
    }

    #[test]
    fn results_print_false_true_or_bindings() {
        let mut out = Vec::new();
        write_results(&mut out, Ok(vec![])).expect("write");

        let mut bindings = BTreeMap::new();
        bindings.insert("x".to_string(), HostValue::from(1));
        write_results(
            &mut out,
            Ok(vec![ResultSet::default(), ResultSet::from(bindings)]),
        )
        .expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "false\ntrue\n{x: 1}\n");
    }
}
