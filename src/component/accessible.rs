//! Line-oriented prompts for terminals where a full-screen widget is not
//! wanted: screen readers, nested sessions, redirected stdin.
//!
//! Every kind reads plain lines from `input` and writes plain text to `out`.
//! End of input at any prompt counts as cancellation. Invalid answers are
//! reported and asked again.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::{BufRead, Write};
use std::path::Path;

use super::fuzzy::rank;
use super::spin::run_captured;
use super::{
    parse_options, ChooseOptions, ComponentKind, ComponentValue, ConfirmOptions, FileOptions,
    FilterOptions, InputOptions, PagerOptions, SpinOptions, TableOptions, TableSelection,
    WriteOptions,
};
use crate::error::TuiError;

/// Prompt for `kind` configured by wire `options`.
pub fn prompt<R, W>(
    kind: ComponentKind,
    options: Value,
    input: &mut R,
    out: &mut W,
) -> Result<ComponentValue>
where
    R: BufRead,
    W: Write,
{
    let mut io = LineIo { input, out };
    let value = match kind {
        ComponentKind::Input => io.input(parse_options(kind, options)?)?,
        ComponentKind::Write => io.write(parse_options(kind, options)?)?,
        ComponentKind::Confirm => io.confirm(parse_options(kind, options)?)?,
        ComponentKind::Choose => io.choose(parse_options(kind, options)?)?,
        ComponentKind::Filter => io.filter(parse_options(kind, options)?)?,
        ComponentKind::File => io.file(parse_options(kind, options)?)?,
        ComponentKind::Table => io.table(parse_options(kind, options)?)?,
        ComponentKind::Pager => io.pager(parse_options(kind, options)?)?,
        ComponentKind::Spin => io.spin(parse_options(kind, options)?)?,
    };
    io.out.flush().context("Failed to flush prompt output")?;
    Ok(value)
}

struct LineIo<'a, R, W> {
    input: &'a mut R,
    out: &'a mut W,
}

impl<R: BufRead, W: Write> LineIo<'_, R, W> {
    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text).context("Failed to write prompt")
    }

    fn heading(&mut self, title: &str, description: &str) -> Result<()> {
        if !title.is_empty() {
            self.say(title)?;
        }
        if !description.is_empty() {
            self.say(description)?;
        }
        Ok(())
    }

    /// Print `label` and read one line without its terminator.
    fn ask(&mut self, label: &str) -> Result<String> {
        write!(self.out, "{}", label).context("Failed to write prompt")?;
        self.out.flush().context("Failed to flush prompt")?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read answer")?;
        if read == 0 {
            return Err(TuiError::Cancelled.into());
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(line)
    }

    fn input(&mut self, opts: InputOptions) -> Result<ComponentValue> {
        self.heading(&opts.title, &opts.description)?;
        let label = if opts.value.is_empty() {
            "> ".to_string()
        } else {
            format!("[{}] > ", opts.value)
        };
        loop {
            let mut answer = self.ask(&label)?;
            if answer.is_empty() {
                answer = opts.value.clone();
            }
            let count = answer.chars().count();
            if opts.char_limit > 0 && count > opts.char_limit {
                self.say(&format!("At most {} characters, got {}.", opts.char_limit, count))?;
                continue;
            }
            return Ok(ComponentValue::Text(answer));
        }
    }

    fn write(&mut self, opts: WriteOptions) -> Result<ComponentValue> {
        self.heading(&opts.title, &opts.description)?;
        self.say("Enter text. Finish with a line containing only \".\".")?;
        let mut lines = Vec::new();
        loop {
            match self.ask("") {
                Ok(line) if line == "." => break,
                Ok(line) => lines.push(line),
                Err(err) if crate::error::is_cancellation(&err) && !lines.is_empty() => break,
                Err(err) => return Err(err),
            }
        }
        let mut text = lines.join("\n");
        if opts.char_limit > 0 {
            text = text.chars().take(opts.char_limit).collect();
        }
        Ok(ComponentValue::Text(text))
    }

    fn confirm(&mut self, opts: ConfirmOptions) -> Result<ComponentValue> {
        self.heading(&opts.title, &opts.description)?;
        let hint = if opts.default { "[Y/n]" } else { "[y/N]" };
        loop {
            let answer = self.ask(&format!("{} ", hint))?;
            match answer.trim().to_lowercase().as_str() {
                "" => return Ok(ComponentValue::Bool(opts.default)),
                "y" | "yes" => return Ok(ComponentValue::Bool(true)),
                "n" | "no" => return Ok(ComponentValue::Bool(false)),
                _ => self.say("Please answer y or n.")?,
            }
        }
    }

    fn list(&mut self, items: &[String]) -> Result<()> {
        for (i, item) in items.iter().enumerate() {
            self.say(&format!("{:>3}) {}", i + 1, item))?;
        }
        Ok(())
    }

    /// Read 1-based numbers separated by commas or spaces, keeping the order
    /// they were typed in. `None` when the answer is not a list of numbers.
    fn parse_picks(answer: &str, count: usize) -> Option<Vec<usize>> {
        let mut picks = Vec::new();
        for part in answer.split([',', ' ']).filter(|p| !p.is_empty()) {
            let n: usize = part.parse().ok()?;
            if n == 0 || n > count {
                return None;
            }
            if !picks.contains(&(n - 1)) {
                picks.push(n - 1);
            }
        }
        (!picks.is_empty()).then_some(picks)
    }

    fn pick(&mut self, items: &[String], multi: bool, limit: usize) -> Result<Vec<String>> {
        let label = if multi {
            "Numbers, separated by commas: "
        } else {
            "Number: "
        };
        loop {
            let answer = self.ask(label)?;
            match Self::parse_picks(&answer, items.len()) {
                Some(picks) if !multi && picks.len() > 1 => self.say("Pick one number.")?,
                Some(picks) if limit > 0 && picks.len() > limit => {
                    self.say(&format!("Pick at most {}.", limit))?;
                }
                Some(picks) => return Ok(picks.into_iter().map(|i| items[i].clone()).collect()),
                None => self.say(&format!("Enter numbers between 1 and {}.", items.len()))?,
            }
        }
    }

    fn choose(&mut self, opts: ChooseOptions) -> Result<ComponentValue> {
        self.heading(&opts.title, &opts.description)?;
        if opts.options.is_empty() {
            return Ok(ComponentValue::List(Vec::new()));
        }
        self.list(&opts.options)?;
        let multi = opts.no_limit || opts.limit > 1;
        let limit = if opts.no_limit { 0 } else { opts.limit };
        let mut picked = self.pick(&opts.options, multi, limit)?;
        if opts.ordered {
            picked.sort_by_key(|p| opts.options.iter().position(|o| o == p));
        }
        Ok(ComponentValue::List(picked))
    }

    fn filter(&mut self, opts: FilterOptions) -> Result<ComponentValue> {
        self.heading(&opts.title, &opts.description)?;
        if opts.options.is_empty() {
            return Ok(ComponentValue::List(Vec::new()));
        }
        loop {
            let query = self.ask("Filter: ")?;
            let matches: Vec<String> = rank(&opts.options, &query, opts.fuzzy, opts.sort)
                .into_iter()
                .filter_map(|m| opts.options.get(m.index).cloned())
                .collect();
            if matches.is_empty() {
                if !opts.strict && !query.is_empty() {
                    return Ok(ComponentValue::List(vec![query]));
                }
                self.say("No matches.")?;
                continue;
            }
            self.list(&matches)?;
            let multi = opts.no_limit || opts.limit > 1;
            let limit = if opts.no_limit { 0 } else { opts.limit };
            return Ok(ComponentValue::List(self.pick(&matches, multi, limit)?));
        }
    }

    fn file(&mut self, mut opts: FileOptions) -> Result<ComponentValue> {
        self.heading(&opts.title, &opts.description)?;
        if !opts.file_allowed && !opts.dir_allowed {
            opts.file_allowed = true;
        }
        let base = Path::new(&opts.path);
        loop {
            let answer = self.ask("Path: ")?;
            let path = base.join(answer.trim());
            let ok = (opts.file_allowed && path.is_file()) || (opts.dir_allowed && path.is_dir());
            if ok {
                return Ok(ComponentValue::Text(path.display().to_string()));
            }
            self.say(&format!("Not a selectable path: {}", path.display()))?;
        }
    }

    fn table(&mut self, mut opts: TableOptions) -> Result<ComponentValue> {
        if opts.rows.is_empty() && !opts.csv.is_empty() {
            opts.load_csv();
        }
        self.heading(&opts.title, "")?;
        if opts.rows.is_empty() {
            return Ok(ComponentValue::TableRow(TableSelection::none()));
        }
        let header: Vec<&str> = opts.columns.iter().map(|c| c.title()).collect();
        if header.iter().any(|t| !t.is_empty()) {
            self.say(&format!("     {}", header.join(" | ")))?;
        }
        let rows: Vec<String> = opts.rows.iter().map(|r| r.join(" | ")).collect();
        self.list(&rows)?;
        let picked = loop {
            let answer = self.ask("Row number: ")?;
            match Self::parse_picks(&answer, rows.len()) {
                Some(picks) if picks.len() == 1 => break picks[0],
                _ => self.say(&format!("Enter a number between 1 and {}.", rows.len()))?,
            }
        };
        Ok(ComponentValue::TableRow(TableSelection {
            selected_index: picked as i64,
            selected_row: opts.rows[picked].clone(),
        }))
    }

    fn pager(&mut self, opts: PagerOptions) -> Result<ComponentValue> {
        self.heading(&opts.title, "")?;
        for (i, line) in opts.content.lines().enumerate() {
            if opts.show_line_numbers {
                self.say(&format!("{:>4} {}", i + 1, line))?;
            } else {
                self.say(line)?;
            }
        }
        Ok(ComponentValue::None)
    }

    fn spin(&mut self, opts: SpinOptions) -> Result<ComponentValue> {
        if !opts.title.is_empty() {
            self.say(&format!("{}...", opts.title))?;
        }
        Ok(ComponentValue::Spin(run_captured(&opts.command)))
    }
}
