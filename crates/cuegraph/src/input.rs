use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cuegraph_core::{CueSheet, SheetKind, SheetTitle, ShowCue, TimedEvent};

/// Strips whitespace and surrounding single quotes, as left by dragging a file into a terminal.
pub fn clean_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(trimmed);
    PathBuf::from(unquoted)
}

/// The sheet files to import: `path` itself, or every `.csv` file in it when it is a directory.
pub fn discover(path: &Path, kind: SheetKind) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        if !path.exists() {
            bail!("{} does not exist", path.display());
        }
        return Ok(vec![path.to_path_buf()]);
    }
    if kind == SheetKind::Show {
        bail!("show sheets are imported one file at a time, {} is a directory", path.display());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path).with_context(|| format!("reading {}", path.display()))? {
        let file = entry?.path();
        let is_csv = file
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && file.is_file() {
            files.push(file);
        }
    }
    files.sort();

    if files.is_empty() {
        bail!("no .csv files found in {}", path.display());
    }
    Ok(files)
}

pub fn load_sheets(files: &[PathBuf], kind: SheetKind) -> Result<Vec<CueSheet>> {
    files
        .iter()
        .map(|file| {
            let content =
                fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
            let title = SheetTitle::from_stem(
                &file
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            let sheet = match kind {
                SheetKind::Song => parse_song(title, &content),
                SheetKind::Show => parse_show(title, &content),
            };
            sheet.with_context(|| format!("parsing {}", file.display()))
        })
        .collect()
}

/// Reads every non-blank record with the line it starts on.
fn read_records(mut reader: csv::Reader<&[u8]>) -> Result<Vec<(usize, csv::StringRecord)>> {
    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("failed to read row {}", idx + 1))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(idx + 1);
        records.push((line, record));
    }
    Ok(records)
}

/// Tab separated `name, start, duration` rows after a header line. Missing columns are left blank
/// so that validation reports them against their line.
pub fn parse_song(title: SheetTitle, content: &str) -> Result<CueSheet> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let events = read_records(reader)?
        .into_iter()
        .map(|(line, record)| {
            let column = |i: usize| record.get(i).unwrap_or_default();
            TimedEvent::new(column(0), column(1), column(2)).at_line(line)
        })
        .collect();

    Ok(CueSheet::Song { title, events })
}

/// Comma separated rows without a header: a group key then cue names. Rows sharing a key add
/// to the same group, which keeps the position of its first row.
pub fn parse_show(title: SheetTitle, content: &str) -> Result<CueSheet> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut cues: Vec<ShowCue> = Vec::new();
    for (line, record) in read_records(reader)? {
        let key = record.get(0).unwrap_or_default();
        if key.is_empty() {
            continue;
        }
        let names = record
            .iter()
            .skip(1)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        match cues.iter_mut().find(|cue| cue.key == key) {
            Some(cue) => cue.names.extend(names),
            None => cues.push(ShowCue {
                key: key.to_string(),
                names: names.collect(),
                line,
            }),
        }
    }

    Ok(CueSheet::Show { title, cues })
}
