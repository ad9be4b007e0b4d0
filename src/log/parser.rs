//! Parser for verbose change-log text.
//!
//! Reads the classic `svn log -v` layout: revisions separated by dashed
//! lines, an `rN | author | date | n lines` header, an optional
//! `Changed paths:` block with one action letter per line, then the log
//! message. The parsed file acts as an offline [`LogSource`].

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::DateTime;
use regex::Regex;

use crate::log::cache::{LogReceiver, LogSource, RawChange};
use crate::log::record::{ACTION_LETTERS, Revision, StandardRevProps};

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^r(\d+) \| ([^|]*) \| ([^|(]*)(?:\([^)]*\) )?\| \d+ lines?").unwrap()
});

static CHANGED_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {3}([A-Z]) (.+?)(?: \(from (.+):(\d+)\))?$").unwrap()
});

fn is_separator(line: &str) -> bool {
    line.len() >= 5 && line.bytes().all(|b| b == b'-')
}

#[derive(Debug)]
struct ParsedRevision {
    revision: Revision,
    props: StandardRevProps,
    changes: Vec<RawChange>,
}

/// A fully parsed log file, usable as an offline log source.
#[derive(Debug)]
pub struct LogFile {
    root: String,
    revisions: Vec<ParsedRevision>,
}

impl LogFile {
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with_root(text, "")
    }

    pub fn parse_with_root(text: &str, root: &str) -> Result<Self> {
        let mut revisions = Vec::new();
        let mut lines = text.lines().peekable();

        while let Some(line) = lines.next() {
            if line.trim().is_empty() || is_separator(line) {
                continue;
            }
            let parsed = Self::parse_revision(line, &mut lines)
                .with_context(|| format!("malformed log entry starting at: {line:?}"))?;
            revisions.push(parsed);
        }

        // log files may list revisions newest-first
        revisions.sort_by_key(|r| r.revision);
        Ok(Self {
            root: root.to_string(),
            revisions,
        })
    }

    fn parse_revision<'a>(
        header: &str,
        lines: &mut std::iter::Peekable<impl Iterator<Item = &'a str>>,
    ) -> Result<ParsedRevision> {
        let captures = HEADER
            .captures(header)
            .with_context(|| format!("expected a revision header, got {header:?}"))?;
        let revision: Revision = captures[1].parse()?;
        let author = captures[2].trim().to_string();
        let date = DateTime::parse_from_str(captures[3].trim(), "%Y-%m-%d %H:%M:%S %z")
            .with_context(|| format!("bad date in revision {revision}"))?;

        let mut changes = Vec::new();
        if lines.peek().is_some_and(|l| l.trim() == "Changed paths:") {
            lines.next();
            while let Some(line) = lines.peek() {
                let Some(caps) = CHANGED_PATH.captures(line) else {
                    break;
                };
                let letter = caps[1].chars().next().unwrap();
                let action = *ACTION_LETTERS
                    .get(&letter)
                    .with_context(|| format!("unknown action {letter:?} in revision {revision}"))?;
                let copy_from = caps
                    .get(3)
                    .map(|m| Ok::<_, std::num::ParseIntError>((m.as_str().to_string(), caps[4].parse()?)))
                    .transpose()?;
                changes.push(RawChange::new(action, caps[2].to_string(), copy_from));
                lines.next();
            }
        }

        // the message runs until the next separator
        let mut message_lines = Vec::new();
        for line in lines.by_ref() {
            if is_separator(line) {
                break;
            }
            message_lines.push(line);
        }
        while message_lines.first().is_some_and(|l| l.trim().is_empty()) {
            message_lines.remove(0);
        }
        while message_lines.last().is_some_and(|l| l.trim().is_empty()) {
            message_lines.pop();
        }

        Ok(ParsedRevision {
            revision,
            props: StandardRevProps::new(author, date, message_lines.join("\n")),
            changes,
        })
    }
}

impl LogSource for LogFile {
    fn repository_root(&self) -> &str {
        &self.root
    }

    fn head_revision(&self) -> Revision {
        self.revisions.last().map(|r| r.revision).unwrap_or(0)
    }

    fn fetch_log(
        &self,
        _path: &str,
        start: Revision,
        end: Revision,
        receiver: &mut dyn LogReceiver,
    ) -> Result<()> {
        let (low, high) = (start.min(end), start.max(end));
        if self.revisions.is_empty() {
            bail!("log file contains no revisions");
        }
        for parsed in &self.revisions {
            if parsed.revision < low || parsed.revision > high {
                continue;
            }
            receiver.receive_log(&parsed.changes, parsed.revision, &parsed.props)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::cache::CachedLog;
    use crate::log::record::{ChangeAction, ChangeMask};
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
------------------------------------------------------------------------
r2 | alice | 2024-03-02 09:30:00 +0000 (Sat, 02 Mar 2024) | 1 line
Changed paths:
   A /branches/feature (from /trunk:1)

create feature branch
------------------------------------------------------------------------
r1 | bob | 2024-03-01 12:00:00 +0000 (Fri, 01 Mar 2024) | 2 lines
Changed paths:
   A /trunk
   A /trunk/README

initial import
second line
------------------------------------------------------------------------
";

    #[test]
    fn parses_revisions_in_ascending_order() {
        let log = LogFile::parse(SAMPLE).unwrap();
        assert_eq!(log.head_revision(), 2);

        let mut cache = CachedLog::new();
        log.fetch_log("/trunk", 2, 1, &mut cache).unwrap();

        let r1 = cache.revision(1).unwrap();
        assert_eq!(r1.props.author, "bob");
        assert_eq!(r1.props.message, "initial import\nsecond line");
        assert_eq!(r1.records.len(), 2);
        assert_eq!(r1.records[0].action, ChangeAction::Added);

        let r2 = cache.revision(2).unwrap();
        assert!(r2.mask.contains(ChangeMask::HAS_COPY_FROM));
        let (from, rev) = r2.records[0].copy_from.unwrap();
        assert_eq!(cache.dictionary().path(from), "/trunk");
        assert_eq!(rev, 1);
    }

    #[test]
    fn fetch_respects_the_revision_range() {
        let log = LogFile::parse(SAMPLE).unwrap();
        let mut cache = CachedLog::new();
        log.fetch_log("/trunk", 1, 1, &mut cache).unwrap();
        assert!(cache.revision(2).is_none());
        assert!(cache.revision(1).is_some());
    }

    #[test]
    fn rejects_garbage_headers() {
        let err = LogFile::parse("not a log\n").unwrap_err();
        assert!(format!("{err:#}").contains("revision header"));
    }

    #[test]
    fn paths_with_parentheses_do_not_confuse_the_copy_suffix() {
        let text = "\
------------------------------------------------------------------------
r1 | a | 2024-01-01 00:00:00 +0000 (Mon, 01 Jan 2024) | 1 line
Changed paths:
   A /trunk/dir (copy)/file

msg
------------------------------------------------------------------------
";
        let log = LogFile::parse(text).unwrap();
        let mut cache = CachedLog::new();
        log.fetch_log("/", 1, 1, &mut cache).unwrap();
        let r1 = cache.revision(1).unwrap();
        assert!(r1.records[0].copy_from.is_none());
        assert_eq!(cache.dictionary().path(r1.records[0].path), "/trunk/dir (copy)/file");
    }
}
