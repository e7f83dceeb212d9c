//! Strict parser for `vercel teams ls` output.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::VercelError;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*id\s+email / name\s*$").unwrap());
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(✔)?\s*(\S+)\s+(\S.*?)\s*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub slug: String,
    pub name: String,
    pub is_current: bool,
}

/// Teams keyed by slug, with at most one current team.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamDirectory {
    by_slug: BTreeMap<String, Team>,
    current: Option<String>,
}

impl TeamDirectory {
    pub fn contains(&self, slug: &str) -> bool {
        self.by_slug.contains_key(slug)
    }

    pub fn current(&self) -> Option<&Team> {
        self.current.as_deref().and_then(|slug| self.by_slug.get(slug))
    }

    pub fn len(&self) -> usize {
        self.by_slug.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slug.is_empty()
    }
}

/// Parse the table printed by `teams ls`.
///
/// Blank lines are skipped. The first remaining line must be the header.
/// Any malformed row, duplicate slug or second current team rejects the
/// whole listing.
pub fn parse_team_list(output: &str) -> Result<TeamDirectory, VercelError> {
    let mut lines = output.lines().map(str::trim).filter(|line| !line.is_empty());

    if !lines.next().is_some_and(|header| HEADER_RE.is_match(header)) {
        return Err(VercelError::malformed("malformed header row", output));
    }

    let mut directory = TeamDirectory::default();
    for line in lines {
        let caps = ROW_RE
            .captures(line)
            .ok_or_else(|| VercelError::malformed("malformed team row", output))?;
        let team = Team {
            slug: caps[2].to_string(),
            name: caps[3].to_string(),
            is_current: caps.get(1).is_some(),
        };
        if directory.by_slug.contains_key(&team.slug) {
            return Err(VercelError::malformed("duplicate id", output));
        }
        if team.is_current {
            if directory.current.is_some() {
                return Err(VercelError::malformed("multiple current teams", output));
            }
            directory.current = Some(team.slug.clone());
        }
        directory.by_slug.insert(team.slug.clone(), team);
    }
    Ok(directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const LISTING: &str = "\n  id                email / name\n✔ acme-web          Acme Web\n  side-project      sideproj\n";

    fn reason(err: &VercelError) -> String {
        match err {
            VercelError::MalformedOutput { reason, .. } => reason.clone(),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn parses_rows_and_current_team() {
        let directory = parse_team_list(LISTING).expect("parse");
        assert_eq!(directory.len(), 2);
        let current = directory.current().expect("current team");
        assert_eq!(current.slug, "acme-web");
        assert_eq!(current.name, "Acme Web");
        assert!(directory.contains("side-project"));
    }

    #[test]
    fn header_only_is_empty_directory() {
        let directory = parse_team_list("id  email / name\n").expect("parse");
        assert!(directory.is_empty());
        assert!(directory.current().is_none());
    }

    #[test]
    fn header_mismatch_is_malformed() {
        let err = parse_team_list("slug name\nacme Acme\n").expect_err("bad header");
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
        assert_eq!(reason(&err), "malformed header row");
        assert!(err.to_string().starts_with("Unexpected output - malformed header row\n"));
    }

    #[test]
    fn single_token_row_is_malformed() {
        let err = parse_team_list("id email / name\nlonely\n").expect_err("bad row");
        assert_eq!(reason(&err), "malformed team row");
    }

    #[test]
    fn duplicate_slug_is_malformed() {
        let err =
            parse_team_list("id email / name\nacme One\nacme Two\n").expect_err("duplicate");
        assert_eq!(reason(&err), "duplicate id");
    }

    #[test]
    fn second_current_team_is_malformed() {
        let err = parse_team_list("id email / name\n✔ a A\n✔ b B\n").expect_err("two current");
        assert_eq!(reason(&err), "multiple current teams");
    }
}
