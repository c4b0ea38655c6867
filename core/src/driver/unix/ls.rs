//! Parsers for `ls -dn` records and mount listings

use crate::error::ParseError;
use crate::io::{Attributes, FileType, Metadata, Mount, Permissions, UnixAttributes};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

/// Date layout printed by the dialect's `ls`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// `Mar 14 2019` or `Mar 14 10:21`
    Abbreviated,
    /// `2024-01-15 10:30:00.123456789 +0000` (`--full-time`)
    FullIso,
    /// `Jan 15 10:30:00 2024` (`-T`)
    Seconds,
}

impl DateStyle {
    fn token_count(&self) -> usize {
        match self {
            DateStyle::Abbreviated | DateStyle::FullIso => 3,
            DateStyle::Seconds => 4,
        }
    }
}

/// Layout of the dialect's mount listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountFormat {
    /// AIX `mount`: two header lines, optional node column
    AixMount,
    /// Solaris `/etc/mnttab`
    Mnttab,
    /// Linux `/proc/mounts`
    ProcMounts,
    /// BSD `mount`: `dev on /path (type, options)`
    BsdMount,
}

/// Whitespace tokenizer that can hand back the untouched remainder
struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start();
        if trimmed.is_empty() {
            return None;
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let (token, rest) = trimmed.split_at(end);
        self.rest = rest;
        Some(token)
    }

    fn remainder(&self) -> &'a str {
        self.rest.trim_start()
    }
}

fn malformed(line: &str, reason: &str) -> ParseError {
    ParseError::Malformed {
        line: line.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse one `ls -dn` line.
///
/// Owner ids that do not fit are kept as unknown; an unreadable date
/// leaves the modification time unset.
pub fn parse_ls_line(
    line: &str,
    style: DateStyle,
    now: DateTime<Utc>,
) -> Result<Metadata, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut chars = line.chars();
    let file_type = chars
        .next()
        .and_then(FileType::from_unix_char)
        .ok_or_else(|| malformed(line, "unknown file type"))?;

    let permissions = line
        .get(1..10)
        .and_then(Permissions::parse)
        .ok_or_else(|| malformed(line, "bad permission string"))?;

    let mut extended = std::collections::BTreeMap::new();
    let (has_acl, rest) = match line.get(10..11) {
        Some("+") => (true, &line[11..]),
        Some("@") => {
            extended.insert("xattr".to_string(), "true".to_string());
            (false, &line[11..])
        }
        Some(".") => (false, &line[11..]),
        Some(_) => (false, &line[10..]),
        None => return Err(malformed(line, "record too short")),
    };

    let mut tokens = Tokens::new(rest);
    let link_count = tokens.next_token().and_then(|t| t.parse::<u64>().ok());
    let uid = tokens.next_token().and_then(|t| t.parse::<u32>().ok());
    let gid = tokens.next_token().and_then(|t| t.parse::<u32>().ok());

    let mut device = None;
    let size = if matches!(file_type, FileType::Block | FileType::Char) {
        let first = tokens
            .next_token()
            .ok_or_else(|| malformed(line, "missing device numbers"))?;
        device = match first.split_once(',') {
            Some((major, "")) => {
                let minor = tokens.next_token().unwrap_or_default();
                major.parse().ok().zip(minor.parse().ok())
            }
            Some((major, minor)) => major.parse().ok().zip(minor.parse().ok()),
            None => None,
        };
        0
    } else {
        tokens
            .next_token()
            .and_then(|t| t.parse::<u64>().ok())
            .ok_or_else(|| malformed(line, "bad size"))?
    };

    let mut date_tokens = Vec::with_capacity(style.token_count());
    for _ in 0..style.token_count() {
        date_tokens.push(
            tokens
                .next_token()
                .ok_or_else(|| malformed(line, "missing date"))?,
        );
    }
    let modified = parse_date(&date_tokens, style, now);
    if modified.is_none() {
        debug!(line, "unreadable modification date");
    }

    let name = tokens.remainder();
    if name.is_empty() {
        return Err(malformed(line, "missing path"));
    }
    let (path, link_target) = match (file_type, name.split_once(" -> ")) {
        (FileType::Link, Some((path, target))) => (path, Some(target.to_string())),
        (FileType::Link, None) => return Err(malformed(line, "link without a target")),
        _ => (name, None),
    };

    let attributes = Attributes {
        unix: Some(UnixAttributes {
            permissions,
            uid,
            gid,
            has_acl: Some(has_acl),
            link_count,
            device,
        }),
        extended,
    };

    Ok(Metadata::new(file_type, path.to_string(), link_target, '/')?
        .with_size(size)
        .with_times(None, modified, None)
        .with_attributes(attributes))
}

fn parse_date(tokens: &[&str], style: DateStyle, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match style {
        DateStyle::FullIso => {
            let text = tokens.join(" ");
            DateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f %z")
                .ok()
                .map(|date| date.with_timezone(&Utc))
        }
        DateStyle::Seconds => {
            NaiveDateTime::parse_from_str(&tokens.join(" "), "%b %d %H:%M:%S %Y")
                .ok()
                .map(|date| Utc.from_utc_datetime(&date))
        }
        DateStyle::Abbreviated => {
            let (month, day, last) = (tokens[0], tokens[1], tokens[2]);
            if last.contains(':') {
                let at_year = |year: i32| {
                    NaiveDateTime::parse_from_str(
                        &format!("{} {} {} {}", month, day, year, last),
                        "%b %d %Y %H:%M",
                    )
                    .ok()
                    .map(|date| Utc.from_utc_datetime(&date))
                };
                match at_year(now.year()) {
                    Some(date) if date <= now + Duration::days(1) => Some(date),
                    _ => at_year(now.year() - 1),
                }
            } else {
                NaiveDate::parse_from_str(&format!("{} {} {}", month, day, last), "%b %d %Y")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|date| Utc.from_utc_datetime(&date))
            }
        }
    }
}

/// Parse a mount listing; entries not rooted at `/` are dropped
pub fn parse_mounts(format: MountFormat, output: &str) -> Vec<Mount> {
    let mut mounts = Vec::new();
    for (index, line) in output.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed = match format {
            MountFormat::AixMount => {
                if index < 2 {
                    continue;
                }
                let mut tokens = line.split_whitespace();
                if !line.starts_with([' ', '\t']) {
                    tokens.next();
                }
                tokens.next();
                tokens.next().zip(tokens.next()).map(|(p, t)| (p.to_string(), t))
            }
            MountFormat::Mnttab => {
                let mut tokens = line.split_whitespace().skip(1);
                tokens.next().zip(tokens.next()).map(|(p, t)| (p.to_string(), t))
            }
            MountFormat::ProcMounts => {
                let mut tokens = line.split_whitespace().skip(1);
                tokens
                    .next()
                    .zip(tokens.next())
                    .map(|(p, t)| (unescape_octal(p), t))
            }
            MountFormat::BsdMount => line.split_once(" on ").and_then(|(_, rest)| {
                let (path, options) = rest.rsplit_once(" (")?;
                let fs_type = options.split([',', ')']).next()?.trim();
                Some((path.to_string(), fs_type))
            }),
        };

        match parsed {
            Some((path, fs_type)) if path.starts_with('/') => {
                mounts.push(Mount::new(path, fs_type));
            }
            _ => debug!(line, "skipping mount line"),
        }
    }
    mounts
}

/// Undo the `\040` style escapes of `/proc/mounts`
fn unescape_octal(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            if let Some(value) = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 8).ok())
            {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_linux_full_time_record() {
        let line = "-rw-r--r--. 1 0 0 1234 2024-01-15 10:30:00.123456789 +0200 /etc/my file.conf";
        let record = parse_ls_line(line, DateStyle::FullIso, now()).unwrap();

        assert_eq!(record.path(), "/etc/my file.conf");
        assert_eq!(record.size(), 1234);
        assert_eq!(
            record.modified().unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap()
                + Duration::nanoseconds(123_456_789)
        );
        assert_eq!(record.created(), None);
        assert_eq!(record.unix().unwrap().has_acl, Some(false));
    }

    #[test]
    fn test_link_record_resolves_target() {
        let line = "lrwxrwxrwx 1 0 0 4 Mar 14 2019 /a/b/c -> ../x";
        let record = parse_ls_line(line, DateStyle::Abbreviated, now()).unwrap();

        assert!(record.is_link());
        assert_eq!(record.path(), "/a/b/c");
        assert_eq!(record.link_target(), Some("../x"));
        assert_eq!(record.canonical_path(), "/a/x");
        assert_eq!(
            record.modified().unwrap(),
            Utc.with_ymd_and_hms(2019, 3, 14, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_recent_dates_infer_the_year() {
        let this_year = "-rw-r--r--  1 0 0 1 May 30 10:21 /f";
        let record = parse_ls_line(this_year, DateStyle::Abbreviated, now()).unwrap();
        assert_eq!(
            record.modified().unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 30, 10, 21, 0).unwrap()
        );

        let last_year = "-rw-r--r--  1 0 0 1 Dec 24 08:00 /f";
        let record = parse_ls_line(last_year, DateStyle::Abbreviated, now()).unwrap();
        assert_eq!(
            record.modified().unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 24, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_out_of_range_owner_is_unknown() {
        let line = "-rw-r--r--+ 1 4294967294 -2 10 Mar 14 2019 /opt/nobody";
        let record = parse_ls_line(line, DateStyle::Abbreviated, now()).unwrap();
        let unix = record.unix().unwrap();

        assert_eq!(unix.uid, Some(4_294_967_294));
        assert_eq!(unix.gid, None);
        assert_eq!(unix.has_acl, Some(true));

        let huge = "-rw-r--r--  1 99999999999 0 10 Mar 14 2019 /opt/huge";
        let record = parse_ls_line(huge, DateStyle::Abbreviated, now()).unwrap();
        assert_eq!(record.unix().unwrap().uid, None);
    }

    #[test]
    fn test_device_and_macos_records() {
        let line = "crw-rw-rw-  1 0 0 1, 3 Jan 15 10:30:00 2024 /dev/null";
        let record = parse_ls_line(line, DateStyle::Seconds, now()).unwrap();
        assert_eq!(record.size(), 0);
        assert_eq!(record.unix().unwrap().device, Some((1, 3)));
        assert_eq!(
            record.modified().unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
        );

        let xattr = "drwxr-xr-x@ 3 501 20 96 Jan 15 10:30:00 2024 /Users/me";
        let record = parse_ls_line(xattr, DateStyle::Seconds, now()).unwrap();
        assert_eq!(record.attributes().extended.get("xattr").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_malformed_records() {
        assert!(parse_ls_line("total 12", DateStyle::Abbreviated, now()).is_err());
        assert!(parse_ls_line("-rw-r--r-- 1 0 0 big Mar 14 2019 /f", DateStyle::Abbreviated, now()).is_err());
        assert!(parse_ls_line("-rw-r--r-- 1 0 0 1 Mar 14 2019", DateStyle::Abbreviated, now()).is_err());
        let bad_date = parse_ls_line("-rw-r--r-- 1 0 0 1 Foo 99 2019 /f", DateStyle::Abbreviated, now());
        assert_eq!(bad_date.unwrap().modified(), None);
    }

    #[test]
    fn test_mount_listings() {
        let aix = "  node       mounted        mounted over    vfs       date        options\n\
                   -------- ---------------  ---------------  ------ ------------ ---------------\n         \
                   /dev/hd4         /                jfs2   Jun 05 10:21 rw,log=/dev/hd8\n\
                   nfsserv  /export          /mnt             nfs3   Jun 05 10:22 rw\n";
        assert_eq!(
            parse_mounts(MountFormat::AixMount, aix),
            vec![Mount::new("/", "jfs2"), Mount::new("/mnt", "nfs3")]
        );

        let mnttab = "/dev/dsk/c0t0d0s0\t/\tufs\trw\t1\nswap\t/tmp\ttmpfs\trw\t1\n";
        assert_eq!(
            parse_mounts(MountFormat::Mnttab, mnttab),
            vec![Mount::new("/", "ufs"), Mount::new("/tmp", "tmpfs")]
        );

        let proc = "/dev/sda1 / ext4 rw 0 0\nproc /proc proc rw 0 0\nsrv:/x /mnt/my\\040share nfs4 rw 0 0\n";
        assert_eq!(
            parse_mounts(MountFormat::ProcMounts, proc),
            vec![
                Mount::new("/", "ext4"),
                Mount::new("/proc", "proc"),
                Mount::new("/mnt/my share", "nfs4"),
            ]
        );

        let bsd = "/dev/disk1s1 on / (apfs, local, journaled)\nmap auto_home on /System/Volumes/Data/home (autofs, automounted)\n";
        assert_eq!(
            parse_mounts(MountFormat::BsdMount, bsd),
            vec![
                Mount::new("/", "apfs"),
                Mount::new("/System/Volumes/Data/home", "autofs"),
            ]
        );
    }
}
