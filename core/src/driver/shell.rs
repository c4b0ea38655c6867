//! Shell syntax for the two command families

/// Command language spoken by a flavor's session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Posix,
    PowerShell,
}

impl Shell {
    /// Quote a single argument
    pub fn quote(&self, arg: &str) -> String {
        match self {
            Shell::Posix => shell_quote(arg),
            Shell::PowerShell => format!("'{}'", arg.replace('\'', "''")),
        }
    }

    /// Send a command's standard output to `path`
    pub fn redirect(&self, command: &str, path: &str) -> String {
        match self {
            Shell::Posix => format!("{} > {}", command, self.quote(path)),
            Shell::PowerShell => format!(
                "{} | Out-File -Encoding UTF8 -FilePath {}",
                command,
                self.quote(path)
            ),
        }
    }

    /// Compress `path` in place, leaving `<path>.gz`
    pub fn compress(&self, path: &str) -> String {
        match self {
            Shell::Posix => format!("gzip -f {}", self.quote(path)),
            Shell::PowerShell => format!("Gzip-File {}", self.quote(path)),
        }
    }

    /// Whether commands and paths compare case-insensitively
    pub fn is_case_insensitive(&self) -> bool {
        matches!(self, Shell::PowerShell)
    }
}

/// Single-quote `arg` for a POSIX shell unless it is plainly safe
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ':' | ',' | '@' | '%'));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
