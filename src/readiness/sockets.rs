//! Listening-socket table parsing.

use std::sync::OnceLock;

use regex::Regex;

/// One row of `ss -ltnpH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListeningSocket {
    /// Local address as printed, e.g. `0.0.0.0:8080` or `[::]:443`.
    pub local: String,
    /// Port parsed from the local address.
    pub port: u16,
    /// Names of the processes holding the socket.
    pub processes: Vec<String>,
}

impl ListeningSocket {
    /// Parse one line of `ss -ltnpH` output.
    ///
    /// ```text
    /// LISTEN 0      128    0.0.0.0:8080    0.0.0.0:*    users:(("vendor-server",pid=4121,fd=9))
    /// ```
    ///
    /// Returns `None` for lines that are not listening TCP sockets.
    pub fn parse(line: &str) -> Option<Self> {
        let mut columns = line.split_whitespace();
        if columns.next()? != "LISTEN" {
            return None;
        }
        let local = columns.nth(2)?;
        let (_, port) = local.rsplit_once(':')?;
        let port = port.parse().ok()?;

        let processes = process_name_regex()
            .captures_iter(line)
            .map(|caps| caps[1].to_string())
            .collect();

        Some(Self {
            local: local.to_string(),
            port,
            processes,
        })
    }

    /// Whether any holder's name contains one of `patterns`.
    pub fn held_by_any(&self, patterns: &[String]) -> bool {
        self.processes
            .iter()
            .any(|name| patterns.iter().any(|pattern| name.contains(pattern.as_str())))
    }
}

fn process_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\("([^"]+)",pid="#).expect("valid regex"))
}

/// Port of the first socket in `table` held by a process matching
/// `patterns`, in table order.
pub fn find_service_port(table: &str, patterns: &[String]) -> Option<u16> {
    table
        .lines()
        .filter_map(ListeningSocket::parse)
        .find(|socket| socket.held_by_any(patterns))
        .map(|socket| socket.port)
}
