//! Hosts file editing.
//!
//! DevNest owns only the lines it tagged with `#DevNest`; everything else in
//! the file is preserved byte for byte, including CRLF line endings.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

/// Tag appended to every line DevNest writes.
pub const HOSTS_TAG: &str = "#DevNest";

/// Loopback address sites resolve to.
const LOOPBACK: &str = "127.0.0.1";

/// The line mapping `domain` to loopback.
pub fn hosts_entry(domain: &str) -> String {
    format!("{}\t{}\t{}", LOOPBACK, domain, HOSTS_TAG)
}

#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
}

impl HostsFile {
    /// The operating system's hosts file.
    pub fn system() -> Self {
        let path = if cfg!(windows) {
            PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts")
        } else {
            PathBuf::from("/etc/hosts")
        };
        Self { path }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current content. A missing file reads as empty.
    pub async fn read(&self) -> io::Result<String> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn write(&self, content: &str) -> io::Result<()> {
        fs::write(&self.path, content).await
    }
}

/// True if some line maps `domain` (as a whole host name token).
pub fn has_domain(content: &str, domain: &str) -> bool {
    content.lines().any(|line| line_maps(line, domain))
}

/// Content with the entry for `domain` appended, or `None` if present.
pub fn with_entry(content: &str, domain: &str) -> Option<String> {
    if has_domain(content, domain) {
        return None;
    }

    let newline = line_ending(content);
    let mut output = String::from(content);
    if !output.is_empty() && !output.ends_with('\n') {
        output.push_str(newline);
    }
    output.push_str(&hosts_entry(domain));
    output.push_str(newline);
    Some(output)
}

/// Content without any line mapping `domain`, or `None` if absent.
pub fn without_entry(content: &str, domain: &str) -> Option<String> {
    if !has_domain(content, domain) {
        return None;
    }

    let newline = line_ending(content);
    let mut output = String::with_capacity(content.len());
    for line in content.lines().filter(|line| !line_maps(line, domain)) {
        output.push_str(line);
        output.push_str(newline);
    }
    Some(output)
}

fn line_maps(line: &str, domain: &str) -> bool {
    let active = line.split('#').next().unwrap_or("");
    active
        .split_whitespace()
        .skip(1)
        .any(|host| host.eq_ignore_ascii_case(domain))
}

fn line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}
