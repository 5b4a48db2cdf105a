//! Snapshot provider backed by the vendor's `dxcmd` cache dump tool.
//!
//! The tool cannot print a cache dump to stdout; it writes an XML document
//! to a file path it is handed. Each fetch therefore runs the configured
//! command template once with `{driver}` and `{file}` substituted, parses
//! the file the tool produced, and deletes it again. Fetches are strictly
//! sequential and never retry; scheduling is the caller's concern.
//!
//! The dump document looks like:
//!
//! ```text
//! <driver-info>
//!   <subscriber>
//!     <cache>
//!       <transactions>
//!         <oldest>20050415081011</oldest>
//!         <newest>20050415081544</newest>
//!       </transactions>
//!     </cache>
//!   </subscriber>
//! </driver-info>
//! ```
//!
//! Both watermark elements absent means the cache is empty. One present
//! without the other means the dump is unusable.

use crate::provider::{ProviderError, SnapshotProvider};
use crate::snapshot::Snapshot;
use crate::tracker::DriverId;
use roxmltree::{Document, Node};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Shells out to the cache dump tool, one driver per call.
#[derive(Debug)]
pub struct DxCmdProvider {
    command: Vec<String>,
    work_dir: PathBuf,
}

impl DxCmdProvider {
    /// `command` is the full template including the executable; `work_dir`
    /// is where dump files are written.
    #[must_use]
    pub fn new(command: Vec<String>, work_dir: PathBuf) -> Self {
        Self { command, work_dir }
    }
}

impl SnapshotProvider for DxCmdProvider {
    fn fetch(&mut self, driver: &DriverId) -> Result<Snapshot, ProviderError> {
        let (tool, template) = self
            .command
            .split_first()
            .ok_or(ProviderError::CommandEmpty)?;

        let dump_path = self.work_dir.join(snapshot_file_name(driver));
        // Claim the dump path up front so every exit below releases it.
        let guard = DumpGuard {
            path: dump_path.clone(),
        };

        let args = render_args(template, driver, &dump_path);
        debug!(driver = %driver, tool = %tool, path = %dump_path.display(), "dumping cache");

        let output = Command::new(tool)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ProviderError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ProviderError::ToolFailed {
                tool: tool.clone(),
                driver: driver.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let text =
            fs::read_to_string(&guard.path).map_err(|source| ProviderError::SnapshotUnreadable {
                path: guard.path.clone(),
                source,
            })?;

        parse_snapshot(driver, &text)
    }
}

/// Removes the dump file when dropped, success or failure.
struct DumpGuard {
    path: PathBuf,
}

impl Drop for DumpGuard {
    fn drop(&mut self) {
        // The tool may have failed before writing anything.
        let _ = fs::remove_file(&self.path);
    }
}

/// Dump file name for a driver: spaces become underscores, `.xml` appended.
fn snapshot_file_name(driver: &DriverId) -> String {
    let mut name = driver.as_str().replace(' ', "_");
    name.push_str(".xml");
    name
}

fn render_args(template: &[String], driver: &DriverId, dump_path: &Path) -> Vec<String> {
    let file = dump_path.to_string_lossy();
    template
        .iter()
        .map(|arg| {
            arg.replace("{driver}", driver.as_str())
                .replace("{file}", &file)
        })
        .collect()
}

fn parse_snapshot(driver: &DriverId, text: &str) -> Result<Snapshot, ProviderError> {
    let doc = Document::parse(text).map_err(|err| malformed(driver, err.to_string()))?;

    let root = doc.root_element();
    if !root.has_tag_name("driver-info") {
        return Err(malformed(
            driver,
            format!("unexpected root element <{}>", root.tag_name().name()),
        ));
    }

    let transactions = child(root, "subscriber")
        .and_then(|node| child(node, "cache"))
        .and_then(|node| child(node, "transactions"));

    // A dump without a transaction window is an empty cache, not an error.
    let Some(transactions) = transactions else {
        return Ok(Snapshot::Empty);
    };

    match (child(transactions, "oldest"), child(transactions, "newest")) {
        (None, None) => Ok(Snapshot::Empty),
        (Some(oldest), Some(newest)) => {
            let oldest = required_text(driver, oldest, "oldest")?;
            let newest = required_text(driver, newest, "newest")?;
            Ok(Snapshot::non_empty(oldest, newest))
        }
        (Some(_), None) => Err(malformed(driver, "<oldest> present without <newest>")),
        (None, Some(_)) => Err(malformed(driver, "<newest> present without <oldest>")),
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(name))
}

fn required_text(
    driver: &DriverId,
    node: Node<'_, '_>,
    name: &str,
) -> Result<String, ProviderError> {
    let text = node.text().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(malformed(driver, format!("<{name}> has no watermark text")));
    }
    Ok(text.to_string())
}

fn malformed(driver: &DriverId, detail: impl Into<String>) -> ProviderError {
    ProviderError::Malformed {
        driver: driver.clone(),
        detail: detail.into(),
    }
}
