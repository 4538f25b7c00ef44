//! Dissector child-process handling.
//!
//! The dissector is a black box invoked twice per run: once per schema
//! catalog (`-G …`, output captured) and once per capture file
//! (`-T pdml -r …`, output redirected to a side-car `.data` file). The
//! per-file child is waited on with a 500 ms poll; its exit code is not
//! checked, as the PDML reader tolerates truncated output.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use pdmldb_core::schema::{load_decodes, load_fields, load_protocols, load_values};
use pdmldb_core::SchemaModel;

/// Poll interval while waiting on the dissector child.
const CHILD_POLL: Duration = Duration::from_millis(500);

/// Handle for invoking the external dissector.
pub struct Dissector {
    binary: PathBuf,
}

impl Dissector {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Load the schema model from the four `-G` catalogs.
    pub fn load_schema(&self) -> Result<SchemaModel> {
        let mut model = SchemaModel::new();
        let protocols = load_protocols(&mut model, self.catalog("protocols")?.as_slice());
        let fields = load_fields(&mut model, self.catalog("fields")?.as_slice());
        let values = load_values(&mut model, self.catalog("values")?.as_slice());
        load_decodes(self.catalog("decodes")?.as_slice());
        info!(
            protocols = model.protocol_count(),
            fields = model.field_count(),
            skipped = protocols.skipped + fields.skipped + values.skipped,
            "dissector schema loaded"
        );
        Ok(model)
    }

    fn catalog(&self, name: &str) -> Result<Vec<u8>> {
        let output = Command::new(&self.binary)
            .arg("-G")
            .arg(name)
            .stderr(Stdio::null())
            .output()
            .with_context(|| {
                format!(
                    "failed to run dissector: {} -G {name}",
                    self.binary.display()
                )
            })?;
        Ok(output.stdout)
    }

    /// Dissect one capture into its side-car PDML file and return the
    /// side-car path.
    pub fn dissect(&self, input: &Path) -> Result<PathBuf> {
        let sidecar = sidecar_path(input);
        let stdout = File::create(&sidecar)
            .with_context(|| format!("cannot create side-car {}", sidecar.display()))?;
        let mut child = Command::new(&self.binary)
            .arg("-T")
            .arg("pdml")
            .arg("-r")
            .arg(input)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn dissector for {}", input.display()))?;

        loop {
            match child.try_wait().context("waiting on dissector")? {
                Some(status) => {
                    // exit code intentionally not checked
                    debug!(input = %input.display(), ?status, "dissector finished");
                    break;
                }
                None => thread::sleep(CHILD_POLL),
            }
        }
        Ok(sidecar)
    }
}

/// `capture.pcap` → `capture.pcap.data`.
fn sidecar_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(".data");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path_appends_extension() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/a.pcap")),
            PathBuf::from("/tmp/a.pcap.data")
        );
        assert_eq!(
            sidecar_path(Path::new("noext")),
            PathBuf::from("noext.data")
        );
    }
}
