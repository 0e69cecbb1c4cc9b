//! Report output helpers (made by FontLab https://www.fontlab.com/)

use std::io::Write;

use anyhow::Result;

use crate::install::InstallReport;

/// Write reports as a prettified JSON array.
pub fn write_json_pretty(reports: &[InstallReport], mut w: impl Write) -> Result<()> {
    let json = serde_json::to_string_pretty(reports)?;
    w.write_all(json.as_bytes())?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Write one JSON report per line (NDJSON).
pub fn write_ndjson(reports: &[InstallReport], mut w: impl Write) -> Result<()> {
    for report in reports {
        let line = serde_json::to_string(report)?;
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Fetcher;
    use crate::install::{FontInstaller, InstallOptions};
    use std::sync::Arc;

    struct Offline;

    impl Fetcher for Offline {
        fn fetch(&self, url: &str, _headers: &[(&str, &str)]) -> Result<Vec<u8>> {
            Err(anyhow::anyhow!("offline: {url}"))
        }
    }

    #[test]
    fn ndjson_writes_one_line_per_report() {
        let installer =
            FontInstaller::new(InstallOptions::default(), Arc::new(Offline)).expect("installer");
        let reports = installer.install_many(&["Lato", "Open Sans"]);
        let mut buf = Vec::new();

        write_ndjson(&reports, &mut buf).expect("write ndjson");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: InstallReport = serde_json::from_str(lines[1]).expect("parse");
        assert_eq!(parsed.query.name(), "Open Sans");
        assert_eq!(parsed.clients.len(), 4);
        assert!(parsed.css.is_empty());
    }
}
