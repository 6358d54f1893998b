// Utility functions

use sha2::{Digest, Sha256};

/// Hex SHA-256 digest of an artifact, exposed so evidence can be verified after download
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Host of a scanned URL without the `www.` prefix, for file names.
/// Falls back to `site` when the URL cannot be parsed.
pub fn scan_domain(target_url: &str) -> String {
    let candidate = if target_url.contains("://") {
        target_url.to_string()
    } else {
        format!("https://{}", target_url)
    };

    reqwest::Url::parse(&candidate)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.to_lowercase()))
        .map(|host| host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| "site".to_string())
}

/// File name for the rendered PDF report of a scan
pub fn report_pdf_filename(target_url: &str) -> String {
    format!("rapport-rgpd-{}.pdf", scan_domain(target_url))
}

/// File name for the forensic evidence archive of a scan
pub fn evidence_zip_filename(target_url: &str) -> String {
    format!("preuves-rgpd-{}.zip", scan_domain(target_url))
}

/// `Content-Disposition` value for a download. Quotes and control
/// characters are dropped from the name.
pub fn attachment_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}
