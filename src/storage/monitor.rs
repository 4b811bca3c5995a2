use crate::storage::backend::StorageBackend;

/// Fraction of the quota at which usage counts as a warning.
pub const WARNING_THRESHOLD: f64 = 0.8;

/// Quota assumed when the platform gives no better estimate (5 MiB, the
/// common browser localStorage allowance).
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

const PROBE_KEY: &str = "__storage_test__";

/// Usage of a backend measured against a quota.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageReport {
    /// Summed `key + value` sizes in bytes.
    pub usage: usize,
    pub quota: usize,
    /// `usage / quota` as a fraction, 0 for a zero quota.
    pub percent_used: f64,
    /// Bytes left before the quota, saturating at 0.
    pub available: usize,
    pub is_warning: bool,
}

/// Measures total backend usage against `quota` (pass
/// [`DEFAULT_QUOTA_BYTES`] when nothing better is known).
pub fn usage(backend: &dyn StorageBackend, quota: usize) -> UsageReport {
    let used: usize = backend
        .keys()
        .iter()
        .map(|key| key.len() + backend.get(key).map(|v| v.len()).unwrap_or(0))
        .sum();

    let percent_used = if quota > 0 {
        used as f64 / quota as f64
    } else {
        0.0
    };

    UsageReport {
        usage: used,
        quota,
        percent_used,
        available: quota.saturating_sub(used),
        is_warning: percent_used >= WARNING_THRESHOLD,
    }
}

/// One key's contribution to a namespace's footprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceItem {
    pub key: String,
    pub size: usize,
}

/// Per-namespace breakdown, items largest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceUsage {
    pub usage: usize,
    pub items: Vec<NamespaceItem>,
}

/// Footprint of every key starting with `prefix`, largest first.
pub fn namespace_usage(backend: &dyn StorageBackend, prefix: &str) -> NamespaceUsage {
    let mut items: Vec<NamespaceItem> = backend
        .keys()
        .into_iter()
        .filter(|key| key.starts_with(prefix))
        .map(|key| {
            let size = key.len() + backend.get(&key).map(|v| v.len()).unwrap_or(0);
            NamespaceItem { key, size }
        })
        .collect();

    items.sort_by(|a, b| b.size.cmp(&a.size));

    NamespaceUsage {
        usage: items.iter().map(|i| i.size).sum(),
        items,
    }
}

/// Renders a byte count for people: whole bytes, one decimal above that.
pub fn format_bytes(bytes: usize) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{size:.0} {}", UNITS[unit])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// Probe-writes `value` under a scratch key to test whether it would fit.
/// The scratch key is removed again either way.
pub fn has_space_for(backend: &dyn StorageBackend, value: &str) -> bool {
    match backend.set(PROBE_KEY, value) {
        Ok(()) => {
            let _ = backend.remove(PROBE_KEY);
            true
        }
        Err(_) => false,
    }
}

/// User-facing warning for a report, or `None` while usage is comfortable.
/// Two tiers: "almost full" from 95%, "getting full" from the warning
/// threshold.
pub fn warning_message(report: &UsageReport) -> Option<String> {
    let pct = (report.percent_used * 100.0).round() as u32;
    if report.percent_used >= 0.95 {
        Some(format!(
            "Storage is almost full ({pct}% used). Please clear some data in Settings."
        ))
    } else if report.is_warning {
        Some(format!(
            "Storage is getting full ({pct}% used). Consider clearing cached images."
        ))
    } else {
        None
    }
}
