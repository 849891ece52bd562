//! Display helpers for progress views

use crate::types::FileStage;

/// Human-readable remaining time for an ETA in seconds.
pub fn format_eta(eta_seconds: Option<u64>) -> String {
    let Some(secs) = eta_seconds else {
        return "Calculating...".to_string();
    };

    match secs {
        0 => "Almost done".to_string(),
        1..=59 => format!("{}s remaining", secs),
        60..=3599 => format!("{}m {}s remaining", secs / 60, secs % 60),
        _ => format!("{}h {}m remaining", secs / 3600, (secs % 3600) / 60),
    }
}

pub fn stage_label(stage: FileStage) -> &'static str {
    match stage {
        FileStage::Queued => "Queued",
        FileStage::Uploading => "Uploading",
        FileStage::Detecting => "Detecting template",
        FileStage::Ocr => "Running OCR",
        FileStage::Parsing => "Parsing parts",
        FileStage::Validating => "Validating",
        FileStage::Done => "Done",
    }
}

/// Format a byte count, e.g. `1.50 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}
