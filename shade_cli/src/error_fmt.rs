//! Human-readable error descriptions and structured JSON error formatting.

use shade_core::{CoreError, StoreError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return match ce {
            CoreError::Hardware(msg) | CoreError::HardwareFault(msg) => format!(
                "What happened: A GPIO line could not be driven ({msg}).\nLikely causes: Wrong pin numbers, missing GPIO permissions, or the line is claimed by another process.\nHow to fix: Check [pins] in the config and run with access to /dev/gpiomem."
            ),
            CoreError::Spawn { task, reason } => format!(
                "What happened: Task {task} could not be started ({reason}).\nLikely causes: Thread limit reached or memory exhausted.\nHow to fix: Free system resources and restart the controller."
            ),
            CoreError::Storage(se) => storage_hint(se),
        };
    }
    if let Some(se) = err.downcast_ref::<StoreError>() {
        return storage_hint(se);
    }
    if let Some(he) = err.downcast_ref::<shade_hardware::HwError>() {
        return format!(
            "What happened: {he}.\nLikely causes: GPIO not available, or the storage file is not writable.\nHow to fix: Check [pins] and [storage] in the config and the process permissions."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.starts_with("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path.\nHow to fix: Pass --config <FILE> pointing at a TOML like etc/shade.toml. Original: {msg}"
        );
    }
    if lower.starts_with("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this controller.\nLikely causes: Typo, wrong value type, or a misplaced section.\nHow to fix: Compare with etc/shade.toml. Original: {msg}"
        );
    }
    if lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range or inconsistent values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn storage_hint(se: &StoreError) -> String {
    format!(
        "What happened: Calibration storage failed ({se}).\nLikely causes: storage.path not writable or the disk is full.\nHow to fix: Check [storage] path permissions; `shade calibration clear` resets a damaged record."
    )
}

fn core_error(err: &eyre::Report) -> Option<&CoreError> {
    err.chain().find_map(|e| e.downcast_ref::<CoreError>())
}

/// Stable exit codes: 3 hardware, 4 task start-up, 5 storage, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match core_error(err) {
        Some(CoreError::Hardware(_) | CoreError::HardwareFault(_)) => 3,
        Some(CoreError::Spawn { .. }) => 4,
        Some(CoreError::Storage(_)) => 5,
        None if err.chain().any(|e| e.is::<StoreError>()) => 5,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match core_error(err) {
        Some(CoreError::Hardware(_)) => "Hardware",
        Some(CoreError::HardwareFault(_)) => "HardwareFault",
        Some(CoreError::Spawn { .. }) => "Spawn",
        Some(CoreError::Storage(_)) => "Storage",
        None if err.chain().any(|e| e.is::<StoreError>()) => "Storage",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
