#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are fine; panics are not.
    if let Ok(cfg) = shade_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A config that validates must convert into runnable task settings.
            let _ = shade_core::DriverCfg::from(&cfg);
        }
    }
});
