#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = pawcare_config::load_toml(data)
        && cfg.validate().is_ok()
    {
        // A config that validates must convert into runtime settings.
        let _ = pawcare_core::CollarCfg::from(&cfg);
        let _ = pawcare_core::DosingCfg::from(&cfg);
        let _ = pawcare_core::FeederIdentity::from(&cfg);
    }
});
