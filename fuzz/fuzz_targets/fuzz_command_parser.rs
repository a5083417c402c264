#![no_main]
use libfuzzer_sys::fuzz_target;
use pawcare_core::FeedingCommand;

fuzz_target!(|data: &str| {
    if let Ok(cmd) = data.parse::<FeedingCommand>() {
        // Every accepted command prints back to text that parses to the same command.
        let again: FeedingCommand = cmd
            .to_string()
            .parse()
            .unwrap_or_else(|e| panic!("{cmd} did not reparse: {e}"));
        assert_eq!(cmd, again);
    }
});
