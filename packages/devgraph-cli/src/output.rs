//! Dual-format printing: every command builds one `serde_json::Value` and
//! either prints it raw (`--json`) or hands it to a human formatter.

pub fn emit<T: serde::Serialize>(value: &T, json: bool, human: impl FnOnce(&T)) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("failed to serialize output: {e}"),
        }
    } else {
        human(value);
    }
}
