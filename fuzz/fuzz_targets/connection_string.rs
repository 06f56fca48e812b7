#![no_main]

use cms_db::ConnectionConfig;
use libfuzzer_sys::fuzz_target;

fn reparse(config: &ConnectionConfig) -> ConnectionConfig {
    let conn_str = config.to_connection_string();
    match ConnectionConfig::from_connection_string(&conn_str) {
        Ok(parsed) => parsed,
        Err(e) => panic!("serialized config does not parse: {conn_str:?}: {e}"),
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = ConnectionConfig::from_connection_string(s) else {
        return;
    };

    // Serialization drops blank values and clamps connect_timeout to at
    // least 1s, so the first pass may normalize. After that it is stable.
    let once = reparse(&config);
    let twice = reparse(&once);
    assert_eq!(once, twice);
    assert_eq!(once.password, config.password.clone().filter(|p| !p.trim().is_empty()));

    let _ = config.to_string();
});
