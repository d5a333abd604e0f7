//! `partyping classify`: offline check of a single chat payload.

use anyhow::{Context, Result};
use partyping_core::{BridgeConfig, Classifier, Envelope, LogLine};

pub fn run(config: &BridgeConfig, payload: &str, envelope: bool, as_json: bool) -> Result<()> {
    let line = if envelope {
        match Envelope::decode(payload.as_bytes()).context("decode envelope")? {
            Envelope::Chat(line) => line,
            Envelope::Other { msgtype } => {
                println!("ignored: msgtype '{msgtype}' is not Chat");
                return Ok(());
            }
        }
    } else {
        payload.to_string()
    };

    let log_line = match LogLine::parse(&line) {
        Ok(l) => l,
        Err(e) => {
            println!("no event: {e}");
            return Ok(());
        }
    };

    match Classifier::new(config.notify).classify(&log_line) {
        Some(n) if as_json => println!("{}", serde_json::to_string_pretty(&n)?),
        Some(n) => {
            println!("Title:   {}", n.title);
            println!("Message: {}", n.message);
            println!("Sound:   {}", n.sound);
        }
        None => println!(
            "no notification (code {} / 0x{:x}, toggles {:?})",
            log_line.code, log_line.code, config.notify
        ),
    }
    Ok(())
}
