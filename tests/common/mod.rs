//! Shared scripted devices for the integration tests.

#![allow(dead_code)]

use lcr_daq::frame::{compute_checksum, FrameCodec};
use lcr_daq::transport::MockTransport;
use std::collections::VecDeque;

/// Meter that acknowledges every command and answers `FETCH?` with a
/// major value counting up from 1001 and a constant minor of -0.5.
///
/// Commands listed in `silent` are never acknowledged.
pub fn scripted_meter(silent: &'static [&'static str]) -> MockTransport {
    let mut fetches = 0u32;
    MockTransport::new().with_responder(move |line| {
        let command = line.trim_end();
        if command == "FETCH?" {
            fetches += 1;
            return vec![
                Some("0\n".to_string()),
                Some(format!("{:.1},-5.0e-01\n", 1000.0 + f64::from(fetches))),
            ];
        }
        if silent.contains(&command) {
            return vec![];
        }
        vec![Some("exec success\n".to_string())]
    })
}

/// A read response carrying `pv` and `sv`, both in degrees Celsius.
pub fn read_response(pv: f64, sv: f64) -> String {
    let pv = (pv * 10.0).round() as i16 as u16;
    let sv = (sv * 10.0).round() as i16 as u16;
    let body = format!("010304{pv:04X}{sv:04X}");
    format!(":{}{}\r\n", body, compute_checksum(&body).unwrap())
}

/// Controller that echoes writes and answers reads from `temperatures` in order.
/// `None` entries, and reads past the end, time out.
pub fn scripted_controller(temperatures: Vec<Option<f64>>) -> MockTransport {
    let mut readings: VecDeque<Option<f64>> = temperatures.into();
    MockTransport::new().with_responder(move |line| {
        if line.starts_with(":0103") {
            vec![readings
                .pop_front()
                .flatten()
                .map(|pv| read_response(pv, 40.0))]
        } else {
            vec![Some(line.to_string())]
        }
    })
}

/// Controller whose write echoes are always corrupted.
pub fn garbling_controller(pv: f64) -> MockTransport {
    MockTransport::new().with_responder(move |line| {
        if line.starts_with(":0103") {
            vec![Some(read_response(pv, 40.0))]
        } else {
            vec![Some(":0106FFFF\r\n".to_string())]
        }
    })
}

/// Write frame for `register` = `value` at the default address.
pub fn write_frame(register: u16, value: i16) -> String {
    FrameCodec::default().encode_write_frame(register, value)
}

/// Written lines that are register writes.
pub fn writes_only(lines: Vec<String>) -> Vec<String> {
    lines.into_iter().filter(|l| l.starts_with(":0106")).collect()
}
