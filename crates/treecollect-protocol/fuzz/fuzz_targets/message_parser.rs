#![no_main]

use libfuzzer_sys::fuzz_target;
use treecollect_protocol::{Beacon, DataHeader, Report};

fuzz_target!(|data: &[u8]| {
    // Decoders must reject arbitrary radio frames without panicking
    if let Ok(beacon) = Beacon::from_bytes(data) {
        assert_eq!(beacon.to_bytes(), data);
    }

    if let Ok(report) = Report::from_bytes(data) {
        assert_eq!(report.to_bytes(), data);
    }

    if let Ok((mut header, payload)) = DataHeader::decapsulate(data) {
        header.hops = header.hops.saturating_add(1);
        let _ = header.encapsulate(payload);
    }
});
