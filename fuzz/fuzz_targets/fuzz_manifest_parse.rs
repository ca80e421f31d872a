#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use nexus_streamer_recording::Manifest;

fuzz_target!(|data: &[u8]| {
    // Parsing and validation must never panic, whatever the file holds.
    if let Ok(manifest) = Manifest::from_json(Path::new("manifest.json"), data)
        && manifest.validate().is_ok()
    {
        let _ = manifest.start_time_ns();
        for group in &manifest.groups {
            for field in group.fields.values() {
                assert_eq!(field.chunk_starts().count(), field.chunks.len());
            }
        }
    }
});
