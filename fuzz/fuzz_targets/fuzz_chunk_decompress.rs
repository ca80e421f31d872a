#![no_main]

use libfuzzer_sys::fuzz_target;
use nexus_streamer_recording::CodecRegistry;
use nexus_streamer_types::CompressionKind;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, stored)) = data.split_first() else {
        return;
    };
    let kind = match selector % 3 {
        0 => CompressionKind::None,
        1 => CompressionKind::Lz4,
        _ => CompressionKind::Zstd,
    };
    // Corrupt chunks must surface as errors, never as panics.
    let codecs = CodecRegistry::new();
    if let Ok(chunk) = codecs.decompress(kind, stored) {
        let recompressed = codecs
            .compress(kind, &chunk)
            .expect("decompressed chunk recompresses");
        assert_eq!(codecs.decompress(kind, &recompressed).ok(), Some(chunk));
    }
});
