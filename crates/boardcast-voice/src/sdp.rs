//! SDP attribute mutation for audio quality.
//!
//! Applied to every locally produced offer and answer before it becomes the
//! local description: request in-band forward error correction on the Opus
//! payload and raise the audio bandwidth ceiling.

/// Audio bandwidth ceiling (kbit/s) inserted into the media section.
pub const AUDIO_BITRATE_KBPS: u32 = 128;

/// Request higher audio bitrate and forward error correction.
///
/// Appends `;useinbandfec=1` to every `a=fmtp:` attribute that carries a
/// `minptime` parameter, and inserts `b=AS:128` directly after the
/// `a=mid:audio` attribute. Lines already requesting FEC are left alone.
pub fn boost_audio_quality(sdp: &str) -> String {
    let has_bandwidth = sdp.contains("b=AS:");
    let mut out: Vec<String> = Vec::new();

    for line in sdp.lines() {
        if line.starts_with("a=fmtp:")
            && line.contains("minptime=")
            && !line.contains("useinbandfec")
        {
            out.push(format!("{line};useinbandfec=1"));
        } else {
            out.push(line.to_string());
        }

        if line == "a=mid:audio" && !has_bandwidth {
            out.push(format!("b=AS:{AUDIO_BITRATE_KBPS}"));
        }
    }

    let mut joined = out.join("\r\n");
    if sdp.ends_with('\n') {
        joined.push_str("\r\n");
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "v=0\r\n\
        o=- 46117 2 IN IP4 127.0.0.1\r\n\
        s=-\r\n\
        m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
        a=mid:audio\r\n\
        a=rtpmap:111 opus/48000/2\r\n\
        a=fmtp:111 minptime=10\r\n";

    #[test]
    fn test_fec_appended_to_fmtp() {
        let boosted = boost_audio_quality(SAMPLE);
        assert!(boosted.contains("a=fmtp:111 minptime=10;useinbandfec=1\r\n"));
    }

    #[test]
    fn test_bitrate_inserted_after_mid() {
        let boosted = boost_audio_quality(SAMPLE);
        assert!(boosted.contains("a=mid:audio\r\nb=AS:128\r\n"));
    }

    #[test]
    fn test_idempotent() {
        let once = boost_audio_quality(SAMPLE);
        let twice = boost_audio_quality(&once);

        assert_eq!(once.matches("useinbandfec").count(), 1);
        assert_eq!(twice.matches("useinbandfec").count(), 1);
    }

    #[test]
    fn test_double_application_inserts_one_bandwidth_line() {
        let twice = boost_audio_quality(&boost_audio_quality(SAMPLE));
        assert_eq!(twice.matches("b=AS:").count(), 1);
        assert!(twice.contains("a=fmtp:111 minptime=10;useinbandfec=1"));
    }

    #[test]
    fn test_untouched_lines_preserved() {
        let boosted = boost_audio_quality(SAMPLE);
        assert!(boosted.starts_with("v=0\r\n"));
        assert!(boosted.contains("a=rtpmap:111 opus/48000/2\r\n"));
        assert!(boosted.ends_with("\r\n"));
    }

    #[test]
    fn test_fmtp_with_existing_fec_left_alone() {
        let sdp = "a=fmtp:111 minptime=10;useinbandfec=1\r\n";
        let boosted = boost_audio_quality(sdp);
        assert_eq!(boosted.matches("useinbandfec").count(), 1);
    }

    #[test]
    fn test_video_mid_ignored() {
        let sdp = "a=mid:video\r\na=fmtp:96 max-fr=30\r\n";
        let boosted = boost_audio_quality(sdp);
        assert!(!boosted.contains("b=AS:"));
        assert!(!boosted.contains("useinbandfec"));
    }
}
